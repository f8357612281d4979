//! Error type shared by the child-array, persistence and XML operations.

use std::collections::TryReserveError;

use crate::{NodeHandle, NodeType};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by tree operations.
///
/// Lookups never fail: "not found" is `None`. A walk that hits the nesting
/// ceiling is silently truncated and does not produce an error either.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Growing or shrinking a child array failed. The node is unchanged.
    #[error("child array allocation failed: {0}")]
    Alloc(#[from] TryReserveError),

    /// The handle does not name a live node of this tree.
    #[error("invalid node handle {0:?}")]
    InvalidHandle(NodeHandle),

    /// The node already has a parent and must be detached first.
    #[error("node {0:?} is already attached to a parent")]
    AlreadyAttached(NodeHandle),

    /// The root cannot be attached, moved or deleted.
    #[error("the root node cannot be attached, moved or deleted")]
    RootProtected,

    /// Attaching the node would make it its own ancestor.
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    WouldCycle {
        parent: NodeHandle,
        child: NodeHandle,
    },

    /// Propagated verbatim from the caller's byte source or sink.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A node has more children than a binary record can describe.
    #[error("node {0:?} has {1} children, more than a record can hold")]
    TooManyChildren(NodeHandle, usize),

    /// A binary stream did not begin with a root record.
    #[error("stream starts with a {0} record instead of a root record")]
    BadRoot(NodeType),

    /// The reanimation factory does not know this node type.
    #[error("cannot reanimate node of type {0}")]
    UnknownType(NodeType),

    /// The XML document could not be parsed.
    #[cfg(feature = "xml")]
    #[error("xml error: {0}")]
    Xml(#[from] roxmltree::Error),
}
