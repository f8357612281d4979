//! # ntree
//!
//! An ordered N-ary tree of type-tagged nodes with a single iterative
//! depth-first walker.
//!
//! The walker replaces recursion with a cursor and per-walk visited bits, which
//! lets an action callback insert or delete nodes around the one it was handed
//! and even start a nested walk (up to [`MAX_WALK_DEPTH`] levels) without
//! corrupting the walk in progress. Lookup, pruning and persistence are all
//! built on top of it.
//!
//! ## Example
//!
//! ```rust
//! use std::ops::ControlFlow;
//! use ntree::{NodeId, NodeType, Scope, Timing, Tree};
//!
//! const ITEM: NodeType = NodeType::from_fourcc(*b"ITEM");
//!
//! let mut tree: Tree<&str> = Tree::new();
//! let root = tree.root();
//! let a = tree.create(ITEM, NodeId(1), "a");
//! let b = tree.create(ITEM, NodeId(2), "b");
//! tree.insert_child(root, a).unwrap();
//! tree.insert_child(a, b).unwrap();
//!
//! let mut seen = Vec::new();
//! tree.walk(root, Timing::OnEntry, Scope::WholeTree, |walk, node| {
//!     seen.push(*walk.payload(node).unwrap());
//!     ControlFlow::Continue(())
//! });
//! assert_eq!(seen, ["", "a", "b"]);
//! assert_eq!(tree.find_node_by_id(NodeId(2)), Some(b));
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

mod arena;
mod debug;
mod error;
mod node;
mod persist;
mod tree;
mod visited;
mod walk;
#[cfg(feature = "xml")]
mod xml;

pub use arena::NodeHandle;
pub use error::{Error, Result};
pub use node::{Node, NodeId, NodeType, FLAG_VISITED};
pub use persist::{ByteSink, ByteSource, Reanimate, FORMAT_VERSION, RECORD_HEADER_LEN};
pub use tree::{Tree, TreeId};
pub use walk::{Scope, Timing, Walk};
#[cfg(feature = "xml")]
pub use xml::{structural_fields, NewNode};

/// Hard ceiling on nested walks per tree.
///
/// A walk started from inside an action of another walk is nested one level
/// deeper. A walk that would exceed the ceiling returns immediately without
/// visiting anything.
pub const MAX_WALK_DEPTH: usize = 32;

/// Configuration for a [`Tree`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Nesting ceiling for walks; values above [`MAX_WALK_DEPTH`] are clamped.
    pub max_walk_depth: usize,
    /// Initial capacity hint for the node arena.
    pub initial_capacity: usize,
}

impl Config {
    /// The effective nesting ceiling.
    #[inline]
    pub fn walk_depth_limit(&self) -> usize {
        self.max_walk_depth.min(MAX_WALK_DEPTH)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_walk_depth: MAX_WALK_DEPTH,
            initial_capacity: 64,
        }
    }
}

#[cfg(test)]
mod proptests;
