//! Node record and its exact-size child array.

use std::collections::TryReserveError;
use std::fmt;

use crate::arena::NodeHandle;
use crate::tree::TreeId;

// =============================================================================
// Type tags and identities
// =============================================================================

/// Opaque 32-bit node kind, usually a big-endian four-character code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeType(pub u32);

impl NodeType {
    /// Type tag carried by every root node.
    pub const ROOT: NodeType = NodeType::from_fourcc(*b"ROOT");

    /// Builds a tag from four ASCII bytes, first byte most significant.
    pub const fn from_fourcc(code: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(code))
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// The tag as four bytes, if every byte is printable ASCII.
    pub fn fourcc(self) -> Option<[u8; 4]> {
        let bytes = self.0.to_be_bytes();
        bytes
            .iter()
            .all(|b| b.is_ascii_graphic() || *b == b' ')
            .then_some(bytes)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fourcc() {
            Some(bytes) => bytes.iter().try_for_each(|&b| write!(f, "{}", b as char)),
            None => write!(f, "{:#010x}", self.0),
        }
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeType({self})")
    }
}

impl From<u32> for NodeType {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// 16-bit node identity, unique among the attached nodes of one tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub u16);

impl NodeId {
    /// Not yet assigned. Persistence uses it to find nodes still to be read.
    pub const UNASSIGNED: NodeId = NodeId(0);
    /// Reserved for the root.
    pub const ROOT: NodeId = NodeId(0xFFFF);

    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn is_unassigned(self) -> bool {
        self.0 == Self::UNASSIGNED.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u16> for NodeId {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

/// Flag bit reserved for algorithms that track visits on the node itself
/// instead of through the walker's visited bits.
pub const FLAG_VISITED: u16 = 1 << 0;

// =============================================================================
// Child array
// =============================================================================

/// Ordered child links, stored contiguously at exactly `len` capacity.
///
/// Every insert or remove allocates a fresh array of the new size and copies
/// the surviving links across. The new array is built completely before the
/// old one is replaced, so a failed allocation leaves the links untouched.
#[derive(Clone, Default, PartialEq, Eq)]
pub(crate) struct ChildArray {
    links: Vec<NodeHandle>,
}

impl ChildArray {
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.links.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> Option<NodeHandle> {
        self.links.get(index).copied()
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[NodeHandle] {
        &self.links
    }

    pub(crate) fn position(&self, child: NodeHandle) -> Option<usize> {
        self.links.iter().position(|&c| c == child)
    }

    /// Array with `child` placed before `index` (clamped to the length).
    pub(crate) fn with_inserted(
        &self,
        child: NodeHandle,
        index: usize,
    ) -> Result<ChildArray, TryReserveError> {
        let at = index.min(self.links.len());
        let mut links = Vec::new();
        links.try_reserve_exact(self.links.len() + 1)?;
        links.extend_from_slice(&self.links[..at]);
        links.push(child);
        links.extend_from_slice(&self.links[at..]);
        Ok(ChildArray { links })
    }

    /// Array without the entry at `index`. Shrinking to zero releases the
    /// backing storage entirely.
    pub(crate) fn with_removed(&self, index: usize) -> Result<ChildArray, TryReserveError> {
        debug_assert!(index < self.links.len());
        let remaining = self.links.len() - 1;
        if remaining == 0 {
            return Ok(ChildArray::default());
        }
        let mut links = Vec::new();
        links.try_reserve_exact(remaining)?;
        links.extend_from_slice(&self.links[..index]);
        links.extend_from_slice(&self.links[index + 1..]);
        Ok(ChildArray { links })
    }

    pub(crate) fn take(&mut self) -> ChildArray {
        std::mem::take(self)
    }
}

impl fmt::Debug for ChildArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.links).finish()
    }
}

// =============================================================================
// Node
// =============================================================================

/// One element of a [`Tree`](crate::Tree).
///
/// Nodes live in the tree's arena and refer to each other by [`NodeHandle`].
/// Structural fields are changed through the tree so that the parent and
/// child links always agree.
#[derive(Clone, Debug)]
pub struct Node<P> {
    pub(crate) node_type: NodeType,
    pub(crate) id: NodeId,
    pub(crate) flags: u16,
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: ChildArray,
    /// Back-reference to the owning tree, only set on the root.
    pub(crate) owner: Option<TreeId>,
    pub(crate) payload: P,
}

impl<P> Node<P> {
    pub(crate) fn new(node_type: NodeType, id: NodeId, payload: P) -> Self {
        Self {
            node_type,
            id,
            flags: 0,
            parent: None,
            children: ChildArray::default(),
            owner: None,
            payload,
        }
    }

    #[inline]
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn flags(&self) -> u16 {
        self.flags
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[inline]
    pub fn child(&self, index: usize) -> Option<NodeHandle> {
        self.children.get(index)
    }

    #[inline]
    pub fn children(&self) -> &[NodeHandle] {
        self.children.as_slice()
    }

    /// Tree back-reference; `Some` only for a root node.
    #[inline]
    pub fn owner(&self) -> Option<TreeId> {
        self.owner
    }

    #[inline]
    pub fn payload(&self) -> &P {
        &self.payload
    }

    #[inline]
    pub fn payload_mut(&mut self) -> &mut P {
        &mut self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }

    /// Whether this node carries the root type tag.
    #[inline]
    pub fn is_root_type(&self) -> bool {
        self.node_type == NodeType::ROOT
    }
}
