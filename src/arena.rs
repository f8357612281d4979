//! Slot arena owning every node of a tree.
//!
//! Nodes refer to one another only through [`NodeHandle`]s, so deleting a node
//! can never leave a dangling reference behind: a handle to a freed slot fails
//! the generation check and resolves to nothing.

use std::fmt;

use crate::node::Node;

/// Stable reference to a node inside one tree's arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

impl NodeHandle {
    #[inline]
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index; also the key used by the walker's visited bits.
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Clone)]
struct Slot<P> {
    generation: u32,
    node: Option<Node<P>>,
}

/// Node storage with a free list of vacated slots.
#[derive(Clone)]
pub(crate) struct NodeArena<P> {
    slots: Vec<Slot<P>>,
    /// Vacated slot indices, reused before the slot vector grows.
    free: Vec<u32>,
    live: usize,
}

impl<P> NodeArena<P> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    /// Number of slots ever allocated, live or vacant.
    #[inline]
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn insert(&mut self, node: Node<P>) -> NodeHandle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.node.is_none());
            slot.node = Some(node);
            return NodeHandle::new(index, slot.generation);
        }
        assert!(self.slots.len() < u32::MAX as usize, "node arena too large");
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeHandle::new(index, 0)
    }

    /// Vacates the slot; the handle and every copy of it become stale.
    pub(crate) fn remove(&mut self, handle: NodeHandle) -> Option<Node<P>> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(node)
    }

    #[inline]
    pub(crate) fn contains(&self, handle: NodeHandle) -> bool {
        self.get(handle).is_some()
    }

    #[inline]
    pub(crate) fn get(&self, handle: NodeHandle) -> Option<&Node<P>> {
        let slot = self.slots.get(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.node.as_ref()
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut Node<P>> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.node.as_mut()
    }

    /// Live nodes in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (NodeHandle, &Node<P>)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.node
                .as_ref()
                .map(|node| (NodeHandle::new(i as u32, slot.generation), node))
        })
    }
}
