//! The tree: node arena, root, and the structural operations.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::arena::{NodeArena, NodeHandle};
use crate::node::{Node, NodeId, NodeType};
use crate::visited::VisitedStack;
use crate::walk::{Scope, Timing};
use crate::{Config, Error, Result};

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one [`Tree`], recorded on its root node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TreeId(u64);

impl TreeId {
    fn fresh() -> Self {
        Self(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// An ordered N-ary tree of nodes carrying payloads of type `P`.
///
/// The tree owns every node it creates, attached or not. Nodes are created
/// detached with [`Tree::create`] and linked with the child-array operations;
/// a detached subtree stays owned by the tree until it is reattached or
/// deleted.
pub struct Tree<P> {
    id: TreeId,
    pub(crate) nodes: NodeArena<P>,
    pub(crate) root: NodeHandle,
    pub(crate) visited: VisitedStack,
    pub(crate) config: Config,
    next_id: u16,
}

impl<P: Default> Tree<P> {
    /// Creates a tree holding only an empty root.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_root_and_config(P::default(), config)
    }
}

impl<P: Default> Default for Tree<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Tree<P> {
    /// Creates a tree whose root carries `payload`.
    pub fn with_root(payload: P) -> Self {
        Self::with_root_and_config(payload, Config::default())
    }

    pub fn with_root_and_config(payload: P, config: Config) -> Self {
        let id = TreeId::fresh();
        let mut nodes = NodeArena::with_capacity(config.initial_capacity);
        let mut root = Node::new(NodeType::ROOT, NodeId::ROOT, payload);
        root.owner = Some(id);
        let root = nodes.insert(root);
        Self {
            id,
            nodes,
            root,
            visited: VisitedStack::new(),
            config,
            next_id: 1,
        }
    }

    #[inline]
    pub fn id(&self) -> TreeId {
        self.id
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    /// Number of live nodes, root and detached nodes included.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the root is the only node.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    #[inline]
    pub fn contains(&self, node: NodeHandle) -> bool {
        self.nodes.contains(node)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn node(&self, node: NodeHandle) -> Option<&Node<P>> {
        self.nodes.get(node)
    }

    /// Mutable access to a node; only the payload is writable through it.
    #[inline]
    pub fn node_mut(&mut self, node: NodeHandle) -> Option<&mut Node<P>> {
        self.nodes.get_mut(node)
    }

    #[inline]
    pub fn payload(&self, node: NodeHandle) -> Option<&P> {
        self.nodes.get(node).map(Node::payload)
    }

    #[inline]
    pub fn payload_mut(&mut self, node: NodeHandle) -> Option<&mut P> {
        self.nodes.get_mut(node).map(Node::payload_mut)
    }

    #[inline]
    pub fn node_type(&self, node: NodeHandle) -> Option<NodeType> {
        self.nodes.get(node).map(Node::node_type)
    }

    pub fn set_node_type(&mut self, node: NodeHandle, node_type: NodeType) -> Result<()> {
        self.node_entry(node)?.node_type = node_type;
        Ok(())
    }

    #[inline]
    pub fn node_id(&self, node: NodeHandle) -> Option<NodeId> {
        self.nodes.get(node).map(Node::id)
    }

    pub fn set_node_id(&mut self, node: NodeHandle, id: NodeId) -> Result<()> {
        self.node_entry(node)?.id = id;
        Ok(())
    }

    #[inline]
    pub fn flags(&self, node: NodeHandle) -> Option<u16> {
        self.nodes.get(node).map(Node::flags)
    }

    pub fn set_flags(&mut self, node: NodeHandle, flags: u16) -> Result<()> {
        self.node_entry(node)?.flags = flags;
        Ok(())
    }

    #[inline]
    pub fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.nodes.get(node).and_then(Node::parent)
    }

    /// Child count; a stale handle reads as childless.
    #[inline]
    pub fn child_count(&self, node: NodeHandle) -> usize {
        self.nodes.get(node).map_or(0, Node::child_count)
    }

    #[inline]
    pub fn child(&self, node: NodeHandle, index: usize) -> Option<NodeHandle> {
        self.nodes.get(node).and_then(|n| n.child(index))
    }

    /// Children in order; a stale handle reads as childless.
    #[inline]
    pub fn children(&self, node: NodeHandle) -> &[NodeHandle] {
        self.nodes.get(node).map_or(&[], Node::children)
    }

    /// Position of `child` in `parent`'s child array, by handle identity.
    pub fn child_index(&self, parent: NodeHandle, child: NodeHandle) -> Option<usize> {
        self.nodes.get(parent)?.children.position(child)
    }

    /// Hands out the next caller id, skipping the unassigned and root values.
    ///
    /// Ids are issued sequentially and wrap after 65,534 allocations, so trees
    /// that churn through more nodes than that must track uniqueness
    /// themselves.
    pub fn allocate_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id = match self.next_id.wrapping_add(1) {
            0 | 0xFFFF => 1,
            next => next,
        };
        NodeId(id)
    }

    #[inline]
    fn node_entry(&mut self, node: NodeHandle) -> Result<&mut Node<P>> {
        self.nodes.get_mut(node).ok_or(Error::InvalidHandle(node))
    }

    // =========================================================================
    // Node lifecycle
    // =========================================================================

    /// Creates a detached node owned by this tree.
    pub fn create(&mut self, node_type: NodeType, id: NodeId, payload: P) -> NodeHandle {
        self.nodes.insert(Node::new(node_type, id, payload))
    }

    /// Deletes one node and returns its payload.
    ///
    /// The node is first removed from its parent's child array. Its own
    /// children are left in the tree as detached subtrees; use
    /// [`Tree::prune`] to delete a whole branch.
    pub fn delete(&mut self, node: NodeHandle) -> Result<P> {
        if node == self.root {
            return Err(Error::RootProtected);
        }
        self.detach(node)?;
        let mut removed = self.nodes.remove(node).ok_or(Error::InvalidHandle(node))?;
        for &child in removed.children.take().as_slice() {
            if let Some(orphan) = self.nodes.get_mut(child) {
                orphan.parent = None;
            }
        }
        self.visited.forget(node.index());
        Ok(removed.payload)
    }

    // =========================================================================
    // Child-array management
    // =========================================================================

    /// Appends `child` to `parent`'s children.
    pub fn insert_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<()> {
        self.insert_child_at(parent, child, usize::MAX)
    }

    /// Inserts `child` before position `index`, clamped to the child count.
    ///
    /// `child` must be detached. The child array is reallocated at its new
    /// exact size; on allocation failure nothing changes.
    pub fn insert_child_at(
        &mut self,
        parent: NodeHandle,
        child: NodeHandle,
        index: usize,
    ) -> Result<()> {
        self.check_attachable(parent, child)?;
        let node = self.nodes.get(child).ok_or(Error::InvalidHandle(child))?;
        if node.parent.is_some() {
            return Err(Error::AlreadyAttached(child));
        }
        let grown = self.node_entry(parent)?.children.with_inserted(child, index)?;
        self.node_entry(parent)?.children = grown;
        self.node_entry(child)?.parent = Some(parent);
        Ok(())
    }

    /// Removes the child at `index` without deleting it.
    ///
    /// Returns the detached child, or `None` if `index` is out of range.
    pub fn remove_child_at(
        &mut self,
        parent: NodeHandle,
        index: usize,
    ) -> Result<Option<NodeHandle>> {
        let node = self.nodes.get(parent).ok_or(Error::InvalidHandle(parent))?;
        let Some(child) = node.children.get(index) else {
            return Ok(None);
        };
        let shrunk = node.children.with_removed(index)?;
        self.node_entry(parent)?.children = shrunk;
        if let Some(detached) = self.nodes.get_mut(child) {
            detached.parent = None;
        }
        Ok(Some(child))
    }

    /// Removes `child` from `parent`'s children without deleting it.
    ///
    /// A `child` that is not among them is silently ignored.
    pub fn remove_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<()> {
        let node = self.nodes.get(parent).ok_or(Error::InvalidHandle(parent))?;
        if let Some(index) = node.children.position(child) {
            self.remove_child_at(parent, index)?;
        }
        Ok(())
    }

    /// Removes `node` from its parent, if it has one.
    pub fn detach(&mut self, node: NodeHandle) -> Result<()> {
        let entry = self.nodes.get(node).ok_or(Error::InvalidHandle(node))?;
        match entry.parent {
            Some(parent) => self.remove_child(parent, node),
            None => Ok(()),
        }
    }

    /// Re-parents `node` under `new_parent` at `index` in one step.
    ///
    /// A node without a parent is left where it is and the call succeeds.
    /// Both child arrays are rebuilt before either is replaced, so a failed
    /// allocation leaves the tree untouched. When `new_parent` is the current
    /// parent, `index` addresses the array with `node` already removed.
    pub fn move_to(&mut self, node: NodeHandle, new_parent: NodeHandle, index: usize) -> Result<()> {
        let entry = self.nodes.get(node).ok_or(Error::InvalidHandle(node))?;
        let Some(old_parent) = entry.parent else {
            return Ok(());
        };
        self.check_attachable(new_parent, node)?;

        let old_children = &self
            .nodes
            .get(old_parent)
            .ok_or(Error::InvalidHandle(old_parent))?
            .children;
        let from = old_children.position(node).ok_or(Error::InvalidHandle(node))?;
        let shrunk = old_children.with_removed(from)?;

        if old_parent == new_parent {
            let regrown = shrunk.with_inserted(node, index)?;
            self.node_entry(old_parent)?.children = regrown;
            return Ok(());
        }

        let grown = self
            .nodes
            .get(new_parent)
            .ok_or(Error::InvalidHandle(new_parent))?
            .children
            .with_inserted(node, index)?;
        self.node_entry(old_parent)?.children = shrunk;
        self.node_entry(new_parent)?.children = grown;
        self.node_entry(node)?.parent = Some(new_parent);
        Ok(())
    }

    /// Rejects links that would break the strict hierarchy.
    fn check_attachable(&self, parent: NodeHandle, child: NodeHandle) -> Result<()> {
        if !self.nodes.contains(parent) {
            return Err(Error::InvalidHandle(parent));
        }
        if !self.nodes.contains(child) {
            return Err(Error::InvalidHandle(child));
        }
        if child == self.root {
            return Err(Error::RootProtected);
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(Error::WouldCycle { parent, child });
        }
        Ok(())
    }

    /// Whether `ancestor` is `node` or lies on its parent chain.
    pub fn is_ancestor_or_self(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Number of ancestors between `node` and the top of its chain.
    pub fn depth_of(&self, node: NodeHandle) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent(node);
        while let Some(current) = cursor {
            depth += 1;
            cursor = self.parent(current);
        }
        depth
    }

    // =========================================================================
    // Identity and ownership
    // =========================================================================

    /// Whether `node` is this tree's root.
    #[inline]
    pub fn is_root(&self, node: NodeHandle) -> bool {
        node == self.root
    }

    /// Follows parent links to the top and returns that node if it carries
    /// the root type, i.e. if `node` is attached to a tree.
    pub fn find_root(&self, node: NodeHandle) -> Option<NodeHandle> {
        let mut top = node;
        while let Some(parent) = self.nodes.get(top)?.parent {
            top = parent;
        }
        self.nodes.get(top)?.is_root_type().then_some(top)
    }

    /// The tree recorded on the root above `node`, if it is attached.
    pub fn tree_of(&self, node: NodeHandle) -> Option<TreeId> {
        self.find_root(node).and_then(|root| self.nodes.get(root)?.owner)
    }

    /// First node in walk order whose id is `id`.
    pub fn find_node_by_id(&mut self, id: NodeId) -> Option<NodeHandle> {
        let mut found = None;
        self.walk(self.root, Timing::OnEntry, Scope::WholeTree, |walk, node| {
            if walk.node_id(node) == Some(id) {
                found = Some(node);
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        });
        found
    }

    // =========================================================================
    // Pruning
    // =========================================================================

    /// Deletes `start` and every node below it, deepest first.
    ///
    /// The root is never deleted: pruning the root empties the tree.
    pub fn prune(&mut self, start: NodeHandle) -> Result<()> {
        if !self.nodes.contains(start) {
            return Err(Error::InvalidHandle(start));
        }
        let mut failure = None;
        let mut deleted = 0usize;
        self.walk(start, Timing::OnExit, Scope::ThisBranch, |walk, node| {
            if walk.is_root(node) {
                return ControlFlow::Continue(());
            }
            match walk.delete(node) {
                Ok(_) => {
                    deleted += 1;
                    ControlFlow::Continue(())
                }
                Err(err) => {
                    failure = Some(err);
                    ControlFlow::Break(())
                }
            }
        });
        debug!(?start, deleted, "pruned branch");
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Deletes every node except the root, detached subtrees included.
    ///
    /// This is a sweep over the arena rather than a prune from the root, so
    /// nodes no walk can reach are released as well. The root keeps its
    /// payload.
    pub fn clear(&mut self) {
        let root = self.root;
        if let Some(node) = self.nodes.get_mut(root) {
            let children = node.children.take();
            for &child in children.as_slice() {
                if let Some(orphan) = self.nodes.get_mut(child) {
                    orphan.parent = None;
                }
            }
        }
        let leftovers: Vec<NodeHandle> = self
            .nodes
            .iter()
            .map(|(handle, _)| handle)
            .filter(|&handle| handle != root)
            .collect();
        for handle in &leftovers {
            self.nodes.remove(*handle);
            self.visited.forget(handle.index());
        }
        debug!(deleted = leftovers.len(), "cleared tree");
    }
}

impl<P: Clone> Clone for Tree<P> {
    /// The copy is a distinct tree: it gets a fresh [`TreeId`].
    fn clone(&self) -> Self {
        let id = TreeId::fresh();
        let mut nodes = self.nodes.clone();
        if let Some(root) = nodes.get_mut(self.root) {
            root.owner = Some(id);
        }
        Self {
            id,
            nodes,
            root: self.root,
            visited: VisitedStack::new(),
            config: self.config.clone(),
            next_id: self.next_id,
        }
    }
}

impl<P: fmt::Debug> fmt::Debug for Tree<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("id", &self.id)
            .field("root", &self.root)
            .field("len", &self.nodes.len())
            .field("slots", &self.nodes.slot_count())
            .finish_non_exhaustive()
    }
}
