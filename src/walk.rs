//! Iterative depth-first walker.
//!
//! The walk keeps a single cursor and a visited bitmap instead of a call
//! stack. A node is marked visited once all of its children have been
//! processed; until then, returning to it rescans its child array for the next
//! unvisited child. Because the scan is repeated from the live child array, an
//! action may add or remove children around the cursor and the walk still
//! reaches every node that exists when its parent is finished.

use std::ops::{ControlFlow, Deref, DerefMut};

use tracing::debug;

use crate::arena::NodeHandle;
use crate::tree::Tree;

/// When the action fires relative to a node's children.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timing {
    /// Before any child is visited (pre-order).
    OnEntry,
    /// After every child has been visited (post-order).
    OnExit,
}

/// How far the walk may range from its start node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Continue upward past the start node until the whole tree is covered.
    WholeTree,
    /// Stop once the start node's own subtree is done.
    ThisBranch,
}

/// Context handed to a walk action.
///
/// Dereferences to the [`Tree`], so the action can inspect and mutate the tree
/// or start a nested walk one level deeper.
pub struct Walk<'t, P> {
    tree: &'t mut Tree<P>,
    depth: usize,
}

impl<'t, P> Walk<'t, P> {
    /// Nesting level of the walk that invoked the action; the outermost is 1.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Starts a walk nested inside the current one.
    ///
    /// The nested walk has its own visited bits. Past the nesting ceiling it
    /// returns `false` without visiting anything.
    pub fn walk<F>(&mut self, start: NodeHandle, timing: Timing, scope: Scope, action: F) -> bool
    where
        F: FnMut(&mut Walk<'_, P>, NodeHandle) -> ControlFlow<()>,
    {
        self.tree.walk_at(self.depth + 1, start, timing, scope, action)
    }
}

impl<'t, P> Deref for Walk<'t, P> {
    type Target = Tree<P>;

    #[inline]
    fn deref(&self) -> &Tree<P> {
        self.tree
    }
}

impl<'t, P> DerefMut for Walk<'t, P> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Tree<P> {
        self.tree
    }
}

impl<P> Tree<P> {
    /// Walks the tree depth-first from `start`, calling `action` on each node
    /// at the chosen `timing`.
    ///
    /// Returns `true` if the action aborted the walk with
    /// [`ControlFlow::Break`]. Finishing a [`Scope::ThisBranch`] walk, hitting
    /// the nesting ceiling, and losing the cursor to a deletion all return
    /// `false`.
    ///
    /// With [`Scope::WholeTree`] and a start below the root, the walk finishes
    /// the start's subtree and then climbs: each ancestor is entered on the way
    /// up and its remaining children are walked, siblings that precede the
    /// start included.
    ///
    /// If the action deletes the node it was handed, the walk resumes at that
    /// node's former parent. If it deletes an ancestor of the cursor as well,
    /// the walk stops once it climbs into the deleted ancestor.
    pub fn walk<F>(&mut self, start: NodeHandle, timing: Timing, scope: Scope, action: F) -> bool
    where
        F: FnMut(&mut Walk<'_, P>, NodeHandle) -> ControlFlow<()>,
    {
        let depth = self.visited.active() + 1;
        self.walk_at(depth, start, timing, scope, action)
    }

    pub(crate) fn walk_at<F>(
        &mut self,
        depth: usize,
        start: NodeHandle,
        timing: Timing,
        scope: Scope,
        mut action: F,
    ) -> bool
    where
        F: FnMut(&mut Walk<'_, P>, NodeHandle) -> ControlFlow<()>,
    {
        let limit = self.config.walk_depth_limit();
        if depth > limit {
            debug!(depth, limit, "walk nesting ceiling reached");
            return false;
        }
        if !self.nodes.contains(start) {
            return false;
        }
        self.visited.enter(depth);
        let aborted = self.run_walk(depth, start, timing, scope, &mut action);
        self.visited.leave(depth);
        aborted
    }

    fn run_walk<F>(
        &mut self,
        depth: usize,
        start: NodeHandle,
        timing: Timing,
        scope: Scope,
        action: &mut F,
    ) -> bool
    where
        F: FnMut(&mut Walk<'_, P>, NodeHandle) -> ControlFlow<()>,
    {
        let mut cursor = Some(start);
        // Set when the cursor reaches a node for the first time.
        let mut arrived = true;
        // Highest node reached so far; climbing past it enters a new ancestor.
        let mut frontier = Some(start);

        while let Some(node) = cursor {
            let Some(parent) = self.nodes.get(node).map(|n| n.parent) else {
                return false;
            };

            if arrived {
                arrived = false;
                if timing == Timing::OnEntry {
                    if self.fire(depth, node, action) {
                        return true;
                    }
                    if !self.nodes.contains(node) {
                        if node == start && scope == Scope::ThisBranch {
                            return false;
                        }
                        if frontier == Some(node) {
                            arrived = true;
                            frontier = parent;
                        }
                        cursor = parent;
                        continue;
                    }
                }
            }

            if self.visited.is_visited(node.index()) {
                if timing == Timing::OnExit && self.fire(depth, node, action) {
                    return true;
                }
                if node == start && scope == Scope::ThisBranch {
                    return false;
                }
                if frontier == Some(node) {
                    arrived = true;
                    frontier = parent;
                }
                cursor = parent;
                continue;
            }

            match self.first_unvisited_child(node) {
                Some(child) => {
                    cursor = Some(child);
                    arrived = true;
                }
                None => self.visited.mark(node.index()),
            }
        }
        false
    }

    /// Next child of `node` the active walk has not finished.
    ///
    /// The scan starts just after the last finished child and wraps around,
    /// so children inserted anywhere in the array are still found.
    fn first_unvisited_child(&self, node: NodeHandle) -> Option<NodeHandle> {
        let children = self.children(node);
        let resume = children
            .iter()
            .rposition(|c| self.visited.is_visited(c.index()))
            .map_or(0, |i| i + 1);
        children[resume..]
            .iter()
            .chain(&children[..resume])
            .copied()
            .find(|c| !self.visited.is_visited(c.index()))
    }

    /// Runs the action; true means abort.
    #[inline]
    fn fire<F>(&mut self, depth: usize, node: NodeHandle, action: &mut F) -> bool
    where
        F: FnMut(&mut Walk<'_, P>, NodeHandle) -> ControlFlow<()>,
    {
        let mut walk = Walk { tree: self, depth };
        action(&mut walk, node).is_break()
    }
}
