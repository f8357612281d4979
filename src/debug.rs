//! Debug utilities: text dump and integrity check.

use std::collections::HashMap;
use std::ops::ControlFlow;

use crate::arena::NodeHandle;
use crate::node::{Node, NodeId, NodeType};
use crate::tree::Tree;
use crate::walk::{Scope, Timing};

impl<P> Tree<P> {
    /// One line per attached node, indented two spaces per level:
    /// type, id, flags and child count.
    pub fn dump(&mut self) -> String {
        self.dump_with(|_| String::new())
    }

    /// Like [`Tree::dump`], with `label` appended to each line when it is
    /// not empty.
    pub fn dump_with<F>(&mut self, mut label: F) -> String
    where
        F: FnMut(&Node<P>) -> String,
    {
        let mut out = String::new();
        let root = self.root;
        self.walk(root, Timing::OnEntry, Scope::WholeTree, |walk, handle| {
            let depth = walk.depth_of(handle);
            if let Some(node) = walk.node(handle) {
                out.push_str(&format!(
                    "{:indent$}{} id={} flags={:#06x} children={}",
                    "",
                    node.node_type(),
                    node.id(),
                    node.flags(),
                    node.child_count(),
                    indent = depth * 2
                ));
                let extra = label(node);
                if !extra.is_empty() {
                    out.push(' ');
                    out.push_str(&extra);
                }
                out.push('\n');
            }
            ControlFlow::Continue(())
        });
        out
    }

    /// Checks the link invariants - returns the list of issues found.
    pub fn verify_integrity(&self) -> Vec<String> {
        let mut issues = Vec::new();

        match self.nodes.get(self.root) {
            None => issues.push(format!("root {:?} is not live", self.root)),
            Some(root) => {
                if root.parent().is_some() {
                    issues.push("root has a parent".to_string());
                }
                if root.node_type() != NodeType::ROOT {
                    issues.push(format!("root has type {}", root.node_type()));
                }
                if root.id() != NodeId::ROOT {
                    issues.push(format!("root has id {}", root.id()));
                }
                if root.owner() != Some(self.id()) {
                    issues.push(format!("root owner is {:?}", root.owner()));
                }
            }
        }

        let mut ids: HashMap<NodeId, usize> = HashMap::new();
        for (handle, node) in self.nodes.iter() {
            if let Some(parent) = node.parent() {
                match self.nodes.get(parent) {
                    None => issues.push(format!("{handle:?} has dead parent {parent:?}")),
                    Some(p) => {
                        let hits = p.children().iter().filter(|&&c| c == handle).count();
                        if hits != 1 {
                            issues.push(format!(
                                "{handle:?} appears {hits} times under its parent {parent:?}"
                            ));
                        }
                    }
                }
            }
            for &child in node.children() {
                match self.nodes.get(child) {
                    None => issues.push(format!("{handle:?} has dead child {child:?}")),
                    Some(c) if c.parent() != Some(handle) => issues.push(format!(
                        "child {child:?} of {handle:?} points at {:?}",
                        c.parent()
                    )),
                    Some(_) => {}
                }
            }
            if handle != self.root && node.owner().is_some() {
                issues.push(format!("{handle:?} carries a tree back-reference"));
            }

            match self.top_of(handle) {
                None => issues.push(format!("{handle:?} sits on a parent cycle")),
                Some(top) if top == self.root && handle != self.root => {
                    if node.id() == NodeId::ROOT {
                        issues.push(format!("{handle:?} uses the reserved root id"));
                    }
                    if !node.id().is_unassigned() {
                        *ids.entry(node.id()).or_default() += 1;
                    }
                }
                Some(_) => {}
            }
        }
        let mut duplicates: Vec<_> = ids.into_iter().filter(|&(_, n)| n > 1).collect();
        duplicates.sort();
        for (id, n) in duplicates {
            issues.push(format!("id {id} is shared by {n} attached nodes"));
        }

        if self.visited.active() != 0 || self.visited.depth() != 1 || self.visited.marked() != 0 {
            issues.push(format!(
                "visited stack not unwound: {} active, {} levels, {} marks",
                self.visited.active(),
                self.visited.depth(),
                self.visited.marked()
            ));
        }
        issues
    }

    /// Top of `node`'s parent chain, or `None` if the chain loops.
    fn top_of(&self, node: NodeHandle) -> Option<NodeHandle> {
        let mut top = node;
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(top).and_then(Node::parent) {
                Some(parent) => top = parent,
                None => return Some(top),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETR: NodeType = NodeType::from_fourcc(*b"LETR");

    #[test]
    fn test_dump_indents_by_depth() {
        let mut t: Tree<char> = Tree::with_root('*');
        let root = t.root();
        let a = t.create(LETR, NodeId(1), 'a');
        let b = t.create(LETR, NodeId(2), 'b');
        t.insert_child(root, a).unwrap();
        t.insert_child(a, b).unwrap();
        t.set_flags(b, 0x10).unwrap();

        assert_eq!(
            t.dump(),
            "ROOT id=65535 flags=0x0000 children=1\n\
             \x20 LETR id=1 flags=0x0000 children=1\n\
             \x20   LETR id=2 flags=0x0010 children=0\n"
        );
        assert_eq!(
            t.dump_with(|n| n.payload().to_string()),
            "ROOT id=65535 flags=0x0000 children=1 *\n\
             \x20 LETR id=1 flags=0x0000 children=1 a\n\
             \x20   LETR id=2 flags=0x0010 children=0 b\n"
        );
    }

    #[test]
    fn test_verify_clean_tree() {
        let mut t: Tree<()> = Tree::new();
        let root = t.root();
        for i in 1..=5 {
            let n = t.create(LETR, NodeId(i), ());
            t.insert_child(root, n).unwrap();
        }
        assert!(t.verify_integrity().is_empty(), "{:?}", t.verify_integrity());
    }

    #[test]
    fn test_verify_reports_duplicate_ids_and_broken_links() {
        let mut t: Tree<()> = Tree::new();
        let root = t.root();
        let a = t.create(LETR, NodeId(4), ());
        let b = t.create(LETR, NodeId(4), ());
        let _loose = t.create(LETR, NodeId(4), ());
        t.insert_child(root, a).unwrap();
        t.insert_child(root, b).unwrap();

        let issues = t.verify_integrity();
        assert_eq!(issues, ["id 4 is shared by 2 attached nodes"]);

        t.nodes.get_mut(b).unwrap().parent = None;
        let issues = t.verify_integrity();
        assert!(issues.iter().any(|i| i.contains("points at None")), "{issues:?}");
    }
}
