//! XML form of a tree.
//!
//! The document element stands for the root; every element below it becomes
//! one node, nested the same way. The writer emits
//!
//! ```xml
//! <ntree version="1280">
//!   <node type="ITEM" id="1" flags="0">
//!     <node type="LEAF" id="2" flags="0"/>
//!   </node>
//! </ntree>
//! ```
//!
//! and [`structural_fields`] reads those attributes back.

use std::io;
use std::ops::ControlFlow;
use std::path::Path;

use tracing::debug;

use crate::arena::NodeHandle;
use crate::node::{NodeId, NodeType};
use crate::persist::FORMAT_VERSION;
use crate::tree::Tree;
use crate::walk::{Scope, Timing};
use crate::Result;

/// A node produced by an XML factory, ready to be attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewNode<P> {
    pub node_type: NodeType,
    pub id: NodeId,
    pub flags: u16,
    pub payload: P,
}

impl<P> NewNode<P> {
    pub fn new(node_type: NodeType, id: NodeId, payload: P) -> Self {
        Self {
            node_type,
            id,
            flags: 0,
            payload,
        }
    }

    pub fn with_flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }
}

/// Reads the `type`, `id` and `flags` attributes written by
/// [`Tree::to_xml_string`].
///
/// `type` is required and is either four characters or `0x`-prefixed hex.
/// Missing `id` and `flags` read as zero. Returns `None` if any attribute is
/// malformed.
pub fn structural_fields(elem: roxmltree::Node<'_, '_>) -> Option<(NodeType, NodeId, u16)> {
    let node_type = parse_type(elem.attribute("type")?)?;
    let id = match elem.attribute("id") {
        Some(raw) => NodeId(raw.trim().parse().ok()?),
        None => NodeId::UNASSIGNED,
    };
    let flags = match elem.attribute("flags") {
        Some(raw) => raw.trim().parse().ok()?,
        None => 0,
    };
    Some((node_type, id, flags))
}

fn parse_type(raw: &str) -> Option<NodeType> {
    if let Ok(bytes) = <[u8; 4]>::try_from(raw.as_bytes()) {
        return Some(NodeType::from_fourcc(bytes));
    }
    let hex = raw.strip_prefix("0x")?;
    u32::from_str_radix(hex, 16).ok().map(NodeType)
}

fn format_type(node_type: NodeType) -> String {
    match node_type.fourcc() {
        Some(bytes) if bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_') => {
            bytes.iter().map(|&b| b as char).collect()
        }
        _ => format!("{:#010x}", node_type.get()),
    }
}

impl<P> Tree<P> {
    /// Replaces the tree's contents with the elements of an XML document.
    ///
    /// Elements are visited depth-first in document order. `factory` turns
    /// each one into a [`NewNode`] that is appended under the node built for
    /// its parent element; returning `None` skips the element together with
    /// everything inside it. The root keeps its own fields and payload.
    /// Returns the number of nodes created.
    pub fn read_xml<F>(&mut self, text: &str, mut factory: F) -> Result<usize>
    where
        F: FnMut(roxmltree::Node<'_, '_>) -> Option<NewNode<P>>,
    {
        let doc = roxmltree::Document::parse(text)?;
        self.clear();

        let mut pending: Vec<(roxmltree::Node<'_, '_>, NodeHandle)> = Vec::new();
        push_elements(&mut pending, doc.root_element(), self.root);

        let mut created = 0usize;
        let mut skipped = 0usize;
        while let Some((elem, parent)) = pending.pop() {
            let Some(new) = factory(elem) else {
                skipped += 1;
                continue;
            };
            let node = self.create(new.node_type, new.id, new.payload);
            self.set_flags(node, new.flags)?;
            if let Err(err) = self.insert_child(parent, node) {
                self.delete(node)?;
                return Err(err);
            }
            created += 1;
            push_elements(&mut pending, elem, node);
        }
        debug!(created, skipped, "read xml");
        Ok(created)
    }

    /// Reads an XML file with [`Tree::read_xml`].
    pub fn read_xml_file<F>(&mut self, path: impl AsRef<Path>, factory: F) -> Result<usize>
    where
        F: FnMut(roxmltree::Node<'_, '_>) -> Option<NewNode<P>>,
    {
        let text = std::fs::read_to_string(path)?;
        self.read_xml(&text, factory)
    }

    /// Renders the tree structure as XML, two spaces of indent per level.
    pub fn to_xml_string(&mut self) -> String {
        let mut out = String::new();
        let mut open: Vec<NodeHandle> = Vec::new();
        let root = self.root;
        self.walk(root, Timing::OnEntry, Scope::WholeTree, |walk, node| {
            let parent = walk.parent(node);
            while let Some(&top) = open.last() {
                if Some(top) == parent {
                    break;
                }
                open.pop();
                close_tag(&mut out, open.len(), walk.is_root(top));
            }

            let indent = open.len() * 2;
            let Some(entry) = walk.node(node) else {
                return ControlFlow::Continue(());
            };
            let tag = if walk.is_root(node) {
                format!("{:indent$}<ntree version=\"{FORMAT_VERSION}\"", "")
            } else {
                format!(
                    "{:indent$}<node type=\"{}\" id=\"{}\" flags=\"{}\"",
                    "",
                    format_type(entry.node_type()),
                    entry.id(),
                    entry.flags()
                )
            };
            out.push_str(&tag);
            if entry.is_leaf() {
                out.push_str("/>\n");
            } else {
                out.push_str(">\n");
                open.push(node);
            }
            ControlFlow::Continue(())
        });
        while let Some(top) = open.pop() {
            close_tag(&mut out, open.len(), self.is_root(top));
        }
        out
    }

    /// Writes [`Tree::to_xml_string`] to `out`.
    pub fn write_xml<W: io::Write>(&mut self, mut out: W) -> Result<()> {
        let text = self.to_xml_string();
        out.write_all(text.as_bytes())?;
        debug!(bytes = text.len(), "wrote xml");
        Ok(())
    }
}

fn push_elements<'a, 'input>(
    pending: &mut Vec<(roxmltree::Node<'a, 'input>, NodeHandle)>,
    elem: roxmltree::Node<'a, 'input>,
    parent: NodeHandle,
) {
    // Reversed so that popping yields document order.
    let start = pending.len();
    pending.extend(elem.children().filter(|c| c.is_element()).map(|c| (c, parent)));
    pending[start..].reverse();
}

fn close_tag(out: &mut String, depth: usize, root: bool) {
    let indent = depth * 2;
    let name = if root { "ntree" } else { "node" };
    out.push_str(&format!("{:indent$}</{name}>\n", ""));
}
