//! Binary persistence over caller-supplied positional byte I/O.
//!
//! Every node is stored as one record, in walk entry order:
//!
//! ```text
//! type: u32 | id: u16 | flags: u16 | child_count: u16 | child_type: u32 * child_count
//! ```
//!
//! All integers are big-endian. Records carry structure only; payloads are
//! rebuilt on read by a [`Reanimate`] factory from each node's type.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::ControlFlow;

use tracing::{debug, trace};

use crate::arena::NodeHandle;
use crate::node::{NodeId, NodeType};
use crate::tree::Tree;
use crate::walk::{Scope, Timing};
use crate::{Error, Result};

/// Version tag handed to every record read and write.
pub const FORMAT_VERSION: u32 = 0x0000_0500;

/// Bytes in a record before its child type list.
pub const RECORD_HEADER_LEN: usize = 10;

const CHILD_TYPE_LEN: usize = 4;

/// Positional reader: fills `buf` completely from `offset` or fails.
pub trait ByteSource {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
}

impl<T: Read + Seek> ByteSource for T {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf)
    }
}

/// Positional writer: stores all of `buf` at `offset` or fails.
pub trait ByteSink {
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()>;
}

impl<T: Write + Seek> ByteSink for T {
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(buf)
    }
}

/// Builds the payload for a node of the given type while reading.
///
/// Returning `None` marks the type as unknown and fails the read. Closures
/// `FnMut(NodeType) -> Option<P>` implement this trait.
pub trait Reanimate<P> {
    fn reanimate(&mut self, node_type: NodeType) -> Option<P>;
}

impl<P, F> Reanimate<P> for F
where
    F: FnMut(NodeType) -> Option<P>,
{
    #[inline]
    fn reanimate(&mut self, node_type: NodeType) -> Option<P> {
        self(node_type)
    }
}

impl<P> Tree<P> {
    /// Writes the whole tree, root first, starting at `*offset`.
    ///
    /// `*offset` ends up past the last record attempted and `version` is
    /// handed to every [`write_node`](Self::write_node). Returns the number
    /// of bytes written by this call.
    pub fn write<S: ByteSink + ?Sized>(
        &mut self,
        sink: &mut S,
        offset: &mut u64,
        version: u32,
    ) -> Result<u64> {
        let start = *offset;
        let mut written = 0usize;
        let mut failure = None;
        let root = self.root;
        self.walk(root, Timing::OnEntry, Scope::WholeTree, |walk, node| {
            match walk.write_node(node, sink, offset, version) {
                Ok(()) => {
                    written += 1;
                    ControlFlow::Continue(())
                }
                Err(err) => {
                    failure = Some(err);
                    ControlFlow::Break(())
                }
            }
        });
        if let Some(err) = failure {
            return Err(err);
        }
        let bytes = *offset - start;
        debug!(nodes = written, start, bytes, version, "wrote tree");
        Ok(bytes)
    }

    /// Replaces the tree's contents with a tree read from `*offset`.
    ///
    /// Every non-root node is deleted first. The root keeps its payload and
    /// its reserved id, and takes its flags from the first record, which
    /// must be a root record. Reading stops at the first error and leaves
    /// whatever was read so far in place; the root still carries
    /// [`NodeId::ROOT`] afterwards. `*offset` ends up past the last record
    /// attempted. Returns the number of bytes consumed by this call.
    pub fn read<S, R>(
        &mut self,
        source: &mut S,
        offset: &mut u64,
        version: u32,
        mut factory: R,
    ) -> Result<u64>
    where
        S: ByteSource + ?Sized,
        R: Reanimate<P>,
    {
        self.clear();
        let root = self.root;
        self.set_node_id(root, NodeId::UNASSIGNED)?;

        let start = *offset;
        let mut read = 0usize;
        let mut failure = None;
        self.walk(root, Timing::OnEntry, Scope::WholeTree, |walk, node| {
            if !walk.node_id(node).is_some_and(NodeId::is_unassigned) {
                return ControlFlow::Continue(());
            }
            match walk.read_node(node, source, offset, version, &mut factory) {
                Ok(()) => {
                    read += 1;
                    ControlFlow::Continue(())
                }
                Err(err) => {
                    failure = Some(err);
                    ControlFlow::Break(())
                }
            }
        });
        // Covers a root record that was never read.
        self.set_node_id(root, NodeId::ROOT)?;

        let bytes = *offset - start;
        if let Some(err) = failure {
            debug!(nodes = read, start, bytes, version, %err, "tree read failed");
            return Err(err);
        }
        debug!(nodes = read, start, bytes, version, "read tree");
        Ok(bytes)
    }

    /// Writes one node's record at `*offset` and advances the offset past it.
    pub fn write_node<S: ByteSink + ?Sized>(
        &self,
        node: NodeHandle,
        sink: &mut S,
        offset: &mut u64,
        version: u32,
    ) -> Result<()> {
        let entry = self.node(node).ok_or(Error::InvalidHandle(node))?;
        let count = u16::try_from(entry.child_count())
            .map_err(|_| Error::TooManyChildren(node, entry.child_count()))?;

        let mut record = Vec::with_capacity(RECORD_HEADER_LEN + CHILD_TYPE_LEN * count as usize);
        record.extend_from_slice(&entry.node_type().get().to_be_bytes());
        record.extend_from_slice(&entry.id().get().to_be_bytes());
        record.extend_from_slice(&entry.flags().to_be_bytes());
        record.extend_from_slice(&count.to_be_bytes());
        for &child in entry.children() {
            let child_type = self.node_type(child).ok_or(Error::InvalidHandle(child))?;
            record.extend_from_slice(&child_type.get().to_be_bytes());
        }

        trace!(
            ?node,
            node_type = %entry.node_type(),
            id = entry.id().get(),
            children = count,
            offset = *offset,
            version,
            "write record"
        );
        let at = *offset;
        *offset += record.len() as u64;
        sink.write_at(at, &record)?;
        Ok(())
    }

    /// Reads one record at `*offset` into `node` and advances the offset past
    /// it, even when the read fails part way.
    ///
    /// The node takes the record's type, id and flags, except that the root
    /// always keeps [`NodeId::ROOT`]. One child is appended
    /// per listed child type, with a payload from `factory`, an unassigned id
    /// and the flags just read; its own record comes later in the stream.
    pub fn read_node<S, R>(
        &mut self,
        node: NodeHandle,
        source: &mut S,
        offset: &mut u64,
        version: u32,
        factory: &mut R,
    ) -> Result<()>
    where
        S: ByteSource + ?Sized,
        R: Reanimate<P> + ?Sized,
    {
        if !self.contains(node) {
            return Err(Error::InvalidHandle(node));
        }

        let mut header = [0u8; RECORD_HEADER_LEN];
        let at = *offset;
        *offset += RECORD_HEADER_LEN as u64;
        source.read_at(at, &mut header)?;

        let node_type = NodeType(u32::from_be_bytes([header[0], header[1], header[2], header[3]]));
        let id = NodeId(u16::from_be_bytes([header[4], header[5]]));
        let flags = u16::from_be_bytes([header[6], header[7]]);
        let count = u16::from_be_bytes([header[8], header[9]]) as usize;
        trace!(?node, %node_type, id = id.get(), children = count, offset = at, version, "read record");

        if self.is_root(node) && node_type != NodeType::ROOT {
            return Err(Error::BadRoot(node_type));
        }
        let id = if self.is_root(node) { NodeId::ROOT } else { id };
        self.set_node_type(node, node_type)?;
        self.set_node_id(node, id)?;
        self.set_flags(node, flags)?;

        let mut types = vec![0u8; CHILD_TYPE_LEN * count];
        let at = *offset;
        *offset += types.len() as u64;
        source.read_at(at, &mut types)?;

        for raw in types.chunks_exact(CHILD_TYPE_LEN) {
            let child_type = NodeType(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]));
            let payload = factory
                .reanimate(child_type)
                .ok_or(Error::UnknownType(child_type))?;
            let child = self.create(child_type, NodeId::UNASSIGNED, payload);
            self.set_flags(child, flags)?;
            if let Err(err) = self.insert_child(node, child) {
                self.delete(child)?;
                return Err(err);
            }
        }
        Ok(())
    }
}
