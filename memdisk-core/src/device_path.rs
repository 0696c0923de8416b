//! Raw device path traversal.
//!
//! A device path is a packed sequence of variable-length nodes. Every node starts with
//! a 4-byte header (`type`, `sub_type`, little-endian `length`), where `length` counts
//! the header itself. The path ends with an "end entire device path" node.

use thiserror::Error;

/// Size of the generic node header.
pub const NODE_HEADER_LEN: usize = 4;

/// Node type of end nodes.
pub const END_TYPE: u8 = 0x7F;
/// Sub-type of the node ending the entire device path.
pub const END_ENTIRE_SUB_TYPE: u8 = 0xFF;

#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum PathError {
    #[error("Device path node at offset {offset} is truncated")]
    Truncated { offset: usize },
    #[error("Device path node at offset {offset} declares an invalid length of {length} bytes")]
    InvalidLength { offset: usize, length: u16 },
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// A single node of a device path, header included.
pub struct Node<'a> {
    bytes: &'a [u8],
}

impl<'a> Node<'a> {
    #[must_use]
    #[inline]
    pub const fn node_type(&self) -> u8 {
        self.bytes[0]
    }

    #[must_use]
    #[inline]
    pub const fn sub_type(&self) -> u8 {
        self.bytes[1]
    }

    #[must_use]
    #[inline]
    /// Length of the node in bytes, including its header.
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    #[inline]
    /// Whether this node terminates the whole device path.
    pub const fn is_end_entire(&self) -> bool {
        self.node_type() == END_TYPE && self.sub_type() == END_ENTIRE_SUB_TYPE
    }

    #[must_use]
    #[inline]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Iterator over the nodes of a raw device path.
///
/// The terminating node is yielded as well, after which iteration stops.
/// Malformed nodes are yielded as an error and also stop iteration.
pub struct Nodes<'a> {
    path: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Nodes<'a> {
    #[must_use]
    #[inline]
    pub const fn new(path: &'a [u8]) -> Self {
        Self {
            path,
            offset: 0,
            done: false,
        }
    }

    #[must_use]
    #[inline]
    /// Byte offset of the next node within the path.
    pub const fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for Nodes<'a> {
    type Item = Result<Node<'a>, PathError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let offset = self.offset;
        let Some(header) = self.path.get(offset..offset + NODE_HEADER_LEN) else {
            self.done = true;
            return Some(Err(PathError::Truncated { offset }));
        };

        let length = u16::from_le_bytes([header[2], header[3]]);
        if usize::from(length) < NODE_HEADER_LEN {
            self.done = true;
            return Some(Err(PathError::InvalidLength { offset, length }));
        }

        let Some(bytes) = self.path.get(offset..offset + usize::from(length)) else {
            self.done = true;
            return Some(Err(PathError::Truncated { offset }));
        };

        let node = Node { bytes };
        self.offset += node.len();
        self.done = node.is_end_entire();

        Some(Ok(node))
    }
}

/// Returns the length in bytes of the device path, terminating node included.
pub fn path_len(path: &[u8]) -> Result<usize, PathError> {
    let mut nodes = Nodes::new(path);
    for node in nodes.by_ref() {
        node?;
    }
    Ok(nodes.offset())
}

#[must_use]
/// Decides whether `prefix` is a structural prefix of `full`.
///
/// Every node of `prefix` before its terminator must appear byte for byte at the same
/// offset in `full`. Reaching the terminator of `prefix` means a match; whatever follows
/// in `full` does not matter.
///
/// A malformed `prefix`, or a `full` path too short to hold the compared bytes,
/// never matches.
pub fn is_prefix(prefix: &[u8], full: &[u8]) -> bool {
    let mut nodes = Nodes::new(prefix);
    while let Some(node) = nodes.next() {
        let Ok(node) = node else {
            return false;
        };
        if node.is_end_entire() {
            return true;
        }

        let start = nodes.offset() - node.len();
        match full.get(start..start + node.len()) {
            Some(other) if other == node.as_bytes() => {}
            _ => return false,
        }
    }

    // `Nodes` always ends on either the terminator or an error.
    false
}
