//! Immutable cell tree nodes with memoized content hashes
//!
//! A cell holds up to [`MAX_CELL_BITS`] bits of payload and up to
//! [`MAX_CELL_REFS`] ordered references to other cells. References always
//! point at already-assembled cells, so the structure is a DAG by
//! construction and hashing proceeds bottom-up without recursion.

use crate::bits::pad_with_completion_tag;
use crate::error::{CellError, Result};
use crate::signing;
use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Maximum payload size of a single cell, in bits.
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum number of references a cell may hold.
pub const MAX_CELL_REFS: usize = 4;

/// Maximum representable cell depth (2-byte field in the representation).
pub const MAX_CELL_DEPTH: u16 = u16::MAX;

/// Size of a cell content hash in bytes.
pub const HASH_BYTES: usize = 32;

/// Cell kinds.
///
/// Only `Ordinary` cells have specified behavior; the exotic kinds are
/// carried structurally (descriptor flags, level mask, container round-trip)
/// and hash with the ordinary formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CellType {
    Ordinary = 0,
    PrunedBranch = 1,
    LibraryReference = 2,
    MerkleProof = 3,
    MerkleUpdate = 4,
}

impl CellType {
    /// Whether this kind sets the exotic flag in the first descriptor byte.
    pub fn is_exotic(&self) -> bool {
        !matches!(self, CellType::Ordinary)
    }

    /// Recover the kind from the exotic descriptor flag and the leading
    /// payload byte, which tags the exotic kind on the wire.
    pub(crate) fn from_wire(exotic: bool, data: &[u8]) -> Result<Self> {
        if !exotic {
            return Ok(CellType::Ordinary);
        }
        match data.first() {
            Some(1) => Ok(CellType::PrunedBranch),
            Some(2) => Ok(CellType::LibraryReference),
            Some(3) => Ok(CellType::MerkleProof),
            Some(4) => Ok(CellType::MerkleUpdate),
            other => Err(CellError::MalformedHeader(format!(
                "unknown exotic cell marker {:?}",
                other
            ))),
        }
    }
}

/// An immutable DAG node: payload bits, ordered references, and a memoized
/// SHA-256 content hash and depth.
///
/// Cells are shared via `Arc`; a cell referenced by several parents is stored
/// once. Equality compares content hashes, which cover the payload and the
/// entire subtree.
pub struct Cell {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<Arc<Cell>>,
    cell_type: CellType,
    level_mask: u8,
    hash: [u8; HASH_BYTES],
    depth: u16,
}

impl Cell {
    /// Assemble an immutable cell, computing its depth and content hash.
    ///
    /// `data` must hold exactly `ceil(bit_len / 8)` bytes with zero padding
    /// bits; both the builder and the decoder maintain that invariant.
    pub(crate) fn assemble(
        data: Vec<u8>,
        bit_len: usize,
        references: Vec<Arc<Cell>>,
        cell_type: CellType,
        level_mask: u8,
    ) -> Result<Arc<Cell>> {
        debug_assert!(bit_len <= MAX_CELL_BITS);
        debug_assert!(references.len() <= MAX_CELL_REFS);
        debug_assert_eq!(data.len(), (bit_len + 7) / 8);

        let depth = match references.iter().map(|r| r.depth).max() {
            None => 0,
            Some(MAX_CELL_DEPTH) => return Err(CellError::DepthExceeded),
            Some(max) => max + 1,
        };

        let mut cell = Cell {
            data,
            bit_len,
            references,
            cell_type,
            level_mask,
            hash: [0; HASH_BYTES],
            depth,
        };
        cell.hash = Sha256::digest(cell.representation()).into();

        Ok(Arc::new(cell))
    }

    /// The canonical representation hashed to produce the content hash:
    /// both descriptor bytes, the completion-tag padded data, the 2-byte
    /// big-endian depths of all references, then their 32-byte hashes.
    pub(crate) fn representation(&self) -> Vec<u8> {
        let padded = self.padded_data();
        let mut repr = Vec::with_capacity(2 + padded.len() + self.references.len() * 34);
        let (d1, d2) = self.descriptors();
        repr.push(d1);
        repr.push(d2);
        repr.extend_from_slice(&padded);
        for reference in &self.references {
            repr.extend_from_slice(&reference.depth.to_be_bytes());
        }
        for reference in &self.references {
            repr.extend_from_slice(&reference.hash);
        }
        repr
    }

    /// Descriptor bytes.
    ///
    /// `d1` packs the reference count, the exotic flag, and the level mask;
    /// `d2` packs the payload length as full-byte count plus a partial-byte
    /// marker: `floor(bits/8) + ceil(bits/8)`.
    pub(crate) fn descriptors(&self) -> (u8, u8) {
        let d1 = self.references.len() as u8
            | (u8::from(self.cell_type.is_exotic()) << 3)
            | (self.level_mask << 5);
        let d2 = (self.bit_len / 8 + (self.bit_len + 7) / 8) as u8;
        (d1, d2)
    }

    /// Payload bytes with the completion tag applied.
    pub(crate) fn padded_data(&self) -> Vec<u8> {
        pad_with_completion_tag(&self.data, self.bit_len)
    }

    /// The 32-byte content hash.
    pub fn hash(&self) -> &[u8; HASH_BYTES] {
        &self.hash
    }

    /// Subtree depth: 0 for leaves, `1 + max(child depth)` otherwise.
    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// Payload length in bits.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Raw payload bytes, zero-padded to the byte boundary (no completion tag).
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Ordered child references.
    pub fn references(&self) -> &[Arc<Cell>] {
        &self.references
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn is_exotic(&self) -> bool {
        self.cell_type.is_exotic()
    }

    pub fn level_mask(&self) -> u8 {
        self.level_mask
    }

    /// Sign this cell's content hash with the supplied key.
    pub fn sign(&self, key: &SigningKey) -> Signature {
        signing::sign_message(key, &self.hash)
    }

    /// Verify a signature over this cell's content hash.
    pub fn verify(&self, key: &VerifyingKey, signature: &Signature) -> bool {
        signing::verify_message(key, &self.hash, signature)
    }
}

impl Drop for Cell {
    /// Unrolls deep reference chains iteratively; the default drop glue
    /// would recurse once per level and overflow the stack on long chains.
    fn drop(&mut self) {
        let mut queue = std::mem::take(&mut self.references);
        while let Some(reference) = queue.pop() {
            if let Ok(mut cell) = Arc::try_unwrap(reference) {
                queue.append(&mut cell.references);
            }
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Cell {}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("bit_len", &self.bit_len)
            .field("references", &self.references.len())
            .field("cell_type", &self.cell_type)
            .field("depth", &self.depth)
            .field("hash", &hex::encode(self.hash))
            .finish()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}b:{}r:{}",
            self.bit_len,
            self.references.len(),
            hex::encode(self.hash)
        )
    }
}
