//! Bag-of-Cells binary container codec
//!
//! A container serializes the cell DAG reachable from one or more roots:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │ magic          4B   b5 ee 9c 72                           │
//! │ flags          1B   index<<7 | checksum<<6 | cache<<5     │
//! │                     | reserved(2b) | size_bytes(3b)       │
//! │ offset_bytes   1B                                         │
//! │ cell_count     size_bytes (all header ints big-endian)    │
//! │ root_count     size_bytes                                 │
//! │ absent_count   size_bytes (always 0)                      │
//! │ total_size     offset_bytes                               │
//! │ root list      root_count × size_bytes                    │
//! │ index          cell_count × offset_bytes (optional)       │
//! │ payload        per cell: d1, d2, data, ref indices        │
//! │ checksum       4B CRC32C little-endian (optional)         │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Cells appear in a deterministic topological order where every reference
//! points at a strictly greater index, so the decoder rebuilds the DAG in a
//! single backward pass.

use crc::{Crc, CRC_32_ISCSI};

mod decode;
mod encode;

pub use decode::{decode, decode_one};
pub use encode::{encode, encode_one};

/// Magic bytes identifying the generic container variant.
pub const BOC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];

pub(crate) const FLAG_HAS_INDEX: u8 = 0b1000_0000;
pub(crate) const FLAG_HAS_CHECKSUM: u8 = 0b0100_0000;
pub(crate) const FLAG_HAS_CACHE_BITS: u8 = 0b0010_0000;
pub(crate) const FLAG_RESERVED_MASK: u8 = 0b0001_1000;
pub(crate) const SIZE_BYTES_MASK: u8 = 0b0000_0111;

/// CRC32C (Castagnoli) over every byte preceding the 4-byte trailer.
pub(crate) const CRC_32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Container encoding switches. Both default to off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Emit the per-cell offset index for random access.
    pub with_index: bool,
    /// Append the CRC32C trailer.
    pub with_checksum: bool,
}

/// Minimal number of bytes (at least 1) able to represent `value`.
pub(crate) fn byte_width(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    ((bits + 7) / 8).max(1)
}

/// Append `value` as a `width`-byte big-endian integer.
pub(crate) fn write_be(out: &mut Vec<u8>, value: u64, width: usize) {
    out.extend_from_slice(&value.to_be_bytes()[8 - width..]);
}

/// Read a big-endian integer from a `width`-byte slice.
pub(crate) fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, &b| (acc << 8) | u64::from(b))
}
