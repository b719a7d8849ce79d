//! Cell Trees and Bag-of-Cells Containers
//!
//! A cell is the atomic unit of a tree-shaped binary data model: up to 1023
//! bits of payload plus up to 4 ordered references to other cells, forming a
//! DAG with shared subtrees. Every cell carries a canonical SHA-256 content
//! hash that covers its payload and, recursively, its children — so a root
//! hash commits to an entire tree and can serve as a signable message.
//!
//! ## Features
//!
//! - **Bit-precise construction** via [`CellBuilder`] (MSB-first packing,
//!   capacity enforcement, state-preserving errors)
//! - **Canonical content hashes** computed once at assembly, memoized,
//!   recomputed on decode rather than trusted from input
//! - **Bag-of-Cells (BOC) container** encode/decode with deterministic
//!   topological ordering and byte-exact round-trips
//! - **Optional offset index** for random access and **CRC32C trailer**
//!   (Castagnoli, little-endian) for integrity framing
//! - **Ed25519 signing** over the 32-byte content hash
//!
//! ## Example
//!
//! ```rust
//! use cellbag::{begin_cell, boc, EncodeOptions};
//!
//! let leaf = {
//!     let mut b = begin_cell();
//!     b.store_uint(111, 63).unwrap();
//!     b.finalize().unwrap()
//! };
//! let root = {
//!     let mut b = begin_cell();
//!     b.store_uint(777, 63).unwrap();
//!     b.store_ref(leaf).unwrap();
//!     b.finalize().unwrap()
//! };
//!
//! let bytes = boc::encode_one(&root, EncodeOptions::default());
//! let decoded = boc::decode_one(&bytes).unwrap();
//! assert_eq!(decoded.hash(), root.hash());
//! ```
//!
//! ## Container layout
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Magic: b5 ee 9c 72                          │
//! │ Flags: index / checksum / field widths      │
//! ├─────────────────────────────────────────────┤
//! │ Counts: cells, roots, absent, total size    │
//! │ Root list (topological indices)             │
//! ├─────────────────────────────────────────────┤
//! │ Offset index (optional)                     │
//! │ Cell records: d1, d2, data, ref indices     │
//! ├─────────────────────────────────────────────┤
//! │ CRC32C trailer (optional)                   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Cells are serialized parents-first: every reference points at a strictly
//! greater index, so the decoder rebuilds the DAG in one backward pass with
//! every reference already assembled.

pub mod bits;
pub mod boc;
pub mod builder;
pub mod cell;
pub mod error;
pub mod signing;

// Re-export commonly used types
pub use bits::BitWriter;
pub use boc::{decode, decode_one, encode, encode_one, EncodeOptions, BOC_MAGIC};
pub use builder::{begin_cell, CellBuilder};
pub use cell::{Cell, CellType, HASH_BYTES, MAX_CELL_BITS, MAX_CELL_DEPTH, MAX_CELL_REFS};
pub use error::{CellError, Result};
pub use signing::{sign_message, verify_message};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
