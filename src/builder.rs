//! Incremental cell construction
//!
//! A builder accumulates typed values into a bit buffer and collects child
//! references, then assembles an immutable [`Cell`]. Every store operation
//! validates before it mutates, so a failed call leaves the builder exactly
//! as it was. `finalize` consumes the builder; reuse after it is a compile
//! error, not a runtime one.

use crate::bits::BitWriter;
use crate::cell::{Cell, CellType, MAX_CELL_BITS, MAX_CELL_REFS};
use crate::error::{CellError, Result};
use std::sync::Arc;

/// Start building a cell.
///
/// Convenience alias for [`CellBuilder::new`].
pub fn begin_cell() -> CellBuilder {
    CellBuilder::new()
}

/// Mutable accumulator for one cell's payload bits and references.
#[derive(Debug, Clone)]
pub struct CellBuilder {
    bits: BitWriter,
    references: Vec<Arc<Cell>>,
}

impl CellBuilder {
    pub fn new() -> Self {
        CellBuilder {
            bits: BitWriter::with_capacity(MAX_CELL_BITS),
            references: Vec::new(),
        }
    }

    /// Bits stored so far.
    pub fn bits_used(&self) -> usize {
        self.bits.bit_len()
    }

    /// Bits still available.
    pub fn bits_left(&self) -> usize {
        self.bits.remaining()
    }

    /// References stored so far.
    pub fn refs_used(&self) -> usize {
        self.references.len()
    }

    /// Reference slots still available.
    pub fn refs_left(&self) -> usize {
        MAX_CELL_REFS - self.references.len()
    }

    /// Store `value` as a big-endian unsigned integer of `width` bits.
    ///
    /// Fails with `ValueOutOfRange` if the value needs more than `width`
    /// bits, or `CapacityExceeded` if the cell's bit budget would overflow.
    pub fn store_uint(&mut self, value: u64, width: usize) -> Result<&mut Self> {
        if width < 64 && value >> width != 0 {
            return Err(CellError::ValueOutOfRange { value, bits: width });
        }
        self.bits.append_bits(value, width)?;
        Ok(self)
    }

    /// Store a single bit.
    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self> {
        self.bits.append_bits(u64::from(bit), 1)?;
        Ok(self)
    }

    /// Store whole bytes.
    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.bits.append_raw(bytes, bytes.len() * 8)?;
        Ok(self)
    }

    /// Store the first `width` bits of `bytes`, MSB-first.
    ///
    /// Bits past the end of the slice are taken as zero.
    pub fn store_bits(&mut self, bytes: &[u8], width: usize) -> Result<&mut Self> {
        self.bits.append_raw(bytes, width)?;
        Ok(self)
    }

    /// Store a reference to an already-assembled cell.
    ///
    /// The referenced cell's payload is not copied; the reference is shared.
    pub fn store_ref(&mut self, cell: Arc<Cell>) -> Result<&mut Self> {
        if self.references.len() == MAX_CELL_REFS {
            return Err(CellError::TooManyReferences);
        }
        self.references.push(cell);
        Ok(self)
    }

    /// Append another cell's payload bits and references inline.
    pub fn store_cell(&mut self, cell: &Cell) -> Result<&mut Self> {
        if cell.bit_len() > self.bits.remaining() {
            return Err(CellError::CapacityExceeded {
                requested: cell.bit_len(),
                available: self.bits.remaining(),
            });
        }
        if self.references.len() + cell.references().len() > MAX_CELL_REFS {
            return Err(CellError::TooManyReferences);
        }
        self.bits.append_raw(cell.data(), cell.bit_len())?;
        self.references.extend_from_slice(cell.references());
        Ok(self)
    }

    /// Assemble the immutable cell, computing its depth and content hash.
    ///
    /// Consumes the builder. Fails with `DepthExceeded` if a reference chain
    /// would overflow the 2-byte depth field.
    pub fn finalize(self) -> Result<Arc<Cell>> {
        let (data, bit_len) = self.bits.into_parts();
        Cell::assemble(data, bit_len, self.references, CellType::Ordinary, 0)
    }
}

impl Default for CellBuilder {
    fn default() -> Self {
        Self::new()
    }
}
