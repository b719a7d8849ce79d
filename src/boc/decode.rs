//! Container parsing and validation
//!
//! Every structural claim the input makes is checked before it is used, and
//! each cell's hash and depth are recomputed rather than trusted, so a
//! corrupted payload with intact framing still surfaces as a hash mismatch
//! to callers comparing digests.

use super::{
    read_be, BOC_MAGIC, CRC_32C, FLAG_HAS_CACHE_BITS, FLAG_HAS_CHECKSUM, FLAG_HAS_INDEX,
    FLAG_RESERVED_MASK, SIZE_BYTES_MASK,
};
use crate::bits::bit_len_from_padded;
use crate::cell::{Cell, CellType, MAX_CELL_REFS};
use crate::error::{CellError, Result};
use std::sync::Arc;
use tracing::debug;

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.data.len() - self.pos < len {
            return Err(CellError::TruncatedData(format!(
                "need {} bytes at offset {}, {} available",
                len,
                self.pos,
                self.data.len() - self.pos
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_int(&mut self, width: usize) -> Result<u64> {
        Ok(read_be(self.take(width)?))
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

struct RawCell<'a> {
    data: &'a [u8],
    bit_len: usize,
    references: Vec<usize>,
    cell_type: CellType,
    level_mask: u8,
}

/// Parse a container, returning its roots in their original order.
pub fn decode(bytes: &[u8]) -> Result<Vec<Arc<Cell>>> {
    let mut reader = Reader::new(bytes);

    if reader.take(4)? != BOC_MAGIC {
        return Err(CellError::InvalidMagic);
    }

    let flags = reader.take(1)?[0];
    if flags & FLAG_RESERVED_MASK != 0 {
        return Err(CellError::MalformedHeader(
            "reserved flag bits set".to_string(),
        ));
    }
    if flags & FLAG_HAS_CACHE_BITS != 0 {
        return Err(CellError::MalformedHeader(
            "cache-bit containers are not supported".to_string(),
        ));
    }
    let has_index = flags & FLAG_HAS_INDEX != 0;
    let has_checksum = flags & FLAG_HAS_CHECKSUM != 0;
    let size_bytes = (flags & SIZE_BYTES_MASK) as usize;
    if size_bytes == 0 || size_bytes > 4 {
        return Err(CellError::MalformedHeader(format!(
            "invalid cell-count field width {}",
            size_bytes
        )));
    }
    let offset_bytes = reader.take(1)?[0] as usize;
    if offset_bytes == 0 || offset_bytes > 8 {
        return Err(CellError::MalformedHeader(format!(
            "invalid offset field width {}",
            offset_bytes
        )));
    }

    // The trailer covers everything before it, so it can be verified before
    // the payload is parsed.
    let body_end = if has_checksum {
        if bytes.len() < reader.pos + 4 {
            return Err(CellError::TruncatedData(
                "container too short for checksum trailer".to_string(),
            ));
        }
        let body_end = bytes.len() - 4;
        let trailer = &bytes[body_end..];
        let expected = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        if CRC_32C.checksum(&bytes[..body_end]) != expected {
            return Err(CellError::ChecksumMismatch);
        }
        body_end
    } else {
        bytes.len()
    };

    let cell_count = reader.read_int(size_bytes)? as usize;
    let root_count = reader.read_int(size_bytes)? as usize;
    let absent_count = reader.read_int(size_bytes)? as usize;
    let total_size = reader.read_int(offset_bytes)?;

    if root_count + absent_count > cell_count {
        return Err(CellError::MalformedHeader(format!(
            "{} roots + {} absent cells exceed {} cells",
            root_count, absent_count, cell_count
        )));
    }
    if absent_count != 0 {
        return Err(CellError::MalformedHeader(
            "absent cells are not supported".to_string(),
        ));
    }
    // every cell record occupies at least its two descriptor bytes, which
    // bounds allocations by the input length before anything is reserved
    if (cell_count as u64).saturating_mul(2) > total_size {
        return Err(CellError::MalformedHeader(format!(
            "{} cells cannot fit a {}-byte payload",
            cell_count, total_size
        )));
    }
    if reader.remaining() < root_count.saturating_mul(size_bytes) {
        return Err(CellError::TruncatedData(format!(
            "container too short for {} root indices",
            root_count
        )));
    }

    let mut root_indices = Vec::with_capacity(root_count);
    for _ in 0..root_count {
        let index = reader.read_int(size_bytes)? as usize;
        if index >= cell_count {
            return Err(CellError::MalformedHeader(format!(
                "root index {} out of range for {} cells",
                index, cell_count
            )));
        }
        root_indices.push(index);
    }

    if has_index {
        // Random-access table; a sequential pass does not need it.
        reader.take(cell_count.saturating_mul(offset_bytes))?;
    }

    match ((body_end - reader.pos) as u64).cmp(&total_size) {
        std::cmp::Ordering::Less => {
            return Err(CellError::TruncatedData(format!(
                "payload claims {} bytes, {} available",
                total_size,
                body_end - reader.pos
            )))
        }
        std::cmp::Ordering::Greater => {
            return Err(CellError::MalformedHeader(
                "unexpected bytes after payload".to_string(),
            ))
        }
        std::cmp::Ordering::Equal => {}
    }

    let payload_start = reader.pos;
    let mut raw_cells = Vec::with_capacity(cell_count);
    for i in 0..cell_count {
        raw_cells.push(parse_cell(&mut reader, i, cell_count, size_bytes)?);
    }
    if (reader.pos - payload_start) as u64 != total_size {
        return Err(CellError::MalformedHeader(format!(
            "payload size mismatch: header claims {} bytes, cells occupy {}",
            total_size,
            reader.pos - payload_start
        )));
    }

    // References only point forward, so building back-to-front resolves
    // every reference to an already-assembled cell.
    let mut cells: Vec<Option<Arc<Cell>>> = vec![None; cell_count];
    for (i, raw) in raw_cells.iter().enumerate().rev() {
        let mut references = Vec::with_capacity(raw.references.len());
        for &target in &raw.references {
            let cell = cells[target]
                .clone()
                .ok_or(CellError::CyclicOrForwardReference { from: i, to: target })?;
            references.push(cell);
        }
        let data = normalize_data(raw.data, raw.bit_len);
        cells[i] = Some(Cell::assemble(
            data,
            raw.bit_len,
            references,
            raw.cell_type,
            raw.level_mask,
        )?);
    }

    let mut roots = Vec::with_capacity(root_count);
    for index in root_indices {
        match cells[index].clone() {
            Some(cell) => roots.push(cell),
            None => {
                return Err(CellError::MalformedHeader(format!(
                    "root index {} was never assembled",
                    index
                )))
            }
        }
    }

    debug!("Decoded {} cells ({} roots)", cell_count, roots.len());
    Ok(roots)
}

/// Parse a single-root container.
pub fn decode_one(bytes: &[u8]) -> Result<Arc<Cell>> {
    let mut roots = decode(bytes)?;
    if roots.len() != 1 {
        return Err(CellError::MalformedHeader(format!(
            "expected a single root, found {}",
            roots.len()
        )));
    }
    Ok(roots.remove(0))
}

fn parse_cell<'a>(
    reader: &mut Reader<'a>,
    index: usize,
    cell_count: usize,
    size_bytes: usize,
) -> Result<RawCell<'a>> {
    let descriptors = reader.take(2)?;
    let (d1, d2) = (descriptors[0], descriptors[1]);

    let ref_count = (d1 & 0b0000_0111) as usize;
    if ref_count > MAX_CELL_REFS {
        return Err(CellError::MalformedHeader(format!(
            "cell {} claims {} references",
            index, ref_count
        )));
    }
    let exotic = d1 & 0b0000_1000 != 0;
    let level_mask = d1 >> 5;

    let byte_len = (d2 as usize + 1) / 2;
    let data = reader.take(byte_len)?;
    let bit_len = if d2 % 2 == 0 {
        byte_len * 8
    } else {
        match data.last().and_then(|&last| bit_len_from_padded(last, byte_len)) {
            Some(bit_len) => bit_len,
            None => {
                return Err(CellError::MalformedHeader(format!(
                    "cell {} is missing its completion tag",
                    index
                )))
            }
        }
    };

    let cell_type = CellType::from_wire(exotic, data)?;

    let mut references = Vec::with_capacity(ref_count);
    for _ in 0..ref_count {
        let target = reader.read_int(size_bytes)? as usize;
        if target >= cell_count {
            return Err(CellError::MalformedHeader(format!(
                "cell {} references cell {} of {}",
                index, target, cell_count
            )));
        }
        if target <= index {
            return Err(CellError::CyclicOrForwardReference {
                from: index,
                to: target,
            });
        }
        references.push(target);
    }

    Ok(RawCell {
        data,
        bit_len,
        references,
        cell_type,
        level_mask,
    })
}

/// Strip the completion tag so stored data keeps zero padding bits.
///
/// Also drops a final byte holding nothing but the tag, which non-canonical
/// encoders may emit for byte-aligned payloads.
fn normalize_data(data: &[u8], bit_len: usize) -> Vec<u8> {
    let mut out = data[..(bit_len + 7) / 8].to_vec();
    if bit_len % 8 != 0 {
        let last = out.len() - 1;
        out[last] &= 0xFFu8 << (8 - bit_len % 8);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boc::{encode, encode_one, EncodeOptions};
    use crate::builder::begin_cell;

    fn chain() -> Arc<Cell> {
        let mut cell = {
            let mut b = begin_cell();
            b.store_uint(111, 63).unwrap();
            b.finalize().unwrap()
        };
        for value in [772227u64, 333, 777] {
            let mut b = begin_cell();
            b.store_uint(value, 63).unwrap();
            b.store_ref(cell).unwrap();
            cell = b.finalize().unwrap();
        }
        cell
    }

    #[test]
    fn test_decode_chain_vector() {
        let bytes = hex::decode(
            "b5ee9c7201010401002b00010f000000000000061301010f000000000000029b\
             02010f000000000017910703000f00000000000000df",
        )
        .unwrap();
        let root = decode_one(&bytes).unwrap();
        assert_eq!(root.hash(), chain().hash());
        assert_eq!(root.depth(), 3);
        assert_eq!(root.bit_len(), 63);
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = encode_one(&chain(), EncodeOptions::default());
        bytes[0] = 0xDE;
        assert!(matches!(decode(&bytes), Err(CellError::InvalidMagic)));
    }

    #[test]
    fn test_truncated_input() {
        let bytes = encode_one(&chain(), EncodeOptions::default());
        for len in [0, 3, 5, 8, bytes.len() - 1] {
            assert!(
                matches!(decode(&bytes[..len]), Err(CellError::TruncatedData(_))),
                "length {}",
                len
            );
        }
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let mut bytes = encode_one(&chain(), EncodeOptions::default());
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(CellError::MalformedHeader(_))));
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut bytes = encode_one(
            &chain(),
            EncodeOptions {
                with_checksum: true,
                ..Default::default()
            },
        );
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(decode(&bytes), Err(CellError::ChecksumMismatch)));
    }

    #[test]
    fn test_reserved_flag_bits_rejected() {
        let mut bytes = encode_one(&chain(), EncodeOptions::default());
        bytes[4] |= 0b0001_0000;
        assert!(matches!(decode(&bytes), Err(CellError::MalformedHeader(_))));
    }

    #[test]
    fn test_backward_reference_rejected() {
        // 2 cells where cell 1 points back at cell 0
        let bytes = hex::decode("b5ee9c7201010201000600010001010000").unwrap();
        assert!(matches!(
            decode(&bytes),
            Err(CellError::CyclicOrForwardReference { from: 1, to: 0 })
        ));
    }

    #[test]
    fn test_self_reference_rejected() {
        // single cell referencing itself
        let bytes = hex::decode("b5ee9c7201010101000300010000").unwrap();
        assert!(matches!(
            decode(&bytes),
            Err(CellError::CyclicOrForwardReference { from: 0, to: 0 })
        ));
    }

    #[test]
    fn test_root_index_out_of_range() {
        let bytes = hex::decode("b5ee9c72010101010002050000").unwrap();
        assert!(matches!(decode(&bytes), Err(CellError::MalformedHeader(_))));
    }

    #[test]
    fn test_missing_completion_tag_rejected() {
        // one cell, d2 = 1 (partial byte) but data byte is zero
        let bytes = hex::decode("b5ee9c7201010101000300000100").unwrap();
        assert!(matches!(decode(&bytes), Err(CellError::MalformedHeader(_))));
    }

    #[test]
    fn test_round_trip_all_option_combinations() {
        let root = chain();
        for with_index in [false, true] {
            for with_checksum in [false, true] {
                let options = EncodeOptions {
                    with_index,
                    with_checksum,
                };
                let bytes = encode_one(&root, options);
                let decoded = decode(&bytes).unwrap();
                assert_eq!(decoded.len(), 1);
                assert_eq!(decoded[0].hash(), root.hash());
                assert_eq!(encode(&decoded, options), bytes, "options {:?}", options);
            }
        }
    }

    #[test]
    fn test_decode_one_rejects_multiple_roots() {
        let a = begin_cell().finalize().unwrap();
        let b = {
            let mut builder = begin_cell();
            builder.store_uint(1, 8).unwrap();
            builder.finalize().unwrap()
        };
        let bytes = encode(&[a, b], EncodeOptions::default());
        assert!(matches!(
            decode_one(&bytes),
            Err(CellError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_decode_empty_container() {
        let bytes = hex::decode("b5ee9c72010100000000").unwrap();
        assert!(decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_hashes_recomputed_not_trusted() {
        // corrupt one payload byte in a non-checksummed container: framing
        // stays valid, so decode succeeds but the root hash changes
        let root = chain();
        let mut bytes = encode_one(&root, EncodeOptions::default());
        let last = bytes.len() - 1;
        bytes[last] ^= 0x02;
        let decoded = decode_one(&bytes).unwrap();
        assert_ne!(decoded.hash(), root.hash());
    }
}
