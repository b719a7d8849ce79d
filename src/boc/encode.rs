//! Container serialization

use super::{
    byte_width, write_be, EncodeOptions, BOC_MAGIC, CRC_32C, FLAG_HAS_CHECKSUM, FLAG_HAS_INDEX,
};
use crate::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Serialize the DAG reachable from `roots` into a container.
///
/// Deterministic: the same roots with the same options always produce the
/// same bytes, so decode-then-re-encode round-trips byte-exactly.
pub fn encode(roots: &[Arc<Cell>], options: EncodeOptions) -> Vec<u8> {
    let order = topological_order(roots);
    let index: HashMap<*const Cell, u64> = order
        .iter()
        .enumerate()
        .map(|(i, cell)| (Arc::as_ptr(cell), i as u64))
        .collect();

    let size_bytes = byte_width(order.len() as u64);

    let mut payload = Vec::new();
    let mut offsets = Vec::with_capacity(order.len());
    for cell in &order {
        let (d1, d2) = cell.descriptors();
        payload.push(d1);
        payload.push(d2);
        payload.extend_from_slice(&cell.padded_data());
        for reference in cell.references() {
            write_be(&mut payload, index[&Arc::as_ptr(reference)], size_bytes);
        }
        offsets.push(payload.len() as u64);
    }

    let total_size = payload.len() as u64;
    let offset_bytes = byte_width(total_size);

    let mut out = Vec::with_capacity(payload.len() + 32);
    out.extend_from_slice(&BOC_MAGIC);
    let mut flags = size_bytes as u8;
    if options.with_index {
        flags |= FLAG_HAS_INDEX;
    }
    if options.with_checksum {
        flags |= FLAG_HAS_CHECKSUM;
    }
    out.push(flags);
    out.push(offset_bytes as u8);
    write_be(&mut out, order.len() as u64, size_bytes);
    write_be(&mut out, roots.len() as u64, size_bytes);
    write_be(&mut out, 0, size_bytes); // absent cells unsupported
    write_be(&mut out, total_size, offset_bytes);
    for root in roots {
        write_be(&mut out, index[&Arc::as_ptr(root)], size_bytes);
    }
    if options.with_index {
        for offset in &offsets {
            write_be(&mut out, *offset, offset_bytes);
        }
    }
    out.extend_from_slice(&payload);
    if options.with_checksum {
        let checksum = CRC_32C.checksum(&out);
        out.extend_from_slice(&checksum.to_le_bytes());
    }

    debug!(
        "Encoded {} cells ({} roots) into {} bytes",
        order.len(),
        roots.len(),
        out.len()
    );
    out
}

/// Serialize a single-root DAG.
pub fn encode_one(root: &Arc<Cell>, options: EncodeOptions) -> Vec<u8> {
    encode(std::slice::from_ref(root), options)
}

/// Order the reachable set so parents strictly precede children: iterative
/// depth-first walk from each root in turn, post-order reversed.
///
/// Deduplicates by `Arc` identity, so a cell shared by several parents
/// appears once and serialization stays linear in the unique-cell count.
fn topological_order(roots: &[Arc<Cell>]) -> Vec<Arc<Cell>> {
    let mut order: Vec<Arc<Cell>> = Vec::new();
    let mut finished: HashSet<*const Cell> = HashSet::new();
    let mut stack: Vec<(Arc<Cell>, bool)> = Vec::new();

    for root in roots {
        stack.push((root.clone(), false));
        while let Some((cell, expanded)) = stack.pop() {
            let ptr = Arc::as_ptr(&cell);
            if expanded {
                if finished.insert(ptr) {
                    order.push(cell);
                }
                continue;
            }
            if finished.contains(&ptr) {
                continue;
            }
            stack.push((cell.clone(), true));
            for reference in cell.references().iter().rev() {
                if !finished.contains(&Arc::as_ptr(reference)) {
                    stack.push((reference.clone(), false));
                }
            }
        }
    }

    order.reverse();
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{begin_cell, CellBuilder};

    fn uint_cell(value: u64, width: usize) -> Arc<Cell> {
        let mut b = begin_cell();
        b.store_uint(value, width).unwrap();
        b.finalize().unwrap()
    }

    fn chain() -> Arc<Cell> {
        let cc1 = uint_cell(111, 63);
        let mut b = begin_cell();
        b.store_uint(772227, 63).unwrap();
        b.store_ref(cc1).unwrap();
        let cc2 = b.finalize().unwrap();
        let mut b = begin_cell();
        b.store_uint(333, 63).unwrap();
        b.store_ref(cc2).unwrap();
        let cc3 = b.finalize().unwrap();
        let mut b = begin_cell();
        b.store_uint(777, 63).unwrap();
        b.store_ref(cc3).unwrap();
        b.finalize().unwrap()
    }

    #[test]
    fn test_empty_cell_container_vector() {
        let cell = CellBuilder::new().finalize().unwrap();
        let bytes = encode_one(&cell, EncodeOptions::default());
        assert_eq!(hex::encode(bytes), "b5ee9c72010101010002000000");
    }

    #[test]
    fn test_empty_cell_container_with_checksum_vector() {
        let cell = CellBuilder::new().finalize().unwrap();
        let bytes = encode_one(
            &cell,
            EncodeOptions {
                with_checksum: true,
                ..Default::default()
            },
        );
        assert_eq!(hex::encode(bytes), "b5ee9c724101010100020000004cacb9cd");
    }

    #[test]
    fn test_chain_container_vector() {
        let bytes = encode_one(&chain(), EncodeOptions::default());
        assert_eq!(
            hex::encode(bytes),
            "b5ee9c7201010401002b00010f000000000000061301010f000000000000029b\
             02010f000000000017910703000f00000000000000df"
        );
    }

    #[test]
    fn test_chain_container_flag_combinations() {
        let root = chain();
        let plain = encode_one(&root, EncodeOptions::default());
        let with_crc = encode_one(
            &root,
            EncodeOptions {
                with_checksum: true,
                ..Default::default()
            },
        );
        let with_index = encode_one(
            &root,
            EncodeOptions {
                with_index: true,
                ..Default::default()
            },
        );
        let with_both = encode_one(
            &root,
            EncodeOptions {
                with_index: true,
                with_checksum: true,
            },
        );

        // checksum variant = flags bit + 4-byte trailer over the body
        assert_eq!(with_crc.len(), plain.len() + 4);
        assert_eq!(with_crc[4], plain[4] | FLAG_HAS_CHECKSUM);
        assert_eq!(hex::encode(&with_crc[with_crc.len() - 4..]), "71dae7b7");
        // index variant = flags bit + 4 one-byte cumulative offsets
        assert_eq!(with_index.len(), plain.len() + 4);
        assert_eq!(with_index[4], plain[4] | FLAG_HAS_INDEX);
        assert_eq!(&with_index[11..15], &[0x0b, 0x16, 0x21, 0x2b]);
        assert_eq!(hex::encode(&with_both[with_both.len() - 4..]), "d11e579e");
    }

    #[test]
    fn test_shared_subtree_serialized_once() {
        let shared = uint_cell(7, 16);
        let left = {
            let mut b = begin_cell();
            b.store_ref(shared.clone()).unwrap();
            b.finalize().unwrap()
        };
        let right = {
            let mut b = begin_cell();
            b.store_ref(shared.clone()).unwrap();
            b.finalize().unwrap()
        };
        let mut b = begin_cell();
        b.store_ref(left).unwrap();
        b.store_ref(right).unwrap();
        let root = b.finalize().unwrap();

        let order = topological_order(std::slice::from_ref(&root));
        // root, two parents, one shared leaf
        assert_eq!(order.len(), 4);
        assert!(Arc::ptr_eq(&order[0], &root));
        assert!(Arc::ptr_eq(order.last().unwrap(), &shared));
    }

    #[test]
    fn test_order_references_strictly_forward() {
        let root = chain();
        let order = topological_order(std::slice::from_ref(&root));
        let index: HashMap<*const Cell, usize> = order
            .iter()
            .enumerate()
            .map(|(i, c)| (Arc::as_ptr(c), i))
            .collect();
        for (i, cell) in order.iter().enumerate() {
            for reference in cell.references() {
                assert!(index[&Arc::as_ptr(reference)] > i);
            }
        }
    }

    #[test]
    fn test_repeated_reference_to_same_cell() {
        let leaf = uint_cell(1, 8);
        let mut b = begin_cell();
        b.store_ref(leaf.clone()).unwrap();
        b.store_ref(leaf.clone()).unwrap();
        let root = b.finalize().unwrap();

        let order = topological_order(std::slice::from_ref(&root));
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let a = encode_one(&chain(), EncodeOptions::default());
        let b = encode_one(&chain(), EncodeOptions::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_encode_empty_root_list() {
        let bytes = encode(&[], EncodeOptions::default());
        // magic, size=1, offset=1, 0 cells, 0 roots, 0 absent, 0 total
        assert_eq!(hex::encode(bytes), "b5ee9c72010100000000");
    }
}
