//! Property-based tests for chunking and tree shape
//!
//! Uses proptest to check the packing invariants over random inputs,
//! block sizes and fan-outs.

use filecar::core::unixfs::decode_file_node;
use filecar::{
    chunk, extract, BlockSet, CarReader, ContentKind, IdentifierCodec, PackConfig, Packer,
};
use proptest::prelude::*;
use std::io::Cursor;

fn pack(data: &[u8], block_size: u32, fan_out: usize) -> Vec<u8> {
    let config = PackConfig::default()
        .with_block_size(block_size)
        .with_fan_out(fan_out)
        .with_copy_buffer_size(13);
    let mut out = Vec::new();
    Packer::new(config).unwrap().pack_bytes(data, &mut out).unwrap();
    out
}

proptest! {
    #[test]
    fn prop_chunks_cover_input(total in 0u64..1_000_000, block_size in 1u32..70_000) {
        let blocks: Vec<_> = chunk(total, block_size).collect();

        prop_assert!(!blocks.is_empty());
        prop_assert_eq!(blocks.iter().map(|b| b.len).sum::<u64>(), total);

        // Every block but the last is full, and the last is never empty
        // unless the whole input is
        let (last, full) = blocks.split_last().unwrap();
        prop_assert!(full.iter().all(|b| b.len == block_size as u64));
        prop_assert!(last.len <= block_size as u64);
        prop_assert!(last.len > 0 || total == 0);
    }

    #[test]
    fn prop_roundtrip(
        data in prop::collection::vec(any::<u8>(), 0..4096),
        block_size in 1u32..300,
        fan_out in 2usize..8,
    ) {
        let archive = pack(&data, block_size, fan_out);

        let mut restored = Vec::new();
        let report = extract(Cursor::new(&archive), &mut restored).unwrap();
        prop_assert_eq!(&restored, &data);
        prop_assert_eq!(report.file_size, data.len() as u64);
        prop_assert_eq!(report.leaves, chunk(data.len() as u64, block_size).len() as u64);
    }

    #[test]
    fn prop_nodes_have_between_two_and_fan_out_links(
        len in 0usize..5_000,
        block_size in 1u32..200,
        fan_out in 2usize..12,
    ) {
        let data: Vec<u8> = (0..len).map(|i| (i * 7 % 256) as u8).collect();
        let archive = pack(&data, block_size, fan_out);

        for record in CarReader::new(Cursor::new(&archive)).unwrap() {
            let (cid, payload) = record.unwrap();
            if cid.codec() == ContentKind::DagPb.codec() {
                let node = decode_file_node(&payload).unwrap();
                prop_assert!(node.links.len() >= 2);
                prop_assert!(node.links.len() <= fan_out);
                prop_assert_eq!(
                    node.filesize,
                    node.links.iter().map(|l| l.logical_size).sum::<u64>()
                );
            }
        }
    }

    #[test]
    fn prop_single_block_root_is_raw_leaf(
        data in prop::collection::vec(any::<u8>(), 0..512),
        fan_out in 2usize..8,
    ) {
        let archive = pack(&data, 512, fan_out);
        let codec = IdentifierCodec::new().unwrap();

        let blocks = BlockSet::load(Cursor::new(&archive)).unwrap();
        prop_assert_eq!(*blocks.root(), codec.hash(&data, ContentKind::Raw).unwrap());
        prop_assert_eq!(CarReader::new(Cursor::new(&archive)).unwrap().count(), 1);
    }

    #[test]
    fn prop_records_are_leaves_then_nodes(
        len in 1usize..5_000,
        block_size in 1u32..100,
        fan_out in 2usize..6,
    ) {
        let data = vec![0x42u8; len];
        let archive = pack(&data, block_size, fan_out);
        let leaves = chunk(len as u64, block_size).len();

        let kinds: Vec<u64> = CarReader::new(Cursor::new(&archive))
            .unwrap()
            .map(|r| r.unwrap().0.codec())
            .collect();

        prop_assert!(kinds[..leaves].iter().all(|&k| k == ContentKind::Raw.codec()));
        prop_assert!(kinds[leaves..].iter().all(|&k| k == ContentKind::DagPb.codec()));

        // The root is the last record staged
        let reader = CarReader::new(Cursor::new(&archive)).unwrap();
        let root = reader.roots()[0];
        let last = reader.last().unwrap().unwrap().0;
        prop_assert_eq!(root, last);
    }
}
