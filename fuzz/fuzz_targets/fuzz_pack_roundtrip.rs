#![no_main]
use filecar::{extract, PackConfig, Packer};
use libfuzzer_sys::{arbitrary::Arbitrary, fuzz_target};
use std::io::Cursor;

#[derive(Debug, Arbitrary)]
struct PackInput {
    block_size: u16,
    fan_out: u8,
    data: Vec<u8>,
}

// Whatever the shape, packing then extracting returns the input
fuzz_target!(|input: PackInput| {
    let config = PackConfig::default()
        .with_block_size(u32::from(input.block_size).max(1))
        .with_fan_out(usize::from(input.fan_out).max(2));
    let packer = match Packer::new(config) {
        Ok(p) => p,
        Err(_) => return,
    };

    let mut archive = Vec::new();
    let summary = packer.pack_bytes(&input.data, &mut archive).unwrap();

    let mut restored = Vec::new();
    let report = extract(Cursor::new(&archive), &mut restored).unwrap();
    assert_eq!(restored, input.data);
    assert_eq!(report.root, summary.root);
});
