#![no_main]
use filecar::{extract, CarReader};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

// Arbitrary bytes must never panic the reader, only produce errors
fuzz_target!(|data: &[u8]| {
    if let Ok(reader) = CarReader::new(Cursor::new(data)) {
        for record in reader {
            if record.is_err() {
                break;
            }
        }
    }

    let mut out = Vec::new();
    let _ = extract(Cursor::new(data), &mut out);
});
