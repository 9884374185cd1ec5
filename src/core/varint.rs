//! Unsigned LEB128 varints used for CAR length prefixes

use crate::core::error::{ArchiveError, Result};
use std::io::{ErrorKind, Read};

/// Longest possible encoding of a u64.
pub const MAX_VARINT_LEN: usize = 10;

/// Append the varint encoding of `value` to `buf`.
pub fn encode(value: u64, buf: &mut Vec<u8>) {
    prost::encoding::encode_varint(value, buf);
}

/// Number of bytes `encode` will produce for `value`.
pub fn encoded_len(value: u64) -> usize {
    prost::encoding::encoded_len_varint(value)
}

/// Read one varint from a stream.
///
/// Returns `Ok(None)` when the stream is exhausted before the first byte,
/// which is how a CAR reader detects the end of the record sequence. A
/// stream that ends in the middle of a varint is an invalid archive.
pub fn read<R: Read>(reader: &mut R) -> Result<Option<u64>> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    let mut byte = [0u8; 1];

    for index in 0..MAX_VARINT_LEN {
        match reader.read_exact(&mut byte) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                if index == 0 {
                    return Ok(None);
                }
                return Err(ArchiveError::InvalidArchive(
                    "truncated varint".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        let payload = (byte[0] & 0x7F) as u64;
        if shift == 63 && payload > 1 {
            return Err(ArchiveError::InvalidArchive("varint overflow".to_string()));
        }
        value |= payload << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(Some(value));
        }
        shift += 7;
    }

    Err(ArchiveError::InvalidArchive("varint too long".to_string()))
}
