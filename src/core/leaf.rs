//! Leaf encoding: one input block becomes one raw record

use crate::core::error::{ArchiveError, Result};
use crate::core::identifier::{ContentKind, IdentifierCodec};
use crate::core::staging::{StagingBackend, StagingWriter};
use crate::core::tree::NodeTriple;
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Read};

/// Copy exactly `len` bytes of `source` into a new raw record.
///
/// The bytes pass through `buf` once: each read is hashed and appended to
/// the staging area before the next read. The placeholder is patched with
/// the raw-block CID when the block is complete.
pub fn encode_leaf<R, B>(
    source: &mut R,
    len: u64,
    staging: &mut StagingWriter<B>,
    codec: &IdentifierCodec,
    buf: &mut [u8],
) -> Result<NodeTriple>
where
    R: Read + ?Sized,
    B: StagingBackend,
{
    let reservation = staging.reserve_record(len)?;
    let mut hasher = Sha256::new();
    let mut copied: u64 = 0;

    while copied < len {
        let want = (len - copied).min(buf.len() as u64) as usize;
        let n = match source.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(ArchiveError::UnexpectedEof {
                    expected: len,
                    read: copied,
                })
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        hasher.update(&buf[..n]);
        staging.write_payload(&buf[..n])?;
        copied += n as u64;
    }

    let cid = codec.identifier(&hasher.finalize(), ContentKind::Raw)?;
    staging.patch_identifier(reservation, &cid)?;

    Ok(NodeTriple::leaf(cid, len))
}
