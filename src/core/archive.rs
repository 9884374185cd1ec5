//! CARv1 header and archive finalization
//!
//! ```text
//! archive := varint(len(header)) header record*
//! header  := dag-cbor { "roots": [cid], "version": 1 }
//! record  := varint(len(cid) + len(payload)) cid payload
//! ```
//!
//! The records are already laid out in the staging area, so finalizing is
//! writing the header and copying staged bytes behind it verbatim.

use crate::core::error::{ArchiveError, Result};
use crate::core::staging::{StagingBackend, StagingWriter};
use crate::core::varint;
use cid::Cid;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use tracing::debug;

/// CAR format version written in every header
pub const CAR_VERSION: u64 = 1;

/// CAR header. Field order is the canonical DAG-CBOR key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarHeader {
    pub roots: Vec<Cid>,
    pub version: u64,
}

impl CarHeader {
    /// Header for an archive with a single root
    pub fn new(root: Cid) -> Self {
        Self {
            roots: vec![root],
            version: CAR_VERSION,
        }
    }

    /// Serialize to DAG-CBOR, without the length prefix
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_ipld_dagcbor::to_vec(self).map_err(|e| ArchiveError::HeaderEncode(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header: CarHeader = serde_ipld_dagcbor::from_slice(bytes)
            .map_err(|e| ArchiveError::HeaderDecode(e.to_string()))?;
        if header.version != CAR_VERSION {
            return Err(ArchiveError::HeaderDecode(format!(
                "unsupported CAR version {}",
                header.version
            )));
        }
        Ok(header)
    }

    /// Serialize with the varint length prefix
    pub fn to_framed_bytes(&self) -> Result<Vec<u8>> {
        let body = self.to_bytes()?;
        let mut framed = Vec::with_capacity(varint::MAX_VARINT_LEN + body.len());
        varint::encode(body.len() as u64, &mut framed);
        framed.extend_from_slice(&body);
        Ok(framed)
    }
}

/// Write the header for `root` followed by every staged record.
///
/// Consumes the staging writer; it is dropped (and its storage released)
/// once the copy succeeds. Returns the number of bytes written to `out`.
pub fn finalize<B, W>(root: &Cid, staging: StagingWriter<B>, out: &mut W) -> Result<u64>
where
    B: StagingBackend,
    W: Write + ?Sized,
{
    let header = CarHeader::new(*root).to_framed_bytes()?;
    let backend = staging.finish()?;
    let staged_len = backend.len();

    out.write_all(&header)?;
    let mut reader = backend.into_reader()?;
    let copied = io::copy(&mut reader, out)?;
    if copied != staged_len {
        return Err(ArchiveError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("staged {} bytes but copied {}", staged_len, copied),
        )));
    }
    out.flush()?;

    debug!(header_len = header.len(), staged_len, "archive finalized");
    Ok(header.len() as u64 + copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identifier::{ContentKind, IdentifierCodec};
    use crate::core::staging::MemoryStaging;

    #[test]
    fn test_header_cbor_layout() {
        let codec = IdentifierCodec::new().unwrap();
        let root = codec.hash(b"", ContentKind::Raw).unwrap();
        let bytes = CarHeader::new(root).to_bytes().unwrap();

        // map(2), "roots"
        assert_eq!(bytes[0], 0xA2);
        assert_eq!(&bytes[1..7], b"\x65roots");
        // array(1), tag(42), bytes(37) with the identity multibase prefix
        assert_eq!(&bytes[7..10], &[0x81, 0xD8, 0x2A]);
        assert_eq!(&bytes[10..12], &[0x58, 37]);
        assert_eq!(bytes[12], 0x00);
        assert_eq!(&bytes[13..49], root.to_bytes().as_slice());
        // "version": 1
        assert_eq!(&bytes[49..], b"\x67version\x01");
    }

    #[test]
    fn test_header_roundtrip() {
        let codec = IdentifierCodec::new().unwrap();
        let root = codec.hash(b"root", ContentKind::DagPb).unwrap();
        let header = CarHeader::new(root);

        let decoded = CarHeader::from_bytes(&header.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_rejects_other_versions() {
        let codec = IdentifierCodec::new().unwrap();
        let root = codec.hash(b"root", ContentKind::Raw).unwrap();
        let header = CarHeader {
            roots: vec![root],
            version: 2,
        };
        assert!(CarHeader::from_bytes(&header.to_bytes().unwrap()).is_err());
    }

    #[test]
    fn test_finalize_appends_staged_records() {
        let codec = IdentifierCodec::new().unwrap();
        let mut staging = StagingWriter::new(MemoryStaging::new(), codec.encoded_len());
        let cid = codec.hash(b"data", ContentKind::Raw).unwrap();
        let r = staging.reserve_record(4).unwrap();
        staging.write_payload(b"data").unwrap();
        staging.patch_identifier(r, &cid).unwrap();
        let staged_len = staging.len();

        let mut out = Vec::new();
        let written = finalize(&cid, staging, &mut out).unwrap();

        let header = CarHeader::new(cid).to_framed_bytes().unwrap();
        assert_eq!(written, out.len() as u64);
        assert_eq!(out.len() as u64, header.len() as u64 + staged_len);
        assert_eq!(&out[..header.len()], header.as_slice());
        assert_eq!(&out[out.len() - 4..], b"data");
    }

    #[test]
    fn test_finalize_refuses_unpatched_staging() {
        let codec = IdentifierCodec::new().unwrap();
        let mut staging = StagingWriter::new(MemoryStaging::new(), codec.encoded_len());
        let cid = codec.hash(b"data", ContentKind::Raw).unwrap();
        let _pending = staging.reserve_record(4).unwrap();

        let mut out = Vec::new();
        assert!(finalize(&cid, staging, &mut out).is_err());
        assert!(out.is_empty());
    }
}
