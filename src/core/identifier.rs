//! Content identifiers (CIDv1 over sha2-256)
//!
//! Every block in the archive is addressed by a CIDv1:
//!
//! ```text
//! 0x01        CID version
//! 0x55 | 0x70 content type (raw leaf | dag-pb node)
//! 0x12        multihash code (sha2-256)
//! 0x20        digest length (32)
//! digest[32]
//! ```
//!
//! All three tags fit in a single varint byte, so every identifier this
//! crate produces is the same length. The staging area depends on that:
//! it reserves room for an identifier before the payload has been hashed.

use crate::core::error::{ArchiveError, Result};
use cid::Cid;
use multihash::Multihash;
use sha2::{Digest, Sha256};

/// Multihash code for sha2-256.
pub const SHA2_256: u64 = 0x12;

/// Digest length of sha2-256 in bytes.
pub const DIGEST_LEN: usize = 32;

/// Multicodec for raw leaf blocks.
pub const RAW_CODEC: u64 = 0x55;

/// Multicodec for DAG-PB structured nodes.
pub const DAG_PB_CODEC: u64 = 0x70;

/// What a block contains, which determines its CID codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// A chunk of the original input, stored verbatim
    Raw,
    /// A DAG-PB node linking to children
    DagPb,
}

impl ContentKind {
    pub fn codec(&self) -> u64 {
        match self {
            ContentKind::Raw => RAW_CODEC,
            ContentKind::DagPb => DAG_PB_CODEC,
        }
    }

    pub fn from_codec(codec: u64) -> Option<Self> {
        match codec {
            RAW_CODEC => Some(ContentKind::Raw),
            DAG_PB_CODEC => Some(ContentKind::DagPb),
            _ => None,
        }
    }
}

/// Builds identifiers and carries their fixed encoded length.
///
/// Construct once at setup with [`IdentifierCodec::new`]; the constructor
/// encodes a dummy digest under both content kinds and refuses to continue
/// if the lengths differ. The resulting codec is then handed to the staging
/// writer and both encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierCodec {
    encoded_len: usize,
}

impl IdentifierCodec {
    pub fn new() -> Result<Self> {
        let dummy = [0u8; DIGEST_LEN];
        let raw = make_identifier(&dummy, ContentKind::Raw)?.to_bytes().len();
        let node = make_identifier(&dummy, ContentKind::DagPb)?.to_bytes().len();

        if raw != node {
            return Err(ArchiveError::IdentifierLengthMismatch { raw, node });
        }

        Ok(Self { encoded_len: raw })
    }

    /// Encoded byte length shared by every identifier.
    pub fn encoded_len(&self) -> usize {
        self.encoded_len
    }

    /// Wrap a finished sha2-256 digest.
    pub fn identifier(&self, digest: &[u8], kind: ContentKind) -> Result<Cid> {
        let cid = make_identifier(digest, kind)?;
        let actual = cid.to_bytes().len();
        if actual != self.encoded_len {
            return Err(ArchiveError::IdentifierLength {
                expected: self.encoded_len,
                actual,
            });
        }
        Ok(cid)
    }

    /// Hash `data` and wrap the digest.
    pub fn hash(&self, data: &[u8], kind: ContentKind) -> Result<Cid> {
        self.identifier(&Sha256::digest(data), kind)
    }
}

/// Build a CIDv1 from a sha2-256 digest.
pub fn make_identifier(digest: &[u8], kind: ContentKind) -> Result<Cid> {
    if digest.len() != DIGEST_LEN {
        return Err(ArchiveError::InvalidConfig(format!(
            "sha2-256 digest must be {} bytes, got {}",
            DIGEST_LEN,
            digest.len()
        )));
    }
    let mh = Multihash::<64>::wrap(SHA2_256, digest)?;
    Ok(Cid::new_v1(kind.codec(), mh))
}

/// Check that `data` hashes to `cid`.
///
/// Only sha2-256 identifiers can be verified; anything else is rejected as
/// foreign to this archive format.
pub fn verify(cid: &Cid, data: &[u8]) -> Result<()> {
    let hash = cid.hash();
    if hash.code() != SHA2_256 {
        return Err(ArchiveError::InvalidArchive(format!(
            "unsupported multihash code {:#x} in {}",
            hash.code(),
            cid
        )));
    }
    if hash.digest() != Sha256::digest(data).as_slice() {
        return Err(ArchiveError::DigestMismatch { cid: *cid });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_length_is_invariant() {
        let codec = IdentifierCodec::new().unwrap();
        assert_eq!(codec.encoded_len(), 36);

        let digest = Sha256::digest(b"some block");
        let raw = codec.identifier(&digest, ContentKind::Raw).unwrap();
        let node = codec.identifier(&digest, ContentKind::DagPb).unwrap();
        assert_eq!(raw.to_bytes().len(), node.to_bytes().len());
    }

    #[test]
    fn test_binary_layout() {
        let digest = [0xAB; DIGEST_LEN];
        let bytes = make_identifier(&digest, ContentKind::Raw).unwrap().to_bytes();

        assert_eq!(&bytes[..4], &[0x01, 0x55, 0x12, 0x20]);
        assert_eq!(&bytes[4..], &digest);

        let bytes = make_identifier(&digest, ContentKind::DagPb).unwrap().to_bytes();
        assert_eq!(&bytes[..4], &[0x01, 0x70, 0x12, 0x20]);
    }

    #[test]
    fn test_rejects_wrong_digest_length() {
        assert!(make_identifier(&[0u8; 20], ContentKind::Raw).is_err());
    }

    #[test]
    fn test_empty_block_identifier() {
        let codec = IdentifierCodec::new().unwrap();
        let cid = codec.hash(b"", ContentKind::Raw).unwrap();
        assert_eq!(
            cid.to_string(),
            "bafkreihdwdcefgh4dqkjv67uzcmw7ojee6xedzdetojuzjevtenxquvyku"
        );
    }

    #[test]
    fn test_verify() {
        let codec = IdentifierCodec::new().unwrap();
        let cid = codec.hash(b"payload", ContentKind::Raw).unwrap();

        assert!(verify(&cid, b"payload").is_ok());
        assert!(matches!(
            verify(&cid, b"tampered"),
            Err(ArchiveError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn test_kind_codec_mapping() {
        assert_eq!(ContentKind::from_codec(0x55), Some(ContentKind::Raw));
        assert_eq!(ContentKind::from_codec(0x70), Some(ContentKind::DagPb));
        assert_eq!(ContentKind::from_codec(0x71), None);
    }
}
