use cid::Cid;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Unsupported input {path:?}: {kind} (only regular files can be packed)")]
    UnsupportedInput { path: PathBuf, kind: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source ended early: expected {expected} bytes, read {read}")]
    UnexpectedEof { expected: u64, read: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Identifier length mismatch: raw={raw} bytes, dag-pb={node} bytes")]
    IdentifierLengthMismatch { raw: usize, node: usize },

    #[error("Identifier is {actual} bytes, staging expects {expected}")]
    IdentifierLength { expected: usize, actual: usize },

    #[error("Record at offset {offset} was reserved but never patched")]
    UnpatchedRecord { offset: u64 },

    #[error("Cannot reserve a record while the record at offset {offset} is still open")]
    PendingReservation { offset: u64 },

    #[error("Payload written with no open record")]
    NoOpenRecord,

    #[error("Patch of {len} bytes at offset {offset} would extend staging past {end}")]
    PatchOutOfBounds { offset: u64, len: u64, end: u64 },

    #[error("Record payload length mismatch: reserved {expected} bytes, wrote {written}")]
    PayloadLengthMismatch { expected: u64, written: u64 },

    #[error("Cannot fold a group of {0} nodes (need at least 2)")]
    InvalidGroup(usize),

    #[error("Multihash error: {0}")]
    Multihash(#[from] multihash::Error),

    #[error("CID error: {0}")]
    Cid(#[from] cid::Error),

    #[error("Header encoding failed: {0}")]
    HeaderEncode(String),

    #[error("Header decoding failed: {0}")]
    HeaderDecode(String),

    #[error("Node decoding failed: {0}")]
    NodeDecode(#[from] prost::DecodeError),

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("Block digest does not match its CID {cid}")]
    DigestMismatch { cid: Cid },

    #[error("Block {0} referenced but not present in archive")]
    MissingBlock(Cid),

    #[error("Size mismatch for {cid}: expected {expected} bytes, found {actual}")]
    SizeMismatch { cid: Cid, expected: u64, actual: u64 },
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
