//! # filecar - Streaming Single-File CAR Archiver
//!
//! `filecar` turns one regular file into a content-addressed CARv1 archive:
//!
//! - **Fixed-size chunking** into raw leaf blocks (1 MiB by default)
//! - **CIDv1 / sha2-256** identifiers for every block
//! - **Balanced UnixFS file DAG** with bounded fan-out (5 by default)
//! - **Streaming writes**: neither the input nor the tree is held in memory;
//!   records go to a staging file with reserve-then-patch identifiers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use filecar::{pack_file, PackConfig, Result};
//!
//! # fn main() -> Result<()> {
//! let summary = pack_file("video.mp4", "video.car", &PackConfig::default())?;
//! println!("root: {}", summary.root);
//! # Ok(())
//! # }
//! ```
//!
//! ## Reading Archives Back
//!
//! ```rust,no_run
//! use filecar::{extract, Result};
//! use std::fs::File;
//!
//! # fn main() -> Result<()> {
//! let mut out = File::create("video.copy.mp4")?;
//! let report = extract(File::open("video.car")?, &mut out)?;
//! assert_eq!(report.file_size, std::fs::metadata("video.mp4")?.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Archive Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ header: varint(len) {roots, version: 1}      │
//! ├──────────────────────────────────────────────┤
//! │ varint(len) cid raw-leaf-0                   │
//! │ ...                                          │
//! │ varint(len) cid raw-leaf-N                   │
//! ├──────────────────────────────────────────────┤
//! │ varint(len) cid dag-pb level-1 nodes         │
//! │ ...                                          │
//! │ varint(len) cid dag-pb root                  │
//! └──────────────────────────────────────────────┘
//! ```

pub mod core;

pub use crate::core::{
    archive::{finalize, CarHeader, CAR_VERSION},
    chunker::{chunk, BlockDescriptor, Chunker},
    config::{PackConfig, DEFAULT_BLOCK_SIZE, DEFAULT_COPY_BUFFER_SIZE, DEFAULT_FAN_OUT},
    error::{ArchiveError, Result},
    identifier::{make_identifier, ContentKind, IdentifierCodec},
    packer::{check_regular_file, pack_file, PackSummary, Packer},
    reader::{extract, verify_archive, BlockSet, CarReader, VerifyReport},
    staging::{FileStaging, MemoryStaging, Reservation, StagingBackend, StagingWriter},
    tree::{BuiltTree, NodeTriple, TreeBuilder},
};

/// Crate version, reported by the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
