//! Archive format internals
//!
//! - [`identifier`] - CIDv1 construction with a fixed encoded length
//! - [`chunker`] - fixed-size block layout of the input
//! - [`staging`] - reserve-then-patch record writer and its backends
//! - [`leaf`] - raw leaf encoding (copy + hash in one pass)
//! - [`unixfs`] - DAG-PB / UnixFS protobuf messages
//! - [`node`] - parent node encoding
//! - [`tree`] - level-by-level fold with bounded fan-out
//! - [`archive`] - CARv1 header and finalization
//! - [`reader`] - archive reading, verification and extraction
//! - [`packer`] - the end-to-end pipeline

pub mod archive;
pub mod chunker;
pub mod config;
pub mod error;
pub mod identifier;
pub mod leaf;
pub mod node;
pub mod packer;
pub mod reader;
pub mod staging;
pub mod tree;
pub mod unixfs;
pub mod varint;
