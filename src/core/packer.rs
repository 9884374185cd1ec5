//! The packing pipeline
//!
//! ```text
//! source ──► Chunker ──► encode_leaf ──► TreeBuilder ──► finalize ──► archive
//!                           │                 │              ▲
//!                           └──── staging ◄───┘──────────────┘
//! ```
//!
//! Leaves and parents are streamed into the staging area as they are
//! produced. Only the header needs the root CID; it is written once the tree
//! is complete, ahead of a verbatim copy of the staging area.

use crate::core::archive::finalize;
use crate::core::chunker::Chunker;
use crate::core::config::PackConfig;
use crate::core::error::{ArchiveError, Result};
use crate::core::identifier::IdentifierCodec;
use crate::core::leaf::encode_leaf;
use crate::core::staging::{FileStaging, MemoryStaging, StagingBackend, StagingWriter};
use crate::core::tree::{BuiltTree, TreeBuilder};
use cid::Cid;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// What a packing run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackSummary {
    pub root: Cid,
    pub file_size: u64,
    pub leaf_count: u64,
    /// Internal nodes written
    pub node_count: u64,
    pub depth: u32,
    /// Bytes written to the output, header included
    pub archive_size: u64,
}

/// Validated configuration plus the identifier codec, ready to pack.
#[derive(Debug, Clone)]
pub struct Packer {
    config: PackConfig,
    codec: IdentifierCodec,
}

impl Packer {
    /// Validate `config` and check the identifier length invariant.
    pub fn new(config: PackConfig) -> Result<Self> {
        config.validate_config()?;
        let codec = IdentifierCodec::new()?;

        debug!(
            block_size = config.block_size,
            fan_out = config.fan_out,
            identifier_len = codec.encoded_len(),
            "packer configured"
        );
        Ok(Self { config, codec })
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    pub fn codec(&self) -> &IdentifierCodec {
        &self.codec
    }

    /// Chunk `size` bytes of `source` into leaves and fold them, writing
    /// every record into `staging`.
    pub fn stage<R, B>(
        &self,
        source: &mut R,
        size: u64,
        staging: &mut StagingWriter<B>,
    ) -> Result<BuiltTree>
    where
        R: Read + ?Sized,
        B: StagingBackend,
    {
        let chunker = Chunker::new(size, self.config.block_size);
        let mut tree = TreeBuilder::with_capacity(self.config.fan_out, chunker.len());
        let mut buf = vec![0u8; self.config.copy_buffer_size];

        for block in chunker {
            let leaf = encode_leaf(source, block.len, staging, &self.codec, &mut buf)?;
            tree.push_leaf(leaf);
        }
        debug!(leaves = tree.leaf_count(), staged = staging.len(), "leaves staged");

        tree.build(staging, &self.codec)
    }

    /// Pack using a caller-supplied staging backend.
    pub fn pack_with<R, B, W>(
        &self,
        source: &mut R,
        size: u64,
        backend: B,
        out: &mut W,
    ) -> Result<PackSummary>
    where
        R: Read + ?Sized,
        B: StagingBackend,
        W: Write + ?Sized,
    {
        let mut staging = StagingWriter::new(backend, self.codec.encoded_len());
        let tree = self.stage(source, size, &mut staging)?;
        let archive_size = finalize(&tree.root.cid, staging, out)?;

        let summary = PackSummary {
            root: tree.root.cid,
            file_size: tree.root.logical_size,
            leaf_count: tree.leaf_count,
            node_count: tree.node_count,
            depth: tree.depth,
            archive_size,
        };
        info!(
            root = %summary.root,
            file_size = summary.file_size,
            leaves = summary.leaf_count,
            nodes = summary.node_count,
            archive_size,
            "archive written"
        );
        Ok(summary)
    }

    /// Pack with a disk-backed staging file.
    pub fn pack<R, W>(&self, source: &mut R, size: u64, out: &mut W) -> Result<PackSummary>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        let backend = match &self.config.staging_dir {
            Some(dir) => FileStaging::new_in(dir)?,
            None => FileStaging::new()?,
        };
        self.pack_with(source, size, backend, out)
    }

    /// Pack an in-memory buffer with in-memory staging.
    pub fn pack_bytes<W: Write + ?Sized>(&self, data: &[u8], out: &mut W) -> Result<PackSummary> {
        let mut source = data;
        self.pack_with(&mut source, data.len() as u64, MemoryStaging::new(), out)
    }

    /// Pack the regular file at `input` into a new archive at `output`.
    ///
    /// The archive is written to a temp file beside `output` and renamed
    /// into place only after it is complete, so a failed run leaves no
    /// partial archive behind.
    pub fn pack_file<P, Q>(&self, input: P, output: Q) -> Result<PackSummary>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let input = input.as_ref();
        let output = output.as_ref();
        let size = check_regular_file(input)?;

        info!(input = %input.display(), output = %output.display(), size, "packing file");

        let mut source = File::open(input)?;
        let parent = match output.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;

        let summary = {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            let summary = self.pack(&mut source, size, &mut writer)?;
            writer.into_inner().map_err(|e| e.into_error())?;
            summary
        };

        tmp.as_file().sync_all()?;
        tmp.persist(output).map_err(|e| e.error)?;
        Ok(summary)
    }
}

/// Pack `input` into `output` with `config`.
pub fn pack_file<P, Q>(input: P, output: Q, config: &PackConfig) -> Result<PackSummary>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    Packer::new(config.clone())?.pack_file(input, output)
}

/// Reject anything but a regular file and return its size.
///
/// Symbolic links are rejected rather than followed.
pub fn check_regular_file(path: &Path) -> Result<u64> {
    let metadata = fs::symlink_metadata(path)?;
    let file_type = metadata.file_type();

    let kind = if file_type.is_dir() {
        "directory"
    } else if file_type.is_symlink() {
        "symbolic link"
    } else if !file_type.is_file() {
        "special file"
    } else {
        return Ok(metadata.len());
    };

    Err(ArchiveError::UnsupportedInput {
        path: path.to_path_buf(),
        kind,
    })
}
