//! Staging area for serialized blocks
//!
//! Records are written as `varint(len(cid) + len(payload)) cid payload`.
//! A block's CID is only known once its payload has been hashed, so each
//! record is written in three steps:
//!
//! 1. [`StagingWriter::reserve_record`] writes the length prefix and a
//!    zero-filled identifier placeholder.
//! 2. [`StagingWriter::write_payload`] streams the payload after it.
//! 3. [`StagingWriter::patch_identifier`] overwrites the placeholder in place.
//!
//! Everything except the patch is an append. The patch is the only random
//! write and it never changes the length of the staged data, which is why all
//! identifiers must share one encoded length.

use crate::core::error::{ArchiveError, Result};
use crate::core::varint;
use cid::Cid;
use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::trace;

/// Byte storage behind a [`StagingWriter`].
///
/// Backends only need to append, overwrite already-written bytes, and hand
/// back their contents from the start.
pub trait StagingBackend {
    type Reader: std::io::Read;

    /// Append bytes at the end.
    fn append(&mut self, bytes: &[u8]) -> Result<()>;

    /// Overwrite `bytes.len()` bytes starting at `offset`.
    ///
    /// The range is already written; implementations must not grow.
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()>;

    /// Number of bytes appended so far.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush everything and return a reader positioned at byte 0.
    fn into_reader(self) -> Result<Self::Reader>;
}

/// Disk-backed staging in an anonymous temp file.
///
/// The file has no name on disk and disappears when dropped, so an
/// interrupted run leaves nothing behind.
pub struct FileStaging {
    file: BufWriter<File>,
    len: u64,
}

impl FileStaging {
    /// Create a staging file in the system temp directory
    pub fn new() -> Result<Self> {
        Ok(Self::from_file(tempfile::tempfile()?))
    }

    /// Create a staging file inside `dir`
    pub fn new_in<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Ok(Self::from_file(tempfile::tempfile_in(dir)?))
    }

    fn from_file(file: File) -> Self {
        FileStaging {
            file: BufWriter::new(file),
            len: 0,
        }
    }
}

impl StagingBackend for FileStaging {
    type Reader = File;

    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.file.write_all(bytes)?;
        self.len += bytes.len() as u64;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let end = offset + bytes.len() as u64;
        if end > self.len {
            return Err(ArchiveError::PatchOutOfBounds {
                offset,
                len: bytes.len() as u64,
                end: self.len,
            });
        }

        // BufWriter flushes pending appends before seeking.
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        self.file.seek(SeekFrom::Start(self.len))?;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn into_reader(self) -> Result<File> {
        let mut file = self.file.into_inner().map_err(|e| e.into_error())?;
        file.flush()?;
        file.seek(SeekFrom::Start(0))?;
        Ok(file)
    }
}

/// In-memory staging, for small inputs and tests.
#[derive(Debug, Default)]
pub struct MemoryStaging {
    buf: Vec<u8>,
}

impl MemoryStaging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl StagingBackend for MemoryStaging {
    type Reader = Cursor<Vec<u8>>;

    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let end = offset + bytes.len() as u64;
        if end > self.buf.len() as u64 {
            return Err(ArchiveError::PatchOutOfBounds {
                offset,
                len: bytes.len() as u64,
                end: self.buf.len() as u64,
            });
        }
        self.buf[offset as usize..end as usize].copy_from_slice(bytes);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.buf.len() as u64
    }

    fn into_reader(self) -> Result<Cursor<Vec<u8>>> {
        Ok(Cursor::new(self.buf))
    }
}

/// Handle for a reserved record, consumed by [`StagingWriter::patch_identifier`].
#[must_use = "a reserved record must be patched with its identifier"]
#[derive(Debug)]
pub struct Reservation {
    identifier_offset: u64,
    payload_len: u64,
}

impl Reservation {
    /// Absolute staging offset of the identifier placeholder
    pub fn identifier_offset(&self) -> u64 {
        self.identifier_offset
    }

    pub fn payload_len(&self) -> u64 {
        self.payload_len
    }
}

#[derive(Debug)]
struct OpenRecord {
    identifier_offset: u64,
    payload_len: u64,
    written: u64,
}

/// Append-only record writer with reserve-then-patch identifiers.
///
/// At most one record is open at a time. A record opened by
/// `reserve_record` must receive exactly its declared payload and then be
/// patched before the next record can be reserved or the writer finished.
pub struct StagingWriter<B: StagingBackend> {
    backend: B,
    identifier_len: usize,
    open: Option<OpenRecord>,
    records: u64,
}

impl<B: StagingBackend> StagingWriter<B> {
    pub fn new(backend: B, identifier_len: usize) -> Self {
        Self {
            backend,
            identifier_len,
            open: None,
            records: 0,
        }
    }

    /// Write a length prefix and identifier placeholder for a record whose
    /// payload is `payload_len` bytes.
    pub fn reserve_record(&mut self, payload_len: u64) -> Result<Reservation> {
        if let Some(open) = &self.open {
            return Err(ArchiveError::PendingReservation {
                offset: open.identifier_offset,
            });
        }

        let element_len = payload_len + self.identifier_len as u64;
        let mut prefix = Vec::with_capacity(varint::MAX_VARINT_LEN + self.identifier_len);
        varint::encode(element_len, &mut prefix);
        let identifier_offset = self.backend.len() + prefix.len() as u64;
        prefix.resize(prefix.len() + self.identifier_len, 0);

        self.backend.append(&prefix)?;
        self.open = Some(OpenRecord {
            identifier_offset,
            payload_len,
            written: 0,
        });

        trace!(identifier_offset, payload_len, "reserved record");
        Ok(Reservation {
            identifier_offset,
            payload_len,
        })
    }

    /// Append payload bytes to the open record. May be called repeatedly.
    pub fn write_payload(&mut self, bytes: &[u8]) -> Result<()> {
        let open = self.open.as_mut().ok_or(ArchiveError::NoOpenRecord)?;
        let written = open.written + bytes.len() as u64;
        if written > open.payload_len {
            return Err(ArchiveError::PayloadLengthMismatch {
                expected: open.payload_len,
                written,
            });
        }

        self.backend.append(bytes)?;
        open.written = written;
        Ok(())
    }

    /// Overwrite the placeholder of the open record with its identifier.
    pub fn patch_identifier(&mut self, reservation: Reservation, cid: &Cid) -> Result<()> {
        let open = match &self.open {
            Some(open) if open.identifier_offset == reservation.identifier_offset => open,
            _ => return Err(ArchiveError::NoOpenRecord),
        };
        if open.written != open.payload_len {
            return Err(ArchiveError::PayloadLengthMismatch {
                expected: open.payload_len,
                written: open.written,
            });
        }

        let bytes = cid.to_bytes();
        if bytes.len() != self.identifier_len {
            return Err(ArchiveError::IdentifierLength {
                expected: self.identifier_len,
                actual: bytes.len(),
            });
        }

        self.backend.write_at(reservation.identifier_offset, &bytes)?;
        self.open = None;
        self.records += 1;

        trace!(offset = reservation.identifier_offset, %cid, "patched identifier");
        Ok(())
    }

    /// Bytes staged so far.
    pub fn len(&self) -> u64 {
        self.backend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backend.is_empty()
    }

    /// Number of completed records.
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn identifier_len(&self) -> usize {
        self.identifier_len
    }

    /// Close the writer and hand back the backend.
    ///
    /// Fails if a record is still waiting for its identifier.
    pub fn finish(self) -> Result<B> {
        if let Some(open) = self.open {
            return Err(ArchiveError::UnpatchedRecord {
                offset: open.identifier_offset,
            });
        }
        Ok(self.backend)
    }
}
