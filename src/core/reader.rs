//! Reading, verifying and extracting archives

use crate::core::archive::CarHeader;
use crate::core::error::{ArchiveError, Result};
use crate::core::identifier::{self, ContentKind};
use crate::core::unixfs::decode_file_node;
use crate::core::varint;
use cid::Cid;
use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use tracing::debug;

/// Upper bound on the header body; a real header is well under 100 bytes.
const MAX_HEADER_LEN: u64 = 1 << 20;

/// Streaming reader over the records of a CAR archive.
pub struct CarReader<R: Read> {
    reader: R,
    header: CarHeader,
}

impl<R: Read> CarReader<R> {
    /// Parse the header and position the reader at the first record.
    pub fn new(mut reader: R) -> Result<Self> {
        let len = varint::read(&mut reader)?
            .ok_or_else(|| ArchiveError::InvalidArchive("empty archive".to_string()))?;
        if len == 0 || len > MAX_HEADER_LEN {
            return Err(ArchiveError::InvalidArchive(format!(
                "implausible header length {}",
                len
            )));
        }

        let mut body = vec![0u8; len as usize];
        reader.read_exact(&mut body).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => ArchiveError::InvalidArchive("truncated header".to_string()),
            _ => e.into(),
        })?;

        Ok(Self {
            reader,
            header: CarHeader::from_bytes(&body)?,
        })
    }

    pub fn header(&self) -> &CarHeader {
        &self.header
    }

    pub fn roots(&self) -> &[Cid] {
        &self.header.roots
    }

    /// Read the next record, or `None` at the end of the archive.
    ///
    /// The payload is returned as stored; use [`identifier::verify`] to check it.
    pub fn next_block(&mut self) -> Result<Option<(Cid, Vec<u8>)>> {
        let len = match varint::read(&mut self.reader)? {
            Some(len) => len,
            None => return Ok(None),
        };

        let mut record = (&mut self.reader).take(len);
        let cid = Cid::read_bytes(&mut record)?;
        let cid_len = cid.to_bytes().len() as u64;
        if cid_len > len {
            return Err(ArchiveError::InvalidArchive(format!(
                "record length {} shorter than its CID",
                len
            )));
        }

        let mut data = Vec::new();
        record.read_to_end(&mut data)?;
        if data.len() as u64 != len - cid_len {
            return Err(ArchiveError::InvalidArchive(format!(
                "truncated record for {}: expected {} payload bytes, found {}",
                cid,
                len - cid_len,
                data.len()
            )));
        }

        Ok(Some((cid, data)))
    }
}

impl<R: Read> Iterator for CarReader<R> {
    type Item = Result<(Cid, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_block().transpose()
    }
}

/// Outcome of [`verify_archive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub root: Cid,
    /// Length of the file the archive reconstructs
    pub file_size: u64,
    /// Records in the archive
    pub blocks: u64,
    /// Leaf positions in the file, counting repeated blocks each time
    pub leaves: u64,
    /// Distinct structured nodes reachable from the root
    pub nodes: u64,
    /// Longest root-to-leaf path in links; 0 when the root is a leaf
    pub depth: u32,
}

#[derive(Debug, Clone, Copy)]
struct SubtreeStats {
    logical_size: u64,
    subtree_size: u64,
    leaves: u64,
    depth: u32,
}

/// All blocks of an archive, hash-checked and keyed by CID.
///
/// Holds every payload in memory, so it suits verification and tests more
/// than multi-gigabyte archives.
pub struct BlockSet {
    root: Cid,
    blocks: HashMap<Cid, Vec<u8>>,
    records: u64,
}

impl BlockSet {
    /// Read every record of `reader`, verifying each digest.
    pub fn load<R: Read>(reader: R) -> Result<Self> {
        let mut car = CarReader::new(reader)?;
        let root = match car.roots() {
            [root] => *root,
            roots => {
                return Err(ArchiveError::InvalidArchive(format!(
                    "expected exactly one root, found {}",
                    roots.len()
                )))
            }
        };

        let mut blocks = HashMap::new();
        let mut records = 0u64;
        while let Some((cid, data)) = car.next_block()? {
            identifier::verify(&cid, &data)?;
            blocks.insert(cid, data);
            records += 1;
        }

        debug!(%root, records, distinct = blocks.len(), "loaded archive blocks");
        Ok(Self {
            root,
            blocks,
            records,
        })
    }

    pub fn root(&self) -> &Cid {
        &self.root
    }

    pub fn get(&self, cid: &Cid) -> Option<&[u8]> {
        self.blocks.get(cid).map(|b| b.as_slice())
    }

    fn block(&self, cid: &Cid) -> Result<&[u8]> {
        self.get(cid).ok_or(ArchiveError::MissingBlock(*cid))
    }

    fn kind(cid: &Cid) -> Result<ContentKind> {
        ContentKind::from_codec(cid.codec()).ok_or_else(|| {
            ArchiveError::InvalidArchive(format!("unsupported codec {:#x} in {}", cid.codec(), cid))
        })
    }

    /// Walk the DAG from the root and check every size claim in it.
    pub fn verify(&self) -> Result<VerifyReport> {
        let mut stats: HashMap<Cid, SubtreeStats> = HashMap::new();
        let mut stack: Vec<(Cid, bool)> = vec![(self.root, false)];

        while let Some((cid, children_done)) = stack.pop() {
            if stats.contains_key(&cid) {
                continue;
            }
            let data = self.block(&cid)?;

            match Self::kind(&cid)? {
                ContentKind::Raw => {
                    let len = data.len() as u64;
                    stats.insert(
                        cid,
                        SubtreeStats {
                            logical_size: len,
                            subtree_size: len,
                            leaves: 1,
                            depth: 0,
                        },
                    );
                }
                ContentKind::DagPb => {
                    let node = decode_file_node(data)?;
                    if !children_done {
                        stack.push((cid, true));
                        for link in node.links.iter().rev() {
                            if !stats.contains_key(&link.cid) {
                                stack.push((link.cid, false));
                            }
                        }
                        continue;
                    }

                    let mut total = SubtreeStats {
                        logical_size: 0,
                        subtree_size: data.len() as u64,
                        leaves: 0,
                        depth: 0,
                    };
                    for link in &node.links {
                        let child = stats
                            .get(&link.cid)
                            .copied()
                            .ok_or(ArchiveError::MissingBlock(link.cid))?;
                        if child.logical_size != link.logical_size {
                            return Err(ArchiveError::SizeMismatch {
                                cid: link.cid,
                                expected: link.logical_size,
                                actual: child.logical_size,
                            });
                        }
                        if child.subtree_size != link.tsize {
                            return Err(ArchiveError::SizeMismatch {
                                cid: link.cid,
                                expected: link.tsize,
                                actual: child.subtree_size,
                            });
                        }
                        total.logical_size += child.logical_size;
                        total.subtree_size += child.subtree_size;
                        total.leaves += child.leaves;
                        total.depth = total.depth.max(child.depth + 1);
                    }
                    if total.logical_size != node.filesize {
                        return Err(ArchiveError::SizeMismatch {
                            cid,
                            expected: node.filesize,
                            actual: total.logical_size,
                        });
                    }
                    stats.insert(cid, total);
                }
            }
        }

        let root = stats
            .get(&self.root)
            .copied()
            .ok_or(ArchiveError::MissingBlock(self.root))?;
        let nodes = stats
            .keys()
            .filter(|cid| cid.codec() == ContentKind::DagPb.codec())
            .count() as u64;

        Ok(VerifyReport {
            root: self.root,
            file_size: root.logical_size,
            blocks: self.records,
            leaves: root.leaves,
            nodes,
            depth: root.depth,
        })
    }

    /// Write the file bytes under the root to `out`, left to right.
    ///
    /// Call [`BlockSet::verify`] first; this walk trusts the size metadata.
    pub fn write_file<W: Write + ?Sized>(&self, out: &mut W) -> Result<u64> {
        let mut written = 0u64;
        let mut stack = vec![self.root];

        while let Some(cid) = stack.pop() {
            let data = self.block(&cid)?;
            match Self::kind(&cid)? {
                ContentKind::Raw => {
                    out.write_all(data)?;
                    written += data.len() as u64;
                }
                ContentKind::DagPb => {
                    let node = decode_file_node(data)?;
                    stack.extend(node.links.iter().rev().map(|l| l.cid));
                }
            }
        }

        out.flush()?;
        Ok(written)
    }
}

/// Check an archive end to end: digests, single root, links and sizes.
pub fn verify_archive<R: Read>(reader: R) -> Result<VerifyReport> {
    BlockSet::load(reader)?.verify()
}

/// Reconstruct the original file from an archive.
pub fn extract<R: Read, W: Write + ?Sized>(reader: R, out: &mut W) -> Result<VerifyReport> {
    let blocks = BlockSet::load(reader)?;
    let report = blocks.verify()?;
    let written = blocks.write_file(out)?;
    if written != report.file_size {
        return Err(ArchiveError::SizeMismatch {
            cid: report.root,
            expected: report.file_size,
            actual: written,
        });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::archive::finalize;
    use crate::core::identifier::IdentifierCodec;
    use crate::core::staging::{MemoryStaging, StagingWriter};
    use std::io::Cursor;

    fn single_block_archive(data: &[u8]) -> (Cid, Vec<u8>) {
        let codec = IdentifierCodec::new().unwrap();
        let mut staging = StagingWriter::new(MemoryStaging::new(), codec.encoded_len());
        let cid = codec.hash(data, ContentKind::Raw).unwrap();
        let r = staging.reserve_record(data.len() as u64).unwrap();
        staging.write_payload(data).unwrap();
        staging.patch_identifier(r, &cid).unwrap();

        let mut out = Vec::new();
        finalize(&cid, staging, &mut out).unwrap();
        (cid, out)
    }

    #[test]
    fn test_iterate_records() {
        let (cid, archive) = single_block_archive(b"hello car");
        let reader = CarReader::new(Cursor::new(archive)).unwrap();
        assert_eq!(reader.roots(), &[cid]);

        let blocks: Vec<_> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(blocks, vec![(cid, b"hello car".to_vec())]);
    }

    #[test]
    fn test_extract_single_leaf() {
        let (cid, archive) = single_block_archive(b"tiny");
        let mut out = Vec::new();
        let report = extract(Cursor::new(archive), &mut out).unwrap();

        assert_eq!(out, b"tiny");
        assert_eq!(report.root, cid);
        assert_eq!(report.depth, 0);
        assert_eq!(report.nodes, 0);
    }

    #[test]
    fn test_truncated_record() {
        let (_, mut archive) = single_block_archive(b"0123456789");
        archive.truncate(archive.len() - 3);
        assert!(matches!(
            verify_archive(Cursor::new(archive)),
            Err(ArchiveError::InvalidArchive(_))
        ));
    }

    #[test]
    fn test_tampered_payload() {
        let (_, mut archive) = single_block_archive(b"0123456789");
        let last = archive.len() - 1;
        archive[last] ^= 0xFF;
        assert!(matches!(
            verify_archive(Cursor::new(archive)),
            Err(ArchiveError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_input_is_not_an_archive() {
        assert!(CarReader::new(Cursor::new(Vec::new())).is_err());
    }
}
