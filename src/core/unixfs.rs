//! DAG-PB and UnixFS protobuf messages
//!
//! Structured nodes are DAG-PB `PBNode`s whose `Data` field holds a UnixFS
//! `Data` message describing a chunked file:
//!
//! ```text
//! PBNode   { Links: [PBLink] = 2, Data: bytes = 1 }
//! PBLink   { Hash: bytes = 1, Name: string = 2, Tsize: uint64 = 3 }
//! Data     { Type = 1, Data = 2, filesize = 3, blocksizes = 4 (unpacked) }
//! ```

use crate::core::error::{ArchiveError, Result};
use cid::Cid;
use prost::Message;

/// UnixFS node type. Only `File` is produced by this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum DataType {
    Raw = 0,
    Directory = 1,
    File = 2,
    Metadata = 3,
    Symlink = 4,
    HamtShard = 5,
}

/// UnixFS `Data` message (proto2)
#[derive(Clone, PartialEq, Message)]
pub struct UnixfsData {
    #[prost(enumeration = "DataType", required, tag = "1")]
    pub r#type: i32,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub data: Option<Vec<u8>>,
    #[prost(uint64, optional, tag = "3")]
    pub filesize: Option<u64>,
    #[prost(uint64, repeated, packed = "false", tag = "4")]
    pub blocksizes: Vec<u64>,
}

/// DAG-PB link to a child block
#[derive(Clone, PartialEq, Message)]
pub struct PbLink {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub hash: Option<Vec<u8>>,
    #[prost(string, optional, tag = "2")]
    pub name: Option<String>,
    #[prost(uint64, optional, tag = "3")]
    pub tsize: Option<u64>,
}

/// DAG-PB node, used for decoding only; see [`encode_pb_node`].
#[derive(Clone, PartialEq, Message)]
pub struct PbNode {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub data: Option<Vec<u8>>,
    #[prost(message, repeated, tag = "2")]
    pub links: Vec<PbLink>,
}

/// A child reference inside a file node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLink {
    pub cid: Cid,
    /// Cumulative encoded size of the child's subtree
    pub tsize: u64,
    /// Bytes of the original file covered by the child
    pub logical_size: u64,
}

/// A decoded UnixFS file node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    pub links: Vec<FileLink>,
    pub filesize: u64,
}

/// Encode a PBNode in canonical DAG-PB field order.
///
/// DAG-PB requires all `Links` before `Data`. The derived encoder emits
/// fields in tag order (Data first), so the node is assembled by hand.
pub fn encode_pb_node(links: &[PbLink], data: Option<&[u8]>) -> Vec<u8> {
    let mut buf = Vec::new();
    for link in links {
        prost::encoding::message::encode(2, link, &mut buf);
    }
    if let Some(data) = data {
        prost::encoding::encode_key(1, prost::encoding::WireType::LengthDelimited, &mut buf);
        prost::encoding::encode_varint(data.len() as u64, &mut buf);
        buf.extend_from_slice(data);
    }
    buf
}

/// Serialize a UnixFS file node over `links`.
pub fn encode_file_node(links: &[FileLink]) -> Vec<u8> {
    let data = UnixfsData {
        r#type: DataType::File as i32,
        data: None,
        filesize: Some(links.iter().map(|l| l.logical_size).sum()),
        blocksizes: links.iter().map(|l| l.logical_size).collect(),
    };

    let pb_links: Vec<PbLink> = links
        .iter()
        .map(|l| PbLink {
            hash: Some(l.cid.to_bytes()),
            name: None,
            tsize: Some(l.tsize),
        })
        .collect();

    encode_pb_node(&pb_links, Some(&data.encode_to_vec()))
}

/// Decode a DAG-PB block into a UnixFS file node.
pub fn decode_file_node(bytes: &[u8]) -> Result<FileNode> {
    let node = PbNode::decode(bytes)?;
    let data = node
        .data
        .as_deref()
        .ok_or_else(|| ArchiveError::InvalidArchive("dag-pb node has no data".to_string()))?;
    let data = UnixfsData::decode(data)?;

    if data.r#type != DataType::File as i32 {
        return Err(ArchiveError::InvalidArchive(format!(
            "unsupported unixfs node type {}",
            data.r#type
        )));
    }
    if data.data.as_ref().is_some_and(|d| !d.is_empty()) {
        return Err(ArchiveError::InvalidArchive(
            "inline file data is not supported".to_string(),
        ));
    }
    if data.blocksizes.len() != node.links.len() {
        return Err(ArchiveError::InvalidArchive(format!(
            "{} links but {} blocksizes",
            node.links.len(),
            data.blocksizes.len()
        )));
    }

    let mut links = Vec::with_capacity(node.links.len());
    for (link, logical_size) in node.links.iter().zip(&data.blocksizes) {
        let hash = link
            .hash
            .as_deref()
            .ok_or_else(|| ArchiveError::InvalidArchive("link without hash".to_string()))?;
        links.push(FileLink {
            cid: Cid::try_from(hash)?,
            tsize: link.tsize.unwrap_or(0),
            logical_size: *logical_size,
        });
    }

    Ok(FileNode {
        links,
        filesize: data.filesize.unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identifier::{ContentKind, IdentifierCodec};

    fn link(payload: &[u8], logical_size: u64) -> FileLink {
        let codec = IdentifierCodec::new().unwrap();
        FileLink {
            cid: codec.hash(payload, ContentKind::Raw).unwrap(),
            tsize: logical_size,
            logical_size,
        }
    }

    #[test]
    fn test_links_precede_data() {
        let bytes = encode_file_node(&[link(b"a", 4), link(b"b", 2)]);
        // Field 2, length-delimited
        assert_eq!(bytes[0], 0x12);
        // PBLink: Hash (0x0a, 36 bytes) then Tsize (0x18)
        assert_eq!(bytes[1], 40);
        assert_eq!(bytes[2], 0x0A);
        assert_eq!(bytes[3], 36);
        assert_eq!(bytes[40], 0x18);
        assert_eq!(bytes[41], 4);

        let data_start = 2 * 42;
        assert_eq!(bytes[data_start], 0x0A);
    }

    #[test]
    fn test_unixfs_data_layout() {
        let data = UnixfsData {
            r#type: DataType::File as i32,
            data: None,
            filesize: Some(6),
            blocksizes: vec![4, 2],
        };
        assert_eq!(
            data.encode_to_vec(),
            vec![0x08, 0x02, 0x18, 0x06, 0x20, 0x04, 0x20, 0x02]
        );
    }

    #[test]
    fn test_decode_file_node() {
        let links = vec![link(b"a", 1024), link(b"b", 1024), link(b"c", 10)];
        let node = decode_file_node(&encode_file_node(&links)).unwrap();

        assert_eq!(node.filesize, 2058);
        assert_eq!(node.links, links);
    }

    #[test]
    fn test_decode_rejects_missing_data() {
        let bytes = encode_pb_node(&[], None);
        assert!(decode_file_node(&bytes).is_err());
    }

    #[test]
    fn test_decode_rejects_non_file() {
        let data = UnixfsData {
            r#type: DataType::Directory as i32,
            data: None,
            filesize: None,
            blocksizes: vec![],
        };
        let bytes = encode_pb_node(&[], Some(&data.encode_to_vec()));
        assert!(matches!(
            decode_file_node(&bytes),
            Err(ArchiveError::InvalidArchive(_))
        ));
    }
}
