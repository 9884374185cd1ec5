//! Node encoding: fold a group of siblings into one DAG-PB parent

use crate::core::error::{ArchiveError, Result};
use crate::core::identifier::{ContentKind, IdentifierCodec};
use crate::core::staging::{StagingBackend, StagingWriter};
use crate::core::tree::NodeTriple;
use crate::core::unixfs::{encode_file_node, FileLink};

/// Write a parent node for `children` and return its triple.
///
/// The parent links each child with its subtree size and records each
/// child's logical size in the UnixFS `blocksizes` list, in order. Groups of
/// fewer than two children are rejected; the tree builder never wraps a
/// single child.
pub fn fold_group<B: StagingBackend>(
    children: &[NodeTriple],
    staging: &mut StagingWriter<B>,
    codec: &IdentifierCodec,
) -> Result<NodeTriple> {
    if children.len() < 2 {
        return Err(ArchiveError::InvalidGroup(children.len()));
    }

    let links: Vec<FileLink> = children
        .iter()
        .map(|child| FileLink {
            cid: child.cid,
            tsize: child.subtree_size,
            logical_size: child.logical_size,
        })
        .collect();
    let encoded = encode_file_node(&links);
    let cid = codec.hash(&encoded, ContentKind::DagPb)?;

    let reservation = staging.reserve_record(encoded.len() as u64)?;
    staging.write_payload(&encoded)?;
    staging.patch_identifier(reservation, &cid)?;

    let logical_size = children.iter().map(|c| c.logical_size).sum();
    let subtree_size =
        children.iter().map(|c| c.subtree_size).sum::<u64>() + encoded.len() as u64;

    Ok(NodeTriple {
        cid,
        logical_size,
        subtree_size,
    })
}
