//! Bottom-up tree assembly with bounded fan-out
//!
//! Leaves are folded level by level. Each level is cut from the left into
//! groups of `fan_out`; every group of two or more becomes a parent in the
//! next level. A trailing group of exactly one is carried into the next
//! level unchanged instead of being wrapped in a single-child node, so it
//! joins parents built from later folds:
//!
//! ```text
//! fan_out = 3, 7 leaves
//!
//! level 0:  L0 L1 L2 | L3 L4 L5 | L6
//! level 1:  P0 P1 L6                 (L6 carried)
//! level 2:  R                        (R links P0, P1, L6)
//! ```
//!
//! Records are staged in fold order: all leaves, then level 1, and so on.

use crate::core::error::{ArchiveError, Result};
use crate::core::identifier::IdentifierCodec;
use crate::core::node::fold_group;
use crate::core::staging::{StagingBackend, StagingWriter};
use cid::Cid;
use tracing::debug;

/// The unit folded by the tree builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeTriple {
    pub cid: Cid,
    /// Bytes of original input covered by this subtree
    pub logical_size: u64,
    /// Encoded bytes of every node in this subtree, container framing excluded
    pub subtree_size: u64,
}

impl NodeTriple {
    /// Triple for a raw leaf, whose encoded form is the block itself.
    pub fn leaf(cid: Cid, len: u64) -> Self {
        Self {
            cid,
            logical_size: len,
            subtree_size: len,
        }
    }
}

/// Result of folding a leaf sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltTree {
    pub root: NodeTriple,
    pub leaf_count: u64,
    /// Internal nodes written
    pub node_count: u64,
    /// Number of fold passes; 0 for a single-leaf file
    pub depth: u32,
}

/// Collects leaves in input order and folds them into a root.
#[derive(Debug)]
pub struct TreeBuilder {
    fan_out: usize,
    leaves: Vec<NodeTriple>,
}

impl TreeBuilder {
    pub fn new(fan_out: usize) -> Self {
        debug_assert!(fan_out >= 2, "fan-out must be at least 2");
        Self {
            fan_out: fan_out.max(2),
            leaves: Vec::new(),
        }
    }

    pub fn with_capacity(fan_out: usize, leaves: usize) -> Self {
        let mut builder = Self::new(fan_out);
        builder.leaves.reserve(leaves);
        builder
    }

    pub fn push_leaf(&mut self, leaf: NodeTriple) {
        self.leaves.push(leaf);
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn fan_out(&self) -> usize {
        self.fan_out
    }

    /// Fold all leaves into a single root, staging each parent as it is built.
    pub fn build<B: StagingBackend>(
        self,
        staging: &mut StagingWriter<B>,
        codec: &IdentifierCodec,
    ) -> Result<BuiltTree> {
        let leaf_count = self.leaves.len() as u64;
        let mut level = self.leaves;
        let mut node_count = 0u64;
        let mut depth = 0u32;

        if level.is_empty() {
            return Err(ArchiveError::InvalidGroup(0));
        }

        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(self.fan_out));
            for group in level.chunks(self.fan_out) {
                if let [single] = group {
                    next.push(*single);
                } else {
                    next.push(fold_group(group, staging, codec)?);
                    node_count += 1;
                }
            }

            depth += 1;
            debug!(
                depth,
                width = level.len(),
                parents = next.len(),
                "folded tree level"
            );
            level = next;
        }

        Ok(BuiltTree {
            root: level[0],
            leaf_count,
            node_count,
            depth,
        })
    }
}
