//! Fixed-size chunking policy
//!
//! A stream of `total` bytes is cut into `ceil(total / block_size)` blocks,
//! all full-sized except possibly the last. An empty stream still yields a
//! single zero-length block so that every file has at least one leaf.

/// One block of the input, in input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDescriptor {
    pub len: u64,
}

/// Lazy iterator over the block lengths of a stream.
///
/// Lengths are computed on demand, so the caller reads the source in
/// lockstep and never holds more than one block at a time.
#[derive(Debug, Clone)]
pub struct Chunker {
    remaining: u64,
    block_size: u64,
    emitted: bool,
}

impl Chunker {
    /// `block_size` must be non-zero; [`PackConfig`](crate::core::config::PackConfig)
    /// validation guarantees this for the pipeline.
    pub fn new(total_size: u64, block_size: u32) -> Self {
        debug_assert!(block_size > 0, "block size must be non-zero");
        Self {
            remaining: total_size,
            block_size: block_size.max(1) as u64,
            emitted: false,
        }
    }

    /// Number of blocks this chunker yields in total.
    pub fn block_count(total_size: u64, block_size: u32) -> u64 {
        let block_size = block_size.max(1) as u64;
        total_size.div_ceil(block_size).max(1)
    }
}

impl Iterator for Chunker {
    type Item = BlockDescriptor;

    fn next(&mut self) -> Option<BlockDescriptor> {
        if self.remaining == 0 {
            if self.emitted {
                return None;
            }
            self.emitted = true;
            return Some(BlockDescriptor { len: 0 });
        }

        let len = self.remaining.min(self.block_size);
        self.remaining -= len;
        self.emitted = true;
        Some(BlockDescriptor { len })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = if self.remaining == 0 {
            usize::from(!self.emitted)
        } else {
            self.remaining.div_ceil(self.block_size) as usize
        };
        (left, Some(left))
    }
}

impl ExactSizeIterator for Chunker {}

/// Split a stream of `total_size` bytes into block descriptors.
pub fn chunk(total_size: u64, block_size: u32) -> Chunker {
    Chunker::new(total_size, block_size)
}
