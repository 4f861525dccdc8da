use crate::render::BlockSummary;
use std::ops::Range;
use tracing::{debug, trace};

/// A contiguous run of whole blocks that forms one output document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Sequential part index (1-based)
    pub index: usize,

    /// Indices of the blocks in this part
    pub blocks: Range<usize>,

    /// Sum of the blocks' token estimates
    pub tokens: usize,
}

impl Part {
    /// Number of blocks in this part.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if this part holds no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Greedy, order-preserving packing of blocks into token-bounded parts.
#[derive(Debug, Clone, Copy)]
pub struct Partitioner {
    budget: usize,
    reserved: usize,
}

impl Partitioner {
    /// Creates a partitioner with a per-part token budget.
    #[must_use]
    pub const fn new(budget: usize) -> Self {
        Self { budget, reserved: 0 }
    }

    /// Sets the cost charged to part 1 for its header and structure tree.
    #[must_use]
    pub const fn with_reserved(mut self, reserved: usize) -> Self {
        self.reserved = reserved;
        self
    }

    /// Splits `blocks` into parts.
    ///
    /// # Algorithm
    ///
    /// 1. Part 1 starts at the reserved cost
    /// 2. A block joins the current part while `current + tokens <= budget`
    /// 3. Otherwise the current part closes and the block opens the next one
    ///
    /// An empty part accepts any block, so a block larger than the budget ends
    /// up alone in its own part. Blocks are never split or reordered, and an
    /// empty input yields exactly one empty part.
    #[must_use]
    pub fn partition(&self, blocks: &[BlockSummary]) -> Vec<Part> {
        let mut parts = Vec::new();
        let mut builder = PartBuilder::new(1, 0, self.reserved);

        for (idx, block) in blocks.iter().enumerate() {
            if !builder.can_fit(block.tokens, self.budget) {
                let next = PartBuilder::new(builder.index + 1, idx, 0);
                parts.push(std::mem::replace(&mut builder, next).build());
            }

            if block.tokens > self.budget {
                debug!(
                    "Block '{}' exceeds budget ({} > {} tokens), emitting alone",
                    block.relative_path, block.tokens, self.budget
                );
            }
            builder.add(block.tokens);
        }
        parts.push(builder.build());

        trace!("Partitioned {} blocks into {} parts", blocks.len(), parts.len());
        parts
    }
}

/// Accumulates blocks for a single part.
struct PartBuilder {
    index: usize,
    start: usize,
    end: usize,
    current: usize,
    tokens: usize,
}

impl PartBuilder {
    const fn new(index: usize, start: usize, reserved: usize) -> Self {
        Self {
            index,
            start,
            end: start,
            current: reserved,
            tokens: 0,
        }
    }

    fn can_fit(&self, tokens: usize, budget: usize) -> bool {
        self.start == self.end || self.current.saturating_add(tokens) <= budget
    }

    fn add(&mut self, tokens: usize) {
        self.end += 1;
        self.current = self.current.saturating_add(tokens);
        self.tokens = self.tokens.saturating_add(tokens);
    }

    const fn build(self) -> Part {
        Part {
            index: self.index,
            blocks: self.start..self.end,
            tokens: self.tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::BlockStatus;

    fn blocks(tokens: &[usize]) -> Vec<BlockSummary> {
        tokens
            .iter()
            .enumerate()
            .map(|(index, &tokens)| BlockSummary {
                index,
                relative_path: format!("file{index}.py"),
                tokens,
                status: BlockStatus::Rendered,
            })
            .collect()
    }

    fn ranges(parts: &[Part]) -> Vec<Range<usize>> {
        parts.iter().map(|p| p.blocks.clone()).collect()
    }

    #[test]
    fn test_everything_fits_in_one_part() {
        let parts = Partitioner::new(100).partition(&blocks(&[10, 20, 30]));
        assert_eq!(ranges(&parts), [0..3]);
        assert_eq!(parts[0].tokens, 60);
        assert_eq!(parts[0].index, 1);
    }

    #[test]
    fn test_tie_fits() {
        let parts = Partitioner::new(100).partition(&blocks(&[40, 60, 1]));
        assert_eq!(ranges(&parts), [0..2, 2..3]);
    }

    #[test]
    fn test_reserve_applies_to_first_part_only() {
        let parts = Partitioner::new(100)
            .with_reserved(10)
            .partition(&blocks(&[30, 30, 30, 30]));
        assert_eq!(ranges(&parts), [0..3, 3..4]);
        assert_eq!(parts[0].tokens, 90);
        assert_eq!(parts[1].index, 2);
    }

    #[test]
    fn test_oversized_block_is_alone() {
        let parts = Partitioner::new(100).partition(&blocks(&[20, 250, 20]));
        assert_eq!(ranges(&parts), [0..1, 1..2, 2..3]);
        assert_eq!(parts[1].tokens, 250);
    }

    #[test]
    fn test_oversized_first_block_with_reserve() {
        let parts = Partitioner::new(100)
            .with_reserved(50)
            .partition(&blocks(&[120, 10]));
        assert_eq!(ranges(&parts), [0..1, 1..2]);
    }

    #[test]
    fn test_empty_input_yields_one_empty_part() {
        let parts = Partitioner::new(100).with_reserved(10).partition(&[]);
        assert_eq!(parts.len(), 1);
        assert!(parts[0].is_empty());
        assert_eq!(parts[0].tokens, 0);
    }

    #[test]
    fn test_parts_cover_all_blocks_in_order() {
        let input = blocks(&[5, 70, 40, 33, 90, 1, 1, 100, 7]);
        let parts = Partitioner::new(100).with_reserved(20).partition(&input);

        let mut next = 0;
        for (i, part) in parts.iter().enumerate() {
            assert_eq!(part.index, i + 1);
            assert_eq!(part.blocks.start, next);
            assert!(!part.is_empty());
            next = part.blocks.end;

            let sum: usize = input[part.blocks.clone()].iter().map(|b| b.tokens).sum();
            assert_eq!(sum, part.tokens);
            assert!(part.tokens <= 100 || part.len() == 1);
        }
        assert_eq!(next, input.len());
    }
}
