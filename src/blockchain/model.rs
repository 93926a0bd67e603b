use std::fmt;

use log::warn;

use super::{Block, GENESIS_PREVIOUS_HASH, PowPolicy};
use crate::error::LedgerError;

/// Why a chain failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainViolation {
    Empty,
    BadGenesis,
    BrokenLink { index: u64 },
    IndexGap { index: u64, expected: u64 },
    BadProof { index: u64 },
}

impl fmt::Display for ChainViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainViolation::Empty => f.write_str("chain is empty"),
            ChainViolation::BadGenesis => f.write_str("genesis block altered"),
            ChainViolation::BrokenLink { index } => {
                write!(f, "block #{index} does not link to its predecessor")
            }
            ChainViolation::IndexGap { index, expected } => {
                write!(f, "block #{index} found where #{expected} was expected")
            }
            ChainViolation::BadProof { index } => {
                write!(f, "block #{index} has a bad hash or proof")
            }
        }
    }
}

/// Genesis-seeded, append-only sequence of sealed blocks.
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
    difficulty: u32,
    policy: PowPolicy,
}

impl Chain {
    /// Initialize a new chain with the given genesis block.
    pub fn new(genesis: Block, difficulty: u32, policy: PowPolicy) -> Self {
        Self {
            blocks: vec![genesis],
            difficulty,
            policy,
        }
    }

    /// Adopt blocks read back from storage. Validity is checked separately.
    pub fn from_blocks(
        blocks: Vec<Block>,
        difficulty: u32,
        policy: PowPolicy,
    ) -> Result<Self, LedgerError> {
        if blocks.is_empty() {
            return Err(LedgerError::EmptyChain);
        }
        Ok(Self {
            blocks,
            difficulty,
            policy,
        })
    }

    /// Return the last block in the chain.
    pub fn latest(&self) -> Result<&Block, LedgerError> {
        self.blocks.last().ok_or(LedgerError::EmptyChain)
    }

    /// Append a sealed block that extends the current tip.
    /// The chain is left untouched when the block is rejected.
    pub fn append(&mut self, block: Block) -> Result<&Block, LedgerError> {
        let tip = self.latest()?;
        let expected_index = tip.index + 1;
        if block.index != expected_index || block.previous_hash != tip.hash {
            warn!(
                "CHAIN - rejected block #{} (prev={}): tip is #{} ({})",
                block.index, block.previous_hash, tip.index, tip.hash
            );
            return Err(LedgerError::ChainLinkage {
                expected_index,
                got_index: block.index,
                expected_previous: tip.hash.clone(),
                got_previous: block.previous_hash,
            });
        }
        if !self.policy.verify(tip, &block, self.difficulty) {
            warn!("CHAIN - rejected block #{}: bad hash or proof", block.index);
            return Err(LedgerError::InvalidBlock { index: block.index });
        }

        self.blocks.push(block);
        self.latest()
    }

    /// Validate the entire chain: genesis, linkage, indices, hashes and PoW.
    pub fn is_valid(&self) -> bool {
        self.first_violation().is_none()
    }

    /// First problem found walking the chain from genesis, if any.
    pub fn first_violation(&self) -> Option<ChainViolation> {
        let Some(genesis) = self.blocks.first() else {
            return Some(ChainViolation::Empty);
        };

        // Validate genesis block immutability
        if genesis.index != 0
            || genesis.previous_hash != GENESIS_PREVIOUS_HASH
            || !genesis.has_valid_hash()
        {
            return Some(ChainViolation::BadGenesis);
        }

        for pair in self.blocks.windows(2) {
            let (prev, current) = (&pair[0], &pair[1]);

            if current.index != prev.index + 1 {
                return Some(ChainViolation::IndexGap {
                    index: current.index,
                    expected: prev.index + 1,
                });
            }
            if current.previous_hash != prev.hash {
                return Some(ChainViolation::BrokenLink {
                    index: current.index,
                });
            }
            if !self.policy.verify(prev, current, self.difficulty) {
                return Some(ChainViolation::BadProof {
                    index: current.index,
                });
            }
        }

        None
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn policy(&self) -> PowPolicy {
        self.policy
    }

    #[cfg(test)]
    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }
}
