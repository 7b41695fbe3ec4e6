//! Ledger implementation
//!
//! The ledger owns the ordered chain of blocks. `chain[0]` is always a genesis
//! block; every later block links to its predecessor by hash and carries a
//! valid author signature.

use crate::core::block::{Block, BlockError};
use crate::core::rule::{ChainRule, LongestChain};
use crate::crypto::KeyPair;
use thiserror::Error;

/// Ledger mutation errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid block: {0}")]
    InvalidBlock(#[from] BlockError),
    #[error("Candidate chain not preferred ({candidate} blocks vs {current} local)")]
    NotPreferred { candidate: usize, current: usize },
    #[error("Candidate chain failed validation")]
    InvalidChain,
}

/// The ordered chain of blocks held by one node
pub struct Ledger {
    blocks: Vec<Block>,
    rule: Box<dyn ChainRule>,
}

impl Ledger {
    /// Create a ledger holding a fresh genesis block
    pub fn new() -> Self {
        Self::with_rule(Box::new(LongestChain))
    }

    /// Create a ledger that adopts peer chains according to `rule`
    pub fn with_rule(rule: Box<dyn ChainRule>) -> Self {
        // Throwaway key: the genesis signature only keeps index 0 uniform.
        let genesis = Block::genesis(&KeyPair::generate());
        Self {
            blocks: vec![genesis],
            rule,
        }
    }

    /// Get the latest block
    pub fn latest(&self) -> &Block {
        // `blocks` is never empty: construction and replacement both keep genesis.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Get a block by index
    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.blocks.get(i))
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; kept for the `len`/`is_empty` pair
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Append a block that extends the current tip
    pub fn append(&mut self, block: Block) -> Result<(), LedgerError> {
        block.validate(Some(self.latest()))?;
        self.blocks.push(block);
        Ok(())
    }

    /// Validate a candidate chain received from elsewhere
    pub fn validate_full(candidate: &[Block]) -> bool {
        let Some(genesis) = candidate.first() else {
            return false;
        };
        if !genesis.is_genesis() || !genesis.is_valid(None) {
            return false;
        }

        candidate.windows(2).enumerate().all(|(i, pair)| {
            match pair[1].validate(Some(&pair[0])) {
                Ok(()) => true,
                Err(e) => {
                    log::debug!("Candidate chain invalid at position {}: {}", i + 1, e);
                    false
                }
            }
        })
    }

    /// Replace the chain if the adoption rule prefers `candidate` and it is valid
    pub fn replace(&mut self, candidate: Vec<Block>) -> Result<(), LedgerError> {
        if !self.rule.should_adopt(&candidate, &self.blocks) {
            return Err(LedgerError::NotPreferred {
                candidate: candidate.len(),
                current: self.blocks.len(),
            });
        }
        if !Self::validate_full(&candidate) {
            return Err(LedgerError::InvalidChain);
        }

        log::info!(
            "Replacing chain: {} -> {} blocks",
            self.blocks.len(),
            candidate.len()
        );
        self.blocks = candidate;
        Ok(())
    }

    /// Validate the local chain
    pub fn is_valid(&self) -> bool {
        Self::validate_full(&self.blocks)
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
