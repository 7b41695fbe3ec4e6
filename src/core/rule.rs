//! Chain adoption rules
//!
//! Decides whether a candidate chain should replace the local one, before any
//! validation happens. The ledger still validates every candidate the rule
//! accepts.

use crate::core::block::Block;

/// Decides whether a candidate chain is preferable to the current one
pub trait ChainRule: Send + Sync {
    fn should_adopt(&self, candidate: &[Block], current: &[Block]) -> bool;
}

/// Longest chain wins; equal length is never adopted
#[derive(Debug, Clone, Copy, Default)]
pub struct LongestChain;

impl ChainRule for LongestChain {
    fn should_adopt(&self, candidate: &[Block], current: &[Block]) -> bool {
        candidate.len() > current.len()
    }
}
