//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Blocks (hash-linked, signed, carrying an encrypted payload)
//! - Ledger (chain management, full validation, chain replacement)
//! - Chain adoption rules

pub mod block;
pub mod ledger;
pub mod rule;

pub use block::{now_timestamp, Block, BlockError, GENESIS_PREV_HASH};
pub use ledger::{Ledger, LedgerError};
pub use rule::{ChainRule, LongestChain};
