//! Wallet management
//!
//! Provides named keypairs the node signs blocks with on a caller's behalf.

pub mod wallet;

pub use wallet::{generate_wallet_id, Wallet, WalletStore};
