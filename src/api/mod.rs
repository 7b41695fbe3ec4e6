//! REST API module
//!
//! HTTP surface of a ledger node. Dashboards and peer nodes use the same
//! routes.
//!
//! # Endpoints
//!
//! ## Chain
//! - `GET /chain` - Full chain
//! - `GET /chain/validate` - Validate local chain
//! - `POST /chain/replace` - Offer a longer chain
//! - `POST /chain/sync` - Pull from peers now
//!
//! ## Blocks
//! - `POST /blocks/create` - Encrypt, sign and append a device event
//! - `POST /blocks/receive` - Accept a block pushed by a peer
//! - `POST /blocks/decrypt` - Decrypt one block
//! - `GET /blocks/latest-for-device` - Newest block for a device
//! - `GET /blocks/all` - List blocks, optionally decrypted
//!
//! ## Node and wallets
//! - `GET /node/info` - Node public key, peers and port
//! - `POST /wallets/create` - Create a node-held wallet (owner only)

pub mod handlers;
pub mod routes;

pub use handlers::ApiState;
pub use routes::create_router;
