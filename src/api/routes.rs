//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Dashboards call the node straight from the browser
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Node
        .route("/node/info", get(handlers::get_node_info))
        // Chain endpoints
        .route("/chain", get(handlers::get_chain))
        .route("/chain/validate", get(handlers::validate_chain))
        .route("/chain/replace", post(handlers::replace_chain))
        .route("/chain/sync", post(handlers::sync_chain))
        // Blocks
        .route("/blocks/create", post(handlers::create_block))
        .route("/blocks/receive", post(handlers::receive_block))
        .route("/blocks/decrypt", post(handlers::decrypt_block))
        .route(
            "/blocks/latest-for-device",
            get(handlers::latest_for_device),
        )
        .route("/blocks/all", get(handlers::all_blocks))
        // Wallets
        .route("/wallets/create", post(handlers::create_wallet))
        // Add state and middleware
        .with_state(state)
        .layer(cors)
}
