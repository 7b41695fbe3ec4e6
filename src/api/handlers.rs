//! REST API handlers for ledger operations

use crate::core::Block;
use crate::crypto::CipherError;
use crate::network::{
    AckResponse, BlockAuthor, BlockEntry, ChainResponse, NewEvent, Node, NodeError, NodeInfo,
    PayloadView, ReceiveBlockRequest, ReplaceChainRequest,
};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub node: Arc<Node>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[derive(Serialize)]
pub struct CreateBlockResponse {
    pub success: bool,
    pub block: Block,
}

#[derive(Serialize)]
pub struct PlaintextResponse {
    pub plaintext: String,
}

#[derive(Serialize)]
pub struct LatestBlockResponse {
    pub block: Block,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plaintext: Option<String>,
}

#[derive(Serialize)]
pub struct BlockListItem {
    pub block: Block,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plaintext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<BlockEntry> for BlockListItem {
    fn from(entry: BlockEntry) -> Self {
        let mut item = Self {
            block: entry.block,
            plaintext: None,
            error: None,
            detail: None,
        };
        match entry.view {
            PayloadView::Encrypted => {}
            PayloadView::Plaintext(text) => item.plaintext = Some(text),
            PayloadView::NoKeyForDevice => item.error = Some("no_key_for_device"),
            PayloadView::DecryptFailed(detail) => {
                item.error = Some("decrypt_failed");
                item.detail = Some(detail);
            }
        }
        item
    }
}

#[derive(Serialize)]
pub struct BlockListResponse {
    pub blocks: Vec<BlockListItem>,
    pub length: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    pub wallet_id: String,
    pub public_key: String,
    pub private_key: String,
    pub label: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub valid: bool,
    pub blocks_checked: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub adopted_from: Vec<String>,
    pub failed_peers: Vec<String>,
    pub length: usize,
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlockRequest {
    pub device_id: Option<String>,
    pub payload: Option<Value>,
    pub author_wallet_id: Option<String>,
    #[serde(alias = "authorPrivateKey")]
    pub author_private_key_pem: Option<String>,
    #[serde(alias = "authorPublicKey")]
    pub author_public_key_pem: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptRequest {
    #[serde(default, deserialize_with = "lenient_index")]
    pub index: Option<u64>,
    pub device_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceQuery {
    pub device_id: Option<String>,
    pub include_plaintext: Option<String>,
}

impl DeviceQuery {
    fn wants_plaintext(&self) -> bool {
        self.include_plaintext
            .as_deref()
            .is_some_and(|flag| flag.eq_ignore_ascii_case("true"))
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletRequest {
    pub owner_token: Option<String>,
    pub wallet_id: Option<String>,
    pub label: Option<String>,
}

/// Accept an index given as a JSON number or a numeric string
fn lenient_index<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("index must be a non-negative integer")),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom("index must be numeric")),
        Some(_) => Err(serde::de::Error::custom("index must be a number")),
    }
}

/// Payload text to encrypt: strings verbatim, anything else as compact JSON
fn payload_text(payload: Option<Value>) -> Option<String> {
    match payload? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn status_for(err: &NodeError) -> StatusCode {
    match err {
        NodeError::Unauthorized | NodeError::WalletCreationDisabled => StatusCode::FORBIDDEN,
        NodeError::Cipher(CipherError::Encryption) => StatusCode::INTERNAL_SERVER_ERROR,
        NodeError::WalletNotFound(_)
        | NodeError::NoDeviceKey(_)
        | NodeError::BlockNotFound(_)
        | NodeError::NoBlocksForDevice(_) => StatusCode::NOT_FOUND,
        NodeError::Validation(_)
        | NodeError::WalletExists(_)
        | NodeError::Cipher(_)
        | NodeError::Key(_)
        | NodeError::Rejected(_) => StatusCode::BAD_REQUEST,
    }
}

fn api_error(err: NodeError) -> (StatusCode, Json<ApiError>) {
    (
        status_for(&err),
        Json(ApiError {
            error: err.to_string(),
        }),
    )
}

fn bad_request(message: &str) -> (StatusCode, Json<ApiError>) {
    api_error(NodeError::Validation(message.to_string()))
}

fn ack(result: Result<(), NodeError>) -> (StatusCode, Json<AckResponse>) {
    match result {
        Ok(()) => (StatusCode::OK, Json(AckResponse::accepted())),
        Err(e) => (status_for(&e), Json(AckResponse::rejected(e.to_string()))),
    }
}

/// Decode a peer push body, answering malformed input with a rejected ack
fn decode_push<T: DeserializeOwned>(body: &[u8]) -> Result<T, (StatusCode, Json<AckResponse>)> {
    serde_json::from_slice(body).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(AckResponse::rejected(format!("malformed body: {}", e))),
        )
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /chain - Full chain
pub async fn get_chain(State(state): State<ApiState>) -> Json<ChainResponse> {
    Json(ChainResponse::new(state.node.chain().await))
}

/// GET /node/info - Node public key, peers and port
pub async fn get_node_info(State(state): State<ApiState>) -> Json<NodeInfo> {
    Json(state.node.info())
}

/// GET /chain/validate - Validate the local chain
pub async fn validate_chain(State(state): State<ApiState>) -> Json<ValidationResponse> {
    let (valid, blocks_checked) = state.node.validate().await;
    Json(ValidationResponse {
        valid,
        blocks_checked,
    })
}

/// POST /blocks/create - Encrypt, sign and append a device event
pub async fn create_block(
    State(state): State<ApiState>,
    Json(req): Json<CreateBlockRequest>,
) -> ApiResult<CreateBlockResponse> {
    let (Some(device_id), Some(payload)) = (non_empty(req.device_id), payload_text(req.payload))
    else {
        return Err(bad_request("deviceId and payload required"));
    };

    let author = match (
        non_empty(req.author_wallet_id),
        non_empty(req.author_private_key_pem),
    ) {
        (Some(wallet_id), _) => BlockAuthor::Wallet(wallet_id),
        (None, Some(private_key_pem)) => {
            let public_key_pem = non_empty(req.author_public_key_pem).ok_or_else(|| {
                bad_request("authorPublicKeyPem required when supplying authorPrivateKeyPem")
            })?;
            BlockAuthor::Keys {
                public_key_pem,
                private_key_pem,
            }
        }
        (None, None) => {
            return Err(bad_request("authorWalletId or authorPrivateKeyPem required"));
        }
    };

    let block = state
        .node
        .create_block(NewEvent {
            device_id,
            payload,
            author,
        })
        .await
        .map_err(api_error)?;

    Ok(Json(CreateBlockResponse {
        success: true,
        block,
    }))
}

/// POST /blocks/receive - Accept a block pushed by a peer
pub async fn receive_block(
    State(state): State<ApiState>,
    body: Bytes,
) -> (StatusCode, Json<AckResponse>) {
    let req: ReceiveBlockRequest = match decode_push(&body) {
        Ok(req) => req,
        Err(rejection) => return rejection,
    };
    match req.block {
        Some(block) => ack(state.node.receive_block(block).await),
        None => ack(Err(NodeError::Validation("no block".to_string()))),
    }
}

/// POST /chain/replace - Adopt a longer valid chain
pub async fn replace_chain(
    State(state): State<ApiState>,
    body: Bytes,
) -> (StatusCode, Json<AckResponse>) {
    let req: ReplaceChainRequest = match decode_push(&body) {
        Ok(req) => req,
        Err(rejection) => return rejection,
    };
    match req.chain {
        Some(chain) => ack(state.node.replace_chain(chain).await),
        None => ack(Err(NodeError::Validation("no chain".to_string()))),
    }
}

/// POST /chain/sync - Pull from every peer now
pub async fn sync_chain(State(state): State<ApiState>) -> Json<SyncResponse> {
    let report = state.node.sync_with_peers().await;
    let length = state.node.chain().await.len();
    Json(SyncResponse {
        adopted_from: report.adopted_from,
        failed_peers: report.failed_peers,
        length,
    })
}

/// POST /blocks/decrypt - Decrypt one block with a device key
pub async fn decrypt_block(
    State(state): State<ApiState>,
    Json(req): Json<DecryptRequest>,
) -> ApiResult<PlaintextResponse> {
    let (Some(index), Some(device_id)) = (req.index, non_empty(req.device_id)) else {
        return Err(bad_request("index and deviceId required"));
    };

    let plaintext = state
        .node
        .decrypt_block(index, &device_id)
        .await
        .map_err(api_error)?;
    Ok(Json(PlaintextResponse { plaintext }))
}

/// GET /blocks/latest-for-device - Newest block the device key opens
pub async fn latest_for_device(
    State(state): State<ApiState>,
    Query(query): Query<DeviceQuery>,
) -> ApiResult<LatestBlockResponse> {
    let include_plaintext = query.wants_plaintext();
    let Some(device_id) = non_empty(query.device_id) else {
        return Err(bad_request("deviceId required"));
    };

    let (block, plaintext) = state
        .node
        .latest_for_device(&device_id)
        .await
        .map_err(api_error)?;

    Ok(Json(LatestBlockResponse {
        block,
        plaintext: include_plaintext.then_some(plaintext),
    }))
}

/// GET /blocks/all - Every non-genesis block
pub async fn all_blocks(
    State(state): State<ApiState>,
    Query(query): Query<DeviceQuery>,
) -> Json<BlockListResponse> {
    let include_plaintext = query.wants_plaintext();
    let device_id = non_empty(query.device_id);

    let blocks: Vec<BlockListItem> = state
        .node
        .all_blocks(device_id.as_deref(), include_plaintext)
        .await
        .into_iter()
        .map(BlockListItem::from)
        .collect();

    Json(BlockListResponse {
        length: blocks.len(),
        blocks,
    })
}

/// POST /wallets/create - Create a node-held wallet (owner only)
pub async fn create_wallet(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Option<Json<CreateWalletRequest>>,
) -> ApiResult<WalletResponse> {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let presented: Vec<&str> = bearer_token(&headers)
        .into_iter()
        .chain(req.owner_token.as_deref())
        .collect();

    let wallet = state
        .node
        .create_wallet(&presented, req.wallet_id, req.label)
        .map_err(api_error)?;

    Ok(Json(WalletResponse {
        public_key: wallet.public_key(),
        private_key: wallet.private_key(),
        wallet_id: wallet.wallet_id,
        label: wallet.label,
    }))
}
