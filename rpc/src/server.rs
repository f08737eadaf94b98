//! Axum-based JSON-RPC 2.0 server in front of [`Client`].
//!
//! - `POST /` takes a JSON-RPC request and answers with a JSON-RPC response.
//! - `GET /websocket` upgrades to a WebSocket that additionally carries
//!   `subscribe`, `unsubscribe` and `unsubscribe_all`.
//! - `GET /health` returns `{}`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tessel_types::{Tx, TxHash};
use tokio::net::TcpListener;
use tracing::{info, Instrument};

use crate::client::Client;
use crate::error::RpcError;
use crate::responses::{AbciQueryOptions, ResultHealth};
use crate::shutdown::ShutdownSignal;
use crate::tracing_spans::rpc_span;
use crate::websocket::ws_handler;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Methods that exist in the node API but are not served here.
const UNSUPPORTED: [&str; 9] = [
    "genesis_chunked",
    "blockchain_info",
    "consensus_params",
    "commit",
    "validators",
    "block_search",
    "broadcast_evidence",
    "dump_consensus_state",
    "consensus_state",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: data.into(),
        }
    }
}

impl From<RpcError> for JsonRpcError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::UnsupportedOperation(_) => {
                JsonRpcError::new(METHOD_NOT_FOUND, "Method not found", err.to_string())
            }
            RpcError::InvalidRequest(_)
            | RpcError::PaginationRange { .. }
            | RpcError::InvalidOrderToken(_)
            | RpcError::Query(_) => {
                JsonRpcError::new(INVALID_PARAMS, "Invalid params", err.to_string())
            }
            other => JsonRpcError::new(INTERNAL_ERROR, "Internal error", other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

// ── Params ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TxParams {
    tx: Tx,
}

#[derive(Deserialize)]
struct TxLookupParams {
    hash: TxHash,
    #[serde(default)]
    prove: bool,
}

#[derive(Deserialize)]
struct TxSearchParams {
    query: String,
    #[serde(default)]
    prove: bool,
    page: Option<i64>,
    per_page: Option<i64>,
    #[serde(default)]
    order_by: String,
}

#[derive(Deserialize)]
struct LimitParams {
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct HeightParams {
    height: Option<u64>,
}

#[derive(Deserialize)]
struct BlockHashParams {
    hash: String,
}

#[derive(Deserialize)]
struct AbciQueryParams {
    path: String,
    #[serde(default)]
    data: String,
    #[serde(default)]
    height: u64,
    #[serde(default)]
    prove: bool,
}

fn params<T: DeserializeOwned>(params: Value) -> Result<T, JsonRpcError> {
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    };
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::new(INVALID_PARAMS, "Invalid params", e.to_string()))
}

fn decode_hex(field: &str, s: &str) -> Result<Vec<u8>, JsonRpcError> {
    hex::decode(s).map_err(|e| {
        JsonRpcError::new(INVALID_PARAMS, "Invalid params", format!("{field}: {e}"))
    })
}

fn to_value<T: Serialize>(res: Result<T, RpcError>) -> Result<Value, JsonRpcError> {
    let res = res?;
    serde_json::to_value(res)
        .map_err(|e| JsonRpcError::new(INTERNAL_ERROR, "Internal error", e.to_string()))
}

// ── Dispatch ────────────────────────────────────────────────────────────

/// Execute one request against `client`. Subscription methods are only
/// meaningful on a WebSocket and are refused here.
pub async fn dispatch(client: &Client, req: JsonRpcRequest) -> JsonRpcResponse {
    let id = req.id.clone();
    let span = rpc_span(&req.method);
    match call(client, &req.method, req.params).instrument(span).await {
        Ok(result) => JsonRpcResponse::result(id, result),
        Err(err) => JsonRpcResponse::error(id, err),
    }
}

async fn call(client: &Client, method: &str, p: Value) -> Result<Value, JsonRpcError> {
    match method {
        "health" => to_value(client.health().await),
        "status" => to_value(client.status().await),
        "genesis" => to_value(client.genesis().await),
        "net_info" => to_value(client.net_info().await),
        "abci_info" => to_value(client.abci_info().await),
        "abci_query" => {
            let p: AbciQueryParams = params(p)?;
            let data = decode_hex("data", &p.data)?;
            let opts = AbciQueryOptions {
                height: p.height,
                prove: p.prove,
            };
            to_value(client.abci_query_with_options(&p.path, &data, opts).await)
        }
        "broadcast_tx_async" => {
            let p: TxParams = params(p)?;
            to_value(client.broadcast_tx_async(p.tx).await)
        }
        "broadcast_tx_sync" => {
            let p: TxParams = params(p)?;
            to_value(client.broadcast_tx_sync(p.tx).await)
        }
        "broadcast_tx_commit" => {
            let p: TxParams = params(p)?;
            to_value(client.broadcast_tx_commit(p.tx).await)
        }
        "check_tx" => {
            let p: TxParams = params(p)?;
            to_value(client.check_tx(p.tx).await)
        }
        "tx" => {
            let p: TxLookupParams = params(p)?;
            to_value(client.tx(p.hash.as_bytes(), p.prove).await)
        }
        "tx_search" => {
            let p: TxSearchParams = params(p)?;
            to_value(
                client
                    .tx_search(&p.query, p.prove, p.page, p.per_page, &p.order_by)
                    .await,
            )
        }
        "unconfirmed_txs" => {
            let p: LimitParams = params(p)?;
            to_value(client.unconfirmed_txs(p.limit).await)
        }
        "num_unconfirmed_txs" => to_value(client.num_unconfirmed_txs().await),
        "block" => {
            let p: HeightParams = params(p)?;
            to_value(client.block(p.height).await)
        }
        "block_results" => {
            let p: HeightParams = params(p)?;
            to_value(client.block_results(p.height).await)
        }
        "block_by_hash" => {
            let p: BlockHashParams = params(p)?;
            let hash = decode_hex("hash", &p.hash)?;
            to_value(client.block_by_hash(&hash).await)
        }
        "subscribe" | "unsubscribe" | "unsubscribe_all" => Err(JsonRpcError::new(
            INVALID_REQUEST,
            "Invalid request",
            format!("{method} is only available over a websocket connection"),
        )),
        other => match UNSUPPORTED.iter().find(|m| **m == other) {
            Some(name) => Err(RpcError::UnsupportedOperation(*name).into()),
            None => Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                "Method not found",
                other.to_string(),
            )),
        },
    }
}

pub(crate) fn parse_request(body: &[u8]) -> Result<JsonRpcRequest, JsonRpcResponse> {
    serde_json::from_slice(body).map_err(|e| {
        JsonRpcResponse::error(
            Value::Null,
            JsonRpcError::new(PARSE_ERROR, "Parse error", e.to_string()),
        )
    })
}

async fn handle_http(State(client): State<Arc<Client>>, body: Bytes) -> Json<JsonRpcResponse> {
    match parse_request(&body) {
        Ok(req) => Json(dispatch(&client, req).await),
        Err(resp) => Json(resp),
    }
}

async fn health() -> Json<ResultHealth> {
    Json(ResultHealth {})
}

/// Routes for the JSON-RPC server.
pub fn router(client: Arc<Client>) -> Router {
    Router::new()
        .route("/", post(handle_http))
        .route("/health", get(health))
        .route("/websocket", get(ws_handler))
        .with_state(client)
}

/// A bound JSON-RPC listener, ready to serve.
pub struct RpcServer {
    listener: TcpListener,
    client: Arc<Client>,
    shutdown: ShutdownSignal,
}

impl RpcServer {
    pub async fn bind(
        laddr: &str,
        client: Arc<Client>,
        shutdown: ShutdownSignal,
    ) -> Result<Self, RpcError> {
        let listener = TcpListener::bind(laddr)
            .await
            .map_err(|e| RpcError::Server(format!("failed to bind {laddr}: {e}")))?;
        Ok(Self {
            listener,
            client,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RpcError> {
        self.listener
            .local_addr()
            .map_err(|e| RpcError::Server(e.to_string()))
    }

    /// Serve until shutdown.
    pub async fn run(self) -> Result<(), RpcError> {
        Self::serve(self.listener, self.client, self.shutdown).await
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn serve(
        listener: TcpListener,
        client: Arc<Client>,
        shutdown: ShutdownSignal,
    ) -> Result<(), RpcError> {
        let addr = listener
            .local_addr()
            .map_err(|e| RpcError::Server(e.to_string()))?;
        info!(%addr, "RPC server listening");
        axum::serve(listener, router(client))
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await
            .map_err(|e| RpcError::Server(e.to_string()))
    }
}
