//! WebSocket transport for the JSON-RPC server.
//!
//! Each connection is one subscriber. Text frames carry JSON-RPC requests;
//! `subscribe` spawns a task that pushes every [`ResultEvent`] for the query
//! back to the client as a JSON-RPC response carrying the subscribe
//! request's id. All of the connection's subscriptions are dropped when it
//! closes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tessel_pubsub::Query;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::Client;
use crate::responses::ResultEvent;
use crate::server::{
    dispatch, parse_request, JsonRpcError, JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS,
};

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

#[derive(Deserialize)]
struct QueryParams {
    query: String,
}

/// Upgrade an HTTP request to a WebSocket connection.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(client): State<Arc<Client>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, client))
}

async fn handle_socket(socket: WebSocket, client: Arc<Client>) {
    let subscriber = format!("ws-{}", NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed));
    let (sender, mut receiver) = socket.split();
    let sender: WsSender = Arc::new(Mutex::new(sender));
    let mut forwarders: HashMap<String, JoinHandle<()>> = HashMap::new();

    debug!(%subscriber, "websocket client connected");

    while let Some(frame) = receiver.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%subscriber, error = %e, "websocket receive error");
                break;
            }
        };
        match frame {
            Message::Text(text) => {
                let resp =
                    handle_text(&text, &subscriber, &client, &sender, &mut forwarders).await;
                if let Some(resp) = resp {
                    if send_json(&sender, &resp).await.is_err() {
                        break;
                    }
                }
            }
            Message::Ping(data) => {
                let mut sender = sender.lock().await;
                let _ = sender.send(Message::Pong(data)).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    if let Err(err) = client.unsubscribe_all(&subscriber).await {
        debug!(%subscriber, %err, "no subscriptions to release");
    }
    for (_, handle) in forwarders.drain() {
        handle.abort();
    }
    debug!(%subscriber, "websocket client disconnected");
}

/// Handle one request frame. Returns the response to send, if any.
async fn handle_text(
    text: &str,
    subscriber: &str,
    client: &Arc<Client>,
    sender: &WsSender,
    forwarders: &mut HashMap<String, JoinHandle<()>>,
) -> Option<JsonRpcResponse> {
    let req = match parse_request(text.as_bytes()) {
        Ok(req) => req,
        Err(resp) => return Some(resp),
    };
    let id = req.id.clone();
    let method = req.method.clone();

    let outcome = match method.as_str() {
        "subscribe" => subscribe(req, subscriber, client, sender, forwarders).await,
        "unsubscribe" => match query_param(req.params) {
            Ok(query) => {
                if let Some(handle) = forwarders.remove(&forwarder_key(&query)) {
                    handle.abort();
                }
                client
                    .unsubscribe(subscriber, &query)
                    .await
                    .map(|()| Value::Object(Default::default()))
                    .map_err(JsonRpcError::from)
            }
            Err(e) => Err(e),
        },
        "unsubscribe_all" => {
            for (_, handle) in forwarders.drain() {
                handle.abort();
            }
            client
                .unsubscribe_all(subscriber)
                .await
                .map(|()| Value::Object(Default::default()))
                .map_err(JsonRpcError::from)
        }
        _ => return Some(dispatch(client, req).await),
    };

    Some(match outcome {
        Ok(result) => JsonRpcResponse::result(id, result),
        Err(err) => JsonRpcResponse::error(id, err),
    })
}

async fn subscribe(
    req: JsonRpcRequest,
    subscriber: &str,
    client: &Arc<Client>,
    sender: &WsSender,
    forwarders: &mut HashMap<String, JoinHandle<()>>,
) -> Result<Value, JsonRpcError> {
    let query = query_param(req.params)?;
    let events = client.subscribe(subscriber, &query, None).await?;
    let handle = tokio::spawn(push_events(events, req.id, sender.clone()));
    if let Some(old) = forwarders.insert(forwarder_key(&query), handle) {
        old.abort();
    }
    Ok(Value::Object(Default::default()))
}

/// Forwarders are keyed like the bus keys subscriptions: by the canonical
/// query, so spelling differences still find the same entry.
fn forwarder_key(query: &str) -> String {
    Query::parse(query).map_or_else(|_| query.to_string(), |q| q.to_string())
}

fn query_param(params: Value) -> Result<String, JsonRpcError> {
    serde_json::from_value::<QueryParams>(params)
        .map(|p| p.query)
        .map_err(|e| JsonRpcError::new(INVALID_PARAMS, "Invalid params", e.to_string()))
}

/// Push events to the socket until the subscription ends or the socket
/// goes away.
async fn push_events(mut events: mpsc::Receiver<ResultEvent>, id: Value, sender: WsSender) {
    while let Some(event) = events.recv().await {
        let resp = match serde_json::to_value(&event) {
            Ok(value) => JsonRpcResponse::result(id.clone(), value),
            Err(e) => {
                warn!(error = %e, "failed to encode event");
                continue;
            }
        };
        if send_json(&sender, &resp).await.is_err() {
            break;
        }
    }
}

async fn send_json(sender: &WsSender, resp: &JsonRpcResponse) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(resp) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "failed to encode response");
            return Ok(());
        }
    };
    let mut sender = sender.lock().await;
    sender.send(Message::Text(text)).await
}
