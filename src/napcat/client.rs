//! WebSocket client for a NapCat forward connection.
//!
//! A single socket carries both pushed events and API responses. Requests
//! are tagged with a UUID `echo`; the reader task routes frames carrying an
//! `echo` back to the pending caller and forwards everything else to the
//! event channel consumed by the main loop.

use crate::napcat::{BotClient, BotIdentity, EssenceMsg, ForwardNode, MessageDetail};
use crate::types::error::{BotError, Result};
use crate::types::event::{Event, Segment};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const WRITE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    retcode: i64,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    message: String,
    #[serde(default)]
    wording: String,
    echo: String,
}

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<ApiResponse>>>>;

pub struct NapcatClient {
    write_tx: mpsc::Sender<WsMessage>,
    pending: PendingMap,
    request_timeout: Duration,
}

impl NapcatClient {
    /// Connect to a NapCat forward WebSocket endpoint. Returns the client
    /// and the inbound event stream; the stream closes when the socket
    /// does.
    pub async fn connect(
        ws_url: &str,
        access_token: Option<&str>,
        request_timeout: Duration,
    ) -> Result<(Arc<Self>, mpsc::Receiver<Event>)> {
        let url = match access_token {
            Some(token) if !token.is_empty() => {
                let sep = if ws_url.contains('?') { '&' } else { '?' };
                format!("{ws_url}{sep}access_token={token}")
            }
            _ => ws_url.to_string(),
        };

        let (stream, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| BotError::transport(format!("connect to {ws_url} failed: {e}")))?;
        debug!(url = %ws_url, "NapCat WebSocket connected");

        let (mut write, mut read) = stream.split();
        let (write_tx, mut write_rx) = mpsc::channel::<WsMessage>(WRITE_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAPACITY);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(async move {
            while let Some(msg) = write_rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    error!("NapCat write failed: {}", e);
                    break;
                }
            }
        });

        let reader_pending = Arc::clone(&pending);
        let reader_write_tx = write_tx.clone();
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => {
                        route_frame(&text, &reader_pending, &event_tx).await;
                    }
                    Ok(WsMessage::Ping(payload)) => {
                        let _ = reader_write_tx.send(WsMessage::Pong(payload)).await;
                    }
                    Ok(WsMessage::Close(_)) => {
                        warn!("NapCat closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("NapCat read failed: {}", e);
                        break;
                    }
                }
            }
            // Dropping event_tx ends the main event loop.
        });

        let client = Arc::new(Self {
            write_tx,
            pending,
            request_timeout,
        });
        Ok((client, event_rx))
    }

    /// Perform one OneBot API call and return its `data` payload.
    async fn call(&self, action: &str, params: Value) -> Result<Value> {
        let echo = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(echo.clone(), tx);

        let request = json!({
            "action": action,
            "params": params,
            "echo": echo,
        });
        let send_result = self
            .write_tx
            .send(WsMessage::Text(request.to_string()))
            .await;
        if send_result.is_err() {
            self.pending.lock().await.remove(&echo);
            return Err(BotError::transport("connection closed"));
        }

        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(BotError::transport("connection closed while waiting"));
            }
            Err(_) => {
                self.pending.lock().await.remove(&echo);
                return Err(BotError::timeout(action));
            }
        };

        if response.retcode != 0 {
            let reason = if response.wording.is_empty() {
                response.message
            } else {
                response.wording
            };
            return Err(BotError::api(action, response.retcode, reason));
        }
        debug!(action, status = %response.status, "NapCat API call ok");
        Ok(response.data)
    }
}

/// Decide whether a text frame is an API response (carries our `echo`) or a
/// pushed event, and route it accordingly.
async fn route_frame(text: &str, pending: &PendingMap, event_tx: &mpsc::Sender<Event>) {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!("Discarding unparseable frame: {}", e);
            return;
        }
    };

    if value.get("echo").is_some() {
        match serde_json::from_value::<ApiResponse>(value) {
            Ok(response) => {
                let waiter = pending.lock().await.remove(&response.echo);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => warn!(echo = %response.echo, "API response with no pending caller"),
                }
            }
            Err(e) => warn!("Discarding malformed API response: {}", e),
        }
        return;
    }

    match Event::from_value(value) {
        Ok(event) => {
            if event_tx.send(event).await.is_err() {
                debug!("Event receiver dropped");
            }
        }
        Err(e) => warn!("Discarding malformed event: {}", e),
    }
}

#[async_trait]
impl BotClient for NapcatClient {
    async fn get_login_info(&self) -> Result<BotIdentity> {
        let data = self.call("get_login_info", json!({})).await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn send_group_message(&self, group_id: i64, message: Vec<Segment>) -> Result<()> {
        self.call(
            "send_group_msg",
            json!({"group_id": group_id, "message": message}),
        )
        .await?;
        Ok(())
    }

    async fn send_private_message(&self, user_id: i64, message: Vec<Segment>) -> Result<()> {
        self.call(
            "send_private_msg",
            json!({"user_id": user_id, "message": message}),
        )
        .await?;
        Ok(())
    }

    async fn get_essence_messages(&self, group_id: i64) -> Result<Vec<EssenceMsg>> {
        let data = self
            .call("get_essence_msg_list", json!({"group_id": group_id}))
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn get_message(&self, message_id: &str) -> Result<MessageDetail> {
        let data = self
            .call("get_msg", json!({"message_id": message_id}))
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn send_group_forward(&self, group_id: i64, nodes: Vec<ForwardNode>) -> Result<()> {
        let nodes: Vec<Value> = nodes
            .into_iter()
            .map(|node| {
                Ok(json!({
                    "type": "node",
                    "data": serde_json::to_value(node)?,
                }))
            })
            .collect::<Result<_>>()?;
        self.call(
            "send_group_forward_msg",
            json!({"group_id": group_id, "messages": nodes}),
        )
        .await?;
        Ok(())
    }
}
