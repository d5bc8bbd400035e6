//! Nostr relay client - tokio-tungstenite WebSocket
//!
//! One connection per client. Outgoing frames go through a writer task, incoming text
//! frames are queued for [`RelayClient::recv`].

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::EventFilter;

/// Relay connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Disconnected,
    Connecting,
    Connected,
}

/// Nostr relay client
pub struct RelayClient {
    url: String,
    state: Arc<RwLock<RelayState>>,
    tx: Option<mpsc::Sender<String>>,
    rx: Option<mpsc::Receiver<String>>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl RelayClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: Arc::new(RwLock::new(RelayState::Disconnected)),
            tx: None,
            rx: None,
            writer: None,
            reader: None,
        }
    }

    pub fn url(&self) -> &str { &self.url }

    pub async fn state(&self) -> RelayState {
        *self.state.read().await
    }

    /// Connect to relay
    pub async fn connect(&mut self) -> anyhow::Result<()> {
        *self.state.write().await = RelayState::Connecting;

        let (ws, _) = match connect_async(self.url.as_str()).await {
            Ok(conn) => conn,
            Err(e) => {
                *self.state.write().await = RelayState::Disconnected;
                return Err(e.into());
            }
        };
        let (mut write, mut read) = ws.split();

        // Channel for outgoing messages
        let (out_tx, mut out_rx) = mpsc::channel::<String>(32);
        // Channel for incoming messages
        let (in_tx, in_rx) = mpsc::channel::<String>(64);
        self.tx = Some(out_tx);
        self.rx = Some(in_rx);

        *self.state.write().await = RelayState::Connected;

        // Writer: drains outgoing frames, sends a close frame once the sender is dropped
        let state_w = self.state.clone();
        self.writer = Some(tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if write.send(Message::Text(msg)).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
            *state_w.write().await = RelayState::Disconnected;
        }));

        let state_r = self.state.clone();
        self.reader = Some(tokio::spawn(async move {
            while let Some(Ok(msg)) = read.next().await {
                if let Message::Text(txt) = msg {
                    if in_tx.send(txt).await.is_err() {
                        break;
                    }
                }
            }
            *state_r.write().await = RelayState::Disconnected;
        }));

        tracing::debug!(relay = %self.url, "relay connected");
        Ok(())
    }

    /// Send raw message
    pub async fn send(&self, msg: &str) -> anyhow::Result<()> {
        if let Some(tx) = &self.tx {
            tx.send(msg.to_string()).await?;
            Ok(())
        } else {
            anyhow::bail!("Not connected")
        }
    }

    /// Publish event (NIP-01)
    pub async fn publish(&self, event: &nostr::Event) -> anyhow::Result<()> {
        let msg = json!(["EVENT", event]).to_string();
        self.send(&msg).await
    }

    /// Subscribe (NIP-01)
    pub async fn subscribe(&self, id: &str, filters: &[EventFilter]) -> anyhow::Result<()> {
        let mut msg = vec![json!("REQ"), json!(id)];
        for filter in filters {
            msg.push(serde_json::to_value(filter)?);
        }
        self.send(&Value::Array(msg).to_string()).await
    }

    /// Next parsed message. `None` once the connection is gone.
    /// Frames that fail to parse are skipped.
    pub async fn recv(&mut self) -> Option<RelayMessage> {
        let rx = self.rx.as_mut()?;
        while let Some(raw) = rx.recv().await {
            match parse_relay_message(&raw) {
                Some(msg) => return Some(msg),
                None => tracing::trace!(relay = %self.url, "skipping unparsed frame"),
            }
        }
        None
    }

    /// Close the connection. Safe to call more than once.
    pub async fn close(&mut self) {
        // Dropping the sender lets the writer flush and send a close frame.
        self.tx = None;
        if let Some(writer) = self.writer.take() {
            let _ = tokio::time::timeout(std::time::Duration::from_secs(2), writer).await;
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.rx = None;
        *self.state.write().await = RelayState::Disconnected;
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Parse relay message
pub fn parse_relay_message(msg: &str) -> Option<RelayMessage> {
    let arr: Vec<Value> = serde_json::from_str(msg).ok()?;
    let cmd = arr.first()?.as_str()?;
    match cmd {
        "EVENT" => {
            let sub_id = arr.get(1)?.as_str()?.to_string();
            let event: nostr::Event = serde_json::from_value(arr.get(2)?.clone()).ok()?;
            Some(RelayMessage::Event { sub_id, event: Box::new(event) })
        }
        "OK" => {
            let event_id = arr.get(1)?.as_str()?.to_string();
            let accepted = arr.get(2)?.as_bool()?;
            let message = arr.get(3).and_then(|v| v.as_str()).map(String::from);
            Some(RelayMessage::Ok { event_id, accepted, message })
        }
        "EOSE" => {
            let sub_id = arr.get(1)?.as_str()?.to_string();
            Some(RelayMessage::Eose { sub_id })
        }
        "CLOSED" => {
            let sub_id = arr.get(1)?.as_str()?.to_string();
            let message = arr.get(2).and_then(|v| v.as_str()).unwrap_or_default().to_string();
            Some(RelayMessage::Closed { sub_id, message })
        }
        "NOTICE" => {
            let message = arr.get(1)?.as_str()?.to_string();
            Some(RelayMessage::Notice { message })
        }
        _ => None,
    }
}

/// Relay message types
#[derive(Debug, Clone)]
pub enum RelayMessage {
    Event { sub_id: String, event: Box<nostr::Event> },
    Ok { event_id: String, accepted: bool, message: Option<String> },
    Eose { sub_id: String },
    Closed { sub_id: String, message: String },
    Notice { message: String },
}
