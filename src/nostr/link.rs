//! RelayLink - one relay connection per NWC request.

use async_trait::async_trait;
use std::time::Duration;

use super::client::{RelayClient, RelayMessage};
use super::EventFilter;

/// One open relay connection as seen by request/response flows.
#[async_trait]
pub trait RelayLink: Send {
    fn url(&self) -> &str;
    async fn subscribe(&mut self, sub_id: &str, filter: &EventFilter) -> anyhow::Result<()>;
    async fn publish(&mut self, event: &nostr::Event) -> anyhow::Result<()>;
    /// Next message, `None` once the relay is gone.
    async fn next_message(&mut self) -> Option<RelayMessage>;
    async fn close(&mut self);
}

/// Opens relay links.
#[async_trait]
pub trait RelayConnector: Send + Sync {
    async fn connect(&self, url: &str) -> anyhow::Result<Box<dyn RelayLink>>;
}

/// WebSocket connector over [`RelayClient`].
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self { Self { connect_timeout } }
}

impl Default for WsConnector {
    fn default() -> Self { Self::new(Duration::from_secs(10)) }
}

#[async_trait]
impl RelayConnector for WsConnector {
    async fn connect(&self, url: &str) -> anyhow::Result<Box<dyn RelayLink>> {
        let mut client = RelayClient::new(url);
        tokio::time::timeout(self.connect_timeout, client.connect())
            .await
            .map_err(|_| anyhow::anyhow!("connect to {} timed out", url))??;
        Ok(Box::new(client))
    }
}

#[async_trait]
impl RelayLink for RelayClient {
    fn url(&self) -> &str { RelayClient::url(self) }

    async fn subscribe(&mut self, sub_id: &str, filter: &EventFilter) -> anyhow::Result<()> {
        RelayClient::subscribe(self, sub_id, std::slice::from_ref(filter)).await
    }

    async fn publish(&mut self, event: &nostr::Event) -> anyhow::Result<()> {
        RelayClient::publish(self, event).await
    }

    async fn next_message(&mut self) -> Option<RelayMessage> {
        self.recv().await
    }

    async fn close(&mut self) {
        RelayClient::close(self).await
    }
}
