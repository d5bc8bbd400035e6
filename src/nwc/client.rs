//! NWC request/response over every configured relay.
//!
//! The request is published on all reachable relays and the first verified success
//! wins. An error response from one relay does not end the race while other relays
//! can still deliver a success. Every opened link is closed once before returning.

use futures_util::stream::{FuturesUnordered, StreamExt};
use nostr::nips::nip04;
use nostr::{Event, EventId, Keys, Kind, PublicKey, Tag, Timestamp, UnsignedEvent};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::{
    GetBalanceResult, GetInfoResult, ListTransactionsResult, Method, NwcConfig, NwcError, PayInvoiceResult,
    Request, Response, Transaction,
};
use crate::nostr::{kinds, tag_value, EventFilter, RelayConnector, RelayLink, RelayMessage};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct NwcClient {
    config: NwcConfig,
    connector: Arc<dyn RelayConnector>,
    timeout: Duration,
}

impl NwcClient {
    pub fn new(config: NwcConfig, connector: Arc<dyn RelayConnector>) -> Self {
        Self { config, connector, timeout: DEFAULT_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &NwcConfig { &self.config }

    pub async fn pay_invoice(&self, invoice: &str) -> Result<PayInvoiceResult, NwcError> {
        self.call(Method::PayInvoice, json!({ "invoice": invoice })).await
    }

    pub async fn make_invoice(
        &self,
        amount_msat: u64,
        description: &str,
        expiry: Option<u32>,
    ) -> Result<Transaction, NwcError> {
        let mut params = json!({ "amount": amount_msat, "description": description });
        if let Some(expiry) = expiry {
            params["expiry"] = json!(expiry);
        }
        self.call(Method::MakeInvoice, params).await
    }

    /// Balance in msat.
    pub async fn get_balance(&self) -> Result<u64, NwcError> {
        let result: GetBalanceResult = self.call(Method::GetBalance, json!({})).await?;
        Ok(result.balance)
    }

    pub async fn list_transactions(&self, limit: usize) -> Result<Vec<Transaction>, NwcError> {
        let result: ListTransactionsResult = self.call(Method::ListTransactions, json!({ "limit": limit })).await?;
        Ok(result.transactions)
    }

    pub async fn get_info(&self) -> Result<GetInfoResult, NwcError> {
        self.call(Method::GetInfo, json!({})).await
    }

    async fn call<T: DeserializeOwned>(&self, method: Method, params: Value) -> Result<T, NwcError> {
        let result = self.request(method, params).await?;
        serde_json::from_value(result).map_err(|e| NwcError::Protocol(e.to_string()))
    }

    /// Send one request and wait for the wallet's `result`.
    pub async fn request(&self, method: Method, params: Value) -> Result<Value, NwcError> {
        let deadline = Instant::now() + self.timeout;
        let keys = self.config.client_keys();
        let event = build_request(&keys, &self.config.wallet_pubkey, &Request { method, params })?;
        let request_id = event.id;

        let mut links = self.open_links(deadline).await;
        if links.is_empty() {
            return Err(NwcError::NoRelays);
        }

        let sub_id = format!("nwc-{}", &request_id.to_hex()[..16]);
        let filter = EventFilter::default()
            .kind(kinds::NWC_RESPONSE)
            .author(self.config.wallet_pubkey.to_hex())
            .event_ref(request_id.to_hex())
            .pubkey_ref(keys.public_key().to_hex());

        let mut live: Vec<Box<dyn RelayLink>> = Vec::with_capacity(links.len());
        let mut send_errors = Vec::new();
        for mut link in links.drain(..) {
            let sent = match link.subscribe(&sub_id, &filter).await {
                Ok(()) => link.publish(&event).await,
                Err(e) => Err(e),
            };
            match sent {
                Ok(()) => live.push(link),
                Err(e) => {
                    tracing::warn!(relay = link.url(), error = %e, "NWC publish failed");
                    send_errors.push(format!("{}: {e}", link.url()));
                    link.close().await;
                }
            }
        }
        if live.is_empty() {
            return Err(NwcError::Rejected(send_errors.join("; ")));
        }
        tracing::debug!(?method, id = %request_id, relays = live.len(), "NWC request published");

        let outcome = race(&mut live, &request_id, &self.config.wallet_pubkey, &keys, deadline, self.timeout).await;

        for link in live.iter_mut() {
            link.close().await;
        }
        outcome
    }

    /// Connects to every relay concurrently. Links opened before the deadline are
    /// closed again if the rest do not finish in time.
    async fn open_links(&self, deadline: Instant) -> Vec<Box<dyn RelayLink>> {
        let mut pending: FuturesUnordered<_> = self
            .config
            .relays
            .iter()
            .map(|url| {
                let connector = self.connector.clone();
                async move { (url.as_str(), connector.connect(url).await) }
            })
            .collect();

        let mut links = Vec::with_capacity(self.config.relays.len());
        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some((_, Ok(link)))) => links.push(link),
                Ok(Some((url, Err(e)))) => tracing::warn!(relay = url, error = %e, "NWC relay unreachable"),
                Ok(None) => return links,
                Err(_) => {
                    tracing::warn!(opened = links.len(), "NWC relay connections timed out");
                    for link in links.iter_mut() {
                        link.close().await;
                    }
                    return Vec::new();
                }
            }
        }
    }
}

fn build_request(keys: &Keys, wallet: &PublicKey, request: &Request) -> Result<Event, NwcError> {
    let content = serde_json::to_string(request).map_err(|e| NwcError::Protocol(e.to_string()))?;
    let encrypted = nip04::encrypt(keys.secret_key(), wallet, content).map_err(|e| NwcError::Crypto(e.to_string()))?;
    let p_tag = Tag::parse(&["p".to_string(), wallet.to_hex()]).map_err(|e| NwcError::Protocol(e.to_string()))?;
    UnsignedEvent::new(keys.public_key(), Timestamp::now(), Kind::Custom(kinds::NWC_REQUEST), vec![p_tag], encrypted)
        .sign_with_keys(keys)
        .map_err(|e| NwcError::Crypto(e.to_string()))
}

/// Success-only race across links until the deadline.
async fn race(
    links: &mut [Box<dyn RelayLink>],
    request_id: &EventId,
    wallet: &PublicKey,
    keys: &Keys,
    deadline: Instant,
    timeout: Duration,
) -> Result<Value, NwcError> {
    let mut pending: FuturesUnordered<_> = links
        .iter_mut()
        .map(|link| await_response(link.as_mut(), request_id, wallet, keys))
        .collect();

    let mut wallet_error = None;
    let mut dropped = false;
    let mut rejected = Vec::new();

    loop {
        match tokio::time::timeout_at(deadline, pending.next()).await {
            Ok(Some(Ok(result))) => return Ok(result),
            Ok(Some(Err(e))) => {
                tracing::debug!(error = %e, "NWC relay finished without success");
                match e {
                    NwcError::Wallet { .. } => wallet_error = Some(e),
                    NwcError::Rejected(reason) => rejected.push(reason),
                    _ => dropped = true,
                }
            }
            Ok(None) => break,
            Err(_) => {
                tracing::warn!(id = %request_id, "NWC request timed out");
                return Err(wallet_error.unwrap_or(NwcError::Timeout(timeout)));
            }
        }
    }

    if let Some(e) = wallet_error {
        return Err(e);
    }
    if dropped {
        return Err(NwcError::Dropped);
    }
    Err(NwcError::Rejected(rejected.join("; ")))
}

/// Wait on one link for the response to `request_id`.
async fn await_response(
    link: &mut dyn RelayLink,
    request_id: &EventId,
    wallet: &PublicKey,
    keys: &Keys,
) -> Result<Value, NwcError> {
    let id_hex = request_id.to_hex();
    while let Some(message) = link.next_message().await {
        match message {
            RelayMessage::Event { event, .. } => {
                if event.kind.as_u16() != kinds::NWC_RESPONSE || event.pubkey != *wallet {
                    continue;
                }
                if tag_value(&event, "e") != Some(id_hex.as_str()) {
                    tracing::debug!(relay = link.url(), "ignoring NWC response for another request");
                    continue;
                }
                if event.verify().is_err() {
                    tracing::warn!(relay = link.url(), "dropping NWC response with bad signature");
                    continue;
                }
                let plain = nip04::decrypt(keys.secret_key(), wallet, &event.content)
                    .map_err(|e| NwcError::Protocol(format!("decrypt: {e}")))?;
                let response: Response =
                    serde_json::from_str(&plain).map_err(|e| NwcError::Protocol(e.to_string()))?;
                return response.into_result();
            }
            RelayMessage::Ok { event_id, accepted: false, message } if event_id == id_hex => {
                return Err(NwcError::Rejected(format!(
                    "{}: {}",
                    link.url(),
                    message.unwrap_or_else(|| "rejected".into())
                )));
            }
            RelayMessage::Closed { message, .. } => {
                tracing::warn!(relay = link.url(), %message, "NWC subscription closed by relay");
                return Err(NwcError::Dropped);
            }
            RelayMessage::Notice { message } => tracing::debug!(relay = link.url(), %message, "relay notice"),
            _ => {}
        }
    }
    Err(NwcError::Dropped)
}
