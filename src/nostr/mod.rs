//! Nostr - relay transport used by the NWC client.
//!
//! - Relay connections via tokio-tungstenite WebSocket ([`RelayClient`])
//! - NIP-01 message framing and parsing ([`RelayMessage`])
//! - [`RelayConnector`] / [`RelayLink`]: the seam the NWC race runs over, so tests
//!   can stand in for real relays

pub mod client;
mod link;

pub use client::{parse_relay_message, RelayClient, RelayMessage, RelayState};
pub use link::{RelayConnector, RelayLink, WsConnector};

use serde::{Deserialize, Serialize};

/// Event kinds used by zaps and wallet connect
pub mod kinds {
    /// NIP-57 zap request
    pub const ZAP_REQUEST: u16 = 9734;
    /// NIP-47 request
    pub const NWC_REQUEST: u16 = 23194;
    /// NIP-47 response
    pub const NWC_RESPONSE: u16 = 23195;
}

/// Event filter for subscriptions (NIP-01)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EventFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u16>>,
    #[serde(rename = "#e", skip_serializing_if = "Option::is_none")]
    pub e_tags: Option<Vec<String>>,
    #[serde(rename = "#p", skip_serializing_if = "Option::is_none")]
    pub p_tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl EventFilter {
    pub fn kind(mut self, kind: u16) -> Self { self.kinds.get_or_insert_with(Vec::new).push(kind); self }
    pub fn author(mut self, hex: impl Into<String>) -> Self { self.authors.get_or_insert_with(Vec::new).push(hex.into()); self }
    pub fn event_ref(mut self, id: impl Into<String>) -> Self { self.e_tags.get_or_insert_with(Vec::new).push(id.into()); self }
    pub fn pubkey_ref(mut self, hex: impl Into<String>) -> Self { self.p_tags.get_or_insert_with(Vec::new).push(hex.into()); self }
    pub fn since(mut self, ts: u64) -> Self { self.since = Some(ts); self }
}

/// First value of the first tag named `name`.
pub fn tag_value<'a>(event: &'a nostr::Event, name: &str) -> Option<&'a str> {
    event.tags.iter().find_map(|tag| {
        let parts = tag.as_slice();
        match (parts.first(), parts.get(1)) {
            (Some(key), Some(value)) if key == name => Some(value.as_str()),
            _ => None,
        }
    })
}

/// Build tags from string arrays, skipping malformed ones.
pub fn parse_tags(raw: &[Vec<String>]) -> Vec<nostr::Tag> {
    raw.iter()
        .filter(|parts| !parts.is_empty())
        .filter_map(|parts| nostr::Tag::parse(parts).ok())
        .collect()
}
