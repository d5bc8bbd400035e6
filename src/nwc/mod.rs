//! Nostr Wallet Connect (NIP-47)
//!
//! ```text
//! NwcConfig (nostr+walletconnect:// URI, sealed at rest with NIP-44)
//!     │
//! NwcClient ── kind 23194 (NIP-04) ──► every relay ──► wallet
//!     ◄────── kind 23195, #e = request id ── first success wins
//!     │
//! NwcEngine: WalletEngine over NwcClient
//! ```

mod client;
mod engine;
mod uri;

pub use client::{NwcClient, DEFAULT_TIMEOUT};
pub use engine::NwcEngine;
pub use uri::{seal_connection, unseal_connection, NwcConfig, SCHEME};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NwcError {
    #[error("invalid NWC connection string: {0}")]
    InvalidUri(String),
    #[error("NWC crypto: {0}")]
    Crypto(String),
    #[error("no NWC relay reachable")]
    NoRelays,
    #[error("relays rejected the request: {0}")]
    Rejected(String),
    #[error("wallet error {code}: {message}")]
    Wallet { code: String, message: String },
    #[error("no wallet response within {0:?}")]
    Timeout(Duration),
    #[error("relay connections dropped before the wallet responded")]
    Dropped,
    #[error("malformed wallet response: {0}")]
    Protocol(String),
}

impl NwcError {
    /// True when the wallet cannot have acted on the request.
    /// `Timeout`, `Dropped` and `Protocol` leave the outcome unknown.
    pub fn is_definitive(&self) -> bool {
        !matches!(self, NwcError::Timeout(_) | NwcError::Dropped | NwcError::Protocol(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    PayInvoice,
    MakeInvoice,
    GetBalance,
    ListTransactions,
    GetInfo,
}

/// Decrypted request content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    pub params: Value,
}

/// Decrypted response content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub result_type: Option<String>,
    #[serde(default)]
    pub error: Option<ResponseError>,
    #[serde(default)]
    pub result: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl Response {
    pub fn into_result(self) -> Result<Value, NwcError> {
        if let Some(err) = self.error {
            return Err(NwcError::Wallet { code: err.code, message: err.message });
        }
        self.result.ok_or_else(|| NwcError::Protocol("response has neither result nor error".into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayInvoiceResult {
    pub preimage: String,
    #[serde(default)]
    pub fees_paid: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBalanceResult {
    /// msat
    pub balance: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetInfoResult {
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub pubkey: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub methods: Vec<String>,
}

/// NIP-47 transaction as returned by `make_invoice` and `list_transactions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type", default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub invoice: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub preimage: Option<String>,
    #[serde(default)]
    pub payment_hash: Option<String>,
    /// msat
    #[serde(default)]
    pub amount: u64,
    #[serde(default)]
    pub fees_paid: Option<u64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub settled_at: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTransactionsResult {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}
