//! WalletEngine - capability boundary to the Lightning engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network { #[default] Bitcoin, Testnet, Signet, Regtest }

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self { Network::Bitcoin => "bitcoin", Network::Testnet => "testnet", Network::Signet => "signet", Network::Regtest => "regtest" }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bitcoin" | "mainnet" => Some(Network::Bitcoin),
            "testnet" => Some(Network::Testnet),
            "signet" => Some(Network::Signet),
            "regtest" => Some(Network::Regtest),
            _ => None,
        }
    }
}

/// Engine connection parameters. Which fields matter depends on the engine.
#[derive(Clone, Default)]
pub struct EngineConfig {
    pub network: Network,
    /// Seed phrase for engines that hold keys locally.
    pub mnemonic: Option<Zeroizing<String>>,
    pub api_key: Option<String>,
    pub working_dir: Option<PathBuf>,
    /// Connection string for remote engines (NWC URI).
    pub connection: Option<Zeroizing<String>>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("network", &self.network)
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "<redacted>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("working_dir", &self.working_dir)
            .field("connection", &self.connection.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl EngineConfig {
    pub fn new(network: Network) -> Self { Self { network, ..Default::default() } }
    pub fn with_mnemonic(mut self, m: impl Into<String>) -> Self { self.mnemonic = Some(Zeroizing::new(m.into())); self }
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self { self.api_key = Some(key.into()); self }
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self { self.working_dir = Some(dir.into()); self }
    pub fn with_connection(mut self, uri: impl Into<String>) -> Self { self.connection = Some(Zeroizing::new(uri.into())); self }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("engine not connected")]
    NotConnected,
    #[error("engine config: {0}")]
    Config(String),
    #[error("{0}")]
    Failed(String),
    /// Dispatched, but the engine never confirmed either way. The payment may still settle.
    #[error("payment unconfirmed: {0}")]
    Unconfirmed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentDirection { Incoming, Outgoing }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus { Pending, Complete, Failed }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub payment_hash: Option<String>,
    pub direction: PaymentDirection,
    pub status: PaymentStatus,
    pub amount_msat: u64,
    pub fee_msat: u64,
    pub description: Option<String>,
    pub invoice: Option<String>,
    pub preimage: Option<String>,
    /// Unix seconds
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub balance_msat: u64,
    pub pending_receive_msat: u64,
    pub pending_send_msat: u64,
    pub alias: Option<String>,
    pub pubkey: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveRequest {
    pub amount_msat: u64,
    pub description: String,
    /// Seconds
    pub expiry: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveResponse {
    pub invoice: String,
    pub payment_hash: Option<String>,
}

/// Engine callbacks, re-emitted by the service as [`super::WalletEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    PaymentReceived(Payment),
    PaymentSent(Payment),
    PaymentFailed { payment_hash: Option<String>, error: String },
    InvoicePaid { payment_hash: String },
    Synced,
    /// Connection to the backend dropped.
    Disconnected { reason: String },
}

#[async_trait]
pub trait WalletEngine: Send + Sync {
    async fn connect(&self, config: &EngineConfig) -> Result<(), EngineError>;
    async fn disconnect(&self) -> Result<(), EngineError>;
    async fn pay_invoice(&self, invoice: &str) -> Result<Payment, EngineError>;
    async fn receive_payment(&self, request: ReceiveRequest) -> Result<ReceiveResponse, EngineError>;
    async fn list_payments(&self, limit: usize) -> Result<Vec<Payment>, EngineError>;
    async fn node_info(&self) -> Result<NodeInfo, EngineError>;
    async fn sync(&self) -> Result<(), EngineError> { Ok(()) }
    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;
}
