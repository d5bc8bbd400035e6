//! `WalletEngine` backed by a remote NWC wallet.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

use super::{NwcClient, NwcConfig, NwcError, Transaction, DEFAULT_TIMEOUT};
use crate::invoice::decode_bolt11;
use crate::nostr::RelayConnector;
use crate::service::{
    EngineConfig, EngineError, EngineEvent, NodeInfo, Payment, PaymentDirection, PaymentStatus, ReceiveRequest,
    ReceiveResponse, WalletEngine,
};

pub struct NwcEngine {
    connector: Arc<dyn RelayConnector>,
    timeout: Duration,
    client: RwLock<Option<NwcClient>>,
    events: broadcast::Sender<EngineEvent>,
}

impl NwcEngine {
    pub fn new(connector: Arc<dyn RelayConnector>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self { connector, timeout: DEFAULT_TIMEOUT, client: RwLock::new(None), events }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn client(&self) -> Result<NwcClient, EngineError> {
        self.client.read().await.clone().ok_or(EngineError::NotConnected)
    }
}

impl From<NwcError> for EngineError {
    fn from(e: NwcError) -> Self {
        match e {
            NwcError::InvalidUri(msg) => EngineError::Config(msg),
            other if !other.is_definitive() => EngineError::Unconfirmed(other.to_string()),
            other => EngineError::Failed(other.to_string()),
        }
    }
}

#[async_trait]
impl WalletEngine for NwcEngine {
    async fn connect(&self, config: &EngineConfig) -> Result<(), EngineError> {
        let uri = config
            .connection
            .as_ref()
            .ok_or_else(|| EngineError::Config("NWC engine needs a connection string".into()))?;
        let nwc = NwcConfig::parse(uri)?;
        let client = NwcClient::new(nwc, self.connector.clone()).with_timeout(self.timeout);

        // Any answer from the wallet, even an error, proves the relay path works.
        match client.get_info().await {
            Ok(info) => tracing::info!(alias = ?info.alias, methods = info.methods.len(), "NWC wallet reachable"),
            Err(NwcError::Wallet { code, .. }) => tracing::info!(%code, "NWC wallet reachable, get_info unsupported"),
            Err(e) => return Err(e.into()),
        }
        *self.client.write().await = Some(client);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), EngineError> {
        if self.client.write().await.take().is_some() {
            let _ = self.events.send(EngineEvent::Disconnected { reason: "disconnect requested".into() });
        }
        Ok(())
    }

    async fn pay_invoice(&self, invoice: &str) -> Result<Payment, EngineError> {
        let client = self.client().await?;
        let decoded = decode_bolt11(invoice);
        let payment_hash = decoded.as_ref().map(|i| i.payment_hash().to_string());

        match client.pay_invoice(invoice).await {
            Ok(result) => {
                let payment = Payment {
                    id: payment_hash.clone().unwrap_or_else(|| result.preimage.clone()),
                    payment_hash,
                    direction: PaymentDirection::Outgoing,
                    status: PaymentStatus::Complete,
                    amount_msat: decoded.as_ref().and_then(|i| i.amount_milli_satoshis()).unwrap_or(0),
                    fee_msat: result.fees_paid.unwrap_or(0),
                    description: None,
                    invoice: Some(invoice.to_string()),
                    preimage: Some(result.preimage),
                    created_at: chrono::Utc::now().timestamp(),
                };
                let _ = self.events.send(EngineEvent::PaymentSent(payment.clone()));
                Ok(payment)
            }
            Err(e) => {
                let _ = self.events.send(EngineEvent::PaymentFailed { payment_hash, error: e.to_string() });
                Err(e.into())
            }
        }
    }

    async fn receive_payment(&self, request: ReceiveRequest) -> Result<ReceiveResponse, EngineError> {
        let client = self.client().await?;
        let tx = client.make_invoice(request.amount_msat, &request.description, request.expiry).await?;
        let invoice = tx.invoice.ok_or_else(|| EngineError::Failed("wallet returned no invoice".into()))?;
        let payment_hash = tx
            .payment_hash
            .or_else(|| decode_bolt11(&invoice).map(|i| i.payment_hash().to_string()));
        Ok(ReceiveResponse { invoice, payment_hash })
    }

    async fn list_payments(&self, limit: usize) -> Result<Vec<Payment>, EngineError> {
        let client = self.client().await?;
        Ok(client.list_transactions(limit).await?.into_iter().map(payment_from_transaction).collect())
    }

    async fn node_info(&self) -> Result<NodeInfo, EngineError> {
        let client = self.client().await?;
        let balance_msat = client.get_balance().await?;
        Ok(NodeInfo {
            balance_msat,
            pending_receive_msat: 0,
            pending_send_msat: 0,
            alias: None,
            pubkey: Some(client.config().wallet_pubkey.to_hex()),
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> { self.events.subscribe() }
}

fn payment_from_transaction(tx: Transaction) -> Payment {
    let direction = match tx.direction.as_deref() {
        Some("incoming") => PaymentDirection::Incoming,
        _ => PaymentDirection::Outgoing,
    };
    let status = match (tx.state.as_deref(), tx.settled_at) {
        (Some("settled"), _) | (None, Some(_)) => PaymentStatus::Complete,
        (Some("failed") | Some("expired"), _) => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    };
    Payment {
        id: tx.payment_hash.clone().or_else(|| tx.invoice.clone()).unwrap_or_default(),
        payment_hash: tx.payment_hash,
        direction,
        status,
        amount_msat: tx.amount,
        fee_msat: tx.fees_paid.unwrap_or(0),
        description: tx.description,
        invoice: tx.invoice,
        preimage: tx.preimage,
        created_at: tx.created_at.unwrap_or(0),
    }
}
