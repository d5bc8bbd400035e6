//! Wallet service - shared access point to the Lightning engine.
//!
//! # Architecture
//!
//! ```text
//! WalletService (Clone, Arc inside)
//!     │
//!     ├── connect / disconnect ──► WalletEngine
//!     │        │
//!     │        └── on failure: reconnect task (base × attempt, bounded)
//!     │
//!     ├── pay_invoice / create_invoice / list_payments / get_balance
//!     │
//!     └── event relay task: EngineEvent ──► WalletEvent (broadcast)
//!                                  └── received / sent / invoice paid → refresh_balance
//! ```
//!
//! The service is constructed by the application root and handed to whoever needs it.

mod engine;
mod events;
mod watch;

pub use engine::{
    EngineConfig, EngineError, EngineEvent, Network, NodeInfo, Payment, PaymentDirection, PaymentStatus,
    ReceiveRequest, ReceiveResponse, WalletEngine,
};
pub use events::WalletEvent;
pub use watch::{InvoiceStatus, InvoiceWatch};

use crate::invoice::{parse_payment_input, PaymentInput};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, thiserror::Error)]
pub enum WalletError {
    #[error("wallet not connected")]
    NotConnected,
    #[error("not a BOLT11 invoice (got {0})")]
    InvalidInvoice(&'static str),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub reconnect_base_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            reconnect_base_delay: Duration::from_secs(2),
            max_reconnect_attempts: 5,
            poll_interval: Duration::from_secs(2),
        }
    }
}

#[derive(Default)]
struct ServiceState {
    connected: bool,
    reconnect_attempts: u32,
    cached_balance_sat: u64,
    config: Option<EngineConfig>,
    reconnect_task: Option<JoinHandle<()>>,
    relay_task: Option<JoinHandle<()>>,
}

struct Inner {
    engine: Arc<dyn WalletEngine>,
    settings: ServiceConfig,
    state: RwLock<ServiceState>,
    events: RwLock<broadcast::Sender<WalletEvent>>,
    connect_lock: Mutex<()>,
}

#[derive(Clone)]
pub struct WalletService {
    inner: Arc<Inner>,
}

impl WalletService {
    pub fn new(engine: Arc<dyn WalletEngine>, settings: ServiceConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                engine,
                settings,
                state: RwLock::new(ServiceState::default()),
                events: RwLock::new(events),
                connect_lock: Mutex::new(()),
            }),
        }
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.inner.events.read().await.subscribe()
    }

    pub async fn is_connected(&self) -> bool { self.inner.state.read().await.connected }

    pub async fn cached_balance(&self) -> u64 { self.inner.state.read().await.cached_balance_sat }

    pub async fn reconnect_attempts(&self) -> u32 { self.inner.state.read().await.reconnect_attempts }

    /// True while an automatic reconnection is scheduled or running.
    pub async fn reconnect_pending(&self) -> bool {
        self.inner.state.read().await.reconnect_task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Connect the engine. No-op when already connected.
    pub async fn connect(&self, config: EngineConfig) -> Result<(), WalletError> {
        let _guard = self.inner.connect_lock.lock().await;
        {
            let mut state = self.inner.state.write().await;
            if state.connected {
                tracing::debug!("wallet already connected");
                return Ok(());
            }
            if let Some(task) = state.reconnect_task.take() {
                task.abort();
            }
            state.reconnect_attempts = 0;
            state.config = Some(config.clone());
        }

        match self.inner.engine.connect(&config).await {
            Ok(()) => {
                self.on_connected().await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "wallet connect failed");
                self.emit(WalletEvent::Error { message: e.to_string() }).await;
                self.schedule_reconnect().await;
                Err(e.into())
            }
        }
    }

    pub async fn disconnect(&self) -> Result<(), WalletError> {
        let _guard = self.inner.connect_lock.lock().await;
        let was_connected = {
            let mut state = self.inner.state.write().await;
            if let Some(task) = state.reconnect_task.take() {
                task.abort();
            }
            if !state.connected {
                tracing::warn!("disconnect called while not connected");
                return Ok(());
            }
            state.connected = false;
            state.cached_balance_sat = 0;
            state.reconnect_attempts = 0;
            if let Some(task) = state.relay_task.take() {
                task.abort();
            }
            true
        };

        let result = self.inner.engine.disconnect().await;
        if was_connected {
            self.emit(WalletEvent::Disconnected).await;
        }
        // Fresh channel: every existing subscriber sees the stream close.
        *self.inner.events.write().await = broadcast::channel(EVENT_CAPACITY).0;
        tracing::info!("wallet disconnected");
        result.map_err(Into::into)
    }

    pub async fn pay_invoice(&self, invoice: &str) -> Result<Payment, WalletError> {
        let invoice = match parse_payment_input(invoice) {
            PaymentInput::Bolt11(parsed) => parsed.to_string(),
            other => return Err(WalletError::InvalidInvoice(other.kind())),
        };
        self.require_connected().await?;

        let result = self.inner.engine.pay_invoice(&invoice).await;
        self.refresh_balance().await;
        match result {
            Ok(payment) => {
                tracing::info!(amount_msat = payment.amount_msat, fee_msat = payment.fee_msat, "invoice paid");
                Ok(payment)
            }
            Err(e) => {
                tracing::warn!(error = %e, "invoice payment failed");
                Err(e.into())
            }
        }
    }

    pub async fn create_invoice(
        &self,
        amount_sats: u64,
        description: &str,
        expiry: Option<u32>,
    ) -> Result<ReceiveResponse, WalletError> {
        if amount_sats == 0 {
            return Err(WalletError::InvalidAmount("amount must be positive".into()));
        }
        let amount_msat = amount_sats
            .checked_mul(1000)
            .ok_or_else(|| WalletError::InvalidAmount(format!("{amount_sats} sats overflows msat")))?;
        self.require_connected().await?;

        let request = ReceiveRequest { amount_msat, description: description.to_string(), expiry };
        Ok(self.inner.engine.receive_payment(request).await?)
    }

    pub async fn list_payments(&self, limit: usize) -> Result<Vec<Payment>, WalletError> {
        self.require_connected().await?;
        Ok(self.inner.engine.list_payments(limit).await?)
    }

    /// Fetch the balance (sats). Engine errors are emitted and returned.
    pub async fn get_balance(&self) -> Result<u64, WalletError> {
        match self.fetch_balance().await {
            Ok(balance) => Ok(balance),
            Err(e) => {
                self.emit(WalletEvent::Error { message: e.to_string() }).await;
                Err(e)
            }
        }
    }

    /// Background refresh: errors are emitted and logged, never returned.
    pub async fn refresh_balance(&self) {
        if let Err(e) = self.fetch_balance().await {
            tracing::warn!(error = %e, "balance refresh failed");
            self.emit(WalletEvent::Error { message: e.to_string() }).await;
        }
    }

    pub async fn sync(&self) -> Result<(), WalletError> {
        self.require_connected().await?;
        self.inner.engine.sync().await?;
        self.refresh_balance().await;
        Ok(())
    }

    /// Poll the engine for `payment_hash` until it is paid or the watch is dropped.
    pub fn watch_invoice(&self, payment_hash: impl Into<String>) -> InvoiceWatch {
        InvoiceWatch::spawn(self.clone(), payment_hash.into(), self.inner.settings.poll_interval)
    }

    async fn fetch_balance(&self) -> Result<u64, WalletError> {
        self.require_connected().await?;
        let info = self.inner.engine.node_info().await?;
        let balance_sat = info.balance_msat / 1000;
        self.inner.state.write().await.cached_balance_sat = balance_sat;
        self.emit(WalletEvent::BalanceUpdated { balance_sat }).await;
        Ok(balance_sat)
    }

    async fn require_connected(&self) -> Result<(), WalletError> {
        if self.is_connected().await { Ok(()) } else { Err(WalletError::NotConnected) }
    }

    async fn emit(&self, event: WalletEvent) {
        let _ = self.inner.events.read().await.send(event);
    }

    async fn on_connected(&self) {
        let engine_events = self.inner.engine.subscribe();
        {
            let mut state = self.inner.state.write().await;
            state.connected = true;
            state.reconnect_attempts = 0;
            state.reconnect_task = None;
            if let Some(old) = state.relay_task.take() {
                old.abort();
            }
            state.relay_task = Some(tokio::spawn(self.clone().relay_events(engine_events)));
        }
        tracing::info!("wallet connected");
        self.emit(WalletEvent::Connected).await;
        self.refresh_balance().await;
    }

    fn relay_events(self, mut rx: broadcast::Receiver<EngineEvent>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "engine events lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                self.handle_engine_event(event).await;
            }
        })
    }

    async fn handle_engine_event(&self, event: EngineEvent) {
        if let Some(public) = WalletEvent::from_engine(&event) {
            self.emit(public).await;
        }
        match event {
            EngineEvent::PaymentReceived(_) | EngineEvent::PaymentSent(_) | EngineEvent::InvoicePaid { .. } => {
                self.refresh_balance().await;
            }
            EngineEvent::PaymentFailed { .. } | EngineEvent::Synced => {}
            EngineEvent::Disconnected { reason } => {
                tracing::warn!(%reason, "engine connection lost");
                let dropped = {
                    let mut state = self.inner.state.write().await;
                    std::mem::replace(&mut state.connected, false)
                };
                if dropped {
                    self.emit(WalletEvent::Disconnected).await;
                    self.schedule_reconnect().await;
                }
            }
        }
    }

    async fn schedule_reconnect(&self) {
        let mut state = self.inner.state.write().await;
        if state.reconnect_task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        if state.config.is_none() {
            return;
        }
        state.reconnect_task = Some(tokio::spawn(self.clone().reconnect_loop()));
    }

    fn reconnect_loop(self) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let max = self.inner.settings.max_reconnect_attempts;
            loop {
                let (attempt, config) = {
                    let mut state = self.inner.state.write().await;
                    if state.connected {
                        return;
                    }
                    if state.reconnect_attempts >= max {
                        let attempts = state.reconnect_attempts;
                        drop(state);
                        tracing::error!(attempts, "giving up on wallet reconnection");
                        self.emit(WalletEvent::ReconnectExhausted { attempts }).await;
                        return;
                    }
                    state.reconnect_attempts += 1;
                    (state.reconnect_attempts, state.config.clone())
                };
                let Some(config) = config else { return };

                let delay = self.inner.settings.reconnect_base_delay * attempt;
                tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "scheduling wallet reconnection");
                self.emit(WalletEvent::Reconnecting { attempt, delay }).await;
                tokio::time::sleep(delay).await;

                match self.inner.engine.connect(&config).await {
                    Ok(()) => {
                        self.on_connected().await;
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(attempt, error = %e, "wallet reconnection failed");
                        self.emit(WalletEvent::Error { message: e.to_string() }).await;
                    }
                }
            }
        })
    }
}
