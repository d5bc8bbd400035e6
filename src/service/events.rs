//! Wallet events published to subscribers.

use serde::Serialize;
use std::time::Duration;

use super::engine::{EngineEvent, Payment};

/// Events published by [`super::WalletService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WalletEvent {
    Connected,
    Disconnected,
    BalanceUpdated { balance_sat: u64 },
    PaymentReceived { payment: Payment },
    PaymentSent { payment: Payment },
    PaymentFailed { payment_hash: Option<String>, error: String },
    InvoicePaid { payment_hash: String },
    Reconnecting { attempt: u32, #[serde(with = "millis")] delay: Duration },
    /// Automatic reconnection gave up; only an explicit `connect` retries.
    ReconnectExhausted { attempts: u32 },
    Error { message: String },
}

impl WalletEvent {
    /// Map an engine callback to its public event. `None` for engine-internal events.
    pub(crate) fn from_engine(event: &EngineEvent) -> Option<Self> {
        Some(match event {
            EngineEvent::PaymentReceived(p) => WalletEvent::PaymentReceived { payment: p.clone() },
            EngineEvent::PaymentSent(p) => WalletEvent::PaymentSent { payment: p.clone() },
            EngineEvent::PaymentFailed { payment_hash, error } => {
                WalletEvent::PaymentFailed { payment_hash: payment_hash.clone(), error: error.clone() }
            }
            EngineEvent::InvoicePaid { payment_hash } => WalletEvent::InvoicePaid { payment_hash: payment_hash.clone() },
            EngineEvent::Synced | EngineEvent::Disconnected { .. } => return None,
        })
    }
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
