//! Invoice watcher - polls recent payments until the invoice settles.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::engine::PaymentStatus;
use super::WalletService;

/// How many recent payments each poll scans for the watched hash.
const SCAN_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceStatus {
    Pending,
    Paid { amount_msat: u64 },
    Failed,
}

impl InvoiceStatus {
    pub fn is_final(&self) -> bool { !matches!(self, InvoiceStatus::Pending) }
}

/// Background poll of an invoice. Polling stops when the invoice settles
/// or the watch is dropped.
pub struct InvoiceWatch {
    status: watch::Receiver<InvoiceStatus>,
    task: JoinHandle<()>,
}

impl InvoiceWatch {
    pub(super) fn spawn(service: WalletService, payment_hash: String, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(InvoiceStatus::Pending);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let payments = match service.list_payments(SCAN_LIMIT).await {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::debug!(error = %e, hash = %payment_hash, "invoice poll failed");
                        continue;
                    }
                };
                let found = payments
                    .iter()
                    .find(|p| p.payment_hash.as_deref() == Some(payment_hash.as_str()));
                let status = match found.map(|p| (p.status, p.amount_msat)) {
                    Some((PaymentStatus::Complete, amount_msat)) => InvoiceStatus::Paid { amount_msat },
                    Some((PaymentStatus::Failed, _)) => InvoiceStatus::Failed,
                    _ => continue,
                };
                tracing::info!(hash = %payment_hash, ?status, "invoice settled");
                let _ = tx.send(status);
                break;
            }
        });
        Self { status: rx, task }
    }

    pub fn status(&self) -> InvoiceStatus { self.status.borrow().clone() }

    /// Wait for a final status. `None` if the poller stopped without one.
    pub async fn settled(&mut self) -> Option<InvoiceStatus> {
        loop {
            let current = self.status.borrow_and_update().clone();
            if current.is_final() {
                return Some(current);
            }
            if self.status.changed().await.is_err() {
                let last = self.status.borrow().clone();
                return last.is_final().then_some(last);
            }
        }
    }

    /// True once the poll task has exited.
    pub fn is_finished(&self) -> bool { self.task.is_finished() }
}

impl Drop for InvoiceWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}
