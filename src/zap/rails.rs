//! Payment rails and the per-rail attempt log.
//!
//! WebLN is reached through [`WebLnProvider`], supplied by the host.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Payment rails in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rail {
    Embedded,
    Nwc,
    WebLn,
}

impl fmt::Display for Rail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rail::Embedded => "embedded wallet",
            Rail::Nwc => "NWC",
            Rail::WebLn => "WebLN",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AttemptResult {
    Paid { preimage: Option<String> },
    /// The rail did not pay; the next rail may be tried.
    Declined { reason: String },
    /// The payment may have gone out; no further rail is tried.
    Unconfirmed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RailAttempt {
    pub rail: Rail,
    #[serde(flatten)]
    pub result: AttemptResult,
}

impl RailAttempt {
    pub fn is_paid(&self) -> bool { matches!(self.result, AttemptResult::Paid { .. }) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebLnPayment {
    pub preimage: String,
}

/// Host-provided WebLN capability (browser extension, mobile bridge).
#[async_trait]
pub trait WebLnProvider: Send + Sync {
    async fn enable(&self) -> anyhow::Result<()>;
    async fn send_payment(&self, invoice: &str) -> anyhow::Result<WebLnPayment>;
}
