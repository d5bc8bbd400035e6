//! Zaps (NIP-57) - resolve the recipient, fetch an invoice, pay it on the first rail that works.
//!
//! # Flow
//!
//! ```text
//! PaymentTarget ── lud16 / lud06 ──► LNURL pay endpoint (allowsNostr, nostrPubkey, callback)
//!       │
//!       ├── kind 9734 zap request (relays, amount, lnurl, p, e|a)
//!       │
//!       └── callback?amount&nostr ──► BOLT11 (amount checked)
//!                 │
//!                 ├── Embedded   WalletService            (prefer_embedded && connected)
//!                 ├── Nwc        NIP-47 over relays       (credential supplied)
//!                 └── WebLn      injected provider        (provider available)
//! ```
//!
//! A rail that declines falls through to the next one. A rail that may have paid
//! (NWC timeout) ends the zap.

mod dispatch;
pub mod lnurl;
mod rails;
mod request;
mod target;

pub use dispatch::{NwcCredential, ZapDispatcher, ZapOutcome, ZapRequest};
pub use lnurl::{resolve_zap_endpoint, HttpLnurlClient, LnurlClient, LnurlError, LnurlPayInfo, ZapEndpoint};
pub use rails::{AttemptResult, Rail, RailAttempt, WebLnPayment, WebLnProvider};
pub use request::build_zap_request;
pub use target::{PaymentTarget, Recipient};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ZapError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
    #[error("no zap endpoint: {0}")]
    NoEndpoint(LnurlError),
    #[error("zap request: {0}")]
    Signing(String),
    #[error("invoice request failed: {0}")]
    Invoice(LnurlError),
    #[error("invoice amount {actual_msat:?} msat does not match requested {expected_msat} msat")]
    InvoiceMismatch { expected_msat: u64, actual_msat: Option<u64> },
    #[error("no payment method available")]
    NoRail,
    #[error("payment failed: {0}")]
    Declined(String),
    #[error("payment via {rail} not confirmed: {message}")]
    Unconfirmed { rail: Rail, message: String },
}
