//! Zap dispatch.
//!
//! Resolves the recipient's LNURL endpoint, signs the kind 9734 request, fetches
//! an invoice and checks its amount, then walks the rails in order:
//! Embedded, NWC, WebLN. A rail that declines passes the zap on. A rail that
//! dispatched the payment without a confirmation ends the zap as unconfirmed.

use nostr::{Event, Keys};
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

use super::lnurl::{resolve_zap_endpoint, LnurlClient};
use super::rails::{AttemptResult, Rail, RailAttempt, WebLnProvider};
use super::request::build_zap_request;
use super::target::PaymentTarget;
use super::ZapError;
use crate::invoice::decode_bolt11;
use crate::nostr::RelayConnector;
use crate::nwc::{unseal_connection, NwcClient, NwcConfig, NwcError, DEFAULT_TIMEOUT};
use crate::service::{EngineError, WalletError, WalletService};

/// NWC connection as supplied by the caller.
#[derive(Clone)]
pub enum NwcCredential {
    /// NIP-44 sealed to the sender's own key, as stored at rest.
    Sealed(String),
    Uri(Zeroizing<String>),
}

impl std::fmt::Debug for NwcCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NwcCredential::Sealed(_) => f.write_str("Sealed(..)"),
            NwcCredential::Uri(_) => f.write_str("Uri(<redacted>)"),
        }
    }
}

impl NwcCredential {
    fn open(&self, sender: &Keys) -> Result<NwcConfig, NwcError> {
        match self {
            NwcCredential::Sealed(sealed) => unseal_connection(sender, sealed),
            NwcCredential::Uri(uri) => NwcConfig::parse(uri),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ZapRequest {
    pub target: PaymentTarget,
    pub amount_sats: u64,
    pub comment: String,
    /// Written into the zap request's `relays` tag.
    pub relays: Vec<String>,
    pub nwc: Option<NwcCredential>,
    pub prefer_embedded: bool,
}

impl ZapRequest {
    pub fn new(target: PaymentTarget, amount_sats: u64) -> Self {
        Self { target, amount_sats, comment: String::new(), relays: Vec::new(), nwc: None, prefer_embedded: false }
    }
}

/// Result of one zap. `error` holds the last failure when `success` is false.
#[derive(Debug, Clone)]
pub struct ZapOutcome {
    pub success: bool,
    pub zap_request: Option<Event>,
    pub rail: Option<Rail>,
    pub preimage: Option<String>,
    pub error: Option<ZapError>,
    pub attempts: Vec<RailAttempt>,
}

impl ZapOutcome {
    fn failed(error: ZapError, zap_request: Option<Event>, attempts: Vec<RailAttempt>) -> Self {
        Self { success: false, zap_request, rail: None, preimage: None, error: Some(error), attempts }
    }
}

pub struct ZapDispatcher {
    lnurl: Arc<dyn LnurlClient>,
    connector: Arc<dyn RelayConnector>,
    wallet: Option<WalletService>,
    webln: Option<Arc<dyn WebLnProvider>>,
    nwc_timeout: Duration,
}

impl ZapDispatcher {
    pub fn new(lnurl: Arc<dyn LnurlClient>, connector: Arc<dyn RelayConnector>) -> Self {
        Self { lnurl, connector, wallet: None, webln: None, nwc_timeout: DEFAULT_TIMEOUT }
    }

    pub fn with_wallet(mut self, wallet: WalletService) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn with_webln(mut self, provider: Arc<dyn WebLnProvider>) -> Self {
        self.webln = Some(provider);
        self
    }

    pub fn with_nwc_timeout(mut self, timeout: Duration) -> Self {
        self.nwc_timeout = timeout;
        self
    }

    /// Zap `request.target` from `sender`. Never returns an error; see [`ZapOutcome`].
    pub async fn zap(&self, sender: &Keys, request: ZapRequest) -> ZapOutcome {
        let kind = request.target.kind();
        tracing::info!(target_kind = kind, amount_sats = request.amount_sats, "zap started");
        let outcome = self.run(sender, request).await;
        match (&outcome.rail, &outcome.error) {
            (Some(rail), _) => tracing::info!(%rail, target_kind = kind, "zap paid"),
            (None, Some(e)) => tracing::warn!(error = %e, target_kind = kind, "zap failed"),
            (None, None) => {}
        }
        outcome
    }

    async fn run(&self, sender: &Keys, request: ZapRequest) -> ZapOutcome {
        let amount_msat = match amount_msat(request.amount_sats) {
            Ok(msat) => msat,
            Err(e) => return ZapOutcome::failed(e, None, Vec::new()),
        };

        let endpoint = match resolve_zap_endpoint(self.lnurl.as_ref(), request.target.recipient(), amount_msat).await {
            Ok(endpoint) => endpoint,
            Err(e) => return ZapOutcome::failed(ZapError::NoEndpoint(e), None, Vec::new()),
        };

        let zap_request = match build_zap_request(
            sender,
            &request.target,
            amount_msat,
            &endpoint.lnurl,
            &request.relays,
            &request.comment,
        ) {
            Ok(event) => event,
            Err(e) => return ZapOutcome::failed(e, None, Vec::new()),
        };
        let zap_json = match serde_json::to_string(&zap_request) {
            Ok(json) => json,
            Err(e) => return ZapOutcome::failed(ZapError::Signing(e.to_string()), None, Vec::new()),
        };

        let invoice = match self.lnurl.request_invoice(&endpoint.callback, amount_msat, &zap_json, &endpoint.lnurl).await {
            Ok(pr) => pr,
            Err(e) => return ZapOutcome::failed(ZapError::Invoice(e), Some(zap_request), Vec::new()),
        };

        let actual_msat = decode_bolt11(&invoice).and_then(|i| i.amount_milli_satoshis());
        if actual_msat != Some(amount_msat) {
            let err = ZapError::InvoiceMismatch { expected_msat: amount_msat, actual_msat };
            return ZapOutcome::failed(err, Some(zap_request), Vec::new());
        }

        let mut attempts = Vec::new();
        for rail in [Rail::Embedded, Rail::Nwc, Rail::WebLn] {
            let Some(result) = self.try_rail(rail, sender, &request, &invoice).await else {
                continue;
            };
            tracing::debug!(%rail, ?result, "rail attempt");
            attempts.push(RailAttempt { rail, result: result.clone() });
            match result {
                AttemptResult::Paid { preimage } => {
                    return ZapOutcome {
                        success: true,
                        zap_request: Some(zap_request),
                        rail: Some(rail),
                        preimage,
                        error: None,
                        attempts,
                    };
                }
                AttemptResult::Unconfirmed { reason } => {
                    let err = ZapError::Unconfirmed { rail, message: reason };
                    return ZapOutcome::failed(err, Some(zap_request), attempts);
                }
                AttemptResult::Declined { .. } => {}
            }
        }

        let err = match attempts.last().map(|a| &a.result) {
            Some(AttemptResult::Declined { reason }) => ZapError::Declined(reason.clone()),
            _ => ZapError::NoRail,
        };
        ZapOutcome::failed(err, Some(zap_request), attempts)
    }

    /// `None` when the rail is not available for this zap.
    async fn try_rail(&self, rail: Rail, sender: &Keys, request: &ZapRequest, invoice: &str) -> Option<AttemptResult> {
        match rail {
            Rail::Embedded => {
                let wallet = self.wallet.as_ref().filter(|_| request.prefer_embedded)?;
                if !wallet.is_connected().await {
                    tracing::debug!("embedded wallet not connected, skipping");
                    return None;
                }
                Some(match wallet.pay_invoice(invoice).await {
                    Ok(payment) => AttemptResult::Paid { preimage: payment.preimage },
                    Err(e @ WalletError::Engine(EngineError::Unconfirmed(_))) => {
                        AttemptResult::Unconfirmed { reason: e.to_string() }
                    }
                    Err(e) => AttemptResult::Declined { reason: e.to_string() },
                })
            }
            Rail::Nwc => {
                let credential = request.nwc.as_ref()?;
                let config = match credential.open(sender) {
                    Ok(config) => config,
                    Err(e) => return Some(AttemptResult::Declined { reason: e.to_string() }),
                };
                let client = NwcClient::new(config, self.connector.clone()).with_timeout(self.nwc_timeout);
                Some(match client.pay_invoice(invoice).await {
                    Ok(result) => AttemptResult::Paid { preimage: Some(result.preimage) },
                    Err(e) if e.is_definitive() => AttemptResult::Declined { reason: e.to_string() },
                    Err(e) => AttemptResult::Unconfirmed { reason: e.to_string() },
                })
            }
            Rail::WebLn => {
                let provider = self.webln.as_ref()?;
                if let Err(e) = provider.enable().await {
                    return Some(AttemptResult::Declined { reason: format!("WebLN enable: {e}") });
                }
                Some(match provider.send_payment(invoice).await {
                    Ok(payment) => AttemptResult::Paid { preimage: Some(payment.preimage) },
                    Err(e) => AttemptResult::Declined { reason: e.to_string() },
                })
            }
        }
    }
}

fn amount_msat(amount_sats: u64) -> Result<u64, ZapError> {
    if amount_sats == 0 {
        return Err(ZapError::InvalidAmount("amount must be positive".into()));
    }
    amount_sats
        .checked_mul(1000)
        .ok_or_else(|| ZapError::InvalidAmount(format!("{amount_sats} sats overflows msat")))
}
