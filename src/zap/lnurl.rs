//! LNURL-pay resolution (LUD-06, LUD-16) and zap invoice requests (NIP-57).

use async_trait::async_trait;
use bitcoin::bech32::{self, Bech32, Hrp};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::target::Recipient;
use crate::invoice::is_lightning_address;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LnurlError {
    #[error("recipient has no zap endpoint")]
    NoEndpoint,
    #[error("invalid lightning address: {0}")]
    InvalidAddress(String),
    #[error("invalid lnurl: {0}")]
    InvalidLnurl(String),
    #[error("LNURL request failed: {0}")]
    Http(String),
    #[error("malformed LNURL response: {0}")]
    Malformed(String),
    #[error("recipient endpoint does not accept zaps")]
    NostrUnsupported,
    #[error("{amount_msat} msat outside endpoint range {min_msat}..={max_msat}")]
    AmountOutOfRange { amount_msat: u64, min_msat: u64, max_msat: u64 },
    #[error("LNURL service error: {0}")]
    Service(String),
}

/// First response of an LNURL-pay endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LnurlPayInfo {
    #[serde(default)]
    pub callback: String,
    #[serde(default)]
    pub min_sendable: Option<u64>,
    #[serde(default)]
    pub max_sendable: Option<u64>,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub allows_nostr: Option<bool>,
    #[serde(default)]
    pub nostr_pubkey: Option<String>,
    #[serde(default)]
    pub comment_allowed: Option<u32>,
}

/// A resolved endpoint that accepts zaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZapEndpoint {
    /// Pay endpoint URL
    pub url: String,
    /// bech32 encoding of `url`
    pub lnurl: String,
    pub callback: String,
    /// Key that signs zap receipts
    pub nostr_pubkey: String,
    pub min_sendable: Option<u64>,
    pub max_sendable: Option<u64>,
}

#[async_trait]
pub trait LnurlClient: Send + Sync {
    async fn fetch_pay_info(&self, url: &str) -> Result<LnurlPayInfo, LnurlError>;
    /// Ask the callback for an invoice carrying the zap request. Returns the BOLT11 `pr`.
    async fn request_invoice(
        &self,
        callback: &str,
        amount_msat: u64,
        zap_request: &str,
        lnurl: &str,
    ) -> Result<String, LnurlError>;
}

/// reqwest-backed client.
#[derive(Debug, Clone)]
pub struct HttpLnurlClient {
    http: reqwest::Client,
}

impl HttpLnurlClient {
    pub fn new(timeout: Duration) -> Result<Self, LnurlError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LnurlError::Http(e.to_string()))?;
        Ok(Self { http })
    }

    async fn get_json(&self, url: Url) -> Result<Value, LnurlError> {
        let response = self.http.get(url).send().await.map_err(|e| LnurlError::Http(e.to_string()))?;
        let status = response.status();
        let body: Value = response.json().await.map_err(|e| LnurlError::Malformed(e.to_string()))?;
        if let Some(reason) = service_error(&body) {
            return Err(LnurlError::Service(reason));
        }
        if !status.is_success() {
            return Err(LnurlError::Http(format!("HTTP {status}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl LnurlClient for HttpLnurlClient {
    async fn fetch_pay_info(&self, url: &str) -> Result<LnurlPayInfo, LnurlError> {
        let url = Url::parse(url).map_err(|e| LnurlError::InvalidLnurl(e.to_string()))?;
        let body = self.get_json(url).await?;
        serde_json::from_value(body).map_err(|e| LnurlError::Malformed(e.to_string()))
    }

    async fn request_invoice(
        &self,
        callback: &str,
        amount_msat: u64,
        zap_request: &str,
        lnurl: &str,
    ) -> Result<String, LnurlError> {
        let url = invoice_url(callback, amount_msat, zap_request, lnurl)?;
        let body = self.get_json(url).await?;
        body.get("pr")
            .and_then(Value::as_str)
            .filter(|pr| !pr.is_empty())
            .map(str::to_string)
            .ok_or_else(|| LnurlError::Malformed("callback response has no pr".into()))
    }
}

/// `{status: "ERROR", reason}` bodies.
fn service_error(body: &Value) -> Option<String> {
    let status = body.get("status")?.as_str()?;
    status.eq_ignore_ascii_case("error").then(|| {
        body.get("reason").and_then(Value::as_str).unwrap_or("unspecified").to_string()
    })
}

/// `{callback}?amount=…&nostr=…&lnurl=…`, keeping any query the callback already has.
pub fn invoice_url(callback: &str, amount_msat: u64, zap_request: &str, lnurl: &str) -> Result<Url, LnurlError> {
    let mut url = Url::parse(callback).map_err(|e| LnurlError::Malformed(format!("callback: {e}")))?;
    url.query_pairs_mut()
        .append_pair("amount", &amount_msat.to_string())
        .append_pair("nostr", zap_request)
        .append_pair("lnurl", lnurl);
    Ok(url)
}

/// `name@domain` → `https://domain/.well-known/lnurlp/name` (http for onion hosts).
pub fn address_to_url(address: &str) -> Result<String, LnurlError> {
    let address = address.trim();
    if !is_lightning_address(address) {
        return Err(LnurlError::InvalidAddress(address.to_string()));
    }
    let (name, domain) = address
        .split_once('@')
        .ok_or_else(|| LnurlError::InvalidAddress(address.to_string()))?;
    let scheme = if domain.ends_with(".onion") { "http" } else { "https" };
    Ok(format!("{scheme}://{}/.well-known/lnurlp/{}", domain.to_ascii_lowercase(), name.to_ascii_lowercase()))
}

pub fn encode_lnurl(url: &str) -> Result<String, LnurlError> {
    let hrp = Hrp::parse("lnurl").map_err(|e| LnurlError::InvalidLnurl(e.to_string()))?;
    let encoded = bech32::encode::<Bech32>(hrp, url.as_bytes()).map_err(|e| LnurlError::InvalidLnurl(e.to_string()))?;
    Ok(encoded.to_ascii_uppercase())
}

pub fn decode_lnurl(lnurl: &str) -> Result<String, LnurlError> {
    let trimmed = lnurl.trim();
    let trimmed = trimmed.strip_prefix("lightning:").unwrap_or(trimmed);
    let (hrp, data) = bech32::decode(trimmed).map_err(|e| LnurlError::InvalidLnurl(e.to_string()))?;
    if !hrp.to_string().eq_ignore_ascii_case("lnurl") {
        return Err(LnurlError::InvalidLnurl(format!("unexpected prefix {hrp}")));
    }
    String::from_utf8(data).map_err(|e| LnurlError::InvalidLnurl(e.to_string()))
}

/// Pay endpoint URL for a recipient: lud16 first, then lud06.
pub fn recipient_url(recipient: &Recipient) -> Result<String, LnurlError> {
    match (recipient.lud16.as_deref(), recipient.lud06.as_deref()) {
        (Some(address), _) if !address.trim().is_empty() => address_to_url(address),
        (_, Some(lnurl)) if !lnurl.trim().is_empty() => decode_lnurl(lnurl),
        _ => Err(LnurlError::NoEndpoint),
    }
}

/// Resolve and check a recipient's zap endpoint for `amount_msat`.
pub async fn resolve_zap_endpoint(
    client: &dyn LnurlClient,
    recipient: &Recipient,
    amount_msat: u64,
) -> Result<ZapEndpoint, LnurlError> {
    let url = recipient_url(recipient)?;
    let info = client.fetch_pay_info(&url).await?;

    if let Some(tag) = info.tag.as_deref() {
        if tag != "payRequest" {
            return Err(LnurlError::Malformed(format!("unexpected tag {tag}")));
        }
    }
    if info.allows_nostr != Some(true) {
        return Err(LnurlError::NostrUnsupported);
    }
    let nostr_pubkey = info
        .nostr_pubkey
        .filter(|pk| nostr::PublicKey::from_hex(pk).is_ok())
        .ok_or(LnurlError::NostrUnsupported)?;
    if info.callback.is_empty() {
        return Err(LnurlError::Malformed("missing callback".into()));
    }

    let min_msat = info.min_sendable.unwrap_or(0);
    let max_msat = info.max_sendable.unwrap_or(u64::MAX);
    if amount_msat < min_msat || amount_msat > max_msat {
        return Err(LnurlError::AmountOutOfRange { amount_msat, min_msat, max_msat });
    }

    Ok(ZapEndpoint {
        lnurl: encode_lnurl(&url)?,
        url,
        callback: info.callback,
        nostr_pubkey,
        min_sendable: info.min_sendable,
        max_sendable: info.max_sendable,
    })
}
