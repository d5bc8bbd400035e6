//! `nostr+walletconnect://` URIs and sealing them for storage.

use nostr::nips::nip44;
use nostr::{Keys, PublicKey, SecretKey};
use reqwest::Url;

use super::NwcError;

pub const SCHEME: &str = "nostr+walletconnect";

/// Parsed `nostr+walletconnect://<wallet-pubkey>?relay=…&secret=…[&lud16=…]`.
#[derive(Clone, PartialEq, Eq)]
pub struct NwcConfig {
    pub wallet_pubkey: PublicKey,
    pub relays: Vec<String>,
    secret: SecretKey,
    pub lud16: Option<String>,
}

impl std::fmt::Debug for NwcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NwcConfig")
            .field("wallet_pubkey", &self.wallet_pubkey.to_hex())
            .field("relays", &self.relays)
            .field("secret", &"<redacted>")
            .field("lud16", &self.lud16)
            .finish()
    }
}

impl NwcConfig {
    pub fn new(wallet_pubkey: PublicKey, relays: Vec<String>, secret: SecretKey) -> Self {
        Self { wallet_pubkey, relays, secret, lud16: None }
    }

    pub fn parse(uri: &str) -> Result<Self, NwcError> {
        let url = Url::parse(uri.trim()).map_err(|e| NwcError::InvalidUri(e.to_string()))?;
        if url.scheme() != SCHEME {
            return Err(NwcError::InvalidUri(format!("expected {SCHEME}:// scheme, got {}", url.scheme())));
        }

        // `scheme://pubkey?…` puts the key in the host, `scheme:pubkey?…` in the path.
        let pubkey_str = url
            .host_str()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| url.path().trim_start_matches('/'));
        let wallet_pubkey = PublicKey::from_hex(pubkey_str)
            .map_err(|e| NwcError::InvalidUri(format!("wallet pubkey: {e}")))?;

        let mut relays = Vec::new();
        let mut secret = None;
        let mut lud16 = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "relay" => relays.push(value.into_owned()),
                "secret" => secret = Some(value.into_owned()),
                "lud16" => lud16 = Some(value.into_owned()),
                _ => {}
            }
        }

        if relays.is_empty() {
            return Err(NwcError::InvalidUri("no relay".into()));
        }
        let secret = secret.ok_or_else(|| NwcError::InvalidUri("missing secret".into()))?;
        let secret = SecretKey::from_hex(&secret).map_err(|e| NwcError::InvalidUri(format!("secret: {e}")))?;

        Ok(Self { wallet_pubkey, relays, secret, lud16 })
    }

    pub fn to_uri(&self) -> String {
        let mut uri = format!("{SCHEME}://{}?", self.wallet_pubkey.to_hex());
        let mut pairs: Vec<(&str, String)> = self.relays.iter().map(|r| ("relay", r.clone())).collect();
        pairs.push(("secret", self.secret.to_secret_hex()));
        if let Some(lud16) = &self.lud16 {
            pairs.push(("lud16", lud16.clone()));
        }
        let query = pairs
            .into_iter()
            .map(|(k, v)| format!("{k}={}", percent_encode(&v)))
            .collect::<Vec<_>>()
            .join("&");
        uri.push_str(&query);
        uri
    }

    /// Keys that sign requests and decrypt responses.
    pub fn client_keys(&self) -> Keys { Keys::new(self.secret.clone()) }
}

/// Encrypt a connection string to the owner's own key (NIP-44 v2).
pub fn seal_connection(owner: &Keys, uri: &str) -> Result<String, NwcError> {
    nip44::encrypt(owner.secret_key(), &owner.public_key(), uri, nip44::Version::V2)
        .map_err(|e| NwcError::Crypto(e.to_string()))
}

/// Decrypt and parse a sealed connection string.
pub fn unseal_connection(owner: &Keys, sealed: &str) -> Result<NwcConfig, NwcError> {
    let uri = zeroize::Zeroizing::new(
        nip44::decrypt(owner.secret_key(), &owner.public_key(), sealed)
            .map_err(|e| NwcError::Crypto(e.to_string()))?,
    );
    NwcConfig::parse(&uri)
}

fn percent_encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}
