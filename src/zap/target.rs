//! Zap targets: a profile, a note, or an addressable article.

use serde::{Deserialize, Serialize};

/// Who gets paid.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Recipient {
    /// Hex public key
    pub pubkey: String,
    /// Lightning address `name@domain`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lud16: Option<String>,
    /// bech32 `lnurl1…`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lud06: Option<String>,
}

impl Recipient {
    pub fn new(pubkey: impl Into<String>) -> Self { Self { pubkey: pubkey.into(), ..Default::default() } }
    pub fn with_lud16(mut self, address: impl Into<String>) -> Self { self.lud16 = Some(address.into()); self }
    pub fn with_lud06(mut self, lnurl: impl Into<String>) -> Self { self.lud06 = Some(lnurl.into()); self }
}

/// Something that can be zapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentTarget {
    Note { event_id: String, author: Recipient },
    /// Long-form article, addressed by `30023:<pubkey>:<d>`.
    Article { coordinate: String, author: Recipient },
    Profile { recipient: Recipient },
    /// DVM job result event.
    Dvm { event_id: String, provider: Recipient },
    /// Live stream, addressed by `30311:<pubkey>:<d>`.
    Stream { coordinate: String, host: Recipient },
}

impl PaymentTarget {
    pub fn recipient(&self) -> &Recipient {
        match self {
            PaymentTarget::Note { author, .. } | PaymentTarget::Article { author, .. } => author,
            PaymentTarget::Profile { recipient } => recipient,
            PaymentTarget::Dvm { provider, .. } => provider,
            PaymentTarget::Stream { host, .. } => host,
        }
    }

    /// The `e` or `a` tag for the zapped content, if any.
    pub fn content_tag(&self) -> Option<[String; 2]> {
        match self {
            PaymentTarget::Note { event_id, .. } | PaymentTarget::Dvm { event_id, .. } => {
                Some(["e".into(), event_id.clone()])
            }
            PaymentTarget::Article { coordinate, .. } | PaymentTarget::Stream { coordinate, .. } => {
                Some(["a".into(), coordinate.clone()])
            }
            PaymentTarget::Profile { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PaymentTarget::Note { .. } => "note",
            PaymentTarget::Article { .. } => "article",
            PaymentTarget::Profile { .. } => "profile",
            PaymentTarget::Dvm { .. } => "dvm",
            PaymentTarget::Stream { .. } => "stream",
        }
    }
}
