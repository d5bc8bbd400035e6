//! NIP-57 zap request (kind 9734) construction.

use nostr::{Event, Keys, Kind, PublicKey, Tag, Timestamp, UnsignedEvent};

use super::target::PaymentTarget;
use super::ZapError;
use crate::nostr::kinds;

/// Signed kind 9734 zap request. Not published; it travels to the LNURL callback.
pub fn build_zap_request(
    sender: &Keys,
    target: &PaymentTarget,
    amount_msat: u64,
    lnurl: &str,
    relays: &[String],
    comment: &str,
) -> Result<Event, ZapError> {
    let recipient = PublicKey::from_hex(&target.recipient().pubkey)
        .map_err(|e| ZapError::InvalidRecipient(e.to_string()))?;

    let mut raw: Vec<Vec<String>> = Vec::with_capacity(5);
    raw.push(std::iter::once("relays".to_string()).chain(relays.iter().cloned()).collect());
    raw.push(vec!["amount".into(), amount_msat.to_string()]);
    raw.push(vec!["lnurl".into(), lnurl.to_string()]);
    raw.push(vec!["p".into(), recipient.to_hex()]);
    if let Some(tag) = target.content_tag() {
        raw.push(tag.to_vec());
    }

    let tags = raw
        .iter()
        .map(|parts| Tag::parse(parts).map_err(|e| ZapError::Signing(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    UnsignedEvent::new(sender.public_key(), Timestamp::now(), Kind::Custom(kinds::ZAP_REQUEST), tags, comment.to_string())
        .sign_with_keys(sender)
        .map_err(|e| ZapError::Signing(e.to_string()))
}
