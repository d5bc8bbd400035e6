//! Payment input classification (BOLT11 / Lightning address / LNURL).

use lightning_invoice::Bolt11Invoice;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub enum PaymentInput {
    Bolt11(Box<Bolt11Invoice>),
    /// `name@domain` (LUD-16)
    LightningAddress(String),
    /// bech32 `lnurl1…` (LUD-06)
    Lnurl(String),
    Unknown,
}

impl PaymentInput {
    pub fn kind(&self) -> &'static str {
        match self {
            PaymentInput::Bolt11(_) => "bolt11",
            PaymentInput::LightningAddress(_) => "lightning_address",
            PaymentInput::Lnurl(_) => "lnurl",
            PaymentInput::Unknown => "unknown",
        }
    }
}

/// Classify user input. A `lightning:` URI prefix is ignored.
pub fn parse_payment_input(raw: &str) -> PaymentInput {
    let trimmed = raw.trim();
    let body = strip_scheme(trimmed);
    if body.is_empty() {
        return PaymentInput::Unknown;
    }

    let lower = body.to_ascii_lowercase();
    if lower.starts_with("ln") && !lower.starts_with("lnurl") {
        if let Ok(invoice) = Bolt11Invoice::from_str(&lower) {
            return PaymentInput::Bolt11(Box::new(invoice));
        }
        return PaymentInput::Unknown;
    }
    if lower.starts_with("lnurl1") {
        return PaymentInput::Lnurl(lower);
    }
    if is_lightning_address(body) {
        return PaymentInput::LightningAddress(lower);
    }
    PaymentInput::Unknown
}

/// Decode a BOLT11 invoice, `None` if it does not parse.
pub fn decode_bolt11(raw: &str) -> Option<Bolt11Invoice> {
    Bolt11Invoice::from_str(&strip_scheme(raw.trim()).to_ascii_lowercase()).ok()
}

pub fn is_lightning_address(value: &str) -> bool {
    match value.split_once('@') {
        Some((name, domain)) => {
            !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || "-_.+".contains(c))
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.chars().all(|c| c.is_ascii_alphanumeric() || "-.:".contains(c))
        }
        None => false,
    }
}

fn strip_scheme(value: &str) -> &str {
    match value.get(..10) {
        Some(prefix) if prefix.eq_ignore_ascii_case("lightning:") => &value[10..],
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_addresses() {
        assert!(matches!(parse_payment_input("Alice@Example.com"), PaymentInput::LightningAddress(a) if a == "alice@example.com"));
        assert!(matches!(parse_payment_input("lightning:bob@wallet.io"), PaymentInput::LightningAddress(_)));
        assert!(!is_lightning_address("@example.com"));
        assert!(!is_lightning_address("alice@localhost"));
        assert!(!is_lightning_address("alice@.com"));
    }

    #[test]
    fn classifies_lnurl_and_garbage() {
        assert!(matches!(parse_payment_input("LNURL1DP68GURN8GHJ7"), PaymentInput::Lnurl(_)));
        assert!(matches!(parse_payment_input("lnbc1garbage"), PaymentInput::Unknown));
        assert!(matches!(parse_payment_input("bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu"), PaymentInput::Unknown));
        assert!(matches!(parse_payment_input("   "), PaymentInput::Unknown));
        assert_eq!(parse_payment_input("hello").kind(), "unknown");
    }
}
