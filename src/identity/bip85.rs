//! BIP85 - Deterministic Entropy from BIP32 Keychains
//!
//! The Lightning engine and the Nostr key each get a child mnemonic so that a
//! compromised subsystem does not expose the other.
//!
//! Reference: https://bips.xyz/85

use bip39::Mnemonic;
use bitcoin::bip32::{DerivationPath, Xpriv};
use bitcoin::secp256k1::Secp256k1;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::str::FromStr;
use zeroize::Zeroizing;

/// BIP85 application indices
pub const INDEX_LIGHTNING: u32 = 0;
pub const INDEX_NOSTR: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum Bip85Error {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("Derivation failed: {0}")]
    DerivationFailed(String),
    #[error("Invalid word count: {0}")]
    InvalidWordCount(u32),
}

/// Derive a child mnemonic at `m/83696968'/39'/0'/{words}'/{index}'`.
pub fn derive_mnemonic(
    master_mnemonic: &str,
    passphrase: Option<&str>,
    words: u32,
    index: u32,
) -> Result<String, Bip85Error> {
    let entropy_bytes = match words {
        12 => 16,
        24 => 32,
        _ => return Err(Bip85Error::InvalidWordCount(words)),
    };

    let mnemonic = Mnemonic::parse_normalized(master_mnemonic)
        .map_err(|e| Bip85Error::InvalidMnemonic(e.to_string()))?;
    let seed = Zeroizing::new(mnemonic.to_seed(passphrase.unwrap_or("")));

    let secp = Secp256k1::new();
    let master_xpriv = Xpriv::new_master(bitcoin::Network::Bitcoin, &seed[..])
        .map_err(|e| Bip85Error::DerivationFailed(e.to_string()))?;

    // 83696968 = "BIP85", 39 = BIP39 application, 0 = English
    let path = DerivationPath::from_str(&format!("m/83696968'/39'/0'/{}'/{}'", words, index))
        .map_err(|e| Bip85Error::DerivationFailed(e.to_string()))?;
    let derived = master_xpriv
        .derive_priv(&secp, &path)
        .map_err(|e| Bip85Error::DerivationFailed(e.to_string()))?;

    let mut hmac = Hmac::<Sha512>::new_from_slice(b"bip-entropy-from-k")
        .map_err(|e| Bip85Error::DerivationFailed(e.to_string()))?;
    hmac.update(&derived.private_key.secret_bytes());
    let result = hmac.finalize().into_bytes();

    let child = Mnemonic::from_entropy(&result[..entropy_bytes])
        .map_err(|e| Bip85Error::DerivationFailed(e.to_string()))?;
    Ok(child.to_string())
}

pub fn derive_nostr_mnemonic(master_mnemonic: &str, passphrase: Option<&str>) -> Result<String, Bip85Error> {
    derive_mnemonic(master_mnemonic, passphrase, 12, INDEX_NOSTR)
}

pub fn derive_lightning_mnemonic(master_mnemonic: &str, passphrase: Option<&str>) -> Result<String, Bip85Error> {
    derive_mnemonic(master_mnemonic, passphrase, 12, INDEX_LIGHTNING)
}
