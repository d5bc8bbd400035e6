//! Vault - BIP39 mnemonics and password-sealed mnemonic records.
//!
//! Key derivation is Argon2id over a random 16-byte salt. The mnemonic is sealed with
//! XChaCha20-Poly1305 under a random 24-byte nonce. Any failure to open a record is
//! reported as [`VaultError::Decrypt`] so a wrong password and a corrupted record look
//! the same to the caller.

mod wizard;

pub use wizard::{create_wallet, restore_wallet, verify_backup, BackupChallenge, NewWallet};

use argon2::Argon2;
use bip39::{Language, Mnemonic};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 24;
const KEY_LEN: usize = 32;
const AAD_MNEMONIC: &[u8] = b"beezap-mnemonic";

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("word_count must be 12 or 24, got {0}")]
    InvalidWordCount(u8),
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("encryption failed")]
    Encrypt,
    #[error("incorrect password or corrupted data")]
    Decrypt,
}

/// Sealed mnemonic as persisted. All fields are standard base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedMnemonicRecord {
    pub ciphertext: String,
    pub nonce: String,
    pub salt: String,
}

/// Generate a new English BIP39 mnemonic (12 or 24 words).
pub fn generate_mnemonic(word_count: u8) -> Result<String, VaultError> {
    let entropy_len = match word_count {
        12 => 16,
        24 => 32,
        _ => return Err(VaultError::InvalidWordCount(word_count)),
    };

    let mut entropy = Zeroizing::new(vec![0u8; entropy_len]);
    OsRng.fill_bytes(&mut entropy);

    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|err| VaultError::InvalidMnemonic(err.to_string()))?;
    Ok(mnemonic.to_string())
}

/// Validate a BIP39 mnemonic (English wordlist, checksum included).
pub fn validate_mnemonic(mnemonic: &str) -> bool {
    Mnemonic::parse_in(Language::English, normalize(mnemonic).as_str()).is_ok()
}

/// Collapse whitespace and lowercase, the form users type phrases back in.
pub fn normalize(mnemonic: &str) -> String {
    mnemonic
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn encrypt_mnemonic(mnemonic: &str, password: &str) -> Result<EncryptedMnemonicRecord, VaultError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let key = derive_key(password, &salt)?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));
    let ciphertext = cipher
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload { msg: mnemonic.as_bytes(), aad: AAD_MNEMONIC },
        )
        .map_err(|_| VaultError::Encrypt)?;

    Ok(EncryptedMnemonicRecord {
        ciphertext: encode_base64(&ciphertext),
        nonce: encode_base64(&nonce),
        salt: encode_base64(&salt),
    })
}

pub fn decrypt_mnemonic(
    record: &EncryptedMnemonicRecord,
    password: &str,
) -> Result<Zeroizing<String>, VaultError> {
    let salt = decode_base64(&record.salt)?;
    let nonce = decode_base64(&record.nonce)?;
    let ciphertext = decode_base64(&record.ciphertext)?;
    if nonce.len() != NONCE_LEN || salt.len() != SALT_LEN {
        return Err(VaultError::Decrypt);
    }

    let key = derive_key(password, &salt).map_err(|_| VaultError::Decrypt)?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));
    let mut plaintext = cipher
        .decrypt(
            XNonce::from_slice(&nonce),
            Payload { msg: &ciphertext, aad: AAD_MNEMONIC },
        )
        .map_err(|_| VaultError::Decrypt)?;

    let text = std::str::from_utf8(&plaintext).map(str::to_owned);
    plaintext.zeroize();
    text.map(Zeroizing::new).map_err(|_| VaultError::Decrypt)
}

fn derive_key(password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>, VaultError> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt, &mut key[..])
        .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

fn encode_base64(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}

fn decode_base64(value: &str) -> Result<Vec<u8>, VaultError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|_| VaultError::Decrypt)
}
