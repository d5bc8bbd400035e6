//! Storage - key-value persistence for the sealed mnemonic and wallet flags.
//!
//! | Key | Value |
//! |-----|-------|
//! | `encrypted_mnemonic` | [`EncryptedMnemonicRecord`] JSON |
//! | `wallet_state` | [`WalletState`] JSON (`{hasWallet, lastConnected}`) |
//! | `nwc_connection` | NWC connection string sealed to the user's Nostr key |
//!
//! Only the sealed record is ever written. There is no plaintext mnemonic key.

#[cfg(feature = "native")]
mod file;
mod memory;

#[cfg(feature = "native")]
pub(crate) use file::data_root;
#[cfg(feature = "native")]
pub use file::FileStore;
pub use memory::MemoryStore;

use crate::vault::{decrypt_mnemonic, EncryptedMnemonicRecord, VaultError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

pub mod keys {
    pub const ENCRYPTED_MNEMONIC: &str = "encrypted_mnemonic";
    pub const WALLET_STATE: &str = "wallet_state";
    pub const NWC_CONNECTION: &str = "nwc_connection";
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Lock,
    #[error("no wallet stored")]
    NoWallet,
    #[error(transparent)]
    Vault(#[from] VaultError),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Minimal string key-value store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub has_wallet: bool,
    pub last_connected: Option<DateTime<Utc>>,
}

/// Typed view over a [`KeyValueStore`].
pub struct WalletStorage<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> WalletStorage<S> {
    pub fn new(store: S) -> Self { Self { store } }

    pub fn save_mnemonic(&self, record: &EncryptedMnemonicRecord) -> StorageResult<()> {
        self.store.set(keys::ENCRYPTED_MNEMONIC, &serde_json::to_string(record)?)?;
        let mut state = self.wallet_state()?;
        state.has_wallet = true;
        self.put_state(&state)
    }

    pub fn load_record(&self) -> StorageResult<Option<EncryptedMnemonicRecord>> {
        match self.store.get(keys::ENCRYPTED_MNEMONIC)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Load and open the stored mnemonic.
    pub fn load_mnemonic(&self, password: &str) -> StorageResult<Zeroizing<String>> {
        let record = self.load_record()?.ok_or(StorageError::NoWallet)?;
        Ok(decrypt_mnemonic(&record, password)?)
    }

    pub fn has_mnemonic(&self) -> StorageResult<bool> {
        Ok(self.store.get(keys::ENCRYPTED_MNEMONIC)?.is_some())
    }

    pub fn wallet_state(&self) -> StorageResult<WalletState> {
        match self.store.get(keys::WALLET_STATE)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(WalletState::default()),
        }
    }

    pub fn mark_connected(&self) -> StorageResult<WalletState> {
        let mut state = self.wallet_state()?;
        state.last_connected = Some(Utc::now());
        self.put_state(&state)?;
        Ok(state)
    }

    pub fn save_nwc(&self, sealed: &str) -> StorageResult<()> {
        self.store.set(keys::NWC_CONNECTION, sealed)
    }

    pub fn load_nwc(&self) -> StorageResult<Option<String>> {
        self.store.get(keys::NWC_CONNECTION)
    }

    /// Forget the wallet entirely.
    pub fn clear(&self) -> StorageResult<()> {
        self.store.remove(keys::ENCRYPTED_MNEMONIC)?;
        self.store.remove(keys::NWC_CONNECTION)?;
        self.store.remove(keys::WALLET_STATE)
    }

    fn put_state(&self, state: &WalletState) -> StorageResult<()> {
        self.store.set(keys::WALLET_STATE, &serde_json::to_string(state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::encrypt_mnemonic;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn save_and_load_mnemonic() {
        let storage = WalletStorage::new(MemoryStore::default());
        assert!(!storage.has_mnemonic().unwrap());
        assert!(!storage.wallet_state().unwrap().has_wallet);

        storage.save_mnemonic(&encrypt_mnemonic(TEST_MNEMONIC, "pw").unwrap()).unwrap();
        assert!(storage.has_mnemonic().unwrap());
        assert!(storage.wallet_state().unwrap().has_wallet);
        assert_eq!(storage.load_mnemonic("pw").unwrap().as_str(), TEST_MNEMONIC);
    }

    #[test]
    fn wrong_password_surfaces_vault_error() {
        let storage = WalletStorage::new(MemoryStore::default());
        storage.save_mnemonic(&encrypt_mnemonic(TEST_MNEMONIC, "pw").unwrap()).unwrap();
        let err = storage.load_mnemonic("nope").unwrap_err();
        assert!(matches!(err, StorageError::Vault(VaultError::Decrypt)));
    }

    #[test]
    fn nothing_stored_in_plaintext() {
        let store = MemoryStore::default();
        let storage = WalletStorage::new(store.clone());
        storage.save_mnemonic(&encrypt_mnemonic(TEST_MNEMONIC, "pw").unwrap()).unwrap();
        for (_, value) in store.snapshot() {
            assert!(!value.contains("abandon"));
        }
    }

    #[test]
    fn state_json_uses_camel_case() {
        let store = MemoryStore::default();
        let storage = WalletStorage::new(store.clone());
        storage.mark_connected().unwrap();
        let raw = store.get(keys::WALLET_STATE).unwrap().unwrap();
        assert!(raw.contains("\"hasWallet\":false"));
        assert!(raw.contains("\"lastConnected\""));
    }

    #[test]
    fn clear_removes_everything() {
        let storage = WalletStorage::new(MemoryStore::default());
        storage.save_mnemonic(&encrypt_mnemonic(TEST_MNEMONIC, "pw").unwrap()).unwrap();
        storage.save_nwc("sealed").unwrap();
        storage.clear().unwrap();
        assert!(!storage.has_mnemonic().unwrap());
        assert!(storage.load_nwc().unwrap().is_none());
        assert!(matches!(storage.load_mnemonic("pw"), Err(StorageError::NoWallet)));
    }
}
