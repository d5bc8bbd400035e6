//! Identity - Derives the Nostr key and the Lightning engine seed from the wallet mnemonic.
//! The master mnemonic is only used here; subsystems get BIP85 children.

mod bip85;

use zeroize::Zeroizing;

pub use bip85::{derive_lightning_mnemonic, derive_mnemonic, derive_nostr_mnemonic, Bip85Error};

#[derive(Clone)]
pub struct Identity {
    pub nostr_keys: nostr::Keys,
    pub pubkey_hex: String,
    lightning_mnemonic: Zeroizing<String>,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity").field("pubkey_hex", &self.pubkey_hex).finish_non_exhaustive()
    }
}

impl Identity {
    pub fn from_mnemonic(mnemonic_str: &str) -> Result<Self, Bip85Error> {
        let nostr_mnemonic = Zeroizing::new(derive_nostr_mnemonic(mnemonic_str, None)?);
        let m = bip39::Mnemonic::parse(nostr_mnemonic.as_str())
            .map_err(|e| Bip85Error::InvalidMnemonic(e.to_string()))?;
        let seed = Zeroizing::new(m.to_seed(""));
        let sk = nostr::SecretKey::from_slice(&seed[..32])
            .map_err(|e| Bip85Error::DerivationFailed(e.to_string()))?;
        let keys = nostr::Keys::new(sk);
        let pubkey_hex = keys.public_key().to_hex();
        let lightning_mnemonic = Zeroizing::new(derive_lightning_mnemonic(mnemonic_str, None)?);
        Ok(Self { nostr_keys: keys, pubkey_hex, lightning_mnemonic })
    }

    /// Seed phrase handed to the wallet engine.
    pub fn lightning_mnemonic(&self) -> &str { &self.lightning_mnemonic }

    pub fn public_key(&self) -> nostr::PublicKey { self.nostr_keys.public_key() }
}
