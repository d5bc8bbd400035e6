//! Beezap: Lightning wallet service and multi-rail zaps for Nostr clients.
//!
//! # Architecture
//!
//! ```text
//! vault (BIP39, Argon2id + XChaCha20-Poly1305)
//!   │
//! storage (KeyValueStore: encrypted mnemonic, wallet flags, sealed NWC string)
//!   │
//! identity (BIP85: Nostr keys + Lightning seed)
//!   │
//! service (WalletService over a WalletEngine)          nostr (relay client)
//!   │                                                    │
//!   │                                                  nwc (NIP-47 client + NwcEngine)
//!   │                                                    │
//!   └──────────────── zap (LNURL → zap request → invoice → Embedded | NWC | WebLN)
//! ```
//!
//! # Features
//!
//! - `native` (default) - tokio, relays, HTTP, filesystem store, CLI
//!
//! Without `native` only the pure parts compile: vault, in-memory storage, identity and
//! invoice classification.
//!
//! # Usage
//!
//! ```ignore
//! use beezap::{ZapDispatcher, ZapRequest, PaymentTarget, Recipient, NwcCredential};
//!
//! let dispatcher = ZapDispatcher::new(lnurl, connector).with_wallet(service.clone());
//! let mut request = ZapRequest::new(
//!     PaymentTarget::Profile { recipient: Recipient::new(pubkey).with_lud16("alice@example.com") },
//!     21,
//! );
//! request.nwc = Some(NwcCredential::Sealed(sealed));
//! let outcome = dispatcher.zap(&identity.nostr_keys, request).await;
//! ```

// =============================================================================
// Shared modules (compile everywhere)
// =============================================================================
pub mod identity;
pub mod invoice;
pub mod storage;
pub mod vault;

// =============================================================================
// Native-only modules (tokio, relays, HTTP)
// =============================================================================
#[cfg(feature = "native")]
pub mod config;
#[cfg(feature = "native")]
pub mod logging;
#[cfg(feature = "native")]
pub mod nostr;
#[cfg(feature = "native")]
pub mod nwc;
#[cfg(feature = "native")]
pub mod runtime;
#[cfg(feature = "native")]
pub mod service;
#[cfg(feature = "native")]
pub mod zap;

// =============================================================================
// Re-exports: Shared
// =============================================================================
pub use identity::Identity;
pub use invoice::{parse_payment_input, PaymentInput};
pub use storage::{KeyValueStore, MemoryStore, StorageError, WalletState, WalletStorage};
pub use vault::{decrypt_mnemonic, encrypt_mnemonic, generate_mnemonic, validate_mnemonic, EncryptedMnemonicRecord, VaultError};

// =============================================================================
// Re-exports: Native
// =============================================================================
#[cfg(feature = "native")]
pub use config::BeezapConfig;
#[cfg(feature = "native")]
pub use nwc::{NwcClient, NwcConfig, NwcEngine, NwcError};
#[cfg(feature = "native")]
pub use runtime::{install_signal_handlers, Shutdown};
#[cfg(feature = "native")]
pub use service::{EngineConfig, Network, WalletEngine, WalletError, WalletEvent, WalletService};
#[cfg(feature = "native")]
pub use storage::FileStore;
#[cfg(feature = "native")]
pub use zap::{NwcCredential, PaymentTarget, Recipient, Rail, ZapDispatcher, ZapError, ZapOutcome, ZapRequest};
