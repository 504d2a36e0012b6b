//! # charms-wallet: BIP-86 Taproot wallet core.
//!
//! Derives the wallet identity from a BIP-39 mnemonic, estimates fees,
//! selects UTXOs under a lock set and blacklist, and decodes raw
//! transactions for display. Signing and broadcast live elsewhere.
//!
//! # Modules
//!
//! - [`error`]: `WalletError` enum
//! - [`mnemonic`]: BIP-39 generation, validation and seed stretching
//! - [`keys`]: BIP-32 nodes, child numbers and derivation paths
//! - [`identity`]: BIP-86 account, wallet identity and address derivation
//! - [`descriptor`]: `tr()` descriptors and BIP-380 checksums
//! - [`fee`]: Fee rates and size-based fee estimation
//! - [`coin_selection`]: Largest-first UTXO selection with locking
//! - [`decoder`]: Raw transaction decoding
//! - [`wallet`]: Session composing storage, identity and selection

pub mod coin_selection;
pub mod decoder;
pub mod descriptor;
pub mod error;
pub mod fee;
pub mod identity;
pub mod keys;
pub mod mnemonic;
pub mod wallet;

// Re-exports for convenient access
pub use coin_selection::{LockStats, Selection, UtxoSelector};
pub use decoder::{DecodedInput, DecodedOutput, DecodedTransaction, TransactionDecoder, decode_transaction, parse_outpoint};
pub use descriptor::{Descriptors, descriptor_checksum};
pub use error::WalletError;
pub use fee::{FeeRate, estimate_fee, estimate_vsize};
pub use identity::{Account, Branch, derive_account, derive_bip86_identity};
pub use keys::{ChildNumber, DerivationPath, HdNode, Seed};
pub use mnemonic::{generate_mnemonic, mnemonic_to_seed};
pub use wallet::{WalletBalance, WalletSession};
