//! Trait interfaces for collaborators outside the core.
//!
//! - [`WalletStore`]: persisted wallet records (implemented by the host
//!   application: browser storage, files, a database)

use crate::error::StorageError;
use crate::network::{Blockchain, Network};
use crate::types::{AddressEntry, UtxoMap, WalletIdentity};

/// Storage for wallet records, keyed by blockchain and network.
///
/// The core reads UTXO snapshots and address lists through this trait and
/// writes the wallet identity once per wallet setup. It never opens files
/// or sockets itself.
pub trait WalletStore: Send + Sync {
    /// UTXOs grouped by owning address.
    fn get_utxos(&self, blockchain: Blockchain, network: Network) -> Result<UtxoMap, StorageError>;

    /// All derived wallet addresses.
    fn get_addresses(&self, blockchain: Blockchain, network: Network) -> Result<Vec<AddressEntry>, StorageError>;

    /// Persist the wallet identity.
    fn save_wallet_info(
        &self,
        identity: &WalletIdentity,
        blockchain: Blockchain,
        network: Network,
    ) -> Result<(), StorageError>;

    /// Load the wallet identity, if one was saved.
    fn get_wallet_info(&self, blockchain: Blockchain, network: Network) -> Result<Option<WalletIdentity>, StorageError>;
}
