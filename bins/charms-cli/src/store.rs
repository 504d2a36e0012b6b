//! JSON file storage for the CLI.
//!
//! One document holds records for every (blockchain, network) pair, keyed
//! `"<blockchain>:<network>"`. The document is read once and written back on
//! every identity save.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use charms_core::error::StorageError;
use charms_core::network::{Blockchain, Network};
use charms_core::traits::WalletStore;
use charms_core::types::{AddressEntry, UtxoMap, WalletIdentity};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRecords {
    #[serde(default)]
    pub utxos: UtxoMap,
    #[serde(default)]
    pub addresses: Vec<AddressEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_info: Option<WalletIdentity>,
}

type Document = BTreeMap<String, NetworkRecords>;

fn record_key(blockchain: Blockchain, network: Network) -> String {
    format!("{blockchain}:{network}")
}

pub struct JsonFileStore {
    path: PathBuf,
    doc: Mutex<Document>,
}

impl JsonFileStore {
    /// Open `path`. A missing file is treated as an empty document.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let doc = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| StorageError::Backend(format!("{}: {e}", path.display())))?;
            serde_json::from_str(&raw)
                .map_err(|e| StorageError::Corrupted(format!("{}: {e}", path.display())))?
        } else {
            Document::new()
        };
        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn records(&self, blockchain: Blockchain, network: Network) -> NetworkRecords {
        self.doc
            .lock()
            .get(&record_key(blockchain, network))
            .cloned()
            .unwrap_or_default()
    }

    fn flush(&self, doc: &Document) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StorageError::Backend(format!("{}: {e}", parent.display())))?;
        }
        let raw = serde_json::to_string_pretty(doc).map_err(|e| StorageError::Backend(e.to_string()))?;
        fs::write(&self.path, raw).map_err(|e| StorageError::Backend(format!("{}: {e}", self.path.display())))
    }
}

impl WalletStore for JsonFileStore {
    fn get_utxos(&self, blockchain: Blockchain, network: Network) -> Result<UtxoMap, StorageError> {
        Ok(self.records(blockchain, network).utxos)
    }

    fn get_addresses(&self, blockchain: Blockchain, network: Network) -> Result<Vec<AddressEntry>, StorageError> {
        Ok(self.records(blockchain, network).addresses)
    }

    fn save_wallet_info(
        &self,
        identity: &WalletIdentity,
        blockchain: Blockchain,
        network: Network,
    ) -> Result<(), StorageError> {
        let mut doc = self.doc.lock();
        doc.entry(record_key(blockchain, network))
            .or_default()
            .wallet_info = Some(identity.clone());
        self.flush(&doc)
    }

    fn get_wallet_info(&self, blockchain: Blockchain, network: Network) -> Result<Option<WalletIdentity>, StorageError> {
        Ok(self.records(blockchain, network).wallet_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charms_core::types::Utxo;

    fn identity() -> WalletIdentity {
        WalletIdentity {
            master_fingerprint: "73c5da0a".into(),
            path: "86'/0'/0'".into(),
            xpub: "tpubX".into(),
            xpriv: String::new(),
            address: "tb1pX".into(),
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("none.json")).unwrap();
        assert!(store.get_utxos(Blockchain::Bitcoin, Network::Testnet4).unwrap().is_empty());
        assert!(store.get_wallet_info(Blockchain::Bitcoin, Network::Testnet4).unwrap().is_none());
    }

    #[test]
    fn identity_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("wallet.json");
        JsonFileStore::open(&path)
            .unwrap()
            .save_wallet_info(&identity(), Blockchain::Bitcoin, Network::Testnet4)
            .unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get_wallet_info(Blockchain::Bitcoin, Network::Testnet4).unwrap(),
            Some(identity())
        );
        assert!(reopened.get_wallet_info(Blockchain::Bitcoin, Network::Mainnet).unwrap().is_none());
    }

    #[test]
    fn reads_utxos_by_network_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        let txid = "cd".repeat(32);
        fs::write(
            &path,
            format!(
                r#"{{"bitcoin:testnet4":{{"utxos":{{"tb1pabc":[{{"txid":"{txid}","vout":0,"value":1234}}]}}}}}}"#
            ),
        )
        .unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        let utxos = store.get_utxos(Blockchain::Bitcoin, Network::Testnet4).unwrap();
        let list: &Vec<Utxo> = &utxos["tb1pabc"];
        assert_eq!(list[0].value, 1234);
    }

    #[test]
    fn corrupted_file_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(JsonFileStore::open(&path), Err(StorageError::Corrupted(_))));
    }
}
