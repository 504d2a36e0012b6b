//! Shared test helpers for integration tests.

use parking_lot::Mutex;
use std::collections::BTreeMap;

use charms_core::error::StorageError;
use charms_core::network::{Blockchain, Network};
use charms_core::traits::WalletStore;
use charms_core::types::{AddressEntry, Utxo, UtxoMap, WalletIdentity};

/// The BIP-86 reference mnemonic.
pub const ABANDON: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// A second valid 12-word mnemonic.
pub const ZOO: &str = "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo wrong";

/// Testnet4 spell transaction with two inputs: the first without witness,
/// the second a script-path spend (signature, tapscript, control block).
pub const SPELL_TX_HEX: &str = concat!(
    "020000000001020ddd5a3398029480e3b88cb5a6a305a13b03093c90fa33af531bed2ebe507a500000000000ffffffff",
    "5521b4ece6b1b0afef5632797099b1b11f2e9d27a9de9b7384f386a5bab3825c0000000000ffffffff02e80300000000",
    "00002251206eb2ec4ab68e29176884e783dfd93bc42b9310f5ae47a202d0978988cebe1f879846000000000000225120",
    "d9bd818762f2af087e5a49aca2077e7050df90ce3f546f80392f4828fa94e528000341df52ec0e6d664245542a9dd191",
    "7ae0ae6fc931ca456bb2b89fcd1227952f2eda091c4f3b37b0ed5de0af8c90192cc0fe1a4c856f56d9a3768bdb146769",
    "95679881fdef020063057370656c6c4d080282a36776657273696f6e02627478a2647265667380646f75747381a100a2",
    "667469636b657268434841524d532d376972656d61696e696e671a000186a0716170705f7075626c69635f696e707574",
    "73a183616e982018c21837185318950c18dc0218c418f7184118c918a718e118f518d7181918a51843188c18cd185a18",
    "930c184b1867182418ae18ec18550b183b189398201835189300183218d718b818ac131880189f18df1858182d188718",
    "df1851185418bc183a185a182018dd18990218421827188b1618ef1839183110f69901041118b618a0189d182b187c18",
    "b8051824184d187b18721869184c0c18190b1818188118dc183d18781873186610184318ef18e9185218d4182a187318",
    "84183b1818186c0318e7186d18ae1886187c1836183e18531118711718fa188018af18ef1818189d18c5189c18c81850",
    "184818dd1842181f18e9188218e418f9185318f5182f1824188818a51873185518e318bf15185d18c318ab18da187f18",
    "82189d185c1889186a18ad18a9184518e718981832187918a018b318c2021847188c1218371881181d188618b30818d1",
    "18e118791892189b18d818bb1849181e1872182818ae185818fd1899184c18471836182e18e518a118aa18e21828187a",
    "06186418b418510218ef1879189c1886188818dd18ee1860187218da0d189d183b18a918ac1887184118d1185d182818",
    "7918f0183e181918ba184cb73f18a20018ee18f018de18b7189a18851884187f18201118721868183a188f18b918fd18",
    "de189a1849189518921894188e04186a188d18ff18411890185618b315184b18281838185718a009188118b3189f18b6",
    "18f9186618fa00182a18b218c31849182c18e7186718dd18ab18d1186c18bf183a18a5184c185f151018db189d186618",
    "d718a6186718af0218bb189018c618cd18a718e418ba18f4184718800f18f31879188418840b184718e7188401189918",
    "8118f26820d4a03d185451c4ebe8146027691a848f1ebe4c7117baf83068e33103cc278020ac21c1d4a03d185451c4eb",
    "e8146027691a848f1ebe4c7117baf83068e33103cc27802000000000",
);

/// Deterministic 64-hex txid from a seed byte.
pub fn txid(seed: u8) -> String {
    format!("{seed:02x}").repeat(32)
}

/// Taproot UTXO with a placeholder key.
pub fn taproot_utxo(seed: u8, vout: u32, value: u64) -> Utxo {
    Utxo {
        txid: txid(seed),
        vout,
        value,
        script_pub_key: format!("5120{}", "ab".repeat(32)),
        address: None,
    }
}

/// Legacy P2PKH UTXO.
pub fn p2pkh_utxo(seed: u8, vout: u32, value: u64) -> Utxo {
    Utxo {
        script_pub_key: format!("76a914{}88ac", "cd".repeat(20)),
        ..taproot_utxo(seed, vout, value)
    }
}

#[derive(Default)]
struct Records {
    utxos: UtxoMap,
    addresses: Vec<AddressEntry>,
    identity: Option<WalletIdentity>,
}

/// In-memory [`WalletStore`] keyed by (blockchain, network).
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<(String, String), Records>>,
}

fn key(blockchain: Blockchain, network: Network) -> (String, String) {
    (blockchain.name().to_string(), network.name().to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the UTXOs held by `address`.
    pub fn put_utxos(&self, network: Network, address: &str, utxos: Vec<Utxo>) {
        self.records
            .lock()
            .entry(key(Blockchain::Bitcoin, network))
            .or_default()
            .utxos
            .insert(address.to_string(), utxos);
    }

    pub fn put_addresses(&self, network: Network, addresses: Vec<AddressEntry>) {
        self.records
            .lock()
            .entry(key(Blockchain::Bitcoin, network))
            .or_default()
            .addresses = addresses;
    }
}

impl WalletStore for MemoryStore {
    fn get_utxos(&self, blockchain: Blockchain, network: Network) -> Result<UtxoMap, StorageError> {
        Ok(self
            .records
            .lock()
            .get(&key(blockchain, network))
            .map(|r| r.utxos.clone())
            .unwrap_or_default())
    }

    fn get_addresses(&self, blockchain: Blockchain, network: Network) -> Result<Vec<AddressEntry>, StorageError> {
        Ok(self
            .records
            .lock()
            .get(&key(blockchain, network))
            .map(|r| r.addresses.clone())
            .unwrap_or_default())
    }

    fn save_wallet_info(
        &self,
        identity: &WalletIdentity,
        blockchain: Blockchain,
        network: Network,
    ) -> Result<(), StorageError> {
        self.records
            .lock()
            .entry(key(blockchain, network))
            .or_default()
            .identity = Some(identity.clone());
        Ok(())
    }

    fn get_wallet_info(&self, blockchain: Blockchain, network: Network) -> Result<Option<WalletIdentity>, StorageError> {
        Ok(self
            .records
            .lock()
            .get(&key(blockchain, network))
            .and_then(|r| r.identity.clone()))
    }
}
