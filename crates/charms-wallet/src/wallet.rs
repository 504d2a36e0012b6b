//! Wallet session: identity, UTXO snapshot and selection for one network.
//!
//! [`WalletSession`] ties a [`WalletStore`] to a [`UtxoSelector`]. The UTXO
//! snapshot read from the store is memoized in a [`TtlCache`]; call
//! [`WalletSession::invalidate_utxos`] after the store is refreshed.
//!
//! Outputs that may hold charms or runes are never offered to the selector:
//! outpoints registered with [`WalletSession::protect`], and any UTXO whose
//! value matches a carrier output ([`Utxo::may_carry_asset`]).

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use charms_core::cache::TtlCache;
use charms_core::constants::{BIP86_ACCOUNT_PATH, DEFAULT_CACHE_TTL_SECS};
use charms_core::network::{Blockchain, Network};
use charms_core::traits::WalletStore;
use charms_core::types::{AddressEntry, OutPoint, Utxo, WalletIdentity};

use crate::coin_selection::{Selection, UtxoSelector};
use crate::error::WalletError;
use crate::fee::FeeRate;
use crate::identity::{Account, derive_account};

/// Balance summary in satoshis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    /// Sum of all stored UTXOs.
    pub total: u64,
    /// Value held back because it may carry an asset.
    pub protected: u64,
    /// Value currently locked by in-flight selections.
    pub locked: u64,
    /// Value available for a new selection.
    pub spendable: u64,
}

/// One wallet on one network.
pub struct WalletSession<S: WalletStore> {
    store: S,
    blockchain: Blockchain,
    network: Network,
    selector: Arc<UtxoSelector>,
    protected: Mutex<HashSet<OutPoint>>,
    utxo_cache: Mutex<TtlCache<Network, Vec<Utxo>>>,
}

impl<S: WalletStore> WalletSession<S> {
    pub fn new(store: S, network: Network) -> Self {
        Self {
            store,
            blockchain: Blockchain::Bitcoin,
            network,
            selector: Arc::new(UtxoSelector::new()),
            protected: Mutex::new(HashSet::new()),
            utxo_cache: Mutex::new(TtlCache::new(Duration::from_secs(DEFAULT_CACHE_TTL_SECS))),
        }
    }

    /// Share an existing selector, so locks span several sessions.
    pub fn with_selector(mut self, selector: Arc<UtxoSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Outpoints known to hold assets, e.g. charm outputs.
    pub fn with_protected(self, outpoints: impl IntoIterator<Item = OutPoint>) -> Self {
        self.protected.lock().extend(outpoints);
        self
    }

    /// Lifetime of the memoized UTXO snapshot. Zero disables memoization.
    pub fn with_cache_ttl(self, ttl: Duration) -> Self {
        self.utxo_cache.lock().set_ttl(ttl);
        self
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn selector(&self) -> &Arc<UtxoSelector> {
        &self.selector
    }

    /// Stored identity, if one exists.
    pub fn identity(&self) -> Result<Option<WalletIdentity>, WalletError> {
        Ok(self.store.get_wallet_info(self.blockchain, self.network)?)
    }

    /// Stored identity, or derive one at the BIP-86 path and save it.
    pub fn load_or_create_identity(&self, mnemonic: &str) -> Result<WalletIdentity, WalletError> {
        if let Some(existing) = self.identity()? {
            debug!(network = %self.network, "loaded stored wallet identity");
            return Ok(existing);
        }
        let identity = derive_account(mnemonic, self.network, BIP86_ACCOUNT_PATH)?;
        self.store
            .save_wallet_info(&identity, self.blockchain, self.network)?;
        info!(
            network = %self.network,
            fingerprint = %identity.master_fingerprint,
            "created wallet identity"
        );
        Ok(identity)
    }

    /// Public-only account for the stored identity.
    pub fn watch_only_account(&self) -> Result<Option<Account>, WalletError> {
        self.identity()?
            .map(|id| Account::from_identity(&id, self.network))
            .transpose()
    }

    pub fn addresses(&self) -> Result<Vec<AddressEntry>, WalletError> {
        Ok(self.store.get_addresses(self.blockchain, self.network)?)
    }

    /// Keep `outpoint` out of every future selection. Returns `false` if it
    /// was already protected.
    pub fn protect(&self, outpoint: OutPoint) -> bool {
        let mut protected = self.protected.lock();
        let added = protected.insert(outpoint);
        if added {
            debug!(protected = protected.len(), "outpoint protected");
        }
        added
    }

    pub fn is_protected(&self, utxo: &Utxo) -> bool {
        utxo.may_carry_asset() || self.protected.lock().contains(&utxo.outpoint())
    }

    /// All stored UTXOs, flattened across addresses and deduplicated by
    /// outpoint (first occurrence wins).
    pub fn all_utxos(&self) -> Result<Vec<Utxo>, WalletError> {
        let mut cache = self.utxo_cache.lock();
        let utxos = cache.try_get_or_insert_with(self.network, || self.load_utxos())?;
        Ok(utxos.clone())
    }

    /// Stored UTXOs minus protected ones. Locks are applied by the selector.
    pub fn spendable_utxos(&self) -> Result<Vec<Utxo>, WalletError> {
        let (spendable, _) = self.partition_protected(self.all_utxos()?);
        Ok(spendable)
    }

    /// Split into (spendable, protected).
    fn partition_protected(&self, utxos: Vec<Utxo>) -> (Vec<Utxo>, Vec<Utxo>) {
        let protected = self.protected.lock();
        utxos
            .into_iter()
            .partition(|u| !u.may_carry_asset() && !protected.contains(&u.outpoint()))
    }

    fn load_utxos(&self) -> Result<Vec<Utxo>, WalletError> {
        let by_address = self.store.get_utxos(self.blockchain, self.network)?;
        let mut seen = HashSet::new();
        let mut utxos = Vec::new();
        for (address, entries) in by_address {
            for mut utxo in entries {
                if !seen.insert(utxo.outpoint()) {
                    continue;
                }
                if utxo.address.is_none() {
                    utxo.address = Some(address.clone());
                }
                utxos.push(utxo);
            }
        }
        debug!(count = utxos.len(), "loaded utxo snapshot");
        Ok(utxos)
    }

    /// Drop the memoized UTXO snapshot.
    pub fn invalidate_utxos(&self) {
        self.utxo_cache.lock().invalidate_all();
    }

    /// Select inputs for a payment of `amount_sats` from the stored UTXOs.
    pub fn prepare_payment(&self, amount_sats: u64, fee_rate: FeeRate) -> Result<Selection, WalletError> {
        let utxos = self.spendable_utxos()?;
        Ok(self.selector.select_for_amount(&utxos, amount_sats, fee_rate))
    }

    /// Release the inputs of an abandoned payment.
    pub fn cancel_payment(&self, selection: &Selection) {
        self.selector.release(&selection.selected);
    }

    pub fn balance(&self) -> Result<WalletBalance, WalletError> {
        let (usable, held) = self.partition_protected(self.all_utxos()?);
        let protected = total_value(&held);
        let usable_total = total_value(&usable);
        let spendable = total_value(self.selector.spendable(&usable));
        Ok(WalletBalance {
            total: usable_total.saturating_add(protected),
            protected,
            locked: usable_total.saturating_sub(spendable),
            spendable,
        })
    }
}

fn total_value<'a>(utxos: impl IntoIterator<Item = &'a Utxo>) -> u64 {
    utxos.into_iter().map(|u| u.value).fold(0, u64::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use charms_core::error::StorageError;
    use charms_core::types::UtxoMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[derive(Default)]
    struct MemStore {
        utxos: Mutex<UtxoMap>,
        identity: Mutex<Option<WalletIdentity>>,
        utxo_reads: AtomicUsize,
        fail_utxos: bool,
    }

    impl WalletStore for MemStore {
        fn get_utxos(&self, _: Blockchain, _: Network) -> Result<UtxoMap, StorageError> {
            self.utxo_reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_utxos {
                return Err(StorageError::Backend("offline".into()));
            }
            Ok(self.utxos.lock().clone())
        }
        fn get_addresses(&self, _: Blockchain, _: Network) -> Result<Vec<AddressEntry>, StorageError> {
            Ok(Vec::new())
        }
        fn save_wallet_info(&self, identity: &WalletIdentity, _: Blockchain, _: Network) -> Result<(), StorageError> {
            *self.identity.lock() = Some(identity.clone());
            Ok(())
        }
        fn get_wallet_info(&self, _: Blockchain, _: Network) -> Result<Option<WalletIdentity>, StorageError> {
            Ok(self.identity.lock().clone())
        }
    }

    fn utxo(n: u8, vout: u32, value: u64) -> Utxo {
        Utxo {
            txid: format!("{n:02x}").repeat(32),
            vout,
            value,
            script_pub_key: String::new(),
            address: None,
        }
    }

    fn store_with(entries: &[(&str, Vec<Utxo>)]) -> MemStore {
        let store = MemStore::default();
        {
            let mut map = store.utxos.lock();
            for (addr, list) in entries {
                map.insert(addr.to_string(), list.clone());
            }
        }
        store
    }

    #[test]
    fn creates_then_loads_identity() {
        let session = WalletSession::new(MemStore::default(), Network::Testnet4);
        assert!(session.identity().unwrap().is_none());
        let created = session.load_or_create_identity(ABANDON).unwrap();
        assert_eq!(created.master_fingerprint, "73c5da0a");
        // A different mnemonic does not replace the stored identity.
        let other = "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo wrong";
        let loaded = session.load_or_create_identity(other).unwrap();
        assert_eq!(loaded, created);
    }

    #[test]
    fn watch_only_account_from_store() {
        let session = WalletSession::new(MemStore::default(), Network::Testnet4);
        assert!(session.watch_only_account().unwrap().is_none());
        let id = session.load_or_create_identity(ABANDON).unwrap();
        let account = session.watch_only_account().unwrap().unwrap();
        assert_eq!(account.xpub(), id.xpub);
        assert!(!account.node().has_private_key());
    }

    #[test]
    fn utxos_flattened_and_deduplicated() {
        let dup = utxo(1, 0, 10_000);
        let store = store_with(&[
            ("tb1paaa", vec![dup.clone(), utxo(2, 0, 20_000)]),
            ("tb1pbbb", vec![dup.clone(), utxo(3, 1, 5_000)]),
        ]);
        let session = WalletSession::new(store, Network::Testnet4);
        let utxos = session.all_utxos().unwrap();
        assert_eq!(utxos.len(), 3);
        assert_eq!(utxos[0].address.as_deref(), Some("tb1paaa"));
        assert_eq!(session.balance().unwrap().total, 35_000);
    }

    #[test]
    fn snapshot_is_memoized_until_invalidated() {
        let store = store_with(&[("tb1paaa", vec![utxo(1, 0, 1)])]);
        let session = WalletSession::new(store, Network::Testnet4);
        session.spendable_utxos().unwrap();
        session.spendable_utxos().unwrap();
        assert_eq!(session.store().utxo_reads.load(Ordering::SeqCst), 1);
        session.invalidate_utxos();
        session.spendable_utxos().unwrap();
        assert_eq!(session.store().utxo_reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_ttl_reads_every_time() {
        let store = store_with(&[("tb1paaa", vec![utxo(1, 0, 1)])]);
        let session = WalletSession::new(store, Network::Testnet4).with_cache_ttl(Duration::ZERO);
        session.spendable_utxos().unwrap();
        session.spendable_utxos().unwrap();
        assert_eq!(session.store().utxo_reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn storage_failure_propagates() {
        let store = MemStore {
            fail_utxos: true,
            ..Default::default()
        };
        let session = WalletSession::new(store, Network::Testnet4);
        assert!(matches!(session.spendable_utxos(), Err(WalletError::Storage(_))));
    }

    #[test]
    fn payment_locks_and_cancel_releases() {
        let store = store_with(&[("tb1paaa", vec![utxo(1, 0, 100_000), utxo(2, 0, 5_000)])]);
        let session = WalletSession::new(store, Network::Testnet4);

        let sel = session.prepare_payment(90_000, FeeRate::new(1.0).unwrap()).unwrap();
        assert!(sel.sufficient_funds);
        assert_eq!(sel.total_selected, 100_000);

        let balance = session.balance().unwrap();
        assert_eq!(balance.locked, 100_000);
        assert_eq!(balance.spendable, 5_000);

        session.cancel_payment(&sel);
        assert_eq!(session.balance().unwrap().spendable, 105_000);
    }

    #[test]
    fn shared_selector_spans_sessions() {
        let selector = Arc::new(UtxoSelector::new());
        let entries = [("tb1paaa", vec![utxo(1, 0, 100_000)])];
        let a = WalletSession::new(store_with(&entries), Network::Testnet4).with_selector(Arc::clone(&selector));
        let b = WalletSession::new(store_with(&entries), Network::Testnet4).with_selector(selector);

        let rate = FeeRate::new(1.0).unwrap();
        assert!(a.prepare_payment(1_000, rate).unwrap().sufficient_funds);
        assert!(!b.prepare_payment(1_000, rate).unwrap().sufficient_funds);
    }

    #[test]
    fn carrier_sized_utxos_never_spent() {
        let store = store_with(&[("tb1paaa", vec![utxo(1, 0, 1_000), utxo(2, 0, 500)])]);
        let session = WalletSession::new(store, Network::Testnet4);

        let sel = session.prepare_payment(1_000, FeeRate::new(1.0).unwrap()).unwrap();
        assert_eq!(sel.outpoints(), vec![utxo(2, 0, 500).outpoint()]);
        assert_eq!(sel.total_selected, 500);
        assert!(!sel.sufficient_funds);

        session.cancel_payment(&sel);
        assert_eq!(
            session.balance().unwrap(),
            WalletBalance {
                total: 1_500,
                protected: 1_000,
                locked: 0,
                spendable: 500,
            }
        );
    }

    #[test]
    fn protected_outpoints_held_back() {
        let rune = utxo(3, 0, 546);
        let charm = utxo(4, 2, 30_000);
        let store = store_with(&[("tb1paaa", vec![utxo(1, 0, 50_000), rune.clone(), charm.clone()])]);
        let session = WalletSession::new(store, Network::Testnet4).with_protected([charm.outpoint()]);
        assert!(session.is_protected(&rune));
        assert!(session.is_protected(&charm));
        assert!(!session.protect(charm.outpoint()));

        let spendable = session.spendable_utxos().unwrap();
        assert_eq!(spendable, vec![utxo(1, 0, 50_000)]);

        let balance = session.balance().unwrap();
        assert_eq!(balance.total, 80_546);
        assert_eq!(balance.protected, 30_546);
        assert_eq!(balance.spendable, 50_000);

        assert!(session.protect(utxo(1, 0, 50_000).outpoint()));
        assert!(session.spendable_utxos().unwrap().is_empty());
        assert_eq!(session.balance().unwrap().spendable, 0);
    }
}
