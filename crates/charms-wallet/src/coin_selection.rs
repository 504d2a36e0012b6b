//! Largest-first UTXO selection with a lock set and a blacklist.
//!
//! Selection is greedy: candidates are sorted by value (descending, stable)
//! and taken until they cover the amount plus a provisional fee. Every chosen
//! outpoint is locked immediately so that concurrent payment flows never
//! pick the same input. Locks are only removed by [`UtxoSelector::release`]
//! or [`UtxoSelector::release_all`]; an insufficient selection keeps its
//! locks until the caller releases them.
//!
//! Blacklisted outpoints (e.g. inputs that failed verification) are excluded
//! for the lifetime of the selector.
//!
//! Once the inputs are known the fee is recomputed from their script kinds.
//! Change below the dust limit is not worth an output and goes to the fee.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use charms_core::constants::{DUST_LIMIT_SATS, MIN_SELECTION_FEE, SELECTION_OUTPUT_COUNT};
use charms_core::script::ScriptKind;
use charms_core::types::{OutPoint, Utxo};

use crate::fee::{FeeRate, estimate_fee};

/// Outcome of a selection run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Chosen UTXOs, largest first. All of them are locked.
    pub selected: Vec<Utxo>,
    /// Sum of the chosen values.
    pub total_selected: u64,
    /// Whether `total_selected >= amount + estimated_fee`.
    pub sufficient_funds: bool,
    /// Provisional fee the selection was sized against.
    pub estimated_fee: u64,
    /// Fee for the chosen inputs and two outputs, including folded dust.
    pub final_fee: u64,
    /// Change output value. Zero when nothing or only dust is left over.
    pub change: u64,
}

impl Selection {
    pub fn outpoints(&self) -> Vec<OutPoint> {
        self.selected.iter().map(Utxo::outpoint).collect()
    }
}

/// Snapshot of the selector's exclusion sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStats {
    pub locked_count: usize,
    pub blacklisted_count: usize,
    /// Locked outpoints, sorted.
    pub locked: Vec<OutPoint>,
    /// Blacklisted outpoints, sorted.
    pub blacklisted: Vec<OutPoint>,
}

#[derive(Debug, Default)]
struct SelectionState {
    locked: HashSet<OutPoint>,
    blacklist: HashSet<OutPoint>,
}

impl SelectionState {
    fn is_excluded(&self, outpoint: &OutPoint) -> bool {
        self.locked.contains(outpoint) || self.blacklist.contains(outpoint)
    }
}

/// Provisional fee used while selecting: one Taproot input and two outputs
/// at `fee_rate`, never below [`MIN_SELECTION_FEE`].
pub fn provisional_fee(fee_rate: FeeRate) -> u64 {
    estimate_fee(&[ScriptKind::Taproot], SELECTION_OUTPUT_COUNT, fee_rate).max(MIN_SELECTION_FEE)
}

/// Fee for the actual inputs, and the change left over. Change below
/// [`DUST_LIMIT_SATS`] is added to the fee.
fn settle_fee(selected: &[Utxo], total_selected: u64, amount_sats: u64, fee_rate: FeeRate) -> (u64, u64) {
    let kinds: Vec<ScriptKind> = selected.iter().map(Utxo::script_kind).collect();
    let fee = estimate_fee(&kinds, SELECTION_OUTPUT_COUNT, fee_rate);
    match total_selected.saturating_sub(amount_sats.saturating_add(fee)) {
        dust @ 1..DUST_LIMIT_SATS => (fee + dust, 0),
        change => (fee, change),
    }
}

/// Thread-safe selector. Share it behind an `Arc` across payment flows.
#[derive(Debug, Default)]
pub struct UtxoSelector {
    state: Mutex<SelectionState>,
}

impl UtxoSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selector with `outpoints` blacklisted from the start.
    pub fn with_blacklist(outpoints: impl IntoIterator<Item = OutPoint>) -> Self {
        Self {
            state: Mutex::new(SelectionState {
                locked: HashSet::new(),
                blacklist: outpoints.into_iter().collect(),
            }),
        }
    }

    /// Pick UTXOs from `available` to cover `amount_sats` plus the
    /// provisional fee, locking each one as it is chosen.
    ///
    /// Running short is reported through [`Selection::sufficient_funds`];
    /// whatever was chosen stays locked.
    pub fn select_for_amount(&self, available: &[Utxo], amount_sats: u64, fee_rate: FeeRate) -> Selection {
        let estimated_fee = provisional_fee(fee_rate);
        let target = amount_sats.saturating_add(estimated_fee);

        let mut state = self.state.lock();
        let mut candidates: Vec<&Utxo> = available
            .iter()
            .filter(|u| !state.is_excluded(&u.outpoint()))
            .collect();
        candidates.sort_by(|a, b| b.value.cmp(&a.value));

        debug!(
            amount_sats,
            estimated_fee,
            available = available.len(),
            candidates = candidates.len(),
            "selecting utxos"
        );

        let mut selected = Vec::new();
        let mut total_selected: u64 = 0;
        for utxo in candidates {
            if total_selected >= target {
                break;
            }
            // A duplicate of an outpoint chosen earlier in this run.
            if !state.locked.insert(utxo.outpoint()) {
                continue;
            }
            total_selected = total_selected.saturating_add(utxo.value);
            selected.push(utxo.clone());
        }
        drop(state);

        let sufficient_funds = total_selected >= target;
        let (final_fee, change) = settle_fee(&selected, total_selected, amount_sats, fee_rate);
        if sufficient_funds {
            info!(inputs = selected.len(), total_selected, final_fee, change, "selected utxos");
        } else {
            warn!(
                inputs = selected.len(),
                total_selected,
                needed = target,
                "insufficient funds; selected utxos remain locked"
            );
        }

        Selection {
            selected,
            total_selected,
            sufficient_funds,
            estimated_fee,
            final_fee,
            change,
        }
    }

    /// Unlock the given UTXOs. Unknown or already-released entries are ignored.
    pub fn release(&self, utxos: &[Utxo]) {
        self.release_outpoints(utxos.iter().map(Utxo::outpoint));
    }

    /// Unlock outpoints directly.
    pub fn release_outpoints(&self, outpoints: impl IntoIterator<Item = OutPoint>) {
        let mut state = self.state.lock();
        let released = outpoints
            .into_iter()
            .filter(|op| state.locked.remove(op))
            .count();
        debug!(released, still_locked = state.locked.len(), "released utxos");
    }

    /// Clear every lock. The blacklist is kept.
    pub fn release_all(&self) {
        let mut state = self.state.lock();
        let released = state.locked.len();
        state.locked.clear();
        debug!(released, "released all utxo locks");
    }

    /// Lock UTXOs outside of a selection run, e.g. inputs of a transaction
    /// built elsewhere.
    pub fn lock(&self, utxos: &[Utxo]) {
        let mut state = self.state.lock();
        state.locked.extend(utxos.iter().map(Utxo::outpoint));
    }

    /// Permanently exclude an outpoint. Returns `false` if it was already
    /// blacklisted. A blacklisted outpoint is also unlocked.
    pub fn blacklist(&self, outpoint: OutPoint) -> bool {
        let mut state = self.state.lock();
        state.locked.remove(&outpoint);
        let added = state.blacklist.insert(outpoint);
        if added {
            warn!(blacklisted = state.blacklist.len(), "outpoint blacklisted");
        }
        added
    }

    pub fn is_locked(&self, outpoint: &OutPoint) -> bool {
        self.state.lock().locked.contains(outpoint)
    }

    pub fn is_blacklisted(&self, outpoint: &OutPoint) -> bool {
        self.state.lock().blacklist.contains(outpoint)
    }

    /// UTXOs from `utxos` that a selection could currently use.
    pub fn spendable<'a>(&self, utxos: &'a [Utxo]) -> Vec<&'a Utxo> {
        let state = self.state.lock();
        utxos.iter().filter(|u| !state.is_excluded(&u.outpoint())).collect()
    }

    pub fn lock_stats(&self) -> LockStats {
        let state = self.state.lock();
        let mut locked: Vec<OutPoint> = state.locked.iter().cloned().collect();
        let mut blacklisted: Vec<OutPoint> = state.blacklist.iter().cloned().collect();
        locked.sort();
        blacklisted.sort();
        LockStats {
            locked_count: locked.len(),
            blacklisted_count: blacklisted.len(),
            locked,
            blacklisted,
        }
    }
}
