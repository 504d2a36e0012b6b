//! Integration and property test suite for the Charms wallet core.
//!
//! The tests under `tests/` exercise the wallet crates together: BIP-86
//! derivation against published vectors and an independent BIP-32
//! implementation, selection invariants under randomized UTXO sets, and
//! end-to-end session flows over an in-memory store.

pub mod helpers;
