//! Core types and traits for the Charms wallet.
//!
//! This crate defines the shared vocabulary used across the workspace:
//! UTXO records and outpoints, per-network encoding parameters, script
//! classification, the storage collaborator trait, and error types.

pub mod cache;
pub mod constants;
pub mod error;
pub mod network;
pub mod script;
pub mod traits;
pub mod types;
