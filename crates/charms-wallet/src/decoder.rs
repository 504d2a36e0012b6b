//! Raw transaction decoding into a display-ready structure.
//!
//! Parsing is delegated to the `bitcoin` consensus codec, which rejects
//! truncated buffers, bad varints, script overruns and trailing bytes. Any
//! such failure is reported as [`DecodeError::Malformed`] carrying the input
//! length and a short prefix for diagnostics. Output addresses that cannot be
//! derived for the configured network are reported as `"unknown"`.

use bitcoin::Transaction;
use bitcoin::consensus::encode::deserialize;
use serde::{Deserialize, Serialize};
use tracing::debug;

use charms_core::constants::UNKNOWN_ADDRESS;
use charms_core::error::{DecodeError, OutPointError};
use charms_core::network::Network;
use charms_core::script::ScriptKind;
use charms_core::types::OutPoint;

/// A decoded transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedTransaction {
    /// Transaction id, display hex.
    pub txid: String,
    pub version: i32,
    pub locktime: u32,
    /// Total serialized size, witness included.
    pub size_bytes: usize,
    pub weight_units: u64,
    /// `ceil(weight / 4)`.
    pub virtual_size_bytes: usize,
    pub inputs: Vec<DecodedInput>,
    pub outputs: Vec<DecodedOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedInput {
    pub index: usize,
    /// Previous transaction id, display hex.
    pub prev_txid: String,
    pub prev_vout: u32,
    pub sequence: u32,
    pub script_sig_hex: String,
    /// Witness stack items, hex.
    pub witness_items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedOutput {
    pub index: usize,
    pub value_sats: u64,
    pub script_pub_key_hex: String,
    /// Encoded address, or `"unknown"`.
    pub address: String,
    pub script_kind: ScriptKind,
}

impl DecodedTransaction {
    /// Whether every input carries witness data.
    ///
    /// This is a presence check only; signatures are not verified.
    pub fn is_fully_witnessed(&self) -> bool {
        !self.inputs.is_empty() && self.inputs.iter().all(|i| !i.witness_items.is_empty())
    }

    /// Sum of output values.
    pub fn total_output_sats(&self) -> u64 {
        self.outputs.iter().map(|o| o.value_sats).fold(0, u64::saturating_add)
    }

    /// Outpoints spent by this transaction.
    pub fn spent_outpoints(&self) -> Vec<OutPoint> {
        self.inputs
            .iter()
            .map(|i| OutPoint::new(i.prev_txid.clone(), i.prev_vout))
            .collect()
    }
}

impl DecodedInput {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.prev_txid.clone(), self.prev_vout)
    }
}

/// Decoder bound to the network used for address encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionDecoder {
    network: Network,
}

impl TransactionDecoder {
    pub fn new(network: Network) -> Self {
        Self { network }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Decode a raw transaction from hex.
    pub fn decode(&self, tx_hex: &str) -> Result<DecodedTransaction, DecodeError> {
        let tx_hex = tx_hex.trim();
        let bytes = hex::decode(tx_hex).map_err(|e| DecodeError::invalid_hex(tx_hex, e))?;
        if bytes.is_empty() {
            return Err(DecodeError::malformed(tx_hex, "empty input"));
        }
        let tx: Transaction = deserialize(&bytes).map_err(|e| DecodeError::malformed(tx_hex, e))?;
        let decoded = self.describe(&tx);
        debug!(
            txid = %decoded.txid,
            inputs = decoded.inputs.len(),
            outputs = decoded.outputs.len(),
            vsize = decoded.virtual_size_bytes,
            "decoded transaction"
        );
        Ok(decoded)
    }

    /// Structured view of an already-parsed transaction.
    pub fn describe(&self, tx: &Transaction) -> DecodedTransaction {
        let params = self.network.to_bitcoin();

        let inputs = tx
            .input
            .iter()
            .enumerate()
            .map(|(index, input)| DecodedInput {
                index,
                prev_txid: input.previous_output.txid.to_string(),
                prev_vout: input.previous_output.vout,
                sequence: input.sequence.0,
                script_sig_hex: hex::encode(input.script_sig.as_bytes()),
                witness_items: input.witness.iter().map(hex::encode).collect(),
            })
            .collect();

        let outputs = tx
            .output
            .iter()
            .enumerate()
            .map(|(index, output)| {
                let address = bitcoin::Address::from_script(&output.script_pubkey, params)
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| UNKNOWN_ADDRESS.to_string());
                DecodedOutput {
                    index,
                    value_sats: output.value.to_sat(),
                    script_pub_key_hex: hex::encode(output.script_pubkey.as_bytes()),
                    address,
                    script_kind: ScriptKind::from_script(&output.script_pubkey),
                }
            })
            .collect();

        DecodedTransaction {
            txid: tx.compute_txid().to_string(),
            version: tx.version.0,
            locktime: tx.lock_time.to_consensus_u32(),
            size_bytes: tx.total_size(),
            weight_units: tx.weight().to_wu(),
            virtual_size_bytes: tx.vsize(),
            inputs,
            outputs,
        }
    }
}

/// Decode `tx_hex`, encoding output addresses for `network`.
pub fn decode_transaction(tx_hex: &str, network: Network) -> Result<DecodedTransaction, DecodeError> {
    TransactionDecoder::new(network).decode(tx_hex)
}

/// Parse `"<txid>:<vout>"`.
pub fn parse_outpoint(s: &str) -> Result<OutPoint, OutPointError> {
    s.parse()
}
