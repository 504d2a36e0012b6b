//! Transaction size and fee estimation.
//!
//! Sizes are per-input estimates keyed by the spent script kind, not exact
//! serialized sizes:
//!
//! | component | vbytes |
//! |---|---|
//! | P2PKH input | 148 |
//! | any other input | 57 |
//! | output | 34 |
//! | overhead | 10 |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use charms_core::constants::{OUTPUT_VBYTES, SATS_PER_BTC, TX_OVERHEAD_VBYTES};
use charms_core::error::FeeRateError;
use charms_core::script::ScriptKind;

/// Fee rate in satoshis per virtual byte. Always finite and non-negative.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct FeeRate(f64);

impl FeeRate {
    pub const ZERO: FeeRate = FeeRate(0.0);

    pub fn new(sat_per_vbyte: f64) -> Result<Self, FeeRateError> {
        if !sat_per_vbyte.is_finite() {
            return Err(FeeRateError::NotFinite(sat_per_vbyte.to_string()));
        }
        if sat_per_vbyte < 0.0 {
            return Err(FeeRateError::Negative(sat_per_vbyte.to_string()));
        }
        Ok(Self(sat_per_vbyte))
    }

    pub fn sat_per_vbyte(&self) -> f64 {
        self.0
    }

    /// `ceil(vbytes * rate)`.
    pub fn fee_for(&self, vbytes: u64) -> u64 {
        (vbytes as f64 * self.0).ceil() as u64
    }
}

impl TryFrom<f64> for FeeRate {
    type Error = FeeRateError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        FeeRate::new(value)
    }
}

impl From<FeeRate> for f64 {
    fn from(rate: FeeRate) -> f64 {
        rate.0
    }
}

impl FromStr for FeeRate {
    type Err = FeeRateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<f64>()
            .map_err(|_| FeeRateError::Unparseable(s.to_string()))?;
        FeeRate::new(value)
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sat/vB", self.0)
    }
}

/// Estimated virtual size of a transaction spending `inputs` into
/// `output_count` outputs.
pub fn estimate_vsize(inputs: &[ScriptKind], output_count: usize) -> u64 {
    let input_vbytes: u64 = inputs.iter().map(ScriptKind::input_vbytes).sum();
    TX_OVERHEAD_VBYTES
        .saturating_add(input_vbytes)
        .saturating_add(OUTPUT_VBYTES.saturating_mul(output_count as u64))
}

/// Estimated fee in satoshis.
pub fn estimate_fee(inputs: &[ScriptKind], output_count: usize, fee_rate: FeeRate) -> u64 {
    fee_rate.fee_for(estimate_vsize(inputs, output_count))
}

/// Satoshis as a BTC amount, for display.
pub fn sats_to_btc(sats: u64) -> f64 {
    sats as f64 / SATS_PER_BTC as f64
}

/// BTC amount as satoshis, rounded down. Negative or non-finite input gives 0.
pub fn btc_to_sats(btc: f64) -> u64 {
    if !btc.is_finite() || btc <= 0.0 {
        return 0;
    }
    (btc * SATS_PER_BTC as f64).floor() as u64
}
