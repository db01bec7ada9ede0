//! Largest-first coin selection with a linear fee model.
//!
//! Native selection sorts candidates by value descending and accumulates
//! until the running total covers the target plus the fee estimated for the
//! inputs chosen so far. Asset selection does the same without a fee, since
//! token fees are always paid from native outputs.
//!
//! Callers pre-filter candidates to a single asset bucket.

use chroma_core::constants::{NATIVE_TICKER, estimated_fee};
use chroma_core::types::{ColorId, Utxo};

use crate::error::WalletError;

/// Fee estimate parameters for one transaction shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeModel {
    /// Fee per estimated byte.
    pub fee_rate: u64,
    /// Number of outputs the transaction will have.
    pub outputs: u64,
    /// Inputs already committed outside this selection (e.g. colored inputs).
    pub extra_inputs: u64,
}

impl FeeModel {
    pub fn new(fee_rate: u64, outputs: u64) -> Self {
        Self {
            fee_rate,
            outputs,
            extra_inputs: 0,
        }
    }

    pub fn with_extra_inputs(mut self, extra_inputs: u64) -> Self {
        self.extra_inputs = extra_inputs;
        self
    }

    /// Fee when `selected` native inputs are added.
    pub fn fee_for(&self, selected: usize) -> u64 {
        estimated_fee(
            self.fee_rate,
            self.extra_inputs.saturating_add(selected as u64),
            self.outputs,
        )
    }
}

/// Result of native coin selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    /// Selected UTXOs, largest first.
    pub selected: Vec<Utxo>,
    /// Sum of selected values.
    pub total_input: u64,
    /// Estimated fee for the final input count.
    pub fee: u64,
    /// `total_input - target - fee`.
    pub change: u64,
}

/// Result of asset (colored) selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSelection {
    /// Selected colored UTXOs, largest first.
    pub selected: Vec<Utxo>,
    /// Sum of selected token units.
    pub total: u64,
    /// Token units returned to the sender.
    pub change: u64,
}

/// Greedy largest-first coin selector.
pub struct CoinSelector;

impl CoinSelector {
    /// Select native UTXOs covering `target` plus fee.
    ///
    /// A zero target selects just enough to pay the fee, which is how colored
    /// operations fund themselves.
    pub fn select(utxos: &[Utxo], target: u64, fee: &FeeModel) -> Result<CoinSelection, WalletError> {
        if utxos.is_empty() {
            return Err(WalletError::NoUtxosAvailable {
                asset: NATIVE_TICKER.into(),
            });
        }

        let mut sorted: Vec<&Utxo> = utxos.iter().collect();
        sorted.sort_by(|a, b| b.value.cmp(&a.value));

        let mut selected = Vec::new();
        let mut total_input: u64 = 0;

        for utxo in sorted {
            selected.push(utxo.clone());
            total_input = total_input.saturating_add(utxo.value);

            let fee = fee.fee_for(selected.len());
            let needed = target.saturating_add(fee);

            if total_input >= needed {
                return Ok(CoinSelection {
                    selected,
                    total_input,
                    fee,
                    change: total_input - needed,
                });
            }
        }

        // Not enough funds
        let fee = fee.fee_for(selected.len());
        Err(WalletError::InsufficientFunds {
            have: total_input,
            need: target.saturating_add(fee),
        })
    }

    /// Select colored UTXOs of `color` covering `amount` token units.
    pub fn select_asset(
        utxos: &[Utxo],
        color: &ColorId,
        amount: u64,
    ) -> Result<AssetSelection, WalletError> {
        if utxos.is_empty() {
            return Err(WalletError::NoUtxosAvailable {
                asset: color.to_hex(),
            });
        }

        let mut sorted: Vec<&Utxo> = utxos.iter().collect();
        sorted.sort_by(|a, b| b.value.cmp(&a.value));

        let mut selected = Vec::new();
        let mut total: u64 = 0;
        for utxo in sorted {
            selected.push(utxo.clone());
            total = total.saturating_add(utxo.value);
            if total >= amount {
                return Ok(AssetSelection {
                    selected,
                    total,
                    change: total - amount,
                });
            }
        }

        Err(WalletError::InsufficientAssetBalance {
            have: total,
            need: amount,
        })
    }
}
