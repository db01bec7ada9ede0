//! Multi-asset balance aggregation.
//!
//! Groups UTXOs by color, splitting each bucket into confirmed and
//! unconfirmed sums. The native asset is reported separately; colored assets
//! are listed in ascending color id order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use chroma_core::types::{ColorId, Utxo};

/// Confirmed/unconfirmed split of one asset.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BalanceDetails {
    /// Sum of UTXOs included in a block.
    pub confirmed: u64,
    /// Sum of UTXOs still in the mempool.
    pub unconfirmed: u64,
    /// `confirmed + unconfirmed`.
    pub total: u64,
}

impl BalanceDetails {
    fn add(&mut self, utxo: &Utxo) {
        if utxo.confirmed {
            self.confirmed = self.confirmed.saturating_add(utxo.value);
        } else {
            self.unconfirmed = self.unconfirmed.saturating_add(utxo.value);
        }
        self.total = self.confirmed.saturating_add(self.unconfirmed);
    }
}

/// Balance of one colored asset.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssetBalance {
    pub color_id: ColorId,
    #[serde(flatten)]
    pub balance: BalanceDetails,
}

/// All balances held by one address.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct WalletBalances {
    pub native: BalanceDetails,
    /// Sorted by color id ascending.
    pub assets: Vec<AssetBalance>,
    pub utxo_count: usize,
}

impl WalletBalances {
    /// Aggregate `utxos` into per-asset balances.
    pub fn aggregate(utxos: &[Utxo]) -> Self {
        let mut native = BalanceDetails::default();
        let mut colored: BTreeMap<ColorId, BalanceDetails> = BTreeMap::new();

        for utxo in utxos {
            match &utxo.color {
                None => native.add(utxo),
                Some(color) => colored.entry(*color).or_default().add(utxo),
            }
        }

        Self {
            native,
            assets: colored
                .into_iter()
                .map(|(color_id, balance)| AssetBalance { color_id, balance })
                .collect(),
            utxo_count: utxos.len(),
        }
    }

    /// Balance of `color`, zero if the address holds none.
    pub fn asset(&self, color: &ColorId) -> BalanceDetails {
        self.assets
            .binary_search_by(|a| a.color_id.cmp(color))
            .map(|i| self.assets[i].balance)
            .unwrap_or_default()
    }
}
