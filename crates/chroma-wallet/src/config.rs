//! Wallet configuration.
//!
//! [`WalletConfig`] carries every tunable the engine reads. The CLI fills it
//! from environment variables and flags; library callers build it directly.

use serde::{Deserialize, Serialize};

use chroma_core::address::Network;
use chroma_core::constants::{DEFAULT_FEE_RATE, DUST_THRESHOLD};

use crate::builder::TransactionBuilder;
use crate::error::WalletError;
use crate::issuance::FundingPropagation;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct WalletConfig {
    pub network: Network,
    /// Smallest units per estimated byte.
    pub fee_rate: u64,
    pub dust_threshold: u64,
    /// Last component of `m/44'/{network}'/0'/0/{index}`.
    pub account_index: u32,
    /// What issuance does between the funding and issue transactions.
    pub propagation: FundingPropagation,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            fee_rate: DEFAULT_FEE_RATE,
            dust_threshold: DUST_THRESHOLD,
            account_index: 0,
            propagation: FundingPropagation::Immediate,
        }
    }
}

impl WalletConfig {
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), WalletError> {
        if self.fee_rate == 0 {
            return Err(WalletError::BuildError("fee rate must be at least 1".into()));
        }
        if self.dust_threshold == 0 {
            return Err(WalletError::BuildError("dust threshold must be positive".into()));
        }
        Ok(())
    }

    /// A transaction builder using this configuration's network and rates.
    pub fn builder(&self) -> TransactionBuilder {
        let mut builder = TransactionBuilder::new(self.network);
        builder
            .set_fee_rate(self.fee_rate)
            .set_dust_threshold(self.dust_threshold);
        builder
    }
}
