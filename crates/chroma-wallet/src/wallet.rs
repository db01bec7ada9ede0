//! Wallet facade: one call per user operation.
//!
//! The [`Wallet`] holds a UTXO source and a [`WalletConfig`], nothing else.
//! Each operation derives the key from the mnemonic it is given, fetches a
//! fresh UTXO snapshot, builds, signs and broadcasts, then drops the key.
//! Amounts and recipients are validated before any network call.

use serde::{Deserialize, Serialize};
use tracing::info;

use chroma_core::address::Address;
use chroma_core::traits::UtxoSource;
use chroma_core::types::{ColorId, TransactionStatus, Txid};

use crate::balance::WalletBalances;
use crate::builder::{AssetAction, SignedTransaction, TransactionBuilder};
use crate::coin_selection::CoinSelection;
use crate::config::WalletConfig;
use crate::confirmation::{PollSchedule, poll_until_confirmed};
use crate::error::WalletError;
use crate::issuance::{IssuanceOrchestrator, IssuanceRecovery, IssuanceResult, IssueRequest};
use crate::keys::{KeyMaterial, derive_key_material};
use crate::metadata::Metadata;

/// Receipt of a broadcast transfer or burn.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub txid: Txid,
    /// Raw signed transaction.
    pub hex: String,
    pub fee: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_id: Option<ColorId>,
}

impl SendResult {
    fn new(signed: SignedTransaction, color_id: Option<ColorId>) -> Self {
        Self {
            txid: signed.txid,
            hex: signed.hex,
            fee: signed.fee,
            color_id,
        }
    }
}

/// Non-custodial wallet over a UTXO source.
///
/// Holds no keys and no UTXO state between calls; every operation takes the
/// mnemonic and reads a fresh snapshot.
pub struct Wallet<S: UtxoSource> {
    /// Indexer or node the wallet reads from and broadcasts to.
    source: S,
    config: WalletConfig,
}

impl<S: UtxoSource> Wallet<S> {
    pub fn new(source: S, config: WalletConfig) -> Result<Self, WalletError> {
        config.validate()?;
        Ok(Self { source, config })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    fn builder(&self) -> TransactionBuilder {
        self.config.builder()
    }

    /// Derive the configured account key.
    pub fn keys(&self, mnemonic: &str) -> Result<KeyMaterial, WalletError> {
        derive_key_material(mnemonic, self.config.network, self.config.account_index)
    }

    pub fn address(&self, mnemonic: &str) -> Result<Address, WalletError> {
        Ok(self.keys(mnemonic)?.address().clone())
    }

    /// Decode an address string on the configured network.
    pub fn parse_address(&self, s: &str) -> Result<Address, WalletError> {
        Ok(Address::parse(s.trim(), self.config.network)?)
    }

    pub async fn balances(&self, address: &Address) -> Result<WalletBalances, WalletError> {
        let utxos = self.source.get_utxos(&address.uncolored()).await?;
        Ok(WalletBalances::aggregate(&utxos))
    }

    /// Fee and inputs a native transfer of `amount` from `address` would use.
    pub async fn estimate_fee(&self, address: &Address, amount: u64) -> Result<CoinSelection, WalletError> {
        let builder = self.builder();
        builder.check_native_amount(amount)?;
        let utxos = self.source.get_utxos(&address.uncolored()).await?;
        builder.estimate_transfer_fee(&utxos, amount)
    }

    /// Send `amount` native units to `to`.
    pub async fn send(&self, mnemonic: &str, to: &str, amount: u64) -> Result<SendResult, WalletError> {
        let builder = self.builder();
        builder.check_native_amount(amount)?;
        let to = self.parse_address(to)?;
        builder.check_recipient(&to, None)?;
        let key = self.keys(mnemonic)?;

        let utxos = self.source.get_utxos(key.address()).await?;
        let signed = builder.build_transfer(&utxos, &key, &to, amount)?;
        signed.broadcast(&self.source).await?;
        info!(txid = %signed.txid, %to, amount, "sent");
        Ok(SendResult::new(signed, None))
    }

    /// Send `amount` units of `color` to `to`.
    pub async fn send_asset(
        &self,
        mnemonic: &str,
        color: &ColorId,
        to: &str,
        amount: u64,
    ) -> Result<SendResult, WalletError> {
        let builder = self.builder();
        builder.check_asset_amount(amount)?;
        let to = self.parse_address(to)?;
        builder.check_recipient(&to, Some(color))?;
        let key = self.keys(mnemonic)?;

        let utxos = self.source.get_utxos(key.address()).await?;
        let signed = builder.build_asset(&utxos, &key, color, amount, &AssetAction::Transfer(to))?;
        signed.broadcast(&self.source).await?;
        info!(txid = %signed.txid, color = %color, amount, "sent asset");
        Ok(SendResult::new(signed, Some(*color)))
    }

    /// Destroy `amount` units of `color`.
    pub async fn burn(&self, mnemonic: &str, color: &ColorId, amount: u64) -> Result<SendResult, WalletError> {
        let builder = self.builder();
        builder.check_asset_amount(amount)?;
        let key = self.keys(mnemonic)?;

        let utxos = self.source.get_utxos(key.address()).await?;
        let signed = builder.build_asset(&utxos, &key, color, amount, &AssetAction::Burn)?;
        signed.broadcast(&self.source).await?;
        info!(txid = %signed.txid, color = %color, amount, "burned");
        Ok(SendResult::new(signed, Some(*color)))
    }

    /// Issue a token; the class comes from `metadata.token_type`.
    pub async fn issue(&self, mnemonic: &str, metadata: Metadata, amount: u64) -> Result<IssuanceResult, WalletError> {
        let request = IssueRequest { metadata, amount };
        let orchestrator = self.orchestrator();
        orchestrator.validate(&request)?;
        let key = self.keys(mnemonic)?;
        orchestrator.issue(&key, &request).await
    }

    /// Finish an issuance that failed after its funding transaction.
    pub async fn resume_issuance(
        &self,
        mnemonic: &str,
        recovery: &IssuanceRecovery,
    ) -> Result<IssuanceResult, WalletError> {
        let key = self.keys(mnemonic)?;
        self.orchestrator().resume(&key, recovery).await
    }

    pub async fn transaction_status(&self, txid: &Txid) -> Result<TransactionStatus, WalletError> {
        Ok(self.source.transaction_status(txid).await?)
    }

    pub async fn wait_for_confirmation(
        &self,
        txid: &Txid,
        schedule: &PollSchedule,
    ) -> Result<TransactionStatus, WalletError> {
        poll_until_confirmed(&self.source, txid, schedule).await
    }

    fn orchestrator(&self) -> IssuanceOrchestrator<'_, S> {
        IssuanceOrchestrator::new(&self.source, self.builder()).with_propagation(self.config.propagation)
    }
}
