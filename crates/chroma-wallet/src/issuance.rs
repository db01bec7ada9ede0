//! Token issuance orchestration.
//!
//! Reissuable (`c1`) tokens are minted by a single transaction from the
//! issuer's native coins. Non-reissuable (`c2`) and NFT (`c3`) tokens need
//! two transactions because their color id commits to the outpoint spent by
//! the minting transaction:
//!
//! 1. **Funding**: pay dust to the P2C address at output 0 and keep change at
//!    output 1 large enough to pay the issue fee. Checked before broadcast.
//! 2. **Issue**: spend output 0 with the tweaked key (plus the change with the
//!    base key) and mint the colored output to the issuer.
//!
//! Once the funding transaction is accepted, any failure is reported as
//! [`WalletError::PartialIssuance`] with an [`IssuanceRecovery`] the caller
//! persists and later hands to [`IssuanceOrchestrator::resume`].

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use chroma_core::address::Network;
use chroma_core::crypto::{KeyPair, PublicKey};
use chroma_core::error::NetworkError;
use chroma_core::traits::UtxoSource;
use chroma_core::types::{ColorId, OutPoint, TokenType, Txid};

use crate::builder::{IssueLeg, TransactionBuilder};
use crate::color::PayToContract;
use crate::confirmation::{PollSchedule, await_known};
use crate::error::{PartialIssuance, WalletError};
use crate::keys::KeyMaterial;
use crate::metadata::Metadata;

/// When to submit the issue transaction after funding.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FundingPropagation {
    /// Submit right away; the node accepts chained unconfirmed spends.
    #[default]
    Immediate,
    /// Wait until the UTXO source reports the funding transaction.
    AwaitIndexer(PollSchedule),
}

/// What to issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRequest {
    /// Token class is `metadata.token_type`.
    pub metadata: Metadata,
    /// Token units to mint; exactly 1 for NFTs.
    pub amount: u64,
}

/// Receipt of a completed issuance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IssuanceResult {
    /// Id of the transaction that minted the token.
    pub txid: Txid,
    pub color_id: ColorId,
    /// Untweaked issuer public key.
    pub payment_base: PublicKey,
    /// Funding outpoint the color id commits to (`c2`/`c3` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_point: Option<OutPoint>,
}

/// Everything needed to submit the issue transaction of a funded issuance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IssuanceRecovery {
    pub network: Network,
    pub token_type: TokenType,
    pub amount: u64,
    /// Metadata the P2C key commits to.
    pub metadata: Metadata,
    pub funding_txid: Txid,
    /// Index of the P2C dust output in the funding transaction.
    pub funding_index: u32,
    pub payment_base: PublicKey,
    #[serde(with = "hex_bytes32")]
    pub commitment: [u8; 32],
    pub p2c_public_key: PublicKey,
    pub leg: IssueLeg,
    pub fee_rate: u64,
}

impl IssuanceRecovery {
    /// Color id the issue transaction will create.
    pub fn color_id(&self) -> Result<ColorId, WalletError> {
        Ok(ColorId::from_outpoint(
            self.token_type,
            &OutPoint::new(self.funding_txid, self.funding_index),
        )?)
    }
}

/// Sequences the transactions of an issuance against a UTXO source.
pub struct IssuanceOrchestrator<'a, S: UtxoSource + ?Sized> {
    source: &'a S,
    builder: TransactionBuilder,
    propagation: FundingPropagation,
}

impl<'a, S: UtxoSource + ?Sized> IssuanceOrchestrator<'a, S> {
    pub fn new(source: &'a S, builder: TransactionBuilder) -> Self {
        Self {
            source,
            builder,
            propagation: FundingPropagation::default(),
        }
    }

    pub fn with_propagation(mut self, propagation: FundingPropagation) -> Self {
        self.propagation = propagation;
        self
    }

    /// Reject requests that cannot be issued, before any I/O.
    pub fn validate(&self, request: &IssueRequest) -> Result<(), WalletError> {
        request.metadata.validate()?;
        self.builder.check_asset_amount(request.amount)?;
        if request.metadata.token_type == TokenType::Nft && request.amount != 1 {
            return Err(WalletError::InvalidAmount(format!(
                "NFT amount must be exactly 1, got {}",
                request.amount
            )));
        }
        Ok(())
    }

    /// Issue a token owned by `key`.
    pub async fn issue(&self, key: &KeyMaterial, request: &IssueRequest) -> Result<IssuanceResult, WalletError> {
        self.validate(request)?;
        let p2c = PayToContract::derive(key.public_key(), &request.metadata)?;
        match request.metadata.token_type {
            TokenType::Reissuable => self.issue_reissuable(key, &p2c, request.amount).await,
            _ => self.issue_funded(key, &p2c, request).await,
        }
    }

    async fn issue_reissuable(
        &self,
        key: &KeyMaterial,
        p2c: &PayToContract,
        amount: u64,
    ) -> Result<IssuanceResult, WalletError> {
        let utxos = self.source.get_utxos(key.address()).await?;
        let signed = self.builder.build_reissuable_issue(&utxos, key, p2c, amount)?;
        let txid = signed.broadcast(self.source).await?;
        let color_id = p2c.reissuable_color_id();
        info!(%txid, color = %color_id, amount, "issued reissuable token");
        Ok(IssuanceResult {
            txid,
            color_id,
            payment_base: key.public_key().clone(),
            out_point: None,
        })
    }

    async fn issue_funded(
        &self,
        key: &KeyMaterial,
        p2c: &PayToContract,
        request: &IssueRequest,
    ) -> Result<IssuanceResult, WalletError> {
        let token_type = request.metadata.token_type;
        // Derive the tweaked key before anything reaches the network.
        let p2c_keypair = p2c.keypair(key.keypair())?;

        let utxos = self.source.get_utxos(key.address()).await?;
        let funding = self.builder.build_funding(&utxos, key, p2c)?;
        let recovery = IssuanceRecovery {
            network: self.builder.network(),
            token_type,
            amount: request.amount,
            metadata: request.metadata.clone(),
            funding_txid: funding.signed.txid,
            funding_index: funding.leg.funding_outpoint().index,
            payment_base: key.public_key().clone(),
            commitment: *p2c.commitment(),
            p2c_public_key: p2c.public_key().clone(),
            leg: funding.leg,
            fee_rate: self.builder.fee_rate(),
        };

        match funding.signed.broadcast(self.source).await {
            Ok(funding_txid) => info!(%funding_txid, %token_type, "funding transaction accepted"),
            // The source took the transaction; only its reported id is off.
            Err(cause @ NetworkError::TxidMismatch { .. }) => {
                return Err(partial(recovery, &cause));
            }
            Err(e) => return Err(e.into()),
        }
        self.complete(key, p2c, &p2c_keypair, recovery).await
    }

    /// Submit the issue transaction for a funding transaction already accepted.
    ///
    /// Fails with `KeyDerivation` if the record was not produced by `key`.
    pub async fn resume(
        &self,
        key: &KeyMaterial,
        recovery: &IssuanceRecovery,
    ) -> Result<IssuanceResult, WalletError> {
        if recovery.network != self.builder.network() {
            return Err(WalletError::BuildError(format!(
                "recovery record is for {}, wallet is on {}",
                recovery.network,
                self.builder.network()
            )));
        }
        if &recovery.payment_base != key.public_key() {
            return Err(WalletError::KeyDerivation(
                "recovery record belongs to a different key".into(),
            ));
        }
        let p2c = PayToContract::from_commitment(key.public_key(), recovery.commitment)?;
        if p2c.public_key() != &recovery.p2c_public_key {
            return Err(WalletError::KeyDerivation(
                "recovery commitment does not reproduce the P2C key".into(),
            ));
        }
        let derived = PayToContract::derive(key.public_key(), &recovery.metadata)?;
        if derived.public_key() != p2c.public_key() || recovery.metadata.token_type != recovery.token_type {
            return Err(WalletError::KeyDerivation(
                "recovery metadata does not match the P2C key".into(),
            ));
        }
        let p2c_keypair = p2c.keypair(key.keypair())?;
        info!(funding_txid = %recovery.funding_txid, "resuming issuance");
        self.complete(key, &p2c, &p2c_keypair, recovery.clone()).await
    }

    async fn complete(
        &self,
        key: &KeyMaterial,
        p2c: &PayToContract,
        p2c_keypair: &KeyPair,
        recovery: IssuanceRecovery,
    ) -> Result<IssuanceResult, WalletError> {
        match self.second_leg(key, p2c, p2c_keypair, &recovery).await {
            Ok(result) => Ok(result),
            Err(cause) => Err(partial(recovery, &cause)),
        }
    }

    async fn second_leg(
        &self,
        key: &KeyMaterial,
        p2c: &PayToContract,
        p2c_keypair: &KeyPair,
        recovery: &IssuanceRecovery,
    ) -> Result<IssuanceResult, WalletError> {
        if let FundingPropagation::AwaitIndexer(schedule) = &self.propagation {
            await_known(self.source, &recovery.funding_txid, schedule).await?;
        }

        let color_id = recovery.color_id()?;
        let mut builder = self.builder.clone();
        builder.set_fee_rate(recovery.fee_rate);
        let signed = builder.build_issue_leg(
            &recovery.leg,
            key,
            p2c,
            p2c_keypair,
            &color_id,
            recovery.amount,
        )?;
        let txid = signed.broadcast(self.source).await?;
        let out_point = OutPoint::new(recovery.funding_txid, recovery.funding_index);
        info!(%txid, color = %color_id, %out_point, amount = recovery.amount, "issued token");
        Ok(IssuanceResult {
            txid,
            color_id,
            payment_base: key.public_key().clone(),
            out_point: Some(out_point),
        })
    }
}

/// Wrap a failure that happened after the funding transaction left the wallet.
fn partial(recovery: IssuanceRecovery, cause: &dyn std::fmt::Display) -> WalletError {
    warn!(
        funding_txid = %recovery.funding_txid,
        error = %cause,
        "issuance stopped after funding"
    );
    WalletError::PartialIssuance(Box::new(PartialIssuance {
        recovery,
        cause: cause.to_string(),
    }))
}

/// Hex string serde for 32-byte arrays.
mod hex_bytes32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|b: Vec<u8>| serde::de::Error::custom(format!("expected 32 bytes, got {}", b.len())))
    }
}
