//! Wallet error types.

use chroma_core::error::{AddressError, ColorIdError, CryptoError, NetworkError, TransactionError};
use thiserror::Error;

use crate::issuance::IssuanceRecovery;

/// Errors that can occur in wallet operations.
///
/// Every variant maps to a stable machine-readable code via [`WalletError::code`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Amount is zero, negative, malformed, or above the asset maximum.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Native amount below the dust threshold.
    #[error("amount {amount} is below the dust threshold of {threshold}")]
    DustAmount {
        /// Requested amount in tapyrus.
        amount: u64,
        /// Minimum spendable output value.
        threshold: u64,
    },

    /// Native funds cannot cover target plus fee.
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds {
        /// Available native value.
        have: u64,
        /// Required native value.
        need: u64,
    },

    /// Token balance cannot cover the requested amount.
    #[error("insufficient asset balance: have {have}, need {need}")]
    InsufficientAssetBalance {
        /// Available token units.
        have: u64,
        /// Requested token units.
        need: u64,
    },

    /// No UTXOs at all for the requested asset.
    #[error("no UTXOs available for {asset}")]
    NoUtxosAvailable {
        /// Native ticker or color id hex.
        asset: String,
    },

    /// A colored operation found no native UTXOs to pay its fee.
    #[error("no native UTXOs available to pay the fee")]
    NoFeeUtxos,

    /// Key or commitment derivation failure.
    #[error("key derivation: {0}")]
    KeyDerivation(String),

    /// Invalid BIP-39 mnemonic phrase.
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Invalid address string or address on the wrong network.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid color id.
    #[error("invalid color id: {0}")]
    InvalidColorId(String),

    /// Token metadata failed validation.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Funding transaction broadcast but the issue transaction did not follow.
    #[error("partial issuance: funding {} broadcast, issue failed: {}", .0.recovery.funding_txid, .0.cause)]
    PartialIssuance(Box<PartialIssuance>),

    /// Remote UTXO source failure.
    #[error("network failure: {0}")]
    Network(#[from] NetworkError),

    /// Cryptographic error from chroma-core.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Transaction encoding or signing error from chroma-core.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Transaction build error.
    #[error("build error: {0}")]
    BuildError(String),

    /// Serialization error.
    #[error("serialization: {0}")]
    Serialization(String),
}

/// State left behind when an issuance stops between its two transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialIssuance {
    /// Everything needed to retry the issue transaction.
    pub recovery: IssuanceRecovery,
    /// Rendered cause of the second-leg failure.
    pub cause: String,
}

impl WalletError {
    /// Stable code for callers that branch on error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "invalid_amount",
            Self::DustAmount { .. } => "dust_amount",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::InsufficientAssetBalance { .. } => "insufficient_asset_balance",
            Self::NoUtxosAvailable { .. } => "no_utxos_available",
            Self::NoFeeUtxos => "no_fee_utxos",
            Self::KeyDerivation(_) => "key_derivation_failure",
            Self::InvalidMnemonic(_) => "invalid_mnemonic",
            Self::InvalidAddress(_) => "invalid_address",
            Self::InvalidColorId(_) => "invalid_color_id",
            Self::InvalidMetadata(_) => "invalid_metadata",
            Self::PartialIssuance(_) => "partial_issuance",
            Self::Network(_) => "network_failure",
            Self::Crypto(_) => "crypto_error",
            Self::Transaction(_) => "transaction_error",
            Self::BuildError(_) => "build_error",
            Self::Serialization(_) => "serialization_error",
        }
    }

    /// The recovery record, if this is a partial issuance.
    pub fn recovery(&self) -> Option<&IssuanceRecovery> {
        match self {
            Self::PartialIssuance(p) => Some(&p.recovery),
            _ => None,
        }
    }
}

impl From<AddressError> for WalletError {
    fn from(e: AddressError) -> Self {
        Self::InvalidAddress(e.to_string())
    }
}

impl From<ColorIdError> for WalletError {
    fn from(e: ColorIdError) -> Self {
        Self::InvalidColorId(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_insufficient_funds() {
        let e = WalletError::InsufficientFunds {
            have: 100,
            need: 200,
        };
        assert_eq!(e.to_string(), "insufficient funds: have 100, need 200");
        assert_eq!(e.code(), "insufficient_funds");
    }

    #[test]
    fn display_dust_amount() {
        let e = WalletError::DustAmount {
            amount: 100,
            threshold: 546,
        };
        assert_eq!(e.to_string(), "amount 100 is below the dust threshold of 546");
        assert_eq!(e.code(), "dust_amount");
    }

    #[test]
    fn display_no_utxos() {
        let e = WalletError::NoUtxosAvailable { asset: "TPC".into() };
        assert_eq!(e.to_string(), "no UTXOs available for TPC");
        assert_eq!(WalletError::NoFeeUtxos.code(), "no_fee_utxos");
    }

    #[test]
    fn codes_for_key_errors() {
        assert_eq!(WalletError::KeyDerivation("x".into()).code(), "key_derivation_failure");
        assert_eq!(WalletError::InvalidMnemonic("x".into()).code(), "invalid_mnemonic");
        assert_eq!(
            WalletError::InsufficientAssetBalance { have: 1, need: 2 }.code(),
            "insufficient_asset_balance"
        );
    }

    #[test]
    fn clone_and_eq() {
        let e1 = WalletError::InvalidAmount("zero".into());
        let e2 = e1.clone();
        assert_eq!(e1, e2);
    }

    #[test]
    fn from_network_error() {
        let wallet: WalletError = NetworkError::Timeout.into();
        assert_eq!(wallet, WalletError::Network(NetworkError::Timeout));
        assert_eq!(wallet.code(), "network_failure");
        assert_eq!(wallet.to_string(), "network failure: timeout");
    }

    #[test]
    fn from_crypto_error() {
        let crypto = CryptoError::InvalidPublicKey;
        let wallet: WalletError = crypto.into();
        assert_eq!(wallet, WalletError::Crypto(CryptoError::InvalidPublicKey));
    }

    #[test]
    fn from_transaction_error() {
        let tx = TransactionError::EmptyInputsOrOutputs;
        let wallet: WalletError = tx.into();
        assert_eq!(
            wallet,
            WalletError::Transaction(TransactionError::EmptyInputsOrOutputs)
        );
    }

    #[test]
    fn from_address_error() {
        let wallet: WalletError = AddressError::InvalidChecksum.into();
        assert_eq!(wallet, WalletError::InvalidAddress("invalid checksum".into()));
    }
}
