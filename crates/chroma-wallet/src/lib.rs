//! # chroma-wallet: non-custodial colored-coin wallet engine.
//!
//! Derives keys from a BIP-39 mnemonic, aggregates multi-asset balances,
//! selects coins with a linear fee model, and builds signed transactions for
//! native transfers, colored transfers, burns and token issuance using the
//! pay-to-contract (P2C) protocol.
//!
//! # Modules
//!
//! - [`error`]: `WalletError` enum with stable error codes
//! - [`mnemonic`]: BIP-39 phrase normalization, validation and seeds
//! - [`keys`]: BIP-32 derivation, `KeyMaterial`
//! - [`amount`]: decimal amount parsing and formatting
//! - [`balance`]: per-color confirmed/unconfirmed aggregation
//! - [`coin_selection`]: largest-first greedy selection with fee estimation
//! - [`metadata`]: token metadata, validation, canonical encoding
//! - [`color`]: P2C commitment, tweaked keys and color ids
//! - [`builder`]: transfer, colored transfer, burn and issuance transactions
//! - [`issuance`]: one- and two-transaction issuance orchestration
//! - [`confirmation`]: confirmation queries and pending transactions
//! - [`cache`]: injectable token metadata cache
//! - [`config`]: wallet configuration
//! - [`wallet`]: high-level wallet composition

pub mod amount;
pub mod balance;
pub mod builder;
pub mod cache;
pub mod coin_selection;
pub mod color;
pub mod config;
pub mod confirmation;
pub mod error;
pub mod issuance;
pub mod keys;
pub mod metadata;
pub mod mnemonic;
pub mod wallet;

// Re-exports for convenient access
pub use balance::{AssetBalance, BalanceDetails, WalletBalances};
pub use builder::{AssetAction, FundingTransaction, IssueLeg, SignedTransaction, TransactionBuilder};
pub use cache::{CachePolicy, TokenMetadataCache, TokenRegistry};
pub use coin_selection::{AssetSelection, CoinSelection, CoinSelector, FeeModel};
pub use color::PayToContract;
pub use config::WalletConfig;
pub use confirmation::{PendingKind, PendingTransaction, PendingTransactions, PollSchedule};
pub use error::{PartialIssuance, WalletError};
pub use issuance::{FundingPropagation, IssuanceOrchestrator, IssuanceRecovery, IssuanceResult, IssueRequest};
pub use keys::{DerivationPath, KeyMaterial, Seed};
pub use metadata::{Attribute, Issuer, Metadata};
pub use wallet::{SendResult, Wallet};
