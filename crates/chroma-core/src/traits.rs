//! Trait interfaces between the wallet engine and its collaborators.
//!
//! - [`UtxoSource`]: address UTXO lookup, broadcast and status (chroma-esplora implements)

use async_trait::async_trait;

use crate::address::Address;
use crate::error::NetworkError;
use crate::types::{TransactionStatus, Txid, Utxo};

/// Read access to the UTXO set plus transaction submission.
///
/// Implementations validate the shape of remote responses before returning
/// them: every `Utxo` handed to the engine has a well-formed txid, index and
/// value. Timeouts and transport failures surface as [`NetworkError`].
#[async_trait]
pub trait UtxoSource: Send + Sync {
    /// All unspent outputs currently paying to `address`, colored ones included.
    async fn get_utxos(&self, address: &Address) -> Result<Vec<Utxo>, NetworkError>;

    /// Submit a serialized transaction, returning the id the network assigned.
    async fn broadcast(&self, raw_tx_hex: &str) -> Result<Txid, NetworkError>;

    /// Confirmation state of a transaction.
    ///
    /// Returns `NetworkError::Http { status: 404, .. }` or an equivalent error
    /// when the transaction is unknown to the source.
    async fn transaction_status(&self, txid: &Txid) -> Result<TransactionStatus, NetworkError>;
}
