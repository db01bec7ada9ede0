//! Confirmation queries and the caller's pending-transaction list.
//!
//! Nothing here runs in the background. [`poll_until_confirmed`] and
//! [`await_known`] are explicit loops driven by a caller-supplied
//! [`PollSchedule`]; [`PendingTransactions`] is plain data the caller owns and
//! refreshes when it chooses to.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use chroma_core::error::NetworkError;
use chroma_core::traits::UtxoSource;
use chroma_core::types::{ColorId, TransactionStatus, Txid};

use crate::error::WalletError;

/// How often and how many times to query the UTXO source.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 20,
        }
    }
}

/// Whether `txid` is in a block.
pub async fn is_confirmed<S: UtxoSource + ?Sized>(source: &S, txid: &Txid) -> Result<bool, WalletError> {
    Ok(source.transaction_status(txid).await?.confirmed)
}

/// Poll until `txid` confirms or the schedule runs out.
///
/// Returns the last status seen; `confirmed` is false if attempts ran out.
pub async fn poll_until_confirmed<S: UtxoSource + ?Sized>(
    source: &S,
    txid: &Txid,
    schedule: &PollSchedule,
) -> Result<TransactionStatus, WalletError> {
    let mut status = TransactionStatus::default();
    for attempt in 1..=schedule.max_attempts {
        status = source.transaction_status(txid).await?;
        if status.confirmed {
            break;
        }
        debug!(%txid, attempt, "transaction not yet confirmed");
        if attempt < schedule.max_attempts {
            tokio::time::sleep(schedule.interval).await;
        }
    }
    Ok(status)
}

/// Poll until the source reports any status for `txid`.
///
/// Lookup errors count as "not yet known"; exhaustion is `NotPropagated`.
pub async fn await_known<S: UtxoSource + ?Sized>(
    source: &S,
    txid: &Txid,
    schedule: &PollSchedule,
) -> Result<TransactionStatus, NetworkError> {
    for attempt in 1..=schedule.max_attempts {
        match source.transaction_status(txid).await {
            Ok(status) => return Ok(status),
            Err(e) => debug!(%txid, attempt, error = %e, "transaction not yet visible"),
        }
        if attempt < schedule.max_attempts {
            tokio::time::sleep(schedule.interval).await;
        }
    }
    Err(NetworkError::NotPropagated {
        txid: txid.to_string(),
        attempts: schedule.max_attempts,
    })
}

/// Kind of operation that produced a pending transaction.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    Send,
    SendAsset,
    Burn,
    Issue,
}

/// A broadcast transaction the caller is waiting on.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub txid: Txid,
    pub kind: PendingKind,
    /// Native units for sends, token units otherwise.
    pub amount: u64,
    /// Asset moved, burned or issued; absent for native sends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_id: Option<ColorId>,
    /// When the wallet broadcast it.
    pub created_at: DateTime<Utc>,
}

impl PendingTransaction {
    pub fn new(txid: Txid, kind: PendingKind, amount: u64, color_id: Option<ColorId>) -> Self {
        Self {
            txid,
            kind,
            amount,
            color_id,
            created_at: Utc::now(),
        }
    }
}

/// Transactions broadcast by this wallet and not yet seen confirmed.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingTransactions {
    entries: Vec<PendingTransaction>,
}

impl PendingTransactions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry; a txid already present is replaced.
    pub fn add(&mut self, entry: PendingTransaction) {
        self.entries.retain(|e| e.txid != entry.txid);
        self.entries.push(entry);
    }

    pub fn remove(&mut self, txid: &Txid) -> Option<PendingTransaction> {
        let pos = self.entries.iter().position(|e| &e.txid == txid)?;
        Some(self.entries.remove(pos))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingTransaction> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry the source reports as confirmed, returning them.
    ///
    /// Entries whose status lookup fails stay pending.
    pub async fn prune_confirmed<S: UtxoSource + ?Sized>(&mut self, source: &S) -> Vec<PendingTransaction> {
        let mut confirmed = Vec::new();
        let mut still_pending = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            match source.transaction_status(&entry.txid).await {
                Ok(status) if status.confirmed => confirmed.push(entry),
                Ok(_) => still_pending.push(entry),
                Err(e) => {
                    debug!(txid = %entry.txid, error = %e, "status lookup failed, keeping entry");
                    still_pending.push(entry);
                }
            }
        }
        self.entries = still_pending;
        confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chroma_core::address::Address;
    use chroma_core::types::Utxo;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Returns queued statuses per txid; unknown txids are a 404.
    #[derive(Default)]
    struct StatusSource {
        statuses: Mutex<HashMap<Txid, Vec<TransactionStatus>>>,
        calls: Mutex<u32>,
    }

    impl StatusSource {
        fn queue(&self, txid: Txid, statuses: Vec<TransactionStatus>) {
            self.statuses.lock().insert(txid, statuses);
        }
    }

    #[async_trait]
    impl UtxoSource for StatusSource {
        async fn get_utxos(&self, _: &Address) -> Result<Vec<Utxo>, NetworkError> {
            Ok(Vec::new())
        }

        async fn broadcast(&self, _: &str) -> Result<Txid, NetworkError> {
            Err(NetworkError::Rejected("read-only".into()))
        }

        async fn transaction_status(&self, txid: &Txid) -> Result<TransactionStatus, NetworkError> {
            *self.calls.lock() += 1;
            let mut map = self.statuses.lock();
            let queue = map.get_mut(txid).ok_or(NetworkError::Http {
                status: 404,
                body: "Transaction not found".into(),
            })?;
            if queue.len() > 1 {
                Ok(queue.remove(0))
            } else {
                queue.first().copied().ok_or(NetworkError::Http {
                    status: 404,
                    body: "Transaction not found".into(),
                })
            }
        }
    }

    fn txid(n: u8) -> Txid {
        Txid::from_wire_bytes([n; 32])
    }

    const PENDING: TransactionStatus = TransactionStatus {
        confirmed: false,
        block_height: None,
    };
    const MINED: TransactionStatus = TransactionStatus {
        confirmed: true,
        block_height: Some(100),
    };

    fn fast(max_attempts: u32) -> PollSchedule {
        PollSchedule {
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn is_confirmed_reads_status() {
        let source = StatusSource::default();
        source.queue(txid(1), vec![MINED]);
        source.queue(txid(2), vec![PENDING]);
        assert!(is_confirmed(&source, &txid(1)).await.unwrap());
        assert!(!is_confirmed(&source, &txid(2)).await.unwrap());
        assert_eq!(
            is_confirmed(&source, &txid(3)).await.unwrap_err().code(),
            "network_failure"
        );
    }

    #[tokio::test]
    async fn poll_stops_on_confirmation() {
        let source = StatusSource::default();
        source.queue(txid(1), vec![PENDING, PENDING, MINED]);
        let status = poll_until_confirmed(&source, &txid(1), &fast(10)).await.unwrap();
        assert_eq!(status, MINED);
        assert_eq!(*source.calls.lock(), 3);
    }

    #[tokio::test]
    async fn poll_gives_up_after_schedule() {
        let source = StatusSource::default();
        source.queue(txid(1), vec![PENDING]);
        let status = poll_until_confirmed(&source, &txid(1), &fast(4)).await.unwrap();
        assert!(!status.confirmed);
        assert_eq!(*source.calls.lock(), 4);
    }

    #[tokio::test]
    async fn await_known_tolerates_not_found() {
        let source = StatusSource::default();
        assert_eq!(
            await_known(&source, &txid(9), &fast(3)).await.unwrap_err(),
            NetworkError::NotPropagated {
                txid: txid(9).to_string(),
                attempts: 3
            }
        );
        source.queue(txid(9), vec![PENDING]);
        assert_eq!(await_known(&source, &txid(9), &fast(3)).await.unwrap(), PENDING);
    }

    #[tokio::test]
    async fn prune_removes_only_confirmed() {
        let source = StatusSource::default();
        source.queue(txid(1), vec![MINED]);
        source.queue(txid(2), vec![PENDING]);
        let mut pending = PendingTransactions::new();
        pending.add(PendingTransaction::new(txid(1), PendingKind::Send, 1_000, None));
        pending.add(PendingTransaction::new(txid(2), PendingKind::Burn, 5, None));
        pending.add(PendingTransaction::new(txid(3), PendingKind::Issue, 1, None));

        let confirmed = pending.prune_confirmed(&source).await;
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].txid, txid(1));
        let left: Vec<Txid> = pending.iter().map(|e| e.txid).collect();
        assert_eq!(left, vec![txid(2), txid(3)]);
    }

    #[test]
    fn add_replaces_duplicates_and_serializes() {
        let mut pending = PendingTransactions::new();
        pending.add(PendingTransaction::new(txid(1), PendingKind::Send, 1, None));
        pending.add(PendingTransaction::new(txid(1), PendingKind::Send, 2, None));
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.iter().next().map(|e| e.amount), Some(2));

        let json = serde_json::to_string(&pending).unwrap();
        let back: PendingTransactions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pending);
        assert!(pending.remove(&txid(1)).is_some());
        assert!(pending.is_empty());
    }
}
