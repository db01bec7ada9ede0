//! On-disk CLI state: the pending-transaction list, issued tokens and issuance
//! recovery records.
//!
//! All are plain JSON files under the network's state directory. Secrets are
//! never written here.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chroma_core::crypto::PublicKey;
use chroma_core::types::{ColorId, OutPoint, Txid};
use chroma_wallet::confirmation::{PendingKind, PendingTransaction, PendingTransactions};
use chroma_wallet::issuance::{IssuanceRecovery, IssuanceResult};
use chroma_wallet::metadata::Metadata;

const PENDING_FILE: &str = "pending.json";
const ISSUED_FILE: &str = "issued.json";
const RECOVERY_DIR: &str = "recovery";

/// A token this wallet issued.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub color_id: ColorId,
    pub metadata: Metadata,
    pub amount: u64,
    pub payment_base: PublicKey,
    /// Issue transaction.
    pub txid: Txid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_point: Option<OutPoint>,
    pub issued_at: DateTime<Utc>,
}

impl IssuedToken {
    pub fn new(result: &IssuanceResult, metadata: Metadata, amount: u64) -> Self {
        Self {
            color_id: result.color_id,
            metadata,
            amount,
            payment_base: result.payment_base.clone(),
            txid: result.txid,
            out_point: result.out_point,
            issued_at: Utc::now(),
        }
    }
}

pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn pending_path(&self) -> PathBuf {
        self.root.join(PENDING_FILE)
    }

    pub fn load_pending(&self) -> Result<PendingTransactions> {
        let path = self.pending_path();
        if !path.exists() {
            return Ok(PendingTransactions::new());
        }
        read_json(&path)
    }

    pub fn save_pending(&self, pending: &PendingTransactions) -> Result<()> {
        write_json(&self.pending_path(), pending)
    }

    /// Issued tokens, oldest first.
    pub fn load_issued(&self) -> Result<Vec<IssuedToken>> {
        let path = self.root.join(ISSUED_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_json(&path)
    }

    /// Append `token`, replacing an earlier record with the same issue txid.
    pub fn record_issued(&self, token: IssuedToken) -> Result<()> {
        let mut issued = self.load_issued()?;
        issued.retain(|t| t.txid != token.txid);
        issued.push(token);
        write_json(&self.root.join(ISSUED_FILE), &issued)
    }

    /// Persist a recovery record, returning where it was written.
    pub fn save_recovery(&self, recovery: &IssuanceRecovery) -> Result<PathBuf> {
        let path = self
            .root
            .join(RECOVERY_DIR)
            .join(format!("{}.json", recovery.funding_txid));
        write_json(&path, recovery)?;
        Ok(path)
    }

    /// Persist a partial issuance: its recovery record, and its funding
    /// transaction in the pending list.
    pub fn record_partial(&self, recovery: &IssuanceRecovery) -> Result<PathBuf> {
        let path = self.save_recovery(recovery)?;
        let mut pending = self.load_pending()?;
        pending.add(PendingTransaction::new(
            recovery.funding_txid,
            PendingKind::Issue,
            recovery.amount,
            None,
        ));
        self.save_pending(&pending)?;
        Ok(path)
    }

    pub fn load_recovery(&self, path: &Path) -> Result<IssuanceRecovery> {
        read_json(path)
    }

    /// Recovery records on disk, oldest first.
    pub fn list_recoveries(&self) -> Result<Vec<PathBuf>> {
        let dir = self.root.join(RECOVERY_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries: Vec<(std::time::SystemTime, PathBuf)> = fs::read_dir(&dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .map(|p| {
                let modified = fs::metadata(&p)
                    .and_then(|m| m.modified())
                    .unwrap_or(std::time::UNIX_EPOCH);
                (modified, p)
            })
            .collect();
        entries.sort();
        Ok(entries.into_iter().map(|(_, p)| p).collect())
    }

    /// Remove a record once its issuance has completed.
    pub fn remove_recovery(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Malformed JSON in {}", path.display()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let data = serde_json::to_string_pretty(value).context("Failed to serialize state")?;
    fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chroma_core::address::Network;
    use chroma_core::types::{TokenType, Utxo};
    use chroma_wallet::builder::IssueLeg;
    use chroma_core::crypto::KeyPair;

    fn issued(txid: u8, symbol: &str) -> IssuedToken {
        let issuer = KeyPair::from_secret_bytes(&[7; 32]).unwrap();
        let result = IssuanceResult {
            txid: Txid::from_wire_bytes([txid; 32]),
            color_id: ColorId::new(TokenType::NonReissuable, [txid; 32]),
            payment_base: issuer.public_key(),
            out_point: Some(OutPoint::new(Txid::from_wire_bytes([0x11; 32]), 0)),
        };
        IssuedToken::new(&result, Metadata::new("Gold", symbol, TokenType::NonReissuable), 500)
    }

    #[test]
    fn pending_roundtrip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateDir::new(dir.path().join("dev"));
        assert!(state.load_pending().unwrap().is_empty());

        let mut pending = PendingTransactions::new();
        pending.add(PendingTransaction::new(
            Txid::from_wire_bytes([4; 32]),
            PendingKind::Send,
            1_000,
            None,
        ));
        state.save_pending(&pending).unwrap();
        assert_eq!(state.load_pending().unwrap(), pending);
    }

    #[test]
    fn corrupt_pending_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateDir::new(dir.path().to_path_buf());
        fs::write(dir.path().join(PENDING_FILE), "{not json").unwrap();
        let err = state.load_pending().unwrap_err();
        assert!(err.to_string().contains("Malformed JSON"));
    }

    #[test]
    fn issued_tokens_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateDir::new(dir.path().join("dev"));
        assert!(state.load_issued().unwrap().is_empty());

        let first = issued(1, "GLD");
        let second = issued(2, "SLV");
        state.record_issued(first.clone()).unwrap();
        state.record_issued(second.clone()).unwrap();
        assert_eq!(state.load_issued().unwrap(), vec![first, second.clone()]);

        // Recording the same issue transaction again replaces the entry.
        let renamed = issued(1, "AU");
        state.record_issued(renamed.clone()).unwrap();
        let loaded = state.load_issued().unwrap();
        assert_eq!(loaded, vec![second, renamed]);
        assert_eq!(loaded[1].metadata.symbol, "AU");
        assert_eq!(loaded[1].amount, 500);
    }

    #[test]
    fn partial_issuance_tracks_funding_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateDir::new(dir.path().to_path_buf());
        let issuer = KeyPair::from_secret_bytes(&[7; 32]).unwrap();
        let funding_txid = Txid::from_wire_bytes([0x11; 32]);
        let recovery = IssuanceRecovery {
            network: Network::Dev,
            token_type: TokenType::Nft,
            amount: 1,
            metadata: Metadata::new("Badge", "BDG", TokenType::Nft),
            funding_txid,
            funding_index: 0,
            payment_base: issuer.public_key(),
            commitment: [3; 32],
            p2c_public_key: issuer.public_key(),
            leg: IssueLeg {
                p2c_input: Utxo {
                    outpoint: OutPoint::new(funding_txid, 0),
                    value: 600,
                    confirmed: false,
                    color: None,
                },
                change_input: None,
            },
            fee_rate: 1,
        };

        let path = state.record_partial(&recovery).unwrap();
        assert_eq!(state.list_recoveries().unwrap(), vec![path.clone()]);
        assert_eq!(state.load_recovery(&path).unwrap(), recovery);

        let pending = state.load_pending().unwrap();
        let entries: Vec<_> = pending.iter().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].txid, funding_txid);
        assert_eq!(entries[0].kind, PendingKind::Issue);
        assert_eq!(entries[0].color_id, None);

        state.remove_recovery(&path).unwrap();
        assert!(state.list_recoveries().unwrap().is_empty());
    }

    #[test]
    fn no_recoveries_listed_for_fresh_dir() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateDir::new(dir.path().to_path_buf());
        assert!(state.list_recoveries().unwrap().is_empty());
    }
}
