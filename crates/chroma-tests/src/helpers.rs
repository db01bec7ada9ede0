//! Shared helpers for integration tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use chroma_core::address::{Address, Network};
use chroma_core::crypto::{KeyPair, sha256};
use chroma_core::error::NetworkError;
use chroma_core::script::Script;
use chroma_core::traits::UtxoSource;
use chroma_core::transaction::Transaction;
use chroma_core::types::{ColorId, OutPoint, TransactionStatus, Txid, Utxo};
use chroma_wallet::keys::{KeyMaterial, derive_key_material};

/// The BIP-39 test mnemonic.
pub const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon \
                            abandon abandon abandon abandon abandon about";

/// Deterministic key from a tag.
pub fn key(tag: &[u8]) -> KeyMaterial {
    let keypair = KeyPair::from_secret_bytes(&sha256(tag)).unwrap();
    KeyMaterial::from_keypair(keypair, Network::Dev)
}

/// Key derived from [`MNEMONIC`] at account index 0 on the dev network.
pub fn mnemonic_key() -> KeyMaterial {
    derive_key_material(MNEMONIC, Network::Dev, 0).unwrap()
}

/// A plain dev-network address that belongs to nobody in the tests.
pub fn stranger() -> Address {
    Address::from_pubkey_hash([0xee; 20], Network::Dev)
}

/// Txid whose wire bytes are all `seed`.
pub fn txid(seed: u8) -> Txid {
    Txid::from_wire_bytes([seed; 32])
}

#[derive(Debug, Clone)]
struct Entry {
    utxo: Utxo,
    script: Script,
}

#[derive(Default)]
struct Ledger {
    entries: HashMap<OutPoint, Entry>,
    /// Insertion order, so fetches are deterministic.
    order: Vec<OutPoint>,
    broadcasts: Vec<Transaction>,
    known: HashMap<Txid, TransactionStatus>,
    accept_limit: Option<usize>,
    hide_unconfirmed: bool,
    fetches: u32,
}

/// In-memory indexer implementing [`UtxoSource`].
///
/// Broadcasts are checked like a node would: every input must exist and be
/// signed for its locking script. Accepted transactions spend their inputs
/// and add their outputs as unconfirmed UTXOs.
#[derive(Default)]
pub struct MockIndexer {
    ledger: Mutex<Ledger>,
}

impl MockIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a confirmed output paying `value` to `address` (colored or not).
    pub fn fund(&self, address: &Address, seed: u8, value: u64) -> OutPoint {
        let outpoint = OutPoint::new(txid(seed), 0);
        let script = address.script_pubkey();
        let mut ledger = self.ledger.lock();
        ledger.entries.insert(
            outpoint,
            Entry {
                utxo: Utxo {
                    outpoint,
                    value,
                    confirmed: true,
                    color: address.color().copied(),
                },
                script,
            },
        );
        ledger.order.push(outpoint);
        ledger.known.insert(outpoint.txid, TransactionStatus {
            confirmed: true,
            block_height: Some(1),
        });
        outpoint
    }

    /// Reject every broadcast after the first `n`.
    pub fn accept_only(&self, n: usize) {
        self.ledger.lock().accept_limit = Some(n);
    }

    pub fn accept_all(&self) {
        self.ledger.lock().accept_limit = None;
    }

    /// Report accepted but unconfirmed transactions as unknown.
    pub fn hide_unconfirmed(&self, hide: bool) {
        self.ledger.lock().hide_unconfirmed = hide;
    }

    /// Mark every accepted transaction confirmed at `height`.
    pub fn mine(&self, height: u64) {
        let mut ledger = self.ledger.lock();
        for status in ledger.known.values_mut() {
            if !status.confirmed {
                *status = TransactionStatus {
                    confirmed: true,
                    block_height: Some(height),
                };
            }
        }
        for entry in ledger.entries.values_mut() {
            entry.utxo.confirmed = true;
        }
    }

    pub fn broadcasts(&self) -> Vec<Transaction> {
        self.ledger.lock().broadcasts.clone()
    }

    pub fn fetches(&self) -> u32 {
        self.ledger.lock().fetches
    }

    /// Current UTXOs paying to the pubkey hash of `address`, any color.
    pub fn utxos_of(&self, address: &Address) -> Vec<Utxo> {
        let ledger = self.ledger.lock();
        let hash = *address.pubkey_hash();
        ledger
            .order
            .iter()
            .filter_map(|op| ledger.entries.get(op))
            .filter(|e| e.script.pubkey_hash() == Some(hash))
            .map(|e| e.utxo.clone())
            .collect()
    }

    fn apply(ledger: &mut Ledger, tx: &Transaction) -> Result<Txid, NetworkError> {
        let mut spent = Vec::with_capacity(tx.inputs.len());
        for (i, input) in tx.inputs.iter().enumerate() {
            let entry = ledger
                .entries
                .get(&input.previous_output)
                .ok_or_else(|| NetworkError::Rejected("bad-txns-inputs-missingorspent".into()))?;
            tx.verify_input(i, &entry.script)
                .map_err(|e| NetworkError::Rejected(format!("mandatory-script-verify-flag-failed: {e}")))?;
            spent.push(input.previous_output);
        }
        let txid = tx.txid();
        for op in &spent {
            ledger.entries.remove(op);
            ledger.order.retain(|o| o != op);
        }
        for (index, output) in tx.outputs.iter().enumerate() {
            let outpoint = OutPoint::new(txid, index as u32);
            ledger.entries.insert(
                outpoint,
                Entry {
                    utxo: Utxo {
                        outpoint,
                        value: output.value,
                        confirmed: false,
                        color: output.script_pubkey.color_id(),
                    },
                    script: output.script_pubkey.clone(),
                },
            );
            ledger.order.push(outpoint);
        }
        ledger.known.insert(txid, TransactionStatus::default());
        ledger.broadcasts.push(tx.clone());
        Ok(txid)
    }
}

#[async_trait]
impl UtxoSource for MockIndexer {
    async fn get_utxos(&self, address: &Address) -> Result<Vec<Utxo>, NetworkError> {
        self.ledger.lock().fetches += 1;
        Ok(self.utxos_of(address))
    }

    async fn broadcast(&self, raw_tx_hex: &str) -> Result<Txid, NetworkError> {
        let tx = Transaction::from_hex(raw_tx_hex)
            .map_err(|e| NetworkError::Rejected(format!("TX decode failed: {e}")))?;
        let mut ledger = self.ledger.lock();
        if ledger.accept_limit.is_some_and(|n| ledger.broadcasts.len() >= n) {
            return Err(NetworkError::Http {
                status: 503,
                body: "service unavailable".into(),
            });
        }
        Self::apply(&mut ledger, &tx)
    }

    async fn transaction_status(&self, txid: &Txid) -> Result<TransactionStatus, NetworkError> {
        let ledger = self.ledger.lock();
        match ledger.known.get(txid) {
            Some(status) if status.confirmed || !ledger.hide_unconfirmed => Ok(*status),
            _ => Err(NetworkError::Http {
                status: 404,
                body: "Transaction not found".into(),
            }),
        }
    }
}

/// Colored outputs of `tx` for `color`, in order.
pub fn colored_outputs(tx: &Transaction, color: &ColorId) -> Vec<u64> {
    tx.outputs
        .iter()
        .filter(|o| o.script_pubkey.color_id().as_ref() == Some(color))
        .map(|o| o.value)
        .collect()
}

/// Native (uncolored) outputs of `tx`, in order.
pub fn native_outputs(tx: &Transaction) -> Vec<u64> {
    tx.outputs
        .iter()
        .filter(|o| !o.is_colored())
        .map(|o| o.value)
        .collect()
}
