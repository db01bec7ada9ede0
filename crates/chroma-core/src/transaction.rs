//! Transaction wire format, txids and input signing.
//!
//! Layout (little-endian integers, compact-size counts):
//!
//! ```text
//! features:i32 | n_in | (prev_txid[32] prev_index:u32 script_sig sequence:u32)*
//!              | n_out | (value:u64 script_pubkey)* | lock_time:u32
//! ```
//!
//! The txid is malleability-fixed: it is the double SHA-256 of the transaction
//! serialized with every `script_sig` emptied, so signing never changes it.
//! This lets a funding transaction's id be known before it is broadcast.

use serde::{Deserialize, Serialize};

use crate::constants::{SEQUENCE_FINAL, SIGHASH_ALL, TX_FEATURES};
use crate::crypto::{KeyPair, PublicKey, hash160, sha256d};
use crate::error::{CryptoError, TransactionError};
use crate::script::Script;
use crate::types::{OutPoint, Txid};

/// A transaction input spending a previous output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxIn {
    pub previous_output: OutPoint,
    /// Unlocking script. Empty until signed.
    pub script_sig: Script,
    pub sequence: u32,
}

impl TxIn {
    /// Unsigned input with a final sequence number.
    pub fn new(previous_output: OutPoint) -> Self {
        Self {
            previous_output,
            script_sig: Script::new(),
            sequence: SEQUENCE_FINAL,
        }
    }
}

/// A transaction output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    /// Native value, or token units when `script_pubkey` is colored.
    pub value: u64,
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn is_colored(&self) -> bool {
        self.script_pubkey.is_cp2pkh()
    }
}

/// A ledger transaction in its decoded form.
///
/// The txid hashes the encoding with every input script emptied, so signing
/// does not change it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Version field; always [`TX_FEATURES`] for transactions built here.
    pub features: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            features: TX_FEATURES,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }
}

/// Which script to emit for each input while encoding.
enum ScriptMode<'a> {
    Actual,
    Empty,
    /// Sighash preimage: `script_code` at `index`, empty elsewhere.
    SignatureHash { index: usize, script_code: &'a Script },
}

impl Transaction {
    pub fn new(inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Self {
        Self {
            inputs,
            outputs,
            ..Self::default()
        }
    }

    fn encode(&self, mode: ScriptMode<'_>) -> Vec<u8> {
        let mut out = Vec::with_capacity(10 + self.inputs.len() * 148 + self.outputs.len() * 34);
        out.extend_from_slice(&self.features.to_le_bytes());
        write_compact_size(&mut out, self.inputs.len() as u64);
        for (i, input) in self.inputs.iter().enumerate() {
            out.extend_from_slice(&input.previous_output.to_bytes());
            let script: &[u8] = match &mode {
                ScriptMode::Actual => input.script_sig.as_bytes(),
                ScriptMode::Empty => &[],
                ScriptMode::SignatureHash { index, script_code } if *index == i => {
                    script_code.as_bytes()
                }
                ScriptMode::SignatureHash { .. } => &[],
            };
            write_var_bytes(&mut out, script);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_compact_size(&mut out, self.outputs.len() as u64);
        for output in &self.outputs {
            out.extend_from_slice(&output.value.to_le_bytes());
            write_var_bytes(&mut out, output.script_pubkey.as_bytes());
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    /// Full wire encoding including unlocking scripts.
    pub fn serialize(&self) -> Vec<u8> {
        self.encode(ScriptMode::Actual)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        self.serialize().len()
    }

    /// Malleability-fixed transaction id (unlocking scripts excluded).
    pub fn txid(&self) -> Txid {
        Txid::from_wire_bytes(sha256d(&self.encode(ScriptMode::Empty)))
    }

    /// Sum of output values, failing on overflow.
    pub fn total_output_value(&self) -> Result<u64, TransactionError> {
        self.outputs.iter().try_fold(0u64, |acc, o| {
            acc.checked_add(o.value).ok_or(TransactionError::ValueOverflow)
        })
    }

    /// Legacy signature hash for `input_index` with `script_code` substituted.
    pub fn signature_hash(
        &self,
        input_index: usize,
        script_code: &Script,
        sighash_type: u8,
    ) -> Result<[u8; 32], CryptoError> {
        if input_index >= self.inputs.len() {
            return Err(CryptoError::InputIndexOutOfBounds {
                index: input_index,
                len: self.inputs.len(),
            });
        }
        let mut preimage = self.encode(ScriptMode::SignatureHash {
            index: input_index,
            script_code,
        });
        preimage.extend_from_slice(&(sighash_type as u32).to_le_bytes());
        Ok(sha256d(&preimage))
    }

    /// Sign one input against the script of the output it spends.
    ///
    /// `script_code` is the previous output's locking script: P2PKH for native
    /// inputs, colored P2PKH for colored inputs.
    pub fn sign_input(
        &mut self,
        input_index: usize,
        keypair: &KeyPair,
        script_code: &Script,
    ) -> Result<(), TransactionError> {
        let public_key = keypair.public_key();
        if script_code.pubkey_hash() != Some(public_key.pubkey_hash()) {
            return Err(CryptoError::PubkeyHashMismatch.into());
        }
        let hash = self.signature_hash(input_index, script_code, SIGHASH_ALL)?;
        let mut sig = keypair.sign_hash(&hash)?;
        sig.push(SIGHASH_ALL);
        self.inputs[input_index].script_sig =
            Script::signature_script(&sig, &public_key.to_bytes());
        Ok(())
    }

    /// Check an input's unlocking script against `script_code`.
    pub fn verify_input(
        &self,
        input_index: usize,
        script_code: &Script,
    ) -> Result<(), TransactionError> {
        let input = self
            .inputs
            .get(input_index)
            .ok_or(CryptoError::InputIndexOutOfBounds {
                index: input_index,
                len: self.inputs.len(),
            })?;
        let pushes = input.script_sig.pushes()?;
        let [sig, pubkey] = pushes.as_slice() else {
            return Err(TransactionError::UnsupportedScript { index: input_index });
        };
        let (hash_type, der) = sig
            .split_last()
            .ok_or(CryptoError::InvalidSignature)?;
        if *hash_type != SIGHASH_ALL {
            return Err(CryptoError::InvalidSignature.into());
        }
        let expected = script_code
            .pubkey_hash()
            .ok_or(TransactionError::UnsupportedScript { index: input_index })?;
        if hash160(pubkey) != expected {
            return Err(CryptoError::PubkeyHashMismatch.into());
        }
        let public_key = PublicKey::from_bytes(pubkey)?;
        let hash = self.signature_hash(input_index, script_code, SIGHASH_ALL)?;
        public_key.verify(&hash, der)?;
        Ok(())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut r = Reader { bytes, pos: 0 };
        let features = r.read_i32()?;
        let n_in = r.read_compact_size()?;
        let mut inputs = Vec::with_capacity(n_in.min(1024) as usize);
        for _ in 0..n_in {
            let mut txid = [0u8; 32];
            txid.copy_from_slice(r.read_slice(32)?);
            let index = r.read_u32()?;
            let script_sig = Script::from_bytes(r.read_var_bytes()?.to_vec());
            let sequence = r.read_u32()?;
            inputs.push(TxIn {
                previous_output: OutPoint::new(Txid::from_wire_bytes(txid), index),
                script_sig,
                sequence,
            });
        }
        let n_out = r.read_compact_size()?;
        let mut outputs = Vec::with_capacity(n_out.min(1024) as usize);
        for _ in 0..n_out {
            let value = r.read_u64()?;
            let script_pubkey = Script::from_bytes(r.read_var_bytes()?.to_vec());
            outputs.push(TxOut {
                value,
                script_pubkey,
            });
        }
        let lock_time = r.read_u32()?;
        if r.pos != bytes.len() {
            return Err(TransactionError::TrailingBytes(bytes.len() - r.pos));
        }
        Ok(Self {
            features,
            inputs,
            outputs,
            lock_time,
        })
    }

    pub fn from_hex(s: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(s.trim()).map_err(|e| TransactionError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

fn write_compact_size(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

fn write_var_bytes(out: &mut Vec<u8>, data: &[u8]) {
    write_compact_size(out, data.len() as u64);
    out.extend_from_slice(data);
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], TransactionError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(TransactionError::Truncated(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], TransactionError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_slice(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8, TransactionError> {
        Ok(self.read_array::<1>()?[0])
    }

    fn read_u32(&mut self) -> Result<u32, TransactionError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_i32(&mut self) -> Result<i32, TransactionError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    fn read_u64(&mut self) -> Result<u64, TransactionError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    fn read_compact_size(&mut self) -> Result<u64, TransactionError> {
        match self.read_u8()? {
            0xfd => Ok(u16::from_le_bytes(self.read_array()?) as u64),
            0xfe => Ok(self.read_u32()? as u64),
            0xff => self.read_u64(),
            n => Ok(n as u64),
        }
    }

    fn read_var_bytes(&mut self) -> Result<&'a [u8], TransactionError> {
        let len = self.read_compact_size()?;
        let len = usize::try_from(len).map_err(|_| TransactionError::Truncated(self.pos))?;
        self.read_slice(len)
    }
}
