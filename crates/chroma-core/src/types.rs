//! Core value types: transaction ids, outpoints, color identifiers, UTXOs.
//!
//! Native amounts are in tapyrus (1 TPC = 10^8 tapyrus). Colored amounts are
//! plain integer token units; their meaning depends on the token's decimals.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::COLOR_ID_LEN;
use crate::crypto::sha256;
use crate::error::{ColorIdError, TransactionError};

/// A transaction id.
///
/// Stored in wire order (the raw double-SHA-256 output). Displayed and parsed
/// in the conventional byte-reversed hex form used by explorers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Txid([u8; 32]);

impl Txid {
    /// Wrap raw wire-order bytes.
    pub fn from_wire_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Wire-order bytes, as embedded in transaction inputs.
    pub fn to_wire_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Parse the 64-character display form.
    pub fn from_hex(s: &str) -> Result<Self, TransactionError> {
        if s.len() != 64 {
            return Err(TransactionError::InvalidTxid(s.to_string()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|_| TransactionError::InvalidTxid(s.to_string()))?;
        bytes.reverse();
        Ok(Self(bytes))
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().rev() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txid({self})")
    }
}

impl FromStr for Txid {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Txid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Txid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Reference to a specific output of a previous transaction.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    /// Transaction containing the referenced output.
    pub txid: Txid,
    /// Output index within that transaction.
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: Txid, index: u32) -> Self {
        Self { txid, index }
    }

    /// Wire encoding: txid (32 bytes, wire order) followed by index (u32 LE).
    pub fn to_bytes(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        out[..32].copy_from_slice(&self.txid.to_wire_bytes());
        out[32..].copy_from_slice(&self.index.to_le_bytes());
        out
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

impl FromStr for OutPoint {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid, index) = s
            .split_once(':')
            .ok_or_else(|| TransactionError::InvalidOutPoint(s.to_string()))?;
        let index = index
            .parse::<u32>()
            .map_err(|_| TransactionError::InvalidOutPoint(s.to_string()))?;
        Ok(Self::new(Txid::from_hex(txid)?, index))
    }
}

/// Token class, selecting how a color identifier is derived.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// `c1`: derived from a public key, can be issued again.
    Reissuable,
    /// `c2`: derived from a spent outpoint, fixed supply.
    NonReissuable,
    /// `c3`: derived from a spent outpoint, supply of exactly one.
    Nft,
}

impl TokenType {
    /// Type byte prefixed to the color identifier.
    pub fn prefix(&self) -> u8 {
        match self {
            TokenType::Reissuable => 0xc1,
            TokenType::NonReissuable => 0xc2,
            TokenType::Nft => 0xc3,
        }
    }

    pub fn from_prefix(byte: u8) -> Result<Self, ColorIdError> {
        match byte {
            0xc1 => Ok(TokenType::Reissuable),
            0xc2 => Ok(TokenType::NonReissuable),
            0xc3 => Ok(TokenType::Nft),
            other => Err(ColorIdError::UnknownType(other)),
        }
    }

    /// Whether the color id is derived from a spent outpoint.
    pub fn is_outpoint_derived(&self) -> bool {
        !matches!(self, TokenType::Reissuable)
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenType::Reissuable => "reissuable",
            TokenType::NonReissuable => "non_reissuable",
            TokenType::Nft => "nft",
        };
        f.write_str(s)
    }
}

impl FromStr for TokenType {
    type Err = ColorIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reissuable" | "c1" => Ok(TokenType::Reissuable),
            "non_reissuable" | "non-reissuable" | "c2" => Ok(TokenType::NonReissuable),
            "nft" | "c3" => Ok(TokenType::Nft),
            _ => Err(ColorIdError::UnknownTokenType(s.to_string())),
        }
    }
}

/// A 33-byte color identifier: type byte followed by a SHA-256 digest.
///
/// Byte ordering matches the lexicographic ordering of the lowercase hex form,
/// so sorting `ColorId`s sorts their display strings.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColorId([u8; COLOR_ID_LEN]);

impl ColorId {
    /// Build a color id from a token class and a 32-byte digest.
    pub fn new(token_type: TokenType, digest: [u8; 32]) -> Self {
        let mut bytes = [0u8; COLOR_ID_LEN];
        bytes[0] = token_type.prefix();
        bytes[1..].copy_from_slice(&digest);
        Self(bytes)
    }

    /// `c1` id: SHA-256 of the script the issuing key pays to.
    pub fn reissuable(script_pubkey: &[u8]) -> Self {
        Self::new(TokenType::Reissuable, sha256(script_pubkey))
    }

    /// `c2`/`c3` id: SHA-256 of the wire-encoded outpoint.
    pub fn from_outpoint(token_type: TokenType, outpoint: &OutPoint) -> Result<Self, ColorIdError> {
        if !token_type.is_outpoint_derived() {
            return Err(ColorIdError::UnknownType(token_type.prefix()));
        }
        Ok(Self::new(token_type, sha256(&outpoint.to_bytes())))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ColorIdError> {
        if bytes.len() != COLOR_ID_LEN {
            return Err(ColorIdError::InvalidLength(bytes.len()));
        }
        TokenType::from_prefix(bytes[0])?;
        let mut out = [0u8; COLOR_ID_LEN];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn from_hex(s: &str) -> Result<Self, ColorIdError> {
        let bytes = hex::decode(s).map_err(|_| ColorIdError::InvalidHex(s.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Parse a color id as reported by an indexer.
    ///
    /// The all-zero id denotes the native asset and maps to `None`.
    pub fn parse_indexer(s: &str) -> Result<Option<Self>, ColorIdError> {
        if !s.is_empty() && s.bytes().all(|b| b == b'0') {
            return Ok(None);
        }
        Self::from_hex(s).map(Some)
    }

    pub fn as_bytes(&self) -> &[u8; COLOR_ID_LEN] {
        &self.0
    }

    pub fn token_type(&self) -> TokenType {
        // Construction guarantees a known prefix.
        TokenType::from_prefix(self.0[0]).unwrap_or(TokenType::Reissuable)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ColorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ColorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ColorId({})", self.to_hex())
    }
}

impl FromStr for ColorId {
    type Err = ColorIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ColorId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ColorId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// An unspent output as reported by the UTXO source.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Utxo {
    pub outpoint: OutPoint,
    /// Native value in tapyrus, or token units for colored outputs.
    pub value: u64,
    pub confirmed: bool,
    /// `None` for the native asset.
    pub color: Option<ColorId>,
}

impl Utxo {
    pub fn is_native(&self) -> bool {
        self.color.is_none()
    }

    /// Whether this output belongs to the given asset bucket.
    pub fn has_color(&self, color: Option<&ColorId>) -> bool {
        self.color.as_ref() == color
    }
}

/// Confirmation state of a transaction.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TransactionStatus {
    pub confirmed: bool,
    pub block_height: Option<u64>,
}
