//! Raw indexer payloads and their validation.
//!
//! Every field is deserialized loosely (`serde_json::Value`) so that one bad
//! entry does not fail the whole response. [`validate_utxo`] then enforces:
//! txid of 64 hex characters, `vout` a non-negative integer within `u32`,
//! `value` a non-negative integer within the bound for its asset, a `status`
//! object with a boolean `confirmed`, and an optional hex color id.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use chroma_core::constants::{MAX_COLORED_AMOUNT, MAX_MONEY};
use chroma_core::types::{ColorId, OutPoint, TransactionStatus, Txid, Utxo};

/// One entry of `GET /address/{address}/utxo` as received.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawUtxo {
    #[serde(default)]
    pub txid: Value,
    #[serde(default)]
    pub vout: Value,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub status: Value,
    #[serde(default, alias = "color_id")]
    #[serde(rename = "colorId")]
    pub color_id: Value,
}

/// Body of `GET /tx/{txid}/status`.
#[derive(Deserialize, Debug, Clone)]
pub struct RawStatus {
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u64>,
}

impl From<RawStatus> for TransactionStatus {
    fn from(raw: RawStatus) -> Self {
        Self {
            confirmed: raw.confirmed,
            block_height: raw.block_height,
        }
    }
}

/// Check one raw entry, returning the reason it was rejected.
pub fn validate_utxo(raw: &RawUtxo) -> Result<Utxo, String> {
    let txid = raw
        .txid
        .as_str()
        .filter(|s| s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit()))
        .ok_or_else(|| format!("invalid txid {}", raw.txid))?;
    let txid = Txid::from_hex(txid).map_err(|e| e.to_string())?;

    let vout = raw
        .vout
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| format!("invalid vout {}", raw.vout))?;

    let confirmed = raw
        .status
        .get("confirmed")
        .and_then(Value::as_bool)
        .ok_or_else(|| format!("invalid status {}", raw.status))?;

    let color = match &raw.color_id {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => ColorId::parse_indexer(s).map_err(|e| format!("invalid color id: {e}"))?,
        other => return Err(format!("invalid color id {other}")),
    };

    let bound = if color.is_some() { MAX_COLORED_AMOUNT } else { MAX_MONEY };
    let value = raw
        .value
        .as_u64()
        .filter(|v| *v <= bound)
        .ok_or_else(|| format!("invalid value {}", raw.value))?;

    Ok(Utxo {
        outpoint: OutPoint::new(txid, vout),
        value,
        confirmed,
        color,
    })
}

/// Validate every entry, dropping and logging the malformed ones.
pub fn validate_utxos(raw: Vec<RawUtxo>) -> Vec<Utxo> {
    raw.into_iter()
        .filter_map(|entry| match validate_utxo(&entry) {
            Ok(utxo) => Some(utxo),
            Err(reason) => {
                warn!(%reason, "dropping malformed UTXO from indexer");
                None
            }
        })
        .collect()
}
