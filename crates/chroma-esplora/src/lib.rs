//! # chroma-esplora: HTTP UTXO source
//!
//! Implements [`chroma_core::traits::UtxoSource`] against an Esplora-style
//! REST indexer:
//!
//! - `GET  {base}/address/{address}/utxo`
//! - `POST {base}/tx` (body: raw transaction hex, response: txid)
//! - `GET  {base}/tx/{txid}/status`
//!
//! Responses are validated in [`schema`] before they reach the engine.
//! Entries that fail validation are dropped and logged.
//!
//! [`registry`] resolves color ids to token metadata through the public
//! token registry (`GET {base}/{network_id}/{color_id}.json`).

pub mod client;
pub mod registry;
pub mod schema;

#[cfg(test)]
mod test_server;

pub use client::{DEFAULT_TIMEOUT, EsploraClient};
pub use registry::{DEFAULT_REGISTRY_URL, RegistryClient};
