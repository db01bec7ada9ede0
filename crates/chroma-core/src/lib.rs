//! # chroma-core
//! Foundation types for the Chroma colored-coin wallet engine: amounts and
//! color identifiers, secp256k1 primitives, addresses, scripts, and the
//! ledger's transaction wire format.

pub mod address;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod script;
pub mod traits;
pub mod transaction;
pub mod types;
