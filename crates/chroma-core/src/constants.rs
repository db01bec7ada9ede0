//! Ledger constants. All native values are in tapyrus (1 TPC = 10^8 tapyrus).

pub const COIN: u64 = 100_000_000;

/// Maximum native supply. Any native amount or UTXO value above this is invalid.
pub const MAX_MONEY: u64 = 21_000_000 * COIN;

/// Upper bound for colored-asset amounts.
///
/// Matches the largest integer the indexer ecosystem represents exactly
/// (2^53 - 1), so amounts round-trip through JSON without loss.
pub const MAX_COLORED_AMOUNT: u64 = 9_007_199_254_740_991;

/// Smallest native output value the network relays.
pub const DUST_THRESHOLD: u64 = 546;

/// Default fee rate in tapyrus per estimated byte.
pub const DEFAULT_FEE_RATE: u64 = 1;

/// Fixed per-transaction overhead of the size model, in bytes.
pub const TX_BASE_SIZE: u64 = 10;

/// Estimated size of one signed P2PKH-style input, in bytes.
pub const INPUT_SIZE: u64 = 148;

/// Estimated size of one output, in bytes.
pub const OUTPUT_SIZE: u64 = 34;

/// Value of the transaction `features` field.
pub const TX_FEATURES: i32 = 1;

/// Input sequence used for every input this engine builds.
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Signature hash type committing to all inputs and outputs.
pub const SIGHASH_ALL: u8 = 0x01;

/// Length of a color identifier: one type byte plus a SHA-256 digest.
pub const COLOR_ID_LEN: usize = 33;

/// Ticker of the native asset.
pub const NATIVE_TICKER: &str = "TPC";

/// Estimated transaction size for the linear fee model.
pub fn estimated_size(inputs: u64, outputs: u64) -> u64 {
    TX_BASE_SIZE
        .saturating_add(INPUT_SIZE.saturating_mul(inputs))
        .saturating_add(OUTPUT_SIZE.saturating_mul(outputs))
}

/// Fee for a transaction with the given shape at `fee_rate` tapyrus per byte.
pub fn estimated_fee(fee_rate: u64, inputs: u64, outputs: u64) -> u64 {
    fee_rate.saturating_mul(estimated_size(inputs, outputs))
}
