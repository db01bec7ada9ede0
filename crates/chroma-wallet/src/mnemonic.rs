//! BIP-39 mnemonic validation and seed derivation.

use bip39::{Language, Mnemonic};

use crate::error::WalletError;
use crate::keys::Seed;

/// Collapse whitespace and lowercase a phrase before parsing.
pub fn normalize_mnemonic(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Parse and checksum-validate an English BIP-39 phrase.
pub fn validate_mnemonic(phrase: &str) -> Result<Mnemonic, WalletError> {
    let normalized = normalize_mnemonic(phrase);
    if normalized.is_empty() {
        return Err(WalletError::InvalidMnemonic("empty phrase".into()));
    }
    Mnemonic::parse_in(Language::English, normalized.as_str())
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))
}

/// Derive the 64-byte BIP-39 seed (empty passphrase).
pub fn mnemonic_to_seed(phrase: &str) -> Result<Seed, WalletError> {
    let m = validate_mnemonic(phrase)?;
    Ok(Seed::from_bytes(m.to_seed_normalized("")))
}

/// Generate a fresh phrase from OS entropy. `word_count` is 12, 15, 18, 21 or 24.
pub fn generate_mnemonic(word_count: usize) -> Result<String, WalletError> {
    use rand::RngCore;

    if !matches!(word_count, 12 | 15 | 18 | 21 | 24) {
        return Err(WalletError::InvalidMnemonic(format!(
            "unsupported word count: {word_count}"
        )));
    }
    let mut entropy = zeroize::Zeroizing::new([0u8; 32]);
    let len = word_count / 3 * 4;
    rand::rngs::OsRng.fill_bytes(&mut entropy[..len]);
    let m = Mnemonic::from_entropy_in(Language::English, &entropy[..len])
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    Ok(m.to_string())
}
