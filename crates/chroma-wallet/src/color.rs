//! Pay-to-contract keys and color identifiers.
//!
//! An issuer commits to token metadata by tweaking its base key:
//!
//! 1. `commitment = SHA256(base_pubkey || SHA256(canonical_metadata))`
//! 2. `p2c_pubkey = base_pubkey + commitment·G`
//! 3. `p2c_secret = base_secret + commitment (mod n)`
//!
//! The color id then depends on the token class:
//! - `c1` (reissuable): `0xc1 || SHA256(p2pkh(HASH160(p2c_pubkey)))`
//! - `c2`/`c3`: `0xc2`/`0xc3 || SHA256(outpoint)` for the spent funding outpoint

use chroma_core::address::{Address, Network};
use chroma_core::crypto::{KeyPair, PublicKey, add_scalars, check_scalar, sha256, tweak_public_key};
use chroma_core::script::Script;
use chroma_core::types::{ColorId, OutPoint, TokenType};

use crate::error::WalletError;
use crate::metadata::Metadata;

/// Commitment scalar binding `metadata` to `base`.
pub fn commitment(base: &PublicKey, metadata: &Metadata) -> Result<[u8; 32], WalletError> {
    let mut data = Vec::with_capacity(65);
    data.extend_from_slice(&base.to_bytes());
    data.extend_from_slice(&metadata.digest()?);
    let c = sha256(&data);
    check_scalar(&c)
        .map_err(|e| WalletError::KeyDerivation(format!("commitment is not a usable scalar: {e}")))?;
    Ok(c)
}

/// The tweaked private key for a commitment produced by [`commitment`].
pub fn p2c_keypair(base: &KeyPair, commitment: &[u8; 32]) -> Result<KeyPair, WalletError> {
    let secret = add_scalars(&base.secret_bytes(), commitment)
        .map_err(|e| WalletError::KeyDerivation(format!("P2C private key: {e}")))?;
    KeyPair::from_secret_bytes(&secret).map_err(|e| WalletError::KeyDerivation(e.to_string()))
}

/// `c1` color id for a P2C public key.
pub fn reissuable_color_id(p2c_public_key: &PublicKey) -> ColorId {
    ColorId::reissuable(Script::p2pkh(&p2c_public_key.pubkey_hash()).as_bytes())
}

/// `c2`/`c3` color id for the outpoint spent by the issue transaction.
pub fn outpoint_color_id(token_type: TokenType, outpoint: &OutPoint) -> Result<ColorId, WalletError> {
    Ok(ColorId::from_outpoint(token_type, outpoint)?)
}

/// A base public key tweaked by a metadata commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayToContract {
    base: PublicKey,
    commitment: [u8; 32],
    public_key: PublicKey,
}

impl PayToContract {
    pub fn derive(base: &PublicKey, metadata: &Metadata) -> Result<Self, WalletError> {
        let commitment = commitment(base, metadata)?;
        Self::from_commitment(base, commitment)
    }

    /// Rebuild from a previously computed commitment.
    pub fn from_commitment(base: &PublicKey, commitment: [u8; 32]) -> Result<Self, WalletError> {
        let public_key = tweak_public_key(base, &commitment)
            .map_err(|e| WalletError::KeyDerivation(format!("P2C public key: {e}")))?;
        Ok(Self {
            base: base.clone(),
            commitment,
            public_key,
        })
    }

    /// The payment base (untweaked issuer key).
    pub fn base(&self) -> &PublicKey {
        &self.base
    }

    pub fn commitment(&self) -> &[u8; 32] {
        &self.commitment
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Plain address of the tweaked key.
    pub fn address(&self, network: Network) -> Address {
        Address::from_public_key(&self.public_key, network)
    }

    /// Signing key for outputs paid to [`Self::address`].
    ///
    /// `base` must be the private half of [`Self::base`].
    pub fn keypair(&self, base: &KeyPair) -> Result<KeyPair, WalletError> {
        if base.public_key() != self.base {
            return Err(WalletError::KeyDerivation(
                "signing key does not match the payment base".into(),
            ));
        }
        let keypair = p2c_keypair(base, &self.commitment)?;
        if keypair.public_key() != self.public_key {
            return Err(WalletError::KeyDerivation(
                "tweaked private key does not match tweaked public key".into(),
            ));
        }
        Ok(keypair)
    }

    pub fn reissuable_color_id(&self) -> ColorId {
        reissuable_color_id(&self.public_key)
    }
}
