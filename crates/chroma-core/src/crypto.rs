//! secp256k1 and hashing primitives.
//!
//! Wraps `k256` behind fixed-width byte interfaces. Every operation that can
//! fail on invalid input (out-of-range scalar, zero sum, point at infinity)
//! returns a [`CryptoError`] that callers must handle explicitly.
//!
//! # Signing scheme
//!
//! Inputs are signed with ECDSA over a 32-byte signature hash. Signatures are
//! low-S normalized and DER encoded; the sighash type byte is appended by the
//! transaction layer, not here.

use hmac::{Hmac, Mac};
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::PrimeField;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{FieldBytes, ProjectivePoint, Scalar};
use ripemd::Ripemd160;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Length of a compressed SEC1 public key.
pub const PUBLIC_KEY_LEN: usize = 33;

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 applied twice. Used for txids, sighashes and base58 checksums.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// RIPEMD-160 of SHA-256, the pubkey hash committed to by P2PKH scripts.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(sha256(data)).into()
}

pub fn hmac_sha512(key: &[u8], data: &[u8]) -> Result<[u8; 64], CryptoError> {
    let mut mac = Hmac::<Sha512>::new_from_slice(key)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    mac.update(data);
    let mut out = [0u8; 64];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Interpret 32 big-endian bytes as a scalar, rejecting values `>= n`.
fn scalar_from_bytes(bytes: &[u8; 32]) -> Result<Scalar, CryptoError> {
    Option::<Scalar>::from(Scalar::from_repr(FieldBytes::from(*bytes)))
        .ok_or(CryptoError::ScalarOutOfRange)
}

fn scalar_to_bytes(scalar: &Scalar) -> Zeroizing<[u8; 32]> {
    let mut out = Zeroizing::new([0u8; 32]);
    out.copy_from_slice(&scalar.to_bytes());
    out
}

/// Returns `Ok(())` if the bytes are a valid non-zero scalar.
pub fn check_scalar(bytes: &[u8; 32]) -> Result<(), CryptoError> {
    let scalar = scalar_from_bytes(bytes)?;
    if scalar == Scalar::ZERO {
        return Err(CryptoError::ZeroScalar);
    }
    Ok(())
}

/// `(a + b) mod n`. Fails if either operand is out of range or the sum is zero.
pub fn add_scalars(a: &[u8; 32], b: &[u8; 32]) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let sum = scalar_from_bytes(a)? + scalar_from_bytes(b)?;
    if sum == Scalar::ZERO {
        return Err(CryptoError::ZeroScalar);
    }
    Ok(scalar_to_bytes(&sum))
}

/// Point addition. Fails if the sum is the point at infinity.
pub fn add_points(a: &PublicKey, b: &PublicKey) -> Result<PublicKey, CryptoError> {
    let sum = a.inner.to_projective() + b.inner.to_projective();
    k256::PublicKey::from_affine(sum.to_affine())
        .map(|inner| PublicKey { inner })
        .map_err(|_| CryptoError::PointAtInfinity)
}

/// `P + t·G` for a public key `P` and tweak scalar `t`.
pub fn tweak_public_key(base: &PublicKey, tweak: &[u8; 32]) -> Result<PublicKey, CryptoError> {
    let t = scalar_from_bytes(tweak)?;
    let sum = base.inner.to_projective() + ProjectivePoint::GENERATOR * t;
    k256::PublicKey::from_affine(sum.to_affine())
        .map(|inner| PublicKey { inner })
        .map_err(|_| CryptoError::PointAtInfinity)
}

pub fn derive_public_key(secret: &[u8; 32]) -> Result<PublicKey, CryptoError> {
    Ok(KeyPair::from_secret_bytes(secret)?.public_key())
}

/// secp256k1 keypair for signing transaction inputs.
///
/// The underlying `SigningKey` zeroizes its scalar on drop.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Create a keypair from a 32-byte big-endian secret scalar.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        check_scalar(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        let signing_key = SigningKey::from_bytes(&FieldBytes::from(*bytes))
            .map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: k256::PublicKey::from(self.signing_key.verifying_key()),
        }
    }

    /// Raw secret scalar. Wiped when the returned buffer is dropped.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(&self.signing_key.to_bytes());
        out
    }

    /// Sign a 32-byte prehash, returning a low-S DER signature.
    pub fn sign_hash(&self, hash: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
        let sig: Signature = self
            .signing_key
            .sign_prehash(hash)
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        let sig = sig.normalize_s().unwrap_or(sig);
        Ok(sig.to_der().as_bytes().to_vec())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Compressed secp256k1 public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: k256::PublicKey,
}

impl PublicKey {
    /// Parse a SEC1-encoded point (compressed or uncompressed).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        k256::PublicKey::from_sec1_bytes(bytes)
            .map(|inner| Self { inner })
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidPublicKey)?;
        Self::from_bytes(&bytes)
    }

    /// 33-byte compressed encoding.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        let point = self.inner.to_encoded_point(true);
        let mut out = [0u8; PUBLIC_KEY_LEN];
        out.copy_from_slice(point.as_bytes());
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// HASH160 of the compressed key.
    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.to_bytes())
    }

    /// Verify a DER signature over a 32-byte prehash.
    pub fn verify(&self, hash: &[u8; 32], der: &[u8]) -> Result<(), CryptoError> {
        let sig = Signature::from_der(der).map_err(|_| CryptoError::InvalidSignature)?;
        VerifyingKey::from(&self.inner)
            .verify_prehash(hash, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
