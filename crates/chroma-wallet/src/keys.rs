//! Seed handling and hierarchical deterministic key derivation.
//!
//! Keys follow BIP-32 over secp256k1 on the path
//! `m/44'/{network_id}'/0'/0/{index}`, where the coin type is the network id
//! of the target ledger. The same mnemonic always yields the same address.

use std::fmt;
use std::str::FromStr;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use chroma_core::address::{Address, Network};
use chroma_core::crypto::{KeyPair, PublicKey, add_scalars, check_scalar, derive_public_key, hmac_sha512};

use crate::error::WalletError;
use crate::mnemonic::mnemonic_to_seed;

/// HMAC key for the BIP-32 master node.
const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";

/// Offset marking a hardened child index.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// A 64-byte BIP-39 seed.
///
/// Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: [u8; 64],
}

impl Seed {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    /// Get the raw seed bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// One step of a derivation path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChildNumber(u32);

impl ChildNumber {
    pub fn normal(index: u32) -> Result<Self, WalletError> {
        if index >= HARDENED_OFFSET {
            return Err(WalletError::KeyDerivation(format!("child index too large: {index}")));
        }
        Ok(Self(index))
    }

    pub fn hardened(index: u32) -> Result<Self, WalletError> {
        Self::normal(index).map(|c| Self(c.0 | HARDENED_OFFSET))
    }

    pub fn is_hardened(&self) -> bool {
        self.0 & HARDENED_OFFSET != 0
    }

    /// Index without the hardened bit.
    pub fn index(&self) -> u32 {
        self.0 & !HARDENED_OFFSET
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ChildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_hardened() {
            write!(f, "{}'", self.index())
        } else {
            write!(f, "{}", self.index())
        }
    }
}

/// A BIP-32 derivation path such as `m/44'/1'/0'/0/0`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivationPath(Vec<ChildNumber>);

impl DerivationPath {
    /// `m/44'/{network_id}'/0'/0/{index}`.
    pub fn for_account(network: Network, index: u32) -> Result<Self, WalletError> {
        Ok(Self(vec![
            ChildNumber::hardened(44)?,
            ChildNumber::hardened(network.network_id())?,
            ChildNumber::hardened(0)?,
            ChildNumber::normal(0)?,
            ChildNumber::normal(index)?,
        ]))
    }

    pub fn children(&self) -> &[ChildNumber] {
        &self.0
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for child in &self.0 {
            write!(f, "/{child}")?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/');
        if parts.next() != Some("m") {
            return Err(WalletError::KeyDerivation(format!("path must start with m: {s}")));
        }
        let children = parts
            .map(|part| {
                let (digits, hardened) = match part.strip_suffix(['\'', 'h']) {
                    Some(d) => (d, true),
                    None => (part, false),
                };
                let index: u32 = digits
                    .parse()
                    .map_err(|_| WalletError::KeyDerivation(format!("bad path segment: {part}")))?;
                if hardened {
                    ChildNumber::hardened(index)
                } else {
                    ChildNumber::normal(index)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(children))
    }
}

/// A private key with its chain code.
#[derive(Zeroize, ZeroizeOnDrop)]
struct ExtendedPrivateKey {
    secret: [u8; 32],
    chain_code: [u8; 32],
}

impl ExtendedPrivateKey {
    fn master(seed: &Seed) -> Result<Self, WalletError> {
        let i = Zeroizing::new(hmac_sha512(MASTER_HMAC_KEY, seed.as_bytes())?);
        Self::from_hmac_output(&i, |il| {
            check_scalar(il).map_err(|e| WalletError::KeyDerivation(format!("master key: {e}")))?;
            Ok(Zeroizing::new(*il))
        })
    }

    fn derive_child(&self, child: ChildNumber) -> Result<Self, WalletError> {
        let mut data = Zeroizing::new(Vec::with_capacity(37));
        if child.is_hardened() {
            data.push(0);
            data.extend_from_slice(&self.secret);
        } else {
            data.extend_from_slice(&derive_public_key(&self.secret)?.to_bytes());
        }
        data.extend_from_slice(&child.raw().to_be_bytes());

        let i = Zeroizing::new(hmac_sha512(&self.chain_code, &data)?);
        Self::from_hmac_output(&i, |il| {
            add_scalars(il, &self.secret)
                .map_err(|e| WalletError::KeyDerivation(format!("child {child}: {e}")))
        })
    }

    fn from_hmac_output(
        i: &[u8; 64],
        secret_from: impl FnOnce(&[u8; 32]) -> Result<Zeroizing<[u8; 32]>, WalletError>,
    ) -> Result<Self, WalletError> {
        let mut il = Zeroizing::new([0u8; 32]);
        il.copy_from_slice(&i[..32]);
        let secret = secret_from(&il)?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&i[32..]);
        Ok(Self {
            secret: *secret,
            chain_code,
        })
    }
}

/// Derive the keypair at `path` from a seed.
pub fn derive_keypair(seed: &Seed, path: &DerivationPath) -> Result<KeyPair, WalletError> {
    let mut node = ExtendedPrivateKey::master(seed)?;
    for child in path.children() {
        node = node.derive_child(*child)?;
    }
    KeyPair::from_secret_bytes(&node.secret)
        .map_err(|e| WalletError::KeyDerivation(e.to_string()))
}

/// The signing key, public key and address of one wallet account.
///
/// The secret is wiped when the inner signing key is dropped.
#[derive(Clone)]
pub struct KeyMaterial {
    keypair: KeyPair,
    public_key: PublicKey,
    address: Address,
}

impl KeyMaterial {
    pub fn from_keypair(keypair: KeyPair, network: Network) -> Self {
        let public_key = keypair.public_key();
        let address = Address::from_public_key(&public_key, network);
        Self {
            keypair,
            public_key,
            address,
        }
    }

    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Plain P2PKH address.
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn network(&self) -> Network {
        self.address.network()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("keypair", &"[REDACTED]")
            .field("public_key", &self.public_key)
            .field("address", &self.address.to_string())
            .finish()
    }
}

/// Derive the account key for `mnemonic` at `index` on `network`.
pub fn derive_key_material(
    mnemonic: &str,
    network: Network,
    index: u32,
) -> Result<KeyMaterial, WalletError> {
    let seed = mnemonic_to_seed(mnemonic)?;
    let path = DerivationPath::for_account(network, index)?;
    let keypair = derive_keypair(&seed, &path)?;
    Ok(KeyMaterial::from_keypair(keypair, network))
}
