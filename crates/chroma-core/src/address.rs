//! Base58Check address encoding.
//!
//! Two payload shapes exist per network:
//! - P2PKH: `version || hash160(pubkey)` (21 bytes)
//! - colored P2PKH: `colored_version || color_id || hash160(pubkey)` (54 bytes)
//!
//! The checksum is the first four bytes of `sha256d(payload)`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::COLOR_ID_LEN;
use crate::crypto::{PublicKey, sha256d};
use crate::error::AddressError;
use crate::script::Script;
use crate::types::ColorId;

/// Network selecting address versions and the BIP-44 coin type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network.
    Prod,
    /// Public development/test network.
    #[default]
    Dev,
}

impl Network {
    /// Network id, used as the hardened coin type in derivation paths.
    pub fn network_id(&self) -> u32 {
        match self {
            Network::Prod => 1,
            Network::Dev => 1_939_510_133,
        }
    }

    pub fn p2pkh_version(&self) -> u8 {
        match self {
            Network::Prod => 0x00,
            Network::Dev => 0x6f,
        }
    }

    pub fn cp2pkh_version(&self) -> u8 {
        match self {
            Network::Prod => 0x01,
            Network::Dev => 0x70,
        }
    }

    fn from_version(version: u8) -> Option<(Self, bool)> {
        match version {
            0x00 => Some((Network::Prod, false)),
            0x01 => Some((Network::Prod, true)),
            0x6f => Some((Network::Dev, false)),
            0x70 => Some((Network::Dev, true)),
            _ => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Prod => f.write_str("prod"),
            Network::Dev => f.write_str("dev"),
        }
    }
}

impl FromStr for Network {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prod" | "mainnet" => Ok(Network::Prod),
            "dev" | "testnet" => Ok(Network::Dev),
            other => Err(AddressError::UnknownNetwork(other.to_string())),
        }
    }
}

/// A pay-to-pubkey-hash address, optionally bound to a color.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    pubkey_hash: [u8; 20],
    color: Option<ColorId>,
}

impl Address {
    pub fn from_pubkey_hash(pubkey_hash: [u8; 20], network: Network) -> Self {
        Self {
            network,
            pubkey_hash,
            color: None,
        }
    }

    pub fn from_public_key(public_key: &PublicKey, network: Network) -> Self {
        Self::from_pubkey_hash(public_key.pubkey_hash(), network)
    }

    /// The colored form of this address for `color`.
    pub fn colored(&self, color: ColorId) -> Self {
        Self {
            color: Some(color),
            ..self.clone()
        }
    }

    /// The plain (native) form of this address.
    pub fn uncolored(&self) -> Self {
        Self {
            color: None,
            ..self.clone()
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn pubkey_hash(&self) -> &[u8; 20] {
        &self.pubkey_hash
    }

    pub fn color(&self) -> Option<&ColorId> {
        self.color.as_ref()
    }

    /// Locking script paying to this address.
    pub fn script_pubkey(&self) -> Script {
        match &self.color {
            Some(color) => Script::cp2pkh(color, &self.pubkey_hash),
            None => Script::p2pkh(&self.pubkey_hash),
        }
    }

    /// Decode an address and require it to belong to `network`.
    pub fn parse(s: &str, network: Network) -> Result<Self, AddressError> {
        let addr: Address = s.parse()?;
        if addr.network != network {
            return Err(AddressError::NetworkMismatch {
                expected: network.to_string(),
                found: addr.network.to_string(),
            });
        }
        Ok(addr)
    }

    fn payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(1 + COLOR_ID_LEN + 20);
        match &self.color {
            Some(color) => {
                payload.push(self.network.cp2pkh_version());
                payload.extend_from_slice(color.as_bytes());
            }
            None => payload.push(self.network.p2pkh_version()),
        }
        payload.extend_from_slice(&self.pubkey_hash);
        payload
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut data = self.payload();
        let checksum = sha256d(&data);
        data.extend_from_slice(&checksum[..4]);
        f.write_str(&bs58::encode(data).into_string())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let data = bs58::decode(s)
            .into_vec()
            .map_err(|e| AddressError::InvalidBase58(e.to_string()))?;
        if data.len() < 5 {
            return Err(AddressError::InvalidLength(data.len()));
        }
        let (payload, checksum) = data.split_at(data.len() - 4);
        if sha256d(payload)[..4] != *checksum {
            return Err(AddressError::InvalidChecksum);
        }

        let (network, colored) =
            Network::from_version(payload[0]).ok_or(AddressError::InvalidVersion(payload[0]))?;
        let expected_len = if colored { 1 + COLOR_ID_LEN + 20 } else { 21 };
        if payload.len() != expected_len {
            return Err(AddressError::InvalidLength(payload.len()));
        }

        let color = if colored {
            Some(
                ColorId::from_bytes(&payload[1..1 + COLOR_ID_LEN])
                    .map_err(|e| AddressError::InvalidBase58(e.to_string()))?,
            )
        } else {
            None
        };
        let mut pubkey_hash = [0u8; 20];
        pubkey_hash.copy_from_slice(&payload[payload.len() - 20..]);

        Ok(Self {
            network,
            pubkey_hash,
            color,
        })
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
