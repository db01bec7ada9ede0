//! Locking and unlocking scripts.
//!
//! Only the two output shapes this engine creates are recognised:
//! - P2PKH: `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
//! - colored P2PKH: `<33 color_id> OP_COLOR` followed by the P2PKH body

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::COLOR_ID_LEN;
use crate::error::TransactionError;
use crate::types::ColorId;

pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_COLOR: u8 = 0xbc;

const P2PKH_LEN: usize = 25;
const CP2PKH_LEN: usize = 1 + COLOR_ID_LEN + 1 + P2PKH_LEN;

/// Raw script bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn p2pkh(pubkey_hash: &[u8; 20]) -> Self {
        let mut s = Vec::with_capacity(P2PKH_LEN);
        s.extend_from_slice(&[OP_DUP, OP_HASH160, 20]);
        s.extend_from_slice(pubkey_hash);
        s.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        Self(s)
    }

    pub fn cp2pkh(color: &ColorId, pubkey_hash: &[u8; 20]) -> Self {
        let mut s = Vec::with_capacity(CP2PKH_LEN);
        s.push(COLOR_ID_LEN as u8);
        s.extend_from_slice(color.as_bytes());
        s.push(OP_COLOR);
        s.extend_from_slice(&Self::p2pkh(pubkey_hash).0);
        Self(s)
    }

    /// Unlocking script for a P2PKH-style input: `<sig||hashtype> <pubkey>`.
    pub fn signature_script(signature: &[u8], public_key: &[u8]) -> Self {
        let mut s = Self::new();
        s.push_data(signature);
        s.push_data(public_key);
        s
    }

    /// Append a minimal data push.
    pub fn push_data(&mut self, data: &[u8]) {
        let len = data.len();
        if len < OP_PUSHDATA1 as usize {
            self.0.push(len as u8);
        } else if len <= 0xff {
            self.0.push(OP_PUSHDATA1);
            self.0.push(len as u8);
        } else {
            self.0.push(OP_PUSHDATA2);
            self.0.extend_from_slice(&(len as u16).to_le_bytes());
        }
        self.0.extend_from_slice(data);
    }

    /// Split a push-only script into its data elements.
    pub fn pushes(&self) -> Result<Vec<&[u8]>, TransactionError> {
        let mut out = Vec::new();
        let mut i = 0;
        let bytes = &self.0;
        while i < bytes.len() {
            let op = bytes[i];
            i += 1;
            let len = match op {
                0x01..=0x4b => op as usize,
                OP_PUSHDATA1 => {
                    let len = *bytes.get(i).ok_or(TransactionError::Truncated(i))? as usize;
                    i += 1;
                    len
                }
                OP_PUSHDATA2 => {
                    let raw = bytes.get(i..i + 2).ok_or(TransactionError::Truncated(i))?;
                    i += 2;
                    u16::from_le_bytes([raw[0], raw[1]]) as usize
                }
                other => {
                    return Err(TransactionError::InvalidScript(format!(
                        "non-push opcode {other:#04x}"
                    )));
                }
            };
            let data = bytes.get(i..i + len).ok_or(TransactionError::Truncated(i))?;
            out.push(data);
            i += len;
        }
        Ok(out)
    }

    pub fn is_p2pkh(&self) -> bool {
        let s = &self.0;
        s.len() == P2PKH_LEN
            && s[0] == OP_DUP
            && s[1] == OP_HASH160
            && s[2] == 20
            && s[23] == OP_EQUALVERIFY
            && s[24] == OP_CHECKSIG
    }

    pub fn is_cp2pkh(&self) -> bool {
        let s = &self.0;
        s.len() == CP2PKH_LEN
            && s[0] == COLOR_ID_LEN as u8
            && s[1 + COLOR_ID_LEN] == OP_COLOR
            && Script(s[2 + COLOR_ID_LEN..].to_vec()).is_p2pkh()
            && ColorId::from_bytes(&s[1..1 + COLOR_ID_LEN]).is_ok()
    }

    /// Color carried by a colored P2PKH script.
    pub fn color_id(&self) -> Option<ColorId> {
        if !self.is_cp2pkh() {
            return None;
        }
        ColorId::from_bytes(&self.0[1..1 + COLOR_ID_LEN]).ok()
    }

    /// Pubkey hash locked by a P2PKH or colored P2PKH script.
    pub fn pubkey_hash(&self) -> Option<[u8; 20]> {
        let body = if self.is_p2pkh() {
            &self.0[..]
        } else if self.is_cp2pkh() {
            &self.0[2 + COLOR_ID_LEN..]
        } else {
            return None;
        };
        let mut out = [0u8; 20];
        out.copy_from_slice(&body[3..23]);
        Some(out)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", hex::encode(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenType;

    #[test]
    fn p2pkh_layout() {
        let s = Script::p2pkh(&[0x11; 20]);
        assert_eq!(
            hex::encode(s.as_bytes()),
            format!("76a914{}88ac", "11".repeat(20))
        );
        assert!(s.is_p2pkh());
        assert!(!s.is_cp2pkh());
        assert_eq!(s.pubkey_hash(), Some([0x11; 20]));
        assert_eq!(s.color_id(), None);
    }

    #[test]
    fn cp2pkh_layout() {
        let color = ColorId::new(TokenType::NonReissuable, [0x22; 32]);
        let s = Script::cp2pkh(&color, &[0x33; 20]);
        assert_eq!(
            hex::encode(s.as_bytes()),
            format!("21{}bc76a914{}88ac", color.to_hex(), "33".repeat(20))
        );
        assert_eq!(s.len(), 60);
        assert!(s.is_cp2pkh());
        assert!(!s.is_p2pkh());
        assert_eq!(s.color_id(), Some(color));
        assert_eq!(s.pubkey_hash(), Some([0x33; 20]));
    }

    #[test]
    fn signature_script_pushes() {
        let sig = vec![0x30; 71];
        let pk = vec![0x02; 33];
        let s = Script::signature_script(&sig, &pk);
        assert_eq!(s.as_bytes()[0], 71);
        let pushes = s.pushes().unwrap();
        assert_eq!(pushes, vec![&sig[..], &pk[..]]);
    }

    #[test]
    fn push_data_uses_pushdata_opcodes() {
        let mut s = Script::new();
        s.push_data(&[0u8; 80]);
        assert_eq!(&s.as_bytes()[..2], &[OP_PUSHDATA1, 80]);
        let mut s = Script::new();
        s.push_data(&[0u8; 300]);
        assert_eq!(&s.as_bytes()[..3], &[OP_PUSHDATA2, 0x2c, 0x01]);
        assert_eq!(s.pushes().unwrap()[0].len(), 300);
    }

    #[test]
    fn pushes_rejects_opcodes_and_truncation() {
        assert!(Script::p2pkh(&[0; 20]).pushes().is_err());
        assert!(Script::from_bytes(vec![5, 1, 2]).pushes().is_err());
    }
}
