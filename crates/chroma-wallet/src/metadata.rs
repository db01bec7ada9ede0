//! Token metadata: validation and canonical encoding.
//!
//! The canonical form is compact JSON with object keys sorted
//! lexicographically at every level and absent optional fields omitted. Its
//! SHA-256 digest feeds the pay-to-contract commitment, so any change to the
//! encoding changes every derived key and color id.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use chroma_core::crypto::sha256;
use chroma_core::types::TokenType;

use crate::amount::MAX_DECIMALS;
use crate::error::WalletError;

pub const METADATA_VERSION: &str = "1.0";
pub const MAX_NAME_LEN: usize = 64;
pub const MAX_SYMBOL_LEN: usize = 12;
pub const MAX_DESCRIPTION_LEN: usize = 1024;

/// Image MIME types accepted in `data:` URLs.
const IMAGE_DATA_TYPES: &[&str] = &["png", "jpeg", "jpg", "gif", "webp", "svg+xml"];

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Issuer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// NFT trait entry.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub trait_type: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_type: Option<String>,
}

/// Token descriptor committed to by the issuer's P2C key.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub version: String,
    pub name: String,
    pub symbol: String,
    #[serde(rename = "tokenType")]
    pub token_type: TokenType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<Issuer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<Attribute>>,
}

impl Metadata {
    /// Minimal metadata with the current version and no optional fields.
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, token_type: TokenType) -> Self {
        Self {
            version: METADATA_VERSION.to_string(),
            name: name.into(),
            symbol: symbol.into(),
            token_type,
            decimals: None,
            description: None,
            icon: None,
            website: None,
            issuer: None,
            image: None,
            animation_url: None,
            external_url: None,
            attributes: None,
        }
    }

    /// Decimals used for display, zero when absent.
    pub fn decimals(&self) -> u8 {
        self.decimals.unwrap_or(0)
    }

    /// Reject metadata that cannot be issued.
    pub fn validate(&self) -> Result<(), WalletError> {
        let invalid = |msg: String| Err(WalletError::InvalidMetadata(msg));

        if self.version.trim().is_empty() {
            return invalid("version is required".into());
        }
        let name_len = self.name.trim().chars().count();
        if name_len == 0 || name_len > MAX_NAME_LEN {
            return invalid(format!("name must be 1-{MAX_NAME_LEN} characters"));
        }
        let symbol_len = self.symbol.trim().chars().count();
        if symbol_len == 0 || symbol_len > MAX_SYMBOL_LEN {
            return invalid(format!("symbol must be 1-{MAX_SYMBOL_LEN} characters"));
        }
        if let Some(d) = self.decimals {
            if d > MAX_DECIMALS {
                return invalid(format!("decimals must be at most {MAX_DECIMALS}"));
            }
            if self.token_type == TokenType::Nft && d != 0 {
                return invalid("NFT decimals must be 0".into());
            }
        }
        if self
            .description
            .as_ref()
            .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN)
        {
            return invalid(format!("description longer than {MAX_DESCRIPTION_LEN} characters"));
        }

        let urls = [
            ("icon", self.icon.as_deref()),
            ("website", self.website.as_deref()),
            ("animation_url", self.animation_url.as_deref()),
            ("external_url", self.external_url.as_deref()),
            ("issuer.url", self.issuer.as_ref().and_then(|i| i.url.as_deref())),
        ];
        for (field, url) in urls {
            if let Some(url) = url {
                if !is_allowed_url(url) {
                    return invalid(format!("{field}: unsupported URL {url}"));
                }
            }
        }
        if let Some(image) = self.image.as_deref() {
            if !is_allowed_image_url(image) {
                return invalid(format!("image: unsupported URL {image}"));
            }
        }
        if let Some(email) = self.issuer.as_ref().and_then(|i| i.email.as_deref()) {
            if !email.contains('@') {
                return invalid(format!("issuer.email: {email}"));
            }
        }
        if let Some(attrs) = &self.attributes {
            if attrs.iter().any(|a| a.trait_type.trim().is_empty()) {
                return invalid("attribute trait_type is required".into());
            }
        }
        Ok(())
    }

    /// Compact JSON with sorted keys.
    pub fn canonical_json(&self) -> Result<String, WalletError> {
        let value =
            serde_json::to_value(self).map_err(|e| WalletError::Serialization(e.to_string()))?;
        serde_json::to_string(&canonicalize(value))
            .map_err(|e| WalletError::Serialization(e.to_string()))
    }

    /// SHA-256 of the canonical JSON.
    pub fn digest(&self) -> Result<[u8; 32], WalletError> {
        Ok(sha256(self.canonical_json()?.as_bytes()))
    }
}

/// Rebuild every object with its keys inserted in sorted order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

fn is_allowed_url(url: &str) -> bool {
    let lower = url.trim().to_lowercase();
    ["http://", "https://", "ipfs://"]
        .iter()
        .any(|scheme| lower.starts_with(scheme) && lower.len() > scheme.len())
}

fn is_allowed_image_url(url: &str) -> bool {
    let lower = url.trim().to_lowercase();
    match lower.strip_prefix("data:image/") {
        Some(rest) => IMAGE_DATA_TYPES
            .iter()
            .any(|mime| rest.strip_prefix(mime).is_some_and(|r| r.starts_with(';'))),
        None => is_allowed_url(url),
    }
}

/// Display-safe form of a URL from untrusted metadata.
///
/// Script-capable schemes are dropped; a scheme-less value is assumed https.
pub fn sanitize_url(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    if is_allowed_url(trimmed) {
        return Some(trimmed.to_string());
    }
    if !trimmed.contains("://") && !trimmed.contains(':') {
        return Some(format!("https://{trimmed}"));
    }
    None
}

/// Like [`sanitize_url`], additionally allowing `data:` images of safe types.
pub fn sanitize_image_url(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.to_lowercase().starts_with("data:") {
        return is_allowed_image_url(trimmed).then(|| trimmed.to_string());
    }
    sanitize_url(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Metadata {
        let mut m = Metadata::new("Example Token", "EXT", TokenType::NonReissuable);
        m.decimals = Some(2);
        m.website = Some("https://example.com".into());
        m
    }

    #[test]
    fn canonical_json_sorts_and_omits() {
        let json = sample().canonical_json().unwrap();
        assert_eq!(
            json,
            r#"{"decimals":2,"name":"Example Token","symbol":"EXT","tokenType":"non_reissuable","version":"1.0","website":"https://example.com"}"#
        );
    }

    #[test]
    fn canonical_json_sorts_nested_objects() {
        let mut m = sample();
        m.issuer = Some(Issuer {
            name: Some("Acme".into()),
            url: None,
            email: Some("a@acme.test".into()),
        });
        m.attributes = Some(vec![Attribute {
            trait_type: "color".into(),
            value: "red".into(),
            display_type: None,
        }]);
        let json = m.canonical_json().unwrap();
        assert!(json.contains(r#""issuer":{"email":"a@acme.test","name":"Acme"}"#), "{json}");
        assert!(json.contains(r#""attributes":[{"trait_type":"color","value":"red"}]"#), "{json}");
        assert!(json.starts_with(r#"{"attributes""#));
    }

    #[test]
    fn digest_depends_on_content() {
        let a = sample();
        let mut b = sample();
        b.symbol = "EXU".into();
        assert_eq!(a.digest().unwrap(), sample().digest().unwrap());
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }

    #[test]
    fn serde_roundtrip_preserves_digest() {
        let m = sample();
        let back: Metadata = serde_json::from_str(&m.canonical_json().unwrap()).unwrap();
        assert_eq!(back, m);
        assert_eq!(back.digest().unwrap(), m.digest().unwrap());
    }

    #[test]
    fn validate_accepts_sample() {
        sample().validate().unwrap();
    }

    #[test]
    fn validate_name_and_symbol_bounds() {
        let mut m = sample();
        m.name = "  ".into();
        assert!(m.validate().is_err());
        m.name = "x".repeat(65);
        assert!(m.validate().is_err());
        m.name = "x".repeat(64);
        m.validate().unwrap();
        m.symbol = "ABCDEFGHIJKLM".into();
        assert_eq!(m.validate().unwrap_err().code(), "invalid_metadata");
    }

    #[test]
    fn validate_decimals() {
        let mut m = sample();
        m.decimals = Some(19);
        assert!(m.validate().is_err());
        let mut nft = Metadata::new("Art", "ART", TokenType::Nft);
        nft.decimals = Some(2);
        assert!(nft.validate().is_err());
        nft.decimals = Some(0);
        nft.validate().unwrap();
    }

    #[test]
    fn validate_url_schemes() {
        let mut m = sample();
        m.website = Some("javascript:alert(1)".into());
        assert!(m.validate().is_err());
        m.website = Some("ipfs://bafy".into());
        m.validate().unwrap();
        m.image = Some("data:image/png;base64,AAAA".into());
        m.validate().unwrap();
        m.image = Some("data:text/html;base64,AAAA".into());
        assert!(m.validate().is_err());
        m.image = None;
        m.issuer = Some(Issuer {
            url: Some("ftp://x".into()),
            ..Issuer::default()
        });
        assert!(m.validate().is_err());
    }

    #[test]
    fn sanitize_urls() {
        assert_eq!(sanitize_url(" https://a.b "), Some("https://a.b".into()));
        assert_eq!(sanitize_url("example.com"), Some("https://example.com".into()));
        assert_eq!(sanitize_url("javascript:alert(1)"), None);
        assert_eq!(sanitize_url("data:text/html,x"), None);
        assert_eq!(sanitize_url("ftp://x"), None);
        assert_eq!(sanitize_url(""), None);
        assert_eq!(
            sanitize_image_url("data:image/svg+xml;base64,PHN2Zz4="),
            Some("data:image/svg+xml;base64,PHN2Zz4=".into())
        );
        assert_eq!(sanitize_image_url("data:image/bmp;base64,AA"), None);
        assert_eq!(sanitize_image_url("ipfs://img"), Some("ipfs://img".into()));
    }
}
