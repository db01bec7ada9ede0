//! reqwest-backed [`TokenRegistry`].
//!
//! The registry is a static file tree: one JSON document per token at
//! `{base}/{network_id}/{color_id}.json`. A document is either a registry
//! entry with a `metadata` object or the metadata object itself. A 404 means
//! the token is unregistered.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use chroma_core::address::Network;
use chroma_core::error::NetworkError;
use chroma_core::types::ColorId;
use chroma_wallet::cache::TokenRegistry;
use chroma_wallet::metadata::Metadata;

use crate::client::{check_status, request_error};

/// Public token registry served from GitHub.
pub const DEFAULT_REGISTRY_URL: &str =
    "https://raw.githubusercontent.com/chaintope/tapyrus-token-registry/master/tokens";

#[derive(Deserialize)]
#[serde(untagged)]
enum RegistryDocument {
    Entry { metadata: Metadata },
    Bare(Metadata),
}

impl RegistryDocument {
    fn into_metadata(self) -> Metadata {
        match self {
            RegistryDocument::Entry { metadata } | RegistryDocument::Bare(metadata) => metadata,
        }
    }
}

/// Token metadata registry client for one network.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    base_url: String,
    network: Network,
}

impl RegistryClient {
    pub fn new(base_url: &str, network: Network, timeout: Duration) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NetworkError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            network,
        })
    }

    fn url(&self, color: &ColorId) -> String {
        format!("{}/{}/{}.json", self.base_url, self.network.network_id(), color)
    }
}

/// Reject documents that do not describe `color`.
fn check_document(color: &ColorId, metadata: &Metadata) -> Result<(), NetworkError> {
    metadata
        .validate()
        .map_err(|e| NetworkError::InvalidResponse(format!("registry entry for {color}: {e}")))?;
    if metadata.token_type != color.token_type() {
        return Err(NetworkError::InvalidResponse(format!(
            "registry entry for {color} has token type {}",
            metadata.token_type
        )));
    }
    Ok(())
}

#[async_trait]
impl TokenRegistry for RegistryClient {
    async fn fetch(&self, color: &ColorId) -> Result<Option<Metadata>, NetworkError> {
        let resp = self
            .client
            .get(self.url(color))
            .send()
            .await
            .map_err(request_error)?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(color = %color, "token not registered");
            return Ok(None);
        }
        let doc: RegistryDocument = check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))?;
        let metadata = doc.into_metadata();
        check_document(color, &metadata)?;
        Ok(Some(metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::serve;
    use chroma_core::types::TokenType;
    use chroma_wallet::cache::{CachePolicy, TokenMetadataCache};

    fn color() -> ColorId {
        ColorId::new(TokenType::NonReissuable, [0x42; 32])
    }

    const ENTRY: &str = r#"{"color_id":"c2","metadata":{"version":"1.0","name":"Gold","symbol":"GLD","tokenType":"non_reissuable","decimals":2}}"#;
    const BARE: &str = r#"{"version":"1.0","name":"Gold","symbol":"GLD","tokenType":"non_reissuable"}"#;

    #[tokio::test]
    async fn entry_bare_and_unregistered() {
        let base = serve(vec![(200, ENTRY), (200, BARE), (404, "404: Not Found")]).await;
        let registry = RegistryClient::new(&base, Network::Dev, Duration::from_secs(5)).unwrap();

        let entry = registry.fetch(&color()).await.unwrap().unwrap();
        assert_eq!(entry.symbol, "GLD");
        assert_eq!(entry.decimals(), 2);
        let bare = registry.fetch(&color()).await.unwrap().unwrap();
        assert_eq!(bare.name, "Gold");
        assert_eq!(registry.fetch(&color()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn mismatched_token_type_rejected() {
        let base = serve(vec![(200, BARE)]).await;
        let registry = RegistryClient::new(&base, Network::Dev, Duration::from_secs(5)).unwrap();
        let nft = ColorId::new(TokenType::Nft, [0x42; 32]);
        assert!(matches!(
            registry.fetch(&nft).await.unwrap_err(),
            NetworkError::InvalidResponse(_)
        ));
    }

    #[tokio::test]
    async fn server_error_is_http_failure() {
        let base = serve(vec![(500, "boom")]).await;
        let registry = RegistryClient::new(&base, Network::Dev, Duration::from_secs(5)).unwrap();
        assert_eq!(
            registry.fetch(&color()).await.unwrap_err(),
            NetworkError::Http { status: 500, body: "boom".into() }
        );
    }

    #[tokio::test]
    async fn cache_fetches_each_color_once() {
        // A second request would find no listener response and fail.
        let base = serve(vec![(200, ENTRY)]).await;
        let registry = RegistryClient::new(&base, Network::Dev, Duration::from_secs(5)).unwrap();
        let mut cache = TokenMetadataCache::new(CachePolicy::default());
        let colors = [color(), color()];
        let resolved = cache.get_many(&registry, &colors).await.unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[1].1.as_ref().unwrap().symbol, "GLD");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn url_uses_network_id() {
        let registry = RegistryClient::new("https://r.example/tokens/", Network::Dev, Duration::from_secs(5)).unwrap();
        assert_eq!(
            registry.url(&color()),
            format!("https://r.example/tokens/1939510133/{}.json", color())
        );
    }
}
