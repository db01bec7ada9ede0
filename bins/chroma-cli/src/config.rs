//! CLI configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chroma_core::address::Network;
use chroma_core::constants::DEFAULT_FEE_RATE;
use chroma_esplora::{DEFAULT_REGISTRY_URL, DEFAULT_TIMEOUT};
use zeroize::Zeroizing;

const DEFAULT_ESPLORA_URL: &str = "https://testnet-explorer.tapyrus.dev.chaintope.com/api";

#[derive(Clone, Debug)]
pub struct Config {
    /// Esplora-compatible indexer base URL.
    pub esplora_url: String,
    /// Token metadata registry base URL.
    pub registry_url: String,
    pub network: Network,
    /// Smallest units per estimated byte.
    pub fee_rate: u64,
    pub http_timeout: Duration,
    /// Directory holding pending-transaction and recovery files.
    pub state_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let esplora_url = get("CHROMA_ESPLORA_URL").unwrap_or_else(|| DEFAULT_ESPLORA_URL.to_string());

        let registry_url = get("CHROMA_REGISTRY_URL").unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string());

        let network: Network = get("CHROMA_NETWORK")
            .as_deref()
            .unwrap_or("dev")
            .parse()
            .context("CHROMA_NETWORK must be 'prod' or 'dev'")?;

        let fee_rate = match get("CHROMA_FEE_RATE") {
            Some(v) => v
                .parse()
                .context("CHROMA_FEE_RATE must be a positive integer")?,
            None => DEFAULT_FEE_RATE,
        };

        let http_timeout = match get("CHROMA_HTTP_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .context("CHROMA_HTTP_TIMEOUT_SECS must be a positive integer")?,
            ),
            None => DEFAULT_TIMEOUT,
        };

        let state_dir = match get("CHROMA_STATE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("chroma"),
        };

        Ok(Config {
            esplora_url,
            registry_url,
            network,
            fee_rate,
            http_timeout,
            state_dir,
        })
    }

    /// State files are kept apart per network.
    pub fn network_state_dir(&self) -> PathBuf {
        self.state_dir.join(self.network.to_string())
    }
}

/// The wallet mnemonic from `CHROMA_MNEMONIC`, or a no-echo prompt.
pub fn read_mnemonic() -> Result<Zeroizing<String>> {
    if let Ok(m) = std::env::var("CHROMA_MNEMONIC") {
        return Ok(Zeroizing::new(m));
    }
    rpassword::prompt_password("Mnemonic: ")
        .map(Zeroizing::new)
        .context("Failed to read mnemonic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.esplora_url, DEFAULT_ESPLORA_URL);
        assert_eq!(cfg.registry_url, DEFAULT_REGISTRY_URL);
        assert_eq!(cfg.network, Network::Dev);
        assert_eq!(cfg.fee_rate, DEFAULT_FEE_RATE);
        assert_eq!(cfg.http_timeout, DEFAULT_TIMEOUT);
        assert!(cfg.state_dir.ends_with("chroma"));
    }

    #[test]
    fn environment_overrides() {
        let cfg = load(&[
            ("CHROMA_ESPLORA_URL", "http://localhost:3000"),
            ("CHROMA_REGISTRY_URL", "http://localhost:4000/tokens"),
            ("CHROMA_NETWORK", "prod"),
            ("CHROMA_FEE_RATE", "3"),
            ("CHROMA_HTTP_TIMEOUT_SECS", "5"),
            ("CHROMA_STATE_DIR", "/tmp/chroma-test"),
        ])
        .unwrap();
        assert_eq!(cfg.esplora_url, "http://localhost:3000");
        assert_eq!(cfg.registry_url, "http://localhost:4000/tokens");
        assert_eq!(cfg.network, Network::Prod);
        assert_eq!(cfg.fee_rate, 3);
        assert_eq!(cfg.http_timeout, Duration::from_secs(5));
        assert_eq!(cfg.network_state_dir(), PathBuf::from("/tmp/chroma-test/prod"));
    }

    #[test]
    fn malformed_values_rejected() {
        assert!(load(&[("CHROMA_NETWORK", "moon")]).is_err());
        assert!(load(&[("CHROMA_FEE_RATE", "-1")]).is_err());
        assert!(load(&[("CHROMA_HTTP_TIMEOUT_SECS", "soon")]).is_err());
    }
}
