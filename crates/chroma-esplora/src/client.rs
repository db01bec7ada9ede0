//! reqwest-backed [`UtxoSource`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, info};

use chroma_core::address::Address;
use chroma_core::error::NetworkError;
use chroma_core::traits::UtxoSource;
use chroma_core::types::{TransactionStatus, Txid, Utxo};

use crate::schema::{RawStatus, RawUtxo, validate_utxos};

/// Per-request timeout unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for one Esplora base URL.
#[derive(Debug, Clone)]
pub struct EsploraClient {
    client: Client,
    /// Without trailing slash.
    base_url: String,
}

impl EsploraClient {
    /// Client for `base_url` (e.g. `https://example.org/api`) with a request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NetworkError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub(crate) fn request_error(e: reqwest::Error) -> NetworkError {
    if e.is_timeout() {
        NetworkError::Timeout
    } else {
        NetworkError::Request(e.to_string())
    }
}

/// Turn a non-success response into `Http { status, body }`.
pub(crate) async fn check_status(resp: Response) -> Result<Response, NetworkError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(NetworkError::Http {
        status: status.as_u16(),
        body: body.trim().to_owned(),
    })
}

#[async_trait]
impl UtxoSource for EsploraClient {
    async fn get_utxos(&self, address: &Address) -> Result<Vec<Utxo>, NetworkError> {
        let resp = self
            .client
            .get(self.url(&format!("/address/{address}/utxo")))
            .send()
            .await
            .map_err(request_error)?;
        let raw: Vec<RawUtxo> = check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))?;
        let fetched = raw.len();
        let utxos = validate_utxos(raw);
        debug!(%address, fetched, valid = utxos.len(), "fetched UTXOs");
        Ok(utxos)
    }

    async fn broadcast(&self, raw_tx_hex: &str) -> Result<Txid, NetworkError> {
        let resp = self
            .client
            .post(self.url("/tx"))
            .body(raw_tx_hex.to_owned())
            .send()
            .await
            .map_err(request_error)?;
        if resp.status() == StatusCode::BAD_REQUEST {
            let body = resp.text().await.unwrap_or_default();
            return Err(NetworkError::Rejected(body.trim().to_owned()));
        }
        let text = check_status(resp).await?.text().await.map_err(request_error)?;
        let txid = Txid::from_hex(text.trim())
            .map_err(|e| NetworkError::InvalidResponse(format!("broadcast returned {text:?}: {e}")))?;
        info!(%txid, "indexer accepted transaction");
        Ok(txid)
    }

    async fn transaction_status(&self, txid: &Txid) -> Result<TransactionStatus, NetworkError> {
        let resp = self
            .client
            .get(self.url(&format!("/tx/{txid}/status")))
            .send()
            .await
            .map_err(request_error)?;
        let raw: RawStatus = check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))?;
        Ok(raw.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::serve;
    use chroma_core::address::Network;
    use tokio::net::TcpListener;

    fn address() -> Address {
        Address::from_pubkey_hash([1; 20], Network::Dev)
    }

    const TXID: &str = "00000000000000000000000000000000000000000000000000000000000000ab";

    #[tokio::test]
    async fn utxos_are_validated() {
        let body = r#"[
            {"txid":"00000000000000000000000000000000000000000000000000000000000000ab","vout":0,"value":1000,"status":{"confirmed":true}},
            {"txid":"bad","vout":0,"value":1000,"status":{"confirmed":true}}
        ]"#;
        let base = serve(vec![(200, body)]).await;
        let client = EsploraClient::new(&base, DEFAULT_TIMEOUT).unwrap();
        let utxos = client.get_utxos(&address()).await.unwrap();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].outpoint.txid.to_string(), TXID);
    }

    #[tokio::test]
    async fn broadcast_parses_txid_and_maps_rejection() {
        let base = serve(vec![
            (200, "00000000000000000000000000000000000000000000000000000000000000ab\n"),
            (400, "bad-txns-inputs-missingorspent"),
            (200, "not a txid"),
        ])
        .await;
        let client = EsploraClient::new(&base, DEFAULT_TIMEOUT).unwrap();
        assert_eq!(client.broadcast("00").await.unwrap().to_string(), TXID);
        assert_eq!(
            client.broadcast("00").await.unwrap_err(),
            NetworkError::Rejected("bad-txns-inputs-missingorspent".into())
        );
        assert!(matches!(
            client.broadcast("00").await.unwrap_err(),
            NetworkError::InvalidResponse(_)
        ));
    }

    #[tokio::test]
    async fn status_and_not_found() {
        let base = serve(vec![
            (200, r#"{"confirmed":true,"block_height":42,"block_hash":"00"}"#),
            (404, "Transaction not found"),
        ])
        .await;
        let client = EsploraClient::new(&base, DEFAULT_TIMEOUT).unwrap();
        let txid = Txid::from_hex(TXID).unwrap();
        let status = client.transaction_status(&txid).await.unwrap();
        assert_eq!(status, TransactionStatus { confirmed: true, block_height: Some(42) });
        assert_eq!(
            client.transaction_status(&txid).await.unwrap_err(),
            NetworkError::Http { status: 404, body: "Transaction not found".into() }
        );
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        let client = EsploraClient::new(&format!("http://{addr}/"), Duration::from_millis(100)).unwrap();
        assert_eq!(client.get_utxos(&address()).await.unwrap_err(), NetworkError::Timeout);
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = EsploraClient::new("https://example.org/api/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(client.base_url(), "https://example.org/api");
        assert_eq!(client.url("/tx"), "https://example.org/api/tx");
    }
}
