//! Error types for the Chroma core crate.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid private key bytes")] InvalidPrivateKey,
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("scalar is not below the curve order")] ScalarOutOfRange,
    #[error("scalar sum is zero")] ZeroScalar,
    #[error("point sum is the point at infinity")] PointAtInfinity,
    #[error("signing failed: {0}")] Signing(String),
    #[error("pubkey hash does not match expected")] PubkeyHashMismatch,
    #[error("input index out of bounds: {index} >= {len}")] InputIndexOutOfBounds { index: usize, len: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58: {0}")] InvalidBase58(String),
    #[error("invalid checksum")] InvalidChecksum,
    #[error("invalid length: {0}")] InvalidLength(usize),
    #[error("invalid version: {0}")] InvalidVersion(u8),
    #[error("unknown network: {0}")] UnknownNetwork(String),
    #[error("address belongs to {found}, expected {expected}")] NetworkMismatch { expected: String, found: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorIdError {
    #[error("invalid hex: {0}")] InvalidHex(String),
    #[error("invalid length: {0}")] InvalidLength(usize),
    #[error("unknown color type: {0:#04x}")] UnknownType(u8),
    #[error("unknown token type: {0}")] UnknownTokenType(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("invalid hex: {0}")] InvalidHex(String),
    #[error("unexpected end of data at offset {0}")] Truncated(usize),
    #[error("{0} trailing bytes after transaction")] TrailingBytes(usize),
    #[error("empty inputs or outputs")] EmptyInputsOrOutputs,
    #[error("value overflow")] ValueOverflow,
    #[error("invalid txid: {0}")] InvalidTxid(String),
    #[error("invalid outpoint: {0}")] InvalidOutPoint(String),
    #[error("invalid script: {0}")] InvalidScript(String),
    #[error("unsupported script on input {index}")] UnsupportedScript { index: usize },
    #[error(transparent)] Crypto(#[from] CryptoError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("timeout")] Timeout,
    #[error("request failed: {0}")] Request(String),
    #[error("http status {status}: {body}")] Http { status: u16, body: String },
    #[error("invalid response: {0}")] InvalidResponse(String),
    #[error("broadcast rejected: {0}")] Rejected(String),
    #[error("txid mismatch: local {local}, remote {remote}")] TxidMismatch { local: String, remote: String },
    #[error("not propagated after {attempts} attempts: {txid}")] NotPropagated { txid: String, attempts: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        assert_eq!(CryptoError::ZeroScalar.to_string(), "scalar sum is zero");
        assert_eq!(
            AddressError::InvalidVersion(0x05).to_string(),
            "invalid version: 5"
        );
        assert_eq!(
            ColorIdError::UnknownType(0xc4).to_string(),
            "unknown color type: 0xc4"
        );
        assert_eq!(
            NetworkError::Http { status: 400, body: "bad-txns".into() }.to_string(),
            "http status 400: bad-txns"
        );
    }

    #[test]
    fn crypto_error_converts_into_transaction_error() {
        let err: TransactionError = CryptoError::InvalidSignature.into();
        assert_eq!(err, TransactionError::Crypto(CryptoError::InvalidSignature));
        assert_eq!(err.to_string(), "invalid signature bytes");
    }
}
