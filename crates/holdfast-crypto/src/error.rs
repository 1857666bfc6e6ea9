use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("bad public key format")]
    BadPublicKeyFormat,

    #[error("signature verification failed")]
    BadSignature,

    #[error("bad revocation format: {0}")]
    BadRevocationFormat(String),
}
