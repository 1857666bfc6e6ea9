use holdfast_crypto::CryptoError;
use holdfast_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    /// The chain grew between preparing a header and appending it.
    #[error("entry indexes don't match: expected {expected}, chain has {actual}")]
    IndexMismatch { expected: usize, actual: usize },

    #[error("header {index} does not link to its predecessor")]
    BrokenLink { index: usize },

    #[error("entry {index} does not match its header's entry link")]
    EntryMismatch { index: usize },

    #[error("header {index} is not signed by the chain's agent")]
    BadSignature { index: usize },

    /// A rotated agent entry whose revocation does not hand over from the key
    /// that signed the headers below it.
    #[error("agent entry {index} carries a revocation for another key")]
    RevocationMismatch { index: usize },

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("chain encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    #[error(transparent)]
    Type(#[from] TypeError),
}
