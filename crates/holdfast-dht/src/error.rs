use holdfast_types::{Hash, Status};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DhtError {
    #[error("hash not found")]
    HashNotFound,

    #[error("hash deleted")]
    HashDeleted,

    /// Redirect: the record was replaced by `follow`.
    #[error("hash modified")]
    HashModified { follow: Hash },

    #[error("hash rejected")]
    HashRejected,

    #[error("link not found")]
    LinkNotFound,

    #[error("link base {base} is {status}, not live")]
    BaseNotLive { base: Hash, status: Status },

    #[error("internal error: {0}")]
    Internal(String),
}

impl DhtError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
