use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypeError {
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("no definition for entry type: {0}")]
    NoDefinition(String),

    #[error("invalid schema: {0}")]
    Schema(String),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] postcard::Error),
}
