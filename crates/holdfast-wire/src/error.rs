use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("message type {0} not in action protocol")]
    NotInActionProtocol(String),

    #[error("message type {0} not in validate protocol")]
    NotInValidateProtocol(String),

    #[error("Unexpected request body type '{body}' in {msg_type} request, expecting {expected}")]
    UnexpectedBody {
        body: &'static str,
        msg_type: String,
        expected: &'static str,
    },

    #[error("unknown message type {0}")]
    UnknownType(String),

    #[error("wire encoding error: {0}")]
    Encoding(#[from] postcard::Error),
}
