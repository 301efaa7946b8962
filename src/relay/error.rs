// Error taxonomy for the relay: transport, protocol and store failures

use thiserror::Error;

/// Socket level failures. The request is abandoned and no response is sent.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the socket before the declared payload arrived
    #[error("connection closed after {received} of {expected} bytes")]
    ConnectionClosed { received: usize, expected: usize },
}

/// Malformed or semantically invalid requests
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("buffer too short: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("unknown request code {0}")]
    UnknownRequestCode(u16),

    #[error("unknown response code {0}")]
    UnknownResponseCode(u16),

    #[error("invalid message type {0}")]
    InvalidMessageType(u8),

    #[error("name field is not null terminated")]
    UnterminatedName,

    #[error("name is not valid UTF-8")]
    NameEncoding(#[from] std::str::Utf8Error),

    #[error("invalid user name {0:?}")]
    InvalidName(String),

    #[error("user name {0:?} already registered")]
    NameTaken(String),

    #[error("unknown client {0}")]
    UnknownClient(String),

    #[error("payload of {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: u32, max: u32 },

    #[error("payload of {size} bytes does not fit the u32 size field")]
    PayloadLengthOverflow { size: usize },

    #[error("content size {declared} does not fit in payload of {available} bytes")]
    ContentSizeMismatch { declared: u32, available: usize },
}

/// Persistence failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A fresh client id collided with an existing row
    #[error("client id {0} already exists")]
    DuplicateClientId(String),

    #[error("message id {0} does not fit in 32 bits")]
    MessageIdOverflow(i64),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Any failure while serving one request
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("store: {0}")]
    Store(#[from] StoreError),
}

impl From<std::io::Error> for RelayError {
    fn from(e: std::io::Error) -> Self {
        RelayError::Transport(TransportError::Io(e))
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
