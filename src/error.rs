//! Error types for the distributor.
//!
//! Only connection- and protocol-level failures live here; they end the
//! session. Workunit-scoped failures are [`crate::resolver::WorkunitError`]
//! and never reach this type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("workunit not found: {0}")]
    NotFound(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] crate::protocol::ProtocolError),

    #[error("broker error: ERR {0}")]
    Broker(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("framing error: {0}")]
    Framing(#[from] tokio_util::codec::LinesCodecError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error means the connection can no longer be trusted.
    ///
    /// Everything except a stale lookup is fatal for the session.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
