//! Error types for the relay node.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving requests or starting the node.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed request parameter, or wrong method
    #[error("Bad request: {0}")]
    InvalidInput(String),

    /// Relay rejected the operation
    #[error(transparent)]
    Relay(#[from] sigrelay_core::Error),

    /// Node is shutting down; long-polls are released with this
    #[error("Shutting down")]
    ShuttingDown,

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        use sigrelay_core::Error as Relay;
        match self {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Relay(Relay::InvalidName | Relay::UnknownPeer(_)) => StatusCode::BAD_REQUEST,
            Error::Relay(Relay::MailboxFull(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Error::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Error::Config(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> String {
        use sigrelay_core::Error as Relay;
        match self {
            Error::InvalidInput(msg) => msg.clone(),
            Error::Relay(Relay::InvalidName) => "No name".to_string(),
            Error::Relay(Relay::UnknownPeer(_)) => "Unknown peer".to_string(),
            Error::Relay(Relay::MailboxFull(_)) => "Peer is backed up".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && !matches!(self, Error::Relay(_) | Error::ShuttingDown) {
            tracing::error!("{}", self);
        } else {
            tracing::debug!(%status, "{}", self);
        }
        (status, format!("{}\n", self.body())).into_response()
    }
}
