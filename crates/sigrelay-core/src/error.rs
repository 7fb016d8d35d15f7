//! Error types for the relay core.

use crate::peer::PeerId;
use thiserror::Error;

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by registry, mailbox and relay operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Registration was attempted with an empty name.
    #[error("invalid peer name")]
    InvalidName,

    /// The id is not (or no longer) registered.
    #[error("unknown peer: {0}")]
    UnknownPeer(String),

    /// The recipient's mailbox is at capacity. Callers should back off and retry.
    #[error("peer {0} is backed up")]
    MailboxFull(PeerId),
}

impl Error {
    pub(crate) fn unknown(id: impl std::fmt::Display) -> Self {
        Error::UnknownPeer(id.to_string())
    }
}
