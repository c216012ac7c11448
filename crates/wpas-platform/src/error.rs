//! Platform integration errors.

use thiserror::Error;

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;

/// Platform errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Engine error.
    #[error(transparent)]
    Core(#[from] wpas_core::Error),

    /// Radio driver rejected a request.
    #[error("Driver error: {0}")]
    Driver(String),

    /// Credential store error.
    #[error("Credential store error: {0}")]
    Store(String),

    /// Handshake engine error.
    #[error("Handshake engine error: {0}")]
    Handshake(String),

    /// The interface actor has stopped.
    #[error("Interface actor stopped")]
    Closed,
}
