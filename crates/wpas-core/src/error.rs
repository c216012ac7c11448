//! Error types for the authentication engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Engine errors.
///
/// Every variant maps onto one [`FailureKind`], which is all the connection
/// state machine looks at when deciding how to recover.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed information element.
    #[error("Invalid element: {0}")]
    InvalidElement(String),

    /// Malformed SAE authentication frame.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// No usable AKM/cipher intersection with the candidate.
    #[error("Suite mismatch: {0}")]
    SuiteMismatch(String),

    /// Required secret material is not configured.
    #[error("No candidate credentials: {0}")]
    NoCandidate(String),

    /// Peer used a group we do not implement or did not offer.
    #[error("Unsupported group: {0}")]
    UnsupportedGroup(u16),

    /// Every configured group has been rejected by the peer.
    #[error("No SAE groups left to try")]
    NoGroupsLeft,

    /// Peer tried to use or hide a group in a way that allows downgrade.
    #[error("Group downgrade attempt: group {0}")]
    Downgrade(u16),

    /// Peer does not know the password identifier.
    #[error("Unknown password identifier")]
    UnknownPasswordIdentifier,

    /// Confirm received before our own Confirm was sent.
    #[error("Unexpected Confirm")]
    UnexpectedConfirm,

    /// Confirm tag did not verify.
    #[error("Confirm mismatch")]
    ConfirmMismatch,

    /// Peer status code inconsistent with the negotiated mode.
    #[error("Unexpected status code {0} for the negotiated mode")]
    StatusMismatch(u16),

    /// Peer rejected the exchange.
    #[error("Rejected by peer with status {0}")]
    Rejected(u16),

    /// Association request rejected.
    #[error("Association rejected with status {0}")]
    AssociationRejected(u16),

    /// Authentication did not complete in time.
    #[error("Authentication timed out")]
    Timeout,

    /// Peer disconnected us.
    #[error("Disconnected by peer, reason {0}")]
    PeerDisconnect(u16),

    /// 4-way or group handshake failed.
    #[error("Key handshake failed, reason {0}")]
    HandshakeFailed(u16),

    /// Invalid state transition.
    #[error("Invalid state transition")]
    InvalidState,

    /// No profile with this identifier.
    #[error("Unknown profile: {0}")]
    UnknownProfile(u32),

    /// Cryptographic error.
    #[error("Crypto error: {0}")]
    Crypto(#[from] wpas_crypto::Error),
}

/// Failure taxonomy used for recovery decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Expected protocol event handled inside the session.
    Protocol,
    /// Invalid or hostile input; the session aborts.
    Attack,
    /// Local misconfiguration; no retry.
    Configuration,
    /// Network condition; retried with back-off.
    Transient,
}

impl Error {
    /// Recovery class of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::SuiteMismatch(_)
            | Error::NoCandidate(_)
            | Error::UnknownPasswordIdentifier
            | Error::NoGroupsLeft
            | Error::UnknownProfile(_) => FailureKind::Configuration,
            Error::InvalidElement(_)
            | Error::MalformedFrame(_)
            | Error::UnsupportedGroup(_)
            | Error::Downgrade(_)
            | Error::UnexpectedConfirm
            | Error::ConfirmMismatch
            | Error::StatusMismatch(_)
            | Error::Crypto(_) => FailureKind::Attack,
            Error::Rejected(_)
            | Error::AssociationRejected(_)
            | Error::Timeout
            | Error::PeerDisconnect(_)
            | Error::HandshakeFailed(_) => FailureKind::Transient,
            Error::InvalidState => FailureKind::Protocol,
        }
    }

    /// Whether the failure points at the credentials rather than the BSS.
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, Error::ConfirmMismatch | Error::HandshakeFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(Error::UnknownPasswordIdentifier.kind(), FailureKind::Configuration);
        assert_eq!(Error::SuiteMismatch("x".into()).kind(), FailureKind::Configuration);
        assert_eq!(Error::ConfirmMismatch.kind(), FailureKind::Attack);
        assert_eq!(Error::AssociationRejected(17).kind(), FailureKind::Transient);
        assert_eq!(
            Error::Crypto(wpas_crypto::Error::InvalidElement).kind(),
            FailureKind::Attack
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Error::Rejected(1).to_string(), "Rejected by peer with status 1");
        assert_eq!(Error::Downgrade(19).to_string(), "Group downgrade attempt: group 19");
    }
}
