//! SAE exchange engine.
//!
//! Message codec ([`message`]) and the per-attempt session state machine
//! ([`session`]): `Nothing → Committed → Confirmed → Accepted`.

pub mod message;
pub mod session;

pub use message::{AntiCloggingRequest, CommitMessage, ConfirmMessage, PkSignature};
pub use session::{DiscardReason, SaeFrame, SaeOutcome, SaeParams, SaeResult, SaeSession};

/// Authentication transaction sequence number of a Commit.
pub const TRANSACTION_COMMIT: u16 = 1;
/// Authentication transaction sequence number of a Confirm.
pub const TRANSACTION_CONFIRM: u16 = 2;

/// Status codes carried in SAE authentication frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Success (legacy commit).
    Success,
    /// Unspecified failure.
    UnspecifiedFailure,
    /// Authentication frame out of sequence.
    UnknownAuthTransaction,
    /// Anti-clogging token required.
    AntiCloggingTokenRequired,
    /// Finite cyclic group not supported.
    FiniteCyclicGroupNotSupported,
    /// Password identifier not known.
    UnknownPasswordIdentifier,
    /// Hash-to-element commit.
    SaeHashToElement,
    /// SAE-PK commit.
    SaePk,
    /// Any other value.
    Other(u16),
}

impl StatusCode {
    /// Numeric value on the wire.
    pub fn to_u16(self) -> u16 {
        match self {
            StatusCode::Success => 0,
            StatusCode::UnspecifiedFailure => 1,
            StatusCode::UnknownAuthTransaction => 14,
            StatusCode::AntiCloggingTokenRequired => 76,
            StatusCode::FiniteCyclicGroupNotSupported => 77,
            StatusCode::UnknownPasswordIdentifier => 123,
            StatusCode::SaeHashToElement => 126,
            StatusCode::SaePk => 127,
            StatusCode::Other(v) => v,
        }
    }

    /// Decode a wire value.
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => StatusCode::Success,
            1 => StatusCode::UnspecifiedFailure,
            14 => StatusCode::UnknownAuthTransaction,
            76 => StatusCode::AntiCloggingTokenRequired,
            77 => StatusCode::FiniteCyclicGroupNotSupported,
            123 => StatusCode::UnknownPasswordIdentifier,
            126 => StatusCode::SaeHashToElement,
            127 => StatusCode::SaePk,
            v => StatusCode::Other(v),
        }
    }
}

/// SAE session state. Ordering follows protocol progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SaeState {
    /// Session created, nothing sent.
    Nothing,
    /// Commit sent.
    Committed,
    /// Confirm sent.
    Confirmed,
    /// Peer Confirm verified.
    Accepted,
}

impl core::fmt::Display for SaeState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            SaeState::Nothing => "NOTHING",
            SaeState::Committed => "COMMITTED",
            SaeState::Confirmed => "CONFIRMED",
            SaeState::Accepted => "ACCEPTED",
        })
    }
}
