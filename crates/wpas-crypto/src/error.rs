//! Error types for cryptographic operations.

use thiserror::Error;

/// Result type alias for cryptographic operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Finite cyclic group is not implemented.
    #[error("Unsupported group: {0}")]
    UnsupportedGroup(u16),

    /// No password element could be derived.
    #[error("Password element derivation failed: {0}")]
    PasswordElement(String),

    /// Key derivation failed.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Invalid input length.
    #[error("Invalid input length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length received in bytes.
        actual: usize,
    },

    /// Scalar outside the range (1, r).
    #[error("Invalid scalar")]
    InvalidScalar,

    /// Element is not a point on the curve, or is the identity.
    #[error("Invalid element")]
    InvalidElement,

    /// Arithmetic produced the point at infinity or a zero value.
    #[error("Degenerate result: {0}")]
    Degenerate(&'static str),

    /// Invalid private key.
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Invalid public key.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Signature did not verify.
    #[error("Signature verification failed")]
    BadSignature,
}
