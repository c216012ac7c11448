//! Cryptographic primitives for WPA3 station authentication.
//!
//! This crate implements the cryptographic side of SAE (IEEE 802.11 §12.4):
//! - ECC groups 19 and 20 over the RustCrypto `p256`/`p384` crates
//! - Password element derivation (hunting-and-pecking and hash-to-element)
//! - Commit generation, KCK/PMK/PMKID derivation and Confirm tags
//! - SAE-PK password format and commit signatures
//! - KDF-Hash-Length, HKDF and the PBKDF2 passphrase mapping for PSK
//!
//! Security conventions:
//! - All secrets use Zeroizing wrappers or zeroize on drop
//! - Constant-time comparisons via subtle crate
//! - No logging of key material

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod group;
pub mod kdf;
pub mod pk;
pub mod sae;

pub use error::{Error, Result};
pub use group::SaeGroup;
