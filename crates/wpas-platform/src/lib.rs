//! Platform side of the station authentication engine.
//!
//! Implements:
//! - Collaborator traits for the radio driver, credential storage and the
//!   4-way/group key handshake
//! - In-memory mocks of each collaborator
//! - A tokio actor that owns one interface's [`wpas_core::Supplicant`],
//!   runs its timers and routes its actions to the collaborators

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod actor;
pub mod error;
pub mod mock;
pub mod traits;

pub use actor::{InterfaceActor, InterfaceHandle};
pub use error::{Error, Result};
pub use traits::{CredentialStore, HandshakeEngine, RadioDriver};
