//! Station-side WPA3 authentication and association engine.
//!
//! This crate is the protocol core of the supplicant:
//! - Security element parsing and suite negotiation (RSN/WPA/OSEN, RSNXE)
//! - SAE exchange engine: Commit/Confirm framing, anti-clogging tokens,
//!   group negotiation, hash-to-element and SAE-PK
//! - Connection state machine driven by [`DriverEvent`]s, emitting [`Action`]s
//! - Per-BSSID blacklist and per-profile temporary disabling
//!
//! Nothing here performs I/O. Radio, credential storage and the 4-way
//! handshake live behind the traits in `wpas-platform`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod blacklist;
pub mod bss;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod ie;
pub mod negotiate;
pub mod profile;
pub mod rsn;
pub mod sae;
pub mod suite;
pub mod types;

pub use blacklist::{Blacklist, RetryManager};
pub use bss::BssRecord;
pub use config::{SaePwe, SupplicantConfig};
pub use connection::{Status, Supplicant, WpaState};
pub use error::{Error, FailureKind, Result};
pub use event::{Action, AssociateParams, DriverEvent, HandshakeStage, TimerId};
pub use negotiate::{negotiate, NegotiatedSuite, SaeMode};
pub use profile::{MfpPolicy, NetworkProfile, ProfileId, ProfileStore, SaePkMode};
pub use sae::{SaeSession, SaeState, StatusCode};
pub use suite::{Akm, Cipher, Proto};
pub use types::{MacAddr, Pmk, Pmkid};
