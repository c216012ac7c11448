//! Collaborator traits for the interface actor.
//!
//! The engine never calls these directly: it emits [`wpas_core::Action`]s and
//! the actor maps each one onto a trait method. Mocks live in [`crate::mock`].

use crate::error::Result;
use wpas_core::{AssociateParams, MacAddr, NetworkProfile, Pmk, Pmkid, ProfileId};

/// Radio driver for one wireless interface.
///
/// Implementations must not block: requests are fire-and-forget and results
/// come back as [`wpas_core::DriverEvent`]s through the actor handle.
pub trait RadioDriver: Send + Sync {
    /// Start a scan. Results are reported as `DriverEvent::ScanResults`.
    fn request_scan(&self) -> Result<()>;

    /// Transmit an authentication frame.
    ///
    /// `external` marks frames of a driver-offloaded SAE exchange.
    ///
    /// # Errors
    ///
    /// `Error::Driver` if the frame could not be queued.
    fn send_auth_frame(
        &self,
        bssid: MacAddr,
        transaction: u16,
        status: u16,
        payload: &[u8],
        external: bool,
    ) -> Result<()>;

    /// Report the result of an offloaded SAE exchange.
    fn external_auth_status(&self, bssid: MacAddr, status: u16, pmkid: Option<&Pmkid>) -> Result<()>;

    /// Start association. The outcome is reported as `DriverEvent::AssocResult`.
    fn associate(&self, params: &AssociateParams) -> Result<()>;

    /// Deauthenticate from `bssid`.
    fn deauthenticate(&self, bssid: MacAddr, reason: u16) -> Result<()>;
}

/// Persistent network profile storage.
///
/// # Security Requirements
///
/// - Passwords, PSKs and cached PT values are secrets
/// - Implementations must not log profile contents
pub trait CredentialStore: Send + Sync {
    /// Load every stored profile.
    fn load(&self) -> Result<Vec<NetworkProfile>>;

    /// Persist `profile`, replacing any profile with the same id.
    fn store(&self, profile: &NetworkProfile) -> Result<()>;

    /// The active profile changed.
    fn active_changed(&self, profile: Option<ProfileId>) -> Result<()>;
}

/// 4-way and group key handshake engine.
///
/// Progress is reported back as `DriverEvent::HandshakeProgress`.
pub trait HandshakeEngine: Send + Sync {
    /// PMK for the coming 4-way handshake with `bssid`.
    fn install_pmk(&self, bssid: MacAddr, pmk: &Pmk, pmkid: Option<&Pmkid>) -> Result<()>;

    /// EAPOL frame received from `src`.
    fn deliver_eapol(&self, src: MacAddr, frame: &[u8]) -> Result<()>;
}
