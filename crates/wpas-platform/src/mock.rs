//! Mock implementations for testing.
//!
//! Every mock records the calls it receives so tests can assert on the
//! exact sequence of requests the actor made.

use crate::error::{Error, Result};
use crate::traits::{CredentialStore, HandshakeEngine, RadioDriver};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use wpas_core::{AssociateParams, MacAddr, NetworkProfile, Pmk, Pmkid, ProfileId};

/// A request received by [`MockRadioDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    /// `request_scan`.
    Scan,
    /// `send_auth_frame`.
    AuthFrame {
        /// Destination.
        bssid: MacAddr,
        /// Transaction sequence number.
        transaction: u16,
        /// Status code.
        status: u16,
        /// Body.
        payload: Vec<u8>,
        /// Offloaded exchange.
        external: bool,
    },
    /// `external_auth_status`.
    ExternalAuthStatus {
        /// Peer.
        bssid: MacAddr,
        /// Status code.
        status: u16,
        /// PMKID.
        pmkid: Option<Pmkid>,
    },
    /// `associate`.
    Associate(AssociateParams),
    /// `deauthenticate`.
    Deauthenticate {
        /// Peer.
        bssid: MacAddr,
        /// Reason code.
        reason: u16,
    },
}

/// Mock radio driver.
///
/// # Example
///
/// ```
/// use wpas_platform::mock::{MockRadioDriver, RadioCall};
/// use wpas_platform::traits::RadioDriver;
///
/// let radio = MockRadioDriver::new();
/// radio.request_scan().unwrap();
/// assert_eq!(radio.calls(), vec![RadioCall::Scan]);
/// ```
#[derive(Clone, Default)]
pub struct MockRadioDriver {
    calls: Arc<Mutex<Vec<RadioCall>>>,
}

impl MockRadioDriver {
    /// Creates an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<RadioCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of scans requested.
    pub fn scans(&self) -> usize {
        self.calls().iter().filter(|c| **c == RadioCall::Scan).count()
    }

    /// Authentication frames sent.
    pub fn auth_frames(&self) -> Vec<RadioCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, RadioCall::AuthFrame { .. }))
            .collect()
    }

    fn record(&self, call: RadioCall) -> Result<()> {
        self.calls
            .lock()
            .map_err(|_| Error::Driver("mock state poisoned".into()))?
            .push(call);
        Ok(())
    }
}

impl RadioDriver for MockRadioDriver {
    fn request_scan(&self) -> Result<()> {
        self.record(RadioCall::Scan)
    }

    fn send_auth_frame(
        &self,
        bssid: MacAddr,
        transaction: u16,
        status: u16,
        payload: &[u8],
        external: bool,
    ) -> Result<()> {
        self.record(RadioCall::AuthFrame {
            bssid,
            transaction,
            status,
            payload: payload.to_vec(),
            external,
        })
    }

    fn external_auth_status(&self, bssid: MacAddr, status: u16, pmkid: Option<&Pmkid>) -> Result<()> {
        self.record(RadioCall::ExternalAuthStatus {
            bssid,
            status,
            pmkid: pmkid.copied(),
        })
    }

    fn associate(&self, params: &AssociateParams) -> Result<()> {
        self.record(RadioCall::Associate(params.clone()))
    }

    fn deauthenticate(&self, bssid: MacAddr, reason: u16) -> Result<()> {
        self.record(RadioCall::Deauthenticate { bssid, reason })
    }
}

/// In-memory credential store.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    profiles: Arc<Mutex<BTreeMap<ProfileId, NetworkProfile>>>,
    active: Arc<Mutex<Vec<Option<ProfileId>>>>,
}

impl MemoryCredentialStore {
    /// Store preloaded with `profiles`.
    pub fn with_profiles(profiles: Vec<NetworkProfile>) -> Self {
        Self {
            profiles: Arc::new(Mutex::new(profiles.into_iter().map(|p| (p.id, p)).collect())),
            active: Arc::default(),
        }
    }

    /// Current copy of a profile.
    pub fn get(&self, id: ProfileId) -> Option<NetworkProfile> {
        self.profiles.lock().ok()?.get(&id).cloned()
    }

    /// Every `active_changed` notification so far.
    pub fn active_history(&self) -> Vec<Option<ProfileId>> {
        self.active.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Vec<NetworkProfile>> {
        let profiles = self
            .profiles
            .lock()
            .map_err(|_| Error::Store("store poisoned".into()))?;
        Ok(profiles.values().cloned().collect())
    }

    fn store(&self, profile: &NetworkProfile) -> Result<()> {
        self.profiles
            .lock()
            .map_err(|_| Error::Store("store poisoned".into()))?
            .insert(profile.id, profile.clone());
        Ok(())
    }

    fn active_changed(&self, profile: Option<ProfileId>) -> Result<()> {
        self.active
            .lock()
            .map_err(|_| Error::Store("store poisoned".into()))?
            .push(profile);
        Ok(())
    }
}

/// Mock handshake engine recording installed PMKs and delivered frames.
#[derive(Clone, Default)]
pub struct MockHandshakeEngine {
    pmks: Arc<Mutex<Vec<(MacAddr, Pmk, Option<Pmkid>)>>>,
    frames: Arc<Mutex<Vec<(MacAddr, Vec<u8>)>>>,
}

impl MockHandshakeEngine {
    /// Creates an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// PMKs installed so far.
    pub fn installed(&self) -> Vec<(MacAddr, Pmk, Option<Pmkid>)> {
        self.pmks.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// EAPOL frames delivered so far.
    pub fn frames(&self) -> Vec<(MacAddr, Vec<u8>)> {
        self.frames.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

impl HandshakeEngine for MockHandshakeEngine {
    fn install_pmk(&self, bssid: MacAddr, pmk: &Pmk, pmkid: Option<&Pmkid>) -> Result<()> {
        self.pmks
            .lock()
            .map_err(|_| Error::Handshake("engine poisoned".into()))?
            .push((bssid, pmk.clone(), pmkid.copied()));
        Ok(())
    }

    fn deliver_eapol(&self, src: MacAddr, frame: &[u8]) -> Result<()> {
        self.frames
            .lock()
            .map_err(|_| Error::Handshake("engine poisoned".into()))?
            .push((src, frame.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_replaces_by_id() {
        let store = MemoryCredentialStore::with_profiles(vec![NetworkProfile::sae(1, "a", "pw")]);
        let mut updated = NetworkProfile::sae(1, "a", "pw");
        updated.auth_failures = 3;
        store.store(&updated).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
        assert_eq!(store.get(1).unwrap().auth_failures, 3);
    }

    #[test]
    fn test_handshake_records_pmk() {
        let engine = MockHandshakeEngine::new();
        let bssid = MacAddr([2, 0, 0, 0, 0, 1]);
        engine.install_pmk(bssid, &Pmk::new([7; 32]), None).unwrap();
        engine.deliver_eapol(bssid, &[1, 2]).unwrap();
        assert_eq!(engine.installed()[0].1, Pmk::new([7; 32]));
        assert_eq!(engine.frames(), vec![(bssid, vec![1, 2])]);
    }
}
