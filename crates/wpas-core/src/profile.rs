//! Network profiles and the in-memory profile store.

use crate::{
    suite::{Akm, Cipher, Proto},
    types::MacAddr,
};
use std::time::{Duration, Instant};
use wpas_crypto::sae::Pt;
use zeroize::Zeroizing;

/// Network profile identifier.
pub type ProfileId = u32;

/// Management frame protection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MfpPolicy {
    /// Use the supplicant-wide default.
    #[default]
    Default,
    /// Never negotiate MFP.
    Disabled,
    /// Negotiate MFP when the AP supports it.
    Optional,
    /// Refuse APs without MFP.
    Required,
}

/// SAE-PK usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaePkMode {
    /// Use PK when the password and the AP allow it.
    #[default]
    Automatic,
    /// Only connect with PK.
    Only,
    /// Never use PK.
    Disabled,
}

/// Configuration for one logical network.
#[derive(Clone)]
pub struct NetworkProfile {
    /// Identifier.
    pub id: ProfileId,
    /// SSID octets.
    pub ssid: Vec<u8>,
    /// Allowed protocols.
    pub proto: Proto,
    /// Allowed AKMs.
    pub key_mgmt: Akm,
    /// Allowed pairwise ciphers.
    pub pairwise: Cipher,
    /// Allowed group ciphers.
    pub group: Cipher,
    /// Allowed group management ciphers; empty allows all.
    pub group_mgmt: Cipher,
    /// Management frame protection policy.
    pub mfp: MfpPolicy,
    /// Raw 256-bit PSK.
    pub psk: Option<Zeroizing<[u8; 32]>>,
    /// WPA passphrase; also the SAE password when `sae_password` is unset.
    pub passphrase: Option<Zeroizing<String>>,
    /// SAE password.
    pub sae_password: Option<Zeroizing<String>>,
    /// SAE password identifier.
    pub sae_password_id: Option<String>,
    /// SAE groups for this network; `None` uses the supplicant default.
    pub sae_groups: Option<Vec<u16>>,
    /// SAE-PK usage.
    pub sae_pk: SaePkMode,
    /// SAE-PK private key (32-byte P-256 scalar).
    pub sae_pk_key: Option<Zeroizing<Vec<u8>>>,
    /// Restrict to one BSSID.
    pub bssid: Option<MacAddr>,
    /// Advertise the Multi-AP backhaul station element.
    pub multi_ap_backhaul_sta: bool,
    /// Consecutive authentication failures.
    pub auth_failures: u32,
    /// Temporarily disabled until this instant.
    pub disabled_until: Option<Instant>,
    /// Configuration problem found while connecting; cleared on re-select.
    pub config_error: Option<String>,
    /// Cached hash-to-element PT, one per group.
    pub sae_pt: Vec<Pt>,
}

impl NetworkProfile {
    /// Empty profile with the conventional defaults (RSN/WPA, PSK/802.1X, CCMP/TKIP).
    pub fn new(id: ProfileId, ssid: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            ssid: ssid.into(),
            proto: Proto::RSN | Proto::WPA,
            key_mgmt: Akm::PSK | Akm::IEEE8021X,
            pairwise: Cipher::CCMP | Cipher::TKIP,
            group: Cipher::CCMP | Cipher::TKIP,
            group_mgmt: Cipher::empty(),
            mfp: MfpPolicy::Default,
            psk: None,
            passphrase: None,
            sae_password: None,
            sae_password_id: None,
            sae_groups: None,
            sae_pk: SaePkMode::Automatic,
            sae_pk_key: None,
            bssid: None,
            multi_ap_backhaul_sta: false,
            auth_failures: 0,
            disabled_until: None,
            config_error: None,
            sae_pt: Vec::new(),
        }
    }

    /// WPA3-Personal profile.
    pub fn sae(id: ProfileId, ssid: impl Into<Vec<u8>>, password: &str) -> Self {
        Self {
            proto: Proto::RSN,
            key_mgmt: Akm::SAE,
            pairwise: Cipher::CCMP,
            group: Cipher::CCMP,
            mfp: MfpPolicy::Required,
            sae_password: Some(Zeroizing::new(password.to_owned())),
            ..Self::new(id, ssid)
        }
    }

    /// WPA2-Personal profile.
    pub fn psk(id: ProfileId, ssid: impl Into<Vec<u8>>, passphrase: &str) -> Self {
        Self {
            key_mgmt: Akm::PSK | Akm::PSK_SHA256,
            passphrase: Some(Zeroizing::new(passphrase.to_owned())),
            ..Self::new(id, ssid)
        }
    }

    /// Password used for SAE.
    pub fn sae_secret(&self) -> Option<&str> {
        self.sae_password
            .as_deref()
            .or(self.passphrase.as_deref())
            .map(String::as_str)
    }

    /// Remaining temporary-disable time, if any.
    pub fn disabled_for(&self, now: Instant) -> Option<Duration> {
        self.disabled_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    /// Cached PT for `group`.
    pub fn pt(&self, group: u16) -> Option<&Pt> {
        self.sae_pt.iter().find(|pt| pt.group().id() == group)
    }
}

impl core::fmt::Debug for NetworkProfile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NetworkProfile")
            .field("id", &self.id)
            .field("ssid", &String::from_utf8_lossy(&self.ssid))
            .field("proto", &self.proto)
            .field("key_mgmt", &self.key_mgmt)
            .field("auth_failures", &self.auth_failures)
            .field("disabled_until", &self.disabled_until)
            .field("config_error", &self.config_error)
            .finish_non_exhaustive()
    }
}

/// Profiles known to one interface.
#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    profiles: Vec<NetworkProfile>,
}

impl ProfileStore {
    /// Store holding `profiles`.
    pub fn new(profiles: Vec<NetworkProfile>) -> Self {
        Self { profiles }
    }

    /// Profile by identifier.
    pub fn get(&self, id: ProfileId) -> Option<&NetworkProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// Mutable profile by identifier.
    pub fn get_mut(&mut self, id: ProfileId) -> Option<&mut NetworkProfile> {
        self.profiles.iter_mut().find(|p| p.id == id)
    }

    /// Insert or replace a profile.
    pub fn upsert(&mut self, profile: NetworkProfile) {
        match self.get_mut(profile.id) {
            Some(existing) => *existing = profile,
            None => self.profiles.push(profile),
        }
    }

    /// Remove a profile.
    pub fn remove(&mut self, id: ProfileId) -> Option<NetworkProfile> {
        let index = self.profiles.iter().position(|p| p.id == id)?;
        Some(self.profiles.remove(index))
    }

    /// All profiles.
    pub fn iter(&self) -> impl Iterator<Item = &NetworkProfile> {
        self.profiles.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sae_secret_fallback() {
        let mut p = NetworkProfile::new(1, "net");
        assert_eq!(p.sae_secret(), None);
        p.passphrase = Some(Zeroizing::new("passphrase".into()));
        assert_eq!(p.sae_secret(), Some("passphrase"));
        p.sae_password = Some(Zeroizing::new("sae".into()));
        assert_eq!(p.sae_secret(), Some("sae"));
    }

    #[test]
    fn test_disabled_for() {
        let now = Instant::now();
        let mut p = NetworkProfile::new(1, "net");
        assert_eq!(p.disabled_for(now), None);
        p.disabled_until = Some(now + Duration::from_secs(30));
        assert_eq!(p.disabled_for(now), Some(Duration::from_secs(30)));
        assert_eq!(p.disabled_for(now + Duration::from_secs(31)), None);
    }

    #[test]
    fn test_store_upsert_remove() {
        let mut store = ProfileStore::default();
        store.upsert(NetworkProfile::new(1, "a"));
        store.upsert(NetworkProfile::new(2, "b"));
        store.upsert(NetworkProfile::new(1, "c"));
        assert_eq!(store.iter().count(), 2);
        assert_eq!(store.get(1).unwrap().ssid, b"c");
        assert!(store.remove(2).is_some());
        assert!(store.remove(2).is_none());
    }
}
