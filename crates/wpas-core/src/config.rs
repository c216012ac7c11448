//! Supplicant-wide configuration.

use crate::{ie::ExtCapabConfig, profile::MfpPolicy};
use std::time::Duration;

/// Password element derivation policy for SAE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaePwe {
    /// Hunting-and-pecking only (a password identifier still forces H2E).
    HuntingAndPecking,
    /// Hash-to-element only.
    HashToElement,
    /// Hash-to-element when the AP supports it, otherwise hunting-and-pecking.
    #[default]
    Both,
    /// Hunting-and-pecking even with a password identifier.
    ForceHuntingAndPecking,
}

/// Configuration shared by every profile on an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplicantConfig {
    /// Ordered SAE group preference when the profile does not set one.
    pub sae_groups: Vec<u16>,
    /// PWE derivation policy.
    pub sae_pwe: SaePwe,
    /// MFP policy for profiles left at `MfpPolicy::Default`.
    pub pmf: MfpPolicy,
    /// Time allowed from authentication start to association.
    pub auth_timeout: Duration,
    /// SAE frame retransmission period.
    pub sae_retransmit_period: Duration,
    /// SAE frame retransmissions before giving up.
    pub sae_max_retransmits: u32,
    /// The driver carries SAE frames itself.
    pub external_auth: bool,
    /// The driver supports SAE at all.
    pub sae_supported: bool,
    /// Include the SAE PMKID in the association request.
    pub sae_pmkid_in_assoc: bool,
    /// Extended capabilities advertised on association.
    pub extended_capabilities: ExtCapabConfig,
    /// Per-BSSID failures above this count a profile authentication failure.
    pub blacklist_threshold: u32,
    /// Delay before rescanning when no candidate was usable.
    pub scan_interval: Duration,
}

impl Default for SupplicantConfig {
    fn default() -> Self {
        Self {
            sae_groups: vec![19, 20],
            sae_pwe: SaePwe::Both,
            pmf: MfpPolicy::Optional,
            auth_timeout: Duration::from_secs(10),
            sae_retransmit_period: Duration::from_secs(1),
            sae_max_retransmits: 3,
            external_auth: false,
            sae_supported: true,
            sae_pmkid_in_assoc: false,
            extended_capabilities: ExtCapabConfig::default(),
            blacklist_threshold: 3,
            scan_interval: Duration::from_secs(5),
        }
    }
}

impl SupplicantConfig {
    /// Effective MFP policy for a profile setting.
    pub fn mfp_policy(&self, profile: MfpPolicy) -> MfpPolicy {
        match profile {
            MfpPolicy::Default => match self.pmf {
                MfpPolicy::Default => MfpPolicy::Disabled,
                other => other,
            },
            other => other,
        }
    }
}
