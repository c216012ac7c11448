//! Suite negotiation.
//!
//! Picks the AKM, ciphers and MFP setting for a profile against a candidate
//! BSS, and produces the station's association elements. [`negotiate`] is a
//! pure function of its inputs; [`ensure_pt`] is the only part that writes
//! back into the profile (the cached hash-to-element PT).

use crate::{
    bss::BssRecord,
    config::{SaePwe, SupplicantConfig},
    ie::{self, RSNX_SAE_H2E, RSNX_SAE_PK},
    profile::{MfpPolicy, NetworkProfile, SaePkMode},
    rsn::{OwnSecurityElement, SecurityElement, RSN_CAP_MFPC, RSN_CAP_MFPR},
    suite::{Akm, Cipher, Proto},
    types::{Pmk, Pmkid},
    Error, Result,
};
use tracing::{debug, info, warn};
use wpas_crypto::{kdf::psk_from_passphrase, pk::is_pk_password, sae::Pt, SaeGroup};

/// Inputs the AKM predicates look at.
#[derive(Debug, Clone, Copy)]
pub struct AkmContext {
    /// Driver supports SAE.
    pub sae_supported: bool,
}

/// Predicate deciding whether an AKM may be chosen at all.
pub type AkmPredicate = fn(&AkmContext) -> bool;

fn always(_: &AkmContext) -> bool {
    true
}

fn sae_supported(ctx: &AkmContext) -> bool {
    ctx.sae_supported
}

/// AKM preference, strongest first. The first entry present in the
/// intersection whose predicate holds wins.
pub const AKM_PRIORITY: [(Akm, AkmPredicate); 18] = [
    (Akm::FT_IEEE8021X_SHA384, always),
    (Akm::SUITE_B_192, always),
    (Akm::SUITE_B, always),
    (Akm::FT_FILS_SHA384, always),
    (Akm::FT_FILS_SHA256, always),
    (Akm::FILS_SHA384, always),
    (Akm::FILS_SHA256, always),
    (Akm::FT_IEEE8021X, always),
    (Akm::FT_SAE, sae_supported),
    (Akm::SAE, sae_supported),
    (Akm::FT_PSK, always),
    (Akm::IEEE8021X_SHA256, always),
    (Akm::PSK_SHA256, always),
    (Akm::IEEE8021X, always),
    (Akm::PSK, always),
    (Akm::WPA_NONE, always),
    (Akm::OSEN, always),
    (Akm::OWE, always),
];

/// Pick the preferred AKM from `candidates`.
pub fn select_akm(candidates: Akm, ctx: &AkmContext) -> Option<Akm> {
    AKM_PRIORITY
        .iter()
        .find(|(akm, allowed)| candidates.contains(*akm) && allowed(ctx))
        .map(|(akm, _)| *akm)
}

/// SAE parameters fixed by negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaeMode {
    /// Use hash-to-element.
    pub h2e: bool,
    /// Use SAE-PK.
    pub pk: bool,
    /// Ordered group preference.
    pub groups: Vec<u16>,
    /// Password identifier.
    pub password_id: Option<String>,
}

/// Result of a successful negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedSuite {
    /// Protocol family.
    pub proto: Proto,
    /// Selected AKM.
    pub akm: Akm,
    /// Selected pairwise cipher.
    pub pairwise: Cipher,
    /// Selected group cipher.
    pub group: Cipher,
    /// Selected group management cipher when MFP is in use.
    pub group_mgmt: Option<Cipher>,
    /// MFP is required for this association.
    pub mfp_required: bool,
    /// SAE parameters, for SAE AKMs.
    pub sae: Option<SaeMode>,
    /// Extended capabilities element (possibly empty).
    pub ext_capab: Vec<u8>,
    /// Advertise the Multi-AP backhaul station element.
    pub multi_ap_backhaul_sta: bool,
}

impl NegotiatedSuite {
    /// The station's own security element.
    pub fn own_element(&self, pmkid: Option<Pmkid>) -> OwnSecurityElement {
        let mut capabilities = 0;
        if self.group_mgmt.is_some() {
            capabilities |= RSN_CAP_MFPC;
            if self.mfp_required {
                capabilities |= RSN_CAP_MFPR;
            }
        }
        OwnSecurityElement {
            proto: self.proto,
            group: self.group,
            pairwise: self.pairwise,
            akm: self.akm,
            capabilities,
            pmkid,
            group_mgmt: self.group_mgmt,
        }
    }

    /// RSNXE capability bits the station advertises.
    pub fn rsnxe_capabilities(&self) -> u32 {
        match &self.sae {
            Some(sae) if self.proto == Proto::RSN => {
                let mut caps = 0;
                if sae.h2e {
                    caps |= RSNX_SAE_H2E;
                }
                if sae.pk {
                    caps |= RSNX_SAE_PK;
                }
                caps
            }
            _ => 0,
        }
    }

    /// Association request elements in fixed order: security element,
    /// RSNXE, extended capabilities, Multi-AP.
    pub fn association_ies(&self, pmkid: Option<Pmkid>) -> Result<Vec<u8>> {
        let mut out = self.own_element(pmkid).serialize()?;
        let rsnx = self.rsnxe_capabilities();
        if rsnx != 0 {
            out.extend_from_slice(&ie::build_rsnxe(rsnx));
        }
        out.extend_from_slice(&self.ext_capab);
        if self.multi_ap_backhaul_sta {
            out.extend_from_slice(&ie::build_multi_ap_backhaul_sta());
        }
        Ok(out)
    }
}

/// SAE groups for a profile: its own list or the supplicant default,
/// restricted to the groups we implement.
pub fn sae_groups(profile: &NetworkProfile, config: &SupplicantConfig) -> Vec<u16> {
    profile
        .sae_groups
        .as_deref()
        .unwrap_or(&config.sae_groups)
        .iter()
        .copied()
        .filter(|g| SaeGroup::from_id(*g).is_ok())
        .collect()
}

/// Negotiate the suite for `profile` against `bss`.
///
/// Without a BSS the profile's own preferences are used as if advertised.
///
/// # Errors
///
/// * `Error::InvalidElement` if an advertised element is malformed.
/// * `Error::SuiteMismatch` if no advertised element is compatible.
/// * `Error::NoCandidate` if the chosen AKM needs a secret that is not configured.
pub fn negotiate(
    profile: &NetworkProfile,
    bss: Option<&BssRecord>,
    config: &SupplicantConfig,
) -> Result<NegotiatedSuite> {
    let ctx = AkmContext {
        sae_supported: config.sae_supported,
    };
    let mfp = config.mfp_policy(profile.mfp);

    let advertised = match bss {
        Some(bss) => advertised_elements(profile, bss)?,
        None => vec![profile_as_element(profile, mfp)],
    };

    let mut reason = String::from("no security element");
    let mut chosen = None;
    for element in advertised {
        match select_from(profile, &element, mfp, &ctx) {
            Ok(suite) => {
                chosen = Some(suite);
                break;
            }
            Err(why) => {
                debug!("{:?} element incompatible: {}", element.proto, why);
                reason = why;
            }
        }
    }
    let mut suite = chosen.ok_or_else(|| Error::SuiteMismatch(reason))?;

    if suite.akm.is_sae() {
        let rsnx = match bss {
            Some(bss) => bss.rsnxe_capabilities()?,
            None => 0,
        };
        suite.sae = Some(sae_mode(profile, config, rsnx, bss.is_some())?);
    } else if suite.akm.is_psk() || suite.akm == Akm::WPA_NONE {
        if profile.psk.is_none() && profile.passphrase.is_none() {
            return Err(Error::NoCandidate("PSK or passphrase required".into()));
        }
    }

    suite.ext_capab = ie::build_ext_capab(&config.extended_capabilities);
    suite.multi_ap_backhaul_sta = profile.multi_ap_backhaul_sta;

    info!(
        "Selected {:?} akm={:?} pairwise={:?} group={:?} mgmt={:?}",
        suite.proto, suite.akm, suite.pairwise, suite.group, suite.group_mgmt
    );
    Ok(suite)
}

/// Parse the BSS elements the profile allows, in priority order RSN, WPA, OSEN.
///
/// An element that fails to parse is skipped. The parse error is returned only
/// when no allowed element could be parsed at all.
fn advertised_elements(profile: &NetworkProfile, bss: &BssRecord) -> Result<Vec<SecurityElement>> {
    let parsers: [(Proto, fn(&BssRecord) -> Result<Option<SecurityElement>>); 3] = [
        (Proto::RSN, BssRecord::rsn),
        (Proto::WPA, BssRecord::wpa),
        (Proto::OSEN, BssRecord::osen),
    ];
    let mut out = Vec::with_capacity(3);
    let mut first_err = None;
    for (proto, parse) in parsers {
        if !profile.proto.contains(proto) {
            continue;
        }
        match parse(bss) {
            Ok(element) => out.extend(element),
            Err(e) => {
                warn!("Ignoring malformed {:?} element from {}: {}", proto, bss.bssid, e);
                first_err.get_or_insert(e);
            }
        }
    }
    match first_err {
        Some(e) if out.is_empty() => Err(e),
        _ => Ok(out),
    }
}

fn profile_as_element(profile: &NetworkProfile, mfp: MfpPolicy) -> SecurityElement {
    let proto = [Proto::RSN, Proto::WPA, Proto::OSEN]
        .into_iter()
        .find(|p| profile.proto.contains(*p))
        .unwrap_or(Proto::RSN);
    let capabilities = if proto != Proto::WPA && mfp != MfpPolicy::Disabled {
        RSN_CAP_MFPC
    } else {
        0
    };
    let group_mgmt = if profile.group_mgmt.is_empty() {
        Cipher::BIP_CMAC_128
    } else {
        profile.group_mgmt
    };
    SecurityElement {
        proto,
        group: profile.group,
        pairwise: profile.pairwise,
        akm: profile.key_mgmt,
        capabilities,
        pmkids: Vec::new(),
        group_mgmt,
    }
}

fn select_from(
    profile: &NetworkProfile,
    element: &SecurityElement,
    mfp: MfpPolicy,
    ctx: &AkmContext,
) -> core::result::Result<NegotiatedSuite, String> {
    let group = (element.group & profile.group)
        .pick_group()
        .ok_or("no common group cipher")?;
    let pairwise = (element.pairwise & profile.pairwise)
        .pick_pairwise()
        .ok_or("no common pairwise cipher")?;
    let akm = select_akm(element.akm & profile.key_mgmt, ctx).ok_or("no common AKM")?;

    let mut group_mgmt = None;
    let mut mfp_required = false;
    if element.proto != Proto::WPA && mfp != MfpPolicy::Disabled && element.mfp_capable() {
        let allowed = if profile.group_mgmt.is_empty() {
            Cipher::GROUP_MGMT
        } else {
            profile.group_mgmt
        };
        group_mgmt = (element.group_mgmt & allowed).pick_group_mgmt();
        mfp_required = mfp == MfpPolicy::Required || element.mfp_required();
    }
    if group_mgmt.is_none() {
        if mfp == MfpPolicy::Required {
            return Err("MFP required but not available".into());
        }
        if element.mfp_required() {
            return Err("AP requires MFP".into());
        }
    }

    Ok(NegotiatedSuite {
        proto: element.proto,
        akm,
        pairwise,
        group,
        group_mgmt,
        mfp_required,
        sae: None,
        ext_capab: Vec::new(),
        multi_ap_backhaul_sta: false,
    })
}

fn sae_mode(
    profile: &NetworkProfile,
    config: &SupplicantConfig,
    rsnx: u32,
    have_bss: bool,
) -> Result<SaeMode> {
    let password = profile
        .sae_secret()
        .ok_or_else(|| Error::NoCandidate("SAE password required".into()))?;
    let groups = sae_groups(profile, config);
    if groups.is_empty() {
        return Err(Error::SuiteMismatch("no supported SAE groups".into()));
    }

    let ap_h2e = rsnx & RSNX_SAE_H2E != 0;
    let ap_pk = rsnx & RSNX_SAE_PK != 0;
    let pk = is_pk_password(password) && profile.sae_pk != SaePkMode::Disabled && ap_pk;
    if profile.sae_pk == SaePkMode::Only && !pk {
        return Err(Error::SuiteMismatch("SAE-PK required".into()));
    }

    let id = profile.sae_password_id.clone();
    let h2e = match config.sae_pwe {
        SaePwe::ForceHuntingAndPecking => false,
        SaePwe::HashToElement => true,
        SaePwe::HuntingAndPecking => id.is_some() || pk,
        SaePwe::Both => ap_h2e || pk || id.is_some(),
    };
    if h2e && have_bss && !ap_h2e {
        return Err(Error::SuiteMismatch("AP does not support SAE hash-to-element".into()));
    }
    if pk && !h2e {
        return Err(Error::SuiteMismatch("SAE-PK needs hash-to-element".into()));
    }

    debug!("SAE mode: h2e={} pk={} groups={:?}", h2e, pk, groups);
    Ok(SaeMode {
        h2e,
        pk,
        groups,
        password_id: id,
    })
}

/// Derive and cache the hash-to-element PT for every configured group.
///
/// Returns whether a PT is available afterwards. Existing cache entries
/// are reused.
pub fn ensure_pt(profile: &mut NetworkProfile, config: &SupplicantConfig) -> Result<bool> {
    let Some(password) = profile.sae_secret() else {
        return Ok(false);
    };
    let skip = match config.sae_pwe {
        SaePwe::ForceHuntingAndPecking => true,
        SaePwe::HuntingAndPecking => {
            profile.sae_password_id.is_none() && !is_pk_password(password)
        }
        SaePwe::HashToElement | SaePwe::Both => false,
    };
    if skip {
        return Ok(false);
    }

    let mut derived = Vec::new();
    for id in sae_groups(profile, config) {
        if profile.pt(id).is_some() {
            continue;
        }
        let group = SaeGroup::from_id(id)?;
        let pt = Pt::derive(
            group,
            &profile.ssid,
            password.as_bytes(),
            profile.sae_password_id.as_deref().map(str::as_bytes),
        )?;
        derived.push(pt);
    }
    if !derived.is_empty() {
        debug!("Derived SAE PT for {} group(s)", derived.len());
        profile.sae_pt.extend(derived);
    }
    Ok(!profile.sae_pt.is_empty())
}

/// PMK for a PSK AKM: the configured PSK, or PBKDF2 over the passphrase.
///
/// # Errors
///
/// `Error::NoCandidate` if neither is configured.
pub fn derive_psk(profile: &NetworkProfile) -> Result<Pmk> {
    if let Some(psk) = &profile.psk {
        return Ok(Pmk::new(**psk));
    }
    let passphrase = profile
        .passphrase
        .as_deref()
        .ok_or_else(|| Error::NoCandidate("PSK or passphrase required".into()))?;
    let psk = psk_from_passphrase(passphrase.as_bytes(), &profile.ssid)?;
    Ok(Pmk::new(*psk))
}
