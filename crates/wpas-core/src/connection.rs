//! Per-interface connection state machine.
//!
//! [`Supplicant`] consumes [`DriverEvent`]s and returns [`Action`]s. It owns
//! the profile store, the retry policy and at most one SAE session; nothing
//! here blocks or performs I/O.

use crate::{
    blacklist::RetryManager,
    bss::BssRecord,
    config::SupplicantConfig,
    event::{Action, AssociateParams, DriverEvent, HandshakeStage, TimerId},
    negotiate::{derive_psk, ensure_pt, negotiate, NegotiatedSuite},
    profile::{NetworkProfile, ProfileId, ProfileStore},
    sae::{SaeFrame, SaeOutcome, SaeParams, SaeSession, StatusCode},
    suite::{Akm, Cipher},
    types::{MacAddr, Pmk, Pmkid},
    Error, FailureKind, Result,
};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Deauthentication reason: station is leaving.
pub const REASON_DEAUTH_LEAVING: u16 = 3;

/// Interface state, as reported by `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WpaState {
    /// Not connected, not trying.
    Disconnected,
    /// No enabled network to try.
    Inactive,
    /// Interface is down.
    InterfaceDisabled,
    /// Looking for a candidate.
    Scanning,
    /// Authentication in progress.
    Authenticating,
    /// Association in progress.
    Associating,
    /// Associated, key handshake not started.
    Associated,
    /// 4-way handshake in progress.
    FourWayHandshake,
    /// Group key handshake in progress.
    GroupHandshake,
    /// Connected.
    Completed,
}

impl WpaState {
    /// An attempt is in flight.
    pub fn is_connecting(self) -> bool {
        matches!(
            self,
            WpaState::Authenticating
                | WpaState::Associating
                | WpaState::Associated
                | WpaState::FourWayHandshake
                | WpaState::GroupHandshake
        )
    }
}

impl core::fmt::Display for WpaState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            WpaState::Disconnected => "DISCONNECTED",
            WpaState::Inactive => "INACTIVE",
            WpaState::InterfaceDisabled => "INTERFACE_DISABLED",
            WpaState::Scanning => "SCANNING",
            WpaState::Authenticating => "AUTHENTICATING",
            WpaState::Associating => "ASSOCIATING",
            WpaState::Associated => "ASSOCIATED",
            WpaState::FourWayHandshake => "4WAY_HANDSHAKE",
            WpaState::GroupHandshake => "GROUP_HANDSHAKE",
            WpaState::Completed => "COMPLETED",
        })
    }
}

/// Per-profile status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileStatus {
    /// Profile.
    pub id: ProfileId,
    /// SSID.
    pub ssid: Vec<u8>,
    /// Consecutive authentication failures.
    pub auth_failures: u32,
    /// Remaining temporary-disable time.
    pub disabled_for: Option<Duration>,
    /// Configuration problem that stopped the last attempt.
    pub config_error: Option<String>,
}

/// Interface status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// State.
    pub state: WpaState,
    /// Current or attempted BSSID.
    pub bssid: Option<MacAddr>,
    /// Current or attempted SSID.
    pub ssid: Option<Vec<u8>>,
    /// Profile in use.
    pub profile: Option<ProfileId>,
    /// Negotiated AKM.
    pub akm: Option<Akm>,
    /// Negotiated pairwise cipher.
    pub pairwise: Option<Cipher>,
    /// Negotiated group cipher.
    pub group: Option<Cipher>,
    /// SAE group of the completed exchange.
    pub sae_group: Option<u16>,
    /// All profiles.
    pub profiles: Vec<ProfileStatus>,
}

#[derive(Debug, Clone)]
struct Attempt {
    profile: ProfileId,
    bss: BssRecord,
    suite: NegotiatedSuite,
    pmkid: Option<Pmkid>,
    psk: Option<Pmk>,
    sae_group: Option<u16>,
    pmk_installed: bool,
}

/// Connection context for one interface.
#[derive(Debug)]
pub struct Supplicant {
    own_addr: MacAddr,
    config: SupplicantConfig,
    profiles: ProfileStore,
    retry: RetryManager,
    state: WpaState,
    selected: Option<ProfileId>,
    attempt: Option<Attempt>,
    sae: Option<SaeSession>,
    external: bool,
    own_disconnect_req: bool,
    disconnected: bool,
}

impl Supplicant {
    /// New interface context in `Disconnected`.
    pub fn new(own_addr: MacAddr, config: SupplicantConfig, profiles: Vec<NetworkProfile>) -> Self {
        let retry = RetryManager::new(config.blacklist_threshold);
        Self::with_retry(own_addr, config, profiles, retry)
    }

    /// New context with a caller-built retry manager.
    pub fn with_retry(
        own_addr: MacAddr,
        config: SupplicantConfig,
        profiles: Vec<NetworkProfile>,
        retry: RetryManager,
    ) -> Self {
        Self {
            own_addr,
            config,
            profiles: ProfileStore::new(profiles),
            retry,
            state: WpaState::Disconnected,
            selected: None,
            attempt: None,
            sae: None,
            external: false,
            own_disconnect_req: false,
            disconnected: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> WpaState {
        self.state
    }

    /// Configuration.
    pub fn config(&self) -> &SupplicantConfig {
        &self.config
    }

    /// Profile store.
    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    /// Retry policy state.
    pub fn retry(&self) -> &RetryManager {
        &self.retry
    }

    /// Active SAE session, if any.
    pub fn sae_session(&self) -> Option<&SaeSession> {
        self.sae.as_ref()
    }

    fn set_state(&mut self, state: WpaState) {
        if self.state != state {
            info!("State: {} -> {}", self.state, state);
            self.state = state;
        }
    }

    // === Operator surface ===

    /// Explicitly select a network; clears its temporary disable and
    /// failure count.
    pub fn select_network(&mut self, id: ProfileId) -> Result<Vec<Action>> {
        let profile = self.profiles.get_mut(id).ok_or(Error::UnknownProfile(id))?;
        self.retry.network_selected(profile);
        let stored = Action::StoreProfile(Box::new(profile.clone()));

        let mut actions = self.teardown(true);
        self.selected = Some(id);
        self.disconnected = false;
        actions.push(stored);
        actions.push(Action::ConfigChanged { profile: Some(id) });
        actions.extend(self.request_scan(Duration::ZERO));
        Ok(actions)
    }

    /// Locally requested disconnect. No failure is recorded.
    pub fn disconnect(&mut self) -> Vec<Action> {
        let actions = self.teardown(true);
        self.disconnected = true;
        self.set_state(WpaState::Disconnected);
        actions
    }

    /// Add or replace a profile.
    pub fn add_profile(&mut self, profile: NetworkProfile) -> Vec<Action> {
        let id = profile.id;
        self.profiles.upsert(profile);
        debug!("Added network {}", id);
        if self.state == WpaState::Inactive && !self.disconnected {
            return self.request_scan(Duration::ZERO);
        }
        Vec::new()
    }

    /// Remove a profile, disconnecting if it is in use.
    pub fn remove_profile(&mut self, id: ProfileId) -> Result<Vec<Action>> {
        let mut actions = Vec::new();
        if self.attempt.as_ref().map(|a| a.profile) == Some(id) {
            actions.extend(self.teardown(true));
            self.set_state(WpaState::Disconnected);
        }
        self.profiles.remove(id).ok_or(Error::UnknownProfile(id))?;
        if self.selected == Some(id) {
            self.selected = None;
            actions.push(Action::ConfigChanged { profile: None });
        }
        if !self.disconnected && !self.state.is_connecting() && self.state != WpaState::Completed {
            actions.extend(self.request_scan(Duration::ZERO));
        }
        Ok(actions)
    }

    /// Replace every profile. Cached PT values are dropped.
    pub fn reconfigure(&mut self, profiles: Vec<NetworkProfile>) -> Vec<Action> {
        let mut actions = self.teardown(true);
        let profiles = profiles
            .into_iter()
            .map(|mut p| {
                p.sae_pt.clear();
                p
            })
            .collect();
        self.profiles = ProfileStore::new(profiles);
        self.selected = None;
        self.set_state(WpaState::Disconnected);
        actions.push(Action::ConfigChanged { profile: None });
        if !self.disconnected {
            actions.extend(self.request_scan(Duration::ZERO));
        }
        actions
    }

    /// Snapshot of the interface.
    pub fn status(&self, now: Instant) -> Status {
        let attempt = self.attempt.as_ref();
        Status {
            state: self.state,
            bssid: attempt.map(|a| a.bss.bssid),
            ssid: attempt.map(|a| a.bss.ssid.clone()),
            profile: attempt.map(|a| a.profile),
            akm: attempt.map(|a| a.suite.akm),
            pairwise: attempt.map(|a| a.suite.pairwise),
            group: attempt.map(|a| a.suite.group),
            sae_group: attempt.and_then(|a| a.sae_group),
            profiles: self
                .profiles
                .iter()
                .map(|p| ProfileStatus {
                    id: p.id,
                    ssid: p.ssid.clone(),
                    auth_failures: p.auth_failures,
                    disabled_for: p.disabled_for(now),
                    config_error: p.config_error.clone(),
                })
                .collect(),
        }
    }

    // === Events ===

    /// Process one event to completion.
    pub fn handle_event(&mut self, now: Instant, event: DriverEvent) -> Vec<Action> {
        match event {
            DriverEvent::ScanResults(results) => self.on_scan_results(now, results),
            DriverEvent::AuthFrame {
                bssid,
                transaction,
                status,
                payload,
            } => self.on_auth_frame(now, bssid, transaction, status, &payload),
            DriverEvent::AssocResult { bssid, status, .. } => self.on_assoc_result(now, bssid, status),
            DriverEvent::Disconnect {
                bssid,
                reason,
                locally_generated,
            } => self.on_disconnect(now, bssid, reason, locally_generated),
            DriverEvent::Eapol { src, frame } => self.on_eapol(src, frame),
            DriverEvent::HandshakeProgress(stage) => self.on_handshake(now, stage),
            DriverEvent::ExternalAuthStart { bssid, ssid } => self.on_external_auth_start(now, bssid, ssid),
            DriverEvent::ExternalAuthAbort => self.on_external_auth_abort(),
            DriverEvent::Timeout(TimerId::AuthTimeout) => self.on_auth_timeout(now),
            DriverEvent::Timeout(TimerId::SaeRetransmit) => self.on_sae_retransmit(now),
            DriverEvent::InterfaceEnabled => self.on_interface_enabled(),
            DriverEvent::InterfaceDisabled => self.on_interface_disabled(),
        }
    }

    fn request_scan(&mut self, delay: Duration) -> Vec<Action> {
        self.set_state(WpaState::Scanning);
        vec![Action::RequestScan { delay }]
    }

    fn on_interface_enabled(&mut self) -> Vec<Action> {
        if self.state != WpaState::InterfaceDisabled && self.state != WpaState::Disconnected {
            return Vec::new();
        }
        self.set_state(WpaState::Disconnected);
        if self.disconnected || self.profiles.iter().next().is_none() {
            self.set_state(WpaState::Inactive);
            return Vec::new();
        }
        self.request_scan(Duration::ZERO)
    }

    fn on_interface_disabled(&mut self) -> Vec<Action> {
        self.own_disconnect_req = false;
        let actions = vec![
            Action::CancelTimer(TimerId::AuthTimeout),
            Action::CancelTimer(TimerId::SaeRetransmit),
        ];
        self.drop_session();
        self.attempt = None;
        self.external = false;
        self.set_state(WpaState::InterfaceDisabled);
        actions
    }

    // --- Selection ---

    fn on_scan_results(&mut self, now: Instant, results: Vec<BssRecord>) -> Vec<Action> {
        match self.state {
            WpaState::Scanning | WpaState::Disconnected | WpaState::Inactive => {}
            state => {
                debug!("Ignoring scan results in state {}", state);
                return Vec::new();
            }
        }
        if self.disconnected {
            return Vec::new();
        }

        let mut candidates: Vec<(ProfileId, BssRecord, NegotiatedSuite)> = Vec::new();
        let mut config_failure: Option<(ProfileId, Error)> = None;
        for profile in self.profiles.iter() {
            if self.selected.is_some_and(|id| id != profile.id) {
                continue;
            }
            if profile.config_error.is_some() {
                continue;
            }
            if let Some(left) = profile.disabled_for(now) {
                info!("Network {} temporarily disabled for {} s", profile.id, left.as_secs());
                continue;
            }
            let mut matched = false;
            let mut usable = false;
            for bss in results.iter().filter(|b| b.ssid == profile.ssid) {
                if profile.bssid.is_some_and(|pinned| pinned != bss.bssid) {
                    continue;
                }
                matched = true;
                match negotiate(profile, Some(bss), &self.config) {
                    Ok(suite) => {
                        usable = true;
                        candidates.push((profile.id, bss.clone(), suite));
                    }
                    Err(e) => {
                        debug!("Skipping {} for network {}: {}", bss.bssid, profile.id, e);
                        if e.kind() == FailureKind::Configuration && config_failure.is_none() {
                            config_failure = Some((profile.id, e));
                        }
                    }
                }
            }
            if matched && usable {
                config_failure = config_failure.filter(|(id, _)| *id != profile.id);
            }
        }

        if candidates.is_empty() {
            if let Some((id, err)) = config_failure {
                return self.fail_configuration(id, err);
            }
            debug!("No suitable network found");
            return self.request_scan(self.config.scan_interval);
        }

        let blacklist = self.retry.blacklist();
        if candidates.iter().all(|(_, bss, _)| blacklist.is_blacklisted(&bss.bssid)) {
            debug!("All candidates blacklisted; starting a new blacklist cycle");
            self.retry.blacklist_mut().start_cycle();
        }
        let blacklist = self.retry.blacklist();
        candidates.sort_by(|(_, a, _), (_, b, _)| {
            blacklist
                .count(&a.bssid)
                .cmp(&blacklist.count(&b.bssid))
                .then(b.signal.cmp(&a.signal))
        });
        let (id, bss, suite) = candidates.swap_remove(0);
        self.connect(now, id, bss, suite)
    }

    // --- Authentication ---

    fn connect(&mut self, now: Instant, id: ProfileId, bss: BssRecord, suite: NegotiatedSuite) -> Vec<Action> {
        info!(
            "Trying to connect to {} (SSID='{}' freq={} MHz)",
            bss.bssid,
            String::from_utf8_lossy(&bss.ssid),
            bss.freq
        );
        let same_peer = self.sae.as_ref().is_some_and(|s| s.peer() == bss.bssid);
        if !same_peer {
            self.drop_session();
        }
        self.attempt = Some(Attempt {
            profile: id,
            bss,
            suite,
            pmkid: None,
            psk: None,
            sae_group: None,
            pmk_installed: false,
        });
        self.own_disconnect_req = false;
        self.external = false;
        self.set_state(WpaState::Authenticating);

        let mut actions = vec![Action::SetTimer {
            timer: TimerId::AuthTimeout,
            after: self.config.auth_timeout,
        }];
        match self.start_authentication() {
            Ok(more) => {
                actions.extend(more);
                actions
            }
            Err(e) => {
                actions.extend(self.fail(now, e));
                actions
            }
        }
    }

    fn start_authentication(&mut self) -> Result<Vec<Action>> {
        let attempt = self.attempt.as_ref().ok_or(Error::InvalidState)?;
        let akm = attempt.suite.akm;
        let id = attempt.profile;

        if akm.is_sae() {
            let mut actions = Vec::new();
            let profile = self.profiles.get_mut(id).ok_or(Error::UnknownProfile(id))?;
            let cached = profile.sae_pt.len();
            ensure_pt(profile, &self.config)?;
            if profile.sae_pt.len() != cached {
                actions.push(Action::StoreProfile(Box::new(profile.clone())));
            }
            if self.config.external_auth {
                // The driver connects and then asks for SAE through ExternalAuthStart.
                actions.push(self.associate_action(true)?);
                return Ok(actions);
            }
            let frame = match self.sae.as_mut() {
                Some(session) => session.restart()?,
                None => {
                    let mut session = self.new_session(None)?;
                    let frame = session.start()?;
                    self.sae = Some(session);
                    frame
                }
            };
            actions.extend(self.send_sae(frame));
            return Ok(actions);
        }

        if akm.is_psk() || akm == Akm::WPA_NONE {
            let profile = self.profiles.get(id).ok_or(Error::UnknownProfile(id))?;
            let psk = derive_psk(profile)?;
            if let Some(attempt) = self.attempt.as_mut() {
                attempt.psk = Some(psk);
            }
        }
        self.set_state(WpaState::Associating);
        Ok(vec![self.associate_action(false)?])
    }

    fn new_session(&self, peer: Option<MacAddr>) -> Result<SaeSession> {
        let attempt = self.attempt.as_ref().ok_or(Error::InvalidState)?;
        let profile = self
            .profiles
            .get(attempt.profile)
            .ok_or(Error::UnknownProfile(attempt.profile))?;
        let mode = attempt
            .suite
            .sae
            .clone()
            .ok_or_else(|| Error::NoCandidate("no SAE parameters".into()))?;
        let password = profile
            .sae_secret()
            .ok_or_else(|| Error::NoCandidate("SAE password required".into()))?;
        SaeSession::new(SaeParams {
            own_addr: self.own_addr,
            peer_addr: peer.unwrap_or(attempt.bss.bssid),
            ssid: profile.ssid.clone(),
            password: Zeroizing::new(password.as_bytes().to_vec()),
            mode,
            pt: profile.sae_pt.clone(),
            pk_key: profile.sae_pk_key.clone(),
            max_retransmits: self.config.sae_max_retransmits,
        })
    }

    fn send_sae(&self, frame: SaeFrame) -> Vec<Action> {
        let Some(bssid) = self.sae.as_ref().map(SaeSession::peer) else {
            return Vec::new();
        };
        vec![
            Action::SendAuthFrame {
                bssid,
                transaction: frame.transaction,
                status: frame.status,
                payload: frame.payload,
                external: self.external,
            },
            Action::SetTimer {
                timer: TimerId::SaeRetransmit,
                after: self.config.sae_retransmit_period,
            },
        ]
    }

    fn associate_action(&self, external_auth: bool) -> Result<Action> {
        let attempt = self.attempt.as_ref().ok_or(Error::InvalidState)?;
        let pmkid = if self.config.sae_pmkid_in_assoc {
            attempt.pmkid
        } else {
            None
        };
        let suite = &attempt.suite;
        Ok(Action::Associate(AssociateParams {
            bssid: Some(attempt.bss.bssid),
            ssid: attempt.bss.ssid.clone(),
            freq: Some(attempt.bss.freq),
            ies: suite.association_ies(pmkid)?,
            akm: suite.akm,
            pairwise: suite.pairwise,
            group: suite.group,
            group_mgmt: suite.group_mgmt,
            mfp_required: suite.mfp_required,
            external_auth,
        }))
    }

    fn on_auth_frame(
        &mut self,
        now: Instant,
        bssid: MacAddr,
        transaction: u16,
        status: u16,
        payload: &[u8],
    ) -> Vec<Action> {
        if self.state != WpaState::Authenticating {
            debug!("Ignoring authentication frame from {} in state {}", bssid, self.state);
            return Vec::new();
        }
        let Some(session) = self.sae.as_mut() else {
            debug!("Ignoring authentication frame from {}: no SAE session", bssid);
            return Vec::new();
        };
        if session.peer() != bssid {
            debug!("Ignoring authentication frame from unexpected {}", bssid);
            return Vec::new();
        }
        match session.handle_frame(transaction, status, payload) {
            Ok(SaeOutcome::Send(frame)) => self.send_sae(frame),
            Ok(SaeOutcome::Discarded(reason)) => {
                debug!("SAE frame from {} discarded: {:?}", bssid, reason);
                Vec::new()
            }
            Ok(SaeOutcome::Accepted(result)) => self.on_sae_accepted(now, bssid, result.pmk, result.pmkid, result.group),
            Err(e) => self.sae_failed(now, bssid, e),
        }
    }

    fn on_sae_accepted(&mut self, now: Instant, bssid: MacAddr, pmk: Pmk, pmkid: Pmkid, group: u16) -> Vec<Action> {
        self.drop_session();
        let mut actions = vec![
            Action::CancelTimer(TimerId::SaeRetransmit),
            Action::InstallPmk {
                pmk,
                pmkid: Some(pmkid),
                bssid,
            },
        ];
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.pmkid = Some(pmkid);
            attempt.sae_group = Some(group);
            attempt.pmk_installed = true;
        }
        self.set_state(WpaState::Associating);
        if self.external {
            actions.push(Action::ExternalAuthStatus {
                bssid,
                status: StatusCode::Success.to_u16(),
                pmkid: Some(pmkid),
            });
            return actions;
        }
        match self.associate_action(false) {
            Ok(assoc) => actions.push(assoc),
            Err(e) => actions.extend(self.fail(now, e)),
        }
        actions
    }

    fn sae_failed(&mut self, now: Instant, bssid: MacAddr, err: Error) -> Vec<Action> {
        warn!("SAE with {} failed: {}", bssid, err);
        let mut actions = Vec::new();
        if self.external {
            let status = match err {
                Error::NoGroupsLeft => StatusCode::FiniteCyclicGroupNotSupported,
                Error::UnexpectedConfirm => StatusCode::UnknownAuthTransaction,
                _ => StatusCode::UnspecifiedFailure,
            };
            actions.push(Action::ExternalAuthStatus {
                bssid,
                status: status.to_u16(),
                pmkid: None,
            });
        }
        actions.extend(self.fail(now, err));
        actions
    }

    fn on_sae_retransmit(&mut self, now: Instant) -> Vec<Action> {
        if self.state != WpaState::Authenticating {
            return Vec::new();
        }
        let Some(session) = self.sae.as_mut() else {
            return Vec::new();
        };
        let peer = session.peer();
        match session.retransmit() {
            Ok(Some(frame)) => self.send_sae(frame),
            Ok(None) => Vec::new(),
            Err(e) => self.sae_failed(now, peer, e),
        }
    }

    fn on_external_auth_start(&mut self, now: Instant, bssid: MacAddr, ssid: Vec<u8>) -> Vec<Action> {
        let usable = self
            .attempt
            .as_ref()
            .is_some_and(|a| a.suite.akm.is_sae() && a.bss.ssid == ssid);
        if !usable {
            warn!("External authentication request for {} without a matching SAE attempt", bssid);
            return vec![Action::ExternalAuthStatus {
                bssid,
                status: StatusCode::UnspecifiedFailure.to_u16(),
                pmkid: None,
            }];
        }
        self.drop_session();
        self.external = true;
        self.set_state(WpaState::Authenticating);
        let started = self.new_session(Some(bssid)).and_then(|mut session| {
            let frame = session.start()?;
            Ok((session, frame))
        });
        match started {
            Ok((session, frame)) => {
                self.sae = Some(session);
                self.send_sae(frame)
            }
            Err(e) => self.sae_failed(now, bssid, e),
        }
    }

    fn on_external_auth_abort(&mut self) -> Vec<Action> {
        let Some(session) = self.sae.as_ref() else {
            return Vec::new();
        };
        let bssid = session.peer();
        info!("External authentication with {} aborted by the driver", bssid);
        self.drop_session();
        vec![
            Action::CancelTimer(TimerId::SaeRetransmit),
            Action::ExternalAuthStatus {
                bssid,
                status: StatusCode::UnspecifiedFailure.to_u16(),
                pmkid: None,
            },
        ]
    }

    // --- Association and key handshake ---

    fn on_assoc_result(&mut self, now: Instant, bssid: MacAddr, status: u16) -> Vec<Action> {
        let expected = self.attempt.as_ref().map(|a| a.bss.bssid);
        if self.state != WpaState::Associating || expected != Some(bssid) {
            debug!("Ignoring association result from {} in state {}", bssid, self.state);
            return Vec::new();
        }
        if status != 0 {
            warn!("Association with {} rejected, status {}", bssid, status);
            return self.fail(now, Error::AssociationRejected(status));
        }
        info!("Associated with {}", bssid);
        self.set_state(WpaState::Associated);
        let mut actions = Vec::new();
        if let Some(attempt) = self.attempt.as_mut() {
            if let (false, Some(pmk)) = (attempt.pmk_installed, attempt.psk.take()) {
                attempt.pmk_installed = true;
                actions.push(Action::InstallPmk {
                    pmk,
                    pmkid: None,
                    bssid,
                });
            }
        }
        actions
    }

    fn on_eapol(&mut self, src: MacAddr, frame: Vec<u8>) -> Vec<Action> {
        match self.state {
            WpaState::Associated => self.set_state(WpaState::FourWayHandshake),
            WpaState::FourWayHandshake | WpaState::GroupHandshake | WpaState::Completed => {}
            state => {
                debug!("Dropping EAPOL from {} in state {}", src, state);
                return Vec::new();
            }
        }
        vec![Action::DeliverEapol { src, frame }]
    }

    fn on_handshake(&mut self, now: Instant, stage: HandshakeStage) -> Vec<Action> {
        match stage {
            HandshakeStage::PairwiseKeysInstalled => {
                if matches!(self.state, WpaState::Associated | WpaState::FourWayHandshake) {
                    self.set_state(WpaState::GroupHandshake);
                }
                Vec::new()
            }
            HandshakeStage::GroupKeysInstalled => {
                if !matches!(
                    self.state,
                    WpaState::Associated | WpaState::FourWayHandshake | WpaState::GroupHandshake
                ) {
                    return Vec::new();
                }
                self.completed()
            }
            HandshakeStage::Failed { reason } => {
                if !self.state.is_connecting() {
                    return Vec::new();
                }
                let mut actions = Vec::new();
                if let Some(attempt) = self.attempt.as_ref() {
                    self.own_disconnect_req = true;
                    actions.push(Action::Deauthenticate {
                        bssid: attempt.bss.bssid,
                        reason,
                    });
                }
                actions.extend(self.fail(now, Error::HandshakeFailed(reason)));
                actions
            }
        }
    }

    fn completed(&mut self) -> Vec<Action> {
        let mut actions = vec![Action::CancelTimer(TimerId::AuthTimeout)];
        if let Some(attempt) = self.attempt.as_ref() {
            info!(
                "Connection to {} completed (network {})",
                attempt.bss.bssid, attempt.profile
            );
            if let Some(profile) = self.profiles.get_mut(attempt.profile) {
                let dirty = profile.auth_failures > 0 || profile.disabled_until.is_some();
                self.retry.connection_succeeded(profile, &attempt.bss.bssid);
                if dirty {
                    actions.push(Action::StoreProfile(Box::new(profile.clone())));
                }
            }
        }
        self.set_state(WpaState::Completed);
        actions
    }

    // --- Disconnect and timeouts ---

    fn on_disconnect(&mut self, now: Instant, bssid: MacAddr, reason: u16, locally_generated: bool) -> Vec<Action> {
        if self.own_disconnect_req {
            debug!("Disconnect from {} (reason {}) was requested locally", bssid, reason);
            self.own_disconnect_req = false;
            return Vec::new();
        }
        let current = self.attempt.as_ref().map(|a| a.bss.bssid);
        if current != Some(bssid) {
            return Vec::new();
        }
        // Local link loss is not held against the BSS.
        if self.state == WpaState::Completed || locally_generated {
            info!(
                "Disconnected from {} (reason {}, local {})",
                bssid, reason, locally_generated
            );
            let mut actions = self.teardown(false);
            actions.extend(self.request_scan(Duration::ZERO));
            return actions;
        }
        if self.state.is_connecting() {
            return self.fail(now, Error::PeerDisconnect(reason));
        }
        Vec::new()
    }

    fn on_auth_timeout(&mut self, now: Instant) -> Vec<Action> {
        if !self.state.is_connecting() {
            return Vec::new();
        }
        let mut actions = Vec::new();
        if let Some(attempt) = self.attempt.as_ref() {
            warn!("Authentication with {} timed out", attempt.bss.bssid);
            self.own_disconnect_req = true;
            actions.push(Action::Deauthenticate {
                bssid: attempt.bss.bssid,
                reason: REASON_DEAUTH_LEAVING,
            });
        }
        actions.extend(self.fail(now, Error::Timeout));
        actions
    }

    // --- Failure routing ---

    fn fail(&mut self, now: Instant, err: Error) -> Vec<Action> {
        let Some(attempt) = self.attempt.clone() else {
            return Vec::new();
        };
        let mut actions = vec![
            Action::CancelTimer(TimerId::AuthTimeout),
            Action::CancelTimer(TimerId::SaeRetransmit),
        ];
        if err.kind() == FailureKind::Transient {
            if let Some(session) = self.sae.as_mut() {
                session.abort();
            }
        } else {
            self.drop_session();
        }

        if err.kind() == FailureKind::Configuration {
            actions.extend(self.fail_configuration(attempt.profile, err));
            return actions;
        }

        warn!("Connection to {} failed: {}", attempt.bss.bssid, err);
        let akm = attempt.suite.akm;
        let delay = match self.profiles.get_mut(attempt.profile) {
            Some(profile) => {
                let delay = self
                    .retry
                    .connection_failed(profile, attempt.bss.bssid, akm, now);
                if err.is_credential_failure() {
                    self.retry.auth_failed(profile, akm, now, "WRONG_KEY");
                }
                actions.push(Action::StoreProfile(Box::new(profile.clone())));
                delay
            }
            None => self.config.scan_interval,
        };
        self.attempt = None;
        self.set_state(WpaState::Disconnected);
        actions.extend(self.request_scan(delay));
        actions
    }

    fn fail_configuration(&mut self, id: ProfileId, err: Error) -> Vec<Action> {
        warn!("Network {} has a configuration problem: {}", id, err);
        self.attempt = None;
        self.drop_session();
        self.set_state(WpaState::Inactive);
        match self.profiles.get_mut(id) {
            Some(profile) => {
                profile.config_error = Some(err.to_string());
                vec![Action::StoreProfile(Box::new(profile.clone()))]
            }
            None => Vec::new(),
        }
    }

    /// Cancel everything in flight. With `deauth`, tell the AP we are leaving.
    fn teardown(&mut self, deauth: bool) -> Vec<Action> {
        let mut actions = Vec::new();
        if let Some(attempt) = self.attempt.take() {
            actions.push(Action::CancelTimer(TimerId::AuthTimeout));
            actions.push(Action::CancelTimer(TimerId::SaeRetransmit));
            if deauth && (self.state.is_connecting() || self.state == WpaState::Completed) {
                self.own_disconnect_req = true;
                actions.push(Action::Deauthenticate {
                    bssid: attempt.bss.bssid,
                    reason: REASON_DEAUTH_LEAVING,
                });
            }
        }
        self.drop_session();
        self.external = false;
        actions
    }

    fn drop_session(&mut self) {
        if let Some(mut session) = self.sae.take() {
            session.zeroize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STA: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x10]);
    const AP: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x01]);
    // RSN: CCMP / CCMP / SAE, MFPC.
    const RSN_SAE: &str = "30140100000fac040100000fac040100000fac088000";
    // RSN: CCMP / CCMP / PSK.
    const RSN_PSK: &str = "30140100000fac040100000fac040100000fac020000";

    fn bss(bssid: MacAddr, ies: &str, signal: i32) -> BssRecord {
        BssRecord {
            bssid,
            ssid: b"home".to_vec(),
            freq: 2412,
            signal,
            ies: hex::decode(ies).unwrap(),
        }
    }

    fn supplicant(profile: NetworkProfile) -> Supplicant {
        Supplicant::new(STA, SupplicantConfig::default(), vec![profile])
    }

    fn associate(actions: &[Action]) -> Option<&AssociateParams> {
        actions.iter().find_map(|a| match a {
            Action::Associate(p) => Some(p),
            _ => None,
        })
    }

    fn scan_delay(actions: &[Action]) -> Option<Duration> {
        actions.iter().find_map(|a| match a {
            Action::RequestScan { delay } => Some(*delay),
            _ => None,
        })
    }

    #[test]
    fn test_state_names() {
        assert_eq!(WpaState::FourWayHandshake.to_string(), "4WAY_HANDSHAKE");
        assert_eq!(WpaState::InterfaceDisabled.to_string(), "INTERFACE_DISABLED");
    }

    #[test]
    fn test_select_network_requests_scan() {
        let mut s = supplicant(NetworkProfile::psk(1, "home", "passphrase"));
        let actions = s.select_network(1).unwrap();
        assert_eq!(s.state(), WpaState::Scanning);
        assert_eq!(scan_delay(&actions), Some(Duration::ZERO));
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::ConfigChanged { profile: Some(1) })));
        assert!(matches!(s.select_network(9), Err(Error::UnknownProfile(9))));
    }

    #[test]
    fn test_psk_flow() {
        let now = Instant::now();
        let mut s = supplicant(NetworkProfile::psk(1, "home", "passphrase"));
        s.select_network(1).unwrap();
        let actions = s.handle_event(now, DriverEvent::ScanResults(vec![bss(AP, RSN_PSK, -40)]));
        assert_eq!(s.state(), WpaState::Associating);
        let params = associate(&actions).unwrap();
        assert_eq!(params.akm, Akm::PSK);
        assert_eq!(params.bssid, Some(AP));

        let actions = s.handle_event(
            now,
            DriverEvent::AssocResult {
                bssid: AP,
                status: 0,
                ies: Vec::new(),
            },
        );
        assert_eq!(s.state(), WpaState::Associated);
        assert_eq!(
            actions.iter().filter(|a| matches!(a, Action::InstallPmk { .. })).count(),
            1
        );

        s.handle_event(
            now,
            DriverEvent::Eapol {
                src: AP,
                frame: vec![1, 2, 3],
            },
        );
        assert_eq!(s.state(), WpaState::FourWayHandshake);
        s.handle_event(now, DriverEvent::HandshakeProgress(HandshakeStage::PairwiseKeysInstalled));
        assert_eq!(s.state(), WpaState::GroupHandshake);
        let actions = s.handle_event(now, DriverEvent::HandshakeProgress(HandshakeStage::GroupKeysInstalled));
        assert_eq!(s.state(), WpaState::Completed);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::CancelTimer(TimerId::AuthTimeout))));
    }

    #[test]
    fn test_sae_starts_with_commit() {
        let now = Instant::now();
        let mut s = supplicant(NetworkProfile::sae(1, "home", "correcthorsebatterystaple"));
        s.select_network(1).unwrap();
        let actions = s.handle_event(now, DriverEvent::ScanResults(vec![bss(AP, RSN_SAE, -40)]));
        assert_eq!(s.state(), WpaState::Authenticating);
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::SendAuthFrame { transaction: 1, status: 0, external: false, .. }
        )));
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::SetTimer { timer: TimerId::AuthTimeout, .. }
        )));
    }

    #[test]
    fn test_association_rejection_backs_off() {
        let now = Instant::now();
        let mut s = supplicant(NetworkProfile::psk(1, "home", "passphrase"));
        s.select_network(1).unwrap();
        s.handle_event(now, DriverEvent::ScanResults(vec![bss(AP, RSN_PSK, -40)]));
        let actions = s.handle_event(
            now,
            DriverEvent::AssocResult {
                bssid: AP,
                status: 17,
                ies: Vec::new(),
            },
        );
        assert_eq!(scan_delay(&actions), Some(Duration::from_millis(100)));
        assert_eq!(s.retry().blacklist().count(&AP), 1);
    }

    #[test]
    fn test_prefers_unblacklisted_then_signal() {
        let now = Instant::now();
        let other = MacAddr([0x02, 0, 0, 0, 0, 0x02]);
        let mut s = supplicant(NetworkProfile::psk(1, "home", "passphrase"));
        s.select_network(1).unwrap();
        let actions = s.handle_event(
            now,
            DriverEvent::ScanResults(vec![bss(AP, RSN_PSK, -70), bss(other, RSN_PSK, -40)]),
        );
        assert_eq!(associate(&actions).unwrap().bssid, Some(other));
        s.handle_event(
            now,
            DriverEvent::AssocResult {
                bssid: other,
                status: 1,
                ies: Vec::new(),
            },
        );
        let actions = s.handle_event(
            now,
            DriverEvent::ScanResults(vec![bss(AP, RSN_PSK, -70), bss(other, RSN_PSK, -40)]),
        );
        assert_eq!(associate(&actions).unwrap().bssid, Some(AP));
    }

    #[test]
    fn test_missing_secret_is_configuration_error() {
        let now = Instant::now();
        let mut profile = NetworkProfile::sae(1, "home", "pw");
        profile.sae_password = None;
        let mut s = supplicant(profile);
        s.select_network(1).unwrap();
        let actions = s.handle_event(now, DriverEvent::ScanResults(vec![bss(AP, RSN_SAE, -40)]));
        assert_eq!(s.state(), WpaState::Inactive);
        assert_eq!(scan_delay(&actions), None);
        assert!(s.retry().blacklist().is_empty());
        let status = s.status(now);
        assert!(status.profiles[0].config_error.is_some());
    }

    #[test]
    fn test_operator_disconnect() {
        let now = Instant::now();
        let mut s = supplicant(NetworkProfile::psk(1, "home", "passphrase"));
        s.select_network(1).unwrap();
        s.handle_event(now, DriverEvent::ScanResults(vec![bss(AP, RSN_PSK, -40)]));
        let actions = s.disconnect();
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::Deauthenticate { reason: REASON_DEAUTH_LEAVING, .. }
        )));
        let actions = s.handle_event(
            now,
            DriverEvent::Disconnect {
                bssid: AP,
                reason: 3,
                locally_generated: true,
            },
        );
        assert!(actions.is_empty());
        assert_eq!(s.state(), WpaState::Disconnected);
        assert!(s.retry().blacklist().is_empty());
        assert!(s
            .handle_event(now, DriverEvent::ScanResults(vec![bss(AP, RSN_PSK, -40)]))
            .is_empty());
    }

    #[test]
    fn test_auth_timeout() {
        let now = Instant::now();
        let mut s = supplicant(NetworkProfile::sae(1, "home", "pw"));
        s.select_network(1).unwrap();
        s.handle_event(now, DriverEvent::ScanResults(vec![bss(AP, RSN_SAE, -40)]));
        let actions = s.handle_event(now, DriverEvent::Timeout(TimerId::AuthTimeout));
        assert!(actions.iter().any(|a| matches!(a, Action::Deauthenticate { .. })));
        assert_eq!(scan_delay(&actions), Some(Duration::from_millis(100)));
        assert_eq!(s.state(), WpaState::Scanning);
        // Transient failure: the session survives for a retry against the same AP.
        assert!(s.sae_session().is_some_and(|session| session.token().is_none()));
    }

    #[test]
    fn test_interface_disabled_wipes_session() {
        let now = Instant::now();
        let mut s = supplicant(NetworkProfile::sae(1, "home", "pw"));
        s.select_network(1).unwrap();
        s.handle_event(now, DriverEvent::ScanResults(vec![bss(AP, RSN_SAE, -40)]));
        assert!(s.sae_session().is_some());
        s.handle_event(now, DriverEvent::InterfaceDisabled);
        assert!(s.sae_session().is_none());
        assert_eq!(s.state(), WpaState::InterfaceDisabled);
        let actions = s.handle_event(now, DriverEvent::InterfaceEnabled);
        assert_eq!(scan_delay(&actions), Some(Duration::ZERO));
    }

    #[test]
    fn test_external_auth_requires_attempt() {
        let now = Instant::now();
        let mut s = supplicant(NetworkProfile::sae(1, "home", "pw"));
        let actions = s.handle_event(
            now,
            DriverEvent::ExternalAuthStart {
                bssid: AP,
                ssid: b"home".to_vec(),
            },
        );
        assert!(matches!(
            actions.as_slice(),
            [Action::ExternalAuthStatus { status: 1, .. }]
        ));
    }

    #[test]
    fn test_status_reports_disable() {
        let now = Instant::now();
        let mut profile = NetworkProfile::psk(1, "home", "passphrase");
        profile.auth_failures = 2;
        profile.disabled_until = Some(now + Duration::from_secs(20));
        let s = supplicant(profile);
        let status = s.status(now);
        assert_eq!(status.state, WpaState::Disconnected);
        assert_eq!(status.profiles[0].disabled_for, Some(Duration::from_secs(20)));
        assert_eq!(status.profiles[0].auth_failures, 2);
    }

    #[test]
    fn test_reconfigure_clears_selection() {
        let mut s = supplicant(NetworkProfile::psk(1, "home", "passphrase"));
        s.select_network(1).unwrap();
        let actions = s.reconfigure(vec![NetworkProfile::psk(2, "work", "passphrase")]);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::ConfigChanged { profile: None })));
        assert!(s.profiles().get(1).is_none());
        assert!(matches!(s.remove_profile(1), Err(Error::UnknownProfile(1))));
        assert!(s.remove_profile(2).is_ok());
    }
}
