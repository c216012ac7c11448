//! SAE session state machine.
//!
//! One session per authentication attempt. The session builds and
//! validates every Commit and Confirm; the caller only moves the resulting
//! [`SaeFrame`]s to and from the radio.

use super::{
    message::{AntiCloggingRequest, CommitMessage, ConfirmMessage, PkSignature},
    SaeState, StatusCode, TRANSACTION_COMMIT, TRANSACTION_CONFIRM,
};
use crate::{
    negotiate::SaeMode,
    types::{MacAddr, Pmk, Pmkid},
    Error, Result,
};
use tracing::{debug, info, warn};
use wpas_crypto::{
    pk::{self, PkSigner},
    sae::{
        compute_confirm, confirm_matches, derive_keys, derive_pwe_hunting_and_pecking,
        CommitValues, KeySchedule, Pt, Pwe, SaeKeys,
    },
    SaeGroup,
};
use zeroize::{Zeroize, Zeroizing};

/// Inputs for a new session.
#[derive(Clone)]
pub struct SaeParams {
    /// Station address.
    pub own_addr: MacAddr,
    /// Peer (AP) address.
    pub peer_addr: MacAddr,
    /// SSID, for hash-to-element PT derivation.
    pub ssid: Vec<u8>,
    /// SAE password.
    pub password: Zeroizing<Vec<u8>>,
    /// Negotiated SAE mode.
    pub mode: SaeMode,
    /// Cached PT per group.
    pub pt: Vec<Pt>,
    /// SAE-PK signing key.
    pub pk_key: Option<Zeroizing<Vec<u8>>>,
    /// Retransmissions allowed per message.
    pub max_retransmits: u32,
}

/// An authentication frame body to transmit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaeFrame {
    /// Authentication transaction sequence number.
    pub transaction: u16,
    /// Status code.
    pub status: u16,
    /// Frame body after the fixed authentication fields.
    pub payload: Vec<u8>,
}

/// Why an inbound frame was dropped without effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Peer commit equals our own.
    Reflection,
    /// Commit outside the `Committed` state.
    UnexpectedCommit,
    /// Confirm after the session was accepted.
    DuplicateConfirm,
    /// Token request or group rejection outside the `Committed` state.
    UnexpectedRequest,
    /// Token request for a group other than the current one.
    TokenGroupMismatch,
}

/// Keys produced by an accepted exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaeResult {
    /// Pairwise master key.
    pub pmk: Pmk,
    /// PMK identifier.
    pub pmkid: Pmkid,
    /// Group the exchange completed in.
    pub group: u16,
}

/// Result of feeding one frame to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaeOutcome {
    /// Transmit this frame.
    Send(SaeFrame),
    /// Frame ignored; no state change.
    Discarded(DiscardReason),
    /// Exchange complete.
    Accepted(SaeResult),
}

/// SAE session.
pub struct SaeSession {
    own_addr: MacAddr,
    peer_addr: MacAddr,
    ssid: Vec<u8>,
    password: Zeroizing<Vec<u8>>,
    mode: SaeMode,
    pt: Vec<Pt>,
    signer: Option<PkSigner>,
    max_retransmits: u32,

    state: SaeState,
    group_index: usize,
    group: SaeGroup,
    rejected_groups: Vec<u16>,
    token: Option<Vec<u8>>,
    pwe: Option<Pwe>,
    commit: Option<CommitValues>,
    last_commit: Option<SaeFrame>,
    peer_scalar: Option<Zeroizing<Vec<u8>>>,
    peer_element: Option<Zeroizing<Vec<u8>>>,
    keys: Option<SaeKeys>,
    send_confirm: u16,
    retransmits: u32,
}

impl core::fmt::Debug for SaeSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SaeSession")
            .field("peer", &self.peer_addr)
            .field("state", &self.state)
            .field("group", &self.group)
            .field("rejected_groups", &self.rejected_groups)
            .field("h2e", &self.mode.h2e)
            .field("pk", &self.mode.pk)
            .finish_non_exhaustive()
    }
}

impl SaeSession {
    /// Create a session in `Nothing`.
    ///
    /// # Errors
    ///
    /// `Error::NoGroupsLeft` if the mode lists no usable group,
    /// `Error::Crypto` if the PK key is invalid.
    pub fn new(params: SaeParams) -> Result<Self> {
        let (group_index, group) = params
            .mode
            .groups
            .iter()
            .enumerate()
            .find_map(|(i, id)| SaeGroup::from_id(*id).ok().map(|g| (i, g)))
            .ok_or(Error::NoGroupsLeft)?;
        let signer = match (&params.pk_key, params.mode.pk) {
            (Some(key), true) => Some(PkSigner::from_bytes(key)?),
            _ => None,
        };
        Ok(Self {
            own_addr: params.own_addr,
            peer_addr: params.peer_addr,
            ssid: params.ssid,
            password: params.password,
            mode: params.mode,
            pt: params.pt,
            signer,
            max_retransmits: params.max_retransmits,
            state: SaeState::Nothing,
            group_index,
            group,
            rejected_groups: Vec::new(),
            token: None,
            pwe: None,
            commit: None,
            last_commit: None,
            peer_scalar: None,
            peer_element: None,
            keys: None,
            send_confirm: 0,
            retransmits: 0,
        })
    }

    /// Current state.
    pub fn state(&self) -> SaeState {
        self.state
    }

    /// Peer address.
    pub fn peer(&self) -> MacAddr {
        self.peer_addr
    }

    /// Group currently in use.
    pub fn group(&self) -> u16 {
        self.group.id()
    }

    /// Groups the peer rejected, in order.
    pub fn rejected_groups(&self) -> &[u16] {
        &self.rejected_groups
    }

    /// Anti-clogging token currently echoed.
    pub fn token(&self) -> Option<&[u8]> {
        self.token.as_deref()
    }

    /// Negotiated mode.
    pub fn mode(&self) -> &SaeMode {
        &self.mode
    }

    /// Whether any password-derived or ephemeral secret is still held.
    pub fn holds_secret_material(&self) -> bool {
        !self.password.is_empty()
            || !self.pt.is_empty()
            || self.signer.is_some()
            || self.holds_ephemeral_material()
    }

    fn holds_ephemeral_material(&self) -> bool {
        self.pwe.is_some()
            || self.commit.is_some()
            || self.keys.is_some()
            || self.peer_scalar.is_some()
            || self.peer_element.is_some()
            || self.token.is_some()
            || self.last_commit.is_some()
    }

    /// Send the first Commit: `Nothing → Committed`.
    pub fn start(&mut self) -> Result<SaeFrame> {
        if self.state != SaeState::Nothing {
            return Err(Error::InvalidState);
        }
        let frame = self.build_commit()?;
        self.state = SaeState::Committed;
        info!(
            "SAE: {} → {} with {} (group {})",
            SaeState::Nothing,
            self.state,
            self.peer_addr,
            self.group
        );
        Ok(frame)
    }

    /// Restart the exchange with the same peer after a failed attempt.
    ///
    /// Ephemeral material is wiped and a new Commit is built in the current
    /// group. Rejected groups are kept.
    pub fn restart(&mut self) -> Result<SaeFrame> {
        if self.password.is_empty() {
            return Err(Error::InvalidState);
        }
        self.wipe_ephemeral();
        self.state = SaeState::Nothing;
        self.retransmits = 0;
        self.send_confirm = 0;
        self.start()
    }

    /// Abandon the current exchange, wiping ephemeral material.
    ///
    /// The password and rejected groups stay so that [`restart`](Self::restart)
    /// can retry the same peer.
    pub fn abort(&mut self) {
        self.wipe_ephemeral();
    }

    /// Process one inbound authentication frame.
    ///
    /// # Errors
    ///
    /// Any error aborts the session; the caller decides recovery from
    /// [`Error::kind`].
    pub fn handle_frame(&mut self, transaction: u16, status: u16, payload: &[u8]) -> Result<SaeOutcome> {
        match transaction {
            TRANSACTION_COMMIT => self.handle_commit_frame(status, payload),
            TRANSACTION_CONFIRM => self.handle_confirm_frame(status, payload),
            other => Err(Error::MalformedFrame(format!(
                "unknown authentication transaction {other}"
            ))),
        }
    }

    /// Retransmission timer fired.
    ///
    /// Returns the frame to resend, or `None` when nothing is outstanding.
    ///
    /// # Errors
    ///
    /// `Error::Timeout` once the retransmission limit is exhausted.
    pub fn retransmit(&mut self) -> Result<Option<SaeFrame>> {
        match self.state {
            SaeState::Committed | SaeState::Confirmed => {}
            _ => return Ok(None),
        }
        if self.retransmits >= self.max_retransmits {
            warn!("SAE: no response from {} after {} retransmissions", self.peer_addr, self.retransmits);
            return Err(Error::Timeout);
        }
        self.retransmits += 1;
        match self.state {
            SaeState::Committed => {
                debug!("SAE: retransmit Commit ({})", self.retransmits);
                Ok(self.last_commit.clone())
            }
            _ => {
                debug!("SAE: retransmit Confirm ({})", self.retransmits);
                self.build_confirm().map(Some)
            }
        }
    }

    /// Wipe every secret this session holds. The session is unusable afterwards.
    pub fn zeroize(&mut self) {
        self.wipe_ephemeral();
        self.password.zeroize();
        self.pt.clear();
        self.signer = None;
    }

    fn wipe_ephemeral(&mut self) {
        self.pwe = None;
        self.commit = None;
        self.keys = None;
        self.peer_scalar = None;
        self.peer_element = None;
        if let Some(token) = self.token.as_mut() {
            token.zeroize();
        }
        self.token = None;
        self.last_commit = None;
    }

    // === Commit ===

    fn derive_pwe(&self) -> Result<Pwe> {
        let own = self.own_addr.octets();
        let peer = self.peer_addr.octets();
        let id = self.mode.password_id.as_deref().map(str::as_bytes);
        if self.mode.h2e {
            let pwe = match self.pt.iter().find(|pt| pt.group() == self.group) {
                Some(pt) => pt.derive_pwe(own, peer)?,
                None => Pt::derive(self.group, &self.ssid, &self.password, id)?.derive_pwe(own, peer)?,
            };
            Ok(pwe)
        } else {
            Ok(derive_pwe_hunting_and_pecking(self.group, own, peer, &self.password, id)?)
        }
    }

    fn commit_status(&self) -> StatusCode {
        if self.mode.pk {
            StatusCode::SaePk
        } else if self.mode.h2e {
            StatusCode::SaeHashToElement
        } else {
            StatusCode::Success
        }
    }

    fn build_commit(&mut self) -> Result<SaeFrame> {
        if self.pwe.is_none() {
            self.pwe = Some(self.derive_pwe()?);
        }
        let pwe = self.pwe.as_ref().ok_or(Error::InvalidState)?;
        if self.commit.is_none() {
            self.commit = Some(CommitValues::generate(pwe)?);
        }
        let values = self.commit.as_ref().ok_or(Error::InvalidState)?;

        let mut msg = CommitMessage {
            group: self.group.id(),
            token: self.token.clone(),
            scalar: values.scalar().to_vec(),
            element: values.element().to_vec(),
            password_id: self.mode.password_id.clone(),
            rejected_groups: if self.mode.h2e {
                self.rejected_groups.clone()
            } else {
                Vec::new()
            },
            pk_signature: None,
        };
        if let Some(signer) = &self.signer {
            let data = msg.signed_data(&self.own_addr, &self.peer_addr);
            msg.pk_signature = Some(PkSignature {
                public_key: signer.public_key(),
                signature: signer.sign(&data),
            });
        }

        let frame = SaeFrame {
            transaction: TRANSACTION_COMMIT,
            status: self.commit_status().to_u16(),
            payload: msg.serialize(self.mode.h2e)?,
        };
        self.last_commit = Some(frame.clone());
        Ok(frame)
    }

    fn handle_commit_frame(&mut self, status: u16, payload: &[u8]) -> Result<SaeOutcome> {
        match StatusCode::from_u16(status) {
            StatusCode::AntiCloggingTokenRequired => self.handle_token_request(payload),
            StatusCode::FiniteCyclicGroupNotSupported => self.handle_group_rejected(),
            StatusCode::UnknownPasswordIdentifier => {
                warn!("SAE: {} does not know our password identifier", self.peer_addr);
                Err(Error::UnknownPasswordIdentifier)
            }
            StatusCode::Success | StatusCode::SaeHashToElement | StatusCode::SaePk => {
                self.handle_peer_commit(status, payload)
            }
            _ => {
                warn!("SAE: commit rejected by {} with status {}", self.peer_addr, status);
                Err(Error::Rejected(status))
            }
        }
    }

    fn handle_token_request(&mut self, payload: &[u8]) -> Result<SaeOutcome> {
        if self.state != SaeState::Committed {
            return Ok(SaeOutcome::Discarded(DiscardReason::UnexpectedRequest));
        }
        let request = AntiCloggingRequest::parse(payload, self.mode.h2e)?;
        if request.group != self.group.id() {
            debug!("SAE: token request for group {} while using {}", request.group, self.group);
            return Ok(SaeOutcome::Discarded(DiscardReason::TokenGroupMismatch));
        }
        debug!("SAE: anti-clogging token requested by {}", self.peer_addr);
        self.token = Some(request.token);
        self.retransmits = 0;
        Ok(SaeOutcome::Send(self.build_commit()?))
    }

    fn handle_group_rejected(&mut self) -> Result<SaeOutcome> {
        if self.state != SaeState::Committed {
            return Ok(SaeOutcome::Discarded(DiscardReason::UnexpectedRequest));
        }
        let rejected = self.group.id();
        if !self.rejected_groups.contains(&rejected) {
            self.rejected_groups.push(rejected);
        }
        let next = self
            .mode
            .groups
            .iter()
            .enumerate()
            .skip(self.group_index + 1)
            .find(|(_, id)| !self.rejected_groups.contains(*id) && SaeGroup::from_id(**id).is_ok())
            .map(|(i, id)| (i, *id));
        let Some((index, id)) = next else {
            warn!("SAE: {} rejected group {}; no groups left", self.peer_addr, rejected);
            return Err(Error::NoGroupsLeft);
        };
        info!("SAE: {} rejected group {}; trying {}", self.peer_addr, rejected, id);
        self.group_index = index;
        self.group = SaeGroup::from_id(id)?;
        self.wipe_ephemeral();
        self.retransmits = 0;
        Ok(SaeOutcome::Send(self.build_commit()?))
    }

    fn check_commit_status(&self, status: u16) -> Result<()> {
        let code = StatusCode::from_u16(status);
        let bad = match code {
            StatusCode::Success => self.mode.h2e,
            StatusCode::SaeHashToElement => !self.mode.h2e || self.mode.pk,
            StatusCode::SaePk => !self.mode.pk,
            _ => true,
        };
        if bad {
            return Err(Error::StatusMismatch(status));
        }
        Ok(())
    }

    fn handle_peer_commit(&mut self, status: u16, payload: &[u8]) -> Result<SaeOutcome> {
        if self.state != SaeState::Committed {
            debug!("SAE: ignoring commit from {} in state {}", self.peer_addr, self.state);
            return Ok(SaeOutcome::Discarded(DiscardReason::UnexpectedCommit));
        }
        self.check_commit_status(status)?;
        let msg = CommitMessage::parse(payload, self.mode.h2e)?;

        if self.rejected_groups.contains(&msg.group) {
            warn!("SAE: {} proposed previously rejected group {}", self.peer_addr, msg.group);
            return Err(Error::Downgrade(msg.group));
        }
        if msg.group != self.group.id() {
            return Err(Error::UnsupportedGroup(msg.group));
        }

        let values = self.commit.as_ref().ok_or(Error::InvalidState)?;
        if msg.scalar == values.scalar() || msg.element == values.element() {
            warn!("SAE: reflected commit from {}; discarding", self.peer_addr);
            return Ok(SaeOutcome::Discarded(DiscardReason::Reflection));
        }

        if let Some(id) = &self.mode.password_id {
            if msg.password_id.as_ref() != Some(id) {
                return Err(Error::UnknownPasswordIdentifier);
            }
        }
        if let Some(g) = msg
            .rejected_groups
            .iter()
            .find(|g| self.mode.groups.contains(*g))
        {
            warn!("SAE: {} claims our enabled group {} was rejected", self.peer_addr, g);
            return Err(Error::Downgrade(*g));
        }
        if self.mode.pk {
            let sig = msg
                .pk_signature
                .as_ref()
                .ok_or_else(|| Error::MalformedFrame("missing SAE-PK signature".into()))?;
            let data = msg.signed_data(&self.peer_addr, &self.own_addr);
            pk::verify(&sig.public_key, &data, &sig.signature)?;
        }

        let schedule = if self.mode.h2e {
            KeySchedule::HashToElement {
                rejected_groups: self.rejected_groups.clone(),
            }
        } else {
            KeySchedule::Legacy
        };
        let pwe = self.pwe.as_ref().ok_or(Error::InvalidState)?;
        let keys = derive_keys(pwe, values, &msg.scalar, &msg.element, &schedule)?;

        self.keys = Some(keys);
        self.peer_scalar = Some(Zeroizing::new(msg.scalar));
        self.peer_element = Some(Zeroizing::new(msg.element));
        self.pwe = None;
        self.retransmits = 0;

        let frame = self.build_confirm()?;
        self.state = SaeState::Confirmed;
        debug!("SAE: {} → {} with {}", SaeState::Committed, self.state, self.peer_addr);
        Ok(SaeOutcome::Send(frame))
    }

    // === Confirm ===

    fn build_confirm(&mut self) -> Result<SaeFrame> {
        let keys = self.keys.as_ref().ok_or(Error::InvalidState)?;
        let values = self.commit.as_ref().ok_or(Error::InvalidState)?;
        let peer_scalar = self.peer_scalar.as_ref().ok_or(Error::InvalidState)?;
        let peer_element = self.peer_element.as_ref().ok_or(Error::InvalidState)?;
        self.send_confirm = self.send_confirm.saturating_add(1);
        let confirm = compute_confirm(
            keys,
            self.send_confirm,
            values.scalar(),
            values.element(),
            peer_scalar,
            peer_element,
        )?;
        Ok(SaeFrame {
            transaction: TRANSACTION_CONFIRM,
            status: StatusCode::Success.to_u16(),
            payload: ConfirmMessage {
                send_confirm: self.send_confirm,
                confirm,
            }
            .serialize(),
        })
    }

    fn handle_confirm_frame(&mut self, status: u16, payload: &[u8]) -> Result<SaeOutcome> {
        if self.state == SaeState::Accepted {
            debug!("SAE: duplicate confirm from {} (status {})", self.peer_addr, status);
            return Ok(SaeOutcome::Discarded(DiscardReason::DuplicateConfirm));
        }
        if status != StatusCode::Success.to_u16() {
            warn!("SAE: confirm rejected by {} with status {}", self.peer_addr, status);
            return Err(Error::Rejected(status));
        }
        match self.state {
            SaeState::Confirmed => {}
            state => {
                warn!("SAE: confirm from {} in state {}", self.peer_addr, state);
                return Err(Error::UnexpectedConfirm);
            }
        }

        let msg = ConfirmMessage::parse(payload)?;
        let keys = self.keys.as_ref().ok_or(Error::InvalidState)?;
        let values = self.commit.as_ref().ok_or(Error::InvalidState)?;
        let peer_scalar = self.peer_scalar.as_ref().ok_or(Error::InvalidState)?;
        let peer_element = self.peer_element.as_ref().ok_or(Error::InvalidState)?;
        let expected = compute_confirm(
            keys,
            msg.send_confirm,
            peer_scalar,
            peer_element,
            values.scalar(),
            values.element(),
        )?;
        if !confirm_matches(&expected, &msg.confirm) {
            warn!("SAE: confirm from {} did not verify", self.peer_addr);
            return Err(Error::ConfirmMismatch);
        }

        let result = SaeResult {
            pmk: Pmk::new(keys.pmk),
            pmkid: keys.pmkid,
            group: self.group.id(),
        };
        self.state = SaeState::Accepted;
        info!("SAE: {} → {} with {}", SaeState::Confirmed, self.state, self.peer_addr);
        self.zeroize();
        Ok(SaeOutcome::Accepted(result))
    }
}

impl Drop for SaeSession {
    fn drop(&mut self) {
        self.zeroize();
    }
}
