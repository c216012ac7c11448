//! Simulated access point for end-to-end tests.
//!
//! The AP side of SAE reuses the engine's own session and codec: it answers
//! a station Commit with its own Commit and Confirm, and can demand an
//! anti-clogging token or reject groups first.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use wpas_core::{
    sae::{
        AntiCloggingRequest, CommitMessage, SaeFrame, SaeOutcome, SaeParams, SaeSession, StatusCode,
        TRANSACTION_COMMIT, TRANSACTION_CONFIRM,
    },
    Action, BssRecord, DriverEvent, HandshakeStage, MacAddr, Pmk, SaeMode, Supplicant,
};
use zeroize::Zeroizing;

pub const STA: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x10]);
pub const AP: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
pub const SSID: &[u8] = b"home";
pub const PASSWORD: &str = "correcthorsebatterystaple";

/// RSN: CCMP / CCMP / SAE, MFPC.
pub const RSN_SAE: &str = "30140100000fac040100000fac040100000fac088000";
/// RSNXE advertising SAE hash-to-element.
pub const RSNXE_H2E: &str = "f40120";

/// Route engine logs to the test writer. `RUST_LOG=wpas_core=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn beacon(bssid: MacAddr, ies: &[&str]) -> BssRecord {
    BssRecord {
        bssid,
        ssid: SSID.to_vec(),
        freq: 2437,
        signal: -45,
        ies: ies.iter().flat_map(|h| hex::decode(h).unwrap()).collect(),
    }
}

pub struct TestAp {
    pub bssid: MacAddr,
    pub password: String,
    pub groups: Vec<u16>,
    pub h2e: bool,
    pub token: Option<Vec<u8>>,
    /// `None` leaves association requests unanswered.
    pub assoc_status: Option<u16>,
    pub commits: Vec<CommitMessage>,
    pub pmk: Option<Pmk>,
    session: Option<SaeSession>,
}

impl TestAp {
    pub fn new(groups: Vec<u16>) -> Self {
        Self {
            bssid: AP,
            password: PASSWORD.to_owned(),
            groups,
            h2e: false,
            token: None,
            assoc_status: Some(0),
            commits: Vec::new(),
            pmk: None,
            session: None,
        }
    }

    /// Frames the AP sends back for one station frame.
    pub fn receive(&mut self, transaction: u16, status: u16, payload: &[u8]) -> Vec<SaeFrame> {
        match transaction {
            TRANSACTION_COMMIT => self.receive_commit(status, payload),
            TRANSACTION_CONFIRM => self.receive_confirm(status, payload),
            _ => Vec::new(),
        }
    }

    fn receive_commit(&mut self, status: u16, payload: &[u8]) -> Vec<SaeFrame> {
        let msg = CommitMessage::parse(payload, self.h2e).unwrap();
        self.commits.push(msg.clone());

        if !self.groups.contains(&msg.group) {
            return vec![SaeFrame {
                transaction: TRANSACTION_COMMIT,
                status: StatusCode::FiniteCyclicGroupNotSupported.to_u16(),
                payload: msg.group.to_le_bytes().to_vec(),
            }];
        }
        if let Some(token) = &self.token {
            if msg.token.as_ref() != Some(token) {
                let request = AntiCloggingRequest {
                    group: msg.group,
                    token: token.clone(),
                };
                return vec![SaeFrame {
                    transaction: TRANSACTION_COMMIT,
                    status: StatusCode::AntiCloggingTokenRequired.to_u16(),
                    payload: request.serialize(self.h2e).unwrap(),
                }];
            }
        }

        let mut session = SaeSession::new(SaeParams {
            own_addr: self.bssid,
            peer_addr: STA,
            ssid: SSID.to_vec(),
            password: Zeroizing::new(self.password.as_bytes().to_vec()),
            mode: SaeMode {
                h2e: self.h2e,
                pk: false,
                groups: vec![msg.group],
                password_id: msg.password_id.clone(),
            },
            pt: Vec::new(),
            pk_key: None,
            max_retransmits: 3,
        })
        .unwrap();
        let commit = session.start().unwrap();
        let confirm = match session.handle_frame(TRANSACTION_COMMIT, status, payload) {
            Ok(SaeOutcome::Send(frame)) => frame,
            other => panic!("AP could not process the station commit: {other:?}"),
        };
        self.session = Some(session);
        vec![commit, confirm]
    }

    fn receive_confirm(&mut self, status: u16, payload: &[u8]) -> Vec<SaeFrame> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if let Ok(SaeOutcome::Accepted(result)) = session.handle_frame(TRANSACTION_CONFIRM, status, payload) {
            self.pmk = Some(result.pmk);
        }
        Vec::new()
    }
}

/// Runs a supplicant against a [`TestAp`], recording every action.
pub struct Harness {
    pub supplicant: Supplicant,
    pub ap: TestAp,
    pub now: Instant,
    pub log: Vec<Action>,
    pub scan_delays: Vec<Duration>,
}

impl Harness {
    pub fn new(supplicant: Supplicant, ap: TestAp) -> Self {
        init_tracing();
        Self {
            supplicant,
            ap,
            now: Instant::now(),
            log: Vec::new(),
            scan_delays: Vec::new(),
        }
    }

    /// Feed an event and run every resulting exchange to quiescence.
    pub fn event(&mut self, event: DriverEvent) {
        let actions = self.supplicant.handle_event(self.now, event);
        self.run(actions);
    }

    pub fn run(&mut self, actions: Vec<Action>) {
        let mut queue: VecDeque<Action> = actions.into();
        while let Some(action) = queue.pop_front() {
            let mut events = Vec::new();
            match &action {
                Action::SendAuthFrame {
                    bssid,
                    transaction,
                    status,
                    payload,
                    ..
                } if *bssid == self.ap.bssid => {
                    for frame in self.ap.receive(*transaction, *status, payload) {
                        events.push(DriverEvent::AuthFrame {
                            bssid: self.ap.bssid,
                            transaction: frame.transaction,
                            status: frame.status,
                            payload: frame.payload,
                        });
                    }
                }
                Action::Associate(params) if params.bssid == Some(self.ap.bssid) => {
                    if let Some(status) = self.ap.assoc_status {
                        events.push(DriverEvent::AssocResult {
                            bssid: self.ap.bssid,
                            status,
                            ies: Vec::new(),
                        });
                    }
                }
                Action::RequestScan { delay } => self.scan_delays.push(*delay),
                _ => {}
            }
            self.log.push(action);
            for event in events {
                queue.extend(self.supplicant.handle_event(self.now, event));
            }
        }
    }

    /// Finish the key handshake as the handshake engine would.
    pub fn complete_handshake(&mut self) {
        self.event(DriverEvent::Eapol {
            src: self.ap.bssid,
            frame: vec![0x02, 0x03, 0x00, 0x5f],
        });
        self.event(DriverEvent::HandshakeProgress(HandshakeStage::PairwiseKeysInstalled));
        self.event(DriverEvent::HandshakeProgress(HandshakeStage::GroupKeysInstalled));
    }

    pub fn installed_pmks(&self) -> Vec<&Pmk> {
        self.log
            .iter()
            .filter_map(|a| match a {
                Action::InstallPmk { pmk, .. } => Some(pmk),
                _ => None,
            })
            .collect()
    }

    pub fn sent_commits(&self) -> usize {
        self.log
            .iter()
            .filter(|a| matches!(a, Action::SendAuthFrame { transaction: TRANSACTION_COMMIT, .. }))
            .count()
    }
}
