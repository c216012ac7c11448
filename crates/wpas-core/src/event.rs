//! Driver events in, actions out.

use crate::{
    bss::BssRecord,
    profile::{NetworkProfile, ProfileId},
    suite::{Akm, Cipher},
    types::{MacAddr, Pmk, Pmkid},
};
use std::time::Duration;

/// Timers the engine arms through [`Action::SetTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Authentication/association must finish before this fires.
    AuthTimeout,
    /// SAE frame retransmission.
    SaeRetransmit,
}

/// Key handshake progress reported by the handshake engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    /// 4-way handshake done, pairwise keys installed.
    PairwiseKeysInstalled,
    /// Group keys installed.
    GroupKeysInstalled,
    /// Handshake failed.
    Failed {
        /// IEEE 802.11 reason code.
        reason: u16,
    },
}

/// Everything the radio driver and the handshake engine report.
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// Fresh scan results.
    ScanResults(Vec<BssRecord>),
    /// Authentication frame received.
    AuthFrame {
        /// Sender.
        bssid: MacAddr,
        /// Transaction sequence number.
        transaction: u16,
        /// Status code.
        status: u16,
        /// Body after the fixed authentication fields.
        payload: Vec<u8>,
    },
    /// Association finished.
    AssocResult {
        /// BSSID.
        bssid: MacAddr,
        /// Status code.
        status: u16,
        /// Response elements.
        ies: Vec<u8>,
    },
    /// Link lost.
    Disconnect {
        /// BSSID.
        bssid: MacAddr,
        /// Reason code.
        reason: u16,
        /// The disconnect was generated by this station.
        locally_generated: bool,
    },
    /// EAPOL frame received.
    Eapol {
        /// Sender.
        src: MacAddr,
        /// Frame.
        frame: Vec<u8>,
    },
    /// Key handshake progress.
    HandshakeProgress(HandshakeStage),
    /// Driver asks us to run SAE for an offloaded connect.
    ExternalAuthStart {
        /// Target BSSID.
        bssid: MacAddr,
        /// Target SSID.
        ssid: Vec<u8>,
    },
    /// Driver aborted offloaded SAE.
    ExternalAuthAbort,
    /// A timer armed earlier fired.
    Timeout(TimerId),
    /// Interface came up.
    InterfaceEnabled,
    /// Interface went down.
    InterfaceDisabled,
}

/// Parameters for an association request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociateParams {
    /// Target BSSID, if pinned.
    pub bssid: Option<MacAddr>,
    /// SSID.
    pub ssid: Vec<u8>,
    /// Channel center frequency in MHz.
    pub freq: Option<u32>,
    /// Security and capability elements to append.
    pub ies: Vec<u8>,
    /// Selected AKM.
    pub akm: Akm,
    /// Selected pairwise cipher.
    pub pairwise: Cipher,
    /// Selected group cipher.
    pub group: Cipher,
    /// Selected group management cipher.
    pub group_mgmt: Option<Cipher>,
    /// MFP required.
    pub mfp_required: bool,
    /// The driver runs SAE through external authentication.
    pub external_auth: bool,
}

/// Requests from the engine to its collaborators.
#[derive(Debug, Clone)]
pub enum Action {
    /// Transmit an authentication frame.
    SendAuthFrame {
        /// Destination.
        bssid: MacAddr,
        /// Transaction sequence number.
        transaction: u16,
        /// Status code.
        status: u16,
        /// Body.
        payload: Vec<u8>,
        /// Frame belongs to an offloaded exchange.
        external: bool,
    },
    /// Report the result of an offloaded SAE exchange.
    ExternalAuthStatus {
        /// Peer.
        bssid: MacAddr,
        /// Status code.
        status: u16,
        /// PMKID on success.
        pmkid: Option<Pmkid>,
    },
    /// Start association.
    Associate(AssociateParams),
    /// Deauthenticate.
    Deauthenticate {
        /// Peer.
        bssid: MacAddr,
        /// Reason code.
        reason: u16,
    },
    /// Hand the PMK to the handshake engine.
    InstallPmk {
        /// PMK.
        pmk: Pmk,
        /// PMKID, when known.
        pmkid: Option<Pmkid>,
        /// Authenticator.
        bssid: MacAddr,
    },
    /// Pass an EAPOL frame to the handshake engine.
    DeliverEapol {
        /// Sender.
        src: MacAddr,
        /// Frame.
        frame: Vec<u8>,
    },
    /// The active profile changed.
    ConfigChanged {
        /// New active profile, if any.
        profile: Option<ProfileId>,
    },
    /// Persist a profile.
    StoreProfile(Box<NetworkProfile>),
    /// Scan after `delay`.
    RequestScan {
        /// Delay before scanning.
        delay: Duration,
    },
    /// Arm (or re-arm) a timer.
    SetTimer {
        /// Timer.
        timer: TimerId,
        /// Fire after.
        after: Duration,
    },
    /// Disarm a timer.
    CancelTimer(TimerId),
}
