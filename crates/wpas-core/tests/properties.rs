//! Property tests for the SAE engine, suite negotiation and retry policy.

mod common;

use common::{AP, PASSWORD, SSID, STA};
use proptest::prelude::*;
use std::time::Instant;
use wpas_core::{
    blacklist::{disable_duration, reconnect_delay},
    negotiate,
    sae::{
        CommitMessage, ConfirmMessage, DiscardReason, SaeFrame, SaeOutcome, SaeParams, SaeSession,
        SaeState, StatusCode, TRANSACTION_COMMIT, TRANSACTION_CONFIRM,
    },
    Akm, BssRecord, Cipher, DriverEvent, Error, MacAddr, NetworkProfile, SaeMode, Supplicant,
    SupplicantConfig,
};
use zeroize::Zeroizing;

fn session(own: MacAddr, peer: MacAddr, groups: Vec<u16>) -> SaeSession {
    SaeSession::new(SaeParams {
        own_addr: own,
        peer_addr: peer,
        ssid: SSID.to_vec(),
        password: Zeroizing::new(PASSWORD.as_bytes().to_vec()),
        mode: SaeMode {
            h2e: false,
            pk: false,
            groups,
            password_id: None,
        },
        pt: Vec::new(),
        pk_key: None,
        max_retransmits: 3,
    })
    .unwrap()
}

fn sent(outcome: SaeOutcome) -> SaeFrame {
    match outcome {
        SaeOutcome::Send(frame) => frame,
        other => panic!("expected a frame, got {other:?}"),
    }
}

/// Station commit plus the AP commit and confirm that answer it.
struct Exchange {
    sta: SaeSession,
    sta_commit: SaeFrame,
    ap_commit: SaeFrame,
    ap_confirm: SaeFrame,
}

fn exchange() -> Exchange {
    let mut sta = session(STA, AP, vec![19]);
    let mut ap = session(AP, STA, vec![19]);
    let sta_commit = sta.start().unwrap();
    let ap_commit = ap.start().unwrap();
    let ap_confirm = sent(
        ap.handle_frame(TRANSACTION_COMMIT, sta_commit.status, &sta_commit.payload)
            .unwrap(),
    );
    Exchange {
        sta,
        sta_commit,
        ap_commit,
        ap_confirm,
    }
}

// ============================================================================
// SAE state properties
// ============================================================================

#[derive(Debug, Clone)]
enum Inbound {
    ApCommit,
    ApConfirm,
    Reflected,
    Garbage(u16, Vec<u8>),
}

fn inbound() -> impl Strategy<Value = Inbound> {
    prop_oneof![
        Just(Inbound::ApCommit),
        Just(Inbound::ApConfirm),
        Just(Inbound::Reflected),
        (1u16..=2, proptest::collection::vec(any::<u8>(), 0..120))
            .prop_map(|(t, bytes)| Inbound::Garbage(t, bytes)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_sae_state_never_regresses(script in proptest::collection::vec(inbound(), 1..8)) {
        let mut ex = exchange();
        let mut last = ex.sta.state();
        let mut accepted = 0;
        for step in script {
            let (transaction, status, payload) = match &step {
                Inbound::ApCommit => (TRANSACTION_COMMIT, ex.ap_commit.status, ex.ap_commit.payload.clone()),
                Inbound::ApConfirm => (TRANSACTION_CONFIRM, ex.ap_confirm.status, ex.ap_confirm.payload.clone()),
                Inbound::Reflected => (TRANSACTION_COMMIT, ex.sta_commit.status, ex.sta_commit.payload.clone()),
                Inbound::Garbage(t, bytes) => (*t, 0, bytes.clone()),
            };
            match ex.sta.handle_frame(transaction, status, &payload) {
                Ok(SaeOutcome::Accepted(_)) => accepted += 1,
                Ok(_) => {}
                // Any error ends the attempt.
                Err(_) => break,
            }
            let now = ex.sta.state();
            prop_assert!(now >= last, "{:?} regressed to {:?}", last, now);
            last = now;
        }
        prop_assert!(accepted <= 1, "a duplicate confirm must not yield a second PMK");
    }

    #[test]
    fn prop_commit_parser_total(bytes in proptest::collection::vec(any::<u8>(), 0..300), h2e in any::<bool>()) {
        let _ = CommitMessage::parse(&bytes, h2e);
        let _ = ConfirmMessage::parse(&bytes);
    }

    #[test]
    fn prop_element_parsers_total(bytes in proptest::collection::vec(any::<u8>(), 0..200)) {
        let bss = BssRecord {
            bssid: AP,
            ssid: SSID.to_vec(),
            freq: 2412,
            signal: -50,
            ies: bytes,
        };
        let _ = bss.rsn();
        let _ = bss.wpa();
        let _ = bss.osen();
        let _ = bss.rsnxe_capabilities();
        let _ = negotiate(&NetworkProfile::sae(1, SSID, PASSWORD), Some(&bss), &SupplicantConfig::default());
    }
}

#[test]
fn test_reflected_commit_is_discarded() {
    let mut ex = exchange();
    let outcome = ex
        .sta
        .handle_frame(TRANSACTION_COMMIT, ex.sta_commit.status, &ex.sta_commit.payload)
        .unwrap();
    assert_eq!(outcome, SaeOutcome::Discarded(DiscardReason::Reflection));
    assert_eq!(ex.sta.state(), SaeState::Committed);

    // The genuine peer commit still completes the exchange.
    let confirm = sent(
        ex.sta
            .handle_frame(TRANSACTION_COMMIT, ex.ap_commit.status, &ex.ap_commit.payload)
            .unwrap(),
    );
    assert_eq!(confirm.transaction, TRANSACTION_CONFIRM);
}

#[test]
fn test_duplicate_confirm_after_accept() {
    let mut ex = exchange();
    ex.sta
        .handle_frame(TRANSACTION_COMMIT, ex.ap_commit.status, &ex.ap_commit.payload)
        .unwrap();
    let first = ex
        .sta
        .handle_frame(TRANSACTION_CONFIRM, ex.ap_confirm.status, &ex.ap_confirm.payload)
        .unwrap();
    assert!(matches!(first, SaeOutcome::Accepted(_)));
    let second = ex
        .sta
        .handle_frame(TRANSACTION_CONFIRM, ex.ap_confirm.status, &ex.ap_confirm.payload)
        .unwrap();
    assert_eq!(second, SaeOutcome::Discarded(DiscardReason::DuplicateConfirm));
    assert_eq!(ex.sta.state(), SaeState::Accepted);
}

#[test]
fn test_rejected_group_cannot_be_reproposed() {
    let mut sta = session(STA, AP, vec![19, 20]);
    sta.start().unwrap();
    let retry = sent(
        sta.handle_frame(
            TRANSACTION_COMMIT,
            StatusCode::FiniteCyclicGroupNotSupported.to_u16(),
            &19u16.to_le_bytes(),
        )
        .unwrap(),
    );
    assert_eq!(&retry.payload[..2], &20u16.to_le_bytes());
    assert_eq!(sta.rejected_groups(), &[19]);

    // A perfectly valid commit in group 19 is now a downgrade.
    let mut peer = session(AP, STA, vec![19]);
    let peer_commit = peer.start().unwrap();
    let err = sta
        .handle_frame(TRANSACTION_COMMIT, peer_commit.status, &peer_commit.payload)
        .unwrap_err();
    assert!(matches!(err, Error::Downgrade(19)));
}

// ============================================================================
// Secret lifetime
// ============================================================================

#[test]
fn test_secrets_wiped_on_every_session_end() {
    // Accepted.
    let mut ex = exchange();
    ex.sta
        .handle_frame(TRANSACTION_COMMIT, ex.ap_commit.status, &ex.ap_commit.payload)
        .unwrap();
    ex.sta
        .handle_frame(TRANSACTION_CONFIRM, ex.ap_confirm.status, &ex.ap_confirm.payload)
        .unwrap();
    assert!(!ex.sta.holds_secret_material());

    // Explicit wipe mid-exchange.
    let mut ex = exchange();
    assert!(ex.sta.holds_secret_material());
    ex.sta.zeroize();
    assert!(!ex.sta.holds_secret_material());
    assert!(ex.sta.restart().is_err(), "a wiped session cannot be reused");
}

#[test]
fn test_supplicant_drops_session_on_bssid_change() {
    let now = Instant::now();
    let other = MacAddr([0x02, 0, 0, 0, 0, 0x33]);
    let ies = hex::decode(common::RSN_SAE).unwrap();
    let bss = |bssid| BssRecord {
        bssid,
        ssid: SSID.to_vec(),
        freq: 2412,
        signal: -40,
        ies: ies.clone(),
    };
    let mut s = Supplicant::new(
        STA,
        SupplicantConfig::default(),
        vec![NetworkProfile::sae(1, SSID, PASSWORD)],
    );
    s.select_network(1).unwrap();
    s.handle_event(now, DriverEvent::ScanResults(vec![bss(AP)]));
    assert_eq!(s.sae_session().map(SaeSession::peer), Some(AP));

    s.handle_event(now, DriverEvent::Timeout(wpas_core::TimerId::AuthTimeout));
    s.handle_event(now, DriverEvent::ScanResults(vec![bss(other)]));
    assert_eq!(s.sae_session().map(SaeSession::peer), Some(other));
    assert_eq!(s.sae_session().unwrap().state(), SaeState::Committed);
}

// ============================================================================
// Negotiation and retry policy
// ============================================================================

fn rsn_element(pairwise: &[u8], akms: &[u8], caps: u16) -> Vec<u8> {
    let mut body = vec![0x01, 0x00, 0x00, 0x0f, 0xac, 0x04];
    body.extend_from_slice(&(pairwise.len() as u16).to_le_bytes());
    for p in pairwise {
        body.extend_from_slice(&[0x00, 0x0f, 0xac, *p]);
    }
    body.extend_from_slice(&(akms.len() as u16).to_le_bytes());
    for a in akms {
        body.extend_from_slice(&[0x00, 0x0f, 0xac, *a]);
    }
    body.extend_from_slice(&caps.to_le_bytes());
    let mut ie = vec![48, body.len() as u8];
    ie.extend(body);
    ie
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_negotiation_is_deterministic(
        pairwise in proptest::collection::vec(prop_oneof![Just(2u8), Just(4), Just(8), Just(9)], 1..4),
        akms in proptest::collection::vec(1u8..=24, 1..5),
        caps in prop_oneof![Just(0u16), Just(0x80), Just(0xc0)],
        key_mgmt in any::<u32>(),
        cipher in any::<u32>(),
    ) {
        let mut profile = NetworkProfile::psk(1, SSID, "passphrase");
        profile.sae_password = Some(Zeroizing::new(PASSWORD.to_owned()));
        profile.key_mgmt = Akm::from_bits_truncate(key_mgmt);
        profile.pairwise = Cipher::from_bits_truncate(cipher) | Cipher::CCMP;
        let bss = BssRecord {
            bssid: AP,
            ssid: SSID.to_vec(),
            freq: 2412,
            signal: -50,
            ies: rsn_element(&pairwise, &akms, caps),
        };
        let config = SupplicantConfig::default();
        let first = negotiate(&profile, Some(&bss), &config);
        let second = negotiate(&profile, Some(&bss), &config);
        match (first, second) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(a), Err(b)) => prop_assert_eq!(a.to_string(), b.to_string()),
            (a, b) => prop_assert!(false, "diverged: {:?} vs {:?}", a, b),
        }
    }

    #[test]
    fn prop_backoff_is_monotonic(n in 1u32..10_000) {
        prop_assert!(reconnect_delay(n) <= reconnect_delay(n + 1));
        prop_assert!(disable_duration(n) <= disable_duration(n + 1));
    }
}
