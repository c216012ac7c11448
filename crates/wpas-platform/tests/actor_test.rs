//! Interface actor tests with mock collaborators and paused time.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use wpas_core::{BssRecord, DriverEvent, HandshakeStage, MacAddr, NetworkProfile, SupplicantConfig, WpaState};
use wpas_platform::mock::{MemoryCredentialStore, MockHandshakeEngine, MockRadioDriver, RadioCall};
use wpas_platform::{Error, InterfaceActor, InterfaceHandle};

const STA: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x10]);
const AP: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x01]);
// RSN: CCMP / CCMP / PSK.
const RSN_PSK: [u8; 22] = [
    0x30, 0x14, 0x01, 0x00, 0x00, 0x0f, 0xac, 0x04, 0x01, 0x00, 0x00, 0x0f, 0xac, 0x04, 0x01, 0x00,
    0x00, 0x0f, 0xac, 0x02, 0x00, 0x00,
];
// RSN: CCMP / CCMP / SAE, MFPC.
const RSN_SAE: [u8; 22] = [
    0x30, 0x14, 0x01, 0x00, 0x00, 0x0f, 0xac, 0x04, 0x01, 0x00, 0x00, 0x0f, 0xac, 0x04, 0x01, 0x00,
    0x00, 0x0f, 0xac, 0x08, 0x80, 0x00,
];

struct Fixture {
    handle: InterfaceHandle,
    radio: MockRadioDriver,
    store: MemoryCredentialStore,
    handshake: MockHandshakeEngine,
}

fn start(profile: NetworkProfile) -> Fixture {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let radio = MockRadioDriver::new();
    let store = MemoryCredentialStore::with_profiles(vec![profile]);
    let handshake = MockHandshakeEngine::new();
    let (handle, _task) = InterfaceActor::spawn(
        STA,
        SupplicantConfig::default(),
        Arc::new(radio.clone()),
        Arc::new(store.clone()),
        Arc::new(handshake.clone()),
    )
    .unwrap();
    Fixture {
        handle,
        radio,
        store,
        handshake,
    }
}

fn bss(ies: &[u8]) -> BssRecord {
    BssRecord {
        bssid: AP,
        ssid: b"home".to_vec(),
        freq: 5180,
        signal: -50,
        ies: ies.to_vec(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_psk_connection_end_to_end() {
    let f = start(NetworkProfile::psk(1, "home", "passphrase"));
    f.handle.select_network(1).await.unwrap();
    sleep(Duration::from_millis(1)).await;
    assert_eq!(f.radio.scans(), 1);
    assert_eq!(f.store.active_history(), vec![Some(1)]);

    f.handle.event(DriverEvent::ScanResults(vec![bss(&RSN_PSK)])).await.unwrap();
    f.handle
        .event(DriverEvent::AssocResult {
            bssid: AP,
            status: 0,
            ies: Vec::new(),
        })
        .await
        .unwrap();
    f.handle
        .event(DriverEvent::Eapol {
            src: AP,
            frame: vec![0x02, 0x03],
        })
        .await
        .unwrap();
    f.handle
        .event(DriverEvent::HandshakeProgress(HandshakeStage::PairwiseKeysInstalled))
        .await
        .unwrap();
    f.handle
        .event(DriverEvent::HandshakeProgress(HandshakeStage::GroupKeysInstalled))
        .await
        .unwrap();

    let status = f.handle.status().await.unwrap();
    assert_eq!(status.state, WpaState::Completed);
    assert_eq!(status.bssid, Some(AP));
    assert!(f.radio.calls().iter().any(|c| matches!(c, RadioCall::Associate(_))));
    assert_eq!(f.handshake.installed().len(), 1);
    assert_eq!(f.handshake.frames(), vec![(AP, vec![0x02, 0x03])]);

    // The auth timeout was cancelled on completion.
    sleep(Duration::from_secs(30)).await;
    assert_eq!(f.handle.status().await.unwrap().state, WpaState::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_association_rejection_schedules_scan() {
    let f = start(NetworkProfile::psk(1, "home", "passphrase"));
    f.handle.select_network(1).await.unwrap();
    f.handle.event(DriverEvent::ScanResults(vec![bss(&RSN_PSK)])).await.unwrap();
    f.handle
        .event(DriverEvent::AssocResult {
            bssid: AP,
            status: 17,
            ies: Vec::new(),
        })
        .await
        .unwrap();
    f.handle.status().await.unwrap();
    let scans = f.radio.scans();

    sleep(Duration::from_millis(50)).await;
    assert_eq!(f.radio.scans(), scans, "retry must wait for the back-off delay");
    sleep(Duration::from_millis(60)).await;
    assert_eq!(f.radio.scans(), scans + 1);
    assert_eq!(f.store.get(1).unwrap().auth_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_sae_retransmits_then_gives_up() {
    let f = start(NetworkProfile::sae(1, "home", "correcthorsebatterystaple"));
    f.handle.select_network(1).await.unwrap();
    f.handle.event(DriverEvent::ScanResults(vec![bss(&RSN_SAE)])).await.unwrap();
    f.handle.status().await.unwrap();
    assert_eq!(f.radio.auth_frames().len(), 1);
    // Freshly derived PT values were persisted.
    assert!(!f.store.get(1).unwrap().sae_pt.is_empty());

    sleep(Duration::from_millis(3500)).await;
    assert_eq!(f.radio.auth_frames().len(), 4, "initial commit plus three retransmissions");
    assert_eq!(f.handle.status().await.unwrap().state, WpaState::Authenticating);

    let scans = f.radio.scans();
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(f.radio.auth_frames().len(), 4);
    assert_eq!(f.radio.scans(), scans + 1);
    assert_eq!(f.handle.status().await.unwrap().state, WpaState::Scanning);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_and_shutdown() {
    let f = start(NetworkProfile::psk(1, "home", "passphrase"));
    assert!(matches!(
        f.handle.select_network(7).await,
        Err(Error::Core(wpas_core::Error::UnknownProfile(7)))
    ));

    f.handle.select_network(1).await.unwrap();
    f.handle.event(DriverEvent::ScanResults(vec![bss(&RSN_PSK)])).await.unwrap();
    f.handle.disconnect().await.unwrap();
    let status = f.handle.status().await.unwrap();
    assert_eq!(status.state, WpaState::Disconnected);
    assert!(f
        .radio
        .calls()
        .iter()
        .any(|c| matches!(c, RadioCall::Deauthenticate { bssid: AP, reason: 3 })));

    f.handle.shutdown().await.unwrap();
    sleep(Duration::from_millis(1)).await;
    assert!(matches!(f.handle.status().await, Err(Error::Closed)));
}
