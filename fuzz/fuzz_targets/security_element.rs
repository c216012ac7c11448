#![no_main]

use libfuzzer_sys::fuzz_target;
use wpas_core::{ie, negotiate, rsn::SecurityElement, BssRecord, MacAddr, NetworkProfile, SupplicantConfig};

fuzz_target!(|data: &[u8]| {
    // Raw element bodies
    if let Ok(element) = SecurityElement::parse_rsn(data) {
        let _ = element.serialize();
    }
    let _ = SecurityElement::parse_wpa(data);
    let _ = SecurityElement::parse_osen(data);
    let _ = ie::parse_rsnxe(data);
    for element in ie::elements(data).flatten() {
        let _ = element.vendor_body([0x50, 0x6f, 0x9a], ie::OSEN_VENDOR_TYPE);
    }

    // Beacon/probe response elements straight from the air
    let bss = BssRecord {
        bssid: MacAddr([0x02, 0, 0, 0, 0, 1]),
        ssid: b"fuzz".to_vec(),
        freq: 2412,
        signal: -50,
        ies: data.to_vec(),
    };
    let _ = bss.rsn();
    let _ = bss.wpa();
    let _ = bss.osen();
    let _ = bss.rsnxe_capabilities();
    let config = SupplicantConfig::default();
    let _ = negotiate(&NetworkProfile::sae(1, "fuzz", "password"), Some(&bss), &config);
    let _ = negotiate(&NetworkProfile::new(2, "fuzz"), Some(&bss), &config);
});
