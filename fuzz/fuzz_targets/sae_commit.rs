#![no_main]

use libfuzzer_sys::fuzz_target;
use wpas_core::sae::{AntiCloggingRequest, CommitMessage, ConfirmMessage};

fuzz_target!(|data: &[u8]| {
    // SAE authentication frame bodies must never panic on any input
    for h2e in [false, true] {
        if let Ok(msg) = CommitMessage::parse(data, h2e) {
            let _ = msg.serialize(h2e);
        }
        let _ = AntiCloggingRequest::parse(data, h2e);
    }
    let _ = ConfirmMessage::parse(data);
});
