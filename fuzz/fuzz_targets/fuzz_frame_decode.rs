//! Fuzz target: inbound frame decoder and command interpreter
//!
//! Drives arbitrary byte sequences through `frame::decode`, the typed
//! command extraction, and the telemetry decoder, and verifies:
//! - No panics under any byte sequence
//! - Accepted frames never carry more than `MAX_PAYLOAD` bytes
//! - A decoded SET_SERVO always carries exactly two payload bytes
//!
//! cargo fuzz run fuzz_frame_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use servolink::proto::frame::{self, Command, TelemetryFrame};

fuzz_target!(|data: &[u8]| {
    if let Ok(f) = frame::decode(data) {
        assert!(f.payload.len() <= frame::MAX_PAYLOAD);
        if let Ok(Command::SetServo { .. }) = f.command() {
            assert_eq!(f.payload.len(), 2);
        }
    }
    let _ = TelemetryFrame::decode(data);
});
