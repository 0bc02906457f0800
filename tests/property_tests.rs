//! Property tests over the protocol codec and the safety core.

#![cfg(not(target_os = "espidf"))]

use proptest::prelude::*;

use servolink::app::events::AppEvent;
use servolink::app::ports::{ActuatorPort, EventSink};
use servolink::app::service::CommandService;
use servolink::config::SystemConfig;
use servolink::error::ActuatorError;
use servolink::proto::frame::{self, msg_type, TelemetryFrame};

proptest! {
    #[test]
    fn clamp_stays_within_limits(pulse in any::<u16>()) {
        let cfg = SystemConfig::default();
        let clamped = cfg.clamp_pulse(pulse);
        prop_assert!(clamped >= cfg.pulse_min_us);
        prop_assert!(clamped <= cfg.pulse_max_us);
    }

    #[test]
    fn clamp_is_identity_in_range(pulse in 500u16..=2500) {
        prop_assert_eq!(SystemConfig::default().clamp_pulse(pulse), pulse);
    }

    /// The decoder must reject or accept, never panic, on any input.
    #[test]
    fn decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64)) {
        if let Ok(f) = frame::decode(&data) {
            let _ = f.command();
        }
    }

    /// A well-formed header always decodes into a frame that echoes the
    /// original type and payload.
    #[test]
    fn well_formed_frames_decode(
        msg in any::<u8>(),
        payload in proptest::collection::vec(any::<u8>(), 0..=frame::MAX_PAYLOAD),
    ) {
        let mut buf = vec![frame::PROTOCOL_VERSION, msg, payload.len() as u8, 0x00];
        buf.extend_from_slice(&payload);

        let f = frame::decode(&buf).unwrap();
        prop_assert_eq!(f.msg_type, msg);
        prop_assert_eq!(f.payload.as_slice(), payload.as_slice());
    }

    #[test]
    fn telemetry_roundtrips(
        state in 0u8..=2,
        error_code in prop_oneof![Just(0u8), Just(1), Just(2), Just(3), Just(4), Just(0xff)],
        last_cmd_age_ms in any::<u16>(),
        battery_mv in any::<u16>(),
    ) {
        let t = TelemetryFrame { state, error_code, last_cmd_age_ms, battery_mv };
        prop_assert_eq!(TelemetryFrame::decode(&t.encode()), Ok(t));
    }
}

// ── Dispatcher safety under arbitrary traffic ─────────────────

#[derive(Debug, Clone)]
enum Op {
    Frame(Vec<u8>),
    Tick(u16),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let payload = proptest::collection::vec(any::<u8>(), 0..=frame::MAX_PAYLOAD);
    let known = prop_oneof![
        Just(msg_type::ARM),
        Just(msg_type::DISARM),
        Just(msg_type::SET_SERVO),
        Just(msg_type::PING),
    ];
    // Bias toward well-formed traffic so the armed paths get exercised.
    let frame = (prop_oneof![3 => known, 1 => any::<u8>()], payload).prop_map(
        |(msg, payload)| {
            let mut buf = vec![frame::PROTOCOL_VERSION, msg, payload.len() as u8, 0x00];
            buf.extend_from_slice(&payload);
            Op::Frame(buf)
        },
    );
    prop_oneof![4 => frame, 1 => (0u16..400).prop_map(Op::Tick)]
}

struct PulseLog(Vec<u16>);

impl ActuatorPort for PulseLog {
    fn set_pulse_us(&mut self, _channel: u8, pulse_us: u16) -> Result<(), ActuatorError> {
        self.0.push(pulse_us);
        Ok(())
    }
}

struct DropSink;

impl EventSink for DropSink {
    fn emit(&mut self, _event: &AppEvent) {}
}

proptest! {
    /// No command sequence, valid or garbage, can drive the servo
    /// outside neutral or the configured pulse range.
    #[test]
    fn actuator_only_sees_safe_pulses(ops in proptest::collection::vec(op_strategy(), 0..40)) {
        let cfg = SystemConfig::default();
        let mut svc = CommandService::new(cfg);
        let mut hw = PulseLog(Vec::new());
        let mut now_ms = 1u64;

        for op in ops {
            match op {
                Op::Frame(buf) => {
                    if let Ok(f) = frame::decode(&buf) {
                        svc.handle_frame(&f, &mut hw, &mut DropSink, now_ms);
                    }
                    now_ms += 10;
                }
                Op::Tick(advance) => {
                    now_ms += u64::from(advance);
                    svc.watchdog_tick(&mut hw, &mut DropSink, now_ms);
                }
            }
        }

        for pulse in hw.0 {
            prop_assert!(
                pulse == 0 || (cfg.pulse_min_us..=cfg.pulse_max_us).contains(&pulse),
                "unsafe pulse {pulse}"
            );
        }
    }
}
