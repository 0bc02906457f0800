//! Integration tests: frame decode → CommandService → safety FSM → actuator.
//!
//! Everything runs against mock ports; timing is injected, so the full
//! deadman contract is exercised deterministically.

use servolink::app::events::AppEvent;
use servolink::app::ports::{ActuatorPort, BatteryPort, EventSink, TelemetrySink};
use servolink::app::service::{CommandService, TelemetryError};
use servolink::config::SystemConfig;
use servolink::error::{ActuatorError, ErrorCode};
use servolink::proto::channels::LinkEvent;
use servolink::proto::frame::{self, msg_type, CommandFrame, TelemetryFrame};
use servolink::safety::SafetyState;

// ── Mock implementations ──────────────────────────────────────

struct MockServo {
    /// Every (channel, pulse_us) the service commanded.
    calls: Vec<(u8, u16)>,
    fail_next: bool,
}

impl MockServo {
    fn new() -> Self {
        Self {
            calls: Vec::new(),
            fail_next: false,
        }
    }

    fn zero_calls(&self) -> usize {
        self.calls.iter().filter(|(_, p)| *p == 0).count()
    }
}

impl ActuatorPort for MockServo {
    fn set_pulse_us(&mut self, channel: u8, pulse_us: u16) -> Result<(), ActuatorError> {
        if self.fail_next {
            self.fail_next = false;
            return Err(ActuatorError::PwmWriteFailed);
        }
        self.calls.push((channel, pulse_us));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(*event);
    }
}

#[derive(Default)]
struct MockNotifier {
    frames: Vec<Vec<u8>>,
    fail: bool,
}

impl TelemetrySink for MockNotifier {
    type Error = &'static str;

    fn notify(&mut self, frame: &[u8]) -> Result<(), &'static str> {
        if self.fail {
            return Err("congested");
        }
        self.frames.push(frame.to_vec());
        Ok(())
    }
}

struct FixedBattery(u16);

impl BatteryPort for FixedBattery {
    fn read_mv(&mut self) -> u16 {
        self.0
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn raw_frame(msg: u8, payload: &[u8]) -> CommandFrame {
    let mut buf = vec![0x01, msg, payload.len() as u8, 0x00];
    buf.extend_from_slice(payload);
    frame::decode(&buf).expect("test frame must decode")
}

fn set_servo(pulse_us: u16) -> CommandFrame {
    raw_frame(msg_type::SET_SERVO, &pulse_us.to_le_bytes())
}

struct Rig {
    svc: CommandService,
    hw: MockServo,
    sink: RecordingSink,
}

impl Rig {
    fn new() -> Self {
        Self {
            svc: CommandService::new(SystemConfig::default()),
            hw: MockServo::new(),
            sink: RecordingSink::default(),
        }
    }

    fn send(&mut self, frame: &CommandFrame, now_ms: u64) {
        self.svc
            .handle_frame(frame, &mut self.hw, &mut self.sink, now_ms);
    }

    fn link(&mut self, event: LinkEvent) {
        self.svc.handle_link_event(event, &mut self.hw, &mut self.sink);
    }

    fn tick(&mut self, now_ms: u64) {
        self.svc.watchdog_tick(&mut self.hw, &mut self.sink, now_ms);
    }
}

// ── Arm / disarm ──────────────────────────────────────────────

#[test]
fn arm_from_disarmed() {
    let mut rig = Rig::new();
    rig.send(&raw_frame(msg_type::ARM, &[]), 100);

    assert_eq!(rig.svc.state(), SafetyState::Armed);
    assert_eq!(rig.svc.error_code(), ErrorCode::None);
    assert_eq!(rig.svc.build_telemetry(150, 0).last_cmd_age_ms, 50);
    assert!(rig.sink.events.contains(&AppEvent::StateChanged {
        from: SafetyState::Disarmed,
        to: SafetyState::Armed,
    }));
}

#[test]
fn arm_while_armed_is_a_noop() {
    let mut rig = Rig::new();
    rig.send(&raw_frame(msg_type::ARM, &[]), 100);
    let events_before = rig.sink.events.len();

    rig.send(&raw_frame(msg_type::ARM, &[]), 500);

    assert_eq!(rig.svc.state(), SafetyState::Armed);
    // Timestamp untouched: age still counts from the first ARM.
    assert_eq!(rig.svc.build_telemetry(600, 0).last_cmd_age_ms, 500);
    assert_eq!(rig.sink.events.len(), events_before);
}

#[test]
fn arm_recovers_from_fault() {
    let mut rig = Rig::new();
    rig.send(&raw_frame(msg_type::ARM, &[]), 0);
    rig.tick(1_000); // deadman → FAULT

    rig.send(&raw_frame(msg_type::ARM, &[]), 2_000);
    assert_eq!(rig.svc.state(), SafetyState::Armed);
    assert_eq!(rig.svc.error_code(), ErrorCode::None);
}

#[test]
fn disarm_forces_neutral_exactly_once_from_any_state() {
    for arm_first in [false, true] {
        let mut rig = Rig::new();
        if arm_first {
            rig.send(&raw_frame(msg_type::ARM, &[]), 0);
        }
        rig.send(&raw_frame(msg_type::DISARM, &[]), 10);

        assert_eq!(rig.svc.state(), SafetyState::Disarmed);
        assert_eq!(rig.svc.error_code(), ErrorCode::None);
        assert_eq!(rig.svc.build_telemetry(10_000, 0).last_cmd_age_ms, 0);
        assert_eq!(rig.hw.zero_calls(), 1, "armed_first={arm_first}");
    }
}

// ── SET_SERVO ─────────────────────────────────────────────────

#[test]
fn set_servo_passes_in_range_values_through() {
    let mut rig = Rig::new();
    rig.send(&raw_frame(msg_type::ARM, &[]), 0);
    rig.send(&set_servo(1500), 50);

    assert_eq!(rig.hw.calls, vec![(0, 1500)]);
}

#[test]
fn set_servo_clamps_out_of_range_values() {
    let mut rig = Rig::new();
    rig.send(&raw_frame(msg_type::ARM, &[]), 0);

    rig.send(&set_servo(100), 10);
    rig.send(&set_servo(65_000), 20);

    assert_eq!(rig.hw.calls, vec![(0, 500), (0, 2500)]);
}

#[test]
fn set_servo_refreshes_the_deadman() {
    let mut rig = Rig::new();
    rig.send(&raw_frame(msg_type::ARM, &[]), 0);
    rig.send(&set_servo(1500), 150);

    // Age counts from the servo command, not from ARM.
    assert_eq!(rig.svc.build_telemetry(200, 0).last_cmd_age_ms, 50);
}

#[test]
fn set_servo_ignored_unless_armed() {
    let mut rig = Rig::new();

    // Disarmed.
    rig.send(&set_servo(1500), 10);
    assert!(rig.hw.calls.is_empty());

    // Fault.
    rig.send(&raw_frame(msg_type::ARM, &[]), 20);
    rig.tick(1_000);
    let calls_after_fault = rig.hw.calls.len();
    rig.send(&set_servo(1500), 1_100);
    assert_eq!(rig.hw.calls.len(), calls_after_fault);
}

#[test]
fn set_servo_driver_failure_annotates_without_disarming() {
    let mut rig = Rig::new();
    rig.send(&raw_frame(msg_type::ARM, &[]), 0);

    rig.hw.fail_next = true;
    rig.send(&set_servo(1500), 50);

    // Fault annotation only: the state machine stays armed.
    assert_eq!(rig.svc.state(), SafetyState::Armed);
    assert_eq!(rig.svc.error_code(), ErrorCode::ActuatorFault);
    assert!(rig
        .sink
        .events
        .contains(&AppEvent::ErrorRaised(ErrorCode::ActuatorFault)));
}

#[test]
fn set_servo_bad_payload_length_is_dropped() {
    let mut rig = Rig::new();
    rig.send(&raw_frame(msg_type::ARM, &[]), 0);
    let age_probe = rig.svc.build_telemetry(100, 0).last_cmd_age_ms;

    rig.send(&raw_frame(msg_type::SET_SERVO, &[0xdc]), 60);

    assert!(rig.hw.calls.is_empty());
    assert_eq!(rig.svc.error_code(), ErrorCode::None);
    // Timestamp not refreshed by the malformed command.
    assert_eq!(rig.svc.build_telemetry(100, 0).last_cmd_age_ms, age_probe);
}

// ── PING / unknown ────────────────────────────────────────────

#[test]
fn ping_refreshes_only_while_armed() {
    let mut rig = Rig::new();

    rig.send(&raw_frame(msg_type::PING, &[]), 100);
    assert_eq!(rig.svc.state(), SafetyState::Disarmed);
    assert_eq!(rig.svc.build_telemetry(200, 0).last_cmd_age_ms, 0);

    rig.send(&raw_frame(msg_type::ARM, &[]), 1_000);
    rig.send(&raw_frame(msg_type::PING, &[]), 1_150);
    assert_eq!(rig.svc.build_telemetry(1_200, 0).last_cmd_age_ms, 50);
}

#[test]
fn unknown_msg_type_sets_invalid_command() {
    let mut rig = Rig::new();
    rig.send(&raw_frame(0x7e, &[]), 10);

    assert_eq!(rig.svc.state(), SafetyState::Disarmed);
    assert_eq!(rig.svc.error_code(), ErrorCode::InvalidCommand);
    assert!(rig.hw.calls.is_empty());
}

// ── Deadman watchdog ──────────────────────────────────────────

#[test]
fn deadman_boundary_at_exactly_the_timeout() {
    let mut rig = Rig::new();
    rig.send(&raw_frame(msg_type::ARM, &[]), 1_000);

    rig.tick(1_199);
    assert_eq!(rig.svc.state(), SafetyState::Armed);
    assert!(rig.hw.calls.is_empty());

    rig.tick(1_200);
    assert_eq!(rig.svc.state(), SafetyState::Fault);
    assert_eq!(rig.svc.error_code(), ErrorCode::DeadmanTimeout);
    assert_eq!(rig.hw.calls, vec![(0, 0)]);
    assert!(rig
        .sink
        .events
        .contains(&AppEvent::DeadmanTripped { age_ms: 200 }));
}

#[test]
fn deadman_is_idempotent_once_latched() {
    let mut rig = Rig::new();
    rig.send(&raw_frame(msg_type::ARM, &[]), 0);
    rig.tick(500);

    let calls = rig.hw.calls.len();
    let events = rig.sink.events.len();
    rig.tick(600);
    rig.tick(10_000);

    assert_eq!(rig.hw.calls.len(), calls);
    assert_eq!(rig.sink.events.len(), events);
}

#[test]
fn deadman_held_off_by_a_command_stream() {
    let mut rig = Rig::new();
    rig.send(&raw_frame(msg_type::ARM, &[]), 0);
    for t in (100..=1_000).step_by(100) {
        rig.send(&raw_frame(msg_type::PING, &[]), t);
        rig.tick(t + 50);
    }
    assert_eq!(rig.svc.state(), SafetyState::Armed);
}

// ── Connection lifecycle ──────────────────────────────────────

#[test]
fn disconnect_while_armed_faults_and_stops_output() {
    let mut rig = Rig::new();
    rig.link(LinkEvent::Connected);
    rig.link(LinkEvent::NotifyEnabled(true));
    rig.send(&raw_frame(msg_type::ARM, &[]), 0);

    rig.link(LinkEvent::Disconnected);

    assert_eq!(rig.svc.state(), SafetyState::Fault);
    assert_eq!(rig.svc.error_code(), ErrorCode::None);
    assert!(!rig.svc.notifications_enabled());
    assert_eq!(rig.hw.zero_calls(), 1);
}

#[test]
fn fresh_connection_starts_disarmed() {
    let mut rig = Rig::new();
    rig.link(LinkEvent::Connected);
    rig.send(&raw_frame(msg_type::ARM, &[]), 0);
    rig.link(LinkEvent::Disconnected);

    rig.link(LinkEvent::Connected);
    assert_eq!(rig.svc.state(), SafetyState::Disarmed);
    assert_eq!(rig.svc.error_code(), ErrorCode::None);
    assert_eq!(rig.svc.build_telemetry(99_999, 0).last_cmd_age_ms, 0);
}

// ── Telemetry ─────────────────────────────────────────────────

#[test]
fn telemetry_requires_peer_and_notifications() {
    let mut rig = Rig::new();
    let mut notifier = MockNotifier::default();
    let mut battery = FixedBattery(7400);

    assert_eq!(
        rig.svc.send_telemetry(&mut notifier, &mut battery, 0),
        Err(TelemetryError::NotConnected)
    );

    rig.link(LinkEvent::Connected);
    assert_eq!(
        rig.svc.send_telemetry(&mut notifier, &mut battery, 0),
        Err(TelemetryError::NotConnected)
    );

    rig.link(LinkEvent::NotifyEnabled(true));
    assert_eq!(
        rig.svc.send_telemetry(&mut notifier, &mut battery, 0),
        Ok(())
    );
    assert_eq!(notifier.frames.len(), 1);
}

#[test]
fn telemetry_frame_carries_current_status() {
    let mut rig = Rig::new();
    let mut notifier = MockNotifier::default();
    let mut battery = FixedBattery(7400);

    rig.link(LinkEvent::Connected);
    rig.link(LinkEvent::NotifyEnabled(true));
    rig.send(&raw_frame(msg_type::ARM, &[]), 1_000);

    rig.svc
        .send_telemetry(&mut notifier, &mut battery, 1_500)
        .unwrap();

    let t = TelemetryFrame::decode(&notifier.frames[0]).unwrap();
    assert_eq!(t.state, SafetyState::Armed.code());
    assert_eq!(t.error_code, ErrorCode::None.code());
    assert_eq!(t.last_cmd_age_ms, 500);
    assert_eq!(t.battery_mv, 7400);
}

#[test]
fn telemetry_age_saturates() {
    let mut rig = Rig::new();
    rig.send(&raw_frame(msg_type::ARM, &[]), 0);
    assert_eq!(
        rig.svc.build_telemetry(1_000_000, 0).last_cmd_age_ms,
        u16::MAX
    );
}

#[test]
fn telemetry_transport_failure_is_reported_not_retried() {
    let mut rig = Rig::new();
    let mut notifier = MockNotifier {
        fail: true,
        ..Default::default()
    };
    let mut battery = FixedBattery(7400);

    rig.link(LinkEvent::Connected);
    rig.link(LinkEvent::NotifyEnabled(true));

    assert_eq!(
        rig.svc.send_telemetry(&mut notifier, &mut battery, 0),
        Err(TelemetryError::TransportFailed)
    );
    assert!(notifier.frames.is_empty());
}
