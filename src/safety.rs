//! Safety state machine.
//!
//! Holds the arm/disarm/fault state, the wire error annotation, and the
//! timestamp of the last accepted command.  Transitions:
//!
//! ```text
//!              ARM                    deadman / disconnect
//!  DISARMED ─────────▶ ARMED ───────────────────────────▶ FAULT
//!     ▲                  │                                  │
//!     │      DISARM      │            ARM                   │
//!     └──────────────────┴◀─────────────────────────────────┘
//! ```
//!
//! The controller is pure state: it never touches hardware and takes
//! monotonic time as an explicit `now_ms` argument, so every transition
//! is deterministic under test.  Forcing the servo to neutral output on
//! the transitions that require it is the dispatcher's job.
//!
//! There is exactly one instance, owned by the control-loop task via
//! [`CommandService`](crate::app::service::CommandService); other
//! execution contexts reach it only through the mailbox and event
//! channel in [`proto::channels`](crate::proto::channels).

use log::{info, warn};

use crate::error::ErrorCode;

/// Arm/disarm/fault state, one byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyState {
    /// Initial and safe: servo commands are ignored.
    Disarmed = 0x00,
    /// Servo commands are accepted; the deadman watchdog is live.
    Armed = 0x01,
    /// Latched unsafe condition; only ARM or DISARM leave this state.
    Fault = 0x02,
}

impl SafetyState {
    /// Wire representation (telemetry `state` byte).
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn from_code(raw: u8) -> Option<Self> {
        match raw {
            0x00 => Some(Self::Disarmed),
            0x01 => Some(Self::Armed),
            0x02 => Some(Self::Fault),
            _ => None,
        }
    }
}

/// The single process-wide safety record.
pub struct SafetyController {
    state: SafetyState,
    error: ErrorCode,
    /// Monotonic ms of the last accepted command while armed.
    last_cmd_ms: Option<u64>,
}

impl Default for SafetyController {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyController {
    pub fn new() -> Self {
        Self {
            state: SafetyState::Disarmed,
            error: ErrorCode::None,
            last_cmd_ms: None,
        }
    }

    pub fn state(&self) -> SafetyState {
        self.state
    }

    pub fn error_code(&self) -> ErrorCode {
        self.error
    }

    // ── Transitions ───────────────────────────────────────────

    /// ARM: legal from Disarmed or Fault.  Clears the error annotation
    /// and records a fresh command timestamp.  Returns `true` if the
    /// state actually changed; an ARM while already armed is a no-op
    /// that leaves the timestamp untouched.
    pub fn arm(&mut self, now_ms: u64) -> bool {
        match self.state {
            SafetyState::Disarmed | SafetyState::Fault => {
                self.state = SafetyState::Armed;
                self.error = ErrorCode::None;
                self.last_cmd_ms = Some(now_ms);
                info!("safety: ARMED");
                true
            }
            SafetyState::Armed => false,
        }
    }

    /// DISARM: legal from any state.  Clears error and timestamp.
    /// The caller forces the servo to neutral output exactly once.
    pub fn disarm(&mut self) {
        self.state = SafetyState::Disarmed;
        self.error = ErrorCode::None;
        self.last_cmd_ms = None;
        info!("safety: DISARMED");
    }

    /// Refresh the last-command timestamp.  Only meaningful while armed;
    /// accepted but inert otherwise.
    pub fn record_command(&mut self, now_ms: u64) {
        if self.state == SafetyState::Armed {
            self.last_cmd_ms = Some(now_ms);
        }
    }

    /// Annotate an error without changing state (driver failures,
    /// unrecognised commands).
    pub fn set_error(&mut self, code: ErrorCode) {
        warn!("safety: error annotated: {code}");
        self.error = code;
    }

    /// Latch a fault with the given code.
    pub fn fault(&mut self, code: ErrorCode) {
        warn!("safety: FAULT ({code})");
        self.state = SafetyState::Fault;
        self.error = code;
    }

    /// A fresh session always starts safe.
    pub fn on_connected(&mut self) {
        self.state = SafetyState::Disarmed;
        self.error = ErrorCode::None;
        self.last_cmd_ms = None;
        info!("safety: link up, reset to DISARMED");
    }

    /// Losing the peer is latched as a fault.  The error byte stays
    /// clear: the condition is the lost link itself, not a protocol or
    /// hardware error, and it heals on reconnect.
    pub fn on_disconnected(&mut self) {
        self.state = SafetyState::Fault;
        self.error = ErrorCode::None;
        warn!("safety: link lost, FAULT");
    }

    // ── Queries ───────────────────────────────────────────────

    /// Milliseconds since the last accepted command, saturated to the
    /// 16-bit telemetry field.  Reports 0 unless armed with a recorded
    /// timestamp — outside ARMED the age is not meaningful.
    pub fn last_cmd_age_ms(&self, now_ms: u64) -> u16 {
        match (self.state, self.last_cmd_ms) {
            (SafetyState::Armed, Some(last)) => {
                let age = now_ms.saturating_sub(last);
                u16::try_from(age).unwrap_or(u16::MAX)
            }
            _ => 0,
        }
    }

    /// Whether the deadman window has elapsed.  Only ever true while
    /// armed, so repeated checks after the fault latches are no-ops.
    pub fn deadman_expired(&self, now_ms: u64, timeout_ms: u16) -> bool {
        self.state == SafetyState::Armed && self.last_cmd_age_ms(now_ms) >= timeout_ms
    }
}
