//! Command service — the hexagonal core.
//!
//! [`CommandService`] owns the safety state machine and connection
//! flags, and implements the three spec'd activities against injected
//! ports:
//!
//! ```text
//!  CMD_SLOT ────▶ handle_frame ──────┐
//!  LINK_EVENTS ─▶ handle_link_event ─┼──▶ SafetyController ──▶ ActuatorPort
//!  timer tick ──▶ watchdog_tick ─────┘            │
//!                 send_telemetry ◀────────────────┘──▶ TelemetrySink
//! ```
//!
//! All methods take monotonic time as `now_ms`, so the full safety
//! contract runs deterministically under host tests with mock ports.

use core::fmt;

use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::error::ErrorCode;
use crate::proto::channels::LinkEvent;
use crate::proto::frame::{Command, CommandError, CommandFrame, TelemetryFrame};
use crate::safety::{SafetyController, SafetyState};

use super::events::AppEvent;
use super::ports::{ActuatorPort, BatteryPort, EventSink, TelemetrySink};

/// Why a telemetry send did not go out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    /// No central connected, or notifications not enabled by the peer.
    NotConnected,
    /// The transport rejected the notification. Not retried.
    TransportFailed,
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "no peer / notifications disabled"),
            Self::TransportFailed => write!(f, "transport notify failed"),
        }
    }
}

/// The application service orchestrates all domain logic.
pub struct CommandService {
    safety: SafetyController,
    config: SystemConfig,
    link_connected: bool,
    notify_enabled: bool,
}

impl CommandService {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            safety: SafetyController::new(),
            config,
            link_connected: false,
            notify_enabled: false,
        }
    }

    /// Announce the initial state (call once after construction).
    pub fn start(&self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started(self.safety.state()));
        info!("CommandService started in {:?}", self.safety.state());
    }

    // ── Command dispatch ──────────────────────────────────────

    /// Process one decoded frame from the command mailbox.
    pub fn handle_frame(
        &mut self,
        frame: &CommandFrame,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
        now_ms: u64,
    ) {
        match frame.command() {
            Ok(Command::Arm) => {
                let from = self.safety.state();
                if self.safety.arm(now_ms) {
                    sink.emit(&AppEvent::StateChanged {
                        from,
                        to: SafetyState::Armed,
                    });
                } else {
                    debug!("ARM ignored in {from:?}");
                }
            }
            Ok(Command::Disarm) => {
                let from = self.safety.state();
                self.force_neutral(hw);
                self.safety.disarm();
                if from != SafetyState::Disarmed {
                    sink.emit(&AppEvent::StateChanged {
                        from,
                        to: SafetyState::Disarmed,
                    });
                }
            }
            Ok(Command::SetServo { pulse_us }) => {
                if self.safety.state() != SafetyState::Armed {
                    debug!("SET_SERVO ignored, not armed");
                    return;
                }
                self.safety.record_command(now_ms);

                let clamped = self.config.clamp_pulse(pulse_us);
                if clamped != pulse_us {
                    warn!("pulse {pulse_us} µs clamped to {clamped} µs");
                }
                if let Err(e) = hw.set_pulse_us(self.config.servo_channel, clamped) {
                    warn!("servo write failed: {e}");
                    self.safety.set_error(ErrorCode::ActuatorFault);
                    sink.emit(&AppEvent::ErrorRaised(ErrorCode::ActuatorFault));
                }
            }
            Ok(Command::Ping) => {
                // Keeps the deadman fed while armed; inert otherwise.
                self.safety.record_command(now_ms);
            }
            Err(CommandError::UnknownType(t)) => {
                warn!("unknown command 0x{t:02x}");
                self.safety.set_error(ErrorCode::InvalidCommand);
                sink.emit(&AppEvent::ErrorRaised(ErrorCode::InvalidCommand));
            }
            Err(e @ CommandError::BadPayloadLen { .. }) => {
                // Known type, malformed body: dropped without touching
                // the actuator or the error annotation.
                warn!("{e}");
            }
        }
    }

    // ── Deadman watchdog ──────────────────────────────────────

    /// Periodic deadman check.  No-op unless armed; once the fault
    /// latches, further ticks are no-ops until re-arm.
    pub fn watchdog_tick(
        &mut self,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
        now_ms: u64,
    ) {
        if !self
            .safety
            .deadman_expired(now_ms, self.config.deadman_timeout_ms)
        {
            return;
        }

        let age_ms = self.safety.last_cmd_age_ms(now_ms);
        warn!(
            "deadman timeout: {age_ms} ms >= {} ms",
            self.config.deadman_timeout_ms
        );

        self.force_neutral(hw);
        self.safety.fault(ErrorCode::DeadmanTimeout);

        sink.emit(&AppEvent::DeadmanTripped { age_ms });
        sink.emit(&AppEvent::StateChanged {
            from: SafetyState::Armed,
            to: SafetyState::Fault,
        });
    }

    // ── Connection lifecycle ──────────────────────────────────

    /// Apply one transport lifecycle event.
    pub fn handle_link_event(
        &mut self,
        event: LinkEvent,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) {
        match event {
            LinkEvent::Connected => {
                self.link_connected = true;
                let from = self.safety.state();
                self.safety.on_connected();
                if from != SafetyState::Disarmed {
                    sink.emit(&AppEvent::StateChanged {
                        from,
                        to: SafetyState::Disarmed,
                    });
                }
            }
            LinkEvent::Disconnected => {
                self.link_connected = false;
                self.notify_enabled = false;
                let from = self.safety.state();
                if from == SafetyState::Armed {
                    self.force_neutral(hw);
                }
                self.safety.on_disconnected();
                if from != SafetyState::Fault {
                    sink.emit(&AppEvent::StateChanged {
                        from,
                        to: SafetyState::Fault,
                    });
                }
            }
            LinkEvent::NotifyEnabled(enabled) => {
                info!(
                    "telemetry notifications {}",
                    if enabled { "enabled" } else { "disabled" }
                );
                self.notify_enabled = enabled;
            }
        }
    }

    // ── Telemetry ─────────────────────────────────────────────

    /// Assemble a status report from the current safety record.
    pub fn build_telemetry(&self, now_ms: u64, battery_mv: u16) -> TelemetryFrame {
        TelemetryFrame {
            state: self.safety.state().code(),
            error_code: self.safety.error_code().code(),
            last_cmd_age_ms: self.safety.last_cmd_age_ms(now_ms),
            battery_mv,
        }
    }

    /// Encode and notify the current status, best-effort.
    pub fn send_telemetry(
        &mut self,
        sink: &mut impl TelemetrySink,
        battery: &mut impl BatteryPort,
        now_ms: u64,
    ) -> Result<(), TelemetryError> {
        if !self.link_connected || !self.notify_enabled {
            return Err(TelemetryError::NotConnected);
        }

        let frame = self.build_telemetry(now_ms, battery.read_mv());
        sink.notify(&frame.encode()).map_err(|e| {
            warn!("telemetry notify failed: {e:?}");
            TelemetryError::TransportFailed
        })
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> SafetyState {
        self.safety.state()
    }

    pub fn error_code(&self) -> ErrorCode {
        self.safety.error_code()
    }

    pub fn is_connected(&self) -> bool {
        self.link_connected
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notify_enabled
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    // ── Internal ──────────────────────────────────────────────

    /// Suppress the servo pulse.  A failure here is logged but not
    /// annotated: the transition that demanded neutral output carries
    /// its own error code.
    fn force_neutral(&mut self, hw: &mut impl ActuatorPort) {
        if let Err(e) = hw.set_pulse_us(self.config.servo_channel, 0) {
            warn!("failed to stop servo output: {e}");
        }
    }
}
