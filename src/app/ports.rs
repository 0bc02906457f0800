//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ CommandService (domain)
//! ```
//!
//! Driven adapters (servo driver, BLE transport, battery monitor, event
//! sinks) implement these traits.  The
//! [`CommandService`](super::service::CommandService) consumes them via
//! generics, so the domain core never touches hardware directly and the
//! whole safety contract is testable with mocks.

use crate::error::ActuatorError;

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to command the servo.
///
/// `pulse_us == 0` means neutral output (PWM pulse suppressed, servo
/// unpowered).  Any other value has already been clamped into the safe
/// range by the dispatcher; implementations convert to their native
/// time unit and must not block indefinitely.
pub trait ActuatorPort {
    fn set_pulse_us(&mut self, channel: u8, pulse_us: u16) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Battery port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Battery voltage source for telemetry, in millivolts.
pub trait BatteryPort {
    fn read_mv(&mut self) -> u16;
}

// ───────────────────────────────────────────────────────────────
// Telemetry sink port (driven adapter: domain → transport)
// ───────────────────────────────────────────────────────────────

/// Outbound notification channel for encoded telemetry frames.
///
/// Sends are best-effort: the service logs a failure and moves on,
/// never retries.
pub trait TelemetrySink {
    type Error: core::fmt::Debug;

    fn notify(&mut self, frame: &[u8]) -> Result<(), Self::Error>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, a
/// debug characteristic, a host test recorder).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
