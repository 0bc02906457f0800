//! Outbound application events.
//!
//! The [`CommandService`](super::service::CommandService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them — log to serial, count in
//! a test recorder, etc.

use crate::error::ErrorCode;
use crate::safety::SafetyState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// The service has started (carries initial state).
    Started(SafetyState),

    /// The safety state machine transitioned.
    StateChanged { from: SafetyState, to: SafetyState },

    /// An error annotation was recorded without a state change.
    ErrorRaised(ErrorCode),

    /// The deadman watchdog tripped; carries the command age observed.
    DeadmanTripped { age_ms: u16 },
}
