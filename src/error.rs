//! Error types for the ServoLink firmware.
//!
//! Subsystem errors are small `Copy` enums so they pass through the
//! dispatcher without allocation.  [`ErrorCode`] is different in kind:
//! it is the *wire* error annotation carried in every telemetry frame,
//! mirroring whatever the safety controller last recorded.

use core::fmt;

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// PWM peripheral rejected the configuration or duty write.
    PwmWriteFailed,
    /// Requested channel is not wired on this board.
    ChannelOutOfRange,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::ChannelOutOfRange => write!(f, "servo channel out of range"),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire error code
// ---------------------------------------------------------------------------

/// Error annotation reported in telemetry, one byte on the wire.
///
/// Set alongside safety-state transitions and cleared on re-arm,
/// explicit disarm, or a fresh connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ErrorCode {
    #[default]
    None = 0x00,
    /// No valid command within the deadman window while armed.
    DeadmanTimeout = 0x01,
    /// Battery below the minimum operating voltage.
    LowBattery = 0x02,
    /// The servo driver reported a failure.
    ActuatorFault = 0x03,
    /// Unrecognised command message type.
    InvalidCommand = 0x04,
    Unknown = 0xFF,
}

impl ErrorCode {
    /// Wire representation (telemetry `error_code` byte).
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Parse the wire byte; anything unrecognised maps to `Unknown`.
    pub const fn from_code(raw: u8) -> Self {
        match raw {
            0x00 => Self::None,
            0x01 => Self::DeadmanTimeout,
            0x02 => Self::LowBattery,
            0x03 => Self::ActuatorFault,
            0x04 => Self::InvalidCommand,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::DeadmanTimeout => write!(f, "deadman timeout"),
            Self::LowBattery => write!(f, "low battery"),
            Self::ActuatorFault => write!(f, "actuator fault"),
            Self::InvalidCommand => write!(f, "invalid command"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}
