//! Fixed-header command/telemetry frame codec.
//!
//! Wire format (all multi-byte integers little-endian):
//! ```text
//! ┌─────────┬──────────┬─────────────┬──────────┬───────────────────┐
//! │ version │ msg_type │ payload_len │ reserved │ payload (≤8 B)    │
//! │  (1B)   │   (1B)   │    (1B)     │   (1B)   │                   │
//! └─────────┴──────────┴─────────────┴──────────┴───────────────────┘
//! ```
//!
//! Decoding validates the header strictly and has no side effects on
//! failure; the transport adapter translates a [`DecodeError`] into a
//! GATT write rejection without queuing any work.

use core::fmt;

use heapless::Vec;

/// Supported protocol version (header byte 0).
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Fixed header size in bytes.
pub const HEADER_LEN: usize = 4;

/// Maximum payload the staging buffer can hold.
pub const MAX_PAYLOAD: usize = 8;

/// Command message types (central → device).
pub mod msg_type {
    pub const ARM: u8 = 0x01;
    pub const DISARM: u8 = 0x02;
    pub const SET_SERVO: u8 = 0x03;
    pub const PING: u8 = 0x04;
    /// Outbound only.
    pub const TELEMETRY: u8 = 0x10;
}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

/// Frame-level rejection reasons, checked in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer shorter than the fixed header.
    FrameTooShort { len: usize },
    /// Header version byte is not [`PROTOCOL_VERSION`].
    UnsupportedVersion(u8),
    /// Buffer length disagrees with the declared payload length.
    LengthMismatch { declared: u8, actual: usize },
    /// Declared payload exceeds the staging buffer.
    PayloadTooLarge(u8),
    /// Frame is well-formed but not of the expected message type.
    UnexpectedType(u8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrameTooShort { len } => write!(f, "frame too short ({len} bytes)"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported version 0x{v:02x}"),
            Self::LengthMismatch { declared, actual } => {
                write!(f, "length mismatch (declared {declared}, buffer {actual})")
            }
            Self::PayloadTooLarge(n) => write!(f, "payload too large ({n} bytes)"),
            Self::UnexpectedType(t) => write!(f, "unexpected msg_type 0x{t:02x}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Command frames
// ---------------------------------------------------------------------------

/// A validated inbound frame: header checked, payload staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    pub msg_type: u8,
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

/// Decode and validate a raw buffer into a [`CommandFrame`].
pub fn decode(buf: &[u8]) -> Result<CommandFrame, DecodeError> {
    if buf.len() < HEADER_LEN {
        return Err(DecodeError::FrameTooShort { len: buf.len() });
    }
    if buf[0] != PROTOCOL_VERSION {
        return Err(DecodeError::UnsupportedVersion(buf[0]));
    }
    let declared = buf[2];
    if buf.len() != HEADER_LEN + declared as usize {
        return Err(DecodeError::LengthMismatch {
            declared,
            actual: buf.len(),
        });
    }
    if declared as usize > MAX_PAYLOAD {
        return Err(DecodeError::PayloadTooLarge(declared));
    }

    let mut payload = Vec::new();
    payload
        .extend_from_slice(&buf[HEADER_LEN..])
        .map_err(|()| DecodeError::PayloadTooLarge(declared))?;

    Ok(CommandFrame {
        msg_type: buf[1],
        payload,
    })
}

/// A typed command extracted from a [`CommandFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Arm,
    Disarm,
    SetServo { pulse_us: u16 },
    Ping,
}

/// Protocol-level rejection: the frame was well-formed but the command
/// cannot be acted on.  Never surfaced as a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    UnknownType(u8),
    BadPayloadLen { msg_type: u8, len: usize },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType(t) => write!(f, "unknown msg_type 0x{t:02x}"),
            Self::BadPayloadLen { msg_type, len } => {
                write!(f, "bad payload length {len} for msg_type 0x{msg_type:02x}")
            }
        }
    }
}

impl CommandFrame {
    /// Interpret the frame as a typed command.
    ///
    /// SET_SERVO requires exactly two payload bytes (pulse µs, LE).
    /// ARM / DISARM / PING ignore any trailing payload.
    pub fn command(&self) -> Result<Command, CommandError> {
        match self.msg_type {
            msg_type::ARM => Ok(Command::Arm),
            msg_type::DISARM => Ok(Command::Disarm),
            msg_type::SET_SERVO => {
                if self.payload.len() != 2 {
                    return Err(CommandError::BadPayloadLen {
                        msg_type: self.msg_type,
                        len: self.payload.len(),
                    });
                }
                let pulse_us = u16::from_le_bytes([self.payload[0], self.payload[1]]);
                Ok(Command::SetServo { pulse_us })
            }
            msg_type::PING => Ok(Command::Ping),
            other => Err(CommandError::UnknownType(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Telemetry frames
// ---------------------------------------------------------------------------

/// Telemetry payload size (state, error, age LE, battery LE, reserved).
pub const TELEMETRY_PAYLOAD_LEN: usize = 8;

/// Full telemetry frame size on the wire.
pub const TELEMETRY_FRAME_LEN: usize = HEADER_LEN + TELEMETRY_PAYLOAD_LEN;

/// Outbound status report, constructed fresh on each send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryFrame {
    pub state: u8,
    pub error_code: u8,
    pub last_cmd_age_ms: u16,
    pub battery_mv: u16,
}

impl TelemetryFrame {
    /// Encode into the fixed 12-byte wire layout.
    pub fn encode(&self) -> [u8; TELEMETRY_FRAME_LEN] {
        let mut buf = [0u8; TELEMETRY_FRAME_LEN];
        buf[0] = PROTOCOL_VERSION;
        buf[1] = msg_type::TELEMETRY;
        buf[2] = TELEMETRY_PAYLOAD_LEN as u8;
        buf[3] = 0; // reserved
        buf[4] = self.state;
        buf[5] = self.error_code;
        buf[6..8].copy_from_slice(&self.last_cmd_age_ms.to_le_bytes());
        buf[8..10].copy_from_slice(&self.battery_mv.to_le_bytes());
        // buf[10..12]: reserved, zero
        buf
    }

    /// Decode a telemetry frame (client side and round-trip tests).
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let frame = decode(buf)?;
        if frame.msg_type != msg_type::TELEMETRY {
            return Err(DecodeError::UnexpectedType(frame.msg_type));
        }
        if frame.payload.len() != TELEMETRY_PAYLOAD_LEN {
            return Err(DecodeError::LengthMismatch {
                declared: frame.payload.len() as u8,
                actual: buf.len(),
            });
        }
        Ok(Self {
            state: frame.payload[0],
            error_code: frame.payload[1],
            last_cmd_age_ms: u16::from_le_bytes([frame.payload[2], frame.payload[3]]),
            battery_mv: u16::from_le_bytes([frame.payload[4], frame.payload[5]]),
        })
    }
}
