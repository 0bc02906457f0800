//! Inter-context handoff primitives.
//!
//! Two execution contexts touch the command path: the BLE reception
//! callback (Bluedroid task) and the control loop.  They share no state
//! directly — everything crosses through these `embassy-sync` statics.
//!
//! ```text
//! ┌──────────────┐  CMD_SLOT (1-deep, overwrite)  ┌──────────────┐
//! │ BLE callback │───────────────────────────────▶│ Control loop │
//! │  (decode)    │  LINK_EVENTS (bounded queue)   │  (dispatch)  │
//! └──────────────┘───────────────────────────────▶└──────────────┘
//! ```
//!
//! The command slot is a [`Signal`], deliberately one-deep: if a second
//! frame arrives before the first is consumed the slot is overwritten.
//! Freshest-command-wins keeps latency and memory bounded for a device
//! where a stale servo setpoint is worse than a dropped one.  Connection
//! lifecycle events use a small bounded channel instead — they must not
//! overwrite each other.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use super::frame::CommandFrame;

/// Connection-lifecycle events observed by the transport adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// A central connected.
    Connected,
    /// The central dropped (or the supervision timeout fired).
    Disconnected,
    /// The peer wrote the telemetry CCC descriptor.
    NotifyEnabled(bool),
}

/// Single-slot command mailbox: reception context → control loop.
pub static CMD_SLOT: Signal<CriticalSectionRawMutex, CommandFrame> = Signal::new();

/// Connection lifecycle events: reception context → control loop.
pub static LINK_EVENTS: Channel<CriticalSectionRawMutex, LinkEvent, 4> = Channel::new();

/// Hand a decoded frame to the control loop, replacing any frame that
/// has not been consumed yet.
pub fn submit_command(frame: CommandFrame) {
    CMD_SLOT.signal(frame);
}

/// Non-blocking take of the freshest pending command.
pub fn take_command() -> Option<CommandFrame> {
    CMD_SLOT.try_take()
}

/// Queue a link event.  A full queue drops the event; the control loop
/// drains every tick so four slots outlast any realistic burst.
pub fn push_link_event(event: LinkEvent) {
    if LINK_EVENTS.try_send(event).is_err() {
        log::warn!("link event queue full, dropped {event:?}");
    }
}

/// Non-blocking take of the oldest pending link event.
pub fn take_link_event() -> Option<LinkEvent> {
    LINK_EVENTS.try_receive().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::frame::{decode, msg_type};

    // Single test per static: the statics are process-wide and the
    // test harness runs in parallel.

    #[test]
    fn command_slot_overwrites() {
        let arm = decode(&[0x01, msg_type::ARM, 0x00, 0x00]).unwrap();
        let ping = decode(&[0x01, msg_type::PING, 0x00, 0x00]).unwrap();

        assert!(take_command().is_none());

        submit_command(arm);
        submit_command(ping.clone());

        // Only the freshest frame survives.
        assert_eq!(take_command(), Some(ping));
        assert!(take_command().is_none());
    }

    #[test]
    fn link_events_are_fifo() {
        assert!(take_link_event().is_none());

        push_link_event(LinkEvent::Connected);
        push_link_event(LinkEvent::NotifyEnabled(true));
        push_link_event(LinkEvent::Disconnected);

        assert_eq!(take_link_event(), Some(LinkEvent::Connected));
        assert_eq!(take_link_event(), Some(LinkEvent::NotifyEnabled(true)));
        assert_eq!(take_link_event(), Some(LinkEvent::Disconnected));
        assert!(take_link_event().is_none());
    }
}
