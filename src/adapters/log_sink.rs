//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART / USB-CDC in production).  Host tests substitute a
//! recording sink instead.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={state:?}");
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {from:?} -> {to:?}");
            }
            AppEvent::ErrorRaised(code) => {
                warn!("ERROR | {code}");
            }
            AppEvent::DeadmanTripped { age_ms } => {
                warn!("DEADMAN | tripped at {age_ms} ms");
            }
        }
    }
}
