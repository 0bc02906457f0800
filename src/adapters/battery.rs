//! Battery monitor adapter.
//!
//! The current board revision has no VBAT sense divider, so telemetry
//! carries a fixed placeholder reading.
//
// TODO: read VBAT through an ADC divider once the sense line is wired
// (rev B), and raise ErrorCode::LowBattery below the pack cutoff.

use crate::app::ports::BatteryPort;

/// Fixed-value battery source.
pub struct StubBattery {
    mv: u16,
}

impl StubBattery {
    pub fn new(mv: u16) -> Self {
        Self { mv }
    }
}

impl BatteryPort for StubBattery {
    fn read_mv(&mut self) -> u16 {
        self.mv
    }
}
