//! System configuration parameters
//!
//! All tunable parameters for the ServoLink controller.  Values are
//! compile-time defaults; there is deliberately no persistent storage
//! for them (safety constants should not drift per-device).

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Servo ---
    /// PWM channel the servo is wired to.
    pub servo_channel: u8,
    /// Minimum allowed pulse width (microseconds). Commands below are clamped up.
    pub pulse_min_us: u16,
    /// Maximum allowed pulse width (microseconds). Commands above are clamped down.
    pub pulse_max_us: u16,
    /// Safe centre pulse applied once at startup (prevents a jump on power-up).
    pub startup_center_us: u16,
    /// Servo PWM period in nanoseconds (50 Hz standard servo timing).
    pub pwm_period_ns: u32,

    // --- Safety ---
    /// Deadman window: maximum ms between accepted commands while armed.
    pub deadman_timeout_ms: u16,

    // --- Timing ---
    /// Control loop interval (milliseconds). Must be well under the deadman window.
    pub control_loop_interval_ms: u32,
    /// Telemetry notification interval (milliseconds).
    pub telemetry_interval_ms: u32,

    // --- Battery ---
    /// Placeholder battery reading (millivolts) until the VBAT sense line exists.
    pub battery_stub_mv: u16,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Servo
            servo_channel: 0,
            pulse_min_us: 500,
            pulse_max_us: 2500,
            startup_center_us: 1500,
            pwm_period_ns: 20_000_000, // 20 ms = 50 Hz

            // Safety
            deadman_timeout_ms: 200,

            // Timing
            control_loop_interval_ms: 50, // 20 Hz
            telemetry_interval_ms: 250,   // 4 Hz

            // Battery
            battery_stub_mv: 7400, // 2S pack nominal
        }
    }
}

impl SystemConfig {
    /// Clamp a commanded pulse width into the configured safe range.
    ///
    /// Out-of-range values saturate at the bounds; they are never rejected.
    pub fn clamp_pulse(&self, pulse_us: u16) -> u16 {
        pulse_us.clamp(self.pulse_min_us, self.pulse_max_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = SystemConfig::default();
        assert!(c.pulse_min_us < c.pulse_max_us);
        assert!(c.startup_center_us >= c.pulse_min_us);
        assert!(c.startup_center_us <= c.pulse_max_us);
        assert!(c.deadman_timeout_ms > 0);
        assert!(c.control_loop_interval_ms > 0);
    }

    #[test]
    fn timing_ratios_make_sense() {
        let c = SystemConfig::default();
        assert!(
            c.control_loop_interval_ms < u32::from(c.deadman_timeout_ms),
            "watchdog checks must be more frequent than the deadman window"
        );
    }

    #[test]
    fn clamp_saturates_at_bounds() {
        let c = SystemConfig::default();
        assert_eq!(c.clamp_pulse(0), 500);
        assert_eq!(c.clamp_pulse(499), 500);
        assert_eq!(c.clamp_pulse(500), 500);
        assert_eq!(c.clamp_pulse(1500), 1500);
        assert_eq!(c.clamp_pulse(2500), 2500);
        assert_eq!(c.clamp_pulse(2501), 2500);
        assert_eq!(c.clamp_pulse(u16::MAX), 2500);
    }

    #[test]
    fn serde_roundtrip() {
        let c = SystemConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: SystemConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c.pulse_min_us, c2.pulse_min_us);
        assert_eq!(c.pulse_max_us, c2.pulse_max_us);
        assert_eq!(c.deadman_timeout_ms, c2.deadman_timeout_ms);
    }
}
