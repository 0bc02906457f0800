//! Servo PWM driver (50 Hz standard servo timing).
//!
//! Single channel, LEDC peripheral.  The 14-bit timer resolution gives
//! ~1.2 µs of pulse granularity at a 20 ms period — well under servo
//! deadband.
//!
//! ## Safety contract
//!
//! This driver is a dumb actuator: range clamping and the arm gate are
//! enforced by the dispatcher.  A pulse of 0 µs suppresses the output
//! entirely (servo unpowered / holding nothing).
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the real LEDC peripheral.
//! On host/test: tracks the last commanded pulse in-memory only.

use log::info;

use crate::app::ports::ActuatorPort;
use crate::error::ActuatorError;

/// LEDC timer resolution in bits.
const DUTY_RES_BITS: u32 = 14;

/// GPIO the servo signal line is wired to.
#[cfg(target_os = "espidf")]
const SERVO_GPIO: i32 = 4;

pub struct ServoDriver {
    /// The single channel this board exposes.
    channel: u8,
    /// PWM period in nanoseconds (20 ms for standard servos).
    period_ns: u32,
    /// Last commanded pulse width; 0 = output suppressed.
    last_pulse_us: u16,
}

impl ServoDriver {
    /// Configure the PWM peripheral for the given channel.
    pub fn new(channel: u8, period_ns: u32) -> Result<Self, ActuatorError> {
        let driver = Self {
            channel,
            period_ns,
            last_pulse_us: 0,
        };
        driver.platform_init()?;
        info!(
            "servo: channel {} ready ({} Hz)",
            channel,
            1_000_000_000 / period_ns
        );
        Ok(driver)
    }

    pub fn last_pulse_us(&self) -> u16 {
        self.last_pulse_us
    }

    fn duty_for(&self, pulse_us: u16) -> u32 {
        let period_us = self.period_ns / 1_000;
        (u32::from(pulse_us) << DUTY_RES_BITS) / period_us
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_init(&self) -> Result<(), ActuatorError> {
        use esp_idf_svc::sys::*;
        unsafe {
            let timer_cfg = ledc_timer_config_t {
                speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
                duty_resolution: DUTY_RES_BITS,
                timer_num: ledc_timer_t_LEDC_TIMER_0,
                freq_hz: 1_000_000_000 / self.period_ns,
                clk_cfg: ledc_clk_cfg_t_LEDC_AUTO_CLK,
                ..core::mem::zeroed()
            };
            if ledc_timer_config(&timer_cfg) != ESP_OK {
                return Err(ActuatorError::PwmWriteFailed);
            }

            let channel_cfg = ledc_channel_config_t {
                gpio_num: SERVO_GPIO,
                speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
                channel: u32::from(self.channel),
                timer_sel: ledc_timer_t_LEDC_TIMER_0,
                duty: 0,
                hpoint: 0,
                ..core::mem::zeroed()
            };
            if ledc_channel_config(&channel_cfg) != ESP_OK {
                return Err(ActuatorError::PwmWriteFailed);
            }
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_init(&self) -> Result<(), ActuatorError> {
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_set_duty(&self, duty: u32) -> Result<(), ActuatorError> {
        use esp_idf_svc::sys::*;
        unsafe {
            let channel = u32::from(self.channel);
            if ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, duty) != ESP_OK
                || ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel) != ESP_OK
            {
                return Err(ActuatorError::PwmWriteFailed);
            }
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_set_duty(&self, _duty: u32) -> Result<(), ActuatorError> {
        Ok(())
    }
}

impl ActuatorPort for ServoDriver {
    fn set_pulse_us(&mut self, channel: u8, pulse_us: u16) -> Result<(), ActuatorError> {
        if channel != self.channel {
            return Err(ActuatorError::ChannelOutOfRange);
        }
        self.platform_set_duty(self.duty_for(pulse_us))?;
        self.last_pulse_us = pulse_us;
        Ok(())
    }
}

// embedded-hal PWM interop: duty is the pulse width in µs, full scale
// is the whole period.

impl embedded_hal::pwm::Error for ActuatorError {
    fn kind(&self) -> embedded_hal::pwm::ErrorKind {
        embedded_hal::pwm::ErrorKind::Other
    }
}

impl embedded_hal::pwm::ErrorType for ServoDriver {
    type Error = ActuatorError;
}

impl embedded_hal::pwm::SetDutyCycle for ServoDriver {
    fn max_duty_cycle(&self) -> u16 {
        (self.period_ns / 1_000) as u16
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), ActuatorError> {
        self.platform_set_duty(self.duty_for(duty))?;
        self.last_pulse_us = duty;
        Ok(())
    }
}
