//! Hardware task watchdog (TWDT).
//!
//! Resets the device if the control loop stalls.  Independent of the
//! protocol deadman watchdog: this one guards the firmware itself, not
//! the command link.  The control loop must call `feed()` every tick.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

pub struct TaskWatchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

impl Default for TaskWatchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskWatchdog {
    /// Subscribe the current task with a 5 s timeout.
    pub fn new() -> Self {
        #[cfg(target_os = "espidf")]
        {
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms: 5_000,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                if esp_task_wdt_reconfigure(&cfg) != ESP_OK {
                    log::warn!("TWDT reconfigure failed (may already be configured)");
                }
                let subscribed = esp_task_wdt_add(core::ptr::null_mut()) == ESP_OK;
                if subscribed {
                    log::info!("TWDT: subscribed (5 s timeout)");
                } else {
                    log::warn!("TWDT: failed to subscribe");
                }
                Self { subscribed }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::info!("TWDT(sim): no-op");
            Self {}
        }
    }

    /// Feed the watchdog.  Call at least every 5 seconds.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        if self.subscribed {
            unsafe {
                esp_task_wdt_reset();
            }
        }
    }
}
