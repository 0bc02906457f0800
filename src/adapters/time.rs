//! Monotonic time adapter.
//!
//! The safety core takes time as an explicit argument; this adapter is
//! the only place that queries a real clock.
//!
//! - **`target_os = "espidf"`** — wraps `esp_timer_get_time()` (µs
//!   precision, monotonic since boot).
//! - **all other targets** — `std::time::Instant` for host tests.

/// Milliseconds-since-boot clock.
pub struct MonotonicTime {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn now_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
