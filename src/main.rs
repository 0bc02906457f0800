//! ServoLink Firmware — Main Entry Point
//!
//! Hexagonal architecture with a synchronous control loop.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   Adapters (outer ring)                  │
//! │                                                          │
//! │  BleAdapter      ServoDriver     StubBattery             │
//! │  (transport)     (ActuatorPort)  (BatteryPort)           │
//! │  MonotonicTime   LogEventSink    TaskWatchdog            │
//! │                                                          │
//! │  ────────────── Port Trait Boundary ──────────────       │
//! │                                                          │
//! │  ┌────────────────────────────────────────────────┐      │
//! │  │        CommandService (pure logic)             │      │
//! │  │  dispatcher · safety FSM · deadman · telemetry │      │
//! │  └────────────────────────────────────────────────┘      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Two execution contexts: the Bluedroid callbacks (decode + mailbox
//! only) and this control loop (everything else).  They meet at the
//! statics in `proto::channels`.

#![deny(unused_must_use)]

use anyhow::{Context, Result};
use log::{info, warn};

use servolink::adapters::battery::StubBattery;
use servolink::adapters::ble::{BleAdapter, BleTelemetrySink};
use servolink::adapters::log_sink::LogEventSink;
use servolink::adapters::time::MonotonicTime;
use servolink::app::service::{CommandService, TelemetryError};
use servolink::config::SystemConfig;
use servolink::drivers::servo::ServoDriver;
use servolink::drivers::watchdog::TaskWatchdog;
use servolink::proto::channels::{take_command, take_link_event};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("ServoLink v{}", env!("CARGO_PKG_VERSION"));

    let config = SystemConfig::default();

    // ── 2. Servo to the safe centre before anything can move ─
    let mut servo = ServoDriver::new(config.servo_channel, config.pwm_period_ns)
        .map_err(|e| anyhow::anyhow!("servo init: {e}"))?;
    {
        use servolink::app::ports::ActuatorPort;
        servo
            .set_pulse_us(config.servo_channel, config.startup_center_us)
            .map_err(|e| anyhow::anyhow!("servo centre: {e}"))?;
    }

    let watchdog = TaskWatchdog::new();

    // ── 3. Transport up ───────────────────────────────────────
    let mut ble = BleAdapter::new(
        heapless::String::try_from("ServoLink").unwrap_or_default(),
    );
    ble.start()
        .map_err(|e| anyhow::anyhow!("BLE start: {e}"))
        .context("transport bring-up is the only fatal failure")?;

    // ── 4. Control loop ───────────────────────────────────────
    let clock = MonotonicTime::new();
    let mut service = CommandService::new(config);
    let mut sink = LogEventSink::new();
    let mut telemetry = BleTelemetrySink::new();
    let mut battery = StubBattery::new(config.battery_stub_mv);

    service.start(&mut sink);

    let mut last_telemetry_ms = 0u64;

    loop {
        let now_ms = clock.now_ms();

        // Transport lifecycle first: a disconnect must win over any
        // stale frame still sitting in the mailbox.
        while let Some(event) = take_link_event() {
            service.handle_link_event(event, &mut servo, &mut sink);
        }

        if let Some(frame) = take_command() {
            service.handle_frame(&frame, &mut servo, &mut sink, now_ms);
        }

        service.watchdog_tick(&mut servo, &mut sink, now_ms);

        if now_ms.saturating_sub(last_telemetry_ms) >= u64::from(config.telemetry_interval_ms) {
            last_telemetry_ms = now_ms;
            match service.send_telemetry(&mut telemetry, &mut battery, now_ms) {
                Ok(()) | Err(TelemetryError::NotConnected) => {}
                Err(e) => warn!("telemetry: {e}"),
            }
        }

        watchdog.feed();

        esp_idf_hal::delay::FreeRtos::delay_ms(config.control_loop_interval_ms);
    }
}
