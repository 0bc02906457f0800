//! ServoLink firmware library.
//!
//! Command-and-safety layer for a BLE-controlled single-servo device:
//! binary command protocol, arm/disarm safety gate, deadman watchdog,
//! telemetry notifications.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod proto;
pub mod safety;

pub mod error;

pub mod adapters;
pub mod drivers;
