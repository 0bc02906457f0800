//! Driven adapters: concrete implementations of the port traits plus
//! platform glue.  Hardware paths are cfg-gated on
//! `target_os = "espidf"`; every adapter has a host simulation arm.

pub mod battery;
pub mod ble;
pub mod log_sink;
pub mod time;
