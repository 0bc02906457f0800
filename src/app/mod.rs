//! Application layer: ports, events, and the command/safety service.

pub mod events;
pub mod ports;
pub mod service;
