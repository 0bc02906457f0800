//! Raw hardware drivers (dumb actuators; policy lives in the app core).

pub mod servo;
pub mod watchdog;
