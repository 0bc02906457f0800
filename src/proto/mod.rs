//! Command/telemetry protocol: wire codec and inter-context handoff.

pub mod channels;
pub mod frame;
