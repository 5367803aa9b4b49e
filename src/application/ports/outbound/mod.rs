//! Outbound ports - Interfaces that the application requires from external systems

mod clock_port;
mod effect_sink_port;

pub use clock_port::ClockPort;
pub use effect_sink_port::EffectSink;
