pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Ranging sensor boundary: returns one smoothed-enough raw distance sample
/// in centimetres, or an error after `timeout`.
pub trait DistanceSensor {
    fn read(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<f32, Box<dyn std::error::Error + Send + Sync>>;
}

/// Drive motor boundary. `duty` is in PWM counts (implementation-defined full
/// scale); `forward` selects the travel direction. `stop` must leave the
/// motor unpowered.
pub trait Motor {
    fn set_drive(
        &mut self,
        duty: u32,
        forward: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Best-effort datagram sink for per-tick telemetry records.
pub trait TelemetrySink {
    fn send(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Pub/sub transport boundary. Every method must return without blocking on
/// network I/O; connection progress is observed across successive calls.
pub trait Transport {
    /// One non-blocking connection attempt. Returns `Ok(true)` once the link
    /// is up, `Ok(false)` when the attempt is still in flight.
    fn try_connect(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
    fn is_connected(&self) -> bool;
    fn subscribe(&mut self, topic: &str)
    -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn publish(
        &mut self,
        topic: &str,
        payload: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    /// Drain one inbound `(topic, payload)` message, if any arrived.
    fn try_recv(&mut self) -> Option<(String, String)>;
    /// Human-readable link diagnostics (signal strength, last error, ...).
    fn diagnostics(&self) -> String;
}
