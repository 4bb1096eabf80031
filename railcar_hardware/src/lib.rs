//! Hardware and simulation backends for the railcar firmware.
//!
//! - `sim`: deterministic cart-on-rail physics for development and tests
//! - `UdpTelemetry`: fire-and-forget datagram telemetry sink
//! - `LoopbackTransport`: in-process pub/sub for broker-less operation
//! - `hcsr04` / `DriveMotor` (feature `hardware`): real GPIO backends

pub mod error;
pub mod sim;

#[cfg(feature = "hardware")]
pub mod hcsr04;

use std::collections::VecDeque;
use std::net::{SocketAddr, UdpSocket};

use railcar_traits::{TelemetrySink, Transport};

use crate::error::HwError;

/// Telemetry sink over a non-blocking UDP socket. Each record is one
/// datagram; loss is acceptable by design.
pub struct UdpTelemetry {
    socket: UdpSocket,
    dest: SocketAddr,
}

impl UdpTelemetry {
    pub fn new(dest: SocketAddr) -> Result<Self, HwError> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket, dest })
    }
}

impl TelemetrySink for UdpTelemetry {
    fn send(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match self.socket.send_to(line.as_bytes(), self.dest) {
            Ok(_) => Ok(()),
            // A full socket buffer is a dropped sample, not an error.
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                tracing::trace!("telemetry datagram dropped, socket busy");
                Ok(())
            }
            Err(e) => Err(Box::new(HwError::Io(e))),
        }
    }
}

/// In-process transport: always connects on the first attempt, records
/// publishes, and lets a harness (or a local tool) inject inbound messages.
/// Used when running against the simulation without a broker.
#[derive(Default)]
pub struct LoopbackTransport {
    connected: bool,
    subscriptions: Vec<String>,
    inbound: VecDeque<(String, String)>,
    outbound: Vec<(String, String)>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&mut self, topic: &str, payload: &str) {
        self.inbound.push_back((topic.into(), payload.into()));
    }

    pub fn take_outbound(&mut self) -> Vec<(String, String)> {
        std::mem::take(&mut self.outbound)
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }
}

impl Transport for LoopbackTransport {
    fn try_connect(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        self.connected = true;
        Ok(true)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.outbound.push((topic.to_string(), payload.to_string()));
        Ok(())
    }

    fn try_recv(&mut self) -> Option<(String, String)> {
        self.inbound.pop_front()
    }

    fn diagnostics(&self) -> String {
        format!(
            "loopback: connected={}, subs={}, queued_in={}",
            self.connected,
            self.subscriptions.len(),
            self.inbound.len()
        )
    }
}

#[cfg(feature = "hardware")]
pub use hcsr04::{DriveMotor, UltrasonicSensor};
