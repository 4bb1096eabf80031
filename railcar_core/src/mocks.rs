//! Test and helper mocks for railcar_core.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use railcar_traits::{DistanceSensor, Motor, TelemetrySink, Transport};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Sensor that replays a scripted sample sequence. `Err` entries simulate
/// read failures; once the script is exhausted the last good value repeats.
pub struct ScriptedSensor {
    script: VecDeque<Result<f32, String>>,
    last_ok: Option<f32>,
}

impl ScriptedSensor {
    pub fn new(samples: impl IntoIterator<Item = f32>) -> Self {
        Self {
            script: samples.into_iter().map(Ok).collect(),
            last_ok: None,
        }
    }

    pub fn from_script(script: impl IntoIterator<Item = Result<f32, String>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            last_ok: None,
        }
    }

    /// Constant-reading sensor.
    pub fn constant(value: f32) -> Self {
        Self::new([value])
    }
}

impl DistanceSensor for ScriptedSensor {
    fn read(&mut self, _timeout: std::time::Duration) -> Result<f32, BoxError> {
        match self.script.pop_front() {
            Some(Ok(v)) => {
                self.last_ok = Some(v);
                Ok(v)
            }
            Some(Err(msg)) => Err(Box::new(std::io::Error::other(msg))),
            None => match self.last_ok {
                Some(v) => Ok(v),
                None => Err(Box::new(std::io::Error::other("script exhausted"))),
            },
        }
    }
}

/// Motor that records every command it receives.
#[derive(Default, Clone)]
pub struct SpyMotor {
    log: Arc<Mutex<Vec<(u32, bool)>>>,
    stops: Arc<Mutex<u32>>,
}

impl SpyMotor {
    /// Every `(duty, forward)` pair seen so far, in order.
    pub fn commands(&self) -> Vec<(u32, bool)> {
        self.log.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn stop_count(&self) -> u32 {
        self.stops.lock().map(|g| *g).unwrap_or(0)
    }

    pub fn last_duty(&self) -> Option<u32> {
        self.log
            .lock()
            .ok()
            .and_then(|g| g.last().map(|(d, _)| *d))
    }
}

impl Motor for SpyMotor {
    fn set_drive(&mut self, duty: u32, forward: bool) -> Result<(), BoxError> {
        if let Ok(mut g) = self.log.lock() {
            g.push((duty, forward));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        if let Ok(mut g) = self.log.lock() {
            g.push((0, true));
        }
        if let Ok(mut s) = self.stops.lock() {
            *s += 1;
        }
        Ok(())
    }
}

/// Telemetry sink that captures lines in memory.
#[derive(Default, Clone)]
pub struct VecTelemetry {
    lines: Arc<Mutex<Vec<String>>>,
}

impl VecTelemetry {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl TelemetrySink for VecTelemetry {
    fn send(&mut self, line: &str) -> Result<(), BoxError> {
        if let Ok(mut g) = self.lines.lock() {
            g.push(line.to_string());
        }
        Ok(())
    }
}

/// Transport whose connection succeeds after a configurable number of
/// attempts, with injectable inbound messages and captured publishes.
#[derive(Clone)]
pub struct FakeTransport {
    succeed_after: Arc<Mutex<u32>>,
    connected: Arc<Mutex<bool>>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    published: Arc<Mutex<Vec<(String, String)>>>,
    inbound: Arc<Mutex<VecDeque<(String, String)>>>,
}

impl FakeTransport {
    /// `succeed_after`: number of failed attempts before connect succeeds.
    pub fn new(succeed_after: u32) -> Self {
        Self {
            succeed_after: Arc::new(Mutex::new(succeed_after)),
            connected: Arc::new(Mutex::new(false)),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            published: Arc::new(Mutex::new(Vec::new())),
            inbound: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn inject(&self, topic: &str, payload: &str) {
        if let Ok(mut q) = self.inbound.lock() {
            q.push_back((topic.to_string(), payload.to_string()));
        }
    }

    pub fn drop_link(&self) {
        if let Ok(mut c) = self.connected.lock() {
            *c = false;
        }
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }
}

impl Transport for FakeTransport {
    fn try_connect(&mut self) -> Result<bool, BoxError> {
        let mut remaining = self
            .succeed_after
            .lock()
            .map_err(|_| Box::new(std::io::Error::other("poisoned")) as BoxError)?;
        if *remaining > 0 {
            *remaining -= 1;
            return Err(Box::new(std::io::Error::other("connection refused")));
        }
        drop(remaining);
        if let Ok(mut c) = self.connected.lock() {
            *c = true;
        }
        Ok(true)
    }

    fn is_connected(&self) -> bool {
        self.connected.lock().map(|g| *g).unwrap_or(false)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BoxError> {
        if let Ok(mut g) = self.subscriptions.lock() {
            g.push(topic.to_string());
        }
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BoxError> {
        if let Ok(mut g) = self.published.lock() {
            g.push((topic.to_string(), payload.to_string()));
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Option<(String, String)> {
        self.inbound.lock().ok().and_then(|mut q| q.pop_front())
    }

    fn diagnostics(&self) -> String {
        format!(
            "fake transport, connected={}",
            self.is_connected()
        )
    }
}
