//! Non-blocking link supervision for the pub/sub transport.
//!
//! The control loop calls `poll` every tick; reconnection attempts are
//! rate-limited so a dead broker never stalls or floods the loop. While the
//! link is down, publishes are dropped (telemetry and acks are best-effort)
//! and the controller keeps running on its last-known parameters.

use railcar_traits::Transport;

/// Wraps a `Transport` with retry pacing, resubscription, and failure
/// diagnostics.
pub struct ConnectionSupervisor<T: Transport> {
    transport: T,
    subscriptions: Vec<String>,
    retry_interval_ms: u64,
    diag_every_failures: u32,
    last_attempt_ms: Option<u64>,
    consecutive_failures: u32,
}

impl<T: Transport> ConnectionSupervisor<T> {
    pub fn new(
        transport: T,
        subscriptions: Vec<String>,
        retry_interval_ms: u64,
        diag_every_failures: u32,
    ) -> Self {
        Self {
            transport,
            subscriptions,
            retry_interval_ms: retry_interval_ms.max(1),
            diag_every_failures: diag_every_failures.max(1),
            last_attempt_ms: None,
            consecutive_failures: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Advance connection state. At most one attempt per retry interval;
    /// the first poll attempts immediately. Returns whether the link is up.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if self.transport.is_connected() {
            return true;
        }
        let due = match self.last_attempt_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.retry_interval_ms,
        };
        if !due {
            return false;
        }
        self.last_attempt_ms = Some(now_ms);

        match self.transport.try_connect() {
            Ok(true) => {
                tracing::info!(
                    after_failures = self.consecutive_failures,
                    "transport connected"
                );
                self.consecutive_failures = 0;
                for topic in &self.subscriptions {
                    if let Err(e) = self.transport.subscribe(topic) {
                        tracing::warn!(topic, error = %e, "subscribe failed");
                    }
                }
                true
            }
            Ok(false) => {
                self.note_failure(None);
                false
            }
            Err(e) => {
                self.note_failure(Some(&e.to_string()));
                false
            }
        }
    }

    fn note_failure(&mut self, error: Option<&str>) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures % self.diag_every_failures == 0 {
            tracing::warn!(
                failures = self.consecutive_failures,
                error,
                diagnostics = %self.transport.diagnostics(),
                "transport still down"
            );
        } else {
            tracing::debug!(failures = self.consecutive_failures, error, "connect attempt failed");
        }
    }

    /// Publish if connected; silently drop otherwise.
    pub fn publish(&mut self, topic: &str, payload: &str) {
        if !self.transport.is_connected() {
            tracing::debug!(topic, "publish dropped, link down");
            return;
        }
        if let Err(e) = self.transport.publish(topic, payload) {
            tracing::warn!(topic, error = %e, "publish failed");
        }
    }

    /// Drain one inbound message, if connected and one is waiting.
    pub fn try_recv(&mut self) -> Option<(String, String)> {
        if !self.transport.is_connected() {
            return None;
        }
        self.transport.try_recv()
    }
}
