//! Engine tick outputs and terminal outcomes.

use crate::actuator::ActuatorCommand;
use crate::telemetry::TelemetryRecord;

/// Terminal outcome of a self-terminating experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The step-response run reached its configured duration.
    StepComplete,
    /// Dead-zone calibration confirmed motion at the given duty.
    DeadbandFound { pwm: u32 },
    /// The ramp hit the duty ceiling without confirmed motion; the fallback
    /// value should be treated as the calibration result.
    DeadbandTimedOut { fallback_pwm: u32 },
}

/// Lifecycle signal from one engine tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// Keep going.
    None,
    /// The engine finished this tick; the controller returns to idle.
    Finished(Outcome),
}

/// Everything one engine tick produces.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    /// What to drive the actuator with this tick.
    pub command: ActuatorCommand,
    /// Telemetry for this tick, if the engine is in a publishing phase.
    pub record: Option<TelemetryRecord>,
    pub event: EngineEvent,
}

impl EngineOutput {
    pub fn running(command: ActuatorCommand, record: Option<TelemetryRecord>) -> Self {
        Self {
            command,
            record,
            event: EngineEvent::None,
        }
    }

    pub fn finished(command: ActuatorCommand, outcome: Outcome) -> Self {
        Self {
            command,
            record: None,
            event: EngineEvent::Finished(outcome),
        }
    }
}
