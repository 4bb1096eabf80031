//! Open-loop step response: settle, record a quiet baseline, then apply a
//! fixed-voltage step and log the plant's reaction until the timer runs out.

use crate::actuator::{ActuatorCommand, Direction, PWM_FULL_SCALE};
use crate::config::SharedConfig;
use crate::status::{EngineOutput, Outcome};
use crate::telemetry::TelemetryRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Sensor settling; nothing published.
    Warmup { remaining: u32 },
    /// Zero input, telemetry flowing so the recording starts from rest.
    Baseline { remaining: u32 },
    /// Step input held until `end_ms`.
    Applied { end_ms: u64 },
}

/// One step-response run. Self-terminating.
pub struct StepResponseEngine {
    phase: Phase,
    direction: Direction,
    amplitude_volts: f32,
    battery_volts: f32,
    duration_ms: u64,
    baseline_samples: u32,
    duty: u32,
}

impl StepResponseEngine {
    /// Build a run from the current parameters. Returns `None` when the
    /// configured amplitude or duration is zero; starting such a run would
    /// record nothing useful.
    pub fn start(shared: &SharedConfig) -> Option<Self> {
        let s = &shared.step;
        if s.amplitude_volts <= 0.0 || s.duration_ms == 0 {
            tracing::info!(
                amplitude = s.amplitude_volts,
                duration_ms = s.duration_ms,
                "step start ignored, experiment not configured"
            );
            return None;
        }
        // Volts to duty counts against the measured supply voltage.
        let frac = (s.amplitude_volts / s.battery_volts).clamp(0.0, 1.0);
        let duty = ((frac * PWM_FULL_SCALE as f32).round() as u32).min(PWM_FULL_SCALE);
        Some(Self {
            phase: Phase::Warmup {
                remaining: s.warmup_samples.max(1),
            },
            direction: Direction::from_wire(s.direction),
            amplitude_volts: s.amplitude_volts,
            battery_volts: s.battery_volts,
            duration_ms: s.duration_ms,
            baseline_samples: s.baseline_samples.max(1),
            duty,
        })
    }

    /// Duty the step will apply (post conversion and clamp).
    pub fn step_duty(&self) -> u32 {
        self.duty
    }

    pub fn tick(&mut self, now_ms: u64, distance_cm: Option<f32>) -> EngineOutput {
        match self.phase {
            Phase::Warmup { remaining } => {
                // Warmup counts real samples; a tick with no reading does
                // not advance it.
                if distance_cm.is_some() {
                    self.phase = if remaining > 1 {
                        Phase::Warmup {
                            remaining: remaining - 1,
                        }
                    } else {
                        Phase::Baseline {
                            remaining: self.baseline_samples,
                        }
                    };
                }
                EngineOutput::running(ActuatorCommand::stop(self.direction), None)
            }
            Phase::Baseline { remaining } => {
                let record = distance_cm.map(|d| self.record(now_ms, d, false, None));
                self.phase = if remaining > 1 {
                    Phase::Baseline {
                        remaining: remaining - 1,
                    }
                } else {
                    Phase::Applied {
                        end_ms: now_ms.saturating_add(self.duration_ms),
                    }
                };
                EngineOutput::running(ActuatorCommand::stop(self.direction), record)
            }
            Phase::Applied { end_ms } => {
                if now_ms >= end_ms {
                    return EngineOutput::finished(
                        ActuatorCommand::stop(self.direction),
                        Outcome::StepComplete,
                    );
                }
                let record = distance_cm.map(|d| self.record(now_ms, d, true, Some(end_ms)));
                EngineOutput::running(
                    ActuatorCommand {
                        duty: self.duty,
                        direction: self.direction,
                    },
                    record,
                )
            }
        }
    }

    fn record(&self, now_ms: u64, distance: f32, applied: bool, end_ms: Option<u64>) -> TelemetryRecord {
        TelemetryRecord::Step {
            time_to_end_ms: end_ms.map_or(-1, |e| e.saturating_sub(now_ms) as i64),
            time_ms: now_ms,
            direction: self.direction,
            battery_volts: self.battery_volts,
            distance_cm: distance,
            step_volts: if applied { self.amplitude_volts } else { 0.0 },
            pwm: if applied { self.duty } else { 0 },
            applied,
        }
    }
}
