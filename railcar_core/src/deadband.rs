//! Static-friction calibration: ramp duty upward from rest until the cart
//! demonstrably moves, then report the duty that first produced motion.

use std::collections::VecDeque;

use crate::actuator::{ActuatorCommand, Direction};
use crate::config::SharedConfig;
use crate::status::{EngineOutput, Outcome};
use crate::telemetry::TelemetryRecord;
use crate::util::{mean, stddev};

#[derive(Debug)]
enum Phase {
    /// Motor off, collecting rest samples for the noise baseline.
    Baseline { samples: Vec<f32> },
    Ramping(RampState),
}

#[derive(Debug)]
struct RampState {
    pwm: u32,
    next_step_at_ms: u64,
    baseline_cm: f32,
    /// max(configured threshold, 3 * baseline noise stddev).
    effective_threshold_cm: f32,
    /// Smoothed position estimate, seeded with the baseline mean.
    window: VecDeque<f32>,
    /// Raw samples awaiting the next averaged check.
    pending: Vec<f32>,
    /// Consecutive over-threshold checks so far.
    hits: u32,
    /// Duty at the first check of the current confirmation run. This is the
    /// reported deadband: motion that takes several checks to confirm began
    /// at this duty, not at the duty reached by the time it was confirmed.
    first_hit_pwm: u32,
}

/// One dead-zone calibration run. Self-terminating, bounded by the duty
/// ceiling.
pub struct DeadbandEngine {
    phase: Phase,
    direction: Direction,
}

impl DeadbandEngine {
    pub fn start(shared: &SharedConfig) -> Self {
        let d = &shared.deadband;
        Self {
            phase: Phase::Baseline {
                samples: Vec::with_capacity(d.baseline_samples),
            },
            direction: Direction::from_wire(d.direction),
        }
    }

    pub fn tick(
        &mut self,
        now_ms: u64,
        distance_cm: Option<f32>,
        shared: &SharedConfig,
    ) -> EngineOutput {
        let d = &shared.deadband;
        match &mut self.phase {
            Phase::Baseline { samples } => {
                if let Some(dist) = distance_cm {
                    samples.push(dist);
                }
                if samples.len() < d.baseline_samples {
                    return EngineOutput::running(ActuatorCommand::stop(self.direction), None);
                }
                let baseline_cm = mean(samples);
                let noise = stddev(samples);
                let effective_threshold_cm = d.threshold_cm.max(3.0 * noise);
                tracing::info!(
                    baseline_cm,
                    noise,
                    effective_threshold_cm,
                    "deadband baseline established"
                );
                let mut window = VecDeque::with_capacity(d.window_len);
                window.extend(std::iter::repeat_n(baseline_cm, d.window_len));
                self.phase = Phase::Ramping(RampState {
                    pwm: d.ramp_start_pwm,
                    next_step_at_ms: now_ms.saturating_add(d.ramp_interval_ms),
                    baseline_cm,
                    effective_threshold_cm,
                    window,
                    pending: Vec::with_capacity(d.samples_per_check),
                    hits: 0,
                    first_hit_pwm: 0,
                });
                EngineOutput::running(ActuatorCommand::stop(self.direction), None)
            }
            Phase::Ramping(ramp) => {
                let mut motion_this_tick = false;

                if let Some(dist) = distance_cm {
                    ramp.pending.push(dist);
                }
                if ramp.pending.len() >= d.samples_per_check {
                    let check = mean(&ramp.pending);
                    ramp.pending.clear();
                    ramp.window.pop_front();
                    ramp.window.push_back(check);
                    let smoothed = {
                        let (a, b) = ramp.window.as_slices();
                        (a.iter().sum::<f32>() + b.iter().sum::<f32>())
                            / ramp.window.len() as f32
                    };
                    let deviation = (smoothed - ramp.baseline_cm).abs();
                    // Below min_motion_pwm the drive cannot physically move
                    // the cart; anything seen there is sensor noise.
                    if deviation >= ramp.effective_threshold_cm && ramp.pwm > d.min_motion_pwm {
                        if ramp.hits == 0 {
                            ramp.first_hit_pwm = ramp.pwm;
                        }
                        ramp.hits += 1;
                        motion_this_tick = true;
                        if ramp.hits >= d.confirm_count {
                            let pwm = ramp.first_hit_pwm;
                            tracing::info!(pwm, "deadband confirmed");
                            return EngineOutput::finished(
                                ActuatorCommand::stop(self.direction),
                                Outcome::DeadbandFound { pwm },
                            );
                        }
                    } else {
                        // A single quiet check breaks the run; confirmation
                        // requires strictly consecutive detections.
                        ramp.hits = 0;
                        ramp.first_hit_pwm = 0;
                    }
                }

                if now_ms >= ramp.next_step_at_ms {
                    ramp.pwm = ramp.pwm.saturating_add(d.ramp_step_pwm);
                    ramp.next_step_at_ms = now_ms.saturating_add(d.ramp_interval_ms);
                }
                if ramp.pwm >= d.pwm_ceiling {
                    tracing::warn!(
                        ceiling = d.pwm_ceiling,
                        fallback = d.fallback_pwm,
                        "deadband ramp hit ceiling without motion"
                    );
                    return EngineOutput::finished(
                        ActuatorCommand::stop(self.direction),
                        Outcome::DeadbandTimedOut {
                            fallback_pwm: d.fallback_pwm,
                        },
                    );
                }

                let record = distance_cm.map(|dist| TelemetryRecord::Deadband {
                    time_ms: now_ms,
                    pwm: ramp.pwm,
                    distance_cm: dist,
                    baseline_cm: ramp.baseline_cm,
                    motion_detected: motion_this_tick,
                });
                EngineOutput::running(
                    ActuatorCommand {
                        duty: ramp.pwm,
                        direction: self.direction,
                    },
                    record,
                )
            }
        }
    }
}
