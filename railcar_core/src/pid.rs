//! Closed-loop position hold: PID over filtered distance error.

use crate::actuator::{ActuatorCommand, Direction, PWM_FULL_SCALE};
use crate::config::{SafetyHoldPolicy, SharedConfig};
use crate::status::{EngineEvent, EngineOutput};
use crate::telemetry::TelemetryRecord;

/// Discrete PID compute state. Gains are only re-applied through
/// `set_tunings`, which pre-scales ki/kd by the sample time the way the
/// classic embedded formulation does.
#[derive(Debug, Clone)]
pub struct PidState {
    kp: f32,
    ki_scaled: f32,
    kd_scaled: f32,
    output_min: f32,
    output_max: f32,
    integral: f32,
    last_input: Option<f32>,
}

impl PidState {
    pub fn new(kp: f32, ki: f32, kd: f32, sample_time_ms: u64, out_min: f32, out_max: f32) -> Self {
        let mut s = Self {
            kp: 0.0,
            ki_scaled: 0.0,
            kd_scaled: 0.0,
            output_min: out_min,
            output_max: out_max,
            integral: 0.0,
            last_input: None,
        };
        s.set_tunings(kp, ki, kd, sample_time_ms);
        s
    }

    /// Re-apply gains, preserving the integrator and derivative history.
    pub fn set_tunings(&mut self, kp: f32, ki: f32, kd: f32, sample_time_ms: u64) {
        let dt_s = (sample_time_ms.max(1) as f32) / 1000.0;
        self.kp = kp;
        self.ki_scaled = ki * dt_s;
        self.kd_scaled = kd / dt_s;
    }

    pub fn set_output_limits(&mut self, min: f32, max: f32) {
        self.output_min = min;
        self.output_max = max;
        self.integral = self.integral.clamp(min, max);
    }

    /// One PID iteration on measurement `input` against `setpoint`.
    /// Derivative-on-measurement, integrator clamped to the output range.
    pub fn compute(&mut self, input: f32, setpoint: f32) -> f32 {
        let error = setpoint - input;
        self.integral = (self.integral + self.ki_scaled * error)
            .clamp(self.output_min, self.output_max);
        let d_input = match self.last_input {
            Some(prev) => input - prev,
            None => 0.0,
        };
        self.last_input = Some(input);
        (self.kp * error + self.integral - self.kd_scaled * d_input)
            .clamp(self.output_min, self.output_max)
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_input = None;
    }

    #[cfg(test)]
    pub fn integral(&self) -> f32 {
        self.integral
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Discarding sensor samples while the ranger settles; motor stopped.
    WarmingUp { remaining: u32 },
    Active,
    /// Distance sanity lost; duty ramps down to zero until sanity returns.
    SafetyHold { hold_duty: u32 },
}

/// The PID position experiment. One instance lives for the duration of one
/// mode activation; `tick` is called once per control period with the
/// already-filtered distance (or `None` when the read failed or was out of
/// range).
pub struct PidPositionEngine {
    pid: PidState,
    phase: Phase,
    last_distance: Option<f32>,
    last_direction: Direction,
    last_duty: u32,
}

impl PidPositionEngine {
    pub fn start(shared: &SharedConfig) -> Self {
        let p = &shared.pid;
        Self {
            pid: PidState::new(
                p.kp,
                p.ki,
                p.kd,
                p.sample_time_ms,
                p.output_min,
                p.output_max,
            ),
            phase: if shared.loop_cfg.warmup_samples == 0 {
                Phase::Active
            } else {
                Phase::WarmingUp {
                    remaining: shared.loop_cfg.warmup_samples,
                }
            },
            last_distance: None,
            last_direction: Direction::Forward,
            last_duty: 0,
        }
    }

    /// One control tick. `distance_cm` is `None` when no sane reading was
    /// available this period. Consumes `shared.pid_dirty` when set.
    pub fn tick(
        &mut self,
        now_ms: u64,
        distance_cm: Option<f32>,
        shared: &mut SharedConfig,
    ) -> EngineOutput {
        // Parameter writes this tick take effect before compute. Gated on
        // the dirty flag so a re-send of identical gains does not disturb
        // the integrator.
        if shared.pid_dirty {
            let p = &shared.pid;
            self.pid.set_tunings(p.kp, p.ki, p.kd, p.sample_time_ms);
            self.pid.set_output_limits(p.output_min, p.output_max);
            shared.pid_dirty = false;
        }

        let sane = distance_cm.filter(|d| d.is_finite() && *d <= shared.loop_cfg.max_valid_cm);

        // Warmup counts real samples; a tick with no reading does not
        // advance it.
        if let Phase::WarmingUp { remaining } = self.phase {
            if distance_cm.is_some() {
                if remaining > 1 {
                    self.phase = Phase::WarmingUp {
                        remaining: remaining - 1,
                    };
                } else {
                    self.phase = Phase::Active;
                }
            }
            return EngineOutput::running(ActuatorCommand::stop(self.last_direction), None);
        }

        let Some(distance) = sane else {
            return self.safety_tick(shared);
        };

        // Sanity restored: resume closed-loop control.
        if matches!(self.phase, Phase::SafetyHold { .. }) {
            tracing::info!(distance, "distance sanity restored, resuming control");
            self.phase = Phase::Active;
            self.last_distance = None;
        }

        let p = &shared.pid;
        let error = p.reference_cm - distance;
        let output = self.pid.compute(distance, p.reference_cm);

        // Secondary stop: near-zero raw output, or near-zero damped error.
        // The damped error subtracts a velocity term so an approach that is
        // already coasting toward the reference does not get a late push.
        let velocity = match self.last_distance {
            Some(prev) => distance - prev,
            None => 0.0,
        };
        self.last_distance = Some(distance);
        let damped_error = error - p.damping_coefficient * velocity;
        let stopped = output.abs() <= p.dead_output_threshold
            || (p.kp * damped_error).abs() <= p.dead_output_threshold;

        let command = if stopped {
            ActuatorCommand::stop(self.last_direction)
        } else {
            let direction = if output >= 0.0 {
                Direction::Forward
            } else {
                Direction::Reverse
            };
            self.last_direction = direction;
            let duty = (output.abs() as u32)
                .saturating_add(shared.friction_pwm)
                .min(PWM_FULL_SCALE);
            ActuatorCommand { duty, direction }
        };
        self.last_duty = command.duty;

        let record = TelemetryRecord::Pid {
            time_ms: now_ms,
            distance_cm: distance,
            reference_cm: p.reference_cm,
            error_cm: error,
            kp: p.kp,
            ki: p.ki,
            kd: p.kd,
            output,
        };

        EngineOutput {
            command,
            record: Some(record),
            event: EngineEvent::None,
        }
    }

    fn safety_tick(&mut self, shared: &SharedConfig) -> EngineOutput {
        let hold_duty = match self.phase {
            Phase::SafetyHold { hold_duty } => {
                hold_duty.saturating_sub(shared.loop_cfg.safety_ramp_pwm)
            }
            // Entering the hold: ramp down from wherever control left off.
            _ => {
                tracing::warn!("distance sanity lost, ramping down");
                if shared.loop_cfg.safety_hold == SafetyHoldPolicy::ResetIntegrator {
                    self.pid.reset();
                }
                self.last_duty
                    .saturating_sub(shared.loop_cfg.safety_ramp_pwm)
            }
        };
        self.phase = Phase::SafetyHold { hold_duty };
        self.last_duty = hold_duty;
        EngineOutput::running(
            ActuatorCommand {
                duty: hold_duty,
                direction: self.last_direction,
            },
            None,
        )
    }
}
