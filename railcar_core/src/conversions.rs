//! `From` implementations bridging `railcar_config` types to `railcar_core`
//! runtime types.
//!
//! These eliminate manual field-by-field mapping in the CLI.

use crate::config::{
    DeadbandParams, LoopCfg, PidParams, SafetyHoldPolicy, SharedConfig, StepParams, Timeouts,
};

// ── PidParams ────────────────────────────────────────────────────────────────

impl From<&railcar_config::Config> for PidParams {
    fn from(c: &railcar_config::Config) -> Self {
        Self {
            kp: c.pid.kp,
            ki: c.pid.ki,
            kd: c.pid.kd,
            reference_cm: c.pid.reference_cm,
            sample_time_ms: c.control.sample_time_ms,
            output_min: c.pid.output_min,
            output_max: c.pid.output_max,
            dead_output_threshold: c.pid.dead_output_threshold,
            damping_coefficient: c.pid.damping_coefficient,
        }
    }
}

// ── StepParams ───────────────────────────────────────────────────────────────

impl From<&railcar_config::StepCfg> for StepParams {
    fn from(c: &railcar_config::StepCfg) -> Self {
        Self {
            amplitude_volts: c.amplitude_volts,
            duration_ms: c.duration_ms,
            direction: c.direction,
            battery_volts: c.battery_volts,
            warmup_samples: c.warmup_samples,
            baseline_samples: c.baseline_samples,
        }
    }
}

// ── DeadbandParams ───────────────────────────────────────────────────────────

impl From<&railcar_config::DeadbandCfg> for DeadbandParams {
    fn from(c: &railcar_config::DeadbandCfg) -> Self {
        Self {
            threshold_cm: c.threshold_cm,
            direction: c.direction,
            ramp_start_pwm: c.ramp_start_pwm,
            ramp_step_pwm: c.ramp_step_pwm,
            ramp_interval_ms: c.ramp_interval_ms,
            pwm_ceiling: c.pwm_ceiling,
            min_motion_pwm: c.min_motion_pwm,
            confirm_count: c.confirm_count,
            fallback_pwm: c.fallback_pwm,
            baseline_samples: c.baseline_samples,
            window_len: c.window_len,
            samples_per_check: c.samples_per_check,
        }
    }
}

// ── LoopCfg / Timeouts ───────────────────────────────────────────────────────

impl From<railcar_config::SafetyHold> for SafetyHoldPolicy {
    fn from(c: railcar_config::SafetyHold) -> Self {
        match c {
            railcar_config::SafetyHold::HoldIntegrator => Self::HoldIntegrator,
            railcar_config::SafetyHold::ResetIntegrator => Self::ResetIntegrator,
        }
    }
}

impl From<&railcar_config::ControlCfg> for LoopCfg {
    fn from(c: &railcar_config::ControlCfg) -> Self {
        Self {
            warmup_samples: c.warmup_samples,
            max_valid_cm: c.max_valid_cm,
            safety_ramp_pwm: c.safety_ramp_pwm,
            safety_hold: c.safety_hold.into(),
        }
    }
}

impl From<&railcar_config::ControlCfg> for Timeouts {
    fn from(c: &railcar_config::ControlCfg) -> Self {
        Self {
            sensor_ms: c.sensor_timeout_ms,
        }
    }
}

// ── SharedConfig ─────────────────────────────────────────────────────────────

impl From<&railcar_config::Config> for SharedConfig {
    fn from(c: &railcar_config::Config) -> Self {
        Self {
            pid: c.into(),
            pid_dirty: false,
            step: (&c.step).into(),
            deadband: (&c.deadband).into(),
            friction_pwm: c.pid.friction_pwm,
            loop_cfg: (&c.control).into(),
            timeouts: (&c.control).into(),
        }
    }
}
