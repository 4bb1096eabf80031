//! Runtime parameter structs shared by the controller and the experiment
//! engines. These are the mutable mirrors of the file-level config in
//! `railcar_config`; every field here can change while the firmware runs.

/// PID tunables. Remote writes land here; the live compute state only picks
/// them up when `dirty` is raised, so in-flight integrator/derivative history
/// survives a re-send of unchanged gains.
#[derive(Debug, Clone)]
pub struct PidParams {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Target distance from the wall sensor (cm).
    pub reference_cm: f32,
    /// Control period (ms). Integral/derivative terms are scaled by this.
    pub sample_time_ms: u64,
    pub output_min: f32,
    pub output_max: f32,
    /// Raw outputs at or below this magnitude command zero duty.
    pub dead_output_threshold: f32,
    /// Weight of the velocity term in the secondary stop condition.
    pub damping_coefficient: f32,
}

impl Default for PidParams {
    fn default() -> Self {
        Self {
            kp: 2.0,
            ki: 0.0,
            kd: 0.0,
            reference_cm: 15.0,
            sample_time_ms: 50,
            output_min: -850.0,
            output_max: 850.0,
            dead_output_threshold: 25.0,
            damping_coefficient: 0.0,
        }
    }
}

/// Step-response excitation parameters. Zero amplitude or duration makes a
/// start request a no-op.
#[derive(Debug, Clone)]
pub struct StepParams {
    pub amplitude_volts: f32,
    pub duration_ms: u64,
    /// 1 = forward, anything else = reverse (wire convention).
    pub direction: i8,
    /// Supply voltage used to scale volts into duty counts.
    pub battery_volts: f32,
    /// Samples discarded while the sensor settles, not published.
    pub warmup_samples: u32,
    /// Zero-input samples published before the step lands.
    pub baseline_samples: u32,
}

impl Default for StepParams {
    fn default() -> Self {
        Self {
            amplitude_volts: 0.0,
            duration_ms: 0,
            direction: 1,
            battery_volts: 8.0,
            warmup_samples: 20,
            baseline_samples: 50,
        }
    }
}

/// Dead-zone calibration parameters.
#[derive(Debug, Clone)]
pub struct DeadbandParams {
    /// Configured motion threshold (cm). The effective threshold is
    /// max(threshold_cm, 3 * baseline noise stddev).
    pub threshold_cm: f32,
    pub direction: i8,
    pub ramp_start_pwm: u32,
    pub ramp_step_pwm: u32,
    pub ramp_interval_ms: u64,
    /// Safety ceiling; reaching it ends the run as timed out.
    pub pwm_ceiling: u32,
    /// Detections at or below this duty are discarded as noise.
    pub min_motion_pwm: u32,
    /// Consecutive over-threshold checks required to confirm motion.
    pub confirm_count: u32,
    /// Applied instead of a measured value when the ramp times out.
    pub fallback_pwm: u32,
    /// Rest samples collected for the baseline statistics.
    pub baseline_samples: usize,
    /// Sliding window length for the motion check.
    pub window_len: usize,
    /// Fresh samples averaged into the window per check.
    pub samples_per_check: usize,
}

impl Default for DeadbandParams {
    fn default() -> Self {
        Self {
            threshold_cm: 0.3,
            direction: 1,
            ramp_start_pwm: 0,
            ramp_step_pwm: 5,
            ramp_interval_ms: 100,
            pwm_ceiling: 500,
            min_motion_pwm: 40,
            confirm_count: 3,
            fallback_pwm: 60,
            baseline_samples: 50,
            window_len: 8,
            samples_per_check: 2,
        }
    }
}

/// What the PID integrator does while distance sanity is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SafetyHoldPolicy {
    /// Freeze the integrator at its pre-hold value.
    #[default]
    HoldIntegrator,
    /// Clear the integrator; control restarts from proportional-only.
    ResetIntegrator,
}

/// Loop-level settings shared by all experiment modes.
#[derive(Debug, Clone)]
pub struct LoopCfg {
    /// Sensor samples discarded after mode entry.
    pub warmup_samples: u32,
    /// Readings beyond this are treated as "no target in range" (cm).
    pub max_valid_cm: f32,
    /// Per-tick duty decrement while ramping down in safety hold.
    pub safety_ramp_pwm: u32,
    pub safety_hold: SafetyHoldPolicy,
}

impl Default for LoopCfg {
    fn default() -> Self {
        Self {
            warmup_samples: 10,
            max_valid_cm: 60.0,
            safety_ramp_pwm: 30,
            safety_hold: SafetyHoldPolicy::HoldIntegrator,
        }
    }
}

/// Timeouts and watchdogs.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Max sensor wait per read (ms).
    pub sensor_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { sensor_ms: 150 }
    }
}

/// All remotely-settable state, owned by the controller and handed to
/// engines by reference each tick.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    pub pid: PidParams,
    /// Raised by any PID gain/clamp write; consumed by the PID engine when it
    /// re-applies tunings.
    pub pid_dirty: bool,
    pub step: StepParams,
    pub deadband: DeadbandParams,
    /// Static-friction compensation added to every nonzero PID duty command.
    pub friction_pwm: u32,
    pub loop_cfg: LoopCfg,
    pub timeouts: Timeouts,
}
