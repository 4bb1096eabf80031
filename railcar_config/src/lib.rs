#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the railcar firmware.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - `DeviceCfg` carries the persisted device identity (id + topic prefix);
//!   the serial provisioning protocol that writes this file is out of scope.

use serde::Deserialize;

/// Persisted device identity. Loaded once at startup; immutable afterwards.
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceCfg {
    /// Unit identifier, e.g. "trainA".
    pub device_id: String,
    /// Per-device topic namespace. Defaults to `trains/<device_id>`.
    #[serde(default)]
    pub topic_prefix: Option<String>,
}

impl DeviceCfg {
    /// Effective topic prefix for all parameter/status topics.
    pub fn effective_prefix(&self) -> String {
        match &self.topic_prefix {
            Some(p) => p.trim_end_matches('/').to_string(),
            None => format!("trains/{}", self.device_id),
        }
    }
}

/// Network endpoints and connection-recovery tuning.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NetCfg {
    /// Destination for telemetry datagrams (host:port).
    pub telemetry_addr: String,
    /// Pub/sub broker address (host:port).
    pub broker_addr: String,
    /// Minimum interval between reconnection attempts (ms).
    pub retry_interval_ms: u64,
    /// Surface link diagnostics every Nth consecutive failure.
    pub diag_every_failures: u32,
}

impl Default for NetCfg {
    fn default() -> Self {
        Self {
            telemetry_addr: "127.0.0.1:5555".into(),
            broker_addr: "127.0.0.1:1883".into(),
            retry_interval_ms: 5_000,
            diag_every_failures: 5,
        }
    }
}

/// Control-loop cadence, filtering, and safety bounds shared by all modes.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ControlCfg {
    /// Fixed control period (ms).
    pub sample_time_ms: u64,
    /// Sensor samples discarded after mode entry while the ranger settles.
    pub warmup_samples: u32,
    /// Distances beyond this are treated as "no target in range" (cm).
    pub max_valid_cm: f32,
    /// Per-tick duty decrement while ramping down in safety hold.
    pub safety_ramp_pwm: u32,
    /// What the PID integrator does during a distance-sanity hold:
    /// "hold-integrator" keeps it running, "reset-integrator" clears it.
    pub safety_hold: SafetyHold,
    /// Max sensor wait per read (ms).
    pub sensor_timeout_ms: u64,
    /// Median prefilter window for the distance filter (1 = disabled).
    pub median_window: usize,
    /// Optional EMA smoothing factor in (0.0, 1.0]; absent disables EMA.
    pub ema_alpha: Option<f32>,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            sample_time_ms: 50,
            warmup_samples: 10,
            max_valid_cm: 60.0,
            safety_ramp_pwm: 30,
            safety_hold: SafetyHold::HoldIntegrator,
            sensor_timeout_ms: 150,
            median_window: 3,
            ema_alpha: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SafetyHold {
    #[default]
    HoldIntegrator,
    ResetIntegrator,
}

/// Default PID tunables; all remotely settable at runtime.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PidCfg {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Target distance (cm).
    pub reference_cm: f32,
    pub output_min: f32,
    pub output_max: f32,
    /// Outputs at or below this magnitude command zero duty.
    pub dead_output_threshold: f32,
    /// Velocity weighting for the secondary stop condition.
    pub damping_coefficient: f32,
    /// Static-friction compensation added to nonzero duty commands (PWM).
    pub friction_pwm: u32,
}

impl Default for PidCfg {
    fn default() -> Self {
        Self {
            kp: 2.0,
            ki: 0.0,
            kd: 0.0,
            reference_cm: 15.0,
            output_min: -850.0,
            output_max: 850.0,
            dead_output_threshold: 25.0,
            damping_coefficient: 0.0,
            friction_pwm: 0,
        }
    }
}

/// Step-response excitation defaults. Amplitude/duration default to zero so
/// a start is a no-op until the operator configures the experiment.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StepCfg {
    pub amplitude_volts: f32,
    pub duration_ms: u64,
    pub battery_volts: f32,
    /// 1 = forward, anything else = reverse.
    pub direction: i8,
    pub warmup_samples: u32,
    pub baseline_samples: u32,
}

impl Default for StepCfg {
    fn default() -> Self {
        Self {
            amplitude_volts: 0.0,
            duration_ms: 0,
            battery_volts: 8.0,
            direction: 1,
            warmup_samples: 20,
            baseline_samples: 50,
        }
    }
}

/// Dead-zone calibration tuning.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeadbandCfg {
    /// Configured motion threshold (cm); the effective threshold is
    /// max(threshold_cm, 3 * baseline noise stddev).
    pub threshold_cm: f32,
    pub direction: i8,
    /// Duty the ramp starts from.
    pub ramp_start_pwm: u32,
    /// Duty increment per ramp interval.
    pub ramp_step_pwm: u32,
    /// Minimum time between duty increments (ms).
    pub ramp_interval_ms: u64,
    /// Safety ceiling; reaching it ends the run as TimedOut.
    pub pwm_ceiling: u32,
    /// Deviations below this duty are ignored as near-zero-output noise.
    pub min_motion_pwm: u32,
    /// Consecutive over-threshold ticks required to confirm motion.
    pub confirm_count: u32,
    /// Fallback deadband applied when calibration times out.
    pub fallback_pwm: u32,
    /// Samples collected at rest for the baseline statistics.
    pub baseline_samples: usize,
    /// Sliding-window ring length.
    pub window_len: usize,
    /// Fresh samples averaged into the window per check.
    pub samples_per_check: usize,
}

impl Default for DeadbandCfg {
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

/// GPIO pin assignments (BCM numbering). Only consulted by hardware builds;
/// the simulation ignores this section.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PinsCfg {
    pub trigger: u8,
    pub echo: u8,
    pub motor_pwm: u8,
    pub motor_fwd: u8,
    pub motor_rev: u8,
}

impl Default for PinsCfg {
    fn default() -> Self {
        Self {
            trigger: 23,
            echo: 24,
            motor_pwm: 18,
            motor_fwd: 17,
            motor_rev: 27,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub device: DeviceCfg,
    #[serde(default)]
    pub net: NetCfg,
    #[serde(default)]
    pub control: ControlCfg,
    #[serde(default)]
    pub pid: PidCfg,
    #[serde(default)]
    pub step: StepCfg,
    #[serde(default)]
    pub deadband: DeadbandCfg,
    #[serde(default)]
    pub pins: PinsCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Device
        if self.device.device_id.trim().is_empty() {
            eyre::bail!("device.device_id must not be empty");
        }
        if self.device.effective_prefix().is_empty() {
            eyre::bail!("device.topic_prefix must not be empty");
        }

        // Net
        if self.net.retry_interval_ms == 0 {
            eyre::bail!("net.retry_interval_ms must be >= 1");
        }
        if self.net.diag_every_failures == 0 {
            eyre::bail!("net.diag_every_failures must be >= 1");
        }

        // Control
        if self.control.sample_time_ms == 0 {
            eyre::bail!("control.sample_time_ms must be >= 1");
        }
        if self.control.sample_time_ms > 1_000 {
            eyre::bail!("control.sample_time_ms is unreasonably large (>1s)");
        }
        if self.control.max_valid_cm <= 0.0 {
            eyre::bail!("control.max_valid_cm must be > 0");
        }
        if self.control.sensor_timeout_ms == 0 {
            eyre::bail!("control.sensor_timeout_ms must be >= 1");
        }
        if self.control.median_window == 0 {
            eyre::bail!("control.median_window must be >= 1");
        }
        if let Some(alpha) = self.control.ema_alpha
            && !(alpha > 0.0 && alpha <= 1.0)
        {
            eyre::bail!("control.ema_alpha must be in (0.0, 1.0]");
        }

        // PID
        if self.pid.output_min >= self.pid.output_max {
            eyre::bail!("pid.output_min must be < pid.output_max");
        }
        if self.pid.dead_output_threshold < 0.0 {
            eyre::bail!("pid.dead_output_threshold must be >= 0");
        }
        if !self.pid.kp.is_finite() || !self.pid.ki.is_finite() || !self.pid.kd.is_finite() {
            eyre::bail!("pid gains must be finite");
        }

        // Step
        if self.step.battery_volts <= 0.0 {
            eyre::bail!("step.battery_volts must be > 0");
        }
        if self.step.amplitude_volts < 0.0 {
            eyre::bail!("step.amplitude_volts must be >= 0");
        }

        // Deadband
        if self.deadband.ramp_step_pwm == 0 {
            eyre::bail!("deadband.ramp_step_pwm must be >= 1");
        }
        if self.deadband.pwm_ceiling == 0 {
            eyre::bail!("deadband.pwm_ceiling must be >= 1");
        }
        if self.deadband.confirm_count == 0 {
            eyre::bail!("deadband.confirm_count must be >= 1");
        }
        if self.deadband.baseline_samples < 2 {
            eyre::bail!("deadband.baseline_samples must be >= 2");
        }
        if self.deadband.window_len == 0 {
            eyre::bail!("deadband.window_len must be >= 1");
        }
        if self.deadband.samples_per_check == 0 {
            eyre::bail!("deadband.samples_per_check must be >= 1");
        }
        if self.deadband.threshold_cm <= 0.0 {
            eyre::bail!("deadband.threshold_cm must be > 0");
        }

        // Pins
        let pins = [
            self.pins.trigger,
            self.pins.echo,
            self.pins.motor_pwm,
            self.pins.motor_fwd,
            self.pins.motor_rev,
        ];
        for (i, a) in pins.iter().enumerate() {
            if pins[i + 1..].contains(a) {
                eyre::bail!("pins must be distinct (BCM {a} assigned twice)");
            }
        }

        Ok(())
    }
}
