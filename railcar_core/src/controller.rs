//! The single-threaded experiment controller: drains commands, samples the
//! sensor, ticks whichever experiment engine is active, and drives the
//! actuator. Exactly one experiment runs at a time.

use std::time::Duration;

use crossbeam_channel::{Receiver, unbounded};
use railcar_traits::{DistanceSensor, Motor, TelemetrySink};

use crate::actuator::{ActuatorCommand, MotorActuator};
use crate::command::{Command, CommandSender, ExperimentMode, ParamKey};
use crate::config::SharedConfig;
use crate::deadband::DeadbandEngine;
use crate::error::Result;
use crate::filter::DistanceFilter;
use crate::hw_error::map_hw_error_dyn;
use crate::pid::PidPositionEngine;
use crate::status::{EngineEvent, EngineOutput, Outcome};
use crate::step::StepResponseEngine;

/// Outbound acknowledgements produced by a tick; the caller forwards them to
/// the parameter channel for publishing.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Echo of a parameter write, carrying the value actually stored.
    Confirm { key: ParamKey, value: f32 },
    /// Full parameter set for one mode, in response to a request.
    ParamDump {
        mode: ExperimentMode,
        params: Vec<(ParamKey, f32)>,
    },
    /// Terminal outcome of a self-terminating experiment.
    Result(Outcome),
    /// The calibration value now applied as friction compensation.
    DeadbandApplied { pwm: u32 },
    /// An apply request arrived with no calibration result to apply.
    DeadbandError { message: String },
}

/// What one controller tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub mode: ExperimentMode,
    /// Last actuator command issued this tick (post-clamp).
    pub command: ActuatorCommand,
    pub notices: Vec<Notice>,
}

/// Owns all experiment state. `tick` must be called once per control period
/// with a monotonic timestamp; it never blocks.
pub struct ExperimentController<S: DistanceSensor, M: Motor, T: TelemetrySink> {
    sensor: S,
    actuator: MotorActuator<M>,
    telemetry: T,
    filter: DistanceFilter,
    shared: SharedConfig,
    mode: ExperimentMode,
    pid: Option<PidPositionEngine>,
    step: Option<StepResponseEngine>,
    deadband: Option<DeadbandEngine>,
    tx: CommandSender,
    rx: Receiver<Command>,
    /// Most recent calibration result (found or fallback), consumable by an
    /// apply request.
    last_calibration: Option<u32>,
}

impl<S: DistanceSensor, M: Motor, T: TelemetrySink> ExperimentController<S, M, T> {
    pub fn new(
        sensor: S,
        motor: M,
        telemetry: T,
        shared: SharedConfig,
        median_window: usize,
        ema_alpha: Option<f32>,
    ) -> Self {
        let (tx, rx) = unbounded();
        Self {
            sensor,
            actuator: MotorActuator::new(motor),
            telemetry,
            filter: DistanceFilter::new(median_window, ema_alpha),
            shared,
            mode: ExperimentMode::Idle,
            pid: None,
            step: None,
            deadband: None,
            tx,
            rx,
            last_calibration: None,
        }
    }

    /// Cloneable sender for feeding commands from the parameter channel.
    pub fn handle(&self) -> CommandSender {
        self.tx.clone()
    }

    pub fn mode(&self) -> ExperimentMode {
        self.mode
    }

    pub fn shared(&self) -> &SharedConfig {
        &self.shared
    }

    /// One control period. Order is fixed: drain commands (parameter writes
    /// land before any compute), apply mode transitions, sample, tick the
    /// active engine, drive the actuator, publish telemetry.
    pub fn tick(&mut self, now_ms: u64) -> Result<TickReport> {
        let mut notices = Vec::new();

        // Staged mode transitions for this batch. A stop wins over a start
        // for the same mode regardless of arrival order; a start for a
        // different mode goes through after the stop.
        let mut want_stop: Option<ExperimentMode> = None;
        let mut want_start: Option<ExperimentMode> = None;

        while let Ok(cmd) = self.rx.try_recv() {
            match cmd {
                Command::SetParam { key, value } => {
                    let applied = self.apply_param(key, value);
                    notices.push(Notice::Confirm {
                        key,
                        value: applied,
                    });
                }
                Command::Mode { mode, start } => {
                    if start {
                        want_start = Some(mode);
                    } else {
                        want_stop = Some(mode);
                    }
                }
                Command::RequestParams { mode } => {
                    notices.push(Notice::ParamDump {
                        mode,
                        params: self.param_dump(mode),
                    });
                }
                Command::ApplyDeadband => match self.last_calibration {
                    Some(pwm) => {
                        self.shared.friction_pwm = pwm;
                        tracing::info!(pwm, "deadband applied as friction compensation");
                        notices.push(Notice::DeadbandApplied { pwm });
                    }
                    None => {
                        notices.push(Notice::DeadbandError {
                            message: "no calibration result available".into(),
                        });
                    }
                },
            }
        }

        if let Some(mode) = want_stop {
            if want_start == Some(mode) {
                want_start = None;
            }
            self.stop_experiment(mode)?;
        }
        if let Some(mode) = want_start {
            self.start_experiment(mode)?;
        }

        // Sample. A failed or out-of-range read becomes `None`; engines
        // decide what losing the measurement means for them.
        let distance = self.sample();

        let output = match self.mode {
            ExperimentMode::Idle => None,
            ExperimentMode::PidControl => self
                .pid
                .as_mut()
                .map(|e| e.tick(now_ms, distance, &mut self.shared)),
            ExperimentMode::StepResponse => {
                self.step.as_mut().map(|e| e.tick(now_ms, distance))
            }
            ExperimentMode::DeadbandCalibration => self
                .deadband
                .as_mut()
                .map(|e| e.tick(now_ms, distance, &self.shared)),
        };

        let command = match output {
            Some(EngineOutput {
                command,
                record,
                event,
            }) => {
                self.actuator.apply(command)?;
                if let Some(record) = record
                    && let Err(e) = self.telemetry.send(&record.to_line())
                {
                    tracing::warn!(error = %e, "telemetry send failed");
                }
                if let EngineEvent::Finished(outcome) = event {
                    self.finish(outcome, &mut notices);
                }
                command
            }
            None => {
                // Idle (or an engine slot that was unexpectedly empty):
                // guarantee the actuator is unpowered.
                if self.actuator.last_command().duty != 0 {
                    self.actuator.halt()?;
                }
                self.actuator.last_command()
            }
        };

        Ok(TickReport {
            mode: self.mode,
            command,
            notices,
        })
    }

    fn sample(&mut self) -> Option<f32> {
        let timeout = Duration::from_millis(self.shared.timeouts.sensor_ms);
        match self.sensor.read(timeout) {
            Ok(raw) if raw.is_finite() && raw >= 0.0 => Some(self.filter.update(raw)),
            Ok(raw) => {
                tracing::warn!(raw, "discarding nonsensical distance sample");
                None
            }
            Err(e) => {
                let mapped = map_hw_error_dyn(&*e);
                tracing::warn!(error = %mapped, "sensor read failed");
                None
            }
        }
    }

    /// Store one parameter write, clamping where the raw value would be
    /// unusable, and return what was stored.
    fn apply_param(&mut self, key: ParamKey, value: f32) -> f32 {
        let applied = match key {
            ParamKey::PidKp => {
                self.shared.pid.kp = finite_or(value, self.shared.pid.kp);
                self.shared.pid_dirty = true;
                self.shared.pid.kp
            }
            ParamKey::PidKi => {
                self.shared.pid.ki = finite_or(value, self.shared.pid.ki);
                self.shared.pid_dirty = true;
                self.shared.pid.ki
            }
            ParamKey::PidKd => {
                self.shared.pid.kd = finite_or(value, self.shared.pid.kd);
                self.shared.pid_dirty = true;
                self.shared.pid.kd
            }
            ParamKey::PidReference => {
                let max = self.shared.loop_cfg.max_valid_cm;
                self.shared.pid.reference_cm =
                    finite_or(value, self.shared.pid.reference_cm).clamp(0.0, max);
                self.shared.pid.reference_cm
            }
            ParamKey::StepAmplitude => {
                let vb = self.shared.step.battery_volts;
                self.shared.step.amplitude_volts =
                    finite_or(value, self.shared.step.amplitude_volts).clamp(0.0, vb);
                self.shared.step.amplitude_volts
            }
            ParamKey::StepDuration => {
                self.shared.step.duration_ms = finite_or(value, 0.0).max(0.0) as u64;
                self.shared.step.duration_ms as f32
            }
            ParamKey::StepDirection => {
                self.shared.step.direction = if value == 1.0 { 1 } else { -1 };
                f32::from(self.shared.step.direction)
            }
            ParamKey::StepVbatt => {
                if value.is_finite() && value > 0.0 {
                    self.shared.step.battery_volts = value;
                }
                self.shared.step.battery_volts
            }
            ParamKey::DeadbandDirection => {
                self.shared.deadband.direction = if value == 1.0 { 1 } else { -1 };
                f32::from(self.shared.deadband.direction)
            }
            ParamKey::DeadbandThreshold => {
                if value.is_finite() && value > 0.0 {
                    self.shared.deadband.threshold_cm = value;
                }
                self.shared.deadband.threshold_cm
            }
        };
        tracing::debug!(?key, value, applied, "parameter stored");
        applied
    }

    fn param_dump(&self, mode: ExperimentMode) -> Vec<(ParamKey, f32)> {
        match mode {
            ExperimentMode::PidControl => vec![
                (ParamKey::PidKp, self.shared.pid.kp),
                (ParamKey::PidKi, self.shared.pid.ki),
                (ParamKey::PidKd, self.shared.pid.kd),
                (ParamKey::PidReference, self.shared.pid.reference_cm),
            ],
            ExperimentMode::StepResponse => vec![
                (ParamKey::StepAmplitude, self.shared.step.amplitude_volts),
                (ParamKey::StepDuration, self.shared.step.duration_ms as f32),
                (
                    ParamKey::StepDirection,
                    f32::from(self.shared.step.direction),
                ),
                (ParamKey::StepVbatt, self.shared.step.battery_volts),
            ],
            ExperimentMode::DeadbandCalibration => vec![
                (
                    ParamKey::DeadbandDirection,
                    f32::from(self.shared.deadband.direction),
                ),
                (
                    ParamKey::DeadbandThreshold,
                    self.shared.deadband.threshold_cm,
                ),
            ],
            ExperimentMode::Idle => Vec::new(),
        }
    }

    /// Begin an experiment. A different experiment already running is fully
    /// stopped first (engines cleared, actuator halted); a start for the mode
    /// already running is a no-op.
    fn start_experiment(&mut self, mode: ExperimentMode) -> Result<()> {
        if self.mode == mode {
            return Ok(());
        }
        if self.mode != ExperimentMode::Idle {
            tracing::info!(
                current = ?self.mode,
                requested = ?mode,
                "switching experiments"
            );
            self.stop_experiment(self.mode)?;
        }
        match mode {
            ExperimentMode::Idle => {}
            ExperimentMode::PidControl => {
                self.filter.reset();
                self.pid = Some(PidPositionEngine::start(&self.shared));
                self.mode = mode;
                tracing::info!("pid control started");
            }
            ExperimentMode::StepResponse => {
                if let Some(engine) = StepResponseEngine::start(&self.shared) {
                    self.filter.reset();
                    self.step = Some(engine);
                    self.mode = mode;
                    tracing::info!("step response started");
                }
            }
            ExperimentMode::DeadbandCalibration => {
                self.filter.reset();
                self.deadband = Some(DeadbandEngine::start(&self.shared));
                self.mode = mode;
                tracing::info!("deadband calibration started");
            }
        }
        Ok(())
    }

    fn stop_experiment(&mut self, mode: ExperimentMode) -> Result<()> {
        if self.mode != mode || mode == ExperimentMode::Idle {
            return Ok(());
        }
        self.pid = None;
        self.step = None;
        self.deadband = None;
        self.mode = ExperimentMode::Idle;
        self.actuator.halt()?;
        tracing::info!(?mode, "experiment stopped");
        Ok(())
    }

    fn finish(&mut self, outcome: Outcome, notices: &mut Vec<Notice>) {
        match outcome {
            Outcome::DeadbandFound { pwm } => self.last_calibration = Some(pwm),
            Outcome::DeadbandTimedOut { fallback_pwm } => {
                self.last_calibration = Some(fallback_pwm);
            }
            Outcome::StepComplete => {}
        }
        self.pid = None;
        self.step = None;
        self.deadband = None;
        self.mode = ExperimentMode::Idle;
        notices.push(Notice::Result(outcome));
        tracing::info!(?outcome, "experiment finished");
    }
}

#[inline]
fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}
