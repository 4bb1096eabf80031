//! Controller-level behavior: command draining, mode exclusivity, parameter
//! acks, and graceful degradation.

use railcar_core::config::SharedConfig;
use railcar_core::controller::{ExperimentController, Notice};
use railcar_core::mocks::{ScriptedSensor, SpyMotor, VecTelemetry};
use railcar_core::status::Outcome;
use railcar_core::{Command, ExperimentMode, ParamKey};

fn shared() -> SharedConfig {
    let mut s = SharedConfig::default();
    s.loop_cfg.warmup_samples = 0;
    s.pid.kp = 4.0;
    s
}

fn controller(
    sensor: ScriptedSensor,
    cfg: SharedConfig,
) -> (
    ExperimentController<ScriptedSensor, SpyMotor, VecTelemetry>,
    SpyMotor,
    VecTelemetry,
) {
    let motor = SpyMotor::default();
    let telemetry = VecTelemetry::default();
    let ctl = ExperimentController::new(sensor, motor.clone(), telemetry.clone(), cfg, 1, None);
    (ctl, motor, telemetry)
}

#[test]
fn idle_tick_touches_nothing() {
    let (mut ctl, motor, telemetry) = controller(ScriptedSensor::constant(20.0), shared());
    let report = ctl.tick(0).unwrap();
    assert_eq!(report.mode, ExperimentMode::Idle);
    assert_eq!(report.command.duty, 0);
    assert!(motor.commands().is_empty());
    assert!(telemetry.lines().is_empty());
}

#[test]
fn parameter_writes_apply_in_arrival_order() {
    let (mut ctl, _, _) = controller(ScriptedSensor::constant(20.0), shared());
    let tx = ctl.handle();
    tx.send(Command::SetParam {
        key: ParamKey::PidKp,
        value: 1.0,
    })
    .unwrap();
    tx.send(Command::SetParam {
        key: ParamKey::PidKp,
        value: 3.0,
    })
    .unwrap();

    let report = ctl.tick(0).unwrap();
    assert_eq!(
        report.notices,
        vec![
            Notice::Confirm {
                key: ParamKey::PidKp,
                value: 1.0
            },
            Notice::Confirm {
                key: ParamKey::PidKp,
                value: 3.0
            },
        ]
    );
    assert_eq!(ctl.shared().pid.kp, 3.0);
    assert!(ctl.shared().pid_dirty);
}

#[test]
fn repeated_identical_writes_are_idempotent() {
    let (mut ctl, _, _) = controller(ScriptedSensor::constant(20.0), shared());
    let tx = ctl.handle();
    for _ in 0..2 {
        tx.send(Command::SetParam {
            key: ParamKey::PidKd,
            value: 0.25,
        })
        .unwrap();
    }
    let report = ctl.tick(0).unwrap();
    assert_eq!(
        report.notices,
        vec![
            Notice::Confirm {
                key: ParamKey::PidKd,
                value: 0.25
            };
            2
        ]
    );
    assert_eq!(ctl.shared().pid.kd, 0.25);
}

#[test]
fn confirm_echoes_the_clamped_value() {
    let (mut ctl, _, _) = controller(ScriptedSensor::constant(20.0), shared());
    ctl.handle()
        .send(Command::SetParam {
            key: ParamKey::PidReference,
            value: 1_000.0,
        })
        .unwrap();
    let report = ctl.tick(0).unwrap();
    // Reference cannot exceed the sensor's valid range
    assert_eq!(
        report.notices,
        vec![Notice::Confirm {
            key: ParamKey::PidReference,
            value: 60.0
        }]
    );
}

#[test]
fn stop_wins_over_start_within_one_batch() {
    let (mut ctl, _, _) = controller(ScriptedSensor::constant(5.0), shared());
    let tx = ctl.handle();

    // Start first, then both arrive in the same drain, stop last
    tx.send(Command::Mode {
        mode: ExperimentMode::PidControl,
        start: true,
    })
    .unwrap();
    tx.send(Command::Mode {
        mode: ExperimentMode::PidControl,
        start: false,
    })
    .unwrap();
    let report = ctl.tick(0).unwrap();
    assert_eq!(report.mode, ExperimentMode::Idle);

    // Reverse arrival order: stop still wins
    tx.send(Command::Mode {
        mode: ExperimentMode::PidControl,
        start: false,
    })
    .unwrap();
    tx.send(Command::Mode {
        mode: ExperimentMode::PidControl,
        start: true,
    })
    .unwrap();
    let report = ctl.tick(50).unwrap();
    assert_eq!(report.mode, ExperimentMode::Idle);
}

#[test]
fn experiments_are_mutually_exclusive() {
    let (mut ctl, motor, _) = controller(ScriptedSensor::constant(5.0), shared());
    let tx = ctl.handle();
    tx.send(Command::Mode {
        mode: ExperimentMode::PidControl,
        start: true,
    })
    .unwrap();
    ctl.tick(0).unwrap();
    assert_eq!(ctl.mode(), ExperimentMode::PidControl);
    assert_eq!(motor.last_duty(), Some(40));

    // Starting another experiment halts the active one first, then begins
    // the new run. At no point do two engines run together.
    tx.send(Command::Mode {
        mode: ExperimentMode::DeadbandCalibration,
        start: true,
    })
    .unwrap();
    ctl.tick(50).unwrap();
    assert_eq!(ctl.mode(), ExperimentMode::DeadbandCalibration);
    assert!(motor.stop_count() >= 1);
}

#[test]
fn stop_and_start_of_different_modes_switches_in_one_batch() {
    let mut cfg = shared();
    cfg.step.amplitude_volts = 4.0;
    cfg.step.duration_ms = 500;
    let (mut ctl, _, _) = controller(ScriptedSensor::constant(5.0), cfg);
    let tx = ctl.handle();
    tx.send(Command::Mode {
        mode: ExperimentMode::PidControl,
        start: true,
    })
    .unwrap();
    ctl.tick(0).unwrap();
    assert_eq!(ctl.mode(), ExperimentMode::PidControl);

    // How the dashboards switch modes: unsync the running experiment and
    // sync the next one back to back. The stop only cancels a start for
    // its own mode, so the new experiment comes up in the same tick.
    tx.send(Command::Mode {
        mode: ExperimentMode::PidControl,
        start: false,
    })
    .unwrap();
    tx.send(Command::Mode {
        mode: ExperimentMode::StepResponse,
        start: true,
    })
    .unwrap();
    let report = ctl.tick(50).unwrap();
    assert_eq!(report.mode, ExperimentMode::StepResponse);
}

#[test]
fn unconfigured_step_start_stays_idle() {
    let mut cfg = shared();
    cfg.step.amplitude_volts = 0.0;
    let (mut ctl, _, _) = controller(ScriptedSensor::constant(5.0), cfg);
    ctl.handle()
        .send(Command::Mode {
            mode: ExperimentMode::StepResponse,
            start: true,
        })
        .unwrap();
    ctl.tick(0).unwrap();
    assert_eq!(ctl.mode(), ExperimentMode::Idle);
}

#[test]
fn pid_run_drives_motor_and_publishes_telemetry() {
    let (mut ctl, motor, telemetry) = controller(ScriptedSensor::constant(5.0), shared());
    ctl.handle()
        .send(Command::Mode {
            mode: ExperimentMode::PidControl,
            start: true,
        })
        .unwrap();
    let report = ctl.tick(0).unwrap();
    assert_eq!(report.mode, ExperimentMode::PidControl);
    // error = +10, kp = 4
    assert_eq!(motor.commands(), vec![(40, true)]);
    assert_eq!(telemetry.lines(), vec!["0,5,15,10,4,0,0,40".to_string()]);
}

#[test]
fn stopping_halts_the_motor() {
    let (mut ctl, motor, _) = controller(ScriptedSensor::constant(5.0), shared());
    let tx = ctl.handle();
    tx.send(Command::Mode {
        mode: ExperimentMode::PidControl,
        start: true,
    })
    .unwrap();
    ctl.tick(0).unwrap();
    assert_eq!(motor.last_duty(), Some(40));

    tx.send(Command::Mode {
        mode: ExperimentMode::PidControl,
        start: false,
    })
    .unwrap();
    let report = ctl.tick(50).unwrap();
    assert_eq!(report.mode, ExperimentMode::Idle);
    assert!(motor.stop_count() >= 1);
    assert_eq!(motor.last_duty(), Some(0));
}

#[test]
fn sensor_failure_degrades_without_erroring() {
    let sensor = ScriptedSensor::from_script([
        Ok(5.0),
        Err("echo timeout".to_string()),
        Err("echo timeout".to_string()),
        Ok(5.0),
    ]);
    let (mut ctl, _, _) = controller(sensor, shared());
    ctl.handle()
        .send(Command::Mode {
            mode: ExperimentMode::PidControl,
            start: true,
        })
        .unwrap();
    ctl.tick(0).unwrap();
    // Failed reads must not abort the loop or leave the mode
    let r1 = ctl.tick(50).unwrap();
    let r2 = ctl.tick(100).unwrap();
    assert_eq!(r1.mode, ExperimentMode::PidControl);
    assert_eq!(r2.mode, ExperimentMode::PidControl);
    // Recovery resumes driving
    let r3 = ctl.tick(150).unwrap();
    assert_eq!(r3.command.duty, 40);
}

#[test]
fn apply_without_calibration_reports_an_error() {
    let (mut ctl, _, _) = controller(ScriptedSensor::constant(20.0), shared());
    ctl.handle().send(Command::ApplyDeadband).unwrap();
    let report = ctl.tick(0).unwrap();
    assert!(matches!(
        report.notices.as_slice(),
        [Notice::DeadbandError { .. }]
    ));
    assert_eq!(ctl.shared().friction_pwm, 0);
}

#[test]
fn calibration_result_can_be_applied_as_friction() {
    let mut cfg = shared();
    {
        let d = &mut cfg.deadband;
        d.baseline_samples = 2;
        d.window_len = 1;
        d.samples_per_check = 1;
        d.confirm_count = 1;
        d.threshold_cm = 0.05;
        d.ramp_start_pwm = 50;
        d.min_motion_pwm = 10;
    }
    let sensor = ScriptedSensor::from_script([Ok(20.0), Ok(20.0), Ok(25.0)]);
    let (mut ctl, _, _) = controller(sensor, cfg);
    let tx = ctl.handle();

    tx.send(Command::Mode {
        mode: ExperimentMode::DeadbandCalibration,
        start: true,
    })
    .unwrap();
    ctl.tick(0).unwrap();
    ctl.tick(100).unwrap();
    let report = ctl.tick(200).unwrap();
    assert_eq!(
        report.notices,
        vec![Notice::Result(Outcome::DeadbandFound { pwm: 50 })]
    );
    assert_eq!(report.mode, ExperimentMode::Idle);

    tx.send(Command::ApplyDeadband).unwrap();
    let report = ctl.tick(300).unwrap();
    assert_eq!(report.notices, vec![Notice::DeadbandApplied { pwm: 50 }]);
    assert_eq!(ctl.shared().friction_pwm, 50);
}

#[test]
fn request_params_dumps_the_current_set() {
    let (mut ctl, _, _) = controller(ScriptedSensor::constant(20.0), shared());
    let tx = ctl.handle();
    tx.send(Command::SetParam {
        key: ParamKey::PidKi,
        value: 0.5,
    })
    .unwrap();
    tx.send(Command::RequestParams {
        mode: ExperimentMode::PidControl,
    })
    .unwrap();
    let report = ctl.tick(0).unwrap();
    let dump = report
        .notices
        .iter()
        .find_map(|n| match n {
            Notice::ParamDump { params, .. } => Some(params.clone()),
            _ => None,
        })
        .expect("expected a parameter dump");
    assert!(dump.contains(&(ParamKey::PidKi, 0.5)));
    assert!(dump.contains(&(ParamKey::PidKp, 4.0)));
}

#[test]
fn nonsense_parameter_values_do_not_poison_state() {
    let (mut ctl, _, _) = controller(ScriptedSensor::constant(20.0), shared());
    let tx = ctl.handle();
    tx.send(Command::SetParam {
        key: ParamKey::PidKp,
        value: f32::NAN,
    })
    .unwrap();
    tx.send(Command::SetParam {
        key: ParamKey::StepVbatt,
        value: -3.0,
    })
    .unwrap();
    ctl.tick(0).unwrap();
    assert_eq!(ctl.shared().pid.kp, 4.0);
    assert_eq!(ctl.shared().step.battery_volts, 8.0);
}
