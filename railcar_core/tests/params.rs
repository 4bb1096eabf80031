//! Parameter-channel routing: inbound topic parsing and outbound notice
//! mapping.

use crossbeam_channel::Receiver;
use railcar_core::controller::Notice;
use railcar_core::status::Outcome;
use railcar_core::topics::ParameterChannel;
use railcar_core::{Command, ExperimentMode, ParamKey};
use rstest::rstest;

fn channel() -> (ParameterChannel, Receiver<Command>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (ParameterChannel::new("trains/t1", tx), rx)
}

#[rstest]
#[case("trains/t1/pid/kp", "2.5", ParamKey::PidKp, 2.5)]
#[case("trains/t1/pid/ki", "0.1", ParamKey::PidKi, 0.1)]
#[case("trains/t1/pid/kd", "0.05", ParamKey::PidKd, 0.05)]
#[case("trains/t1/pid/ref", "18", ParamKey::PidReference, 18.0)]
#[case("trains/t1/step/amplitude", "4.0", ParamKey::StepAmplitude, 4.0)]
#[case("trains/t1/step/time", "3000", ParamKey::StepDuration, 3000.0)]
#[case("trains/t1/step/direction", "-1", ParamKey::StepDirection, -1.0)]
#[case("trains/t1/step/vbatt", "7.4", ParamKey::StepVbatt, 7.4)]
#[case("trains/t1/deadband/direction", "1", ParamKey::DeadbandDirection, 1.0)]
#[case("trains/t1/deadband/threshold", "0.3", ParamKey::DeadbandThreshold, 0.3)]
fn parameter_topics_route_to_set_commands(
    #[case] topic: &str,
    #[case] payload: &str,
    #[case] expect_key: ParamKey,
    #[case] expect_value: f32,
) {
    let (ch, rx) = channel();
    ch.on_message(topic, payload);
    match rx.try_recv().unwrap() {
        Command::SetParam { key, value } => {
            assert_eq!(key, expect_key);
            assert_eq!(value, expect_value);
        }
        other => panic!("expected SetParam, got {other:?}"),
    }
}

#[rstest]
#[case("true", true)]
#[case("1", true)]
#[case("false", false)]
#[case("0", false)]
// Python dashboards publish str(bool) capitalized
#[case("True", true)]
#[case("False", false)]
fn sync_topics_route_to_mode_commands(#[case] payload: &str, #[case] expect_start: bool) {
    let (ch, rx) = channel();
    ch.on_message("trains/t1/step/sync", payload);
    match rx.try_recv().unwrap() {
        Command::Mode { mode, start } => {
            assert_eq!(mode, ExperimentMode::StepResponse);
            assert_eq!(start, expect_start);
        }
        other => panic!("expected Mode, got {other:?}"),
    }
}

#[test]
fn request_and_apply_topics_route() {
    let (ch, rx) = channel();
    ch.on_message("trains/t1/deadband/request_params", "");
    ch.on_message("trains/t1/deadband/apply", "1");
    assert!(matches!(
        rx.try_recv().unwrap(),
        Command::RequestParams {
            mode: ExperimentMode::DeadbandCalibration
        }
    ));
    assert!(matches!(rx.try_recv().unwrap(), Command::ApplyDeadband));
}

#[test]
fn malformed_payloads_are_dropped() {
    let (ch, rx) = channel();
    ch.on_message("trains/t1/pid/kp", "fast");
    ch.on_message("trains/t1/pid/sync", "maybe");
    ch.on_message("trains/t1/pid/kp", "");
    assert!(rx.try_recv().is_err());
}

#[test]
fn unknown_and_foreign_topics_are_ignored() {
    let (ch, rx) = channel();
    ch.on_message("trains/t1/pid/unknown", "1.0");
    ch.on_message("trains/t2/pid/kp", "1.0");
    ch.on_message("pid/kp", "1.0");
    assert!(rx.try_recv().is_err());
}

#[test]
fn confirm_notices_publish_on_status_topics() {
    let (ch, _rx) = channel();
    let out = ch.outbound(&Notice::Confirm {
        key: ParamKey::PidKp,
        value: 2.5,
    });
    assert_eq!(
        out,
        vec![("trains/t1/pid/kp/status".to_string(), "2.5".to_string())]
    );
}

#[test]
fn param_dump_publishes_each_value() {
    let (ch, _rx) = channel();
    let out = ch.outbound(&Notice::ParamDump {
        mode: ExperimentMode::PidControl,
        params: vec![(ParamKey::PidKp, 2.0), (ParamKey::PidReference, 15.0)],
    });
    assert_eq!(
        out,
        vec![
            ("trains/t1/pid/kp/status".to_string(), "2".to_string()),
            ("trains/t1/pid/ref/status".to_string(), "15".to_string()),
        ]
    );
}

#[test]
fn outcomes_publish_on_result_topics() {
    let (ch, _rx) = channel();

    let out = ch.outbound(&Notice::Result(Outcome::StepComplete));
    assert_eq!(out, vec![("trains/t1/step/result".to_string(), "done".to_string())]);

    let out = ch.outbound(&Notice::Result(Outcome::DeadbandFound { pwm: 85 }));
    assert_eq!(
        out,
        vec![("trains/t1/deadband/result".to_string(), "85".to_string())]
    );

    let out = ch.outbound(&Notice::Result(Outcome::DeadbandTimedOut { fallback_pwm: 60 }));
    assert_eq!(
        out,
        vec![
            ("trains/t1/deadband/error".to_string(), "timeout".to_string()),
            ("trains/t1/deadband/result".to_string(), "60".to_string()),
        ]
    );

    let out = ch.outbound(&Notice::DeadbandApplied { pwm: 60 });
    assert_eq!(
        out,
        vec![("trains/t1/deadband/applied".to_string(), "60".to_string())]
    );
}
