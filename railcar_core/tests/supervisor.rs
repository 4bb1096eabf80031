//! Connection supervision: paced retries, resubscription, and keeping the
//! control loop alive while the link is down.

use railcar_core::config::SharedConfig;
use railcar_core::controller::ExperimentController;
use railcar_core::mocks::{FakeTransport, ScriptedSensor, SpyMotor, VecTelemetry};
use railcar_core::supervisor::ConnectionSupervisor;
use railcar_core::{Command, ExperimentMode};

fn subs() -> Vec<String> {
    vec!["trains/t1/pid/kp".to_string(), "trains/t1/pid/sync".to_string()]
}

#[test]
fn attempts_are_paced_by_the_retry_interval() {
    let transport = FakeTransport::new(u32::MAX); // never succeeds
    let probe = transport.clone();
    let mut sup = ConnectionSupervisor::new(transport, subs(), 1_000, 5);

    assert!(!sup.poll(0)); // first attempt fires immediately
    assert_eq!(sup.consecutive_failures(), 1);

    // Within the interval: no new attempt
    assert!(!sup.poll(400));
    assert!(!sup.poll(900));
    assert_eq!(sup.consecutive_failures(), 1);

    assert!(!sup.poll(1_000));
    assert_eq!(sup.consecutive_failures(), 2);
    assert!(probe.published().is_empty());
}

#[test]
fn success_resubscribes_and_resets_the_failure_count() {
    let transport = FakeTransport::new(2);
    let probe = transport.clone();
    let mut sup = ConnectionSupervisor::new(transport, subs(), 1_000, 5);

    assert!(!sup.poll(0));
    assert!(!sup.poll(1_000));
    assert!(sup.poll(2_000));
    assert!(sup.is_connected());
    assert_eq!(sup.consecutive_failures(), 0);
    assert_eq!(probe.subscriptions(), subs());
}

#[test]
fn connected_polls_skip_the_transport() {
    let transport = FakeTransport::new(0);
    let mut sup = ConnectionSupervisor::new(transport, subs(), 1_000, 5);
    assert!(sup.poll(0));
    // Once up, polling is a cheap no-op at any cadence
    assert!(sup.poll(1));
    assert!(sup.poll(2));
}

#[test]
fn publishes_are_dropped_while_down_and_flow_when_up() {
    let transport = FakeTransport::new(1);
    let probe = transport.clone();
    let mut sup = ConnectionSupervisor::new(transport, subs(), 1_000, 5);

    sup.poll(0);
    sup.publish("trains/t1/pid/kp/status", "2");
    assert!(probe.published().is_empty());

    sup.poll(1_000);
    assert!(sup.is_connected());
    sup.publish("trains/t1/pid/kp/status", "2");
    assert_eq!(
        probe.published(),
        vec![("trains/t1/pid/kp/status".to_string(), "2".to_string())]
    );
}

#[test]
fn inbound_messages_wait_until_connected() {
    let transport = FakeTransport::new(1);
    let probe = transport.clone();
    let mut sup = ConnectionSupervisor::new(transport, subs(), 1_000, 5);

    probe.inject("trains/t1/pid/kp", "2.5");
    sup.poll(0);
    assert_eq!(sup.try_recv(), None);

    sup.poll(1_000);
    assert_eq!(
        sup.try_recv(),
        Some(("trains/t1/pid/kp".to_string(), "2.5".to_string()))
    );
}

/// The controller must keep executing the active experiment while the
/// transport is unavailable, and later command traffic must still work.
#[test]
fn control_loop_survives_a_dead_link() {
    let mut cfg = SharedConfig::default();
    cfg.loop_cfg.warmup_samples = 0;
    cfg.pid.kp = 4.0;

    let motor = SpyMotor::default();
    let mut ctl = ExperimentController::new(
        ScriptedSensor::constant(5.0),
        motor.clone(),
        VecTelemetry::default(),
        cfg,
        1,
        None,
    );
    let tx = ctl.handle();
    tx.send(Command::Mode {
        mode: ExperimentMode::PidControl,
        start: true,
    })
    .unwrap();

    let transport = FakeTransport::new(3);
    let mut sup = ConnectionSupervisor::new(transport, subs(), 1_000, 2);

    let mut now = 0u64;
    for _ in 0..5 {
        sup.poll(now);
        while let Some((topic, payload)) = sup.try_recv() {
            // Normally routed through ParameterChannel; irrelevant here
            let _ = (topic, payload);
        }
        let report = ctl.tick(now).unwrap();
        assert_eq!(report.mode, ExperimentMode::PidControl);
        now += 1_000;
    }
    // The experiment ran every tick regardless of link state
    assert_eq!(motor.commands().len(), 5);
    assert!(sup.is_connected());
}
