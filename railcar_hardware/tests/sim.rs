use std::time::Duration;

use railcar_hardware::sim::sim_pair;
use railcar_hardware::{LoopbackTransport, UdpTelemetry};
use railcar_traits::{DistanceSensor, Motor, TelemetrySink, Transport};

#[test]
fn cart_stays_put_below_deadband() {
    let (mut motor, mut sensor) = sim_pair(20.0);
    sensor.rail().borrow_mut().noise_cm = 0.0;
    let deadband = sensor.rail().borrow().deadband_pwm;

    motor.set_drive(deadband, true).unwrap();
    let start = sensor.read(Duration::from_millis(100)).unwrap();
    for _ in 0..50 {
        sensor.read(Duration::from_millis(100)).unwrap();
    }
    let end = sensor.read(Duration::from_millis(100)).unwrap();
    assert!((end - start).abs() < 1e-3);
}

#[test]
fn cart_moves_forward_above_deadband() {
    let (mut motor, mut sensor) = sim_pair(20.0);
    sensor.rail().borrow_mut().noise_cm = 0.0;

    motor.set_drive(200, true).unwrap();
    let start = sensor.read(Duration::from_millis(100)).unwrap();
    for _ in 0..20 {
        sensor.read(Duration::from_millis(100)).unwrap();
    }
    let end = sensor.read(Duration::from_millis(100)).unwrap();
    assert!(end > start + 0.5, "expected motion, got {start} -> {end}");
}

#[test]
fn cart_coasts_to_rest_after_stop() {
    let (mut motor, mut sensor) = sim_pair(20.0);
    sensor.rail().borrow_mut().noise_cm = 0.0;

    motor.set_drive(300, true).unwrap();
    for _ in 0..10 {
        sensor.read(Duration::from_millis(100)).unwrap();
    }
    motor.stop().unwrap();
    for _ in 0..100 {
        sensor.read(Duration::from_millis(100)).unwrap();
    }
    let a = sensor.read(Duration::from_millis(100)).unwrap();
    let b = sensor.read(Duration::from_millis(100)).unwrap();
    assert!((b - a).abs() < 1e-2, "cart still moving: {a} -> {b}");
}

#[test]
fn reverse_drive_decreases_distance() {
    let (mut motor, mut sensor) = sim_pair(30.0);
    sensor.rail().borrow_mut().noise_cm = 0.0;

    motor.set_drive(200, false).unwrap();
    let start = sensor.read(Duration::from_millis(100)).unwrap();
    for _ in 0..20 {
        sensor.read(Duration::from_millis(100)).unwrap();
    }
    let end = sensor.read(Duration::from_millis(100)).unwrap();
    assert!(end < start);
}

#[test]
fn loopback_transport_roundtrip() {
    let mut t = LoopbackTransport::new();
    assert!(!t.is_connected());
    assert!(t.try_connect().unwrap());
    assert!(t.is_connected());

    t.subscribe("trains/t1/pid/kp").unwrap();
    assert_eq!(t.subscriptions(), ["trains/t1/pid/kp"]);

    t.inject("trains/t1/pid/kp", "2.5");
    assert_eq!(
        t.try_recv(),
        Some(("trains/t1/pid/kp".to_string(), "2.5".to_string()))
    );
    assert_eq!(t.try_recv(), None);

    t.publish("trains/t1/pid/kp/status", "2.5").unwrap();
    assert_eq!(
        t.take_outbound(),
        vec![("trains/t1/pid/kp/status".to_string(), "2.5".to_string())]
    );
}

#[test]
fn udp_telemetry_delivers_datagrams() {
    let receiver = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    receiver
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let dest = receiver.local_addr().unwrap();

    let mut sink = UdpTelemetry::new(dest).unwrap();
    sink.send("100,14.5,15,0.5,2,0,0,37").unwrap();

    let mut buf = [0u8; 256];
    let (n, _) = receiver.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"100,14.5,15,0.5,2,0,0,37");
}
