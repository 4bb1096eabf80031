//! Control-loop assembly and execution: hardware/sim selection, transport
//! supervision, and the paced tick loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use railcar_config::Config;
use railcar_core::{
    Command, ConnectionSupervisor, ExperimentController, ExperimentMode, ParameterChannel,
    SharedConfig,
};
use railcar_hardware::{LoopbackTransport, UdpTelemetry};
use railcar_traits::{Clock, DistanceSensor, MonotonicClock, Motor};

use crate::cli::RtLock;
use crate::rt::setup_rt_once;

pub struct RunOpts {
    pub ticks: Option<u64>,
    pub duration_s: Option<u64>,
    pub rt: bool,
    pub rt_prio: Option<i32>,
    pub rt_lock: Option<RtLock>,
    pub rt_cpu: Option<usize>,
}

pub fn run(cfg: &Config, opts: &RunOpts) -> eyre::Result<()> {
    // Real-time mode setup (Linux/macOS), once per process
    #[cfg(target_os = "linux")]
    {
        let mode = opts.rt_lock.unwrap_or_else(RtLock::os_default);
        setup_rt_once(opts.rt, opts.rt_prio, mode, opts.rt_cpu);
    }
    #[cfg(target_os = "macos")]
    {
        let mode = opts.rt_lock.unwrap_or_else(RtLock::os_default);
        let _ = (opts.rt_prio, opts.rt_cpu); // silence unused on non-Linux builds
        setup_rt_once(opts.rt, mode);
    }

    #[cfg(feature = "hardware")]
    {
        // Control must not start without working hardware; retry until the
        // peripherals come up.
        let sensor = retry_init("HC-SR04 pins", || {
            railcar_hardware::UltrasonicSensor::new(cfg.pins.trigger, cfg.pins.echo)
        });
        let motor = retry_init("motor pins", || {
            railcar_hardware::DriveMotor::new(
                cfg.pins.motor_pwm,
                cfg.pins.motor_fwd,
                cfg.pins.motor_rev,
                railcar_core::PWM_FULL_SCALE,
            )
        });
        tracing::info!(
            trigger = cfg.pins.trigger,
            echo = cfg.pins.echo,
            "hardware backends ready"
        );
        return control_loop(sensor, motor, cfg, opts);
    }
    #[cfg(not(feature = "hardware"))]
    {
        let (motor, sensor) = railcar_hardware::sim::sim_pair(30.0);
        tracing::info!("running against the rail simulation");
        return control_loop(sensor, motor, cfg, opts);
    }
    #[allow(unreachable_code)]
    Ok(())
}

#[cfg(feature = "hardware")]
fn retry_init<T>(what: &str, mut init: impl FnMut() -> railcar_hardware::error::Result<T>) -> T {
    let mut attempt = 0u32;
    loop {
        match init() {
            Ok(v) => return v,
            Err(e) => {
                attempt += 1;
                tracing::warn!(what, attempt, error = %e, "hardware init failed; retrying");
                std::thread::sleep(Duration::from_secs(1));
            }
        }
    }
}

fn control_loop<S, M>(sensor: S, motor: M, cfg: &Config, opts: &RunOpts) -> eyre::Result<()>
where
    S: DistanceSensor,
    M: Motor,
{
    let telemetry_addr: std::net::SocketAddr = cfg
        .net
        .telemetry_addr
        .parse()
        .wrap_err_with(|| format!("bad net.telemetry_addr {:?}", cfg.net.telemetry_addr))?;
    let telemetry = UdpTelemetry::new(telemetry_addr).wrap_err("open telemetry socket")?;

    let shared = SharedConfig::from(cfg);
    let mut controller = ExperimentController::new(
        sensor,
        motor,
        telemetry,
        shared,
        cfg.control.median_window,
        cfg.control.ema_alpha,
    );
    let channel = ParameterChannel::new(cfg.device.effective_prefix(), controller.handle());

    // The broker client sits behind the Transport trait; without one
    // configured we run the in-process loopback and note the address.
    tracing::info!(
        broker = %cfg.net.broker_addr,
        prefix = %cfg.device.effective_prefix(),
        "command link: in-process loopback"
    );
    let mut supervisor = ConnectionSupervisor::new(
        LoopbackTransport::new(),
        channel.subscriptions(),
        cfg.net.retry_interval_ms,
        cfg.net.diag_every_failures,
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .wrap_err("install Ctrl-C handler")?;
    }

    let clock = MonotonicClock::new();
    let epoch = clock.now();
    let period = Duration::from_millis(cfg.control.sample_time_ms);
    let mut ticks: u64 = 0;

    tracing::info!(
        device = %cfg.device.device_id,
        period_ms = cfg.control.sample_time_ms,
        "control loop started"
    );

    while !shutdown.load(Ordering::Relaxed) {
        let now_ms = clock.ms_since(epoch);
        supervisor.poll(now_ms);
        while let Some((topic, payload)) = supervisor.try_recv() {
            channel.on_message(&topic, &payload);
        }

        let report = controller.tick(now_ms)?;
        for notice in &report.notices {
            for (topic, payload) in channel.outbound(notice) {
                supervisor.publish(&topic, &payload);
            }
        }

        ticks += 1;
        if let Some(limit) = opts.ticks
            && ticks >= limit
        {
            break;
        }
        if let Some(secs) = opts.duration_s
            && now_ms >= secs.saturating_mul(1_000)
        {
            break;
        }

        // Sleep out the remainder of the control period
        let spent = clock.ms_since(epoch).saturating_sub(now_ms);
        if spent < cfg.control.sample_time_ms {
            clock.sleep(period - Duration::from_millis(spent));
        }
    }

    // Park the actuator before exit
    let mode = controller.mode();
    if mode != ExperimentMode::Idle {
        let _ = controller
            .handle()
            .send(Command::Mode { mode, start: false });
        controller.tick(clock.ms_since(epoch))?;
        tracing::info!("actuator parked");
    }
    tracing::info!(ticks, "control loop stopped");
    Ok(())
}
