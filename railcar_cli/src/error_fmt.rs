//! Human-readable error descriptions and stable exit codes.

use railcar_core::{BuildError, CoreError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSensor => {
                "What happened: No distance sensor was provided to the controller.\nLikely causes: The HC-SR04 failed to initialize or was not wired into the builder.\nHow to fix: Check [pins] trigger/echo in the config and GPIO permissions.".to_string()
            }
            BuildError::MissingMotor => {
                "What happened: No motor was provided to the controller.\nLikely causes: The H-bridge driver failed to initialize or was not wired into the builder.\nHow to fix: Check [pins] motor_* in the config and GPIO permissions.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See README for a sample."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CoreError>() {
        return match ce {
            CoreError::SensorTimeout => {
                "What happened: Distance sensor read timed out.\nLikely causes: HC-SR04 not wired correctly, no power/ground, or timeout too low.\nHow to fix: Verify trigger/echo pins and power, and consider raising control.sensor_timeout_ms.".to_string()
            }
            CoreError::Hardware(msg) | CoreError::HardwareFault(msg) => format!(
                "What happened: Hardware fault ({msg}).\nLikely causes: GPIO initialization failure or a wiring problem.\nHow to fix: Check the [pins] section and make sure the process may access GPIO."
            ),
            CoreError::Transport(msg) => format!(
                "What happened: Link error ({msg}).\nLikely causes: Broker unreachable or connection refused.\nHow to fix: Check net.broker_addr; the control loop keeps running and retries on its own."
            ),
            CoreError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nHow to fix: Edit the TOML config and try again."
            ),
            CoreError::State(msg) => format!(
                "What happened: {msg}.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("config") {
        return format!(
            "What happened: Configuration problem.\nHow to fix: Edit the TOML config and try again. Original: {msg}"
        );
    }
    if lower.contains("telemetry") || lower.contains("socket") {
        return format!(
            "What happened: Could not open the telemetry socket.\nLikely causes: Bad net.telemetry_addr or no free ephemeral port.\nHow to fix: Check net.telemetry_addr (host:port). Original: {msg}"
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Map typed errors to stable exit codes; untyped errors return 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<CoreError>() {
        Some(CoreError::Config(_)) => 2,
        Some(CoreError::SensorTimeout) => 3,
        Some(CoreError::Hardware(_) | CoreError::HardwareFault(_)) => 4,
        Some(CoreError::Transport(_)) => 5,
        _ => 1,
    }
}
