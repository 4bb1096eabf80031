#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core experiment logic (hardware-agnostic).
//!
//! This crate provides the hardware-independent experiment controller for a
//! rail-bound cart. All hardware interactions go through the
//! `railcar_traits` boundary traits (`DistanceSensor`, `Motor`,
//! `TelemetrySink`, `Transport`).
//!
//! ## Architecture
//!
//! - **Controller**: single-threaded state machine multiplexing the
//!   experiment modes (`controller` module)
//! - **Engines**: PID position hold (`pid`), open-loop step response
//!   (`step`), dead-zone calibration (`deadband`)
//! - **Filtering**: median prefilter + EMA smoothing over distance samples
//! - **Parameter channel**: topic routing to/from the command channel
//!   (`topics` module)
//! - **Supervision**: rate-limited, non-blocking link recovery
//!   (`supervisor` module)
//!
//! The controller never blocks: sensor reads are bounded by a timeout,
//! commands are drained with `try_recv`, and connection recovery is paced by
//! the supervisor. One `tick` per control period is the only entry point.

pub mod actuator;
pub mod command;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod deadband;
pub mod error;
pub mod filter;
pub mod hw_error;
pub mod mocks;
pub mod pid;
pub mod status;
pub mod step;
pub mod supervisor;
pub mod telemetry;
pub mod topics;
pub mod util;

pub use actuator::{ActuatorCommand, Direction, MotorActuator, PWM_FULL_SCALE};
pub use command::{Command, CommandSender, ExperimentMode, ParamKey};
pub use config::{
    DeadbandParams, LoopCfg, PidParams, SafetyHoldPolicy, SharedConfig, StepParams, Timeouts,
};
pub use controller::{ExperimentController, Notice, TickReport};
pub use deadband::DeadbandEngine;
pub use error::{BuildError, CoreError, Result};
pub use filter::DistanceFilter;
pub use pid::{PidPositionEngine, PidState};
pub use status::{EngineEvent, EngineOutput, Outcome};
pub use step::StepResponseEngine;
pub use supervisor::ConnectionSupervisor;
pub use telemetry::TelemetryRecord;
pub use topics::ParameterChannel;
