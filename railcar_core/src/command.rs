//! Command vocabulary between the parameter channel and the controller.

/// The mutually-exclusive experiment modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExperimentMode {
    #[default]
    Idle,
    PidControl,
    StepResponse,
    DeadbandCalibration,
}

/// Every remotely-settable scalar parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKey {
    PidKp,
    PidKi,
    PidKd,
    PidReference,
    StepAmplitude,
    StepDuration,
    StepDirection,
    StepVbatt,
    DeadbandDirection,
    DeadbandThreshold,
}

impl ParamKey {
    /// Which mode's parameter dump this key belongs to.
    pub fn mode(self) -> ExperimentMode {
        match self {
            Self::PidKp | Self::PidKi | Self::PidKd | Self::PidReference => {
                ExperimentMode::PidControl
            }
            Self::StepAmplitude | Self::StepDuration | Self::StepDirection | Self::StepVbatt => {
                ExperimentMode::StepResponse
            }
            Self::DeadbandDirection | Self::DeadbandThreshold => {
                ExperimentMode::DeadbandCalibration
            }
        }
    }
}

/// Commands drained by the controller at the top of each tick, in arrival
/// order. Parameter writes always apply before any compute this tick.
#[derive(Debug, Clone)]
pub enum Command {
    /// Write one parameter. Out-of-range values are clamped; the confirm
    /// notice echoes what was actually stored.
    SetParam { key: ParamKey, value: f32 },
    /// Start (`true`) or stop (`false`) the given mode. Within one drained
    /// batch, any stop wins over any pending start.
    Mode { mode: ExperimentMode, start: bool },
    /// Publish the current parameter set for the given mode.
    RequestParams { mode: ExperimentMode },
    /// Persist the last calibration result as the live friction compensation.
    ApplyDeadband,
}

pub type CommandSender = crossbeam_channel::Sender<Command>;
