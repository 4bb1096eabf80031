//! Signed duty commands on top of the unsigned hardware motor boundary.

use railcar_traits::Motor;

use crate::error::Result;
use crate::hw_error::map_hw_error_dyn;
use eyre::WrapErr;

/// Full PWM scale of the drive (10-bit counts).
pub const PWM_FULL_SCALE: u32 = 1023;

/// Travel direction along the rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    /// Wire convention: 1 = forward, anything else = reverse.
    pub fn from_wire(v: i8) -> Self {
        if v == 1 { Self::Forward } else { Self::Reverse }
    }

    pub fn to_wire(self) -> i8 {
        match self {
            Self::Forward => 1,
            Self::Reverse => -1,
        }
    }
}

/// One actuator command: duty counts plus direction. Zero duty keeps the
/// last direction so logs show which way the cart was last driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCommand {
    pub duty: u32,
    pub direction: Direction,
}

impl ActuatorCommand {
    pub fn stop(direction: Direction) -> Self {
        Self { duty: 0, direction }
    }
}

impl Default for ActuatorCommand {
    fn default() -> Self {
        Self::stop(Direction::Forward)
    }
}

/// Wraps a `Motor` with duty clamping and last-command tracking.
pub struct MotorActuator<M: Motor> {
    motor: M,
    last: ActuatorCommand,
}

impl<M: Motor> MotorActuator<M> {
    pub fn new(motor: M) -> Self {
        Self {
            motor,
            last: ActuatorCommand::default(),
        }
    }

    /// Command the motor. Duty is clamped to the PWM full scale before it
    /// reaches hardware.
    pub fn apply(&mut self, cmd: ActuatorCommand) -> Result<()> {
        let duty = cmd.duty.min(PWM_FULL_SCALE);
        self.motor
            .set_drive(duty, cmd.direction == Direction::Forward)
            .map_err(|e| eyre::Report::new(map_hw_error_dyn(&*e)))
            .wrap_err("set_drive")?;
        self.last = ActuatorCommand {
            duty,
            direction: cmd.direction,
        };
        Ok(())
    }

    /// Stop the motor (best-effort from callers; errors propagate here).
    pub fn halt(&mut self) -> Result<()> {
        self.motor
            .stop()
            .map_err(|e| eyre::Report::new(map_hw_error_dyn(&*e)))
            .wrap_err("motor stop")?;
        self.last = ActuatorCommand::stop(self.last.direction);
        Ok(())
    }

    /// Last command actually sent to hardware (post-clamp).
    pub fn last_command(&self) -> ActuatorCommand {
        self.last
    }

    pub fn into_inner(self) -> M {
        self.motor
    }
}
