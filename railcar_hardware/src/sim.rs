//! Deterministic rail simulation for development and integration tests.
//!
//! `SimRail` models a cart on a straight track in front of a wall sensor:
//! the motor exerts force proportional to duty above a static-friction
//! deadband, the cart carries momentum and drag, and the sensor observes the
//! wall distance with small deterministic pseudo-noise.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use railcar_traits::{DistanceSensor, Motor};

/// Cart-on-rail physics state. Shared between the motor and sensor halves
/// via `Rc<RefCell<..>>`; the whole sim is single-threaded like the control
/// loop that drives it.
pub struct SimRail {
    /// Distance from the wall sensor (cm). Grows when driving forward.
    pub position_cm: f32,
    velocity_cm_s: f32,
    duty: u32,
    forward: bool,
    /// Duty below which the motor cannot overcome static friction.
    pub deadband_pwm: u32,
    /// Time advanced per sensor read.
    pub dt_s: f32,
    /// Peak noise amplitude (cm).
    pub noise_cm: f32,
    rng_state: u32,
}

impl SimRail {
    pub fn new(initial_cm: f32) -> Self {
        Self {
            position_cm: initial_cm,
            velocity_cm_s: 0.0,
            duty: 0,
            forward: true,
            deadband_pwm: 60,
            dt_s: 0.05,
            noise_cm: 0.02,
            rng_state: 0x2545_f491,
        }
    }

    /// Advance physics by one sample interval.
    fn step(&mut self) {
        let drive = if self.duty > self.deadband_pwm {
            // cm/s^2 per count above the deadband
            let accel = (self.duty - self.deadband_pwm) as f32 * 0.08;
            if self.forward { accel } else { -accel }
        } else {
            0.0
        };
        let drag = -2.5 * self.velocity_cm_s;
        self.velocity_cm_s += (drive + drag) * self.dt_s;
        self.position_cm = (self.position_cm + self.velocity_cm_s * self.dt_s).max(0.0);
    }

    /// xorshift; deterministic noise in [-noise_cm, noise_cm].
    fn noise(&mut self) -> f32 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng_state = x;
        let unit = (x as f32 / u32::MAX as f32) * 2.0 - 1.0;
        unit * self.noise_cm
    }
}

/// Builds a connected motor/sensor pair over one shared rail.
pub fn sim_pair(initial_cm: f32) -> (SimMotor, SimSensor) {
    let rail = Rc::new(RefCell::new(SimRail::new(initial_cm)));
    (
        SimMotor { rail: rail.clone() },
        SimSensor { rail },
    )
}

pub struct SimMotor {
    rail: Rc<RefCell<SimRail>>,
}

impl Motor for SimMotor {
    fn set_drive(
        &mut self,
        duty: u32,
        forward: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut rail = self.rail.borrow_mut();
        rail.duty = duty;
        rail.forward = forward;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.rail.borrow_mut().duty = 0;
        Ok(())
    }
}

pub struct SimSensor {
    rail: Rc<RefCell<SimRail>>,
}

impl SimSensor {
    /// Direct access for test setup (move the cart, tune noise).
    pub fn rail(&self) -> Rc<RefCell<SimRail>> {
        self.rail.clone()
    }
}

impl DistanceSensor for SimSensor {
    fn read(
        &mut self,
        _timeout: Duration,
    ) -> Result<f32, Box<dyn std::error::Error + Send + Sync>> {
        let mut rail = self.rail.borrow_mut();
        rail.step();
        let noise = rail.noise();
        let reading = (rail.position_cm + noise).max(0.0);
        tracing::trace!(reading, "sim distance sample");
        Ok(reading)
    }
}
