//! Real GPIO backends: HC-SR04 ultrasonic ranger and PWM H-bridge drive.

use std::time::{Duration, Instant};

use railcar_traits::{DistanceSensor, Motor};
use rppal::gpio::{Gpio, InputPin, OutputPin};

use crate::error::{HwError, Result};

/// Speed of sound round-trip conversion: centimetres per microsecond of
/// echo, already halved for the out-and-back path.
const CM_PER_US: f32 = 0.017_15;

pub struct UltrasonicSensor {
    trigger: OutputPin,
    echo: InputPin,
}

impl UltrasonicSensor {
    pub fn new(trigger_pin: u8, echo_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let trigger = gpio
            .get(trigger_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output_low();
        let echo = gpio
            .get(echo_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input();
        Ok(Self { trigger, echo })
    }

    fn measure(&mut self, timeout: Duration) -> Result<f32> {
        // 10us trigger pulse
        self.trigger.set_high();
        std::thread::sleep(Duration::from_micros(10));
        self.trigger.set_low();

        let deadline = Instant::now() + timeout;
        while self.echo.is_low() {
            if Instant::now() >= deadline {
                return Err(HwError::Timeout);
            }
        }
        let rise = Instant::now();
        while self.echo.is_high() {
            if Instant::now() >= deadline {
                return Err(HwError::Timeout);
            }
        }
        let echo_us = rise.elapsed().as_micros() as f32;
        Ok(echo_us * CM_PER_US)
    }
}

impl DistanceSensor for UltrasonicSensor {
    fn read(&mut self, timeout: Duration) -> std::result::Result<f32, Box<dyn std::error::Error + Send + Sync>> {
        match self.measure(timeout) {
            Ok(cm) => {
                tracing::trace!(cm, "hc-sr04 sample");
                Ok(cm)
            }
            Err(e) => {
                tracing::warn!(error = %e, "hc-sr04 read failed");
                Err(Box::new(e))
            }
        }
    }
}

/// H-bridge drive: one software-PWM enable pin plus two direction pins.
pub struct DriveMotor {
    pwm: OutputPin,
    fwd: OutputPin,
    rev: OutputPin,
    full_scale: u32,
}

impl DriveMotor {
    pub fn new(pwm_pin: u8, fwd_pin: u8, rev_pin: u8, full_scale: u32) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let grab = |pin: u8| -> Result<OutputPin> {
            Ok(gpio
                .get(pin)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_output_low())
        };
        Ok(Self {
            pwm: grab(pwm_pin)?,
            fwd: grab(fwd_pin)?,
            rev: grab(rev_pin)?,
            full_scale: full_scale.max(1),
        })
    }

    fn apply(&mut self, duty: u32, forward: bool) -> Result<()> {
        if forward {
            self.rev.set_low();
            self.fwd.set_high();
        } else {
            self.fwd.set_low();
            self.rev.set_high();
        }
        let cycle = (f64::from(duty.min(self.full_scale))) / f64::from(self.full_scale);
        // 1 kHz software PWM
        self.pwm
            .set_pwm_frequency(1_000.0, cycle)
            .map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(())
    }
}

impl Motor for DriveMotor {
    fn set_drive(
        &mut self,
        duty: u32,
        forward: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.apply(duty, forward).map_err(|e| Box::new(e) as _)
    }

    fn stop(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pwm
            .clear_pwm()
            .map_err(|e| HwError::Gpio(e.to_string()))
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
        self.fwd.set_low();
        self.rev.set_low();
        Ok(())
    }
}
