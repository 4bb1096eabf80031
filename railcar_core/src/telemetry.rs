//! Per-tick telemetry records and their wire (CSV line) encodings.
//!
//! Each experiment mode emits one record per active tick. Records are
//! rendered to a single comma-separated line and handed to a
//! `TelemetrySink`; delivery is best-effort.

use crate::actuator::Direction;

/// One telemetry sample. Field order in `to_line` is the wire contract the
/// host-side plotters parse; do not reorder.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryRecord {
    /// `time_ms,distance,reference,error,kp,ki,kd,output`
    Pid {
        time_ms: u64,
        distance_cm: f32,
        reference_cm: f32,
        error_cm: f32,
        kp: f32,
        ki: f32,
        kd: f32,
        output: f32,
    },
    /// `time_to_end_ms,time_ms,direction,v_batt,distance,step_volts,pwm,applied_step`
    Step {
        time_to_end_ms: i64,
        time_ms: u64,
        direction: Direction,
        battery_volts: f32,
        distance_cm: f32,
        step_volts: f32,
        pwm: u32,
        /// 0 during baseline, 1 while the step input is applied.
        applied: bool,
    },
    /// `time_ms,pwm,distance,baseline,motion_detected`
    Deadband {
        time_ms: u64,
        pwm: u32,
        distance_cm: f32,
        baseline_cm: f32,
        motion_detected: bool,
    },
}

impl TelemetryRecord {
    /// Render to the CSV wire line (no trailing newline).
    pub fn to_line(&self) -> String {
        match self {
            Self::Pid {
                time_ms,
                distance_cm,
                reference_cm,
                error_cm,
                kp,
                ki,
                kd,
                output,
            } => format!(
                "{time_ms},{distance_cm},{reference_cm},{error_cm},{kp},{ki},{kd},{output}"
            ),
            Self::Step {
                time_to_end_ms,
                time_ms,
                direction,
                battery_volts,
                distance_cm,
                step_volts,
                pwm,
                applied,
            } => format!(
                "{},{},{},{},{},{},{},{}",
                time_to_end_ms,
                time_ms,
                direction.to_wire(),
                battery_volts,
                distance_cm,
                step_volts,
                pwm,
                u8::from(*applied)
            ),
            Self::Deadband {
                time_ms,
                pwm,
                distance_cm,
                baseline_cm,
                motion_detected,
            } => format!(
                "{},{},{},{},{}",
                time_ms,
                pwm,
                distance_cm,
                baseline_cm,
                u8::from(*motion_detected)
            ),
        }
    }
}
