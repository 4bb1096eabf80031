//! Mapping of boxed hardware errors into typed `CoreError` values.

use crate::error::CoreError;

/// Map any boxed error crossing the sensor/motor trait boundary to a typed
/// `CoreError`, with special handling for hardware errors when the
/// `hardware-errors` feature is enabled.
pub fn map_hw_error_dyn(e: &(dyn std::error::Error + 'static)) -> CoreError {
    #[cfg(feature = "hardware-errors")]
    {
        use railcar_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => CoreError::SensorTimeout,
                other => CoreError::HardwareFault(other.to_string()),
            };
        }
    }
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        CoreError::SensorTimeout
    } else {
        CoreError::Hardware(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_timeout_maps_to_sensor_timeout() {
        let e = std::io::Error::other("read Timeout on echo pin");
        assert!(matches!(
            map_hw_error_dyn(&e),
            CoreError::SensorTimeout
        ));
    }

    #[test]
    fn other_errors_map_to_hardware() {
        let e = std::io::Error::other("gpio busy");
        assert!(matches!(map_hw_error_dyn(&e), CoreError::Hardware(_)));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn typed_hw_errors_are_downcast() {
        use railcar_hardware::error::HwError;
        assert!(matches!(
            map_hw_error_dyn(&HwError::Timeout),
            CoreError::SensorTimeout
        ));
        assert!(matches!(
            map_hw_error_dyn(&HwError::Gpio("pin 17".into())),
            CoreError::HardwareFault(_)
        ));
    }
}
