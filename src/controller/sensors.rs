//! # Sensor Sources
//!
//! The RTD/ADC register-level drivers are external collaborators; the loop
//! only needs a fresh [`Telemetry`] per tick. A synthetic rig is provided so
//! the whole link runs on a bench with no instrumentation attached.

use crate::proto::Telemetry;

/// One fresh sample per tick: timestamp, temperature channels, pressure.
///
/// Values are passed through unchecked; the safety stage deals with
/// non-finite readings.
pub trait SensorRig {
    fn sample(&mut self, now_ms: u32) -> Telemetry;
}

/// Bench stand-in for the real rig: two RTD channels wandering slowly around
/// 20 degC a few tenths apart, atmospheric pressure on the differential
/// channel.
#[derive(Debug, Default)]
pub struct SyntheticRig;

impl SyntheticRig {
    pub fn new() -> Self {
        Self
    }
}

impl SensorRig for SyntheticRig {
    fn sample(&mut self, now_ms: u32) -> Telemetry {
        let phase = now_ms as f32 / 5_000.0;
        let base = 20.0 + 2.0 * phase.sin();

        Telemetry {
            timestamp_ms: now_ms,
            temp_count: 2,
            temp_c: [base, base + 0.4, 0.0, 0.0],
            pressure_pa: 101_325.0,
            heater_pct: 0.0,
            valve_pct: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_rig_shape() {
        let mut rig = SyntheticRig::new();
        let t = rig.sample(1_000);

        assert_eq!(t.timestamp_ms, 1_000);
        assert_eq!(t.temp_count, 2);
        assert!(t.temp_c[0] > 17.0 && t.temp_c[0] < 23.0);
        assert_eq!(t.pressure_pa, 101_325.0);
    }
}
