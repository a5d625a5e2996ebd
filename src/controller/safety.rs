//! # Safety Interlock
//!
//! Runs every tick *after* the mode policy, so no command path can evade it.
//! Each rule may force the mode to SAFE; once the mode is SAFE the outputs
//! are zeroed unconditionally.

use super::state::{ControlState, Outputs};
use crate::proto::{Mode, Telemetry, MAX_TEMP_CHANNELS};
use tracing::warn;

/// Tunable safety thresholds.
#[derive(Debug, Clone, Copy)]
pub struct SafetyLimits {
    /// Any finite temperature above this forces SAFE.
    pub max_temp_c: f32,
    /// Link silence longer than this drops `link_alive`.
    pub link_timeout_ms: u32,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_temp_c: 80.0,
            link_timeout_ms: 1500,
        }
    }
}

/// Evaluate the interlock rules in order, mutating mode and outputs.
pub fn check_and_clamp(
    state: &mut ControlState,
    telem: &Telemetry,
    out: &mut Outputs,
    now_ms: u32,
    limits: &SafetyLimits,
) {
    // Link timeout. Differences are modulo 2^32 so a millisecond-clock wrap
    // cannot fake a timeout.
    if state.link_alive
        && now_ms.wrapping_sub(state.last_link_heartbeat_ms) > limits.link_timeout_ms
    {
        state.link_alive = false;
        warn!("uplink silent for {} ms, dropping to SAFE", limits.link_timeout_ms);
    }
    if !state.link_alive && state.mode != Mode::Safe {
        state.mode = Mode::Safe;
    }

    // Overtemperature. NaN readings are skipped here; the sensor layer passes
    // them through and this rule must not trip on them.
    let n = (telem.temp_count as usize).min(MAX_TEMP_CHANNELS);
    for &t in &telem.temp_c[..n] {
        if t.is_finite() && t > limits.max_temp_c {
            if state.mode != Mode::Safe {
                warn!("overtemperature {:.1} C, forcing SAFE", t);
            }
            state.mode = Mode::Safe;
        }
    }

    // SAFE output clamp.
    if state.mode == Mode::Safe {
        *out = Outputs::zero();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_manual_state(now: u32) -> ControlState {
        let mut state = ControlState::new();
        state.mode = Mode::Manual;
        state.link_alive = true;
        state.last_link_heartbeat_ms = now;
        state
    }

    fn telem_with_temp(t: f32) -> Telemetry {
        Telemetry {
            temp_count: 1,
            temp_c: [t, 0.0, 0.0, 0.0],
            ..Default::default()
        }
    }

    #[test]
    fn test_link_timeout_forces_safe() {
        let mut state = live_manual_state(0);
        let mut out = Outputs {
            heater_pct: 50.0,
            ..Default::default()
        };

        check_and_clamp(
            &mut state,
            &telem_with_temp(20.0),
            &mut out,
            1501,
            &SafetyLimits::default(),
        );

        assert!(!state.link_alive);
        assert_eq!(state.mode, Mode::Safe);
        assert_eq!(out, Outputs::zero());
    }

    #[test]
    fn test_link_alive_within_timeout() {
        let mut state = live_manual_state(200);
        let mut out = Outputs {
            heater_pct: 50.0,
            ..Default::default()
        };

        check_and_clamp(
            &mut state,
            &telem_with_temp(20.0),
            &mut out,
            1700,
            &SafetyLimits::default(),
        );

        assert!(state.link_alive);
        assert_eq!(state.mode, Mode::Manual);
        assert_eq!(out.heater_pct, 50.0);
    }

    #[test]
    fn test_link_timeout_survives_clock_wrap() {
        let mut state = live_manual_state(u32::MAX - 100);
        let mut out = Outputs::zero();

        // 200 ms elapsed across the wrap: still alive
        check_and_clamp(
            &mut state,
            &telem_with_temp(20.0),
            &mut out,
            99,
            &SafetyLimits::default(),
        );
        assert!(state.link_alive);
    }

    #[test]
    fn test_overtemperature_forces_safe() {
        let now = 100;
        let mut state = live_manual_state(now);
        let mut out = Outputs {
            heater_pct: 80.0,
            valve_pct: 20.0,
            ..Default::default()
        };

        check_and_clamp(
            &mut state,
            &telem_with_temp(85.0),
            &mut out,
            now,
            &SafetyLimits::default(),
        );

        assert_eq!(state.mode, Mode::Safe);
        assert_eq!(out, Outputs::zero());
    }

    #[test]
    fn test_nan_reading_does_not_trip_overtemperature() {
        let now = 100;
        let mut state = live_manual_state(now);
        let mut out = Outputs {
            heater_pct: 30.0,
            ..Default::default()
        };

        check_and_clamp(
            &mut state,
            &telem_with_temp(f32::NAN),
            &mut out,
            now,
            &SafetyLimits::default(),
        );

        assert_eq!(state.mode, Mode::Manual);
        assert_eq!(out.heater_pct, 30.0);
    }

    #[test]
    fn test_channels_beyond_temp_count_ignored() {
        let now = 100;
        let mut state = live_manual_state(now);
        let mut out = Outputs::zero();

        let telem = Telemetry {
            temp_count: 1,
            temp_c: [20.0, 500.0, 0.0, 0.0], // channel 1 not populated
            ..Default::default()
        };

        check_and_clamp(&mut state, &telem, &mut out, now, &SafetyLimits::default());
        assert_eq!(state.mode, Mode::Manual);
    }
}
