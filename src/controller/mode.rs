//! # Mode Policy
//!
//! Computes the per-tick actuator outputs from the current mode. SAFE emits
//! zeros, MANUAL applies presence-flagged operator commands, AUTO delegates
//! to the [`AutoPolicy`] strategy. The safety interlock runs *after* this
//! stage and may overrule everything.

use super::auto::AutoPolicy;
use super::state::{ControlState, Outputs};
use crate::proto::{Mode, Telemetry};

/// Clamp a percent command to `[0, 100]`; non-finite values degrade to 0.
pub(crate) fn clamp_pct(v: f32) -> f32 {
    if !v.is_finite() {
        return 0.0;
    }
    v.clamp(0.0, 100.0)
}

/// Apply the mode policy.
pub fn compute<A: AutoPolicy + ?Sized>(
    state: &ControlState,
    telem: &Telemetry,
    auto: &A,
) -> Outputs {
    match state.mode {
        Mode::Safe => Outputs::zero(),

        Mode::Manual => {
            let mut out = Outputs::zero();
            // Only flagged fields carry a command; the rest stay at zero.
            if state.manual.has_heater {
                out.heater_pct = clamp_pct(state.manual.heater_pct);
            }
            if state.manual.has_valve {
                out.valve_pct = clamp_pct(state.manual.valve_pct);
            }
            if state.manual.has_pump_temp {
                // Temperature target, not a percent: passed through unclamped.
                out.pump_temp_c = state.manual.pump_temp_c;
            }
            out
        }

        Mode::Auto => auto.compute(state, telem),
    }
}
