//! # Automatic Controller Hook
//!
//! The AUTO-mode computation is an external strategy: a pure function from
//! state and telemetry to outputs. It must not mutate state; the loop applies
//! safety clamping to whatever it returns.

use super::state::{ControlState, Outputs};
use crate::proto::Telemetry;

/// Strategy hook for the AUTO mode computation.
pub trait AutoPolicy {
    fn compute(&self, state: &ControlState, telem: &Telemetry) -> Outputs;
}

/// Placeholder automatic controller: emits zero outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleAuto;

impl AutoPolicy for IdleAuto {
    fn compute(&self, _state: &ControlState, _telem: &Telemetry) -> Outputs {
        Outputs::zero()
    }
}
