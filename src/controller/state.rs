//! # Control State
//!
//! The controller-local state the periodic loop operates on: current mode,
//! the last validated setpoints and manual command, and link-liveness
//! timestamps. Owned by the controller loop; no globals.

use crate::proto::Mode;

/// Actuator outputs produced by one loop iteration.
///
/// Percent fields are in `[0, 100]` after the safety clamp; `pump_temp_c` is
/// a temperature target handed through to the external pump.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Outputs {
    pub heater_pct: f32,
    pub valve_pct: f32,
    pub pump_temp_c: f32,
}

impl Outputs {
    /// All-zero outputs, what SAFE mode emits.
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Last validated automatic-mode setpoints.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Setpoints {
    pub target_temp_c: f32,
    pub target_pressure_pa: f32,
    pub target_valve_pct: f32,
    pub target_pump_temp_c: f32,
    pub temp_ctrl: bool,
    pub pressure_ctrl: bool,
    pub valve_ctrl: bool,
    pub pump_ctrl: bool,
}

/// Last validated manual command with per-field presence flags.
///
/// A field only drives its actuator while its flag is set; unflagged fields
/// fall back to zero in MANUAL mode.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ManualCmd {
    pub has_heater: bool,
    pub heater_pct: f32,
    pub has_valve: bool,
    pub valve_pct: f32,
    pub has_pump_temp: bool,
    pub pump_temp_c: f32,
}

/// Controller-local state, single owner: the control loop.
#[derive(Debug, Clone)]
pub struct ControlState {
    /// Current control mode; boots into SAFE.
    pub mode: Mode,
    pub setpoints: Setpoints,
    pub manual: ManualCmd,

    /// Last time any valid frame arrived
    pub last_cmd_ms: u32,
    /// Last time setpoints were updated
    pub last_setpoint_ms: u32,
    /// Last time a manual command was accepted
    pub last_manual_ms: u32,

    /// Whether the uplink is considered alive
    pub link_alive: bool,
    /// Last time link liveness was refreshed
    pub last_link_heartbeat_ms: u32,
}

impl ControlState {
    pub fn new() -> Self {
        Self {
            mode: Mode::Safe,
            setpoints: Setpoints::default(),
            manual: ManualCmd::default(),
            last_cmd_ms: 0,
            last_setpoint_ms: 0,
            last_manual_ms: 0,
            link_alive: false,
            last_link_heartbeat_ms: 0,
        }
    }

    /// Back to power-on state: SAFE, link down, everything cleared.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}
