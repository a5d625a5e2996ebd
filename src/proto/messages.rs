//! # Message Catalogue
//!
//! The closed set of message types carried inside frames, with their packed
//! little-endian payload codecs.
//!
//! | Code | Name | Payload octets |
//! |------|-----------|----|
//! | 0x01 | Telemetry | 33 |
//! | 0x10 | ModeSwitch | 1 |
//! | 0x11 | Setpoints | 17 |
//! | 0x12 | ManualCmd | 13 |
//! | 0x20 | Ack | 2 |
//! | 0x23 | Heartbeat | 0 |

/// Periodic telemetry, controller → ground
pub const MSG_TELEMETRY: u8 = 0x01;

/// Mode change request, ground → controller
pub const MSG_MODE_SWITCH: u8 = 0x10;

/// Automatic-mode setpoints, ground → controller
pub const MSG_SETPOINTS: u8 = 0x11;

/// Manual actuator command, ground → controller
pub const MSG_MANUAL_CMD: u8 = 0x12;

/// Command acknowledgement, controller → ground
pub const MSG_ACK: u8 = 0x20;

/// Link-liveness heartbeat, empty payload
pub const MSG_HEARTBEAT: u8 = 0x23;

/// Ack status: command accepted
pub const ACK_OK: u8 = 0;

/// Ack status: command rejected (bad payload)
pub const ACK_ERR: u8 = 1;

/// ManualCmd presence flags
pub const MANUAL_FLAG_HEATER: u8 = 1 << 0;
pub const MANUAL_FLAG_VALVE: u8 = 1 << 1;
pub const MANUAL_FLAG_PUMP: u8 = 1 << 2;

/// Setpoints enable-mask bits
pub const SP_ENABLE_TEMP: u8 = 1 << 0;
pub const SP_ENABLE_PRESSURE: u8 = 1 << 1;
pub const SP_ENABLE_VALVE: u8 = 1 << 2;
pub const SP_ENABLE_PUMP: u8 = 1 << 3;

/// Telemetry carries up to four temperature channels
pub const MAX_TEMP_CHANNELS: usize = 4;

/// Control mode as carried in a ModeSwitch payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Mode {
    /// Fail-closed: all outputs zero
    #[default]
    Safe = 0,
    /// Operator-driven actuator commands
    Manual = 1,
    /// Delegated to the automatic controller
    Auto = 2,
}

impl Mode {
    /// Decode a wire octet; `None` for unknown codes.
    pub fn from_wire(b: u8) -> Option<Mode> {
        match b {
            0 => Some(Mode::Safe),
            1 => Some(Mode::Manual),
            2 => Some(Mode::Auto),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u8 {
        self as u8
    }
}

/// Telemetry payload (0x01), 33 octets on the wire.
///
/// `heater_pct` / `valve_pct` are the *last applied* actuator values, i.e.
/// post-safety-clamp, not the raw command.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Telemetry {
    pub timestamp_ms: u32,
    pub temp_count: u8,
    pub temp_c: [f32; MAX_TEMP_CHANNELS],
    pub pressure_pa: f32,
    pub heater_pct: f32,
    pub valve_pct: f32,
}

/// Wire size of a Telemetry payload
pub const TELEMETRY_WIRE_LEN: usize = 33;

impl Telemetry {
    pub fn encode(&self) -> [u8; TELEMETRY_WIRE_LEN] {
        let mut buf = [0u8; TELEMETRY_WIRE_LEN];
        buf[0..4].copy_from_slice(&self.timestamp_ms.to_le_bytes());
        buf[4] = self.temp_count.min(MAX_TEMP_CHANNELS as u8);
        for (i, t) in self.temp_c.iter().enumerate() {
            let at = 5 + i * 4;
            buf[at..at + 4].copy_from_slice(&t.to_le_bytes());
        }
        buf[21..25].copy_from_slice(&self.pressure_pa.to_le_bytes());
        buf[25..29].copy_from_slice(&self.heater_pct.to_le_bytes());
        buf[29..33].copy_from_slice(&self.valve_pct.to_le_bytes());
        buf
    }

    /// Decode a Telemetry payload; `None` on length mismatch.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() != TELEMETRY_WIRE_LEN {
            return None;
        }
        let mut temp_c = [0f32; MAX_TEMP_CHANNELS];
        for (i, t) in temp_c.iter_mut().enumerate() {
            let at = 5 + i * 4;
            *t = f32::from_le_bytes(payload[at..at + 4].try_into().ok()?);
        }
        Some(Self {
            timestamp_ms: u32::from_le_bytes(payload[0..4].try_into().ok()?),
            temp_count: payload[4],
            temp_c,
            pressure_pa: f32::from_le_bytes(payload[21..25].try_into().ok()?),
            heater_pct: f32::from_le_bytes(payload[25..29].try_into().ok()?),
            valve_pct: f32::from_le_bytes(payload[29..33].try_into().ok()?),
        })
    }
}

/// ModeSwitch payload (0x10), 1 octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSwitch {
    pub mode: Mode,
}

pub const MODE_SWITCH_WIRE_LEN: usize = 1;

impl ModeSwitch {
    pub fn encode(&self) -> [u8; MODE_SWITCH_WIRE_LEN] {
        [self.mode.to_wire()]
    }

    /// Decode a ModeSwitch payload; `None` on length mismatch or an unknown
    /// mode code.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() != MODE_SWITCH_WIRE_LEN {
            return None;
        }
        Some(Self {
            mode: Mode::from_wire(payload[0])?,
        })
    }
}

/// Setpoints payload (0x11), 17 octets.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SetpointsMsg {
    pub target_temp_c: f32,
    pub target_pressure_pa: f32,
    pub target_valve_pct: f32,
    pub target_pump_temp_c: f32,
    pub enable_mask: u8,
}

pub const SETPOINTS_WIRE_LEN: usize = 17;

impl SetpointsMsg {
    pub fn encode(&self) -> [u8; SETPOINTS_WIRE_LEN] {
        let mut buf = [0u8; SETPOINTS_WIRE_LEN];
        buf[0..4].copy_from_slice(&self.target_temp_c.to_le_bytes());
        buf[4..8].copy_from_slice(&self.target_pressure_pa.to_le_bytes());
        buf[8..12].copy_from_slice(&self.target_valve_pct.to_le_bytes());
        buf[12..16].copy_from_slice(&self.target_pump_temp_c.to_le_bytes());
        buf[16] = self.enable_mask;
        buf
    }

    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() != SETPOINTS_WIRE_LEN {
            return None;
        }
        Some(Self {
            target_temp_c: f32::from_le_bytes(payload[0..4].try_into().ok()?),
            target_pressure_pa: f32::from_le_bytes(payload[4..8].try_into().ok()?),
            target_valve_pct: f32::from_le_bytes(payload[8..12].try_into().ok()?),
            target_pump_temp_c: f32::from_le_bytes(payload[12..16].try_into().ok()?),
            enable_mask: payload[16],
        })
    }
}

/// ManualCmd payload (0x12), 13 octets.
///
/// `flags` marks which actuator fields carry a command; unflagged fields are
/// ignored by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ManualCmdMsg {
    pub flags: u8,
    pub heater_pct: f32,
    pub valve_pct: f32,
    pub pump_temp_c: f32,
}

pub const MANUAL_CMD_WIRE_LEN: usize = 13;

impl ManualCmdMsg {
    pub fn encode(&self) -> [u8; MANUAL_CMD_WIRE_LEN] {
        let mut buf = [0u8; MANUAL_CMD_WIRE_LEN];
        buf[0] = self.flags;
        buf[1..5].copy_from_slice(&self.heater_pct.to_le_bytes());
        buf[5..9].copy_from_slice(&self.valve_pct.to_le_bytes());
        buf[9..13].copy_from_slice(&self.pump_temp_c.to_le_bytes());
        buf
    }

    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() != MANUAL_CMD_WIRE_LEN {
            return None;
        }
        Some(Self {
            flags: payload[0],
            heater_pct: f32::from_le_bytes(payload[1..5].try_into().ok()?),
            valve_pct: f32::from_le_bytes(payload[5..9].try_into().ok()?),
            pump_temp_c: f32::from_le_bytes(payload[9..13].try_into().ok()?),
        })
    }
}

/// Ack payload (0x20), 2 octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub acked_msg_type: u8,
    pub status: u8,
}

pub const ACK_WIRE_LEN: usize = 2;

impl Ack {
    pub fn encode(&self) -> [u8; ACK_WIRE_LEN] {
        [self.acked_msg_type, self.status]
    }

    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() != ACK_WIRE_LEN {
            return None;
        }
        Some(Self {
            acked_msg_type: payload[0],
            status: payload[1],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_codes() {
        assert_eq!(Mode::Safe.to_wire(), 0);
        assert_eq!(Mode::Manual.to_wire(), 1);
        assert_eq!(Mode::Auto.to_wire(), 2);
        assert_eq!(Mode::from_wire(1), Some(Mode::Manual));
        assert_eq!(Mode::from_wire(3), None);
    }

    #[test]
    fn test_telemetry_roundtrip() {
        let t = Telemetry {
            timestamp_ms: 123_456,
            temp_count: 2,
            temp_c: [20.5, 21.25, 0.0, 0.0],
            pressure_pa: 101_325.0,
            heater_pct: 42.5,
            valve_pct: 30.0,
        };

        let wire = t.encode();
        assert_eq!(wire.len(), TELEMETRY_WIRE_LEN);
        assert_eq!(Telemetry::decode(&wire), Some(t));
    }

    #[test]
    fn test_telemetry_wire_layout() {
        let t = Telemetry {
            timestamp_ms: 0x0403_0201,
            temp_count: 1,
            ..Default::default()
        };
        let wire = t.encode();
        // timestamp little-endian, count immediately after
        assert_eq!(&wire[0..5], &[0x01, 0x02, 0x03, 0x04, 0x01]);
    }

    #[test]
    fn test_telemetry_rejects_wrong_length() {
        assert!(Telemetry::decode(&[0u8; TELEMETRY_WIRE_LEN - 1]).is_none());
        assert!(Telemetry::decode(&[0u8; TELEMETRY_WIRE_LEN + 1]).is_none());
    }

    #[test]
    fn test_mode_switch_rejects_unknown_mode() {
        assert!(ModeSwitch::decode(&[0x07]).is_none());
        assert_eq!(
            ModeSwitch::decode(&[0x02]),
            Some(ModeSwitch { mode: Mode::Auto })
        );
    }

    #[test]
    fn test_setpoints_roundtrip() {
        let sp = SetpointsMsg {
            target_temp_c: 55.0,
            target_pressure_pa: 2.5e5,
            target_valve_pct: 40.0,
            target_pump_temp_c: -10.0,
            enable_mask: SP_ENABLE_TEMP | SP_ENABLE_VALVE,
        };
        assert_eq!(SetpointsMsg::decode(&sp.encode()), Some(sp));
    }

    #[test]
    fn test_manual_cmd_roundtrip() {
        let cmd = ManualCmdMsg {
            flags: MANUAL_FLAG_HEATER | MANUAL_FLAG_VALVE,
            heater_pct: 80.0,
            valve_pct: 25.0,
            pump_temp_c: 0.0,
        };
        assert_eq!(ManualCmdMsg::decode(&cmd.encode()), Some(cmd));
        assert!(ManualCmdMsg::decode(&cmd.encode()[..12]).is_none());
    }

    #[test]
    fn test_ack_roundtrip() {
        let ack = Ack {
            acked_msg_type: MSG_MODE_SWITCH,
            status: ACK_OK,
        };
        assert_eq!(Ack::decode(&ack.encode()), Some(ack));
    }
}
