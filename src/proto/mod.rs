//! # Wire Protocol Module
//!
//! The framed binary protocol spoken on every link (controller UART, radio
//! hops, ground USB).
//!
//! This module handles:
//! - Frame encoding (sync pair, length, CRC-16 trailer)
//! - Resumable streaming frame parsing with silent resynchronisation
//! - The message-type catalogue and payload codecs
//! - Modbus CRC-16 calculation

pub mod crc;
pub mod frame;
pub mod messages;

// Re-export commonly used types and functions
pub use crc::crc16_modbus;

pub use frame::{
    encode, looks_framed, FrameView, OwnedFrame, Parser, MAX_FRAME, MAX_PAYLOAD, SYNC1, SYNC2,
};

pub use messages::{
    Ack, ManualCmdMsg, Mode, ModeSwitch, SetpointsMsg, Telemetry, ACK_ERR, ACK_OK, ACK_WIRE_LEN,
    MANUAL_CMD_WIRE_LEN, MANUAL_FLAG_HEATER, MANUAL_FLAG_PUMP, MANUAL_FLAG_VALVE,
    MAX_TEMP_CHANNELS, MODE_SWITCH_WIRE_LEN, MSG_ACK, MSG_HEARTBEAT, MSG_MANUAL_CMD,
    MSG_MODE_SWITCH, MSG_SETPOINTS, MSG_TELEMETRY, SETPOINTS_WIRE_LEN, SP_ENABLE_PRESSURE,
    SP_ENABLE_PUMP, SP_ENABLE_TEMP, SP_ENABLE_VALVE, TELEMETRY_WIRE_LEN,
};
