//! # Air Relay
//!
//! Bridges the controller UART to the half-duplex radio.
//!
//! Transmit and receive on the radio are mutually exclusive, so the
//! scheduler's priorities are: never drop an ACK uplink, let telemetry be
//! lossy, and avoid transmitting right after a downlink arrived (the ground
//! side is probably about to talk again).
//!
//! Within a tick, UART drain and downlink forwarding run before radio TX
//! service; that ordering is what biases the relay against transmitting into
//! a command exchange.

use crate::proto::{
    self, encode, looks_framed, Parser, MANUAL_CMD_WIRE_LEN, MODE_SWITCH_WIRE_LEN,
    SETPOINTS_WIRE_LEN,
};
use crate::radio::{RadioLink, TxOutcome, MAX_PACKET};
use tracing::{debug, info, warn};

/// Non-blocking UART transmit side with back-pressure visibility.
///
/// `free_space` is the contiguous room left in the TX buffer; the relay
/// drops a frame outright rather than block or spin when it does not fit.
pub trait UartSink {
    fn free_space(&self) -> usize;
    fn write(&mut self, bytes: &[u8]);
}

/// Air relay tuning.
#[derive(Debug, Clone, Copy)]
pub struct AirConfig {
    /// Minimum spacing between telemetry uplinks
    pub telem_period_ms: u32,
    /// Telemetry TX is suppressed this long after a downlink packet
    pub downlink_hold_ms: u32,
    /// Heartbeat spacing toward the controller
    pub heartbeat_period_ms: u32,
}

impl Default for AirConfig {
    fn default() -> Self {
        Self {
            telem_period_ms: 500,
            downlink_hold_ms: 80,
            heartbeat_period_ms: 500,
        }
    }
}

/// Relay counters, surfaced in logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AirStats {
    pub uplink_frames: u32,
    pub downlink_frames: u32,
    pub uart_drops: u32,
    pub whitelist_rejects: u32,
    pub telem_overwrites: u32,
}

/// At most this many UART octets are consumed per tick, bounding tick work.
pub const UART_DRAIN_BUDGET: usize = 256;

/// The air relay state machine.
pub struct AirRelay {
    cfg: AirConfig,
    uart_parser: Parser,
    radio_parser: Parser,

    /// ACKs and any other non-telemetry uplink; last writer wins.
    priority_slot: Option<Vec<u8>>,
    /// Telemetry uplink; last writer wins, rate-gated.
    telem_slot: Option<Vec<u8>>,

    last_telem_tx_ms: Option<u32>,
    last_downlink_ms: Option<u32>,
    last_heartbeat_ms: Option<u32>,
    heartbeat_seq: u8,

    raw_sniff: bool,
    stats: AirStats,
}

impl AirRelay {
    pub fn new(cfg: AirConfig) -> Self {
        Self {
            cfg,
            uart_parser: Parser::new(),
            radio_parser: Parser::new(),
            priority_slot: None,
            telem_slot: None,
            last_telem_tx_ms: None,
            last_downlink_ms: None,
            last_heartbeat_ms: None,
            heartbeat_seq: 0,
            raw_sniff: false,
            stats: AirStats::default(),
        }
    }

    pub fn stats(&self) -> AirStats {
        self.stats
    }

    /// Raw-sniff mode: dump downlink packets instead of forwarding them.
    pub fn set_raw_sniff(&mut self, on: bool) {
        info!("raw sniff {}", if on { "on" } else { "off" });
        self.raw_sniff = on;
    }

    /// Run one relay iteration.
    ///
    /// Returns the number of `uart_rx` octets consumed (at most
    /// [`UART_DRAIN_BUDGET`]); the caller keeps the rest for the next tick.
    pub fn tick(
        &mut self,
        now_ms: u32,
        uart_rx: &[u8],
        radio: &mut dyn RadioLink,
        uart: &mut dyn UartSink,
    ) -> usize {
        let consumed = self.drain_uart(uart_rx);
        self.forward_downlink(now_ms, radio, uart);
        self.send_heartbeat(now_ms, uart);
        self.service_radio_tx(now_ms, radio);
        consumed
    }

    /// Parse controller-side UART bytes and park each frame in its TX slot.
    fn drain_uart(&mut self, uart_rx: &[u8]) -> usize {
        let consumed = uart_rx.len().min(UART_DRAIN_BUDGET);
        for &b in &uart_rx[..consumed] {
            let Some(frame) = self.uart_parser.feed(b) else {
                continue;
            };

            let Ok(encoded) = encode(frame.msg_type, frame.seq, frame.payload) else {
                continue;
            };
            self.stats.uplink_frames += 1;

            if frame.msg_type == proto::MSG_TELEMETRY {
                if self.telem_slot.replace(encoded).is_some() {
                    self.stats.telem_overwrites += 1;
                }
            } else {
                // ACKs are idempotent per (seq, type); last writer wins.
                self.priority_slot = Some(encoded);
            }
        }
        consumed
    }

    /// Pull at most one radio packet and relay whitelisted frames to UART.
    fn forward_downlink(&mut self, now_ms: u32, radio: &mut dyn RadioLink, uart: &mut dyn UartSink) {
        let mut buf = [0u8; MAX_PACKET];
        let Some(meta) = radio.poll_receive(&mut buf, now_ms) else {
            return;
        };

        self.last_downlink_ms = Some(now_ms);
        let packet = &buf[..meta.len];

        if self.raw_sniff {
            info!("sniff {:3} B rssi={} snr={:.1}: {}", meta.len, meta.rssi_dbm, meta.snr_db, hex_prefix(packet, 16));
            return;
        }

        for &b in packet {
            let Some(frame) = self.radio_parser.feed(b) else {
                continue;
            };

            if !downlink_permitted(frame.msg_type, frame.payload.len()) {
                self.stats.whitelist_rejects += 1;
                warn!(
                    "downlink rejected: type=0x{:02X} len={}",
                    frame.msg_type,
                    frame.payload.len()
                );
                continue;
            }

            let Ok(encoded) = encode(frame.msg_type, frame.seq, frame.payload) else {
                continue;
            };

            if uart.free_space() < encoded.len() {
                // Non-blocking back-pressure: drop, never spin.
                self.stats.uart_drops += 1;
                continue;
            }
            uart.write(&encoded);
            self.stats.downlink_frames += 1;
        }
    }

    /// Originate link-liveness heartbeats toward the controller.
    fn send_heartbeat(&mut self, now_ms: u32, uart: &mut dyn UartSink) {
        let due = match self.last_heartbeat_ms {
            None => true,
            Some(last) => now_ms.wrapping_sub(last) >= self.cfg.heartbeat_period_ms,
        };
        if !due {
            return;
        }

        let Ok(frame) = encode(proto::MSG_HEARTBEAT, self.heartbeat_seq, &[]) else {
            return;
        };
        if uart.free_space() >= frame.len() {
            uart.write(&frame);
            self.heartbeat_seq = self.heartbeat_seq.wrapping_add(1);
        }
        self.last_heartbeat_ms = Some(now_ms);
    }

    /// TX scheduler: high-priority first, telemetry only when the channel is
    /// quiet and the rate gate allows.
    fn service_radio_tx(&mut self, now_ms: u32, radio: &mut dyn RadioLink) {
        let downlink_recent = match self.last_downlink_ms {
            Some(t) => now_ms.wrapping_sub(t) < self.cfg.downlink_hold_ms,
            None => false,
        };

        if let Some(frame) = self.priority_slot.as_deref() {
            if !looks_framed(frame) {
                // Can never become well-formed; discard rather than wedge the
                // slot.
                warn!("discarding malformed priority frame ({} B)", frame.len());
                self.priority_slot = None;
                return;
            }
            match radio.transmit(frame, now_ms) {
                TxOutcome::Ok => {
                    debug!("priority uplink sent ({} B)", frame.len());
                    self.priority_slot = None;
                }
                TxOutcome::Busy => {}
                TxOutcome::Fail => {
                    warn!("priority uplink TX failed, keeping frame");
                }
            }
            // Whatever happened, telemetry waits for a tick with an empty
            // priority slot.
            return;
        }

        if downlink_recent {
            return;
        }

        let telem_due = match self.last_telem_tx_ms {
            None => true,
            Some(last) => now_ms.wrapping_sub(last) >= self.cfg.telem_period_ms,
        };
        if !telem_due {
            return;
        }

        if let Some(frame) = self.telem_slot.as_deref() {
            match radio.transmit(frame, now_ms) {
                TxOutcome::Ok => {
                    self.telem_slot = None;
                    self.last_telem_tx_ms = Some(now_ms);
                }
                TxOutcome::Busy => {}
                TxOutcome::Fail => {
                    warn!("telemetry uplink TX failed, keeping frame");
                }
            }
        }
    }
}

/// Downlink whitelist: message type plus its exact payload length.
fn downlink_permitted(msg_type: u8, payload_len: usize) -> bool {
    matches!(
        (msg_type, payload_len),
        (proto::MSG_MODE_SWITCH, MODE_SWITCH_WIRE_LEN)
            | (proto::MSG_MANUAL_CMD, MANUAL_CMD_WIRE_LEN)
            | (proto::MSG_SETPOINTS, SETPOINTS_WIRE_LEN)
            | (proto::MSG_HEARTBEAT, 0)
    )
}

fn hex_prefix(bytes: &[u8], n: usize) -> String {
    let shown: Vec<String> = bytes.iter().take(n).map(|b| format!("{:02X}", b)).collect();
    let mut s = shown.join(" ");
    if bytes.len() > n {
        s.push_str(" ..");
    }
    s
}
