//! # Ground Relay
//!
//! Bridges the radio back to the host. Uplink traffic (telemetry, ACKs) is
//! decoded and surfaced as parseable shell lines; downlink commands go
//! through a reliable engine: one in-flight command, 400 ms ACK timeout,
//! bounded retries, and the cardinal rule that a BUSY radio never burns a
//! retry — busy means nothing went on air, so the remote side never had a
//! chance to answer.
//!
//! Within a tick, radio RX (including ACK matching) runs before retry
//! service, so a retry is never issued in the same tick its ACK arrived.

use crate::proto::{
    self, encode, Ack, Parser, SetpointsMsg, Telemetry, MSG_ACK, MSG_MANUAL_CMD, MSG_MODE_SWITCH,
    MSG_SETPOINTS, MSG_TELEMETRY,
};
use crate::radio::{RadioDiag, RadioLink, TxOutcome, MAX_PACKET};
use crate::shell::ShellCommand;
use tracing::{debug, warn};

/// Reliable-downlink tuning.
#[derive(Debug, Clone, Copy)]
pub struct DownlinkConfig {
    /// How long to wait for an ACK after a successful-looking transmit
    pub ack_timeout_ms: u32,
    /// Retry budget after the first transmit
    pub max_retry: u8,
    /// Continuous BUSY longer than this draws a warning line
    pub busy_warn_after_ms: u32,
    /// Minimum spacing between busy warnings
    pub busy_warn_every_ms: u32,
    /// Radio silence longer than this triggers a self-heal
    pub rx_watchdog_ms: u32,
    /// Minimum spacing between self-heal attempts
    pub reinit_cooldown_ms: u32,
}

impl Default for DownlinkConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: 400,
            max_retry: 3,
            busy_warn_after_ms: 3_000,
            busy_warn_every_ms: 1_000,
            rx_watchdog_ms: 5_000,
            reinit_cooldown_ms: 3_000,
        }
    }
}

/// One in-flight reliable command.
#[derive(Debug, Clone)]
pub struct PendingCommand {
    pub msg_type: u8,
    pub seq: u8,
    pub frame: Vec<u8>,
    pub retry: u8,
    pub last_send_ms: u32,
    pub sent_once: bool,
    pub busy_since_ms: Option<u32>,
    pub last_busy_warn_ms: Option<u32>,
}

/// Message types that expect an ACK from the controller.
fn expects_ack(msg_type: u8) -> bool {
    matches!(msg_type, MSG_MODE_SWITCH | MSG_MANUAL_CMD | MSG_SETPOINTS)
}

/// The ground relay state machine.
pub struct GroundRelay {
    cfg: DownlinkConfig,
    parser: Parser,
    next_seq: u8,
    pending: Option<PendingCommand>,
    last_packet_ms: Option<u32>,
    last_reinit_ms: Option<u32>,
    rx_packets: u32,
    raw_sniff: bool,
}

impl GroundRelay {
    pub fn new(cfg: DownlinkConfig) -> Self {
        Self {
            cfg,
            parser: Parser::new(),
            next_seq: 1,
            pending: None,
            last_packet_ms: None,
            last_reinit_ms: None,
            rx_packets: 0,
            raw_sniff: false,
        }
    }

    pub fn pending(&self) -> Option<&PendingCommand> {
        self.pending.as_ref()
    }

    pub fn set_raw_sniff(&mut self, on: bool) {
        self.raw_sniff = on;
    }

    pub fn raw_sniff(&self) -> bool {
        self.raw_sniff
    }

    /// Next downlink sequence number: monotonic u8, skipping 0 on wrap.
    fn alloc_seq(&mut self) -> u8 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        if self.next_seq == 0 {
            self.next_seq = 1;
        }
        seq
    }

    /// Encode and transmit a control frame; install a [`PendingCommand`] when
    /// the type expects an ACK. Returns the sequence number used.
    pub fn submit(
        &mut self,
        msg_type: u8,
        payload: &[u8],
        now_ms: u32,
        radio: &mut dyn RadioLink,
        lines: &mut Vec<String>,
    ) -> Option<u8> {
        let seq = self.alloc_seq();
        let frame = match encode(msg_type, seq, payload) {
            Ok(f) => f,
            Err(e) => {
                warn!("cannot encode downlink: {}", e);
                return None;
            }
        };

        let outcome = radio.transmit(&frame, now_ms);

        if !expects_ack(msg_type) {
            return Some(seq);
        }

        if self.pending.is_some() {
            warn!("replacing unfinished pending command");
        }

        let mut pc = PendingCommand {
            msg_type,
            seq,
            frame,
            retry: 0,
            last_send_ms: now_ms,
            sent_once: false,
            busy_since_ms: None,
            last_busy_warn_ms: None,
        };
        match outcome {
            TxOutcome::Ok | TxOutcome::Fail => {
                pc.sent_once = true;
            }
            TxOutcome::Busy => {
                note_busy(&mut pc, &self.cfg, now_ms, lines);
            }
        }
        self.pending = Some(pc);
        Some(seq)
    }

    /// Run one relay iteration. Host-facing output lines are appended to
    /// `lines`.
    pub fn tick(&mut self, now_ms: u32, radio: &mut dyn RadioLink, lines: &mut Vec<String>) {
        self.service_rx(now_ms, radio, lines);
        self.service_watchdog(now_ms, radio);
        self.service_retry(now_ms, radio, lines);
    }

    /// Poll one radio packet and surface its frames.
    fn service_rx(&mut self, now_ms: u32, radio: &mut dyn RadioLink, lines: &mut Vec<String>) {
        let mut buf = [0u8; MAX_PACKET];
        let Some(meta) = radio.poll_receive(&mut buf, now_ms) else {
            return;
        };

        self.last_packet_ms = Some(now_ms);
        self.rx_packets += 1;
        let packet = &buf[..meta.len];

        if self.raw_sniff {
            lines.push(format!(
                "[LORA] raw {} B rssi={} snr={:.1}: {}",
                meta.len,
                meta.rssi_dbm,
                meta.snr_db,
                hex_dump(packet)
            ));
            return;
        }

        for &b in packet {
            let Some(frame) = self.parser.feed(b) else {
                continue;
            };

            match frame.msg_type {
                MSG_TELEMETRY => {
                    if let Some(telem) = Telemetry::decode(frame.payload) {
                        lines.push(format_telem_line(&telem));
                    }
                }
                MSG_ACK => {
                    let Some(ack) = Ack::decode(frame.payload) else {
                        continue;
                    };
                    lines.push(format!(
                        "[ACK] for=0x{:02X} status={}",
                        ack.acked_msg_type, ack.status
                    ));

                    // A negative ACK is still a terminal response.
                    if let Some(pc) = self.pending.as_ref() {
                        if pc.msg_type == ack.acked_msg_type && pc.seq == frame.seq {
                            lines.push(format!(
                                "[CMD] ACK received for msg=0x{:02X} seq={} status={}",
                                ack.acked_msg_type, frame.seq, ack.status
                            ));
                            self.pending = None;
                        }
                    }
                }
                other => {
                    debug!("ignoring uplink type 0x{:02X}", other);
                }
            }
        }
    }

    /// Self-heal the radio after prolonged silence.
    fn service_watchdog(&mut self, now_ms: u32, radio: &mut dyn RadioLink) {
        let Some(last_packet) = self.last_packet_ms else {
            // Never heard anything; nothing to compare against.
            return;
        };
        if now_ms.wrapping_sub(last_packet) <= self.cfg.rx_watchdog_ms {
            return;
        }
        if let Some(last_reinit) = self.last_reinit_ms {
            if now_ms.wrapping_sub(last_reinit) < self.cfg.reinit_cooldown_ms {
                return;
            }
        }

        warn!(
            "no radio packet for {} ms, reinitialising radio",
            now_ms.wrapping_sub(last_packet)
        );
        radio.reinit();
        self.last_reinit_ms = Some(now_ms);
        // Reset the reference so the watchdog does not re-trigger immediately.
        self.last_packet_ms = Some(now_ms);
    }

    /// Drive the in-flight command: first send, ACK wait, retries.
    fn service_retry(&mut self, now_ms: u32, radio: &mut dyn RadioLink, lines: &mut Vec<String>) {
        let Some(pc) = self.pending.as_mut() else {
            return;
        };

        if !pc.sent_once {
            // Never actually went on air yet; keep trying without touching
            // the retry budget.
            match radio.transmit(&pc.frame, now_ms) {
                TxOutcome::Busy => note_busy(pc, &self.cfg, now_ms, lines),
                TxOutcome::Ok | TxOutcome::Fail => {
                    pc.sent_once = true;
                    pc.last_send_ms = now_ms;
                    pc.busy_since_ms = None;
                }
            }
            return;
        }

        if now_ms.wrapping_sub(pc.last_send_ms) < self.cfg.ack_timeout_ms {
            return;
        }

        if pc.retry >= self.cfg.max_retry {
            lines.push(format!(
                "[CMD] FAIL: no ACK for msg=0x{:02X} seq={}",
                pc.msg_type, pc.seq
            ));
            self.pending = None;
            return;
        }

        match radio.transmit(&pc.frame, now_ms) {
            TxOutcome::Busy => note_busy(pc, &self.cfg, now_ms, lines),
            TxOutcome::Ok | TxOutcome::Fail => {
                pc.retry += 1;
                pc.last_send_ms = now_ms;
                pc.busy_since_ms = None;
                lines.push(format!(
                    "[CMD] RETRY #{} msg=0x{:02X} seq={}",
                    pc.retry, pc.msg_type, pc.seq
                ));
            }
        }
    }

    /// Diagnostic lines for `lora stat`.
    pub fn stat_lines(&self, diag: RadioDiag, now_ms: u32) -> Vec<String> {
        let age = match self.last_packet_ms {
            Some(t) => format!("{}", now_ms.wrapping_sub(t)),
            None => "never".to_string(),
        };
        let pending = match &self.pending {
            Some(pc) => format!(
                "msg=0x{:02X} seq={} retry={} sent_once={}",
                pc.msg_type, pc.seq, pc.retry, pc.sent_once
            ),
            None => "none".to_string(),
        };
        vec![
            format!(
                "[LORA] rx_packets={} last_packet_age_ms={} reinit_total={} rssi={}dBm snr={:.1}dB",
                self.rx_packets, age, diag.reinit_total, diag.last_rssi_dbm, diag.last_snr_db
            ),
            format!(
                "[LORA] pending={} raw={}",
                pending,
                if self.raw_sniff { "on" } else { "off" }
            ),
        ]
    }
}

/// Continuous-BUSY bookkeeping shared by first-send and retry paths.
fn note_busy(pc: &mut PendingCommand, cfg: &DownlinkConfig, now_ms: u32, lines: &mut Vec<String>) {
    let since = *pc.busy_since_ms.get_or_insert(now_ms);
    if now_ms.wrapping_sub(since) <= cfg.busy_warn_after_ms {
        return;
    }
    let warn_due = match pc.last_busy_warn_ms {
        None => true,
        Some(last) => now_ms.wrapping_sub(last) >= cfg.busy_warn_every_ms,
    };
    if warn_due {
        lines.push("[CMD] WARNING: LoRa TX busy > 3s (busy does not count retry)".to_string());
        pc.last_busy_warn_ms = Some(now_ms);
    }
}

/// The telemetry line the host GUI parses.
pub fn format_telem_line(t: &Telemetry) -> String {
    format!(
        "[TELEM] t={} T0={:.2} T1={:.2} P(Pa)={:.1} heater=%={:.1} valve=%={:.1}",
        t.timestamp_ms, t.temp_c[0], t.temp_c[1], t.pressure_pa, t.heater_pct, t.valve_pct
    )
}

fn hex_dump(bytes: &[u8]) -> String {
    let shown: Vec<String> = bytes.iter().take(24).map(|b| format!("{:02X}", b)).collect();
    let mut s = shown.join(" ");
    if bytes.len() > 24 {
        s.push_str(" ..");
    }
    s
}

/// Execute one parsed shell command against the relay.
///
/// `staged` holds the ground-side copy of the setpoints: each `set …`
/// updates one field plus its enable bit and downloads the whole set.
pub fn apply_shell_command(
    relay: &mut GroundRelay,
    staged: &mut SetpointsMsg,
    cmd: &ShellCommand,
    now_ms: u32,
    radio: &mut dyn RadioLink,
    lines: &mut Vec<String>,
) {
    match cmd {
        ShellCommand::Help => {
            lines.extend(crate::shell::help_lines());
        }

        ShellCommand::Mode(mode) => {
            let payload = proto::ModeSwitch { mode: *mode }.encode();
            relay.submit(MSG_MODE_SWITCH, &payload, now_ms, radio, lines);
        }

        ShellCommand::SetHeater(pct) => {
            let msg = proto::ManualCmdMsg {
                flags: proto::MANUAL_FLAG_HEATER,
                heater_pct: *pct,
                ..Default::default()
            };
            relay.submit(MSG_MANUAL_CMD, &msg.encode(), now_ms, radio, lines);
        }

        ShellCommand::SetValve(pct) => {
            let msg = proto::ManualCmdMsg {
                flags: proto::MANUAL_FLAG_VALVE,
                valve_pct: *pct,
                ..Default::default()
            };
            relay.submit(MSG_MANUAL_CMD, &msg.encode(), now_ms, radio, lines);
        }

        ShellCommand::SetTempC(v) => {
            staged.target_temp_c = *v;
            staged.enable_mask |= proto::SP_ENABLE_TEMP;
            relay.submit(MSG_SETPOINTS, &staged.encode(), now_ms, radio, lines);
        }

        ShellCommand::SetPressurePa(v) => {
            staged.target_pressure_pa = *v;
            staged.enable_mask |= proto::SP_ENABLE_PRESSURE;
            relay.submit(MSG_SETPOINTS, &staged.encode(), now_ms, radio, lines);
        }

        ShellCommand::SetValveSp(v) => {
            staged.target_valve_pct = *v;
            staged.enable_mask |= proto::SP_ENABLE_VALVE;
            relay.submit(MSG_SETPOINTS, &staged.encode(), now_ms, radio, lines);
        }

        ShellCommand::LoraStat => {
            lines.extend(relay.stat_lines(radio.diag(), now_ms));
        }

        ShellCommand::LoraRaw(on) => {
            relay.set_raw_sniff(*on);
            lines.push(format!("[LORA] raw sniff {}", if *on { "on" } else { "off" }));
        }

        ShellCommand::LoraTx(text) => {
            let outcome = radio.transmit(text.as_bytes(), now_ms);
            lines.push(format!("[LORA] tx {:?}", outcome));
        }

        ShellCommand::LoraPing => {
            relay.submit(proto::MSG_HEARTBEAT, &[], now_ms, radio, lines);
            lines.push("[LORA] ping sent".to_string());
        }
    }
}
