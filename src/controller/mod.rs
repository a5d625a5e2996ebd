//! # Controller Node
//!
//! The field controller's cooperative loop. Every tick, in strict order:
//!
//! 1. Drain UART bytes into the frame parser and dispatch commands
//! 2. Sample the sensor rig
//! 3. Compute outputs from the mode policy
//! 4. Run the safety interlock (which may overrule mode and outputs)
//! 5. Apply outputs to the actuators
//! 6. Emit periodic telemetry carrying the *applied* outputs
//!
//! Safety runs after mode compute so a MANUAL command cannot evade the
//! interlocks by being evaluated last.

pub mod actuators;
pub mod auto;
pub mod mode;
pub mod safety;
pub mod sensors;
pub mod state;

pub use actuators::{ActuatorBank, Actuators, DigitalOut, HeaterDrive, PwmOut, ValveDrive};
pub use auto::{AutoPolicy, IdleAuto};
pub use safety::SafetyLimits;
pub use sensors::{SensorRig, SyntheticRig};
pub use state::{ControlState, ManualCmd, Outputs, Setpoints};

use crate::proto::{
    self, encode, Ack, FrameView, ManualCmdMsg, ModeSwitch, Parser, SetpointsMsg, Telemetry,
    ACK_ERR, ACK_OK, MSG_ACK, MSG_HEARTBEAT, MSG_MANUAL_CMD, MSG_MODE_SWITCH, MSG_SETPOINTS,
    MSG_TELEMETRY,
};
use tracing::{debug, info};

/// At most this many UART octets are consumed per tick, bounding tick work.
pub const UART_DRAIN_BUDGET: usize = 256;

/// The controller loop state machine.
pub struct Controller<A: AutoPolicy> {
    state: ControlState,
    parser: Parser,
    auto: A,
    limits: SafetyLimits,
    telemetry_period_ms: u32,
    telem_seq: u8,
    last_telemetry_tx_ms: Option<u32>,
    last_outputs: Outputs,
}

impl<A: AutoPolicy> Controller<A> {
    pub fn new(telemetry_period_ms: u32, limits: SafetyLimits, auto: A) -> Self {
        Self {
            state: ControlState::new(),
            parser: Parser::new(),
            auto,
            limits,
            telemetry_period_ms,
            telem_seq: 0,
            last_telemetry_tx_ms: None,
            last_outputs: Outputs::zero(),
        }
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    /// Outputs applied on the most recent tick, post safety clamp.
    pub fn last_outputs(&self) -> Outputs {
        self.last_outputs
    }

    /// Run one loop iteration.
    ///
    /// # Arguments
    ///
    /// * `now_ms` - Monotonic millisecond clock (wrap-tolerant)
    /// * `uart_rx` - Bytes received since the previous tick
    /// * `sensors` - Fresh-sample source
    /// * `actuators` - Output sink
    /// * `uart_tx` - Buffer the tick appends outgoing frames to (ACKs,
    ///   telemetry)
    ///
    /// Returns the number of `uart_rx` octets consumed (at most
    /// [`UART_DRAIN_BUDGET`]); the caller keeps the rest for the next tick.
    pub fn tick(
        &mut self,
        now_ms: u32,
        uart_rx: &[u8],
        sensors: &mut dyn SensorRig,
        actuators: &mut dyn Actuators,
        uart_tx: &mut Vec<u8>,
    ) -> usize {
        // 1. Link poll
        let consumed = uart_rx.len().min(UART_DRAIN_BUDGET);
        for &b in &uart_rx[..consumed] {
            if let Some(frame) = self.parser.feed(b) {
                dispatch(&mut self.state, &frame, now_ms, uart_tx);
            }
        }

        // 2. Sample
        let telem = sensors.sample(now_ms);

        // 3. Compute
        let mut out = mode::compute(&self.state, &telem, &self.auto);

        // 4. Safety clamp
        safety::check_and_clamp(&mut self.state, &telem, &mut out, now_ms, &self.limits);

        // 5. Apply
        actuators.apply(&out, now_ms);
        self.last_outputs = out;

        // 6. Telemetry TX
        let due = match self.last_telemetry_tx_ms {
            None => true,
            Some(last) => now_ms.wrapping_sub(last) >= self.telemetry_period_ms,
        };
        if due {
            self.send_telemetry(&telem, &out, now_ms, uart_tx);
            self.last_telemetry_tx_ms = Some(now_ms);
        }

        consumed
    }

    fn send_telemetry(&mut self, telem: &Telemetry, out: &Outputs, now_ms: u32, uart_tx: &mut Vec<u8>) {
        let payload = Telemetry {
            timestamp_ms: now_ms,
            temp_count: telem.temp_count,
            temp_c: telem.temp_c,
            pressure_pa: telem.pressure_pa,
            // Applied values, not the raw command
            heater_pct: out.heater_pct,
            valve_pct: out.valve_pct,
        }
        .encode();

        if let Ok(frame) = encode(MSG_TELEMETRY, self.telem_seq, &payload) {
            uart_tx.extend_from_slice(&frame);
            self.telem_seq = self.telem_seq.wrapping_add(1);
        }
    }
}

/// Handle one received frame: refresh link liveness, then act by type.
///
/// Known types with a malformed payload are answered with Ack(ERR) for the
/// same sequence; unknown types are ignored without an Ack so a remote retry
/// engine cannot be fed by its own noise.
fn dispatch(state: &mut ControlState, frame: &FrameView<'_>, now_ms: u32, uart_tx: &mut Vec<u8>) {
    state.last_cmd_ms = now_ms;
    state.link_alive = true;
    state.last_link_heartbeat_ms = now_ms;

    match frame.msg_type {
        MSG_HEARTBEAT => {
            // Liveness refresh only; heartbeats are never acknowledged.
            debug!("heartbeat, seq={}", frame.seq);
        }

        MSG_MODE_SWITCH => match ModeSwitch::decode(frame.payload) {
            Some(msg) => {
                info!("mode switch -> {:?}", msg.mode);
                state.mode = msg.mode;
                push_ack(uart_tx, frame.msg_type, frame.seq, ACK_OK);
            }
            None => push_ack(uart_tx, frame.msg_type, frame.seq, ACK_ERR),
        },

        MSG_MANUAL_CMD => match ManualCmdMsg::decode(frame.payload) {
            Some(msg) => {
                state.manual = ManualCmd {
                    has_heater: msg.flags & proto::MANUAL_FLAG_HEATER != 0,
                    heater_pct: msg.heater_pct,
                    has_valve: msg.flags & proto::MANUAL_FLAG_VALVE != 0,
                    valve_pct: msg.valve_pct,
                    has_pump_temp: msg.flags & proto::MANUAL_FLAG_PUMP != 0,
                    pump_temp_c: msg.pump_temp_c,
                };
                state.last_manual_ms = now_ms;
                push_ack(uart_tx, frame.msg_type, frame.seq, ACK_OK);
            }
            None => push_ack(uart_tx, frame.msg_type, frame.seq, ACK_ERR),
        },

        MSG_SETPOINTS => match SetpointsMsg::decode(frame.payload) {
            Some(msg) => {
                state.setpoints = Setpoints {
                    target_temp_c: msg.target_temp_c,
                    target_pressure_pa: msg.target_pressure_pa,
                    target_valve_pct: msg.target_valve_pct,
                    target_pump_temp_c: msg.target_pump_temp_c,
                    temp_ctrl: msg.enable_mask & proto::SP_ENABLE_TEMP != 0,
                    pressure_ctrl: msg.enable_mask & proto::SP_ENABLE_PRESSURE != 0,
                    valve_ctrl: msg.enable_mask & proto::SP_ENABLE_VALVE != 0,
                    pump_ctrl: msg.enable_mask & proto::SP_ENABLE_PUMP != 0,
                };
                state.last_setpoint_ms = now_ms;
                push_ack(uart_tx, frame.msg_type, frame.seq, ACK_OK);
            }
            None => push_ack(uart_tx, frame.msg_type, frame.seq, ACK_ERR),
        },

        // Unrecognised: no Ack, no state change beyond liveness.
        _ => {}
    }
}

fn push_ack(uart_tx: &mut Vec<u8>, acked_msg_type: u8, seq: u8, status: u8) {
    let ack = Ack {
        acked_msg_type,
        status,
    };
    if let Ok(frame) = encode(MSG_ACK, seq, &ack.encode()) {
        uart_tx.extend_from_slice(&frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{Mode, Parser as WireParser, MANUAL_FLAG_HEATER};

    /// Sensor stub returning a fixed sample.
    struct FixedRig(Telemetry);

    impl SensorRig for FixedRig {
        fn sample(&mut self, now_ms: u32) -> Telemetry {
            let mut t = self.0;
            t.timestamp_ms = now_ms;
            t
        }
    }

    /// Actuator sink recording the last applied outputs.
    #[derive(Default)]
    struct RecordingBank {
        last: Option<(Outputs, u32)>,
    }

    impl Actuators for RecordingBank {
        fn apply(&mut self, out: &Outputs, now_ms: u32) {
            self.last = Some((*out, now_ms));
        }
    }

    fn rig(temp: f32) -> FixedRig {
        FixedRig(Telemetry {
            temp_count: 2,
            temp_c: [temp, temp + 0.5, 0.0, 0.0],
            pressure_pa: 101_325.0,
            ..Default::default()
        })
    }

    fn controller() -> Controller<IdleAuto> {
        Controller::new(200, SafetyLimits::default(), IdleAuto)
    }

    fn manual_heater_cmd(seq: u8, pct: f32) -> Vec<u8> {
        let msg = ManualCmdMsg {
            flags: MANUAL_FLAG_HEATER,
            heater_pct: pct,
            ..Default::default()
        };
        encode(MSG_MANUAL_CMD, seq, &msg.encode()).unwrap()
    }

    fn mode_cmd(seq: u8, mode: Mode) -> Vec<u8> {
        encode(MSG_MODE_SWITCH, seq, &ModeSwitch { mode }.encode()).unwrap()
    }

    /// Pull all frames out of a tick's TX buffer.
    fn decode_tx(buf: &[u8]) -> Vec<crate::proto::OwnedFrame> {
        WireParser::new().feed_all(buf)
    }

    #[test]
    fn test_mode_switch_is_acked_and_applied() {
        let mut ctl = controller();
        let mut bank = RecordingBank::default();
        let mut tx = Vec::new();

        ctl.tick(0, &mode_cmd(7, Mode::Manual), &mut rig(20.0), &mut bank, &mut tx);

        assert_eq!(ctl.state().mode, Mode::Manual);
        let frames = decode_tx(&tx);
        let ack = frames.iter().find(|f| f.msg_type == MSG_ACK).unwrap();
        assert_eq!(ack.seq, 7);
        assert_eq!(ack.payload, vec![MSG_MODE_SWITCH, ACK_OK]);
    }

    #[test]
    fn test_bad_payload_length_gets_ack_err() {
        let mut ctl = controller();
        let mut bank = RecordingBank::default();
        let mut tx = Vec::new();

        // ModeSwitch with a 2-byte payload
        let bad = encode(MSG_MODE_SWITCH, 9, &[0x01, 0x00]).unwrap();
        ctl.tick(0, &bad, &mut rig(20.0), &mut bank, &mut tx);

        assert_eq!(ctl.state().mode, Mode::Safe);
        let frames = decode_tx(&tx);
        let ack = frames.iter().find(|f| f.msg_type == MSG_ACK).unwrap();
        assert_eq!(ack.seq, 9);
        assert_eq!(ack.payload, vec![MSG_MODE_SWITCH, ACK_ERR]);
    }

    #[test]
    fn test_unknown_msg_type_is_silent_but_refreshes_link() {
        let mut ctl = controller();
        let mut bank = RecordingBank::default();
        let mut tx = Vec::new();

        let unknown = encode(0x7F, 3, &[1, 2, 3]).unwrap();
        ctl.tick(5, &unknown, &mut rig(20.0), &mut bank, &mut tx);

        assert!(ctl.state().link_alive);
        assert_eq!(ctl.state().last_cmd_ms, 5);
        assert!(decode_tx(&tx).iter().all(|f| f.msg_type != MSG_ACK));
    }

    #[test]
    fn test_heartbeat_refreshes_link_without_ack() {
        let mut ctl = controller();
        let mut bank = RecordingBank::default();
        let mut tx = Vec::new();

        let hb = encode(MSG_HEARTBEAT, 1, &[]).unwrap();
        ctl.tick(10, &hb, &mut rig(20.0), &mut bank, &mut tx);

        assert!(ctl.state().link_alive);
        assert!(decode_tx(&tx).iter().all(|f| f.msg_type != MSG_ACK));
    }

    #[test]
    fn test_manual_command_drives_outputs_same_tick() {
        let mut ctl = controller();
        let mut bank = RecordingBank::default();
        let mut tx = Vec::new();

        let mut bytes = mode_cmd(1, Mode::Manual);
        bytes.extend(manual_heater_cmd(2, 80.0));
        ctl.tick(0, &bytes, &mut rig(20.0), &mut bank, &mut tx);

        let (out, _) = bank.last.unwrap();
        assert_eq!(out.heater_pct, 80.0);
        assert_eq!(ctl.last_outputs().heater_pct, 80.0);
    }

    #[test]
    fn test_overtemperature_zeroes_outputs_and_reports_safe() {
        let mut ctl = controller();
        let mut bank = RecordingBank::default();
        let mut tx = Vec::new();

        let mut bytes = mode_cmd(1, Mode::Manual);
        bytes.extend(manual_heater_cmd(2, 80.0));
        ctl.tick(0, &bytes, &mut rig(20.0), &mut bank, &mut tx);
        assert_eq!(bank.last.unwrap().0.heater_pct, 80.0);

        // Next tick the rig reads 85 C
        tx.clear();
        ctl.tick(100, &[], &mut rig(85.0), &mut bank, &mut tx);

        let (out, _) = bank.last.unwrap();
        assert_eq!(out, Outputs::zero());
        assert_eq!(ctl.state().mode, Mode::Safe);

        // Telemetry reflects the clamped outputs and SAFE persists
        tx.clear();
        ctl.tick(300, &[], &mut rig(20.0), &mut bank, &mut tx);
        assert_eq!(ctl.state().mode, Mode::Safe);
        let frames = decode_tx(&tx);
        let telem_frame = frames.iter().find(|f| f.msg_type == MSG_TELEMETRY).unwrap();
        let telem = Telemetry::decode(&telem_frame.payload).unwrap();
        assert_eq!(telem.heater_pct, 0.0);
    }

    #[test]
    fn test_link_loss_forces_safe_and_recovery_keeps_safe() {
        let mut ctl = controller();
        let mut bank = RecordingBank::default();
        let mut tx = Vec::new();

        let mut bytes = mode_cmd(1, Mode::Manual);
        bytes.extend(manual_heater_cmd(2, 40.0));
        ctl.tick(0, &bytes, &mut rig(20.0), &mut bank, &mut tx);
        assert_eq!(ctl.state().mode, Mode::Manual);

        // Silence for > 1500 ms
        ctl.tick(1_600, &[], &mut rig(20.0), &mut bank, &mut tx);
        assert!(!ctl.state().link_alive);
        assert_eq!(ctl.state().mode, Mode::Safe);
        assert_eq!(bank.last.unwrap().0, Outputs::zero());

        // Any valid frame revives the link, but mode stays SAFE until an
        // explicit mode switch.
        let hb = encode(MSG_HEARTBEAT, 5, &[]).unwrap();
        ctl.tick(1_700, &hb, &mut rig(20.0), &mut bank, &mut tx);
        assert!(ctl.state().link_alive);
        assert_eq!(ctl.state().mode, Mode::Safe);
        assert_eq!(ctl.state().last_link_heartbeat_ms, 1_700);
    }

    #[test]
    fn test_telemetry_period_gating() {
        let mut ctl = controller();
        let mut bank = RecordingBank::default();

        let count_telem = |tx: &[u8]| {
            decode_tx(tx)
                .iter()
                .filter(|f| f.msg_type == MSG_TELEMETRY)
                .count()
        };

        let mut tx = Vec::new();
        ctl.tick(0, &[], &mut rig(20.0), &mut bank, &mut tx);
        assert_eq!(count_telem(&tx), 1); // first tick emits immediately

        tx.clear();
        ctl.tick(100, &[], &mut rig(20.0), &mut bank, &mut tx);
        assert_eq!(count_telem(&tx), 0); // 100 ms < 200 ms period

        tx.clear();
        ctl.tick(200, &[], &mut rig(20.0), &mut bank, &mut tx);
        assert_eq!(count_telem(&tx), 1);
    }

    #[test]
    fn test_uart_drain_budget_bounds_tick_work() {
        let mut ctl = controller();
        let mut bank = RecordingBank::default();
        let mut tx = Vec::new();

        // A command placed beyond the per-tick budget is not consumed this
        // tick; the caller is told how much was drained.
        let mut bytes = vec![0u8; UART_DRAIN_BUDGET];
        bytes.extend(mode_cmd(1, Mode::Manual));
        let consumed = ctl.tick(0, &bytes, &mut rig(20.0), &mut bank, &mut tx);
        assert_eq!(consumed, UART_DRAIN_BUDGET);
        assert_eq!(ctl.state().mode, Mode::Safe);

        // The retained remainder completes on the next tick
        let consumed = ctl.tick(10, &bytes[consumed..], &mut rig(20.0), &mut bank, &mut tx);
        assert_eq!(consumed, bytes.len() - UART_DRAIN_BUDGET);
        assert_eq!(ctl.state().mode, Mode::Manual);
    }
}
