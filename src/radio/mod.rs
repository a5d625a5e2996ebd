//! # Radio Link Abstraction
//!
//! The relays only need five logical operations from the transceiver: reset,
//! configure, transmit one payload, receive one payload, check busy. Chip
//! register programming lives behind [`RadioLink`]; what matters up here is
//! the three-valued TX outcome.
//!
//! `Busy` and `Fail` are deliberately distinct: busy means the local radio
//! deferred and nothing went on air, so the reliable-downlink engine must not
//! burn a retry on it.

pub mod udp;

pub use udp::UdpRadio;

use crate::proto::frame::MAX_FRAME;

/// Largest packet a link has to carry: one framed message plus a short noise
/// prelude the parser will discard.
pub const MAX_PACKET: usize = MAX_FRAME + 16;

/// Outcome of one transmit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// Payload went on air
    Ok,
    /// Radio deferred (guard interval, channel in use); nothing transmitted
    Busy,
    /// Hard failure; the radio may have self-healed
    Fail,
}

/// Receive-side metadata for one packet.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RxMeta {
    pub len: usize,
    pub rssi_dbm: i16,
    pub snr_db: f32,
}

/// Running diagnostics, surfaced by the ground shell's `lora stat`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RadioDiag {
    pub reinit_total: u32,
    pub reinit_tx_timeout: u32,
    pub last_rssi_dbm: i16,
    pub last_snr_db: f32,
}

/// The logical transceiver operations the relays depend on.
pub trait RadioLink {
    /// Reset and reconfigure the radio. Returns false if the chip does not
    /// come back.
    fn reinit(&mut self) -> bool;

    /// Transmit one payload. Non-blocking from the caller's view apart from
    /// the driver's internal TX-done wait.
    fn transmit(&mut self, payload: &[u8], now_ms: u32) -> TxOutcome;

    /// Poll for one received packet; at most one per call.
    fn poll_receive(&mut self, buf: &mut [u8], now_ms: u32) -> Option<RxMeta>;

    /// Diagnostic snapshot.
    fn diag(&self) -> RadioDiag {
        RadioDiag::default()
    }
}
