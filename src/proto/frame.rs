//! # Frame Codec
//!
//! Self-synchronising binary framing spoken on every link (UART and radio).
//!
//! Frame layout:
//!
//! ```text
//! 0x55 0xAA | len | msg_type | seq | payload (0-220) | crc_lo | crc_hi
//! ```
//!
//! `len` counts msg_type + seq + payload + CRC (so `payload_len + 4`).
//! The CRC is Modbus CRC-16 over `len..payload` inclusive, little-endian on
//! the wire. The sync octets and the CRC itself are not covered.

use super::crc::{crc16_modbus, Crc16};
use crate::error::{LinkError, Result};

/// First sync octet
pub const SYNC1: u8 = 0x55;

/// Second sync octet
pub const SYNC2: u8 = 0xAA;

/// Maximum payload size in octets
pub const MAX_PAYLOAD: usize = 220;

/// Maximum `len` field value: msg_type + seq + MAX_PAYLOAD + CRC16
const MAX_BODY: usize = MAX_PAYLOAD + 4;

/// Maximum encoded frame size: sync(2) + len(1) + body(MAX_BODY)
pub const MAX_FRAME: usize = MAX_BODY + 3;

/// Encode one frame
///
/// # Arguments
///
/// * `msg_type` - Message type octet (see the message catalogue)
/// * `seq` - Sequence octet
/// * `payload` - Payload bytes (at most [`MAX_PAYLOAD`])
///
/// # Returns
///
/// * `Result<Vec<u8>>` - Complete frame bytes, or error if the payload is
///   too large
pub fn encode(msg_type: u8, seq: u8, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD {
        return Err(LinkError::Frame(format!(
            "payload size {} exceeds maximum {}",
            payload.len(),
            MAX_PAYLOAD
        )));
    }

    let len = (payload.len() + 4) as u8;

    let mut frame = Vec::with_capacity(3 + len as usize);
    frame.push(SYNC1);
    frame.push(SYNC2);
    frame.push(len);
    frame.push(msg_type);
    frame.push(seq);
    frame.extend_from_slice(payload);

    // CRC over len..payload, i.e. everything after the sync octets so far
    let crc = crc16_modbus(&frame[2..]);
    frame.push((crc & 0xFF) as u8);
    frame.push((crc >> 8) as u8);

    Ok(frame)
}

/// Quick shape check used by the relays before handing a queued frame to the
/// radio: does the buffer start with the sync pair?
pub fn looks_framed(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == SYNC1 && bytes[1] == SYNC2
}

/// A decoded frame, borrowed from the parser's internal buffer.
///
/// The view is valid until the next call to [`Parser::feed`]; copy the
/// payload out if it needs to outlive the parse loop.
#[derive(Debug, PartialEq, Eq)]
pub struct FrameView<'a> {
    pub msg_type: u8,
    pub seq: u8,
    pub payload: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitSync1,
    WaitSync2,
    WaitLen,
    WaitBody,
}

/// Resumable streaming frame parser.
///
/// Feed it one octet at a time; it emits a [`FrameView`] whenever a complete,
/// CRC-valid frame has been seen. Garbage, truncated frames and CRC failures
/// are dropped silently and the parser re-arms on the next sync pair, so
/// arbitrarily fragmented or noisy input never needs caller-side buffering.
#[derive(Debug)]
pub struct Parser {
    state: State,
    len: u8,
    body: [u8; MAX_BODY],
    pos: usize,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: State::WaitSync1,
            len: 0,
            body: [0; MAX_BODY],
            pos: 0,
        }
    }

    /// Drop any partial frame and wait for the next sync pair.
    pub fn reset(&mut self) {
        self.state = State::WaitSync1;
        self.len = 0;
        self.pos = 0;
    }

    /// Consume one octet; returns a frame view when `b` completes a valid
    /// frame.
    pub fn feed(&mut self, b: u8) -> Option<FrameView<'_>> {
        match self.state {
            State::WaitSync1 => {
                if b == SYNC1 {
                    self.state = State::WaitSync2;
                }
                None
            }
            State::WaitSync2 => {
                if b == SYNC2 {
                    self.state = State::WaitLen;
                } else if b == SYNC1 {
                    // Drop the previous candidate octet; this one may be the
                    // real start of a frame.
                } else {
                    self.state = State::WaitSync1;
                }
                None
            }
            State::WaitLen => {
                // len covers msg_type + seq + payload + CRC16
                if b < 4 || b as usize > MAX_BODY {
                    self.reset();
                } else {
                    self.len = b;
                    self.pos = 0;
                    self.state = State::WaitBody;
                }
                None
            }
            State::WaitBody => {
                self.body[self.pos] = b;
                self.pos += 1;
                if self.pos < self.len as usize {
                    return None;
                }

                // body = [msg_type, seq, payload..., crc_lo, crc_hi]
                let len = self.len as usize;
                let payload_len = len - 4;
                let crc_rx =
                    (self.body[len - 2] as u16) | ((self.body[len - 1] as u16) << 8);

                let mut digest = Crc16::new();
                digest.update(&[self.len]);
                digest.update(&self.body[..len - 2]);

                self.reset();

                if digest.finish() != crc_rx {
                    return None;
                }

                Some(FrameView {
                    msg_type: self.body[0],
                    seq: self.body[1],
                    payload: &self.body[2..2 + payload_len],
                })
            }
        }
    }

    /// Feed a whole buffer, copying out every frame it completes.
    ///
    /// Convenience for callers that want owned frames rather than views.
    pub fn feed_all(&mut self, bytes: &[u8]) -> Vec<OwnedFrame> {
        let mut frames = Vec::new();
        for &b in bytes {
            if let Some(view) = self.feed(b) {
                frames.push(OwnedFrame {
                    msg_type: view.msg_type,
                    seq: view.seq,
                    payload: view.payload.to_vec(),
                });
            }
        }
        frames
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// An owned copy of a decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFrame {
    pub msg_type: u8,
    pub seq: u8,
    pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let frame = encode(0x10, 7, &[0x01]).unwrap();

        // sync(2) + len(1) + type(1) + seq(1) + payload(1) + crc(2)
        assert_eq!(frame, vec![0x55, 0xAA, 0x05, 0x10, 0x07, 0x01, 0xC2, 0xDD]);

        let crc = crc16_modbus(&frame[2..6]);
        assert_eq!(frame[6], (crc & 0xFF) as u8);
        assert_eq!(frame[7], (crc >> 8) as u8);
    }

    #[test]
    fn test_encode_empty_payload() {
        let frame = encode(0x23, 1, &[]).unwrap();
        assert_eq!(frame.len(), 7);
        assert_eq!(frame[2], 4); // len = type + seq + crc
    }

    #[test]
    fn test_encode_payload_too_large() {
        assert!(encode(0x01, 0, &[0u8; MAX_PAYLOAD]).is_ok());
        assert!(encode(0x01, 0, &[0u8; MAX_PAYLOAD + 1]).is_err());
    }

    #[test]
    fn test_parse_roundtrip() {
        let frame = encode(0x12, 42, &[1, 2, 3, 4]).unwrap();
        let mut parser = Parser::new();

        let mut hits = 0;
        for (i, &b) in frame.iter().enumerate() {
            if let Some(view) = parser.feed(b) {
                assert_eq!(i, frame.len() - 1, "frame must complete on last octet");
                assert_eq!(view.msg_type, 0x12);
                assert_eq!(view.seq, 42);
                assert_eq!(view.payload, &[1, 2, 3, 4]);
                hits += 1;
            }
        }
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_parse_with_garbage_prefix() {
        let mut bytes = vec![0x00, 0xFF];
        bytes.extend(encode(0x10, 7, &[0x01]).unwrap());

        let mut parser = Parser::new();
        let frames = parser.feed_all(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].msg_type, 0x10);
        assert_eq!(frames[0].seq, 7);
        assert_eq!(frames[0].payload, vec![0x01]);
    }

    #[test]
    fn test_parse_resync_on_repeated_sync1() {
        // A stray 0x55 immediately before a real frame must not absorb the
        // frame's own sync pair.
        let mut bytes = vec![0x55];
        bytes.extend(encode(0x10, 7, &[0x01]).unwrap());

        let mut parser = Parser::new();
        assert_eq!(parser.feed_all(&bytes).len(), 1);
    }

    #[test]
    fn test_parse_split_anywhere_is_equivalent() {
        let mut bytes = vec![0xAA, 0x55, 0x00];
        bytes.extend(encode(0x11, 9, &[9; 17]).unwrap());
        bytes.extend(encode(0x23, 10, &[]).unwrap());

        let mut whole = Parser::new();
        let expected = whole.feed_all(&bytes);
        assert_eq!(expected.len(), 2);

        for split in 0..=bytes.len() {
            let mut parser = Parser::new();
            let mut frames = parser.feed_all(&bytes[..split]);
            frames.extend(parser.feed_all(&bytes[split..]));
            assert_eq!(frames, expected, "split at {} diverged", split);
        }
    }

    #[test]
    fn test_parse_single_bit_flip_drops_frame() {
        let frame = encode(0x10, 7, &[0x01]).unwrap();

        // Skip the sync octets: flipping those just makes the frame invisible,
        // which is also a "no frame emitted" outcome.
        for byte_idx in 2..frame.len() {
            for bit in 0..8 {
                let mut corrupted = frame.clone();
                corrupted[byte_idx] ^= 1 << bit;

                let mut parser = Parser::new();
                assert!(
                    parser.feed_all(&corrupted).is_empty(),
                    "bit {} of byte {} slipped through",
                    bit,
                    byte_idx
                );
            }
        }
    }

    #[test]
    fn test_parse_length_out_of_range_resets() {
        let mut parser = Parser::new();

        // len < 4
        assert!(parser.feed_all(&[0x55, 0xAA, 0x03, 0x10, 0x07]).is_empty());
        // len > MAX_BODY
        assert!(parser.feed_all(&[0x55, 0xAA, 0xFF]).is_empty());

        // Parser must still accept a good frame afterwards
        let frame = encode(0x23, 0, &[]).unwrap();
        assert_eq!(parser.feed_all(&frame).len(), 1);
    }

    #[test]
    fn test_parse_recovers_after_crc_failure() {
        let mut bad = encode(0x10, 7, &[0x01]).unwrap();
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;

        let good = encode(0x10, 8, &[0x02]).unwrap();

        let mut parser = Parser::new();
        let mut bytes = bad;
        bytes.extend(good);
        let frames = parser.feed_all(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].seq, 8);
    }

    #[test]
    fn test_looks_framed() {
        assert!(looks_framed(&[0x55, 0xAA, 0x04]));
        assert!(!looks_framed(&[0x55]));
        assert!(!looks_framed(&[0xAA, 0x55, 0x04]));
    }
}
