//! # Node Shells
//!
//! The async runners that put real I/O behind the synchronous node state
//! machines: tokio-serial UARTs, the UDP bench radio, stdin/stdout for the
//! ground shell. Each shell owns a tick interval and feeds its node wall
//! clock milliseconds; the nodes themselves never read a clock.

pub mod air;
pub mod controller;
pub mod ground;

use crate::error::{LinkError, Result};
use std::time::Instant;
use tokio_serial::SerialPortBuilderExt;
use tracing::info;

/// Open a serial port with the link's fixed 8N1 settings.
pub fn open_uart(path: &str, baud: u32) -> Result<tokio_serial::SerialStream> {
    let port = tokio_serial::new(path, baud)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(LinkError::Serial)?;

    info!("opened {} at {} baud", path, baud);
    Ok(port)
}

/// Millisecond clock anchored at shell start; wraps like the firmware's.
pub struct Clock {
    start: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_monotonic_from_zero() {
        let clock = Clock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(a <= b);
        assert!(a < 1_000);
    }
}
