//! # Air Relay Shell
//!
//! Real UART toward the controller, bench UDP radio toward the ground. The
//! relay's non-blocking UART policy is modelled with a bounded per-tick TX
//! window: what does not fit is dropped, mirroring the firmware's FIFO.

use super::{open_uart, Clock};
use crate::air::{AirRelay, UartSink};
use crate::cli::AirOpts;
use crate::config::Config;
use crate::radio::UdpRadio;
use anyhow::Result;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::info;

/// One tick's worth of UART transmit window.
const UART_TX_WINDOW: usize = 1_024;

struct TxWindow {
    buf: Vec<u8>,
}

impl TxWindow {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }
}

impl UartSink for TxWindow {
    fn free_space(&self) -> usize {
        UART_TX_WINDOW.saturating_sub(self.buf.len())
    }

    fn write(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

pub async fn run(opts: &AirOpts, cfg: &Config) -> Result<()> {
    let mut port = open_uart(&opts.ser.dev, opts.ser.baud)?;

    let bind = opts.radio.bind.as_deref().unwrap_or(&cfg.radio.bind);
    let peer = opts.radio.peer.as_deref().unwrap_or(&cfg.radio.peer);
    let mut radio = UdpRadio::new(bind, peer, cfg.radio.tx_guard_ms)?;

    let clock = Clock::new();
    let mut relay = AirRelay::new(cfg.air_config());
    relay.set_raw_sniff(opts.raw);

    let mut interval = tokio::time::interval(Duration::from_millis(cfg.control.tick_ms));
    let mut rx_buf = [0u8; 512];
    let mut pending_rx: Vec<u8> = Vec::new();
    let mut last_stats_log = 0u32;

    info!("air relay running, radio {} -> {}", bind, peer);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = clock.now_ms();
                let mut uart_tx = TxWindow::new();
                let consumed = relay.tick(now, &pending_rx, &mut radio, &mut uart_tx);
                pending_rx.drain(..consumed);
                if !uart_tx.buf.is_empty() {
                    port.write_all(&uart_tx.buf).await?;
                }

                // Periodic counters for the bench log
                if now.wrapping_sub(last_stats_log) >= 10_000 {
                    let s = relay.stats();
                    info!(
                        "up={} down={} drops={} rejects={}",
                        s.uplink_frames, s.downlink_frames, s.uart_drops, s.whitelist_rejects
                    );
                    last_stats_log = now;
                }
            }
            read = port.read(&mut rx_buf) => {
                let n = read?;
                pending_rx.extend_from_slice(&rx_buf[..n]);
                if pending_rx.len() > 4_096 {
                    let excess = pending_rx.len() - 4_096;
                    pending_rx.drain(..excess);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}
