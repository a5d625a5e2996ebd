//! # Ground Relay Shell
//!
//! Radio on one side, the host shell on the other. Protocol lines the host
//! parses go to stdout; diagnostics go to the tracing subscriber (stderr),
//! so a GUI can own stdout cleanly.

use super::Clock;
use crate::cli::GroundOpts;
use crate::config::Config;
use crate::ground::{apply_shell_command, GroundRelay};
use crate::proto::SetpointsMsg;
use crate::radio::UdpRadio;
use crate::shell::{parse_line, ShellParseError};
use anyhow::Result;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

pub async fn run(opts: &GroundOpts, cfg: &Config) -> Result<()> {
    let bind = opts.radio.bind.as_deref().unwrap_or(&cfg.radio.bind);
    let peer = opts.radio.peer.as_deref().unwrap_or(&cfg.radio.peer);
    let mut radio = UdpRadio::new(bind, peer, cfg.radio.tx_guard_ms)?;

    let clock = Clock::new();
    let mut relay = GroundRelay::new(cfg.downlink_config());
    let mut staged = SetpointsMsg::default();

    let mut interval = tokio::time::interval(Duration::from_millis(cfg.control.tick_ms));
    let stdin = BufReader::new(tokio::io::stdin());
    let mut input = stdin.lines();

    info!("ground relay running, radio {} -> {}", bind, peer);

    loop {
        let mut lines = Vec::new();

        tokio::select! {
            _ = interval.tick() => {
                relay.tick(clock.now_ms(), &mut radio, &mut lines);
            }
            line = input.next_line() => {
                let Some(line) = line? else {
                    info!("stdin closed, shutting down");
                    return Ok(());
                };
                match parse_line(&line) {
                    Ok(cmd) => {
                        apply_shell_command(
                            &mut relay,
                            &mut staged,
                            &cmd,
                            clock.now_ms(),
                            &mut radio,
                            &mut lines,
                        );
                    }
                    Err(ShellParseError::Empty) => {}
                    Err(e) => lines.push(format!("error: {} (try 'help')", e)),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        }

        for line in lines {
            println!("{}", line);
        }
    }
}
