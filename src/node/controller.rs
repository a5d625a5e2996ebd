//! # Controller Shell
//!
//! Drives the controller loop against a real UART. The actuator pins have no
//! hardware behind them on a host build, so they log level changes instead;
//! the sensor rig is the synthetic bench source.

use super::{open_uart, Clock};
use crate::cli::ControllerOpts;
use crate::config::Config;
use crate::controller::{
    ActuatorBank, Controller, DigitalOut, HeaterDrive, IdleAuto, PwmOut, SyntheticRig, ValveDrive,
};
use anyhow::Result;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

/// Digital pin that logs level changes.
struct LoggedPin {
    name: &'static str,
    level: Option<bool>,
}

impl LoggedPin {
    fn new(name: &'static str) -> Self {
        Self { name, level: None }
    }
}

impl DigitalOut for LoggedPin {
    fn set(&mut self, high: bool) {
        if self.level != Some(high) {
            debug!("{} -> {}", self.name, if high { "HIGH" } else { "LOW" });
            self.level = Some(high);
        }
    }
}

/// PWM channel that logs duty changes.
struct LoggedPwm {
    name: &'static str,
    duty: Option<u8>,
}

impl LoggedPwm {
    fn new(name: &'static str) -> Self {
        Self { name, duty: None }
    }
}

impl PwmOut for LoggedPwm {
    fn set_duty(&mut self, duty: u8) {
        if self.duty != Some(duty) {
            debug!("{} duty -> {}/255", self.name, duty);
            self.duty = Some(duty);
        }
    }
}

pub async fn run(opts: &ControllerOpts, cfg: &Config) -> Result<()> {
    let mut port = open_uart(&opts.ser.dev, opts.ser.baud)?;
    let clock = Clock::new();

    let mut controller = Controller::new(
        cfg.control.telemetry_period_ms,
        cfg.safety_limits(),
        IdleAuto,
    );
    let mut bank = ActuatorBank::new(
        ValveDrive::new(LoggedPin::new("valve"), cfg.actuators.valve_cycle_ms),
        HeaterDrive::new(LoggedPwm::new("heater")),
    );
    let mut rig = SyntheticRig::new();

    let mut interval = tokio::time::interval(Duration::from_millis(cfg.control.tick_ms));
    let mut rx_buf = [0u8; 512];
    let mut pending_rx: Vec<u8> = Vec::new();

    info!("controller loop running, telemetry every {} ms", cfg.control.telemetry_period_ms);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = clock.now_ms();
                let mut tx = Vec::new();
                let consumed = controller.tick(now, &pending_rx, &mut rig, &mut bank, &mut tx);
                pending_rx.drain(..consumed);
                if !tx.is_empty() {
                    port.write_all(&tx).await?;
                }
            }
            read = port.read(&mut rx_buf) => {
                let n = read?;
                pending_rx.extend_from_slice(&rx_buf[..n]);
                // Don't let a babbling peer grow the backlog without bound;
                // the loop drains a bounded amount per tick anyway.
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
