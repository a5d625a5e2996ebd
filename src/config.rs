//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files. Every
//! timing constant of the link is tunable here; the defaults are the
//! compile-time values the firmware shipped with.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::air::AirConfig;
use crate::controller::SafetyLimits;
use crate::error::Result;
use crate::ground::DownlinkConfig;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub actuators: ActuatorConfig,
    #[serde(default)]
    pub radio: RadioConfig,
    #[serde(default)]
    pub downlink: DownlinkTuning,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_uart_port")]
    pub uart_port: String,

    #[serde(default = "default_baud")]
    pub uart_baud: u32,

    #[serde(default = "default_baud")]
    pub usb_baud: u32,
}

/// Controller loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControlConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_telemetry_period_ms")]
    pub telemetry_period_ms: u32,

    #[serde(default = "default_link_timeout_ms")]
    pub link_timeout_ms: u32,

    #[serde(default = "default_heartbeat_period_ms")]
    pub heartbeat_period_ms: u32,
}

/// Safety interlock configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SafetyConfig {
    #[serde(default = "default_max_temp_c")]
    pub max_temp_c: f32,
}

/// Actuator configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ActuatorConfig {
    #[serde(default = "default_valve_cycle_ms")]
    pub valve_cycle_ms: u32,
}

/// Radio configuration (both relays)
#[derive(Debug, Deserialize, Clone)]
pub struct RadioConfig {
    /// UDP bind address of the bench radio
    #[serde(default = "default_radio_bind")]
    pub bind: String,

    /// UDP address of the peer relay
    #[serde(default = "default_radio_peer")]
    pub peer: String,

    #[serde(default = "default_lora_telem_period_ms")]
    pub telem_period_ms: u32,

    #[serde(default = "default_tx_guard_ms")]
    pub tx_guard_ms: u32,

    #[serde(default = "default_downlink_hold_ms")]
    pub downlink_hold_ms: u32,
}

/// Reliable-downlink configuration (ground relay)
#[derive(Debug, Deserialize, Clone)]
pub struct DownlinkTuning {
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u32,

    #[serde(default = "default_max_retry")]
    pub max_retry: u8,

    #[serde(default = "default_busy_warn_after_ms")]
    pub busy_warn_after_ms: u32,

    #[serde(default = "default_busy_warn_every_ms")]
    pub busy_warn_every_ms: u32,

    #[serde(default = "default_rx_watchdog_ms")]
    pub rx_watchdog_ms: u32,

    #[serde(default = "default_reinit_cooldown_ms")]
    pub reinit_cooldown_ms: u32,
}

// Default value functions
fn default_uart_port() -> String { "/dev/ttyACM0".to_string() }
fn default_baud() -> u32 { 115_200 }

fn default_tick_ms() -> u64 { 10 }
fn default_telemetry_period_ms() -> u32 { 200 }
fn default_link_timeout_ms() -> u32 { 1_500 }
fn default_heartbeat_period_ms() -> u32 { 500 }

fn default_max_temp_c() -> f32 { 80.0 }

fn default_valve_cycle_ms() -> u32 { 500 }

fn default_radio_bind() -> String { "0.0.0.0:4210".to_string() }
fn default_radio_peer() -> String { "127.0.0.1:4211".to_string() }
fn default_lora_telem_period_ms() -> u32 { 500 }
fn default_tx_guard_ms() -> u32 { 5 }
fn default_downlink_hold_ms() -> u32 { 80 }

fn default_ack_timeout_ms() -> u32 { 400 }
fn default_max_retry() -> u8 { 3 }
fn default_busy_warn_after_ms() -> u32 { 3_000 }
fn default_busy_warn_every_ms() -> u32 { 1_000 }
fn default_rx_watchdog_ms() -> u32 { 5_000 }
fn default_reinit_cooldown_ms() -> u32 { 3_000 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            uart_port: default_uart_port(),
            uart_baud: default_baud(),
            usb_baud: default_baud(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            telemetry_period_ms: default_telemetry_period_ms(),
            link_timeout_ms: default_link_timeout_ms(),
            heartbeat_period_ms: default_heartbeat_period_ms(),
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_temp_c: default_max_temp_c(),
        }
    }
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            valve_cycle_ms: default_valve_cycle_ms(),
        }
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            bind: default_radio_bind(),
            peer: default_radio_peer(),
            telem_period_ms: default_lora_telem_period_ms(),
            tx_guard_ms: default_tx_guard_ms(),
            downlink_hold_ms: default_downlink_hold_ms(),
        }
    }
}

impl Default for DownlinkTuning {
    fn default() -> Self {
        Self {
            ack_timeout_ms: default_ack_timeout_ms(),
            max_retry: default_max_retry(),
            busy_warn_after_ms: default_busy_warn_after_ms(),
            busy_warn_every_ms: default_busy_warn_every_ms(),
            rx_watchdog_ms: default_rx_watchdog_ms(),
            reinit_cooldown_ms: default_reinit_cooldown_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, TOML parsing fails, or
    /// validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.control.tick_ms == 0 {
            return Err(toml::de::Error::custom("control.tick_ms must be > 0").into());
        }
        if self.control.telemetry_period_ms == 0 {
            return Err(toml::de::Error::custom("control.telemetry_period_ms must be > 0").into());
        }
        if self.actuators.valve_cycle_ms == 0 {
            return Err(toml::de::Error::custom("actuators.valve_cycle_ms must be > 0").into());
        }
        if self.downlink.max_retry == 0 {
            return Err(toml::de::Error::custom("downlink.max_retry must be > 0").into());
        }
        if self.radio.telem_period_ms == 0 {
            return Err(toml::de::Error::custom("radio.telem_period_ms must be > 0").into());
        }
        Ok(())
    }

    /// Safety thresholds for the controller loop.
    pub fn safety_limits(&self) -> SafetyLimits {
        SafetyLimits {
            max_temp_c: self.safety.max_temp_c,
            link_timeout_ms: self.control.link_timeout_ms,
        }
    }

    /// Air relay tuning.
    pub fn air_config(&self) -> AirConfig {
        AirConfig {
            telem_period_ms: self.radio.telem_period_ms,
            downlink_hold_ms: self.radio.downlink_hold_ms,
            heartbeat_period_ms: self.control.heartbeat_period_ms,
        }
    }

    /// Ground relay tuning.
    pub fn downlink_config(&self) -> DownlinkConfig {
        DownlinkConfig {
            ack_timeout_ms: self.downlink.ack_timeout_ms,
            max_retry: self.downlink.max_retry,
            busy_warn_after_ms: self.downlink.busy_warn_after_ms,
            busy_warn_every_ms: self.downlink.busy_warn_every_ms,
            rx_watchdog_ms: self.downlink.rx_watchdog_ms,
            reinit_cooldown_ms: self.downlink.reinit_cooldown_ms,
        }
    }
}
