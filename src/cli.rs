//! # Command Line Interface
//!
//! One binary, one subcommand per node role.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "fuellink", about = "Fuel-supply telemetry & control link nodes")]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// Run the field controller loop
    Controller(ControllerOpts),
    /// Run the airside UART-to-radio relay
    Air(AirOpts),
    /// Run the groundside radio-to-host relay with its shell
    Ground(GroundOpts),
}

#[derive(Args, Debug, Clone)]
pub struct SerialOpts {
    /// Serial device path
    #[arg(long, default_value = "/dev/ttyACM0")]
    pub dev: String,

    /// Baud rate
    #[arg(long, default_value_t = 115_200)]
    pub baud: u32,
}

#[derive(Args, Debug, Clone)]
pub struct ControllerOpts {
    #[command(flatten)]
    pub ser: SerialOpts,
}

#[derive(Args, Debug, Clone)]
pub struct RadioOpts {
    /// UDP bind address for the bench radio
    #[arg(long)]
    pub bind: Option<String>,

    /// UDP peer address of the other relay
    #[arg(long)]
    pub peer: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AirOpts {
    #[command(flatten)]
    pub ser: SerialOpts,

    #[command(flatten)]
    pub radio: RadioOpts,

    /// Start in raw-sniff mode (no downlink forwarding)
    #[arg(long, default_value_t = false)]
    pub raw: bool,
}

#[derive(Args, Debug, Clone)]
pub struct GroundOpts {
    #[command(flatten)]
    pub radio: RadioOpts,
}
