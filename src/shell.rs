//! # Host Shell Grammar
//!
//! The line-oriented command language the host speaks to the ground relay
//! over USB serial. One command per `\n`-terminated line:
//!
//! ```text
//! help
//! mode safe|manual|auto
//! set heater <pct>    set valve <pct>
//! set T <degC>        set P <pa>       set valve_sp <pct>
//! lora stat           lora raw on|off
//! lora tx <text>      lora ping
//! ```

use crate::proto::Mode;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ShellParseError {
    #[error("empty line")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument: {0}")]
    MissingArg(&'static str),
    #[error("invalid number for {0}: {1}")]
    BadNumber(&'static str, String),
    #[error("invalid argument for {0}: {1}")]
    BadArg(&'static str, String),
}

/// A parsed host command.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Help,
    Mode(Mode),
    SetHeater(f32),
    SetValve(f32),
    SetTempC(f32),
    SetPressurePa(f32),
    SetValveSp(f32),
    LoraStat,
    LoraRaw(bool),
    LoraTx(String),
    LoraPing,
}

/// Parse one shell line into a command.
pub fn parse_line(line: &str) -> Result<ShellCommand, ShellParseError> {
    let s = line.trim();
    if s.is_empty() {
        return Err(ShellParseError::Empty);
    }

    let mut tokens = s.split_whitespace();
    let head = tokens.next().unwrap_or_default();

    match head {
        "help" => Ok(ShellCommand::Help),

        "mode" => {
            let arg = tokens.next().ok_or(ShellParseError::MissingArg("mode"))?;
            match arg.to_ascii_lowercase().as_str() {
                "safe" => Ok(ShellCommand::Mode(Mode::Safe)),
                "manual" => Ok(ShellCommand::Mode(Mode::Manual)),
                "auto" => Ok(ShellCommand::Mode(Mode::Auto)),
                _ => Err(ShellParseError::BadArg("mode", arg.to_string())),
            }
        }

        "set" => {
            let field = tokens.next().ok_or(ShellParseError::MissingArg("set"))?;
            match field {
                "heater" => Ok(ShellCommand::SetHeater(req_f32(tokens.next(), "heater")?)),
                "valve" => Ok(ShellCommand::SetValve(req_f32(tokens.next(), "valve")?)),
                "T" => Ok(ShellCommand::SetTempC(req_f32(tokens.next(), "T")?)),
                "P" => Ok(ShellCommand::SetPressurePa(req_f32(tokens.next(), "P")?)),
                "valve_sp" => Ok(ShellCommand::SetValveSp(req_f32(tokens.next(), "valve_sp")?)),
                _ => Err(ShellParseError::BadArg("set", field.to_string())),
            }
        }

        "lora" => {
            let sub = tokens.next().ok_or(ShellParseError::MissingArg("lora"))?;
            match sub {
                "stat" => Ok(ShellCommand::LoraStat),
                "ping" => Ok(ShellCommand::LoraPing),
                "raw" => {
                    let arg = tokens.next().ok_or(ShellParseError::MissingArg("raw"))?;
                    match arg.to_ascii_lowercase().as_str() {
                        "on" => Ok(ShellCommand::LoraRaw(true)),
                        "off" => Ok(ShellCommand::LoraRaw(false)),
                        _ => Err(ShellParseError::BadArg("raw", arg.to_string())),
                    }
                }
                "tx" => {
                    // Everything after "lora tx" goes on air
                    let text = tokens.collect::<Vec<_>>().join(" ");
                    if text.is_empty() {
                        return Err(ShellParseError::MissingArg("tx"));
                    }
                    Ok(ShellCommand::LoraTx(text))
                }
                _ => Err(ShellParseError::BadArg("lora", sub.to_string())),
            }
        }

        _ => Err(ShellParseError::UnknownCommand(head.to_string())),
    }
}

fn req_f32(tok: Option<&str>, name: &'static str) -> Result<f32, ShellParseError> {
    let tok = tok.ok_or(ShellParseError::MissingArg(name))?;
    tok.parse::<f32>()
        .map_err(|_| ShellParseError::BadNumber(name, tok.to_string()))
}

/// Help text, one line per entry.
pub fn help_lines() -> Vec<String> {
    [
        "commands:",
        "  help                      this text",
        "  mode safe|manual|auto     switch controller mode",
        "  set heater <pct>          manual heater power",
        "  set valve <pct>           manual valve opening",
        "  set T <degC>              temperature setpoint",
        "  set P <pa>                pressure setpoint",
        "  set valve_sp <pct>        valve opening setpoint",
        "  lora stat                 radio and pending-command stats",
        "  lora raw on|off           raw packet sniffing",
        "  lora tx <text>            transmit raw text",
        "  lora ping                 unreliable heartbeat ping",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
