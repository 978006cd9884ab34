//! Daemon configuration loaded from `power.toml` in the config directory.
//!
//! Everything here is validated before it crosses into the core; the
//! orchestrator only ever sees well-formed values.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::Deserialize;

/// Default configuration directory on the unit.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/camera-power";

/// Configuration file name inside the config directory.
pub const CONFIG_FILE: &str = "power.toml";

/// Default I2C bus the power MCU and RTC sit on.
const DEFAULT_I2C_BUS: u8 = 1;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPower {
    #[serde(rename = "i2c-bus")]
    i2c_bus: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWindow {
    start: String,
    end: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    power: RawPower,
    window: RawWindow,
}

/// Validated daemon configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub i2c_bus: u8,
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
}

/// Failures while loading or validating the configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(toml::de::Error),
    Time { field: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, err) => write!(f, "reading {}: {err}", path.display()),
            ConfigError::Parse(err) => write!(f, "parsing configuration: {err}"),
            ConfigError::Time { field, value } => {
                write!(f, "{field}: `{value}` is not a HH:MM time")
            }
        }
    }
}

/// Loads `power.toml` from `dir`.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file is unreadable, malformed, or
/// carries an invalid window time.
pub fn load(dir: &Path) -> Result<Config, ConfigError> {
    let path = dir.join(CONFIG_FILE);
    let text = fs::read_to_string(&path).map_err(|err| ConfigError::Io(path.clone(), err))?;
    parse(&text)
}

fn parse(text: &str) -> Result<Config, ConfigError> {
    let raw: RawConfig = toml::from_str(text).map_err(ConfigError::Parse)?;
    Ok(Config {
        i2c_bus: raw.power.i2c_bus.unwrap_or(DEFAULT_I2C_BUS),
        window_start: parse_time("window.start", &raw.window.start)?,
        window_end: parse_time("window.end", &raw.window.end)?,
    })
}

fn parse_time(field: &'static str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| ConfigError::Time {
        field,
        value: value.to_string(),
    })
}
