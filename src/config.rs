//! TOML configuration
//!
//! Loaded once at startup. Every section falls back to its defaults, so a
//! partial file only needs to list what it changes.

use crate::drive::MotorSettings;
use crate::input::KeyCheck;
use crate::robot::RobotMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "XRPDRIVE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No config directory available on this platform")]
    NoConfigDir,

    #[error("Config I/O failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub robot: RobotConfig,
    pub teleop: TeleopConfig,
    pub motors: MotorConfig,
    pub input: InputConfig,
}

/// Loop timing and the mode to start in
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RobotConfig {
    pub period_ms: u64,
    pub start_mode: RobotMode,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            period_ms: 20,
            start_mode: RobotMode::Disabled,
        }
    }
}

impl RobotConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct TeleopConfig {
    /// `legacy` reproduces the product test on E, `masked` tests every key alike
    pub key_check: KeyCheck,
}

/// Motor polarity and safety timeout
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MotorConfig {
    pub expiration_ms: u64,
    pub left_inverted: bool,
    /// The right motor is mounted mirrored and runs backwards out of the box
    pub right_inverted: bool,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            expiration_ms: 100,
            left_inverted: false,
            right_inverted: true,
        }
    }
}

impl MotorConfig {
    pub fn left(&self) -> MotorSettings {
        MotorSettings {
            inverted: self.left_inverted,
            expiration: Duration::from_millis(self.expiration_ms),
        }
    }

    pub fn right(&self) -> MotorSettings {
        MotorSettings {
            inverted: self.right_inverted,
            expiration: Duration::from_millis(self.expiration_ms),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputBackend {
    #[default]
    Terminal,
    Scripted,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    pub backend: InputBackend,
    /// Terminal only: release a key after this long without press or repeat
    pub hold_timeout_ms: u64,
    /// Scripted only: held keys per tick, e.g. `[["W"], [], ["E", "R"]]`
    pub script: Vec<Vec<String>>,
    pub loop_script: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            backend: InputBackend::Terminal,
            hold_timeout_ms: 500,
            script: Vec::new(),
            loop_script: false,
        }
    }
}

impl InputConfig {
    pub fn hold_timeout(&self) -> Duration {
        Duration::from_millis(self.hold_timeout_ms)
    }
}

impl Config {
    /// `$XRPDRIVE_CONFIG`, or `xrpdrive/config.toml` in the user config dir
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join("xrpdrive").join("config.toml"))
    }

    /// Writes the default config to `path` unless a file already exists
    pub fn ensure_default(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            debug!("Config present at {}", path.display());
            return Ok(());
        }
        info!("Writing default config to {}", path.display());
        Config::default().save(path)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&text)?;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let text = toml::to_string_pretty(self)?;
        fs::write(path, text).map_err(io_err)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.robot.period_ms == 0 {
            return Err(ConfigError::Invalid("robot.period_ms must be positive".into()));
        }
        if self.motors.expiration_ms == 0 {
            return Err(ConfigError::Invalid(
                "motors.expiration_ms must be positive".into(),
            ));
        }
        if self.robot.period_ms >= self.motors.expiration_ms {
            return Err(ConfigError::Invalid(format!(
                "robot.period_ms ({}) must be shorter than motors.expiration_ms ({})",
                self.robot.period_ms, self.motors.expiration_ms
            )));
        }
        if self.input.hold_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "input.hold_timeout_ms must be positive".into(),
            ));
        }
        if self.input.backend == InputBackend::Scripted && self.input.script.is_empty() {
            return Err(ConfigError::Invalid(
                "input.script is empty but the scripted backend is selected".into(),
            ));
        }
        Ok(())
    }
}
