//! Agent configuration file (TOML).
//!
//! Every section and key is optional; missing values take the defaults
//! below.
//!
//! ```toml
//! [modem]
//! port = "/dev/ttyAMA0"
//! segment_delay_ms = 1500
//!
//! [uplink]
//! output = "/var/spool/balise/uplink.bin"
//! [uplink.frame]
//! length = 12
//! direction = "compass16"
//!
//! [journal]
//! dir = "/var/log/balise"
//! retention_days = 30
//!
//! [station]
//! settings = "station.toml"
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use balise_codec::FrameConfig;
use balise_gsm::{ResponderConfig, SerialConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub modem: ModemConfig,
    pub uplink: UplinkConfig,
    pub journal: JournalConfig,
    pub station: StationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Skip the modem entirely (bench setups without a SIM).
    pub enabled: bool,
    /// Send the SIM PIN from the station settings during setup.
    pub use_pin: bool,
    #[serde(flatten)]
    pub serial: SerialConfig,
    #[serde(flatten)]
    pub responder: ResponderConfig,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            use_pin: false,
            serial: SerialConfig::default(),
            responder: ResponderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UplinkConfig {
    pub frame: FrameConfig,
    /// Spool file (or radio device node) frames are appended to.
    pub output: PathBuf,
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            output: PathBuf::from("uplink.bin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Holds the daily `logs.*.txt` and `data.*.txt` files.
    pub dir: PathBuf,
    /// Write the operational log served by the `logs?` command.
    pub operational_log: bool,
    /// Days of each journal kept on disk.
    pub retention_days: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            operational_log: true,
            retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub settings: PathBuf,
    /// JSON snapshot written by the sensor layer.
    pub telemetry: PathBuf,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            settings: PathBuf::from("station.toml"),
            telemetry: PathBuf::from("telemetry.json"),
        }
    }
}

impl AgentConfig {
    /// Load from `path`, or use defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}
