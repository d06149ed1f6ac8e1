//! Persistent station configuration.
//!
//! Settings are loaded once at the start of a cycle, mutated only through
//! [`SettingUpdate`]s, and written back at most once at the end of the cycle
//! when something actually changed.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum stored length of the site name, in characters.
pub const SITE_NAME_MAX_CHARS: usize = 125;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("settings serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

// ── Settings ────────────────────────────────────────────────────────

/// Station configuration, persisted by a [`SettingsStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    site_name: String,
    altitude_m: i32,
    wakeup_hour: u8,
    sleep_hour: u8,
    master_number: String,
    master_password: String,
    battery_limit_mv: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    sim_pin: Option<String>,
    #[serde(skip)]
    dirty: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site_name: "Position inconnue".into(),
            altitude_m: 0,
            wakeup_hour: 10,
            sleep_hour: 18,
            master_number: String::new(),
            master_password: String::new(),
            battery_limit_mv: 11_500,
            sim_pin: None,
            dirty: false,
        }
    }
}

/// A single validated change to [`Settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingUpdate {
    SiteName(String),
    Altitude(i32),
    WakeupHour(u8),
    SleepHour(u8),
    BatteryLimit(u32),
    MasterNumber(String),
    MasterPassword(String),
    SimPin(Option<String>),
}

impl Settings {
    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    pub fn altitude(&self) -> i32 {
        self.altitude_m
    }

    pub fn wakeup_hour(&self) -> u8 {
        self.wakeup_hour
    }

    pub fn sleep_hour(&self) -> u8 {
        self.sleep_hour
    }

    pub fn master_number(&self) -> &str {
        &self.master_number
    }

    pub fn master_password(&self) -> &str {
        &self.master_password
    }

    pub fn battery_limit(&self) -> u32 {
        self.battery_limit_mv
    }

    pub fn sim_pin(&self) -> Option<&str> {
        self.sim_pin.as_deref()
    }

    /// Whether a mutation happened since load (or the last save).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Apply one update. The wakeup/sleep ordering is enforced here as well
    /// as by the SMS command layer, so no sequence of updates can break it.
    pub fn apply(&mut self, update: SettingUpdate) -> Result<(), SettingsError> {
        match update {
            SettingUpdate::SiteName(name) => {
                self.site_name = name.chars().take(SITE_NAME_MAX_CHARS).collect();
            }
            SettingUpdate::Altitude(alt) => self.altitude_m = alt,
            SettingUpdate::WakeupHour(hour) => {
                check_hours(hour, self.sleep_hour)?;
                self.wakeup_hour = hour;
            }
            SettingUpdate::SleepHour(hour) => {
                check_hours(self.wakeup_hour, hour)?;
                self.sleep_hour = hour;
            }
            SettingUpdate::BatteryLimit(mv) => self.battery_limit_mv = mv,
            SettingUpdate::MasterNumber(number) => self.master_number = number,
            SettingUpdate::MasterPassword(pswd) => self.master_password = pswd,
            SettingUpdate::SimPin(pin) => self.sim_pin = pin,
        }
        self.dirty = true;
        Ok(())
    }

    /// Check invariants of a freshly loaded configuration.
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_hours(self.wakeup_hour, self.sleep_hour)?;
        if self.site_name.chars().count() > SITE_NAME_MAX_CHARS {
            return Err(SettingsError::Invalid(format!(
                "site name longer than {SITE_NAME_MAX_CHARS} characters"
            )));
        }
        Ok(())
    }
}

fn check_hours(wakeup: u8, sleep: u8) -> Result<(), SettingsError> {
    if wakeup > 23 || sleep > 23 {
        return Err(SettingsError::Invalid(format!(
            "hours must be within 0..=23 (wakeup {wakeup}, sleep {sleep})"
        )));
    }
    if wakeup >= sleep {
        return Err(SettingsError::Invalid(format!(
            "wakeup hour {wakeup} must be before sleep hour {sleep}"
        )));
    }
    Ok(())
}

// ── Store ───────────────────────────────────────────────────────────

/// Persistence backend for [`Settings`].
pub trait SettingsStore {
    fn load(&self) -> Result<Settings, SettingsError>;
    fn save(&self, settings: &Settings) -> Result<(), SettingsError>;
}

/// Settings kept in a TOML file. A missing file loads as defaults.
#[derive(Debug, Clone)]
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Settings::default());
            }
            Err(e) => return Err(e.into()),
        };
        let settings: Settings = toml::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let text = toml::to_string_pretty(settings)?;
        // Write-then-rename: readers never observe a half-written file.
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
