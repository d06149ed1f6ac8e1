//! Data models for the Balise weather station.
//!
//! `Telemetry` is produced once per station cycle by the sensor layer and is
//! read-only from then on. Every numeric field has a validity range; readers
//! go through [`Telemetry::get`] so that a corrupted sensor value surfaces as
//! `None` instead of being reported as real data.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

// ── Validity ranges ─────────────────────────────────────────────────

/// Closed/open interval used to decide whether a reading is plausible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidRange {
    pub min: f64,
    pub max: f64,
    pub min_inclusive: bool,
    pub max_inclusive: bool,
}

impl ValidRange {
    pub const fn new(min: f64, max: f64, min_inclusive: bool, max_inclusive: bool) -> Self {
        Self {
            min,
            max,
            min_inclusive,
            max_inclusive,
        }
    }

    /// NaN and infinities are never contained.
    pub fn contains(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        let above = if self.min_inclusive {
            value >= self.min
        } else {
            value > self.min
        };
        let below = if self.max_inclusive {
            value <= self.max
        } else {
            value < self.max
        };
        above && below
    }
}

// ── Measurement ─────────────────────────────────────────────────────

/// One numeric field of a [`Telemetry`] snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measurement {
    Temperature,
    Humidity,
    Pressure,
    CloudBase,
    WindSpeedAvg,
    WindSpeedMax,
    WindDirAvg,
    WindDirMax,
    Battery,
}

impl Measurement {
    pub const ALL: [Measurement; 9] = [
        Measurement::Temperature,
        Measurement::Humidity,
        Measurement::Pressure,
        Measurement::CloudBase,
        Measurement::WindSpeedAvg,
        Measurement::WindSpeedMax,
        Measurement::WindDirAvg,
        Measurement::WindDirMax,
        Measurement::Battery,
    ];

    /// Plausible domain of the field. Anything outside is a sensor failure.
    pub fn range(self) -> ValidRange {
        match self {
            Measurement::Temperature => ValidRange::new(-50.0, 100.0, false, false),
            Measurement::Humidity => ValidRange::new(0.0, 100.0, true, true),
            Measurement::Pressure => ValidRange::new(400.0, 1500.0, false, false),
            Measurement::CloudBase => ValidRange::new(0.0, 10_000.0, true, false),
            Measurement::WindSpeedAvg | Measurement::WindSpeedMax => {
                ValidRange::new(0.0, 300.0, true, false)
            }
            Measurement::WindDirAvg | Measurement::WindDirMax => {
                ValidRange::new(0.0, 360.0, true, false)
            }
            Measurement::Battery => ValidRange::new(0.0, 65_535.0, false, false),
        }
    }
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Measurement::Temperature => write!(f, "temperature"),
            Measurement::Humidity => write!(f, "humidity"),
            Measurement::Pressure => write!(f, "pressure"),
            Measurement::CloudBase => write!(f, "cloud_base"),
            Measurement::WindSpeedAvg => write!(f, "wind_speed_avg"),
            Measurement::WindSpeedMax => write!(f, "wind_speed_max"),
            Measurement::WindDirAvg => write!(f, "wind_dir_avg"),
            Measurement::WindDirMax => write!(f, "wind_dir_max"),
            Measurement::Battery => write!(f, "battery"),
        }
    }
}

// ── Telemetry ───────────────────────────────────────────────────────

/// One weather reading, as handed over by the sensor layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Local time of the measurement, `HHhMM`.
    pub timestamp: String,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub pressure_hpa: f64,
    pub cloud_base_m: f64,
    pub wind_speed_avg_kmh: f64,
    pub wind_speed_max_kmh: f64,
    pub wind_dir_avg_deg: f64,
    pub wind_dir_max_deg: f64,
    pub battery_mv: f64,
}

impl Telemetry {
    /// Raw value of a field, whether plausible or not.
    pub fn raw(&self, m: Measurement) -> f64 {
        match m {
            Measurement::Temperature => self.temperature_c,
            Measurement::Humidity => self.humidity_pct,
            Measurement::Pressure => self.pressure_hpa,
            Measurement::CloudBase => self.cloud_base_m,
            Measurement::WindSpeedAvg => self.wind_speed_avg_kmh,
            Measurement::WindSpeedMax => self.wind_speed_max_kmh,
            Measurement::WindDirAvg => self.wind_dir_avg_deg,
            Measurement::WindDirMax => self.wind_dir_max_deg,
            Measurement::Battery => self.battery_mv,
        }
    }

    /// Validated value of a field; `None` when the sensor reading is out of range.
    pub fn get(&self, m: Measurement) -> Option<f64> {
        let value = self.raw(m);
        m.range().contains(value).then_some(value)
    }

    /// Battery voltage in volts, if known.
    pub fn battery_volts(&self) -> Option<f64> {
        self.get(Measurement::Battery).map(|mv| mv / 1000.0)
    }

    /// Format a time of day the way the station stamps its readings.
    pub fn stamp(time: NaiveTime) -> String {
        format!("{:02}h{:02}", time.hour(), time.minute())
    }
}

// ── Compass ─────────────────────────────────────────────────────────

/// 16-point compass labels (French abbreviations), clockwise from north.
pub const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSO", "SO", "OSO", "O", "ONO", "NO",
    "NNO",
];

/// Map a direction in degrees to its 16-point compass index.
pub fn compass_index(degrees: f64) -> u8 {
    let idx = (degrees.rem_euclid(360.0) / 22.5).round() as u32 % 16;
    idx as u8
}

/// Compass label for a direction in degrees.
pub fn compass_label(degrees: f64) -> &'static str {
    COMPASS_POINTS[compass_index(degrees) as usize]
}

// ── SMS ─────────────────────────────────────────────────────────────

/// A message read from the modem store. Lives for one inbox pass only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsMessage {
    pub sender: String,
    pub body: String,
    pub index: u32,
}
