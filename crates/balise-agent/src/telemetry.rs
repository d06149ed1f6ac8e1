//! Telemetry source for the cycle.
//!
//! In production the sensor layer leaves a JSON snapshot on disk. In
//! simulation mode a plausible reading is generated instead.

use std::path::Path;

use anyhow::Context;
use balise_common::models::Telemetry;
use chrono::Local;

/// Load the snapshot written by the sensor layer.
pub fn load(path: &Path) -> anyhow::Result<Telemetry> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading telemetry snapshot {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("parsing telemetry snapshot {}", path.display()))
}

/// Fake but realistic mountain-station reading, stamped with local time.
pub fn simulated() -> Telemetry {
    use rand::Rng;
    let mut rng = rand::rng();

    let wind_avg = rng.random_range(0.0..40.0_f64);
    let dir_avg = rng.random_range(0.0..360.0_f64);
    Telemetry {
        timestamp: Telemetry::stamp(Local::now().time()),
        temperature_c: rng.random_range(-15.0..25.0),
        humidity_pct: rng.random_range(30.0..100.0),
        pressure_hpa: rng.random_range(780.0..1030.0),
        cloud_base_m: rng.random_range(200.0..3000.0),
        wind_speed_avg_kmh: wind_avg,
        wind_speed_max_kmh: wind_avg + rng.random_range(0.0..25.0),
        wind_dir_avg_deg: dir_avg,
        wind_dir_max_deg: (dir_avg + rng.random_range(-30.0..30.0)).rem_euclid(360.0),
        battery_mv: rng.random_range(11_200.0..13_200.0),
    }
}
