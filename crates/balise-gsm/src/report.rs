//! Human-readable bulletins built from a telemetry snapshot.
//!
//! Out-of-range readings are never printed as data: each field is validated
//! through [`Telemetry::get`] and replaced by a placeholder when unknown.

use balise_common::models::{compass_label, Measurement, Telemetry};
use balise_common::settings::Settings;

/// Longest bulletin that still fits in one SMS.
pub const SMS_BULLETIN_MAX_CHARS: usize = 158;

const UNKNOWN: &str = "n/a";
const UNKNOWN_WIND: &str = "?";
const UNKNOWN_SPOKEN: &str = "erreur";

// ── SMS ─────────────────────────────────────────────────────────────

/// Weather bulletin sent in reply to a plain SMS.
///
/// The `"<site> (<altitude> m)"` header is shortened so the whole bulletin
/// fits in [`SMS_BULLETIN_MAX_CHARS`]. A body that is already too long is
/// cut at that length, header first.
pub fn sms_bulletin(t: &Telemetry, settings: &Settings) -> String {
    let int = |m: Measurement, unknown: &str| {
        t.get(m).map_or_else(|| unknown.to_string(), |v| (v as i64).to_string())
    };
    let dir = |m: Measurement| t.get(m).map_or(UNKNOWN_WIND, compass_label);
    let temperature = t
        .get(Measurement::Temperature)
        .map_or_else(|| UNKNOWN.to_string(), |v| format!("{v:.1}"));

    let body = format!(
        "[{}]\nTemp: {} C\nVent moy: {}km/h {}\nVent max: {}km/h {}\nHumi: {}%\nPress: {}hPa\nHaut nuages: {}m",
        t.timestamp,
        temperature,
        int(Measurement::WindSpeedAvg, UNKNOWN_WIND),
        dir(Measurement::WindDirAvg),
        int(Measurement::WindSpeedMax, UNKNOWN_WIND),
        dir(Measurement::WindDirMax),
        int(Measurement::Humidity, UNKNOWN),
        int(Measurement::Pressure, UNKNOWN),
        int(Measurement::CloudBase, UNKNOWN),
    );

    let header = format!("{} ({} m)", settings.site_name(), settings.altitude());
    let body_len = body.chars().count();
    if body_len < SMS_BULLETIN_MAX_CHARS {
        let room = SMS_BULLETIN_MAX_CHARS - 1 - body_len;
        let header: String = header.chars().take(room).collect();
        format!("{header}\n{body}")
    } else {
        format!("{header}\n{body}")
            .chars()
            .take(SMS_BULLETIN_MAX_CHARS)
            .collect()
    }
}

/// Alert sent to the master number when the battery is at or below the limit.
pub fn battery_alarm(t: &Telemetry) -> String {
    let volts = t
        .battery_volts()
        .map_or_else(|| UNKNOWN.to_string(), |v| format!("{v:.1}"));
    format!(
        "[{}]\n/!\\ La tension de la batterie est faible ({volts} V), la station risque de ne plus fonctionner correctement. /!\\",
        t.timestamp
    )
}

// ── Voice ───────────────────────────────────────────────────────────

/// French sentence handed to the speech synthesizer of the radio relay.
pub fn voice_bulletin(t: &Telemetry, settings: &Settings) -> String {
    let spoken = |m: Measurement, decimals: usize| {
        t.get(m)
            .map_or_else(|| UNKNOWN_SPOKEN.to_string(), |v| spoken_number(v, decimals))
    };
    format!(
        "Site de. {}. Vent moyen : {}  kilomètres par heure . . {} degrés . \
         Vent maximal : {}  kilomètres par heure . . {} degrés . \
         Température : {} degrés",
        settings.site_name(),
        spoken(Measurement::WindSpeedAvg, 0),
        spoken(Measurement::WindDirAvg, 0),
        spoken(Measurement::WindSpeedMax, 0),
        spoken(Measurement::WindDirMax, 0),
        spoken(Measurement::Temperature, 1),
    )
}

/// Decimal comma, and no trailing `,0`.
fn spoken_number(value: f64, decimals: usize) -> String {
    let text = format!("{value:.decimals$}").replace('.', ",");
    let text = text.strip_suffix(",0").map(str::to_string).unwrap_or(text);
    if text == "-0" { "0".to_string() } else { text }
}
