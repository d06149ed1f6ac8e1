//! Execution of parameter commands against the station settings.
//!
//! Each [`Param`] maps to a [`ParamSpec`] row: how to read it, and for
//! writable parameters how to turn the SMS value into a [`SettingUpdate`]
//! and how to confirm the change. A write either changes exactly the
//! targeted setting or nothing.

use balise_common::models::Telemetry;
use balise_common::settings::{SettingUpdate, Settings, SITE_NAME_MAX_CHARS};

use crate::command::Param;

/// Maximum number of log lines returned by `logs?<n>`.
pub const MAX_LOG_LINES: usize = 20;

pub const PERMISSION_DENIED: &str = "Vous n'avez pas la permission d'effectuer cette commande.";
pub const CLAIM_CONFIRMED: &str = "Vous êtes désormais le nouveau responsable de la station.";
pub const READ_ONLY: &str = "Paramètre en lecture seule.";

const BATTERY_LIMIT_MIN_MV: u32 = 10_000;
const BATTERY_LIMIT_MAX_MV: u32 = 12_000;

/// Read access to the station journal (operational log and data log).
pub trait Journal {
    /// The last `n` lines of the operational log.
    fn last_logs(&self, n: usize) -> String;
    /// The most recent data records.
    fn last_data(&self) -> String;
}

/// Inputs available to a read handler.
pub struct ReadContext<'a> {
    pub settings: &'a Settings,
    pub telemetry: &'a Telemetry,
    pub journal: &'a dyn Journal,
    pub arg: Option<u32>,
}

type ReadFn = fn(&ReadContext<'_>) -> String;
type ValidateFn = fn(&Settings, &str) -> Result<SettingUpdate, String>;
type ConfirmFn = fn(&Settings) -> String;

/// Write half of a parameter: SMS value → update, then the confirmation reply.
pub struct WriteSpec {
    pub validate: ValidateFn,
    pub confirm: ConfirmFn,
}

/// Handlers for one parameter.
pub struct ParamSpec {
    pub read: ReadFn,
    pub write: Option<WriteSpec>,
}

pub fn spec(param: Param) -> ParamSpec {
    match param {
        Param::Battery => ParamSpec { read: read_battery, write: None },
        Param::BatteryLimit => ParamSpec {
            read: read_battery_limit,
            write: Some(WriteSpec { validate: validate_battery_limit, confirm: confirm_battery_limit }),
        },
        Param::Site => ParamSpec {
            read: read_site,
            write: Some(WriteSpec { validate: validate_site, confirm: confirm_site }),
        },
        Param::Wakeup => ParamSpec {
            read: read_wakeup,
            write: Some(WriteSpec { validate: validate_wakeup, confirm: confirm_wakeup }),
        },
        Param::Sleep => ParamSpec {
            read: read_sleep,
            write: Some(WriteSpec { validate: validate_sleep, confirm: confirm_sleep }),
        },
        Param::Altitude => ParamSpec {
            read: read_altitude,
            write: Some(WriteSpec { validate: validate_altitude, confirm: confirm_altitude }),
        },
        Param::Logs => ParamSpec { read: read_logs, write: None },
        Param::Data => ParamSpec { read: read_data, write: None },
        Param::Master => ParamSpec { read: read_master, write: None },
        Param::Help => ParamSpec { read: read_help, write: None },
    }
}

// ── Read handlers ───────────────────────────────────────────────────

fn read_battery(c: &ReadContext<'_>) -> String {
    match c.telemetry.battery_volts() {
        Some(v) => format!("Tension de la batterie : {v:.1} V"),
        None => "Tension de la batterie : n/a".to_string(),
    }
}

fn read_battery_limit(c: &ReadContext<'_>) -> String {
    format!("Seuil d'alerte batterie : {} mV", c.settings.battery_limit())
}

fn read_site(c: &ReadContext<'_>) -> String {
    format!("Site : \n{}", c.settings.site_name())
}

fn read_wakeup(c: &ReadContext<'_>) -> String {
    format!("Heure d'éveil de la station : {} h", c.settings.wakeup_hour())
}

fn read_sleep(c: &ReadContext<'_>) -> String {
    format!("Heure d'extinction de la station : {} h", c.settings.sleep_hour())
}

fn read_altitude(c: &ReadContext<'_>) -> String {
    format!("Altitude de la station : {} m", c.settings.altitude())
}

fn read_logs(c: &ReadContext<'_>) -> String {
    let n = c.arg.map_or(1, |n| n as usize).clamp(1, MAX_LOG_LINES);
    c.journal.last_logs(n)
}

fn read_data(c: &ReadContext<'_>) -> String {
    c.journal.last_data()
}

fn read_master(c: &ReadContext<'_>) -> String {
    format!("Numéro maître de la station :\n{}", c.settings.master_number())
}

fn read_help(_: &ReadContext<'_>) -> String {
    help_text()
}

fn help_text() -> String {
    let reads: Vec<String> = Param::ALL.iter().map(|p| format!("{p}?")).collect();
    let writes: Vec<String> = Param::ALL
        .iter()
        .filter(|p| spec(**p).write.is_some())
        .map(|p| format!("{p}="))
        .collect();
    format!(
        "Lecture : {}\nModification (maître) : {}\nTout autre message : météo",
        reads.join(" "),
        writes.join(" ")
    )
}

// ── Validation ──────────────────────────────────────────────────────

fn parse_hour(raw: &str) -> Option<u8> {
    raw.trim().parse::<u8>().ok().filter(|h| *h <= 23)
}

fn validate_wakeup(settings: &Settings, raw: &str) -> Result<SettingUpdate, String> {
    let hour = parse_hour(raw).ok_or_else(|| {
        "Heure d'éveil incorrecte, merci de n'envoyer qu'un nombre entre 0 et 23.".to_string()
    })?;
    if hour >= settings.sleep_hour() {
        return Err(format!(
            "Heure d'éveil incorrecte, elle doit être inférieure à l'heure d'extinction ({} h).",
            settings.sleep_hour()
        ));
    }
    Ok(SettingUpdate::WakeupHour(hour))
}

fn validate_sleep(settings: &Settings, raw: &str) -> Result<SettingUpdate, String> {
    let hour = parse_hour(raw).ok_or_else(|| {
        "Heure d'extinction incorrecte, merci de n'envoyer qu'un nombre entre 0 et 23.".to_string()
    })?;
    if hour <= settings.wakeup_hour() {
        return Err(format!(
            "Heure d'extinction incorrecte, elle doit être supérieure à l'heure d'éveil ({} h).",
            settings.wakeup_hour()
        ));
    }
    Ok(SettingUpdate::SleepHour(hour))
}

fn validate_site(_: &Settings, raw: &str) -> Result<SettingUpdate, String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err("Nom de site vide, merci d'envoyer un nom après le signe =.".to_string());
    }
    Ok(SettingUpdate::SiteName(name.chars().take(SITE_NAME_MAX_CHARS).collect()))
}

fn validate_altitude(_: &Settings, raw: &str) -> Result<SettingUpdate, String> {
    raw.trim()
        .parse::<i32>()
        .map(SettingUpdate::Altitude)
        .map_err(|_| "Altitude incorrecte, merci de n'envoyer qu'un nombre.".to_string())
}

fn validate_battery_limit(_: &Settings, raw: &str) -> Result<SettingUpdate, String> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|mv| (BATTERY_LIMIT_MIN_MV + 1..BATTERY_LIMIT_MAX_MV).contains(mv))
        .map(SettingUpdate::BatteryLimit)
        .ok_or_else(|| {
            format!(
                "Seuil de batterie incorrect, merci d'envoyer une tension en mV strictement comprise entre {BATTERY_LIMIT_MIN_MV} et {BATTERY_LIMIT_MAX_MV}."
            )
        })
}

// ── Confirmations ───────────────────────────────────────────────────

fn confirm_battery_limit(s: &Settings) -> String {
    format!("Seuil d'alerte batterie correctement mis à jour : \n{} mV", s.battery_limit())
}

fn confirm_site(s: &Settings) -> String {
    format!("Site correctement mis à jour : \n\"{}\"", s.site_name())
}

fn confirm_wakeup(s: &Settings) -> String {
    format!("Heure d'éveil correctement mise à jour : \n{} h", s.wakeup_hour())
}

fn confirm_sleep(s: &Settings) -> String {
    format!("Heure d'extinction correctement mise à jour : \n{} h", s.sleep_hour())
}

fn confirm_altitude(s: &Settings) -> String {
    format!("Altitude correctement mise à jour : \n{} m", s.altitude())
}

// ── Executor ────────────────────────────────────────────────────────

pub struct CommandExecutor<'a> {
    journal: &'a dyn Journal,
}

impl<'a> CommandExecutor<'a> {
    pub fn new(journal: &'a dyn Journal) -> Self {
        CommandExecutor { journal }
    }

    pub fn execute_read(
        &self,
        param: Param,
        arg: Option<u32>,
        settings: &Settings,
        telemetry: &Telemetry,
    ) -> String {
        let ctx = ReadContext {
            settings,
            telemetry,
            journal: self.journal,
            arg,
        };
        (spec(param).read)(&ctx)
    }

    /// Validate and apply a write. `Err` carries the corrective reply; in that
    /// case `settings` is untouched.
    pub fn execute_write(
        &self,
        param: Param,
        raw: &str,
        settings: &mut Settings,
    ) -> Result<String, String> {
        let Some(write) = spec(param).write else {
            return Err(READ_ONLY.to_string());
        };
        let update = (write.validate)(settings, raw)?;
        if let Err(e) = settings.apply(update) {
            tracing::warn!(%param, error = %e, "validated update refused by settings");
            return Err("Une erreur est survenue, merci de réessayer.".to_string());
        }
        tracing::info!(%param, value = raw, "setting updated");
        Ok((write.confirm)(settings))
    }

    /// Make `sender` the new master number. The last claimer wins.
    pub fn claim_master(&self, settings: &mut Settings, sender: &str) -> Result<String, String> {
        settings
            .apply(SettingUpdate::MasterNumber(sender.to_string()))
            .map_err(|e| e.to_string())?;
        tracing::info!(sender, "master number claimed");
        Ok(CLAIM_CONFIRMED.to_string())
    }
}
