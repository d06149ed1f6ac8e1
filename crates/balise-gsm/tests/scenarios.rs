//! # End-to-end inbox passes
//!
//! A scripted modem holds the SIM store; the responder runs one full pass
//! over it and we inspect what went back out on the wire and what happened
//! to the settings.

use balise_common::models::Telemetry;
use balise_common::settings::{SettingUpdate, Settings};
use balise_gsm::executor::PERMISSION_DENIED;
use balise_gsm::responder::{ResponderConfig, SmsResponder};
use balise_gsm::test_util::{sample_telemetry, MemoryJournal, ScriptedModem, Sent};
use balise_gsm::PassReport;
use tracing_subscriber::EnvFilter;

const MASTER: &str = "+33600000001";
const STRANGER: &str = "+33699999999";

// ─── Helpers ────────────────────────────────────────────────────────────────

fn fast_config() -> ResponderConfig {
    ResponderConfig {
        command_wait_ms: 0,
        segment_delay_ms: 0,
        message_delay_ms: 0,
        ..ResponderConfig::default()
    }
}

fn station(wakeup: u8, sleep: u8) -> Settings {
    let mut s = Settings::default();
    s.apply(SettingUpdate::MasterNumber(MASTER.into())).unwrap();
    s.apply(SettingUpdate::MasterPassword("balise2024".into())).unwrap();
    s.apply(SettingUpdate::SleepHour(23)).unwrap();
    s.apply(SettingUpdate::WakeupHour(wakeup)).unwrap();
    s.apply(SettingUpdate::SleepHour(sleep)).unwrap();
    s.mark_clean();
    s
}

/// Pass logs go to the test output; `RUST_LOG` overrides the level.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("balise_gsm=debug")),
        )
        .with_test_writer()
        .try_init();
}

fn run(modem: &mut ScriptedModem, settings: &mut Settings, telemetry: &Telemetry) -> PassReport {
    init_tracing();
    let journal = MemoryJournal::with_lines(5);
    SmsResponder::new(modem, &journal, fast_config()).run_pass(settings, telemetry)
}

fn position(modem: &ScriptedModem, wanted: &Sent) -> Option<usize> {
    modem.sent().iter().position(|s| s == wanted)
}

// ─── Authorization ──────────────────────────────────────────────────────────

#[test]
fn stranger_cannot_rename_site() {
    let mut modem = ScriptedModem::new().with_sms(1, STRANGER, "site=Summit");
    let mut settings = station(10, 18);
    let before = settings.clone();

    let report = run(&mut modem, &mut settings, &sample_telemetry());

    assert_eq!(report.denied, 1);
    assert_eq!(report.writes, 0);
    assert_eq!(settings, before);
    assert_eq!(
        modem.outbox(),
        &[(STRANGER.to_string(), PERMISSION_DENIED.to_string())]
    );
    assert_eq!(modem.stored_count(), 0);
}

#[test]
fn stranger_can_still_read() {
    let mut modem = ScriptedModem::new().with_sms(1, STRANGER, "fin?");
    let mut settings = station(10, 18);

    run(&mut modem, &mut settings, &sample_telemetry());

    assert_eq!(
        modem.outbox()[0].1,
        "Heure d'extinction de la station : 18 h"
    );
}

#[test]
fn no_master_means_no_writes() {
    let mut modem = ScriptedModem::new().with_sms(1, "", "altitude=100");
    let mut settings = Settings::default();

    let report = run(&mut modem, &mut settings, &sample_telemetry());

    assert_eq!(report.denied, 1);
    assert_eq!(settings.altitude(), 0);
}

// ─── Validation ─────────────────────────────────────────────────────────────

#[test]
fn sleep_before_wakeup_is_rejected() {
    let mut modem = ScriptedModem::new().with_sms(1, MASTER, "fin=10");
    let mut settings = station(12, 20);

    let report = run(&mut modem, &mut settings, &sample_telemetry());

    assert_eq!(report.writes, 0);
    assert_eq!(settings.sleep_hour(), 20);
    assert!(!settings.is_dirty());
    let (to, text) = &modem.outbox()[0];
    assert_eq!(to, MASTER);
    assert!(text.starts_with("Heure d'extinction"), "{text}");
}

#[test]
fn accented_synonym_updates_wakeup() {
    let mut modem = ScriptedModem::new().with_sms(4, MASTER, "Éveil = 7");
    let mut settings = station(10, 18);

    run(&mut modem, &mut settings, &sample_telemetry());

    assert_eq!(settings.wakeup_hour(), 7);
    assert_eq!(
        modem.outbox()[0].1,
        "Heure d'éveil correctement mise à jour : \n7 h"
    );
}

// ─── Battery alarm ──────────────────────────────────────────────────────────

#[test]
fn low_battery_alerts_master_after_cleanup() {
    let mut modem = ScriptedModem::new();
    let mut settings = station(10, 18);
    let telemetry = Telemetry {
        battery_mv: 11_000.0,
        ..sample_telemetry()
    };

    let report = run(&mut modem, &mut settings, &telemetry);

    assert!(report.alarm_sent);
    let outbox = modem.outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].0, MASTER);
    assert!(outbox[0].1.contains("(11.0 V)"));

    let cleanup = position(&modem, &Sent::Command("+CMGD=1,4".into())).unwrap();
    let alarm = position(&modem, &Sent::Command(format!("+CMGS=\"{MASTER}\""))).unwrap();
    assert!(cleanup < alarm);
}

#[test]
fn battery_at_limit_alerts() {
    let mut modem = ScriptedModem::new();
    let mut settings = station(10, 18);
    let telemetry = Telemetry {
        battery_mv: f64::from(settings.battery_limit()),
        ..sample_telemetry()
    };
    assert!(run(&mut modem, &mut settings, &telemetry).alarm_sent);
}

#[test]
fn healthy_or_unknown_battery_is_quiet() {
    for mv in [12_400.0, f64::NAN, -5.0] {
        let mut modem = ScriptedModem::new();
        let mut settings = station(10, 18);
        let telemetry = Telemetry {
            battery_mv: mv,
            ..sample_telemetry()
        };
        assert!(!run(&mut modem, &mut settings, &telemetry).alarm_sent);
        assert!(modem.outbox().is_empty());
    }
}

// ─── Store handling ─────────────────────────────────────────────────────────

#[test]
fn count_mismatch_still_processes_listing() {
    let mut modem = ScriptedModem::new()
        .with_sms(1, STRANGER, "batterie?")
        .with_reply("+CPMS", "+CPMS: 7,30,7,30,7,30\r\n\r\nOK");
    let mut settings = station(10, 18);

    let report = run(&mut modem, &mut settings, &sample_telemetry());

    assert_eq!(report.listed, 1);
    assert_eq!(report.processed, 1);
    assert_eq!(modem.outbox()[0].1, "Tension de la batterie : 12.4 V");
    assert_eq!(modem.stored_count(), 0);
}

#[test]
fn ucs2_message_is_understood() {
    let mut modem = ScriptedModem::new().with_ucs2_sms(3, MASTER, "Altitude=2100");
    let mut settings = station(10, 18);

    let report = run(&mut modem, &mut settings, &sample_telemetry());

    assert_eq!(report.writes, 1);
    assert_eq!(settings.altitude(), 2100);
}

#[test]
fn echo_off_modem_leaves_compose_mode() {
    let mut modem = ScriptedModem::new()
        .echo_off()
        .with_sms(1, STRANGER, "fin?")
        .with_sms(2, STRANGER, "debut?");
    let mut settings = station(10, 18);

    let report = run(&mut modem, &mut settings, &sample_telemetry());

    assert_eq!(report.replies_sent, 2);
    assert_eq!(modem.outbox().len(), 2);
    assert_eq!(modem.stored_count(), 0);
    let body = position(&modem, &Sent::Raw("Heure d'extinction de la station : 18 h".into())).unwrap();
    assert_eq!(modem.sent()[body + 1], Sent::Raw("\x1A".into()));
}

#[test]
fn long_reply_is_segmented() {
    let mut modem = ScriptedModem::new().with_sms(1, MASTER, &format!("site={}", "L".repeat(140)));
    let mut settings = station(10, 18);

    run(&mut modem, &mut settings, &sample_telemetry());

    let outbox = modem.outbox();
    assert_eq!(outbox.len(), 2);
    assert!(outbox.iter().all(|(to, _)| to == MASTER));
    let joined: String = outbox.iter().map(|(_, t)| t.as_str()).collect();
    assert!(joined.starts_with("Site correctement mis à jour"));
    assert_eq!(settings.site_name().chars().count(), 125);
}
