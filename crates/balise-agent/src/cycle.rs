//! One station cycle, start to finish.
//!
//! Strictly sequential: settings are loaded once, the reading is journaled
//! and uplinked, the SMS inbox is served if a modem is available, and the
//! settings are written back once if anything changed. A site or altitude
//! changed by SMS also goes out as text frames. A missing or silent modem
//! only means no SMS this cycle.

use std::time::Duration;

use anyhow::Context;
use balise_codec::{TelemetryCodec, TextKey};
use balise_common::models::Telemetry;
use balise_common::settings::SettingsStore;
use balise_gsm::{modem, report, AtChannel, PassReport, SmsResponder};

use crate::config::ModemConfig;
use crate::journal::FileJournal;
use crate::uplink::UplinkSink;

/// What happened during a cycle.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    pub uplinked: bool,
    /// Site/altitude text frames sent after an SMS change.
    pub metadata_frames: usize,
    pub sms: Option<PassReport>,
    pub settings_saved: bool,
    pub voice: String,
}

pub struct Cycle<'a> {
    pub store: &'a dyn SettingsStore,
    pub journal: &'a FileJournal,
    pub codec: &'a TelemetryCodec,
    pub uplink: &'a mut dyn UplinkSink,
    pub modem_config: &'a ModemConfig,
}

impl Cycle<'_> {
    pub fn run(
        &mut self,
        telemetry: &Telemetry,
        modem: Option<&mut dyn AtChannel>,
    ) -> anyhow::Result<CycleOutcome> {
        let mut outcome = CycleOutcome::default();
        let mut settings = self.store.load().context("loading station settings")?;
        tracing::info!(
            site = settings.site_name(),
            wakeup = settings.wakeup_hour(),
            sleep = settings.sleep_hour(),
            "settings loaded"
        );

        if let Err(e) = self.journal.record(telemetry) {
            tracing::warn!(error = %e, "cannot append to data journal");
        }

        let frame = self.codec.encode(telemetry);
        match self.uplink.send(&frame) {
            Ok(()) => outcome.uplinked = true,
            Err(e) => tracing::error!(error = %e, "uplink failed"),
        }

        let site_before = settings.site_name().to_string();
        let altitude_before = settings.altitude();

        match modem {
            Some(channel) => {
                let wait = Duration::from_millis(self.modem_config.responder.command_wait_ms);
                let pin = if self.modem_config.use_pin { settings.sim_pin() } else { None };
                if modem::setup(channel, pin, wait) {
                    if let Some(now) = modem::clock(channel, wait) {
                        tracing::info!(network_time = %now, "modem clock");
                    }
                    let pass = SmsResponder::new(&mut *channel, self.journal, self.modem_config.responder.clone())
                        .run_pass(&mut settings, telemetry);
                    outcome.sms = Some(pass);
                    modem::enable_sleep(channel, wait);
                } else {
                    tracing::warn!("modem did not answer setup, skipping SMS this cycle");
                }
            }
            None => tracing::info!("no modem, skipping SMS this cycle"),
        }

        if settings.site_name() != site_before {
            outcome.metadata_frames += self.uplink_text(TextKey::Site, settings.site_name());
        }
        if settings.altitude() != altitude_before {
            outcome.metadata_frames += self.uplink_text(TextKey::Altitude, &settings.altitude().to_string());
        }

        if settings.is_dirty() {
            self.store.save(&settings).context("saving station settings")?;
            settings.mark_clean();
            outcome.settings_saved = true;
            tracing::info!("settings saved");
        }

        outcome.voice = report::voice_bulletin(telemetry, &settings);
        tracing::info!(text = %outcome.voice, "voice bulletin");
        Ok(outcome)
    }

    /// Send `text` as keyed text frames; returns how many went out.
    fn uplink_text(&mut self, key: TextKey, text: &str) -> usize {
        let mut sent = 0;
        for frame in self.codec.encode_text_frames(key, text) {
            match self.uplink.send(&frame) {
                Ok(()) => sent += 1,
                Err(e) => tracing::error!(?key, error = %e, "metadata uplink failed"),
            }
        }
        tracing::info!(?key, frames = sent, "station metadata uplinked");
        sent
    }
}
