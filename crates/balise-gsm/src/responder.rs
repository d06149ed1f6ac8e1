//! One pass over the SMS inbox.
//!
//! `Idle → Listing → (ProcessingMessage)* → Cleanup → BatteryCheck → Idle`.
//! Every stored message is read, classified, authorized and answered on its
//! own; a failure on one message is logged and the pass moves on. The store
//! is emptied once at the end, then the battery alarm is evaluated.

use std::thread;
use std::time::Duration;

use balise_common::models::{Measurement, SmsMessage, Telemetry};
use balise_common::settings::Settings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::AtChannel;
use crate::command::{classify, CommandKind, Vocabulary};
use crate::executor::{CommandExecutor, Journal, PERMISSION_DENIED};
use crate::inbox::{SmsInbox, MAX_MESSAGES_PER_PASS};
use crate::outbound::{send_text, SendOutcome};
use crate::report;

/// Timing and limits of a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    pub max_messages: usize,
    /// Settle time after each AT command before reading the reply.
    pub command_wait_ms: u64,
    pub segment_delay_ms: u64,
    pub message_delay_ms: u64,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        ResponderConfig {
            max_messages: MAX_MESSAGES_PER_PASS,
            command_wait_ms: 200,
            segment_delay_ms: 1500,
            message_delay_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Listing,
    ProcessingMessage { index: u32 },
    Cleanup,
    BatteryCheck,
}

/// Summary of a pass, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub listed: usize,
    pub processed: usize,
    pub skipped: usize,
    pub replies_sent: usize,
    pub denied: usize,
    pub claims: usize,
    pub writes: usize,
    pub alarm_sent: bool,
    pub inbox_cleared: bool,
}

#[derive(Debug, Error)]
enum MessageError {
    #[error("message {0} could not be read")]
    Unreadable(u32),
    #[error("reply to {sender} not delivered")]
    ReplyFailed { sender: String },
    #[error("claim failed: {0}")]
    Claim(String),
}

pub struct SmsResponder<'a> {
    channel: &'a mut dyn AtChannel,
    journal: &'a dyn Journal,
    config: ResponderConfig,
    vocabulary: Vocabulary,
    state: PassState,
}

impl<'a> SmsResponder<'a> {
    pub fn new(channel: &'a mut dyn AtChannel, journal: &'a dyn Journal, config: ResponderConfig) -> Self {
        SmsResponder {
            channel,
            journal,
            config,
            vocabulary: Vocabulary::standard(),
            state: PassState::Idle,
        }
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    fn wait(&self) -> Duration {
        Duration::from_millis(self.config.command_wait_ms)
    }

    fn transition(&mut self, next: PassState) {
        tracing::debug!(from = ?self.state, to = ?next, "responder state");
        self.state = next;
    }

    /// Handle every stored message, clear the store, check the battery.
    /// Settings may be mutated; persisting them is the caller's job.
    pub fn run_pass(&mut self, settings: &mut Settings, telemetry: &Telemetry) -> PassReport {
        let mut summary = PassReport::default();

        self.transition(PassState::Listing);
        let wait = self.wait();
        let (count, indexes) = {
            let mut inbox = SmsInbox::new(&mut *self.channel, wait);
            (inbox.count(), inbox.list_indexes())
        };
        if let Some(count) = count
            && count != indexes.len()
        {
            tracing::warn!(count, listed = indexes.len(), "SMS count and listing disagree");
        }
        summary.listed = indexes.len();
        tracing::info!(listed = summary.listed, "SMS inbox listed");

        let limit = self.config.max_messages;
        if indexes.len() > limit {
            summary.skipped += indexes.len() - limit;
            tracing::warn!(listed = indexes.len(), limit, "too many SMS, extra messages dropped");
        }
        for &index in indexes.iter().take(limit) {
            self.transition(PassState::ProcessingMessage { index });
            match self.handle_message(index, settings, telemetry, &mut summary) {
                Ok(()) => summary.processed += 1,
                Err(e) => {
                    tracing::warn!(index, error = %e, "SMS not handled");
                    summary.skipped += 1;
                }
            }
            thread::sleep(Duration::from_millis(self.config.message_delay_ms));
        }

        self.transition(PassState::Cleanup);
        summary.inbox_cleared = SmsInbox::new(&mut *self.channel, wait).delete_all();

        self.transition(PassState::BatteryCheck);
        summary.alarm_sent = self.check_battery(settings, telemetry);

        self.transition(PassState::Idle);
        tracing::info!(
            processed = summary.processed,
            skipped = summary.skipped,
            replies = summary.replies_sent,
            denied = summary.denied,
            alarm = summary.alarm_sent,
            "SMS pass complete"
        );
        summary
    }

    fn handle_message(
        &mut self,
        index: u32,
        settings: &mut Settings,
        telemetry: &Telemetry,
        summary: &mut PassReport,
    ) -> Result<(), MessageError> {
        let wait = self.wait();
        let SmsMessage { sender, body, .. } = SmsInbox::new(&mut *self.channel, wait)
            .read(index)
            .ok_or(MessageError::Unreadable(index))?;

        let kind = classify(&body, &self.vocabulary, settings.master_password());
        tracing::info!(index, sender = %sender, kind = ?kind, "SMS received");

        let executor = CommandExecutor::new(self.journal);
        let reply = match kind {
            CommandKind::PlainReport => report::sms_bulletin(telemetry, settings),
            CommandKind::ReadParam { param, arg } => {
                executor.execute_read(param, arg, settings, telemetry)
            }
            CommandKind::WriteParam { param, value } => {
                if is_master(settings, &sender) {
                    match executor.execute_write(param, &value, settings) {
                        Ok(confirmation) => {
                            summary.writes += 1;
                            confirmation
                        }
                        Err(correction) => {
                            tracing::info!(%param, value = %value, reply = %correction, "setting rejected");
                            correction
                        }
                    }
                } else {
                    tracing::warn!(sender = %sender, %param, "write refused, sender is not master");
                    summary.denied += 1;
                    PERMISSION_DENIED.to_string()
                }
            }
            CommandKind::ClaimMaster => {
                let reply = executor
                    .claim_master(settings, &sender)
                    .map_err(MessageError::Claim)?;
                summary.claims += 1;
                reply
            }
        };

        let outcome = self.reply(&sender, &reply);
        if outcome.sent == 0 && outcome.total > 0 {
            return Err(MessageError::ReplyFailed { sender });
        }
        summary.replies_sent += 1;
        Ok(())
    }

    fn reply(&mut self, number: &str, text: &str) -> SendOutcome {
        let wait = self.wait();
        let delay = Duration::from_millis(self.config.segment_delay_ms);
        send_text(&mut *self.channel, number, text, wait, delay)
    }

    /// Alert the master when the battery is at or below the configured limit.
    /// Unknown battery readings never raise the alarm.
    fn check_battery(&mut self, settings: &Settings, telemetry: &Telemetry) -> bool {
        let Some(mv) = telemetry.get(Measurement::Battery) else {
            tracing::debug!("battery level unknown, no alarm check");
            return false;
        };
        if mv > f64::from(settings.battery_limit()) {
            return false;
        }
        let master = settings.master_number();
        if master.is_empty() {
            tracing::warn!(battery_mv = mv, "battery low but no master number to alert");
            return false;
        }
        tracing::warn!(battery_mv = mv, limit_mv = settings.battery_limit(), "battery low, alerting master");
        let alarm = report::battery_alarm(telemetry);
        self.reply(master, &alarm).sent > 0
    }
}

/// Writes are reserved to the registered master number.
fn is_master(settings: &Settings, sender: &str) -> bool {
    !settings.master_number().is_empty() && settings.master_number() == sender
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{sample_telemetry, MemoryJournal, ScriptedModem};
    use balise_common::settings::SettingUpdate;

    fn fast() -> ResponderConfig {
        ResponderConfig {
            command_wait_ms: 0,
            segment_delay_ms: 0,
            message_delay_ms: 0,
            ..ResponderConfig::default()
        }
    }

    fn with_master(number: &str) -> Settings {
        let mut s = Settings::default();
        s.apply(SettingUpdate::MasterNumber(number.into())).unwrap();
        s.apply(SettingUpdate::MasterPassword("s3cret".into())).unwrap();
        s.mark_clean();
        s
    }

    #[test]
    fn empty_inbox_still_clears_store() {
        let mut modem = ScriptedModem::new();
        let journal = MemoryJournal::default();
        let mut settings = Settings::default();
        let report = SmsResponder::new(&mut modem, &journal, fast())
            .run_pass(&mut settings, &sample_telemetry());
        assert_eq!(report.listed, 0);
        assert!(report.inbox_cleared);
        assert!(!report.alarm_sent);
        assert!(modem.outbox().is_empty());
    }

    #[test]
    fn plain_message_gets_bulletin() {
        let mut modem = ScriptedModem::new().with_sms(1, "+33611111111", "meteo stp");
        let journal = MemoryJournal::default();
        let mut settings = Settings::default();
        let report = SmsResponder::new(&mut modem, &journal, fast())
            .run_pass(&mut settings, &sample_telemetry());
        assert_eq!(report.processed, 1);
        let outbox = modem.outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].0, "+33611111111");
        assert!(outbox[0].1.contains("Temp: 12.3 C"));
        assert_eq!(modem.stored_count(), 0);
    }

    #[test]
    fn master_write_applies() {
        let mut modem = ScriptedModem::new().with_sms(3, "+33600000001", "altitude=1850");
        let journal = MemoryJournal::default();
        let mut settings = with_master("+33600000001");
        let report = SmsResponder::new(&mut modem, &journal, fast())
            .run_pass(&mut settings, &sample_telemetry());
        assert_eq!(report.writes, 1);
        assert_eq!(settings.altitude(), 1850);
        assert!(settings.is_dirty());
    }

    #[test]
    fn claim_then_write_in_same_pass() {
        let mut modem = ScriptedModem::new()
            .with_sms(1, "+33622222222", "s3cret")
            .with_sms(2, "+33622222222", "fin=20");
        let journal = MemoryJournal::default();
        let mut settings = with_master("+33600000001");
        let report = SmsResponder::new(&mut modem, &journal, fast())
            .run_pass(&mut settings, &sample_telemetry());
        assert_eq!(report.claims, 1);
        assert_eq!(report.writes, 1);
        assert_eq!(settings.master_number(), "+33622222222");
        assert_eq!(settings.sleep_hour(), 20);
    }

    #[test]
    fn unreadable_message_is_skipped() {
        let mut modem = ScriptedModem::new()
            .with_sms(1, "+33611111111", "site?")
            .with_listing_only(9)
            .with_sms(2, "+33611111111", "fin?");
        let journal = MemoryJournal::default();
        let mut settings = Settings::default();
        let report = SmsResponder::new(&mut modem, &journal, fast())
            .run_pass(&mut settings, &sample_telemetry());
        assert_eq!(report.listed, 3);
        assert_eq!(report.processed, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(modem.outbox().len(), 2);
    }

    #[test]
    fn silent_modem_degrades() {
        let mut modem = ScriptedModem::unreachable();
        let journal = MemoryJournal::default();
        let mut settings = with_master("+33600000001");
        let t = Telemetry {
            battery_mv: 10_500.0,
            ..sample_telemetry()
        };
        let report = SmsResponder::new(&mut modem, &journal, fast()).run_pass(&mut settings, &t);
        assert_eq!(report.listed, 0);
        assert!(!report.inbox_cleared);
        assert!(!report.alarm_sent);
    }

    #[test]
    fn message_cap_is_enforced() {
        let mut modem = ScriptedModem::new();
        for i in 1..=25 {
            modem = modem.with_sms(i, "+33611111111", "aide?");
        }
        let journal = MemoryJournal::default();
        let mut settings = Settings::default();
        let report = SmsResponder::new(&mut modem, &journal, fast())
            .run_pass(&mut settings, &sample_telemetry());
        assert_eq!(report.processed, MAX_MESSAGES_PER_PASS);
        assert_eq!(report.skipped, 5);
        assert_eq!(modem.stored_count(), 0);
    }
}
