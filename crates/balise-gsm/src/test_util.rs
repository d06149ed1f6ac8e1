//! In-memory modem and journal for tests.
//!
//! [`ScriptedModem`] keeps a small SIM store and answers the AT commands the
//! SMS layer uses the way a SIM800-class modem does in text mode. Every
//! exchange is recorded so tests can assert on the wire traffic.

use std::collections::VecDeque;
use std::time::Duration;

use balise_common::models::Telemetry;

use crate::channel::{AtChannel, ModemError, CTRL_Z, ESC};
use crate::executor::Journal;

const NETWORK_TIME: &str = "24/03/17,14:05:09+04";
const SMS_CENTER: &str = "+33609001390";

/// One write on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    /// Body of an `AT...` command, without the prefix.
    Command(String),
    Raw(String),
}

#[derive(Debug, Clone)]
struct Stored {
    index: u32,
    sender: String,
    /// `None` for an entry that is listed but cannot be read back.
    body: Option<String>,
    /// Data coding scheme reported by `+CMGR`.
    dcs: u8,
}

#[derive(Debug, Default)]
pub struct ScriptedModem {
    store: Vec<Stored>,
    sent: Vec<Sent>,
    outbox: Vec<(String, String)>,
    composing: Option<(String, String)>,
    overrides: VecDeque<(String, String)>,
    fail_prefixes: Vec<String>,
    silent: bool,
    echo_off: bool,
}

impl ScriptedModem {
    pub fn new() -> Self {
        Self::default()
    }

    /// A modem that never answers.
    pub fn unreachable() -> Self {
        ScriptedModem {
            silent: true,
            ..Self::default()
        }
    }

    pub fn with_sms(mut self, index: u32, sender: &str, body: &str) -> Self {
        self.store.push(Stored {
            index,
            sender: sender.into(),
            body: Some(body.into()),
            dcs: 0,
        });
        self
    }

    /// A message sent in the UCS2 alphabet; the modem shows it as hex.
    pub fn with_ucs2_sms(mut self, index: u32, sender: &str, body: &str) -> Self {
        let hex: String = body.encode_utf16().map(|u| format!("{u:04X}")).collect();
        self.store.push(Stored {
            index,
            sender: sender.into(),
            body: Some(hex),
            dcs: 8,
        });
        self
    }

    /// Listed by `+CMGL` but `+CMGR` fails on it.
    pub fn with_listing_only(mut self, index: u32) -> Self {
        self.store.push(Stored {
            index,
            sender: String::new(),
            body: None,
            dcs: 0,
        });
        self
    }

    /// Answer the next command starting with `prefix` with `reply`.
    pub fn with_reply(mut self, prefix: &str, reply: &str) -> Self {
        self.overrides.push_back((prefix.into(), reply.into()));
        self
    }

    /// Commands starting with `prefix` get no answer.
    pub fn fail_on(mut self, prefix: &str) -> Self {
        self.fail_prefixes.push(prefix.into());
        self
    }

    /// SMS text written in compose mode gets no answer; only Ctrl-Z does.
    pub fn echo_off(mut self) -> Self {
        self.echo_off = true;
        self
    }

    pub fn sent(&self) -> &[Sent] {
        &self.sent
    }

    pub fn sent_commands_with(&self, prefix: &str) -> Vec<String> {
        self.sent
            .iter()
            .filter_map(|s| match s {
                Sent::Command(c) if c.starts_with(prefix) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    /// Completed SMS as `(number, text)`, one entry per segment.
    pub fn outbox(&self) -> &[(String, String)] {
        &self.outbox
    }

    pub fn stored_count(&self) -> usize {
        self.store.len()
    }

    fn answer(&mut self, body: &str) -> String {
        if let Some(pos) = self.overrides.iter().position(|(p, _)| body.starts_with(p.as_str()))
            && let Some((_, reply)) = self.overrides.remove(pos)
        {
            return reply;
        }

        if body.starts_with("+CPMS") {
            let n = self.store.len();
            return format!("+CPMS: {n},30,{n},30,{n},30\r\n\r\nOK");
        }
        if body == "+CMGL=\"ALL\"" {
            let mut reply = String::new();
            for s in &self.store {
                reply.push_str(&format!(
                    "+CMGL: {},\"REC UNREAD\",\"{}\",\"\",\"{NETWORK_TIME}\"\r\n{}\r\n",
                    s.index,
                    s.sender,
                    s.body.as_deref().unwrap_or("")
                ));
            }
            reply.push_str("\r\nOK");
            return reply.trim().to_string();
        }
        if let Some(index) = body.strip_prefix("+CMGR=").and_then(|i| i.parse::<u32>().ok()) {
            return match self.store.iter().find(|s| s.index == index) {
                Some(Stored { sender, body: Some(text), dcs, .. }) => format!(
                    "+CMGR: \"REC UNREAD\",\"{sender}\",\"\",\"{NETWORK_TIME}\",145,4,0,{dcs},\"{SMS_CENTER}\",145,{}\r\n{text}\r\n\r\nOK",
                    text.len()
                ),
                _ => "+CMS ERROR: 321".to_string(),
            };
        }
        if body == "+CMGD=1,4" {
            self.store.clear();
            return "OK".to_string();
        }
        if let Some(args) = body.strip_prefix("+CMGD=") {
            let index = args.split(',').next().and_then(|i| i.parse::<u32>().ok());
            self.store.retain(|s| Some(s.index) != index);
            return "OK".to_string();
        }
        if let Some(number) = body.strip_prefix("+CMGS=") {
            self.composing = Some((number.trim_matches('"').to_string(), String::new()));
            return ">".to_string();
        }
        if body == "+CCLK?" {
            return format!("+CCLK: \"{NETWORK_TIME}\"\r\n\r\nOK");
        }
        "OK".to_string()
    }
}

impl AtChannel for ScriptedModem {
    fn send_command(&mut self, body: &str, _wait: Duration) -> Result<String, ModemError> {
        self.sent.push(Sent::Command(body.to_string()));
        if self.silent || self.fail_prefixes.iter().any(|p| body.starts_with(p.as_str())) {
            return Err(ModemError::Timeout(Duration::ZERO));
        }
        Ok(self.answer(body))
    }

    fn send_raw(&mut self, payload: &str, _wait: Duration) -> Result<String, ModemError> {
        self.sent.push(Sent::Raw(payload.to_string()));
        if self.silent {
            return Err(ModemError::Timeout(Duration::ZERO));
        }
        if payload == CTRL_Z {
            return Ok(match self.composing.take() {
                Some(done) => {
                    self.outbox.push(done);
                    format!("+CMGS: {}\r\n\r\nOK", self.outbox.len())
                }
                None => "ERROR".to_string(),
            });
        }
        if payload == ESC {
            self.composing = None;
            return Ok("OK".to_string());
        }
        match self.composing.as_mut() {
            Some((_, text)) => {
                text.push_str(payload);
                if self.echo_off {
                    return Err(ModemError::Timeout(Duration::ZERO));
                }
                Ok(">".to_string())
            }
            None => Ok("ERROR".to_string()),
        }
    }
}

// ── Journal ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MemoryJournal {
    pub logs: Vec<String>,
    pub data: String,
}

impl MemoryJournal {
    pub fn with_lines(n: usize) -> Self {
        MemoryJournal {
            logs: (0..n).map(|i| format!("10:{:02}:00 entrée {i}", i % 60)).collect(),
            data: String::new(),
        }
    }
}

impl Journal for MemoryJournal {
    fn last_logs(&self, n: usize) -> String {
        let start = self.logs.len().saturating_sub(n);
        self.logs[start..].join("\n")
    }

    fn last_data(&self) -> String {
        self.data.clone()
    }
}

// ── Telemetry ───────────────────────────────────────────────────────

/// A plausible reading with every field in range.
pub fn sample_telemetry() -> Telemetry {
    Telemetry {
        timestamp: "14h05".into(),
        temperature_c: 12.34,
        humidity_pct: 81.0,
        pressure_hpa: 1013.2,
        cloud_base_m: 850.0,
        wind_speed_avg_kmh: 18.0,
        wind_speed_max_kmh: 32.0,
        wind_dir_avg_deg: 270.0,
        wind_dir_max_deg: 290.0,
        battery_mv: 12_400.0,
    }
}
