//! Classification of incoming SMS text.
//!
//! Grammar: `<word>=<value>` writes a parameter, `<word>?[<n>]` reads one,
//! a message containing the master password claims the station, anything
//! else asks for the weather bulletin.

use std::collections::HashMap;
use std::fmt;

/// Canonical station parameter addressed by an SMS command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Battery,
    BatteryLimit,
    Site,
    Wakeup,
    Sleep,
    Altitude,
    Logs,
    Data,
    Master,
    Help,
}

impl Param {
    pub const ALL: [Param; 10] = [
        Param::Battery,
        Param::BatteryLimit,
        Param::Site,
        Param::Wakeup,
        Param::Sleep,
        Param::Altitude,
        Param::Logs,
        Param::Data,
        Param::Master,
        Param::Help,
    ];

    /// Words accepted for this parameter. The first one is shown in help.
    pub fn words(self) -> &'static [&'static str] {
        match self {
            Param::Battery => &["batterie", "battery"],
            Param::BatteryLimit => &["seuil", "threshold"],
            Param::Site => &["site", "nom"],
            Param::Wakeup => &["debut", "début", "eveil", "éveil"],
            Param::Sleep => &["fin"],
            Param::Altitude => &["altitude"],
            Param::Logs => &["logs"],
            Param::Data => &["data"],
            Param::Master => &["maitre", "maître", "master"],
            Param::Help => &["aide", "help"],
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.words()[0])
    }
}

/// What an incoming message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    PlainReport,
    ReadParam { param: Param, arg: Option<u32> },
    WriteParam { param: Param, value: String },
    ClaimMaster,
}

/// Word → parameter table.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    words: HashMap<String, Param>,
}

impl Vocabulary {
    pub fn standard() -> Self {
        let words = Param::ALL
            .iter()
            .flat_map(|&p| p.words().iter().map(move |w| (w.to_string(), p)))
            .collect();
        Vocabulary { words }
    }

    /// Case-insensitive, whitespace-tolerant lookup.
    pub fn lookup(&self, word: &str) -> Option<Param> {
        self.words.get(&word.trim().to_lowercase()).copied()
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::standard()
    }
}

/// Classify one message body. Total: every input maps to exactly one kind.
pub fn classify(body: &str, vocabulary: &Vocabulary, master_password: &str) -> CommandKind {
    if let Some((word, value)) = body.split_once('=')
        && let Some(param) = vocabulary.lookup(word)
    {
        return CommandKind::WriteParam {
            param,
            value: value.trim().to_string(),
        };
    }
    if let Some((word, arg)) = body.split_once('?')
        && let Some(param) = vocabulary.lookup(word)
    {
        return CommandKind::ReadParam {
            param,
            arg: arg.trim().parse().ok(),
        };
    }
    if !master_password.is_empty() && body.contains(master_password) {
        return CommandKind::ClaimMaster;
    }
    CommandKind::PlainReport
}
