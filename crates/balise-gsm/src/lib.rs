//! # SMS command & modem layer
//!
//! Everything the station does over its cellular modem in one cycle:
//! the AT command channel, the SIM-stored SMS inbox, the SMS command
//! grammar with its authorization rule, the reply texts, and the
//! orchestrating inbox pass.

pub mod channel;
pub mod command;
pub mod executor;
pub mod inbox;
pub mod modem;
pub mod outbound;
pub mod report;
pub mod responder;
pub mod retry;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

pub use channel::{AtChannel, ModemChannel, ModemError, SerialConfig};
pub use command::{classify, CommandKind, Param, Vocabulary};
pub use executor::{CommandExecutor, Journal};
pub use responder::{PassReport, ResponderConfig, SmsResponder};
