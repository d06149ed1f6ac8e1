//! AT command channel to the GSM modem.
//!
//! Half-duplex: one command is written, then the reply is collected with a
//! drain-then-wait read. Stale bytes left over from a previous exchange are
//! discarded before every write, so each reply belongs to its command.
//!
//! The channel is generic over any `Read + Write` port. Production uses
//! `serialport`; tests plug in an in-memory port.

use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use thiserror::Error;

use crate::retry;

/// End-of-message byte terminating an SMS body.
pub const CTRL_Z: &str = "\x1A";

/// Abandons an SMS being composed.
pub const ESC: &str = "\x1B";

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("cannot open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("serial I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("no answer from modem within {0:?}")]
    Timeout(Duration),
}

// ── Configuration ───────────────────────────────────────────────────

/// Serial line and timing parameters of the modem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Attempts at opening the port before the modem is declared unavailable.
    pub open_attempts: u32,
    pub open_backoff_ms: u64,
    /// Timeout of a single `read()` on the port.
    pub read_timeout_ms: u64,
    /// Pause between reads while a reply is still arriving.
    pub poll_interval_ms: u64,
    /// Upper bound on the wait for a reply.
    pub response_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: "/dev/ttyS0".into(),
            baud_rate: 115_200,
            open_attempts: 3,
            open_backoff_ms: 1000,
            read_timeout_ms: 50,
            poll_interval_ms: 200,
            response_timeout_ms: 10_000,
        }
    }
}

// ── Trait ───────────────────────────────────────────────────────────

/// Text-command transport used by the SMS layer.
///
/// Any error means "no answer"; callers degrade, they never abort the cycle.
pub trait AtChannel {
    /// Send `AT<body>\r` and return the trimmed reply.
    fn send_command(&mut self, body: &str, wait: Duration) -> Result<String, ModemError>;

    /// Send `payload` as-is (SMS text, Ctrl-Z) and return the trimmed reply.
    fn send_raw(&mut self, payload: &str, wait: Duration) -> Result<String, ModemError>;
}

// ── Serial implementation ───────────────────────────────────────────

/// AT channel over a byte port.
pub struct ModemChannel<P> {
    port: P,
    poll_interval: Duration,
    response_timeout: Duration,
}

impl ModemChannel<Box<dyn SerialPort>> {
    /// Open the serial port, retrying with a fixed backoff.
    ///
    /// An error here is final for the process: the modem stays unavailable
    /// and no later command tries to reopen it.
    pub fn open(config: &SerialConfig) -> Result<Self, ModemError> {
        let port = retry::with_backoff(
            config.open_attempts,
            Duration::from_millis(config.open_backoff_ms),
            "open modem serial port",
            || {
                serialport::new(&config.port, config.baud_rate)
                    .timeout(Duration::from_millis(config.read_timeout_ms))
                    .open()
            },
        )
        .map_err(|source| ModemError::Open {
            port: config.port.clone(),
            source,
        })?;
        tracing::info!(port = %config.port, baud = config.baud_rate, "modem serial port open");
        Ok(Self::new(port, config))
    }
}

impl<P: Read + Write> ModemChannel<P> {
    pub fn new(port: P, config: &SerialConfig) -> Self {
        ModemChannel {
            port,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            response_timeout: Duration::from_millis(config.response_timeout_ms),
        }
    }

    pub fn into_inner(self) -> P {
        self.port
    }

    /// Read whatever is currently buffered into `out`, stopping at
    /// `deadline` even if the line keeps talking. Returns the byte count.
    fn read_available(&mut self, out: &mut Vec<u8>, deadline: Instant) -> Result<usize, ModemError> {
        let mut chunk = [0u8; 256];
        let mut total = 0;
        while Instant::now() < deadline {
            match self.port.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    out.extend_from_slice(&chunk[..n]);
                    total += n;
                }
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                    break;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    /// Discard stale input accumulated before a command, for at most the
    /// response timeout.
    fn drain(&mut self) -> Result<(), ModemError> {
        let mut stale = Vec::new();
        let n = self.read_available(&mut stale, Instant::now() + self.response_timeout)?;
        if n > 0 {
            tracing::trace!(bytes = n, stale = %decode_latin1(&stale).trim(), "discarded stale modem output");
        }
        Ok(())
    }

    /// Wait `wait`, then keep reading while data arrives, for at most the
    /// response timeout. Zero bytes by the deadline is a timeout.
    fn read_reply(&mut self, wait: Duration) -> Result<String, ModemError> {
        thread::sleep(wait);
        let deadline = Instant::now() + self.response_timeout;

        let mut reply = Vec::new();
        loop {
            let n = self.read_available(&mut reply, deadline)?;
            let now = Instant::now();
            if n == 0 && !reply.is_empty() {
                break;
            }
            if now >= deadline {
                if reply.is_empty() {
                    return Err(ModemError::Timeout(self.response_timeout));
                }
                break;
            }
            thread::sleep(self.poll_interval);
        }
        Ok(decode_latin1(&reply).trim().to_string())
    }

    fn exchange(&mut self, bytes: &[u8], wait: Duration) -> Result<String, ModemError> {
        self.drain()?;
        self.port.write_all(bytes)?;
        self.port.flush()?;
        self.read_reply(wait)
    }
}

impl<P: Read + Write> AtChannel for ModemChannel<P> {
    fn send_command(&mut self, body: &str, wait: Duration) -> Result<String, ModemError> {
        let mut line = encode_latin1(&format!("AT{body}"));
        line.push(b'\r');
        let reply = self.exchange(&line, wait)?;
        tracing::debug!(command = %format!("AT{body}"), reply = %reply, "AT exchange");
        Ok(reply)
    }

    fn send_raw(&mut self, payload: &str, wait: Duration) -> Result<String, ModemError> {
        let reply = self.exchange(&encode_latin1(payload), wait)?;
        tracing::debug!(bytes = payload.len(), reply = %reply, "raw modem write");
        Ok(reply)
    }
}

// ── Text encoding ───────────────────────────────────────────────────

/// The modem talks ISO-8859-1; every byte maps to the same code point.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Characters outside ISO-8859-1 are replaced with `?`.
pub fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}
