//! Modem bring-up and housekeeping commands.

use std::time::Duration;

use chrono::NaiveDateTime;

use crate::channel::AtChannel;

/// Put the modem in SMS text mode on the SIM store, with detailed
/// headers so `+CMGR` reports the data coding scheme.
///
/// Returns `false` when any step gets no answer; the caller then treats the
/// modem as unavailable for this cycle.
pub fn setup(ch: &mut dyn AtChannel, pin: Option<&str>, wait: Duration) -> bool {
    let mut steps: Vec<String> = vec![String::new()];
    if let Some(pin) = pin.filter(|p| !p.is_empty()) {
        steps.push(format!("+CPIN=\"{pin}\""));
    }
    steps.extend(
        ["+CMGF=1", "+CSDH=1", "+CSCS=\"GSM\"", "+CPMS=\"SM\""]
            .iter()
            .map(|s| s.to_string()),
    );

    for step in &steps {
        match ch.send_command(step, wait) {
            Ok(reply) if reply.contains("ERROR") => {
                tracing::warn!(command = %format!("AT{step}"), reply = %reply, "modem setup step rejected");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(command = %format!("AT{step}"), error = %e, "modem setup failed");
                return false;
            }
        }
    }
    tracing::info!("modem configured for SMS text mode");
    true
}

/// Read the network clock. `None` when the modem has no valid time.
pub fn clock(ch: &mut dyn AtChannel, wait: Duration) -> Option<NaiveDateTime> {
    match ch.send_command("+CCLK?", wait) {
        Ok(reply) => parse_cclk(&reply),
        Err(e) => {
            tracing::warn!(error = %e, "clock query failed");
            None
        }
    }
}

/// Parse `+CCLK: "yy/MM/dd,hh:mm:ss±zz"`; the timezone suffix is ignored.
pub fn parse_cclk(reply: &str) -> Option<NaiveDateTime> {
    let line = reply.lines().find(|l| l.trim_start().starts_with("+CCLK:"))?;
    let start = line.find('"')? + 1;
    let end = start + line[start..].find('"')?;
    let stamp = &line[start..end];
    let local = stamp.get(..17)?;
    NaiveDateTime::parse_from_str(local, "%y/%m/%d,%H:%M:%S").ok()
}

/// Persist the current modem configuration (`AT&W`).
pub fn save_profile(ch: &mut dyn AtChannel, wait: Duration) -> bool {
    ch.send_command("&W", wait)
        .map(|r| !r.contains("ERROR"))
        .unwrap_or(false)
}

/// Let the modem enter slow-clock sleep when the line is idle.
pub fn enable_sleep(ch: &mut dyn AtChannel, wait: Duration) -> bool {
    match ch.send_command("+CSCLK=2", wait) {
        Ok(reply) => !reply.contains("ERROR"),
        Err(e) => {
            tracing::warn!(error = %e, "cannot enable modem sleep");
            false
        }
    }
}
