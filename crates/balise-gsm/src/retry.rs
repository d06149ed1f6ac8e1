//! Bounded retry with fixed backoff, for hardware bring-up.
//!
//! The caller gets either a working handle or the last error; there is no
//! half-initialised state in between.

use std::fmt::Display;
use std::thread;
use std::time::Duration;

/// Run `op` up to `attempts` times (at least once), sleeping `delay`
/// between failures. Returns the first success or the last error.
pub fn with_backoff<T, E, F>(attempts: u32, delay: Duration, what: &str, mut op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Result<T, E>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, what, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < attempts => {
                tracing::warn!(attempt, attempts, what, error = %e, "attempt failed, retrying");
                thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(attempts, what, error = %e, "giving up");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeds_after_failures() {
        let mut calls = 0;
        let result: Result<u32, String> = with_backoff(5, Duration::ZERO, "test", || {
            calls += 1;
            if calls < 3 { Err(format!("fail {calls}")) } else { Ok(calls) }
        });
        assert_eq!(result, Ok(3));
        assert_eq!(calls, 3);
    }

    #[test]
    fn gives_up_with_last_error() {
        let mut calls = 0;
        let result: Result<(), String> = with_backoff(3, Duration::ZERO, "test", || {
            calls += 1;
            Err(format!("fail {calls}"))
        });
        assert_eq!(result, Err("fail 3".to_string()));
        assert_eq!(calls, 3);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let mut calls = 0;
        let _: Result<(), &str> = with_backoff(0, Duration::ZERO, "test", || {
            calls += 1;
            Err("nope")
        });
        assert_eq!(calls, 1);
    }
}
