//! File-backed station journal.
//!
//! Two daily-rotated files live in the journal directory:
//! `logs.YYYY-MM-DD.txt`, written by the tracing file layer, and
//! `data.YYYY-MM-DD.txt`, one line per reading from [`FileJournal::record`].
//! Both are read back for the `logs?` and `data?` SMS commands, newest day
//! first, by seeking back from the end of each file.
//!
//! The agent runs one cycle per process, so old days are pruned explicitly by
//! [`FileJournal::prune`] at startup rather than on rollover.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use balise_common::models::Telemetry;
use balise_gsm::Journal;
use chrono::Local;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::config::JournalConfig;

const NO_LOGS: &str = "Aucun log disponible.";
const NO_DATA: &str = "Aucune donnée disponible.";

pub const LOG_PREFIX: &str = "logs";
pub const DATA_PREFIX: &str = "data";
const SUFFIX: &str = "txt";

/// Bytes read per step when scanning a file backwards.
const TAIL_BLOCK: u64 = 4096;

#[derive(Debug, Clone)]
pub struct FileJournal {
    dir: PathBuf,
    operational_log: bool,
    retention_days: usize,
}

impl FileJournal {
    pub fn new(config: &JournalConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            operational_log: config.operational_log,
            retention_days: config.retention_days.max(1),
        }
    }

    /// Daily appender for one journal file family.
    pub fn appender(&self, prefix: &str) -> io::Result<RollingFileAppender> {
        fs::create_dir_all(&self.dir)?;
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(prefix)
            .filename_suffix(SUFFIX)
            .max_log_files(self.retention_days)
            .build(&self.dir)
            .map_err(io::Error::other)
    }

    /// Append one reading to the data log as `HH:MM:SS {json}`.
    pub fn record(&self, telemetry: &Telemetry) -> io::Result<()> {
        let json = serde_json::to_string(telemetry).map_err(io::Error::other)?;
        let mut file = self.appender(DATA_PREFIX)?;
        writeln!(file, "{} {json}", Local::now().format("%H:%M:%S"))?;
        file.flush()
    }

    /// Delete all but the newest `retention_days` files of each journal.
    /// Returns how many files were removed.
    pub fn prune(&self) -> io::Result<usize> {
        let mut removed = 0;
        for prefix in [LOG_PREFIX, DATA_PREFIX] {
            let files = self.files(prefix)?;
            let excess = files.len().saturating_sub(self.retention_days);
            for path in &files[..excess] {
                match fs::remove_file(path) {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot prune journal file"),
                }
            }
        }
        if removed > 0 {
            tracing::info!(removed, keep = self.retention_days, "old journal files pruned");
        }
        Ok(removed)
    }

    /// Journal files of one family, oldest first. The date in the name
    /// sorts chronologically.
    fn files(&self, prefix: &str) -> io::Result<Vec<PathBuf>> {
        let head = format!("{prefix}.");
        let tail = format!(".{SUFFIX}");
        let mut files = Vec::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(&head) && name.ends_with(&tail) && entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Last `n` non-empty lines across a file family, newest day first.
    fn tail(&self, prefix: &str, n: usize) -> Option<String> {
        if n == 0 {
            return None;
        }
        let files = match self.files(prefix) {
            Ok(files) => files,
            Err(e) => {
                tracing::debug!(dir = %self.dir.display(), error = %e, "journal directory unreadable");
                return None;
            }
        };
        let mut collected: Vec<String> = Vec::new();
        for path in files.iter().rev() {
            match tail_lines(path, n - collected.len()) {
                Ok(mut lines) => {
                    lines.append(&mut collected);
                    collected = lines;
                }
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "journal file unreadable"),
            }
            if collected.len() >= n {
                break;
            }
        }
        (!collected.is_empty()).then(|| collected.join("\n"))
    }
}

impl Journal for FileJournal {
    fn last_logs(&self, n: usize) -> String {
        if !self.operational_log {
            return NO_LOGS.to_string();
        }
        self.tail(LOG_PREFIX, n).unwrap_or_else(|| NO_LOGS.to_string())
    }

    fn last_data(&self) -> String {
        self.tail(DATA_PREFIX, 1).unwrap_or_else(|| NO_DATA.to_string())
    }
}

/// Last `n` non-empty lines of one file, read backwards in blocks.
fn tail_lines(path: &Path, n: usize) -> io::Result<Vec<String>> {
    let mut file = File::open(path)?;
    let mut start = file.seek(SeekFrom::End(0))?;
    let mut buf: Vec<u8> = Vec::new();
    loop {
        let step = TAIL_BLOCK.min(start);
        start -= step;
        file.seek(SeekFrom::Start(start))?;
        let mut block = vec![0u8; step as usize];
        file.read_exact(&mut block)?;
        block.extend_from_slice(&buf);
        buf = block;

        let text = String::from_utf8_lossy(&buf);
        let mut lines: Vec<&str> = text.lines().collect();
        // The first line may be cut unless the file start was reached.
        if start > 0 && !lines.is_empty() {
            lines.remove(0);
        }
        let complete: Vec<String> = lines
            .into_iter()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect();
        if complete.len() >= n || start == 0 {
            let skip = complete.len().saturating_sub(n);
            return Ok(complete[skip..].to_vec());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use balise_gsm::test_util::sample_telemetry;

    fn journal(name: &str, retention_days: usize) -> (FileJournal, PathBuf) {
        let dir = std::env::temp_dir().join(format!("balise-journal-{}-{name}", std::process::id()));
        fs::remove_dir_all(&dir).ok();
        let config = JournalConfig {
            dir: dir.clone(),
            operational_log: true,
            retention_days,
        };
        (FileJournal::new(&config), dir)
    }

    fn write_day(dir: &Path, prefix: &str, day: &str, text: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(format!("{prefix}.{day}.{SUFFIX}")), text).unwrap();
    }

    #[test]
    fn logs_tail() {
        let (journal, dir) = journal("logs", 30);
        write_day(&dir, LOG_PREFIX, "2026-10-17", "a\nb\n\nc\nd\n");
        assert_eq!(journal.last_logs(1), "d");
        assert_eq!(journal.last_logs(3), "b\nc\nd");
        assert_eq!(journal.last_logs(50), "a\nb\nc\nd");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn tail_continues_into_previous_day() {
        let (journal, dir) = journal("days", 30);
        write_day(&dir, LOG_PREFIX, "2026-10-16", "old1\nold2\n");
        write_day(&dir, LOG_PREFIX, "2026-10-17", "new1\n");
        assert_eq!(journal.last_logs(2), "old2\nnew1");
        assert_eq!(journal.last_logs(9), "old1\nold2\nnew1");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn tail_of_large_file_spans_blocks() {
        let (_, dir) = journal("large", 30);
        let path = dir.join("big.txt");
        fs::create_dir_all(&dir).unwrap();
        let text: String = (0..5000).map(|i| format!("ligne numéro {i}\n")).collect();
        fs::write(&path, text).unwrap();
        let lines = tail_lines(&path, 3).unwrap();
        assert_eq!(lines, ["ligne numéro 4997", "ligne numéro 4998", "ligne numéro 4999"]);
        assert_eq!(tail_lines(&path, 6000).unwrap().len(), 5000);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_files_give_placeholders() {
        let (journal, dir) = journal("missing", 30);
        assert_eq!(journal.last_logs(5), NO_LOGS);
        assert_eq!(journal.last_data(), NO_DATA);

        let quiet = FileJournal {
            operational_log: false,
            ..journal.clone()
        };
        write_day(&dir, LOG_PREFIX, "2026-10-17", "a\n");
        assert_eq!(quiet.last_logs(5), NO_LOGS);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn record_appends_json_line() {
        let (journal, dir) = journal("record", 30);
        journal.record(&sample_telemetry()).unwrap();
        journal.record(&sample_telemetry()).unwrap();

        let files = journal.files(DATA_PREFIX).unwrap();
        assert_eq!(files.len(), 1);
        let text = fs::read_to_string(&files[0]).unwrap();
        assert_eq!(text.lines().count(), 2);
        let last = journal.last_data();
        let (_, json) = last.split_once(' ').unwrap();
        let back: Telemetry = serde_json::from_str(json).unwrap();
        assert_eq!(back, sample_telemetry());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn prune_keeps_newest_days() {
        let (journal, dir) = journal("prune", 2);
        for day in ["2026-10-14", "2026-10-15", "2026-10-16", "2026-10-17"] {
            write_day(&dir, LOG_PREFIX, day, "x\n");
        }
        write_day(&dir, DATA_PREFIX, "2026-10-17", "y\n");
        write_day(&dir, "station", "2026-10-01", "kept\n");

        assert_eq!(journal.prune().unwrap(), 2);
        let logs = journal.files(LOG_PREFIX).unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs[0].ends_with("logs.2026-10-16.txt"));
        assert_eq!(journal.files(DATA_PREFIX).unwrap().len(), 1);
        assert!(dir.join("station.2026-10-01.txt").exists());
        fs::remove_dir_all(&dir).ok();
    }
}
