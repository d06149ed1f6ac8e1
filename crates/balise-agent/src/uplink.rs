//! Delivery of encoded telemetry frames to the radio uplink.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use balise_codec::TelemetryFrame;

/// Destination of encoded frames.
pub trait UplinkSink {
    fn send(&mut self, frame: &TelemetryFrame) -> io::Result<()>;
}

/// Appends raw frames to a file: a spool of fixed-length records consumed
/// by the radio driver, or the device node itself.
#[derive(Debug, Clone)]
pub struct FileUplink {
    path: PathBuf,
}

impl FileUplink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl UplinkSink for FileUplink {
    fn send(&mut self, frame: &TelemetryFrame) -> io::Result<()> {
        ensure_parent(&self.path)?;
        let mut out = OpenOptions::new().create(true).append(true).open(&self.path)?;
        out.write_all(frame.as_bytes())?;
        tracing::info!(path = %self.path.display(), frame = %frame.to_hex(), "uplink frame written");
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
        _ => Ok(()),
    }
}
