//! Balise station agent
//!
//! Runs one measurement cycle on the weather station and exits:
//!
//! - Loads the station settings and the latest sensor snapshot
//! - Journals the reading (daily files, pruned after 30 days) and spools the
//!   binary uplink frame
//! - Serves the SMS inbox through the GSM modem, when one answers
//! - Persists settings changed by SMS commands
//! - In `--simulate` mode, generates a fake reading for bench runs

mod config;
mod cycle;
mod journal;
mod telemetry;
mod uplink;

use std::path::PathBuf;

use anyhow::Context;
use balise_codec::TelemetryCodec;
use balise_common::settings::TomlSettingsStore;
use balise_gsm::{AtChannel, ModemChannel};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::AgentConfig;
use crate::cycle::Cycle;
use crate::journal::{FileJournal, LOG_PREFIX};
use crate::uplink::FileUplink;

/// Balise weather station agent.
#[derive(Parser, Debug)]
#[command(name = "balise-agent", about = "Balise weather station cycle runner")]
struct Cli {
    /// Agent configuration file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Station settings file override.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Telemetry snapshot override (JSON).
    #[arg(long)]
    telemetry: Option<PathBuf>,

    /// Generate a fake reading instead of reading the snapshot.
    #[arg(long, default_value_t = false)]
    simulate: bool,

    /// Do not touch the modem.
    #[arg(long, default_value_t = false)]
    no_modem: bool,

    /// Modem serial port override.
    #[arg(long)]
    port: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AgentConfig::load(cli.config.as_deref())?;
    if let Some(path) = cli.settings {
        config.station.settings = path;
    }
    if let Some(path) = cli.telemetry {
        config.station.telemetry = path;
    }
    if let Some(port) = cli.port {
        config.modem.serial.port = port;
    }
    if cli.no_modem {
        config.modem.enabled = false;
    }

    let journal = FileJournal::new(&config.journal);
    init_logging(&config, &journal)?;
    if let Err(e) = journal.prune() {
        tracing::warn!(error = %e, "journal retention sweep failed");
    }
    tracing::info!(
        simulate = cli.simulate,
        modem = config.modem.enabled,
        settings = %config.station.settings.display(),
        "balise-agent starting"
    );

    let telemetry = if cli.simulate {
        telemetry::simulated()
    } else {
        telemetry::load(&config.station.telemetry)?
    };

    let codec = TelemetryCodec::new(config.uplink.frame.clone()).context("invalid uplink frame config")?;
    let store = TomlSettingsStore::new(&config.station.settings);
    let mut uplink = FileUplink::new(&config.uplink.output);

    // Opening failure is final for this run: the cycle goes on without SMS.
    let mut channel = if config.modem.enabled {
        match ModemChannel::open(&config.modem.serial) {
            Ok(channel) => Some(channel),
            Err(e) => {
                tracing::error!(error = %e, "modem unavailable");
                None
            }
        }
    } else {
        None
    };

    let outcome = Cycle {
        store: &store,
        journal: &journal,
        codec: &codec,
        uplink: &mut uplink,
        modem_config: &config.modem,
    }
    .run(
        &telemetry,
        channel.as_mut().map(|c| c as &mut dyn AtChannel),
    )?;

    tracing::info!(
        uplinked = outcome.uplinked,
        metadata_frames = outcome.metadata_frames,
        sms = outcome.sms.is_some(),
        settings_saved = outcome.settings_saved,
        "balise-agent cycle complete"
    );
    Ok(())
}

/// Console logging filtered by `RUST_LOG` (default `info`), plus an
/// ANSI-free copy in the daily operational log when it is enabled.
fn init_logging(config: &AgentConfig, journal: &FileJournal) -> anyhow::Result<()> {
    let file_layer = if config.journal.operational_log {
        let appender = journal
            .appender(LOG_PREFIX)
            .with_context(|| format!("opening operational log in {}", config.journal.dir.display()))?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(appender),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}
