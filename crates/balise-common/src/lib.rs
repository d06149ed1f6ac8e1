//! Shared types for the Balise weather station.
//!
//! This crate contains:
//! - **Telemetry**: one sensor snapshot per station cycle, with per-field validity ranges
//! - **Settings**: persistent station configuration and the store it is loaded from
//! - **SMS records**: messages fetched from the modem inbox

pub mod models;
pub mod settings;
