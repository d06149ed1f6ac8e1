//! # balise-codec
//!
//! Binary uplink encoding for the Balise weather station.
//!
//! One [`frame::TelemetryFrame`] per station cycle: a fixed-length record
//! of quantized readings, with all-ones sentinels for failed sensors and an
//! optional trailing checksum. Site name and altitude changes go out as
//! keyed text frames of the same length.
//!
//! ## Crate structure
//!
//! - [`frame`]: Field layout, quantization, frame encode/decode

pub mod frame;

pub use frame::{DirectionEncoding, FrameConfig, FrameError, TelemetryCodec, TelemetryFrame, TextKey};
