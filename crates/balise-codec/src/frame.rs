//! # Telemetry Uplink Frame
//!
//! Fixed-width binary record carrying one weather reading over the
//! low-bandwidth radio uplink (12 bytes by default).
//!
//! ## Default layout (compass directions, checksum on)
//!
//! ```text
//!  byte  0        1        2        3        4        5..6         7..8        9..10      11
//! +--------+--------+--------+--------+--------+------------+-----------+-----------+-------+
//! |wind avg|wind max|dir avg |dir max |humidity| temperature|  pressure | battery mV| csum  |
//! | km/h   | km/h   |0..15   |0..15   |  %     |(t+50)*100  |(p-400)*10 |           |       |
//! +--------+--------+--------+--------+--------+------------+-----------+-----------+-------+
//! ```
//!
//! Multi-byte fields are big-endian. A field whose reading is outside its
//! validity domain, or does not fit its width, is sent as the all-ones
//! sentinel for that width so the receiver can tell "sensor failure" apart
//! from a measured zero.
//!
//! With `Degrees`/`DeciDegrees` direction encoding each direction takes two
//! bytes; the payload is then truncated to fit the configured length. The
//! checksum (when enabled) is always the last byte and covers every byte
//! before it, padding included.
//!
//! ## Text frames
//!
//! Station metadata travels in keyed text frames of the same length:
//!
//! ```text
//! +----------------+------------------------------+---------------+
//! | 100+key/150+key| ASCII text, length-1 max     | filler ...    |
//! +----------------+------------------------------+---------------+
//! ```
//!
//! `100+key` replaces the stored value, `150+key` appends to it. Text
//! frames have no checksum.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use balise_common::models::{compass_index, Measurement, Telemetry};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Default frame length in bytes.
pub const DEFAULT_FRAME_LEN: usize = 12;

/// Default filler byte used to pad short payloads.
pub const DEFAULT_FILLER: u8 = 1;

/// Header base of a text frame replacing the stored value.
pub const TEXT_WRITE_BASE: u8 = 100;

/// Header base of a text frame appending to the stored value.
pub const TEXT_APPEND_BASE: u8 = 150;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame length {actual} does not match configured length {expected}")]
    WrongLength { expected: usize, actual: usize },
    #[error("checksum mismatch: frame carries {found:#04x}, computed {computed:#04x}")]
    Checksum { found: u8, computed: u8 },
    #[error("invalid frame configuration: {0}")]
    InvalidConfig(String),
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// How wind directions are quantized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionEncoding {
    /// 16-point compass index, one byte.
    #[default]
    Compass16,
    /// Whole degrees 0..=359, two bytes.
    Degrees,
    /// Tenths of a degree 0..=3599, two bytes.
    DeciDegrees,
}

impl DirectionEncoding {
    fn width(self) -> usize {
        match self {
            DirectionEncoding::Compass16 => 1,
            DirectionEncoding::Degrees | DirectionEncoding::DeciDegrees => 2,
        }
    }
}

/// Deployment-level framing choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Total frame length, checksum included.
    pub length: usize,
    /// Append a `sum mod 256` byte.
    pub checksum: bool,
    /// Padding byte for short payloads.
    pub filler: u8,
    pub direction: DirectionEncoding,
}

impl Default for FrameConfig {
    fn default() -> Self {
        FrameConfig {
            length: DEFAULT_FRAME_LEN,
            checksum: true,
            filler: DEFAULT_FILLER,
            direction: DirectionEncoding::default(),
        }
    }
}

/// Station metadata carried by text frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKey {
    Site = 0,
    Altitude = 1,
}

impl TextKey {
    fn header(self, append: bool) -> u8 {
        let base = if append { TEXT_APPEND_BASE } else { TEXT_WRITE_BASE };
        base + self as u8
    }
}

// ─── Field layout ────────────────────────────────────────────────────────────

/// Quantization rule of one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quantize {
    /// `round((value - offset) * scale)`.
    Linear { offset: f64, scale: f64 },
    /// 16-point compass index.
    Compass,
    /// `round(value * scale) mod modulus`, for angles.
    Angle { scale: f64, modulus: u32 },
}

/// Position of one measurement in the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub measurement: Measurement,
    /// Width in bytes (1 or 2).
    pub width: usize,
    pub quantize: Quantize,
}

impl FieldSpec {
    /// All-ones value reserved for "unknown".
    pub fn sentinel(&self) -> u16 {
        if self.width == 1 { 0xFF } else { 0xFFFF }
    }

    /// Quantize a validated reading; `None` maps to the sentinel.
    fn quantize(&self, value: Option<f64>) -> u16 {
        let Some(v) = value else {
            return self.sentinel();
        };
        let q = match self.quantize {
            Quantize::Linear { offset, scale } => ((v - offset) * scale).round(),
            Quantize::Compass => compass_index(v) as f64,
            Quantize::Angle { scale, modulus } => ((v * scale).round() as u32 % modulus) as f64,
        };
        if q < 0.0 || q >= self.sentinel() as f64 {
            return self.sentinel();
        }
        q as u16
    }

    fn dequantize(&self, q: u16) -> Option<f64> {
        if q == self.sentinel() {
            return None;
        }
        let v = match self.quantize {
            Quantize::Linear { offset, scale } => q as f64 / scale + offset,
            Quantize::Compass => q as f64 * 22.5,
            Quantize::Angle { scale, .. } => q as f64 / scale,
        };
        Some(v)
    }
}

fn linear(measurement: Measurement, width: usize, offset: f64, scale: f64) -> FieldSpec {
    FieldSpec {
        measurement,
        width,
        quantize: Quantize::Linear { offset, scale },
    }
}

fn direction(measurement: Measurement, encoding: DirectionEncoding) -> FieldSpec {
    let quantize = match encoding {
        DirectionEncoding::Compass16 => Quantize::Compass,
        DirectionEncoding::Degrees => Quantize::Angle {
            scale: 1.0,
            modulus: 360,
        },
        DirectionEncoding::DeciDegrees => Quantize::Angle {
            scale: 10.0,
            modulus: 3600,
        },
    };
    FieldSpec {
        measurement,
        width: encoding.width(),
        quantize,
    }
}

/// Canonical field order for a direction encoding.
pub fn layout(encoding: DirectionEncoding) -> Vec<FieldSpec> {
    vec![
        linear(Measurement::WindSpeedAvg, 1, 0.0, 1.0),
        linear(Measurement::WindSpeedMax, 1, 0.0, 1.0),
        direction(Measurement::WindDirAvg, encoding),
        direction(Measurement::WindDirMax, encoding),
        linear(Measurement::Humidity, 1, 0.0, 1.0),
        linear(Measurement::Temperature, 2, -50.0, 100.0),
        linear(Measurement::Pressure, 2, 400.0, 10.0),
        linear(Measurement::Battery, 2, 0.0, 1.0),
    ]
}

/// `sum(bytes) mod 256`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

// ─── Frame ───────────────────────────────────────────────────────────────────

/// Encoded uplink record. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryFrame(Bytes);

impl TelemetryFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// Uppercase hex, as shown in logs.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl AsRef<[u8]> for TelemetryFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Per-field values recovered from a frame; `None` for sentinels or
/// fields cut off by truncation.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    values: Vec<(Measurement, Option<f64>)>,
}

impl DecodedFrame {
    pub fn get(&self, m: Measurement) -> Option<f64> {
        self.values
            .iter()
            .find(|(field, _)| *field == m)
            .and_then(|(_, v)| *v)
    }

    pub fn fields(&self) -> &[(Measurement, Option<f64>)] {
        &self.values
    }
}

// ─── Codec ───────────────────────────────────────────────────────────────────

/// Packs [`Telemetry`] into fixed-length frames.
#[derive(Debug, Clone)]
pub struct TelemetryCodec {
    config: FrameConfig,
    fields: Vec<FieldSpec>,
}

impl TelemetryCodec {
    pub fn new(config: FrameConfig) -> Result<Self, FrameError> {
        // Text frames need the header byte plus at least one character.
        let min_len = 2;
        if config.length < min_len {
            return Err(FrameError::InvalidConfig(format!(
                "frame length {} is below the minimum of {min_len}",
                config.length
            )));
        }
        let fields = layout(config.direction);
        Ok(TelemetryCodec { config, fields })
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Bytes available for field data.
    fn payload_len(&self) -> usize {
        if self.config.checksum {
            self.config.length - 1
        } else {
            self.config.length
        }
    }

    /// Encode a reading. Always returns exactly `config.length` bytes.
    pub fn encode(&self, telemetry: &Telemetry) -> TelemetryFrame {
        let mut buf = BytesMut::with_capacity(self.config.length.max(16));
        let mut unknown = 0usize;

        for field in &self.fields {
            let value = telemetry.get(field.measurement);
            let q = field.quantize(value);
            if q == field.sentinel() {
                unknown += 1;
            }
            match field.width {
                1 => buf.put_u8(q as u8),
                _ => buf.put_u16(q),
            }
        }

        let payload_len = self.payload_len();
        if buf.len() > payload_len {
            buf.truncate(payload_len);
        } else {
            buf.put_bytes(self.config.filler, payload_len - buf.len());
        }
        if self.config.checksum {
            let sum = checksum(&buf);
            buf.put_u8(sum);
        }

        if unknown > 0 {
            tracing::debug!(unknown, "telemetry fields encoded as sentinel");
        }
        TelemetryFrame(buf.freeze())
    }

    /// Encode one keyed text frame: header byte, then up to `length - 1`
    /// characters, then filler. Non-ASCII characters are sent as `?`.
    pub fn encode_text(&self, key: TextKey, text: &str, append: bool) -> TelemetryFrame {
        let len = self.config.length;
        let mut buf = BytesMut::with_capacity(len);
        buf.put_u8(key.header(append));
        for c in text.chars().take(len - 1) {
            buf.put_u8(if c.is_ascii() { c as u8 } else { b'?' });
        }
        buf.put_bytes(self.config.filler, len - buf.len());
        TelemetryFrame(buf.freeze())
    }

    /// A write frame for the first `length - 1` characters, then append
    /// frames for the rest.
    pub fn encode_text_frames(&self, key: TextKey, text: &str) -> Vec<TelemetryFrame> {
        let chars: Vec<char> = text.chars().collect();
        let per_frame = self.config.length - 1;
        if chars.is_empty() {
            return vec![self.encode_text(key, "", false)];
        }
        chars
            .chunks(per_frame)
            .enumerate()
            .map(|(i, chunk)| {
                let piece: String = chunk.iter().collect();
                self.encode_text(key, &piece, i > 0)
            })
            .collect()
    }

    /// Decode a frame produced with the same configuration.
    pub fn decode(&self, frame: &[u8]) -> Result<DecodedFrame, FrameError> {
        if frame.len() != self.config.length {
            return Err(FrameError::WrongLength {
                expected: self.config.length,
                actual: frame.len(),
            });
        }
        let payload = &frame[..self.payload_len()];
        if self.config.checksum {
            let found = frame[frame.len() - 1];
            let computed = checksum(payload);
            if found != computed {
                return Err(FrameError::Checksum { found, computed });
            }
        }

        let mut values = Vec::with_capacity(self.fields.len());
        let mut pos = 0usize;
        for field in &self.fields {
            let value = payload.get(pos..pos + field.width).and_then(|raw| {
                let q = match raw {
                    [b] => *b as u16,
                    [hi, lo] => u16::from_be_bytes([*hi, *lo]),
                    _ => return None,
                };
                field.dequantize(q)
            });
            values.push((field.measurement, value));
            pos += field.width;
        }
        Ok(DecodedFrame { values })
    }
}

impl Default for TelemetryCodec {
    fn default() -> Self {
        TelemetryCodec {
            config: FrameConfig::default(),
            fields: layout(DirectionEncoding::default()),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
