//! Property-based tests for the telemetry uplink frame.
//!
//! Frame length must never depend on the input, and a failed sensor must
//! always come out as its sentinel rather than a clamped number.

use balise_codec::frame::{
    checksum, layout, DirectionEncoding, FrameConfig, TelemetryCodec, TextKey, DEFAULT_FILLER,
};
use balise_common::models::{Measurement, Telemetry};
use proptest::prelude::*;

// ─── Strategies ──────────────────────────────────────────────────────────────

/// Any f64 a misbehaving sensor might hand over, including NaN/inf.
fn any_reading() -> impl Strategy<Value = f64> {
    prop_oneof![
        -1.0e6f64..1.0e6,
        -100.0f64..400.0,
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
        Just(0.0),
    ]
}

fn any_telemetry() -> impl Strategy<Value = Telemetry> {
    proptest::collection::vec(any_reading(), 9).prop_map(|v| Telemetry {
        timestamp: "12h00".into(),
        temperature_c: v[0],
        humidity_pct: v[1],
        pressure_hpa: v[2],
        cloud_base_m: v[3],
        wind_speed_avg_kmh: v[4],
        wind_speed_max_kmh: v[5],
        wind_dir_avg_deg: v[6],
        wind_dir_max_deg: v[7],
        battery_mv: v[8],
    })
}

fn any_config() -> impl Strategy<Value = FrameConfig> {
    (
        2usize..32,
        any::<bool>(),
        any::<u8>(),
        prop_oneof![
            Just(DirectionEncoding::Compass16),
            Just(DirectionEncoding::Degrees),
            Just(DirectionEncoding::DeciDegrees),
        ],
    )
        .prop_map(|(length, checksum, filler, direction)| FrameConfig {
            length,
            checksum,
            filler,
            direction,
        })
}

/// Set exactly one field out of its domain.
fn corrupt(mut t: Telemetry, m: Measurement) -> Telemetry {
    let bad = m.range().max + 1000.0;
    match m {
        Measurement::Temperature => t.temperature_c = bad,
        Measurement::Humidity => t.humidity_pct = bad,
        Measurement::Pressure => t.pressure_hpa = bad,
        Measurement::CloudBase => t.cloud_base_m = bad,
        Measurement::WindSpeedAvg => t.wind_speed_avg_kmh = bad,
        Measurement::WindSpeedMax => t.wind_speed_max_kmh = bad,
        Measurement::WindDirAvg => t.wind_dir_avg_deg = bad,
        Measurement::WindDirMax => t.wind_dir_max_deg = bad,
        Measurement::Battery => t.battery_mv = bad,
    }
    t
}

fn nominal() -> Telemetry {
    Telemetry {
        timestamp: "12h00".into(),
        temperature_c: 4.5,
        humidity_pct: 64.0,
        pressure_hpa: 842.3,
        cloud_base_m: 1200.0,
        wind_speed_avg_kmh: 22.0,
        wind_speed_max_kmh: 41.0,
        wind_dir_avg_deg: 180.0,
        wind_dir_max_deg: 200.0,
        battery_mv: 12_100.0,
    }
}

proptest! {
    #[test]
    fn frame_length_is_constant(t in any_telemetry(), cfg in any_config()) {
        let codec = TelemetryCodec::new(cfg.clone()).unwrap();
        let frame = codec.encode(&t);
        prop_assert_eq!(frame.len(), cfg.length);
    }

    #[test]
    fn checksum_is_last_byte(t in any_telemetry(), cfg in any_config()) {
        prop_assume!(cfg.checksum);
        let codec = TelemetryCodec::new(cfg).unwrap();
        let frame = codec.encode(&t);
        let b = frame.as_bytes();
        prop_assert_eq!(b[b.len() - 1], checksum(&b[..b.len() - 1]));
        prop_assert!(codec.decode(b).is_ok());
    }

    #[test]
    fn encoding_is_deterministic(t in any_telemetry()) {
        let codec = TelemetryCodec::default();
        prop_assert_eq!(codec.encode(&t), codec.encode(&t));
    }

    #[test]
    fn out_of_domain_field_is_sentinel(idx in 0usize..8, direction in prop_oneof![
        Just(DirectionEncoding::Compass16),
        Just(DirectionEncoding::Degrees),
        Just(DirectionEncoding::DeciDegrees),
    ]) {
        let fields = layout(direction);
        let total: usize = fields.iter().map(|f| f.width).sum();
        // Frame long enough to hold every field.
        let codec = TelemetryCodec::new(FrameConfig {
            length: total + 1,
            direction,
            ..FrameConfig::default()
        }).unwrap();

        let field = fields[idx];
        let offset: usize = fields[..idx].iter().map(|f| f.width).sum();
        let frame = codec.encode(&corrupt(nominal(), field.measurement));
        let raw = &frame.as_bytes()[offset..offset + field.width];
        prop_assert!(raw.iter().all(|b| *b == 0xFF), "field {} encoded as {:?}", field.measurement, raw);

        let decoded = codec.decode(frame.as_bytes()).unwrap();
        prop_assert_eq!(decoded.get(field.measurement), None);
    }

    #[test]
    fn in_domain_temperature_survives(temp in -49.9f64..99.9) {
        let codec = TelemetryCodec::default();
        let t = Telemetry { temperature_c: temp, ..nominal() };
        let decoded = codec.decode(codec.encode(&t).as_bytes()).unwrap();
        let back = decoded.get(Measurement::Temperature).unwrap();
        prop_assert!((back - temp).abs() <= 0.005 + 1e-9);
    }

    #[test]
    fn text_frames_reassemble(text in "[ -~]{0,60}", length in 2usize..32) {
        let codec = TelemetryCodec::new(FrameConfig { length, ..FrameConfig::default() }).unwrap();
        let frames = codec.encode_text_frames(TextKey::Site, &text);
        prop_assert_eq!(frames.len(), text.len().div_ceil(length - 1).max(1));
        prop_assert!(frames.iter().all(|f| f.len() == length));
        prop_assert_eq!(frames[0].as_bytes()[0], 100);
        prop_assert!(frames[1..].iter().all(|f| f.as_bytes()[0] == 150));

        let mut joined: Vec<u8> = frames.iter().flat_map(|f| f.as_bytes()[1..].to_vec()).collect();
        while joined.last() == Some(&DEFAULT_FILLER) {
            joined.pop();
        }
        prop_assert_eq!(joined, text.into_bytes());
    }
}
