use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::command::BridgeCommand;
use crate::error::{FrameError, ParseError, Result};
use crate::format::WireFormat;
use crate::payload::{RCPayload, PAYLOAD_SIZE};

/// Decimal places used for floats in the host-facing CSV form.
pub const DEFAULT_FLOAT_PRECISION: usize = 2;

/// Longest text line kept while waiting for a newline.
pub const DEFAULT_MAX_LINE_LEN: usize = 1024;

/// Number of fields in a CSV frame.
pub const CSV_FIELDS: usize = 10;

/// Encode a payload into its packed binary form.
///
/// Wire format (little-endian, no padding):
/// ```text
/// ┌─────┬─────┬─────┬─────┬────────┬────────┬────────┬────────┬────────┬───────┐
/// │ id1 │ id2 │ id3 │ id4 │ value1 │ value2 │ value3 │ value4 │ value5 │ flags │
/// │ u8  │ u8  │ u8  │ u8  │ f32 LE │ f32 LE │ f32 LE │ f32 LE │ f32 LE │ u8    │
/// └─────┴─────┴─────┴─────┴────────┴────────┴────────┴────────┴────────┴───────┘
/// ```
pub fn encode_binary(payload: &RCPayload) -> [u8; PAYLOAD_SIZE] {
    let mut out = [0u8; PAYLOAD_SIZE];
    let mut dst = &mut out[..];
    for id in payload.ids() {
        dst.put_u8(id);
    }
    for value in payload.values() {
        dst.put_f32_le(value);
    }
    dst.put_u8(payload.flags);
    out
}

/// Decode a packed binary frame. Fails unless `src` is exactly 25 bytes.
pub fn decode_binary(mut src: &[u8]) -> Result<RCPayload> {
    if src.len() != PAYLOAD_SIZE {
        return Err(FrameError::InvalidLength {
            expected: PAYLOAD_SIZE,
            actual: src.len(),
        });
    }

    let ids = [src.get_u8(), src.get_u8(), src.get_u8(), src.get_u8()];
    let values = [
        src.get_f32_le(),
        src.get_f32_le(),
        src.get_f32_le(),
        src.get_f32_le(),
        src.get_f32_le(),
    ];
    let flags = src.get_u8();
    Ok(RCPayload::new(ids, values, flags))
}

/// Format a float at fixed precision, printing negative zero as zero.
pub fn format_float(value: f32, decimals: usize) -> String {
    let mut text = format!("{value:.decimals$}");
    if text.starts_with('-') && text[1..].chars().all(|c| c == '0' || c == '.') {
        text.remove(0);
    }
    text
}

/// Encode a payload as a CSV line (without the trailing newline).
pub fn encode_csv(payload: &RCPayload) -> String {
    encode_csv_with_precision(payload, DEFAULT_FLOAT_PRECISION)
}

/// Encode a payload as a CSV line with an explicit float precision.
pub fn encode_csv_with_precision(payload: &RCPayload, decimals: usize) -> String {
    let mut fields: Vec<String> = Vec::with_capacity(CSV_FIELDS);
    fields.extend(payload.ids().iter().map(u8::to_string));
    fields.extend(payload.values().iter().map(|v| format_float(*v, decimals)));
    fields.push(payload.flags.to_string());
    fields.join(",")
}

/// Decode a CSV line: `id1,id2,id3,id4,value1..value5,flags`.
pub fn decode_csv(line: &str) -> std::result::Result<RCPayload, ParseError> {
    let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    if fields.len() != CSV_FIELDS {
        return Err(ParseError::FieldCount(fields.len()));
    }

    let byte_at = |index: usize| -> std::result::Result<u8, ParseError> {
        fields[index]
            .parse::<u8>()
            .map_err(|_| ParseError::InvalidByte {
                index,
                text: fields[index].to_string(),
            })
    };
    let float_at = |index: usize| -> std::result::Result<f32, ParseError> {
        match fields[index].parse::<f32>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(ParseError::InvalidFloat {
                index,
                text: fields[index].to_string(),
            }),
        }
    };

    let ids = [byte_at(0)?, byte_at(1)?, byte_at(2)?, byte_at(3)?];
    let values = [
        float_at(4)?,
        float_at(5)?,
        float_at(6)?,
        float_at(7)?,
        float_at(8)?,
    ];
    let flags = byte_at(9)?;
    Ok(RCPayload::new(ids, values, flags))
}

/// Render a payload in the given outbound wire format, newline-terminated
/// for the text forms.
pub fn encode_wire(payload: &RCPayload, format: WireFormat, decimals: usize) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(96);
    match format {
        WireFormat::Binary => dst.put_slice(&encode_binary(payload)),
        WireFormat::Csv => {
            dst.put_slice(encode_csv_with_precision(payload, decimals).as_bytes());
            dst.put_u8(b'\n');
        }
        WireFormat::Json => {
            let line = BridgeCommand::data(payload).to_line()?;
            dst.put_slice(line.as_bytes());
            dst.put_u8(b'\n');
        }
    }
    Ok(dst.freeze())
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Longest text line buffered before it is discarded. Default: 1024.
    pub max_line_len: usize,
    /// Decimal places for CSV floats. Default: 2.
    pub float_precision: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_line_len: DEFAULT_MAX_LINE_LEN,
            float_precision: DEFAULT_FLOAT_PRECISION,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RCPayload {
        RCPayload::new([12, 1, 0, 200], [35.0, 0.0, 0.85, 0.0, 1.0], 1)
    }

    #[test]
    fn binary_layout_is_little_endian() {
        let wire = encode_binary(&sample());
        assert_eq!(wire.len(), PAYLOAD_SIZE);
        assert_eq!(&wire[..4], &[12, 1, 0, 200]);
        assert_eq!(&wire[4..8], &35.0f32.to_le_bytes());
        assert_eq!(&wire[12..16], &0.85f32.to_le_bytes());
        assert_eq!(wire[24], 1);
    }

    #[test]
    fn binary_roundtrip_is_exact() {
        let payload = RCPayload::new([255, 0, 7, 128], [-1.5, 1e-7, f32::MAX, -0.0, 3.25], 0xff);
        let decoded = decode_binary(&encode_binary(&payload)).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn decode_binary_rejects_wrong_length() {
        let err = decode_binary(&[0u8; 24]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidLength {
                expected: 25,
                actual: 24
            }
        ));
        assert!(decode_binary(&[0u8; 26]).is_err());
    }

    #[test]
    fn csv_matches_host_form() {
        assert_eq!(encode_csv(&sample()), "12,1,0,200,35.00,0.00,0.85,0.00,1.00,1");
    }

    #[test]
    fn csv_normalizes_negative_zero() {
        let payload = RCPayload::new([0; 4], [-0.0, -0.001, -0.004, 0.0, -1.0], 0);
        assert_eq!(encode_csv(&payload), "0,0,0,0,0.00,0.00,0.00,0.00,-1.00,0");
        assert_eq!(format_float(-0.4, 0), "0");
    }

    #[test]
    fn csv_roundtrip_within_precision() {
        let payload = RCPayload::new([9, 8, 7, 6], [1.234, -5.678, 100.0, 0.005, 42.424], 6);
        let decoded = decode_csv(&encode_csv(&payload)).unwrap();
        assert_eq!(decoded.ids(), payload.ids());
        assert_eq!(decoded.flags, payload.flags);
        for (got, want) in decoded.values().iter().zip(payload.values()) {
            assert!((got - want).abs() <= 0.005 + f32::EPSILON, "{got} vs {want}");
        }
    }

    #[test]
    fn decode_csv_tolerates_whitespace_and_cr() {
        let payload = decode_csv(" 1, 2,3,4,1.5,2,3,4,5,9\r").unwrap();
        assert_eq!(payload.ids(), [1, 2, 3, 4]);
        assert_eq!(payload.value1, 1.5);
        assert_eq!(payload.flags, 9);
    }

    #[test]
    fn decode_csv_rejects_bad_arity() {
        assert!(matches!(
            decode_csv("1,2,3"),
            Err(ParseError::FieldCount(3))
        ));
        assert!(matches!(
            decode_csv("1,2,3,4,1,2,3,4,5,6,7"),
            Err(ParseError::FieldCount(11))
        ));
    }

    #[test]
    fn decode_csv_rejects_out_of_range_bytes() {
        assert!(matches!(
            decode_csv("256,0,0,0,0,0,0,0,0,0"),
            Err(ParseError::InvalidByte { index: 0, .. })
        ));
        assert!(matches!(
            decode_csv("0,0,0,-1,0,0,0,0,0,0"),
            Err(ParseError::InvalidByte { index: 3, .. })
        ));
        assert!(matches!(
            decode_csv("0,0,0,0,0,0,0,0,0,1.5"),
            Err(ParseError::InvalidByte { index: 9, .. })
        ));
    }

    #[test]
    fn decode_csv_rejects_non_finite_floats() {
        assert!(matches!(
            decode_csv("0,0,0,0,nan,0,0,0,0,0"),
            Err(ParseError::InvalidFloat { index: 4, .. })
        ));
        assert!(matches!(
            decode_csv("0,0,0,0,0,0,0,0,inf,0"),
            Err(ParseError::InvalidFloat { index: 8, .. })
        ));
        assert!(matches!(
            decode_csv("0,0,0,0,0,abc,0,0,0,0"),
            Err(ParseError::InvalidFloat { index: 5, .. })
        ));
    }

    #[test]
    fn encode_wire_forms() {
        let binary = encode_wire(&sample(), WireFormat::Binary, 2).unwrap();
        assert_eq!(binary.len(), PAYLOAD_SIZE);

        let csv = encode_wire(&sample(), WireFormat::Csv, 2).unwrap();
        assert_eq!(csv.as_ref(), b"12,1,0,200,35.00,0.00,0.85,0.00,1.00,1\n");

        let json = encode_wire(&sample(), WireFormat::Json, 2).unwrap();
        let text = std::str::from_utf8(&json).unwrap();
        assert!(text.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(value["cmd"], "data");
        assert_eq!(value["id4"], 200);
        assert_eq!(value["v1"], 35.0);
    }
}
