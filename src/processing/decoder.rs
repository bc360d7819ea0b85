// src/processing/decoder.rs
//! Text frame decoder
//!
//! Sensor notifications are UTF-8 text such as `"EMG:350mv"`. The magnitude is
//! the first maximal run of ASCII decimal digits in the text; nothing else in
//! the frame is interpreted.

use crate::link::RawFrame;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-frame decode failure. Never fatal; surfaces as a `DecodeError` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum DecodeError {
    #[error("frame is not valid UTF-8 text")]
    NotText,
    #[error("frame contains no decimal digits")]
    NoDigits,
    #[error("digit run could not be parsed as a magnitude")]
    ParseFailed,
}

/// Result of decoding one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reading {
    /// Non-negative EMG magnitude
    Value(u64),
    /// Frame could not be turned into a magnitude
    Failed(DecodeError),
}

impl Reading {
    pub fn value(&self) -> Option<u64> {
        match self {
            Reading::Value(v) => Some(*v),
            Reading::Failed(_) => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Reading::Failed(_))
    }
}

impl From<Result<u64, DecodeError>> for Reading {
    fn from(result: Result<u64, DecodeError>) -> Self {
        match result {
            Ok(v) => Reading::Value(v),
            Err(e) => Reading::Failed(e),
        }
    }
}

/// A decoded frame together with the text shown in the session history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Display form of the frame: the received text with trailing `\r`/`\n`
    /// removed and invalid UTF-8 replaced. Not a byte-exact copy of the payload.
    pub display: String,
    pub reading: Reading,
}

/// Decode raw bytes into a magnitude.
pub fn decode(bytes: &[u8]) -> Reading {
    decode_bytes(bytes).into()
}

fn decode_bytes(bytes: &[u8]) -> Result<u64, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::NotText)?;
    let digits = first_digit_run(text).ok_or(DecodeError::NoDigits)?;
    digits.parse::<u64>().map_err(|_| DecodeError::ParseFailed)
}

/// First maximal run of ASCII digits in `text`
pub fn first_digit_run(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let len = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..len])
}

/// Decode a frame and keep its display text for the history list.
pub fn decode_frame(frame: &RawFrame) -> DecodedFrame {
    let reading = decode(frame.payload());
    let text = String::from_utf8_lossy(frame.payload())
        .trim_end_matches(['\r', '\n'])
        .to_string();

    if let Reading::Failed(error) = reading {
        tracing::debug!(%error, frame = %text, "frame decode failed");
    }

    DecodedFrame { display: text, reading }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_prefixed_frame() {
        assert_eq!(decode(b"EMG:350mv"), Reading::Value(350));
    }

    #[test]
    fn test_decode_bare_number() {
        assert_eq!(decode(b"412"), Reading::Value(412));
        assert_eq!(decode(b"0"), Reading::Value(0));
    }

    #[test]
    fn test_first_run_wins() {
        assert_eq!(decode(b"a12b345"), Reading::Value(12));
        assert_eq!(decode(b"  007 / 999"), Reading::Value(7));
    }

    #[test]
    fn test_no_digits() {
        assert_eq!(decode(b"xyz"), Reading::Failed(DecodeError::NoDigits));
        assert_eq!(decode(b""), Reading::Failed(DecodeError::NoDigits));
    }

    #[test]
    fn test_not_text() {
        assert_eq!(decode(&[0xff, 0xfe, b'3']), Reading::Failed(DecodeError::NotText));
    }

    #[test]
    fn test_overflow_is_parse_failure() {
        assert_eq!(
            decode(b"v=99999999999999999999999"),
            Reading::Failed(DecodeError::ParseFailed)
        );
    }

    #[test]
    fn test_non_ascii_digits_are_not_digits() {
        // Arabic-Indic digits are not part of the frame encoding
        assert_eq!(decode("٣٥٠".as_bytes()), Reading::Failed(DecodeError::NoDigits));
    }

    #[test]
    fn test_decode_frame_display() {
        let frame = RawFrame::new(b"EMG:301\r\n".to_vec());
        let decoded = decode_frame(&frame);
        assert_eq!(decoded.display, "EMG:301");
        assert_eq!(decoded.reading, Reading::Value(301));

        let frame = RawFrame::new(vec![0xc3, 0x28]);
        let decoded = decode_frame(&frame);
        assert_eq!(decoded.reading, Reading::Failed(DecodeError::NotText));
        assert!(!decoded.display.is_empty());

        // Only trailing line terminators are dropped
        let decoded = decode_frame(&RawFrame::from(" xyz \r\n"));
        assert_eq!(decoded.display, " xyz ");
        assert_eq!(decoded.reading, Reading::Failed(DecodeError::NoDigits));
    }

    proptest! {
        #[test]
        fn prop_no_digits_never_decodes(s in "[^0-9]*") {
            prop_assert!(decode(s.as_bytes()).is_failure());
        }

        #[test]
        fn prop_first_run_350(prefix in "[^0-9]{0,12}", suffix in "([^0-9][ -~]{0,12})?") {
            let text = format!("{prefix}350{suffix}");
            prop_assert_eq!(decode(text.as_bytes()), Reading::Value(350));
        }

        #[test]
        fn prop_decode_is_deterministic(bytes in proptest::collection::vec(any::<u8>(), 0..32)) {
            prop_assert_eq!(decode(&bytes), decode(&bytes));
        }
    }
}
