//! Line framing and sample decoding.
//!
//! The load cell prints one ASCII number per line, terminated by CR LF.
//! A line ends at CR (13); LF (10) is skipped wherever it appears. Text is
//! parsed with `str::parse::<f32>`, which does not depend on the locale.

use crate::error::{CaptureResult, LineError, ParseError};

/// Maximum payload bytes accepted before a line counts as a framing error.
pub const MAX_LINE_LEN: usize = 128;

/// Returned by [`LineReader::read_line`] when a complete line is not a number.
pub const MALFORMED_SAMPLE: f32 = f32::NAN;

const CR: u8 = 13;
const LF: u8 = 10;

/// Anything that can hand out one byte at a time.
pub trait ByteSource {
    /// Read the next byte, blocking at most one read timeout.
    fn read_raw_byte(&self) -> CaptureResult<u8>;
}

/// Parse the text of one line.
pub fn parse_sample(text: &str) -> Result<f32, ParseError> {
    text.trim().parse::<f32>().map_err(|_| ParseError {
        text: text.to_string(),
    })
}

/// Reads CR-terminated lines and decodes them.
///
/// An overlong line leaves the reader discarding: the next call first skips
/// the remainder of that line up to its CR, so a fragment of it is never
/// decoded as a sample. Every call reads a bounded number of bytes.
#[derive(Debug, Default)]
pub struct LineReader {
    discarding: bool,
}

impl LineReader {
    /// Reader positioned at the start of a line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget any partial line, e.g. after the link was reopened.
    pub fn reset(&mut self) {
        self.discarding = false;
    }

    /// Whether the tail of an overlong line is still being skipped.
    pub fn is_discarding(&self) -> bool {
        self.discarding
    }

    /// Read one line and decode it.
    ///
    /// Malformed or empty text yields `Ok(MALFORMED_SAMPLE)`. An overlong
    /// line returns [`LineError::Framing`] as soon as the cap is exceeded,
    /// and any read failure returns [`LineError::Io`] immediately.
    pub fn read_line<S: ByteSource + ?Sized>(&mut self, source: &S) -> Result<f32, LineError> {
        if self.discarding {
            self.skip_rest_of_line(source)?;
        }

        let mut buffer: Vec<u8> = Vec::with_capacity(MAX_LINE_LEN);
        loop {
            let byte = source.read_raw_byte().map_err(LineError::Io)?;
            match byte {
                CR => break,
                LF => continue,
                _ if buffer.len() == MAX_LINE_LEN => {
                    self.discarding = true;
                    return Err(LineError::Framing {
                        limit: MAX_LINE_LEN,
                    });
                }
                _ => buffer.push(byte),
            }
        }

        let text = String::from_utf8_lossy(&buffer);
        Ok(parse_sample(&text).unwrap_or(MALFORMED_SAMPLE))
    }

    fn skip_rest_of_line<S: ByteSource + ?Sized>(&mut self, source: &S) -> Result<(), LineError> {
        for _ in 0..=MAX_LINE_LEN {
            if source.read_raw_byte().map_err(LineError::Io)? == CR {
                self.discarding = false;
                return Ok(());
            }
        }
        Err(LineError::Framing {
            limit: MAX_LINE_LEN,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureError;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Feeds scripted bytes, then times out.
    struct Script {
        bytes: RefCell<VecDeque<u8>>,
    }

    impl Script {
        fn new(bytes: &[u8]) -> Self {
            Self {
                bytes: RefCell::new(bytes.iter().copied().collect()),
            }
        }

        fn remaining(&self) -> usize {
            self.bytes.borrow().len()
        }
    }

    impl ByteSource for Script {
        fn read_raw_byte(&self) -> CaptureResult<u8> {
            self.bytes
                .borrow_mut()
                .pop_front()
                .ok_or(CaptureError::ReadTimeout(Duration::from_millis(200)))
        }
    }

    fn read_line(script: &Script) -> Result<f32, LineError> {
        LineReader::new().read_line(script)
    }

    #[test]
    fn test_reads_simple_value() {
        let script = Script::new(b"1.25\r");
        assert_eq!(read_line(&script).unwrap(), 1.25);
    }

    #[test]
    fn test_consecutive_lines_with_crlf() {
        let script = Script::new(b"10.5\r\n-3\r\n\n0\r");
        assert_eq!(read_line(&script).unwrap(), 10.5);
        assert_eq!(read_line(&script).unwrap(), -3.0);
        assert_eq!(read_line(&script).unwrap(), 0.0);
    }

    #[test]
    fn test_line_feeds_inside_payload_are_stripped() {
        let script = Script::new(b"4\n2.\n5\r");
        assert_eq!(read_line(&script).unwrap(), 42.5);
    }

    #[test]
    fn test_valid_zero_is_not_malformed() {
        let script = Script::new(b"0.0\r");
        let value = read_line(&script).unwrap();
        assert_eq!(value, 0.0);
        assert!(!value.is_nan());
    }

    #[test]
    fn test_scientific_notation_and_whitespace() {
        let script = Script::new(b" 1.5e2 \r");
        assert_eq!(read_line(&script).unwrap(), 150.0);
    }

    #[test]
    fn test_non_numeric_payloads_yield_sentinel() {
        for payload in [&b"abc"[..], b"1,25", b"--1", b"", b"12abc", b"\xff\xfe"] {
            let mut bytes = payload.to_vec();
            bytes.push(CR);
            let script = Script::new(&bytes);
            let value = read_line(&script).unwrap();
            assert!(value.is_nan(), "payload {:?} gave {}", payload, value);
        }
    }

    #[test]
    fn test_payload_at_cap_still_parses() {
        let mut bytes = vec![b'0'; MAX_LINE_LEN - 1];
        bytes.push(b'7');
        bytes.push(CR);
        let script = Script::new(&bytes);
        assert_eq!(read_line(&script).unwrap(), 7.0);
    }

    #[test]
    fn test_overlong_line_is_framing_error() {
        let bytes = vec![b'9'; MAX_LINE_LEN + 40];
        let script = Script::new(&bytes);

        let mut reader = LineReader::new();

        let err = reader.read_line(&script).unwrap_err();
        assert!(matches!(err, LineError::Framing { limit: MAX_LINE_LEN }));
        assert_eq!(script.remaining(), 40 - 1, "stops at the first excess byte");
        assert!(reader.is_discarding());
    }

    #[test]
    fn test_tail_of_overlong_line_is_not_a_sample() {
        let mut bytes = vec![b'1'; MAX_LINE_LEN + 2];
        bytes.extend_from_slice(b"\r2\r");
        let script = Script::new(&bytes);
        let mut reader = LineReader::new();

        assert!(matches!(
            reader.read_line(&script),
            Err(LineError::Framing { .. })
        ));
        assert_eq!(reader.read_line(&script).unwrap(), 2.0);
        assert!(!reader.is_discarding());
        assert_eq!(script.remaining(), 0);
    }

    #[test]
    fn test_repeated_overlong_lines_never_decode() {
        let mut line = vec![b'1'; MAX_LINE_LEN + 2];
        line.extend_from_slice(b"\r\n");
        let bytes: Vec<u8> = line.iter().copied().cycle().take(line.len() * 5).collect();
        let script = Script::new(&bytes);
        let mut reader = LineReader::new();

        for _ in 0..4 {
            assert!(matches!(
                reader.read_line(&script),
                Err(LineError::Framing { .. })
            ));
        }
    }

    #[test]
    fn test_discarding_is_bounded_without_terminator() {
        let script = Script::new(&vec![b'7'; 3 * (MAX_LINE_LEN + 1)]);
        let mut reader = LineReader::new();

        assert!(reader.read_line(&script).is_err());
        let before = script.remaining();
        assert!(matches!(
            reader.read_line(&script),
            Err(LineError::Framing { .. })
        ));
        assert_eq!(before - script.remaining(), MAX_LINE_LEN + 1);
        assert!(reader.is_discarding());
    }

    #[test]
    fn test_io_error_while_discarding_is_reported() {
        let script = Script::new(&[b'3'; MAX_LINE_LEN + 5]);
        let mut reader = LineReader::new();

        assert!(reader.read_line(&script).is_err());
        let err = reader.read_line(&script).unwrap_err();
        assert!(err.is_link_failure());

        reader.reset();
        assert!(!reader.is_discarding());
    }

    #[test]
    fn test_timeout_mid_line_is_io_error() {
        let script = Script::new(b"12.");
        let err = read_line(&script).unwrap_err();
        assert!(err.is_link_failure());
    }

    #[test]
    fn test_parse_sample_reports_text() {
        assert_eq!(parse_sample("2.5").unwrap(), 2.5);
        assert_eq!(
            parse_sample("oops").unwrap_err(),
            ParseError {
                text: "oops".to_string()
            }
        );
    }
}
