//! Custom error types for the capture subsystem.
//!
//! `CaptureError` is the crate-wide error type. The line parser adds two
//! narrower types so callers can tell a silent or unplugged device apart
//! from one that sent garbage:
//!
//! - **`LineError::Io`**: the link failed or timed out mid-line. The capture
//!   loop treats this as a lost device and reconnects.
//! - **`LineError::Framing`**: a line overran the buffer cap. Recoverable,
//!   the connection is presumed healthy.
//! - **`ParseError`**: a complete line whose text is not a number.
//!
//! None of these are fatal; see [`crate::error_recovery`] for how each one
//! is absorbed.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type CaptureResult<T> = std::result::Result<T, CaptureError>;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Failed to open serial port '{port}': {reason}")]
    Open { port: String, reason: String },

    #[error("Serial port enumeration failed: {0}")]
    Enumeration(String),

    #[error("Serial port not connected")]
    SerialPortNotConnected,

    #[error("Serial read timed out after {0:?}")]
    ReadTimeout(Duration),

    #[error("Unexpected EOF from serial port")]
    SerialUnexpectedEof,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Capture session is already active")]
    AlreadyActive,

    #[error("Capture thread panicked")]
    CaptureThreadPanicked,

    #[cfg(feature = "storage_csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Feature '{0}' not enabled. Rebuild with --features {0}")]
    FeatureNotEnabled(String),
}

impl From<figment::Error> for CaptureError {
    fn from(err: figment::Error) -> Self {
        CaptureError::Config(Box::new(err))
    }
}

/// Failure reading one line from the device.
#[derive(Error, Debug)]
pub enum LineError {
    #[error("serial link failed mid-line: {0}")]
    Io(#[source] CaptureError),

    #[error("line exceeded {limit} bytes without a terminator")]
    Framing { limit: usize },
}

impl LineError {
    /// True when the device should be considered lost.
    pub fn is_link_failure(&self) -> bool {
        matches!(self, LineError::Io(_))
    }
}

/// A complete line whose payload is not a number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed sample text {text:?}")]
pub struct ParseError {
    pub text: String,
}
