//! Capability traits for serial hardware access.
//!
//! The capture loop and line parser only ever see these traits, so they run
//! unchanged against [`super::serial::SystemSerial`] or the in-memory
//! [`super::mock::MockDevice`].

use crate::error::CaptureResult;
use std::time::Duration;

/// One serial device as reported by the operating system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    /// Human-readable device name, e.g. "USB Serial Device (COM3)"
    pub name: String,
    /// OS port name, e.g. "COM3" or "/dev/ttyACM0"
    pub port_name: String,
    /// USB vendor id, when known
    pub vid: Option<u16>,
    /// USB product id, when known
    pub pid: Option<u16>,
}

impl PortDescriptor {
    /// Descriptor without USB ids.
    pub fn new(name: impl Into<String>, port_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port_name: port_name.into(),
            vid: None,
            pid: None,
        }
    }
}

/// Read/write timeout constants applied on open.
///
/// Total read time for `n` bytes is bounded by
/// `read_total_constant + n * read_total_multiplier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialTimeouts {
    /// Maximum gap between two received bytes
    pub read_interval: Duration,
    /// Fixed part of the total read timeout
    pub read_total_constant: Duration,
    /// Per-byte part of the total read timeout
    pub read_total_multiplier: Duration,
    /// Fixed part of the total write timeout
    pub write_total_constant: Duration,
    /// Per-byte part of the total write timeout
    pub write_total_multiplier: Duration,
}

impl Default for SerialTimeouts {
    fn default() -> Self {
        Self {
            read_interval: Duration::from_millis(100),
            read_total_constant: Duration::from_millis(100),
            read_total_multiplier: Duration::from_millis(100),
            write_total_constant: Duration::from_millis(100),
            write_total_multiplier: Duration::from_millis(20),
        }
    }
}

impl SerialTimeouts {
    /// Upper bound for a read of `bytes` bytes.
    pub fn read_timeout(&self, bytes: u32) -> Duration {
        self.read_total_constant + self.read_total_multiplier * bytes
    }
}

/// Parity modes for serial communication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialParity {
    None,
    Even,
    Odd,
}

/// Line parameters for opening a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkParams {
    /// Baud rate (9600, 115200, etc.)
    pub baud_rate: u32,
    /// Data bits (7 or 8)
    pub data_bits: u8,
    /// Stop bits (1 or 2)
    pub stop_bits: u8,
    /// Parity setting
    pub parity: SerialParity,
    /// Timeout constants
    pub timeouts: SerialTimeouts,
}

impl LinkParams {
    /// 8N1 at `baud_rate` with the default timeouts.
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
            timeouts: SerialTimeouts::default(),
        }
    }

    /// Bound on a single-byte read.
    pub fn byte_timeout(&self) -> Duration {
        self.timeouts.read_timeout(1)
    }
}

/// Lists serial devices currently present.
pub trait PortEnumerator: Send + Sync {
    fn enumerate(&self) -> CaptureResult<Vec<PortDescriptor>>;
}

/// Opens an exclusive, read-only link to a port.
pub trait SerialOpener: Send + Sync {
    fn open(&self, port: &str, params: &LinkParams) -> CaptureResult<Box<dyn SerialLink>>;
}

/// An open device handle. Dropping it closes the port.
pub trait SerialLink: Send {
    /// Read one byte, blocking at most the link's read timeout.
    fn read_byte(&mut self) -> CaptureResult<u8>;
}

/// Everything the capture loop needs from the platform.
pub trait SerialBackend: PortEnumerator + SerialOpener {}

impl<T: PortEnumerator + SerialOpener> SerialBackend for T {}
