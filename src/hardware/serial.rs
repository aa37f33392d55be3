//! `serialport`-backed implementation of the hardware capabilities.

use super::capabilities::{
    LinkParams, PortDescriptor, PortEnumerator, SerialLink, SerialOpener, SerialParity,
};
use crate::error::{CaptureError, CaptureResult};
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::io::Read;
use std::time::Duration;
use tracing::debug;

/// The platform's serial devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSerial;

impl SystemSerial {
    /// Create the system backend.
    pub fn new() -> Self {
        Self
    }
}

/// Human-readable name in the "Product (PORT)" shape Windows reports.
fn friendly_name(port_name: &str, product: Option<&str>) -> String {
    match product {
        Some(product) if product.contains(port_name) => product.to_string(),
        Some(product) => format!("{} ({})", product, port_name),
        None => port_name.to_string(),
    }
}

impl PortEnumerator for SystemSerial {
    fn enumerate(&self) -> CaptureResult<Vec<PortDescriptor>> {
        let ports = serialport::available_ports()
            .map_err(|e| CaptureError::Enumeration(e.to_string()))?;

        Ok(ports
            .into_iter()
            .map(|p| match p.port_type {
                SerialPortType::UsbPort(info) => {
                    let product = info.product.as_deref().or(info.manufacturer.as_deref());
                    PortDescriptor {
                        name: friendly_name(&p.port_name, product),
                        port_name: p.port_name,
                        vid: Some(info.vid),
                        pid: Some(info.pid),
                    }
                }
                _ => PortDescriptor::new(friendly_name(&p.port_name, None), p.port_name),
            })
            .collect())
    }
}

impl SerialOpener for SystemSerial {
    fn open(&self, port: &str, params: &LinkParams) -> CaptureResult<Box<dyn SerialLink>> {
        let data_bits = match params.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        };
        let stop_bits = if params.stop_bits == 2 {
            StopBits::Two
        } else {
            StopBits::One
        };
        let parity = match params.parity {
            SerialParity::None => Parity::None,
            SerialParity::Even => Parity::Even,
            SerialParity::Odd => Parity::Odd,
        };
        // serialport exposes one read timeout; use the single-byte bound.
        let timeout = params.byte_timeout();

        let handle = serialport::new(port, params.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| CaptureError::Open {
                port: port.to_string(),
                reason: e.to_string(),
            })?;

        debug!(port, baud_rate = params.baud_rate, "Serial port opened");
        Ok(Box::new(SystemLink { handle, timeout }))
    }
}

struct SystemLink {
    handle: Box<dyn SerialPort>,
    timeout: Duration,
}

impl SerialLink for SystemLink {
    fn read_byte(&mut self) -> CaptureResult<u8> {
        let mut buffer = [0u8; 1];
        match self.handle.read(&mut buffer) {
            Ok(0) => Err(CaptureError::SerialUnexpectedEof),
            Ok(_) => Ok(buffer[0]),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                Err(CaptureError::ReadTimeout(self.timeout))
            }
            Err(e) => Err(CaptureError::Io(e)),
        }
    }
}
