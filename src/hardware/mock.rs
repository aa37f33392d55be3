//! Mock Hardware Implementations
//!
//! Provides a simulated load-cell device for testing without physical
//! hardware. `MockDevice` is both a [`PortEnumerator`] and a
//! [`SerialOpener`], so a whole capture session can run against it.
//!
//! The device behaves like the real firmware: while plugged in it streams
//! its current line (`"<value>\r\n"`) over and over. Tests change the line,
//! silence the device, unplug it, or make opens fail, then watch the
//! published state react.
//!
//! # Example
//!
//! ```rust,ignore
//! let device = MockDevice::new("USB Serial Device (COM3)", "COM3");
//! device.stream_line("1.25");
//! device.unplug(); // open links start failing, enumeration drops the port
//! device.plug();
//! ```

use super::capabilities::{
    LinkParams, PortDescriptor, PortEnumerator, SerialLink, SerialOpener,
};
use crate::error::{CaptureError, CaptureResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Pause after each streamed line, roughly the firmware's print rate.
const LINE_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct MockState {
    descriptor: PortDescriptor,
    other_ports: Vec<PortDescriptor>,
    plugged: bool,
    enumeration_fails: bool,
    line: Vec<u8>,
    /// Bumped on unplug so links opened before it stay dead after a replug.
    generation: u64,
    open_failures: u32,
    scans: usize,
    opens: usize,
    live_links: usize,
    last_open: Option<(String, LinkParams)>,
}

/// Simulated serial load cell.
#[derive(Debug, Clone)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    /// Plugged-in device streaming `"0\r\n"`.
    pub fn new(name: &str, port_name: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                descriptor: PortDescriptor::new(name, port_name),
                other_ports: Vec::new(),
                plugged: true,
                enumeration_fails: false,
                line: b"0\r\n".to_vec(),
                generation: 0,
                open_failures: 0,
                scans: 0,
                opens: 0,
                live_links: 0,
                last_open: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an unrelated port that is always enumerated before this device.
    pub fn with_other_port(self, descriptor: PortDescriptor) -> Self {
        self.lock().other_ports.push(descriptor);
        self
    }

    /// Stream `text` followed by CR LF.
    pub fn stream_line(&self, text: &str) {
        let mut line = text.as_bytes().to_vec();
        line.extend_from_slice(b"\r\n");
        self.stream_raw(&line);
    }

    /// Stream an exact byte pattern repeatedly.
    pub fn stream_raw(&self, bytes: &[u8]) {
        self.lock().line = bytes.to_vec();
    }

    /// Stop sending; reads time out.
    pub fn go_silent(&self) {
        self.lock().line.clear();
    }

    /// Disconnect the cable. Open links fail and enumeration drops the port.
    pub fn unplug(&self) {
        let mut state = self.lock();
        state.plugged = false;
        state.generation += 1;
    }

    /// Reconnect the cable.
    pub fn plug(&self) {
        self.lock().plugged = true;
    }

    /// Make the next `count` opens fail even if the device is present.
    pub fn fail_next_opens(&self, count: u32) {
        self.lock().open_failures = count;
    }

    /// Make enumeration itself fail.
    pub fn set_enumeration_fails(&self, fails: bool) {
        self.lock().enumeration_fails = fails;
    }

    /// Number of enumeration calls so far.
    pub fn scan_count(&self) -> usize {
        self.lock().scans
    }

    /// Number of open attempts so far.
    pub fn open_count(&self) -> usize {
        self.lock().opens
    }

    /// Links currently open and not yet dropped.
    pub fn live_links(&self) -> usize {
        self.lock().live_links
    }

    /// Port and parameters of the latest open attempt.
    pub fn last_open(&self) -> Option<(String, LinkParams)> {
        self.lock().last_open.clone()
    }
}

impl PortEnumerator for MockDevice {
    fn enumerate(&self) -> CaptureResult<Vec<PortDescriptor>> {
        let mut state = self.lock();
        state.scans += 1;
        if state.enumeration_fails {
            return Err(CaptureError::Enumeration("mock enumeration failure".to_string()));
        }

        let mut ports = state.other_ports.clone();
        if state.plugged {
            ports.push(state.descriptor.clone());
        }
        Ok(ports)
    }
}

impl SerialOpener for MockDevice {
    fn open(&self, port: &str, params: &LinkParams) -> CaptureResult<Box<dyn SerialLink>> {
        let mut state = self.lock();
        state.opens += 1;
        state.last_open = Some((port.to_string(), *params));

        let open_error = |reason: &str| CaptureError::Open {
            port: port.to_string(),
            reason: reason.to_string(),
        };
        if !state.plugged || port != state.descriptor.port_name {
            return Err(open_error("The system cannot find the file specified."));
        }
        if state.open_failures > 0 {
            state.open_failures -= 1;
            return Err(open_error("Access is denied."));
        }

        state.live_links += 1;
        Ok(Box::new(MockLink {
            state: self.state.clone(),
            generation: state.generation,
            pending: VecDeque::new(),
            timeout: params.byte_timeout(),
        }))
    }
}

struct MockLink {
    state: Arc<Mutex<MockState>>,
    generation: u64,
    pending: VecDeque<u8>,
    timeout: Duration,
}

impl SerialLink for MockLink {
    fn read_byte(&mut self) -> CaptureResult<u8> {
        {
            let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if !state.plugged || state.generation != self.generation {
                return Err(CaptureError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "device disconnected",
                )));
            }
            if let Some(byte) = self.pending.pop_front() {
                return Ok(byte);
            }
            self.pending.extend(state.line.iter().copied());
        }

        match self.pending.pop_front() {
            Some(byte) => {
                thread::sleep(LINE_PERIOD);
                Ok(byte)
            }
            None => {
                thread::sleep(self.timeout);
                Err(CaptureError::ReadTimeout(self.timeout))
            }
        }
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.live_links = state.live_links.saturating_sub(1);
    }
}
