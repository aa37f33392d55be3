//! Serial channel owning the device handle.
//!
//! The handle and its port identifier sit behind the channel lock, which is
//! taken per open, close, or single-byte read. A byte read is bounded by the
//! link timeout, so the lock is never held for longer than one timeout
//! window and never across a whole line.

use crate::error::{CaptureError, CaptureResult};
use crate::hardware::{LinkParams, SerialLink, SerialOpener};
use crate::parser::ByteSource;
use crate::state::PublishedState;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

#[derive(Default)]
struct ChannelInner {
    port: Option<String>,
    link: Option<Box<dyn SerialLink>>,
}

/// Exclusive serial connection for one capture session.
pub struct SerialChannel {
    opener: Arc<dyn SerialOpener>,
    state: Arc<PublishedState>,
    inner: Mutex<ChannelInner>,
}

impl SerialChannel {
    /// Closed channel that opens ports through `opener` and reports its
    /// connection status into `state`.
    pub fn new(opener: Arc<dyn SerialOpener>, state: Arc<PublishedState>) -> Self {
        Self {
            opener,
            state,
            inner: Mutex::new(ChannelInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open `port` as 8N1 at `baud_rate` with the fixed timeouts.
    ///
    /// Any previously open handle is released first. On failure the
    /// connection status is forced to false.
    pub fn open(&self, port: &str, baud_rate: u32) -> CaptureResult<()> {
        let mut inner = self.lock();
        inner.link = None;
        inner.port = Some(port.to_string());

        let params = LinkParams::new(baud_rate);
        match self.opener.open(port, &params) {
            Ok(link) => {
                inner.link = Some(link);
                self.state.set_connected(true);
                info!(port, baud_rate, "Serial channel connected");
                Ok(())
            }
            Err(e) => {
                self.state.set_connected(false);
                warn!(port, baud_rate, error = %e, "Failed to open serial channel");
                Err(e)
            }
        }
    }

    /// Release the handle and mark the channel disconnected. Idempotent.
    pub fn close(&self) {
        let mut inner = self.lock();
        if let Some(link) = inner.link.take() {
            drop(link);
            debug!(port = inner.port.as_deref().unwrap_or_default(), "Serial channel closed");
        }
        self.state.set_connected(false);
    }

    /// Read one byte, bounded by the configured read timeout.
    pub fn read_raw_byte(&self) -> CaptureResult<u8> {
        let mut inner = self.lock();
        let link = inner
            .link
            .as_mut()
            .ok_or(CaptureError::SerialPortNotConnected)?;
        link.read_byte()
    }

    /// Whether a handle is currently held.
    pub fn is_open(&self) -> bool {
        self.lock().link.is_some()
    }

    /// Identifier of the last port opened, if any.
    pub fn port(&self) -> Option<String> {
        self.lock().port.clone()
    }
}

impl ByteSource for SerialChannel {
    fn read_raw_byte(&self) -> CaptureResult<u8> {
        SerialChannel::read_raw_byte(self)
    }
}
