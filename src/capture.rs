//! Background capture loop and the session that owns it.
//!
//! ```text
//!            read ok / malformed / framing
//!              ┌──────────┐
//!              ▼          │
//!         ┌───────────┐───┘   I/O failure    ┌──────────────┐
//!         │ Connected │ ───────────────────▶ │ Reconnecting │ ◀─┐ no port / open failed
//!         └───────────┘ ◀─────────────────── └──────────────┘ ──┘ (wait backoff)
//!                         port found + open ok
//! ```
//!
//! The loop starts in `Reconnecting`, so `start` never blocks on discovery
//! or open. The cancellation token is checked at the top of every
//! iteration and wakes a pending backoff wait.

use crate::cancellation::CancellationToken;
use crate::channel::SerialChannel;
use crate::config::CaptureSettings;
use crate::discovery::find_port;
use crate::error::{CaptureError, CaptureResult, LineError};
use crate::error_recovery::{classify, ReconnectPolicy, RecoveryAction};
use crate::hardware::{PortEnumerator, SerialBackend, SerialOpener};
use crate::parser::LineReader;
use crate::state::{PublishedState, Snapshot, FALLBACK_SAMPLE};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, info_span, warn};

/// Name of the background capture thread.
pub const CAPTURE_THREAD_NAME: &str = "treadmill-capture";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Connected,
    Reconnecting,
}

struct CaptureLoop {
    enumerator: Arc<dyn PortEnumerator>,
    channel: Arc<SerialChannel>,
    state: Arc<PublishedState>,
    settings: CaptureSettings,
    policy: ReconnectPolicy,
    token: CancellationToken,
    reader: LineReader,
}

impl CaptureLoop {
    fn run(mut self) {
        info!(
            device = %self.settings.device_name_substring,
            baud_rate = self.settings.baud_rate,
            "Capture loop started"
        );

        let mut mode = LoopState::Reconnecting;
        while !self.token.is_cancelled() {
            mode = match mode {
                LoopState::Connected => self.read_cycle(),
                LoopState::Reconnecting => self.reconnect_cycle(),
            };
        }

        info!("Capture loop stopped");
    }

    fn read_cycle(&mut self) -> LoopState {
        let outcome = self.reader.read_line(self.channel.as_ref());
        match classify(&outcome) {
            RecoveryAction::Publish(sample) => {
                self.state.publish(sample);
                LoopState::Connected
            }
            RecoveryAction::PublishFallback => {
                match &outcome {
                    Err(e) => debug!(error = %e, "Discarding oversized line"),
                    Ok(_) => debug!("Failed to parse sample, publishing fallback"),
                }
                self.state.publish(FALLBACK_SAMPLE);
                LoopState::Connected
            }
            RecoveryAction::Reconnect => {
                if let Err(LineError::Io(e)) = &outcome {
                    warn!(
                        port = %self.channel.port().unwrap_or_default(),
                        error = %e,
                        "Lost serial device, reconnecting"
                    );
                }
                self.state.mark_disconnected();
                self.channel.close();
                LoopState::Reconnecting
            }
        }
    }

    fn reconnect_cycle(&mut self) -> LoopState {
        let found = find_port(
            self.enumerator.as_ref(),
            &self.settings.device_name_substring,
        );
        if let Some(port) = found {
            // open() logs its own failure and clears the status flag
            if self.channel.open(&port, self.settings.baud_rate).is_ok() {
                self.reader.reset();
                return LoopState::Connected;
            }
        }

        self.token.wait_timeout(self.policy.backoff_delay);
        LoopState::Reconnecting
    }
}

struct CaptureWorker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// One capture lifecycle: discovery, reading, reconnecting, publishing.
///
/// The host polls [`CaptureSession::get_sample`] once per frame; it only
/// takes the value lock and never waits on serial I/O.
pub struct CaptureSession {
    settings: CaptureSettings,
    enumerator: Arc<dyn PortEnumerator>,
    state: Arc<PublishedState>,
    channel: Arc<SerialChannel>,
    policy: ReconnectPolicy,
    active: AtomicBool,
    worker: Mutex<Option<CaptureWorker>>,
}

impl CaptureSession {
    /// Inactive session over `backend`.
    pub fn new<B>(settings: CaptureSettings, backend: B) -> Self
    where
        B: SerialBackend + 'static,
    {
        let backend = Arc::new(backend);
        let opener: Arc<dyn SerialOpener> = backend.clone();
        let state = Arc::new(PublishedState::new());

        Self {
            settings,
            enumerator: backend,
            channel: Arc::new(SerialChannel::new(opener, state.clone())),
            state,
            policy: ReconnectPolicy::default(),
            active: AtomicBool::new(false),
            worker: Mutex::new(None),
        }
    }

    /// Inactive session over the platform's serial ports.
    #[cfg(feature = "instrument_serial")]
    pub fn system(settings: CaptureSettings) -> Self {
        Self::new(settings, crate::hardware::SystemSerial::new())
    }

    /// Override the wait between failed reconnect attempts.
    pub fn with_reconnect_backoff(mut self, backoff_delay: Duration) -> Self {
        self.policy = ReconnectPolicy { backoff_delay };
        self
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<CaptureWorker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the capture loop.
    ///
    /// Fails with [`CaptureError::AlreadyActive`] if a loop is running.
    /// The `tracing` dispatcher current on the calling thread is installed
    /// on the capture thread, and the loop runs inside a `capture` span
    /// parented to the caller's current span.
    pub fn start(&self) -> CaptureResult<()> {
        let mut worker = self.lock_worker();
        if worker.is_some() {
            return Err(CaptureError::AlreadyActive);
        }

        let token = CancellationToken::new();
        let capture_loop = CaptureLoop {
            enumerator: self.enumerator.clone(),
            channel: self.channel.clone(),
            state: self.state.clone(),
            settings: self.settings.clone(),
            policy: self.policy,
            token: token.clone(),
            reader: LineReader::new(),
        };
        let dispatch = tracing::dispatcher::get_default(|d| d.clone());
        let span = info_span!("capture", device = %self.settings.device_name_substring);

        let handle = thread::Builder::new()
            .name(CAPTURE_THREAD_NAME.to_string())
            .spawn(move || {
                tracing::dispatcher::with_default(&dispatch, || span.in_scope(|| capture_loop.run()))
            })?;

        *worker = Some(CaptureWorker { token, handle });
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Cancel the loop, join it, and release the device handle.
    ///
    /// No-op when inactive. Returns after at most one read timeout (plus
    /// an in-flight open) once the loop is running.
    pub fn stop(&self) -> CaptureResult<()> {
        let mut worker = self.lock_worker();
        let Some(CaptureWorker { token, handle }) = worker.take() else {
            return Ok(());
        };

        self.active.store(false, Ordering::SeqCst);
        token.cancel();
        let joined = handle.join();
        self.channel.close();

        joined.map_err(|_| CaptureError::CaptureThreadPanicked)
    }

    /// Whether a capture loop is running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Latest sample; `0.0` until the first valid reading.
    pub fn get_sample(&self) -> f32 {
        self.state.sample()
    }

    /// Whether the device is currently connected.
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Sample and connection status read together.
    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    /// Shared handle to the published state for another polling thread.
    pub fn published(&self) -> Arc<PublishedState> {
        self.state.clone()
    }

    /// Settings this session was built with.
    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "Capture session did not shut down cleanly");
        }
    }
}
