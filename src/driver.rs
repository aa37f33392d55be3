//! Host-facing treadmill driver.
//!
//! The tracking host calls [`TreadmillDriver::start_capture`] when it
//! activates the device, [`TreadmillDriver::get_sample`] once per rendered
//! frame, and [`TreadmillDriver::stop_capture`] on deactivation. Dropping the
//! driver stops capture as well.

use crate::capture::CaptureSession;
use crate::config::CaptureSettings;
use crate::error::CaptureResult;
use crate::hardware::SerialBackend;
use crate::state::Snapshot;
use tracing::{info, warn};

/// One treadmill device as seen by the host.
pub struct TreadmillDriver {
    session: CaptureSession,
}

impl TreadmillDriver {
    /// Driver backed by the platform's serial ports.
    #[cfg(feature = "instrument_serial")]
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            session: CaptureSession::system(settings),
        }
    }

    /// Driver backed by `backend`, e.g. a [`crate::hardware::MockDevice`].
    pub fn with_backend<B>(settings: CaptureSettings, backend: B) -> Self
    where
        B: SerialBackend + 'static,
    {
        Self {
            session: CaptureSession::new(settings, backend),
        }
    }

    /// Wrap an already configured session.
    pub fn from_session(session: CaptureSession) -> Self {
        Self { session }
    }

    /// Activation hook: spawn the capture loop.
    pub fn start_capture(&self) -> CaptureResult<()> {
        self.session.start()?;
        info!(
            device = %self.session.settings().device_name_substring,
            "Treadmill capture started"
        );
        Ok(())
    }

    /// Deactivation hook: stop the loop and release the port.
    pub fn stop_capture(&self) -> CaptureResult<()> {
        let was_active = self.session.is_active();
        self.session.stop()?;
        if was_active {
            info!("Treadmill capture stopped");
        }
        Ok(())
    }

    /// Per-frame poll of the latest sample.
    pub fn get_sample(&self) -> f32 {
        self.session.get_sample()
    }

    /// Whether the load cell is connected right now.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Whether capture is running.
    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }

    /// Sample and connection status read together.
    pub fn snapshot(&self) -> Snapshot {
        self.session.snapshot()
    }
}

impl Drop for TreadmillDriver {
    fn drop(&mut self) {
        if let Err(e) = self.stop_capture() {
            warn!(error = %e, "Failed to stop treadmill capture on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureError;
    use crate::hardware::MockDevice;
    use std::time::{Duration, Instant};
    use tracing_test::traced_test;

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_driver_lifecycle() {
        let device = MockDevice::new("Arduino Uno (COM3)", "COM3");
        device.stream_line("2.5");
        let driver =
            TreadmillDriver::with_backend(CaptureSettings::new("Arduino", 9600), device.clone());

        assert!(!driver.is_active());
        driver.start_capture().unwrap();
        assert!(driver.is_active());
        assert!(wait_until(Duration::from_secs(2), || driver.get_sample() == 2.5));
        assert!(driver.is_connected());

        driver.stop_capture().unwrap();
        assert!(!driver.is_active());
        assert!(!driver.is_connected());
        assert_eq!(device.live_links(), 0);
    }

    #[test]
    fn test_second_start_is_rejected() {
        let device = MockDevice::new("Arduino Uno (COM3)", "COM3");
        let driver = TreadmillDriver::with_backend(CaptureSettings::default(), device);

        driver.start_capture().unwrap();
        assert!(matches!(
            driver.start_capture(),
            Err(CaptureError::AlreadyActive)
        ));
    }

    #[test]
    fn test_restart_after_stop() {
        let device = MockDevice::new("Arduino Uno (COM3)", "COM3");
        device.stream_line("4");
        let driver =
            TreadmillDriver::with_backend(CaptureSettings::default(), device.clone());

        driver.start_capture().unwrap();
        driver.stop_capture().unwrap();
        driver.start_capture().unwrap();

        assert!(wait_until(Duration::from_secs(2), || driver.is_connected()));
        assert_eq!(device.live_links(), 1);
    }

    #[test]
    fn test_drop_releases_port() {
        let device = MockDevice::new("Arduino Uno (COM3)", "COM3");
        {
            let driver =
                TreadmillDriver::with_backend(CaptureSettings::default(), device.clone());
            driver.start_capture().unwrap();
            assert!(wait_until(Duration::from_secs(2), || driver.is_connected()));
        }
        assert_eq!(device.live_links(), 0);
    }

    #[tokio::test]
    async fn test_stop_from_blocking_task_in_runtime() {
        let device = MockDevice::new("Arduino Uno (COM3)", "COM3");
        device.go_silent();
        let driver =
            TreadmillDriver::with_backend(CaptureSettings::default(), device.clone());
        driver.start_capture().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let driver = tokio::task::spawn_blocking(move || driver.stop_capture().map(|()| driver))
            .await
            .unwrap()
            .unwrap();

        assert!(!driver.is_active());
        assert_eq!(device.live_links(), 0);
    }

    #[test]
    #[traced_test]
    fn test_capture_thread_logs_reach_caller_subscriber() {
        let device = MockDevice::new("Arduino Uno (COM3)", "COM3");
        let driver =
            TreadmillDriver::with_backend(CaptureSettings::default(), device.clone());

        driver.start_capture().unwrap();
        assert!(wait_until(Duration::from_secs(2), || driver.is_connected()));
        driver.stop_capture().unwrap();

        assert!(logs_contain("Found serial device"));
        assert!(logs_contain("Serial channel connected"));
    }
}
