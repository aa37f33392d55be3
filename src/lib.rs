//! Core library for the treadmill driver.
//!
//! Reads the ASCII sample stream of a serial load cell on a background
//! thread and republishes the latest value to a tracking host that polls
//! once per rendered frame. Discovery, reconnects, and malformed input are
//! all handled inside the capture loop; the host only ever sees a number
//! and a connection flag.
//!
//! ```rust,ignore
//! use treadmill_capture::{CaptureSettings, TreadmillDriver};
//!
//! let driver = TreadmillDriver::new(CaptureSettings::load()?);
//! driver.start_capture()?;
//! let speed = driver.get_sample();
//! driver.stop_capture()?;
//! ```

pub mod cancellation;
pub mod capture;
pub mod channel;
pub mod config;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod error_recovery;
pub mod hardware;
pub mod parser;
pub mod recorder;
pub mod state;

pub use capture::CaptureSession;
pub use config::CaptureSettings;
pub use driver::TreadmillDriver;
pub use error::{CaptureError, CaptureResult};
pub use state::{PublishedState, Snapshot};
