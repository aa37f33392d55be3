//! Recovery strategies for capture failures.
//!
//! Every failure in the capture path is absorbed locally:
//!
//! | outcome                         | action                 |
//! |---------------------------------|------------------------|
//! | finite sample                   | publish it             |
//! | malformed text / framing error  | publish the fallback   |
//! | I/O failure or timeout          | reconnect              |
//! | no port found / open failure    | retry after backoff    |

use crate::error::LineError;
use std::time::Duration;

/// Fixed wait between failed reconnect attempts.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// What the capture loop does with one `read_line` outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryAction {
    /// Publish a valid reading.
    Publish(f32),
    /// Publish the fallback; the link is still presumed healthy.
    PublishFallback,
    /// Publish the fallback, drop the link, and search for the device.
    Reconnect,
}

/// Map a line read to the action the capture loop takes.
pub fn classify(outcome: &Result<f32, LineError>) -> RecoveryAction {
    match outcome {
        Ok(value) if value.is_finite() => RecoveryAction::Publish(*value),
        Ok(_) => RecoveryAction::PublishFallback,
        Err(LineError::Framing { .. }) => RecoveryAction::PublishFallback,
        Err(LineError::Io(_)) => RecoveryAction::Reconnect,
    }
}

/// Defines how reconnect attempts are paced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// The delay between failed reconnect attempts.
    pub backoff_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            backoff_delay: RECONNECT_BACKOFF,
        }
    }
}
