//! Capture configuration using Figment
//!
//! Settings are assembled from (later sources win):
//! 1. Built-in defaults
//! 2. An optional TOML file
//! 3. Environment variables prefixed with `TREADMILL_`
//!
//! ```toml
//! device_name_substring = "Arduino"
//! baud_rate = 9600
//! ```
//!
//! ```text
//! TREADMILL_DEVICE_NAME_SUBSTRING="USB Serial Device"
//! TREADMILL_BAUD_RATE=115200
//! ```

use crate::error::{CaptureError, CaptureResult};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "TREADMILL_";

/// Default device name filter.
pub const DEFAULT_DEVICE_NAME_SUBSTRING: &str = "Arduino";

/// Default serial speed of the load-cell firmware.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Inputs the capture core needs at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Substring matched against each serial device's human-readable name
    pub device_name_substring: String,
    /// Serial speed
    pub baud_rate: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            device_name_substring: DEFAULT_DEVICE_NAME_SUBSTRING.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl CaptureSettings {
    /// Build settings directly, e.g. from host-provided values.
    pub fn new(device_name_substring: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            device_name_substring: device_name_substring.into(),
            baud_rate,
        }
    }

    /// Load defaults overridden by environment variables.
    pub fn load() -> CaptureResult<Self> {
        Self::from_figment(Self::base_figment())
    }

    /// Load defaults, then `path`, then environment variables.
    ///
    /// A missing file is not an error; Figment treats it as empty.
    pub fn load_from(path: impl AsRef<Path>) -> CaptureResult<Self> {
        let figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX));
        Self::from_figment(figment)
    }

    fn base_figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default())).merge(Env::prefixed(ENV_PREFIX))
    }

    fn from_figment(figment: Figment) -> CaptureResult<Self> {
        let settings: Self = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that could never find or open a device.
    pub fn validate(&self) -> CaptureResult<()> {
        if self.device_name_substring.trim().is_empty() {
            return Err(CaptureError::Configuration(
                "device_name_substring must not be empty".to_string(),
            ));
        }
        if self.baud_rate == 0 {
            return Err(CaptureError::Configuration(
                "baud_rate must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Render the effective settings as TOML.
    pub fn to_toml(&self) -> CaptureResult<String> {
        toml::to_string(self).map_err(|e| CaptureError::Configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn clear_env() {
        std::env::remove_var("TREADMILL_DEVICE_NAME_SUBSTRING");
        std::env::remove_var("TREADMILL_BAUD_RATE");
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = CaptureSettings::default();
        assert_eq!(settings.device_name_substring, "Arduino");
        assert_eq!(settings.baud_rate, 9600);
        assert!(settings.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        clear_env();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "device_name_substring = \"CH340\"\nbaud_rate = 115200").unwrap();

        let settings = CaptureSettings::load_from(file.path()).unwrap();
        assert_eq!(settings, CaptureSettings::new("CH340", 115200));
    }

    #[test]
    #[serial]
    fn test_partial_file_keeps_defaults() {
        clear_env();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "baud_rate = 57600").unwrap();

        let settings = CaptureSettings::load_from(file.path()).unwrap();
        assert_eq!(settings.device_name_substring, DEFAULT_DEVICE_NAME_SUBSTRING);
        assert_eq!(settings.baud_rate, 57600);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "baud_rate = 57600").unwrap();
        std::env::set_var("TREADMILL_BAUD_RATE", "19200");

        let settings = CaptureSettings::load_from(file.path());
        clear_env();

        assert_eq!(settings.unwrap().baud_rate, 19200);
    }

    #[test]
    #[serial]
    fn test_zero_baud_rejected() {
        clear_env();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "baud_rate = 0").unwrap();

        let err = CaptureSettings::load_from(file.path()).unwrap_err();
        assert!(matches!(err, CaptureError::Configuration(_)));
    }

    #[test]
    fn test_blank_substring_rejected() {
        let settings = CaptureSettings::new("  ", 9600);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_to_toml_round_trips_keys() {
        let rendered = CaptureSettings::new("CH340", 115200).to_toml().unwrap();
        assert!(rendered.contains("device_name_substring = \"CH340\""));
        assert!(rendered.contains("baud_rate = 115200"));
    }
}
