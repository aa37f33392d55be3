//! CSV recording of polled samples.
//!
//! Each row is `timestamp,sample,connected` with an RFC 3339 UTC timestamp,
//! the same layout the bench validation logs use.

use crate::error::CaptureResult;
use crate::state::Snapshot;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Column names written as the first row.
pub const CSV_HEADER: [&str; 3] = ["timestamp", "sample", "connected"];

#[cfg(feature = "storage_csv")]
mod csv_enabled {
    use super::*;
    use std::fs::File;
    use std::path::PathBuf;
    use tracing::info;

    /// Appends one row per polled snapshot.
    pub struct SampleRecorder {
        path: PathBuf,
        writer: csv::Writer<File>,
        rows: u64,
    }

    impl SampleRecorder {
        /// Create (or truncate) `path` and write the header.
        pub fn create(path: impl AsRef<Path>) -> CaptureResult<Self> {
            let path = path.as_ref().to_path_buf();
            let file = File::create(&path)?;
            let mut writer = csv::Writer::from_writer(file);
            writer.write_record(CSV_HEADER)?;

            info!(path = %path.display(), "Recording samples to CSV");
            Ok(Self {
                path,
                writer,
                rows: 0,
            })
        }

        /// Record `snapshot` stamped with the current time.
        pub fn record(&mut self, snapshot: Snapshot) -> CaptureResult<()> {
            self.record_at(Utc::now(), snapshot)
        }

        /// Record `snapshot` with an explicit timestamp.
        pub fn record_at(
            &mut self,
            timestamp: DateTime<Utc>,
            snapshot: Snapshot,
        ) -> CaptureResult<()> {
            self.writer.write_record([
                timestamp.to_rfc3339(),
                snapshot.sample.to_string(),
                snapshot.connected.to_string(),
            ])?;
            self.rows += 1;
            Ok(())
        }

        /// Rows written so far, excluding the header.
        pub fn rows(&self) -> u64 {
            self.rows
        }

        /// Flush buffered rows to disk.
        pub fn finish(mut self) -> CaptureResult<()> {
            self.writer.flush()?;
            info!(path = %self.path.display(), rows = self.rows, "CSV recording finished");
            Ok(())
        }
    }
}

#[cfg(not(feature = "storage_csv"))]
mod csv_disabled {
    use super::*;
    use crate::error::CaptureError;

    /// Stand-in used when the `storage_csv` feature is off.
    pub struct SampleRecorder;

    impl SampleRecorder {
        pub fn create(_path: impl AsRef<Path>) -> CaptureResult<Self> {
            Err(CaptureError::FeatureNotEnabled("storage_csv".to_string()))
        }

        pub fn record(&mut self, _snapshot: Snapshot) -> CaptureResult<()> {
            Err(CaptureError::FeatureNotEnabled("storage_csv".to_string()))
        }

        pub fn record_at(
            &mut self,
            _timestamp: DateTime<Utc>,
            _snapshot: Snapshot,
        ) -> CaptureResult<()> {
            Err(CaptureError::FeatureNotEnabled("storage_csv".to_string()))
        }

        pub fn rows(&self) -> u64 {
            0
        }

        pub fn finish(self) -> CaptureResult<()> {
            Err(CaptureError::FeatureNotEnabled("storage_csv".to_string()))
        }
    }
}

#[cfg(feature = "storage_csv")]
pub use csv_enabled::SampleRecorder;

#[cfg(not(feature = "storage_csv"))]
pub use csv_disabled::SampleRecorder;

#[cfg(all(test, feature = "storage_csv"))]
mod tests {
    use super::*;
    use crate::error::CaptureError;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_writes_header_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("samples.csv");
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let mut recorder = SampleRecorder::create(&path).unwrap();
        recorder
            .record_at(
                at,
                Snapshot {
                    sample: 1.25,
                    connected: true,
                },
            )
            .unwrap();
        recorder.record_at(at, Snapshot::default()).unwrap();
        assert_eq!(recorder.rows(), 2);
        recorder.finish().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "timestamp,sample,connected");
        assert_eq!(lines[1], "2024-05-01T12:00:00+00:00,1.25,true");
        assert_eq!(lines[2], "2024-05-01T12:00:00+00:00,0,false");
    }

    #[test]
    fn test_record_uses_current_time() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("now.csv");

        let mut recorder = SampleRecorder::create(&path).unwrap();
        recorder.record(Snapshot::default()).unwrap();
        recorder.finish().unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let row = reader.records().next().unwrap().unwrap();
        assert!(DateTime::parse_from_rfc3339(&row[0]).is_ok());
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("samples.csv");
        assert!(matches!(
            SampleRecorder::create(&path),
            Err(CaptureError::Io(_))
        ));
    }
}
