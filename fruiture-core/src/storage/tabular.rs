//! CSV-backed logs
//!
//! Every log is append-only. The header row is written when the file is
//! created (or empty), so files survive restarts and stay readable by
//! spreadsheet tools. Unset values are empty cells.

use super::{RecordSink, RecordSource};
use crate::errors::StorageResult;
use crate::record::{ObservationRecord, ScalarSnapshot};
use crate::ripeness::{ColorProportions, RgbColor};
use crate::time::{serde_timestamp_opt, Timestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Append-only CSV file of serde rows
#[derive(Debug)]
pub struct CsvLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, writing the header first if the file is new
    pub fn append<T: Serialize>(&self, row: &T) -> StorageResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(row)?;
        writer.flush()?;
        Ok(())
    }

    /// Every row in the file; a missing file reads as empty
    pub fn read_all<T: DeserializeOwned>(&self) -> StorageResult<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let rows = reader.deserialize().collect::<Result<Vec<T>, _>>()?;
        Ok(rows)
    }
}

/// Flat column layout of a persisted record
#[derive(Debug, Serialize, Deserialize)]
struct RecordRow {
    #[serde(with = "serde_timestamp_opt", default)]
    timestamp: Option<Timestamp>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    gas: Option<f64>,
    ripeness: Option<u8>,
    #[serde(rename = "avg_R")]
    avg_r: Option<u8>,
    #[serde(rename = "avg_G")]
    avg_g: Option<u8>,
    #[serde(rename = "avg_B")]
    avg_b: Option<u8>,
    #[serde(rename = "green_%")]
    green: Option<f64>,
    #[serde(rename = "yellow_%")]
    yellow: Option<f64>,
    #[serde(rename = "brown_%")]
    brown: Option<f64>,
    #[serde(rename = "black_%")]
    black: Option<f64>,
    image_path: Option<String>,
    processed_image_path: Option<String>,
}

impl From<&ObservationRecord> for RecordRow {
    fn from(record: &ObservationRecord) -> Self {
        let color = record.mean_color();
        let proportions = record.proportions();
        Self {
            timestamp: record.timestamp(),
            temperature: record.temperature(),
            humidity: record.humidity(),
            gas: record.gas(),
            ripeness: record.ripeness(),
            avg_r: color.map(|c| c.r),
            avg_g: color.map(|c| c.g),
            avg_b: color.map(|c| c.b),
            green: proportions.map(|p| p.green),
            yellow: proportions.map(|p| p.yellow),
            brown: proportions.map(|p| p.brown),
            black: proportions.map(|p| p.black),
            image_path: record.image_path().map(str::to_string),
            processed_image_path: record.processed_image_path().map(str::to_string),
        }
    }
}

impl From<RecordRow> for ObservationRecord {
    fn from(row: RecordRow) -> Self {
        let mean_color = match (row.avg_r, row.avg_g, row.avg_b) {
            (Some(r), Some(g), Some(b)) => Some(RgbColor::new(r, g, b)),
            _ => None,
        };
        let proportions = match (row.green, row.yellow, row.brown, row.black) {
            (Some(green), Some(yellow), Some(brown), Some(black)) => {
                Some(ColorProportions::new(green, yellow, brown, black))
            }
            _ => None,
        };
        ObservationRecord::from_parts(
            row.timestamp,
            row.temperature,
            row.humidity,
            row.gas,
            row.ripeness,
            mean_color,
            proportions,
            row.image_path,
            row.processed_image_path,
        )
    }
}

/// Completed records, one CSV row each
#[derive(Debug)]
pub struct CsvRecordStore {
    log: CsvLog,
}

impl CsvRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { log: CsvLog::new(path) }
    }

    pub fn path(&self) -> &Path {
        self.log.path()
    }
}

impl RecordSink for CsvRecordStore {
    fn persist(&self, record: &ObservationRecord) -> StorageResult<()> {
        self.log.append(&RecordRow::from(record))
    }
}

impl RecordSource for CsvRecordStore {
    fn records(&self) -> StorageResult<Vec<ObservationRecord>> {
        let rows: Vec<RecordRow> = self.log.read_all()?;
        Ok(rows.into_iter().map(ObservationRecord::from).collect())
    }
}

/// Continuous log of the in-flight scalars, one row per accepted update
#[derive(Debug)]
pub struct CsvSensorLog {
    log: CsvLog,
}

impl CsvSensorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { log: CsvLog::new(path) }
    }

    pub fn append(&self, snapshot: &ScalarSnapshot) -> StorageResult<()> {
        self.log.append(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{FieldPayload, ImageObservation};
    use crate::time::parse_timestamp;

    fn complete_record() -> ObservationRecord {
        ObservationRecord::empty()
            .with_timestamp(parse_timestamp("2025-03-14 12:00:00").unwrap())
            .with_temperature(24.5)
            .with_humidity(60.0)
            .merge(&FieldPayload::Image(ImageObservation {
                ripeness: Some(37),
                mean_color: RgbColor::new(180, 140, 20),
                proportions: Some(ColorProportions::new(10.0, 70.0, 15.0, 5.0)),
                image_path: Some("raw_2025-03-14_12-00-00.jpg".into()),
                processed_image_path: None,
            }))
    }

    #[test]
    fn records_survive_a_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvRecordStore::new(dir.path().join("records.csv"));
        store.persist(&complete_record()).unwrap();
        store.persist(&ObservationRecord::empty().with_temperature(1.0)).unwrap();

        let records = store.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], complete_record());
        assert_eq!(records[1].humidity(), None);
    }

    #[test]
    fn header_uses_reference_columns() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvRecordStore::new(dir.path().join("nested/records.csv"));
        store.persist(&complete_record()).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(
            header,
            "timestamp,temperature,humidity,gas,ripeness,avg_R,avg_G,avg_B,green_%,yellow_%,brown_%,black_%,image_path,processed_image_path"
        );
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvRecordStore::new(dir.path().join("absent.csv"));
        assert!(store.records().unwrap().is_empty());
        assert!(store.recent(3).unwrap().is_empty());
    }

    #[test]
    fn sensor_log_appends_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let log = CsvSensorLog::new(dir.path().join("sensor_log.csv"));
        log.append(&complete_record().scalars()).unwrap();
        log.append(&ObservationRecord::empty().with_gas(3.5).scalars()).unwrap();

        let text = fs::read_to_string(dir.path().join("sensor_log.csv")).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,temperature,humidity,gas");
        assert_eq!(lines[1], "2025-03-14 12:00:00,24.5,60.0,");
        assert_eq!(lines[2], ",,,3.5");
    }
}
