//! Persistence (saving detected anomalies to files)
use serde::Serialize;
use std::path::PathBuf;

use crate::errors::PersistenceError;
use crate::report::format_time;
use crate::tracker::Anomaly;

mod csv;
#[cfg(feature = "parquet")]
mod parquet;

/// File formats supported for writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Comma separated values with a header row
    Csv,
    /// Apache Parquet file
    #[cfg(feature = "parquet")]
    Parquet,
}

/// Struct specifying a file to write anomalies to
#[derive(Debug, Clone)]
pub struct AnomalyFile {
    /// Path to file
    pub file_path: PathBuf,
    /// Type of file
    pub file_type: FileType,
}

/// One anomaly flattened into a table row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyRow {
    pub index: u64,
    pub time: f64,
    pub time_str: String,
    pub sender: String,
    pub receiver: String,
    pub tid: u8,
    pub sn: u16,
    pub ssn: u16,
    pub offset: u16,
    pub acked_in: u64,
    pub message: String,
}

impl From<&Anomaly> for AnomalyRow {
    fn from(anomaly: &Anomaly) -> Self {
        Self {
            index: anomaly.index as u64,
            time: anomaly.timestamp,
            time_str: format_time(anomaly.timestamp),
            sender: anomaly.flow.sender_mac.to_string(),
            receiver: anomaly.flow.receiver_mac.to_string(),
            tid: anomaly.flow.tid,
            sn: anomaly.sequence_number,
            ssn: anomaly.ssn,
            offset: anomaly.offset,
            acked_in: anomaly.acked_in as u64,
            message: anomaly.message.clone(),
        }
    }
}

/// A writer to handle file writes
pub enum Writer {
    Csv(csv::BatchWriter),
    #[cfg(feature = "parquet")]
    Parquet(parquet::BatchWriter),
}

impl Writer {
    /// Create a new file writer.
    ///
    /// # Arguments
    ///
    /// * `file` - The file to write to
    pub fn new(file: AnomalyFile) -> Result<Self, PersistenceError> {
        log::debug!(
            "Writing anomalies as {:?} to {}",
            file.file_type,
            file.file_path.display()
        );
        let writer = match file.file_type {
            FileType::Csv => Self::Csv(csv::BatchWriter::new(file.file_path)?),
            #[cfg(feature = "parquet")]
            FileType::Parquet => Self::Parquet(parquet::BatchWriter::new(file.file_path)?),
        };

        Ok(writer)
    }

    /// Add a batch of anomalies to the writer
    pub fn add_batch(&mut self, anomalies: &[Anomaly]) -> Result<(), PersistenceError> {
        let rows: Vec<AnomalyRow> = anomalies.iter().map(AnomalyRow::from).collect();
        match self {
            Writer::Csv(writer) => writer.add_batch(&rows),
            #[cfg(feature = "parquet")]
            Writer::Parquet(writer) => writer.add_batch(&rows),
        }
    }

    /// Finalize the file writes, i.e. clear all buffers and make sure
    /// the data is actually written to file.
    ///
    /// Returns the number of rows written.
    pub fn finalize(&mut self) -> Result<u64, PersistenceError> {
        match self {
            Writer::Csv(writer) => writer.finalize(),
            #[cfg(feature = "parquet")]
            Writer::Parquet(writer) => writer.finalize(),
        }
    }
}

/// Write all anomalies to a single file.
pub fn write_anomalies(file: AnomalyFile, anomalies: &[Anomaly]) -> Result<u64, PersistenceError> {
    let mut writer = Writer::new(file)?;
    writer.add_batch(anomalies)?;
    writer.finalize()
}

impl std::str::FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(FileType::Csv),
            #[cfg(feature = "parquet")]
            "parquet" => Ok(FileType::Parquet),
            _ => Err(format!("Invalid file type: {}", s)),
        }
    }
}
