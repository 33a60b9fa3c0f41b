//! Parquet file writer
use arrow::array::{ArrayRef, Float64Array, StringArray, UInt16Array, UInt64Array, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use super::AnomalyRow;
use crate::errors::PersistenceError;

fn create_anomaly_schema() -> Schema {
    Schema::new(vec![
        Field::new("index", DataType::UInt64, false),
        Field::new("time", DataType::Float64, false),
        Field::new("time_str", DataType::Utf8, false),
        Field::new("sender", DataType::Utf8, false),
        Field::new("receiver", DataType::Utf8, false),
        Field::new("tid", DataType::UInt8, false),
        Field::new("sn", DataType::UInt16, false),
        Field::new("ssn", DataType::UInt16, false),
        Field::new("offset", DataType::UInt16, false),
        Field::new("acked_in", DataType::UInt64, false),
        Field::new("message", DataType::Utf8, false),
    ])
}

/// A batch writer to write batches of anomaly rows to a Parquet file.
pub struct BatchWriter {
    writer: Option<ArrowWriter<File>>,
    schema: Arc<Schema>,
    rows: u64,
}

impl BatchWriter {
    pub fn new(file_path: PathBuf) -> Result<Self, PersistenceError> {
        let file = File::create(&file_path)?;
        let schema = Arc::new(create_anomaly_schema());
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let writer = ArrowWriter::try_new(file, Arc::clone(&schema), Some(props))
            .map_err(|e| PersistenceError::Parquet(e.to_string()))?;
        Ok(Self {
            writer: Some(writer),
            schema,
            rows: 0,
        })
    }

    pub fn add_batch(&mut self, rows: &[AnomalyRow]) -> Result<(), PersistenceError> {
        if rows.is_empty() {
            return Ok(());
        }

        let column = |f: fn(&AnomalyRow) -> String| -> ArrayRef {
            Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
        };
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.index))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.time))),
            column(|r| r.time_str.clone()),
            column(|r| r.sender.clone()),
            column(|r| r.receiver.clone()),
            Arc::new(UInt8Array::from_iter_values(rows.iter().map(|r| r.tid))),
            Arc::new(UInt16Array::from_iter_values(rows.iter().map(|r| r.sn))),
            Arc::new(UInt16Array::from_iter_values(rows.iter().map(|r| r.ssn))),
            Arc::new(UInt16Array::from_iter_values(rows.iter().map(|r| r.offset))),
            Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.acked_in))),
            column(|r| r.message.clone()),
        ];

        let batch = RecordBatch::try_new(Arc::clone(&self.schema), arrays)
            .map_err(|e| PersistenceError::Parquet(e.to_string()))?;

        let Some(writer) = &mut self.writer else {
            return Err(PersistenceError::Parquet("Writer has been finalized".into()));
        };
        writer
            .write(&batch)
            .map_err(|e| PersistenceError::Parquet(e.to_string()))?;
        self.rows += rows.len() as u64;
        Ok(())
    }

    /// Close the file. Returns the number of rows written.
    pub fn finalize(&mut self) -> Result<u64, PersistenceError> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| PersistenceError::Parquet("Writer already finalized".into()))?;
        writer
            .close()
            .map_err(|e| PersistenceError::Parquet(e.to_string()))?;
        Ok(self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::tests::anomalies;
    use crate::persistence::{write_anomalies, AnomalyFile, FileType};
    use arrow::array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    #[test]
    fn writes_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anomalies.parquet");
        let file = AnomalyFile {
            file_path: path.clone(),
            file_type: FileType::Parquet,
        };
        assert_eq!(write_anomalies(file, &anomalies()).unwrap(), 2);

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path).unwrap())
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 2);

        let batch = &batches[0];
        assert_eq!(batch.schema().field(10).name(), "message");
        let ssn = batch
            .column(7)
            .as_any()
            .downcast_ref::<UInt16Array>()
            .unwrap();
        assert_eq!(ssn.len(), 2);
        assert_eq!(ssn.value(1), 4095);
    }
}
