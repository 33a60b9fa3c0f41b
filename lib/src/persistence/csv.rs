//! CSV file writer
use std::fs::File;
use std::path::PathBuf;

use super::AnomalyRow;
use crate::errors::PersistenceError;

/// A batch writer to write anomaly rows to a CSV file with a header row.
pub struct BatchWriter {
    writer: Option<csv::Writer<File>>,
    rows: u64,
}

impl BatchWriter {
    pub fn new(file_path: PathBuf) -> Result<Self, PersistenceError> {
        let writer = csv::WriterBuilder::new()
            .has_headers(true)
            .from_path(file_path)?;
        Ok(Self {
            writer: Some(writer),
            rows: 0,
        })
    }

    pub fn add_batch(&mut self, rows: &[AnomalyRow]) -> Result<(), PersistenceError> {
        let writer = self.writer.as_mut().ok_or_else(finalized)?;
        for row in rows {
            writer.serialize(row)?;
        }
        self.rows += rows.len() as u64;
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<u64, PersistenceError> {
        let mut writer = self.writer.take().ok_or_else(finalized)?;
        writer.flush()?;
        Ok(self.rows)
    }
}

fn finalized() -> PersistenceError {
    PersistenceError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        "Writer already finalized",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::tests::anomalies;
    use crate::persistence::{write_anomalies, AnomalyFile, FileType};

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anomalies.csv");
        let file = AnomalyFile {
            file_path: path.clone(),
            file_type: FileType::Csv,
        };

        assert_eq!(write_anomalies(file, &anomalies()).unwrap(), 2);

        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "index,time,time_str,sender,receiver,tid,sn,ssn,offset,acked_in,message"
        );
        assert!(lines[1].starts_with(
            "3,10.002,00:00:10.002,00:11:22:33:44:55,aa:bb:cc:dd:ee:ff,1,10,10,0,2,"
        ));
        assert!(lines[2].ends_with("SN=0 was ACKed, now missing (Bit 1 in SSN=4095)"));
    }

    #[test]
    fn finalize_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = BatchWriter::new(dir.path().join("a.csv")).unwrap();
        assert_eq!(writer.finalize().unwrap(), 0);
        assert!(writer.finalize().is_err());
        assert!(writer.add_batch(&[]).is_err());
    }
}
