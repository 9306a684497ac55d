// Decision Table
// Reads and writes the `filename,LLM-decision` CSV

use crate::models::DecisionRecord;
use std::fs::{self, File};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecisionTableError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

const HEADER: [&str; 2] = ["filename", "LLM-decision"];

/// Row-at-a-time writer; every row is flushed so an interrupted run keeps what it wrote.
pub struct DecisionWriter {
    writer: csv::Writer<File>,
}

impl DecisionWriter {
    /// Create (or truncate) the table at `path` and write the header,
    /// creating parent directories.
    pub fn create(path: &Path) -> Result<Self, DecisionTableError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)?;
        writer.write_record(HEADER)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    pub fn append(&mut self, record: &DecisionRecord) -> Result<(), DecisionTableError> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        Ok(())
    }
}

pub fn write_decisions(path: &Path, records: &[DecisionRecord]) -> Result<(), DecisionTableError> {
    let mut writer = DecisionWriter::create(path)?;
    for record in records {
        writer.append(record)?;
    }
    Ok(())
}

pub fn read_decisions(path: &Path) -> Result<Vec<DecisionRecord>, DecisionTableError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_preserves_order_and_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results").join("decisions.csv");
        let records = vec![
            DecisionRecord::new("Au_ani_1.jpg", "Authentic"),
            DecisionRecord::new("Au_arc_2.jpg", "Spliced, the shadow is inconsistent"),
            DecisionRecord::new("Au_cha_3.jpg", "Line one\nline \"two\""),
            DecisionRecord::new("Au_cha_4.jpg", "ERROR: request timed out"),
        ];

        write_decisions(&path, &records).unwrap();
        let back = read_decisions(&path).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn test_header_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_decisions(&path, &[]).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim_end(), "filename,LLM-decision");
        assert!(read_decisions(&path).unwrap().is_empty());

        let mut writer = DecisionWriter::create(&path).unwrap();
        writer.append(&DecisionRecord::new("a.jpg", "Authentic")).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("filename,LLM-decision\n"));
    }
}
