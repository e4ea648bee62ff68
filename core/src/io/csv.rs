//! Bronze CSV I/O.
//!
//! Every file starts with the table's full header, even when it holds no
//! rows, so part files can be concatenated by dropping all headers but
//! the first.

use crate::error::{EtlError, EtlResult};
use crate::records::CsvTable;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Read a whole Bronze table, checking its header first.
pub fn read_csv_table<T: DeserializeOwned + CsvTable>(path: &Path) -> EtlResult<Vec<T>> {
    if !path.is_file() {
        return Err(EtlError::MissingInput { path: path.to_path_buf() });
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::new(File::open(path)?));

    let headers = reader.headers().map_err(|e| malformed(path, e))?.clone();
    for column in T::COLUMNS {
        if !headers.iter().any(|h| h.trim() == *column) {
            return Err(EtlError::MissingColumn {
                path: path.to_path_buf(),
                column: (*column).to_string(),
            });
        }
    }

    let mut rows = Vec::new();
    for record in reader.deserialize::<T>() {
        rows.push(record.map_err(|e| malformed(path, e))?);
    }
    log::debug!("csv: read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

fn malformed(path: &Path, err: csv::Error) -> EtlError {
    EtlError::Malformed { path: path.to_path_buf(), reason: err.to_string() }
}

/// Streaming writer for one table. Rows go straight to disk.
pub struct CsvSink<T> {
    writer: csv::Writer<BufWriter<File>>,
    path: PathBuf,
    rows: usize,
    _row: PhantomData<T>,
}

impl<T: Serialize + CsvTable> CsvSink<T> {
    pub fn create(path: &Path) -> EtlResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(File::create(path)?));
        writer.write_record(T::COLUMNS)?;
        Ok(Self { writer, path: path.to_path_buf(), rows: 0, _row: PhantomData })
    }

    pub fn write(&mut self, row: &T) -> EtlResult<()> {
        self.writer.serialize(row)?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close, returning the number of data rows written.
    pub fn finish(mut self) -> EtlResult<usize> {
        self.writer.flush()?;
        Ok(self.rows)
    }
}

pub fn write_csv_table<T: Serialize + CsvTable>(path: &Path, rows: &[T]) -> EtlResult<usize> {
    let mut sink = CsvSink::create(path)?;
    for row in rows {
        sink.write(row)?;
    }
    sink.finish()
}

/// Concatenate part files in the order given into `dest`.
/// The first part is copied whole; later parts lose their header line.
pub fn concat_parts(parts: &[PathBuf], dest: &Path) -> EtlResult<u64> {
    let mut out = BufWriter::new(File::create(dest)?);
    let mut bytes = 0u64;
    for (i, part) in parts.iter().enumerate() {
        let mut reader = BufReader::new(File::open(part)?);
        if i > 0 {
            let mut header = Vec::new();
            reader.read_until(b'\n', &mut header)?;
        }
        bytes += std::io::copy(&mut reader, &mut out)?;
    }
    out.flush()?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        meter_number: String,
        kwh: Option<f64>,
    }

    impl CsvTable for Row {
        const COLUMNS: &'static [&'static str] = &["meter_number", "kwh"];
    }

    #[test]
    fn empty_table_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_csv_table::<Row>(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "meter_number,kwh\n");
        assert!(read_csv_table::<Row>(&path).unwrap().is_empty());
    }

    #[test]
    fn concat_keeps_one_header() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        let c = dir.path().join("c.csv");
        write_csv_table(&a, &[Row { meter_number: "1".into(), kwh: Some(0.5) }]).unwrap();
        write_csv_table::<Row>(&b, &[]).unwrap();
        write_csv_table(&c, &[Row { meter_number: "2".into(), kwh: None }]).unwrap();

        let dest = dir.path().join("all.csv");
        concat_parts(&[a, b, c], &dest).unwrap();
        let rows: Vec<Row> = read_csv_table(&dest).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], Row { meter_number: "2".into(), kwh: None });
    }

    #[test]
    fn missing_header_column_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "meter_no,kwh\n1,0.5\n").unwrap();
        match read_csv_table::<Row>(&path) {
            Err(EtlError::MissingColumn { column, .. }) => assert_eq!(column, "meter_number"),
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }
}
