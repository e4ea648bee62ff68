//! Typed Parquet I/O for the Silver and Gold layers.
//!
//! The Arrow schema is traced with `serde_arrow`, from the row type or from
//! `ParquetTable::schema_sample` when the row carries chrono values. Columns
//! listed in `ParquetTable::TYPED_COLUMNS` are then retyped so dates land as
//! Date32, timestamps as milliseconds and low-cardinality strings as
//! dictionaries. Files are Snappy-compressed.

use crate::error::{EtlError, EtlResult};
use crate::records::ParquetTable;
use arrow::datatypes::{DataType, Field, FieldRef, Schema, TimeUnit};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_arrow::schema::{SchemaLike, TracingOptions};
use serde_arrow::{from_record_batch, to_record_batch};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

const BATCH_ROWS: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Date,
    Timestamp,
    Category,
}

impl ColumnKind {
    fn data_type(self) -> DataType {
        match self {
            Self::Date => DataType::Date32,
            Self::Timestamp => DataType::Timestamp(TimeUnit::Millisecond, None),
            Self::Category => {
                DataType::Dictionary(Box::new(DataType::UInt32), Box::new(DataType::LargeUtf8))
            }
        }
    }
}

/// Arrow fields for `T` with its typed-column overrides applied.
pub fn fields_for<T>() -> EtlResult<Vec<FieldRef>>
where
    T: Serialize + DeserializeOwned + ParquetTable,
{
    let options = TracingOptions::default().enums_without_data_as_strings(true);
    let traced = match T::schema_sample() {
        Some(sample) => Vec::<FieldRef>::from_samples(std::slice::from_ref(&sample), options)?,
        None => Vec::<FieldRef>::from_type::<T>(options)?,
    };
    if let Some(field) = traced.iter().find(|f| f.data_type() == &DataType::Null) {
        return Err(EtlError::Other(anyhow::anyhow!(
            "column '{}' has no type; the schema sample leaves it empty",
            field.name()
        )));
    }
    Ok(traced
        .into_iter()
        .map(|field| {
            match T::TYPED_COLUMNS.iter().find(|(name, _)| *name == field.name().as_str()) {
                Some((_, kind)) => {
                    Arc::new(Field::new(field.name(), kind.data_type(), field.is_nullable()))
                }
                None => field,
            }
        })
        .collect())
}

/// Write all rows to `path`, returning the row count.
pub fn write_parquet_table<T>(path: &Path, rows: &[T]) -> EtlResult<usize>
where
    T: Serialize + DeserializeOwned + ParquetTable,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let fields = fields_for::<T>()?;
    let schema = Arc::new(Schema::new(fields.clone()));
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(File::create(path)?, schema, Some(props))?;

    for chunk in rows.chunks(BATCH_ROWS) {
        let batch = to_record_batch(&fields, &chunk)?;
        writer.write(&batch)?;
    }
    writer.close()?;
    log::debug!("parquet: wrote {} rows to {}", rows.len(), path.display());
    Ok(rows.len())
}

/// Read a whole Parquet file back into rows.
pub fn read_parquet_table<T: DeserializeOwned>(path: &Path) -> EtlResult<Vec<T>> {
    if !path.is_file() {
        return Err(EtlError::MissingInput { path: path.to_path_buf() });
    }
    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?
        .with_batch_size(BATCH_ROWS)
        .build()?;

    let mut rows = Vec::new();
    for batch in reader {
        let mut chunk: Vec<T> = from_record_batch(&batch?)?;
        rows.append(&mut chunk);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        at: NaiveDateTime,
        day: Option<NaiveDate>,
        city: String,
        kwh: f64,
    }

    impl ParquetTable for Sample {
        const TYPED_COLUMNS: &'static [(&'static str, ColumnKind)] = &[
            ("at", ColumnKind::Timestamp),
            ("day", ColumnKind::Date),
            ("city", ColumnKind::Category),
        ];

        fn schema_sample() -> Option<Self> {
            Some(Sample {
                at: NaiveDateTime::default(),
                day: Some(NaiveDate::default()),
                city: String::new(),
                kwh: 0.0,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Unsampled {
        day: Option<NaiveDate>,
    }

    impl ParquetTable for Unsampled {
        fn schema_sample() -> Option<Self> {
            Some(Unsampled { day: None })
        }
    }

    #[test]
    fn typed_columns_are_retyped() {
        let fields = fields_for::<Sample>().unwrap();
        assert_eq!(fields[0].data_type(), &DataType::Timestamp(TimeUnit::Millisecond, None));
        assert_eq!(fields[1].data_type(), &DataType::Date32);
        assert!(fields[1].is_nullable());
        assert!(matches!(fields[2].data_type(), DataType::Dictionary(_, _)));
        assert_eq!(fields[3].data_type(), &DataType::Float64);
    }

    #[test]
    fn empty_sample_column_is_rejected() {
        assert!(fields_for::<Unsampled>().is_err());
    }

    #[test]
    fn silver_and_gold_rows_trace_with_typed_columns() {
        use crate::records::{MeterRecord, PaymentRecord, SilverReading};
        use crate::reshaper::dimensions::DimDate;
        use crate::reshaper::facts::FactBill;

        let meters = fields_for::<MeterRecord>().unwrap();
        let connected = meters.iter().find(|f| f.name() == "connection_date").unwrap();
        assert_eq!(connected.data_type(), &DataType::Date32);
        assert!(!connected.is_nullable());
        let warranty = meters.iter().find(|f| f.name() == "warranty_expiry").unwrap();
        assert!(warranty.is_nullable());

        let readings = fields_for::<SilverReading>().unwrap();
        assert_eq!(readings[0].data_type(), &DataType::Timestamp(TimeUnit::Millisecond, None));
        let flag = readings.iter().find(|f| f.name() == "data_quality_flag").unwrap();
        assert!(matches!(flag.data_type(), DataType::Dictionary(_, _)));

        let payments = fields_for::<PaymentRecord>().unwrap();
        let method = payments.iter().find(|f| f.name() == "payment_method").unwrap();
        assert!(method.is_nullable());

        assert_eq!(fields_for::<DimDate>().unwrap()[1].data_type(), &DataType::Date32);
        let bills = fields_for::<FactBill>().unwrap();
        let rate = bills.iter().find(|f| f.name() == "rate_per_kwh").unwrap();
        assert_eq!(rate.data_type(), &DataType::Float64);
        assert!(rate.is_nullable());
    }

    #[test]
    fn rows_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.parquet");
        let rows = vec![
            Sample {
                at: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(13, 15, 0).unwrap(),
                day: NaiveDate::from_ymd_opt(2024, 1, 1),
                city: "Attock".into(),
                kwh: 0.125,
            },
            Sample {
                at: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap(),
                day: None,
                city: "Jhelum".into(),
                kwh: 3.5,
            },
        ];
        assert_eq!(write_parquet_table(&path, &rows).unwrap(), 2);
        let back: Vec<Sample> = read_parquet_table(&path).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn empty_table_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.parquet");
        write_parquet_table::<Sample>(&path, &[]).unwrap();
        let back: Vec<Sample> = read_parquet_table(&path).unwrap();
        assert!(back.is_empty());
    }
}
