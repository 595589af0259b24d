//! The on-disk archive format: one snappy-compressed parquet file per
//! month, named `events_<window_id>.parquet`.

use std::{
  fs::File,
  path::{Path, PathBuf},
  sync::Arc,
};

use arrow::{
  array::{StringArray, TimestampMicrosecondArray},
  datatypes::{DataType, Field, Schema, TimeUnit},
  record_batch::RecordBatch,
};
use chrono::DateTime;
use flotsam_core::event::NewEvent;
use parquet::{
  arrow::{ArrowWriter, arrow_reader::ParquetRecordBatchReaderBuilder},
  basic::Compression,
  file::properties::WriterProperties,
};

use crate::{Error, Result};

/// Rows per record batch during export. Bounds memory for large months.
pub const EXPORT_CHUNK_ROWS: usize = 8_192;

pub fn archive_file_path(dir: &Path, window_id: &str) -> PathBuf {
  dir.join(format!("events_{window_id}.parquet"))
}

fn schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("source_id", DataType::Utf8, false),
    Field::new(
      "observed_at",
      DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
      false,
    ),
    Field::new("subject_token", DataType::Utf8, false),
    Field::new("content_text", DataType::Utf8, false),
  ]))
}

fn chunk_batch(records: &[NewEvent]) -> Result<RecordBatch> {
  let source = StringArray::from_iter_values(records.iter().map(|r| r.source_id.as_str()));
  let observed = TimestampMicrosecondArray::from_iter_values(
    records.iter().map(|r| r.observed_at.timestamp_micros()),
  )
  .with_timezone("UTC");
  let subject =
    StringArray::from_iter_values(records.iter().map(|r| r.subject_token.as_str()));
  let content =
    StringArray::from_iter_values(records.iter().map(|r| r.content_text.as_str()));

  let batch = RecordBatch::try_new(schema(), vec![
    Arc::new(source),
    Arc::new(observed),
    Arc::new(subject),
    Arc::new(content),
  ])?;
  Ok(batch)
}

/// Export `records` to `path`, returning the row count the parquet footer
/// reports. The caller checks that count against the store before
/// trusting the file.
pub fn write_archive(path: &Path, records: &[NewEvent]) -> Result<u64> {
  let file = File::create(path)?;
  let props = WriterProperties::builder()
    .set_compression(Compression::SNAPPY)
    .build();
  let mut writer = ArrowWriter::try_new(file, schema(), Some(props))?;
  for chunk in records.chunks(EXPORT_CHUNK_ROWS) {
    writer.write(&chunk_batch(chunk)?)?;
  }
  let metadata = writer.close()?;
  Ok(metadata.num_rows as u64)
}

/// Row count from the footer alone, without decoding any data pages.
pub fn archive_row_count(path: &Path) -> Result<u64> {
  let file = File::open(path)?;
  let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
  Ok(builder.metadata().file_metadata().num_rows() as u64)
}

/// Load a whole archive file back into events, for the rebuild path.
pub fn read_archive(path: &Path) -> Result<Vec<NewEvent>> {
  let file = File::open(path)?;
  let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

  let mut out = Vec::new();
  for batch in reader {
    let batch = batch?;
    let source = string_column(&batch, 0, "source_id")?;
    let observed = batch
      .column(1)
      .as_any()
      .downcast_ref::<TimestampMicrosecondArray>()
      .ok_or(Error::ArchiveSchema("observed_at"))?;
    let subject = string_column(&batch, 2, "subject_token")?;
    let content = string_column(&batch, 3, "content_text")?;

    for i in 0..batch.num_rows() {
      let observed_at = DateTime::from_timestamp_micros(observed.value(i))
        .ok_or(Error::ArchiveTimestamp)?;
      out.push(NewEvent {
        source_id: source.value(i).to_owned(),
        observed_at,
        subject_token: subject.value(i).to_owned(),
        content_text: content.value(i).to_owned(),
      });
    }
  }
  Ok(out)
}

fn string_column<'a>(
  batch: &'a RecordBatch,
  index: usize,
  name: &'static str,
) -> Result<&'a StringArray> {
  batch
    .column(index)
    .as_any()
    .downcast_ref::<StringArray>()
    .ok_or(Error::ArchiveSchema(name))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
