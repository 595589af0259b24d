//! [`SqliteStore`] — the SQLite implementation of [`EventStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use flotsam_core::{
  event::{EventRecord, NewEvent},
  period::{ContentStat, PeriodLengthEntry, PeriodTopEntry},
  stats::{BatchStats, CumulativeStats},
  store::{ArchiveEntry, EventStore},
  window::{Window, WindowKind},
};
use rusqlite::OptionalExtension as _;

use crate::{
  Error, Result,
  encode::{RawArchiveEntry, RawCumulative, RawEvent, boxed, decode_dt, encode_dt, encode_kind},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A flotsam live store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Cumulative row helpers ──────────────────────────────────────────────────
//
// These run inside an open transaction so the read-modify-write of the
// totals row commits (or rolls back) together with the batch insert.

fn read_cumulative_row(
  conn: &rusqlite::Connection,
) -> tokio_rusqlite::Result<Option<CumulativeStats>> {
  let raw: Option<RawCumulative> = conn
    .query_row(
      "SELECT total_records, total_distinct_subjects, total_distinct_content,
              total_subject_content_pairs, first_seen, last_seen, per_source_totals
       FROM cumulative_stats WHERE id = 1",
      [],
      |row| {
        Ok(RawCumulative {
          total_records:               row.get(0)?,
          total_distinct_subjects:     row.get(1)?,
          total_distinct_content:      row.get(2)?,
          total_subject_content_pairs: row.get(3)?,
          first_seen:                  row.get(4)?,
          last_seen:                   row.get(5)?,
          per_source_totals:           row.get(6)?,
        })
      },
    )
    .optional()?;

  raw.map(|r| r.into_stats().map_err(boxed)).transpose()
}

fn write_cumulative_row(
  conn: &rusqlite::Connection,
  stats: &CumulativeStats,
) -> tokio_rusqlite::Result<()> {
  let per_source = serde_json::to_string(&stats.per_source_totals).map_err(boxed)?;
  conn.execute(
    "INSERT OR REPLACE INTO cumulative_stats (
       id, total_records, total_distinct_subjects, total_distinct_content,
       total_subject_content_pairs, first_seen, last_seen, per_source_totals,
       updated_at
     ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    rusqlite::params![
      stats.total_records,
      stats.total_distinct_subjects,
      stats.total_distinct_content,
      stats.total_subject_content_pairs,
      stats.first_seen.map(encode_dt),
      stats.last_seen.map(encode_dt),
      per_source,
      encode_dt(Utc::now()),
    ],
  )?;
  Ok(())
}

// ─── EventStore impl ─────────────────────────────────────────────────────────

impl EventStore for SqliteStore {
  type Error = Error;

  // ── Ingestion ─────────────────────────────────────────────────────────────

  async fn write_batch(&self, records: Vec<NewEvent>, stats: BatchStats) -> Result<u64> {
    if records.is_empty() {
      return Ok(0);
    }

    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare_cached(
            "INSERT INTO events (source_id, observed_at, subject_token, content_text)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          for record in &records {
            stmt.execute(rusqlite::params![
              record.source_id,
              encode_dt(record.observed_at),
              record.subject_token,
              record.content_text,
            ])?;
          }
        }

        let mut cumulative = read_cumulative_row(&tx)?.unwrap_or_default();
        cumulative.absorb(&stats);
        write_cumulative_row(&tx, &cumulative)?;

        tx.commit()?;
        Ok(records.len() as u64)
      })
      .await?;

    Ok(written)
  }

  // ── Cumulative stats ──────────────────────────────────────────────────────

  async fn cumulative(&self) -> Result<Option<CumulativeStats>> {
    Ok(self.conn.call(|conn| read_cumulative_row(conn)).await?)
  }

  async fn put_cumulative(&self, stats: CumulativeStats) -> Result<()> {
    self
      .conn
      .call(move |conn| write_cumulative_row(conn, &stats))
      .await?;
    Ok(())
  }

  // ── Range queries ─────────────────────────────────────────────────────────

  async fn observed_range(&self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
    let bounds: Option<(String, String)> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT MIN(observed_at), MAX(observed_at) FROM events",
              [],
              |row| {
                let min: Option<String> = row.get(0)?;
                let max: Option<String> = row.get(1)?;
                Ok(min.zip(max))
              },
            )
            .optional()?
            .flatten(),
        )
      })
      .await?;

    bounds
      .map(|(min, max)| Ok((decode_dt(&min)?, decode_dt(&max)?)))
      .transpose()
  }

  async fn stale_months(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
    let cutoff_str = encode_dt(cutoff);
    let months = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT substr(observed_at, 1, 7) AS month
           FROM events
           GROUP BY month
           HAVING MAX(observed_at) < ?1
              AND month NOT IN (SELECT window_id FROM archive_entries WHERE deleted = 1)
           ORDER BY month",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![cutoff_str], |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(months)
  }

  async fn window_events(&self, window: &Window) -> Result<Vec<EventRecord>> {
    let (start, end) = (encode_dt(window.start), encode_dt(window.end));
    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, source_id, observed_at, subject_token, content_text
           FROM events
           WHERE observed_at >= ?1 AND observed_at < ?2
           ORDER BY observed_at, id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![start, end], |row| {
            Ok(RawEvent {
              id:            row.get(0)?,
              source_id:     row.get(1)?,
              observed_at:   row.get(2)?,
              subject_token: row.get(3)?,
              content_text:  row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_record).collect()
  }

  async fn window_event_count(&self, window: &Window) -> Result<u64> {
    let (start, end) = (encode_dt(window.start), encode_dt(window.end));
    let count = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM events WHERE observed_at >= ?1 AND observed_at < ?2",
          rusqlite::params![start, end],
          |row| row.get::<_, u64>(0),
        )?)
      })
      .await?;
    Ok(count)
  }

  async fn delete_window_events(&self, window: &Window) -> Result<u64> {
    let (start, end) = (encode_dt(window.start), encode_dt(window.end));
    let removed = self
      .conn
      .call(move |conn| {
        // Single statement: its implicit transaction is scoped to exactly
        // this key range.
        let n = conn.execute(
          "DELETE FROM events WHERE observed_at >= ?1 AND observed_at < ?2",
          rusqlite::params![start, end],
        )?;
        Ok(n as u64)
      })
      .await?;
    Ok(removed)
  }

  // ── Archive metadata ──────────────────────────────────────────────────────

  async fn archive_entry(&self, window_id: &str) -> Result<Option<ArchiveEntry>> {
    let id = window_id.to_owned();
    let raw: Option<RawArchiveEntry> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT window_id, file_path, record_count, file_size_bytes, archived_at, deleted
               FROM archive_entries WHERE window_id = ?1",
              rusqlite::params![id],
              archive_entry_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawArchiveEntry::into_entry).transpose()
  }

  async fn list_archive_entries(&self) -> Result<Vec<ArchiveEntry>> {
    let raws: Vec<RawArchiveEntry> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT window_id, file_path, record_count, file_size_bytes, archived_at, deleted
           FROM archive_entries ORDER BY window_id",
        )?;
        let rows = stmt
          .query_map([], archive_entry_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawArchiveEntry::into_entry).collect()
  }

  async fn record_archive(&self, entry: ArchiveEntry) -> Result<()> {
    let file_path = entry.file_path.to_string_lossy().into_owned();
    let archived_at = encode_dt(entry.archived_at);
    self
      .conn
      .call(move |conn| {
        // On conflict the file metadata is refreshed but an existing
        // deleted flag is kept: that transition is one-way.
        conn.execute(
          "INSERT INTO archive_entries
             (window_id, file_path, record_count, file_size_bytes, archived_at, deleted)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT(window_id) DO UPDATE SET
             file_path       = excluded.file_path,
             record_count    = excluded.record_count,
             file_size_bytes = excluded.file_size_bytes,
             archived_at     = excluded.archived_at",
          rusqlite::params![
            entry.window_id,
            file_path,
            entry.record_count,
            entry.file_size_bytes,
            archived_at,
            entry.deleted,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn mark_archive_purged(&self, window_id: &str) -> Result<()> {
    let id = window_id.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE archive_entries SET deleted = 1 WHERE window_id = ?1",
          rusqlite::params![id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Period aggregates ─────────────────────────────────────────────────────

  async fn content_stats(&self, window: &Window) -> Result<Vec<ContentStat>> {
    let (start, end) = (encode_dt(window.start), encode_dt(window.end));
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT LOWER(TRIM(content_text)) AS normalized,
                  COUNT(DISTINCT subject_token),
                  COUNT(*)
           FROM events
           WHERE observed_at >= ?1 AND observed_at < ?2
           GROUP BY normalized",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![start, end], |row| {
            Ok(ContentStat {
              normalized_content: row.get(0)?,
              distinct_subjects:  row.get(1)?,
              total_occurrences:  row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn replace_period_rows(
    &self,
    kind: WindowKind,
    window_id: String,
    top: Vec<PeriodTopEntry>,
    length: Vec<PeriodLengthEntry>,
  ) -> Result<()> {
    let kind_str = encode_kind(kind);
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM period_top WHERE window_kind = ?1 AND window_id = ?2",
          rusqlite::params![kind_str, window_id],
        )?;
        tx.execute(
          "DELETE FROM period_length WHERE window_kind = ?1 AND window_id = ?2",
          rusqlite::params![kind_str, window_id],
        )?;
        {
          let mut stmt = tx.prepare_cached(
            "INSERT INTO period_top
               (window_kind, window_id, normalized_content, distinct_subjects,
                total_occurrences, rank)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          )?;
          for entry in &top {
            stmt.execute(rusqlite::params![
              kind_str,
              window_id,
              entry.normalized_content,
              entry.distinct_subjects,
              entry.total_occurrences,
              entry.rank,
            ])?;
          }
        }
        {
          let mut stmt = tx.prepare_cached(
            "INSERT INTO period_length
               (window_kind, window_id, length_bucket, distinct_content_count)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          for entry in &length {
            stmt.execute(rusqlite::params![
              kind_str,
              window_id,
              entry.length_bucket,
              entry.distinct_content_count,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn period_top(&self, kind: WindowKind, window_id: &str) -> Result<Vec<PeriodTopEntry>> {
    let kind_str = encode_kind(kind);
    let id = window_id.to_owned();
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT window_id, normalized_content, distinct_subjects, total_occurrences, rank
           FROM period_top
           WHERE window_kind = ?1 AND window_id = ?2
           ORDER BY rank",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![kind_str, id], |row| {
            Ok(PeriodTopEntry {
              window_kind:        kind,
              window_id:          row.get(0)?,
              normalized_content: row.get(1)?,
              distinct_subjects:  row.get(2)?,
              total_occurrences:  row.get(3)?,
              rank:               row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn period_length(
    &self,
    kind: WindowKind,
    window_id: &str,
  ) -> Result<Vec<PeriodLengthEntry>> {
    let kind_str = encode_kind(kind);
    let id = window_id.to_owned();
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT window_id, length_bucket, distinct_content_count
           FROM period_length
           WHERE window_kind = ?1 AND window_id = ?2
           ORDER BY length_bucket",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![kind_str, id], |row| {
            Ok(PeriodLengthEntry {
              window_kind:            kind,
              window_id:              row.get(0)?,
              length_bucket:          row.get(1)?,
              distinct_content_count: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }
}

fn archive_entry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawArchiveEntry> {
  Ok(RawArchiveEntry {
    window_id:       row.get(0)?,
    file_path:       row.get(1)?,
    record_count:    row.get(2)?,
    file_size_bytes: row.get(3)?,
    archived_at:     row.get(4)?,
    deleted:         row.get(5)?,
  })
}
