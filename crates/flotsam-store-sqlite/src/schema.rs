//! SQL schema for the flotsam SQLite live store.
//!
//! Executed once at connection startup. Future migrations will be gated
//! on `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Raw observed events. The batch writer is the only producer; the
-- archival engine is the only deleter, and only whole windows at a time.
-- Deliberately no secondary indexes: insert throughput over read speed.
CREATE TABLE IF NOT EXISTS events (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id     TEXT NOT NULL,
    observed_at   TEXT NOT NULL,   -- fixed-width RFC 3339 UTC
    subject_token TEXT NOT NULL,
    content_text  TEXT NOT NULL
);

-- One row per exported month. 'deleted' records that the month's live
-- rows were purged; it is never reset to 0.
CREATE TABLE IF NOT EXISTS archive_entries (
    window_id       TEXT PRIMARY KEY,  -- 'YYYY-MM'
    file_path       TEXT NOT NULL,
    record_count    INTEGER NOT NULL,
    file_size_bytes INTEGER NOT NULL,
    archived_at     TEXT NOT NULL,
    deleted         INTEGER NOT NULL DEFAULT 0
);

-- All-time totals. The single place historical magnitude survives the
-- physical deletion of archived rows.
CREATE TABLE IF NOT EXISTS cumulative_stats (
    id                          INTEGER PRIMARY KEY CHECK (id = 1),
    total_records               INTEGER NOT NULL,
    total_distinct_subjects     INTEGER NOT NULL,
    total_distinct_content      INTEGER NOT NULL,
    total_subject_content_pairs INTEGER NOT NULL,
    first_seen                  TEXT,
    last_seen                   TEXT,
    per_source_totals           TEXT NOT NULL DEFAULT '{}',  -- JSON object
    updated_at                  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS period_top (
    window_kind        TEXT NOT NULL,  -- 'week' | 'month'
    window_id          TEXT NOT NULL,
    normalized_content TEXT NOT NULL,
    distinct_subjects  INTEGER NOT NULL,
    total_occurrences  INTEGER NOT NULL,
    rank               INTEGER NOT NULL,
    UNIQUE (window_kind, window_id, normalized_content)
);

CREATE TABLE IF NOT EXISTS period_length (
    window_kind            TEXT NOT NULL,
    window_id              TEXT NOT NULL,
    length_bucket          INTEGER NOT NULL,
    distinct_content_count INTEGER NOT NULL,
    UNIQUE (window_kind, window_id, length_bucket)
);

PRAGMA user_version = 1;
";
