//! Event types — one observed search notification and its stored form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The shape delivered by the network collaborator, before anonymization.
///
/// `subject_raw` never reaches the store; it is consumed by the
/// [`Anonymizer`](crate::anonymize::Anonymizer) and discarded.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSearch {
  pub source_id:    String,
  pub timestamp:    DateTime<Utc>,
  pub subject_raw:  String,
  pub content_text: String,
}

/// An anonymized record ready for the ingestion buffer.
///
/// `content_text` is kept verbatim; case/whitespace normalization happens
/// only at aggregation time, never destructively at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
  pub source_id:     String,
  pub observed_at:   DateTime<Utc>,
  pub subject_token: String,
  pub content_text:  String,
}

/// A stored event row. Written once, never mutated in place; eventually
/// copied into an archive file and optionally deleted from the live store.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
  pub id:            i64,
  pub source_id:     String,
  pub observed_at:   DateTime<Utc>,
  pub subject_token: String,
  pub content_text:  String,
}

impl From<EventRecord> for NewEvent {
  fn from(record: EventRecord) -> Self {
    NewEvent {
      source_id:     record.source_id,
      observed_at:   record.observed_at,
      subject_token: record.subject_token,
      content_text:  record.content_text,
    }
  }
}
