//! Deterministic keyed anonymization of raw subject identifiers.
//!
//! The token is `hex(SHA-256(len(key) ‖ key ‖ raw))`. With a fixed key the
//! mapping is stable across process restarts, which is what lets downstream
//! aggregation count distinct subjects without ever storing a raw
//! identifier. Changing the key breaks subject continuity; that is an
//! accepted property, not a bug.

use sha2::{Digest, Sha256};

use crate::{
  Error, Result,
  event::{NewEvent, RawSearch},
};

/// Keyed anonymizer. Pure; no network or disk I/O.
#[derive(Clone)]
pub struct Anonymizer {
  key: Vec<u8>,
}

impl Anonymizer {
  /// Fails with [`Error::Config`] on an empty key — the pipeline refuses
  /// to ingest raw identifiers in clear text.
  pub fn new(key: &str) -> Result<Self> {
    if key.trim().is_empty() {
      return Err(Error::Config("anonymize_key must not be empty".into()));
    }
    Ok(Self { key: key.as_bytes().to_vec() })
  }

  /// Deterministic token for `raw` under this key.
  pub fn anonymize(&self, raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update((self.key.len() as u64).to_be_bytes());
    hasher.update(&self.key);
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
  }

  /// Turn a raw search into a [`NewEvent`], consuming the raw identifier.
  pub fn event(&self, raw: RawSearch) -> NewEvent {
    NewEvent {
      source_id:     raw.source_id,
      observed_at:   raw.timestamp,
      subject_token: self.anonymize(&raw.subject_raw),
      content_text:  raw.content_text,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn same_input_same_key_same_token() {
    let a = Anonymizer::new("research-key").unwrap();
    let b = Anonymizer::new("research-key").unwrap();
    assert_eq!(a.anonymize("alice"), a.anonymize("alice"));
    assert_eq!(a.anonymize("alice"), b.anonymize("alice"));
  }

  #[test]
  fn different_keys_differ() {
    let a = Anonymizer::new("key-one").unwrap();
    let b = Anonymizer::new("key-two").unwrap();
    assert_ne!(a.anonymize("alice"), b.anonymize("alice"));
  }

  #[test]
  fn different_inputs_differ() {
    let a = Anonymizer::new("research-key").unwrap();
    assert_ne!(a.anonymize("alice"), a.anonymize("bob"));
  }

  #[test]
  fn empty_key_is_a_config_error() {
    assert!(matches!(Anonymizer::new(""), Err(Error::Config(_))));
    assert!(matches!(Anonymizer::new("   "), Err(Error::Config(_))));
  }

  #[test]
  fn token_is_lowercase_hex() {
    let a = Anonymizer::new("research-key").unwrap();
    let token = a.anonymize("alice");
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
  }
}
