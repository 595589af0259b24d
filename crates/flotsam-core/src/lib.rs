//! Core types and trait definitions for the flotsam observation pipeline.
//!
//! This crate is deliberately free of database and I/O dependencies.
//! All other crates depend on it; it depends on nothing heavier than
//! `chrono` and `sha2`.

pub mod anonymize;
pub mod config;
pub mod error;
pub mod event;
pub mod period;
pub mod stats;
pub mod store;
pub mod text;
pub mod window;

pub use error::{Error, Result};
