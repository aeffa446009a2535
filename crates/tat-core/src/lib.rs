//! Core types and pure computations for turnaround-time analytics.
//!
//! Decodes sample-lifecycle records from either export schema, resolves
//! per-stage durations, builds calendar buckets and scores turnaround
//! against targets. Nothing in this crate performs I/O except the settings
//! helpers used by the command-line front end.

pub mod calculations;
pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod models;
pub mod periods;
pub mod scoring;
pub mod settings;
pub mod time_utils;

pub use error::{Result, TatError};
