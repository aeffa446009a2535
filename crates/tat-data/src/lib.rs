//! Data layer for TAT Analytics.
//!
//! Discovers and decodes lifecycle record exports, aggregates stage
//! durations over time buckets and fixed windows, and runs the top-level
//! analysis pipeline.

pub mod aggregator;
pub mod analysis;
pub mod efficiency;
pub mod reader;
pub mod statistics;

pub use tat_core as core;
