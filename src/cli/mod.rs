//! CLI command handlers

pub mod commands;

pub use commands::{aggregations, report, validate};
