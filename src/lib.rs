//! CRM analysis - value functions and aggregation over query result rows
//!
//! An analysis is described in YAML: the fields and joined tables of a CRM
//! query, computed values written in a small formula language, and the
//! result columns a report aggregates. Values may depend on lookups that
//! complete later; their results are stepped until they settle.
//!
//! # Features
//!
//! - Value formulas (`N[...]`, `T[...]`, `X[...]`, `L[...]`, `V[...]`,
//!   `JS[...](...)` and named functions such as `ROUND(...)`)
//! - Script formulas compiled once per analysis
//! - Sum, average, minimum, maximum, count, static and text aggregation
//! - Category and x-category breakdowns
//!
//! # Example
//!
//! ```no_run
//! use crm_analysis::config::{load_config, load_rows};
//! use crm_analysis::core::{Analysis, AnalysisReport};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("analysis.yaml"))?;
//! let rows = load_rows(Path::new("rows.yaml"))?;
//!
//! let analysis = Analysis::new(&config)?;
//! let report = AnalysisReport::new(&analysis).compute(&rows);
//!
//! println!("Categories: {}", report.categories.len());
//! # Ok::<(), crm_analysis::error::AnalysisError>(())
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod row;

pub use error::{AnalysisError, AnalysisResult};
pub use row::{RecordRow, ResultDelegate, ResultRow};
