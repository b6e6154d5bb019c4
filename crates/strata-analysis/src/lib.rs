//! Streaming table pipelines built on the Strata accumulators.
//!
//! Every pipeline reads a tab-delimited table with a header row from a
//! re-openable [`TableSource`](source::TableSource), resolves its column names
//! once, and then makes one or more full passes over the data. Nothing but
//! accumulator state is kept between passes.
//!
//! # Pipelines
//!
//! - [`grouped`]: Count, mean, variance and standard deviation of a value column
//!   for every label of one or more factors, in a single pass
//! - [`serial`]: Serial mean normalization over an ordered chain of factors
//!   (one pass per factor plus one output pass)
//! - [`var_norm`]: Standardization within the groups of one factor
//! - [`regression`]: Two-pass `y ~ x` fits, residuals, predictions, persisted
//!   models and the chromosome coverage model
//! - [`hypothesis`]: Batches of t-tests and F-tests between selected groups
//! - [`scaling`]: Conversion of test results into model units
//! - [`column_ops`]: Derived columns: differences, allele fractions, window
//!   starts and combined labels
//! - [`correlation`]: Per-group correlation of two columns
//!
//! # Plumbing
//!
//! - [`source`]: Re-openable plain, gzip and in-memory sources
//! - [`table`]: Table passes, header resolution, delimited output and field
//!   parsing
//! - [`model`]: Persisted model records and model tables
//! - [`error`]: Stage-qualified pipeline errors
//!
//! # Row-level leniency
//!
//! Rows that are too short or whose numeric fields do not parse are skipped
//! silently. Missing columns, missing groups and I/O failures abort the
//! pipeline with an [`AnalysisError`](error::AnalysisError).
//!
//! # Examples
//!
//! ```
//! use strata_analysis::{serial, source::MemorySource, table::TableWriter};
//!
//! let source = MemorySource::from("g\tvalue\nA\t1\nB\t2\nA\t3\nB\t4\n");
//! let mut writer = TableWriter::new(vec![]);
//! serial::normalize(&source, &mut writer, "value", &["g"]).unwrap();
//!
//! let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
//! assert_eq!(
//!     out,
//!     "g\tvalue\tnorm\nA\t1\t-1.000000\nB\t2\t-1.000000\nA\t3\t1.000000\nB\t4\t1.000000\n"
//! );
//! ```

pub mod column_ops;
pub mod correlation;
pub mod error;
pub mod grouped;
pub mod hypothesis;
pub mod model;
pub mod regression;
pub mod scaling;
pub mod serial;
pub mod source;
pub mod table;
pub mod var_norm;
