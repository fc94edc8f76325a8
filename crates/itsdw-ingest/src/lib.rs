//! ITSDW Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Full-refresh loader from the ITS academic-records API into PostgreSQL.
//!
//! # Modules
//!
//! - [`coerce`]: loosely typed JSON scalars to column values
//! - [`source`]: the [`source::RecordSource`] seam and its HTTP client
//! - [`schema`]: drop and recreate the seven warehouse tables
//! - [`models`]: one typed row per table
//! - [`loader`]: conflict-ignoring batch inserts, one transaction per call
//! - [`consolidate`]: one enrollment per student out of overlapping streams
//! - [`pipeline`]: the phased run and its summary
//!
//! # Example
//!
//! ```no_run
//! use itsdw_ingest::config::IngestConfig;
//! use itsdw_ingest::pipeline::run_pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     config.validate()?;
//!     let summary = run_pipeline(&config).await?;
//!     println!("{} rows stored", summary.total_inserted());
//!     Ok(())
//! }
//! ```

pub mod coerce;
pub mod config;
pub mod consolidate;
pub mod db;
pub mod error;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod source;

pub use error::{PipelineError, PipelineResult};
pub use source::{ApiClient, FetchError, Record, RecordSource};
