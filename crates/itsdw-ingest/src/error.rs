//! Fatal pipeline errors
//!
//! Only configuration, connection, and schema failures stop a run. Fetch and
//! load failures are absorbed where they happen and never reach this type.

use itsdw_common::ItsdwError;
use thiserror::Error;

use crate::schema::SchemaError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ItsdwError),

    /// The HTTP client could not be built (TLS backend, invalid settings)
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Database connection failed: {0}. Check DATABASE_URL and that PostgreSQL is reachable.")]
    Connect(#[source] sqlx::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
