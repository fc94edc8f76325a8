//! ITSDW Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared pieces used by every ITSDW workspace member:
//!
//! - **Error Handling**: the common error type and result alias
//! - **Logging**: `tracing` subscriber setup driven by environment variables
//! - **Secrets**: a redacting wrapper for tokens and connection strings
//!
//! # Example
//!
//! ```no_run
//! use itsdw_common::logging::{init_logging, LogConfig};
//! use itsdw_common::Secret;
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     let token = Secret::new("abcd1234");
//!     tracing::info!(token = %token.preview(), "Token loaded");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod secret;

// Re-export commonly used types
pub use error::{ItsdwError, Result};
pub use secret::Secret;
