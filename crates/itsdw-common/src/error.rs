//! Error types shared across ITSDW crates

use thiserror::Error;

/// Result type alias for ITSDW operations
pub type Result<T> = std::result::Result<T, ItsdwError>;

/// Main error type for ITSDW
#[derive(Error, Debug)]
pub enum ItsdwError {
    /// A required secret is absent from the environment
    #[error("Missing required setting {0}. Set it in the environment or in a .env file.")]
    MissingSecret(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ItsdwError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_secret_names_the_variable() {
        let err = ItsdwError::MissingSecret("API_KEY");
        assert!(err.to_string().contains("API_KEY"));
    }

    #[test]
    fn test_config_helper() {
        let err = ItsdwError::config("batch size must be positive");
        assert!(matches!(err, ItsdwError::Config(ref m) if m == "batch size must be positive"));
    }
}
