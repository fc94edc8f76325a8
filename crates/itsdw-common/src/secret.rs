//! Redacting wrapper for credentials

use std::fmt;

/// Number of leading characters shown by [`Secret::preview`]
pub const PREVIEW_CHARS: usize = 4;

/// A credential that never prints its full value.
///
/// `Debug` and `Display` both render a redacted form, so a `Secret` can sit
/// inside config structs that get logged with `?config`.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for handing to the HTTP client or database driver.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// First few characters followed by an ellipsis, e.g. `"abcd..."`.
    pub fn preview(&self) -> String {
        let head: String = self.0.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(\"{}\")", self.preview())
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}
