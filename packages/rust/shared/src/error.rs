//! Error types for sitekit.
//!
//! Library crates use [`SiteError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::Stage;

/// Top-level error type for all sitekit operations.
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input that cannot be processed at all (non-UTF-8 text, empty directive keys).
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Malformed include or variable syntax in an HTML template.
    #[error("template error in {path:?}: {message}")]
    Template { path: PathBuf, message: String },

    /// A style or script transform rejected its input.
    #[error("{stage} transform failed for {path:?}: {message}")]
    Transform {
        stage: Stage,
        path: PathBuf,
        message: String,
    },

    /// Preview server could not start or crashed.
    #[error("server error: {0}")]
    Server(String),

    /// Filesystem watcher could not be registered.
    #[error("watch error: {0}")]
    Watch(String),

    /// Data validation error (bad glob, bad URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SiteError>;

impl SiteError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an invalid-input error from any displayable message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    /// Create a template error for the given file.
    pub fn template(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Template {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a transform error attributed to a stage and input file.
    pub fn transform(stage: Stage, path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Transform {
            stage,
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is an I/O "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SiteError::config("sitemap.url is required in production");
        assert_eq!(
            err.to_string(),
            "config error: sitemap.url is required in production"
        );

        let err = SiteError::transform(Stage::Styles, "src/styles/main.css", "unexpected token");
        let msg = err.to_string();
        assert!(msg.starts_with("styles transform failed"));
        assert!(msg.contains("main.css"));
    }

    #[test]
    fn not_found_detection() {
        let err = SiteError::io(
            "dist",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.is_not_found());

        let err = SiteError::io(
            "dist",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        assert!(!err.is_not_found());
    }
}
