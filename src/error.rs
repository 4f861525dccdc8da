use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the codesnap library.
///
/// Structural failures (bad root, bad configuration) abort the run. Problems
/// with a single file never surface here: they become placeholder blocks
/// (see [`crate::SkipReason`]).
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Root directory missing or unreadable.
    #[error("Cannot scan '{path}': {message}")]
    Scan {
        /// Root path that was requested
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// Invalid exclusion pattern.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The invalid pattern
        pattern: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// Template rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// Git collaborator failure.
    #[error("Git operation failed: {message}")]
    Git {
        /// Error message (usually git's stderr)
        message: String,
    },

    /// The rendering worker pool could not be created.
    #[error("Failed to start worker pool: {message}")]
    WorkerPool {
        /// Error message
        message: String,
    },

    /// The run was cancelled before every part could be assembled.
    #[error("Run cancelled: {completed} complete part(s) kept, output is incomplete")]
    PartialResult {
        /// Number of parts assembled from fully rendered files
        completed: usize,
        /// Paths of those parts, each marked incomplete, if they were written
        written: Vec<PathBuf>,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a scan error for the given root.
    #[must_use]
    pub fn scan(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Scan {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: &tera::Error) -> Self {
        Self::Template {
            template: template.into(),
            message: source.to_string(),
        }
    }

    /// Creates an invalid pattern error.
    #[must_use]
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Creates a git error.
    #[must_use]
    pub fn git(message: impl Into<String>) -> Self {
        Self::Git {
            message: message.into(),
        }
    }

    /// Creates a partial result error.
    #[must_use]
    pub const fn partial(completed: usize, written: Vec<PathBuf>) -> Self {
        Self::PartialResult { completed, written }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::InvalidPattern { .. })
    }

    /// Returns true if this is a scan error.
    #[must_use]
    pub const fn is_scan(&self) -> bool {
        matches!(self, Self::Scan { .. })
    }

    /// Returns true if the run was cancelled.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        matches!(self, Self::PartialResult { .. })
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        Self::WorkerPool {
            message: e.to_string(),
        }
    }
}
