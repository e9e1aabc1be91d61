/// Structured error types for clubhub-core.
///
/// Library consumers get composable `thiserror` enums; the CLI wraps them in
/// `anyhow` at the edges.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for clubhub-core operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Config file could not be parsed
    #[error("Invalid config file {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Config could not be serialized
    #[error("Failed to render config: {source}")]
    ConfigRender {
        #[from]
        source: toml::ser::Error,
    },

    /// Explicitly requested config file does not exist
    #[error("Config not found at {path:?}")]
    ConfigMissing { path: PathBuf },

    /// Environment override carried an unusable value
    #[error("Invalid value for {var}: {reason}")]
    InvalidEnv { var: &'static str, reason: String },

    /// String did not name a known variant
    #[error("invalid {kind} value: '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Result type alias for clubhub-core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create an unknown-variant error
    pub fn unknown_variant(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.into(),
        }
    }

    /// Create an invalid environment override error
    pub fn invalid_env(var: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidEnv {
            var,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::unknown_variant("club role", "president");
        assert_eq!(err.to_string(), "invalid club role value: 'president'");

        let err = CoreError::invalid_env("CLUBHUB_TOKEN_TTL_SECS", "not a number");
        assert!(err.to_string().contains("CLUBHUB_TOKEN_TTL_SECS"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: CoreError = io_err.into();

        assert!(matches!(err, CoreError::Io { .. }));
    }
}
