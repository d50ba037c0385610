//! Error types for the hook crate
//!
//! Construction-time validation fails fast with a typed variant; runtime
//! I/O failures wrap `std::io::Error` and propagate to the host training
//! loop without retry.

use std::path::PathBuf;

use thiserror::Error;

/// Hook errors
#[derive(Debug, Error)]
pub enum HookError {
    #[error("directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("invalid {name}: {value} (must be a whole number)")]
    NotWhole { name: String, value: f64 },

    #[error("invalid {name}: {value} (must be non-negative)")]
    Negative { name: String, value: f64 },

    #[error("invalid {name}: {value} (must be finite)")]
    NonFinite { name: String, value: f64 },

    #[error("invalid {name}: {value} (exceeds the supported range)")]
    OutOfRange { name: String, value: f64 },

    #[error("invalid save interval: 0 (must be positive)")]
    ZeroInterval,

    #[error("invalid factor: {0} (must be > 0)")]
    InvalidFactor(f64),

    #[error("unknown style parameter: {0} (see vigia::style::known_keys())")]
    UnknownStyleKey(String),

    #[error("exactly one scheduling strategy must be set")]
    StrategyConflict,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chart rendering failed: {0}")]
    Render(String),

    #[error("optimizer state serialization failed: {0}")]
    Serialize(String),
}

/// Result type for hook operations
pub type Result<T> = std::result::Result<T, HookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HookError::MissingDirectory(PathBuf::from("/no/such/dir"));
        assert!(err.to_string().contains("/no/such/dir"));

        let err = HookError::NotWhole { name: "each_n".into(), value: 1.5 };
        assert!(err.to_string().contains("each_n"));
        assert!(err.to_string().contains("whole"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: HookError = io.into();
        assert!(matches!(err, HookError::Io(_)));
    }
}
