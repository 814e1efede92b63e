//! Error types and error code constants for dpcheck.
//!
//! Library code only fails at its edges: loading a snapshot or options file,
//! host cancellation, and applying a fix. Everything inside recognition and
//! rule evaluation degrades to "no diagnostic" instead.
//!
//! `DpcheckError` is the unified type the CLI renders; each subsystem error
//! bridges into it with `From`, and `OutputErrorCode` gives the stable exit
//! code:
//! - `2`: invalid arguments (bad input from caller)
//! - `3`: resolution errors (no symbol, diagnostic or fix at the location)
//! - `4`: apply errors (stale text, conflicting edits)
//! - `10`: internal errors

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use crate::types::Location;

// ============================================================================
// Subsystem Errors
// ============================================================================

/// The host's cancellation signal fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("analysis cancelled")]
pub struct Cancelled;

impl Cancelled {
    /// `Err(Cancelled)` once `token` has fired.
    pub fn check(token: &CancellationToken) -> Result<(), Cancelled> {
        if token.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A snapshot could not be loaded.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("cannot read snapshot {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("inconsistent snapshot: {message}")]
    Inconsistent { message: String },
}

/// Analyzer options could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read options {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid options JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid exclude pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes for JSON output and process exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller (bad input, malformed files).
    InvalidArguments = 2,
    /// Nothing to act on at the requested location.
    ResolutionError = 3,
    /// A fix could not be applied.
    ApplyError = 4,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for CLI output.
#[derive(Debug, Error)]
pub enum DpcheckError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// No symbol at the requested location.
    #[error("no symbol found at {file}:{line}:{col}")]
    SymbolNotFound { file: String, line: u32, col: u32 },

    /// No file with this path in the snapshot, or on disk.
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// No fix is available for this diagnostic.
    #[error("no fix for {rule_id} at {location}")]
    NoFix { rule_id: String, location: String },

    /// Proposed name is not a valid identifier.
    #[error("invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    /// Failed to apply changes.
    #[error("apply error: {message}")]
    ApplyError { message: String },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

impl From<&DpcheckError> for OutputErrorCode {
    fn from(err: &DpcheckError) -> Self {
        match err {
            DpcheckError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            DpcheckError::SymbolNotFound { .. } => OutputErrorCode::ResolutionError,
            DpcheckError::FileNotFound { .. } => OutputErrorCode::ResolutionError,
            DpcheckError::NoFix { .. } => OutputErrorCode::ResolutionError,
            DpcheckError::InvalidIdentifier { .. } => OutputErrorCode::InvalidArguments,
            DpcheckError::ApplyError { .. } => OutputErrorCode::ApplyError,
            DpcheckError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<DpcheckError> for OutputErrorCode {
    fn from(err: DpcheckError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Bridges
// ============================================================================

impl From<SnapshotError> for DpcheckError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Io { path, source } if source.kind() == io::ErrorKind::NotFound => {
                DpcheckError::FileNotFound {
                    path: path.to_string_lossy().into_owned(),
                }
            }
            other => DpcheckError::InvalidArguments {
                message: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for DpcheckError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io { path, source } if source.kind() == io::ErrorKind::NotFound => {
                DpcheckError::FileNotFound {
                    path: path.to_string_lossy().into_owned(),
                }
            }
            other => DpcheckError::InvalidArguments {
                message: other.to_string(),
            },
        }
    }
}

impl From<Cancelled> for DpcheckError {
    fn from(err: Cancelled) -> Self {
        DpcheckError::InternalError {
            message: err.to_string(),
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl DpcheckError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        DpcheckError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create a symbol not found error.
    pub fn symbol_not_found(file: impl Into<String>, line: u32, col: u32) -> Self {
        DpcheckError::SymbolNotFound {
            file: file.into(),
            line,
            col,
        }
    }

    /// Create a no-fix error.
    pub fn no_fix(rule_id: impl Into<String>, location: &Location) -> Self {
        DpcheckError::NoFix {
            rule_id: rule_id.into(),
            location: location.to_string(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        DpcheckError::InternalError {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod error_code_mapping {
        use super::*;

        #[test]
        fn symbol_not_found_maps_to_resolution_error() {
            let err = DpcheckError::symbol_not_found("Foo.cs", 42, 8);
            assert_eq!(err.error_code(), OutputErrorCode::ResolutionError);
            assert_eq!(err.error_code().code(), 3);
        }

        #[test]
        fn no_fix_maps_to_resolution_error() {
            let err = DpcheckError::no_fix("WPF0006", &Location::new("Foo.cs", 3, 9));
            assert_eq!(err.error_code(), OutputErrorCode::ResolutionError);
            assert_eq!(err.to_string(), "no fix for WPF0006 at Foo.cs:3:9");
        }

        #[test]
        fn invalid_identifier_maps_to_invalid_arguments() {
            let err = DpcheckError::InvalidIdentifier {
                name: "1Foo".to_string(),
                reason: "cannot start with a digit".to_string(),
            };
            assert_eq!(err.error_code().code(), 2);
        }

        #[test]
        fn apply_error_maps_to_apply_error() {
            let err = DpcheckError::ApplyError {
                message: "stale".to_string(),
            };
            assert_eq!(err.error_code().code(), 4);
        }

        #[test]
        fn cancelled_maps_to_internal_error() {
            let err = DpcheckError::from(Cancelled);
            assert_eq!(err.error_code().code(), 10);
            assert_eq!(err.to_string(), "internal error: analysis cancelled");
        }
    }

    mod bridges {
        use super::*;

        #[test]
        fn missing_snapshot_is_file_not_found() {
            let err = DpcheckError::from(SnapshotError::Io {
                path: PathBuf::from("snap.json"),
                source: io::Error::new(io::ErrorKind::NotFound, "gone"),
            });
            assert!(matches!(err, DpcheckError::FileNotFound { ref path } if path == "snap.json"));
        }

        #[test]
        fn bad_options_json_is_invalid_arguments() {
            let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
            let err = DpcheckError::from(ConfigError::Json(json_err));
            assert_eq!(err.error_code(), OutputErrorCode::InvalidArguments);
            assert!(err.to_string().starts_with("invalid arguments: invalid options JSON"));
        }
    }

    mod output_error_code {
        use super::*;

        #[test]
        fn code_values_are_stable() {
            assert_eq!(OutputErrorCode::InvalidArguments.code(), 2);
            assert_eq!(OutputErrorCode::ResolutionError.code(), 3);
            assert_eq!(OutputErrorCode::ApplyError.code(), 4);
            assert_eq!(OutputErrorCode::InternalError.code(), 10);
        }

        #[test]
        fn display_shows_code() {
            assert_eq!(format!("{}", OutputErrorCode::ApplyError), "4");
        }
    }
}
