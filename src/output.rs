//! JSON output types for CLI responses.
//!
//! Every response is a single JSON document with `status` as its first
//! field and a `schema_version`. Successful responses carry `"ok"`, failures
//! an [`ErrorResponse`] with the numeric [`OutputErrorCode`].
//!
//! Output is deterministic: diagnostics are sorted by file, position and
//! rule id, and patches list edits by file then offset.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use dpcheck_core::diagnostics::{Diagnostic, DiagnosticDescriptor, Severity};
use dpcheck_core::error::{DpcheckError, OutputErrorCode};
use dpcheck_core::types::Location;
use dpcheck_wpf::rules::{Rule, Trigger};
use dpcheck_wpf::CodeAction;

pub use dpcheck_core::patch::{MaterializedPatch as Patch, OutputEdit as Edit};

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Rules
// ============================================================================

/// One row of the rule table.
#[derive(Debug, Clone, Serialize)]
pub struct RuleInfo {
    #[serde(flatten)]
    pub descriptor: DiagnosticDescriptor,
    /// `field` or `property`.
    pub trigger: &'static str,
}

impl From<&Rule> for RuleInfo {
    fn from(rule: &Rule) -> Self {
        RuleInfo {
            descriptor: rule.descriptor.clone(),
            trigger: match rule.trigger {
                Trigger::Field => "field",
                Trigger::Property => "property",
            },
        }
    }
}

/// Response for `dpcheck rules`.
#[derive(Debug, Clone, Serialize)]
pub struct RulesResponse {
    pub status: String,
    pub schema_version: String,
    pub rules: Vec<RuleInfo>,
}

impl RulesResponse {
    pub fn new(rules: &[Rule]) -> Self {
        RulesResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            rules: rules.iter().map(RuleInfo::from).collect(),
        }
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// Diagnostic counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub files: u32,
    pub errors: u32,
    pub warnings: u32,
}

/// Response for `dpcheck analyze`.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub status: String,
    pub schema_version: String,
    pub summary: Summary,
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalyzeResponse {
    pub fn new(files: usize, diagnostics: Vec<Diagnostic>) -> Self {
        let mut summary = Summary {
            files: files as u32,
            ..Summary::default()
        };
        for diagnostic in &diagnostics {
            match diagnostic.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
            }
        }
        AnalyzeResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            summary,
            diagnostics,
        }
    }
}

// ============================================================================
// Fixes
// ============================================================================

/// Response for `dpcheck fix`.
#[derive(Debug, Clone, Serialize)]
pub struct FixResponse {
    pub status: String,
    pub schema_version: String,
    /// The diagnostic being fixed.
    pub diagnostic: Diagnostic,
    pub action: CodeAction,
    pub patch: Patch,
    /// Paths written back, when the fix was applied to source files.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub written: Vec<String>,
}

impl FixResponse {
    pub fn new(diagnostic: Diagnostic, action: CodeAction, patch: Patch) -> Self {
        FixResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            diagnostic,
            action,
            patch,
            written: Vec::new(),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error information for error responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Numeric error code.
    pub code: u8,
    /// Human-readable message.
    pub message: String,
    /// Where the error occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl ErrorInfo {
    pub fn from_error(err: &DpcheckError) -> Self {
        let location = match err {
            DpcheckError::SymbolNotFound { file, line, col } => {
                Some(Location::new(file.clone(), *line, *col))
            }
            _ => None,
        };
        ErrorInfo {
            code: OutputErrorCode::from(err).code(),
            message: err.to_string(),
            location,
        }
    }
}

/// Error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn from_error(err: &DpcheckError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

/// Emit a response as pretty-printed JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dpcheck_wpf::rules::RULES;

    #[test]
    fn status_is_the_first_field() {
        let json = serde_json::to_string(&RulesResponse::new(RULES)).unwrap();
        assert!(json.starts_with(r#"{"status":"ok","schema_version":"1""#), "{json}");

        let err = DpcheckError::invalid_args("bad");
        let json = serde_json::to_string(&ErrorResponse::from_error(&err)).unwrap();
        assert!(json.starts_with(r#"{"status":"error""#), "{json}");
    }

    #[test]
    fn rule_rows_flatten_the_descriptor() {
        let response = RulesResponse::new(RULES);
        let value = serde_json::to_value(&response).unwrap();
        let first = &value["rules"][0];
        assert_eq!(first["id"], "WPF0001");
        assert_eq!(first["trigger"], "field");
        assert_eq!(first["message_format"], "Field '{0}' should be named '{1}'");
    }

    #[test]
    fn summary_counts_severities() {
        let response = AnalyzeResponse::new(3, Vec::new());
        assert_eq!(
            response.summary,
            Summary {
                files: 3,
                errors: 0,
                warnings: 0
            }
        );
    }

    #[test]
    fn error_info_carries_code_and_location() {
        let err = DpcheckError::symbol_not_found("Foo.cs", 4, 9);
        let info = ErrorInfo::from_error(&err);
        assert_eq!(info.code, 3);
        assert_eq!(info.location, Some(Location::new("Foo.cs", 4, 9)));
        assert_eq!(ErrorInfo::from_error(&DpcheckError::internal("x")).code, 10);
    }
}
