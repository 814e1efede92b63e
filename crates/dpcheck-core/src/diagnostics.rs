//! Diagnostic descriptors and the diagnostic record handed to the host.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::SourceFile;
use crate::patch::{FileId, Span};
use crate::types::Location;

/// Reported severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Static description of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticDescriptor {
    /// Stable rule id, e.g. `WPF0001`.
    pub id: &'static str,
    /// Short title.
    pub title: &'static str,
    /// Message template with positional `{0}`, `{1}`, ... placeholders.
    pub message_format: &'static str,
    /// Grouping shown to users.
    pub category: &'static str,
    pub default_severity: Severity,
    pub enabled_by_default: bool,
    pub description: &'static str,
}

impl DiagnosticDescriptor {
    /// Render the message template with `args`.
    pub fn format_message<S: AsRef<str>>(&self, args: &[S]) -> String {
        format_message(self.message_format, args)
    }
}

/// Replace `{n}` placeholders in `template` with `args[n]`.
///
/// Placeholders without a matching argument are left as written.
pub fn format_message<S: AsRef<str>>(template: &str, args: &[S]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}');
        let arg = close
            .and_then(|close| after[..close].parse::<usize>().ok())
            .and_then(|index| args.get(index));
        match (close, arg) {
            (Some(close), Some(arg)) => {
                out.push_str(arg.as_ref());
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// A reported violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub location: Location,
    pub file_id: FileId,
    pub span: Span,
    /// Ordered message arguments.
    pub message_args: Vec<String>,
}

impl Diagnostic {
    /// Create a diagnostic for `span` in `file`.
    pub fn new(
        descriptor: &DiagnosticDescriptor,
        severity: Severity,
        file: &SourceFile,
        span: Span,
        message_args: Vec<String>,
    ) -> Self {
        Diagnostic {
            rule_id: descriptor.id.to_string(),
            severity,
            message: descriptor.format_message(&message_args),
            location: Location::from_span(&file.path, &file.content, span),
            file_id: file.file_id,
            span,
            message_args,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {}: {}",
            self.location, self.severity, self.rule_id, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: DiagnosticDescriptor = DiagnosticDescriptor {
        id: "WPF0006",
        title: "Name of CoerceValueCallback should match registered name.",
        message_format: "Method '{0}' should be named '{1}'",
        category: "DependencyProperties",
        default_severity: Severity::Warning,
        enabled_by_default: true,
        description: "",
    };

    mod formatting {
        use super::*;

        #[test]
        fn fills_positional_arguments() {
            assert_eq!(
                DESCRIPTOR.format_message(&["CoerceBarValue", "CoerceBar"]),
                "Method 'CoerceBarValue' should be named 'CoerceBar'"
            );
        }

        #[test]
        fn leaves_unknown_placeholders() {
            assert_eq!(format_message("{0} {5} {x} {", &["a"]), "a {5} {x} {");
        }
    }

    #[test]
    fn diagnostic_carries_location() {
        let file = SourceFile {
            file_id: FileId(0),
            path: "Foo.cs".into(),
            content: "class Foo\n{\n    CoerceBarValue\n}".into(),
        };
        let span = Span::new(16, 30);
        let diag = Diagnostic::new(
            &DESCRIPTOR,
            Severity::Warning,
            &file,
            span,
            vec!["CoerceBarValue".into(), "CoerceBar".into()],
        );
        assert_eq!(diag.location.line, 3);
        assert_eq!(diag.location.col, 5);
        assert_eq!(
            diag.to_string(),
            "Foo.cs:3:5: warning WPF0006: Method 'CoerceBarValue' should be named 'CoerceBar'"
        );
    }
}
