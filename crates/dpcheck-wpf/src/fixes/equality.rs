//! Fix for setter guards that compare with the wrong equality.

use dpcheck_core::config::{AnalyzerOptions, ReportDiagnostic};
use dpcheck_core::patch::{FileId, Span};

use super::{CodeAction, FixEdit};
use crate::rules::{Finding, WPF1016};

/// `Equals` when the project turned the `ReferenceEquals` rule off,
/// `ReferenceEquals` otherwise.
pub fn preferred_call(options: &AnalyzerOptions) -> &'static str {
    match options.report_for(WPF1016.id) {
        ReportDiagnostic::Suppress => "Equals",
        _ => "ReferenceEquals",
    }
}

/// Replace the guard's condition with `preferred_call(value, field)`,
/// keeping a negated guard negated.
pub fn action(
    options: &AnalyzerOptions,
    finding: &Finding,
    file: FileId,
    condition: Span,
    field_access: &str,
    negated: bool,
) -> CodeAction {
    let call = preferred_call(options);
    let not = if negated { "!" } else { "" };
    CodeAction {
        title: format!("Use {call}"),
        equivalence_key: "use_correct_equality",
        diagnostic_id: finding.rule_id().to_string(),
        edit: FixEdit::Replace {
            file,
            span: condition,
            new_text: format!("{not}{call}(value, {field_access})"),
        },
    }
}
