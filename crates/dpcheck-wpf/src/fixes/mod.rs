//! Fix synthesizer.
//!
//! A fix is never computed from a stale finding. Given a diagnostic, the
//! synthesizer re-runs the rules for the type the diagnostic points into,
//! picks the finding with the same rule id and span, and builds a
//! [`CodeAction`] from that finding's remedy. Turning the action into a
//! [`PatchSet`] reads the current text again and anchors every edit with the
//! hash of the bytes it replaces, so applying it to text that changed in the
//! meantime fails instead of corrupting the file.
//!
//! Declining is the normal failure mode: [`code_action`] returns `None` and
//! logs why; [`try_code_action`] reports the [`FixError`].

pub mod equality;
pub mod rename;

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use dpcheck_core::adapter::SemanticModel;
use dpcheck_core::config::AnalyzerOptions;
use dpcheck_core::diagnostics::Diagnostic;
use dpcheck_core::error::DpcheckError;
use dpcheck_core::model::SymbolId;
use dpcheck_core::patch::{Anchor, ApplyResult, Conflict, Edit, FileId, PatchSet, Span};
use dpcheck_core::CancellationToken;

use crate::pattern::Miss;
use crate::recognizer::Recognizer;
use crate::rules::{findings_for, Finding, Remedy};

// ============================================================================
// Types
// ============================================================================

/// One corrective action offered for a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeAction {
    /// Title shown to the user, e.g. `Rename to: BarProperty`.
    pub title: String,
    /// Groups equivalent actions across diagnostics.
    pub equivalence_key: &'static str,
    pub diagnostic_id: String,
    pub edit: FixEdit,
}

/// What a code action changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FixEdit {
    /// Rename a symbol and every reference to it.
    Rename { target: SymbolId, new_name: String },
    /// Replace one span of text.
    Replace {
        file: FileId,
        span: Span,
        new_text: String,
    },
}

/// Why a fix was not offered or could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixError {
    /// Re-running the rules no longer produces the diagnostic.
    #[error("{rule_id} no longer applies at {file} {span}")]
    NoLongerApplies {
        rule_id: String,
        file: FileId,
        span: Span,
    },

    /// The diagnostic's rule has no automatic fix.
    #[error("{rule_id} has no automatic fix")]
    NotFixable { rule_id: String },

    /// The proposed name is not a valid identifier.
    #[error("invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    /// The containing type already has a member with the proposed name.
    #[error("'{name}' already exists in '{container}'")]
    Collision { name: String, container: String },

    /// The rename target has no declaration in source.
    #[error("'{name}' is not declared in source")]
    NotInSource { rule_id: String, name: String },

    /// Anchored edits no longer match the text they are applied to.
    #[error("stale snapshot: {}", format_conflicts(.conflicts))]
    Stale { conflicts: Vec<Conflict> },

    /// The cancellation signal fired.
    #[error("cancelled")]
    Cancelled,
}

fn format_conflicts(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<FixError> for DpcheckError {
    fn from(err: FixError) -> Self {
        match err {
            FixError::NoLongerApplies {
                rule_id,
                file,
                span,
            } => DpcheckError::NoFix {
                rule_id,
                location: format!("{file} {span}"),
            },
            FixError::NotFixable { rule_id } => DpcheckError::NoFix {
                rule_id,
                location: "any location".to_string(),
            },
            FixError::NotInSource { rule_id, name } => DpcheckError::NoFix {
                rule_id,
                location: format!("'{name}' (not declared in source)"),
            },
            FixError::InvalidIdentifier { name, reason } => {
                DpcheckError::InvalidIdentifier { name, reason }
            }
            FixError::Collision { .. } | FixError::Stale { .. } => DpcheckError::ApplyError {
                message: err.to_string(),
            },
            FixError::Cancelled => DpcheckError::internal(err.to_string()),
        }
    }
}

// ============================================================================
// Synthesis
// ============================================================================

/// The code action for `diagnostic`, or `None` when no fix applies to the
/// current snapshot.
pub fn code_action(
    model: &dyn SemanticModel,
    diagnostic: &Diagnostic,
    options: &AnalyzerOptions,
    cancel: &CancellationToken,
) -> Option<CodeAction> {
    match try_code_action(model, diagnostic, options, cancel) {
        Ok(action) => Some(action),
        Err(err) => {
            debug!(rule_id = %diagnostic.rule_id, location = %diagnostic.location, %err, "no fix");
            None
        }
    }
}

/// The code action for `diagnostic`, reporting why none applies.
pub fn try_code_action(
    model: &dyn SemanticModel,
    diagnostic: &Diagnostic,
    options: &AnalyzerOptions,
    cancel: &CancellationToken,
) -> Result<CodeAction, FixError> {
    let finding = rediscover(model, diagnostic, cancel)?;
    let action = match finding.remedy.clone() {
        Remedy::Rename { target, new_name } => rename::action(model, &finding, target, new_name)?,
        Remedy::EqualityGuard {
            file,
            condition,
            field_access,
            negated,
        } => equality::action(options, &finding, file, condition, &field_access, negated),
        Remedy::None => {
            return Err(FixError::NotFixable {
                rule_id: diagnostic.rule_id.clone(),
            })
        }
    };
    // Computing the patch validates the action against the current text.
    action.compute_patch(model)?;
    Ok(action)
}

/// Re-run the rules around a diagnostic and return the finding behind it.
fn rediscover(
    model: &dyn SemanticModel,
    diagnostic: &Diagnostic,
    cancel: &CancellationToken,
) -> Result<Finding, FixError> {
    let no_longer_applies = || FixError::NoLongerApplies {
        rule_id: diagnostic.rule_id.clone(),
        file: diagnostic.file_id,
        span: diagnostic.span,
    };
    let member = model
        .enclosing_declaration(diagnostic.file_id, diagnostic.span.start)
        .ok_or_else(no_longer_applies)?;
    let candidates = match model.containing_type(member) {
        Some(owner) => model.members_of(owner, false),
        None => vec![member],
    };

    let recognizer = Recognizer::new(model, cancel);
    for candidate in candidates {
        let findings = findings_for(&recognizer, candidate).map_err(|miss| match miss {
            Miss::Cancelled => FixError::Cancelled,
            _ => no_longer_applies(),
        })?;
        if let Some(finding) = findings.into_iter().find(|f| {
            f.rule_id() == diagnostic.rule_id && f.file == diagnostic.file_id && f.span == diagnostic.span
        }) {
            return Ok(finding);
        }
    }
    Err(no_longer_applies())
}

impl CodeAction {
    /// Anchored edits for this action against the current snapshot.
    pub fn compute_patch(&self, model: &dyn SemanticModel) -> Result<PatchSet, FixError> {
        match &self.edit {
            FixEdit::Rename { target, new_name } => rename::patch(model, *target, new_name),
            FixEdit::Replace {
                file,
                span,
                new_text,
            } => replace_patch(model, *file, *span, new_text),
        }
    }
}

/// A patch replacing one span.
fn replace_patch(
    model: &dyn SemanticModel,
    file: FileId,
    span: Span,
    new_text: &str,
) -> Result<PatchSet, FixError> {
    let source = model.file(file).ok_or_else(|| FixError::Stale {
        conflicts: vec![Conflict::FileMissing { file_id: file }],
    })?;
    let anchor = anchor(source.file_id, &source.content, span)?;
    Ok(PatchSet::new()
        .with_file_path(file, source.path.clone())
        .with_edit(Edit::replace(0, file, anchor, new_text)))
}

pub(crate) fn anchor(file: FileId, content: &str, span: Span) -> Result<Anchor, FixError> {
    Anchor::capture(span, content.as_bytes()).ok_or_else(|| FixError::Stale {
        conflicts: vec![Conflict::SpanOutOfBounds {
            file_id: file,
            span,
            file_len: content.len() as u32,
        }],
    })
}

/// Apply a patch all-or-nothing. Returns the full text of every supplied
/// file, edited or not.
pub fn apply(
    patch: &PatchSet,
    contents: &HashMap<FileId, String>,
) -> Result<HashMap<FileId, String>, FixError> {
    match patch.apply(contents) {
        ApplyResult::Success { modified_files } => {
            let mut updated = contents.clone();
            updated.extend(modified_files);
            Ok(updated)
        }
        ApplyResult::Failed { conflicts } => Err(FixError::Stale { conflicts }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::Fixture;
    use crate::rules::Analyzer;
    use dpcheck_core::error::OutputErrorCode;

    const SRC: &str = r#"
public class FooControl : Control
{
    public static readonly DependencyProperty BarProperty = DependencyProperty.Register(
        "Bar", typeof(int), typeof(FooControl), new PropertyMetadata(0, null, CoerceBarValue));

    public string Bar
    {
        get => (string)GetValue(BarProperty);
        set => SetValue(BarProperty, value);
    }

    private static object CoerceBarValue(DependencyObject d, object baseValue) => baseValue;
}
"#;

    fn diagnostics(fx: &Fixture) -> Vec<Diagnostic> {
        Analyzer::new(AnalyzerOptions::default())
            .unwrap()
            .analyze(fx.table(), &CancellationToken::new())
            .unwrap()
    }

    fn by_id<'a>(diagnostics: &'a [Diagnostic], id: &str) -> &'a Diagnostic {
        diagnostics.iter().find(|d| d.rule_id == id).unwrap()
    }

    mod synthesis {
        use super::*;

        #[test]
        fn rename_action_for_callback() {
            let fx = Fixture::parse(&[("Foo.cs", SRC)]).unwrap();
            let diagnostics = diagnostics(&fx);
            let action = code_action(
                fx.table(),
                by_id(&diagnostics, "WPF0006"),
                &AnalyzerOptions::default(),
                &CancellationToken::new(),
            )
            .unwrap();
            assert_eq!(action.title, "Rename to: CoerceBar");
            assert_eq!(action.diagnostic_id, "WPF0006");
            assert_eq!(
                action.edit,
                FixEdit::Rename {
                    target: fx.method("FooControl", "CoerceBarValue"),
                    new_name: "CoerceBar".to_string(),
                }
            );
        }

        #[test]
        fn type_mismatch_has_no_fix() {
            let fx = Fixture::parse(&[("Foo.cs", SRC)]).unwrap();
            let diagnostics = diagnostics(&fx);
            let err = try_code_action(
                fx.table(),
                by_id(&diagnostics, "WPF0012"),
                &AnalyzerOptions::default(),
                &CancellationToken::new(),
            )
            .unwrap_err();
            assert_eq!(
                err,
                FixError::NotFixable {
                    rule_id: "WPF0012".to_string()
                }
            );
        }

        #[test]
        fn diagnostic_from_older_text_no_longer_applies() {
            let fx = Fixture::parse(&[("Foo.cs", SRC)]).unwrap();
            let diagnostic = by_id(&diagnostics(&fx), "WPF0006").clone();

            let fixed = SRC.replace("CoerceBarValue", "CoerceBar");
            let current = Fixture::parse(&[("Foo.cs", fixed.as_str())]).unwrap();
            let err = try_code_action(
                current.table(),
                &diagnostic,
                &AnalyzerOptions::default(),
                &CancellationToken::new(),
            )
            .unwrap_err();
            assert!(matches!(err, FixError::NoLongerApplies { .. }));
        }

        #[test]
        fn cancelled_synthesis_offers_nothing() {
            let fx = Fixture::parse(&[("Foo.cs", SRC)]).unwrap();
            let diagnostic = by_id(&diagnostics(&fx), "WPF0006").clone();
            let cancel = CancellationToken::new();
            cancel.cancel();
            assert_eq!(
                try_code_action(fx.table(), &diagnostic, &AnalyzerOptions::default(), &cancel),
                Err(FixError::Cancelled)
            );
        }
    }

    mod application {
        use super::*;

        #[test]
        fn stale_text_is_rejected() {
            let fx = Fixture::parse(&[("Foo.cs", SRC)]).unwrap();
            let diagnostics = diagnostics(&fx);
            let action = code_action(
                fx.table(),
                by_id(&diagnostics, "WPF0006"),
                &AnalyzerOptions::default(),
                &CancellationToken::new(),
            )
            .unwrap();
            let patch = action.compute_patch(fx.table()).unwrap();

            let mut contents = fx.contents();
            let file = fx.file("Foo.cs");
            let edited = contents[&file].replace("CoerceBarValue", "CoerceBarValu3");
            contents.insert(file, edited);

            let err = apply(&patch, &contents).unwrap_err();
            assert!(matches!(err, FixError::Stale { .. }));
            assert_eq!(DpcheckError::from(err).error_code(), OutputErrorCode::ApplyError);
        }

        #[test]
        fn untouched_files_are_returned() {
            let fx = Fixture::parse(&[("Foo.cs", SRC), ("Other.cs", "public class Other { }")]).unwrap();
            let diagnostics = diagnostics(&fx);
            let action = code_action(
                fx.table(),
                by_id(&diagnostics, "WPF0006"),
                &AnalyzerOptions::default(),
                &CancellationToken::new(),
            )
            .unwrap();
            let patch = action.compute_patch(fx.table()).unwrap();
            let updated = apply(&patch, &fx.contents()).unwrap();
            assert_eq!(updated[&fx.file("Other.cs")], "public class Other { }");
            assert!(updated[&fx.file("Foo.cs")].contains("CoerceBar(DependencyObject d"));
        }
    }

    #[test]
    fn fix_errors_map_to_output_codes() {
        let invalid = FixError::InvalidIdentifier {
            name: "class".to_string(),
            reason: "is a keyword".to_string(),
        };
        assert_eq!(DpcheckError::from(invalid).error_code(), OutputErrorCode::InvalidArguments);
        let missing = FixError::NotFixable {
            rule_id: "WPF0032".to_string(),
        };
        assert_eq!(DpcheckError::from(missing).error_code(), OutputErrorCode::ResolutionError);
    }
}
