//! The rule table and the analysis driver.
//!
//! Every rule is a row in [`RULES`]: a descriptor plus the member kind that
//! triggers it. Evaluation is a pure function of the snapshot. For each
//! source member the driver recovers the pattern instance around it, runs the
//! rules for that member kind, and turns the resulting [`Finding`]s into
//! [`Diagnostic`]s after severity overrides and exclusions are applied.
//!
//! The fix synthesizer re-runs the same evaluation for the member a
//! diagnostic points at, so a finding always carries what its fix needs.

pub mod equality;
pub mod naming;
pub mod structural;

use tracing::{debug, trace, warn};

use dpcheck_core::adapter::SemanticModel;
use dpcheck_core::config::{AnalyzerOptions, ExclusionFilter};
use dpcheck_core::diagnostics::{Diagnostic, DiagnosticDescriptor, Severity};
use dpcheck_core::error::{Cancelled, ConfigError};
use dpcheck_core::model::{SymbolId, SymbolKind};
use dpcheck_core::patch::{FileId, Span};
use dpcheck_core::CancellationToken;

use crate::pattern::{Miss, PatternInstance};
use crate::recognizer::Recognizer;

// ============================================================================
// Rule table
// ============================================================================

pub const DEPENDENCY_PROPERTIES: &str = "DependencyProperties";
pub const PROPERTY_CHANGED: &str = "PropertyChanged";

pub const WPF0001: DiagnosticDescriptor = DiagnosticDescriptor {
    id: "WPF0001",
    title: "Backing field for a DependencyProperty should match registered name.",
    message_format: "Field '{0}' should be named '{1}'",
    category: DEPENDENCY_PROPERTIES,
    default_severity: Severity::Warning,
    enabled_by_default: true,
    description: "A dependency property's backing field should be named with the name it is registered with suffixed by 'Property'.",
};

pub const WPF0002: DiagnosticDescriptor = DiagnosticDescriptor {
    id: "WPF0002",
    title: "Backing field for a DependencyPropertyKey should match registered name.",
    message_format: "Field '{0}' should be named '{1}'",
    category: DEPENDENCY_PROPERTIES,
    default_severity: Severity::Warning,
    enabled_by_default: true,
    description: "A DependencyPropertyKey's backing field should be named with the name it is registered with suffixed by 'PropertyKey'.",
};

pub const WPF0003: DiagnosticDescriptor = DiagnosticDescriptor {
    id: "WPF0003",
    title: "CLR property for a DependencyProperty should match registered name.",
    message_format: "Property '{0}' should be named '{1}'",
    category: DEPENDENCY_PROPERTIES,
    default_severity: Severity::Warning,
    enabled_by_default: true,
    description: "A CLR property wrapping a dependency property should have the name it is registered with.",
};

pub const WPF0004: DiagnosticDescriptor = DiagnosticDescriptor {
    id: "WPF0004",
    title: "CLR method for a DependencyProperty should match registered name.",
    message_format: "Method '{0}' should be named '{1}'",
    category: DEPENDENCY_PROPERTIES,
    default_severity: Severity::Warning,
    enabled_by_default: true,
    description: "The static accessors of an attached property should be named Get{Name} and Set{Name}.",
};

pub const WPF0005: DiagnosticDescriptor = DiagnosticDescriptor {
    id: "WPF0005",
    title: "Name of PropertyChangedCallback should match registered name.",
    message_format: "Method '{0}' should be named '{1}'",
    category: DEPENDENCY_PROPERTIES,
    default_severity: Severity::Warning,
    enabled_by_default: true,
    description: "A PropertyChangedCallback should be named On{Name}Changed.",
};

pub const WPF0006: DiagnosticDescriptor = DiagnosticDescriptor {
    id: "WPF0006",
    title: "Name of CoerceValueCallback should match registered name.",
    message_format: "Method '{0}' should be named '{1}'",
    category: DEPENDENCY_PROPERTIES,
    default_severity: Severity::Warning,
    enabled_by_default: true,
    description: "A CoerceValueCallback should be named Coerce{Name}.",
};

pub const WPF0007: DiagnosticDescriptor = DiagnosticDescriptor {
    id: "WPF0007",
    title: "Name of ValidateValueCallback should match registered name.",
    message_format: "Method '{0}' should be named '{1}'",
    category: DEPENDENCY_PROPERTIES,
    default_severity: Severity::Warning,
    enabled_by_default: true,
    description: "A ValidateValueCallback should be named {Name}ValidateValue.",
};

pub const WPF0012: DiagnosticDescriptor = DiagnosticDescriptor {
    id: "WPF0012",
    title: "CLR property type should match registered type.",
    message_format: "Property '{0}' must be of type {1}",
    category: DEPENDENCY_PROPERTIES,
    default_severity: Severity::Error,
    enabled_by_default: true,
    description: "The type of a CLR wrapper must be the type the dependency property is registered with.",
};

pub const WPF0032: DiagnosticDescriptor = DiagnosticDescriptor {
    id: "WPF0032",
    title: "Use same dependency property in get and set.",
    message_format: "Property '{0}' must access same dependency property in getter and setter",
    category: DEPENDENCY_PROPERTIES,
    default_severity: Severity::Error,
    enabled_by_default: true,
    description: "Use same dependency property in get and set.",
};

pub const WPF1016: DiagnosticDescriptor = DiagnosticDescriptor {
    id: "WPF1016",
    title: "Use ReferenceEquals.",
    message_format: "Use ReferenceEquals for reference type comparison in setter of '{0}'",
    category: PROPERTY_CHANGED,
    default_severity: Severity::Warning,
    enabled_by_default: true,
    description: "Use ReferenceEquals when comparing reference types in a property setter.",
};

pub const WPF1017: DiagnosticDescriptor = DiagnosticDescriptor {
    id: "WPF1017",
    title: "Use object.Equals.",
    message_format: "Use object.Equals for reference type comparison in setter of '{0}'",
    category: PROPERTY_CHANGED,
    default_severity: Severity::Warning,
    enabled_by_default: false,
    description: "Use object.Equals when comparing reference types in a property setter.",
};

/// Member kind whose declaration triggers a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A static field.
    Field,
    /// An instance property.
    Property,
}

/// A row of the rule table.
#[derive(Debug)]
pub struct Rule {
    pub descriptor: &'static DiagnosticDescriptor,
    pub trigger: Trigger,
}

/// Every rule, in id order.
pub static RULES: &[Rule] = &[
    Rule { descriptor: &WPF0001, trigger: Trigger::Field },
    Rule { descriptor: &WPF0002, trigger: Trigger::Field },
    Rule { descriptor: &WPF0003, trigger: Trigger::Property },
    Rule { descriptor: &WPF0004, trigger: Trigger::Field },
    Rule { descriptor: &WPF0005, trigger: Trigger::Field },
    Rule { descriptor: &WPF0006, trigger: Trigger::Field },
    Rule { descriptor: &WPF0007, trigger: Trigger::Field },
    Rule { descriptor: &WPF0012, trigger: Trigger::Property },
    Rule { descriptor: &WPF0032, trigger: Trigger::Property },
    Rule { descriptor: &WPF1016, trigger: Trigger::Property },
    Rule { descriptor: &WPF1017, trigger: Trigger::Property },
];

/// Look up a rule by id.
pub fn rule(id: &str) -> Option<&'static Rule> {
    RULES.iter().find(|rule| rule.descriptor.id == id)
}

pub fn rule_ids() -> Vec<&'static str> {
    RULES.iter().map(|rule| rule.descriptor.id).collect()
}

// ============================================================================
// Findings
// ============================================================================

/// What the fix for a finding changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remedy {
    /// Rename a source symbol everywhere it is referenced.
    Rename { target: SymbolId, new_name: String },
    /// Replace a setter guard condition with an equality call.
    EqualityGuard {
        file: FileId,
        /// The condition expression.
        condition: Span,
        /// `value` is compared with this, e.g. `this.bar` or `_bar`.
        field_access: String,
        /// The guard returns when the operands differ.
        negated: bool,
    },
    /// No automatic fix.
    None,
}

/// A rule violation before severity and exclusion are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub descriptor: &'static DiagnosticDescriptor,
    pub file: FileId,
    pub span: Span,
    pub args: Vec<String>,
    pub remedy: Remedy,
}

impl Finding {
    pub fn rule_id(&self) -> &'static str {
        self.descriptor.id
    }
}

/// Turn a recovery result into an optional instance. Only cancellation
/// survives as an error.
pub(crate) fn recovered(
    result: Result<PatternInstance, Miss>,
) -> Result<Option<PatternInstance>, Miss> {
    match result {
        Ok(instance) => Ok(Some(instance)),
        Err(Miss::Cancelled) => Err(Miss::Cancelled),
        Err(miss) => {
            debug!(%miss, "no pattern");
            Ok(None)
        }
    }
}

/// Evaluate every rule triggered by `member`.
pub fn findings_for(recognizer: &Recognizer<'_>, member: SymbolId) -> Result<Vec<Finding>, Miss> {
    let Some(symbol) = recognizer.model().symbol(member) else {
        return Ok(Vec::new());
    };
    let trigger = match symbol.kind {
        SymbolKind::Field if symbol.is_static => Trigger::Field,
        SymbolKind::Property if !symbol.is_static => Trigger::Property,
        _ => return Ok(Vec::new()),
    };
    trace!(member = %symbol.name, ?trigger, "evaluating");

    let mut findings = Vec::new();
    match trigger {
        Trigger::Field => {
            if let Some(instance) = recovered(recognizer.try_recover_from_field(member))? {
                naming::check_field(recognizer, member, &instance, &mut findings);
            }
        }
        Trigger::Property => {
            if let Some(instance) = recovered(recognizer.try_recover_from_property(member))? {
                naming::check_property(&instance, &mut findings);
                structural::check_type(recognizer, &instance, &mut findings)?;
                structural::check_same_property(recognizer, &instance, &mut findings);
            }
            equality::check_setter_guard(recognizer, member, &mut findings)?;
        }
    }
    Ok(findings)
}

// ============================================================================
// Driver
// ============================================================================

/// Runs the rule table over a snapshot.
///
/// Holds only configuration; one analyzer can serve any number of
/// concurrent `analyze` calls.
#[derive(Debug, Clone)]
pub struct Analyzer {
    options: AnalyzerOptions,
    exclusion: ExclusionFilter,
}

impl Analyzer {
    /// Create an analyzer, compiling the exclusion globs of `options`.
    pub fn new(options: AnalyzerOptions) -> Result<Self, ConfigError> {
        for id in options.unknown_rule_ids(&rule_ids()) {
            warn!(rule_id = id, "options name an unknown rule");
        }
        let exclusion = ExclusionFilter::new(&options)?;
        Ok(Analyzer { options, exclusion })
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    /// Diagnostics for every file of the snapshot, ordered by file and
    /// position.
    pub fn analyze(
        &self,
        model: &dyn SemanticModel,
        cancel: &CancellationToken,
    ) -> Result<Vec<Diagnostic>, Cancelled> {
        let mut diagnostics = Vec::new();
        for file in model.files() {
            diagnostics.extend(self.analyze_file(model, file.file_id, cancel)?);
        }
        sort_diagnostics(&mut diagnostics);
        Ok(diagnostics)
    }

    /// Diagnostics for the members declared in one file.
    pub fn analyze_file(
        &self,
        model: &dyn SemanticModel,
        file: FileId,
        cancel: &CancellationToken,
    ) -> Result<Vec<Diagnostic>, Cancelled> {
        let Some(source) = model.file(file) else {
            return Ok(Vec::new());
        };
        if self.exclusion.is_excluded(source) {
            debug!(file = %source.path, "excluded from analysis");
            return Ok(Vec::new());
        }

        let recognizer = Recognizer::new(model, cancel);
        let mut diagnostics = Vec::new();
        for member in model.declarations_in(file) {
            Cancelled::check(cancel)?;
            let findings = findings_for(&recognizer, member).map_err(|_| Cancelled)?;
            diagnostics.extend(findings.iter().filter_map(|f| self.report(model, f)));
        }
        sort_diagnostics(&mut diagnostics);
        Ok(diagnostics)
    }

    /// The diagnostic for a finding, or `None` when its rule is off or its
    /// file is excluded.
    pub fn report(&self, model: &dyn SemanticModel, finding: &Finding) -> Option<Diagnostic> {
        let severity = self.options.effective_severity(finding.descriptor)?;
        let file = model.file(finding.file)?;
        if self.exclusion.is_excluded(file) {
            return None;
        }
        Some(Diagnostic::new(
            finding.descriptor,
            severity,
            file,
            finding.span,
            finding.args.clone(),
        ))
    }
}

fn sort_diagnostics(diagnostics: &mut Vec<Diagnostic>) {
    diagnostics.sort_by(|a, b| {
        (a.file_id, a.span.start, a.span.end, &a.rule_id).cmp(&(
            b.file_id,
            b.span.start,
            b.span.end,
            &b.rule_id,
        ))
    });
    diagnostics.dedup();
}
