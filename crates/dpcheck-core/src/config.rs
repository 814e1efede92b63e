//! Analyzer options and the exclusion predicate.
//!
//! Options are plain JSON:
//!
//! ```json
//! {
//!   "specific_diagnostic_options": { "WPF0006": "error", "WPF1016": "suppress" },
//!   "exclude": ["**/obj/**"],
//!   "analyze_generated_code": false
//! }
//! ```

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::diagnostics::{DiagnosticDescriptor, Severity};
use crate::error::ConfigError;
use crate::model::SourceFile;

/// Per-rule override of the reported severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportDiagnostic {
    /// Use the rule's default severity and enablement.
    #[default]
    Default,
    Error,
    Warning,
    /// Do not report.
    Suppress,
}

/// Options for one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerOptions {
    /// Rule id to override.
    pub specific_diagnostic_options: BTreeMap<String, ReportDiagnostic>,
    /// Globs of file paths that are never analyzed.
    pub exclude: Vec<String>,
    /// Analyze files that look generated.
    pub analyze_generated_code: bool,
}

impl AnalyzerOptions {
    /// Parse options from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load options from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Set an override.
    pub fn with_override(mut self, rule_id: &str, report: ReportDiagnostic) -> Self {
        self.specific_diagnostic_options
            .insert(rule_id.to_string(), report);
        self
    }

    /// The configured override for a rule.
    pub fn report_for(&self, rule_id: &str) -> ReportDiagnostic {
        self.specific_diagnostic_options
            .get(rule_id)
            .copied()
            .unwrap_or_default()
    }

    /// Severity a rule reports with, or `None` if it is off.
    pub fn effective_severity(&self, descriptor: &DiagnosticDescriptor) -> Option<Severity> {
        match self.report_for(descriptor.id) {
            ReportDiagnostic::Default => descriptor
                .enabled_by_default
                .then_some(descriptor.default_severity),
            ReportDiagnostic::Error => Some(Severity::Error),
            ReportDiagnostic::Warning => Some(Severity::Warning),
            ReportDiagnostic::Suppress => None,
        }
    }

    /// Override keys that name none of `known` rule ids.
    pub fn unknown_rule_ids<'a>(&'a self, known: &[&str]) -> Vec<&'a str> {
        self.specific_diagnostic_options
            .keys()
            .map(String::as_str)
            .filter(|id| !known.contains(id))
            .collect()
    }
}

// ============================================================================
// Exclusion
// ============================================================================

/// File name suffixes of generated sources.
const GENERATED_SUFFIXES: &[&str] = &[".g.cs", ".g.i.cs", ".designer.cs", ".generated.cs"];

/// True if the file looks generated: by name, or by an `<auto-generated`
/// marker in its leading comments.
pub fn is_generated(path: &str, content: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    if GENERATED_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix)) {
        return true;
    }
    content
        .lines()
        .map(str::trim)
        .take_while(|line| line.is_empty() || line.starts_with("//") || line.starts_with("/*"))
        .any(|line| line.contains("<auto-generated"))
}

/// The "is this location excluded from analysis" predicate.
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
    globs: GlobSet,
    analyze_generated_code: bool,
}

impl ExclusionFilter {
    /// Compile the exclusion globs of `options`.
    pub fn new(options: &AnalyzerOptions) -> Result<Self, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &options.exclude {
            let glob = Glob::new(pattern).map_err(|source| ConfigError::InvalidGlob {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let globs = builder.build().map_err(|source| ConfigError::InvalidGlob {
            pattern: options.exclude.join(", "),
            source,
        })?;
        Ok(ExclusionFilter {
            globs,
            analyze_generated_code: options.analyze_generated_code,
        })
    }

    /// A filter that excludes nothing but generated code.
    pub fn generated_only() -> Self {
        ExclusionFilter {
            globs: GlobSet::empty(),
            analyze_generated_code: false,
        }
    }

    /// True if diagnostics in `file` must not be reported.
    pub fn is_excluded(&self, file: &SourceFile) -> bool {
        if self.globs.is_match(&file.path) {
            return true;
        }
        !self.analyze_generated_code && is_generated(&file.path, &file.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::FileId;

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile {
            file_id: FileId(0),
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    const DESCRIPTOR: DiagnosticDescriptor = DiagnosticDescriptor {
        id: "WPF1017",
        title: "",
        message_format: "",
        category: "PropertyChanged",
        default_severity: Severity::Warning,
        enabled_by_default: false,
        description: "",
    };

    mod options {
        use super::*;

        #[test]
        fn parses_partial_json() {
            let options = AnalyzerOptions::from_json(
                r#"{ "specific_diagnostic_options": { "WPF1017": "error" } }"#,
            )
            .unwrap();
            assert_eq!(options.report_for("WPF1017"), ReportDiagnostic::Error);
            assert_eq!(options.report_for("WPF0001"), ReportDiagnostic::Default);
            assert!(!options.analyze_generated_code);
        }

        #[test]
        fn rejects_unknown_severity() {
            let err = AnalyzerOptions::from_json(
                r#"{ "specific_diagnostic_options": { "WPF1017": "loud" } }"#,
            )
            .unwrap_err();
            assert!(matches!(err, ConfigError::Json(_)));
        }

        #[test]
        fn effective_severity_honors_enablement() {
            let options = AnalyzerOptions::default();
            assert_eq!(options.effective_severity(&DESCRIPTOR), None);
            let options = options.with_override("WPF1017", ReportDiagnostic::Warning);
            assert_eq!(options.effective_severity(&DESCRIPTOR), Some(Severity::Warning));
            let options = options.with_override("WPF1017", ReportDiagnostic::Suppress);
            assert_eq!(options.effective_severity(&DESCRIPTOR), None);
        }

        #[test]
        fn reports_unknown_rule_ids() {
            let options = AnalyzerOptions::default()
                .with_override("WPF0001", ReportDiagnostic::Error)
                .with_override("WPF9999", ReportDiagnostic::Error);
            assert_eq!(options.unknown_rule_ids(&["WPF0001"]), vec!["WPF9999"]);
        }

        #[test]
        fn loads_from_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("options.json");
            std::fs::write(&path, r#"{ "exclude": ["**/obj/**"] }"#).unwrap();
            let options = AnalyzerOptions::load(&path).unwrap();
            assert_eq!(options.exclude, vec!["**/obj/**".to_string()]);
        }

        #[test]
        fn missing_file_is_io_error() {
            let err = AnalyzerOptions::load(Path::new("/nonexistent/options.json")).unwrap_err();
            assert!(matches!(err, ConfigError::Io { .. }));
        }
    }

    mod exclusion {
        use super::*;

        #[test]
        fn generated_files_by_name() {
            assert!(is_generated("obj/MainWindow.g.cs", ""));
            assert!(is_generated("Foo.Designer.cs", ""));
            assert!(!is_generated("Foo.cs", "class Foo {}"));
        }

        #[test]
        fn generated_files_by_header() {
            let content = "// <auto-generated>\n//   tool\n// </auto-generated>\nclass Foo {}";
            assert!(is_generated("Foo.cs", content));
            assert!(!is_generated("Foo.cs", "class Foo {}\n// <auto-generated>"));
        }

        #[test]
        fn filter_applies_globs_and_generated_check() {
            let options = AnalyzerOptions {
                exclude: vec!["legacy/**".to_string()],
                ..AnalyzerOptions::default()
            };
            let filter = ExclusionFilter::new(&options).unwrap();
            assert!(filter.is_excluded(&file("legacy/Foo.cs", "")));
            assert!(filter.is_excluded(&file("Foo.g.cs", "")));
            assert!(!filter.is_excluded(&file("src/Foo.cs", "")));
        }

        #[test]
        fn generated_code_can_be_analyzed() {
            let options = AnalyzerOptions {
                analyze_generated_code: true,
                ..AnalyzerOptions::default()
            };
            let filter = ExclusionFilter::new(&options).unwrap();
            assert!(!filter.is_excluded(&file("Foo.g.cs", "")));
        }

        #[test]
        fn invalid_glob_is_reported() {
            let options = AnalyzerOptions {
                exclude: vec!["src/[".to_string()],
                ..AnalyzerOptions::default()
            };
            assert!(matches!(
                ExclusionFilter::new(&options),
                Err(ConfigError::InvalidGlob { .. })
            ));
        }
    }
}
