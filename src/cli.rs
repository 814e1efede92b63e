//! Command implementations behind the `dpcheck` binary.
//!
//! Each `run_*` function does the work of one subcommand and returns the
//! response to print. The binary only parses arguments, installs logging and
//! renders the result, so these functions are what the CLI tests exercise.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use dpcheck_core::config::AnalyzerOptions;
use dpcheck_core::diagnostics::Diagnostic;
use dpcheck_core::error::{DpcheckError, SnapshotError};
use dpcheck_core::model::SymbolTable;
use dpcheck_core::patch::FileId;
use dpcheck_core::text::position_to_byte_offset;
use dpcheck_core::types::Location;
use dpcheck_core::CancellationToken;
use dpcheck_wpf::fixes::{self, try_code_action};
use dpcheck_wpf::fixture::Fixture;
use dpcheck_wpf::rules::RULES;
use dpcheck_wpf::Analyzer;

use crate::output::{AnalyzeResponse, FixResponse, RulesResponse};

// ============================================================================
// Inputs
// ============================================================================

/// Where the snapshot comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A serialized symbol table.
    Snapshot(PathBuf),
    /// C# source files, parsed by the built-in front end.
    Sources(Vec<PathBuf>),
}

impl Input {
    /// Load the symbol table.
    pub fn load(&self) -> Result<SymbolTable, DpcheckError> {
        match self {
            Input::Snapshot(path) => load_snapshot(path),
            Input::Sources(paths) => load_sources(paths),
        }
    }
}

fn load_snapshot(path: &Path) -> Result<SymbolTable, DpcheckError> {
    let json = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = SymbolTable::from_json(&json)?;
    table.validate()?;
    info!(path = %path.display(), files = table.files.len(), "snapshot loaded");
    Ok(table)
}

fn load_sources(paths: &[PathBuf]) -> Result<SymbolTable, DpcheckError> {
    if paths.is_empty() {
        return Err(DpcheckError::invalid_args("no source files given"));
    }
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let content = fs::read_to_string(path).map_err(|_| DpcheckError::FileNotFound {
            path: path.display().to_string(),
        })?;
        files.push((path.display().to_string(), content));
    }
    let borrowed: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
    let fixture = Fixture::parse(&borrowed).map_err(|err| DpcheckError::invalid_args(err.to_string()))?;
    info!(files = files.len(), "sources parsed");
    Ok(fixture.into_table())
}

/// Options from a JSON file, or the defaults.
pub fn load_options(path: Option<&Path>) -> Result<AnalyzerOptions, DpcheckError> {
    match path {
        Some(path) => Ok(AnalyzerOptions::load(path)?),
        None => Ok(AnalyzerOptions::default()),
    }
}

// ============================================================================
// Commands
// ============================================================================

/// `dpcheck rules`
pub fn run_rules() -> RulesResponse {
    RulesResponse::new(RULES)
}

/// `dpcheck analyze`
pub fn run_analyze(
    table: &SymbolTable,
    options: AnalyzerOptions,
    cancel: &CancellationToken,
) -> Result<AnalyzeResponse, DpcheckError> {
    let analyzer = Analyzer::new(options)?;
    let diagnostics = analyzer.analyze(table, cancel)?;
    info!(diagnostics = diagnostics.len(), "analysis complete");
    Ok(AnalyzeResponse::new(table.files.len(), diagnostics))
}

/// What `dpcheck fix` should do with the patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FixMode {
    /// Print the patch only.
    #[default]
    Preview,
    /// Also write the edited files back to disk.
    Write,
}

/// `dpcheck fix`: the code action for the `rule_id` diagnostic at `at`.
pub fn run_fix(
    table: &SymbolTable,
    options: AnalyzerOptions,
    rule_id: &str,
    at: &str,
    mode: FixMode,
    cancel: &CancellationToken,
) -> Result<FixResponse, DpcheckError> {
    let location = Location::parse(at)
        .ok_or_else(|| DpcheckError::invalid_args(format!("expected path:line:col, got '{at}'")))?;
    if dpcheck_wpf::rules::rule(rule_id).is_none() {
        return Err(DpcheckError::invalid_args(format!("unknown rule id '{rule_id}'")));
    }

    let analyzer = Analyzer::new(options.clone())?;
    let diagnostics = analyzer.analyze(table, cancel)?;
    let diagnostic = find_diagnostic(table, &diagnostics, rule_id, &location)?;

    let action = try_code_action(table, &diagnostic, &options, cancel)?;
    let patch = action.compute_patch(table)?;
    let contents: HashMap<FileId, String> = table
        .files
        .iter()
        .map(|f| (f.file_id, f.content.clone()))
        .collect();
    let materialized = patch.materialize(&contents);
    info!(rule_id, title = %action.title, edits = patch.edit_count(), "fix computed");

    let mut response = FixResponse::new(diagnostic, action, materialized);
    if mode == FixMode::Write {
        let updated = fixes::apply(&patch, &contents)?;
        let changed: Vec<(&str, &str)> = table
            .files
            .iter()
            .filter_map(|file| {
                let text = updated.get(&file.file_id)?;
                (*text != file.content).then_some((file.path.as_str(), text.as_str()))
            })
            .collect();
        write_all(&changed)?;
        response.written = changed.iter().map(|(path, _)| path.to_string()).collect();
        info!(files = response.written.len(), "fix written");
    }
    Ok(response)
}

/// Write every file or none of them.
///
/// All contents are staged in temporary siblings first. A failure while
/// staging removes the staged files and leaves every target untouched; the
/// renames run only once everything is staged.
fn write_all(files: &[(&str, &str)]) -> Result<(), DpcheckError> {
    let mut staged: Vec<(PathBuf, &str)> = Vec::with_capacity(files.len());
    for &(path, text) in files {
        let temp_path = staging_path(Path::new(path));
        if let Err(err) = fs::write(&temp_path, text) {
            for (temp, _) in &staged {
                let _ = fs::remove_file(temp);
            }
            let _ = fs::remove_file(&temp_path);
            return Err(DpcheckError::ApplyError {
                message: format!("cannot write {path}: {err}"),
            });
        }
        staged.push((temp_path, path));
    }
    for (temp, path) in &staged {
        fs::rename(temp, path).map_err(|err| DpcheckError::ApplyError {
            message: format!("cannot replace {path}: {err}"),
        })?;
    }
    Ok(())
}

/// Hidden sibling of `path` unique to this process.
fn staging_path(path: &Path) -> PathBuf {
    path.with_file_name(format!(
        ".{}.{}.dpcheck.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id()
    ))
}

/// The `rule_id` diagnostic whose span contains the position `at`.
fn find_diagnostic(
    table: &SymbolTable,
    diagnostics: &[Diagnostic],
    rule_id: &str,
    at: &Location,
) -> Result<Diagnostic, DpcheckError> {
    let file = table
        .files
        .iter()
        .find(|f| f.path == at.file)
        .ok_or_else(|| DpcheckError::FileNotFound {
            path: at.file.clone(),
        })?;
    let offset = position_to_byte_offset(file.content.as_bytes(), at.line, at.col)
        .ok_or_else(|| DpcheckError::symbol_not_found(at.file.clone(), at.line, at.col))?;
    diagnostics
        .iter()
        .find(|d| {
            d.rule_id == rule_id
                && d.file_id == file.file_id
                && d.span.start <= offset
                && offset <= d.span.end
        })
        .cloned()
        .ok_or_else(|| DpcheckError::no_fix(rule_id, at))
}
