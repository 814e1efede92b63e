//! Patch IR: hash-anchored edits and atomic patch sets.
//!
//! Fixes never write text directly. They produce a [`PatchSet`] whose edits
//! carry the SHA-256 of the bytes they expect to replace. Applying the set
//! against the *current* text either succeeds for every edit or fails with a
//! list of [`Conflict`]s, so a fix computed against one snapshot can never be
//! applied half-way onto text that has changed since.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use crate::text::byte_offset_to_position;

/// SHA-256 of some bytes, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Hash the given bytes.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Core Types
// ============================================================================

/// Identifier of a source file within one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct FileId(pub u32);

impl FileId {
    /// Create a new file ID.
    pub fn new(id: u32) -> Self {
        FileId(id)
    }

    /// Position of the file in the snapshot's file list.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file_{}", self.0)
    }
}

/// Half-open byte range `[start, end)` into a file's text.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: u32,
    /// End byte offset (exclusive).
    pub end: u32,
}

impl Span {
    /// Create a new span. `start` must not exceed `end`.
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "span start {} > end {}", start, end);
        Span { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn cover(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Length in bytes.
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// True for a zero-length span.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Two spans overlap if they share at least one byte. Adjacent spans do not.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True if `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Byte range usable for slicing.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start as usize..self.end as usize
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ============================================================================
// Anchors
// ============================================================================

/// Exact span plus the hash of the bytes expected there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    /// The byte range to edit.
    pub span: Span,
    /// SHA-256 of the bytes in `span` when the edit was computed.
    pub expected_before_hash: ContentHash,
}

/// Outcome of checking an anchor against current text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorResolution {
    /// The bytes at the span still match.
    Resolved(Span),
    /// The bytes at the span changed.
    HashMismatch {
        span: Span,
        expected: ContentHash,
        actual: ContentHash,
    },
    /// The span no longer fits in the text.
    OutOfBounds { span: Span, file_len: u32 },
}

impl Anchor {
    /// Anchor `span` in `content`, hashing the bytes currently there.
    ///
    /// Returns `None` when the span does not fit in `content`.
    pub fn capture(span: Span, content: &[u8]) -> Option<Self> {
        let bytes = content.get(span.range())?;
        Some(Anchor {
            span,
            expected_before_hash: ContentHash::compute(bytes),
        })
    }

    /// Check this anchor against `content`.
    pub fn resolve(&self, content: &[u8]) -> AnchorResolution {
        let Some(bytes) = content.get(self.span.range()) else {
            return AnchorResolution::OutOfBounds {
                span: self.span,
                file_len: content.len() as u32,
            };
        };
        let actual = ContentHash::compute(bytes);
        if actual != self.expected_before_hash {
            return AnchorResolution::HashMismatch {
                span: self.span,
                expected: self.expected_before_hash.clone(),
                actual,
            };
        }
        AnchorResolution::Resolved(self.span)
    }
}

// ============================================================================
// Conflicts
// ============================================================================

/// Why a patch set cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conflict {
    /// Two edits touch overlapping bytes of the same file.
    OverlappingSpans {
        file_id: FileId,
        edit1_span: Span,
        edit2_span: Span,
    },
    /// The text under an anchor changed since the patch was computed.
    AnchorHashMismatch {
        file_id: FileId,
        span: Span,
        expected: ContentHash,
        actual: ContentHash,
    },
    /// An anchor points past the end of the current text.
    SpanOutOfBounds {
        file_id: FileId,
        span: Span,
        file_len: u32,
    },
    /// The patch edits a file the caller did not supply.
    FileMissing { file_id: FileId },
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::OverlappingSpans {
                file_id,
                edit1_span,
                edit2_span,
            } => write!(f, "{file_id}: edits {edit1_span} and {edit2_span} overlap"),
            Conflict::AnchorHashMismatch { file_id, span, .. } => {
                write!(f, "{file_id}: text at {span} changed since the fix was computed")
            }
            Conflict::SpanOutOfBounds {
                file_id,
                span,
                file_len,
            } => write!(f, "{file_id}: span {span} is outside the file ({file_len} bytes)"),
            Conflict::FileMissing { file_id } => write!(f, "{file_id}: file not supplied"),
        }
    }
}

// ============================================================================
// Edits
// ============================================================================

/// Replace the anchored bytes of one file with `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    /// Stable identifier used as the final ordering tie-break.
    pub id: u32,
    /// File the edit applies to.
    pub file_id: FileId,
    /// Target location and its verification hash.
    pub anchor: Anchor,
    /// Replacement text.
    pub text: String,
}

impl Edit {
    /// Create a replacement edit.
    pub fn replace(id: u32, file_id: FileId, anchor: Anchor, text: impl Into<String>) -> Self {
        Edit {
            id,
            file_id,
            anchor,
            text: text.into(),
        }
    }

    /// The anchored span.
    pub fn span(&self) -> Span {
        self.anchor.span
    }
}

// ============================================================================
// PatchSet
// ============================================================================

/// An ordered set of edits applied all-or-nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchSet {
    /// The edits, in deterministic order once [`PatchSet::sort_edits`] ran.
    pub edits: Vec<Edit>,
    /// File id to path, used for ordering and materialization.
    pub file_paths: BTreeMap<FileId, String>,
}

impl PatchSet {
    /// Create an empty patch set.
    pub fn new() -> Self {
        PatchSet::default()
    }

    /// Add an edit.
    pub fn with_edit(mut self, edit: Edit) -> Self {
        self.edits.push(edit);
        self
    }

    /// Register a file path mapping.
    pub fn with_file_path(mut self, file_id: FileId, path: impl Into<String>) -> Self {
        self.file_paths.insert(file_id, path.into());
        self
    }

    /// Next free edit id.
    pub fn next_edit_id(&self) -> u32 {
        self.edits.len() as u32
    }

    /// True if the set contains at least one edit.
    pub fn has_edits(&self) -> bool {
        !self.edits.is_empty()
    }

    /// Number of edits.
    pub fn edit_count(&self) -> usize {
        self.edits.len()
    }

    /// Number of distinct files touched.
    pub fn file_count(&self) -> usize {
        self.edits
            .iter()
            .map(|e| e.file_id)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Order edits by file path, then span start, then edit id.
    pub fn sort_edits(&mut self) {
        let paths = &self.file_paths;
        self.edits.sort_by(|a, b| {
            let path_a = paths.get(&a.file_id).map(String::as_str);
            let path_b = paths.get(&b.file_id).map(String::as_str);
            path_a
                .cmp(&path_b)
                .then_with(|| a.span().start.cmp(&b.span().start))
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    /// Overlapping edits within each file.
    #[must_use]
    pub fn detect_conflicts(&self) -> Vec<Conflict> {
        let mut by_file: BTreeMap<FileId, Vec<Span>> = BTreeMap::new();
        for edit in &self.edits {
            by_file.entry(edit.file_id).or_default().push(edit.span());
        }

        let mut conflicts = Vec::new();
        for (file_id, spans) in by_file {
            for (i, a) in spans.iter().enumerate() {
                for b in &spans[i + 1..] {
                    if a.overlaps(b) {
                        conflicts.push(Conflict::OverlappingSpans {
                            file_id,
                            edit1_span: *a,
                            edit2_span: *b,
                        });
                    }
                }
            }
        }
        conflicts
    }
}

// ============================================================================
// Atomic Apply
// ============================================================================

/// Result of applying a patch set.
#[derive(Debug, Clone)]
pub enum ApplyResult {
    /// Every edit applied. Holds the new text of each modified file.
    Success {
        modified_files: HashMap<FileId, String>,
    },
    /// Nothing applied.
    Failed { conflicts: Vec<Conflict> },
}

impl PatchSet {
    /// Apply every edit to `file_contents`, or none of them.
    ///
    /// Edits within a file are applied from the end of the file backwards so
    /// earlier spans stay valid.
    #[must_use]
    pub fn apply(&self, file_contents: &HashMap<FileId, String>) -> ApplyResult {
        let mut conflicts = self.detect_conflicts();
        let mut resolved: BTreeMap<FileId, Vec<(Span, &str)>> = BTreeMap::new();

        for edit in &self.edits {
            let Some(content) = file_contents.get(&edit.file_id) else {
                conflicts.push(Conflict::FileMissing {
                    file_id: edit.file_id,
                });
                continue;
            };
            match edit.anchor.resolve(content.as_bytes()) {
                AnchorResolution::Resolved(span) => {
                    resolved
                        .entry(edit.file_id)
                        .or_default()
                        .push((span, edit.text.as_str()));
                }
                AnchorResolution::HashMismatch {
                    span,
                    expected,
                    actual,
                } => conflicts.push(Conflict::AnchorHashMismatch {
                    file_id: edit.file_id,
                    span,
                    expected,
                    actual,
                }),
                AnchorResolution::OutOfBounds { span, file_len } => {
                    conflicts.push(Conflict::SpanOutOfBounds {
                        file_id: edit.file_id,
                        span,
                        file_len,
                    })
                }
            }
        }

        if !conflicts.is_empty() {
            return ApplyResult::Failed { conflicts };
        }

        let mut modified_files = HashMap::new();
        for (file_id, mut edits) in resolved {
            let Some(original) = file_contents.get(&file_id) else {
                continue;
            };
            let mut content = original.clone();
            edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
            for (span, text) in edits {
                content.replace_range(span.range(), text);
            }
            modified_files.insert(file_id, content);
        }

        ApplyResult::Success { modified_files }
    }
}

// ============================================================================
// Materialization
// ============================================================================

/// A single edit as it appears in JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEdit {
    /// File path.
    pub file: String,
    /// Byte range being replaced.
    pub span: Span,
    /// Text currently in the range.
    pub old_text: String,
    /// Replacement text.
    pub new_text: String,
    /// 1-indexed line of the span start.
    pub line: u32,
    /// 1-indexed column of the span start.
    pub col: u32,
}

/// Patch rendered for output: individual edits plus a unified diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterializedPatch {
    /// Edits ordered by file, then span start.
    pub edits: Vec<OutputEdit>,
    /// One hunk per edit.
    pub unified_diff: String,
}

impl PatchSet {
    /// Render this patch set against the given file contents.
    pub fn materialize(&self, file_contents: &HashMap<FileId, String>) -> MaterializedPatch {
        let mut sorted = self.clone();
        sorted.sort_edits();

        let mut edits = Vec::with_capacity(sorted.edits.len());
        for edit in &sorted.edits {
            let path = sorted
                .file_paths
                .get(&edit.file_id)
                .cloned()
                .unwrap_or_else(|| edit.file_id.to_string());
            let span = edit.span();
            let (old_text, line, col) = match file_contents.get(&edit.file_id) {
                Some(content) => {
                    let old = content.get(span.range()).unwrap_or_default().to_string();
                    let (line, col) = byte_offset_to_position(content.as_bytes(), span.start);
                    (old, line, col)
                }
                None => (String::new(), 1, 1),
            };
            edits.push(OutputEdit {
                file: path,
                span,
                old_text,
                new_text: edit.text.clone(),
                line,
                col,
            });
        }

        let unified_diff = unified_diff(&edits);
        MaterializedPatch {
            edits,
            unified_diff,
        }
    }
}

/// Simplified unified diff: one hunk per edit, grouped by file.
fn unified_diff(edits: &[OutputEdit]) -> String {
    let mut diff = String::new();
    let mut current_file: Option<&str> = None;

    for edit in edits {
        if current_file != Some(edit.file.as_str()) {
            diff.push_str(&format!("--- a/{}\n+++ b/{}\n", edit.file, edit.file));
            current_file = Some(edit.file.as_str());
        }
        let old_lines: Vec<&str> = edit.old_text.lines().collect();
        let new_lines: Vec<&str> = edit.new_text.lines().collect();
        diff.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            edit.line,
            old_lines.len(),
            edit.line,
            new_lines.len()
        ));
        for line in old_lines {
            diff.push_str(&format!("-{}\n", line));
        }
        for line in new_lines {
            diff.push_str(&format!("+{}\n", line));
        }
    }

    diff
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "public static readonly DependencyProperty BarProperty;\n";

    fn contents() -> HashMap<FileId, String> {
        let mut map = HashMap::new();
        map.insert(FileId(0), SOURCE.to_string());
        map
    }

    fn rename_edit(id: u32, needle: &str, text: &str) -> Edit {
        let start = SOURCE.find(needle).unwrap() as u32;
        let span = Span::new(start, start + needle.len() as u32);
        let anchor = Anchor::capture(span, SOURCE.as_bytes()).unwrap();
        Edit::replace(id, FileId(0), anchor, text)
    }

    mod span_tests {
        use super::*;

        #[test]
        fn adjacent_spans_do_not_overlap() {
            assert!(!Span::new(0, 5).overlaps(&Span::new(5, 10)));
            assert!(Span::new(0, 6).overlaps(&Span::new(5, 10)));
        }

        #[test]
        fn cover_spans_both() {
            let span = Span::new(10, 12).cover(Span::new(3, 5));
            assert_eq!(span, Span::new(3, 12));
            assert_eq!(span.len(), 9);
        }
    }

    mod anchor_tests {
        use super::*;

        #[test]
        fn capture_rejects_out_of_bounds() {
            assert!(Anchor::capture(Span::new(0, 500), SOURCE.as_bytes()).is_none());
        }

        #[test]
        fn resolve_detects_changed_text() {
            let edit = rename_edit(0, "BarProperty", "FooProperty");
            let changed = SOURCE.replace("BarProperty", "BazProperty");
            assert!(matches!(
                edit.anchor.resolve(changed.as_bytes()),
                AnchorResolution::HashMismatch { .. }
            ));
        }
    }

    mod apply_tests {
        use super::*;

        #[test]
        fn applies_all_edits() {
            let patch = PatchSet::new()
                .with_edit(rename_edit(0, "BarProperty", "FooProperty"))
                .with_edit(rename_edit(1, "DependencyProperty", "DP"));
            match patch.apply(&contents()) {
                ApplyResult::Success { modified_files } => {
                    assert_eq!(
                        modified_files[&FileId(0)],
                        "public static readonly DP FooProperty;\n"
                    );
                }
                ApplyResult::Failed { conflicts } => panic!("unexpected conflicts {conflicts:?}"),
            }
        }

        #[test]
        fn stale_text_applies_nothing() {
            let patch = PatchSet::new().with_edit(rename_edit(0, "BarProperty", "FooProperty"));
            let mut stale = contents();
            stale.insert(FileId(0), format!("// edited\n{SOURCE}"));
            match patch.apply(&stale) {
                ApplyResult::Failed { conflicts } => {
                    assert_eq!(conflicts.len(), 1);
                    assert!(matches!(conflicts[0], Conflict::AnchorHashMismatch { .. }));
                }
                ApplyResult::Success { .. } => panic!("stale patch must not apply"),
            }
        }

        #[test]
        fn overlapping_edits_conflict() {
            let patch = PatchSet::new()
                .with_edit(rename_edit(0, "BarProperty", "A"))
                .with_edit(rename_edit(1, "Bar", "B"));
            assert_eq!(patch.detect_conflicts().len(), 1);
            assert!(matches!(patch.apply(&contents()), ApplyResult::Failed { .. }));
        }

        #[test]
        fn missing_file_is_a_conflict() {
            let patch = PatchSet::new().with_edit(rename_edit(0, "BarProperty", "A"));
            match patch.apply(&HashMap::new()) {
                ApplyResult::Failed { conflicts } => {
                    assert_eq!(conflicts, vec![Conflict::FileMissing { file_id: FileId(0) }]);
                }
                ApplyResult::Success { .. } => panic!("expected failure"),
            }
        }
    }

    mod materialization_tests {
        use super::*;

        #[test]
        fn materialize_reports_old_text_and_position() {
            let patch = PatchSet::new()
                .with_edit(rename_edit(0, "BarProperty", "FooProperty"))
                .with_file_path(FileId(0), "Foo.cs");
            let out = patch.materialize(&contents());
            assert_eq!(out.edits.len(), 1);
            assert_eq!(out.edits[0].old_text, "BarProperty");
            assert_eq!(out.edits[0].line, 1);
            assert_eq!(out.edits[0].col, 43);
            assert!(out.unified_diff.starts_with("--- a/Foo.cs\n+++ b/Foo.cs\n"));
            assert!(out.unified_diff.contains("-BarProperty\n+FooProperty\n"));
        }
    }
}
