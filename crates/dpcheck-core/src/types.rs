//! Output types shared by diagnostics, errors and the CLI.

use serde::{Deserialize, Serialize};

use crate::patch::Span;
use crate::text::byte_offset_to_position;

// ============================================================================
// Location Type
// ============================================================================

/// Location in a source file.
///
/// - `file`: path as recorded in the snapshot
/// - `line`: 1-indexed line number
/// - `col`: 1-indexed column, UTF-8 bytes
/// - `byte_start` / `byte_end`: optional byte offsets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Location {
    /// File path.
    pub file: String,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed, UTF-8 bytes).
    pub col: u32,
    /// Byte offset from file start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_start: Option<u32>,
    /// Byte offset end, exclusive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_end: Option<u32>,
}

impl Location {
    /// Create a location without byte offsets.
    pub fn new(file: impl Into<String>, line: u32, col: u32) -> Self {
        Location {
            file: file.into(),
            line,
            col,
            byte_start: None,
            byte_end: None,
        }
    }

    /// Location of `span` within `content`.
    pub fn from_span(file: impl Into<String>, content: &str, span: Span) -> Self {
        let (line, col) = byte_offset_to_position(content.as_bytes(), span.start);
        Location {
            file: file.into(),
            line,
            col,
            byte_start: Some(span.start),
            byte_end: Some(span.end),
        }
    }

    /// Parse a location from `path:line:col`.
    ///
    /// Splits from the right so paths containing colons survive.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.rsplitn(3, ':');
        let col = parts.next()?.parse().ok()?;
        let line = parts.next()?.parse().ok()?;
        let file = parts.next()?;
        if file.is_empty() {
            return None;
        }
        Some(Location::new(file, line, col))
    }

    /// Byte span, when both offsets are known.
    pub fn span(&self) -> Option<Span> {
        Some(Span::new(self.byte_start?, self.byte_end?))
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod location_parse {
        use super::*;

        #[test]
        fn parses_simple_location() {
            let loc = Location::parse("src/Foo.cs:12:5").unwrap();
            assert_eq!(loc.file, "src/Foo.cs");
            assert_eq!(loc.line, 12);
            assert_eq!(loc.col, 5);
            assert!(loc.span().is_none());
        }

        #[test]
        fn keeps_colons_in_path() {
            let loc = Location::parse("C:/work/Foo.cs:3:1").unwrap();
            assert_eq!(loc.file, "C:/work/Foo.cs");
        }

        #[test]
        fn rejects_malformed_input() {
            assert!(Location::parse("Foo.cs").is_none());
            assert!(Location::parse("Foo.cs:x:1").is_none());
            assert!(Location::parse(":1:1").is_none());
        }
    }

    mod location_serialize {
        use super::*;

        #[test]
        fn omits_missing_offsets() {
            let json = serde_json::to_string(&Location::new("a.cs", 1, 2)).unwrap();
            assert_eq!(json, r#"{"file":"a.cs","line":1,"col":2}"#);
        }

        #[test]
        fn from_span_fills_offsets() {
            let loc = Location::from_span("a.cs", "ab\ncd", Span::new(3, 5));
            assert_eq!((loc.line, loc.col), (2, 1));
            assert_eq!(loc.span(), Some(Span::new(3, 5)));
        }
    }
}
