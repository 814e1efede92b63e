//! Text position utilities for byte offset and line:column conversions.
//!
//! Lines and columns are 1-indexed, byte offsets 0-indexed. Columns count
//! bytes, which matches how spans are stored throughout the model.

use crate::patch::Span;

/// Convert a byte offset to 1-indexed line and column.
///
/// Offsets past the end of `content` clamp to the end.
pub fn byte_offset_to_position(content: &[u8], offset: u32) -> (u32, u32) {
    let offset = (offset as usize).min(content.len());
    let mut line = 1u32;
    let mut col = 1u32;

    for &byte in &content[..offset] {
        if byte == b'\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// Convert 1-indexed line and column to a byte offset.
///
/// Returns `None` when the line does not exist or the column runs past the
/// end of that line. Line or column values of 0 are treated as 1.
pub fn position_to_byte_offset(content: &[u8], line: u32, col: u32) -> Option<u32> {
    let line = line.max(1);
    let col = col.max(1);

    let mut line_start = 0usize;
    let mut current = 1u32;
    while current < line {
        let newline = content[line_start..].iter().position(|&b| b == b'\n')?;
        line_start += newline + 1;
        current += 1;
    }

    let line_end = content[line_start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(content.len(), |n| line_start + n);
    let offset = line_start + (col as usize - 1);
    (offset <= line_end).then_some(offset as u32)
}

/// The source text covered by `span`, or an empty string when it does not fit.
pub fn span_text(content: &str, span: Span) -> &str {
    content.get(span.range()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT: &[u8] = b"class Foo\n{\n    int Bar;\n}\n";

    #[test]
    fn offset_to_position_tracks_lines() {
        assert_eq!(byte_offset_to_position(CONTENT, 0), (1, 1));
        assert_eq!(byte_offset_to_position(CONTENT, 6), (1, 7));
        assert_eq!(byte_offset_to_position(CONTENT, 16), (3, 5));
    }

    #[test]
    fn offset_past_end_clamps() {
        assert_eq!(byte_offset_to_position(CONTENT, 10_000), (5, 1));
    }

    #[test]
    fn position_to_offset_round_trips() {
        let offset = position_to_byte_offset(CONTENT, 3, 9).unwrap();
        assert_eq!(&CONTENT[offset as usize..offset as usize + 3], b"Bar");
        assert_eq!(byte_offset_to_position(CONTENT, offset), (3, 9));
    }

    #[test]
    fn position_outside_content_is_none() {
        assert_eq!(position_to_byte_offset(CONTENT, 42, 1), None);
        assert_eq!(position_to_byte_offset(CONTENT, 1, 40), None);
    }

    #[test]
    fn span_text_is_lenient() {
        let content = "public int Bar";
        assert_eq!(span_text(content, Span::new(11, 14)), "Bar");
        assert_eq!(span_text(content, Span::new(11, 99)), "");
    }
}
