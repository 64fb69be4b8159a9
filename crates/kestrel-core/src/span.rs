//! Source positions attached to declarations, expressions and errors.

use std::fmt;

/// Where something started in its source file.
///
/// Spans come from the front end. Line `0` marks a synthesized node with no
/// source position; no line-number entry is emitted for it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// 1-based line, or 0 when unknown.
    pub line: u32,
    pub col: u32,
    /// Length in bytes.
    pub len: u32,
}

impl Span {
    #[inline]
    pub fn new(line: u32, col: u32, len: u32) -> Self {
        Self { line, col, len }
    }

    /// Whether the front end supplied a real position.
    #[inline]
    pub fn is_known(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "{}:{}", self.line, self.col)
        } else {
            f.write_str("<generated>")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_spans_display_line_and_column() {
        assert_eq!(Span::new(3, 15, 5).to_string(), "3:15");
    }

    #[test]
    fn default_span_is_generated() {
        assert!(!Span::default().is_known());
        assert_eq!(Span::default().to_string(), "<generated>");
    }
}
