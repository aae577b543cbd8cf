//! Source positions for AST nodes and diagnostics.
//!
//! A `Position` ties a byte range to the `SourceFile` it came from. Every
//! node carries one; rewrites performed during semantic analysis keep the
//! position of the node they replace so diagnostics stay accurate.

use std::ops::Range;

use crate::file::SourceFile;

/// A location in a source file, kept on every AST node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// The source file this position belongs to
    pub file: SourceFile,
    /// The byte range in the source file
    pub range: Range<usize>,
}

impl Position {
    /// Creates a new position from a file and a byte range
    pub fn new(file: SourceFile, range: Range<usize>) -> Self {
        Self { file, range }
    }

    /// A placeholder position for compiler synthesized nodes
    pub fn internal() -> Self {
        Self::new(SourceFile::internal(), 0..0)
    }

    /// Returns the 1-based line number of the start of this position
    pub fn line(&self) -> usize {
        self.file.line_of(self.range.start)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file.name(), self.line())
    }
}
