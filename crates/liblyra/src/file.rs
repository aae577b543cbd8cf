//! Source file representation for the Lyra compiler core.
//!
//! This module provides the `SourceFile` struct which represents a source file
//! with its path and contents. Positions attached to AST nodes reference a
//! `SourceFile` so that diagnostics can be rendered with full file context.

use std::{path::PathBuf, sync::Arc};

/// Represents a source file with its path and source code content
///
/// This structure is used throughout the compiler to track source files
/// and provide error reporting with proper file context. Cloning is cheap;
/// the path and content are shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    /// The file path as a vector of path components
    pub path: Arc<Vec<String>>,
    /// The source code content of the file
    pub code: Arc<String>,
}

impl std::fmt::Display for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

impl SourceFile {
    /// Creates a new source file with the given path and source code
    ///
    /// # Arguments
    /// * `path` - Vector of path components representing the file path
    /// * `code` - The source code content as a string
    pub fn new(path: Vec<String>, code: String) -> Self {
        Self {
            path: path.into(),
            code: code.into(),
        }
    }

    /// A placeholder file for nodes synthesized by the compiler itself
    pub fn internal() -> Self {
        Self::new(vec!["<internal>".into()], String::new())
    }

    /// Returns a reference to the file path components
    pub fn path(&self) -> &Vec<String> {
        &self.path
    }

    /// Returns a reference to the source code content
    pub fn code(&self) -> &String {
        self.code.as_ref()
    }

    /// Returns the path components joined into a single displayable name
    pub fn name(&self) -> String {
        let pathbuffer = PathBuf::from_iter(self.path.iter());
        pathbuffer.to_string_lossy().to_string()
    }

    /// Computes the 1-based line number of a byte offset in this file
    pub fn line_of(&self, offset: usize) -> usize {
        let end = offset.min(self.code.len());
        self.code[..end].bytes().filter(|byte| *byte == b'\n').count() + 1
    }
}
