//! Source file management for diagnostics and lexing.
//!
//! The SourceMap holds all source buffers and provides source IDs for
//! accurate error reporting across multiple files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Unique identifier for a source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(pub u32);

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// The layout convention of a source buffer.
///
/// Fixed form is the punched-card layout: columns 1-5 hold an optional
/// statement label, a non-blank non-zero column 6 continues the previous
/// line, the statement body occupies columns 7-72 and anything beyond 72
/// is ignored. Free form uses `!` comments and `&` continuations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceForm {
    Fixed,
    Free,
}

impl SourceForm {
    /// Select the source form from a file extension: `.f` and `.F` are
    /// fixed form, everything else is free form.
    pub fn from_path(path: &Path) -> SourceForm {
        match path.extension().and_then(|e| e.to_str()) {
            Some("f") | Some("F") => SourceForm::Fixed,
            _ => SourceForm::Free,
        }
    }
}

/// A source file with its content and metadata.
#[derive(Debug, Clone)]
pub struct Source {
    /// Unique ID for this source.
    pub id: SourceId,
    /// Optional file path (None for inline sources).
    pub path: Option<PathBuf>,
    /// The source code content.
    pub content: String,
    /// Layout convention used when lexing this buffer.
    pub form: SourceForm,
}

impl Source {
    /// Get a display name for this source.
    pub fn name(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| format!("<source#{}>", self.id.0))
    }

    /// Get 1-based line and column for a byte offset.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let mut line = 1;
        let mut col = 1;
        for (i, ch) in self.content.char_indices() {
            if i >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        (line, col)
    }

    /// Get a snippet of source code around a line.
    pub fn snippet(&self, line: usize, context: usize) -> String {
        let lines: Vec<&str> = self.content.lines().collect();
        let start = line.saturating_sub(context + 1);
        let end = (line + context).min(lines.len());

        lines[start..end]
            .iter()
            .enumerate()
            .map(|(i, l)| format!("{:4} | {}", start + i + 1, l))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Manages a collection of source buffers.
#[derive(Debug, Default, Clone)]
pub struct SourceMap {
    sources: HashMap<SourceId, Source>,
    path_to_id: HashMap<PathBuf, SourceId>,
    next_id: u32,
}

impl SourceMap {
    /// Create a new empty source map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source file with a path; the form is derived from the
    /// extension.
    pub fn add_file(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> SourceId {
        let path = path.into();
        let form = SourceForm::from_path(&path);
        self.add_file_with_form(path, content, form)
    }

    /// Add a source file with an explicit form.
    pub fn add_file_with_form(
        &mut self,
        path: impl Into<PathBuf>,
        content: impl Into<String>,
        form: SourceForm,
    ) -> SourceId {
        let path = path.into();
        let content = content.into();

        if let Some(&id) = self.path_to_id.get(&path) {
            return id;
        }

        let id = SourceId(self.next_id);
        self.next_id += 1;

        self.path_to_id.insert(path.clone(), id);
        self.sources.insert(
            id,
            Source {
                id,
                path: Some(path),
                content,
                form,
            },
        );

        id
    }

    /// Add an inline source (no path).
    pub fn add_inline(&mut self, content: impl Into<String>, form: SourceForm) -> SourceId {
        let id = SourceId(self.next_id);
        self.next_id += 1;

        self.sources.insert(
            id,
            Source {
                id,
                path: None,
                content: content.into(),
                form,
            },
        );

        id
    }

    /// Get a source by ID.
    pub fn get(&self, id: SourceId) -> Option<&Source> {
        self.sources.get(&id)
    }

    /// Get a source ID by path.
    pub fn get_id(&self, path: &Path) -> Option<SourceId> {
        self.path_to_id.get(path).copied()
    }

    /// Get all source IDs.
    pub fn source_ids(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.sources.keys().copied()
    }
}

/// A location in source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Source buffer ID.
    pub source: SourceId,
    /// Start byte offset.
    pub start: usize,
    /// End byte offset.
    pub end: usize,
}

impl Span {
    /// Create a new span.
    pub fn new(source: SourceId, start: usize, end: usize) -> Self {
        Self { source, start, end }
    }

    /// Create a zero-length span at a position.
    pub fn point(source: SourceId, offset: usize) -> Self {
        Self::new(source, offset, offset)
    }

    /// Merge two spans (smallest start to largest end).
    pub fn merge(self, other: Self) -> Self {
        assert_eq!(
            self.source, other.source,
            "cannot merge spans from different sources"
        );
        Self {
            source: self.source,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self {
            source: SourceId(0),
            start: 0,
            end: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_from_extension() {
        assert_eq!(SourceForm::from_path(Path::new("a.f")), SourceForm::Fixed);
        assert_eq!(SourceForm::from_path(Path::new("a.F")), SourceForm::Fixed);
        assert_eq!(SourceForm::from_path(Path::new("a.f90")), SourceForm::Free);
        assert_eq!(SourceForm::from_path(Path::new("a")), SourceForm::Free);
    }

    #[test]
    fn test_line_col() {
        let mut map = SourceMap::new();
        let id = map.add_inline("PROGRAM P\nEND\n", SourceForm::Free);
        let src = map.get(id).unwrap();
        assert_eq!(src.line_col(0), (1, 1));
        assert_eq!(src.line_col(10), (2, 1));
        assert_eq!(src.line_col(12), (2, 3));
    }

    #[test]
    fn test_span_merge() {
        let a = Span::new(SourceId(0), 4, 8);
        let b = Span::new(SourceId(0), 6, 12);
        let m = a.merge(b);
        assert_eq!((m.start, m.end), (4, 12));
    }
}
