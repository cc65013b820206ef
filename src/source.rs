use std::{fs, path::Path};

use crate::diagnostics::{HuskError, Result, SourceSpan};

/// A named piece of script text, as read from disk or handed to `load`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub origin: String,
    pub text: String,
}

impl SourceUnit {
    pub fn new(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            text: text.into(),
        }
    }

    /// Invalid UTF-8 sequences are replaced rather than rejected.
    pub fn from_bytes(origin: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(origin, String::from_utf8_lossy(bytes).into_owned())
    }

    /// Reads the whole file at `path`; the path's display form becomes the origin.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| HuskError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_bytes(path.display().to_string(), &bytes))
    }
}

/// Where a span lands once mapped onto lines of its script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// 1-based.
    pub line: usize,
    /// Character columns, 0-based, end exclusive and clamped to the end of `line`.
    pub start_column: usize,
    pub end_column: usize,
    pub source_line: String,
}

/// Compiled-side view of a source unit: keeps the text so spans can be
/// turned into line/column positions long after parsing.
#[derive(Debug)]
pub struct Script {
    origin: String,
    text: String,
    line_starts: Vec<usize>,
}

impl Script {
    pub fn new(origin: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0];
        line_starts.extend(
            text.char_indices()
                .filter(|(_, ch)| *ch == '\n')
                .map(|(idx, _)| idx + 1),
        );
        Self {
            origin: origin.into(),
            text,
            line_starts,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn slice(&self, span: SourceSpan) -> &str {
        let end = span.end.min(self.text.len());
        self.text.get(span.start.min(end)..end).unwrap_or("")
    }

    pub fn locate(&self, span: SourceSpan) -> Location {
        let offset = span.start.min(self.text.len());
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line_start = self.line_starts[line_idx];
        let line_end = self
            .line_starts
            .get(line_idx + 1)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        let raw_line = &self.text[line_start..line_end];
        let source_line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

        let line_limit = (line_start + source_line.len()).max(offset);
        let end = span.end.clamp(offset, line_limit);
        let start_column = self.text[line_start..offset].chars().count();
        let end_column = start_column + self.text[offset..end].chars().count();

        Location {
            line: line_idx + 1,
            start_column,
            end_column,
            source_line: source_line.to_string(),
        }
    }
}
