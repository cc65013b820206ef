//! Thrown values and the positional metadata the engine attaches to them.

use std::fmt;

use crate::{source::Location, value::Value};

/// Error classes the engine raises on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    ReferenceError,
    SyntaxError,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
        }
    }
}

/// Script and position an exception was raised at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrowSite {
    pub origin: String,
    pub location: Location,
}

/// A value in flight through the engine's exception machinery.
#[derive(Debug, Clone)]
pub struct Exception {
    value: Value,
    site: Option<ThrowSite>,
}

impl Exception {
    pub fn new(value: Value) -> Self {
        Self { value, site: None }
    }

    pub fn with_site(mut self, site: ThrowSite) -> Self {
        self.site = Some(site);
        self
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn site(&self) -> Option<&ThrowSite> {
        self.site.as_ref()
    }

    /// The `stack` captured by an Error object; thrown primitives have none.
    pub fn stack_trace(&self) -> Option<String> {
        if !self.value.is_error() {
            return None;
        }
        self.value
            .get_property("stack")
            .and_then(|stack| stack.as_str().map(str::to_string))
            .filter(|stack| !stack.is_empty())
    }

    pub fn record(&self) -> ExceptionRecord {
        let mut record = ExceptionRecord::bare(self.value.to_string());
        if let Some(site) = &self.site {
            record.origin = Some(site.origin.clone());
            record.line_number = Some(site.location.line);
            record.start_column = site.location.start_column as i64;
            record.end_column = site.location.end_column as i64;
            record.source_line = Some(site.location.source_line.clone());
        }
        record.stack_trace = self.stack_trace();
        record
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl std::error::Error for Exception {}

/// Read-only snapshot of an exception, as consumed by the reporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionRecord {
    pub message: String,
    pub origin: Option<String>,
    pub line_number: Option<usize>,
    pub start_column: i64,
    pub end_column: i64,
    pub source_line: Option<String>,
    pub stack_trace: Option<String>,
}

impl ExceptionRecord {
    /// A record carrying only a message, with no positional metadata.
    pub fn bare(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            origin: None,
            line_number: None,
            start_column: 0,
            end_column: 0,
            source_line: None,
            stack_trace: None,
        }
    }
}
