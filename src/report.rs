use std::io::{self, Write};

use tracing::debug;

use crate::exception::ExceptionRecord;

/// Writes a human-readable report of `record` to `err`:
///
/// ```text
/// origin:line: message
/// source line
///     ^^^^^
/// stack trace
/// ```
///
/// Records without a position print only the message. Write failures are
/// logged and otherwise ignored.
pub fn report_exception(record: &ExceptionRecord, err: &mut dyn Write) {
    if let Err(error) = write_report(record, err) {
        debug!(%error, "failed to write exception report");
    }
}

fn write_report(record: &ExceptionRecord, err: &mut dyn Write) -> io::Result<()> {
    let (Some(origin), Some(line)) = (&record.origin, record.line_number) else {
        writeln!(err, "{}", record.message)?;
        return err.flush();
    };

    writeln!(err, "{origin}:{line}: {}", record.message)?;
    if let Some(source_line) = &record.source_line {
        writeln!(err, "{source_line}")?;
    }
    writeln!(err, "{}", underline(record.start_column, record.end_column))?;
    if let Some(stack) = record.stack_trace.as_deref().filter(|stack| !stack.is_empty()) {
        writeln!(err, "{stack}")?;
    }
    err.flush()
}

/// Marker under the offending range; inverted or negative ranges get no carets.
fn underline(start: i64, end: i64) -> String {
    let padding = start.max(0) as usize;
    let width = if start < 0 || end < 0 || start > end {
        0
    } else {
        (end - start) as usize
    };
    format!("{}{}", " ".repeat(padding), "^".repeat(width))
}
