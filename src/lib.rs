//! Minimal host shell for a bundled scripting engine: runs a script file in
//! an isolated context with `print`, `read` and `load` available, and reports
//! uncaught errors with file, line, source excerpt and stack trace.

pub mod ast;
pub mod builtins;
pub mod context;
pub mod diagnostics;
pub mod environment;
pub mod exception;
pub mod execute;
pub mod host;
pub mod lexer;
pub mod parser;
pub mod platform;
pub mod report;
pub mod runtime;
pub mod shell;
pub mod source;
pub mod stack;
pub mod streams;
pub mod value;

pub use context::create_context;
pub use diagnostics::{Diagnostic, DiagnosticKind, HuskError, SourceSpan};
pub use exception::{ErrorKind, Exception, ExceptionRecord};
pub use execute::{execute, Execution};
pub use host::HostError;
pub use platform::Platform;
pub use report::report_exception;
pub use runtime::{CompiledUnit, Interpreter};
pub use shell::run_file;
pub use source::SourceUnit;
pub use streams::{CaptureBuffer, Streams};
pub use value::Value;
