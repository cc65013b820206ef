//! Functions the shell exposes to every script: `print`, `read` and `load`.

use std::fs;

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{
    exception::Exception,
    execute::execute,
    runtime::Interpreter,
    source::SourceUnit,
    value::{NativeCallback, Value},
};

/// Global name and native entry point of each host function.
pub const BINDINGS: &[(&str, NativeCallback)] = &[("print", print), ("read", read), ("load", load)];

/// Failures raised by host functions back into the calling script.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Bad parameters: {function}() expects {expected} argument(s), received {received}")]
    BadArguments {
        function: &'static str,
        expected: usize,
        received: usize,
    },
    #[error("Error loading file{}: {reason}", quoted(path))]
    FileError {
        path: Option<String>,
        reason: String,
    },
    #[error("Error executing file '{path}'")]
    ExecutionError {
        path: String,
        #[source]
        cause: Exception,
    },
}

fn quoted(path: &Option<String>) -> String {
    path.as_ref()
        .map(|path| format!(" '{path}'"))
        .unwrap_or_default()
}

impl HostError {
    /// The `name` scripts see on the thrown Error object.
    pub fn name(&self) -> &'static str {
        match self {
            HostError::BadArguments { .. } => "BadArguments",
            HostError::FileError { .. } => "FileError",
            HostError::ExecutionError { .. } => "ExecutionError",
        }
    }

    /// Converts into an engine exception; a failed `load` keeps the loaded
    /// script's exception reachable as `cause`.
    pub fn into_exception(self, interp: &Interpreter) -> Exception {
        let error = interp.make_error(self.name(), self.to_string());
        if let HostError::ExecutionError { cause, .. } = self {
            error.define_property("cause", cause.into_value());
        }
        Exception::new(error)
    }
}

fn print(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    trace!(args = args.len(), "print");
    let mut line = String::new();
    for (idx, arg) in args.iter().enumerate() {
        if idx > 0 {
            line.push(' ');
        }
        line.push_str(&interp.to_string_value(arg)?);
    }
    line.push('\n');

    let out = interp.streams_mut().out();
    if let Err(error) = out.write_all(line.as_bytes()).and_then(|()| out.flush()) {
        warn!(%error, "print could not write to standard output");
    }
    Ok(Value::undefined())
}

fn read(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    trace!(args = args.len(), "read");
    read_file(interp, args).map_err(|error| error.into_exception(interp))
}

fn read_file(interp: &mut Interpreter, args: &[Value]) -> Result<Value, HostError> {
    let [path] = args else {
        return Err(HostError::BadArguments {
            function: "read",
            expected: 1,
            received: args.len(),
        });
    };
    let path = path_argument(interp, path)?;
    let source = read_source(&path)?;
    debug!(path = %path, bytes = source.text.len(), "read file");
    Ok(Value::string(source.text))
}

fn load(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    trace!(args = args.len(), "load");
    load_files(interp, args).map_err(|error| error.into_exception(interp))
}

/// Runs each file in order and stops at the first one that fails.
fn load_files(interp: &mut Interpreter, args: &[Value]) -> Result<Value, HostError> {
    for arg in args {
        let path = path_argument(interp, arg)?;
        let source = read_source(&path)?;
        debug!(path = %path, "loading script");
        if let Err(cause) = execute(interp, &source, false, false).into_result() {
            debug!(path = %path, %cause, "loaded script failed");
            return Err(HostError::ExecutionError { path, cause });
        }
    }
    Ok(Value::undefined())
}

fn path_argument(interp: &mut Interpreter, value: &Value) -> Result<String, HostError> {
    interp
        .to_string_value(value)
        .map_err(|exception| HostError::FileError {
            path: None,
            reason: format!("path argument is not a string ({exception})"),
        })
}

fn read_source(path: &str) -> Result<SourceUnit, HostError> {
    fs::read(path)
        .map(|bytes| SourceUnit::from_bytes(path, &bytes))
        .map_err(|error| HostError::FileError {
            path: Some(path.to_string()),
            reason: error.to_string(),
        })
}
