use tracing::{debug, warn};

use crate::{
    exception::Exception, report::report_exception, runtime::Interpreter, source::SourceUnit,
    value::Value,
};

/// Shown in place of a result whose string conversion threw.
const CONVERSION_FAILED: &str = "<string conversion failed>";

/// Outcome of one compile-and-run attempt.
#[derive(Debug)]
pub enum Execution {
    Success(Value),
    CompileFailure(Exception),
    RuntimeFailure(Exception),
}

impl Execution {
    pub fn succeeded(&self) -> bool {
        matches!(self, Execution::Success(_))
    }

    pub fn exception(&self) -> Option<&Exception> {
        match self {
            Execution::Success(_) => None,
            Execution::CompileFailure(exception) | Execution::RuntimeFailure(exception) => {
                Some(exception)
            }
        }
    }

    pub fn into_result(self) -> Result<Value, Exception> {
        match self {
            Execution::Success(value) => Ok(value),
            Execution::CompileFailure(exception) | Execution::RuntimeFailure(exception) => {
                Err(exception)
            }
        }
    }
}

/// Compiles and runs `source` in `interp`.
///
/// With `print_result`, a completion value other than `undefined` is written
/// to the context's output stream. With `report_exceptions`, a failure of
/// either stage is written to the error stream; otherwise it is only
/// returned to the caller.
pub fn execute(
    interp: &mut Interpreter,
    source: &SourceUnit,
    print_result: bool,
    report_exceptions: bool,
) -> Execution {
    let unit = match interp.compile(&source.text, &source.origin) {
        Ok(unit) => unit,
        Err(exception) => {
            debug!(origin = %source.origin, %exception, "compilation failed");
            if report_exceptions {
                report(interp, &exception);
            }
            return Execution::CompileFailure(exception);
        }
    };

    match interp.run(&unit) {
        Ok(value) => {
            if print_result && !value.is_undefined() {
                print_value(interp, &value);
            }
            Execution::Success(value)
        }
        Err(exception) => {
            debug!(origin = %source.origin, %exception, "script threw");
            if report_exceptions {
                report(interp, &exception);
            }
            Execution::RuntimeFailure(exception)
        }
    }
}

fn print_value(interp: &mut Interpreter, value: &Value) {
    let text = interp
        .to_string_value(value)
        .unwrap_or_else(|_| CONVERSION_FAILED.to_string());
    let out = interp.streams_mut().out();
    if let Err(error) = writeln!(out, "{text}").and_then(|()| out.flush()) {
        warn!(%error, "could not write script result");
    }
}

fn report(interp: &mut Interpreter, exception: &Exception) {
    report_exception(&exception.record(), interp.streams_mut().err());
}
