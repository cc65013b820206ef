//! Engine-provided globals every context starts with.

use crate::{
    environment::EnvironmentRef,
    exception::{ErrorKind, Exception},
    runtime::Interpreter,
    value::{NativeCallback, Value},
};

const CONSTRUCTORS: &[(&str, NativeCallback)] = &[
    ("Error", construct_error),
    ("TypeError", construct_type_error),
    ("RangeError", construct_range_error),
    ("ReferenceError", construct_reference_error),
    ("SyntaxError", construct_syntax_error),
];

pub fn install(env: &EnvironmentRef) {
    let mut scope = env.borrow_mut();
    for (name, callback) in CONSTRUCTORS {
        scope.define(*name, Value::native_constructor(*name, *callback), true);
    }
    scope.define("String", Value::native("String", string), true);
}

fn construct(interp: &mut Interpreter, args: &[Value], kind: ErrorKind) -> Result<Value, Exception> {
    let message = match args.first() {
        Some(message) if !message.is_undefined() => interp.to_string_value(message)?,
        _ => String::new(),
    };
    Ok(interp.make_error(kind.name(), message))
}

fn construct_error(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    construct(interp, args, ErrorKind::Error)
}

fn construct_type_error(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    construct(interp, args, ErrorKind::TypeError)
}

fn construct_range_error(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    construct(interp, args, ErrorKind::RangeError)
}

fn construct_reference_error(
    interp: &mut Interpreter,
    args: &[Value],
) -> Result<Value, Exception> {
    construct(interp, args, ErrorKind::ReferenceError)
}

fn construct_syntax_error(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    construct(interp, args, ErrorKind::SyntaxError)
}

fn string(interp: &mut Interpreter, args: &[Value]) -> Result<Value, Exception> {
    match args.first() {
        Some(value) => Ok(Value::string(interp.to_string_value(value)?)),
        None => Ok(Value::string("")),
    }
}
