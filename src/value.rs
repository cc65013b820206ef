use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;
use thiserror::Error;

use crate::{
    ast::FunctionDecl, environment::EnvironmentRef, exception::Exception, runtime::Interpreter,
    source::Script,
};

/// Calling convention for host-provided functions: the running interpreter
/// plus the ordered argument list, answering with a value or a raised exception.
pub type NativeCallback = fn(&mut Interpreter, &[Value]) -> Result<Value, Exception>;

/// Highest array length reachable through index assignment.
pub const MAX_ARRAY_LENGTH: usize = 1 << 20;

/// Arrays and errors nested deeper than this render as empty strings, the
/// same as a value that contains itself.
const MAX_RENDER_DEPTH: usize = 64;

#[derive(Debug, Error)]
#[error("Invalid array length")]
pub struct InvalidArrayLength;

#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

pub enum ValueKind {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(RefCell<Vec<Value>>),
    Object(ObjectValue),
    Function(UserFunction),
    NativeFunction(NativeFunction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    Plain,
    Error,
}

pub struct ObjectValue {
    pub class: ObjectClass,
    pub properties: RefCell<IndexMap<String, Value>>,
}

pub struct UserFunction {
    pub decl: Rc<FunctionDecl>,
    pub env: EnvironmentRef,
    pub script: Rc<Script>,
}

impl UserFunction {
    pub fn name(&self) -> &str {
        self.decl.name.as_deref().unwrap_or("")
    }
}

pub struct NativeFunction {
    pub name: &'static str,
    pub constructor: bool,
    pub callback: NativeCallback,
}

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn undefined() -> Self {
        Self::new(ValueKind::Undefined)
    }

    pub fn null() -> Self {
        Self::new(ValueKind::Null)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn number(value: f64) -> Self {
        Self::new(ValueKind::Number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self::new(ValueKind::Array(RefCell::new(values)))
    }

    pub fn object(properties: IndexMap<String, Value>) -> Self {
        Self::new(ValueKind::Object(ObjectValue {
            class: ObjectClass::Plain,
            properties: RefCell::new(properties),
        }))
    }

    /// Error object without a `stack`; the interpreter attaches one when it
    /// knows where the error was created.
    pub fn error(name: &str, message: impl Into<String>) -> Self {
        let mut properties = IndexMap::new();
        properties.insert("name".to_string(), Value::string(name));
        properties.insert("message".to_string(), Value::string(message));
        Self::new(ValueKind::Object(ObjectValue {
            class: ObjectClass::Error,
            properties: RefCell::new(properties),
        }))
    }

    pub fn native(name: &'static str, callback: NativeCallback) -> Self {
        Self::new(ValueKind::NativeFunction(NativeFunction {
            name,
            constructor: false,
            callback,
        }))
    }

    pub fn native_constructor(name: &'static str, callback: NativeCallback) -> Self {
        Self::new(ValueKind::NativeFunction(NativeFunction {
            name,
            constructor: true,
            callback,
        }))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(&*self.0, ValueKind::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(&*self.0, ValueKind::Undefined | ValueKind::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            &*self.0,
            ValueKind::Function(_) | ValueKind::NativeFunction(_)
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(&*self.0, ValueKind::Object(object) if object.class == ObjectClass::Error)
    }

    pub fn as_str(&self) -> Option<&str> {
        match &*self.0 {
            ValueKind::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match &*self.0 {
            ValueKind::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match &*self.0 {
            ValueKind::Undefined | ValueKind::Null => false,
            ValueKind::Bool(b) => *b,
            ValueKind::Number(n) => *n != 0.0 && !n.is_nan(),
            ValueKind::String(s) => !s.is_empty(),
            ValueKind::Array(_)
            | ValueKind::Object(_)
            | ValueKind::Function(_)
            | ValueKind::NativeFunction(_) => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match &*self.0 {
            ValueKind::Undefined => "undefined",
            ValueKind::Null | ValueKind::Array(_) | ValueKind::Object(_) => "object",
            ValueKind::Bool(_) => "boolean",
            ValueKind::Number(_) => "number",
            ValueKind::String(_) => "string",
            ValueKind::Function(_) | ValueKind::NativeFunction(_) => "function",
        }
    }

    /// Numbers, strings, booleans, `null` and `undefined`.
    pub fn is_primitive(&self) -> bool {
        matches!(
            &*self.0,
            ValueKind::Undefined
                | ValueKind::Null
                | ValueKind::Bool(_)
                | ValueKind::Number(_)
                | ValueKind::String(_)
        )
    }

    pub fn to_number(&self) -> f64 {
        match &*self.0 {
            ValueKind::Undefined => f64::NAN,
            ValueKind::Null => 0.0,
            ValueKind::Bool(b) => f64::from(u8::from(*b)),
            ValueKind::Number(n) => *n,
            ValueKind::String(text) => parse_number(text),
            ValueKind::Array(_) => parse_number(&self.to_string()),
            _ => f64::NAN,
        }
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (&*self.0, &*other.0) {
            (ValueKind::Undefined, ValueKind::Undefined) | (ValueKind::Null, ValueKind::Null) => {
                true
            }
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Number(a), ValueKind::Number(b)) => a == b,
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            _ => !self.is_primitive() && Rc::ptr_eq(&self.0, &other.0),
        }
    }

    pub fn loose_equals(&self, other: &Value) -> bool {
        match (&*self.0, &*other.0) {
            _ if self.is_nullish() || other.is_nullish() => {
                self.is_nullish() && other.is_nullish()
            }
            (ValueKind::String(_), ValueKind::String(_)) => self.strict_equals(other),
            _ if self.is_primitive() && other.is_primitive() => {
                self.to_number() == other.to_number()
            }
            _ => self.strict_equals(other),
        }
    }

    pub fn get_property(&self, key: &str) -> Option<Value> {
        match &*self.0 {
            ValueKind::Object(object) => object.properties.borrow().get(key).cloned(),
            ValueKind::Array(values) if key == "length" => {
                Some(Value::number(values.borrow().len() as f64))
            }
            ValueKind::Array(values) => array_index(key)
                .and_then(|idx| values.borrow().get(idx).cloned()),
            ValueKind::String(text) if key == "length" => {
                Some(Value::number(text.chars().count() as f64))
            }
            ValueKind::String(text) => array_index(key)
                .and_then(|idx| text.chars().nth(idx))
                .map(|ch| Value::string(ch.to_string())),
            ValueKind::Function(function) if key == "name" => Some(Value::string(function.name())),
            ValueKind::NativeFunction(native) if key == "name" => Some(Value::string(native.name)),
            _ => None,
        }
    }

    /// Property write as scripts perform it. Arrays grow to fit an index
    /// write up to `MAX_ARRAY_LENGTH`; writes to primitives and non-index
    /// array keys are dropped.
    pub fn set_property(&self, key: &str, value: Value) -> Result<(), InvalidArrayLength> {
        match &*self.0 {
            ValueKind::Object(object) => {
                object.properties.borrow_mut().insert(key.to_string(), value);
            }
            ValueKind::Array(values) => {
                if let Some(idx) = array_index(key) {
                    if idx >= MAX_ARRAY_LENGTH {
                        return Err(InvalidArrayLength);
                    }
                    let mut values = values.borrow_mut();
                    if idx >= values.len() {
                        values.resize(idx + 1, Value::undefined());
                    }
                    values[idx] = value;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Adds or replaces an own property of an object. Other values are left
    /// untouched.
    pub fn define_property(&self, key: &str, value: Value) {
        if let ValueKind::Object(object) = &*self.0 {
            object.properties.borrow_mut().insert(key.to_string(), value);
        }
    }

    /// Appends the string form of `self` to `out`. `seen` holds the arrays
    /// and errors currently being rendered; meeting one again yields nothing.
    fn render(&self, seen: &mut Vec<*const ValueKind>, out: &mut String) {
        match &*self.0 {
            ValueKind::Undefined => out.push_str("undefined"),
            ValueKind::Null => out.push_str("null"),
            ValueKind::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            ValueKind::Number(n) => out.push_str(&format_number(*n)),
            ValueKind::String(s) => out.push_str(s),
            ValueKind::Array(values) => {
                if !self.enter_render(seen) {
                    return;
                }
                for (idx, value) in values.borrow().iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    if !value.is_nullish() {
                        value.render(seen, out);
                    }
                }
                seen.pop();
            }
            ValueKind::Object(object) => match object.class {
                ObjectClass::Plain => out.push_str("[object Object]"),
                ObjectClass::Error => {
                    if !self.enter_render(seen) {
                        return;
                    }
                    let (name, message) = {
                        let properties = object.properties.borrow();
                        (
                            properties.get("name").cloned(),
                            properties.get("message").cloned(),
                        )
                    };
                    match name {
                        Some(name) => name.render(seen, out),
                        None => out.push_str("Error"),
                    }
                    if let Some(message) = message {
                        let mark = out.len();
                        out.push_str(": ");
                        let body = out.len();
                        message.render(seen, out);
                        if out.len() == body {
                            out.truncate(mark);
                        }
                    }
                    seen.pop();
                }
            },
            ValueKind::Function(function) => {
                out.push_str(function.script.slice(function.decl.span))
            }
            ValueKind::NativeFunction(native) => {
                out.push_str(&format!("function {}() {{ [native code] }}", native.name))
            }
        }
    }

    fn enter_render(&self, seen: &mut Vec<*const ValueKind>) -> bool {
        let id = Rc::as_ptr(&self.0);
        if seen.len() >= MAX_RENDER_DEPTH || seen.contains(&id) {
            return false;
        }
        seen.push(id);
        true
    }
}

fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse().ok()
}

fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    match trimmed {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed
            .chars()
            .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E' | '+' | '-')) =>
        {
            trimmed.parse().unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    /// String conversion that never runs script code; objects with a custom
    /// `toString` are rendered by `Interpreter::to_string_value` instead.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.render(&mut Vec::new(), &mut out);
        f.write_str(&out)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::String(s) => write!(f, "{s:?}"),
            ValueKind::Array(_) => write!(f, "[{self}]"),
            _ => write!(f, "{self}"),
        }
    }
}
