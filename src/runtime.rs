use std::{cmp::Ordering, mem, rc::Rc};

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::{
    ast::{BinaryOp, DeclKind, Expr, ExprKind, FunctionDecl, Literal, LogicalOp, Program, Stmt,
        StmtKind, UnaryOp},
    diagnostics::{Diagnostic, SourceSpan},
    environment::{AssignError, Environment, EnvironmentRef},
    exception::{ErrorKind, Exception, ThrowSite},
    parser,
    platform::Platform,
    source::Script,
    stack::StackGuard,
    streams::Streams,
    value::{format_number, ObjectClass, UserFunction, Value, ValueKind},
};

/// Nesting limit for function calls and `load`ed scripts.
pub const MAX_CALL_DEPTH: usize = 128;

const STACK_EXCEEDED: &str = "Maximum call stack size exceeded";

/// A parsed script, ready to run. Owned by the caller and consumed by `run`.
pub struct CompiledUnit {
    script: Rc<Script>,
    program: Program,
}

impl CompiledUnit {
    pub fn origin(&self) -> &str {
        self.script.origin()
    }
}

struct Frame {
    function: Option<String>,
    script: Rc<Script>,
    /// Position the frame is currently executing, updated at call and throw sites.
    span: SourceSpan,
}

enum Flow {
    Next,
    NextValue(Value),
    Return(Value),
    Break,
    Continue,
}

/// An isolated execution context: one global namespace, one call stack and
/// the streams host functions write to.
pub struct Interpreter {
    global: EnvironmentRef,
    env: EnvironmentRef,
    var_env: EnvironmentRef,
    script: Rc<Script>,
    frames: Vec<Frame>,
    streams: Streams,
    /// Set while script code is running; measured from the outermost entry.
    stack: Option<StackGuard>,
}

impl Interpreter {
    pub fn new(_platform: &Platform, streams: Streams) -> Self {
        let global = Environment::new();
        crate::builtins::install(&global);
        Self {
            env: Rc::clone(&global),
            var_env: Rc::clone(&global),
            global,
            script: Rc::new(Script::new("", "")),
            frames: Vec::new(),
            streams,
            stack: None,
        }
    }

    pub fn global(&self) -> &EnvironmentRef {
        &self.global
    }

    pub fn streams_mut(&mut self) -> &mut Streams {
        &mut self.streams
    }

    pub fn compile(&self, source: &str, origin: &str) -> Result<CompiledUnit, Exception> {
        debug!(origin, bytes = source.len(), "compiling script");
        let script = Rc::new(Script::new(origin, source));
        match parser::parse_program_with_stack(script.text(), self.stack.unwrap_or_default()) {
            Ok(program) => Ok(CompiledUnit { script, program }),
            Err(diagnostic) => Err(syntax_error(&script, diagnostic)),
        }
    }

    /// Runs a compiled script against the global namespace and yields its
    /// completion value, `undefined` when no expression statement ran.
    pub fn run(&mut self, unit: &CompiledUnit) -> Result<Value, Exception> {
        debug!(origin = unit.origin(), depth = self.frames.len(), "running script");
        self.with_stack_guard(|interp| interp.run_unit(unit))
    }

    fn run_unit(&mut self, unit: &CompiledUnit) -> Result<Value, Exception> {
        if self.frames.len() >= MAX_CALL_DEPTH || self.stack_exhausted() {
            return Err(self.throw(ErrorKind::RangeError.name(), STACK_EXCEEDED));
        }
        self.frames.push(Frame {
            function: None,
            script: Rc::clone(&unit.script),
            span: SourceSpan::default(),
        });
        let saved_env = mem::replace(&mut self.env, Rc::clone(&self.global));
        let saved_var_env = mem::replace(&mut self.var_env, Rc::clone(&self.global));
        let saved_script = mem::replace(&mut self.script, Rc::clone(&unit.script));

        let result = self.execute_statements(&unit.program.body);

        self.env = saved_env;
        self.var_env = saved_var_env;
        self.script = saved_script;
        self.frames.pop();

        match result? {
            Flow::NextValue(value) => Ok(value),
            _ => Ok(Value::undefined()),
        }
    }

    /// String conversion as scripts observe it: plain objects with a callable
    /// `toString` property are asked to render themselves, which may throw.
    pub fn to_string_value(&mut self, value: &Value) -> Result<String, Exception> {
        self.with_stack_guard(|interp| interp.render_value(value))
    }

    fn render_value(&mut self, value: &Value) -> Result<String, Exception> {
        if let ValueKind::Object(object) = &*value.0 {
            let method = match object.class {
                ObjectClass::Plain => object.properties.borrow().get("toString").cloned(),
                ObjectClass::Error => None,
            };
            if let Some(method) = method.filter(Value::is_callable) {
                let span = self.current_span();
                let rendered = self.call(&method, Vec::new(), span)?;
                if !rendered.is_primitive() {
                    return Err(self.throw_error(
                        ErrorKind::TypeError,
                        "Cannot convert object to primitive value",
                        span,
                    ));
                }
                return Ok(rendered.to_string());
            }
        }
        Ok(value.to_string())
    }

    /// Builds an Error object whose `stack` reflects the active frames.
    pub fn make_error(&self, name: &str, message: impl Into<String>) -> Value {
        let error = Value::error(name, message);
        let stack = self.capture_stack(&error.to_string());
        error.define_property("stack", Value::string(stack));
        error
    }

    /// Exception for a native function to raise; the call site is attached
    /// when it propagates out of the native call.
    pub fn throw(&self, name: &str, message: impl Into<String>) -> Exception {
        Exception::new(self.make_error(name, message))
    }

    fn with_stack_guard<T>(&mut self, body: impl FnOnce(&mut Self) -> T) -> T {
        if self.stack.is_some() {
            return body(self);
        }
        self.stack = Some(StackGuard::new());
        let result = body(self);
        self.stack = None;
        result
    }

    fn stack_exhausted(&self) -> bool {
        self.stack.is_some_and(|stack| stack.exhausted())
    }

    fn check_stack(&mut self, span: SourceSpan) -> Result<(), Exception> {
        if self.stack_exhausted() {
            return Err(self.throw_error(ErrorKind::RangeError, STACK_EXCEEDED, span));
        }
        Ok(())
    }

    fn capture_stack(&self, header: &str) -> String {
        let mut stack = header.to_string();
        for frame in self.frames.iter().rev() {
            let location = frame.script.locate(frame.span);
            let position = format!(
                "{}:{}:{}",
                frame.script.origin(),
                location.line,
                location.start_column + 1
            );
            match &frame.function {
                Some(name) if !name.is_empty() => {
                    stack.push_str(&format!("\n    at {name} ({position})"))
                }
                Some(_) => stack.push_str(&format!("\n    at <anonymous> ({position})")),
                None => stack.push_str(&format!("\n    at {position}")),
            }
        }
        stack
    }

    fn current_span(&self) -> SourceSpan {
        self.frames.last().map(|frame| frame.span).unwrap_or_default()
    }

    fn set_position(&mut self, span: SourceSpan) {
        if let Some(frame) = self.frames.last_mut() {
            frame.span = span;
        }
    }

    fn exception_at(&self, value: Value, span: SourceSpan) -> Exception {
        match self.frames.last() {
            Some(frame) => Exception::new(value).with_site(ThrowSite {
                origin: frame.script.origin().to_string(),
                location: frame.script.locate(span),
            }),
            None => Exception::new(value),
        }
    }

    fn throw_error(
        &mut self,
        kind: ErrorKind,
        message: impl Into<String>,
        span: SourceSpan,
    ) -> Exception {
        self.set_position(span);
        let error = self.make_error(kind.name(), message);
        self.exception_at(error, span)
    }

    fn attach_site(&self, exception: Exception, span: SourceSpan) -> Exception {
        if exception.site().is_some() {
            exception
        } else {
            self.exception_at(exception.into_value(), span)
        }
    }

    fn hoist_functions(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            if let StmtKind::Function(decl) = &stmt.kind {
                let function = self.make_function(decl);
                let name = decl.name.clone().unwrap_or_default();
                self.env.borrow_mut().define(name, function, true);
            }
        }
    }

    fn make_function(&self, decl: &Rc<FunctionDecl>) -> Value {
        Value::new(ValueKind::Function(UserFunction {
            decl: Rc::clone(decl),
            env: Rc::clone(&self.env),
            script: Rc::clone(&self.script),
        }))
    }

    fn execute_statements(&mut self, statements: &[Stmt]) -> Result<Flow, Exception> {
        self.hoist_functions(statements);
        let mut last_value = None;
        for stmt in statements {
            match self.execute_statement(stmt)? {
                Flow::Next => {}
                Flow::NextValue(value) => last_value = Some(value),
                other => return Ok(other),
            }
        }
        Ok(last_value.map_or(Flow::Next, Flow::NextValue))
    }

    fn execute_block(&mut self, statements: &[Stmt]) -> Result<Flow, Exception> {
        self.with_child_scope(|interp| interp.execute_statements(statements))
    }

    fn with_child_scope<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, Exception>,
    ) -> Result<T, Exception> {
        let child = Environment::with_parent(Rc::clone(&self.env));
        let prev = mem::replace(&mut self.env, child);
        let result = body(self);
        self.env = prev;
        result
    }

    fn execute_statement(&mut self, stmt: &Stmt) -> Result<Flow, Exception> {
        self.check_stack(stmt.span)?;
        match &stmt.kind {
            StmtKind::Decl {
                kind,
                name,
                initializer,
            } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::undefined(),
                };
                match kind {
                    DeclKind::Var => {
                        let mut scope = self.var_env.borrow_mut();
                        if initializer.is_some() || !scope.contains(name) {
                            scope.define(name.clone(), value, true);
                        }
                    }
                    DeclKind::Let => self.env.borrow_mut().define(name.clone(), value, true),
                    DeclKind::Const => self.env.borrow_mut().define(name.clone(), value, false),
                }
                Ok(Flow::Next)
            }
            StmtKind::Function(_) | StmtKind::Empty => Ok(Flow::Next),
            StmtKind::Expr(expr) => Ok(Flow::NextValue(self.evaluate(expr)?)),
            StmtKind::Block(statements) => self.execute_block(statements),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute_statement(then_branch)
                } else if let Some(branch) = else_branch {
                    self.execute_statement(branch)
                } else {
                    Ok(Flow::Next)
                }
            }
            StmtKind::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute_statement(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Next | Flow::NextValue(_) | Flow::Continue => {}
                    }
                }
                Ok(Flow::Next)
            }
            StmtKind::For {
                init,
                condition,
                update,
                body,
            } => self.with_child_scope(|interp| {
                if let Some(init) = init {
                    interp.execute_statement(init)?;
                }
                loop {
                    if let Some(condition) = condition {
                        if !interp.evaluate(condition)?.is_truthy() {
                            break;
                        }
                    }
                    match interp.execute_statement(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Next | Flow::NextValue(_) | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        interp.evaluate(update)?;
                    }
                }
                Ok(Flow::Next)
            }),
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::undefined(),
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Throw(expr) => {
                let value = self.evaluate(expr)?;
                self.set_position(stmt.span);
                Err(self.exception_at(value, stmt.span))
            }
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => {
                let outcome = match (self.execute_block(block), handler) {
                    (Err(exception), Some(handler)) => {
                        let thrown = exception.into_value();
                        trace!(exception = %thrown, "caught exception");
                        self.with_child_scope(|interp| {
                            if let Some(binding) = &handler.binding {
                                interp.env.borrow_mut().define(binding.clone(), thrown, true);
                            }
                            interp.execute_statements(&handler.body)
                        })
                    }
                    (outcome, _) => outcome,
                };
                if let Some(finalizer) = finalizer {
                    match self.execute_block(finalizer)? {
                        Flow::Next | Flow::NextValue(_) => {}
                        abrupt => return Ok(abrupt),
                    }
                }
                outcome
            }
        }
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, Exception> {
        self.check_stack(expr.span)?;
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(match literal {
                Literal::Number(n) => Value::number(*n),
                Literal::String(s) => Value::string(s.clone()),
                Literal::Bool(b) => Value::bool(*b),
                Literal::Null => Value::null(),
                Literal::Undefined => Value::undefined(),
            }),
            ExprKind::Identifier(name) => match Environment::lookup(&self.env, name) {
                Some(value) => Ok(value),
                None => Err(self.throw_error(
                    ErrorKind::ReferenceError,
                    format!("{name} is not defined"),
                    expr.span,
                )),
            },
            ExprKind::Array(elements) => Ok(Value::array(self.evaluate_all(elements)?)),
            ExprKind::Object(entries) => {
                let mut properties = IndexMap::new();
                for (key, value) in entries {
                    properties.insert(key.clone(), self.evaluate(value)?);
                }
                Ok(Value::object(properties))
            }
            ExprKind::Function(decl) => Ok(self.make_function(decl)),
            ExprKind::Unary { op, expr: operand } => {
                if let (UnaryOp::Typeof, ExprKind::Identifier(name)) = (op, &operand.kind) {
                    if Environment::lookup(&self.env, name).is_none() {
                        return Ok(Value::string("undefined"));
                    }
                }
                let value = self.evaluate(operand)?;
                Ok(match op {
                    UnaryOp::Negate => Value::number(-value.to_number()),
                    UnaryOp::Not => Value::bool(!value.is_truthy()),
                    UnaryOp::Typeof => Value::string(value.type_of()),
                })
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                self.binary(*op, &left, &right)
            }
            ExprKind::Logical { op, left, right } => {
                let left = self.evaluate(left)?;
                match (op, left.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                    _ => self.evaluate(right),
                }
            }
            ExprKind::Assign { target, value } => {
                let value = self.evaluate(value)?;
                self.assign(target, value.clone())?;
                Ok(value)
            }
            ExprKind::Call { callee, args } => {
                let function = self.evaluate(callee)?;
                let args = self.evaluate_all(args)?;
                if !function.is_callable() {
                    let message = format!("{} is not a function", self.script.slice(callee.span));
                    return Err(self.throw_error(ErrorKind::TypeError, message, expr.span));
                }
                self.call(&function, args, expr.span)
            }
            ExprKind::New { callee, args } => {
                let constructor = self.evaluate(callee)?;
                let args = self.evaluate_all(args)?;
                match &*constructor.0 {
                    ValueKind::NativeFunction(native) if native.constructor => {
                        self.call(&constructor, args, expr.span)
                    }
                    _ => {
                        let message =
                            format!("{} is not a constructor", self.script.slice(callee.span));
                        Err(self.throw_error(ErrorKind::TypeError, message, expr.span))
                    }
                }
            }
            ExprKind::Member { target, property } => {
                let target = self.evaluate(target)?;
                self.get_member(&target, property, expr.span)
            }
            ExprKind::Index { target, index } => {
                let target = self.evaluate(target)?;
                let index = self.evaluate(index)?;
                let key = self.property_key(&index)?;
                self.get_member(&target, &key, expr.span)
            }
        }
    }

    fn evaluate_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, Exception> {
        exprs.iter().map(|expr| self.evaluate(expr)).collect()
    }

    fn call(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        span: SourceSpan,
    ) -> Result<Value, Exception> {
        self.check_stack(span)?;
        self.set_position(span);
        match &*callee.0 {
            ValueKind::NativeFunction(native) => {
                let callback = native.callback;
                callback(self, &args).map_err(|exception| self.attach_site(exception, span))
            }
            ValueKind::Function(function) => self.call_function(function, args, span),
            _ => Err(self.throw_error(
                ErrorKind::TypeError,
                format!("{} is not a function", callee.type_of()),
                span,
            )),
        }
    }

    fn call_function(
        &mut self,
        function: &UserFunction,
        args: Vec<Value>,
        span: SourceSpan,
    ) -> Result<Value, Exception> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(self.throw_error(ErrorKind::RangeError, STACK_EXCEEDED, span));
        }
        let scope = Environment::with_parent(Rc::clone(&function.env));
        {
            let mut scope = scope.borrow_mut();
            let mut args = args.into_iter();
            for param in &function.decl.params {
                scope.define(param.clone(), args.next().unwrap_or_else(Value::undefined), true);
            }
        }
        self.frames.push(Frame {
            function: Some(function.name().to_string()),
            script: Rc::clone(&function.script),
            span: function.decl.span,
        });
        let saved_env = mem::replace(&mut self.env, Rc::clone(&scope));
        let saved_var_env = mem::replace(&mut self.var_env, scope);
        let saved_script = mem::replace(&mut self.script, Rc::clone(&function.script));

        let result = self.execute_statements(&function.decl.body);

        self.env = saved_env;
        self.var_env = saved_var_env;
        self.script = saved_script;
        self.frames.pop();

        match result? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::undefined()),
        }
    }

    fn assign(&mut self, target: &Expr, value: Value) -> Result<(), Exception> {
        match &target.kind {
            ExprKind::Identifier(name) => match Environment::assign(&self.env, name, value) {
                Ok(()) => Ok(()),
                Err(AssignError::Undeclared) => Err(self.throw_error(
                    ErrorKind::ReferenceError,
                    format!("{name} is not defined"),
                    target.span,
                )),
                Err(AssignError::Constant) => Err(self.throw_error(
                    ErrorKind::TypeError,
                    "Assignment to constant variable.",
                    target.span,
                )),
            },
            ExprKind::Member {
                target: owner,
                property,
            } => {
                let owner = self.evaluate(owner)?;
                self.set_member(&owner, property, value, target.span)
            }
            ExprKind::Index {
                target: owner,
                index,
            } => {
                let owner = self.evaluate(owner)?;
                let index = self.evaluate(index)?;
                let key = self.property_key(&index)?;
                self.set_member(&owner, &key, value, target.span)
            }
            _ => Err(self.throw_error(
                ErrorKind::SyntaxError,
                "Invalid left-hand side in assignment",
                target.span,
            )),
        }
    }

    fn property_key(&mut self, index: &Value) -> Result<String, Exception> {
        match index.as_number() {
            Some(n) => Ok(format_number(n)),
            None => self.to_string_value(index),
        }
    }

    fn get_member(&mut self, target: &Value, key: &str, span: SourceSpan) -> Result<Value, Exception> {
        if target.is_nullish() {
            return Err(self.throw_error(
                ErrorKind::TypeError,
                format!("Cannot read properties of {target} (reading '{key}')"),
                span,
            ));
        }
        Ok(target.get_property(key).unwrap_or_else(Value::undefined))
    }

    fn set_member(
        &mut self,
        target: &Value,
        key: &str,
        value: Value,
        span: SourceSpan,
    ) -> Result<(), Exception> {
        if target.is_nullish() {
            return Err(self.throw_error(
                ErrorKind::TypeError,
                format!("Cannot set properties of {target} (setting '{key}')"),
                span,
            ));
        }
        target
            .set_property(key, value)
            .map_err(|error| self.throw_error(ErrorKind::RangeError, error.to_string(), span))
    }

    fn binary(&mut self, op: BinaryOp, left: &Value, right: &Value) -> Result<Value, Exception> {
        use BinaryOp::*;
        let value = match op {
            Add if is_numeric_operand(left) && is_numeric_operand(right) => {
                Value::number(left.to_number() + right.to_number())
            }
            Add => {
                let mut text = self.to_string_value(left)?;
                text.push_str(&self.to_string_value(right)?);
                Value::string(text)
            }
            Sub => Value::number(left.to_number() - right.to_number()),
            Mul => Value::number(left.to_number() * right.to_number()),
            Div => Value::number(left.to_number() / right.to_number()),
            Mod => Value::number(left.to_number() % right.to_number()),
            Equal => Value::bool(left.loose_equals(right)),
            NotEqual => Value::bool(!left.loose_equals(right)),
            StrictEqual => Value::bool(left.strict_equals(right)),
            StrictNotEqual => Value::bool(!left.strict_equals(right)),
            Less => Value::bool(compare(left, right) == Some(Ordering::Less)),
            LessEqual => Value::bool(matches!(
                compare(left, right),
                Some(Ordering::Less | Ordering::Equal)
            )),
            Greater => Value::bool(compare(left, right) == Some(Ordering::Greater)),
            GreaterEqual => Value::bool(matches!(
                compare(left, right),
                Some(Ordering::Greater | Ordering::Equal)
            )),
        };
        Ok(value)
    }
}

fn syntax_error(script: &Script, diagnostic: Diagnostic) -> Exception {
    Exception::new(Value::error(ErrorKind::SyntaxError.name(), diagnostic.message)).with_site(
        ThrowSite {
            origin: script.origin().to_string(),
            location: script.locate(diagnostic.span),
        },
    )
}

fn is_numeric_operand(value: &Value) -> bool {
    value.is_primitive() && value.as_str().is_none()
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left.as_str(), right.as_str()) {
        (Some(a), Some(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}
