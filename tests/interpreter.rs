use husk::{
    exception::Exception,
    runtime::Interpreter,
    value::{Value, ValueKind},
    CaptureBuffer, Platform, Streams,
};

fn interpreter() -> Interpreter {
    let platform = Platform::initialize();
    Interpreter::new(
        &platform,
        Streams::new(CaptureBuffer::new(), CaptureBuffer::new()),
    )
}

fn eval(source: &str) -> Value {
    let mut interp = interpreter();
    let unit = interp.compile(source, "test.js").expect("script should compile");
    interp.run(&unit).expect("script should run")
}

fn eval_error(source: &str) -> Exception {
    let mut interp = interpreter();
    let unit = interp.compile(source, "test.js").expect("script should compile");
    match interp.run(&unit) {
        Ok(value) => panic!("expected exception, received value {value}"),
        Err(exception) => exception,
    }
}

fn expect_number(value: &Value) -> f64 {
    match value.0.as_ref() {
        ValueKind::Number(n) => *n,
        _ => panic!("expected number, found {}", value.type_of()),
    }
}

#[test]
fn completion_value_is_last_expression() {
    assert_eq!(expect_number(&eval("1 + 2 * 3")), 7.0);
    assert_eq!(expect_number(&eval("var x = 4;\nx % 3;\nvar y = 1;")), 1.0);
    assert!(eval("var x = 1;").is_undefined());
}

#[test]
fn string_concatenation_coerces_operands() {
    assert_eq!(eval("'a' + 1 + true").to_string(), "a1true");
    assert_eq!(eval("1 + 2 + 'px'").to_string(), "3px");
}

#[test]
fn closures_capture_their_scope() {
    let value = eval(
        r#"
        function counter() {
            var n = 0
            return function () {
                n = n + 1
                return n
            }
        }
        var next = counter()
        next(); next();
        next()
        "#,
    );
    assert_eq!(expect_number(&value), 3.0);
}

#[test]
fn function_declarations_are_hoisted() {
    assert_eq!(expect_number(&eval("double(21)\nfunction double(x) { return x * 2 }")), 42.0);
}

#[test]
fn loops_honour_break_and_continue() {
    let value = eval(
        r#"
        var total = 0
        for (let i = 0; i < 10; i = i + 1) {
            if (i == 2) { continue }
            if (i == 5) { break }
            total = total + i
        }
        var j = 0
        while (j < 3) { j = j + 1 }
        total * 10 + j
        "#,
    );
    assert_eq!(expect_number(&value), 83.0);
}

#[test]
fn catch_binds_thrown_error() {
    let value = eval(
        r#"
        var seen
        try {
            throw new TypeError('bad')
        } catch (e) {
            seen = e.name + ':' + e.message
        }
        seen
        "#,
    );
    assert_eq!(value.to_string(), "TypeError:bad");
}

#[test]
fn finally_overrides_return() {
    let value = eval(
        r#"
        function f() {
            try { return 1 } finally { return 2 }
        }
        f()
        "#,
    );
    assert_eq!(expect_number(&value), 2.0);
}

#[test]
fn logical_operators_short_circuit() {
    assert_eq!(eval("null || 'fallback'").to_string(), "fallback");
    assert_eq!(expect_number(&eval("0 && missing")), 0.0);
}

#[test]
fn equality_follows_loose_and_strict_rules() {
    assert_eq!(eval("1 == '1'").to_string(), "true");
    assert_eq!(eval("1 === '1'").to_string(), "false");
    assert_eq!(eval("null == undefined").to_string(), "true");
}

#[test]
fn arrays_and_objects_are_shared_and_mutable() {
    assert_eq!(eval("var a = [1, 2]; a[2] = 3; a.length + ':' + a").to_string(), "3:1,2,3");
    assert_eq!(
        expect_number(&eval("var o = { n: 1 }; var p = o; p.n = 5; o['n']")),
        5.0
    );
}

#[test]
fn custom_to_string_is_used_for_coercion() {
    let value = eval("var o = { toString: function () { return 'custom' } }; '' + o");
    assert_eq!(value.to_string(), "custom");
}

#[test]
fn typeof_tolerates_undeclared_names() {
    assert_eq!(eval("typeof nothing").to_string(), "undefined");
    assert_eq!(eval("typeof String").to_string(), "function");
}

#[test]
fn globals_persist_across_runs() {
    let mut interp = interpreter();
    let first = interp.compile("var shared = 5", "a.js").expect("compile a.js");
    interp.run(&first).expect("run a.js");
    let second = interp.compile("shared * 2", "b.js").expect("compile b.js");
    assert_eq!(expect_number(&interp.run(&second).expect("run b.js")), 10.0);
}

#[test]
fn undefined_identifier_is_positioned() {
    let exception = eval_error("var x = 1;\nmissing + x");
    let record = exception.record();
    assert_eq!(record.message, "ReferenceError: missing is not defined");
    assert_eq!(record.origin.as_deref(), Some("test.js"));
    assert_eq!(record.line_number, Some(2));
    assert_eq!((record.start_column, record.end_column), (0, 7));
    assert_eq!(record.source_line.as_deref(), Some("missing + x"));
    assert_eq!(
        record.stack_trace.as_deref(),
        Some("ReferenceError: missing is not defined\n    at test.js:2:1")
    );
}

#[test]
fn constant_reassignment_is_a_type_error() {
    let record = eval_error("const a = 1; a = 2").record();
    assert_eq!(record.message, "TypeError: Assignment to constant variable.");
    assert_eq!((record.start_column, record.end_column), (13, 14));
}

#[test]
fn calling_non_function_names_the_callee() {
    let record = eval_error("var o = {}; o.missing()").record();
    assert_eq!(record.message, "TypeError: o.missing is not a function");
}

#[test]
fn reading_property_of_undefined_fails() {
    let record = eval_error("var u; u.x").record();
    assert_eq!(
        record.message,
        "TypeError: Cannot read properties of undefined (reading 'x')"
    );
}

#[test]
fn stack_trace_lists_frames_innermost_first() {
    let exception = eval_error(
        "function inner() { throw new Error('deep') }\n\
         function outer() { inner() }\n\
         outer()",
    );
    let record = exception.record();
    assert_eq!(record.message, "Error: deep");
    assert_eq!(record.line_number, Some(1));
    assert_eq!((record.start_column, record.end_column), (19, 42));
    assert_eq!(
        record.stack_trace.as_deref(),
        Some(
            "Error: deep\n    at inner (test.js:1:26)\n    at outer (test.js:2:20)\n    at test.js:3:1"
        )
    );
}

#[test]
fn thrown_primitives_have_no_stack() {
    let exception = eval_error("throw 42");
    assert_eq!(expect_number(exception.value()), 42.0);
    let record = exception.record();
    assert_eq!(record.message, "42");
    assert_eq!(record.line_number, Some(1));
    assert_eq!(record.stack_trace, None);
}

#[test]
fn runaway_recursion_raises_range_error() {
    let record = eval_error("function f() { return f() }\nf()").record();
    assert_eq!(record.message, "RangeError: Maximum call stack size exceeded");
    assert_eq!(record.line_number, Some(1));
}

#[test]
fn recursion_through_nested_expressions_raises_range_error() {
    let record = eval_error("function f(n) { return 1 + (2 * (3 + f(n + 1))) }\nf(0)").record();
    assert_eq!(record.message, "RangeError: Maximum call stack size exceeded");
    assert_eq!(record.line_number, Some(1));
}

#[test]
fn stack_exhaustion_can_be_caught() {
    let value = eval(
        r#"
        var depth = 0
        function dive() { depth = depth + 1; dive() }
        var caught
        try { dive() } catch (e) { caught = e.name }
        caught + ':' + (depth > 1)
        "#,
    );
    assert_eq!(value.to_string(), "RangeError:true");
}

#[test]
fn oversized_array_index_is_a_range_error() {
    let record = eval_error("var a = []\na[100000000000] = 1").record();
    assert_eq!(record.message, "RangeError: Invalid array length");
    assert_eq!(record.line_number, Some(2));
    assert_eq!(eval("var a = []; a[4] = 'x'; a.length").to_string(), "5");
}

#[test]
fn compile_errors_are_positioned_syntax_errors() {
    let interp = interpreter();
    let exception = match interp.compile("var x = 1\nvar = 2", "bad.js") {
        Ok(_) => panic!("expected a compile error"),
        Err(exception) => exception,
    };
    let record = exception.record();
    assert_eq!(record.message, "SyntaxError: Unexpected token '='");
    assert_eq!(record.origin.as_deref(), Some("bad.js"));
    assert_eq!(record.line_number, Some(2));
    assert_eq!((record.start_column, record.end_column), (4, 5));
    assert_eq!(record.stack_trace, None);
}
