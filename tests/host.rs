use std::{fs, path::Path};

use husk::{
    create_context, execute, CaptureBuffer, Execution, Interpreter, Platform, SourceUnit, Streams,
};
use tempfile::tempdir;

struct Shell {
    interp: Interpreter,
    out: CaptureBuffer,
    err: CaptureBuffer,
    _platform: Platform,
}

impl Shell {
    fn new() -> Self {
        let platform = Platform::initialize();
        let out = CaptureBuffer::new();
        let err = CaptureBuffer::new();
        let interp = create_context(&platform, Streams::new(out.clone(), err.clone()));
        Self {
            interp,
            out,
            err,
            _platform: platform,
        }
    }

    fn run(&mut self, source: &str) -> Execution {
        execute(&mut self.interp, &SourceUnit::new("main.js", source), true, true)
    }
}

fn path_literal(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\\', "\\\\"))
}

#[test]
fn global_namespace_holds_host_functions() {
    let mut shell = Shell::new();
    for name in ["print", "read", "load"] {
        assert!(shell.interp.global().borrow().contains(name), "{name} missing");
    }
    assert!(shell.run("typeof print + typeof read + typeof load").succeeded());
    assert_eq!(shell.out.contents(), "functionfunctionfunction\n");
}

#[test]
fn print_joins_arguments_with_spaces() {
    let mut shell = Shell::new();
    assert!(shell.run(r#"print("a", 1, true)"#).succeeded());
    assert!(shell.run("print()").succeeded());
    assert_eq!(shell.out.contents(), "a 1 true\n\n");
    assert_eq!(shell.err.contents(), "");
}

#[test]
fn undefined_results_are_not_printed() {
    let mut shell = Shell::new();
    assert!(shell.run("var x = 1").succeeded());
    assert!(shell.run("x + 1").succeeded());
    assert_eq!(shell.out.contents(), "2\n");
}

#[test]
fn read_returns_file_contents() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("data.txt");
    fs::write(&path, "héllo\nworld\n").expect("write fixture");

    let mut shell = Shell::new();
    let source = SourceUnit::new("main.js", format!("read({})", path_literal(&path)));
    let value = execute(&mut shell.interp, &source, false, true)
        .into_result()
        .expect("read should succeed");
    assert_eq!(value.as_str(), Some("héllo\nworld\n"));
}

#[test]
fn read_rejects_wrong_argument_count() {
    let mut shell = Shell::new();
    let execution = shell.run("read()");
    assert!(matches!(execution, Execution::RuntimeFailure(_)));
    assert!(shell.err.contents().starts_with(
        "main.js:1: BadArguments: Bad parameters: read() expects 1 argument(s), received 0\nread()\n^^^^^^\n"
    ));

    let mut shell = Shell::new();
    assert!(shell
        .run("try { read('a', 'b') } catch (e) { print(e.name) }")
        .succeeded());
    assert_eq!(shell.out.contents(), "BadArguments\n");
}

#[test]
fn read_of_missing_file_is_a_file_error() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("absent.txt");

    let mut shell = Shell::new();
    let script = format!(
        "try {{ read({}) }} catch (e) {{ print(e.name); print(e.message) }}",
        path_literal(&path)
    );
    assert!(shell.run(&script).succeeded());
    let expected = format!("FileError\nError loading file '{}': ", path.display());
    assert!(shell.out.contents().starts_with(&expected));
}

#[test]
fn read_path_conversion_failure_is_a_file_error() {
    let mut shell = Shell::new();
    let script = "try { read({ toString: function () { throw 1 } }) } catch (e) { print(e.name) }";
    assert!(shell.run(script).succeeded());
    assert_eq!(shell.out.contents(), "FileError\n");
}

#[test]
fn load_runs_scripts_in_the_shared_global_namespace() {
    let dir = tempdir().expect("create temp dir");
    let lib = dir.path().join("lib.js");
    fs::write(&lib, "var base = 41\nfunction inc(x) { return x + 1 }\n").expect("write lib");

    let mut shell = Shell::new();
    let script = format!("load({})\ninc(base)", path_literal(&lib));
    assert!(shell.run(&script).succeeded());
    assert_eq!(shell.out.contents(), "42\n");
}

#[test]
fn load_stops_at_first_failing_script() {
    let dir = tempdir().expect("create temp dir");
    let p1 = dir.path().join("p1.js");
    let p2 = dir.path().join("p2.js");
    let p3 = dir.path().join("p3.js");
    fs::write(&p1, "print('one')").expect("write p1");
    fs::write(&p2, "var = ;").expect("write p2");
    fs::write(&p3, "print('three')").expect("write p3");

    let mut shell = Shell::new();
    let script = format!(
        "load({}, {}, {})",
        path_literal(&p1),
        path_literal(&p2),
        path_literal(&p3)
    );
    let execution = shell.run(&script);

    assert!(matches!(execution, Execution::RuntimeFailure(_)));
    assert_eq!(shell.out.contents(), "one\n");
    let err = shell.err.contents();
    let expected = format!(
        "main.js:1: ExecutionError: Error executing file '{}'\n",
        p2.display()
    );
    assert!(err.starts_with(&expected), "unexpected report: {err}");
    assert!(!err.contains("SyntaxError"), "loaded failure was reported: {err}");
}

#[test]
fn load_failure_exposes_cause() {
    let dir = tempdir().expect("create temp dir");
    let broken = dir.path().join("broken.js");
    fs::write(&broken, "\nnull.x").expect("write broken script");

    let mut shell = Shell::new();
    let script = format!(
        "try {{ load({}) }} catch (e) {{ print(e.name); print(e.cause.message) }}",
        path_literal(&broken)
    );
    assert!(shell.run(&script).succeeded());
    assert_eq!(
        shell.out.contents(),
        "ExecutionError\nCannot read properties of null (reading 'x')\n"
    );
    assert_eq!(shell.err.contents(), "");
}

#[test]
fn load_without_arguments_is_a_no_op() {
    let mut shell = Shell::new();
    let execution = shell.run("load()");
    assert!(execution.succeeded());
    assert!(execution.into_result().expect("load() succeeds").is_undefined());
    assert_eq!(shell.out.contents(), "");
    assert_eq!(shell.err.contents(), "");
}

#[test]
fn print_propagates_coercion_failures() {
    let mut shell = Shell::new();
    let execution = shell.run("print({ toString: function () { throw new Error('nope') } })");
    assert!(matches!(execution, Execution::RuntimeFailure(_)));
    assert_eq!(shell.out.contents(), "");
    assert!(shell.err.contents().starts_with("main.js:1: Error: nope\n"));
}

#[test]
fn compile_failure_report_layout() {
    let mut shell = Shell::new();
    let execution = shell.run("var x = ;");
    assert!(matches!(execution, Execution::CompileFailure(_)));
    assert_eq!(
        shell.err.contents(),
        "main.js:1: SyntaxError: Unexpected token ';'\nvar x = ;\n        ^\n"
    );
    assert_eq!(shell.out.contents(), "");
}

#[test]
fn runtime_failure_report_layout() {
    let mut shell = Shell::new();
    let execution = shell.run("var a = 1;\nundefinedFn();\n");
    assert!(matches!(execution, Execution::RuntimeFailure(_)));
    assert_eq!(
        shell.err.contents(),
        "main.js:2: ReferenceError: undefinedFn is not defined\n\
         undefinedFn();\n\
         ^^^^^^^^^^^\n\
         ReferenceError: undefinedFn is not defined\n    at main.js:2:1\n"
    );
}

#[test]
fn thrown_primitive_report_has_no_stack() {
    let mut shell = Shell::new();
    assert!(!shell.run("throw 'plain'").succeeded());
    assert_eq!(
        shell.err.contents(),
        "main.js:1: plain\nthrow 'plain'\n^^^^^^^^^^^^^\n"
    );
}

#[test]
fn silent_execution_leaves_reporting_to_the_caller() {
    let mut shell = Shell::new();
    let source = SourceUnit::new("quiet.js", "throw new RangeError('quiet')");
    let execution = execute(&mut shell.interp, &source, true, false);
    let exception = execution.exception().expect("execution should fail");
    assert_eq!(exception.record().message, "RangeError: quiet");
    assert_eq!(shell.err.contents(), "");
}

#[test]
fn self_containing_array_prints_as_empty() {
    let mut shell = Shell::new();
    assert!(shell.run("var a = [1]; a[0] = a; print(a)").succeeded());
    assert!(shell.run("a").succeeded());
    assert!(shell.run("var b = [1, 2]; b[2] = b; print(b); b.length").succeeded());
    assert_eq!(shell.out.contents(), "\n\n1,2,\n3\n");
    assert_eq!(shell.err.contents(), "");
}

#[test]
fn self_referencing_error_message_is_dropped() {
    let mut shell = Shell::new();
    assert!(shell.run("var e = new Error('x'); e.message = e; e").succeeded());
    assert_eq!(shell.out.contents(), "Error\n");

    let execution = shell.run("throw e");
    assert!(matches!(execution, Execution::RuntimeFailure(_)));
    assert!(shell.err.contents().starts_with("main.js:1: Error\nthrow e\n"));
}

#[test]
fn huge_array_index_throws_instead_of_allocating() {
    let mut shell = Shell::new();
    let execution = shell.run("var a = []; a[100000000000] = 1; print('after')");
    assert!(matches!(execution, Execution::RuntimeFailure(_)));
    assert_eq!(shell.out.contents(), "");
    assert!(shell
        .err
        .contents()
        .starts_with("main.js:1: RangeError: Invalid array length\n"));

    let mut shell = Shell::new();
    let script = "try { var a = []; a[100000000000] = 1 } catch (e) { print(e.name) }\nprint('after')";
    assert!(shell.run(script).succeeded());
    assert_eq!(shell.out.contents(), "RangeError\nafter\n");
}

#[test]
fn self_loading_script_fails_cleanly() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("main.js");
    let body = format!("load({})\n", path_literal(&path));
    fs::write(&path, &body).expect("write script");

    let mut shell = Shell::new();
    let execution = shell.run(&body);
    assert!(matches!(execution, Execution::RuntimeFailure(_)));
    let expected = format!(
        "main.js:1: ExecutionError: Error executing file '{}'\n",
        path.display()
    );
    assert!(shell.err.contents().starts_with(&expected));
    assert_eq!(shell.out.contents(), "");
}

#[test]
fn nested_parentheses_never_overflow_the_stack() {
    let mut shell = Shell::new();
    let source = format!("{}1{}", "(".repeat(200), ")".repeat(200));
    match shell.run(&source) {
        Execution::Success(_) => assert_eq!(shell.out.contents(), "1\n"),
        Execution::CompileFailure(_) => assert!(shell
            .err
            .contents()
            .starts_with("main.js:1: SyntaxError: Maximum nesting depth exceeded\n")),
        Execution::RuntimeFailure(_) => panic!("nested literal failed at run time"),
    }
}

#[test]
fn deeply_nested_source_is_a_syntax_error() {
    for levels in [300, 3000] {
        let mut shell = Shell::new();
        let source = format!("{}1{}", "(".repeat(levels), ")".repeat(levels));
        let execution = shell.run(&source);
        assert!(
            matches!(execution, Execution::CompileFailure(_)),
            "{levels} levels should not compile"
        );
        assert!(shell
            .err
            .contents()
            .starts_with("main.js:1: SyntaxError: Maximum nesting depth exceeded\n"));
    }
}
