use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn husk() -> Command {
    let mut cmd = Command::cargo_bin("husk").expect("binary exists");
    cmd.env_remove("HUSK_LOG");
    cmd
}

#[test]
fn prints_to_stdout_and_exits_cleanly() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("hello.js");
    fs::write(&script, "print(\"a\", 1, true)\n6 * 7\n").expect("write script");

    husk()
        .arg(&script)
        .assert()
        .success()
        .stdout("a 1 true\n42\n")
        .stderr("");
}

#[test]
fn uncaught_error_is_reported_on_stderr() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("boom.js");
    fs::write(&script, "print('before')\n  throw new Error('boom')\n").expect("write script");

    let report = format!(
        "{origin}:2: Error: boom\n  throw new Error('boom')\n  ^^^^^^^^^^^^^^^^^^^^^^^\nError: boom\n    at {origin}:2:9\n",
        origin = script.display()
    );
    husk()
        .arg(&script)
        .assert()
        .code(1)
        .stdout("before\n")
        .stderr(predicate::str::diff(report));
}

#[test]
fn syntax_error_fails_without_running() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("broken.js");
    fs::write(&script, "print('never')\nvar = 1\n").expect("write script");

    husk()
        .arg(&script)
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains(":2: SyntaxError: Unexpected token '='"));
}

#[test]
fn load_and_read_work_from_scripts() {
    let dir = tempdir().expect("create temp dir");
    fs::write(dir.path().join("greeting.txt"), "hi there").expect("write data");
    fs::write(
        dir.path().join("lib.js"),
        "function greet() { return read('greeting.txt') }\n",
    )
    .expect("write lib");
    let script = dir.path().join("main.js");
    fs::write(&script, "load('lib.js')\nprint(greet())\n").expect("write script");

    husk()
        .current_dir(dir.path())
        .arg("main.js")
        .assert()
        .success()
        .stdout("hi there\n");
}

#[test]
fn missing_script_is_reported() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("absent.js");

    husk()
        .arg(&script)
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::starts_with(format!(
            "Error loading file '{}': ",
            script.display()
        )));
}

#[test]
fn script_argument_is_required() {
    husk().assert().code(2);
}
