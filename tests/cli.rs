//! The `checkflow` binary: exit status, files written, diagnostics rendered.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

const MAIN: &str = r#"package main

import "os"

func cleanup() error {
	check os.Remove("x")
	return nil
}
"#;

fn package_dir(name: &str, files: &[(&str, &str)]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("checkflow-cli-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    for (file, text) in files {
        fs::write(dir.join(file), text).unwrap();
    }
    dir
}

fn checkflow() -> Command {
    Command::cargo_bin("checkflow").unwrap()
}

#[test]
fn expand_writes_go_files_beside_sources() {
    let dir = package_dir("write", &[("main.go2", MAIN)]);

    checkflow().arg("expand").arg(&dir).assert().success();
    let out = fs::read_to_string(dir.join("main.go")).unwrap();
    assert!(out.contains("_go2error0 := os.Remove(\"x\")"), "{out}");
    assert!(out.contains("return _go2error0"), "{out}");

    // The generated file is skipped on the next run.
    checkflow().arg("expand").arg(&dir).assert().success();
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn expand_to_stdout_leaves_directory_alone() {
    let dir = package_dir("stdout", &[("main.go2", MAIN)]);

    checkflow()
        .args(["expand", "--stdout"])
        .arg(&dir)
        .assert()
        .success()
        .stdout(contains("_go2error0 := os.Remove(\"x\")"));
    assert!(!dir.join("main.go").exists());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn trace_shows_each_iteration() {
    let dir = package_dir("trace", &[("main.go2", MAIN)]);

    checkflow()
        .arg("trace")
        .arg(&dir)
        .assert()
        .success()
        .stdout(contains("Iteration 0").and(contains("Iteration 1")))
        .stdout(contains("+\tif _go2error0 != nil {"));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn rewrite_prints_markers_as_json() {
    let dir = package_dir("rewrite", &[("main.go2", MAIN)]);

    checkflow()
        .args(["rewrite", "--json"])
        .arg(dir.join("main.go2"))
        .assert()
        .success()
        .stdout(contains("\"checks\"").and(contains("_go2check(os.Remove")));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn ast_prints_the_parsed_file() {
    let dir = package_dir("ast", &[("main.go2", MAIN)]);

    checkflow()
        .arg("ast")
        .arg(dir.join("main.go2"))
        .assert()
        .success()
        .stdout(contains("FuncDecl").and(contains("_go2check")));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn errors_are_rendered_as_diagnostics() {
    let dir = package_dir(
        "undefined",
        &[("main.go2", "package main\n\nfunc f() error {\n\tcheck missing()\n\treturn nil\n}\n")],
    );

    checkflow()
        .arg("expand")
        .arg(&dir)
        .assert()
        .failure()
        .code(1)
        .stderr(contains("checkflow::expand::undefined_type").or(contains("undefined type")));
    assert!(!dir.join("main.go").exists());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn directory_without_sources_fails() {
    let dir = package_dir("empty", &[("util.go", "package main\n")]);

    checkflow()
        .arg("expand")
        .arg(&dir)
        .assert()
        .failure()
        .stderr(contains("no source files"));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_stub_file_fails() {
    let dir = package_dir("stubs", &[("main.go2", MAIN)]);

    checkflow()
        .arg("expand")
        .arg(&dir)
        .args(["--stubs", "/nonexistent/stubs.json"])
        .assert()
        .failure()
        .stderr(contains("cannot read"));
    let _ = fs::remove_dir_all(&dir);
}
