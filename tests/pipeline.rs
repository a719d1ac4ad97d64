//! End-to-end expansion scenarios: marked source in, host source out.

use checkflow::errors::ErrorKind;
use checkflow::{expand_source, expand_unit, SourceInput, Unit};
use checkflow::types::Checker;

fn expand(src: &str) -> String {
    match expand_source("main.go2", src) {
        Ok(out) => out,
        Err(e) => panic!("expansion failed: {:?}", miette::Report::new(e)),
    }
}

fn expand_err(src: &str) -> ErrorKind {
    expand_source("main.go2", src).unwrap_err().kind
}

const ADD: &str = "func add(a, b int) (int, error) {\n\treturn a + b, nil\n}\n";

#[test]
fn check_in_assignment_binds_values_and_error() {
    let src = format!("package main\n\n{ADD}\nfunc f() error {{\n\tx := check add(1, 2)\n\t_ = x\n\treturn nil\n}}\n");
    let out = expand(&src);
    assert!(
        out.contains(
            "func f() error {\n\t_go2int0, _go2error0 := add(1, 2)\n\tif _go2error0 != nil {\n\t\treturn _go2error0\n\t}\n\tx := _go2int0\n\t_ = x\n\treturn nil\n}"
        ),
        "{out}"
    );
    assert!(!out.contains("_go2check"));
}

#[test]
fn default_handler_returns_zero_values() {
    let src = "package main\n\nimport \"strconv\"\n\nfunc double(s string) (int, error) {\n\tn := check strconv.Atoi(s)\n\treturn n * 2, nil\n}\n";
    let out = expand(src);
    assert!(out.contains("_go2int0, _go2error0 := strconv.Atoi(s)"), "{out}");
    assert!(out.contains("\t\treturn 0, _go2error0\n"), "{out}");
    assert!(out.contains("n := _go2int0"), "{out}");
}

#[test]
fn function_without_error_result_panics() {
    let src = "package main\n\nimport \"os\"\n\nfunc cleanup() {\n\tcheck os.Remove(\"x\")\n}\n";
    let out = expand(src);
    assert!(
        out.contains("_go2error0 := os.Remove(\"x\")\n\tif _go2error0 != nil {\n\t\tpanic(_go2error0)\n\t}"),
        "{out}"
    );
}

#[test]
fn handlers_run_innermost_first_and_stop_at_return() {
    let src = r#"package main

import (
	"fmt"
	"os"
)

func remove() error {
	handle err {
		fmt.Println("outer", err)
	}
	handle err {
		return fmt.Errorf("wrapped: %v", err)
	}
	check os.Remove("x")
	return nil
}
"#;
    let out = expand(src);
    assert!(
        out.contains(
            "\t_go2error0 := os.Remove(\"x\")\n\tif _go2error0 != nil {\n\t\treturn fmt.Errorf(\"wrapped: %v\", _go2error0)\n\t}\n\treturn nil\n"
        ),
        "{out}"
    );
    assert!(!out.contains("outer"), "{out}");
    assert!(!out.contains("_go2handle"), "{out}");
}

#[test]
fn falling_through_handlers_reach_the_default() {
    let src = r#"package main

import (
	"fmt"
	"os"
)

func remove() {
	handle err {
		fmt.Println(err)
	}
	check os.Remove("x")
}
"#;
    let out = expand(src);
    assert!(
        out.contains("\tif _go2error0 != nil {\n\t\tfmt.Println(_go2error0)\n\t\tpanic(_go2error0)\n\t}"),
        "{out}"
    );
}

#[test]
fn handlers_apply_only_after_their_declaration() {
    let src = r#"package main

import (
	"fmt"
	"os"
)

func remove() error {
	check os.Remove("a")
	handle err {
		fmt.Println(err)
	}
	check os.Remove("b")
	return nil
}
"#;
    let out = expand(src);
    let first = out.find("os.Remove(\"a\")").unwrap();
    let second = out.find("os.Remove(\"b\")").unwrap();
    assert!(!out[first..second].contains("fmt.Println"), "{out}");
    assert!(out[second..].contains("fmt.Println(_go2error1)"), "{out}");
}

#[test]
fn nested_checks_expand_inner_first() {
    let src = format!("package main\n\n{ADD}\nfunc f() error {{\n\tx := check add(check add(1, 2), 3)\n\t_ = x\n\treturn nil\n}}\n");
    let out = expand(&src);
    let inner = out.find("_go2int0, _go2error0 := add(1, 2)").unwrap();
    let outer = out.find("_go2int1, _go2error1 := add(_go2int0, 3)").unwrap();
    assert!(inner < outer, "{out}");
    assert!(out.contains("x := _go2int1"), "{out}");
}

#[test]
fn multi_value_check_splices_into_call_arguments() {
    let src = r#"package main

import "fmt"

func pair() (int, string, error) {
	return 1, "a", nil
}

func show() error {
	fmt.Println(check pair())
	return nil
}
"#;
    let out = expand(src);
    assert!(out.contains("_go2int0, _go2string0, _go2error0 := pair()"), "{out}");
    assert!(out.contains("fmt.Println(_go2int0, _go2string0)"), "{out}");
}

#[test]
fn two_multi_value_checks_in_one_call_are_rejected() {
    let src = r#"package main

import "fmt"

func pair() (int, string, error) {
	return 1, "a", nil
}

func show() error {
	fmt.Println(check pair(), check pair())
	return nil
}
"#;
    assert!(matches!(expand_err(src), ErrorKind::MultipleMultiValue { .. }));
}

#[test]
fn multi_value_check_needs_a_list_context() {
    let src = r#"package main

func pair() (int, string, error) {
	return 1, "a", nil
}

func show() error {
	x := 1 + check pair()
	_ = x
	return nil
}
"#;
    assert_eq!(expand_err(src), ErrorKind::MultiValueContext);
}

#[test]
fn checked_value_must_end_in_error() {
    let src = "package main\n\nfunc two() (int, int) {\n\treturn 1, 2\n}\n\nfunc f() error {\n\tx := check two()\n\t_ = x\n\treturn nil\n}\n";
    assert!(matches!(expand_err(src), ErrorKind::LastNotError { .. }));
}

#[test]
fn deferred_checks_are_rejected() {
    let src = "package main\n\nimport \"os\"\n\nfunc f() error {\n\tdefer check os.Remove(\"x\")\n\treturn nil\n}\n";
    assert!(matches!(expand_err(src), ErrorKind::UnsupportedPosition { .. }));
}

#[test]
fn unresolvable_checks_stop_with_undefined_type() {
    let src = "package main\n\nfunc f() error {\n\tx := check missing()\n\t_ = x\n\treturn nil\n}\n";
    let err = expand_source("main.go2", src).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndefinedType { remaining: 1 });
    let help = err.diagnostic_info.help.unwrap_or_default();
    assert!(help.contains("main.go2:4:7"), "{help}");
}

#[test]
fn plain_files_provide_declarations() {
    let inputs = vec![
        SourceInput::plain("util.go", format!("package main\n\n{ADD}")),
        SourceInput::marked(
            "main.go2",
            "package main\n\nfunc f() (string, error) {\n\tx := check add(1, 2)\n\t_ = x\n\treturn \"ok\", nil\n}\n",
        ),
    ];
    let mut unit = Unit::assemble(inputs).unwrap();
    let mut checker = Checker::with_builtin_stubs().unwrap();
    let summary = expand_unit(&mut unit, &mut checker).unwrap();
    assert_eq!(summary.checks, 1);

    let out: Vec<String> = unit.marked_files().map(|f| f.render()).collect();
    assert_eq!(out.len(), 1);
    assert!(out[0].contains("return \"\", _go2error0"), "{}", out[0]);
}

#[test]
fn mismatched_packages_are_rejected() {
    let inputs = vec![
        SourceInput::marked("a.go2", "package a\n"),
        SourceInput::plain("b.go", "package b\n"),
    ];
    let err = Unit::assemble(inputs).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::MismatchedPackage { .. }));
}

const READY: &str = "func ready() (bool, error) {\n\treturn true, nil\n}\n";

#[test]
fn check_in_if_header_is_hoisted_before_the_statement() {
    let src = format!("package main\n\n{READY}\nfunc f() error {{\n\tif check ready() {{\n\t\treturn nil\n\t}}\n\treturn nil\n}}\n");
    let out = expand(&src);
    assert!(
        out.contains("\t_go2bool0, _go2error0 := ready()\n\tif _go2error0 != nil {\n\t\treturn _go2error0\n\t}\n\tif _go2bool0 {\n\t\treturn nil\n\t}\n"),
        "{out}"
    );
}

#[test]
fn check_in_switch_header_keeps_the_clauses() {
    let src = format!(
        "package main\n\n{READY}\nfunc f() error {{\n\tswitch check ready() {{\n\tcase true:\n\t\treturn nil\n\t}}\n\treturn nil\n}}\n"
    );
    let out = expand(&src);
    assert!(out.contains("_go2bool0, _go2error0 := ready()"), "{out}");
    assert!(out.contains("\tswitch _go2bool0 {\n\tcase true:\n"), "{out}");
}

#[test]
fn check_in_range_expression_is_evaluated_once() {
    let src = "package main\n\nfunc items() ([]int, error) {\n\treturn nil, nil\n}\n\nfunc f() error {\n\tfor _, v := range check items() {\n\t\t_ = v\n\t}\n\treturn nil\n}\n";
    let out = expand(src);
    let call = out.find("_go2slcInt0, _go2error0 := items()").expect(&out);
    let range = out.find("for _, v := range _go2slcInt0 {").expect(&out);
    assert!(call < range, "{out}");
}

#[test]
fn check_in_loop_condition_is_rejected() {
    let src = format!("package main\n\n{READY}\nfunc f() error {{\n\tfor check ready() {{\n\t}}\n\treturn nil\n}}\n");
    assert!(matches!(expand_err(&src), ErrorKind::UnsupportedPosition { .. }));
}

#[test]
fn check_in_first_case_value_is_hoisted() {
    let src = format!(
        "package main\n\n{READY}\nfunc f(b bool) error {{\n\tswitch b {{\n\tcase check ready():\n\t\treturn nil\n\t}}\n\treturn nil\n}}\n"
    );
    let out = expand(&src);
    assert!(out.contains("\tcase _go2bool0:\n"), "{out}");
}

#[test]
fn check_in_later_case_value_is_rejected() {
    let src = format!(
        "package main\n\n{READY}\nfunc f(b bool) error {{\n\tswitch b {{\n\tcase false:\n\t\treturn nil\n\tcase check ready():\n\t\treturn nil\n\t}}\n\treturn nil\n}}\n"
    );
    assert!(matches!(expand_err(&src), ErrorKind::UnsupportedPosition { .. }));

    let src = format!(
        "package main\n\n{READY}\nfunc f(b bool) error {{\n\tswitch b {{\n\tcase false, check ready():\n\t\treturn nil\n\t}}\n\treturn nil\n}}\n"
    );
    assert!(matches!(expand_err(&src), ErrorKind::UnsupportedPosition { .. }));
}

#[test]
fn single_declared_interface_result_is_the_error() {
    let src = "package main\n\ntype Fault interface {\n\tError() string\n}\n\nfunc fail() Fault {\n\treturn nil\n}\n\nfunc f() error {\n\tcheck fail()\n\treturn nil\n}\n";
    let out = expand(src);
    assert!(
        out.contains("\t_go2error0 := fail()\n\tif _go2error0 != nil {\n\t\treturn _go2error0\n\t}\n"),
        "{out}"
    );
}
