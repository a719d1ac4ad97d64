//! Lexical rewriter behaviour over whole files.

use std::collections::BTreeSet;

use checkflow::errors::{ErrorKind, PhaseContext, SourceContext};
use checkflow::expand::driver::collect;
use checkflow::rewrite::{rewrite, Rewritten};
use checkflow::{expand_source, CheckflowError, Unit};
use proptest::prelude::*;

fn run(src: &str) -> Result<Rewritten, CheckflowError> {
    let ctx = PhaseContext::new(SourceContext::from_file("main.go2", src), "rewrite");
    rewrite(src, &ctx)
}

fn nested_check(depth: usize) -> String {
    let mut expr = "1".to_string();
    for _ in 0..depth {
        expr = format!("check f({expr})");
    }
    expr
}

#[test]
fn rewrites_a_whole_file() {
    let src = "package main\n\nfunc g() error {\n\thandle err {\n\t\treturn err\n\t}\n\tcheck f()\n\treturn nil\n}\n";
    let out = run(src).unwrap();
    assert_eq!(
        out.text,
        "package main\n\nfunc g() error {\n\tif _go2handle {\n\t\treturn _go2handleErr\n\t}\n\t_go2check(f())\n\treturn nil\n}\n"
    );
    assert_eq!(out.markers.checks.len(), 1);
    assert_eq!(out.markers.handles.values().collect::<Vec<_>>(), vec!["err"]);

    let handle_at = *out.markers.handles.keys().next().unwrap();
    assert!(out.text[handle_at..].starts_with("if _go2handle"));
}

#[test]
fn errors_point_at_the_original_source() {
    let src = "package main\n\nfunc g() {\n\tx := check )\n}\n";
    let err = run(src).unwrap_err();
    assert_eq!(err.source_info.primary_span.offset(), src.find("check").unwrap());
}

#[test]
fn check_as_selector_is_not_a_marker() {
    let src = "package main\n\nfunc g(v T) {\n\tv.check()\n\tv.handle = 1\n}\n";
    let out = run(src).unwrap();
    assert_eq!(out.text, src);
    assert!(out.markers.is_empty());
}

#[test]
fn unbalanced_delimiters_in_checks_are_rejected() {
    for (open, close) in [('(', ']'), ('(', '}'), ('[', ')'), ('[', '}')] {
        let src = format!("x := check f{open}a{close}\n");
        assert_eq!(run(&src).unwrap_err().kind, ErrorKind::MismatchedDelimiters, "{src}");
    }
}

proptest! {
    #[test]
    fn text_without_markers_is_unchanged(
        lines in prop::collection::vec(("[a-g]{1,6}", "[a-g]{1,6}", 0u32..1000), 0..8)
    ) {
        let mut src = String::from("package main\n\nfunc g() {\n");
        for (lhs, fun, n) in &lines {
            src.push_str(&format!("\t{lhs} := {fun}({n}, \"s\")[0] // c\n"));
        }
        src.push_str("}\n");

        let out = run(&src).unwrap();
        prop_assert_eq!(&out.text, &src);
        prop_assert!(out.markers.is_empty());
        prop_assert!(out.offsets.is_identity());
    }

    #[test]
    fn nested_check_markers_land_on_wrapper_calls(depth in 0usize..=5) {
        let src = format!("package main\n\nfunc g() {{\n\tx := {}\n\t_ = x\n}}\n", nested_check(depth));
        let mut unit = Unit::from_source("main.go2", &src).unwrap();
        let collected = collect(&mut unit).unwrap();
        let rewritten = unit.files[0].rewritten.as_ref().unwrap();

        prop_assert_eq!(rewritten.markers.checks.len(), depth);
        prop_assert_eq!(collected.checks.len(), depth);
        let starts: BTreeSet<usize> = collected.checks.values().map(|b| b.span.start).collect();
        prop_assert_eq!(&starts, &rewritten.markers.checks.iter().copied().collect::<BTreeSet<_>>());
        for &at in &starts {
            prop_assert!(rewritten.text[at..].starts_with("_go2check(f("));
        }
    }

    #[test]
    fn nested_checks_expand_to_ordered_temporaries(depth in 1usize..5) {
        let src = format!(
            "package main\n\nfunc f(n int) (int, error) {{\n\treturn n, nil\n}}\n\nfunc g() error {{\n\tx := {}\n\t_ = x\n\treturn nil\n}}\n",
            nested_check(depth)
        );
        let out = expand_source("main.go2", &src).unwrap();
        prop_assert!(!out.contains("_go2check"));
        let mut last = 0;
        for i in 0..depth {
            let arg = if i == 0 { "1".to_string() } else { format!("_go2int{}", i - 1) };
            let line = format!("_go2int{i}, _go2error{i} := f({arg})");
            let at = out.find(&line);
            prop_assert!(at.is_some(), "missing {} in {}", line, out);
            let at = at.unwrap_or_default();
            prop_assert!(at >= last);
            last = at;
        }
        let assign = format!("x := _go2int{}", depth - 1);
        prop_assert!(out.contains(&assign));
    }
}
