//! Fixed-point driver: type check, expand, repeat.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::errors::{unspanned, CheckflowError, ErrorKind, ErrorReporting, PhaseContext, SourceContext};
use crate::expand::collector::{collect_file, Collected};
use crate::expand::engine::expand_file;
use crate::syntax::NodeId;
use crate::types::{TypeChecker, TypeInfo};
use crate::unit::Unit;

/// State of the unit after one iteration.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub iteration: usize,
    pub expanded: usize,
    pub pending: usize,
    /// `(file name, rendered source)` of every marked file.
    pub files: Vec<(String, String)>,
}

/// Receives a snapshot after every iteration.
pub trait Observer {
    fn iteration(&mut self, snapshot: &Snapshot);
}

impl<F: FnMut(&Snapshot)> Observer for F {
    fn iteration(&mut self, snapshot: &Snapshot) {
        self(snapshot)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub checks: usize,
    pub handlers: usize,
    pub iterations: usize,
}

pub struct Driver<'a> {
    checker: &'a mut dyn TypeChecker,
    observer: Option<&'a mut dyn Observer>,
}

impl<'a> Driver<'a> {
    pub fn new(checker: &'a mut dyn TypeChecker) -> Self {
        Self {
            checker,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: &'a mut dyn Observer) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Expands every marker of `unit` in place.
    pub fn run(&mut self, unit: &mut Unit) -> Result<Summary, CheckflowError> {
        let mut state = collect(unit)?;
        let initial = state.pending();
        let handlers = state.handlers.len();
        info!(checks = initial, handlers, files = unit.files.len(), "collected markers");

        let mut spliced: HashSet<NodeId> = HashSet::new();
        let mut previous = initial;
        let mut iteration = 0;

        // Every productive iteration expands at least one check.
        while state.pending() > 0 && iteration <= initial {
            iteration += 1;
            let info = self.checker.check(unit);
            let mut expanded = 0;
            for (index, file) in unit.files.iter_mut().enumerate() {
                if !file.is_marked() {
                    continue;
                }
                let ctx = file.context("expand");
                expanded += expand_file(
                    &mut file.ast,
                    index,
                    &ctx,
                    &mut state,
                    &mut spliced,
                    &info,
                    &mut unit.ids,
                )?;
            }
            let pending = state.pending();
            debug!(iteration, expanded, pending, "fixed-point iteration");

            if let Some(observer) = self.observer.as_deref_mut() {
                observer.iteration(&Snapshot {
                    iteration,
                    expanded,
                    pending,
                    files: unit
                        .marked_files()
                        .map(|f| (f.name().to_string(), f.render()))
                        .collect(),
                });
            }

            if pending > 0 && pending == previous {
                return Err(stagnation(unit, &state, &info));
            }
            previous = pending;
        }

        if state.pending() > 0 {
            let info = self.checker.check(unit);
            return Err(stagnation(unit, &state, &info));
        }

        Ok(Summary {
            checks: initial,
            handlers,
            iterations: iteration,
        })
    }
}

/// Runs the collector over every marked file of the unit.
pub fn collect(unit: &mut Unit) -> Result<Collected, CheckflowError> {
    let mut state = Collected::default();
    for (index, file) in unit.files.iter_mut().enumerate() {
        let Some(rewritten) = &file.rewritten else {
            continue;
        };
        let ctx = file.context("collect");
        collect_file(&mut file.ast, index, &rewritten.markers, &ctx, &mut state)?;
    }
    Ok(state)
}

/// The undefined-type error: points at the first remaining check and lists
/// the others, with the checker's complaints as help.
fn stagnation(unit: &Unit, state: &Collected, info: &TypeInfo) -> CheckflowError {
    let mut locations = Vec::new();
    let mut first = None;
    for binding in state.checks.values() {
        let Some(file) = unit.files.get(binding.file) else {
            continue;
        };
        let ctx = file.context("expand");
        let span = ctx.source_span(binding.span);
        let (line, column) = line_column(&file.source.content, span.offset());
        locations.push(format!("{}:{}:{}", file.name(), line, column));
        first.get_or_insert((ctx, binding.span));
    }

    let remaining = state.pending();
    let kind = ErrorKind::UndefinedType { remaining };
    let error = match first {
        Some((ctx, span)) => ctx.report_at(kind, span),
        None => PhaseContext::new(SourceContext::fallback("expand"), "expand").report(kind, unspanned()),
    };

    let mut help = format!("unresolved checks at {}", locations.join(", "));
    for diagnostic in info.diagnostics.iter().take(8) {
        help.push_str(&format!("\n{}: {}", diagnostic.file, diagnostic.message));
    }
    error.with_help(help)
}

/// 1-based line and column of a byte offset.
fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(text.len());
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map_or(offset, |nl| offset - nl - 1) + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Checker;

    #[test]
    fn columns_are_one_based() {
        assert_eq!(line_column("ab\ncd", 0), (1, 1));
        assert_eq!(line_column("ab\ncd", 4), (2, 2));
    }

    #[test]
    fn observer_sees_every_iteration() {
        let src = "package main\n\nimport \"os\"\n\nfunc f() error {\n\tfile := check os.Open(\"x\")\n\tcheck file.Close()\n\treturn nil\n}\n";
        let mut unit = Unit::from_source("f.go2", src).unwrap();
        let mut checker = Checker::with_builtin_stubs().unwrap();
        let mut seen = Vec::new();
        let mut observer = |s: &Snapshot| seen.push((s.iteration, s.pending));
        let summary = Driver::new(&mut checker)
            .with_observer(&mut observer)
            .run(&mut unit)
            .unwrap();
        assert_eq!(summary.checks, 2);
        assert_eq!(seen, vec![(1, 1), (2, 0)]);
    }
}
