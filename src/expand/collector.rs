//! Structural collection: binds every marker position to the node it decorates.
//!
//! One walk per marked file, parent-first for ownership and post-order for
//! checks. Handle conditionals are detached from the tree as they are met and
//! become [`Handler`]s; each check records the handlers visible from its
//! statement, most recently declared first.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::trace;

use crate::errors::{CheckflowError, ErrorKind, ErrorReporting, PhaseContext};
use crate::names::{temp_name, CHECK_FUNC, HANDLE_BOOL};
use crate::rewrite::MarkerMap;
use crate::syntax::walk::{walk_file, Enter, ExprAction, ExprContext, Region, StmtAction, VisitMut};
use crate::syntax::*;

/// A detached `handle` block.
#[derive(Debug, Clone)]
pub struct Handler {
    /// The error identifier the user bound, as written.
    pub err_name: String,
    /// Body with the bound identifier spelled as the reserved handler name.
    pub body: Block,
    pub span: Span,
}

/// Declared results of a function or closure that owns checks.
#[derive(Debug, Clone, Default)]
pub struct FuncResults {
    pub slots: Vec<TypeExpr>,
}

/// Next free numeric suffix per sanitized type name, for one block.
#[derive(Debug, Clone, Default)]
pub struct NamingScope {
    next: BTreeMap<String, usize>,
}

impl NamingScope {
    pub fn allocate(&mut self, type_name: &str) -> String {
        let n = self.next.entry(type_name.to_string()).or_insert(0);
        let name = temp_name(type_name, *n);
        *n += 1;
        name
    }
}

/// Owners of every node inside a function body.
#[derive(Debug, Clone, Default)]
pub struct Ownership {
    /// Index into [`Collected::funcs`].
    pub func: HashMap<NodeId, usize>,
    pub block: HashMap<NodeId, NodeId>,
    /// Owning statement of expressions: the enclosing statement that sits
    /// directly in a block.
    pub stmt: HashMap<NodeId, NodeId>,
}

#[derive(Debug, Clone)]
pub struct CheckBinding {
    /// The `_go2check(...)` call.
    pub id: NodeId,
    /// Index of the file in its unit.
    pub file: usize,
    pub span: Span,
    pub func: usize,
    pub block: NodeId,
    pub stmt: NodeId,
    /// Indices into [`Collected::handlers`], innermost first.
    pub chain: Vec<usize>,
}

/// Everything collection produced for a unit; the engine's working state.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    /// The pending set, ordered by node id.
    pub checks: BTreeMap<NodeId, CheckBinding>,
    pub handlers: Vec<Handler>,
    pub funcs: Vec<FuncResults>,
    pub scopes: HashMap<NodeId, NamingScope>,
    pub ownership: Ownership,
}

impl Collected {
    pub fn pending(&self) -> usize {
        self.checks.len()
    }
}

/// Collects the markers of one parsed file into `out`.
pub fn collect_file(
    file: &mut File,
    file_index: usize,
    markers: &MarkerMap,
    ctx: &PhaseContext,
    out: &mut Collected,
) -> Result<(), CheckflowError> {
    let mut collector = Collector {
        markers,
        ctx,
        out,
        file_index,
        funcs: Vec::new(),
        stmts: Vec::new(),
        claimed_checks: BTreeSet::new(),
        claimed_handles: BTreeSet::new(),
    };
    walk_file(&mut collector, file)?;
    collector.finish()
}

struct FuncFrame {
    index: usize,
    blocks: Vec<BlockFrame>,
}

struct BlockFrame {
    id: NodeId,
    /// Handlers declared so far in this block, in source order.
    handlers: Vec<usize>,
}

struct Collector<'a> {
    markers: &'a MarkerMap,
    ctx: &'a PhaseContext,
    out: &'a mut Collected,
    file_index: usize,
    funcs: Vec<FuncFrame>,
    stmts: Vec<NodeId>,
    claimed_checks: BTreeSet<usize>,
    claimed_handles: BTreeSet<usize>,
}

impl Collector<'_> {
    fn current_block(&mut self) -> Option<&mut BlockFrame> {
        self.funcs.last_mut().and_then(|f| f.blocks.last_mut())
    }

    fn chain(&self) -> Vec<usize> {
        let Some(func) = self.funcs.last() else {
            return Vec::new();
        };
        func.blocks
            .iter()
            .rev()
            .flat_map(|block| block.handlers.iter().rev().copied())
            .collect()
    }

    fn handle(&mut self, stmt: &Stmt, err_name: &str) -> Result<Enter, CheckflowError> {
        let body = match &stmt.kind {
            StmtKind::If(IfStmt {
                init: None,
                cond,
                then,
                els: None,
            }) if cond.as_ident() == Some(HANDLE_BOOL) => then.clone(),
            other => {
                return Err(self.ctx.internal_error(
                    ErrorKind::MarkerMisaligned {
                        marker: "handle".into(),
                        expected: "a conditional with a block".into(),
                        found: describe_stmt(other).into(),
                    },
                    stmt.span,
                ))
            }
        };
        let index = self.out.handlers.len();
        self.out.handlers.push(Handler {
            err_name: err_name.to_string(),
            body,
            span: stmt.span,
        });
        match self.current_block() {
            Some(block) => block.handlers.push(index),
            None => {
                return Err(self
                    .ctx
                    .unsupported_position("a handle outside a function body", stmt.span))
            }
        }
        trace!(offset = stmt.span.start, err = err_name, "handler detached");
        Ok(Enter::Remove)
    }

    fn check(&mut self, expr: &Expr, ctx: ExprContext) -> Result<(), CheckflowError> {
        let context = match ctx.region {
            Region::Body => None,
            Region::LoopHeader => Some("a for loop condition or post statement"),
            Region::ElseIfHeader => Some("an else-if header"),
            Region::LaterCase => Some("a case value after the first"),
            Region::Deferred => Some("a go or defer statement"),
            Region::PackageLevel => Some("a package-level initializer"),
        };
        if let Some(context) = context {
            return Err(self.ctx.unsupported_position(context, expr.span));
        }

        let args = expr.call_args_of(CHECK_FUNC).map_or(0, <[Expr]>::len);
        if args != 1 {
            return Err(self.ctx.internal_error(
                ErrorKind::MarkerMisaligned {
                    marker: "check".into(),
                    expected: "a call with one argument".into(),
                    found: format!("a call with {} arguments", args),
                },
                expr.span,
            ));
        }

        let (Some(func), Some(stmt)) = (self.funcs.last(), self.stmts.last()) else {
            return Err(self
                .ctx
                .unsupported_position("a package-level initializer", expr.span));
        };
        let block = func.blocks.last().map(|b| b.id);
        let Some(block) = block else {
            return Err(self.ctx.internal_error(
                ErrorKind::MarkerUnclaimed {
                    marker: "check".into(),
                    offset: expr.span.start,
                },
                expr.span,
            ));
        };

        let binding = CheckBinding {
            id: expr.id,
            file: self.file_index,
            span: expr.span,
            func: func.index,
            block,
            stmt: *stmt,
            chain: self.chain(),
        };
        trace!(
            offset = expr.span.start,
            handlers = binding.chain.len(),
            "check bound"
        );
        self.out.checks.insert(expr.id, binding);
        Ok(())
    }

    fn finish(self) -> Result<(), CheckflowError> {
        let unclaimed_check = self
            .markers
            .checks
            .iter()
            .find(|pos| !self.claimed_checks.contains(pos))
            .map(|&pos| ("check", pos));
        let unclaimed_handle = self
            .markers
            .handles
            .keys()
            .find(|pos| !self.claimed_handles.contains(pos))
            .map(|&pos| ("handle", pos));
        match unclaimed_check.or(unclaimed_handle) {
            Some((marker, offset)) => Err(self.ctx.internal_error(
                ErrorKind::MarkerUnclaimed {
                    marker: marker.into(),
                    offset,
                },
                Span::new(offset, offset),
            )),
            None => Ok(()),
        }
    }
}

impl VisitMut for Collector<'_> {
    type Error = CheckflowError;

    fn enter_func(&mut self, sig: &Signature) -> Result<(), CheckflowError> {
        let index = self.out.funcs.len();
        self.out.funcs.push(FuncResults {
            slots: sig.result_slots().into_iter().cloned().collect(),
        });
        self.funcs.push(FuncFrame {
            index,
            blocks: Vec::new(),
        });
        Ok(())
    }

    fn exit_func(&mut self) -> Result<(), CheckflowError> {
        self.funcs.pop();
        Ok(())
    }

    fn enter_block(&mut self, block: &Block) -> Result<(), CheckflowError> {
        self.out.scopes.entry(block.id).or_default();
        if let Some(func) = self.funcs.last_mut() {
            func.blocks.push(BlockFrame {
                id: block.id,
                handlers: Vec::new(),
            });
        }
        Ok(())
    }

    fn exit_block(&mut self, _block: &Block) -> Result<(), CheckflowError> {
        if let Some(func) = self.funcs.last_mut() {
            func.blocks.pop();
        }
        Ok(())
    }

    fn enter_stmt(&mut self, stmt: &Stmt) -> Result<Enter, CheckflowError> {
        let markers = self.markers;
        if let Some(err_name) = markers.handles.get(&stmt.span.start) {
            if self.claimed_handles.insert(stmt.span.start) {
                return self.handle(stmt, err_name);
            }
        }
        if let Some(func) = self.funcs.last() {
            self.out.ownership.func.insert(stmt.id, func.index);
            if let Some(block) = func.blocks.last() {
                self.out.ownership.block.insert(stmt.id, block.id);
            }
        }
        self.stmts.push(stmt.id);
        Ok(Enter::Walk)
    }

    fn exit_stmt(&mut self, _stmt: &mut Stmt) -> Result<StmtAction, CheckflowError> {
        self.stmts.pop();
        Ok(StmtAction::default())
    }

    fn exit_expr(&mut self, expr: &mut Expr, ctx: ExprContext) -> Result<ExprAction, CheckflowError> {
        if let (Some(func), Some(stmt)) = (self.funcs.last(), self.stmts.last()) {
            let ownership = &mut self.out.ownership;
            ownership.func.insert(expr.id, func.index);
            ownership.stmt.insert(expr.id, *stmt);
            if let Some(block) = func.blocks.last() {
                ownership.block.insert(expr.id, block.id);
            }
        }

        let pos = expr.span.start;
        if !self.markers.checks.contains(&pos) {
            return Ok(ExprAction::Keep);
        }
        // Binary and key/value nodes start at their left operand; the check
        // itself is that operand.
        if matches!(expr.kind, ExprKind::Binary { .. } | ExprKind::KeyValue { .. }) {
            return Ok(ExprAction::Keep);
        }
        if expr.call_args_of(CHECK_FUNC).is_none() || self.claimed_checks.contains(&pos) {
            return Ok(ExprAction::Keep);
        }
        self.claimed_checks.insert(pos);
        self.check(expr, ctx)?;
        Ok(ExprAction::Keep)
    }
}

fn describe_stmt(kind: &StmtKind) -> &'static str {
    match kind {
        StmtKind::Expr(_) => "an expression statement",
        StmtKind::Assign { .. } => "an assignment",
        StmtKind::IncDec { .. } => "an increment",
        StmtKind::Decl(_) => "a declaration",
        StmtKind::Return(_) => "a return statement",
        StmtKind::If(_) => "a conditional with an init or else",
        StmtKind::For { .. } | StmtKind::Range { .. } => "a loop",
        StmtKind::Switch { .. } => "a switch",
        StmtKind::Block(_) => "a block",
        StmtKind::Go(_) | StmtKind::Defer(_) => "a go or defer statement",
        StmtKind::Branch(_) => "a branch statement",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::MarkerMap;
    use crate::unit::{SourceInput, Unit};

    fn collect(src: &str) -> Result<(Unit, Collected), CheckflowError> {
        let mut unit = Unit::from_source("test.go2", src)?;
        let mut out = Collected::default();
        let file = &mut unit.files[0];
        let ctx = file.context("collect");
        let markers = file.rewritten.as_ref().map(|rw| rw.markers.clone()).unwrap_or_default();
        collect_file(&mut file.ast, 0, &markers, &ctx, &mut out)?;
        Ok((unit, out))
    }

    /// Collects a plain file against hand-placed markers.
    fn collect_with(src: &str, markers: &MarkerMap) -> Result<Collected, CheckflowError> {
        let mut unit = Unit::assemble(vec![SourceInput::plain("test.go", src)])?;
        let mut out = Collected::default();
        let file = &mut unit.files[0];
        let ctx = file.context("collect");
        collect_file(&mut file.ast, 0, markers, &ctx, &mut out)?;
        Ok(out)
    }

    const PLAIN: &str = "package main\n\nfunc f() {\n\tx := g()\n\t_ = x\n}\n";

    #[test]
    fn handle_marker_on_a_plain_statement_is_misaligned() {
        let mut markers = MarkerMap::default();
        markers.handles.insert(PLAIN.find("x := g()").unwrap(), "err".into());
        let err = collect_with(PLAIN, &markers).unwrap_err();
        assert!(
            matches!(&err.kind, ErrorKind::MarkerMisaligned { marker, .. } if marker == "handle"),
            "{:?}",
            err.kind
        );
    }

    #[test]
    fn check_marker_without_a_node_is_unclaimed() {
        let offset = PLAIN.find(":=").unwrap();
        let mut markers = MarkerMap::default();
        markers.checks.insert(offset);
        let err = collect_with(PLAIN, &markers).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::MarkerUnclaimed {
                marker: "check".into(),
                offset,
            }
        );
    }

    #[test]
    fn check_marker_on_an_ordinary_call_is_unclaimed() {
        let offset = PLAIN.find("g()").unwrap();
        let mut markers = MarkerMap::default();
        markers.checks.insert(offset);
        let err = collect_with(PLAIN, &markers).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MarkerUnclaimed { .. }));
    }

    #[test]
    fn handlers_are_detached_and_chained_innermost_first() {
        let src = "package main

func f() error {
	handle outer {
		log(outer)
	}
	if ok {
		handle inner {
			return inner
		}
		check g()
	}
	check h()
	return nil
}
";
        let (unit, out) = collect(src).unwrap();
        assert_eq!(out.handlers.len(), 2);
        assert_eq!(out.handlers[0].err_name, "outer");
        assert_eq!(out.handlers[1].err_name, "inner");

        let chains: Vec<Vec<usize>> = out.checks.values().map(|c| c.chain.clone()).collect();
        assert_eq!(chains, vec![vec![1, 0], vec![0]]);

        let printed = unit.files[0].render();
        assert!(!printed.contains("_go2handle "));
        assert!(!printed.contains("if _go2handle"));
    }

    #[test]
    fn handlers_do_not_cross_function_literals() {
        let src = "package main

func f() error {
	handle err {
		return err
	}
	run(func() error {
		check g()
		return nil
	})
	return nil
}
";
        let (_, out) = collect(src).unwrap();
        let check = out.checks.values().next().unwrap();
        assert!(check.chain.is_empty());
        assert_eq!(check.func, 1);
        assert!(out.funcs[1].slots[0].is_named("error"));
    }

    #[test]
    fn nested_checks_share_their_statement() {
        let (_, out) = collect("package main\n\nfunc f() error {\n\tx := check a(check b())\n\treturn x\n}\n").unwrap();
        let stmts: BTreeSet<NodeId> = out.checks.values().map(|c| c.stmt).collect();
        assert_eq!(out.checks.len(), 2);
        assert_eq!(stmts.len(), 1);
        let check = out.checks.values().next().unwrap();
        assert_eq!(out.ownership.stmt.get(&check.id), Some(&check.stmt));
    }

    #[test]
    fn rejects_checks_in_loop_headers_and_defers() {
        for src in [
            "package main\n\nfunc f() error {\n\tfor i := 0; check ok(i); i++ {\n\t}\n\treturn nil\n}\n",
            "package main\n\nfunc f() error {\n\tdefer check close()\n\treturn nil\n}\n",
            "package main\n\nvar x = check f()\n",
        ] {
            let err = collect(src).unwrap_err();
            assert!(
                matches!(err.kind, ErrorKind::UnsupportedPosition { .. }),
                "{:?}",
                err.kind
            );
        }
    }

    #[test]
    fn closures_in_loop_headers_are_bodies() {
        let src = "package main\n\nfunc f() error {\n\tfor i := 0; func() bool { check g(); return true }(); i++ {\n\t}\n\treturn nil\n}\n";
        let (_, out) = collect(src).unwrap();
        assert_eq!(out.pending(), 1);
    }

    #[test]
    fn naming_scope_counts_per_type() {
        let mut scope = NamingScope::default();
        assert_eq!(scope.allocate("error"), "_go2error0");
        assert_eq!(scope.allocate("int"), "_go2int0");
        assert_eq!(scope.allocate("error"), "_go2error1");
    }
}
