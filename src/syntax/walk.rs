//! Mutable traversal driver.
//!
//! Visitors never mutate the tree behind the driver's back: they return a
//! decision per node ([`ExprAction`], [`StmtAction`], [`Enter`]) and the
//! driver applies it while it still holds the parent. Statements that sit
//! directly in a block are the only ones reported through `enter_stmt` and
//! `exit_stmt`; header statements (`if x := ...;`) are walked silently as part
//! of their owner.

use crate::syntax::*;

/// Where an expression sits relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Element of a value list that accepts any number of values.
    List { list: NodeId, kind: ListKind },
    /// The whole expression of an expression statement owned by a block.
    ExprStmt,
    /// Anything else: exactly one value is expected.
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    CallArgs,
    AssignRhs,
    ReturnResults,
}

impl ListKind {
    pub fn describe(&self) -> &'static str {
        match self {
            ListKind::CallArgs => "argument list",
            ListKind::AssignRhs => "assignment",
            ListKind::ReturnResults => "return statement",
        }
    }
}

/// Evaluation context inherited from enclosing statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Evaluated once, right where its owning statement runs.
    Body,
    /// `for` condition or post statement, evaluated on every iteration.
    LoopHeader,
    /// Init or condition of an `else if`, evaluated only on fallthrough.
    ElseIfHeader,
    /// A `case` value after the first one, evaluated only if no earlier case matched.
    LaterCase,
    /// Operand of `go` or `defer`.
    Deferred,
    /// Package-level initializer, outside any function.
    PackageLevel,
}

#[derive(Debug, Clone, Copy)]
pub struct ExprContext {
    pub slot: Slot,
    pub region: Region,
}

#[derive(Debug)]
pub enum ExprAction {
    Keep,
    Replace(Expr),
    /// Replace the expression with several list elements. Outside a list
    /// slot only a single-element splice is applied.
    Splice(Vec<Expr>),
}

#[derive(Debug, Default)]
pub struct StmtAction {
    /// Statements inserted right before the statement.
    pub prelude: Vec<Stmt>,
    pub remove: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enter {
    Walk,
    /// Keep the statement but do not descend into it.
    Skip,
    Remove,
}

pub trait VisitMut {
    type Error;

    /// Called for function declarations with a body and for function literals.
    fn enter_func(&mut self, _sig: &Signature) -> Result<(), Self::Error> {
        Ok(())
    }

    fn exit_func(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn enter_block(&mut self, _block: &Block) -> Result<(), Self::Error> {
        Ok(())
    }

    fn exit_block(&mut self, _block: &Block) -> Result<(), Self::Error> {
        Ok(())
    }

    fn enter_stmt(&mut self, _stmt: &Stmt) -> Result<Enter, Self::Error> {
        Ok(Enter::Walk)
    }

    fn exit_stmt(&mut self, _stmt: &mut Stmt) -> Result<StmtAction, Self::Error> {
        Ok(StmtAction::default())
    }

    /// Post-order: children have been visited and rewritten already.
    fn exit_expr(&mut self, _expr: &mut Expr, _ctx: ExprContext) -> Result<ExprAction, Self::Error> {
        Ok(ExprAction::Keep)
    }
}

// ============================================================================
// DRIVER
// ============================================================================

pub fn walk_file<V: VisitMut>(visitor: &mut V, file: &mut File) -> Result<(), V::Error> {
    Walker::new(visitor).file(file)
}

pub fn walk_block<V: VisitMut>(visitor: &mut V, block: &mut Block) -> Result<(), V::Error> {
    Walker::new(visitor).block(block)
}

struct Walker<'v, V: VisitMut> {
    visitor: &'v mut V,
    regions: Vec<Region>,
}

impl<'v, V: VisitMut> Walker<'v, V> {
    fn new(visitor: &'v mut V) -> Self {
        Self {
            visitor,
            regions: Vec::new(),
        }
    }

    fn region(&self) -> Region {
        self.regions.last().copied().unwrap_or(Region::Body)
    }

    fn in_region<T>(
        &mut self,
        region: Region,
        f: impl FnOnce(&mut Self) -> Result<T, V::Error>,
    ) -> Result<T, V::Error> {
        self.regions.push(region);
        let result = f(self);
        self.regions.pop();
        result
    }

    fn file(&mut self, file: &mut File) -> Result<(), V::Error> {
        for decl in &mut file.decls {
            match decl {
                Decl::Func(func) => {
                    if let Some(body) = &mut func.body {
                        self.visitor.enter_func(&func.sig)?;
                        self.block(body)?;
                        self.visitor.exit_func()?;
                    }
                }
                Decl::Var(specs) | Decl::Const(specs) => {
                    self.in_region(Region::PackageLevel, |w| w.value_specs(specs))?;
                }
                Decl::Type(_) => {}
            }
        }
        Ok(())
    }

    fn value_specs(&mut self, specs: &mut [ValueSpec]) -> Result<(), V::Error> {
        for spec in specs {
            let slot = Slot::List {
                list: spec.id,
                kind: ListKind::AssignRhs,
            };
            self.list(&mut spec.values, slot)?;
        }
        Ok(())
    }

    fn block(&mut self, block: &mut Block) -> Result<(), V::Error> {
        self.visitor.enter_block(block)?;
        self.regions.push(Region::Body);

        let stmts = std::mem::take(&mut block.stmts);
        let mut out = Vec::with_capacity(stmts.len());
        let mut failure = None;
        for mut stmt in stmts {
            if failure.is_some() {
                out.push(stmt);
                continue;
            }
            match self.owned_stmt(&mut stmt) {
                Ok(action) => {
                    out.extend(action.prelude);
                    if !action.remove {
                        out.push(stmt);
                    }
                }
                Err(err) => {
                    out.push(stmt);
                    failure = Some(err);
                }
            }
        }
        block.stmts = out;

        self.regions.pop();
        if let Some(err) = failure {
            return Err(err);
        }
        self.visitor.exit_block(block)
    }

    fn owned_stmt(&mut self, stmt: &mut Stmt) -> Result<StmtAction, V::Error> {
        match self.visitor.enter_stmt(stmt)? {
            Enter::Remove => {
                return Ok(StmtAction {
                    prelude: Vec::new(),
                    remove: true,
                })
            }
            Enter::Skip => return Ok(StmtAction::default()),
            Enter::Walk => {}
        }
        self.stmt(stmt, true)?;
        self.visitor.exit_stmt(stmt)
    }

    fn stmt(&mut self, stmt: &mut Stmt, owned: bool) -> Result<(), V::Error> {
        let id = stmt.id;
        match &mut stmt.kind {
            StmtKind::Expr(expr) => {
                let slot = if owned { Slot::ExprStmt } else { Slot::Single };
                self.single(expr, slot)
            }
            StmtKind::Assign { lhs, rhs, .. } => {
                for target in lhs.iter_mut() {
                    self.single(target, Slot::Single)?;
                }
                let slot = Slot::List {
                    list: id,
                    kind: ListKind::AssignRhs,
                };
                self.list(rhs, slot)
            }
            StmtKind::IncDec { x, .. } => self.single(x, Slot::Single),
            StmtKind::Decl(decl) => match decl {
                Decl::Var(specs) | Decl::Const(specs) => self.value_specs(specs),
                Decl::Type(_) | Decl::Func(_) => Ok(()),
            },
            StmtKind::Return(results) => {
                let slot = Slot::List {
                    list: id,
                    kind: ListKind::ReturnResults,
                };
                self.list(results, slot)
            }
            StmtKind::If(if_stmt) => self.if_stmt(if_stmt),
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => {
                if let Some(init) = init {
                    self.stmt(init, false)?;
                }
                self.in_region(Region::LoopHeader, |w| {
                    if let Some(cond) = cond {
                        w.single(cond, Slot::Single)?;
                    }
                    if let Some(post) = post {
                        w.stmt(post, false)?;
                    }
                    Ok(())
                })?;
                self.block(body)
            }
            StmtKind::Range {
                key,
                value,
                x,
                body,
                ..
            } => {
                if let Some(key) = key {
                    self.single(key, Slot::Single)?;
                }
                if let Some(value) = value {
                    self.single(value, Slot::Single)?;
                }
                self.single(x, Slot::Single)?;
                self.block(body)
            }
            StmtKind::Switch { init, tag, clauses } => {
                if let Some(init) = init {
                    self.stmt(init, false)?;
                }
                if let Some(tag) = tag {
                    self.single(tag, Slot::Single)?;
                }
                // Only the first case value is certain to be evaluated.
                let mut first = true;
                for clause in clauses {
                    for value in clause.values.iter_mut().flatten() {
                        if first {
                            first = false;
                            self.single(value, Slot::Single)?;
                        } else {
                            self.in_region(Region::LaterCase, |w| w.single(value, Slot::Single))?;
                        }
                    }
                    self.block(&mut clause.body)?;
                }
                Ok(())
            }
            StmtKind::Block(block) => self.block(block),
            StmtKind::Go(expr) | StmtKind::Defer(expr) => {
                self.in_region(Region::Deferred, |w| w.single(expr, Slot::Single))
            }
            StmtKind::Branch(_) => Ok(()),
        }
    }

    fn if_stmt(&mut self, if_stmt: &mut IfStmt) -> Result<(), V::Error> {
        if let Some(init) = &mut if_stmt.init {
            self.stmt(init, false)?;
        }
        self.single(&mut if_stmt.cond, Slot::Single)?;
        self.block(&mut if_stmt.then)?;
        match &mut if_stmt.els {
            Some(els) => self.else_branch(els),
            None => Ok(()),
        }
    }

    /// `else { ... }` or an `else if` link, whose header only runs on fallthrough.
    fn else_branch(&mut self, els: &mut Stmt) -> Result<(), V::Error> {
        match &mut els.kind {
            StmtKind::If(else_if) => {
                self.in_region(Region::ElseIfHeader, |w| {
                    if let Some(init) = &mut else_if.init {
                        w.stmt(init, false)?;
                    }
                    w.single(&mut else_if.cond, Slot::Single)
                })?;
                self.block(&mut else_if.then)?;
                match &mut else_if.els {
                    Some(rest) => self.else_branch(rest),
                    None => Ok(()),
                }
            }
            _ => self.stmt(els, false),
        }
    }

    fn list(&mut self, list: &mut Vec<Expr>, slot: Slot) -> Result<(), V::Error> {
        let items = std::mem::take(list);
        let mut out = Vec::with_capacity(items.len());
        let mut failure = None;
        for mut item in items {
            if failure.is_some() {
                out.push(item);
                continue;
            }
            match self.expr(&mut item, slot) {
                Ok(Some(values)) => out.extend(values),
                Ok(None) => out.push(item),
                Err(err) => {
                    out.push(item);
                    failure = Some(err);
                }
            }
        }
        *list = out;
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn single(&mut self, expr: &mut Expr, slot: Slot) -> Result<(), V::Error> {
        if let Some(mut values) = self.expr(expr, slot)? {
            if values.len() == 1 {
                *expr = values.remove(0);
            }
        }
        Ok(())
    }

    fn boxed(&mut self, expr: &mut Box<Expr>) -> Result<(), V::Error> {
        self.single(expr, Slot::Single)
    }

    /// Walks `expr` and applies the visitor's decision. A splice is handed
    /// back to the caller, which owns the enclosing list.
    fn expr(&mut self, expr: &mut Expr, slot: Slot) -> Result<Option<Vec<Expr>>, V::Error> {
        let id = expr.id;
        match &mut expr.kind {
            ExprKind::Ident(_) | ExprKind::Lit(..) | ExprKind::Type(_) | ExprKind::Bad => {}
            ExprKind::Composite { elts, .. } => {
                for elt in elts.iter_mut() {
                    self.single(elt, Slot::Single)?;
                }
            }
            ExprKind::FuncLit(lit) => {
                self.visitor.enter_func(&lit.sig)?;
                // A closure body is evaluated when called, never in the
                // enclosing header.
                self.in_region(Region::Body, |w| w.block(&mut lit.body))?;
                self.visitor.exit_func()?;
            }
            ExprKind::Paren(x) | ExprKind::Selector { x, .. } | ExprKind::TypeAssert { x, .. } => {
                self.boxed(x)?;
            }
            ExprKind::Index { x, index } => {
                self.boxed(x)?;
                self.boxed(index)?;
            }
            ExprKind::Slice { x, lo, hi, max } => {
                self.boxed(x)?;
                for bound in [lo, hi, max].into_iter().flatten() {
                    self.boxed(bound)?;
                }
            }
            ExprKind::Call { fun, args, .. } => {
                self.boxed(fun)?;
                let slot = Slot::List {
                    list: id,
                    kind: ListKind::CallArgs,
                };
                self.list(args, slot)?;
            }
            ExprKind::Unary { x, .. } => self.boxed(x)?,
            ExprKind::Binary { x, y, .. } => {
                self.boxed(x)?;
                self.boxed(y)?;
            }
            ExprKind::KeyValue { key, value } => {
                self.boxed(key)?;
                self.boxed(value)?;
            }
        }

        let ctx = ExprContext {
            slot,
            region: self.region(),
        };
        match self.visitor.exit_expr(expr, ctx)? {
            ExprAction::Keep => Ok(None),
            ExprAction::Replace(new) => {
                *expr = new;
                Ok(None)
            }
            ExprAction::Splice(values) => Ok(Some(values)),
        }
    }
}

// ============================================================================
// TREE UTILITIES
// ============================================================================

/// Renames every identifier expression called `from`. Selector names are
/// left alone.
pub fn rename_ident(block: &mut Block, from: &str, to: &str) {
    struct Rename<'a> {
        from: &'a str,
        to: &'a str,
    }

    impl VisitMut for Rename<'_> {
        type Error = std::convert::Infallible;

        fn exit_expr(&mut self, expr: &mut Expr, _ctx: ExprContext) -> Result<ExprAction, Self::Error> {
            if let ExprKind::Ident(name) = &mut expr.kind {
                if name == self.from {
                    *name = self.to.to_string();
                }
            }
            Ok(ExprAction::Keep)
        }
    }

    let mut rename = Rename { from, to };
    if let Err(never) = walk_block(&mut rename, block) {
        match never {}
    }
}

/// Gives every node in `block` a fresh id, so that a copied subtree never
/// shares identity with its original.
pub fn renumber_block(block: &mut Block, ids: &mut NodeIds) {
    Renumber { ids }.block(block);
}

pub fn renumber_type(ty: &mut TypeExpr, ids: &mut NodeIds) {
    Renumber { ids }.type_expr(ty);
}

struct Renumber<'a> {
    ids: &'a mut NodeIds,
}

impl Renumber<'_> {
    fn block(&mut self, block: &mut Block) {
        block.id = self.ids.fresh();
        for stmt in &mut block.stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &mut Stmt) {
        stmt.id = self.ids.fresh();
        match &mut stmt.kind {
            StmtKind::Expr(x) | StmtKind::Go(x) | StmtKind::Defer(x) => self.expr(x),
            StmtKind::IncDec { x, .. } => self.expr(x),
            StmtKind::Assign { lhs, rhs, .. } => {
                lhs.iter_mut().chain(rhs.iter_mut()).for_each(|x| self.expr(x));
            }
            StmtKind::Decl(decl) => self.decl(decl),
            StmtKind::Return(results) => results.iter_mut().for_each(|x| self.expr(x)),
            StmtKind::If(if_stmt) => {
                if let Some(init) = &mut if_stmt.init {
                    self.stmt(init);
                }
                self.expr(&mut if_stmt.cond);
                self.block(&mut if_stmt.then);
                if let Some(els) = &mut if_stmt.els {
                    self.stmt(els);
                }
            }
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => {
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(cond) = cond {
                    self.expr(cond);
                }
                if let Some(post) = post {
                    self.stmt(post);
                }
                self.block(body);
            }
            StmtKind::Range {
                key,
                value,
                x,
                body,
                ..
            } => {
                for target in [key, value].into_iter().flatten() {
                    self.expr(target);
                }
                self.expr(x);
                self.block(body);
            }
            StmtKind::Switch { init, tag, clauses } => {
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(tag) = tag {
                    self.expr(tag);
                }
                for clause in clauses {
                    clause.id = self.ids.fresh();
                    for value in clause.values.iter_mut().flatten() {
                        self.expr(value);
                    }
                    self.block(&mut clause.body);
                }
            }
            StmtKind::Block(block) => self.block(block),
            StmtKind::Branch(_) => {}
        }
    }

    fn decl(&mut self, decl: &mut Decl) {
        match decl {
            Decl::Var(specs) | Decl::Const(specs) => {
                for spec in specs {
                    spec.id = self.ids.fresh();
                    spec.names.iter_mut().for_each(|n| n.id = self.ids.fresh());
                    if let Some(ty) = &mut spec.ty {
                        self.type_expr(ty);
                    }
                    spec.values.iter_mut().for_each(|x| self.expr(x));
                }
            }
            Decl::Type(specs) => {
                for spec in specs {
                    spec.id = self.ids.fresh();
                    spec.name.id = self.ids.fresh();
                    self.type_expr(&mut spec.ty);
                }
            }
            Decl::Func(func) => {
                func.id = self.ids.fresh();
                self.signature(&mut func.sig);
                if let Some(body) = &mut func.body {
                    self.block(body);
                }
            }
        }
    }

    fn signature(&mut self, sig: &mut Signature) {
        for field in sig.params.iter_mut().chain(sig.results.iter_mut()) {
            self.field(field);
        }
    }

    fn field(&mut self, field: &mut Field) {
        field.id = self.ids.fresh();
        field.names.iter_mut().for_each(|n| n.id = self.ids.fresh());
        self.type_expr(&mut field.ty);
    }

    fn type_expr(&mut self, ty: &mut TypeExpr) {
        ty.id = self.ids.fresh();
        match &mut ty.kind {
            TypeKind::Name { .. } => {}
            TypeKind::Pointer(elem) | TypeKind::Slice(elem) => self.type_expr(elem),
            TypeKind::Array { len, elem } => {
                if let Some(len) = len {
                    self.expr(len);
                }
                self.type_expr(elem);
            }
            TypeKind::Map { key, value } => {
                self.type_expr(key);
                self.type_expr(value);
            }
            TypeKind::Func(sig) => self.signature(sig),
            TypeKind::Struct(fields) | TypeKind::Interface(fields) => {
                fields.iter_mut().for_each(|f| self.field(f));
            }
        }
    }

    fn expr(&mut self, expr: &mut Expr) {
        expr.id = self.ids.fresh();
        match &mut expr.kind {
            ExprKind::Ident(_) | ExprKind::Lit(..) | ExprKind::Bad => {}
            ExprKind::Type(ty) => self.type_expr(ty),
            ExprKind::Composite { ty, elts } => {
                if let Some(ty) = ty {
                    self.type_expr(ty);
                }
                elts.iter_mut().for_each(|x| self.expr(x));
            }
            ExprKind::FuncLit(lit) => {
                self.signature(&mut lit.sig);
                self.block(&mut lit.body);
            }
            ExprKind::Paren(x) | ExprKind::Unary { x, .. } => self.expr(x),
            ExprKind::Selector { x, sel } => {
                self.expr(x);
                sel.id = self.ids.fresh();
            }
            ExprKind::TypeAssert { x, ty } => {
                self.expr(x);
                self.type_expr(ty);
            }
            ExprKind::Index { x, index } => {
                self.expr(x);
                self.expr(index);
            }
            ExprKind::Slice { x, lo, hi, max } => {
                self.expr(x);
                for bound in [lo, hi, max].into_iter().flatten() {
                    self.expr(bound);
                }
            }
            ExprKind::Call { fun, args, .. } => {
                self.expr(fun);
                args.iter_mut().for_each(|x| self.expr(x));
            }
            ExprKind::Binary { x, y, .. } => {
                self.expr(x);
                self.expr(y);
            }
            ExprKind::KeyValue { key, value } => {
                self.expr(key);
                self.expr(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(ids: &mut NodeIds, fun: &str, args: Vec<Expr>) -> Expr {
        Expr::call(ids, fun, args)
    }

    struct SpliceTwins;

    impl VisitMut for SpliceTwins {
        type Error = ();

        fn exit_expr(&mut self, expr: &mut Expr, ctx: ExprContext) -> Result<ExprAction, ()> {
            match (&expr.kind, ctx.slot) {
                (ExprKind::Ident(name), Slot::List { .. }) if name == "pair" => {
                    let mut ids = NodeIds::new();
                    Ok(ExprAction::Splice(vec![
                        Expr::ident(&mut ids, "a"),
                        Expr::ident(&mut ids, "b"),
                    ]))
                }
                _ => Ok(ExprAction::Keep),
            }
        }

        fn exit_stmt(&mut self, stmt: &mut Stmt) -> Result<StmtAction, ()> {
            let mut ids = NodeIds::new();
            let before = Expr::ident(&mut ids, "before");
            let marker = Stmt::new(&mut ids, StmtKind::Expr(before));
            Ok(StmtAction {
                prelude: vec![marker],
                remove: matches!(&stmt.kind, StmtKind::Branch(_)),
            })
        }
    }

    #[test]
    fn splices_into_argument_lists_and_inserts_preludes() {
        let mut ids = NodeIds::new();
        let pair = Expr::ident(&mut ids, "pair");
        let f = call(&mut ids, "f", vec![pair]);
        let stmt = Stmt::new(&mut ids, StmtKind::Expr(f));
        let brk = Stmt::new(&mut ids, StmtKind::Branch(BranchKind::Break));
        let mut block = Block::new(&mut ids, vec![stmt, brk]);

        walk_block(&mut SpliceTwins, &mut block).unwrap();

        assert_eq!(block.stmts.len(), 3);
        let StmtKind::Expr(call) = &block.stmts[1].kind else { panic!() };
        assert_eq!(call.call_args_of("f").unwrap().len(), 2);
    }

    #[test]
    fn rename_skips_selectors() {
        let mut ids = NodeIds::new();
        let x = Expr::ident(&mut ids, "err");
        let sel = Ident::synthetic(&mut ids, "err");
        let selector = Expr::new(
            &mut ids,
            ExprKind::Selector {
                x: Box::new(x),
                sel,
            },
        );
        let stmt = Stmt::new(&mut ids, StmtKind::Expr(selector));
        let mut block = Block::new(&mut ids, vec![stmt]);

        rename_ident(&mut block, "err", "e2");

        assert_eq!(crate::syntax::printer::print_stmt(&block.stmts[0]), "e2.err");
    }

    #[test]
    fn renumbering_changes_every_id() {
        let mut ids = NodeIds::new();
        let g = call(&mut ids, "g", vec![]);
        let stmt = Stmt::new(&mut ids, StmtKind::Expr(g));
        let mut block = Block::new(&mut ids, vec![stmt]);
        let before = block.clone();

        renumber_block(&mut block, &mut ids);

        assert_ne!(block.id, before.id);
        assert_ne!(block.stmts[0].id, before.stmts[0].id);
    }
}
