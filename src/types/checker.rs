//! Type checker for the host dialect.
//!
//! The checker is tolerant: anything it cannot type is simply left out of
//! [`TypeInfo::types`] (with a diagnostic), and checking carries on. That is
//! exactly the signal the fixed-point driver waits on.

use std::collections::HashMap;

use tracing::trace;

use super::convert::{convert_signature, convert_type, universe_type, NameResolver};
use super::model::{
    Basic, FuncType, InterfaceType, Method, NamedInfo, Object, Type, TypeDiagnostic, TypeInfo,
};
use super::stubs::{package_name, StubSet};
use crate::errors::CheckflowError;
use crate::names::CHECK_FUNC;
use crate::syntax::*;
use crate::unit::Unit;

/// Supplies type information for a unit. Called once per fixed-point iteration.
pub trait TypeChecker {
    fn check(&mut self, unit: &Unit) -> TypeInfo;
}

/// The built-in checker, backed by a set of package stubs.
#[derive(Debug, Clone, Default)]
pub struct Checker {
    stubs: StubSet,
}

impl Checker {
    pub fn new(stubs: StubSet) -> Self {
        Self { stubs }
    }

    pub fn with_builtin_stubs() -> Result<Self, CheckflowError> {
        Ok(Self::new(StubSet::builtin()?))
    }
}

impl TypeChecker for Checker {
    fn check(&mut self, unit: &Unit) -> TypeInfo {
        let mut pass = Pass::new(&self.stubs, &unit.package);
        pass.run(unit);
        trace!(
            typed = pass.info.types.len(),
            diagnostics = pass.info.diagnostics.len(),
            "type check done"
        );
        pass.info
    }
}

type Scope = HashMap<String, Object>;

enum Operand {
    Value(Type),
    Type(Type),
    Package(String),
    Builtin(String),
}

struct Pass<'a> {
    stubs: &'a StubSet,
    package: String,
    info: TypeInfo,
    universe: Scope,
    package_scope: Scope,
    /// Imports of the file being checked.
    file_scope: Scope,
    locals: Vec<Scope>,
    file_name: String,
}

const BUILTINS: &[&str] = &[
    "append", "cap", "clear", "close", "complex", "copy", "delete", "imag", "len", "make", "max",
    "min", "new", "panic", "print", "println", "real", "recover",
];

const TYPE_NAMES: &[&str] = &[
    "bool", "string", "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16",
    "uint32", "uint64", "uintptr", "float32", "float64", "complex64", "complex128", "byte",
    "rune", "error", "any",
];

impl<'a> Pass<'a> {
    fn new(stubs: &'a StubSet, package: &str) -> Self {
        let mut universe = Scope::new();
        for name in TYPE_NAMES {
            if let Some(ty) = universe_type(name) {
                universe.insert(name.to_string(), Object::TypeName { ty });
            }
        }
        for name in BUILTINS {
            universe.insert(
                name.to_string(),
                Object::Builtin {
                    name: name.to_string(),
                },
            );
        }
        let untyped_bool = Type::Basic(Basic::UntypedBool);
        universe.insert("true".into(), Object::Const { ty: untyped_bool.clone() });
        universe.insert("false".into(), Object::Const { ty: untyped_bool });
        universe.insert(
            "iota".into(),
            Object::Const {
                ty: Type::Basic(Basic::UntypedInt),
            },
        );
        universe.insert("nil".into(), Object::Nil);

        let mut info = TypeInfo::default();
        info.named.extend(stubs.named.clone());
        info.named.insert(
            "error".into(),
            NamedInfo {
                underlying: Some(error_interface()),
                methods: Default::default(),
            },
        );

        Self {
            stubs,
            package: package.to_string(),
            info,
            universe,
            package_scope: Scope::new(),
            file_scope: Scope::new(),
            locals: Vec::new(),
            file_name: String::new(),
        }
    }

    fn run(&mut self, unit: &Unit) {
        for file in &unit.files {
            self.enter_file(file);
            self.declare_types(&file.ast);
        }
        for file in &unit.files {
            self.enter_file(file);
            self.resolve_types(&file.ast);
        }
        for file in &unit.files {
            self.enter_file(file);
            self.declare_funcs(&file.ast);
        }
        // Package variables may refer to each other in any order.
        for _ in 0..2 {
            for file in &unit.files {
                self.enter_file(file);
                self.declare_values(&file.ast);
            }
        }
        for file in &unit.files {
            self.enter_file(file);
            self.check_bodies(&file.ast);
        }
    }

    fn enter_file(&mut self, file: &crate::unit::SourceFile) {
        self.file_name = file.name().to_string();
        self.file_scope.clear();
        for import in &file.ast.imports {
            let name = match &import.alias {
                Some(alias) => alias.name.clone(),
                None => package_name(&import.path).to_string(),
            };
            self.file_scope.insert(
                name,
                Object::Package {
                    path: import.path.clone(),
                },
            );
        }
    }

    // ------------------------------------------------------------------
    // Package level
    // ------------------------------------------------------------------

    fn declare_types(&mut self, file: &File) {
        for decl in &file.decls {
            if let Decl::Type(specs) = decl {
                for spec in specs {
                    let ty = Type::named(&self.package, &spec.name.name);
                    self.package_scope
                        .insert(spec.name.name.clone(), Object::TypeName { ty });
                }
            }
        }
    }

    fn resolve_types(&mut self, file: &File) {
        for decl in &file.decls {
            if let Decl::Type(specs) = decl {
                for spec in specs {
                    self.type_spec(spec, false);
                }
            }
        }
    }

    fn type_spec(&mut self, spec: &TypeSpec, local: bool) {
        let resolved = self.resolve(&spec.ty);
        if spec.alias {
            if let Some(ty) = resolved {
                self.declare(local, &spec.name.name, Object::TypeName { ty });
            }
            return;
        }
        let named = Type::named(&self.package, &spec.name.name);
        let entry = self.info.named.entry(named.to_string()).or_default();
        entry.underlying = resolved;
        if local {
            self.declare(true, &spec.name.name, Object::TypeName { ty: named });
        }
    }

    fn declare_funcs(&mut self, file: &File) {
        for decl in &file.decls {
            let Decl::Func(func) = decl else { continue };
            let Some(sig) = self.signature(&func.sig) else {
                self.diagnose(func.name.span, format!("cannot resolve signature of {}", func.name.name));
                continue;
            };
            match &func.recv {
                Some(recv) => {
                    if let Some(key) = self.receiver_key(&recv.ty) {
                        self.info
                            .named
                            .entry(key)
                            .or_default()
                            .methods
                            .insert(func.name.name.clone(), sig);
                    }
                }
                None => {
                    self.package_scope
                        .insert(func.name.name.clone(), Object::Func { ty: sig });
                }
            }
        }
    }

    fn receiver_key(&mut self, ty: &TypeExpr) -> Option<String> {
        match &ty.kind {
            TypeKind::Pointer(elem) => self.receiver_key(elem),
            TypeKind::Name { package: None, name } => {
                Some(Type::named(&self.package, name).to_string())
            }
            _ => None,
        }
    }

    fn declare_values(&mut self, file: &File) {
        for decl in &file.decls {
            match decl {
                Decl::Var(specs) => {
                    for spec in specs {
                        self.value_spec(spec, false, false);
                    }
                }
                Decl::Const(specs) => {
                    for spec in specs {
                        self.value_spec(spec, true, false);
                    }
                }
                _ => {}
            }
        }
    }

    fn check_bodies(&mut self, file: &File) {
        for decl in &file.decls {
            let Decl::Func(func) = decl else { continue };
            let Some(body) = &func.body else { continue };
            self.locals.push(Scope::new());
            if let Some(recv) = &func.recv {
                self.params(std::slice::from_ref(recv));
            }
            self.function(&func.sig, body);
            self.locals.pop();
        }
    }

    // ------------------------------------------------------------------
    // Scopes
    // ------------------------------------------------------------------

    fn lookup(&self, name: &str) -> Option<&Object> {
        self.locals
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.file_scope.get(name))
            .or_else(|| self.package_scope.get(name))
            .or_else(|| self.universe.get(name))
    }

    fn declare(&mut self, local: bool, name: &str, object: Object) {
        if name == "_" {
            return;
        }
        match (local, self.locals.last_mut()) {
            (true, Some(scope)) => {
                scope.insert(name.to_string(), object);
            }
            _ => {
                self.package_scope.insert(name.to_string(), object);
            }
        }
    }

    fn diagnose(&mut self, span: Span, message: String) {
        self.info.diagnostics.push(TypeDiagnostic {
            file: self.file_name.clone(),
            span,
            message,
        });
    }

    fn resolve(&mut self, ty: &TypeExpr) -> Option<Type> {
        let resolved = convert_type(ty, self);
        match &resolved {
            Some(t) => {
                self.info.types.insert(ty.id, t.clone());
            }
            None => self.diagnose(ty.span, "undefined type".into()),
        }
        resolved
    }

    fn signature(&mut self, sig: &Signature) -> Option<FuncType> {
        let converted = convert_signature(sig, self);
        // Result types are looked up later to build zero values.
        for result in sig.result_slots() {
            if let Some(t) = convert_type(result, self) {
                self.info.types.insert(result.id, t);
            }
        }
        converted
    }

    // ------------------------------------------------------------------
    // Functions and statements
    // ------------------------------------------------------------------

    fn function(&mut self, sig: &Signature, body: &Block) {
        self.locals.push(Scope::new());
        self.params(&sig.params);
        self.params(&sig.results);
        self.block(body);
        self.locals.pop();
    }

    fn params(&mut self, fields: &[Field]) {
        for field in fields {
            let mut ty = self.resolve(&field.ty);
            if field.variadic {
                ty = ty.map(|t| Type::Slice(Box::new(t)));
            }
            for name in &field.names {
                self.declare(true, &name.name, Object::Var { ty: ty.clone() });
            }
        }
    }

    fn block(&mut self, block: &Block) {
        self.locals.push(Scope::new());
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
        self.locals.pop();
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(x) | StmtKind::Go(x) | StmtKind::Defer(x) => {
                self.expr(x);
            }
            StmtKind::Assign { lhs, op, rhs } => match op {
                AssignOp::Define => {
                    let types = self.values(rhs, lhs.len(), stmt.span);
                    for (target, ty) in lhs.iter().zip(types) {
                        self.define(target, ty);
                    }
                }
                _ => {
                    for target in lhs {
                        if target.as_ident() != Some("_") {
                            self.expr(target);
                        }
                    }
                    for value in rhs {
                        self.expr(value);
                    }
                }
            },
            StmtKind::IncDec { x, .. } => {
                self.expr(x);
            }
            StmtKind::Decl(decl) => match decl {
                Decl::Var(specs) => specs.iter().for_each(|s| self.value_spec(s, false, true)),
                Decl::Const(specs) => specs.iter().for_each(|s| self.value_spec(s, true, true)),
                Decl::Type(specs) => specs.iter().for_each(|s| self.type_spec(s, true)),
                Decl::Func(_) => {}
            },
            StmtKind::Return(results) => {
                for result in results {
                    self.expr(result);
                }
            }
            StmtKind::If(if_stmt) => {
                self.locals.push(Scope::new());
                if let Some(init) = &if_stmt.init {
                    self.stmt(init);
                }
                self.expr(&if_stmt.cond);
                self.block(&if_stmt.then);
                if let Some(els) = &if_stmt.els {
                    self.stmt(els);
                }
                self.locals.pop();
            }
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => {
                self.locals.push(Scope::new());
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
                self.locals.pop();
            }
            StmtKind::Range {
                key,
                value,
                define,
                x,
                body,
            } => {
                let (key_ty, value_ty) = match self.expr(x) {
                    Some(t) => self.range_types(&t),
                    None => (None, None),
                };
                self.locals.push(Scope::new());
                for (target, ty) in [(key, key_ty), (value, value_ty)] {
                    let Some(target) = target else { continue };
                    if *define {
                        self.define(target, ty);
                    } else if target.as_ident() != Some("_") {
                        self.expr(target);
                    }
                }
                self.block(body);
                self.locals.pop();
            }
            StmtKind::Switch { init, tag, clauses } => {
                self.locals.push(Scope::new());
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(tag) = tag {
                    self.expr(tag);
                }
                for clause in clauses {
                    for value in clause.values.iter().flatten() {
                        self.expr(value);
                    }
                    self.block(&clause.body);
                }
                self.locals.pop();
            }
            StmtKind::Block(block) => self.block(block),
            StmtKind::Branch(_) => {}
        }
    }

    /// Types of `count` values produced by `rhs`. A count mismatch leaves
    /// every value untyped.
    fn values(&mut self, rhs: &[Expr], count: usize, span: Span) -> Vec<Option<Type>> {
        if rhs.len() == 1 && count > 1 {
            let value = &rhs[0];
            let ty = self.expr(value);
            if count == 2 && self.is_comma_ok(value) {
                return vec![ty.map(Type::defaulted), Some(Type::Basic(Basic::Bool))];
            }
            return match ty {
                Some(Type::Tuple(items)) if items.len() == count => {
                    items.into_iter().map(Some).collect()
                }
                Some(other) => {
                    let found = match &other {
                        Type::Tuple(items) => items.len(),
                        _ => 1,
                    };
                    self.diagnose(
                        span,
                        format!("assignment mismatch: {} variables but {} values", count, found),
                    );
                    vec![None; count]
                }
                None => vec![None; count],
            };
        }

        let types: Vec<Option<Type>> = rhs.iter().map(|value| self.expr(value)).collect();
        if types.len() != count {
            self.diagnose(
                span,
                format!("assignment mismatch: {} variables but {} values", count, types.len()),
            );
            return vec![None; count];
        }
        types
            .into_iter()
            .map(|ty| match ty {
                Some(Type::Tuple(_)) => {
                    self.diagnose(span, "multiple-value in single-value context".into());
                    None
                }
                other => other.map(Type::defaulted),
            })
            .collect()
    }

    fn is_comma_ok(&self, value: &Expr) -> bool {
        match &value.kind {
            ExprKind::TypeAssert { .. } => true,
            ExprKind::Index { x, .. } => matches!(
                self.info.type_of(x.id).and_then(|t| self.info.underlying(t)),
                Some(Type::Map(..))
            ),
            ExprKind::Paren(inner) => self.is_comma_ok(inner),
            _ => false,
        }
    }

    /// `x := ...` target: declares a new variable unless it already exists in
    /// the innermost scope.
    fn define(&mut self, target: &Expr, ty: Option<Type>) {
        let Some(name) = target.as_ident() else {
            self.expr(target);
            return;
        };
        if name == "_" {
            return;
        }
        if let Some(t) = &ty {
            self.info.types.insert(target.id, t.clone());
        }
        let redeclared = self
            .locals
            .last()
            .map_or(false, |scope| scope.contains_key(name));
        if redeclared {
            if let Some(object) = self.lookup(name).cloned() {
                self.info.uses.insert(target.id, object);
            }
            return;
        }
        let object = Object::Var { ty };
        self.info.uses.insert(target.id, object.clone());
        self.declare(true, name, object);
    }

    fn value_spec(&mut self, spec: &ValueSpec, constant: bool, local: bool) {
        let declared = spec.ty.as_ref().and_then(|ty| self.resolve(ty));
        let types = if spec.values.is_empty() {
            vec![None; spec.names.len()]
        } else {
            self.values(&spec.values, spec.names.len(), spec.span)
        };
        for (name, ty) in spec.names.iter().zip(types) {
            let ty = declared.clone().or(ty);
            let object = match (constant, ty) {
                (true, Some(ty)) => Object::Const { ty },
                (_, ty) => Object::Var {
                    ty: ty.map(Type::defaulted),
                },
            };
            self.declare(local, &name.name, object);
        }
    }

    fn range_types(&self, ty: &Type) -> (Option<Type>, Option<Type>) {
        let int = Some(Type::Basic(Basic::Int));
        let Some(under) = self.info.underlying(ty) else {
            return (None, None);
        };
        match under {
            Type::Slice(elem) | Type::Array(_, elem) => (int, Some((**elem).clone())),
            Type::Pointer(inner) => match self.info.underlying(inner) {
                Some(Type::Array(_, elem)) => (int, Some((**elem).clone())),
                _ => (None, None),
            },
            Type::Map(key, value) => (Some((**key).clone()), Some((**value).clone())),
            Type::Basic(b) if b.is_string() => (int, Some(Type::Basic(Basic::Int32))),
            Type::Basic(_) => (int, None),
            _ => (None, None),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Type of a value expression, recorded under its node id.
    fn expr(&mut self, expr: &Expr) -> Option<Type> {
        self.expr_with(expr, None)
    }

    fn expr_with(&mut self, expr: &Expr, hint: Option<&Type>) -> Option<Type> {
        match self.operand(expr, hint)? {
            Operand::Value(t) => Some(t),
            _ => None,
        }
    }

    fn operand(&mut self, expr: &Expr, hint: Option<&Type>) -> Option<Operand> {
        let operand = self.operand_inner(expr, hint);
        match &operand {
            Some(Operand::Value(t)) | Some(Operand::Type(t)) => {
                self.info.types.insert(expr.id, t.clone());
            }
            _ => {}
        }
        operand
    }

    fn operand_inner(&mut self, expr: &Expr, hint: Option<&Type>) -> Option<Operand> {
        match &expr.kind {
            ExprKind::Ident(name) => self.ident(expr, name),
            ExprKind::Lit(kind, _) => Some(Operand::Value(Type::Basic(match kind {
                LitKind::Int => Basic::UntypedInt,
                LitKind::Float => Basic::UntypedFloat,
                LitKind::Imag => Basic::UntypedComplex,
                LitKind::Char => Basic::UntypedRune,
                LitKind::String => Basic::UntypedString,
            }))),
            ExprKind::Composite { ty, elts } => {
                let declared = match ty {
                    Some(ty) => self.resolve(ty),
                    None => hint.cloned(),
                };
                // `[]*T{{...}}` elides `&T`.
                let (ty, addr) = match declared {
                    Some(Type::Pointer(inner)) if ty.is_none() => (Some(*inner), true),
                    other => (other, false),
                };
                self.elements(ty.as_ref(), elts);
                let ty = ty?;
                Some(Operand::Value(if addr {
                    Type::Pointer(Box::new(ty))
                } else {
                    ty
                }))
            }
            ExprKind::FuncLit(lit) => {
                let sig = self.signature(&lit.sig);
                self.function(&lit.sig, &lit.body);
                Some(Operand::Value(Type::Func(sig?)))
            }
            ExprKind::Paren(inner) => self.operand(inner, hint),
            ExprKind::Selector { x, sel } => self.selector(x, sel),
            ExprKind::Index { x, index } => {
                let base = self.expr(x);
                self.expr(index);
                let base = base?;
                let under = self.deref_array(&base)?;
                Some(Operand::Value(match under {
                    Type::Slice(elem) | Type::Array(_, elem) => *elem,
                    Type::Map(_, value) => *value,
                    Type::Basic(b) if b.is_string() => Type::Basic(Basic::Uint8),
                    _ => return None,
                }))
            }
            ExprKind::Slice { x, lo, hi, max } => {
                let base = self.expr(x);
                for bound in [lo, hi, max].into_iter().flatten() {
                    self.expr(bound);
                }
                let base = base?;
                let under = self.deref_array(&base)?;
                Some(Operand::Value(match under {
                    Type::Array(_, elem) => Type::Slice(elem),
                    Type::Slice(_) | Type::Basic(_) => base,
                    _ => return None,
                }))
            }
            ExprKind::TypeAssert { x, ty } => {
                self.expr(x);
                Some(Operand::Value(self.resolve(ty)?))
            }
            ExprKind::Call { fun, args, .. } => self.call(fun, args),
            ExprKind::Unary { op, x } => {
                let inner = self.operand(x, hint)?;
                match (op, inner) {
                    (UnaryOp::Deref, Operand::Type(t)) => {
                        Some(Operand::Type(Type::Pointer(Box::new(t))))
                    }
                    (UnaryOp::Deref, Operand::Value(t)) => match self.info.underlying(&t) {
                        Some(Type::Pointer(elem)) => Some(Operand::Value((**elem).clone())),
                        _ => None,
                    },
                    (UnaryOp::Addr, Operand::Value(t)) => {
                        Some(Operand::Value(Type::Pointer(Box::new(t))))
                    }
                    (_, Operand::Value(t)) => Some(Operand::Value(t)),
                    _ => None,
                }
            }
            ExprKind::Binary { op, x, y } => {
                let left = self.expr(x);
                let right = self.expr(y);
                if op.is_comparison() {
                    return Some(Operand::Value(Type::Basic(Basic::UntypedBool)));
                }
                match op {
                    BinaryOp::Shl | BinaryOp::Shr => left.map(Operand::Value),
                    _ => Some(Operand::Value(left?.unify(right?))),
                }
            }
            ExprKind::KeyValue { key, value } => {
                self.expr(key);
                self.expr(value);
                None
            }
            ExprKind::Type(ty) => self.resolve(ty).map(Operand::Type),
            ExprKind::Bad => None,
        }
    }

    fn ident(&mut self, expr: &Expr, name: &str) -> Option<Operand> {
        if name == "_" {
            return None;
        }
        let Some(object) = self.lookup(name).cloned() else {
            self.diagnose(expr.span, format!("undefined: {}", name));
            return None;
        };
        self.info.uses.insert(expr.id, object.clone());
        match object {
            Object::Var { ty } => ty.map(Operand::Value),
            Object::Const { ty } => Some(Operand::Value(ty)),
            Object::Func { ty } => Some(Operand::Value(Type::Func(ty))),
            Object::TypeName { ty } => Some(Operand::Type(ty)),
            Object::Package { path } => Some(Operand::Package(path)),
            Object::Builtin { name } => Some(Operand::Builtin(name)),
            Object::Nil => Some(Operand::Value(Type::Basic(Basic::UntypedNil))),
        }
    }

    fn elements(&mut self, ty: Option<&Type>, elts: &[Expr]) {
        let under = ty.and_then(|t| self.info.underlying(t)).cloned();
        for (i, elt) in elts.iter().enumerate() {
            let (key, value) = match &elt.kind {
                ExprKind::KeyValue { key, value } => (Some(&**key), &**value),
                _ => (None, elt),
            };
            match &under {
                Some(Type::Struct(fields)) => {
                    let field = match key.and_then(Expr::as_ident) {
                        Some(name) => fields.iter().find(|f| f.name == name),
                        None => fields.get(i),
                    };
                    self.expr_with(value, field.map(|f| &f.ty));
                }
                Some(Type::Slice(elem)) | Some(Type::Array(_, elem)) => {
                    if let Some(key) = key {
                        self.expr(key);
                    }
                    self.expr_with(value, Some(elem));
                }
                Some(Type::Map(key_ty, value_ty)) => {
                    if let Some(key) = key {
                        self.expr_with(key, Some(key_ty));
                    }
                    self.expr_with(value, Some(value_ty));
                }
                _ => {
                    if let Some(key) = key {
                        if key.as_ident().is_none() {
                            self.expr(key);
                        }
                    }
                    self.expr(value);
                }
            }
        }
    }

    fn selector(&mut self, x: &Expr, sel: &Ident) -> Option<Operand> {
        match self.operand(x, None) {
            Some(Operand::Package(path)) => {
                let member = self
                    .stubs
                    .package(&path)
                    .and_then(|p| p.members.get(&sel.name))
                    .cloned();
                match member {
                    Some(Object::Func { ty }) => Some(Operand::Value(Type::Func(ty))),
                    Some(Object::Var { ty }) => ty.map(Operand::Value),
                    Some(Object::Const { ty }) => Some(Operand::Value(ty)),
                    Some(Object::TypeName { ty }) => Some(Operand::Type(ty)),
                    _ => {
                        self.diagnose(sel.span, format!("undefined: {}.{}", path, sel.name));
                        None
                    }
                }
            }
            Some(Operand::Value(t)) => {
                let member = self.member(&t, &sel.name, 0);
                if member.is_none() {
                    self.diagnose(sel.span, format!("{} has no field or method {}", t, sel.name));
                }
                member.map(Operand::Value)
            }
            Some(Operand::Type(t)) => {
                // Method expression: the receiver becomes the first parameter.
                match self.member(&t, &sel.name, 0) {
                    Some(Type::Func(mut sig)) => {
                        sig.params.insert(0, t);
                        Some(Operand::Value(Type::Func(sig)))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Field or method `name` of a value of type `ty`.
    fn member(&self, ty: &Type, name: &str, depth: usize) -> Option<Type> {
        if depth > 4 {
            return None;
        }
        let base = match ty {
            Type::Pointer(inner) => inner.as_ref(),
            other => other,
        };
        if let Some(key) = base.named_key() {
            if let Some(sig) = self.info.named.get(&key).and_then(|n| n.methods.get(name)) {
                return Some(Type::Func(sig.clone()));
            }
        }
        match self.info.underlying(base)? {
            Type::Struct(fields) => {
                if let Some(field) = fields.iter().find(|f| f.name == name) {
                    return Some(field.ty.clone());
                }
                fields
                    .iter()
                    .filter(|f| f.embedded)
                    .find_map(|f| self.member(&f.ty, name, depth + 1))
            }
            Type::Interface(iface) => {
                if let Some(method) = iface.methods.iter().find(|m| m.name == name) {
                    return Some(Type::Func(method.sig.clone()));
                }
                iface
                    .embeds
                    .iter()
                    .find_map(|e| self.member(e, name, depth + 1))
            }
            _ => None,
        }
    }

    fn call(&mut self, fun: &Expr, args: &[Expr]) -> Option<Operand> {
        if fun.as_ident() == Some(CHECK_FUNC) {
            let mut checked = None;
            for arg in args {
                checked = self.expr(arg);
            }
            return match args.len() {
                1 => checked.map(Operand::Value),
                _ => None,
            };
        }

        let callee = self.operand(fun, None);
        match callee {
            Some(Operand::Type(t)) => {
                for arg in args {
                    self.expr(arg);
                }
                Some(Operand::Value(t))
            }
            Some(Operand::Builtin(name)) => self.builtin(&name, args),
            Some(Operand::Value(t)) => {
                let sig = match self.info.underlying(&t) {
                    Some(Type::Func(sig)) => Some(sig.clone()),
                    _ => None,
                };
                for (i, arg) in args.iter().enumerate() {
                    let hint = sig.as_ref().and_then(|s| s.params.get(i)).cloned();
                    self.expr_with(arg, hint.as_ref());
                }
                match sig {
                    Some(sig) => Some(Operand::Value(sig.call_result())),
                    None => {
                        self.diagnose(fun.span, format!("cannot call non-function of type {}", t));
                        None
                    }
                }
            }
            _ => {
                for arg in args {
                    self.expr(arg);
                }
                None
            }
        }
    }

    fn builtin(&mut self, name: &str, args: &[Expr]) -> Option<Operand> {
        let no_value = || Some(Operand::Value(Type::Tuple(Vec::new())));
        match name {
            "make" | "new" => {
                let ty = match args.first().map(|a| self.operand(a, None)) {
                    Some(Some(Operand::Type(t))) => Some(t),
                    _ => None,
                };
                for arg in args.iter().skip(1) {
                    self.expr(arg);
                }
                let ty = ty?;
                Some(Operand::Value(if name == "new" {
                    Type::Pointer(Box::new(ty))
                } else {
                    ty
                }))
            }
            _ => {
                let types: Vec<Option<Type>> = args.iter().map(|a| self.expr(a)).collect();
                let first = types.into_iter().next().flatten();
                match name {
                    "len" | "cap" | "copy" => Some(Operand::Value(Type::Basic(Basic::Int))),
                    "append" | "min" | "max" => first.map(Operand::Value),
                    "real" | "imag" => Some(Operand::Value(Type::Basic(Basic::Float64))),
                    "complex" => Some(Operand::Value(Type::Basic(Basic::Complex128))),
                    "recover" => Some(Operand::Value(Type::Interface(Default::default()))),
                    _ => no_value(),
                }
            }
        }
    }

    /// Underlying type, looking through a pointer to an array.
    fn deref_array(&self, ty: &Type) -> Option<Type> {
        let under = self.info.underlying(ty)?;
        if let Type::Pointer(inner) = under {
            if let Some(Type::Array(n, elem)) = self.info.underlying(inner) {
                return Some(Type::Array(*n, elem.clone()));
            }
        }
        Some(under.clone())
    }
}

impl NameResolver for Pass<'_> {
    fn resolve_name(&mut self, package: Option<&str>, name: &str) -> Option<Type> {
        match package {
            Some(package) => match self.lookup(package) {
                Some(Object::Package { path }) => {
                    match self.stubs.package(path)?.members.get(name)? {
                        Object::TypeName { ty } => Some(ty.clone()),
                        _ => None,
                    }
                }
                _ => None,
            },
            None => match self.lookup(name)? {
                Object::TypeName { ty } => Some(ty.clone()),
                _ => None,
            },
        }
    }
}

fn error_interface() -> Type {
    Type::Interface(InterfaceType {
        methods: vec![Method {
            name: "Error".into(),
            sig: FuncType {
                params: Vec::new(),
                results: vec![Type::Basic(Basic::String)],
                variadic: false,
            },
        }],
        embeds: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::Unit;

    fn check(src: &str) -> (Unit, TypeInfo) {
        let unit = Unit::from_source("test.go2", src).unwrap();
        let info = Checker::with_builtin_stubs().unwrap().check(&unit);
        (unit, info)
    }

    /// Types recorded for every `_go2check(...)` call, in walk order.
    fn check_call_types(unit: &Unit, info: &TypeInfo) -> Vec<String> {
        struct Find<'a> {
            info: &'a TypeInfo,
            found: Vec<String>,
        }
        impl crate::syntax::walk::VisitMut for Find<'_> {
            type Error = ();
            fn exit_expr(
                &mut self,
                expr: &mut Expr,
                _ctx: crate::syntax::walk::ExprContext,
            ) -> Result<crate::syntax::walk::ExprAction, ()> {
                if expr.call_args_of(CHECK_FUNC).is_some() {
                    let ty = self.info.type_of(expr.id).map(|t| t.to_string());
                    self.found.push(ty.unwrap_or_else(|| "?".into()));
                }
                Ok(crate::syntax::walk::ExprAction::Keep)
            }
        }
        let mut find = Find {
            info,
            found: Vec::new(),
        };
        let mut ast = unit.files[0].ast.clone();
        crate::syntax::walk::walk_file(&mut find, &mut ast).unwrap();
        find.found
    }

    #[test]
    fn types_checked_calls() {
        let (unit, info) = check(
            "package main\n\nimport \"os\"\n\nfunc open(p string) (*os.File, error) {\n\tf := check os.Open(p)\n\treturn f, nil\n}\n",
        );
        assert_eq!(check_call_types(&unit, &info), vec!["(*os.File, error)"]);
    }

    #[test]
    fn count_mismatch_leaves_variable_untyped() {
        let (unit, info) = check(
            "package main\n\nimport \"os\"\n\nfunc f() error {\n\tfile := check os.Open(\"x\")\n\tcheck file.Close()\n\treturn nil\n}\n",
        );
        assert_eq!(check_call_types(&unit, &info), vec!["(*os.File, error)", "?"]);
        assert!(info
            .diagnostics
            .iter()
            .any(|d| d.message.contains("multiple-value")));
    }

    #[test]
    fn methods_and_fields_of_local_types() {
        let (unit, info) = check(
            "package main\n\ntype T struct {\n\tinner *U\n}\n\ntype U struct{}\n\nfunc (u *U) Do(n int) (bool, error) {\n\treturn true, nil\n}\n\nfunc (t T) run() error {\n\tcheck t.inner.Do(1)\n\treturn nil\n}\n",
        );
        assert_eq!(check_call_types(&unit, &info), vec!["(bool, error)"]);
    }

    #[test]
    fn promotes_through_embedded_fields() {
        let (unit, info) = check(
            "package main\n\ntype U struct {\n\tn int\n}\n\nfunc (u U) Do() (int, error) {\n\treturn u.n, nil\n}\n\ntype T struct {\n\tU\n\tname string\n}\n\nfunc (t T) run() error {\n\tcheck t.Do()\n\tcheck t.U.Do()\n\treturn nil\n}\n",
        );
        assert_eq!(check_call_types(&unit, &info), vec!["(int, error)", "(int, error)"]);
    }

    #[test]
    fn records_result_types_of_signatures() {
        let (unit, info) = check("package main\n\ntype S struct{}\n\nfunc f() (S, int, error) {\n\treturn S{}, 0, nil\n}\n");
        let Decl::Func(func) = &unit.files[0].ast.decls[1] else {
            panic!("expected func");
        };
        let slots = func.sig.result_slots();
        assert_eq!(info.type_of(slots[0].id).map(|t| t.to_string()).as_deref(), Some("main.S"));
        assert_eq!(info.type_of(slots[1].id).map(|t| t.to_string()).as_deref(), Some("int"));
    }
}
