//! Source printer for the host dialect.
//!
//! Output is plain host-language text, tab indented, one statement per line.
//! Comments are not preserved.

use crate::syntax::*;

/// Print a whole file.
pub fn print_file(file: &File) -> String {
    let mut p = Printer::default();
    p.file(file);
    p.out
}

pub fn print_stmt(stmt: &Stmt) -> String {
    let mut p = Printer::default();
    p.stmt(stmt);
    p.out
}

pub fn print_expr(expr: &Expr) -> String {
    let mut p = Printer::default();
    p.expr(expr);
    p.out
}

pub fn print_type(ty: &TypeExpr) -> String {
    let mut p = Printer::default();
    p.type_expr(ty);
    p.out
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.indent {
            self.out.push('\t');
        }
    }

    fn comma_list<T>(&mut self, items: &[T], mut each: impl FnMut(&mut Self, &T)) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            each(self, item);
        }
    }

    // ========================================================================
    // FILES AND DECLARATIONS
    // ========================================================================

    fn file(&mut self, file: &File) {
        self.push("package ");
        self.push(&file.package.name);
        self.push("\n");

        match file.imports.as_slice() {
            [] => {}
            [single] => {
                self.push("\nimport ");
                self.import(single);
                self.push("\n");
            }
            many => {
                self.push("\nimport (");
                self.indent += 1;
                for import in many {
                    self.newline();
                    self.import(import);
                }
                self.indent -= 1;
                self.push("\n)\n");
            }
        }

        for decl in &file.decls {
            self.push("\n");
            self.decl(decl);
            self.push("\n");
        }
    }

    fn import(&mut self, import: &Import) {
        if let Some(alias) = &import.alias {
            self.push(&alias.name);
            self.push(" ");
        }
        self.push(&format!("\"{}\"", import.path));
    }

    fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Func(func) => self.func_decl(func),
            Decl::Type(specs) => self.grouped("type", specs, Self::type_spec),
            Decl::Var(specs) => self.grouped("var", specs, Self::value_spec),
            Decl::Const(specs) => self.grouped("const", specs, Self::value_spec),
        }
    }

    fn grouped<T>(&mut self, keyword: &str, specs: &[T], each: fn(&mut Self, &T)) {
        self.push(keyword);
        if let [single] = specs {
            self.push(" ");
            each(self, single);
            return;
        }
        self.push(" (");
        self.indent += 1;
        for spec in specs {
            self.newline();
            each(self, spec);
        }
        self.indent -= 1;
        self.newline();
        self.push(")");
    }

    fn func_decl(&mut self, func: &FuncDecl) {
        self.push("func ");
        if let Some(recv) = &func.recv {
            self.push("(");
            self.field(recv);
            self.push(") ");
        }
        self.push(&func.name.name);
        self.signature(&func.sig);
        if let Some(body) = &func.body {
            self.push(" ");
            self.block(body);
        }
    }

    fn type_spec(&mut self, spec: &TypeSpec) {
        self.push(&spec.name.name);
        self.push(if spec.alias { " = " } else { " " });
        self.type_expr(&spec.ty);
    }

    fn value_spec(&mut self, spec: &ValueSpec) {
        self.comma_list(&spec.names, |p, n| p.push(&n.name));
        if let Some(ty) = &spec.ty {
            self.push(" ");
            self.type_expr(ty);
        }
        if !spec.values.is_empty() {
            self.push(" = ");
            self.comma_list(&spec.values, Self::expr);
        }
    }

    fn signature(&mut self, sig: &Signature) {
        self.push("(");
        self.comma_list(&sig.params, Self::field);
        self.push(")");
        match sig.results.as_slice() {
            [] => {}
            [single] if single.names.is_empty() => {
                self.push(" ");
                self.type_expr(&single.ty);
            }
            results => {
                self.push(" (");
                self.comma_list(results, Self::field);
                self.push(")");
            }
        }
    }

    fn field(&mut self, field: &Field) {
        if !field.names.is_empty() {
            self.comma_list(&field.names, |p, n| p.push(&n.name));
            self.push(" ");
        }
        if field.variadic {
            self.push("...");
        }
        self.type_expr(&field.ty);
        if let Some(tag) = &field.tag {
            self.push(" ");
            self.push(tag);
        }
    }

    // ========================================================================
    // TYPES
    // ========================================================================

    fn type_expr(&mut self, ty: &TypeExpr) {
        match &ty.kind {
            TypeKind::Name { package, name } => {
                if let Some(package) = package {
                    self.push(package);
                    self.push(".");
                }
                self.push(name);
            }
            TypeKind::Pointer(elem) => {
                self.push("*");
                self.type_expr(elem);
            }
            TypeKind::Slice(elem) => {
                self.push("[]");
                self.type_expr(elem);
            }
            TypeKind::Array { len, elem } => {
                self.push("[");
                match len {
                    Some(len) => self.expr(len),
                    None => self.push("..."),
                }
                self.push("]");
                self.type_expr(elem);
            }
            TypeKind::Map { key, value } => {
                self.push("map[");
                self.type_expr(key);
                self.push("]");
                self.type_expr(value);
            }
            TypeKind::Func(sig) => {
                self.push("func");
                self.signature(sig);
            }
            TypeKind::Struct(fields) => self.field_block("struct", fields, Self::field),
            TypeKind::Interface(methods) => self.field_block("interface", methods, Self::method),
        }
    }

    fn field_block(&mut self, keyword: &str, fields: &[Field], each: fn(&mut Self, &Field)) {
        self.push(keyword);
        if fields.is_empty() {
            self.push("{}");
            return;
        }
        self.push(" {");
        self.indent += 1;
        for field in fields {
            self.newline();
            each(self, field);
        }
        self.indent -= 1;
        self.newline();
        self.push("}");
    }

    fn method(&mut self, field: &Field) {
        match (&field.names[..], &field.ty.kind) {
            ([name], TypeKind::Func(sig)) => {
                self.push(&name.name);
                self.signature(sig);
            }
            _ => self.type_expr(&field.ty),
        }
    }

    // ========================================================================
    // EXPRESSIONS
    // ========================================================================

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Ident(name) => self.push(name),
            ExprKind::Lit(_, text) => self.push(text),
            ExprKind::Composite { ty, elts } => {
                if let Some(ty) = ty {
                    self.type_expr(ty);
                }
                self.push("{");
                self.comma_list(elts, Self::expr);
                self.push("}");
            }
            ExprKind::FuncLit(lit) => {
                self.push("func");
                self.signature(&lit.sig);
                self.push(" ");
                self.block(&lit.body);
            }
            ExprKind::Paren(inner) => {
                self.push("(");
                self.expr(inner);
                self.push(")");
            }
            ExprKind::Selector { x, sel } => {
                self.operand(x);
                self.push(".");
                self.push(&sel.name);
            }
            ExprKind::Index { x, index } => {
                self.operand(x);
                self.push("[");
                self.expr(index);
                self.push("]");
            }
            ExprKind::Slice { x, lo, hi, max } => {
                self.operand(x);
                self.push("[");
                if let Some(lo) = lo {
                    self.expr(lo);
                }
                self.push(":");
                if let Some(hi) = hi {
                    self.expr(hi);
                }
                if let Some(max) = max {
                    self.push(":");
                    self.expr(max);
                }
                self.push("]");
            }
            ExprKind::TypeAssert { x, ty } => {
                self.operand(x);
                self.push(".(");
                self.type_expr(ty);
                self.push(")");
            }
            ExprKind::Call {
                fun,
                args,
                ellipsis,
            } => {
                self.operand(fun);
                self.push("(");
                self.comma_list(args, Self::expr);
                if *ellipsis {
                    self.push("...");
                }
                self.push(")");
            }
            ExprKind::Unary { op, x } => {
                self.push(op.as_str());
                self.operand(x);
            }
            ExprKind::Binary { op, x, y } => {
                self.binary_side(x, op.precedence(), false);
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                self.binary_side(y, op.precedence(), true);
            }
            ExprKind::KeyValue { key, value } => {
                self.expr(key);
                self.push(": ");
                self.expr(value);
            }
            ExprKind::Type(ty) => self.type_expr(ty),
            ExprKind::Bad => self.push("_"),
        }
    }

    /// Operands of postfix and unary forms; binary expressions get parens.
    fn operand(&mut self, x: &Expr) {
        if matches!(x.kind, ExprKind::Binary { .. }) {
            self.push("(");
            self.expr(x);
            self.push(")");
        } else {
            self.expr(x);
        }
    }

    fn binary_side(&mut self, side: &Expr, parent: u8, right: bool) {
        let needs_parens = match &side.kind {
            ExprKind::Binary { op, .. } => {
                op.precedence() < parent || (right && op.precedence() == parent)
            }
            _ => false,
        };
        if needs_parens {
            self.push("(");
            self.expr(side);
            self.push(")");
        } else {
            self.expr(side);
        }
    }

    // ========================================================================
    // STATEMENTS
    // ========================================================================

    fn block(&mut self, block: &Block) {
        self.push("{");
        self.indent += 1;
        for stmt in &block.stmts {
            self.newline();
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.newline();
        self.push("}");
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.expr(expr),
            StmtKind::Assign { lhs, op, rhs } => {
                self.comma_list(lhs, Self::expr);
                match op {
                    AssignOp::Assign => self.push(" = "),
                    AssignOp::Define => self.push(" := "),
                    AssignOp::Compound(op) => {
                        self.push(" ");
                        self.push(op.as_str());
                        self.push("= ");
                    }
                }
                self.comma_list(rhs, Self::expr);
            }
            StmtKind::IncDec { x, inc } => {
                self.expr(x);
                self.push(if *inc { "++" } else { "--" });
            }
            StmtKind::Decl(decl) => self.decl(decl),
            StmtKind::Return(results) => {
                self.push("return");
                if !results.is_empty() {
                    self.push(" ");
                    self.comma_list(results, Self::expr);
                }
            }
            StmtKind::If(if_stmt) => self.if_stmt(if_stmt),
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => {
                self.push("for ");
                if init.is_some() || post.is_some() {
                    if let Some(init) = init {
                        self.stmt(init);
                    }
                    self.push("; ");
                    if let Some(cond) = cond {
                        self.expr(cond);
                    }
                    self.push("; ");
                    if let Some(post) = post {
                        self.stmt(post);
                    }
                    self.push(" ");
                } else if let Some(cond) = cond {
                    self.expr(cond);
                    self.push(" ");
                }
                self.block(body);
            }
            StmtKind::Range {
                key,
                value,
                define,
                x,
                body,
            } => {
                self.push("for ");
                if let Some(key) = key {
                    self.expr(key);
                    if let Some(value) = value {
                        self.push(", ");
                        self.expr(value);
                    }
                    self.push(if *define { " := " } else { " = " });
                }
                self.push("range ");
                self.expr(x);
                self.push(" ");
                self.block(body);
            }
            StmtKind::Switch { init, tag, clauses } => {
                self.push("switch ");
                if let Some(init) = init {
                    self.stmt(init);
                    self.push("; ");
                }
                if let Some(tag) = tag {
                    self.expr(tag);
                    self.push(" ");
                }
                self.push("{");
                for clause in clauses {
                    self.newline();
                    match &clause.values {
                        Some(values) => {
                            self.push("case ");
                            self.comma_list(values, Self::expr);
                            self.push(":");
                        }
                        None => self.push("default:"),
                    }
                    self.indent += 1;
                    for stmt in &clause.body.stmts {
                        self.newline();
                        self.stmt(stmt);
                    }
                    self.indent -= 1;
                }
                self.newline();
                self.push("}");
            }
            StmtKind::Block(block) => self.block(block),
            StmtKind::Go(call) => {
                self.push("go ");
                self.expr(call);
            }
            StmtKind::Defer(call) => {
                self.push("defer ");
                self.expr(call);
            }
            StmtKind::Branch(kind) => self.push(match kind {
                BranchKind::Break => "break",
                BranchKind::Continue => "continue",
                BranchKind::Fallthrough => "fallthrough",
            }),
        }
    }

    fn if_stmt(&mut self, stmt: &IfStmt) {
        self.push("if ");
        if let Some(init) = &stmt.init {
            self.stmt(init);
            self.push("; ");
        }
        self.expr(&stmt.cond);
        self.push(" ");
        self.block(&stmt.then);
        if let Some(els) = &stmt.els {
            self.push(" else ");
            self.stmt(els);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(ids: &mut NodeIds, name: &str) -> Expr {
        Expr::ident(ids, name)
    }

    #[test]
    fn prints_error_test() {
        let mut ids = NodeIds::new();
        let err = ident(&mut ids, "err");
        let nil = ident(&mut ids, "nil");
        let cond = Expr::new(
            &mut ids,
            ExprKind::Binary {
                op: BinaryOp::Ne,
                x: Box::new(err),
                y: Box::new(nil),
            },
        );
        let result = ident(&mut ids, "err");
        let ret = Stmt::new(&mut ids, StmtKind::Return(vec![result]));
        let then = Block::new(&mut ids, vec![ret]);
        let stmt = Stmt::new(
            &mut ids,
            StmtKind::If(IfStmt {
                init: None,
                cond,
                then,
                els: None,
            }),
        );
        assert_eq!(print_stmt(&stmt), "if err != nil {\n\treturn err\n}");
    }

    #[test]
    fn parenthesizes_lower_precedence_operands() {
        let mut ids = NodeIds::new();
        let (a, b, c) = (ident(&mut ids, "a"), ident(&mut ids, "b"), ident(&mut ids, "c"));
        let sum = Expr::new(
            &mut ids,
            ExprKind::Binary {
                op: BinaryOp::Add,
                x: Box::new(a),
                y: Box::new(b),
            },
        );
        let product = Expr::new(
            &mut ids,
            ExprKind::Binary {
                op: BinaryOp::Mul,
                x: Box::new(sum),
                y: Box::new(c),
            },
        );
        assert_eq!(print_expr(&product), "(a + b) * c");
    }
}
