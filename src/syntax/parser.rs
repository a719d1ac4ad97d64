//! Host Parser - builds the syntax tree from rewritten source text.
//!
//! The input is scanned once to blank comments and write out automatic
//! semicolons (see [`normalize`]), then parsed with the pest grammar. Offsets
//! are preserved throughout, so every node span refers to the text that was
//! passed in.

use pest::{error::Error, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::errors::{CheckflowError, ErrorKind, ErrorReporting};
use crate::syntax::scanner::normalize;
use crate::syntax::*;

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct HostParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parse one source file. Fresh node ids are drawn from `ids`.
pub fn parse_file(
    text: &str,
    ids: &mut NodeIds,
    ctx: &dyn ErrorReporting,
) -> Result<File, CheckflowError> {
    let normalized = normalize(text).map_err(|e| e.report(ctx))?;
    let mut pairs = HostParser::parse(Rule::file, &normalized)
        .map_err(|e| convert_parse_error(e, ctx))?;
    let file = pairs
        .next()
        .ok_or_else(|| ctx.syntax_error("empty parse result", Span::default()))?;

    Builder { ids, ctx }.file(file)
}

/// Parse a standalone type expression such as `func(string) (*os.File, error)`.
pub fn parse_type(
    text: &str,
    ids: &mut NodeIds,
    ctx: &dyn ErrorReporting,
) -> Result<TypeExpr, CheckflowError> {
    let mut pairs =
        HostParser::parse(Rule::type_only, text).map_err(|e| convert_parse_error(e, ctx))?;
    let ty = pairs
        .next()
        .ok_or_else(|| ctx.syntax_error("empty parse result", Span::default()))?;

    Builder { ids, ctx }.type_expr(ty)
}

// ============================================================================
// TREE BUILDER
// ============================================================================

struct Builder<'a> {
    ids: &'a mut NodeIds,
    ctx: &'a dyn ErrorReporting,
}

/// One entry of a parameter list before Go-style grouping is applied.
struct RawParam {
    name: Option<Ident>,
    variadic: bool,
    ty: TypeExpr,
    span: Span,
}

impl<'a> Builder<'a> {
    // ------------------------------------------------------------------------
    // Files and declarations
    // ------------------------------------------------------------------------

    fn file(&mut self, pair: Pair<'_, Rule>) -> Result<File, CheckflowError> {
        let span = get_span(&pair);
        let mut package = None;
        let mut imports = Vec::new();
        let mut decls = Vec::new();

        for p in children(pair) {
            match p.as_rule() {
                Rule::package_clause => {
                    let name = self.first(p, "package name")?;
                    package = Some(self.ident(&name));
                }
                Rule::import_decl => {
                    for spec in children(p) {
                        imports.push(self.import_spec(spec)?);
                    }
                }
                Rule::func_decl => decls.push(Decl::Func(self.func_decl(p)?)),
                Rule::var_decl | Rule::const_decl | Rule::type_decl => decls.push(self.gen_decl(p)?),
                Rule::EOI => {}
                _ => return Err(self.unexpected(&p, "file")),
            }
        }

        let package = package.ok_or_else(|| self.ctx.report_at(ErrorKind::MissingPackage, span))?;
        Ok(File {
            package,
            imports,
            decls,
            span,
        })
    }

    fn import_spec(&mut self, pair: Pair<'_, Rule>) -> Result<Import, CheckflowError> {
        let span = get_span(&pair);
        let mut alias = None;
        let mut path = String::new();
        for p in children(pair) {
            match p.as_rule() {
                Rule::ident => alias = Some(self.ident(&p)),
                Rule::string_lit => path = unquote(p.as_str()),
                _ => return Err(self.unexpected(&p, "import")),
            }
        }
        Ok(Import {
            id: self.ids.fresh(),
            span,
            alias,
            path,
        })
    }

    fn func_decl(&mut self, pair: Pair<'_, Rule>) -> Result<FuncDecl, CheckflowError> {
        let span = get_span(&pair);
        let mut recv = None;
        let mut name = None;
        let mut sig = None;
        let mut body = None;

        for p in children(pair) {
            match p.as_rule() {
                Rule::receiver => {
                    let params = self.first(p, "receiver")?;
                    recv = self.params(params)?.into_iter().next();
                }
                Rule::ident => name = Some(self.ident(&p)),
                Rule::signature => sig = Some(self.signature(p)?),
                Rule::block => body = Some(self.block(p)?),
                _ => return Err(self.unexpected(&p, "function declaration")),
            }
        }

        Ok(FuncDecl {
            id: self.ids.fresh(),
            span,
            recv,
            name: name.ok_or_else(|| self.malformed("function name", span))?,
            sig: sig.ok_or_else(|| self.malformed("function signature", span))?,
            body,
        })
    }

    fn gen_decl(&mut self, pair: Pair<'_, Rule>) -> Result<Decl, CheckflowError> {
        let rule = pair.as_rule();
        match rule {
            Rule::type_decl => {
                let specs = children(pair)
                    .map(|p| self.type_spec(p))
                    .collect::<Result<_, _>>()?;
                Ok(Decl::Type(specs))
            }
            Rule::var_decl | Rule::const_decl => {
                let specs = children(pair)
                    .map(|p| self.value_spec(p))
                    .collect::<Result<_, _>>()?;
                Ok(if rule == Rule::var_decl {
                    Decl::Var(specs)
                } else {
                    Decl::Const(specs)
                })
            }
            _ => Err(self.unexpected(&pair, "declaration")),
        }
    }

    fn type_spec(&mut self, pair: Pair<'_, Rule>) -> Result<TypeSpec, CheckflowError> {
        let span = get_span(&pair);
        let mut name = None;
        let mut alias = false;
        let mut ty = None;
        for p in children(pair) {
            match p.as_rule() {
                Rule::ident => name = Some(self.ident(&p)),
                Rule::alias_eq => alias = true,
                Rule::type_expr => ty = Some(self.type_expr(p)?),
                _ => return Err(self.unexpected(&p, "type declaration")),
            }
        }
        Ok(TypeSpec {
            id: self.ids.fresh(),
            span,
            name: name.ok_or_else(|| self.malformed("type name", span))?,
            alias,
            ty: ty.ok_or_else(|| self.malformed("type", span))?,
        })
    }

    fn value_spec(&mut self, pair: Pair<'_, Rule>) -> Result<ValueSpec, CheckflowError> {
        let span = get_span(&pair);
        let mut names = Vec::new();
        let mut ty = None;
        let mut values = Vec::new();
        for p in children(pair) {
            match p.as_rule() {
                Rule::ident_list => names = self.ident_list(p),
                Rule::type_expr => ty = Some(self.type_expr(p)?),
                Rule::expr_list => values = self.expr_list(p)?,
                _ => return Err(self.unexpected(&p, "value declaration")),
            }
        }
        Ok(ValueSpec {
            id: self.ids.fresh(),
            span,
            names,
            ty,
            values,
        })
    }

    fn signature(&mut self, pair: Pair<'_, Rule>) -> Result<Signature, CheckflowError> {
        let mut params = Vec::new();
        let mut results = Vec::new();
        for p in children(pair) {
            match p.as_rule() {
                Rule::params => params = self.params(p)?,
                Rule::results => {
                    let inner = self.first(p, "results")?;
                    results = match inner.as_rule() {
                        Rule::params => self.params(inner)?,
                        _ => {
                            let span = get_span(&inner);
                            let ty = self.type_expr(inner)?;
                            vec![self.field(Vec::new(), ty, false, span)]
                        }
                    };
                }
                _ => return Err(self.unexpected(&p, "signature")),
            }
        }
        Ok(Signature { params, results })
    }

    /// Builds a parameter list, grouping `a, b int` the way Go does: when any
    /// entry is named, bare entries are names sharing the next entry's type.
    fn params(&mut self, pair: Pair<'_, Rule>) -> Result<Vec<Field>, CheckflowError> {
        let list_span = get_span(&pair);
        let mut raw = Vec::new();
        for param in children(pair) {
            let span = get_span(&param);
            let mut name = None;
            let mut variadic = false;
            let mut ty = None;
            for p in children(param) {
                match p.as_rule() {
                    Rule::ident => name = Some(self.ident(&p)),
                    Rule::ellipsis => variadic = true,
                    Rule::type_expr => ty = Some(self.type_expr(p)?),
                    _ => return Err(self.unexpected(&p, "parameter")),
                }
            }
            let ty = ty.ok_or_else(|| self.malformed("parameter type", span))?;
            raw.push(RawParam {
                name,
                variadic,
                ty,
                span,
            });
        }

        if raw.iter().all(|p| p.name.is_none()) {
            return Ok(raw
                .into_iter()
                .map(|p| self.field(Vec::new(), p.ty, p.variadic, p.span))
                .collect());
        }

        let mut fields = Vec::new();
        let mut pending: Vec<Ident> = Vec::new();
        for p in raw {
            match p.name {
                Some(name) => {
                    pending.push(name);
                    let names = std::mem::take(&mut pending);
                    fields.push(self.field(names, p.ty, p.variadic, p.span));
                }
                None => match &p.ty.kind {
                    TypeKind::Name {
                        package: None,
                        name,
                    } if !p.variadic => pending.push(Ident {
                        id: p.ty.id,
                        span: p.ty.span,
                        name: name.clone(),
                    }),
                    _ => {
                        return Err(self
                            .ctx
                            .syntax_error("mixed named and unnamed parameters", p.span))
                    }
                },
            }
        }
        if !pending.is_empty() {
            return Err(self
                .ctx
                .syntax_error("mixed named and unnamed parameters", list_span));
        }
        Ok(fields)
    }

    // ------------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------------

    fn type_expr(&mut self, pair: Pair<'_, Rule>) -> Result<TypeExpr, CheckflowError> {
        let span = get_span(&pair);
        let rule = pair.as_rule();
        let kind = match rule {
            Rule::type_expr | Rule::type_only | Rule::type_operand => {
                let inner = self.first(pair, "type")?;
                return self.type_expr(inner);
            }
            Rule::type_name => {
                let parts: Vec<String> = children(pair).map(|p| p.as_str().to_string()).collect();
                match parts.as_slice() {
                    [name] => TypeKind::Name {
                        package: None,
                        name: name.clone(),
                    },
                    [package, name] => TypeKind::Name {
                        package: Some(package.clone()),
                        name: name.clone(),
                    },
                    _ => return Err(self.malformed("type name", span)),
                }
            }
            Rule::pointer_type => TypeKind::Pointer(Box::new(self.first_type(pair)?)),
            Rule::slice_type => TypeKind::Slice(Box::new(self.first_type(pair)?)),
            Rule::array_type => {
                let mut len = None;
                let mut elem = None;
                for p in children(pair) {
                    match p.as_rule() {
                        Rule::ellipsis => {}
                        Rule::expr => len = Some(Box::new(self.expr(p)?)),
                        _ => elem = Some(self.type_expr(p)?),
                    }
                }
                TypeKind::Array {
                    len,
                    elem: Box::new(elem.ok_or_else(|| self.malformed("array element", span))?),
                }
            }
            Rule::map_type => {
                let mut types = children(pair);
                let key = self.next(&mut types, "map key", span)?;
                let value = self.next(&mut types, "map value", span)?;
                TypeKind::Map {
                    key: Box::new(self.type_expr(key)?),
                    value: Box::new(self.type_expr(value)?),
                }
            }
            Rule::func_type => {
                let sig = self.first(pair, "signature")?;
                TypeKind::Func(Box::new(self.signature(sig)?))
            }
            Rule::struct_type => {
                let fields = children(pair)
                    .map(|p| self.field_decl(p))
                    .collect::<Result<_, _>>()?;
                TypeKind::Struct(fields)
            }
            Rule::interface_type => {
                let elems = children(pair)
                    .map(|p| self.iface_elem(p))
                    .collect::<Result<_, _>>()?;
                TypeKind::Interface(elems)
            }
            _ => return Err(self.unexpected(&pair, "type")),
        };
        Ok(TypeExpr {
            id: self.ids.fresh(),
            span,
            kind,
        })
    }

    fn first_type(&mut self, pair: Pair<'_, Rule>) -> Result<TypeExpr, CheckflowError> {
        let inner = self.first(pair, "type")?;
        self.type_expr(inner)
    }

    fn field_decl(&mut self, pair: Pair<'_, Rule>) -> Result<Field, CheckflowError> {
        let span = get_span(&pair);
        let mut names = Vec::new();
        let mut ty = None;
        let mut tag = None;
        for p in children(pair) {
            match p.as_rule() {
                Rule::ident_list => names = self.ident_list(p),
                Rule::type_expr => ty = Some(self.type_expr(p)?),
                Rule::embedded_field => {
                    let pointer = p.as_str().starts_with('*');
                    let name_span = get_span(&p);
                    let named = self.first_type(p)?;
                    ty = Some(if pointer {
                        TypeExpr {
                            id: self.ids.fresh(),
                            span: name_span,
                            kind: TypeKind::Pointer(Box::new(named)),
                        }
                    } else {
                        named
                    });
                }
                Rule::string_lit => tag = Some(p.as_str().to_string()),
                _ => return Err(self.unexpected(&p, "struct field")),
            }
        }
        let ty = ty.ok_or_else(|| self.malformed("field type", span))?;
        let mut field = self.field(names, ty, false, span);
        field.tag = tag;
        Ok(field)
    }

    fn iface_elem(&mut self, pair: Pair<'_, Rule>) -> Result<Field, CheckflowError> {
        let span = get_span(&pair);
        let inner = self.first(pair, "interface element")?;
        match inner.as_rule() {
            Rule::method_spec => {
                let mut parts = children(inner);
                let name = self.next(&mut parts, "method name", span)?;
                let sig = self.next(&mut parts, "method signature", span)?;
                let name = self.ident(&name);
                let sig_span = get_span(&sig);
                let sig = self.signature(sig)?;
                let ty = TypeExpr {
                    id: self.ids.fresh(),
                    span: sig_span,
                    kind: TypeKind::Func(Box::new(sig)),
                };
                Ok(self.field(vec![name], ty, false, span))
            }
            _ => {
                let ty = self.type_expr(inner)?;
                Ok(self.field(Vec::new(), ty, false, span))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn expr_list(&mut self, pair: Pair<'_, Rule>) -> Result<Vec<Expr>, CheckflowError> {
        children(pair).map(|p| self.expr(p)).collect()
    }

    fn expr(&mut self, pair: Pair<'_, Rule>) -> Result<Expr, CheckflowError> {
        let span = get_span(&pair);
        match pair.as_rule() {
            Rule::expr | Rule::expr_nc => {
                let mut parts = children(pair);
                let first = self.next(&mut parts, "operand", span)?;
                let first = self.expr(first)?;
                let mut rest = Vec::new();
                while let Some(op) = parts.next() {
                    let op_span = get_span(&op);
                    let op = BinaryOp::from_str(op.as_str().trim())
                        .ok_or_else(|| self.malformed("binary operator", op_span))?;
                    let rhs = self.next(&mut parts, "right operand", span)?;
                    rest.push((op, self.expr(rhs)?));
                }
                Ok(self.fold_binary(first, rest))
            }
            Rule::unary_expr | Rule::unary_expr_nc => {
                let mut ops = Vec::new();
                let mut operand = None;
                for p in children(pair) {
                    match p.as_rule() {
                        Rule::unary_op => ops.push((unary_op(p.as_str()), get_span(&p).start)),
                        _ => operand = Some(self.expr(p)?),
                    }
                }
                let mut x = operand.ok_or_else(|| self.malformed("operand", span))?;
                for (op, start) in ops.into_iter().rev() {
                    let end = x.span.end;
                    x = Expr {
                        id: self.ids.fresh(),
                        span: Span::new(start, end),
                        kind: ExprKind::Unary {
                            op,
                            x: Box::new(x),
                        },
                    };
                }
                Ok(x)
            }
            Rule::primary_expr | Rule::primary_expr_nc => {
                let mut parts = children(pair);
                let operand = self.next(&mut parts, "operand", span)?;
                let mut x = self.expr(operand)?;
                for suffix in parts {
                    x = self.suffix(x, suffix)?;
                }
                Ok(x)
            }
            _ => self.operand(pair),
        }
    }

    /// Precedence climbing over a flat `x op y op z` sequence.
    fn fold_binary(&mut self, first: Expr, rest: Vec<(BinaryOp, Expr)>) -> Expr {
        let mut operands = vec![first];
        let mut ops: Vec<BinaryOp> = Vec::new();
        for (op, rhs) in rest {
            while ops
                .last()
                .map_or(false, |top| top.precedence() >= op.precedence())
            {
                self.reduce(&mut operands, &mut ops);
            }
            ops.push(op);
            operands.push(rhs);
        }
        while !ops.is_empty() {
            self.reduce(&mut operands, &mut ops);
        }
        operands.pop().unwrap_or_else(|| Expr {
            id: self.ids.fresh(),
            span: Span::default(),
            kind: ExprKind::Bad,
        })
    }

    fn reduce(&mut self, operands: &mut Vec<Expr>, ops: &mut Vec<BinaryOp>) {
        let (Some(op), Some(y), Some(x)) = (ops.pop(), operands.pop(), operands.pop()) else {
            return;
        };
        operands.push(Expr {
            id: self.ids.fresh(),
            span: Span::new(x.span.start, y.span.end),
            kind: ExprKind::Binary {
                op,
                x: Box::new(x),
                y: Box::new(y),
            },
        });
    }

    fn operand(&mut self, pair: Pair<'_, Rule>) -> Result<Expr, CheckflowError> {
        let span = get_span(&pair);
        let kind = match pair.as_rule() {
            Rule::ident => ExprKind::Ident(pair.as_str().to_string()),
            Rule::int_lit => ExprKind::Lit(LitKind::Int, pair.as_str().to_string()),
            Rule::float_lit => ExprKind::Lit(LitKind::Float, pair.as_str().to_string()),
            Rule::imag_lit => ExprKind::Lit(LitKind::Imag, pair.as_str().to_string()),
            Rule::rune_lit => ExprKind::Lit(LitKind::Char, pair.as_str().to_string()),
            Rule::string_lit => ExprKind::Lit(LitKind::String, pair.as_str().to_string()),
            Rule::paren_expr => {
                let inner = self.first(pair, "parenthesized expression")?;
                ExprKind::Paren(Box::new(self.expr(inner)?))
            }
            Rule::composite_lit => {
                let mut parts = children(pair);
                let ty = self.next(&mut parts, "literal type", span)?;
                let body = self.next(&mut parts, "literal body", span)?;
                let ty = self.type_expr(ty)?;
                ExprKind::Composite {
                    ty: Some(Box::new(ty)),
                    elts: self.lit_body(body)?,
                }
            }
            Rule::func_lit => {
                let mut parts = children(pair);
                let sig = self.next(&mut parts, "signature", span)?;
                let body = self.next(&mut parts, "function body", span)?;
                ExprKind::FuncLit(Box::new(FuncLit {
                    sig: self.signature(sig)?,
                    body: self.block(body)?,
                }))
            }
            Rule::type_operand => ExprKind::Type(Box::new(self.type_expr(pair)?)),
            Rule::lit_body => ExprKind::Composite {
                ty: None,
                elts: self.lit_body(pair)?,
            },
            _ => return Err(self.unexpected(&pair, "expression")),
        };
        Ok(Expr {
            id: self.ids.fresh(),
            span,
            kind,
        })
    }

    fn lit_body(&mut self, pair: Pair<'_, Rule>) -> Result<Vec<Expr>, CheckflowError> {
        let mut elts = Vec::new();
        for element in children(pair) {
            let span = get_span(&element);
            let mut values = children(element)
                .map(|p| self.expr(p))
                .collect::<Result<Vec<_>, _>>()?;
            let elt = match values.len() {
                1 => values.remove(0),
                2 => {
                    let value = values.remove(1);
                    let key = values.remove(0);
                    Expr {
                        id: self.ids.fresh(),
                        span,
                        kind: ExprKind::KeyValue {
                            key: Box::new(key),
                            value: Box::new(value),
                        },
                    }
                }
                _ => return Err(self.malformed("composite literal element", span)),
            };
            elts.push(elt);
        }
        Ok(elts)
    }

    fn suffix(&mut self, x: Expr, pair: Pair<'_, Rule>) -> Result<Expr, CheckflowError> {
        let suffix_span = get_span(&pair);
        let span = Span::new(x.span.start, suffix_span.end);
        let x = Box::new(x);
        let kind = match pair.as_rule() {
            Rule::selector_suffix => {
                let sel = self.first(pair, "selector")?;
                ExprKind::Selector {
                    x,
                    sel: self.ident(&sel),
                }
            }
            Rule::type_assert_suffix => ExprKind::TypeAssert {
                x,
                ty: Box::new(self.first_type(pair)?),
            },
            Rule::index_suffix => {
                let index = self.first(pair, "index")?;
                ExprKind::Index {
                    x,
                    index: Box::new(self.expr(index)?),
                }
            }
            Rule::slice_suffix => {
                let (mut lo, mut hi, mut max) = (None, None, None);
                for p in children(pair) {
                    let rule = p.as_rule();
                    let bound = Some(Box::new(self.first_expr(p)?));
                    match rule {
                        Rule::slice_lo => lo = bound,
                        Rule::slice_hi => hi = bound,
                        _ => max = bound,
                    }
                }
                ExprKind::Slice { x, lo, hi, max }
            }
            Rule::call_suffix => {
                let mut args = Vec::new();
                let mut ellipsis = false;
                for p in children(pair) {
                    match p.as_rule() {
                        Rule::ellipsis => ellipsis = true,
                        _ => args.push(self.expr(p)?),
                    }
                }
                ExprKind::Call {
                    fun: x,
                    args,
                    ellipsis,
                }
            }
            Rule::lit_suffix => {
                let body = self.first(pair, "literal body")?;
                let ty = self.operand_type(&x)?;
                ExprKind::Composite {
                    ty: Some(Box::new(ty)),
                    elts: self.lit_body(body)?,
                }
            }
            _ => return Err(self.unexpected(&pair, "expression suffix")),
        };
        Ok(Expr {
            id: self.ids.fresh(),
            span,
            kind,
        })
    }

    fn first_expr(&mut self, pair: Pair<'_, Rule>) -> Result<Expr, CheckflowError> {
        let inner = self.first(pair, "expression")?;
        self.expr(inner)
    }

    /// The type named by the operand in front of a composite literal body.
    fn operand_type(&mut self, x: &Expr) -> Result<TypeExpr, CheckflowError> {
        let kind = match &x.kind {
            ExprKind::Ident(name) => TypeKind::Name {
                package: None,
                name: name.clone(),
            },
            ExprKind::Selector { x: pkg, sel } => match pkg.as_ident() {
                Some(package) => TypeKind::Name {
                    package: Some(package.to_string()),
                    name: sel.name.clone(),
                },
                None => return Err(self.ctx.syntax_error("invalid composite literal type", x.span)),
            },
            ExprKind::Type(ty) => return Ok((**ty).clone()),
            _ => return Err(self.ctx.syntax_error("invalid composite literal type", x.span)),
        };
        Ok(TypeExpr {
            id: self.ids.fresh(),
            span: x.span,
            kind,
        })
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn block(&mut self, pair: Pair<'_, Rule>) -> Result<Block, CheckflowError> {
        let span = get_span(&pair);
        let stmts = children(pair)
            .map(|p| self.stmt(p))
            .collect::<Result<_, _>>()?;
        Ok(Block {
            id: self.ids.fresh(),
            span,
            stmts,
        })
    }

    fn stmt(&mut self, pair: Pair<'_, Rule>) -> Result<Stmt, CheckflowError> {
        let span = get_span(&pair);
        let kind = match pair.as_rule() {
            Rule::return_stmt => match children(pair).next() {
                Some(list) => StmtKind::Return(self.expr_list(list)?),
                None => StmtKind::Return(Vec::new()),
            },
            Rule::if_stmt => StmtKind::If(self.if_stmt(pair)?),
            Rule::for_stmt => self.for_stmt(pair)?,
            Rule::switch_stmt => self.switch_stmt(pair)?,
            Rule::go_stmt => StmtKind::Go(self.first_expr(pair)?),
            Rule::defer_stmt => StmtKind::Defer(self.first_expr(pair)?),
            Rule::branch_stmt => match pair.as_str().trim() {
                "break" => StmtKind::Branch(BranchKind::Break),
                "continue" => StmtKind::Branch(BranchKind::Continue),
                _ => StmtKind::Branch(BranchKind::Fallthrough),
            },
            Rule::decl_stmt => {
                let decl = self.first(pair, "declaration")?;
                StmtKind::Decl(self.gen_decl(decl)?)
            }
            Rule::block => StmtKind::Block(self.block(pair)?),
            Rule::assign_stmt | Rule::assign_stmt_nc => {
                let mut parts = children(pair);
                let lhs = self.next(&mut parts, "assignment target", span)?;
                let op = self.next(&mut parts, "assignment operator", span)?;
                let rhs = self.next(&mut parts, "assigned value", span)?;
                StmtKind::Assign {
                    lhs: self.expr_list(lhs)?,
                    op: self.assign_op(&op)?,
                    rhs: self.expr_list(rhs)?,
                }
            }
            Rule::incdec_stmt | Rule::incdec_stmt_nc => {
                let mut parts = children(pair);
                let x = self.next(&mut parts, "operand", span)?;
                let op = self.next(&mut parts, "increment operator", span)?;
                StmtKind::IncDec {
                    x: self.expr(x)?,
                    inc: op.as_str().trim() == "++",
                }
            }
            Rule::expr_stmt | Rule::expr_stmt_nc => StmtKind::Expr(self.first_expr(pair)?),
            _ => return Err(self.unexpected(&pair, "statement")),
        };
        Ok(Stmt {
            id: self.ids.fresh(),
            span,
            kind,
        })
    }

    fn assign_op(&self, pair: &Pair<'_, Rule>) -> Result<AssignOp, CheckflowError> {
        let text = pair.as_str().trim();
        match text {
            "=" => Ok(AssignOp::Assign),
            ":=" => Ok(AssignOp::Define),
            _ => BinaryOp::from_str(text.trim_end_matches('='))
                .map(AssignOp::Compound)
                .ok_or_else(|| self.malformed("assignment operator", get_span(pair))),
        }
    }

    /// A statement wrapped by one of the header rules (`if_init`, `for_post`...).
    fn header_stmt(&mut self, pair: Pair<'_, Rule>) -> Result<Box<Stmt>, CheckflowError> {
        let inner = self.first(pair, "statement")?;
        Ok(Box::new(self.stmt(inner)?))
    }

    fn if_stmt(&mut self, pair: Pair<'_, Rule>) -> Result<IfStmt, CheckflowError> {
        let span = get_span(&pair);
        let mut init = None;
        let mut cond = None;
        let mut then = None;
        let mut els = None;
        for p in children(pair) {
            match p.as_rule() {
                Rule::if_init => init = Some(self.header_stmt(p)?),
                Rule::expr_nc => cond = Some(self.expr(p)?),
                Rule::block if then.is_none() => then = Some(self.block(p)?),
                Rule::block | Rule::if_stmt => els = Some(Box::new(self.stmt(p)?)),
                _ => return Err(self.unexpected(&p, "if statement")),
            }
        }
        Ok(IfStmt {
            init,
            cond: cond.ok_or_else(|| self.malformed("if condition", span))?,
            then: then.ok_or_else(|| self.malformed("if body", span))?,
            els,
        })
    }

    fn for_stmt(&mut self, pair: Pair<'_, Rule>) -> Result<StmtKind, CheckflowError> {
        let span = get_span(&pair);
        let mut init = None;
        let mut cond = None;
        let mut post = None;
        let mut range = None;
        let mut body = None;

        for p in children(pair) {
            match p.as_rule() {
                Rule::range_clause => range = Some(self.range_clause(p)?),
                Rule::for_clause => {
                    for part in children(p) {
                        match part.as_rule() {
                            Rule::for_init => init = Some(self.header_stmt(part)?),
                            Rule::for_cond => cond = Some(self.first_expr(part)?),
                            Rule::for_post => post = Some(self.header_stmt(part)?),
                            _ => return Err(self.unexpected(&part, "for clause")),
                        }
                    }
                }
                Rule::for_cond => cond = Some(self.first_expr(p)?),
                Rule::block => body = Some(self.block(p)?),
                _ => return Err(self.unexpected(&p, "for statement")),
            }
        }

        let body = body.ok_or_else(|| self.malformed("loop body", span))?;
        Ok(match range {
            Some((key, value, define, x)) => StmtKind::Range {
                key,
                value,
                define,
                x,
                body,
            },
            None => StmtKind::For {
                init,
                cond,
                post,
                body,
            },
        })
    }

    #[allow(clippy::type_complexity)]
    fn range_clause(
        &mut self,
        pair: Pair<'_, Rule>,
    ) -> Result<(Option<Expr>, Option<Expr>, bool, Expr), CheckflowError> {
        let span = get_span(&pair);
        let mut targets = Vec::new();
        let mut define = false;
        let mut x = None;
        for p in children(pair) {
            match p.as_rule() {
                Rule::expr_list_nc => targets = self.expr_list(p)?,
                Rule::range_op => define = p.as_str().trim() == ":=",
                Rule::expr_nc => x = Some(self.expr(p)?),
                _ => return Err(self.unexpected(&p, "range clause")),
            }
        }
        if targets.len() > 2 {
            return Err(self.ctx.syntax_error("range permits at most two iteration variables", span));
        }
        let mut targets = targets.into_iter();
        let key = targets.next();
        let value = targets.next();
        let x = x.ok_or_else(|| self.malformed("range expression", span))?;
        Ok((key, value, define, x))
    }

    fn switch_stmt(&mut self, pair: Pair<'_, Rule>) -> Result<StmtKind, CheckflowError> {
        let mut init = None;
        let mut tag = None;
        let mut clauses = Vec::new();
        for p in children(pair) {
            match p.as_rule() {
                Rule::switch_init => init = Some(self.header_stmt(p)?),
                Rule::switch_tag => tag = Some(self.first_expr(p)?),
                Rule::case_clause => clauses.push(self.case_clause(p)?),
                _ => return Err(self.unexpected(&p, "switch statement")),
            }
        }
        Ok(StmtKind::Switch { init, tag, clauses })
    }

    fn case_clause(&mut self, pair: Pair<'_, Rule>) -> Result<CaseClause, CheckflowError> {
        let span = get_span(&pair);
        let mut values = None;
        let mut body = None;
        for p in children(pair) {
            match p.as_rule() {
                Rule::expr_list => values = Some(self.expr_list(p)?),
                Rule::case_body => body = Some(self.block(p)?),
                _ => return Err(self.unexpected(&p, "case clause")),
            }
        }
        Ok(CaseClause {
            id: self.ids.fresh(),
            span,
            values,
            body: body.ok_or_else(|| self.malformed("case body", span))?,
        })
    }

    // ------------------------------------------------------------------------
    // Node constructors
    // ------------------------------------------------------------------------

    fn ident(&mut self, pair: &Pair<'_, Rule>) -> Ident {
        Ident {
            id: self.ids.fresh(),
            span: get_span(pair),
            name: pair.as_str().trim().to_string(),
        }
    }

    fn ident_list(&mut self, pair: Pair<'_, Rule>) -> Vec<Ident> {
        children(pair).map(|p| self.ident(&p)).collect()
    }

    fn field(&mut self, names: Vec<Ident>, ty: TypeExpr, variadic: bool, span: Span) -> Field {
        Field {
            id: self.ids.fresh(),
            span,
            names,
            ty,
            variadic,
            tag: None,
        }
    }

    // ------------------------------------------------------------------------
    // Pair navigation
    // ------------------------------------------------------------------------

    fn first<'i>(&self, pair: Pair<'i, Rule>, what: &str) -> Result<Pair<'i, Rule>, CheckflowError> {
        let span = get_span(&pair);
        children(pair)
            .next()
            .ok_or_else(|| self.malformed(what, span))
    }

    fn next<'i>(
        &self,
        parts: &mut impl Iterator<Item = Pair<'i, Rule>>,
        what: &str,
        span: Span,
    ) -> Result<Pair<'i, Rule>, CheckflowError> {
        parts.next().ok_or_else(|| self.malformed(what, span))
    }

    fn malformed(&self, what: &str, span: Span) -> CheckflowError {
        self.ctx.internal_error(
            ErrorKind::Syntax {
                message: format!("missing {what}"),
            },
            span,
        )
    }

    fn unexpected(&self, pair: &Pair<'_, Rule>, context: &str) -> CheckflowError {
        self.ctx.internal_error(
            ErrorKind::Syntax {
                message: format!("unexpected {:?} in {context}", pair.as_rule()),
            },
            get_span(pair),
        )
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

/// Inner pairs without the keyword tokens, which carry no information.
fn children<'i>(pair: Pair<'i, Rule>) -> impl Iterator<Item = Pair<'i, Rule>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule()))
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_break
            | Rule::kw_case
            | Rule::kw_const
            | Rule::kw_continue
            | Rule::kw_default
            | Rule::kw_defer
            | Rule::kw_else
            | Rule::kw_fallthrough
            | Rule::kw_for
            | Rule::kw_func
            | Rule::kw_go
            | Rule::kw_if
            | Rule::kw_import
            | Rule::kw_interface
            | Rule::kw_map
            | Rule::kw_package
            | Rule::kw_range
            | Rule::kw_return
            | Rule::kw_struct
            | Rule::kw_switch
            | Rule::kw_type
            | Rule::kw_var
    )
}

/// Span of a pair, excluding the trailing blanks pest leaves inside
/// non-atomic rules.
fn get_span(pair: &Pair<'_, Rule>) -> Span {
    let start = pair.as_span().start();
    Span::new(start, start + pair.as_str().trim_end().len())
}

fn unary_op(text: &str) -> UnaryOp {
    match text.trim() {
        "-" => UnaryOp::Neg,
        "+" => UnaryOp::Pos,
        "!" => UnaryOp::Not,
        "^" => UnaryOp::BitNot,
        "*" => UnaryOp::Deref,
        _ => UnaryOp::Addr,
    }
}

fn unquote(text: &str) -> String {
    text.trim_matches(|c| c == '"' || c == '`').to_string()
}

fn convert_parse_error(error: Error<Rule>, ctx: &dyn ErrorReporting) -> CheckflowError {
    let span = match error.location {
        pest::error::InputLocation::Pos(pos) => Span::new(pos, pos),
        pest::error::InputLocation::Span((start, end)) => Span::new(start, end),
    };
    let message = match &error.variant {
        pest::error::ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
            let expected: Vec<String> = positives.iter().map(describe_rule).collect();
            format!("expected {}", expected.join(" or "))
        }
        pest::error::ErrorVariant::ParsingError { .. } => "unexpected input".to_string(),
        pest::error::ErrorVariant::CustomError { message } => message.clone(),
    };
    ctx.syntax_error(&message, span)
}

fn describe_rule(rule: &Rule) -> String {
    match rule {
        Rule::EOI => "end of input".into(),
        Rule::ident => "identifier".into(),
        Rule::expr | Rule::expr_nc | Rule::expr_list | Rule::expr_list_nc => "expression".into(),
        Rule::type_expr => "type".into(),
        Rule::block => "block".into(),
        Rule::params => "parameter list".into(),
        Rule::binary_op | Rule::assign_op | Rule::incdec_op => "operator".into(),
        other => format!("{:?}", other).replace('_', " "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{PhaseContext, SourceContext};

    fn parse(src: &str) -> Result<File, CheckflowError> {
        let ctx = PhaseContext::new(SourceContext::from_file("test.go", src), "parse");
        parse_file(src, &mut NodeIds::new(), &ctx)
    }

    fn body_of(file: &File, index: usize) -> &[Stmt] {
        match &file.decls[index] {
            Decl::Func(f) => &f.body.as_ref().unwrap().stmts,
            other => panic!("not a function: {:?}", other),
        }
    }

    #[test]
    fn parses_package_and_imports() {
        let file = parse("package main\n\nimport (\n\t\"fmt\"\n\tstd \"errors\"\n)\n").unwrap();
        assert_eq!(file.package.name, "main");
        assert_eq!(file.imports.len(), 2);
        assert_eq!(file.imports[0].local_name(), "fmt");
        assert_eq!(file.imports[1].local_name(), "std");
    }

    #[test]
    fn file_without_package_clause_is_rejected() {
        assert_eq!(parse("func f() {}\n").unwrap_err().kind, ErrorKind::MissingPackage);
        assert_eq!(parse("").unwrap_err().kind, ErrorKind::MissingPackage);
    }

    #[test]
    fn groups_parameter_names() {
        let file = parse("package p\nfunc f(a, b int, s string) (n int, err error) {}\n").unwrap();
        let Decl::Func(f) = &file.decls[0] else { panic!() };
        assert_eq!(f.sig.params.len(), 2);
        assert_eq!(f.sig.params[0].names.len(), 2);
        assert_eq!(f.sig.result_slots().len(), 2);
    }

    #[test]
    fn binary_precedence() {
        let file = parse("package p\nfunc f() { x := 1 + 2*3 == 7 }").unwrap();
        let StmtKind::Assign { rhs, .. } = &body_of(&file, 0)[0].kind else { panic!() };
        let ExprKind::Binary { op, x, .. } = &rhs[0].kind else { panic!() };
        assert_eq!(*op, BinaryOp::Eq);
        assert!(matches!(x.kind, ExprKind::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn composite_literal_not_taken_in_if_header() {
        let file = parse("package p\nfunc f() {\n\tif x == y {\n\t\treturn\n\t}\n}\n").unwrap();
        let StmtKind::If(stmt) = &body_of(&file, 0)[0].kind else { panic!() };
        assert_eq!(stmt.then.stmts.len(), 1);
    }

    #[test]
    fn keywords_do_not_swallow_identifiers() {
        let file = parse("package p\nfunc f() {\n\tgopher := returned\n}\n").unwrap();
        assert!(matches!(body_of(&file, 0)[0].kind, StmtKind::Assign { .. }));
    }

    #[test]
    fn call_spans_start_at_callee() {
        let src = "package p\nfunc f() { _go2check(g()) }";
        let file = parse(src).unwrap();
        let StmtKind::Expr(call) = &body_of(&file, 0)[0].kind else { panic!() };
        assert_eq!(call.span.start, src.find("_go2check").unwrap());
        assert!(call.call_args_of("_go2check").is_some());
    }

    #[test]
    fn comments_are_ignored() {
        let file = parse("package p // pkg\n/* block */\nfunc f() {\n\tx := 1 // one\n}\n").unwrap();
        assert_eq!(body_of(&file, 0).len(), 1);
    }

    #[test]
    fn reports_syntax_errors() {
        let err = parse("package p\nfunc f( {\n").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Syntax { .. }));
    }

    #[test]
    fn parses_standalone_types() {
        let ctx = PhaseContext::new(SourceContext::fallback("stub"), "stubs");
        let ty = parse_type("func(string) (*os.File, error)", &mut NodeIds::new(), &ctx).unwrap();
        let TypeKind::Func(sig) = ty.kind else { panic!() };
        assert_eq!(sig.params.len(), 1);
        assert_eq!(sig.results.len(), 2);
    }
}
