//! Handler bodies: the chain of enclosing handlers, the default handler, and
//! removal of code after the first terminating statement.

use crate::expand::collector::{FuncResults, Handler};
use crate::names::HANDLE_ERR;
use crate::syntax::walk::{rename_ident, renumber_block, renumber_type};
use crate::syntax::*;
use crate::types::{Basic, Type, TypeInfo};

/// Statements run when a check's error is non-nil: copies of the chain's
/// handlers, innermost first, then the default handler, trimmed after the
/// first terminating statement.
pub fn handler_body(
    chain: &[usize],
    handlers: &[Handler],
    err_var: &str,
    default: Stmt,
    ids: &mut NodeIds,
) -> Vec<Stmt> {
    let mut body = Vec::new();
    for handler in chain.iter().filter_map(|&i| handlers.get(i)) {
        let mut copy = handler.body.clone();
        renumber_block(&mut copy, ids);
        rename_ident(&mut copy, HANDLE_ERR, err_var);
        body.extend(copy.stmts);
    }
    body.push(default);
    trim_terminating(&mut body);
    body
}

/// `return <zeros>, err` when the function's last result is `error`,
/// `panic(err)` otherwise.
pub fn default_handler(results: &FuncResults, info: &TypeInfo, err_var: &str, ids: &mut NodeIds) -> Stmt {
    let Some((last, rest)) = results.slots.split_last() else {
        return panic_stmt(err_var, ids);
    };
    let returns_error = match info.type_of(last.id) {
        Some(ty) => ty.is_error(),
        None => last.is_named("error"),
    };
    if !returns_error {
        return panic_stmt(err_var, ids);
    }

    let mut values: Vec<Expr> = rest.iter().map(|slot| zero_value(slot, info, ids)).collect();
    values.push(Expr::ident(ids, err_var));
    Stmt::new(ids, StmtKind::Return(values))
}

fn panic_stmt(err_var: &str, ids: &mut NodeIds) -> Stmt {
    let arg = Expr::ident(ids, err_var);
    let call = Expr::call(ids, "panic", vec![arg]);
    Stmt::new(ids, StmtKind::Expr(call))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Zero {
    False,
    EmptyString,
    Number,
    /// `T{}` spelled with the declared result type.
    Composite,
    Nil,
}

/// Zero value of a declared result type.
pub fn zero_value(slot: &TypeExpr, info: &TypeInfo, ids: &mut NodeIds) -> Expr {
    let zero = match info.type_of(slot.id) {
        Some(ty) => zero_of_type(ty, info),
        None => zero_of_syntax(slot),
    };
    match zero {
        Zero::False => Expr::ident(ids, "false"),
        Zero::EmptyString => Expr::new(ids, ExprKind::Lit(LitKind::String, "\"\"".into())),
        Zero::Number => Expr::new(ids, ExprKind::Lit(LitKind::Int, "0".into())),
        Zero::Composite => {
            let mut ty = slot.clone();
            renumber_type(&mut ty, ids);
            Expr::new(
                ids,
                ExprKind::Composite {
                    ty: Some(Box::new(ty)),
                    elts: Vec::new(),
                },
            )
        }
        Zero::Nil => Expr::ident(ids, "nil"),
    }
}

fn zero_of_type(ty: &Type, info: &TypeInfo) -> Zero {
    match info.underlying(ty) {
        Some(Type::Basic(b)) => zero_of_basic(*b),
        Some(Type::Struct(_)) | Some(Type::Array(..)) => Zero::Composite,
        _ => Zero::Nil,
    }
}

fn zero_of_basic(b: Basic) -> Zero {
    if b.is_boolean() {
        Zero::False
    } else if b.is_string() {
        Zero::EmptyString
    } else if b == Basic::UntypedNil {
        Zero::Nil
    } else {
        Zero::Number
    }
}

/// Used when the checker could not resolve the result type.
fn zero_of_syntax(slot: &TypeExpr) -> Zero {
    match &slot.kind {
        TypeKind::Name { package: None, name } => match Basic::from_name(name) {
            Some(b) => zero_of_basic(b),
            None => Zero::Nil,
        },
        TypeKind::Struct(_) | TypeKind::Array { len: Some(_), .. } => Zero::Composite,
        _ => Zero::Nil,
    }
}

/// Drops every statement after the first terminating one, recursing into
/// nested blocks first.
pub fn trim_terminating(stmts: &mut Vec<Stmt>) {
    for (i, stmt) in stmts.iter_mut().enumerate() {
        trim_nested(stmt);
        if is_terminating(stmt) {
            stmts.truncate(i + 1);
            return;
        }
    }
}

fn trim_nested(stmt: &mut Stmt) {
    match &mut stmt.kind {
        StmtKind::Block(block) => trim_terminating(&mut block.stmts),
        StmtKind::If(if_stmt) => {
            trim_terminating(&mut if_stmt.then.stmts);
            if let Some(els) = &mut if_stmt.els {
                trim_nested(els);
            }
        }
        StmtKind::For { body, .. } | StmtKind::Range { body, .. } => trim_terminating(&mut body.stmts),
        StmtKind::Switch { clauses, .. } => {
            for clause in clauses {
                trim_terminating(&mut clause.body.stmts);
            }
        }
        _ => {}
    }
}

/// `return`, a call to `panic`, a block containing a terminating statement,
/// or an `if` with an `else` whose branches both terminate.
pub fn is_terminating(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Return(_) => true,
        StmtKind::Expr(expr) => expr.call_args_of("panic").is_some(),
        StmtKind::Block(block) => block.stmts.iter().any(is_terminating),
        StmtKind::If(IfStmt {
            then,
            els: Some(els),
            ..
        }) => then.stmts.iter().any(is_terminating) && is_terminating(els),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::printer::print_stmt;
    use crate::types::NamedInfo;

    fn ret(ids: &mut NodeIds, name: &str) -> Stmt {
        let value = Expr::ident(ids, name);
        Stmt::new(ids, StmtKind::Return(vec![value]))
    }

    fn call_stmt(ids: &mut NodeIds, fun: &str) -> Stmt {
        let call = Expr::call(ids, fun, vec![]);
        Stmt::new(ids, StmtKind::Expr(call))
    }

    fn name_type(ids: &mut NodeIds, name: &str) -> TypeExpr {
        TypeExpr {
            id: ids.fresh(),
            span: Span::synthetic(),
            kind: TypeKind::Name {
                package: None,
                name: name.into(),
            },
        }
    }

    #[test]
    fn trims_after_return() {
        let mut ids = NodeIds::new();
        let mut stmts = vec![
            call_stmt(&mut ids, "log"),
            ret(&mut ids, "err"),
            call_stmt(&mut ids, "unreachable"),
        ];
        trim_terminating(&mut stmts);
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn if_without_else_never_terminates() {
        let mut ids = NodeIds::new();
        let ret_a = ret(&mut ids, "a");
        let then = Block::new(&mut ids, vec![ret_a]);
        let cond = Expr::ident(&mut ids, "ok");
        let if_only = Stmt::new(
            &mut ids,
            StmtKind::If(IfStmt {
                init: None,
                cond: cond.clone(),
                then: then.clone(),
                els: None,
            }),
        );
        assert!(!is_terminating(&if_only));

        let panic_call = call_stmt(&mut ids, "panic");
        let panic_block = Block::new(&mut ids, vec![panic_call]);
        let els = Stmt::new(&mut ids, StmtKind::Block(panic_block));
        let if_else = Stmt::new(
            &mut ids,
            StmtKind::If(IfStmt {
                init: None,
                cond,
                then,
                els: Some(Box::new(els)),
            }),
        );
        assert!(is_terminating(&if_else));
    }

    #[test]
    fn nested_blocks_are_trimmed() {
        let mut ids = NodeIds::new();
        let inner_stmts = vec![ret(&mut ids, "x"), call_stmt(&mut ids, "dead")];
        let inner = Block::new(&mut ids, inner_stmts);
        let mut stmts = vec![
            Stmt::new(&mut ids, StmtKind::Block(inner)),
            call_stmt(&mut ids, "dead"),
        ];
        trim_terminating(&mut stmts);
        assert_eq!(stmts.len(), 1);
        let StmtKind::Block(block) = &stmts[0].kind else { panic!() };
        assert_eq!(block.stmts.len(), 1);
    }

    #[test]
    fn default_handler_returns_zero_values() {
        let mut ids = NodeIds::new();
        let slots = vec![
            name_type(&mut ids, "int"),
            name_type(&mut ids, "string"),
            name_type(&mut ids, "bool"),
            name_type(&mut ids, "T"),
            name_type(&mut ids, "error"),
        ];
        let mut info = TypeInfo::default();
        info.types.insert(slots[0].id, Type::Basic(Basic::Int));
        info.types.insert(slots[1].id, Type::Basic(Basic::String));
        info.types.insert(slots[2].id, Type::Basic(Basic::Bool));
        info.types.insert(slots[3].id, Type::named("main", "T"));
        info.types.insert(slots[4].id, Type::error());
        info.named.insert(
            "main.T".into(),
            NamedInfo {
                underlying: Some(Type::Struct(Vec::new())),
                methods: Default::default(),
            },
        );

        let stmt = default_handler(&FuncResults { slots }, &info, "_go2error0", &mut ids);
        assert_eq!(print_stmt(&stmt), "return 0, \"\", false, T{}, _go2error0");
    }

    #[test]
    fn default_handler_panics_without_error_result() {
        let mut ids = NodeIds::new();
        let none = FuncResults { slots: Vec::new() };
        let stmt = default_handler(&none, &TypeInfo::default(), "_go2error0", &mut ids);
        assert_eq!(print_stmt(&stmt), "panic(_go2error0)");

        let slots = vec![name_type(&mut ids, "int")];
        let stmt = default_handler(&FuncResults { slots }, &TypeInfo::default(), "e", &mut ids);
        assert_eq!(print_stmt(&stmt), "panic(e)");
    }

    #[test]
    fn unresolved_results_fall_back_to_syntax() {
        let mut ids = NodeIds::new();
        let slots = vec![name_type(&mut ids, "float64"), name_type(&mut ids, "Unknown"), name_type(&mut ids, "error")];
        let stmt = default_handler(&FuncResults { slots }, &TypeInfo::default(), "e", &mut ids);
        assert_eq!(print_stmt(&stmt), "return 0, nil, e");
    }
}
