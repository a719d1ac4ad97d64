//! One expansion pass over a marked file.
//!
//! Checks are visited in post-order, so an inner check is always expanded
//! before the check that contains it. Expanding a check is atomic: either
//! the binding, the use site and the handler all change, or nothing does.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::errors::{CheckflowError, ErrorKind, ErrorReporting, PhaseContext};
use crate::expand::collector::{CheckBinding, Collected};
use crate::expand::handlers::{default_handler, handler_body};
use crate::names::CHECK_FUNC;
use crate::syntax::walk::{walk_file, ExprAction, ExprContext, Slot, StmtAction, VisitMut};
use crate::syntax::*;
use crate::types::{type_to_var, Type, TypeInfo};

/// Expands every pending check of file `file_index` whose type is known.
/// Returns how many checks were expanded.
pub fn expand_file(
    file: &mut File,
    file_index: usize,
    ctx: &PhaseContext,
    state: &mut Collected,
    spliced: &mut HashSet<NodeId>,
    info: &TypeInfo,
    ids: &mut NodeIds,
) -> Result<usize, CheckflowError> {
    let mut expander = Expander {
        file_index,
        ctx,
        state,
        spliced,
        info,
        ids,
        interrupted: HashSet::new(),
        preludes: HashMap::new(),
        removals: HashSet::new(),
        expanded: 0,
    };
    walk_file(&mut expander, file)?;
    Ok(expander.expanded)
}

/// Names of the values a check yields, one per result: sanitized type names
/// ending in `error`. A single declared interface type counts as the error.
pub fn result_names(ty: &Type, info: &TypeInfo) -> Result<Vec<String>, ErrorKind> {
    match ty {
        Type::Tuple(items) => {
            let Some(last) = items.last() else {
                return Err(ErrorKind::NoResults);
            };
            if !last.is_error() {
                return Err(ErrorKind::LastNotError {
                    found: last.to_string(),
                });
            }
            Ok(items.iter().map(|t| type_to_var(&t.to_string())).collect())
        }
        single if single.is_error() => Ok(vec!["error".into()]),
        named @ Type::Named { .. } if matches!(info.underlying(named), Some(Type::Interface(_))) => {
            Ok(vec!["error".into()])
        }
        Type::Basic(b) if b.is_untyped() => Err(ErrorKind::UnsupportedType {
            found: b.name().into(),
        }),
        other => Err(ErrorKind::LastNotError {
            found: other.to_string(),
        }),
    }
}

struct Expander<'a> {
    file_index: usize,
    ctx: &'a PhaseContext,
    state: &'a mut Collected,
    /// Lists that already received a multi-value splice.
    spliced: &'a mut HashSet<NodeId>,
    info: &'a TypeInfo,
    ids: &'a mut NodeIds,
    /// Statements holding a check that could not be typed this pass.
    interrupted: HashSet<NodeId>,
    preludes: HashMap<NodeId, Vec<Stmt>>,
    removals: HashSet<NodeId>,
    expanded: usize,
}

impl Expander<'_> {
    fn expand(
        &mut self,
        expr: &mut Expr,
        ctx: ExprContext,
        binding: CheckBinding,
        ty: Type,
    ) -> Result<ExprAction, CheckflowError> {
        let kinds = result_names(&ty, self.info).map_err(|kind| self.ctx.report_at(kind, expr.span))?;

        let scope = self.state.scopes.entry(binding.block).or_default();
        let mut names: Vec<String> = kinds.iter().map(|kind| scope.allocate(kind)).collect();
        let err_var = names.pop().unwrap_or_default();
        let values = names;

        let checked = match expr.call_args_of_mut(CHECK_FUNC) {
            Some(args) if args.len() == 1 => args.remove(0),
            _ => {
                return Err(self.ctx.internal_error(
                    ErrorKind::MarkerMisaligned {
                        marker: "check".into(),
                        expected: "a call with one argument".into(),
                        found: "a rewritten expression".into(),
                    },
                    expr.span,
                ))
            }
        };

        let (lhs, action) = match ctx.slot {
            Slot::ExprStmt => {
                self.removals.insert(binding.stmt);
                let discard = vec!["_".to_string(); values.len()];
                (discard, ExprAction::Keep)
            }
            Slot::List { list, kind } if values.len() >= 2 => {
                if !self.spliced.insert(list) {
                    return Err(self.ctx.report_at(
                        ErrorKind::MultipleMultiValue {
                            context: kind.describe().into(),
                        },
                        expr.span,
                    ));
                }
                let idents = values.iter().map(|v| Expr::ident(self.ids, v.as_str())).collect();
                (values, ExprAction::Splice(idents))
            }
            Slot::Single if values.len() >= 2 => {
                return Err(self.ctx.report_at(ErrorKind::MultiValueContext, expr.span));
            }
            _ => {
                // A lone error result stands in for the value itself.
                let name = values.first().unwrap_or(&err_var).clone();
                let replacement = Expr::ident(self.ids, name);
                (values, ExprAction::Replace(replacement))
            }
        };

        let prelude = self.prelude(&binding, lhs, &err_var, checked);
        self.preludes.entry(binding.stmt).or_default().extend(prelude);
        self.expanded += 1;
        debug!(check = binding.id.0, err = %err_var, handlers = binding.chain.len(), "expanded check");
        Ok(action)
    }

    /// `names, err := expr` followed by `if err != nil { handlers }`.
    fn prelude(&mut self, binding: &CheckBinding, mut lhs: Vec<String>, err_var: &str, checked: Expr) -> [Stmt; 2] {
        let ids = &mut *self.ids;
        lhs.push(err_var.to_string());
        let lhs = lhs.into_iter().map(|name| Expr::ident(ids, name)).collect();
        let assign = Stmt::new(
            ids,
            StmtKind::Assign {
                lhs,
                op: AssignOp::Define,
                rhs: vec![checked],
            },
        );

        let default = match self.state.funcs.get(binding.func) {
            Some(results) => default_handler(results, self.info, err_var, ids),
            None => default_handler(&Default::default(), self.info, err_var, ids),
        };
        let body = handler_body(&binding.chain, &self.state.handlers, err_var, default, ids);
        let x = Expr::ident(ids, err_var);
        let y = Expr::ident(ids, "nil");
        let cond = Expr::new(
            ids,
            ExprKind::Binary {
                op: BinaryOp::Ne,
                x: Box::new(x),
                y: Box::new(y),
            },
        );
        let then = Block::new(ids, body);
        let guard = Stmt::new(
            ids,
            StmtKind::If(IfStmt {
                init: None,
                cond,
                then,
                els: None,
            }),
        );
        [assign, guard]
    }
}

impl VisitMut for Expander<'_> {
    type Error = CheckflowError;

    fn exit_stmt(&mut self, stmt: &mut Stmt) -> Result<StmtAction, CheckflowError> {
        Ok(StmtAction {
            prelude: self.preludes.remove(&stmt.id).unwrap_or_default(),
            remove: self.removals.remove(&stmt.id),
        })
    }

    fn exit_expr(&mut self, expr: &mut Expr, ctx: ExprContext) -> Result<ExprAction, CheckflowError> {
        let Some(binding) = self.state.checks.get(&expr.id) else {
            return Ok(ExprAction::Keep);
        };
        if binding.file != self.file_index || self.interrupted.contains(&binding.stmt) {
            return Ok(ExprAction::Keep);
        }
        let Some(ty) = self.info.type_of(expr.id).cloned() else {
            self.interrupted.insert(binding.stmt);
            return Ok(ExprAction::Keep);
        };
        let Some(binding) = self.state.checks.remove(&expr.id) else {
            return Ok(ExprAction::Keep);
        };
        self.expand(expr, ctx, binding, ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Basic, NamedInfo};

    #[test]
    fn names_follow_result_types() {
        let tuple = Type::Tuple(vec![
            Type::Pointer(Box::new(Type::named("os", "File"))),
            Type::Basic(Basic::Int),
            Type::error(),
        ]);
        let info = TypeInfo::default();
        assert_eq!(result_names(&tuple, &info).unwrap(), vec!["ptrFile", "int", "error"]);
        assert_eq!(result_names(&Type::error(), &info).unwrap(), vec!["error"]);
    }

    #[test]
    fn rejects_non_error_results() {
        let info = TypeInfo::default();
        assert_eq!(result_names(&Type::Tuple(vec![]), &info), Err(ErrorKind::NoResults));
        let found = result_names(&Type::Tuple(vec![Type::error(), Type::Basic(Basic::Int)]), &info);
        assert_eq!(found, Err(ErrorKind::LastNotError { found: "int".into() }));
        assert!(matches!(
            result_names(&Type::Basic(Basic::Bool), &info),
            Err(ErrorKind::LastNotError { .. })
        ));
    }

    #[test]
    fn single_declared_interface_counts_as_the_error() {
        let mut info = TypeInfo::default();
        let declare = |underlying: Type| NamedInfo {
            underlying: Some(underlying),
            methods: Default::default(),
        };
        info.named.insert("main.Fault".into(), declare(Type::Interface(Default::default())));
        info.named.insert("main.Code".into(), declare(Type::Basic(Basic::Int)));

        assert_eq!(result_names(&Type::named("main", "Fault"), &info).unwrap(), vec!["error"]);
        assert_eq!(
            result_names(&Type::named("main", "Code"), &info),
            Err(ErrorKind::LastNotError { found: "main.Code".into() })
        );
        assert!(result_names(&Type::named("main", "Unknown"), &info).is_err());
        // Within a tuple only `error` itself may come last.
        let pair = Type::Tuple(vec![Type::Basic(Basic::Int), Type::named("main", "Fault")]);
        assert!(matches!(result_names(&pair, &info), Err(ErrorKind::LastNotError { .. })));
    }
}
