/*! Static constant resolution.

Finds the definitions of static constants (declaration-with-initialiser of a
variable flagged `STATIC | CONSTANT`) and substitutes every later reference
with a copy of the defining expression. Definitions whose value is not a
literal are left alone; backends that understand named constants print the
declarations as-is.
*/

use super::{copy_stmt, Subst, Tree, TreeRef};
use crate::arena::{Arena, Handle};
use crate::ir::{Expr, ExprKind, Stmt, VarFlags, Variable};

/// Substitute static-constant references with their definitions.
pub fn resolve_constants(src: TreeRef, variables: &Arena<Variable>) -> Tree {
    let mut subst = Subst::default();
    collect(src, variables, src.root, &mut subst);
    let mut exprs = Arena::new();
    let mut stmts = Arena::new();
    let root = copy_stmt(src, &mut exprs, &mut stmts, &subst, src.root);
    Tree { exprs, stmts, root }
}

fn collect(src: TreeRef, variables: &Arena<Variable>, stmt: Handle<Stmt>, subst: &mut Subst) {
    match src.stmts[stmt] {
        Stmt::Container(ref block) | Stmt::Compound(ref block) => {
            for &child in block {
                collect(src, variables, child, subst);
            }
        }
        Stmt::Simple(expr) => {
            let ExprKind::Init { target, value } = src.exprs[expr].kind else {
                return;
            };
            let ExprKind::Ident(var) = src.exprs[target].kind else {
                return;
            };
            let flags = variables[var].flags;
            if flags.contains(VarFlags::STATIC | VarFlags::CONSTANT)
                && is_resolvable(src.exprs, value)
            {
                log::trace!("resolving static constant [{}]", variables[var].name);
                subst.exprs.insert(var, value);
            }
        }
        _ => {}
    }
}

/// Only literal-built values are worth inlining at every use site.
fn is_resolvable(exprs: &Arena<Expr>, expr: Handle<Expr>) -> bool {
    match exprs[expr].kind {
        ExprKind::Literal(_) => true,
        ExprKind::CompositeConstruct { ref components } => components
            .iter()
            .all(|&component| is_resolvable(exprs, component)),
        _ => false,
    }
}
