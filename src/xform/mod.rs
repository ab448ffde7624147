/*! IR transform pipeline.

Every backend runs the same sequence before emission:

1. [`ssa::transform_ssa`] — version mutated variables into single-assignment
   form and lift assignments into initialised declarations where possible.
2. [`simplify::simplify`] — constant folding, dead-branch elimination, select
   coalescing, container flattening.
3. [`resolve::resolve_constants`] — substitute static-constant references
   with their definitions.
4. A backend adapter (under [`crate::back`]) rewriting the tree into target
   idioms.
5. [`simplify::simplify`] again, since adaptation can reintroduce redundant
   structure.

Each pass consumes a source tree and produces a fresh [`Tree`] with its own
arenas; the input is never mutated. Dropping an intermediate tree drops all
its nodes at once.
*/

pub mod resolve;
pub mod simplify;
pub mod ssa;

pub use resolve::resolve_constants;
pub use simplify::simplify;
pub use ssa::{transform_ssa, SsaData};

use crate::arena::{Arena, Handle};
use crate::ir::{Expr, ExprKind, Shader, Stmt, Variable};
use crate::FastHashMap;

/// A statement tree with the arenas that own its nodes.
#[derive(Debug)]
pub struct Tree {
    pub exprs: Arena<Expr>,
    pub stmts: Arena<Stmt>,
    pub root: Handle<Stmt>,
}

/// Borrowed view of a source tree.
#[derive(Clone, Copy)]
pub struct TreeRef<'a> {
    pub exprs: &'a Arena<Expr>,
    pub stmts: &'a Arena<Stmt>,
    pub root: Handle<Stmt>,
}

impl<'a> TreeRef<'a> {
    pub fn of_shader(shader: &'a Shader) -> Self {
        TreeRef {
            exprs: &shader.exprs,
            stmts: &shader.stmts,
            root: shader.root(),
        }
    }

    pub fn of_tree(tree: &'a Tree) -> Self {
        TreeRef {
            exprs: &tree.exprs,
            stmts: &tree.stmts,
            root: tree.root,
        }
    }
}

/// Identifier substitutions applied while copying an expression tree.
#[derive(Default)]
pub(crate) struct Subst {
    /// Replace an identifier with another variable.
    pub vars: FastHashMap<Handle<Variable>, Handle<Variable>>,
    /// Replace an identifier with a copy of a source-arena expression.
    pub exprs: FastHashMap<Handle<Variable>, Handle<Expr>>,
    /// Replace an identifier with a node already in the destination arena.
    pub dst: FastHashMap<Handle<Variable>, Handle<Expr>>,
}

/// Deep-copy `stmt` and everything below it into fresh arenas, applying
/// `subst` to identifiers along the way.
pub(crate) fn copy_stmt(
    src: TreeRef,
    dst_exprs: &mut Arena<Expr>,
    dst_stmts: &mut Arena<Stmt>,
    subst: &Subst,
    stmt: Handle<Stmt>,
) -> Handle<Stmt> {
    let copied = match src.stmts[stmt] {
        Stmt::Container(ref block) => {
            let block = block.clone();
            Stmt::Container(
                block
                    .iter()
                    .map(|&child| copy_stmt(src, dst_exprs, dst_stmts, subst, child))
                    .collect(),
            )
        }
        Stmt::Compound(ref block) => {
            let block = block.clone();
            Stmt::Compound(
                block
                    .iter()
                    .map(|&child| copy_stmt(src, dst_exprs, dst_stmts, subst, child))
                    .collect(),
            )
        }
        Stmt::Simple(expr) => Stmt::Simple(remap_expr(src.exprs, dst_exprs, subst, expr)),
        Stmt::Return(value) => {
            Stmt::Return(value.map(|value| remap_expr(src.exprs, dst_exprs, subst, value)))
        }
        Stmt::If {
            condition,
            then_body,
            ref else_ifs,
            else_body,
        } => {
            let else_ifs = else_ifs.clone();
            Stmt::If {
                condition: remap_expr(src.exprs, dst_exprs, subst, condition),
                then_body: copy_stmt(src, dst_exprs, dst_stmts, subst, then_body),
                else_ifs: else_ifs
                    .iter()
                    .map(|else_if| crate::ir::ElseIf {
                        condition: remap_expr(src.exprs, dst_exprs, subst, else_if.condition),
                        body: copy_stmt(src, dst_exprs, dst_stmts, subst, else_if.body),
                    })
                    .collect(),
                else_body: else_body.map(|body| copy_stmt(src, dst_exprs, dst_stmts, subst, body)),
            }
        }
        Stmt::Switch { test, ref cases } => {
            let cases = cases.clone();
            Stmt::Switch {
                test: remap_expr(src.exprs, dst_exprs, subst, test),
                cases: cases
                    .iter()
                    .map(|case| crate::ir::SwitchCase {
                        label: case
                            .label
                            .map(|label| remap_expr(src.exprs, dst_exprs, subst, label)),
                        body: copy_stmt(src, dst_exprs, dst_stmts, subst, case.body),
                    })
                    .collect(),
            }
        }
        Stmt::For {
            init,
            condition,
            increment,
            body,
        } => Stmt::For {
            init: remap_expr(src.exprs, dst_exprs, subst, init),
            condition: remap_expr(src.exprs, dst_exprs, subst, condition),
            increment: remap_expr(src.exprs, dst_exprs, subst, increment),
            body: copy_stmt(src, dst_exprs, dst_stmts, subst, body),
        },
        Stmt::While { condition, body } => Stmt::While {
            condition: remap_expr(src.exprs, dst_exprs, subst, condition),
            body: copy_stmt(src, dst_exprs, dst_stmts, subst, body),
        },
        Stmt::DoWhile { condition, body } => Stmt::DoWhile {
            condition: remap_expr(src.exprs, dst_exprs, subst, condition),
            body: copy_stmt(src, dst_exprs, dst_stmts, subst, body),
        },
        Stmt::FunctionDecl {
            var,
            ref params,
            body,
            flags,
        } => {
            let params = params.clone();
            Stmt::FunctionDecl {
                var,
                params,
                body: copy_stmt(src, dst_exprs, dst_stmts, subst, body),
                flags,
            }
        }
        Stmt::SpecConstantDecl {
            var,
            location,
            value,
        } => Stmt::SpecConstantDecl {
            var,
            location,
            value: remap_expr(src.exprs, dst_exprs, subst, value),
        },
        Stmt::PreprocDefine { ref name, expr } => {
            let name = name.clone();
            Stmt::PreprocDefine {
                name,
                expr: remap_expr(src.exprs, dst_exprs, subst, expr),
            }
        }
        Stmt::PreprocIf { condition } => Stmt::PreprocIf {
            condition: remap_expr(src.exprs, dst_exprs, subst, condition),
        },
        Stmt::PreprocElif { condition } => Stmt::PreprocElif {
            condition: remap_expr(src.exprs, dst_exprs, subst, condition),
        },
        ref other => other.clone(),
    };
    dst_stmts.append(copied)
}

/// Deep-copy `expr` from `src` into `dst`, applying `subst` to identifiers.
pub(crate) fn remap_expr(
    src: &Arena<Expr>,
    dst: &mut Arena<Expr>,
    subst: &Subst,
    expr: Handle<Expr>,
) -> Handle<Expr> {
    let Expr { ty, ref kind } = src[expr];
    let kind = match *kind {
        ExprKind::Literal(value) => ExprKind::Literal(value),
        ExprKind::Ident(var) => {
            if let Some(&replacement) = subst.dst.get(&var) {
                return replacement;
            }
            if let Some(&replacement) = subst.exprs.get(&var) {
                return remap_expr(src, dst, &Subst::default(), replacement);
            }
            ExprKind::Ident(subst.vars.get(&var).copied().unwrap_or(var))
        }
        ExprKind::Dummy => ExprKind::Dummy,
        ExprKind::MemberSelect { base, index } => ExprKind::MemberSelect {
            base: remap_expr(src, dst, subst, base),
            index,
        },
        ExprKind::Swizzle {
            base,
            ref components,
        } => ExprKind::Swizzle {
            base: remap_expr(src, dst, subst, base),
            components: components.clone(),
        },
        ExprKind::Index { base, index } => ExprKind::Index {
            base: remap_expr(src, dst, subst, base),
            index: remap_expr(src, dst, subst, index),
        },
        ExprKind::Binary { op, left, right } => ExprKind::Binary {
            op,
            left: remap_expr(src, dst, subst, left),
            right: remap_expr(src, dst, subst, right),
        },
        ExprKind::Unary { op, expr } => ExprKind::Unary {
            op,
            expr: remap_expr(src, dst, subst, expr),
        },
        ExprKind::Assign { op, target, value } => ExprKind::Assign {
            op,
            target: remap_target(src, dst, subst, target),
            value: remap_expr(src, dst, subst, value),
        },
        ExprKind::Cast { expr } => ExprKind::Cast {
            expr: remap_expr(src, dst, subst, expr),
        },
        ExprKind::Question {
            condition,
            accept,
            reject,
        } => ExprKind::Question {
            condition: remap_expr(src, dst, subst, condition),
            accept: remap_expr(src, dst, subst, accept),
            reject: remap_expr(src, dst, subst, reject),
        },
        ExprKind::AggrInit {
            target,
            ref initializers,
        } => ExprKind::AggrInit {
            target: target.map(|t| remap_expr(src, dst, subst, t)),
            initializers: initializers
                .iter()
                .map(|&init| remap_expr(src, dst, subst, init))
                .collect(),
        },
        ExprKind::CompositeConstruct { ref components } => ExprKind::CompositeConstruct {
            components: components
                .iter()
                .map(|&component| remap_expr(src, dst, subst, component))
                .collect(),
        },
        ExprKind::Init { target, value } => ExprKind::Init {
            target: remap_target(src, dst, subst, target),
            value: remap_expr(src, dst, subst, value),
        },
        ExprKind::Call {
            function,
            ref arguments,
        } => ExprKind::Call {
            function,
            arguments: arguments
                .iter()
                .map(|&a| remap_expr(src, dst, subst, a))
                .collect(),
        },
        ExprKind::IntrinsicCall {
            intrinsic,
            ref arguments,
        } => ExprKind::IntrinsicCall {
            intrinsic,
            arguments: arguments
                .iter()
                .map(|&a| remap_expr(src, dst, subst, a))
                .collect(),
        },
        ExprKind::ImageAccess {
            access,
            image,
            ref arguments,
        } => ExprKind::ImageAccess {
            access,
            image: remap_expr(src, dst, subst, image),
            arguments: arguments
                .iter()
                .map(|&a| remap_expr(src, dst, subst, a))
                .collect(),
        },
        ExprKind::CombinedImageAccess {
            access,
            image,
            ref arguments,
        } => ExprKind::CombinedImageAccess {
            access,
            image: remap_expr(src, dst, subst, image),
            arguments: arguments
                .iter()
                .map(|&a| remap_expr(src, dst, subst, a))
                .collect(),
        },
        ExprKind::SwitchTest { value } => ExprKind::SwitchTest {
            value: remap_expr(src, dst, subst, value),
        },
        ExprKind::SwitchCase { label } => ExprKind::SwitchCase {
            label: remap_expr(src, dst, subst, label),
        },
        ExprKind::Copy { operand } => ExprKind::Copy {
            operand: remap_expr(src, dst, subst, operand),
        },
        ExprKind::StreamAppend { operand } => ExprKind::StreamAppend {
            operand: remap_expr(src, dst, subst, operand),
        },
    };
    dst.append(Expr { ty, kind })
}

/// Copy an assignment target. A stored-to identifier is renamed but never
/// replaced by a defining expression.
fn remap_target(
    src: &Arena<Expr>,
    dst: &mut Arena<Expr>,
    subst: &Subst,
    target: Handle<Expr>,
) -> Handle<Expr> {
    match src[target].kind {
        ExprKind::Ident(var) => {
            let ty = src[target].ty;
            dst.append(Expr {
                ty,
                kind: ExprKind::Ident(subst.vars.get(&var).copied().unwrap_or(var)),
            })
        }
        _ => remap_expr(src, dst, subst, target),
    }
}
