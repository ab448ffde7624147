/*! Tree simplification.

Folds literal arithmetic, drops branches whose condition folds to a literal,
coalesces two-sided single-assignment conditionals into a select, flattens
containers nested directly in containers and removes empty compound blocks.
Running the pass on its own output changes nothing.
*/

use super::{Tree, TreeRef};
use crate::arena::{Arena, Handle};
use crate::ir::{
    AssignOp, BinaryOp, ElseIf, Expr, ExprKind, Literal, Stmt, SwitchCase, UnaryOp, Variable,
};

/// Simplify `src` into a fresh tree.
pub fn simplify(src: TreeRef) -> Tree {
    let mut pass = Simplify {
        src,
        exprs: Arena::new(),
        stmts: Arena::new(),
    };
    let root = pass.rewrite_body(src.root);
    Tree {
        exprs: pass.exprs,
        stmts: pass.stmts,
        root,
    }
}

struct Simplify<'a> {
    src: TreeRef<'a>,
    exprs: Arena<Expr>,
    stmts: Arena<Stmt>,
}

impl Simplify<'_> {
    fn literal(&self, expr: Handle<Expr>) -> Option<Literal> {
        match self.exprs[expr].kind {
            ExprKind::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Copy `expr` into the destination arena, folding bottom-up.
    fn fold_expr(&mut self, expr: Handle<Expr>) -> Handle<Expr> {
        let Expr { ty, ref kind } = self.src.exprs[expr];
        let kind = kind.clone();
        let kind = match kind {
            ExprKind::Binary { op, left, right } => {
                let left = self.fold_expr(left);
                let right = self.fold_expr(right);
                if let (Some(a), Some(b)) = (self.literal(left), self.literal(right)) {
                    if let Some(folded) = eval_binary(op, a, b) {
                        log::trace!("folded {a:?} {op:?} {b:?} -> {folded:?}");
                        return self.exprs.append(Expr {
                            ty,
                            kind: ExprKind::Literal(folded),
                        });
                    }
                }
                ExprKind::Binary { op, left, right }
            }
            ExprKind::Unary { op, expr: operand } => {
                let operand = self.fold_expr(operand);
                if let Some(a) = self.literal(operand) {
                    if let Some(folded) = eval_unary(op, a) {
                        return self.exprs.append(Expr {
                            ty,
                            kind: ExprKind::Literal(folded),
                        });
                    }
                }
                ExprKind::Unary { op, expr: operand }
            }
            ExprKind::Question {
                condition,
                accept,
                reject,
            } => {
                let condition = self.fold_expr(condition);
                if let Some(Literal::Bool(which)) = self.literal(condition) {
                    let chosen = if which { accept } else { reject };
                    return self.fold_expr(chosen);
                }
                let accept = self.fold_expr(accept);
                let reject = self.fold_expr(reject);
                ExprKind::Question {
                    condition,
                    accept,
                    reject,
                }
            }
            ExprKind::Literal(value) => ExprKind::Literal(value),
            ExprKind::Ident(var) => ExprKind::Ident(var),
            ExprKind::Dummy => ExprKind::Dummy,
            ExprKind::MemberSelect { base, index } => ExprKind::MemberSelect {
                base: self.fold_expr(base),
                index,
            },
            ExprKind::Swizzle { base, components } => ExprKind::Swizzle {
                base: self.fold_expr(base),
                components,
            },
            ExprKind::Index { base, index } => ExprKind::Index {
                base: self.fold_expr(base),
                index: self.fold_expr(index),
            },
            ExprKind::Assign { op, target, value } => ExprKind::Assign {
                op,
                target: self.fold_expr(target),
                value: self.fold_expr(value),
            },
            ExprKind::Cast { expr } => ExprKind::Cast {
                expr: self.fold_expr(expr),
            },
            ExprKind::AggrInit {
                target,
                initializers,
            } => ExprKind::AggrInit {
                target: target.map(|t| self.fold_expr(t)),
                initializers: initializers
                    .into_iter()
                    .map(|init| self.fold_expr(init))
                    .collect(),
            },
            ExprKind::CompositeConstruct { components } => ExprKind::CompositeConstruct {
                components: components
                    .into_iter()
                    .map(|component| self.fold_expr(component))
                    .collect(),
            },
            ExprKind::Init { target, value } => ExprKind::Init {
                target: self.fold_expr(target),
                value: self.fold_expr(value),
            },
            ExprKind::Call {
                function,
                arguments,
            } => ExprKind::Call {
                function,
                arguments: arguments.into_iter().map(|a| self.fold_expr(a)).collect(),
            },
            ExprKind::IntrinsicCall {
                intrinsic,
                arguments,
            } => ExprKind::IntrinsicCall {
                intrinsic,
                arguments: arguments.into_iter().map(|a| self.fold_expr(a)).collect(),
            },
            ExprKind::ImageAccess {
                access,
                image,
                arguments,
            } => ExprKind::ImageAccess {
                access,
                image: self.fold_expr(image),
                arguments: arguments.into_iter().map(|a| self.fold_expr(a)).collect(),
            },
            ExprKind::CombinedImageAccess {
                access,
                image,
                arguments,
            } => ExprKind::CombinedImageAccess {
                access,
                image: self.fold_expr(image),
                arguments: arguments.into_iter().map(|a| self.fold_expr(a)).collect(),
            },
            ExprKind::SwitchTest { value } => ExprKind::SwitchTest {
                value: self.fold_expr(value),
            },
            ExprKind::SwitchCase { label } => ExprKind::SwitchCase {
                label: self.fold_expr(label),
            },
            ExprKind::Copy { operand } => ExprKind::Copy {
                operand: self.fold_expr(operand),
            },
            ExprKind::StreamAppend { operand } => ExprKind::StreamAppend {
                operand: self.fold_expr(operand),
            },
        };
        self.exprs.append(Expr { ty, kind })
    }

    /// Rewrite a body container, flattening nested containers into it.
    fn rewrite_body(&mut self, body: Handle<Stmt>) -> Handle<Stmt> {
        let mut out = Vec::new();
        match self.src.stmts[body] {
            Stmt::Container(ref block) => {
                let block = block.clone();
                for child in block {
                    self.rewrite_stmt(child, &mut out);
                }
            }
            _ => self.rewrite_stmt(body, &mut out),
        }
        self.stmts.append(Stmt::Container(out))
    }

    /// The single plain assignment inside a branch body, if that is all the
    /// body holds.
    fn sole_assignment(
        &self,
        body: Handle<Stmt>,
    ) -> Option<(Handle<Variable>, Handle<Expr>)> {
        let Stmt::Container(ref block) = self.src.stmts[body] else {
            return None;
        };
        let [only] = block.as_slice() else {
            return None;
        };
        let Stmt::Simple(expr) = self.src.stmts[*only] else {
            return None;
        };
        let ExprKind::Assign {
            op: AssignOp::Assign,
            target,
            value,
        } = self.src.exprs[expr].kind
        else {
            return None;
        };
        let ExprKind::Ident(var) = self.src.exprs[target].kind else {
            return None;
        };
        Some((var, value))
    }

    fn rewrite_if(
        &mut self,
        condition: Handle<Expr>,
        then_body: Handle<Stmt>,
        else_ifs: &[ElseIf],
        else_body: Option<Handle<Stmt>>,
        out: &mut Vec<Handle<Stmt>>,
    ) {
        let condition = self.fold_expr(condition);
        if let Some(Literal::Bool(which)) = self.literal(condition) {
            log::debug!("dropping dead branch of literal conditional");
            if which {
                self.inline_body(then_body, out);
            } else if let Some((first, rest)) = else_ifs.split_first() {
                self.rewrite_if(first.condition, first.body, rest, else_body, out);
            } else if let Some(else_body) = else_body {
                self.inline_body(else_body, out);
            }
            return;
        }

        // if (c) x = a; else x = b;  =>  x = c ? a : b;
        if else_ifs.is_empty() {
            if let Some(else_body) = else_body {
                if let (Some((var_a, value_a)), Some((var_b, value_b))) =
                    (self.sole_assignment(then_body), self.sole_assignment(else_body))
                {
                    if var_a == var_b {
                        let accept = self.fold_expr(value_a);
                        let reject = self.fold_expr(value_b);
                        let ty = self.exprs[accept].ty;
                        let select = self.exprs.append(Expr {
                            ty,
                            kind: ExprKind::Question {
                                condition,
                                accept,
                                reject,
                            },
                        });
                        let target = self.exprs.append(Expr {
                            ty,
                            kind: ExprKind::Ident(var_a),
                        });
                        let assign = self.exprs.append(Expr {
                            ty,
                            kind: ExprKind::Assign {
                                op: AssignOp::Assign,
                                target,
                                value: select,
                            },
                        });
                        out.push(self.stmts.append(Stmt::Simple(assign)));
                        return;
                    }
                }
            }
        }

        let then_body = self.rewrite_body(then_body);
        let else_ifs = else_ifs
            .iter()
            .map(|else_if| ElseIf {
                condition: self.fold_expr(else_if.condition),
                body: self.rewrite_body(else_if.body),
            })
            .collect();
        let else_body = else_body.map(|body| self.rewrite_body(body));
        out.push(self.stmts.append(Stmt::If {
            condition,
            then_body,
            else_ifs,
            else_body,
        }));
    }

    /// Splice the (rewritten) children of a body container into `out`.
    fn inline_body(&mut self, body: Handle<Stmt>, out: &mut Vec<Handle<Stmt>>) {
        match self.src.stmts[body] {
            Stmt::Container(ref block) => {
                let block = block.clone();
                for child in block {
                    self.rewrite_stmt(child, &mut *out);
                }
            }
            _ => self.rewrite_stmt(body, out),
        }
    }

    fn rewrite_stmt(&mut self, stmt: Handle<Stmt>, out: &mut Vec<Handle<Stmt>>) {
        match self.src.stmts[stmt] {
            // A container directly inside a container adds no structure.
            Stmt::Container(ref block) => {
                let block = block.clone();
                for child in block {
                    self.rewrite_stmt(child, out);
                }
            }
            Stmt::Compound(ref block) => {
                let block = block.clone();
                let mut inner = Vec::new();
                for child in block {
                    self.rewrite_stmt(child, &mut inner);
                }
                if inner.is_empty() {
                    log::trace!("removing empty compound statement");
                    return;
                }
                out.push(self.stmts.append(Stmt::Compound(inner)));
            }
            Stmt::Simple(expr) => {
                let folded = self.fold_expr(expr);
                out.push(self.stmts.append(Stmt::Simple(folded)));
            }
            Stmt::If {
                condition,
                then_body,
                ref else_ifs,
                else_body,
            } => {
                let else_ifs = else_ifs.clone();
                self.rewrite_if(condition, then_body, &else_ifs, else_body, out);
            }
            Stmt::Switch { test, ref cases } => {
                let cases = cases.clone();
                let test = self.fold_expr(test);
                let cases = cases
                    .iter()
                    .map(|case| SwitchCase {
                        label: case.label.map(|label| self.fold_expr(label)),
                        body: self.rewrite_body(case.body),
                    })
                    .collect();
                out.push(self.stmts.append(Stmt::Switch { test, cases }));
            }
            Stmt::For {
                init,
                condition,
                increment,
                body,
            } => {
                let init = self.fold_expr(init);
                let condition = self.fold_expr(condition);
                let increment = self.fold_expr(increment);
                let body = self.rewrite_body(body);
                out.push(self.stmts.append(Stmt::For {
                    init,
                    condition,
                    increment,
                    body,
                }));
            }
            Stmt::While { condition, body } => {
                let condition = self.fold_expr(condition);
                let body = self.rewrite_body(body);
                out.push(self.stmts.append(Stmt::While { condition, body }));
            }
            Stmt::DoWhile { condition, body } => {
                let condition = self.fold_expr(condition);
                let body = self.rewrite_body(body);
                out.push(self.stmts.append(Stmt::DoWhile { condition, body }));
            }
            Stmt::FunctionDecl {
                var,
                ref params,
                body,
                flags,
            } => {
                let params = params.clone();
                let body = self.rewrite_body(body);
                out.push(self.stmts.append(Stmt::FunctionDecl {
                    var,
                    params,
                    body,
                    flags,
                }));
            }
            Stmt::Return(value) => {
                let value = value.map(|value| self.fold_expr(value));
                out.push(self.stmts.append(Stmt::Return(value)));
            }
            Stmt::SpecConstantDecl {
                var,
                location,
                value,
            } => {
                let value = self.fold_expr(value);
                out.push(self.stmts.append(Stmt::SpecConstantDecl {
                    var,
                    location,
                    value,
                }));
            }
            Stmt::PreprocDefine { ref name, expr } => {
                let name = name.clone();
                let expr = self.fold_expr(expr);
                out.push(self.stmts.append(Stmt::PreprocDefine { name, expr }));
            }
            Stmt::PreprocIf { condition } => {
                let condition = self.fold_expr(condition);
                out.push(self.stmts.append(Stmt::PreprocIf { condition }));
            }
            Stmt::PreprocElif { condition } => {
                let condition = self.fold_expr(condition);
                out.push(self.stmts.append(Stmt::PreprocElif { condition }));
            }
            ref other => out.push(self.stmts.append(other.clone())),
        }
    }
}

/// Evaluate a binary operation on two literals of the same kind.
fn eval_binary(op: BinaryOp, left: Literal, right: Literal) -> Option<Literal> {
    use {BinaryOp as Bo, Literal as Li};
    Some(match (left, right) {
        (Li::Bool(a), Li::Bool(b)) => match op {
            Bo::LogicalAnd => Li::Bool(a && b),
            Bo::LogicalOr => Li::Bool(a || b),
            Bo::Equal => Li::Bool(a == b),
            Bo::NotEqual => Li::Bool(a != b),
            _ => return None,
        },
        (Li::I32(a), Li::I32(b)) => eval_int(op, a, b, Li::I32)?,
        (Li::I64(a), Li::I64(b)) => eval_int(op, a, b, Li::I64)?,
        (Li::U32(a), Li::U32(b)) => eval_int(op, a, b, Li::U32)?,
        (Li::U64(a), Li::U64(b)) => eval_int(op, a, b, Li::U64)?,
        (Li::F32(a), Li::F32(b)) => eval_float(op, a, b, Li::F32)?,
        (Li::F64(a), Li::F64(b)) => eval_float(op, a, b, Li::F64)?,
        _ => return None,
    })
}

fn eval_int<T, F>(op: BinaryOp, a: T, b: T, wrap: F) -> Option<Literal>
where
    T: int_ops::Int,
    F: Fn(T) -> Literal,
{
    use BinaryOp as Bo;
    Some(match op {
        Bo::Add => wrap(a.wrapping_add(b)),
        Bo::Subtract => wrap(a.wrapping_sub(b)),
        Bo::Multiply => wrap(a.wrapping_mul(b)),
        Bo::Divide => wrap(a.checked_div(b)?),
        Bo::Modulo => wrap(a.checked_rem(b)?),
        Bo::BitAnd => wrap(a.bitand(b)),
        Bo::BitOr => wrap(a.bitor(b)),
        Bo::BitXor => wrap(a.bitxor(b)),
        Bo::ShiftLeft => wrap(a.shl(b)?),
        Bo::ShiftRight => wrap(a.shr(b)?),
        Bo::Equal => Literal::Bool(a == b),
        Bo::NotEqual => Literal::Bool(a != b),
        Bo::Less => Literal::Bool(a < b),
        Bo::LessEqual => Literal::Bool(a <= b),
        Bo::Greater => Literal::Bool(a > b),
        Bo::GreaterEqual => Literal::Bool(a >= b),
        Bo::LogicalAnd | Bo::LogicalOr => return None,
    })
}

fn eval_float<T, F>(op: BinaryOp, a: T, b: T, wrap: F) -> Option<Literal>
where
    T: Copy
        + PartialOrd
        + PartialEq
        + std::ops::Add<Output = T>
        + std::ops::Sub<Output = T>
        + std::ops::Mul<Output = T>
        + std::ops::Div<Output = T>,
    F: Fn(T) -> Literal,
{
    use BinaryOp as Bo;
    Some(match op {
        Bo::Add => wrap(a + b),
        Bo::Subtract => wrap(a - b),
        Bo::Multiply => wrap(a * b),
        Bo::Divide => wrap(a / b),
        Bo::Equal => Literal::Bool(a == b),
        Bo::NotEqual => Literal::Bool(a != b),
        Bo::Less => Literal::Bool(a < b),
        Bo::LessEqual => Literal::Bool(a <= b),
        Bo::Greater => Literal::Bool(a > b),
        Bo::GreaterEqual => Literal::Bool(a >= b),
        _ => return None,
    })
}

fn eval_unary(op: UnaryOp, value: Literal) -> Option<Literal> {
    use {Literal as Li, UnaryOp as Uo};
    Some(match (op, value) {
        (Uo::Plus, v) => v,
        (Uo::Negate, Li::I32(v)) => Li::I32(v.wrapping_neg()),
        (Uo::Negate, Li::I64(v)) => Li::I64(v.wrapping_neg()),
        (Uo::Negate, Li::F32(v)) => Li::F32(-v),
        (Uo::Negate, Li::F64(v)) => Li::F64(-v),
        (Uo::LogicalNot, Li::Bool(v)) => Li::Bool(!v),
        (Uo::BitNot, Li::I32(v)) => Li::I32(!v),
        (Uo::BitNot, Li::I64(v)) => Li::I64(!v),
        (Uo::BitNot, Li::U32(v)) => Li::U32(!v),
        (Uo::BitNot, Li::U64(v)) => Li::U64(!v),
        _ => return None,
    })
}

/// Minimal integer-operation abstraction for the folder.
mod int_ops {
    pub trait Int: Copy + PartialOrd + PartialEq {
        fn wrapping_add(self, rhs: Self) -> Self;
        fn wrapping_sub(self, rhs: Self) -> Self;
        fn wrapping_mul(self, rhs: Self) -> Self;
        fn checked_div(self, rhs: Self) -> Option<Self>;
        fn checked_rem(self, rhs: Self) -> Option<Self>;
        fn bitand(self, rhs: Self) -> Self;
        fn bitor(self, rhs: Self) -> Self;
        fn bitxor(self, rhs: Self) -> Self;
        fn shl(self, rhs: Self) -> Option<Self>;
        fn shr(self, rhs: Self) -> Option<Self>;
    }

    macro_rules! impl_int {
        ($($t:ty),*) => {$(
            impl Int for $t {
                fn wrapping_add(self, rhs: Self) -> Self { <$t>::wrapping_add(self, rhs) }
                fn wrapping_sub(self, rhs: Self) -> Self { <$t>::wrapping_sub(self, rhs) }
                fn wrapping_mul(self, rhs: Self) -> Self { <$t>::wrapping_mul(self, rhs) }
                fn checked_div(self, rhs: Self) -> Option<Self> { <$t>::checked_div(self, rhs) }
                fn checked_rem(self, rhs: Self) -> Option<Self> { <$t>::checked_rem(self, rhs) }
                fn bitand(self, rhs: Self) -> Self { self & rhs }
                fn bitor(self, rhs: Self) -> Self { self | rhs }
                fn bitxor(self, rhs: Self) -> Self { self ^ rhs }
                fn shl(self, rhs: Self) -> Option<Self> {
                    u32::try_from(rhs).ok().and_then(|s| self.checked_shl(s))
                }
                fn shr(self, rhs: Self) -> Option<Self> {
                    u32::try_from(rhs).ok().and_then(|s| self.checked_shr(s))
                }
            }
        )*};
    }

    impl_int!(i32, i64, u32, u64);
}
