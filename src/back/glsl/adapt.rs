//! GLSL-specific IR adaptation.
//!
//! Stream appends split into the evaluated store plus an `EmitVertex()`
//! call, and specialisation constants fall back to macro definitions when
//! the configuration disallows `constant_id` declarations. Identifier
//! references keep their names, so macro fallbacks resolve textually.

use super::Options;
use crate::arena::{Arena, Handle};
use crate::ir::{
    expr::Intrinsic, ElseIf, Expr, ExprKind, Stmt, SwitchCase, Variable,
};
use crate::xform::{remap_expr, Subst, Tree, TreeRef};

/// Rewrite `src` into the forms the GLSL writer prints directly.
pub fn adapt(src: TreeRef, variables: &Arena<Variable>, options: &Options) -> Tree {
    let mut pass = Adapt {
        src,
        variables,
        options,
        exprs: Arena::new(),
        stmts: Arena::new(),
        subst: Subst::default(),
    };
    let root = pass.rewrite_body(src.root);
    Tree {
        exprs: pass.exprs,
        stmts: pass.stmts,
        root,
    }
}

struct Adapt<'a> {
    src: TreeRef<'a>,
    variables: &'a Arena<Variable>,
    options: &'a Options,
    exprs: Arena<Expr>,
    stmts: Arena<Stmt>,
    subst: Subst,
}

impl Adapt<'_> {
    fn remap(&mut self, expr: Handle<Expr>) -> Handle<Expr> {
        remap_expr(self.src.exprs, &mut self.exprs, &self.subst, expr)
    }

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

    fn rewrite_stmt(&mut self, stmt: Handle<Stmt>, out: &mut Vec<Handle<Stmt>>) {
        match self.src.stmts[stmt] {
            Stmt::Container(ref block) => {
                let block = block.clone();
                let mut inner = Vec::new();
                for child in block {
                    self.rewrite_stmt(child, &mut inner);
                }
                out.push(self.stmts.append(Stmt::Container(inner)));
            }
            Stmt::Compound(ref block) => {
                let block = block.clone();
                let mut inner = Vec::new();
                for child in block {
                    self.rewrite_stmt(child, &mut inner);
                }
                out.push(self.stmts.append(Stmt::Compound(inner)));
            }
            Stmt::Simple(expr) => {
                if let ExprKind::StreamAppend { operand } = self.src.exprs[expr].kind {
                    // stream.append(v) -> v; EmitVertex();
                    let operand = self.remap(operand);
                    out.push(self.stmts.append(Stmt::Simple(operand)));
                    let ty = self.exprs[operand].ty;
                    let emit = self.exprs.append(Expr {
                        ty,
                        kind: ExprKind::IntrinsicCall {
                            intrinsic: Intrinsic::EmitVertex,
                            arguments: Vec::new(),
                        },
                    });
                    out.push(self.stmts.append(Stmt::Simple(emit)));
                    return;
                }
                let expr = self.remap(expr);
                out.push(self.stmts.append(Stmt::Simple(expr)));
            }
            Stmt::SpecConstantDecl {
                var,
                location,
                value,
            } => {
                let value = self.remap(value);
                if self.options.use_spec_constants {
                    out.push(self.stmts.append(Stmt::SpecConstantDecl {
                        var,
                        location,
                        value,
                    }));
                } else {
                    log::debug!(
                        "lowering spec constant [{}] to a macro definition",
                        self.variables[var].name
                    );
                    out.push(self.stmts.append(Stmt::PreprocDefine {
                        name: self.variables[var].name.clone(),
                        expr: value,
                    }));
                }
            }
            Stmt::If {
                condition,
                then_body,
                ref else_ifs,
                else_body,
            } => {
                let else_ifs = else_ifs.clone();
                let condition = self.remap(condition);
                let then_body = self.rewrite_body(then_body);
                let else_ifs = else_ifs
                    .iter()
                    .map(|else_if| ElseIf {
                        condition: self.remap(else_if.condition),
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
            Stmt::Switch { test, ref cases } => {
                let cases = cases.clone();
                let test = self.remap(test);
                let cases = cases
                    .iter()
                    .map(|case| SwitchCase {
                        label: case.label.map(|label| self.remap(label)),
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
                let init = self.remap(init);
                let condition = self.remap(condition);
                let increment = self.remap(increment);
                let body = self.rewrite_body(body);
                out.push(self.stmts.append(Stmt::For {
                    init,
                    condition,
                    increment,
                    body,
                }));
            }
            Stmt::While { condition, body } => {
                let condition = self.remap(condition);
                let body = self.rewrite_body(body);
                out.push(self.stmts.append(Stmt::While { condition, body }));
            }
            Stmt::DoWhile { condition, body } => {
                let condition = self.remap(condition);
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
                let value = value.map(|value| self.remap(value));
                out.push(self.stmts.append(Stmt::Return(value)));
            }
            Stmt::PreprocDefine { ref name, expr } => {
                let name = name.clone();
                let expr = self.remap(expr);
                out.push(self.stmts.append(Stmt::PreprocDefine { name, expr }));
            }
            Stmt::PreprocIf { condition } => {
                let condition = self.remap(condition);
                out.push(self.stmts.append(Stmt::PreprocIf { condition }));
            }
            Stmt::PreprocElif { condition } => {
                let condition = self.remap(condition);
                out.push(self.stmts.append(Stmt::PreprocElif { condition }));
            }
            ref other => out.push(self.stmts.append(other.clone())),
        }
    }
}
