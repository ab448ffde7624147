/*! Single-assignment renaming.

Rewrites the tree so that every straight-line mutation of a local introduces a
fresh version of the variable, turned into an initialised declaration:

```text
int i = 0;            int i#1 = 0;
i = i + 1;     ->     int i#2 = i#1 + 1;
i = i + 2;            int i#3 = i#2 + 2;
```

Version ids are allocated consecutively from [`SsaData::next_var_id`].
Increment/decrement statements expand to their arithmetic form. Variables
mutated under a loop receive an alias initialised at the loop header and stay
mutable inside the loop body; assignments that escape a conditional branch
likewise remain stores to the current version, since no later merge point
exists in the tree.
*/

use super::{remap_expr, Subst, Tree, TreeRef};
use crate::arena::{Arena, Handle, HandleSet};
use crate::ir::{
    AssignOp, BinaryOp, Expr, ExprKind, Literal, Stmt, UnaryOp, VarFlags, Variable,
};
use crate::ty::{ScalarKind, TypeCache, TypeInner};
use crate::visit::{walk_stmt_exprs, ExprVisitor};
use crate::FastHashSet;

/// Variable-id state threaded through the pass.
#[derive(Clone, Copy, Debug, Default)]
pub struct SsaData {
    pub next_var_id: u32,
    pub alias_id: u32,
}

/// Apply single-assignment renaming to `src`, producing a fresh tree.
///
/// New variable versions are appended to `variables`; `data` returns the
/// updated id counters.
pub fn transform_ssa(
    src: TreeRef,
    types: &TypeCache,
    variables: &mut Arena<Variable>,
    data: &mut SsaData,
) -> Tree {
    let mut pass = Ssa {
        src,
        types,
        variables,
        data,
        exprs: Arena::new(),
        stmts: Arena::new(),
        subst: Subst::default(),
        regions: vec![Region::barrier()],
    };
    let root = pass.rewrite_stmt(src.root);
    Tree {
        exprs: pass.exprs,
        stmts: pass.stmts,
        root,
    }
}

struct Region {
    /// Variables declared in this region; mutations of these may version.
    declared: FastHashSet<Handle<Variable>>,
    /// Control-flow boundary: lookups do not continue past it.
    barrier: bool,
}

impl Region {
    fn barrier() -> Self {
        Region {
            declared: FastHashSet::default(),
            barrier: true,
        }
    }

    fn open() -> Self {
        Region {
            declared: FastHashSet::default(),
            barrier: false,
        }
    }
}

struct Ssa<'a> {
    src: TreeRef<'a>,
    types: &'a TypeCache,
    variables: &'a mut Arena<Variable>,
    data: &'a mut SsaData,
    exprs: Arena<Expr>,
    stmts: Arena<Stmt>,
    subst: Subst,
    regions: Vec<Region>,
}

impl Ssa<'_> {
    fn declare(&mut self, var: Handle<Variable>) {
        self.regions
            .last_mut()
            .expect("region stack is empty")
            .declared
            .insert(var);
    }

    /// Whether a mutation of `var` may introduce a new version here.
    fn versionable(&self, var: Handle<Variable>) -> bool {
        for region in self.regions.iter().rev() {
            if region.declared.contains(&var) {
                return true;
            }
            if region.barrier {
                break;
            }
        }
        false
    }

    /// Allocate the next version of `var`.
    fn version(&mut self, var: Handle<Variable>) -> Handle<Variable> {
        self.data.next_var_id += 1;
        let original = &self.variables[var];
        let versioned = Variable {
            id: self.data.next_var_id,
            name: original.name.clone(),
            ty: original.ty,
            flags: original.flags | VarFlags::ALIAS,
            outer: original.outer,
            builtin: original.builtin,
        };
        let handle = self.variables.append(versioned);
        self.subst.vars.insert(var, handle);
        handle
    }

    /// Allocate a loop-header alias of `var`.
    fn alias(&mut self, var: Handle<Variable>) -> Handle<Variable> {
        self.data.next_var_id += 1;
        self.data.alias_id += 1;
        let original = &self.variables[var];
        let alias = Variable {
            id: self.data.next_var_id,
            name: format!("{}_phi{}", original.name, self.data.alias_id),
            ty: original.ty,
            flags: original.flags | VarFlags::ALIAS,
            outer: original.outer,
            builtin: original.builtin,
        };
        let handle = self.variables.append(alias);
        self.subst.vars.insert(var, handle);
        handle
    }

    fn current(&self, var: Handle<Variable>) -> Handle<Variable> {
        self.subst.vars.get(&var).copied().unwrap_or(var)
    }

    fn remap(&mut self, expr: Handle<Expr>) -> Handle<Expr> {
        remap_expr(self.src.exprs, &mut self.exprs, &self.subst, expr)
    }

    /// The literal `1` of the variable's scalar kind.
    fn one(&mut self, var: Handle<Variable>) -> Handle<Expr> {
        let ty = self.variables[var].ty;
        let literal = match *self.types.lookup(ty) {
            TypeInner::Scalar(scalar) => match scalar.kind {
                ScalarKind::Sint => Literal::I32(1),
                ScalarKind::Uint => Literal::U32(1),
                ScalarKind::Float => Literal::F32(1.0),
                ScalarKind::Bool => Literal::Bool(true),
            },
            _ => Literal::I32(1),
        };
        self.exprs.append(Expr {
            ty,
            kind: ExprKind::Literal(literal),
        })
    }

    /// The identifier of an assignment target, when the target is plain.
    fn target_var(&self, expr: Handle<Expr>) -> Option<Handle<Variable>> {
        match self.src.exprs[expr].kind {
            ExprKind::Ident(var) => Some(var),
            _ => None,
        }
    }

    fn rewrite_block(&mut self, block: &[Handle<Stmt>]) -> Vec<Handle<Stmt>> {
        block.iter().map(|&child| self.rewrite_stmt(child)).collect()
    }

    fn rewrite_body(&mut self, body: Handle<Stmt>) -> Handle<Stmt> {
        self.regions.push(Region::barrier());
        let rewritten = self.rewrite_stmt(body);
        self.regions.pop();
        rewritten
    }

    /// Emit `name = current(var)` aliases for every variable the loop body
    /// mutates, so the body reads loop-carried state through one name.
    fn alias_loop_mutations(&mut self, bodies: &[Handle<Stmt>], out: &mut Vec<Handle<Stmt>>) {
        let mut mutated = MutatedVars {
            exprs: self.src.exprs,
            out: HandleSet::for_arena(self.variables),
        };
        for &body in bodies {
            walk_stmt_exprs(&mut mutated, self.src.stmts, self.src.exprs, body);
        }
        let mut vars: Vec<_> = mutated.out.iter().collect();
        vars.sort_by_key(|&var| self.variables[var].id);
        for var in vars {
            // Only locals already declared before the loop need a header
            // alias; the loop's own variable is born in its init expression
            // and stays mutable.
            if self.subst.vars.contains_key(&var)
                || !self.variables[var].is_locale()
                || self.variables[var].flags.contains(VarFlags::LOOP_VAR)
                || !self.versionable(var)
            {
                continue;
            }
            let ty = self.variables[var].ty;
            let current = self.current(var);
            let source = self.exprs.append(Expr {
                ty,
                kind: ExprKind::Ident(current),
            });
            let alias = self.alias(var);
            let target = self.exprs.append(Expr {
                ty,
                kind: ExprKind::Ident(alias),
            });
            let init = self.exprs.append(Expr {
                ty,
                kind: ExprKind::Init {
                    target,
                    value: source,
                },
            });
            out.push(self.stmts.append(Stmt::Simple(init)));
        }
    }

    fn rewrite_simple(&mut self, expr: Handle<Expr>) -> Handle<Stmt> {
        let ty = self.src.exprs[expr].ty;
        match self.src.exprs[expr].kind {
            ExprKind::Assign { op, target, value } => {
                if let Some(var) = self.target_var(target) {
                    if self.versionable(var) {
                        // Expand compound operators against the current
                        // version, then bind a fresh one.
                        let value = match op.binary() {
                            Some(binary) => {
                                let left = self.exprs.append(Expr {
                                    ty,
                                    kind: ExprKind::Ident(self.current(var)),
                                });
                                let right = self.remap(value);
                                self.exprs.append(Expr {
                                    ty,
                                    kind: ExprKind::Binary {
                                        op: binary,
                                        left,
                                        right,
                                    },
                                })
                            }
                            None => self.remap(value),
                        };
                        let versioned = self.version(var);
                        let target = self.exprs.append(Expr {
                            ty,
                            kind: ExprKind::Ident(versioned),
                        });
                        let init = self.exprs.append(Expr {
                            ty,
                            kind: ExprKind::Init { target, value },
                        });
                        return self.stmts.append(Stmt::Simple(init));
                    }
                }
                let remapped = self.remap(expr);
                self.stmts.append(Stmt::Simple(remapped))
            }
            ExprKind::Unary { op, expr: operand } if op.mutates_operand() => {
                if let Some(var) = self.target_var(operand) {
                    let binary = match op {
                        UnaryOp::PreIncrement | UnaryOp::PostIncrement => BinaryOp::Add,
                        _ => BinaryOp::Subtract,
                    };
                    let left = self.exprs.append(Expr {
                        ty,
                        kind: ExprKind::Ident(self.current(var)),
                    });
                    let right = self.one(var);
                    let value = self.exprs.append(Expr {
                        ty,
                        kind: ExprKind::Binary {
                            op: binary,
                            left,
                            right,
                        },
                    });
                    if self.versionable(var) {
                        let versioned = self.version(var);
                        let target = self.exprs.append(Expr {
                            ty,
                            kind: ExprKind::Ident(versioned),
                        });
                        let init = self.exprs.append(Expr {
                            ty,
                            kind: ExprKind::Init { target, value },
                        });
                        return self.stmts.append(Stmt::Simple(init));
                    }
                    let target = self.exprs.append(Expr {
                        ty,
                        kind: ExprKind::Ident(self.current(var)),
                    });
                    let assign = self.exprs.append(Expr {
                        ty,
                        kind: ExprKind::Assign {
                            op: AssignOp::Assign,
                            target,
                            value,
                        },
                    });
                    return self.stmts.append(Stmt::Simple(assign));
                }
                let remapped = self.remap(expr);
                self.stmts.append(Stmt::Simple(remapped))
            }
            ExprKind::Init { target, .. } => {
                if let Some(var) = self.target_var(target) {
                    self.declare(var);
                }
                let remapped = self.remap(expr);
                self.stmts.append(Stmt::Simple(remapped))
            }
            _ => {
                let remapped = self.remap(expr);
                self.stmts.append(Stmt::Simple(remapped))
            }
        }
    }

    fn rewrite_stmt(&mut self, stmt: Handle<Stmt>) -> Handle<Stmt> {
        match self.src.stmts[stmt] {
            Stmt::Container(ref block) => {
                let block = block.clone();
                let rewritten = self.rewrite_block(&block);
                self.stmts.append(Stmt::Container(rewritten))
            }
            Stmt::Compound(ref block) => {
                let block = block.clone();
                self.regions.push(Region::open());
                let rewritten = self.rewrite_block(&block);
                self.regions.pop();
                self.stmts.append(Stmt::Compound(rewritten))
            }
            Stmt::Simple(expr) => self.rewrite_simple(expr),
            Stmt::VariableDecl { var } => {
                self.declare(var);
                self.stmts.append(Stmt::VariableDecl { var })
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
                    .map(|else_if| crate::ir::ElseIf {
                        condition: self.remap(else_if.condition),
                        body: self.rewrite_body(else_if.body),
                    })
                    .collect();
                let else_body = else_body.map(|body| self.rewrite_body(body));
                self.stmts.append(Stmt::If {
                    condition,
                    then_body,
                    else_ifs,
                    else_body,
                })
            }
            Stmt::Switch { test, ref cases } => {
                let cases = cases.clone();
                let test = self.remap(test);
                let cases = cases
                    .iter()
                    .map(|case| crate::ir::SwitchCase {
                        label: case.label.map(|label| self.remap(label)),
                        body: self.rewrite_body(case.body),
                    })
                    .collect();
                self.stmts.append(Stmt::Switch { test, cases })
            }
            Stmt::For {
                init,
                condition,
                increment,
                body,
            } => {
                let mut prelude = Vec::new();
                self.alias_loop_mutations(&[body], &mut prelude);
                let init = self.remap(init);
                let condition = self.remap(condition);
                let increment = self.remap(increment);
                let body = self.rewrite_body(body);
                let rewritten = self.stmts.append(Stmt::For {
                    init,
                    condition,
                    increment,
                    body,
                });
                self.splice(prelude, rewritten)
            }
            Stmt::While { condition, body } => {
                let mut prelude = Vec::new();
                self.alias_loop_mutations(&[body], &mut prelude);
                let condition = self.remap(condition);
                let body = self.rewrite_body(body);
                let rewritten = self.stmts.append(Stmt::While { condition, body });
                self.splice(prelude, rewritten)
            }
            Stmt::DoWhile { condition, body } => {
                let mut prelude = Vec::new();
                self.alias_loop_mutations(&[body], &mut prelude);
                let condition = self.remap(condition);
                let body = self.rewrite_body(body);
                let rewritten = self.stmts.append(Stmt::DoWhile { condition, body });
                self.splice(prelude, rewritten)
            }
            Stmt::FunctionDecl {
                var,
                ref params,
                body,
                flags,
            } => {
                let params = params.clone();
                let saved = std::mem::take(&mut self.subst.vars);
                let body = self.rewrite_body(body);
                self.subst.vars = saved;
                self.stmts.append(Stmt::FunctionDecl {
                    var,
                    params,
                    body,
                    flags,
                })
            }
            Stmt::Return(value) => {
                let value = value.map(|value| self.remap(value));
                self.stmts.append(Stmt::Return(value))
            }
            Stmt::SpecConstantDecl {
                var,
                location,
                value,
            } => {
                let value = self.remap(value);
                self.stmts.append(Stmt::SpecConstantDecl {
                    var,
                    location,
                    value,
                })
            }
            Stmt::PreprocDefine { ref name, expr } => {
                let name = name.clone();
                let expr = self.remap(expr);
                self.stmts.append(Stmt::PreprocDefine { name, expr })
            }
            Stmt::PreprocIf { condition } => {
                let condition = self.remap(condition);
                self.stmts.append(Stmt::PreprocIf { condition })
            }
            Stmt::PreprocElif { condition } => {
                let condition = self.remap(condition);
                self.stmts.append(Stmt::PreprocElif { condition })
            }
            // Declarations and markers carry no rewritable expressions.
            ref other => self.stmts.append(other.clone()),
        }
    }

    /// Wrap a statement with its loop-alias prelude, if any.
    fn splice(&mut self, mut prelude: Vec<Handle<Stmt>>, stmt: Handle<Stmt>) -> Handle<Stmt> {
        if prelude.is_empty() {
            stmt
        } else {
            prelude.push(stmt);
            self.stmts.append(Stmt::Container(prelude))
        }
    }
}

/// Collects every variable an expression tree assigns to.
struct MutatedVars<'a> {
    exprs: &'a Arena<Expr>,
    out: HandleSet<Variable>,
}

impl ExprVisitor for MutatedVars<'_> {
    fn visit_assign(&mut self, expr: Handle<Expr>, _op: AssignOp) {
        if let ExprKind::Assign { target, .. } = self.exprs[expr].kind {
            if let ExprKind::Ident(var) = self.exprs[target].kind {
                self.out.insert(var);
            }
        }
    }

    fn visit_unary(&mut self, expr: Handle<Expr>, op: UnaryOp) {
        if !op.mutates_operand() {
            return;
        }
        if let ExprKind::Unary { expr: operand, .. } = self.exprs[expr].kind {
            if let ExprKind::Ident(var) = self.exprs[operand].kind {
                self.out.insert(var);
            }
        }
    }
}
