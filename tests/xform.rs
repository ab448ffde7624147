use shade::arena::Handle;
use shade::ir::{
    AssignOp, BinaryOp, Expr, ExprKind, Literal, Stmt, VarFlags,
};
use shade::ty::Scalar;
use shade::xform::{resolve_constants, simplify, transform_ssa, SsaData, Tree, TreeRef};
use shade::{Shader, ShaderBuilder, ShaderStage};

/// Compact rendering of the statements reachable from the root, for
/// structural comparison across arenas.
fn render(tree: &Tree, variables: &shade::Arena<shade::Variable>) -> String {
    fn expr(out: &mut String, tree: &Tree, vars: &shade::Arena<shade::Variable>, e: Handle<Expr>) {
        match tree.exprs[e].kind {
            ExprKind::Literal(value) => out.push_str(&format!("{value:?}")),
            ExprKind::Ident(v) => out.push_str(&format!("{}#{}", vars[v].name, vars[v].id)),
            ExprKind::Binary { op, left, right } => {
                out.push('(');
                expr(out, tree, vars, left);
                out.push_str(&format!(" {op:?} "));
                expr(out, tree, vars, right);
                out.push(')');
            }
            ExprKind::Assign { op, target, value } => {
                expr(out, tree, vars, target);
                out.push_str(&format!(" {op:?} "));
                expr(out, tree, vars, value);
            }
            ExprKind::Init { target, value } => {
                out.push_str("let ");
                expr(out, tree, vars, target);
                out.push_str(" = ");
                expr(out, tree, vars, value);
            }
            ExprKind::Question {
                condition,
                accept,
                reject,
            } => {
                out.push_str("select(");
                expr(out, tree, vars, condition);
                out.push_str(", ");
                expr(out, tree, vars, accept);
                out.push_str(", ");
                expr(out, tree, vars, reject);
                out.push(')');
            }
            ref other => out.push_str(&format!("{other:?}")),
        }
    }
    fn stmt(out: &mut String, tree: &Tree, vars: &shade::Arena<shade::Variable>, s: Handle<Stmt>) {
        match tree.stmts[s] {
            Stmt::Container(ref block) => {
                for &child in block {
                    stmt(out, tree, vars, child);
                }
            }
            Stmt::Compound(ref block) => {
                out.push('{');
                for &child in block {
                    stmt(out, tree, vars, child);
                }
                out.push('}');
            }
            Stmt::Simple(e) => {
                expr(out, tree, vars, e);
                out.push(';');
            }
            Stmt::If {
                condition,
                then_body,
                ref else_ifs,
                else_body,
            } => {
                out.push_str("if ");
                expr(out, tree, vars, condition);
                out.push('{');
                stmt(out, tree, vars, then_body);
                out.push('}');
                for else_if in else_ifs {
                    out.push_str("elif ");
                    expr(out, tree, vars, else_if.condition);
                    out.push('{');
                    stmt(out, tree, vars, else_if.body);
                    out.push('}');
                }
                if let Some(else_body) = else_body {
                    out.push_str("else{");
                    stmt(out, tree, vars, else_body);
                    out.push('}');
                }
            }
            ref other => out.push_str(&format!("{other:?};")),
        }
    }
    let mut out = String::new();
    stmt(&mut out, tree, variables, tree.root);
    out
}

fn int_literal(shader: &mut Shader, value: i32) -> Handle<Expr> {
    let ty = shader.types.get_scalar(Scalar::I32);
    shader.add_expr(ty, ExprKind::Literal(Literal::I32(value)))
}

#[test]
fn ssa_renames_into_consecutive_versions() {
    // int i = 0; i = i + 1; i = i + 2;
    let mut shader = Shader::new(ShaderStage::Compute);
    let mut builder = ShaderBuilder::new(&mut shader);
    let int_ty = builder.shader_mut().types.get_scalar(Scalar::I32);
    let i = builder.register_locale("i", int_ty);
    let original_id = builder.shader().variables[i].id;
    drop(builder);

    let ident = |shader: &mut Shader| shader.add_expr(int_ty, ExprKind::Ident(i));
    let zero = int_literal(&mut shader, 0);
    let target = ident(&mut shader);
    let init = shader.add_expr(int_ty, ExprKind::Init { target, value: zero });
    let init = shader.add_stmt(Stmt::Simple(init));

    let mut assigns = Vec::new();
    for value in [1, 2] {
        let left = ident(&mut shader);
        let right = int_literal(&mut shader, value);
        let sum = shader.add_expr(
            int_ty,
            ExprKind::Binary {
                op: BinaryOp::Add,
                left,
                right,
            },
        );
        let target = ident(&mut shader);
        let assign = shader.add_expr(
            int_ty,
            ExprKind::Assign {
                op: AssignOp::Assign,
                target,
                value: sum,
            },
        );
        assigns.push(shader.add_stmt(Stmt::Simple(assign)));
    }
    let root = shader.root();
    shader.stmts[root]
        .block_mut()
        .unwrap()
        .extend([init, assigns[0], assigns[1]]);

    let mut variables = shader.variables.clone();
    let mut data = SsaData {
        next_var_id: shader.data.next_var_id,
        alias_id: 0,
    };
    let tree = transform_ssa(
        TreeRef::of_shader(&shader),
        &shader.types,
        &mut variables,
        &mut data,
    );

    // Two fresh versions with ids consecutive after the original.
    assert_eq!(data.next_var_id, original_id + 2);
    assert_eq!(variables.len(), 3);

    let Stmt::Container(ref block) = tree.stmts[tree.root] else {
        panic!("root is not a container");
    };
    assert_eq!(block.len(), 3);
    // Every statement is now an initialised declaration; the last one binds
    // the third id and reads the second.
    let mut target_ids = Vec::new();
    for &stmt in block {
        let Stmt::Simple(expr) = tree.stmts[stmt] else {
            panic!("expected a simple statement");
        };
        let ExprKind::Init { target, .. } = tree.exprs[expr].kind else {
            panic!("assignments must turn into initialised declarations");
        };
        let ExprKind::Ident(var) = tree.exprs[target].kind else {
            panic!("init target must be an identifier");
        };
        target_ids.push(variables[var].id);
    }
    assert_eq!(target_ids, vec![original_id, original_id + 1, original_id + 2]);

    let Stmt::Simple(last) = tree.stmts[block[2]] else {
        unreachable!();
    };
    let ExprKind::Init { value, .. } = tree.exprs[last].kind else {
        unreachable!();
    };
    let ExprKind::Binary { left, .. } = tree.exprs[value].kind else {
        panic!("expected a binary rhs");
    };
    let ExprKind::Ident(read) = tree.exprs[left].kind else {
        panic!("expected an identifier operand");
    };
    assert_eq!(variables[read].id, original_id + 1);
}

#[test]
fn simplify_folds_literals_and_drops_dead_branches() {
    let mut shader = Shader::new(ShaderStage::Compute);
    let bool_ty = shader.types.get_scalar(Scalar::BOOL);
    let int_ty = shader.types.get_scalar(Scalar::I32);

    // if (1 + 1 == 3) { discard; }  -- folds to nothing
    let two = {
        let a = int_literal(&mut shader, 1);
        let b = int_literal(&mut shader, 1);
        shader.add_expr(
            int_ty,
            ExprKind::Binary {
                op: BinaryOp::Add,
                left: a,
                right: b,
            },
        )
    };
    let three = int_literal(&mut shader, 3);
    let condition = shader.add_expr(
        bool_ty,
        ExprKind::Binary {
            op: BinaryOp::Equal,
            left: two,
            right: three,
        },
    );
    let discard = shader.add_stmt(Stmt::Discard);
    let then_body = shader.add_stmt(Stmt::Container(vec![discard]));
    let dead_if = shader.add_stmt(Stmt::If {
        condition,
        then_body,
        else_ifs: vec![],
        else_body: None,
    });
    let root = shader.root();
    shader.stmts[root].block_mut().unwrap().push(dead_if);

    let tree = simplify(TreeRef::of_shader(&shader));
    let Stmt::Container(ref block) = tree.stmts[tree.root] else {
        panic!("root is not a container");
    };
    assert!(block.is_empty(), "dead branch must disappear");
}

#[test]
fn simplify_coalesces_two_sided_assignment_into_select() {
    let mut shader = Shader::new(ShaderStage::Compute);
    let mut builder = ShaderBuilder::new(&mut shader);
    let bool_ty = builder.shader_mut().types.get_scalar(Scalar::BOOL);
    let int_ty = builder.shader_mut().types.get_scalar(Scalar::I32);
    let x = builder.register_locale("x", int_ty);
    let c = builder.register_locale("c", bool_ty);
    drop(builder);

    let assign = |shader: &mut Shader, value: i32| {
        let target = shader.add_expr(int_ty, ExprKind::Ident(x));
        let value = int_literal(shader, value);
        let assign = shader.add_expr(
            int_ty,
            ExprKind::Assign {
                op: AssignOp::Assign,
                target,
                value,
            },
        );
        shader.add_stmt(Stmt::Simple(assign))
    };
    let then_stmt = assign(&mut shader, 1);
    let else_stmt = assign(&mut shader, 2);
    let then_body = shader.add_stmt(Stmt::Container(vec![then_stmt]));
    let else_body = shader.add_stmt(Stmt::Container(vec![else_stmt]));
    let condition = shader.add_expr(bool_ty, ExprKind::Ident(c));
    let stmt = shader.add_stmt(Stmt::If {
        condition,
        then_body,
        else_ifs: vec![],
        else_body: Some(else_body),
    });
    let root = shader.root();
    shader.stmts[root].block_mut().unwrap().push(stmt);

    let tree = simplify(TreeRef::of_shader(&shader));
    let rendered = render(&tree, &shader.variables);
    assert!(
        rendered.contains("select("),
        "expected a select, got: {rendered}"
    );
    assert!(!rendered.contains("if "), "the if must be gone: {rendered}");
}

#[test]
fn simplify_is_idempotent() {
    let mut shader = Shader::new(ShaderStage::Compute);
    let mut builder = ShaderBuilder::new(&mut shader);
    let bool_ty = builder.shader_mut().types.get_scalar(Scalar::BOOL);
    let int_ty = builder.shader_mut().types.get_scalar(Scalar::I32);
    let x = builder.register_locale("x", int_ty);
    let c = builder.register_locale("c", bool_ty);
    drop(builder);

    // A mix of foldable arithmetic, nested containers and a live branch.
    let lit = int_literal(&mut shader, 4);
    let folded = {
        let a = int_literal(&mut shader, 1);
        let b = int_literal(&mut shader, 2);
        let sum = shader.add_expr(
            int_ty,
            ExprKind::Binary {
                op: BinaryOp::Add,
                left: a,
                right: b,
            },
        );
        shader.add_expr(
            int_ty,
            ExprKind::Binary {
                op: BinaryOp::Multiply,
                left: sum,
                right: lit,
            },
        )
    };
    let target = shader.add_expr(int_ty, ExprKind::Ident(x));
    let assign = shader.add_expr(
        int_ty,
        ExprKind::Assign {
            op: AssignOp::Assign,
            target,
            value: folded,
        },
    );
    let assign = shader.add_stmt(Stmt::Simple(assign));
    let inner = shader.add_stmt(Stmt::Container(vec![assign]));
    let empty = shader.add_stmt(Stmt::Compound(vec![]));

    let condition = shader.add_expr(bool_ty, ExprKind::Ident(c));
    let live_discard = shader.add_stmt(Stmt::Discard);
    let then_body = shader.add_stmt(Stmt::Container(vec![live_discard]));
    let live_if = shader.add_stmt(Stmt::If {
        condition,
        then_body,
        else_ifs: vec![],
        else_body: None,
    });

    let root = shader.root();
    shader.stmts[root]
        .block_mut()
        .unwrap()
        .extend([inner, empty, live_if]);

    let once = simplify(TreeRef::of_shader(&shader));
    let twice = simplify(TreeRef::of_tree(&once));
    assert_eq!(
        render(&once, &shader.variables),
        render(&twice, &shader.variables)
    );
}

#[test]
fn resolve_substitutes_static_constants() {
    let mut shader = Shader::new(ShaderStage::Compute);
    let mut builder = ShaderBuilder::new(&mut shader);
    let int_ty = builder.shader_mut().types.get_scalar(Scalar::I32);
    let constant = builder.register_static_constant("KERNEL_SIZE", int_ty).unwrap();
    let x = builder.register_locale("x", int_ty);
    drop(builder);
    assert!(shader.variables[constant]
        .flags
        .contains(VarFlags::STATIC | VarFlags::CONSTANT));

    // KERNEL_SIZE = 9 (definition), then x = KERNEL_SIZE (use).
    let target = shader.add_expr(int_ty, ExprKind::Ident(constant));
    let nine = int_literal(&mut shader, 9);
    let def = shader.add_expr(int_ty, ExprKind::Init { target, value: nine });
    let def = shader.add_stmt(Stmt::Simple(def));

    let target = shader.add_expr(int_ty, ExprKind::Ident(x));
    let read = shader.add_expr(int_ty, ExprKind::Ident(constant));
    let init = shader.add_expr(
        int_ty,
        ExprKind::Init {
            target,
            value: read,
        },
    );
    let use_stmt = shader.add_stmt(Stmt::Simple(init));

    let root = shader.root();
    shader.stmts[root].block_mut().unwrap().extend([def, use_stmt]);

    let tree = resolve_constants(TreeRef::of_shader(&shader), &shader.variables);
    let Stmt::Container(ref block) = tree.stmts[tree.root] else {
        panic!("root is not a container");
    };
    let Stmt::Simple(expr) = tree.stmts[block[1]] else {
        panic!("expected a simple statement");
    };
    let ExprKind::Init { value, .. } = tree.exprs[expr].kind else {
        panic!("expected an init");
    };
    assert!(
        matches!(tree.exprs[value].kind, ExprKind::Literal(Literal::I32(9))),
        "constant reference must resolve to its literal definition"
    );
}
