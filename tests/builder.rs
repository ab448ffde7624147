use shade::builder::Error;
use shade::ir::{ExprKind, Literal, Stmt, VarFlags};
use shade::ty::{Scalar, TypeInner};
use shade::{Shader, ShaderBuilder, ShaderStage};

#[test]
fn locale_declaration() {
    // Building `int x;` yields a root container with a single declaration of
    // a locale-flagged int variable.
    let mut shader = Shader::new(ShaderStage::Fragment);
    let mut builder = ShaderBuilder::new(&mut shader);
    let int_ty = builder.shader_mut().types.get_scalar(Scalar::I32);
    let var = builder.register_locale("x", int_ty);
    let decl = builder.shader_mut().add_stmt(Stmt::VariableDecl { var });
    builder.add_stmt(decl);
    drop(builder);

    let root = shader.root();
    let Stmt::Container(ref block) = shader.stmts[root] else {
        panic!("root is not a container");
    };
    assert_eq!(block.len(), 1);
    let Stmt::VariableDecl { var } = shader.stmts[block[0]] else {
        panic!("expected a variable declaration");
    };
    assert!(shader.variables[var].flags.contains(VarFlags::LOCALE));
    assert_eq!(
        *shader.types.lookup(shader.variables[var].ty),
        TypeInner::Scalar(Scalar::I32)
    );
}

#[test]
fn if_else_balance() {
    let mut shader = Shader::new(ShaderStage::Fragment);
    let mut builder = ShaderBuilder::new(&mut shader);
    let bool_ty = builder.shader_mut().types.get_scalar(Scalar::BOOL);
    let condition = builder
        .shader_mut()
        .add_expr(bool_ty, ExprKind::Literal(Literal::Bool(true)));

    let depth = builder.depth();
    builder.begin_if(condition);
    let a = builder.shader_mut().add_stmt(Stmt::Discard);
    builder.add_stmt(a);
    builder.begin_else().unwrap();
    let b = builder.shader_mut().add_stmt(Stmt::Return(None));
    builder.add_stmt(b);
    builder.end_if().unwrap();
    assert_eq!(builder.depth(), depth, "scope depth must be restored");
    drop(builder);

    let root = shader.root();
    let Stmt::Container(ref block) = shader.stmts[root] else {
        panic!("root is not a container");
    };
    assert_eq!(block.len(), 1);
    let Stmt::If {
        then_body,
        ref else_ifs,
        else_body,
        ..
    } = shader.stmts[block[0]]
    else {
        panic!("expected an if statement");
    };
    assert!(else_ifs.is_empty());
    assert_eq!(shader.stmts[then_body].block().unwrap().as_slice(), &[a]);
    let else_body = else_body.expect("else branch is missing");
    assert_eq!(shader.stmts[else_body].block().unwrap().as_slice(), &[b]);
}

#[test]
fn switch_framing() {
    let mut shader = Shader::new(ShaderStage::Compute);
    let mut builder = ShaderBuilder::new(&mut shader);
    let int_ty = builder.shader_mut().types.get_scalar(Scalar::I32);
    let value = builder
        .shader_mut()
        .add_expr(int_ty, ExprKind::Literal(Literal::I32(3)));

    let depth = builder.depth();
    builder.begin_switch(value);
    builder.begin_case(Literal::I32(0)).unwrap();
    let a = builder.shader_mut().add_stmt(Stmt::Break);
    builder.add_stmt(a);
    builder.begin_default().unwrap();
    let b = builder.shader_mut().add_stmt(Stmt::Break);
    builder.add_stmt(b);
    builder.end_switch().unwrap();
    assert_eq!(builder.depth(), depth);
    drop(builder);

    let root = shader.root();
    let Stmt::Container(ref block) = shader.stmts[root] else {
        panic!("root is not a container");
    };
    let Stmt::Switch { ref cases, .. } = shader.stmts[block[0]] else {
        panic!("expected a switch statement");
    };
    assert_eq!(cases.len(), 2);
    assert!(cases[0].label.is_some());
    assert!(cases[1].label.is_none());
}

#[test]
fn flow_misuse_is_reported() {
    let mut shader = Shader::new(ShaderStage::Vertex);
    let mut builder = ShaderBuilder::new(&mut shader);
    assert!(matches!(builder.end_if(), Err(Error::UnbalancedFlow(_))));
    assert!(matches!(
        builder.begin_case(Literal::I32(0)),
        Err(Error::CaseOutsideSwitch)
    ));
}

#[test]
fn save_next_expr_captures_one_statement() {
    let mut shader = Shader::new(ShaderStage::Vertex);
    let mut builder = ShaderBuilder::new(&mut shader);
    let int_ty = builder.shader_mut().types.get_scalar(Scalar::I32);
    let value = builder
        .shader_mut()
        .add_expr(int_ty, ExprKind::Literal(Literal::I32(7)));
    let stmt = builder.shader_mut().add_stmt(Stmt::Simple(value));

    builder.save_next_expr();
    builder.add_stmt(stmt);
    let placeholder = builder.dummy_expr(int_ty);
    let loaded = builder.load_expr(placeholder);
    assert!(matches!(
        builder.shader().exprs[loaded].kind,
        ExprKind::Literal(Literal::I32(7))
    ));
    drop(builder);

    // The captured statement never reached the root container.
    let root = shader.root();
    assert!(shader.stmts[root].block().unwrap().is_empty());
}

#[test]
fn load_expr_without_capture_returns_placeholder() {
    let mut shader = Shader::new(ShaderStage::Vertex);
    let mut builder = ShaderBuilder::new(&mut shader);
    let int_ty = builder.shader_mut().types.get_scalar(Scalar::I32);
    let placeholder = builder.dummy_expr(int_ty);
    assert_eq!(builder.load_expr(placeholder), placeholder);
}

#[test]
fn duplicate_function_with_mismatched_type() {
    let mut shader = Shader::new(ShaderStage::Vertex);
    let mut builder = ShaderBuilder::new(&mut shader);
    let void = builder.shader_mut().types.get_void();
    let int_ty = builder.shader_mut().types.get_scalar(Scalar::I32);
    let fn_void = builder.shader_mut().types.get_function(void, vec![]);
    let fn_int = builder.shader_mut().types.get_function(int_ty, vec![]);

    builder.register_function("helper", fn_void).unwrap();
    assert!(matches!(
        builder.register_function("helper", fn_int),
        Err(Error::DuplicateFunction(_))
    ));
    // Re-registering with the same type resolves to the same symbol.
    assert!(builder.register_function("helper", fn_void).is_ok());
}

#[test]
fn inner_scope_sees_enclosing_variables() {
    let mut shader = Shader::new(ShaderStage::Vertex);
    let mut builder = ShaderBuilder::new(&mut shader);
    let int_ty = builder.shader_mut().types.get_scalar(Scalar::I32);
    let outer = builder.register_locale("outer", int_ty);

    builder.push_scope();
    assert_eq!(builder.get_var("outer").unwrap(), outer);
    let inner = builder.register_locale("inner", int_ty);
    assert_eq!(builder.get_var("inner").unwrap(), inner);
    builder.pop_scope().unwrap();

    // The inner name goes out of scope with its frame.
    assert!(builder.get_var("inner").is_err());
}

#[test]
fn duplicate_io_location_keeps_first() {
    use shade::EntryPoint;
    let mut shader = Shader::new(ShaderStage::Fragment);
    let mut builder = ShaderBuilder::new(&mut shader);
    let f32_ty = builder.shader_mut().types.get_scalar(Scalar::F32);

    builder.register_input(EntryPoint::Fragment, "a", 0, VarFlags::empty(), f32_ty);
    builder.register_input(EntryPoint::Fragment, "b", 0, VarFlags::empty(), f32_ty);
    drop(builder);

    let inputs = &shader.data.inputs[&EntryPoint::Fragment];
    assert!(inputs.contains_key("a"));
    assert!(!inputs.contains_key("b"));
}

#[test]
fn integer_inputs_become_flat_outside_vertex() {
    use shade::EntryPoint;
    let mut shader = Shader::new(ShaderStage::Fragment);
    let mut builder = ShaderBuilder::new(&mut shader);
    let uint_ty = builder.shader_mut().types.get_scalar(Scalar::U32);
    let var = builder.register_input(EntryPoint::Fragment, "id", 1, VarFlags::empty(), uint_ty);
    assert!(builder.shader().variables[var]
        .flags
        .contains(VarFlags::FLAT | VarFlags::SHADER_INPUT));

    // Vertex-stage inputs stay unqualified.
    let mut shader = Shader::new(ShaderStage::Vertex);
    let mut builder = ShaderBuilder::new(&mut shader);
    let uint_ty = builder.shader_mut().types.get_scalar(Scalar::U32);
    let var = builder.register_input(EntryPoint::Vertex, "id", 1, VarFlags::empty(), uint_ty);
    assert!(!builder.shader().variables[var].flags.contains(VarFlags::FLAT));
}
