use shade::back::glsl;
use shade::ir::{ExprKind, FnFlags, Literal, Stmt};
use shade::ty::Scalar;
use shade::{Shader, ShaderBuilder, ShaderStage};

fn write(shader: &Shader, options: &glsl::Options) -> String {
    glsl::write_string(shader, options).unwrap()
}

#[test]
fn header_and_extension_order() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut shader = Shader::new(ShaderStage::Fragment);
    let mut builder = ShaderBuilder::new(&mut shader);
    let int_ty = builder.shader_mut().types.get_scalar(Scalar::I32);
    let var = builder.register_locale("x", int_ty);
    let decl = builder.shader_mut().add_stmt(Stmt::VariableDecl { var });
    builder.add_stmt(decl);
    drop(builder);

    let mut options = glsl::Options::default();
    options
        .required_extensions
        .insert("GL_EXT_mesh_shader".to_string());
    options
        .required_extensions
        .insert("GL_ARB_gpu_shader_int64".to_string());

    let output = write(&shader, &options);
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines[0], "#version 460");
    // Lexicographic extension order.
    assert_eq!(lines[1], "#extension GL_ARB_gpu_shader_int64 : require");
    assert_eq!(lines[2], "#extension GL_EXT_mesh_shader : require");
    assert!(output.contains("int x;"));
}

#[test]
fn if_else_text() {
    let mut shader = Shader::new(ShaderStage::Fragment);
    let mut builder = ShaderBuilder::new(&mut shader);
    let bool_ty = builder.shader_mut().types.get_scalar(Scalar::BOOL);
    let flag = builder.register_locale("flag", bool_ty);
    let decl = builder.shader_mut().add_stmt(Stmt::VariableDecl { var: flag });
    builder.add_stmt(decl);
    let condition = builder.shader_mut().add_expr(bool_ty, ExprKind::Ident(flag));
    builder.begin_if(condition);
    let discard = builder.shader_mut().add_stmt(Stmt::Discard);
    builder.add_stmt(discard);
    builder.begin_else().unwrap();
    let ret = builder.shader_mut().add_stmt(Stmt::Return(None));
    builder.add_stmt(ret);
    builder.end_if().unwrap();
    drop(builder);

    let output = write(&shader, &glsl::Options::default());
    assert!(output.contains("if (flag)"));
    assert!(output.contains("discard;"));
    assert!(output.contains("else"));
    assert!(output.contains("return;"));
}

#[test]
fn entry_point_and_compute_layout() {
    let mut shader = Shader::new(ShaderStage::Compute);
    let mut builder = ShaderBuilder::new(&mut shader);
    let layout = builder.shader_mut().add_stmt(Stmt::InputComputeLayout {
        local_size: [8, 8, 1],
    });
    builder.add_stmt(layout);
    let void = builder.shader_mut().types.get_void();
    let fn_ty = builder.shader_mut().types.get_function(void, vec![]);
    let main = builder.register_function("main", fn_ty).unwrap();
    let body = builder.shader_mut().add_stmt(Stmt::Container(vec![]));
    let decl = builder.shader_mut().add_stmt(Stmt::FunctionDecl {
        var: main,
        params: vec![],
        body,
        flags: FnFlags::ENTRY_POINT,
    });
    builder.add_stmt(decl);
    drop(builder);

    let output = write(&shader, &glsl::Options::default());
    assert!(output
        .contains("layout(local_size_x = 8, local_size_y = 8, local_size_z = 1) in;"));
    assert!(output.contains("void main()"));
}

#[test]
fn int64_literal_pulls_extension() {
    let mut shader = Shader::new(ShaderStage::Compute);
    let long_ty = shader.types.get_scalar(Scalar::I64);
    let value = shader.add_expr(long_ty, ExprKind::Literal(Literal::I64(1)));
    let stmt = shader.add_stmt(Stmt::Simple(value));
    let root = shader.root();
    shader.stmts[root].block_mut().unwrap().push(stmt);

    let output = write(&shader, &glsl::Options::default());
    assert!(output.contains("#extension GL_ARB_gpu_shader_int64 : require"));
}

#[test]
fn spec_constant_macro_fallback() {
    let mut shader = Shader::new(ShaderStage::Compute);
    let mut builder = ShaderBuilder::new(&mut shader);
    let int_ty = builder.shader_mut().types.get_scalar(Scalar::I32);
    let var = builder.register_spec_constant("WORKGROUP", 0, int_ty);
    let value = builder
        .shader_mut()
        .add_expr(int_ty, ExprKind::Literal(Literal::I32(64)));
    let decl = builder.shader_mut().add_stmt(Stmt::SpecConstantDecl {
        var,
        location: 0,
        value,
    });
    builder.add_stmt(decl);
    drop(builder);

    let constant_id = write(&shader, &glsl::Options::default());
    assert!(constant_id.contains("layout(constant_id = 0) const int WORKGROUP = 64;"));

    let options = glsl::Options {
        use_spec_constants: false,
        ..Default::default()
    };
    let lowered = write(&shader, &options);
    assert!(lowered.contains("#define WORKGROUP 64"));
}
