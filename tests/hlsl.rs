use shade::back::hlsl;
use shade::ir::{AssignOp, ExprKind, FnFlags, Literal, Stmt, VarFlags};
use shade::ty::{MemoryLayout, Scalar, StructFlag, VectorSize};
use shade::{BuiltIn, Shader, ShaderBuilder, ShaderStage};

fn entry_point(builder: &mut ShaderBuilder, body: shade::Handle<shade::ir::Stmt>) {
    let void = builder.shader_mut().types.get_void();
    let fn_ty = builder.shader_mut().types.get_function(void, vec![]);
    let main = builder.register_function("main", fn_ty).unwrap();
    let decl = builder.shader_mut().add_stmt(Stmt::FunctionDecl {
        var: main,
        params: vec![],
        body,
        flags: FnFlags::ENTRY_POINT,
    });
    builder.add_stmt(decl);
}

#[test]
fn position_builtin_maps_to_sv_position() {
    let mut shader = Shader::new(ShaderStage::Vertex);
    let mut builder = ShaderBuilder::new(&mut shader);
    let vec4 = builder
        .shader_mut()
        .types
        .get_vector(Scalar::F32, VectorSize::Quad);
    let position = builder.register_builtin(BuiltIn::Position, vec4, VarFlags::SHADER_OUTPUT);

    // gl_Position = vec4(0.0);
    let zero = builder
        .shader_mut()
        .add_expr(vec4, ExprKind::Literal(Literal::F32(0.0)));
    let value = builder.shader_mut().add_expr(
        vec4,
        ExprKind::CompositeConstruct {
            components: vec![zero],
        },
    );
    let target = builder.shader_mut().add_expr(vec4, ExprKind::Ident(position));
    let assign = builder.shader_mut().add_expr(
        vec4,
        ExprKind::Assign {
            op: AssignOp::Assign,
            target,
            value,
        },
    );
    let assign = builder.shader_mut().add_stmt(Stmt::Simple(assign));
    let body = builder.shader_mut().add_stmt(Stmt::Container(vec![assign]));
    entry_point(&mut builder, body);
    drop(builder);

    let output = hlsl::write_string(&shader, &hlsl::Options::default()).unwrap();
    assert!(output.contains("struct StageOutput"));
    assert!(output.contains(": SV_Position;"));
    assert!(output.contains("StageOutput main()"));
    assert!(output.contains("return stage_output;"));
    // No #version line in HLSL.
    assert!(!output.contains("#version"));
}

#[test]
fn constant_buffer_prints_as_cbuffer() {
    let mut shader = Shader::new(ShaderStage::Vertex);
    let mut builder = ShaderBuilder::new(&mut shader);
    let f32_ty = builder.shader_mut().types.get_scalar(Scalar::F32);
    let def = builder.get_struct(MemoryLayout::Std140, "Globals", StructFlag::None);
    builder
        .shader_mut()
        .types
        .add_member(def, "time", f32_ty, None, None);
    let ubo_ty = builder.shader_mut().types.struct_type(def);
    let var = builder.register_name("globals", ubo_ty, VarFlags::UNIFORM | VarFlags::CONSTANT);
    let decl = builder.shader_mut().add_stmt(Stmt::ConstantBufferDecl {
        var,
        binding: 0,
        set: 0,
    });
    builder.add_stmt(decl);

    let body = builder.shader_mut().add_stmt(Stmt::Container(vec![]));
    entry_point(&mut builder, body);
    drop(builder);

    let output = hlsl::write_string(&shader, &hlsl::Options::default()).unwrap();
    assert!(output.contains("cbuffer Globals : register(b0)"));
    assert!(output.contains("float time;"));
}

#[test]
fn combined_image_splits_into_texture_and_sampler() {
    use shade::ir::expr::CombinedImageAccess;
    use shade::ty::ImageConfig;

    let mut shader = Shader::new(ShaderStage::Fragment);
    let mut builder = ShaderBuilder::new(&mut shader);
    let config = ImageConfig::sampled_2d();
    let tex_ty = builder.shader_mut().types.get_combined_image(config, false);
    let vec2 = builder
        .shader_mut()
        .types
        .get_vector(Scalar::F32, VectorSize::Bi);
    let vec4 = builder
        .shader_mut()
        .types
        .get_vector(Scalar::F32, VectorSize::Quad);

    let tex = builder.register_texture("albedo", tex_ty, 0, 0, true);
    let decl = builder.shader_mut().add_stmt(Stmt::CombinedImageDecl {
        var: tex,
        binding: 0,
        set: 0,
    });
    builder.add_stmt(decl);

    let uv_var = builder.register_locale("uv", vec2);
    let uv_decl = builder
        .shader_mut()
        .add_stmt(Stmt::VariableDecl { var: uv_var });
    builder.add_stmt(uv_decl);

    let image = builder.shader_mut().add_expr(tex_ty, ExprKind::Ident(tex));
    let uv = builder.shader_mut().add_expr(vec2, ExprKind::Ident(uv_var));
    let sample = builder.shader_mut().add_expr(
        vec4,
        ExprKind::CombinedImageAccess {
            access: CombinedImageAccess::Sample,
            image,
            arguments: vec![uv],
        },
    );
    let sample = builder.shader_mut().add_stmt(Stmt::Simple(sample));
    let body = builder.shader_mut().add_stmt(Stmt::Container(vec![sample]));
    entry_point(&mut builder, body);
    drop(builder);

    let output = hlsl::write_string(&shader, &hlsl::Options::default()).unwrap();
    assert!(output.contains("Texture2D<float4> albedo_texture : register(t0);"));
    assert!(output.contains("SamplerState albedo_sampler : register(s0);"));
    assert!(output.contains("albedo_texture.Sample(albedo_sampler, uv)"));
}

#[test]
fn ray_tracing_needs_sm_6_5() {
    let shader = Shader::new(ShaderStage::RayGeneration);
    let result = hlsl::write_string(
        &shader,
        &hlsl::Options {
            shader_model: hlsl::ShaderModel::V6_0,
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(hlsl::Error::UnsupportedStage(..))));
}
