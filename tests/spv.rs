use shade::back::spv;
use shade::back::PreprocContext;
use shade::ir::{BinaryOp, ExprKind, FnFlags, Stmt, VarFlags};
use shade::ty::{MemoryLayout, Scalar, StructFlag, VectorSize};
use shade::{Shader, ShaderBuilder, ShaderStage};
use spirv::Op;

fn compile(shader: &Shader) -> spv::Module {
    spv::compile(shader, PreprocContext::default(), &spv::Options::default()).unwrap()
}

fn entry_point(builder: &mut ShaderBuilder, body: shade::Handle<Stmt>) {
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
fn ubo_member_types_are_deduplicated() {
    // Two float members and a float local produce exactly one OpTypeFloat
    // and one uniform float pointer.
    let mut shader = Shader::new(ShaderStage::Compute);
    let mut builder = ShaderBuilder::new(&mut shader);
    let f32_ty = builder.shader_mut().types.get_scalar(Scalar::F32);
    let def = builder.get_struct(MemoryLayout::Std140, "Params", StructFlag::None);
    builder
        .shader_mut()
        .types
        .add_member(def, "scale", f32_ty, None, None);
    builder
        .shader_mut()
        .types
        .add_member(def, "bias", f32_ty, None, None);
    let ubo_ty = builder.shader_mut().types.struct_type(def);
    let ubo = builder.register_name("params", ubo_ty, VarFlags::UNIFORM | VarFlags::CONSTANT);
    let decl = builder.shader_mut().add_stmt(Stmt::ConstantBufferDecl {
        var: ubo,
        binding: 0,
        set: 0,
    });
    builder.add_stmt(decl);

    let t = builder.register_locale("t", f32_ty);
    let base_a = builder.shader_mut().add_expr(ubo_ty, ExprKind::Ident(ubo));
    let member_a = builder
        .shader_mut()
        .add_expr(f32_ty, ExprKind::MemberSelect { base: base_a, index: 0 });
    let base_b = builder.shader_mut().add_expr(ubo_ty, ExprKind::Ident(ubo));
    let member_b = builder
        .shader_mut()
        .add_expr(f32_ty, ExprKind::MemberSelect { base: base_b, index: 1 });
    let sum = builder.shader_mut().add_expr(
        f32_ty,
        ExprKind::Binary {
            op: BinaryOp::Add,
            left: member_a,
            right: member_b,
        },
    );
    let target = builder.shader_mut().add_expr(f32_ty, ExprKind::Ident(t));
    let init = builder
        .shader_mut()
        .add_expr(f32_ty, ExprKind::Init { target, value: sum });
    let stmt = builder.shader_mut().add_stmt(Stmt::Simple(init));
    let body = builder.shader_mut().add_stmt(Stmt::Container(vec![stmt]));
    entry_point(&mut builder, body);
    drop(builder);

    let module = compile(&shader);

    let float_types: Vec<_> = module
        .declarations
        .iter()
        .filter(|instruction| instruction.op == Op::TypeFloat)
        .collect();
    assert_eq!(float_types.len(), 1, "OpTypeFloat must be unique");
    let float_id = float_types[0].result_id.unwrap();

    let uniform_float_pointers = module
        .declarations
        .iter()
        .filter(|instruction| {
            instruction.op == Op::TypePointer
                && instruction.operands
                    == vec![spirv::StorageClass::Uniform as u32, float_id]
        })
        .count();
    assert_eq!(
        uniform_float_pointers, 1,
        "OpTypePointer Uniform float must be unique"
    );
}

#[test]
fn std140_offsets_are_decorated() {
    // struct { float a; vec3 b; float c; } -> Offset 0, 16, 28.
    let mut shader = Shader::new(ShaderStage::Compute);
    let mut builder = ShaderBuilder::new(&mut shader);
    let f32_ty = builder.shader_mut().types.get_scalar(Scalar::F32);
    let vec3 = builder
        .shader_mut()
        .types
        .get_vector(Scalar::F32, VectorSize::Tri);
    let def = builder.get_struct(MemoryLayout::Std140, "Data", StructFlag::None);
    builder
        .shader_mut()
        .types
        .add_member(def, "a", f32_ty, None, None);
    builder
        .shader_mut()
        .types
        .add_member(def, "b", vec3, None, None);
    builder
        .shader_mut()
        .types
        .add_member(def, "c", f32_ty, None, None);
    let ubo_ty = builder.shader_mut().types.struct_type(def);
    let ubo = builder.register_name("data", ubo_ty, VarFlags::UNIFORM | VarFlags::CONSTANT);
    let decl = builder.shader_mut().add_stmt(Stmt::ConstantBufferDecl {
        var: ubo,
        binding: 0,
        set: 0,
    });
    builder.add_stmt(decl);
    let body = builder.shader_mut().add_stmt(Stmt::Container(vec![]));
    entry_point(&mut builder, body);
    drop(builder);

    let module = compile(&shader);
    let offsets: Vec<(u32, u32)> = module
        .annotations
        .iter()
        .filter(|instruction| {
            instruction.op == Op::MemberDecorate
                && instruction.operands.get(2) == Some(&(spirv::Decoration::Offset as u32))
        })
        .map(|instruction| (instruction.operands[1], instruction.operands[3]))
        .collect();
    assert_eq!(offsets, vec![(0, 0), (1, 16), (2, 28)]);
}

#[test]
fn matrix_member_stride() {
    // struct { mat3 m; } under std140: ColMajor + MatrixStride 16.
    let mut shader = Shader::new(ShaderStage::Compute);
    let mut builder = ShaderBuilder::new(&mut shader);
    let mat3 = builder
        .shader_mut()
        .types
        .get_matrix(Scalar::F32, VectorSize::Tri, VectorSize::Tri);
    let def = builder.get_struct(MemoryLayout::Std140, "Transforms", StructFlag::None);
    builder
        .shader_mut()
        .types
        .add_member(def, "m", mat3, None, None);
    let ubo_ty = builder.shader_mut().types.struct_type(def);
    let ubo = builder.register_name("transforms", ubo_ty, VarFlags::UNIFORM | VarFlags::CONSTANT);
    let decl = builder.shader_mut().add_stmt(Stmt::ConstantBufferDecl {
        var: ubo,
        binding: 0,
        set: 0,
    });
    builder.add_stmt(decl);
    let body = builder.shader_mut().add_stmt(Stmt::Container(vec![]));
    entry_point(&mut builder, body);
    drop(builder);

    let module = compile(&shader);
    assert!(module.annotations.iter().any(|instruction| {
        instruction.op == Op::MemberDecorate
            && instruction.operands.get(2) == Some(&(spirv::Decoration::ColMajor as u32))
    }));
    assert!(module.annotations.iter().any(|instruction| {
        instruction.op == Op::MemberDecorate
            && instruction.operands.get(2) == Some(&(spirv::Decoration::MatrixStride as u32))
            && instruction.operands.get(3) == Some(&16)
    }));
}

#[test]
fn header_and_round_trip() {
    let mut shader = Shader::new(ShaderStage::Compute);
    let mut builder = ShaderBuilder::new(&mut shader);
    let layout = builder.shader_mut().add_stmt(Stmt::InputComputeLayout {
        local_size: [4, 2, 1],
    });
    builder.add_stmt(layout);
    let body = builder.shader_mut().add_stmt(Stmt::Container(vec![]));
    entry_point(&mut builder, body);
    drop(builder);

    let module = compile(&shader);
    let mut words = Vec::new();
    module.assemble(true, &mut words);

    assert_eq!(words[0], spirv::MAGIC_NUMBER);
    assert_eq!(words[1], (1 << 16) | (3 << 8));
    assert_eq!(words[3], module.bound);
    assert_eq!(words[4], 0);

    // Word-level round trip through the decoder.
    let decoded = spv::Module::deserialize(&words).unwrap();
    let mut round_tripped = Vec::new();
    decoded.assemble(true, &mut round_tripped);
    assert_eq!(words, round_tripped);

    // Headerless form drops exactly the five header words.
    let mut headerless = Vec::new();
    module.assemble(false, &mut headerless);
    assert_eq!(&words[5..], &headerless[..]);
}

#[test]
fn compute_entry_point_metadata() {
    let mut shader = Shader::new(ShaderStage::Compute);
    let mut builder = ShaderBuilder::new(&mut shader);
    let layout = builder.shader_mut().add_stmt(Stmt::InputComputeLayout {
        local_size: [8, 4, 1],
    });
    builder.add_stmt(layout);
    let body = builder.shader_mut().add_stmt(Stmt::Container(vec![]));
    entry_point(&mut builder, body);
    drop(builder);

    let module = compile(&shader);
    assert_eq!(module.entry_points.len(), 1);
    let entry = &module.entry_points[0];
    assert_eq!(entry.op, Op::EntryPoint);
    assert_eq!(
        entry.operands[0],
        spirv::ExecutionModel::GLCompute as u32
    );
    assert!(module.execution_modes.iter().any(|instruction| {
        instruction.op == Op::ExecutionMode
            && instruction.operands.get(1) == Some(&(spirv::ExecutionMode::LocalSize as u32))
            && instruction.operands.get(2..5) == Some(&[8, 4, 1][..])
    }));
    // The shader capability is always declared.
    assert!(module.capabilities.iter().any(|instruction| {
        instruction.op == Op::Capability
            && instruction.operands == vec![spirv::Capability::Shader as u32]
    }));
}

#[test]
fn missing_entry_point_is_an_empty_result() {
    let shader = Shader::new(ShaderStage::Compute);
    let words = spv::write_vec(&shader, PreprocContext::default(), &spv::Options::default());
    assert!(words.is_empty());
}
