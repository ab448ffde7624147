//! Module generation: globals, functions, blocks and expressions.

use super::instructions::Instruction;
use super::types::CachedConstant;
use super::{Error, IdGenerator, Module, ModuleConfig, Options};
use crate::arena::{Arena, Handle};
use crate::ir::{
    expr::{CombinedImageAccess, ImageAccess, Intrinsic},
    BinaryOp, Expr, ExprKind, FnFlags, Literal, Shader, Stmt, UnaryOp, VarFlags, Variable,
};
use crate::ty::{
    ImageConfig, InputTopology, OutputTopology, ScalarKind, Trinary, Type, TypeCache, TypeInner,
};
use crate::xform::TreeRef;
use crate::{BuiltIn, FastHashMap, ShaderStage};
use spirv::Word;

/// GLSL.std.450 extended instruction numbers used by the intrinsics.
mod gl450 {
    pub const ROUND: u32 = 1;
    pub const TRUNC: u32 = 3;
    pub const FABS: u32 = 4;
    pub const SABS: u32 = 5;
    pub const FSIGN: u32 = 6;
    pub const SSIGN: u32 = 7;
    pub const FLOOR: u32 = 8;
    pub const CEIL: u32 = 9;
    pub const FRACT: u32 = 10;
    pub const RADIANS: u32 = 11;
    pub const DEGREES: u32 = 12;
    pub const SIN: u32 = 13;
    pub const COS: u32 = 14;
    pub const TAN: u32 = 15;
    pub const ASIN: u32 = 16;
    pub const ACOS: u32 = 17;
    pub const ATAN: u32 = 18;
    pub const SINH: u32 = 19;
    pub const COSH: u32 = 20;
    pub const TANH: u32 = 21;
    pub const ATAN2: u32 = 25;
    pub const POW: u32 = 26;
    pub const EXP: u32 = 27;
    pub const LOG: u32 = 28;
    pub const EXP2: u32 = 29;
    pub const LOG2: u32 = 30;
    pub const SQRT: u32 = 31;
    pub const INVERSE_SQRT: u32 = 32;
    pub const DETERMINANT: u32 = 33;
    pub const MATRIX_INVERSE: u32 = 34;
    pub const FMIN: u32 = 37;
    pub const UMIN: u32 = 38;
    pub const SMIN: u32 = 39;
    pub const FMAX: u32 = 40;
    pub const UMAX: u32 = 41;
    pub const SMAX: u32 = 42;
    pub const FCLAMP: u32 = 43;
    pub const UCLAMP: u32 = 44;
    pub const SCLAMP: u32 = 45;
    pub const FMIX: u32 = 46;
    pub const STEP: u32 = 48;
    pub const SMOOTH_STEP: u32 = 49;
    pub const FMA: u32 = 50;
    pub const LENGTH: u32 = 66;
    pub const DISTANCE: u32 = 67;
    pub const CROSS: u32 = 68;
    pub const NORMALIZE: u32 = 69;
    pub const FACE_FORWARD: u32 = 70;
    pub const REFLECT: u32 = 71;
    pub const REFRACT: u32 = 72;
    pub const FIND_I_LSB: u32 = 73;
    pub const FIND_S_MSB: u32 = 74;
    pub const FIND_U_MSB: u32 = 75;
}

pub(super) const fn map_builtin(builtin: BuiltIn) -> spirv::BuiltIn {
    use spirv::BuiltIn as Sb;
    match builtin {
        BuiltIn::Position => Sb::Position,
        BuiltIn::PointSize => Sb::PointSize,
        BuiltIn::ClipDistance => Sb::ClipDistance,
        BuiltIn::CullDistance => Sb::CullDistance,
        BuiltIn::VertexIndex => Sb::VertexIndex,
        BuiltIn::InstanceIndex => Sb::InstanceIndex,
        BuiltIn::PrimitiveId => Sb::PrimitiveId,
        BuiltIn::InvocationId => Sb::InvocationId,
        BuiltIn::Layer => Sb::Layer,
        BuiltIn::ViewportIndex => Sb::ViewportIndex,
        BuiltIn::TessLevelOuter => Sb::TessLevelOuter,
        BuiltIn::TessLevelInner => Sb::TessLevelInner,
        BuiltIn::TessCoord => Sb::TessCoord,
        BuiltIn::PatchVertices => Sb::PatchVertices,
        BuiltIn::FragCoord => Sb::FragCoord,
        BuiltIn::FrontFacing => Sb::FrontFacing,
        BuiltIn::SampleId => Sb::SampleId,
        BuiltIn::SamplePosition => Sb::SamplePosition,
        BuiltIn::SampleMask => Sb::SampleMask,
        BuiltIn::FragDepth => Sb::FragDepth,
        BuiltIn::HelperInvocation => Sb::HelperInvocation,
        BuiltIn::NumWorkGroups => Sb::NumWorkgroups,
        BuiltIn::WorkGroupSize => Sb::WorkgroupSize,
        BuiltIn::WorkGroupId => Sb::WorkgroupId,
        BuiltIn::LocalInvocationId => Sb::LocalInvocationId,
        BuiltIn::GlobalInvocationId => Sb::GlobalInvocationId,
        BuiltIn::LocalInvocationIndex => Sb::LocalInvocationIndex,
        BuiltIn::LaunchId => Sb::LaunchIdNV,
        BuiltIn::LaunchSize => Sb::LaunchSizeNV,
        BuiltIn::WorldRayOrigin => Sb::WorldRayOriginNV,
        BuiltIn::WorldRayDirection => Sb::WorldRayDirectionNV,
        BuiltIn::ObjectRayOrigin => Sb::ObjectRayOriginNV,
        BuiltIn::ObjectRayDirection => Sb::ObjectRayDirectionNV,
        BuiltIn::RayTmin => Sb::RayTminNV,
        BuiltIn::RayTmax => Sb::RayTmaxNV,
        BuiltIn::InstanceCustomIndex => Sb::InstanceCustomIndexNV,
        BuiltIn::ObjectToWorld => Sb::ObjectToWorldNV,
        BuiltIn::WorldToObject => Sb::WorldToObjectNV,
        BuiltIn::HitKind => Sb::HitKindNV,
        BuiltIn::RayGeometryIndex => Sb::RayGeometryIndexKHR,
    }
}

/// Whether a builtin is read or written by this stage.
const fn builtin_class(builtin: BuiltIn, stage: ShaderStage) -> spirv::StorageClass {
    use spirv::StorageClass as Sc;
    match builtin {
        BuiltIn::Position => match stage {
            ShaderStage::Fragment => Sc::Input,
            _ => Sc::Output,
        },
        BuiltIn::PointSize | BuiltIn::FragDepth => Sc::Output,
        BuiltIn::ClipDistance | BuiltIn::CullDistance => match stage {
            ShaderStage::Fragment => Sc::Input,
            _ => Sc::Output,
        },
        BuiltIn::TessLevelOuter | BuiltIn::TessLevelInner => match stage {
            ShaderStage::TessellationControl => Sc::Output,
            _ => Sc::Input,
        },
        BuiltIn::Layer | BuiltIn::ViewportIndex => match stage {
            ShaderStage::Fragment => Sc::Input,
            _ => Sc::Output,
        },
        BuiltIn::SampleMask => match stage {
            ShaderStage::Fragment => Sc::Output,
            _ => Sc::Input,
        },
        _ => Sc::Input,
    }
}

struct LoopFrame {
    merge: Word,
    continuing: Word,
}

#[derive(Default)]
struct FunctionContext {
    /// Pointer ids of locals and pointer-passed parameters.
    local_ptrs: FastHashMap<Handle<Variable>, Word>,
    /// Value ids of by-value parameters.
    param_values: FastHashMap<Handle<Variable>, Word>,
    /// Combined image+sampler merge cache, valid within one block.
    sampled_cache: FastHashMap<(Word, Word), Word>,
}

/// Generates a [`Module`] from an adapted statement tree.
pub struct Writer<'a> {
    shader: &'a Shader,
    pub(super) types: &'a mut TypeCache,
    variables: &'a Arena<Variable>,
    tree: TreeRef<'a>,
    config: ModuleConfig,
    options: &'a Options,
    debug_source: Option<String>,

    pub(super) id_gen: IdGenerator,
    pub(super) declarations: Vec<Instruction>,
    pub(super) annotations: Vec<Instruction>,
    pub(super) debug_names: Vec<Instruction>,
    execution_modes_args: Vec<(spirv::ExecutionMode, Vec<Word>)>,
    functions: Vec<Instruction>,

    pub(super) lookup_type: FastHashMap<Handle<Type>, Word>,
    pub(super) lookup_image: FastHashMap<(ImageConfig, Trinary), Word>,
    pub(super) lookup_pointer: FastHashMap<u64, Word>,
    pub(super) lookup_function_type: FastHashMap<(Word, Vec<Word>), Word>,
    pub(super) cached_constants: FastHashMap<CachedConstant, Word>,
    lookup_function: FastHashMap<Handle<Variable>, Word>,

    /// Module-scope `OpVariable` ids with their storage class.
    global_ptrs: FastHashMap<Handle<Variable>, (Word, spirv::StorageClass)>,
    /// Module-scope constants (static and specialisation).
    global_constants: FastHashMap<Handle<Variable>, Word>,
    interface_ids: Vec<Word>,
    entry_point: Option<(Word, String)>,
    gl450_ext_inst_id: Word,

    // Current function state.
    context: FunctionContext,
    current_block: Vec<Instruction>,
    current_label: Word,
    block_open: bool,
    loop_stack: Vec<LoopFrame>,
    switch_merge: Vec<Word>,
}

impl<'a> Writer<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        shader: &'a Shader,
        types: &'a mut TypeCache,
        variables: &'a Arena<Variable>,
        tree: TreeRef<'a>,
        config: ModuleConfig,
        options: &'a Options,
        debug_source: Option<String>,
    ) -> Self {
        let actions = config.actions;
        Writer {
            shader,
            types,
            variables,
            tree,
            config,
            options,
            debug_source,
            id_gen: IdGenerator::default(),
            declarations: Vec::with_capacity(actions.exprs),
            annotations: Vec::new(),
            debug_names: Vec::new(),
            execution_modes_args: Vec::new(),
            functions: Vec::with_capacity(actions.stmts),
            lookup_type: FastHashMap::default(),
            lookup_image: FastHashMap::default(),
            lookup_pointer: FastHashMap::default(),
            lookup_function_type: FastHashMap::default(),
            cached_constants: FastHashMap::default(),
            lookup_function: FastHashMap::default(),
            global_ptrs: FastHashMap::default(),
            global_constants: FastHashMap::default(),
            interface_ids: Vec::new(),
            entry_point: None,
            gl450_ext_inst_id: 0,
            context: FunctionContext::default(),
            current_block: Vec::new(),
            current_label: 0,
            block_open: false,
            loop_stack: Vec::new(),
            switch_merge: Vec::new(),
        }
    }

    pub fn write(mut self) -> Result<Module, Error> {
        self.gl450_ext_inst_id = self.id_gen.next();

        // Globals first, then functions, walking the root container in order.
        let root = self.tree.root;
        match self.tree.stmts[root] {
            Stmt::Container(ref block) => {
                let block = block.clone();
                for child in block {
                    self.write_global_stmt(child)?;
                }
            }
            _ => return Err(Error::Validation("shader root is not a container")),
        }

        let (entry_id, entry_name) = self.entry_point.clone().ok_or(Error::EntryPointNotFound)?;

        let mut module = Module {
            version: self.options.lang_version,
            bound: self.id_gen.bound(),
            ..Module::default()
        };
        for &capability in &self.config.capabilities {
            module
                .capabilities
                .push(Instruction::capability(capability));
        }
        for extension in &self.config.extensions {
            module.extensions.push(Instruction::extension(extension));
        }
        module.ext_inst_imports.push(Instruction::ext_inst_import(
            self.gl450_ext_inst_id,
            "GLSL.std.450",
        ));
        module.memory_model.push(Instruction::memory_model(
            spirv::AddressingModel::Logical,
            self.options.memory_model,
        ));
        module.entry_points.push(Instruction::entry_point(
            self.config.execution_model,
            entry_id,
            &entry_name,
            &self.interface_ids,
        ));

        // Stage-implied execution modes come first, then the collected ones.
        let mut modes = Vec::new();
        if self.shader.stage() == ShaderStage::Fragment {
            modes.push((spirv::ExecutionMode::OriginUpperLeft, Vec::new()));
        }
        modes.append(&mut self.execution_modes_args);
        for (mode, args) in modes {
            module
                .execution_modes
                .push(Instruction::execution_mode(entry_id, mode, &args));
        }

        if let Some(ref source) = self.debug_source {
            let string_id = self.id_gen.next();
            module.bound = self.id_gen.bound();
            module
                .debug_strings
                .push(Instruction::string("generated.glsl", string_id));
            module.debug_strings.push(Instruction::source(
                spirv::SourceLanguage::GLSL,
                460,
                Some((string_id, source)),
            ));
        }

        module.debug_names = std::mem::take(&mut self.debug_names);
        module.annotations = std::mem::take(&mut self.annotations);
        module.declarations = std::mem::take(&mut self.declarations);
        module.function_definitions = std::mem::take(&mut self.functions);
        Ok(module)
    }

    fn name_id(&mut self, id: Word, name: &str) {
        self.debug_names.push(Instruction::name(id, name));
    }

    //
    // Globals.
    //

    fn declare_global(
        &mut self,
        var: Handle<Variable>,
        class: spirv::StorageClass,
    ) -> Word {
        if let Some(&(id, _)) = self.global_ptrs.get(&var) {
            return id;
        }
        let ty = self.variables[var].ty;
        super::adapt::note_type_capabilities(self.types, ty, &mut self.config.capabilities);
        let pointer_id = self.get_pointer_id(ty, class);
        let id = self.id_gen.next();
        self.declarations
            .push(Instruction::variable(pointer_id, id, class, None));
        let name = self.variables[var].name.clone();
        self.name_id(id, &name);
        if matches!(class, spirv::StorageClass::Input | spirv::StorageClass::Output) {
            self.interface_ids.push(id);
        }
        self.global_ptrs.insert(var, (id, class));
        id
    }

    fn decorate_binding(&mut self, id: Word, binding: u32, set: u32) {
        self.annotations.push(Instruction::decorate(
            id,
            spirv::Decoration::DescriptorSet,
            &[set],
        ));
        self.annotations.push(Instruction::decorate(
            id,
            spirv::Decoration::Binding,
            &[binding],
        ));
    }

    fn write_global_stmt(&mut self, stmt: Handle<Stmt>) -> Result<(), Error> {
        match self.tree.stmts[stmt] {
            Stmt::Container(ref block) | Stmt::Compound(ref block) => {
                let block = block.clone();
                for child in block {
                    self.write_global_stmt(child)?;
                }
            }
            Stmt::StructureDecl(def) => {
                let handle = self.types.struct_type(def);
                self.get_type_id(handle);
            }
            Stmt::VariableDecl { var } => {
                let class = if self.variables[var].flags.contains(VarFlags::SHARED) {
                    spirv::StorageClass::Workgroup
                } else {
                    spirv::StorageClass::Private
                };
                self.declare_global(var, class);
            }
            Stmt::InOutVariableDecl { var, location } => {
                let flags = self.variables[var].flags;
                let class = if flags.contains(VarFlags::SHADER_INPUT) {
                    spirv::StorageClass::Input
                } else {
                    spirv::StorageClass::Output
                };
                let id = self.declare_global(var, class);
                self.annotations.push(Instruction::decorate(
                    id,
                    spirv::Decoration::Location,
                    &[location],
                ));
                if flags.contains(VarFlags::FLAT) {
                    self.annotations
                        .push(Instruction::decorate(id, spirv::Decoration::Flat, &[]));
                }
            }
            Stmt::SamplerDecl { var, binding, set }
            | Stmt::SampledImageDecl { var, binding, set }
            | Stmt::CombinedImageDecl { var, binding, set }
            | Stmt::ImageDecl { var, binding, set } => {
                let id = self.declare_global(var, spirv::StorageClass::UniformConstant);
                self.decorate_binding(id, binding, set);
            }
            Stmt::ConstantBufferDecl { var, binding, set } => {
                let id = self.declare_global(var, spirv::StorageClass::Uniform);
                self.decorate_binding(id, binding, set);
                self.decorate_buffer_block(var);
            }
            Stmt::ShaderBufferDecl { var, binding, set } => {
                let id = self.declare_global(var, spirv::StorageClass::StorageBuffer);
                self.decorate_binding(id, binding, set);
                self.decorate_buffer_block(var);
            }
            Stmt::ShaderStructBufferDecl {
                instance,
                binding,
                set,
                ..
            } => {
                let id = self.declare_global(instance, spirv::StorageClass::StorageBuffer);
                self.decorate_binding(id, binding, set);
                self.decorate_buffer_block(instance);
            }
            Stmt::PushConstantsBufferDecl { var, .. } => {
                self.declare_global(var, spirv::StorageClass::PushConstant);
                self.decorate_buffer_block(var);
            }
            Stmt::InOutRayPayloadVariableDecl { var, location } => {
                let ty = self.variables[var].ty;
                let class = match *self.types.lookup(ty) {
                    TypeInner::RayPayload { incoming: true, .. } => {
                        spirv::StorageClass::IncomingRayPayloadNV
                    }
                    _ => spirv::StorageClass::RayPayloadNV,
                };
                let id = self.declare_global(var, class);
                self.annotations.push(Instruction::decorate(
                    id,
                    spirv::Decoration::Location,
                    &[location],
                ));
            }
            Stmt::SpecConstantDecl {
                var,
                location,
                value,
            } => {
                let literal = match self.tree.exprs[value].kind {
                    ExprKind::Literal(literal) => literal,
                    _ => return Err(Error::Validation("spec constant value is not a literal")),
                };
                let type_id = {
                    let handle = self.types.get_scalar(literal.scalar());
                    self.get_type_id(handle)
                };
                let id = self.id_gen.next();
                let bits = literal.bits();
                let words: Vec<Word> = if literal.scalar().width == 8 {
                    vec![bits as u32, (bits >> 32) as u32]
                } else {
                    vec![bits as u32]
                };
                self.declarations
                    .push(Instruction::spec_constant(type_id, id, &words));
                self.annotations.push(Instruction::decorate(
                    id,
                    spirv::Decoration::SpecId,
                    &[location],
                ));
                let name = self.variables[var].name.clone();
                self.name_id(id, &name);
                self.global_constants.insert(var, id);
            }
            Stmt::Simple(expr) => {
                // A global simple statement is a static-constant definition.
                if let ExprKind::Init { target, value } = self.tree.exprs[expr].kind {
                    if let ExprKind::Ident(var) = self.tree.exprs[target].kind {
                        let id = self.write_constant_expr(value)?;
                        self.global_constants.insert(var, id);
                    }
                }
            }
            Stmt::InputComputeLayout { local_size } => {
                self.execution_modes_args.push((
                    spirv::ExecutionMode::LocalSize,
                    vec![local_size[0], local_size[1], local_size[2]],
                ));
            }
            Stmt::InputGeometryLayout { topology } => {
                let mode = match topology {
                    InputTopology::Points => spirv::ExecutionMode::InputPoints,
                    InputTopology::Lines => spirv::ExecutionMode::InputLines,
                    InputTopology::LinesAdjacency => spirv::ExecutionMode::InputLinesAdjacency,
                    InputTopology::Triangles => spirv::ExecutionMode::Triangles,
                    InputTopology::TrianglesAdjacency => {
                        spirv::ExecutionMode::InputTrianglesAdjacency
                    }
                };
                self.execution_modes_args.push((mode, Vec::new()));
                self.execution_modes_args
                    .push((spirv::ExecutionMode::Invocations, vec![1]));
            }
            Stmt::OutputGeometryLayout {
                topology,
                max_vertices,
            } => {
                let mode = match topology {
                    OutputTopology::Points => spirv::ExecutionMode::OutputPoints,
                    OutputTopology::LineStrip | OutputTopology::Lines => {
                        spirv::ExecutionMode::OutputLineStrip
                    }
                    OutputTopology::TriangleStrip | OutputTopology::Triangles => {
                        spirv::ExecutionMode::OutputTriangleStrip
                    }
                };
                self.execution_modes_args.push((mode, Vec::new()));
                self.execution_modes_args
                    .push((spirv::ExecutionMode::OutputVertices, vec![max_vertices]));
            }
            Stmt::PerVertexDecl { .. } => {
                // The Position builtin variable carries the information.
            }
            Stmt::FunctionDecl {
                var,
                ref params,
                body,
                flags,
            } => {
                let params = params.clone();
                self.write_function(var, &params, body, flags)?;
            }
            // Text-level preprocessor statements have no binary counterpart;
            // adaptation substituted every reference already.
            Stmt::PreprocDefine { .. }
            | Stmt::PreprocIf { .. }
            | Stmt::PreprocIfDef { .. }
            | Stmt::PreprocElif { .. }
            | Stmt::PreprocElse
            | Stmt::PreprocEndif
            | Stmt::PreprocVersion { .. }
            | Stmt::PreprocExtension { .. } => {}
            ref other => {
                return Err(Error::Validation(match other {
                    Stmt::If { .. } | Stmt::Switch { .. } => "flow control at module scope",
                    _ => "unexpected statement at module scope",
                }))
            }
        }
        Ok(())
    }

    /// Block decoration for buffer-backed resources, always required on the
    /// backing struct.
    fn decorate_buffer_block(&mut self, var: Handle<Variable>) {
        let ty = self.variables[var].ty;
        let struct_ty = {
            let base = self.types.non_array(ty);
            self.types.unqualified(base)
        };
        if !matches!(*self.types.lookup(struct_ty), TypeInner::Struct(_)) {
            return;
        }
        let id = self.get_type_id(struct_ty);
        let already = self.annotations.iter().any(|instruction| {
            instruction.op == spirv::Op::Decorate
                && instruction.operands.first() == Some(&id)
                && instruction.operands.get(1) == Some(&(spirv::Decoration::Block as u32))
        });
        if !already {
            self.annotations
                .push(Instruction::decorate(id, spirv::Decoration::Block, &[]));
        }
    }

    /// A constant expression in the declarations section.
    fn write_constant_expr(&mut self, expr: Handle<Expr>) -> Result<Word, Error> {
        match self.tree.exprs[expr].kind {
            ExprKind::Literal(literal) => Ok(self.get_constant_scalar(literal)),
            ExprKind::CompositeConstruct { ref components } => {
                let components = components.clone();
                let type_id = {
                    let ty = self.tree.exprs[expr].ty;
                    self.get_type_id(ty)
                };
                let ids: Result<Vec<Word>, Error> = components
                    .iter()
                    .map(|&component| self.write_constant_expr(component))
                    .collect();
                Ok(self.get_constant_composite(type_id, &ids?))
            }
            _ => Err(Error::Validation("global initialiser is not constant")),
        }
    }

    //
    // Blocks.
    //

    fn begin_block(&mut self, label: Word) {
        debug_assert!(!self.block_open, "previous block was not terminated");
        self.current_label = label;
        self.current_block.clear();
        self.block_open = true;
        self.context.sampled_cache.clear();
    }

    fn push(&mut self, instruction: Instruction) {
        debug_assert!(self.block_open, "instruction outside of a block");
        self.current_block.push(instruction);
    }

    fn terminate(&mut self, terminator: Instruction) {
        debug_assert!(self.block_open, "terminating a closed block");
        self.functions.push(Instruction::label(self.current_label));
        self.functions.append(&mut self.current_block);
        self.functions.push(terminator);
        self.block_open = false;
    }

    /// Terminate with `terminator` and immediately open `next`.
    fn close_and_open(&mut self, terminator: Instruction, next: Word) {
        self.terminate(terminator);
        self.begin_block(next);
    }

    //
    // Functions.
    //

    fn write_function(
        &mut self,
        var: Handle<Variable>,
        params: &[Handle<Variable>],
        body: Handle<Stmt>,
        flags: FnFlags,
    ) -> Result<(), Error> {
        let fn_ty = self.variables[var].ty;
        let result_ty = match *self.types.lookup(fn_ty) {
            TypeInner::Function { result, .. } => result,
            // Entry points registered with a bare return type.
            _ => fn_ty,
        };
        let return_type_id = self.get_type_id(result_ty);

        // Pointer-passed parameters use function-storage pointer types.
        let mut param_type_ids = Vec::with_capacity(params.len());
        for &param in params {
            let param_ty = self.variables[param].ty;
            let id = if self.variables[param]
                .flags
                .intersects(VarFlags::OUTPUT_PARAM)
            {
                self.get_pointer_id(param_ty, spirv::StorageClass::Function)
            } else {
                self.get_type_id(param_ty)
            };
            param_type_ids.push(id);
        }
        let function_type_id = self.get_function_type_id(return_type_id, &param_type_ids);

        let function_id = self.id_gen.next();
        self.lookup_function.insert(var, function_id);
        let name = self.variables[var].name.clone();
        self.name_id(function_id, &name);
        if flags.contains(FnFlags::ENTRY_POINT) {
            self.entry_point = Some((function_id, name));
        }

        self.functions.push(Instruction::function(
            return_type_id,
            function_id,
            spirv::FunctionControl::NONE,
            function_type_id,
        ));

        self.context = FunctionContext::default();
        for (index, &param) in params.iter().enumerate() {
            let id = self.id_gen.next();
            self.functions
                .push(Instruction::function_parameter(param_type_ids[index], id));
            if self.variables[param]
                .flags
                .intersects(VarFlags::OUTPUT_PARAM)
            {
                self.context.local_ptrs.insert(param, id);
            } else {
                self.context.param_values.insert(param, id);
            }
        }

        // Entry block: all function-storage variables come first.
        let entry_label = self.id_gen.next();
        self.begin_block(entry_label);
        let mut locals = Vec::new();
        self.collect_locals(body, &mut locals);
        for local in locals {
            let ty = self.variables[local].ty;
            let pointer_id = self.get_pointer_id(ty, spirv::StorageClass::Function);
            let id = self.id_gen.next();
            self.current_block.push(Instruction::variable(
                pointer_id,
                id,
                spirv::StorageClass::Function,
                None,
            ));
            let name = self.variables[local].name.clone();
            self.name_id(id, &name);
            self.context.local_ptrs.insert(local, id);
        }

        self.write_stmt(body)?;

        if self.block_open {
            let terminator = if matches!(*self.types.lookup(result_ty), TypeInner::Void) {
                Instruction::return_void()
            } else {
                Instruction::unreachable()
            };
            self.terminate(terminator);
        }
        self.functions.push(Instruction::function_end());
        Ok(())
    }

    /// Every variable the body declares, in declaration order.
    fn collect_locals(&self, stmt: Handle<Stmt>, out: &mut Vec<Handle<Variable>>) {
        match self.tree.stmts[stmt] {
            Stmt::Container(ref block) | Stmt::Compound(ref block) => {
                for &child in block {
                    self.collect_locals(child, out);
                }
            }
            Stmt::VariableDecl { var } => out.push(var),
            Stmt::Simple(expr) => self.collect_expr_locals(expr, out),
            Stmt::If {
                then_body,
                ref else_ifs,
                else_body,
                ..
            } => {
                self.collect_locals(then_body, out);
                for else_if in else_ifs {
                    self.collect_locals(else_if.body, out);
                }
                if let Some(else_body) = else_body {
                    self.collect_locals(else_body, out);
                }
            }
            Stmt::Switch { ref cases, .. } => {
                for case in cases {
                    self.collect_locals(case.body, out);
                }
            }
            Stmt::For { init, body, .. } => {
                self.collect_expr_locals(init, out);
                self.collect_locals(body, out);
            }
            Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => {
                self.collect_locals(body, out)
            }
            _ => {}
        }
    }

    fn collect_expr_locals(&self, expr: Handle<Expr>, out: &mut Vec<Handle<Variable>>) {
        if let ExprKind::Init { target, .. } = self.tree.exprs[expr].kind {
            if let ExprKind::Ident(var) = self.tree.exprs[target].kind {
                if !self.variables[var]
                    .flags
                    .intersects(VarFlags::CONSTANT | VarFlags::SPEC_CONSTANT)
                {
                    out.push(var);
                }
            }
        }
    }

    //
    // Statements.
    //

    fn write_stmt(&mut self, stmt: Handle<Stmt>) -> Result<(), Error> {
        if !self.block_open {
            // Dead code after a terminator still needs a block.
            let label = self.id_gen.next();
            self.begin_block(label);
        }
        match self.tree.stmts[stmt] {
            Stmt::Container(ref block) | Stmt::Compound(ref block) => {
                let block = block.clone();
                for child in block {
                    self.write_stmt(child)?;
                }
            }
            // Handled by `collect_locals`.
            Stmt::VariableDecl { .. } => {}
            Stmt::Simple(expr) => {
                self.write_expr_stmt(expr)?;
            }
            Stmt::Return(value) => {
                let terminator = match value {
                    Some(value) => {
                        let id = self.write_expr(value)?;
                        Instruction::return_value(id)
                    }
                    None => Instruction::return_void(),
                };
                self.terminate(terminator);
            }
            Stmt::Discard => self.terminate(Instruction::kill()),
            Stmt::Break => {
                let merge = self
                    .switch_merge
                    .last()
                    .copied()
                    .or_else(|| self.loop_stack.last().map(|frame| frame.merge))
                    .ok_or(Error::Validation("break outside of loop or switch"))?;
                self.terminate(Instruction::branch(merge));
            }
            Stmt::Continue => {
                let continuing = self
                    .loop_stack
                    .last()
                    .map(|frame| frame.continuing)
                    .ok_or(Error::Validation("continue outside of loop"))?;
                self.terminate(Instruction::branch(continuing));
            }
            Stmt::If {
                condition,
                then_body,
                ref else_ifs,
                else_body,
            } => {
                let else_ifs = else_ifs.clone();
                self.write_if(condition, then_body, &else_ifs, else_body)?;
            }
            Stmt::Switch { test, ref cases } => {
                let cases = cases.clone();
                self.write_switch(test, &cases)?;
            }
            Stmt::For {
                init,
                condition,
                increment,
                body,
            } => {
                self.write_expr_stmt(init)?;
                self.write_loop(Some(condition), body, Some(increment), false)?;
            }
            Stmt::While { condition, body } => {
                self.write_loop(Some(condition), body, None, false)?;
            }
            Stmt::DoWhile { condition, body } => {
                self.write_loop(Some(condition), body, None, true)?;
            }
            Stmt::StructureDecl(def) => {
                let handle = self.types.struct_type(def);
                self.get_type_id(handle);
            }
            ref other => {
                // Declarations only appear at module scope.
                unreachable!("statement {other:?} inside a function body");
            }
        }
        Ok(())
    }

    fn write_if(
        &mut self,
        condition: Handle<Expr>,
        then_body: Handle<Stmt>,
        else_ifs: &[crate::ir::ElseIf],
        else_body: Option<Handle<Stmt>>,
    ) -> Result<(), Error> {
        let condition_id = self.write_expr(condition)?;
        let merge = self.id_gen.next();
        let then_label = self.id_gen.next();
        let has_else = !else_ifs.is_empty() || else_body.is_some();
        let else_label = if has_else { self.id_gen.next() } else { merge };

        self.push(Instruction::selection_merge(
            merge,
            spirv::SelectionControl::NONE,
        ));
        self.close_and_open(
            Instruction::branch_conditional(condition_id, then_label, else_label),
            then_label,
        );
        self.write_stmt(then_body)?;
        if self.block_open {
            self.terminate(Instruction::branch(merge));
        }

        if has_else {
            self.begin_block(else_label);
            match else_ifs.split_first() {
                Some((first, rest)) => {
                    self.write_if(first.condition, first.body, rest, else_body)?;
                }
                None => {
                    if let Some(else_body) = else_body {
                        self.write_stmt(else_body)?;
                    }
                }
            }
            if self.block_open {
                self.terminate(Instruction::branch(merge));
            }
        }
        self.begin_block(merge);
        Ok(())
    }

    fn write_switch(
        &mut self,
        test: Handle<Expr>,
        cases: &[crate::ir::SwitchCase],
    ) -> Result<(), Error> {
        let selector = match self.tree.exprs[test].kind {
            ExprKind::SwitchTest { value } => value,
            _ => test,
        };
        let selector_id = self.write_expr(selector)?;
        let merge = self.id_gen.next();

        let mut default_label = merge;
        let mut table = Vec::new();
        let mut labels = Vec::new();
        for case in cases {
            let label = self.id_gen.next();
            labels.push(label);
            match case.label {
                Some(expr) => {
                    let literal = self.case_literal(expr)?;
                    table.push((literal, label));
                }
                None => default_label = label,
            }
        }

        self.push(Instruction::selection_merge(
            merge,
            spirv::SelectionControl::NONE,
        ));
        self.terminate(Instruction::switch(selector_id, default_label, &table));

        for (case, &label) in cases.iter().zip(&labels) {
            self.begin_block(label);
            self.switch_merge.push(merge);
            self.write_stmt(case.body)?;
            self.switch_merge.pop();
            if self.block_open {
                self.terminate(Instruction::branch(merge));
            }
        }
        self.begin_block(merge);
        Ok(())
    }

    fn case_literal(&self, expr: Handle<Expr>) -> Result<Word, Error> {
        let literal = match self.tree.exprs[expr].kind {
            ExprKind::SwitchCase { label } => label,
            _ => expr,
        };
        match self.tree.exprs[literal].kind {
            ExprKind::Literal(value) => Ok(value.bits() as Word),
            _ => Err(Error::Validation("case label is not a literal")),
        }
    }

    /// Structured loop skeleton shared by `for`, `while` and `do`.
    fn write_loop(
        &mut self,
        condition: Option<Handle<Expr>>,
        body: Handle<Stmt>,
        increment: Option<Handle<Expr>>,
        check_after_body: bool,
    ) -> Result<(), Error> {
        let header = self.id_gen.next();
        let body_label = self.id_gen.next();
        let continuing = self.id_gen.next();
        let merge = self.id_gen.next();

        self.close_and_open(Instruction::branch(header), header);
        self.push(Instruction::loop_merge(
            merge,
            continuing,
            spirv::LoopControl::NONE,
        ));

        if check_after_body {
            // do-while: fall straight into the body; the condition sits in
            // the continuing block.
            self.close_and_open(Instruction::branch(body_label), body_label);
        } else {
            let check = self.id_gen.next();
            self.close_and_open(Instruction::branch(check), check);
            let condition_id = match condition {
                Some(condition) => self.write_expr(condition)?,
                None => self.get_constant_scalar(Literal::Bool(true)),
            };
            self.terminate(Instruction::branch_conditional(
                condition_id,
                body_label,
                merge,
            ));
            self.begin_block(body_label);
        }

        self.loop_stack.push(LoopFrame { merge, continuing });
        self.write_stmt(body)?;
        self.loop_stack.pop();
        if self.block_open {
            self.terminate(Instruction::branch(continuing));
        }

        self.begin_block(continuing);
        if let Some(increment) = increment {
            self.write_expr_stmt(increment)?;
        }
        if check_after_body {
            let condition_id = match condition {
                Some(condition) => self.write_expr(condition)?,
                None => self.get_constant_scalar(Literal::Bool(false)),
            };
            self.terminate(Instruction::branch_conditional(condition_id, header, merge));
        } else {
            self.terminate(Instruction::branch(header));
        }
        self.begin_block(merge);
        Ok(())
    }

    //
    // Expressions.
    //

    /// An expression in statement position; assignment-like kinds lower to
    /// stores, everything else evaluates for its side effects.
    fn write_expr_stmt(&mut self, expr: Handle<Expr>) -> Result<(), Error> {
        match self.tree.exprs[expr].kind {
            ExprKind::Init { target, value } => {
                let value_id = self.write_expr(value)?;
                let pointer = self.write_target(target)?;
                self.push(Instruction::store(pointer, value_id));
            }
            ExprKind::Assign { .. } => {
                self.write_expr(expr)?;
            }
            ExprKind::Dummy => {}
            _ => {
                self.write_expr(expr)?;
            }
        }
        Ok(())
    }

    fn scalar_kind_of(&self, ty: Handle<Type>) -> ScalarKind {
        self.types
            .lookup(ty)
            .scalar()
            .map_or(ScalarKind::Float, |scalar| scalar.kind)
    }

    /// A pointer to the storage an lvalue expression denotes.
    fn write_target(&mut self, expr: Handle<Expr>) -> Result<Word, Error> {
        match self.tree.exprs[expr].kind {
            ExprKind::Ident(var) => self.variable_pointer(var),
            ExprKind::MemberSelect { base, index } => {
                let base_ptr = self.write_target(base)?;
                let index_id = self.get_constant_scalar(Literal::U32(index));
                let ty = self.tree.exprs[expr].ty;
                let class = self.pointer_class_of(base)?;
                let pointer_type = self.get_pointer_id(ty, class);
                let id = self.id_gen.next();
                self.push(Instruction::access_chain(
                    pointer_type,
                    id,
                    base_ptr,
                    &[index_id],
                ));
                Ok(id)
            }
            ExprKind::Index { base, index } => {
                let base_ptr = self.write_target(base)?;
                let index_id = self.write_expr(index)?;
                let ty = self.tree.exprs[expr].ty;
                let class = self.pointer_class_of(base)?;
                let pointer_type = self.get_pointer_id(ty, class);
                let id = self.id_gen.next();
                self.push(Instruction::access_chain(
                    pointer_type,
                    id,
                    base_ptr,
                    &[index_id],
                ));
                Ok(id)
            }
            ExprKind::Swizzle {
                base,
                ref components,
            } => {
                let components = components.clone();
                if components.len() != 1 {
                    return Err(Error::FeatureNotImplemented(
                        "stores through multi-component swizzles",
                    ));
                }
                let base_ptr = self.write_target(base)?;
                let index_id = self.get_constant_scalar(Literal::U32(components[0] as u32));
                let ty = self.tree.exprs[expr].ty;
                let class = self.pointer_class_of(base)?;
                let pointer_type = self.get_pointer_id(ty, class);
                let id = self.id_gen.next();
                self.push(Instruction::access_chain(
                    pointer_type,
                    id,
                    base_ptr,
                    &[index_id],
                ));
                Ok(id)
            }
            _ => Err(Error::Validation("assignment target is not an lvalue")),
        }
    }

    /// The storage class of the variable at the root of an lvalue chain.
    fn pointer_class_of(&self, mut expr: Handle<Expr>) -> Result<spirv::StorageClass, Error> {
        loop {
            match self.tree.exprs[expr].kind {
                ExprKind::Ident(var) => {
                    if self.context.local_ptrs.contains_key(&var) {
                        return Ok(spirv::StorageClass::Function);
                    }
                    if let Some(&(_, class)) = self.global_ptrs.get(&var) {
                        return Ok(class);
                    }
                    return Ok(spirv::StorageClass::Function);
                }
                ExprKind::MemberSelect { base, .. }
                | ExprKind::Index { base, .. }
                | ExprKind::Swizzle { base, .. } => expr = base,
                _ => return Err(Error::Validation("lvalue chain with a non-lvalue root")),
            }
        }
    }

    /// The pointer id backing `var`, declaring module-scope storage lazily
    /// for builtins and stage-interface variables.
    fn variable_pointer(&mut self, var: Handle<Variable>) -> Result<Word, Error> {
        if let Some(&id) = self.context.local_ptrs.get(&var) {
            return Ok(id);
        }
        if let Some(&(id, _)) = self.global_ptrs.get(&var) {
            return Ok(id);
        }
        let flags = self.variables[var].flags;
        if flags.contains(VarFlags::BUILTIN) {
            let builtin = self.variables[var]
                .builtin
                .expect("builtin-flagged variable without a builtin tag");
            let class = builtin_class(builtin, self.shader.stage());
            let id = self.declare_global(var, class);
            self.annotations.push(Instruction::decorate(
                id,
                spirv::Decoration::BuiltIn,
                &[map_builtin(builtin) as Word],
            ));
            return Ok(id);
        }
        if flags.contains(VarFlags::SHADER_INPUT) {
            return Ok(self.declare_global(var, spirv::StorageClass::Input));
        }
        if flags.contains(VarFlags::SHADER_OUTPUT) {
            return Ok(self.declare_global(var, spirv::StorageClass::Output));
        }
        Err(Error::Validation("use of an undeclared variable"))
    }

    fn write_expr(&mut self, expr: Handle<Expr>) -> Result<Word, Error> {
        let ty = self.tree.exprs[expr].ty;
        match self.tree.exprs[expr].kind {
            ExprKind::Literal(literal) => Ok(self.get_constant_scalar(literal)),
            ExprKind::Ident(var) => {
                if let Some(&id) = self.global_constants.get(&var) {
                    return Ok(id);
                }
                if let Some(&id) = self.context.param_values.get(&var) {
                    return Ok(id);
                }
                let pointer = self.variable_pointer(var)?;
                let type_id = self.get_type_id(self.variables[var].ty);
                let id = self.id_gen.next();
                self.push(Instruction::load(type_id, id, pointer));
                Ok(id)
            }
            ExprKind::MemberSelect { .. } | ExprKind::Index { .. } => {
                let pointer = self.write_target(expr)?;
                let type_id = self.get_type_id(ty);
                let id = self.id_gen.next();
                self.push(Instruction::load(type_id, id, pointer));
                Ok(id)
            }
            ExprKind::Swizzle {
                base,
                ref components,
            } => {
                let components = components.clone();
                let base_id = self.write_expr(base)?;
                let type_id = self.get_type_id(ty);
                let id = self.id_gen.next();
                if components.len() == 1 {
                    self.push(Instruction::composite_extract(
                        type_id,
                        id,
                        base_id,
                        &[components[0] as Word],
                    ));
                } else {
                    let pattern: Vec<Word> =
                        components.iter().map(|&c| c as Word).collect();
                    self.push(Instruction::vector_shuffle(
                        type_id, id, base_id, base_id, &pattern,
                    ));
                }
                Ok(id)
            }
            ExprKind::Binary { op, left, right } => self.write_binary(ty, op, left, right),
            ExprKind::Unary { op, expr: operand } => self.write_unary(ty, op, operand),
            ExprKind::Assign { op, target, value } => {
                let value_id = match op.binary() {
                    Some(binary) => {
                        let loaded = self.write_expr(target)?;
                        let rhs = self.write_expr(value)?;
                        self.emit_binary_ids(ty, binary, loaded, rhs)?
                    }
                    None => self.write_expr(value)?,
                };
                let pointer = self.write_target(target)?;
                self.push(Instruction::store(pointer, value_id));
                Ok(value_id)
            }
            ExprKind::Cast { expr: operand } => self.write_cast(ty, operand),
            ExprKind::Question {
                condition,
                accept,
                reject,
            } => {
                let condition_id = self.write_expr(condition)?;
                let accept_id = self.write_expr(accept)?;
                let reject_id = self.write_expr(reject)?;
                let type_id = self.get_type_id(ty);
                let id = self.id_gen.next();
                self.push(Instruction::select(
                    type_id,
                    id,
                    condition_id,
                    accept_id,
                    reject_id,
                ));
                Ok(id)
            }
            ExprKind::AggrInit {
                target,
                ref initializers,
            } => {
                let initializers = initializers.clone();
                let ids: Result<Vec<Word>, Error> = initializers
                    .iter()
                    .map(|&init| self.write_expr(init))
                    .collect();
                let type_id = self.get_type_id(ty);
                let id = self.id_gen.next();
                self.push(Instruction::composite_construct(type_id, id, &ids?));
                if let Some(target) = target {
                    let pointer = self.write_target(target)?;
                    self.push(Instruction::store(pointer, id));
                }
                Ok(id)
            }
            ExprKind::CompositeConstruct { ref components } => {
                let components = components.clone();
                let ids: Result<Vec<Word>, Error> = components
                    .iter()
                    .map(|&component| self.write_expr(component))
                    .collect();
                let type_id = self.get_type_id(ty);
                let id = self.id_gen.next();
                self.push(Instruction::composite_construct(type_id, id, &ids?));
                Ok(id)
            }
            ExprKind::Init { target, value } => {
                let value_id = self.write_expr(value)?;
                let pointer = self.write_target(target)?;
                self.push(Instruction::store(pointer, value_id));
                Ok(value_id)
            }
            ExprKind::Call {
                function,
                ref arguments,
            } => {
                let arguments = arguments.clone();
                let function_id = *self
                    .lookup_function
                    .get(&function)
                    .ok_or(Error::Validation("call to an unregistered function"))?;
                let argument_ids: Result<Vec<Word>, Error> = arguments
                    .iter()
                    .map(|&argument| self.write_expr(argument))
                    .collect();
                let type_id = self.get_type_id(ty);
                let id = self.id_gen.next();
                self.push(Instruction::function_call(
                    type_id,
                    id,
                    function_id,
                    &argument_ids?,
                ));
                Ok(id)
            }
            ExprKind::IntrinsicCall {
                intrinsic,
                ref arguments,
            } => {
                let arguments = arguments.clone();
                self.write_intrinsic(ty, intrinsic, &arguments)
            }
            ExprKind::ImageAccess {
                access,
                image,
                ref arguments,
            } => {
                let arguments = arguments.clone();
                self.write_image_access(ty, access, image, &arguments)
            }
            ExprKind::CombinedImageAccess {
                access,
                image,
                ref arguments,
            } => {
                let arguments = arguments.clone();
                self.write_combined_access(ty, access, image, &arguments)
            }
            ExprKind::SwitchTest { value } => self.write_expr(value),
            ExprKind::SwitchCase { label } => self.write_expr(label),
            ExprKind::Copy { operand } => self.write_expr(operand),
            ExprKind::StreamAppend { operand } => {
                let _ = self.write_expr(operand)?;
                self.push(Instruction::emit_vertex());
                let type_id = self.get_type_id(ty);
                Ok(self.get_constant_null(type_id))
            }
            ExprKind::Dummy => {
                let type_id = self.get_type_id(ty);
                Ok(self.get_constant_null(type_id))
            }
        }
    }

    fn write_binary(
        &mut self,
        ty: Handle<Type>,
        op: BinaryOp,
        left: Handle<Expr>,
        right: Handle<Expr>,
    ) -> Result<Word, Error> {
        // Matrix and vector multiplications have dedicated opcodes.
        if op == BinaryOp::Multiply {
            let left_inner = self.types.lookup(self.tree.exprs[left].ty).clone();
            let right_inner = self.types.lookup(self.tree.exprs[right].ty).clone();
            let special = match (&left_inner, &right_inner) {
                (TypeInner::Matrix { .. }, TypeInner::Matrix { .. }) => {
                    Some(spirv::Op::MatrixTimesMatrix)
                }
                (TypeInner::Matrix { .. }, TypeInner::Vector { .. }) => {
                    Some(spirv::Op::MatrixTimesVector)
                }
                (TypeInner::Vector { .. }, TypeInner::Matrix { .. }) => {
                    Some(spirv::Op::VectorTimesMatrix)
                }
                (TypeInner::Matrix { .. }, TypeInner::Scalar(_)) => {
                    Some(spirv::Op::MatrixTimesScalar)
                }
                (TypeInner::Vector { .. }, TypeInner::Scalar(_)) => {
                    Some(spirv::Op::VectorTimesScalar)
                }
                _ => None,
            };
            if let Some(op) = special {
                let left_id = self.write_expr(left)?;
                let right_id = self.write_expr(right)?;
                let type_id = self.get_type_id(ty);
                let id = self.id_gen.next();
                self.push(Instruction::binary(op, type_id, id, left_id, right_id));
                return Ok(id);
            }
        }
        let left_id = self.write_expr(left)?;
        let right_id = self.write_expr(right)?;
        // Comparisons pick their opcode from the operand kind, not the
        // boolean result.
        let operand_ty = self.tree.exprs[left].ty;
        let kind_ty = if op.is_comparison() { operand_ty } else { ty };
        self.emit_binary_ids_kind(ty, kind_ty, op, left_id, right_id)
    }

    fn emit_binary_ids(
        &mut self,
        ty: Handle<Type>,
        op: BinaryOp,
        left: Word,
        right: Word,
    ) -> Result<Word, Error> {
        self.emit_binary_ids_kind(ty, ty, op, left, right)
    }

    fn emit_binary_ids_kind(
        &mut self,
        result_ty: Handle<Type>,
        kind_ty: Handle<Type>,
        op: BinaryOp,
        left: Word,
        right: Word,
    ) -> Result<Word, Error> {
        use spirv::Op;
        let kind = self.scalar_kind_of(kind_ty);
        let opcode = match (op, kind) {
            (BinaryOp::Add, ScalarKind::Float) => Op::FAdd,
            (BinaryOp::Add, _) => Op::IAdd,
            (BinaryOp::Subtract, ScalarKind::Float) => Op::FSub,
            (BinaryOp::Subtract, _) => Op::ISub,
            (BinaryOp::Multiply, ScalarKind::Float) => Op::FMul,
            (BinaryOp::Multiply, _) => Op::IMul,
            (BinaryOp::Divide, ScalarKind::Float) => Op::FDiv,
            (BinaryOp::Divide, ScalarKind::Sint) => Op::SDiv,
            (BinaryOp::Divide, _) => Op::UDiv,
            (BinaryOp::Modulo, ScalarKind::Float) => Op::FMod,
            (BinaryOp::Modulo, ScalarKind::Sint) => Op::SMod,
            (BinaryOp::Modulo, _) => Op::UMod,
            (BinaryOp::BitAnd, _) => Op::BitwiseAnd,
            (BinaryOp::BitOr, _) => Op::BitwiseOr,
            (BinaryOp::BitXor, _) => Op::BitwiseXor,
            (BinaryOp::ShiftLeft, _) => Op::ShiftLeftLogical,
            (BinaryOp::ShiftRight, ScalarKind::Sint) => Op::ShiftRightArithmetic,
            (BinaryOp::ShiftRight, _) => Op::ShiftRightLogical,
            (BinaryOp::LogicalAnd, _) => Op::LogicalAnd,
            (BinaryOp::LogicalOr, _) => Op::LogicalOr,
            (BinaryOp::Equal, ScalarKind::Float) => Op::FOrdEqual,
            (BinaryOp::Equal, ScalarKind::Bool) => Op::LogicalEqual,
            (BinaryOp::Equal, _) => Op::IEqual,
            (BinaryOp::NotEqual, ScalarKind::Float) => Op::FOrdNotEqual,
            (BinaryOp::NotEqual, ScalarKind::Bool) => Op::LogicalNotEqual,
            (BinaryOp::NotEqual, _) => Op::INotEqual,
            (BinaryOp::Less, ScalarKind::Float) => Op::FOrdLessThan,
            (BinaryOp::Less, ScalarKind::Sint) => Op::SLessThan,
            (BinaryOp::Less, _) => Op::ULessThan,
            (BinaryOp::LessEqual, ScalarKind::Float) => Op::FOrdLessThanEqual,
            (BinaryOp::LessEqual, ScalarKind::Sint) => Op::SLessThanEqual,
            (BinaryOp::LessEqual, _) => Op::ULessThanEqual,
            (BinaryOp::Greater, ScalarKind::Float) => Op::FOrdGreaterThan,
            (BinaryOp::Greater, ScalarKind::Sint) => Op::SGreaterThan,
            (BinaryOp::Greater, _) => Op::UGreaterThan,
            (BinaryOp::GreaterEqual, ScalarKind::Float) => Op::FOrdGreaterThanEqual,
            (BinaryOp::GreaterEqual, ScalarKind::Sint) => Op::SGreaterThanEqual,
            (BinaryOp::GreaterEqual, _) => Op::UGreaterThanEqual,
        };
        let type_id = self.get_type_id(result_ty);
        let id = self.id_gen.next();
        self.push(Instruction::binary(opcode, type_id, id, left, right));
        Ok(id)
    }

    fn write_unary(
        &mut self,
        ty: Handle<Type>,
        op: UnaryOp,
        operand: Handle<Expr>,
    ) -> Result<Word, Error> {
        use spirv::Op;
        match op {
            UnaryOp::Plus => self.write_expr(operand),
            UnaryOp::Negate => {
                let operand_id = self.write_expr(operand)?;
                let opcode = match self.scalar_kind_of(ty) {
                    ScalarKind::Float => Op::FNegate,
                    _ => Op::SNegate,
                };
                let type_id = self.get_type_id(ty);
                let id = self.id_gen.next();
                self.push(Instruction::unary(opcode, type_id, id, operand_id));
                Ok(id)
            }
            UnaryOp::LogicalNot => {
                let operand_id = self.write_expr(operand)?;
                let type_id = self.get_type_id(ty);
                let id = self.id_gen.next();
                self.push(Instruction::unary(Op::LogicalNot, type_id, id, operand_id));
                Ok(id)
            }
            UnaryOp::BitNot => {
                let operand_id = self.write_expr(operand)?;
                let type_id = self.get_type_id(ty);
                let id = self.id_gen.next();
                self.push(Instruction::unary(Op::Not, type_id, id, operand_id));
                Ok(id)
            }
            UnaryOp::PreIncrement
            | UnaryOp::PreDecrement
            | UnaryOp::PostIncrement
            | UnaryOp::PostDecrement => {
                let old = self.write_expr(operand)?;
                let one = match self.scalar_kind_of(ty) {
                    ScalarKind::Float => self.get_constant_scalar(Literal::F32(1.0)),
                    ScalarKind::Uint => self.get_constant_scalar(Literal::U32(1)),
                    _ => self.get_constant_scalar(Literal::I32(1)),
                };
                let binary = match op {
                    UnaryOp::PreIncrement | UnaryOp::PostIncrement => BinaryOp::Add,
                    _ => BinaryOp::Subtract,
                };
                let new = self.emit_binary_ids(ty, binary, old, one)?;
                let pointer = self.write_target(operand)?;
                self.push(Instruction::store(pointer, new));
                Ok(match op {
                    UnaryOp::PostIncrement | UnaryOp::PostDecrement => old,
                    _ => new,
                })
            }
        }
    }

    fn write_cast(&mut self, ty: Handle<Type>, operand: Handle<Expr>) -> Result<Word, Error> {
        use spirv::Op;
        let source_ty = self.tree.exprs[operand].ty;
        let operand_id = self.write_expr(operand)?;
        let source = match self.types.lookup(source_ty).scalar() {
            Some(scalar) => scalar,
            None => return Ok(operand_id),
        };
        let target = match self.types.lookup(ty).scalar() {
            Some(scalar) => scalar,
            None => return Ok(operand_id),
        };
        if source == target {
            return Ok(operand_id);
        }
        let opcode = match (source.kind, target.kind) {
            (ScalarKind::Float, ScalarKind::Sint) => Op::ConvertFToS,
            (ScalarKind::Float, ScalarKind::Uint) => Op::ConvertFToU,
            (ScalarKind::Sint, ScalarKind::Float) => Op::ConvertSToF,
            (ScalarKind::Uint, ScalarKind::Float) => Op::ConvertUToF,
            (ScalarKind::Float, ScalarKind::Float) => Op::FConvert,
            (ScalarKind::Sint, ScalarKind::Sint) => Op::SConvert,
            (ScalarKind::Uint, ScalarKind::Uint) => Op::UConvert,
            (ScalarKind::Sint, ScalarKind::Uint) | (ScalarKind::Uint, ScalarKind::Sint) => {
                Op::Bitcast
            }
            (ScalarKind::Bool, _) | (_, ScalarKind::Bool) => {
                return Err(Error::FeatureNotImplemented("boolean conversions"))
            }
        };
        let type_id = self.get_type_id(ty);
        let id = self.id_gen.next();
        self.push(Instruction::unary(opcode, type_id, id, operand_id));
        Ok(id)
    }

    fn write_intrinsic(
        &mut self,
        ty: Handle<Type>,
        intrinsic: Intrinsic,
        arguments: &[Handle<Expr>],
    ) -> Result<Word, Error> {
        use spirv::Op;
        let argument_ids: Result<Vec<Word>, Error> = arguments
            .iter()
            .map(|&argument| self.write_expr(argument))
            .collect();
        let argument_ids = argument_ids?;
        let type_id = self.get_type_id(ty);

        // Core-instruction intrinsics first.
        let core = match intrinsic {
            Intrinsic::Dot => Some(Op::Dot),
            Intrinsic::Transpose => Some(Op::Transpose),
            Intrinsic::Dpdx => Some(Op::DPdx),
            Intrinsic::Dpdy => Some(Op::DPdy),
            Intrinsic::Fwidth => Some(Op::Fwidth),
            Intrinsic::BitCount => Some(Op::BitCount),
            Intrinsic::BitReverse => Some(Op::BitReverse),
            _ => None,
        };
        if let Some(opcode) = core {
            let id = self.id_gen.next();
            let mut instruction = Instruction::new(opcode);
            instruction.set_type(type_id);
            instruction.set_result(id);
            for argument in &argument_ids {
                instruction.add_operand(*argument);
            }
            self.push(instruction);
            return Ok(id);
        }

        // Statement-like intrinsics.
        match intrinsic {
            Intrinsic::EmitVertex => {
                self.push(Instruction::emit_vertex());
                return Ok(self.get_constant_null(type_id));
            }
            Intrinsic::EndPrimitive => {
                self.push(Instruction::end_primitive());
                return Ok(self.get_constant_null(type_id));
            }
            Intrinsic::Barrier => {
                let workgroup = self.get_constant_scalar(Literal::U32(spirv::Scope::Workgroup as u32));
                let semantics = self.get_constant_scalar(Literal::U32(
                    (spirv::MemorySemantics::WORKGROUP_MEMORY | spirv::MemorySemantics::ACQUIRE_RELEASE)
                        .bits(),
                ));
                self.push(Instruction::control_barrier(workgroup, workgroup, semantics));
                return Ok(self.get_constant_null(type_id));
            }
            Intrinsic::MemoryBarrier => {
                let device = self.get_constant_scalar(Literal::U32(spirv::Scope::Device as u32));
                let semantics = self.get_constant_scalar(Literal::U32(
                    (spirv::MemorySemantics::UNIFORM_MEMORY | spirv::MemorySemantics::ACQUIRE_RELEASE)
                        .bits(),
                ));
                self.push(Instruction::memory_barrier(device, semantics));
                return Ok(self.get_constant_null(type_id));
            }
            Intrinsic::WorkgroupMemoryBarrier => {
                let workgroup = self.get_constant_scalar(Literal::U32(spirv::Scope::Workgroup as u32));
                let semantics = self.get_constant_scalar(Literal::U32(
                    (spirv::MemorySemantics::WORKGROUP_MEMORY | spirv::MemorySemantics::ACQUIRE_RELEASE)
                        .bits(),
                ));
                self.push(Instruction::memory_barrier(workgroup, semantics));
                return Ok(self.get_constant_null(type_id));
            }
            Intrinsic::TraceRay
            | Intrinsic::ReportIntersection
            | Intrinsic::ExecuteCallable
            | Intrinsic::IgnoreIntersection
            | Intrinsic::TerminateRay
            | Intrinsic::SetMeshOutputCounts
            | Intrinsic::EmitMeshTasks => {
                return Err(Error::FeatureNotImplemented("ray/mesh pipeline intrinsics"));
            }
            _ => {}
        }

        let kind = self.scalar_kind_of(ty);
        let number = match intrinsic {
            Intrinsic::Radians => gl450::RADIANS,
            Intrinsic::Degrees => gl450::DEGREES,
            Intrinsic::Sin => gl450::SIN,
            Intrinsic::Cos => gl450::COS,
            Intrinsic::Tan => gl450::TAN,
            Intrinsic::Asin => gl450::ASIN,
            Intrinsic::Acos => gl450::ACOS,
            Intrinsic::Atan => gl450::ATAN,
            Intrinsic::Atan2 => gl450::ATAN2,
            Intrinsic::Sinh => gl450::SINH,
            Intrinsic::Cosh => gl450::COSH,
            Intrinsic::Tanh => gl450::TANH,
            Intrinsic::Pow => gl450::POW,
            Intrinsic::Exp => gl450::EXP,
            Intrinsic::Log => gl450::LOG,
            Intrinsic::Exp2 => gl450::EXP2,
            Intrinsic::Log2 => gl450::LOG2,
            Intrinsic::Sqrt => gl450::SQRT,
            Intrinsic::InverseSqrt => gl450::INVERSE_SQRT,
            Intrinsic::Abs => match kind {
                ScalarKind::Float => gl450::FABS,
                _ => gl450::SABS,
            },
            Intrinsic::Sign => match kind {
                ScalarKind::Float => gl450::FSIGN,
                _ => gl450::SSIGN,
            },
            Intrinsic::Floor => gl450::FLOOR,
            Intrinsic::Ceil => gl450::CEIL,
            Intrinsic::Round => gl450::ROUND,
            Intrinsic::Trunc => gl450::TRUNC,
            Intrinsic::Fract => gl450::FRACT,
            Intrinsic::Min => match kind {
                ScalarKind::Float => gl450::FMIN,
                ScalarKind::Uint => gl450::UMIN,
                _ => gl450::SMIN,
            },
            Intrinsic::Max => match kind {
                ScalarKind::Float => gl450::FMAX,
                ScalarKind::Uint => gl450::UMAX,
                _ => gl450::SMAX,
            },
            Intrinsic::Clamp => match kind {
                ScalarKind::Float => gl450::FCLAMP,
                ScalarKind::Uint => gl450::UCLAMP,
                _ => gl450::SCLAMP,
            },
            Intrinsic::Mix => gl450::FMIX,
            Intrinsic::Step => gl450::STEP,
            Intrinsic::SmoothStep => gl450::SMOOTH_STEP,
            Intrinsic::Fma => gl450::FMA,
            Intrinsic::Length => gl450::LENGTH,
            Intrinsic::Distance => gl450::DISTANCE,
            Intrinsic::Cross => gl450::CROSS,
            Intrinsic::Normalize => gl450::NORMALIZE,
            Intrinsic::Reflect => gl450::REFLECT,
            Intrinsic::Refract => gl450::REFRACT,
            Intrinsic::FaceForward => gl450::FACE_FORWARD,
            Intrinsic::Determinant => gl450::DETERMINANT,
            Intrinsic::Inverse => gl450::MATRIX_INVERSE,
            Intrinsic::FindLsb => gl450::FIND_I_LSB,
            Intrinsic::FindMsb => match kind {
                ScalarKind::Uint => gl450::FIND_U_MSB,
                _ => gl450::FIND_S_MSB,
            },
            other => unreachable!("intrinsic {other:?} has no GLSL.std.450 lowering"),
        };
        let id = self.id_gen.next();
        self.push(Instruction::ext_inst(
            self.gl450_ext_inst_id,
            number,
            type_id,
            id,
            &argument_ids,
        ));
        Ok(id)
    }

    fn write_image_access(
        &mut self,
        ty: Handle<Type>,
        access: ImageAccess,
        image: Handle<Expr>,
        arguments: &[Handle<Expr>],
    ) -> Result<Word, Error> {
        use spirv::Op;
        let image_id = self.write_expr(image)?;
        let type_id = self.get_type_id(ty);
        match access {
            ImageAccess::Size => {
                let id = self.id_gen.next();
                self.push(Instruction::image_query(
                    Op::ImageQuerySize,
                    type_id,
                    id,
                    image_id,
                ));
                Ok(id)
            }
            ImageAccess::Samples => {
                let id = self.id_gen.next();
                self.push(Instruction::image_query(
                    Op::ImageQuerySamples,
                    type_id,
                    id,
                    image_id,
                ));
                Ok(id)
            }
            ImageAccess::Load => {
                let coordinate = arguments
                    .first()
                    .ok_or(Error::Validation("image load without coordinates"))?;
                let coordinate_id = self.write_expr(*coordinate)?;
                let id = self.id_gen.next();
                self.push(Instruction::image_fetch_or_read(
                    Op::ImageRead,
                    type_id,
                    id,
                    image_id,
                    coordinate_id,
                ));
                Ok(id)
            }
            ImageAccess::Store => {
                let [coordinate, value] = arguments else {
                    return Err(Error::Validation("image store needs coordinates and texel"));
                };
                let coordinate_id = self.write_expr(*coordinate)?;
                let value_id = self.write_expr(*value)?;
                self.push(Instruction::image_write(image_id, coordinate_id, value_id));
                Ok(self.get_constant_null(type_id))
            }
        }
    }

    /// Merge a separate texture and sampler into an `OpSampledImage`, reusing
    /// the merged id within the current block.
    fn merge_sampled_image(
        &mut self,
        image: Handle<Expr>,
        image_id: Word,
        sampler_id: Word,
    ) -> Result<Word, Error> {
        if let Some(&id) = self.context.sampled_cache.get(&(image_id, sampler_id)) {
            return Ok(id);
        }
        let (config, depth) = match *self.types.lookup(self.tree.exprs[image].ty) {
            TypeInner::SampledImage { config, depth } => (config, depth),
            _ => return Err(Error::Validation("sampler merge on a non-texture")),
        };
        let combined_ty = self
            .types
            .get_combined_image(config, depth == Trinary::True);
        let type_id = self.get_type_id(combined_ty);
        let id = self.id_gen.next();
        self.push(Instruction::sampled_image(type_id, id, image_id, sampler_id));
        self.context
            .sampled_cache
            .insert((image_id, sampler_id), id);
        Ok(id)
    }

    fn write_combined_access(
        &mut self,
        ty: Handle<Type>,
        access: CombinedImageAccess,
        image: Handle<Expr>,
        arguments: &[Handle<Expr>],
    ) -> Result<Word, Error> {
        use spirv::Op;
        let mut image_id = self.write_expr(image)?;
        let mut arguments = arguments;

        // A separate texture + sampler pair merges into a sampled image; the
        // sampler flows in as the first argument.
        if matches!(
            *self.types.lookup(self.tree.exprs[image].ty),
            TypeInner::SampledImage { .. }
        ) {
            let (&sampler, rest) = arguments
                .split_first()
                .ok_or(Error::Validation("sampling a texture without a sampler"))?;
            let sampler_id = self.write_expr(sampler)?;
            image_id = self.merge_sampled_image(image, image_id, sampler_id)?;
            arguments = rest;
        }

        let type_id = self.get_type_id(ty);
        let coordinate_id = match arguments.first() {
            Some(&coordinate) => Some(self.write_expr(coordinate)?),
            None => None,
        };
        let id = self.id_gen.next();
        match access {
            CombinedImageAccess::Sample | CombinedImageAccess::SampleOffset => {
                let coordinate =
                    coordinate_id.ok_or(Error::Validation("sample without coordinates"))?;
                self.push(Instruction::image_sample(
                    type_id,
                    id,
                    Op::ImageSampleImplicitLod,
                    image_id,
                    coordinate,
                    &[],
                ));
            }
            CombinedImageAccess::SampleLod => {
                let coordinate =
                    coordinate_id.ok_or(Error::Validation("sample without coordinates"))?;
                let lod = match arguments.get(1) {
                    Some(&lod) => self.write_expr(lod)?,
                    None => self.get_constant_scalar(Literal::F32(0.0)),
                };
                self.push(Instruction::image_sample(
                    type_id,
                    id,
                    Op::ImageSampleExplicitLod,
                    image_id,
                    coordinate,
                    &[spirv::ImageOperands::LOD.bits(), lod],
                ));
            }
            CombinedImageAccess::SampleCmp => {
                let coordinate =
                    coordinate_id.ok_or(Error::Validation("sample without coordinates"))?;
                let reference = match arguments.get(1) {
                    Some(&reference) => self.write_expr(reference)?,
                    None => self.get_constant_scalar(Literal::F32(0.0)),
                };
                self.push(Instruction::image_sample(
                    type_id,
                    id,
                    Op::ImageSampleDrefImplicitLod,
                    image_id,
                    coordinate,
                    &[reference],
                ));
            }
            CombinedImageAccess::Fetch => {
                let coordinate =
                    coordinate_id.ok_or(Error::Validation("fetch without coordinates"))?;
                self.push(Instruction::image_fetch_or_read(
                    Op::ImageFetch,
                    type_id,
                    id,
                    image_id,
                    coordinate,
                ));
            }
            CombinedImageAccess::Gather => {
                let coordinate =
                    coordinate_id.ok_or(Error::Validation("gather without coordinates"))?;
                let component = self.get_constant_scalar(Literal::U32(0));
                self.push(Instruction::image_sample(
                    type_id,
                    id,
                    Op::ImageGather,
                    image_id,
                    coordinate,
                    &[component],
                ));
            }
            CombinedImageAccess::QuerySize => {
                let lod = self.get_constant_scalar(Literal::U32(0));
                self.push(Instruction::image_fetch_or_read(
                    Op::ImageQuerySizeLod,
                    type_id,
                    id,
                    image_id,
                    lod,
                ));
            }
            CombinedImageAccess::QueryLod => {
                let coordinate =
                    coordinate_id.ok_or(Error::Validation("query lod without coordinates"))?;
                self.push(Instruction::image_fetch_or_read(
                    Op::ImageQueryLod,
                    type_id,
                    id,
                    image_id,
                    coordinate,
                ));
            }
        }
        Ok(id)
    }
}
