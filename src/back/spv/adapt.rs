//! SPIR-V-specific IR adaptation.
//!
//! Substitutes preprocessor macro references with their definitions (SPIR-V
//! has no textual preprocessor), and fills the [`ModuleConfig`]: execution
//! model, required capabilities and extensions, and operation counts used to
//! reserve instruction storage.

use crate::arena::{Arena, Handle};
use crate::back::PreprocContext;
use crate::ir::{Expr, Literal, Stmt, Variable};
use crate::ty::{ImageDim, Scalar, ScalarKind, TypeCache, TypeInner};
use crate::visit::{walk_stmt_exprs, ExprVisitor};
use crate::xform::{copy_stmt, remap_expr, Subst, Tree, TreeRef};
use crate::{FastIndexSet, ShaderStage};

pub const SPV_NV_RAY_TRACING: &str = "SPV_NV_ray_tracing";
pub const SPV_NV_MESH_SHADER: &str = "SPV_NV_mesh_shader";
pub const SPV_KHR_STORAGE_BUFFER_STORAGE_CLASS: &str = "SPV_KHR_storage_buffer_storage_class";

/// Counts of operations in the adapted tree, used to size instruction
/// buffers before generation.
#[derive(Clone, Copy, Debug, Default)]
pub struct Actions {
    pub exprs: usize,
    pub stmts: usize,
}

/// Everything the module writer needs to know about the target environment.
#[derive(Debug)]
pub struct ModuleConfig {
    pub execution_model: spirv::ExecutionModel,
    pub capabilities: FastIndexSet<spirv::Capability>,
    pub extensions: FastIndexSet<&'static str>,
    pub actions: Actions,
}

pub(super) const fn execution_model(stage: ShaderStage) -> spirv::ExecutionModel {
    use spirv::ExecutionModel as Em;
    match stage {
        ShaderStage::Vertex => Em::Vertex,
        ShaderStage::TessellationControl => Em::TessellationControl,
        ShaderStage::TessellationEvaluation => Em::TessellationEvaluation,
        ShaderStage::Geometry => Em::Geometry,
        ShaderStage::Fragment => Em::Fragment,
        ShaderStage::Compute => Em::GLCompute,
        ShaderStage::Task => Em::TaskNV,
        ShaderStage::Mesh => Em::MeshNV,
        ShaderStage::RayGeneration => Em::RayGenerationNV,
        ShaderStage::Intersection => Em::IntersectionNV,
        ShaderStage::AnyHit => Em::AnyHitNV,
        ShaderStage::ClosestHit => Em::ClosestHitNV,
        ShaderStage::Miss => Em::MissNV,
        ShaderStage::Callable => Em::CallableNV,
    }
}

/// Rewrite `src` into the forms the SPIR-V writer can emit directly and
/// derive the module configuration.
pub fn adapt(
    src: TreeRef,
    stage: ShaderStage,
    variables: &Arena<Variable>,
    context: PreprocContext,
) -> (Tree, ModuleConfig) {
    let mut exprs = Arena::new();
    let mut stmts = Arena::new();

    // Macro references are identifiers whose name matches a define; copy each
    // expansion into the destination arena once and share it.
    let mut subst = Subst::default();
    for (name, &define) in &context.defines {
        if let Some(var) = variables.fetch_if(|v| &v.name == name) {
            log::debug!("expanding preprocessor define [{name}]");
            let copied = remap_expr(&context.exprs, &mut exprs, &Subst::default(), define);
            subst.dst.insert(var, copied);
        }
    }

    let root = copy_stmt(src, &mut exprs, &mut stmts, &subst, src.root);
    let tree = Tree { exprs, stmts, root };

    let mut config = ModuleConfig {
        execution_model: execution_model(stage),
        capabilities: FastIndexSet::default(),
        extensions: FastIndexSet::default(),
        actions: Actions::default(),
    };
    fill_config(stage, TreeRef::of_tree(&tree), &mut config);
    (tree, config)
}

/// Collect required capabilities, extensions and action counts.
pub(super) fn fill_config(stage: ShaderStage, tree: TreeRef, config: &mut ModuleConfig) {
    config.capabilities.insert(spirv::Capability::Shader);
    match stage {
        ShaderStage::Geometry => {
            config.capabilities.insert(spirv::Capability::Geometry);
        }
        ShaderStage::TessellationControl | ShaderStage::TessellationEvaluation => {
            config.capabilities.insert(spirv::Capability::Tessellation);
        }
        stage if stage.is_ray_trace() => {
            config.capabilities.insert(spirv::Capability::RayTracingNV);
            config.extensions.insert(SPV_NV_RAY_TRACING);
        }
        stage if stage.is_mesh() => {
            config.capabilities.insert(spirv::Capability::MeshShadingNV);
            config.extensions.insert(SPV_NV_MESH_SHADER);
        }
        _ => {}
    }

    let mut filler = ConfigFiller { config };
    walk_stmt_exprs(&mut filler, tree.stmts, tree.exprs, tree.root);
    count_stmts(tree, tree.root, config);
}

fn count_stmts(tree: TreeRef, stmt: Handle<Stmt>, config: &mut ModuleConfig) {
    config.actions.stmts += 1;
    match tree.stmts[stmt] {
        Stmt::Container(ref block) | Stmt::Compound(ref block) => {
            for &child in block {
                count_stmts(tree, child, config);
            }
        }
        Stmt::FunctionDecl { body, .. } => count_stmts(tree, body, config),
        Stmt::If {
            then_body,
            ref else_ifs,
            else_body,
            ..
        } => {
            count_stmts(tree, then_body, config);
            for else_if in else_ifs {
                count_stmts(tree, else_if.body, config);
            }
            if let Some(else_body) = else_body {
                count_stmts(tree, else_body, config);
            }
        }
        Stmt::Switch { ref cases, .. } => {
            for case in cases {
                count_stmts(tree, case.body, config);
            }
        }
        Stmt::For { body, .. } | Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => {
            count_stmts(tree, body, config)
        }
        Stmt::ShaderBufferDecl { .. } | Stmt::ShaderStructBufferDecl { .. } => {
            config
                .extensions
                .insert(SPV_KHR_STORAGE_BUFFER_STORAGE_CLASS);
        }
        _ => {}
    }
}

struct ConfigFiller<'a> {
    config: &'a mut ModuleConfig,
}

impl ConfigFiller<'_> {
    fn note_scalar(&mut self, scalar: Scalar) {
        let capability = match (scalar.kind, scalar.width) {
            (ScalarKind::Sint | ScalarKind::Uint, 1) => spirv::Capability::Int8,
            (ScalarKind::Sint | ScalarKind::Uint, 2) => spirv::Capability::Int16,
            (ScalarKind::Sint | ScalarKind::Uint, 8) => spirv::Capability::Int64,
            (ScalarKind::Float, 2) => spirv::Capability::Float16,
            (ScalarKind::Float, 8) => spirv::Capability::Float64,
            _ => return,
        };
        self.config.capabilities.insert(capability);
    }
}

impl ExprVisitor for ConfigFiller<'_> {
    fn pre_expr(&mut self, _expr: Handle<Expr>) -> bool {
        self.config.actions.exprs += 1;
        true
    }

    fn visit_literal(&mut self, _expr: Handle<Expr>, value: &Literal) {
        self.note_scalar(value.scalar());
    }

    fn visit_image_access(
        &mut self,
        _expr: Handle<Expr>,
        access: crate::ir::expr::ImageAccess,
    ) {
        use crate::ir::expr::ImageAccess as Ia;
        if matches!(access, Ia::Size | Ia::Samples) {
            self.config
                .capabilities
                .insert(spirv::Capability::ImageQuery);
        }
    }

    fn visit_combined_image_access(
        &mut self,
        _expr: Handle<Expr>,
        access: crate::ir::expr::CombinedImageAccess,
    ) {
        use crate::ir::expr::CombinedImageAccess as Cia;
        if matches!(access, Cia::QuerySize | Cia::QueryLod) {
            self.config
                .capabilities
                .insert(spirv::Capability::ImageQuery);
        }
    }
}

/// Add the capabilities implied by declared resource types; called by the
/// writer as it registers globals.
pub(super) fn note_type_capabilities(
    types: &TypeCache,
    ty: Handle<crate::ty::Type>,
    capabilities: &mut FastIndexSet<spirv::Capability>,
) {
    match *types.lookup(types.non_array(ty)) {
        TypeInner::Scalar(scalar)
        | TypeInner::Vector { scalar, .. }
        | TypeInner::Matrix { scalar, .. } => {
            let capability = match (scalar.kind, scalar.width) {
                (ScalarKind::Sint | ScalarKind::Uint, 1) => spirv::Capability::Int8,
                (ScalarKind::Sint | ScalarKind::Uint, 2) => spirv::Capability::Int16,
                (ScalarKind::Sint | ScalarKind::Uint, 8) => spirv::Capability::Int64,
                (ScalarKind::Float, 2) => spirv::Capability::Float16,
                (ScalarKind::Float, 8) => spirv::Capability::Float64,
                _ => return,
            };
            capabilities.insert(capability);
        }
        TypeInner::Image(ref config)
        | TypeInner::SampledImage { ref config, .. }
        | TypeInner::CombinedImage { ref config, .. } => {
            if config.dim == ImageDim::Buffer {
                capabilities.insert(spirv::Capability::SampledBuffer);
                capabilities.insert(spirv::Capability::ImageBuffer);
            }
            if config.dim == ImageDim::Rect {
                capabilities.insert(spirv::Capability::SampledRect);
            }
            if config.dim == ImageDim::D1 {
                capabilities.insert(spirv::Capability::Sampled1D);
            }
        }
        TypeInner::AccelerationStructure => {
            capabilities.insert(spirv::Capability::RayTracingNV);
        }
        _ => {}
    }
}
