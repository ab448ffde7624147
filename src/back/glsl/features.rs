//! Pre-scan of the adapted tree for required GLSL features.

use crate::arena::{Arena, Handle};
use crate::ir::{
    expr::{CombinedImageAccess, ImageAccess, Intrinsic},
    Expr, Literal, Stmt, Variable,
};
use crate::ty::{Scalar, ScalarKind, Type, TypeCache, TypeInner};
use crate::visit::{walk_stmt_exprs, ExprVisitor};
use crate::xform::TreeRef;
use crate::ShaderStage;
use std::collections::BTreeSet;

bitflags::bitflags! {
    /// Structure used to encode additions to GLSL that aren't supported by
    /// all versions.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct Features: u32 {
        /// Buffer address space support.
        const BUFFER_STORAGE = 1;
        /// 8 byte floats.
        const DOUBLE_TYPE = 1 << 1;
        const COMPUTE_SHADER = 1 << 2;
        /// Image load and store.
        const IMAGE_LOAD_STORE = 1 << 3;
        const GEOMETRY_STAGES = 1 << 4;
        const TESSELLATION_STAGES = 1 << 5;
        const RAY_TRACING = 1 << 6;
        const MESH_SHADING = 1 << 7;
        /// Arrays with a dynamic length.
        const DYNAMIC_ARRAY_SIZE = 1 << 8;
        const SAMPLE_VARIABLES = 1 << 9;
        const SPEC_CONSTANTS = 1 << 10;
    }
}

/// The features, extensions and arithmetic widths a tree requires.
#[derive(Clone, Debug, Default)]
pub struct IntrinsicsConfig {
    pub features: Features,
    pub required_extensions: BTreeSet<String>,
    pub requires_int8: bool,
    pub requires_int16: bool,
    pub requires_int64: bool,
    pub requires_float16: bool,
    pub requires_float64: bool,
}

impl IntrinsicsConfig {
    fn note_scalar(&mut self, scalar: Scalar) {
        match (scalar.kind, scalar.width) {
            (ScalarKind::Sint | ScalarKind::Uint, 1) => self.requires_int8 = true,
            (ScalarKind::Sint | ScalarKind::Uint, 2) => self.requires_int16 = true,
            (ScalarKind::Sint | ScalarKind::Uint, 8) => self.requires_int64 = true,
            (ScalarKind::Float, 2) => self.requires_float16 = true,
            (ScalarKind::Float, 8) => {
                self.requires_float64 = true;
                self.features |= Features::DOUBLE_TYPE;
            }
            _ => {}
        }
    }

    fn note_type(&mut self, types: &TypeCache, ty: Handle<Type>) {
        match *types.lookup(ty) {
            TypeInner::Scalar(scalar)
            | TypeInner::Vector { scalar, .. }
            | TypeInner::Matrix { scalar, .. } => self.note_scalar(scalar),
            TypeInner::Array { base, size } => {
                if size == crate::ty::ArraySize::Dynamic {
                    self.features |= Features::DYNAMIC_ARRAY_SIZE;
                }
                self.note_type(types, base);
            }
            TypeInner::AccelerationStructure => {
                self.features |= Features::RAY_TRACING;
                self.required_extensions
                    .insert(super::EXT_RAY_TRACING.to_string());
            }
            _ => {}
        }
    }
}

/// Walk the tree and collect its [`IntrinsicsConfig`].
pub fn scan_features(
    stage: ShaderStage,
    tree: TreeRef,
    variables: &Arena<Variable>,
    types: &TypeCache,
) -> IntrinsicsConfig {
    let mut scan = Scanner {
        exprs: tree.exprs,
        variables,
        types,
        config: IntrinsicsConfig::default(),
    };
    match stage {
        ShaderStage::Compute => scan.config.features |= Features::COMPUTE_SHADER,
        ShaderStage::Geometry => scan.config.features |= Features::GEOMETRY_STAGES,
        ShaderStage::TessellationControl | ShaderStage::TessellationEvaluation => {
            scan.config.features |= Features::TESSELLATION_STAGES
        }
        stage if stage.is_ray_trace() => {
            scan.config.features |= Features::RAY_TRACING;
            scan.config
                .required_extensions
                .insert(super::EXT_RAY_TRACING.to_string());
        }
        stage if stage.is_mesh() => {
            scan.config.features |= Features::MESH_SHADING;
            scan.config
                .required_extensions
                .insert(super::EXT_MESH_SHADER.to_string());
        }
        _ => {}
    }
    walk_stmt_exprs(&mut scan, tree.stmts, tree.exprs, tree.root);
    scan_decls(&mut scan, tree, tree.root);
    scan.config
}

fn scan_decls(scan: &mut Scanner, tree: TreeRef, stmt: Handle<Stmt>) {
    match tree.stmts[stmt] {
        Stmt::Container(ref block) | Stmt::Compound(ref block) => {
            for &child in block {
                scan_decls(scan, tree, child);
            }
        }
        Stmt::VariableDecl { var }
        | Stmt::InOutVariableDecl { var, .. }
        | Stmt::ImageDecl { var, .. } => {
            let ty = scan.variables[var].ty;
            scan.config.note_type(scan.types, ty);
            if matches!(tree.stmts[stmt], Stmt::ImageDecl { .. }) {
                scan.config.features |= Features::IMAGE_LOAD_STORE;
            }
        }
        Stmt::ShaderBufferDecl { var, .. } | Stmt::ShaderStructBufferDecl { buffer: var, .. } => {
            scan.config.features |= Features::BUFFER_STORAGE;
            let ty = scan.variables[var].ty;
            scan.config.note_type(scan.types, ty);
        }
        Stmt::SpecConstantDecl { .. } => {
            scan.config.features |= Features::SPEC_CONSTANTS;
        }
        Stmt::FunctionDecl { body, .. } => scan_decls(scan, tree, body),
        _ => {}
    }
}

struct Scanner<'a> {
    exprs: &'a Arena<Expr>,
    variables: &'a Arena<Variable>,
    types: &'a TypeCache,
    config: IntrinsicsConfig,
}

impl ExprVisitor for Scanner<'_> {
    fn visit_literal(&mut self, _expr: Handle<Expr>, value: &Literal) {
        self.config.note_scalar(value.scalar());
    }

    fn visit_ident(&mut self, _expr: Handle<Expr>, var: Handle<Variable>) {
        let ty = self.variables[var].ty;
        self.config.note_type(self.types, ty);
    }

    fn visit_cast(&mut self, expr: Handle<Expr>) {
        let ty = self.exprs[expr].ty;
        self.config.note_type(self.types, ty);
    }

    fn visit_intrinsic_call(&mut self, _expr: Handle<Expr>, intrinsic: Intrinsic) {
        match intrinsic {
            Intrinsic::TraceRay
            | Intrinsic::ReportIntersection
            | Intrinsic::ExecuteCallable
            | Intrinsic::IgnoreIntersection
            | Intrinsic::TerminateRay => {
                self.config.features |= Features::RAY_TRACING;
                self.config
                    .required_extensions
                    .insert(super::EXT_RAY_TRACING.to_string());
            }
            Intrinsic::SetMeshOutputCounts | Intrinsic::EmitMeshTasks => {
                self.config.features |= Features::MESH_SHADING;
                self.config
                    .required_extensions
                    .insert(super::EXT_MESH_SHADER.to_string());
            }
            Intrinsic::EmitVertex | Intrinsic::EndPrimitive => {
                self.config.features |= Features::GEOMETRY_STAGES;
            }
            _ => {}
        }
    }

    fn visit_image_access(&mut self, _expr: Handle<Expr>, _access: ImageAccess) {
        self.config.features |= Features::IMAGE_LOAD_STORE;
    }

    fn visit_combined_image_access(&mut self, expr: Handle<Expr>, _access: CombinedImageAccess) {
        let ty = self.exprs[expr].ty;
        self.config.note_type(self.types, ty);
    }
}
