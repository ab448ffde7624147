//! GLSL statement and expression printing.

use super::{Error, IntrinsicsConfig, Options};
use crate::arena::{Arena, Handle};
use crate::back::{self, Level};
use crate::ir::{
    expr::{CombinedImageAccess, ImageAccess, Intrinsic},
    Expr, ExprKind, ExtensionStatus, Literal, PerVertexSource, Shader, Stmt, VarFlags, Variable,
};
use crate::ty::{
    ImageConfig, ImageDim, ImageFormat, MemoryLayout, Scalar, ScalarKind, StructDef, Type,
    TypeInner,
};
use crate::xform::TreeRef;
use std::fmt::Write;

/// Prints an adapted statement tree as GLSL.
pub struct Writer<'a, W> {
    out: W,
    shader: &'a Shader,
    variables: &'a Arena<Variable>,
    tree: TreeRef<'a>,
    options: &'a Options,
    config: &'a IntrinsicsConfig,
}

impl<'a, W: Write> Writer<'a, W> {
    pub fn new(
        out: W,
        shader: &'a Shader,
        variables: &'a Arena<Variable>,
        tree: TreeRef<'a>,
        options: &'a Options,
        config: &'a IntrinsicsConfig,
    ) -> Self {
        Writer {
            out,
            shader,
            variables,
            tree,
            options,
            config,
        }
    }

    pub fn write(&mut self) -> super::BackendResult {
        writeln!(self.out, "#version {}", self.options.version)?;
        for extension in &self.config.required_extensions {
            writeln!(self.out, "#extension {extension} : require")?;
        }
        writeln!(self.out)?;
        match self.tree.stmts[self.tree.root] {
            Stmt::Container(ref block) => {
                for &child in block {
                    self.write_stmt(child, Level(0))?;
                }
            }
            _ => self.write_stmt(self.tree.root, Level(0))?,
        }
        Ok(())
    }

    fn var_name(&self, var: Handle<Variable>) -> String {
        self.variables[var].name.clone()
    }

    /// Resolve the struct definition behind `ty`, looking through arrays and
    /// stage wrappers.
    fn resolve_struct(&self, mut ty: Handle<Type>) -> Option<Handle<StructDef>> {
        loop {
            match *self.shader.types.lookup(ty) {
                TypeInner::Struct(def) => return Some(def),
                TypeInner::Array { base, .. } => ty = base,
                ref inner => match inner.wrapped() {
                    Some(wrapped) => ty = wrapped,
                    None => return None,
                },
            }
        }
    }

    fn scalar_name(scalar: Scalar) -> Result<&'static str, Error> {
        Ok(match (scalar.kind, scalar.width) {
            (ScalarKind::Bool, _) => "bool",
            (ScalarKind::Sint, 4) => "int",
            (ScalarKind::Uint, 4) => "uint",
            (ScalarKind::Float, 4) => "float",
            (ScalarKind::Float, 8) => "double",
            (ScalarKind::Float, 2) => "float16_t",
            (ScalarKind::Sint, 1) => "int8_t",
            (ScalarKind::Uint, 1) => "uint8_t",
            (ScalarKind::Sint, 2) => "int16_t",
            (ScalarKind::Uint, 2) => "uint16_t",
            (ScalarKind::Sint, 8) => "int64_t",
            (ScalarKind::Uint, 8) => "uint64_t",
            (_, width) => return Err(Error::UnsupportedScalar(width)),
        })
    }

    fn vector_prefix(scalar: Scalar) -> Result<&'static str, Error> {
        Ok(match (scalar.kind, scalar.width) {
            (ScalarKind::Bool, _) => "b",
            (ScalarKind::Sint, 4) => "i",
            (ScalarKind::Uint, 4) => "u",
            (ScalarKind::Float, 4) => "",
            (ScalarKind::Float, 8) => "d",
            (ScalarKind::Float, 2) => "f16",
            (ScalarKind::Sint, 1) => "i8",
            (ScalarKind::Uint, 1) => "u8",
            (ScalarKind::Sint, 2) => "i16",
            (ScalarKind::Uint, 2) => "u16",
            (ScalarKind::Sint, 8) => "i64",
            (ScalarKind::Uint, 8) => "u64",
            (_, width) => return Err(Error::UnsupportedScalar(width)),
        })
    }

    const fn dim_str(dim: ImageDim) -> &'static str {
        match dim {
            ImageDim::D1 => "1D",
            ImageDim::D2 => "2D",
            ImageDim::D3 => "3D",
            ImageDim::Cube => "Cube",
            ImageDim::Rect => "2DRect",
            ImageDim::Buffer => "Buffer",
        }
    }

    fn image_suffix(config: &ImageConfig) -> String {
        let mut suffix = Self::dim_str(config.dim).to_string();
        if config.ms {
            suffix.push_str("MS");
        }
        if config.arrayed {
            suffix.push_str("Array");
        }
        suffix
    }

    const fn format_str(format: ImageFormat) -> &'static str {
        use ImageFormat as If;
        match format {
            If::Unknown => "",
            If::Rgba32f => "rgba32f",
            If::Rgba16f => "rgba16f",
            If::Rg32f => "rg32f",
            If::Rg16f => "rg16f",
            If::R32f => "r32f",
            If::R16f => "r16f",
            If::Rgba8 => "rgba8",
            If::Rgba8Snorm => "rgba8_snorm",
            If::Rgba32i => "rgba32i",
            If::Rgba16i => "rgba16i",
            If::Rgba8i => "rgba8i",
            If::Rg32i => "rg32i",
            If::Rg16i => "rg16i",
            If::R32i => "r32i",
            If::R16i => "r16i",
            If::Rgba32u => "rgba32ui",
            If::Rgba16u => "rgba16ui",
            If::Rgba8u => "rgba8ui",
            If::Rg32u => "rg32ui",
            If::Rg16u => "rg16ui",
            If::R32u => "r32ui",
            If::R16u => "r16ui",
        }
    }

    /// The GLSL spelling of `ty` in type position.
    fn type_name(&self, ty: Handle<Type>) -> Result<String, Error> {
        Ok(match *self.shader.types.lookup(ty) {
            TypeInner::Void => "void".to_string(),
            TypeInner::Scalar(scalar) => Self::scalar_name(scalar)?.to_string(),
            TypeInner::Vector { scalar, size } => format!(
                "{}vec{}",
                Self::vector_prefix(scalar)?,
                back::vector_size_str(size)
            ),
            TypeInner::Matrix {
                scalar,
                columns,
                rows,
            } => {
                let prefix = match (scalar.kind, scalar.width) {
                    (ScalarKind::Float, 4) => "",
                    (ScalarKind::Float, 8) => "d",
                    (ScalarKind::Float, 2) => "f16",
                    (_, width) => return Err(Error::UnsupportedScalar(width)),
                };
                if columns == rows {
                    format!("{prefix}mat{}", back::vector_size_str(columns))
                } else {
                    format!(
                        "{prefix}mat{}x{}",
                        back::vector_size_str(columns),
                        back::vector_size_str(rows)
                    )
                }
            }
            TypeInner::Array { base, .. } => self.type_name(base)?,
            TypeInner::Pointer { base, .. } => self.type_name(base)?,
            TypeInner::Sampler { comparison } => if comparison {
                "samplerShadow"
            } else {
                "sampler"
            }
            .to_string(),
            TypeInner::Image(ref config) => format!(
                "{}image{}",
                match config.sampled_type.kind {
                    ScalarKind::Sint => "i",
                    ScalarKind::Uint => "u",
                    _ => "",
                },
                Self::image_suffix(config)
            ),
            TypeInner::SampledImage { ref config, .. } => format!(
                "{}texture{}",
                match config.sampled_type.kind {
                    ScalarKind::Sint => "i",
                    ScalarKind::Uint => "u",
                    _ => "",
                },
                Self::image_suffix(config)
            ),
            TypeInner::CombinedImage {
                ref config,
                comparison,
            } => format!(
                "{}sampler{}{}",
                match config.sampled_type.kind {
                    ScalarKind::Sint => "i",
                    ScalarKind::Uint => "u",
                    _ => "",
                },
                Self::image_suffix(config),
                if comparison { "Shadow" } else { "" }
            ),
            TypeInner::AccelerationStructure => "accelerationStructureEXT".to_string(),
            TypeInner::Struct(def) => self.shader.types.struct_def(def).name.clone(),
            TypeInner::Function { result, .. } => self.type_name(result)?,
            ref inner => match inner.wrapped() {
                Some(wrapped) => self.type_name(wrapped)?,
                None => "void".to_string(),
            },
        })
    }

    /// The `[N]` suffix of a declaration, empty for non-arrays.
    fn array_suffix(&self, ty: Handle<Type>) -> String {
        match *self.shader.types.lookup(ty) {
            TypeInner::Array { base, size } => {
                let inner = self.array_suffix(base);
                match size {
                    crate::ty::ArraySize::Constant(count) => format!("[{count}]{inner}"),
                    crate::ty::ArraySize::Dynamic => format!("[]{inner}"),
                }
            }
            _ => String::new(),
        }
    }

    fn write_literal(&mut self, value: &Literal) -> super::BackendResult {
        match *value {
            Literal::Bool(v) => write!(self.out, "{v}")?,
            Literal::I8(v) => write!(self.out, "{v}")?,
            Literal::I16(v) => write!(self.out, "{v}")?,
            Literal::I32(v) => write!(self.out, "{v}")?,
            Literal::I64(v) => write!(self.out, "{v}l")?,
            Literal::U8(v) => write!(self.out, "{v}")?,
            Literal::U16(v) => write!(self.out, "{v}")?,
            Literal::U32(v) => write!(self.out, "{v}u")?,
            Literal::U64(v) => write!(self.out, "{v}ul")?,
            Literal::F16(v) => write!(self.out, "{v}hf")?,
            Literal::F32(v) => write!(self.out, "{v:?}")?,
            Literal::F64(v) => write!(self.out, "{v:?}lf")?,
        }
        Ok(())
    }

    const fn intrinsic_str(intrinsic: Intrinsic) -> &'static str {
        use Intrinsic as In;
        match intrinsic {
            In::Radians => "radians",
            In::Degrees => "degrees",
            In::Sin => "sin",
            In::Cos => "cos",
            In::Tan => "tan",
            In::Asin => "asin",
            In::Acos => "acos",
            In::Atan | In::Atan2 => "atan",
            In::Sinh => "sinh",
            In::Cosh => "cosh",
            In::Tanh => "tanh",
            In::Pow => "pow",
            In::Exp => "exp",
            In::Log => "log",
            In::Exp2 => "exp2",
            In::Log2 => "log2",
            In::Sqrt => "sqrt",
            In::InverseSqrt => "inversesqrt",
            In::Abs => "abs",
            In::Sign => "sign",
            In::Floor => "floor",
            In::Ceil => "ceil",
            In::Round => "round",
            In::Trunc => "trunc",
            In::Fract => "fract",
            In::Min => "min",
            In::Max => "max",
            In::Clamp => "clamp",
            In::Mix => "mix",
            In::Step => "step",
            In::SmoothStep => "smoothstep",
            In::Fma => "fma",
            In::Length => "length",
            In::Distance => "distance",
            In::Dot => "dot",
            In::Cross => "cross",
            In::Normalize => "normalize",
            In::Reflect => "reflect",
            In::Refract => "refract",
            In::FaceForward => "faceforward",
            In::Transpose => "transpose",
            In::Determinant => "determinant",
            In::Inverse => "inverse",
            In::BitCount => "bitCount",
            In::BitReverse => "bitfieldReverse",
            In::FindLsb => "findLSB",
            In::FindMsb => "findMSB",
            In::Dpdx => "dFdx",
            In::Dpdy => "dFdy",
            In::Fwidth => "fwidth",
            In::Barrier => "barrier",
            In::MemoryBarrier => "memoryBarrier",
            In::WorkgroupMemoryBarrier => "groupMemoryBarrier",
            In::EmitVertex => "EmitVertex",
            In::EndPrimitive => "EndPrimitive",
            In::SetMeshOutputCounts => "SetMeshOutputsEXT",
            In::EmitMeshTasks => "EmitMeshTasksEXT",
            In::TraceRay => "traceRayEXT",
            In::ReportIntersection => "reportIntersectionEXT",
            In::ExecuteCallable => "executeCallableEXT",
            In::IgnoreIntersection => "ignoreIntersectionEXT",
            In::TerminateRay => "terminateRayEXT",
        }
    }

    const fn combined_access_str(access: CombinedImageAccess) -> &'static str {
        use CombinedImageAccess as Cia;
        match access {
            Cia::Sample | Cia::SampleCmp => "texture",
            Cia::SampleLod => "textureLod",
            Cia::SampleOffset => "textureOffset",
            Cia::Fetch => "texelFetch",
            Cia::Gather => "textureGather",
            Cia::QuerySize => "textureSize",
            Cia::QueryLod => "textureQueryLod",
        }
    }

    const fn image_access_str(access: ImageAccess) -> &'static str {
        use ImageAccess as Ia;
        match access {
            Ia::Size => "imageSize",
            Ia::Samples => "imageSamples",
            Ia::Load => "imageLoad",
            Ia::Store => "imageStore",
        }
    }

    fn write_arguments(&mut self, arguments: &[Handle<Expr>]) -> super::BackendResult {
        for (index, &argument) in arguments.iter().enumerate() {
            if index != 0 {
                write!(self.out, ", ")?;
            }
            self.write_expr(argument)?;
        }
        Ok(())
    }

    fn write_expr(&mut self, expr: Handle<Expr>) -> super::BackendResult {
        let ty = self.tree.exprs[expr].ty;
        match self.tree.exprs[expr].kind {
            ExprKind::Literal(ref value) => {
                let value = *value;
                self.write_literal(&value)?;
            }
            ExprKind::Ident(var) => write!(self.out, "{}", self.var_name(var))?,
            ExprKind::MemberSelect { base, index } => {
                let base_ty = self.tree.exprs[base].ty;
                self.write_expr(base)?;
                let def = self
                    .resolve_struct(base_ty)
                    .expect("member select on a non-struct type");
                let name = &self.shader.types.struct_def(def).members[index as usize].name;
                write!(self.out, ".{name}")?;
            }
            ExprKind::Swizzle {
                base,
                ref components,
            } => {
                let components = components.clone();
                self.write_expr(base)?;
                write!(self.out, ".")?;
                for component in components {
                    write!(self.out, "{}", back::COMPONENTS[component as usize])?;
                }
            }
            ExprKind::Index { base, index } => {
                self.write_expr(base)?;
                write!(self.out, "[")?;
                self.write_expr(index)?;
                write!(self.out, "]")?;
            }
            ExprKind::Binary { op, left, right } => {
                write!(self.out, "(")?;
                self.write_expr(left)?;
                write!(self.out, " {} ", back::binary_operation_str(op))?;
                self.write_expr(right)?;
                write!(self.out, ")")?;
            }
            ExprKind::Unary { op, expr: operand } => {
                if let Some(prefix) = back::unary_operation_str(op) {
                    write!(self.out, "{prefix}")?;
                    self.write_expr(operand)?;
                } else if let Some(postfix) = back::unary_postfix_str(op) {
                    self.write_expr(operand)?;
                    write!(self.out, "{postfix}")?;
                }
            }
            ExprKind::Assign { op, target, value } => {
                self.write_expr(target)?;
                write!(self.out, " {} ", back::assign_operation_str(op))?;
                self.write_expr(value)?;
            }
            ExprKind::Cast { expr: operand } => {
                write!(self.out, "{}(", self.type_name(ty)?)?;
                self.write_expr(operand)?;
                write!(self.out, ")")?;
            }
            ExprKind::Question {
                condition,
                accept,
                reject,
            } => {
                write!(self.out, "((")?;
                self.write_expr(condition)?;
                write!(self.out, ") ? (")?;
                self.write_expr(accept)?;
                write!(self.out, ") : (")?;
                self.write_expr(reject)?;
                write!(self.out, "))")?;
            }
            ExprKind::AggrInit {
                target,
                ref initializers,
            } => {
                let initializers = initializers.clone();
                if let Some(target) = target {
                    self.write_expr(target)?;
                    write!(self.out, " = ")?;
                }
                let suffix = self.array_suffix(ty);
                write!(self.out, "{}{}(", self.type_name(ty)?, suffix)?;
                self.write_arguments(&initializers)?;
                write!(self.out, ")")?;
            }
            ExprKind::CompositeConstruct { ref components } => {
                let components = components.clone();
                write!(self.out, "{}(", self.type_name(ty)?)?;
                self.write_arguments(&components)?;
                write!(self.out, ")")?;
            }
            ExprKind::Init { target, value } => {
                // Declaration with initialiser.
                let ExprKind::Ident(var) = self.tree.exprs[target].kind else {
                    unreachable!("init target is always an identifier");
                };
                let var_ty = self.variables[var].ty;
                write!(
                    self.out,
                    "{} {}{}",
                    self.type_name(var_ty)?,
                    self.var_name(var),
                    self.array_suffix(var_ty)
                )?;
                write!(self.out, " = ")?;
                self.write_expr(value)?;
            }
            ExprKind::Call {
                function,
                ref arguments,
            } => {
                let arguments = arguments.clone();
                write!(self.out, "{}(", self.var_name(function))?;
                self.write_arguments(&arguments)?;
                write!(self.out, ")")?;
            }
            ExprKind::IntrinsicCall {
                intrinsic,
                ref arguments,
            } => {
                let arguments = arguments.clone();
                write!(self.out, "{}(", Self::intrinsic_str(intrinsic))?;
                self.write_arguments(&arguments)?;
                write!(self.out, ")")?;
            }
            ExprKind::ImageAccess {
                access,
                image,
                ref arguments,
            } => {
                let arguments = arguments.clone();
                write!(self.out, "{}(", Self::image_access_str(access))?;
                self.write_expr(image)?;
                if !arguments.is_empty() {
                    write!(self.out, ", ")?;
                    self.write_arguments(&arguments)?;
                }
                write!(self.out, ")")?;
            }
            ExprKind::CombinedImageAccess {
                access,
                image,
                ref arguments,
            } => {
                let arguments = arguments.clone();
                write!(self.out, "{}(", Self::combined_access_str(access))?;
                self.write_expr(image)?;
                if !arguments.is_empty() {
                    write!(self.out, ", ")?;
                    self.write_arguments(&arguments)?;
                }
                write!(self.out, ")")?;
            }
            ExprKind::SwitchTest { value } => self.write_expr(value)?,
            ExprKind::SwitchCase { label } => self.write_expr(label)?,
            ExprKind::Copy { operand } => self.write_expr(operand)?,
            ExprKind::StreamAppend { .. } => {
                unreachable!("stream appends are rewritten by the GLSL adapter")
            }
            ExprKind::Dummy => {}
        }
        Ok(())
    }

    fn write_block(&mut self, body: Handle<Stmt>, level: Level) -> super::BackendResult {
        writeln!(self.out, "{level}{{")?;
        match self.tree.stmts[body] {
            Stmt::Container(ref block) | Stmt::Compound(ref block) => {
                let block = block.clone();
                for child in block {
                    self.write_stmt(child, level.next())?;
                }
            }
            _ => self.write_stmt(body, level.next())?,
        }
        writeln!(self.out, "{level}}}")?;
        Ok(())
    }

    fn write_struct_body(
        &mut self,
        def: Handle<StructDef>,
        level: Level,
    ) -> super::BackendResult {
        let def = self.shader.types.struct_def(def).clone();
        writeln!(self.out, "{level}{{")?;
        for member in &def.members {
            writeln!(
                self.out,
                "{}{} {}{};",
                level.next(),
                self.type_name(member.ty)?,
                member.name,
                self.array_suffix(member.ty)
            )?;
        }
        write!(self.out, "{level}}}")?;
        Ok(())
    }

    const fn layout_str(layout: MemoryLayout) -> &'static str {
        match layout {
            MemoryLayout::Std140 => "std140",
            MemoryLayout::Std430 => "std430",
            MemoryLayout::C => "scalar",
        }
    }

    fn write_stmt(&mut self, stmt: Handle<Stmt>, level: Level) -> super::BackendResult {
        match self.tree.stmts[stmt] {
            Stmt::Container(ref block) => {
                let block = block.clone();
                for child in block {
                    self.write_stmt(child, level)?;
                }
            }
            Stmt::Compound(ref block) => {
                let block = block.clone();
                writeln!(self.out, "{level}{{")?;
                for child in block {
                    self.write_stmt(child, level.next())?;
                }
                writeln!(self.out, "{level}}}")?;
            }
            Stmt::Simple(expr) => {
                write!(self.out, "{level}")?;
                self.write_expr(expr)?;
                writeln!(self.out, ";")?;
            }
            Stmt::VariableDecl { var } => {
                if self.options.write_variable_decls {
                    let ty = self.variables[var].ty;
                    let shared = if self.variables[var].flags.contains(VarFlags::SHARED) {
                        "shared "
                    } else {
                        ""
                    };
                    writeln!(
                        self.out,
                        "{level}{shared}{} {}{};",
                        self.type_name(ty)?,
                        self.var_name(var),
                        self.array_suffix(ty)
                    )?;
                }
            }
            Stmt::InOutVariableDecl { var, location } => {
                let ty = self.variables[var].ty;
                let flags = self.variables[var].flags;
                let direction = if flags.contains(VarFlags::SHADER_INPUT) {
                    "in"
                } else {
                    "out"
                };
                let flat = if flags.contains(VarFlags::FLAT) {
                    "flat "
                } else {
                    ""
                };
                writeln!(
                    self.out,
                    "{level}layout(location = {location}) {flat}{direction} {} {}{};",
                    self.type_name(ty)?,
                    self.var_name(var),
                    self.array_suffix(ty)
                )?;
            }
            Stmt::SamplerDecl { var, binding, set }
            | Stmt::SampledImageDecl { var, binding, set }
            | Stmt::CombinedImageDecl { var, binding, set } => {
                let ty = self.variables[var].ty;
                writeln!(
                    self.out,
                    "{level}layout(set = {set}, binding = {binding}) uniform {} {}{};",
                    self.type_name(ty)?,
                    self.var_name(var),
                    self.array_suffix(ty)
                )?;
            }
            Stmt::ImageDecl { var, binding, set } => {
                let ty = self.variables[var].ty;
                let base = self.shader.types.non_array(ty);
                let format = match *self.shader.types.lookup(base) {
                    TypeInner::Image(ref config) => Self::format_str(config.format),
                    _ => "",
                };
                let format = if format.is_empty() {
                    String::new()
                } else {
                    format!(", {format}")
                };
                writeln!(
                    self.out,
                    "{level}layout(set = {set}, binding = {binding}{format}) uniform {} {}{};",
                    self.type_name(ty)?,
                    self.var_name(var),
                    self.array_suffix(ty)
                )?;
            }
            Stmt::ConstantBufferDecl { var, binding, set } => {
                let ty = self.variables[var].ty;
                let def = self
                    .resolve_struct(ty)
                    .expect("constant buffer without a struct type");
                let layout = self.shader.types.struct_def(def).layout;
                let name = self.shader.types.struct_def(def).name.clone();
                write!(
                    self.out,
                    "{level}layout({}, set = {set}, binding = {binding}) uniform {name}\n",
                    Self::layout_str(layout),
                )?;
                self.write_struct_body(def, level)?;
                writeln!(self.out, " {};", self.var_name(var))?;
            }
            Stmt::ShaderBufferDecl { var, binding, set } => {
                let ty = self.variables[var].ty;
                let def = self
                    .resolve_struct(ty)
                    .expect("shader buffer without a struct type");
                let layout = self.shader.types.struct_def(def).layout;
                let name = self.shader.types.struct_def(def).name.clone();
                // Without storage-buffer support the block degrades to a
                // uniform interface block.
                let block = if self.options.use_storage_buffers {
                    "buffer"
                } else {
                    "uniform"
                };
                write!(
                    self.out,
                    "{level}layout({}, set = {set}, binding = {binding}) {block} {name}\n",
                    Self::layout_str(layout),
                )?;
                self.write_struct_body(def, level)?;
                writeln!(self.out, " {};", self.var_name(var))?;
            }
            Stmt::PushConstantsBufferDecl { var, layout } => {
                let ty = self.variables[var].ty;
                let def = self
                    .resolve_struct(ty)
                    .expect("push constant block without a struct type");
                let name = self.shader.types.struct_def(def).name.clone();
                write!(
                    self.out,
                    "{level}layout({}, push_constant) uniform {name}\n",
                    Self::layout_str(layout),
                )?;
                self.write_struct_body(def, level)?;
                writeln!(self.out, " {};", self.var_name(var))?;
            }
            Stmt::ShaderStructBufferDecl {
                buffer,
                instance,
                data,
                binding,
                set,
            } => {
                let name = self.var_name(buffer);
                let data_ty = self.variables[data].ty;
                writeln!(
                    self.out,
                    "{level}layout(std430, set = {set}, binding = {binding}) buffer {name}"
                )?;
                writeln!(self.out, "{level}{{")?;
                writeln!(
                    self.out,
                    "{}{} {}{};",
                    level.next(),
                    self.type_name(data_ty)?,
                    self.var_name(data),
                    self.array_suffix(data_ty)
                )?;
                writeln!(self.out, "{level}}} {};", self.var_name(instance))?;
            }
            Stmt::SpecConstantDecl {
                var,
                location,
                value,
            } => {
                let ty = self.variables[var].ty;
                write!(
                    self.out,
                    "{level}layout(constant_id = {location}) const {} {} = ",
                    self.type_name(ty)?,
                    self.var_name(var)
                )?;
                self.write_expr(value)?;
                writeln!(self.out, ";")?;
            }
            Stmt::StructureDecl(def) => {
                let name = self.shader.types.struct_def(def).name.clone();
                writeln!(self.out, "{level}struct {name}")?;
                self.write_struct_body(def, level)?;
                writeln!(self.out, ";")?;
            }
            Stmt::FunctionDecl {
                var,
                ref params,
                body,
                ..
            } => {
                let params = params.clone();
                let fn_ty = self.variables[var].ty;
                let result = match *self.shader.types.lookup(fn_ty) {
                    TypeInner::Function { result, .. } => result,
                    _ => fn_ty,
                };
                write!(
                    self.out,
                    "{level}{} {}(",
                    self.type_name(result)?,
                    self.var_name(var)
                )?;
                for (index, &param) in params.iter().enumerate() {
                    if index != 0 {
                        write!(self.out, ", ")?;
                    }
                    let flags = self.variables[param].flags;
                    let qualifier = if flags
                        .contains(VarFlags::INPUT_PARAM | VarFlags::OUTPUT_PARAM)
                    {
                        "inout "
                    } else if flags.contains(VarFlags::OUTPUT_PARAM) {
                        "out "
                    } else {
                        ""
                    };
                    let param_ty = self.variables[param].ty;
                    write!(
                        self.out,
                        "{qualifier}{} {}{}",
                        self.type_name(param_ty)?,
                        self.var_name(param),
                        self.array_suffix(param_ty)
                    )?;
                }
                writeln!(self.out, ")")?;
                self.write_block(body, level)?;
            }
            Stmt::Return(value) => {
                match value {
                    Some(value) => {
                        write!(self.out, "{level}return ")?;
                        self.write_expr(value)?;
                        writeln!(self.out, ";")?;
                    }
                    None => writeln!(self.out, "{level}return;")?,
                };
            }
            Stmt::Discard => writeln!(self.out, "{level}discard;")?,
            Stmt::If {
                condition,
                then_body,
                ref else_ifs,
                else_body,
            } => {
                let else_ifs = else_ifs.clone();
                write!(self.out, "{level}if (")?;
                self.write_expr(condition)?;
                writeln!(self.out, ")")?;
                self.write_block(then_body, level)?;
                for else_if in else_ifs {
                    write!(self.out, "{level}else if (")?;
                    self.write_expr(else_if.condition)?;
                    writeln!(self.out, ")")?;
                    self.write_block(else_if.body, level)?;
                }
                if let Some(else_body) = else_body {
                    writeln!(self.out, "{level}else")?;
                    self.write_block(else_body, level)?;
                }
            }
            Stmt::Switch { test, ref cases } => {
                let cases = cases.clone();
                write!(self.out, "{level}switch (")?;
                self.write_expr(test)?;
                writeln!(self.out, ")")?;
                writeln!(self.out, "{level}{{")?;
                for case in cases {
                    match case.label {
                        Some(label) => {
                            write!(self.out, "{level}case ")?;
                            self.write_expr(label)?;
                            writeln!(self.out, ":")?;
                        }
                        None => writeln!(self.out, "{level}default:")?,
                    }
                    self.write_block(case.body, level.next())?;
                }
                writeln!(self.out, "{level}}}")?;
            }
            Stmt::For {
                init,
                condition,
                increment,
                body,
            } => {
                write!(self.out, "{level}for (")?;
                self.write_expr(init)?;
                write!(self.out, "; ")?;
                self.write_expr(condition)?;
                write!(self.out, "; ")?;
                self.write_expr(increment)?;
                writeln!(self.out, ")")?;
                self.write_block(body, level)?;
            }
            Stmt::While { condition, body } => {
                write!(self.out, "{level}while (")?;
                self.write_expr(condition)?;
                writeln!(self.out, ")")?;
                self.write_block(body, level)?;
            }
            Stmt::DoWhile { condition, body } => {
                writeln!(self.out, "{level}do")?;
                self.write_block(body, level)?;
                write!(self.out, "{level}while (")?;
                self.write_expr(condition)?;
                writeln!(self.out, ");")?;
            }
            Stmt::Break => writeln!(self.out, "{level}break;")?,
            Stmt::Continue => writeln!(self.out, "{level}continue;")?,
            Stmt::PerVertexDecl { source, .. } => {
                let direction = match source {
                    PerVertexSource::VertexOutput
                    | PerVertexSource::TessControlOutput
                    | PerVertexSource::GeometryOutput
                    | PerVertexSource::MeshOutput => "out",
                    _ => "in",
                };
                writeln!(self.out, "{level}{direction} gl_PerVertex")?;
                writeln!(self.out, "{level}{{")?;
                writeln!(self.out, "{}vec4 gl_Position;", level.next())?;
                writeln!(self.out, "{}float gl_PointSize;", level.next())?;
                writeln!(self.out, "{}float gl_ClipDistance[];", level.next())?;
                writeln!(self.out, "{}float gl_CullDistance[];", level.next())?;
                writeln!(self.out, "{level}}};")?;
            }
            Stmt::InputComputeLayout { local_size } => {
                writeln!(
                    self.out,
                    "{level}layout(local_size_x = {}, local_size_y = {}, local_size_z = {}) in;",
                    local_size[0], local_size[1], local_size[2]
                )?;
            }
            Stmt::InputGeometryLayout { topology } => {
                use crate::ty::InputTopology as It;
                let name = match topology {
                    It::Points => "points",
                    It::Lines => "lines",
                    It::LinesAdjacency => "lines_adjacency",
                    It::Triangles => "triangles",
                    It::TrianglesAdjacency => "triangles_adjacency",
                };
                writeln!(self.out, "{level}layout({name}) in;")?;
            }
            Stmt::OutputGeometryLayout {
                topology,
                max_vertices,
            } => {
                use crate::ty::OutputTopology as Ot;
                let name = match topology {
                    Ot::Points => "points",
                    Ot::LineStrip | Ot::Lines => "line_strip",
                    Ot::TriangleStrip | Ot::Triangles => "triangle_strip",
                };
                writeln!(
                    self.out,
                    "{level}layout({name}, max_vertices = {max_vertices}) out;"
                )?;
            }
            Stmt::InOutRayPayloadVariableDecl { var, location } => {
                let ty = self.variables[var].ty;
                let incoming = matches!(
                    *self.shader.types.lookup(ty),
                    TypeInner::RayPayload { incoming: true, .. }
                );
                let qualifier = if incoming {
                    "rayPayloadInEXT"
                } else {
                    "rayPayloadEXT"
                };
                writeln!(
                    self.out,
                    "{level}layout(location = {location}) {qualifier} {} {};",
                    self.type_name(ty)?,
                    self.var_name(var)
                )?;
            }
            Stmt::PreprocDefine { ref name, expr } => {
                let name = name.clone();
                write!(self.out, "#define {name} ")?;
                self.write_expr(expr)?;
                writeln!(self.out)?;
            }
            Stmt::PreprocIf { condition } => {
                write!(self.out, "#if ")?;
                self.write_expr(condition)?;
                writeln!(self.out)?;
            }
            Stmt::PreprocIfDef { ref name } => writeln!(self.out, "#ifdef {name}")?,
            Stmt::PreprocElif { condition } => {
                write!(self.out, "#elif ")?;
                self.write_expr(condition)?;
                writeln!(self.out)?;
            }
            Stmt::PreprocElse => writeln!(self.out, "#else")?,
            Stmt::PreprocEndif => writeln!(self.out, "#endif")?,
            Stmt::PreprocVersion { ref name } => writeln!(self.out, "#version {name}")?,
            Stmt::PreprocExtension { ref name, status } => {
                let status = match status {
                    ExtensionStatus::Disabled => "disable",
                    ExtensionStatus::Enabled => "enable",
                    ExtensionStatus::Required => "require",
                };
                writeln!(self.out, "#extension {name} : {status}")?;
            }
        }
        Ok(())
    }
}
