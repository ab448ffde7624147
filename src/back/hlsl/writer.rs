//! HLSL statement and expression printing.
//!
//! Stage inputs and outputs gather into generated `StageInput`/`StageOutput`
//! structs with system-value semantics; the IR entry point prints as an inner
//! function and `main` wraps it, copying the structs through statics. Buffer
//! resources print as `cbuffer`/`RWStructuredBuffer` objects and combined
//! image accesses print as texture method calls.

use super::{adapt::SamplerMap, conv::Io, Error, Options};
use crate::arena::{Arena, Handle};
use crate::back::{self, Level};
use crate::ir::{
    expr::{CombinedImageAccess, ImageAccess},
    Expr, ExprKind, FnFlags, Literal, Shader, Stmt, VarFlags, Variable,
};
use crate::ty::{StructDef, Type, TypeInner};
use crate::xform::TreeRef;
use crate::{FastHashMap, FastHashSet, ShaderStage};
use std::fmt::Write;

const LOCATION_SEMANTIC: &str = "LOC";
const STAGE_INPUT: &str = "StageInput";
const STAGE_OUTPUT: &str = "StageOutput";
const STAGE_INPUT_VAR: &str = "stage_input";
const STAGE_OUTPUT_VAR: &str = "stage_output";

/// How a resource instance variable prints when accessed.
#[derive(Clone, Copy, PartialEq, Eq)]
enum BufferKind {
    /// cbuffer: members are global names, the instance disappears.
    Constant,
    /// `RWStructuredBuffer<T>` holding a single struct: access through `[0]`.
    StructuredSingle,
    /// `RWStructuredBuffer<T>` holding a runtime array: the instance is the
    /// array.
    StructuredArray,
}

struct IoMember {
    name: String,
    ty: Handle<Type>,
    semantic: String,
}

/// Prints an adapted statement tree as HLSL.
pub struct Writer<'a, W> {
    out: W,
    shader: &'a Shader,
    variables: &'a Arena<Variable>,
    tree: TreeRef<'a>,
    options: &'a Options,
    samplers: &'a SamplerMap,
    buffers: FastHashMap<Handle<Variable>, BufferKind>,
    inputs: Vec<IoMember>,
    outputs: Vec<IoMember>,
    /// Builtins referenced by the tree, by direction.
    builtin_vars: FastHashSet<Handle<Variable>>,
    local_size: Option<[u32; 3]>,
}

impl<'a, W: Write> Writer<'a, W> {
    pub fn new(
        out: W,
        shader: &'a Shader,
        variables: &'a Arena<Variable>,
        tree: TreeRef<'a>,
        options: &'a Options,
        samplers: &'a SamplerMap,
    ) -> Self {
        Writer {
            out,
            shader,
            variables,
            tree,
            options,
            samplers,
            buffers: FastHashMap::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            builtin_vars: FastHashSet::default(),
            local_size: None,
        }
    }

    pub fn write(&mut self) -> super::BackendResult {
        self.scan_interface(self.tree.root)?;
        self.write_io_structs()?;
        match self.tree.stmts[self.tree.root] {
            Stmt::Container(ref block) => {
                let block = block.clone();
                for child in block {
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

    fn register_suffix(&self, class: char, binding: u32, set: u32) -> String {
        if self.options.use_spaces {
            format!(" : register({class}{binding}, space{set})")
        } else {
            format!(" : register({class}{binding})")
        }
    }

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

    //
    // Interface collection.
    //

    fn scan_interface(&mut self, stmt: Handle<Stmt>) -> super::BackendResult {
        match self.tree.stmts[stmt] {
            Stmt::Container(ref block) | Stmt::Compound(ref block) => {
                let block = block.clone();
                for child in block {
                    self.scan_interface(child)?;
                }
            }
            Stmt::InOutVariableDecl { var, location } => {
                let flags = self.variables[var].flags;
                let member = IoMember {
                    name: self.var_name(var),
                    ty: self.variables[var].ty,
                    semantic: format!("{LOCATION_SEMANTIC}{location}"),
                };
                if flags.contains(VarFlags::SHADER_INPUT) {
                    self.inputs.push(member);
                } else {
                    self.outputs.push(member);
                }
            }
            Stmt::PerVertexDecl { .. } => {
                // Represented by the Position builtin below.
            }
            Stmt::InputComputeLayout { local_size } => self.local_size = Some(local_size),
            Stmt::FunctionDecl { body, .. } => self.scan_interface(body)?,
            Stmt::Simple(expr) => self.scan_exprs(expr),
            Stmt::Return(Some(expr)) => self.scan_exprs(expr),
            Stmt::If {
                condition,
                then_body,
                ref else_ifs,
                else_body,
            } => {
                let else_ifs = else_ifs.clone();
                self.scan_exprs(condition);
                self.scan_interface(then_body)?;
                for else_if in else_ifs {
                    self.scan_exprs(else_if.condition);
                    self.scan_interface(else_if.body)?;
                }
                if let Some(else_body) = else_body {
                    self.scan_interface(else_body)?;
                }
            }
            Stmt::Switch { test, ref cases } => {
                let cases = cases.clone();
                self.scan_exprs(test);
                for case in cases {
                    self.scan_interface(case.body)?;
                }
            }
            Stmt::For {
                init,
                condition,
                increment,
                body,
            } => {
                self.scan_exprs(init);
                self.scan_exprs(condition);
                self.scan_exprs(increment);
                self.scan_interface(body)?;
            }
            Stmt::While { condition, body } | Stmt::DoWhile { condition, body } => {
                self.scan_exprs(condition);
                self.scan_interface(body)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Record builtin variables referenced by an expression tree.
    fn scan_exprs(&mut self, expr: Handle<Expr>) {
        if let ExprKind::Ident(var) = self.tree.exprs[expr].kind {
            if self.variables[var].flags.contains(VarFlags::BUILTIN)
                && self.builtin_vars.insert(var)
            {
                log::trace!("stage interface uses builtin [{}]", self.variables[var].name);
            }
        }
        for operand in self.tree.exprs[expr].kind.operands() {
            self.scan_exprs(operand);
        }
    }

    fn write_io_structs(&mut self) -> super::BackendResult {
        let mut builtin_inputs = Vec::new();
        let mut builtin_outputs = Vec::new();
        let mut builtin_vars: Vec<_> = self.builtin_vars.iter().copied().collect();
        builtin_vars.sort_by_key(|&var| self.variables[var].id);
        for var in builtin_vars {
            let builtin = self.variables[var]
                .builtin
                .expect("builtin-flagged variable without a builtin tag");
            let member = IoMember {
                name: self.var_name(var),
                ty: self.variables[var].ty,
                semantic: builtin.to_hlsl_str()?.to_string(),
            };
            match builtin.direction(self.shader.stage()) {
                Io::Input => builtin_inputs.push(member),
                Io::Output => builtin_outputs.push(member),
            }
        }

        if self.shader.stage() == ShaderStage::Compute {
            // Compute IO is builtin-only: statics filled from main's
            // parameters.
            for member in &builtin_inputs {
                writeln!(
                    self.out,
                    "static {} {};",
                    self.type_name(member.ty)?,
                    member.name
                )?;
            }
            self.inputs.extend(builtin_inputs);
            if !self.inputs.is_empty() {
                writeln!(self.out)?;
            }
            return Ok(());
        }

        self.inputs.extend(builtin_inputs);
        self.outputs.extend(builtin_outputs);

        if !self.inputs.is_empty() {
            writeln!(self.out, "struct {STAGE_INPUT}")?;
            writeln!(self.out, "{{")?;
            for index in 0..self.inputs.len() {
                let (name, ty, semantic) = {
                    let member = &self.inputs[index];
                    (member.name.clone(), member.ty, member.semantic.clone())
                };
                writeln!(
                    self.out,
                    "{}{} {}{} : {semantic};",
                    back::INDENT,
                    self.type_name(ty)?,
                    name,
                    self.array_suffix(ty)
                )?;
            }
            writeln!(self.out, "}};")?;
            writeln!(self.out, "static {STAGE_INPUT} {STAGE_INPUT_VAR};")?;
            writeln!(self.out)?;
        }
        if !self.outputs.is_empty() {
            writeln!(self.out, "struct {STAGE_OUTPUT}")?;
            writeln!(self.out, "{{")?;
            for index in 0..self.outputs.len() {
                let (name, ty, semantic) = {
                    let member = &self.outputs[index];
                    (member.name.clone(), member.ty, member.semantic.clone())
                };
                writeln!(
                    self.out,
                    "{}{} {}{} : {semantic};",
                    back::INDENT,
                    self.type_name(ty)?,
                    name,
                    self.array_suffix(ty)
                )?;
            }
            writeln!(self.out, "}};")?;
            writeln!(self.out, "static {STAGE_OUTPUT} {STAGE_OUTPUT_VAR};")?;
            writeln!(self.out)?;
        }
        Ok(())
    }

    //
    // Types.
    //

    fn type_name(&self, ty: Handle<Type>) -> Result<String, Error> {
        Ok(match *self.shader.types.lookup(ty) {
            TypeInner::Void => "void".to_string(),
            TypeInner::Scalar(scalar) => scalar.to_hlsl_str()?.to_string(),
            TypeInner::Vector { scalar, size } => format!(
                "{}{}",
                scalar.to_hlsl_str()?,
                back::vector_size_str(size)
            ),
            TypeInner::Matrix {
                scalar,
                columns,
                rows,
            } => format!(
                "{}{}x{}",
                scalar.to_hlsl_str()?,
                back::vector_size_str(columns),
                back::vector_size_str(rows)
            ),
            TypeInner::Array { base, .. } => self.type_name(base)?,
            TypeInner::Pointer { base, .. } => self.type_name(base)?,
            TypeInner::Sampler { comparison } => if comparison {
                "SamplerComparisonState"
            } else {
                "SamplerState"
            }
            .to_string(),
            TypeInner::Image(ref config) => format!(
                "{}<{}4>",
                config.to_hlsl_object(true),
                config.sampled_type.to_hlsl_str()?
            ),
            TypeInner::SampledImage { ref config, .. }
            | TypeInner::CombinedImage { ref config, .. } => format!(
                "{}<{}4>",
                config.to_hlsl_object(false),
                config.sampled_type.to_hlsl_str()?
            ),
            TypeInner::AccelerationStructure => "RaytracingAccelerationStructure".to_string(),
            TypeInner::Struct(def) => self.shader.types.struct_def(def).name.clone(),
            TypeInner::Function { result, .. } => self.type_name(result)?,
            ref inner => match inner.wrapped() {
                Some(wrapped) => self.type_name(wrapped)?,
                None => "void".to_string(),
            },
        })
    }

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
            Literal::I64(v) => write!(self.out, "{v}L")?,
            Literal::U8(v) => write!(self.out, "{v}")?,
            Literal::U16(v) => write!(self.out, "{v}")?,
            Literal::U32(v) => write!(self.out, "{v}u")?,
            Literal::U64(v) => write!(self.out, "{v}UL")?,
            Literal::F16(v) => write!(self.out, "{v}h")?,
            Literal::F32(v) => write!(self.out, "{v:?}")?,
            Literal::F64(v) => write!(self.out, "{v:?}L")?,
        }
        Ok(())
    }

    //
    // Expressions.
    //

    fn write_arguments(&mut self, arguments: &[Handle<Expr>]) -> super::BackendResult {
        for (index, &argument) in arguments.iter().enumerate() {
            if index != 0 {
                write!(self.out, ", ")?;
            }
            self.write_expr(argument)?;
        }
        Ok(())
    }

    fn write_ident(&mut self, var: Handle<Variable>) -> super::BackendResult {
        let flags = self.variables[var].flags;
        if flags.contains(VarFlags::BUILTIN) {
            if self.shader.stage() == ShaderStage::Compute {
                // Compute builtins live in statics named after themselves.
                write!(self.out, "{}", self.var_name(var))?;
                return Ok(());
            }
            let builtin = self.variables[var]
                .builtin
                .expect("builtin-flagged variable without a builtin tag");
            let scope = match builtin.direction(self.shader.stage()) {
                Io::Input => STAGE_INPUT_VAR,
                Io::Output => STAGE_OUTPUT_VAR,
            };
            write!(self.out, "{scope}.{}", self.var_name(var))?;
            return Ok(());
        }
        if flags.contains(VarFlags::SHADER_INPUT) && !flags.contains(VarFlags::SHADER_OUTPUT) {
            write!(self.out, "{STAGE_INPUT_VAR}.{}", self.var_name(var))?;
            return Ok(());
        }
        if flags.contains(VarFlags::SHADER_OUTPUT) && !flags.contains(VarFlags::SHADER_INPUT) {
            write!(self.out, "{STAGE_OUTPUT_VAR}.{}", self.var_name(var))?;
            return Ok(());
        }
        write!(self.out, "{}", self.var_name(var))?;
        Ok(())
    }

    fn write_expr(&mut self, expr: Handle<Expr>) -> super::BackendResult {
        let ty = self.tree.exprs[expr].ty;
        match self.tree.exprs[expr].kind {
            ExprKind::Literal(ref value) => {
                let value = *value;
                self.write_literal(&value)?;
            }
            ExprKind::Ident(var) => self.write_ident(var)?,
            ExprKind::MemberSelect { base, index } => {
                let base_ty = self.tree.exprs[base].ty;
                let def = self
                    .resolve_struct(base_ty)
                    .expect("member select on a non-struct type");
                let name = self.shader.types.struct_def(def).members[index as usize]
                    .name
                    .clone();
                if let ExprKind::Ident(var) = self.tree.exprs[base].kind {
                    match self.buffers.get(&var) {
                        // cbuffer members are global names.
                        Some(BufferKind::Constant) => {
                            write!(self.out, "{name}")?;
                            return Ok(());
                        }
                        Some(BufferKind::StructuredSingle) => {
                            write!(self.out, "{}[0].{name}", self.var_name(var))?;
                            return Ok(());
                        }
                        // The instance is the runtime array itself.
                        Some(BufferKind::StructuredArray) => {
                            write!(self.out, "{}", self.var_name(var))?;
                            return Ok(());
                        }
                        None => {}
                    }
                }
                self.write_expr(base)?;
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
                write!(self.out, "{{ ")?;
                self.write_arguments(&initializers)?;
                write!(self.out, " }}")?;
            }
            ExprKind::CompositeConstruct { ref components } => {
                let components = components.clone();
                write!(self.out, "{}(", self.type_name(ty)?)?;
                self.write_arguments(&components)?;
                write!(self.out, ")")?;
            }
            ExprKind::Init { target, value } => {
                let ExprKind::Ident(var) = self.tree.exprs[target].kind else {
                    unreachable!("init target is always an identifier");
                };
                let var_ty = self.variables[var].ty;
                write!(
                    self.out,
                    "{} {}{} = ",
                    self.type_name(var_ty)?,
                    self.var_name(var),
                    self.array_suffix(var_ty)
                )?;
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
                write!(self.out, "{}(", intrinsic.to_hlsl_str())?;
                self.write_arguments(&arguments)?;
                write!(self.out, ")")?;
            }
            ExprKind::ImageAccess {
                access,
                image,
                ref arguments,
            } => {
                let arguments = arguments.clone();
                match access {
                    ImageAccess::Load => {
                        self.write_expr(image)?;
                        write!(self.out, "[")?;
                        self.write_arguments(&arguments)?;
                        write!(self.out, "]")?;
                    }
                    ImageAccess::Store => {
                        self.write_expr(image)?;
                        write!(self.out, "[")?;
                        if let Some((&coord, value)) = arguments.split_first() {
                            self.write_expr(coord)?;
                            write!(self.out, "] = ")?;
                            self.write_arguments(value)?;
                        } else {
                            write!(self.out, "]")?;
                        }
                    }
                    ImageAccess::Size | ImageAccess::Samples => {
                        write!(self.out, "ShadeDimensions(")?;
                        self.write_expr(image)?;
                        write!(self.out, ")")?;
                    }
                }
            }
            ExprKind::CombinedImageAccess {
                access,
                image,
                ref arguments,
            } => {
                let arguments = arguments.clone();
                let method = match access {
                    CombinedImageAccess::Sample | CombinedImageAccess::SampleOffset => "Sample",
                    CombinedImageAccess::SampleLod => "SampleLevel",
                    CombinedImageAccess::SampleCmp => "SampleCmp",
                    CombinedImageAccess::Fetch => "Load",
                    CombinedImageAccess::Gather => "Gather",
                    CombinedImageAccess::QuerySize | CombinedImageAccess::QueryLod => {
                        write!(self.out, "ShadeDimensions(")?;
                        self.write_expr(image)?;
                        write!(self.out, ")")?;
                        return Ok(());
                    }
                };
                self.write_expr(image)?;
                write!(self.out, ".{method}(")?;
                if method != "Load" {
                    if let ExprKind::Ident(texture) = self.tree.exprs[image].kind {
                        if let Some(&sampler) = self.samplers.get(&texture) {
                            write!(self.out, "{}, ", self.var_name(sampler))?;
                        }
                    }
                }
                self.write_arguments(&arguments)?;
                write!(self.out, ")")?;
            }
            ExprKind::SwitchTest { value } => self.write_expr(value)?,
            ExprKind::SwitchCase { label } => self.write_expr(label)?,
            ExprKind::Copy { operand } => self.write_expr(operand)?,
            ExprKind::StreamAppend { operand } => {
                // Geometry streams print against the conventional `stream`
                // output parameter.
                write!(self.out, "stream.Append(")?;
                self.write_expr(operand)?;
                write!(self.out, ")")?;
            }
            ExprKind::Dummy => {}
        }
        Ok(())
    }

    //
    // Statements.
    //

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

    fn write_entry_point(
        &mut self,
        var: Handle<Variable>,
        body: Handle<Stmt>,
        level: Level,
    ) -> super::BackendResult {
        let inner = format!("{}_inner", self.var_name(var));
        writeln!(self.out, "{level}void {inner}()")?;
        self.write_block(body, level)?;
        writeln!(self.out)?;

        if self.shader.stage() == ShaderStage::Compute {
            let [x, y, z] = self.local_size.unwrap_or([1, 1, 1]);
            writeln!(self.out, "{level}[numthreads({x}, {y}, {z})]")?;
            write!(self.out, "{level}void main(")?;
            let mut builtin_vars: Vec<_> = self.builtin_vars.iter().copied().collect();
            builtin_vars.sort_by_key(|&v| self.variables[v].id);
            for (index, bvar) in builtin_vars.iter().copied().enumerate() {
                if index != 0 {
                    write!(self.out, ", ")?;
                }
                let builtin = self.variables[bvar].builtin.unwrap();
                let bty = self.variables[bvar].ty;
                write!(
                    self.out,
                    "{} {}_input : {}",
                    self.type_name(bty)?,
                    self.var_name(bvar),
                    builtin.to_hlsl_str()?
                )?;
            }
            writeln!(self.out, ")")?;
            writeln!(self.out, "{level}{{")?;
            for bvar in builtin_vars {
                writeln!(
                    self.out,
                    "{}{} = {}_input;",
                    level.next(),
                    self.var_name(bvar),
                    self.var_name(bvar)
                )?;
            }
            writeln!(self.out, "{}{inner}();", level.next())?;
            writeln!(self.out, "{level}}}")?;
            return Ok(());
        }

        let has_inputs = !self.inputs.is_empty();
        let has_outputs = !self.outputs.is_empty();
        let result = if has_outputs { STAGE_OUTPUT } else { "void" };
        write!(self.out, "{level}{result} main(")?;
        if has_inputs {
            write!(self.out, "{STAGE_INPUT} input")?;
        }
        writeln!(self.out, ")")?;
        writeln!(self.out, "{level}{{")?;
        if has_inputs {
            writeln!(self.out, "{}{STAGE_INPUT_VAR} = input;", level.next())?;
        }
        writeln!(self.out, "{}{inner}();", level.next())?;
        if has_outputs {
            writeln!(self.out, "{}return {STAGE_OUTPUT_VAR};", level.next())?;
        }
        writeln!(self.out, "{level}}}")?;
        Ok(())
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
                let ty = self.variables[var].ty;
                let qualifier = if self.variables[var].flags.contains(VarFlags::SHARED) {
                    "groupshared "
                } else if level.0 == 0 {
                    "static "
                } else {
                    ""
                };
                writeln!(
                    self.out,
                    "{level}{qualifier}{} {}{};",
                    self.type_name(ty)?,
                    self.var_name(var),
                    self.array_suffix(ty)
                )?;
            }
            // Collected into the stage IO structs by the pre-scan.
            Stmt::InOutVariableDecl { .. } | Stmt::PerVertexDecl { .. } => {}
            Stmt::SamplerDecl { var, binding, set } => {
                let comparison = matches!(
                    *self.shader.types.lookup(self.shader.types.non_array(self.variables[var].ty)),
                    TypeInner::Sampler { comparison: true }
                        | TypeInner::CombinedImage {
                            comparison: true,
                            ..
                        }
                );
                let object = if comparison {
                    "SamplerComparisonState"
                } else {
                    "SamplerState"
                };
                writeln!(
                    self.out,
                    "{level}{object} {}{};",
                    self.var_name(var),
                    self.register_suffix('s', binding, set)
                )?;
            }
            Stmt::SampledImageDecl { var, binding, set }
            | Stmt::CombinedImageDecl { var, binding, set } => {
                let ty = self.variables[var].ty;
                writeln!(
                    self.out,
                    "{level}{} {}{}{};",
                    self.type_name(ty)?,
                    self.var_name(var),
                    self.array_suffix(ty),
                    self.register_suffix('t', binding, set)
                )?;
            }
            Stmt::ImageDecl { var, binding, set } => {
                let ty = self.variables[var].ty;
                writeln!(
                    self.out,
                    "{level}{} {}{}{};",
                    self.type_name(ty)?,
                    self.var_name(var),
                    self.array_suffix(ty),
                    self.register_suffix('u', binding, set)
                )?;
            }
            Stmt::ConstantBufferDecl { var, binding, set } => {
                self.buffers.insert(var, BufferKind::Constant);
                let def = self
                    .resolve_struct(self.variables[var].ty)
                    .expect("constant buffer without a struct type");
                let def = self.shader.types.struct_def(def).clone();
                writeln!(
                    self.out,
                    "{level}cbuffer {}{}",
                    def.name,
                    self.register_suffix('b', binding, set)
                )?;
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
                writeln!(self.out, "{level}}};")?;
            }
            Stmt::PushConstantsBufferDecl { var, .. } => {
                self.buffers.insert(var, BufferKind::Constant);
                let def = self
                    .resolve_struct(self.variables[var].ty)
                    .expect("push constant block without a struct type");
                let def = self.shader.types.struct_def(def).clone();
                writeln!(self.out, "{level}cbuffer {}", def.name)?;
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
                writeln!(self.out, "{level}}};")?;
            }
            Stmt::ShaderBufferDecl { var, binding, set } => {
                self.buffers.insert(var, BufferKind::StructuredSingle);
                let def = self
                    .resolve_struct(self.variables[var].ty)
                    .expect("shader buffer without a struct type");
                let name = self.shader.types.struct_def(def).name.clone();
                writeln!(
                    self.out,
                    "{level}RWStructuredBuffer<{name}> {}{};",
                    self.var_name(var),
                    self.register_suffix('u', binding, set)
                )?;
            }
            Stmt::ShaderStructBufferDecl {
                instance,
                data,
                binding,
                set,
                ..
            } => {
                self.buffers.insert(instance, BufferKind::StructuredArray);
                let element = self.shader.types.non_array(self.variables[data].ty);
                writeln!(
                    self.out,
                    "{level}RWStructuredBuffer<{}> {}{};",
                    self.type_name(element)?,
                    self.var_name(instance),
                    self.register_suffix('u', binding, set)
                )?;
            }
            Stmt::SpecConstantDecl { var, value, .. } => {
                let ty = self.variables[var].ty;
                write!(
                    self.out,
                    "{level}static const {} {} = ",
                    self.type_name(ty)?,
                    self.var_name(var)
                )?;
                self.write_expr(value)?;
                writeln!(self.out, ";")?;
            }
            Stmt::StructureDecl(def) => {
                let def = self.shader.types.struct_def(def).clone();
                writeln!(self.out, "{level}struct {}", def.name)?;
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
                writeln!(self.out, "{level}}};")?;
            }
            Stmt::FunctionDecl {
                var,
                ref params,
                body,
                flags,
            } => {
                let params = params.clone();
                if flags.contains(FnFlags::ENTRY_POINT) {
                    self.write_entry_point(var, body, level)?;
                    return Ok(());
                }
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
                    let qualifier =
                        if flags.contains(VarFlags::INPUT_PARAM | VarFlags::OUTPUT_PARAM) {
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
            Stmt::Return(value) => match value {
                Some(value) => {
                    write!(self.out, "{level}return ")?;
                    self.write_expr(value)?;
                    writeln!(self.out, ";")?;
                }
                None => writeln!(self.out, "{level}return;")?,
            },
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
            // GLSL-only layout markers; compute local size is consumed by the
            // entry point wrapper.
            Stmt::InputComputeLayout { .. }
            | Stmt::InputGeometryLayout { .. }
            | Stmt::OutputGeometryLayout { .. } => {}
            Stmt::InOutRayPayloadVariableDecl { var, .. } => {
                let ty = self.variables[var].ty;
                writeln!(
                    self.out,
                    "{level}static {} {};",
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
            // GLSL preprocessor directives with no HLSL counterpart.
            Stmt::PreprocVersion { .. } | Stmt::PreprocExtension { .. } => {}
        }
        Ok(())
    }
}
