/*! The shader intermediate representation.

A [`Shader`] owns everything the backends consume: the interned type table,
the expression and statement arenas, the variable registry and the resource
metadata the builder collects along the way ([`ShaderData`]). The IR tree
proper is rooted at a [`Stmt::Container`] handle.
*/

pub mod expr;
pub mod stmt;

pub use expr::{
    AssignOp, BinaryOp, CombinedImageAccess, Expr, ExprKind, ImageAccess, Intrinsic, Literal,
    SwizzleComponent, UnaryOp,
};
pub use stmt::{Block, ElseIf, ExtensionStatus, FnFlags, PerVertexSource, Stmt, SwitchCase};

use crate::arena::{Arena, Handle};
use crate::ty::{Type, TypeCache};
use crate::{BuiltIn, EntryPoint, FastHashMap, FastIndexMap, ShaderStage};

bitflags::bitflags! {
    /// Qualifiers and roles of a [`Variable`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serialize", derive(serde::Serialize))]
    #[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
    pub struct VarFlags: u32 {
        const LOCALE = 1;
        const PARAM = 1 << 1;
        const INPUT_PARAM = 1 << 2;
        const OUTPUT_PARAM = 1 << 3;
        const LOOP_VAR = 1 << 4;
        const MEMBER = 1 << 5;
        const UNIFORM = 1 << 6;
        const CONSTANT = 1 << 7;
        const STATIC = 1 << 8;
        const SHADER_INPUT = 1 << 9;
        const SHADER_OUTPUT = 1 << 10;
        const BUILTIN = 1 << 11;
        const SAMPLER = 1 << 12;
        const FLAT = 1 << 13;
        const SPEC_CONSTANT = 1 << 14;
        const PUSH_CONSTANT = 1 << 15;
        const SHARED = 1 << 16;
        /// SSA alias introduced by the transform pipeline.
        const ALIAS = 1 << 17;
        const TEMP = 1 << 18;
    }
}

/// A named, typed slot shared by id across the whole shader.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub struct Variable {
    /// Monotonically increasing id, allocated from [`ShaderData::next_var_id`].
    pub id: u32,
    pub name: String,
    pub ty: Handle<Type>,
    pub flags: VarFlags,
    /// The enclosing variable, for members.
    pub outer: Option<Handle<Variable>>,
    /// The builtin tag, for builtin variables.
    pub builtin: Option<BuiltIn>,
}

impl Variable {
    pub fn is_member(&self) -> bool {
        self.flags.contains(VarFlags::MEMBER)
    }

    pub fn is_uniform(&self) -> bool {
        self.flags.contains(VarFlags::UNIFORM)
    }

    pub fn is_locale(&self) -> bool {
        self.flags.contains(VarFlags::LOCALE)
    }
}

/// Type, binding point and descriptor set of a bound resource.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub struct ResourceInfo {
    pub ty: Handle<Type>,
    pub binding: u32,
    pub set: u32,
}

/// A stage input or output with its interface location.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub struct IoInfo {
    pub ty: Handle<Type>,
    pub location: u32,
}

/// A specialisation constant with its constant id.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub struct SpecConstantInfo {
    pub ty: Handle<Type>,
    pub location: u32,
}

/// Registry data the builder accumulates while the front-end declares things.
#[derive(Debug, Default)]
pub struct ShaderData {
    /// Source of variable ids; the next registration takes `next_var_id + 1`.
    pub next_var_id: u32,
    /// Source of SSA alias ids.
    pub alias_id: u32,
    /// Static constants by name.
    pub constants: FastIndexMap<String, Handle<Type>>,
    pub spec_constants: FastIndexMap<String, SpecConstantInfo>,
    pub samplers: FastIndexMap<String, ResourceInfo>,
    /// Sampled images (separate image + implicit sampler).
    pub sampled: FastIndexMap<String, ResourceInfo>,
    /// Combined image samplers.
    pub textures: FastIndexMap<String, ResourceInfo>,
    /// Sampled buffer-dimension images.
    pub uniform_texels: FastIndexMap<String, ResourceInfo>,
    /// Storage buffer-dimension images.
    pub storage_texels: FastIndexMap<String, ResourceInfo>,
    /// Storage images.
    pub images: FastIndexMap<String, ResourceInfo>,
    pub ubos: FastIndexMap<String, ResourceInfo>,
    pub ssbos: FastIndexMap<String, ResourceInfo>,
    /// Push-constant blocks (no binding decoration).
    pub pcbs: FastIndexMap<String, Handle<Type>>,
    pub shader_records: FastIndexMap<String, ResourceInfo>,
    pub acceleration_struct: Option<ResourceInfo>,
    pub inputs: FastHashMap<EntryPoint, FastIndexMap<String, IoInfo>>,
    pub outputs: FastHashMap<EntryPoint, FastIndexMap<String, IoInfo>>,
    pub inouts: FastIndexMap<String, Handle<Type>>,
    /// Captured from a registered tessellation-control-input variable type.
    pub tessellation_control_points: u32,
}

/// A shader under construction or ready for emission.
#[derive(Debug)]
pub struct Shader {
    stage: ShaderStage,
    pub types: TypeCache,
    pub exprs: Arena<Expr>,
    pub stmts: Arena<Stmt>,
    pub variables: Arena<Variable>,
    root: Handle<Stmt>,
    pub data: ShaderData,
}

impl Shader {
    pub fn new(stage: ShaderStage) -> Self {
        let mut stmts = Arena::new();
        let root = stmts.append(Stmt::Container(Vec::new()));
        Shader {
            stage,
            types: TypeCache::new(),
            exprs: Arena::new(),
            stmts,
            variables: Arena::new(),
            root,
            data: ShaderData::default(),
        }
    }

    pub const fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// The bottom container every global statement lands in.
    pub const fn root(&self) -> Handle<Stmt> {
        self.root
    }

    /// Allocate an expression node.
    pub fn add_expr(&mut self, ty: Handle<Type>, kind: ExprKind) -> Handle<Expr> {
        self.exprs.append(Expr { ty, kind })
    }

    /// Allocate a statement node.
    pub fn add_stmt(&mut self, stmt: Stmt) -> Handle<Stmt> {
        self.stmts.append(stmt)
    }

    /// Find a registered variable by id.
    pub fn variable_by_id(&self, id: u32) -> Option<Handle<Variable>> {
        self.variables.fetch_if(|v| v.id == id)
    }
}
