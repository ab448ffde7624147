//! Statement nodes.
//!
//! Statements form a tree: containers hold ordered child handles, flow
//! control holds body containers. The root of every shader is a
//! [`Stmt::Container`].

use super::expr::Expr;
use super::Variable;
use crate::arena::Handle;
use crate::ty::{InputTopology, MemoryLayout, OutputTopology, StructDef, Type};

/// An ordered sequence of statements.
pub type Block = Vec<Handle<Stmt>>;

/// One alternative branch of an [`Stmt::If`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub struct ElseIf {
    pub condition: Handle<Expr>,
    /// Body container.
    pub body: Handle<Stmt>,
}

/// One arm of a [`Stmt::Switch`]; `label` is `None` for the default arm.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub struct SwitchCase {
    pub label: Option<Handle<Expr>>,
    /// Body container.
    pub body: Handle<Stmt>,
}

bitflags::bitflags! {
    /// Qualifiers on a function declaration.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serialize", derive(serde::Serialize))]
    #[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
    pub struct FnFlags: u32 {
        /// The function is the stage's entry point.
        const ENTRY_POINT = 0x1;
    }
}

/// Which interface block a `gl_PerVertex` declaration describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum PerVertexSource {
    VertexOutput,
    TessControlInput,
    TessControlOutput,
    TessEvaluationInput,
    GeometryInput,
    GeometryOutput,
    MeshOutput,
}

/// Requirement level of a `#extension` directive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum ExtensionStatus {
    Disabled,
    Enabled,
    Required,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub enum Stmt {
    /// Ordered statement sequence; the root of a shader and every flow body.
    Container(Block),
    /// A braced block scope.
    Compound(Block),
    /// An expression in statement position.
    Simple(Handle<Expr>),
    VariableDecl {
        var: Handle<Variable>,
    },
    /// Stage input/output variable with an interface location.
    InOutVariableDecl {
        var: Handle<Variable>,
        location: u32,
    },
    SamplerDecl {
        var: Handle<Variable>,
        binding: u32,
        set: u32,
    },
    ImageDecl {
        var: Handle<Variable>,
        binding: u32,
        set: u32,
    },
    SampledImageDecl {
        var: Handle<Variable>,
        binding: u32,
        set: u32,
    },
    CombinedImageDecl {
        var: Handle<Variable>,
        binding: u32,
        set: u32,
    },
    /// Storage buffer (SSBO); the variable is struct-typed.
    ShaderBufferDecl {
        var: Handle<Variable>,
        binding: u32,
        set: u32,
    },
    /// Uniform buffer (UBO); the variable is struct-typed.
    ConstantBufferDecl {
        var: Handle<Variable>,
        binding: u32,
        set: u32,
    },
    PushConstantsBufferDecl {
        var: Handle<Variable>,
        layout: MemoryLayout,
    },
    /// Storage buffer whose payload is a runtime array of structs.
    ShaderStructBufferDecl {
        buffer: Handle<Variable>,
        instance: Handle<Variable>,
        data: Handle<Variable>,
        binding: u32,
        set: u32,
    },
    SpecConstantDecl {
        var: Handle<Variable>,
        location: u32,
        value: Handle<Expr>,
    },
    StructureDecl(Handle<StructDef>),
    FunctionDecl {
        var: Handle<Variable>,
        params: Vec<Handle<Variable>>,
        /// Body container.
        body: Handle<Stmt>,
        flags: FnFlags,
    },
    Return(Option<Handle<Expr>>),
    Discard,
    If {
        condition: Handle<Expr>,
        /// Body container.
        then_body: Handle<Stmt>,
        else_ifs: Vec<ElseIf>,
        else_body: Option<Handle<Stmt>>,
    },
    Switch {
        /// A [`SwitchTest`](super::expr::ExprKind::SwitchTest) expression.
        test: Handle<Expr>,
        cases: Vec<SwitchCase>,
    },
    For {
        init: Handle<Expr>,
        condition: Handle<Expr>,
        increment: Handle<Expr>,
        body: Handle<Stmt>,
    },
    While {
        condition: Handle<Expr>,
        body: Handle<Stmt>,
    },
    DoWhile {
        condition: Handle<Expr>,
        body: Handle<Stmt>,
    },
    Break,
    Continue,
    PerVertexDecl {
        source: PerVertexSource,
        ty: Handle<Type>,
    },
    InputComputeLayout {
        local_size: [u32; 3],
    },
    InputGeometryLayout {
        topology: InputTopology,
    },
    OutputGeometryLayout {
        topology: OutputTopology,
        max_vertices: u32,
    },
    InOutRayPayloadVariableDecl {
        var: Handle<Variable>,
        location: u32,
    },
    PreprocDefine {
        name: String,
        expr: Handle<Expr>,
    },
    PreprocIf {
        condition: Handle<Expr>,
    },
    PreprocIfDef {
        name: String,
    },
    PreprocElif {
        condition: Handle<Expr>,
    },
    PreprocElse,
    PreprocEndif,
    PreprocVersion {
        name: String,
    },
    PreprocExtension {
        name: String,
        status: ExtensionStatus,
    },
}

impl Stmt {
    /// The child statements of a container-like node.
    pub fn block(&self) -> Option<&Block> {
        match *self {
            Stmt::Container(ref block) | Stmt::Compound(ref block) => Some(block),
            _ => None,
        }
    }

    pub fn block_mut(&mut self) -> Option<&mut Block> {
        match *self {
            Stmt::Container(ref mut block) | Stmt::Compound(ref mut block) => Some(block),
            _ => None,
        }
    }

    /// Returns true if the statement directly terminates the current block.
    pub const fn is_terminator(&self) -> bool {
        matches!(
            *self,
            Stmt::Break | Stmt::Continue | Stmt::Return(_) | Stmt::Discard
        )
    }
}
