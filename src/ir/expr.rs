//! Expression nodes.
//!
//! Expressions form a DAG over arena handles. Every node carries its result
//! type; operand handles point back into the same [`Arena`](crate::Arena).
//! Binary and unary operations share a single variant parameterised by an
//! operator tag rather than one variant per operator.

use super::Variable;
use crate::arena::Handle;
use crate::ty::{Scalar, Type};

/// A literal scalar value.
///
/// Floats hash and compare by bit pattern so literals can key dedup tables.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub enum Literal {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F16(half::f16),
    F32(f32),
    F64(f64),
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits() && std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl Eq for Literal {}

impl std::hash::Hash for Literal {
    fn hash<H: std::hash::Hasher>(&self, hasher: &mut H) {
        std::mem::discriminant(self).hash(hasher);
        self.bits().hash(hasher);
    }
}

impl Literal {
    pub const fn scalar(&self) -> Scalar {
        match *self {
            Literal::Bool(_) => Scalar::BOOL,
            Literal::I8(_) => Scalar::I8,
            Literal::I16(_) => Scalar::I16,
            Literal::I32(_) => Scalar::I32,
            Literal::I64(_) => Scalar::I64,
            Literal::U8(_) => Scalar::U8,
            Literal::U16(_) => Scalar::U16,
            Literal::U32(_) => Scalar::U32,
            Literal::U64(_) => Scalar::U64,
            Literal::F16(_) => Scalar::F16,
            Literal::F32(_) => Scalar::F32,
            Literal::F64(_) => Scalar::F64,
        }
    }

    /// The value as raw bits, sign-extended to 64.
    pub const fn bits(&self) -> u64 {
        match *self {
            Literal::Bool(v) => v as u64,
            Literal::I8(v) => v as u64,
            Literal::I16(v) => v as u64,
            Literal::I32(v) => v as u64,
            Literal::I64(v) => v as u64,
            Literal::U8(v) => v as u64,
            Literal::U16(v) => v as u64,
            Literal::U32(v) => v as u64,
            Literal::U64(v) => v,
            Literal::F16(v) => v.to_bits() as u64,
            Literal::F32(v) => v.to_bits() as u64,
            Literal::F64(v) => v.to_bits(),
        }
    }
}

/// Operator tag shared by all binary operations, including comparisons and
/// short-circuit logic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    LogicalAnd,
    LogicalOr,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOp {
    /// Whether the result type is boolean regardless of operand types.
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Less
                | Self::LessEqual
                | Self::Greater
                | Self::GreaterEqual
                | Self::LogicalAnd
                | Self::LogicalOr
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum UnaryOp {
    Plus,
    Negate,
    LogicalNot,
    BitNot,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

impl UnaryOp {
    pub const fn mutates_operand(self) -> bool {
        matches!(
            self,
            Self::PreIncrement | Self::PreDecrement | Self::PostIncrement | Self::PostDecrement
        )
    }
}

/// Plain and compound assignment operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum AssignOp {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
}

impl AssignOp {
    /// The arithmetic operator a compound assignment expands to.
    pub const fn binary(self) -> Option<BinaryOp> {
        Some(match self {
            AssignOp::Assign => return None,
            AssignOp::Add => BinaryOp::Add,
            AssignOp::Subtract => BinaryOp::Subtract,
            AssignOp::Multiply => BinaryOp::Multiply,
            AssignOp::Divide => BinaryOp::Divide,
            AssignOp::Modulo => BinaryOp::Modulo,
            AssignOp::BitAnd => BinaryOp::BitAnd,
            AssignOp::BitOr => BinaryOp::BitOr,
            AssignOp::BitXor => BinaryOp::BitXor,
            AssignOp::ShiftLeft => BinaryOp::ShiftLeft,
            AssignOp::ShiftRight => BinaryOp::ShiftRight,
        })
    }
}

/// Component selector for swizzles.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum SwizzleComponent {
    X = 0,
    Y = 1,
    Z = 2,
    W = 3,
}

/// Built-in functions callable from shader code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum Intrinsic {
    // trigonometry
    Radians,
    Degrees,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sinh,
    Cosh,
    Tanh,
    // exponential
    Pow,
    Exp,
    Log,
    Exp2,
    Log2,
    Sqrt,
    InverseSqrt,
    // common
    Abs,
    Sign,
    Floor,
    Ceil,
    Round,
    Trunc,
    Fract,
    Min,
    Max,
    Clamp,
    Mix,
    Step,
    SmoothStep,
    Fma,
    // geometric
    Length,
    Distance,
    Dot,
    Cross,
    Normalize,
    Reflect,
    Refract,
    FaceForward,
    // matrix
    Transpose,
    Determinant,
    Inverse,
    // integer
    BitCount,
    BitReverse,
    FindLsb,
    FindMsb,
    // fragment derivatives
    Dpdx,
    Dpdy,
    Fwidth,
    // synchronisation
    Barrier,
    MemoryBarrier,
    WorkgroupMemoryBarrier,
    // geometry streams
    EmitVertex,
    EndPrimitive,
    // mesh/task
    SetMeshOutputCounts,
    EmitMeshTasks,
    // ray tracing
    TraceRay,
    ReportIntersection,
    ExecuteCallable,
    IgnoreIntersection,
    TerminateRay,
}

impl Intrinsic {
    /// True for intrinsics whose effect is a statement, not a value.
    pub const fn is_action(self) -> bool {
        matches!(
            self,
            Self::Barrier
                | Self::MemoryBarrier
                | Self::WorkgroupMemoryBarrier
                | Self::EmitVertex
                | Self::EndPrimitive
                | Self::SetMeshOutputCounts
                | Self::EmitMeshTasks
                | Self::TraceRay
                | Self::ExecuteCallable
                | Self::IgnoreIntersection
                | Self::TerminateRay
        )
    }
}

/// Operations on storage images.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum ImageAccess {
    Size,
    Samples,
    Load,
    Store,
}

/// Operations on combined image samplers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum CombinedImageAccess {
    Sample,
    SampleLod,
    SampleOffset,
    SampleCmp,
    Fetch,
    Gather,
    QuerySize,
    QueryLod,
}

/// An expression node: kind tag, result type, operands.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub struct Expr {
    pub ty: Handle<Type>,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub enum ExprKind {
    Literal(Literal),
    Ident(Handle<Variable>),
    /// Selection of a struct member by index.
    MemberSelect {
        base: Handle<Expr>,
        index: u32,
    },
    Swizzle {
        base: Handle<Expr>,
        components: Vec<SwizzleComponent>,
    },
    /// Array (or vector/matrix column) element access.
    Index {
        base: Handle<Expr>,
        index: Handle<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Handle<Expr>,
        right: Handle<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Handle<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Handle<Expr>,
        value: Handle<Expr>,
    },
    /// Conversion to the node's result type.
    Cast {
        expr: Handle<Expr>,
    },
    /// Ternary select.
    Question {
        condition: Handle<Expr>,
        accept: Handle<Expr>,
        reject: Handle<Expr>,
    },
    /// Braced aggregate initialisation of an (optional) named target.
    AggrInit {
        target: Option<Handle<Expr>>,
        initializers: Vec<Handle<Expr>>,
    },
    /// Construction of a vector/matrix/struct value from components.
    CompositeConstruct {
        components: Vec<Handle<Expr>>,
    },
    /// Declaration-with-initialiser; `target` is always an identifier.
    Init {
        target: Handle<Expr>,
        value: Handle<Expr>,
    },
    Call {
        function: Handle<Variable>,
        arguments: Vec<Handle<Expr>>,
    },
    IntrinsicCall {
        intrinsic: Intrinsic,
        arguments: Vec<Handle<Expr>>,
    },
    ImageAccess {
        access: ImageAccess,
        image: Handle<Expr>,
        arguments: Vec<Handle<Expr>>,
    },
    CombinedImageAccess {
        access: CombinedImageAccess,
        image: Handle<Expr>,
        arguments: Vec<Handle<Expr>>,
    },
    /// The scrutinee of a switch statement.
    SwitchTest {
        value: Handle<Expr>,
    },
    /// A case label; the operand is a literal expression.
    SwitchCase {
        label: Handle<Expr>,
    },
    /// Value copy, used to materialise argument passing.
    Copy {
        operand: Handle<Expr>,
    },
    /// Geometry-stage vertex stream append.
    StreamAppend {
        operand: Handle<Expr>,
    },
    /// Placeholder carrying only a type.
    Dummy,
}

impl ExprKind {
    /// Collect the operand handles of this node, in evaluation order.
    pub fn operands(&self) -> Vec<Handle<Expr>> {
        match *self {
            ExprKind::Literal(_) | ExprKind::Ident(_) | ExprKind::Dummy => vec![],
            ExprKind::MemberSelect { base, .. } | ExprKind::Swizzle { base, .. } => vec![base],
            ExprKind::Index { base, index } => vec![base, index],
            ExprKind::Binary { left, right, .. } => vec![left, right],
            ExprKind::Unary { expr, .. } | ExprKind::Cast { expr } => vec![expr],
            ExprKind::Assign { target, value, .. } | ExprKind::Init { target, value } => {
                vec![target, value]
            }
            ExprKind::Question {
                condition,
                accept,
                reject,
            } => vec![condition, accept, reject],
            ExprKind::AggrInit {
                target,
                ref initializers,
            } => {
                let mut ops: Vec<_> = target.into_iter().collect();
                ops.extend_from_slice(initializers);
                ops
            }
            ExprKind::CompositeConstruct { ref components } => components.clone(),
            ExprKind::Call { ref arguments, .. }
            | ExprKind::IntrinsicCall { ref arguments, .. } => arguments.clone(),
            ExprKind::ImageAccess {
                image,
                ref arguments,
                ..
            }
            | ExprKind::CombinedImageAccess {
                image,
                ref arguments,
                ..
            } => {
                let mut ops = vec![image];
                ops.extend_from_slice(arguments);
                ops
            }
            ExprKind::SwitchTest { value } => vec![value],
            ExprKind::SwitchCase { label } => vec![label],
            ExprKind::Copy { operand } | ExprKind::StreamAppend { operand } => vec![operand],
        }
    }
}
