/*!
Backend functions that export shaders into binary and text formats.
*/
#![allow(dead_code)] // can be dead if none of the enabled backends need it

#[cfg(feature = "glsl-out")]
pub mod glsl;
#[cfg(feature = "hlsl-out")]
pub mod hlsl;
#[cfg(feature = "spv-out")]
pub mod spv;

use crate::arena::{Arena, Handle};
use crate::ir::{AssignOp, BinaryOp, Expr, UnaryOp};
use crate::FastHashMap;

/// Names of vector components.
pub const COMPONENTS: &[char] = &['x', 'y', 'z', 'w'];
/// Indent for backends.
pub const INDENT: &str = "    ";

/// Macro expansions the front-end populated before adaptation.
///
/// Owns the arena its expansion expressions live in, so a context can outlive
/// the shader that seeded it.
#[derive(Debug, Default)]
pub struct PreprocContext {
    pub exprs: Arena<Expr>,
    pub defines: FastHashMap<String, Handle<Expr>>,
}

/// Indentation level.
#[derive(Clone, Copy)]
pub struct Level(pub usize);

impl Level {
    pub const fn next(&self) -> Self {
        Level(self.0 + 1)
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        (0..self.0).try_for_each(|_| formatter.write_str(INDENT))
    }
}

/// Helper function that returns the string corresponding to the [`BinaryOp`].
pub const fn binary_operation_str(op: BinaryOp) -> &'static str {
    use BinaryOp as Bo;
    match op {
        Bo::Add => "+",
        Bo::Subtract => "-",
        Bo::Multiply => "*",
        Bo::Divide => "/",
        Bo::Modulo => "%",
        Bo::Equal => "==",
        Bo::NotEqual => "!=",
        Bo::Less => "<",
        Bo::LessEqual => "<=",
        Bo::Greater => ">",
        Bo::GreaterEqual => ">=",
        Bo::BitAnd => "&",
        Bo::BitXor => "^",
        Bo::BitOr => "|",
        Bo::LogicalAnd => "&&",
        Bo::LogicalOr => "||",
        Bo::ShiftLeft => "<<",
        Bo::ShiftRight => ">>",
    }
}

/// Helper function that returns the string corresponding to the [`AssignOp`].
pub const fn assign_operation_str(op: AssignOp) -> &'static str {
    use AssignOp as Ao;
    match op {
        Ao::Assign => "=",
        Ao::Add => "+=",
        Ao::Subtract => "-=",
        Ao::Multiply => "*=",
        Ao::Divide => "/=",
        Ao::Modulo => "%=",
        Ao::BitAnd => "&=",
        Ao::BitOr => "|=",
        Ao::BitXor => "^=",
        Ao::ShiftLeft => "<<=",
        Ao::ShiftRight => ">>=",
    }
}

/// The prefix spelling of a unary operator; postfix forms return `None`.
pub const fn unary_operation_str(op: UnaryOp) -> Option<&'static str> {
    use UnaryOp as Uo;
    match op {
        Uo::Plus => Some("+"),
        Uo::Negate => Some("-"),
        Uo::LogicalNot => Some("!"),
        Uo::BitNot => Some("~"),
        Uo::PreIncrement => Some("++"),
        Uo::PreDecrement => Some("--"),
        Uo::PostIncrement | Uo::PostDecrement => None,
    }
}

/// The postfix spelling of a unary operator, when it has one.
pub const fn unary_postfix_str(op: UnaryOp) -> Option<&'static str> {
    use UnaryOp as Uo;
    match op {
        Uo::PostIncrement => Some("++"),
        Uo::PostDecrement => Some("--"),
        _ => None,
    }
}

/// Helper function that returns the string corresponding to the
/// [`VectorSize`](crate::ty::VectorSize).
pub const fn vector_size_str(size: crate::ty::VectorSize) -> &'static str {
    match size {
        crate::ty::VectorSize::Bi => "2",
        crate::ty::VectorSize::Tri => "3",
        crate::ty::VectorSize::Quad => "4",
    }
}
