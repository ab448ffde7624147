/*! Double-dispatch walkers over the IR.

[`ExprVisitor`] and [`StmtVisitor`] have one method per node kind with no-op
defaults, so a pass only overrides what it needs; the [`walk_expr`] and
[`walk_stmt`] drivers dispatch on the kind tag and recurse into children.
Scanning passes (the GLSL feature pre-scan, the SPIR-V config filler) are
implemented on top of these; rebuilding transforms use their own rewriters.
*/

use crate::arena::{Arena, Handle};
use crate::ir::{
    expr::{CombinedImageAccess, ImageAccess, Intrinsic},
    AssignOp, BinaryOp, Expr, ExprKind, Literal, Stmt, UnaryOp, Variable,
};

pub trait ExprVisitor {
    /// Called for every node before its kind method; return `false` to skip
    /// the node and its children.
    fn pre_expr(&mut self, _expr: Handle<Expr>) -> bool {
        true
    }

    fn visit_literal(&mut self, _expr: Handle<Expr>, _value: &Literal) {}
    fn visit_ident(&mut self, _expr: Handle<Expr>, _var: Handle<Variable>) {}
    fn visit_member_select(&mut self, _expr: Handle<Expr>, _index: u32) {}
    fn visit_swizzle(&mut self, _expr: Handle<Expr>) {}
    fn visit_index(&mut self, _expr: Handle<Expr>) {}
    fn visit_binary(&mut self, _expr: Handle<Expr>, _op: BinaryOp) {}
    fn visit_unary(&mut self, _expr: Handle<Expr>, _op: UnaryOp) {}
    fn visit_assign(&mut self, _expr: Handle<Expr>, _op: AssignOp) {}
    fn visit_cast(&mut self, _expr: Handle<Expr>) {}
    fn visit_question(&mut self, _expr: Handle<Expr>) {}
    fn visit_aggr_init(&mut self, _expr: Handle<Expr>) {}
    fn visit_composite_construct(&mut self, _expr: Handle<Expr>) {}
    fn visit_init(&mut self, _expr: Handle<Expr>) {}
    fn visit_call(&mut self, _expr: Handle<Expr>, _function: Handle<Variable>) {}
    fn visit_intrinsic_call(&mut self, _expr: Handle<Expr>, _intrinsic: Intrinsic) {}
    fn visit_image_access(&mut self, _expr: Handle<Expr>, _access: ImageAccess) {}
    fn visit_combined_image_access(&mut self, _expr: Handle<Expr>, _access: CombinedImageAccess) {}
    fn visit_switch_test(&mut self, _expr: Handle<Expr>) {}
    fn visit_switch_case(&mut self, _expr: Handle<Expr>) {}
    fn visit_copy(&mut self, _expr: Handle<Expr>) {}
    fn visit_stream_append(&mut self, _expr: Handle<Expr>) {}
    fn visit_dummy(&mut self, _expr: Handle<Expr>) {}
}

/// Dispatch `expr` to `visitor` and recurse into its operands.
pub fn walk_expr<V: ExprVisitor + ?Sized>(
    visitor: &mut V,
    exprs: &Arena<Expr>,
    expr: Handle<Expr>,
) {
    if !visitor.pre_expr(expr) {
        return;
    }
    match exprs[expr].kind {
        ExprKind::Literal(ref value) => visitor.visit_literal(expr, value),
        ExprKind::Ident(var) => visitor.visit_ident(expr, var),
        ExprKind::MemberSelect { index, .. } => visitor.visit_member_select(expr, index),
        ExprKind::Swizzle { .. } => visitor.visit_swizzle(expr),
        ExprKind::Index { .. } => visitor.visit_index(expr),
        ExprKind::Binary { op, .. } => visitor.visit_binary(expr, op),
        ExprKind::Unary { op, .. } => visitor.visit_unary(expr, op),
        ExprKind::Assign { op, .. } => visitor.visit_assign(expr, op),
        ExprKind::Cast { .. } => visitor.visit_cast(expr),
        ExprKind::Question { .. } => visitor.visit_question(expr),
        ExprKind::AggrInit { .. } => visitor.visit_aggr_init(expr),
        ExprKind::CompositeConstruct { .. } => visitor.visit_composite_construct(expr),
        ExprKind::Init { .. } => visitor.visit_init(expr),
        ExprKind::Call { function, .. } => visitor.visit_call(expr, function),
        ExprKind::IntrinsicCall { intrinsic, .. } => visitor.visit_intrinsic_call(expr, intrinsic),
        ExprKind::ImageAccess { access, .. } => visitor.visit_image_access(expr, access),
        ExprKind::CombinedImageAccess { access, .. } => {
            visitor.visit_combined_image_access(expr, access)
        }
        ExprKind::SwitchTest { .. } => visitor.visit_switch_test(expr),
        ExprKind::SwitchCase { .. } => visitor.visit_switch_case(expr),
        ExprKind::Copy { .. } => visitor.visit_copy(expr),
        ExprKind::StreamAppend { .. } => visitor.visit_stream_append(expr),
        ExprKind::Dummy => visitor.visit_dummy(expr),
    }
    for operand in exprs[expr].kind.operands() {
        walk_expr(visitor, exprs, operand);
    }
}

pub trait StmtVisitor {
    /// Called for every statement before its kind method; return `false` to
    /// skip the node and its children.
    fn pre_stmt(&mut self, _stmt: Handle<Stmt>) -> bool {
        true
    }

    fn visit_container(&mut self, _stmt: Handle<Stmt>) {}
    fn visit_compound(&mut self, _stmt: Handle<Stmt>) {}
    fn visit_simple(&mut self, _stmt: Handle<Stmt>, _expr: Handle<Expr>) {}
    fn visit_variable_decl(&mut self, _stmt: Handle<Stmt>, _var: Handle<Variable>) {}
    fn visit_in_out_variable_decl(&mut self, _stmt: Handle<Stmt>, _var: Handle<Variable>) {}
    fn visit_sampler_decl(&mut self, _stmt: Handle<Stmt>, _var: Handle<Variable>) {}
    fn visit_image_decl(&mut self, _stmt: Handle<Stmt>, _var: Handle<Variable>) {}
    fn visit_sampled_image_decl(&mut self, _stmt: Handle<Stmt>, _var: Handle<Variable>) {}
    fn visit_combined_image_decl(&mut self, _stmt: Handle<Stmt>, _var: Handle<Variable>) {}
    fn visit_shader_buffer_decl(&mut self, _stmt: Handle<Stmt>, _var: Handle<Variable>) {}
    fn visit_constant_buffer_decl(&mut self, _stmt: Handle<Stmt>, _var: Handle<Variable>) {}
    fn visit_push_constants_buffer_decl(&mut self, _stmt: Handle<Stmt>, _var: Handle<Variable>) {}
    fn visit_shader_struct_buffer_decl(&mut self, _stmt: Handle<Stmt>, _buffer: Handle<Variable>) {}
    fn visit_spec_constant_decl(&mut self, _stmt: Handle<Stmt>, _var: Handle<Variable>) {}
    fn visit_structure_decl(&mut self, _stmt: Handle<Stmt>) {}
    fn visit_function_decl(&mut self, _stmt: Handle<Stmt>, _var: Handle<Variable>) {}
    fn visit_return(&mut self, _stmt: Handle<Stmt>, _value: Option<Handle<Expr>>) {}
    fn visit_discard(&mut self, _stmt: Handle<Stmt>) {}
    fn visit_if(&mut self, _stmt: Handle<Stmt>) {}
    fn visit_switch(&mut self, _stmt: Handle<Stmt>) {}
    fn visit_for(&mut self, _stmt: Handle<Stmt>) {}
    fn visit_while(&mut self, _stmt: Handle<Stmt>) {}
    fn visit_do_while(&mut self, _stmt: Handle<Stmt>) {}
    fn visit_break(&mut self, _stmt: Handle<Stmt>) {}
    fn visit_continue(&mut self, _stmt: Handle<Stmt>) {}
    fn visit_per_vertex_decl(&mut self, _stmt: Handle<Stmt>) {}
    fn visit_input_compute_layout(&mut self, _stmt: Handle<Stmt>, _local_size: [u32; 3]) {}
    fn visit_input_geometry_layout(&mut self, _stmt: Handle<Stmt>) {}
    fn visit_output_geometry_layout(&mut self, _stmt: Handle<Stmt>) {}
    fn visit_in_out_ray_payload_decl(&mut self, _stmt: Handle<Stmt>, _var: Handle<Variable>) {}
    fn visit_preproc(&mut self, _stmt: Handle<Stmt>) {}
}

/// Dispatch `stmt` to `visitor` and recurse into child statements.
pub fn walk_stmt<V: StmtVisitor + ?Sized>(
    visitor: &mut V,
    stmts: &Arena<Stmt>,
    stmt: Handle<Stmt>,
) {
    if !visitor.pre_stmt(stmt) {
        return;
    }
    match stmts[stmt] {
        Stmt::Container(ref block) => {
            visitor.visit_container(stmt);
            for &child in block {
                walk_stmt(visitor, stmts, child);
            }
        }
        Stmt::Compound(ref block) => {
            visitor.visit_compound(stmt);
            for &child in block {
                walk_stmt(visitor, stmts, child);
            }
        }
        Stmt::Simple(expr) => visitor.visit_simple(stmt, expr),
        Stmt::VariableDecl { var } => visitor.visit_variable_decl(stmt, var),
        Stmt::InOutVariableDecl { var, .. } => visitor.visit_in_out_variable_decl(stmt, var),
        Stmt::SamplerDecl { var, .. } => visitor.visit_sampler_decl(stmt, var),
        Stmt::ImageDecl { var, .. } => visitor.visit_image_decl(stmt, var),
        Stmt::SampledImageDecl { var, .. } => visitor.visit_sampled_image_decl(stmt, var),
        Stmt::CombinedImageDecl { var, .. } => visitor.visit_combined_image_decl(stmt, var),
        Stmt::ShaderBufferDecl { var, .. } => visitor.visit_shader_buffer_decl(stmt, var),
        Stmt::ConstantBufferDecl { var, .. } => visitor.visit_constant_buffer_decl(stmt, var),
        Stmt::PushConstantsBufferDecl { var, .. } => {
            visitor.visit_push_constants_buffer_decl(stmt, var)
        }
        Stmt::ShaderStructBufferDecl { buffer, .. } => {
            visitor.visit_shader_struct_buffer_decl(stmt, buffer)
        }
        Stmt::SpecConstantDecl { var, .. } => visitor.visit_spec_constant_decl(stmt, var),
        Stmt::StructureDecl(_) => visitor.visit_structure_decl(stmt),
        Stmt::FunctionDecl { var, body, .. } => {
            visitor.visit_function_decl(stmt, var);
            walk_stmt(visitor, stmts, body);
        }
        Stmt::Return(value) => visitor.visit_return(stmt, value),
        Stmt::Discard => visitor.visit_discard(stmt),
        Stmt::If {
            then_body,
            ref else_ifs,
            else_body,
            ..
        } => {
            visitor.visit_if(stmt);
            walk_stmt(visitor, stmts, then_body);
            for else_if in else_ifs {
                walk_stmt(visitor, stmts, else_if.body);
            }
            if let Some(else_body) = else_body {
                walk_stmt(visitor, stmts, else_body);
            }
        }
        Stmt::Switch { ref cases, .. } => {
            visitor.visit_switch(stmt);
            for case in cases {
                walk_stmt(visitor, stmts, case.body);
            }
        }
        Stmt::For { body, .. } => {
            visitor.visit_for(stmt);
            walk_stmt(visitor, stmts, body);
        }
        Stmt::While { body, .. } => {
            visitor.visit_while(stmt);
            walk_stmt(visitor, stmts, body);
        }
        Stmt::DoWhile { body, .. } => {
            visitor.visit_do_while(stmt);
            walk_stmt(visitor, stmts, body);
        }
        Stmt::Break => visitor.visit_break(stmt),
        Stmt::Continue => visitor.visit_continue(stmt),
        Stmt::PerVertexDecl { .. } => visitor.visit_per_vertex_decl(stmt),
        Stmt::InputComputeLayout { local_size } => {
            visitor.visit_input_compute_layout(stmt, local_size)
        }
        Stmt::InputGeometryLayout { .. } => visitor.visit_input_geometry_layout(stmt),
        Stmt::OutputGeometryLayout { .. } => visitor.visit_output_geometry_layout(stmt),
        Stmt::InOutRayPayloadVariableDecl { var, .. } => {
            visitor.visit_in_out_ray_payload_decl(stmt, var)
        }
        Stmt::PreprocDefine { .. }
        | Stmt::PreprocIf { .. }
        | Stmt::PreprocIfDef { .. }
        | Stmt::PreprocElif { .. }
        | Stmt::PreprocElse
        | Stmt::PreprocEndif
        | Stmt::PreprocVersion { .. }
        | Stmt::PreprocExtension { .. } => visitor.visit_preproc(stmt),
    }
}

/// Walk every expression reachable from `stmt`, in evaluation order.
pub fn walk_stmt_exprs<V: ExprVisitor + ?Sized>(
    visitor: &mut V,
    stmts: &Arena<Stmt>,
    exprs: &Arena<Expr>,
    stmt: Handle<Stmt>,
) {
    match stmts[stmt] {
        Stmt::Container(ref block) | Stmt::Compound(ref block) => {
            for &child in block {
                walk_stmt_exprs(visitor, stmts, exprs, child);
            }
        }
        Stmt::Simple(expr) => walk_expr(visitor, exprs, expr),
        Stmt::Return(Some(value)) => walk_expr(visitor, exprs, value),
        Stmt::If {
            condition,
            then_body,
            ref else_ifs,
            else_body,
        } => {
            walk_expr(visitor, exprs, condition);
            walk_stmt_exprs(visitor, stmts, exprs, then_body);
            for else_if in else_ifs {
                walk_expr(visitor, exprs, else_if.condition);
                walk_stmt_exprs(visitor, stmts, exprs, else_if.body);
            }
            if let Some(else_body) = else_body {
                walk_stmt_exprs(visitor, stmts, exprs, else_body);
            }
        }
        Stmt::Switch { test, ref cases } => {
            walk_expr(visitor, exprs, test);
            for case in cases {
                if let Some(label) = case.label {
                    walk_expr(visitor, exprs, label);
                }
                walk_stmt_exprs(visitor, stmts, exprs, case.body);
            }
        }
        Stmt::For {
            init,
            condition,
            increment,
            body,
        } => {
            walk_expr(visitor, exprs, init);
            walk_expr(visitor, exprs, condition);
            walk_expr(visitor, exprs, increment);
            walk_stmt_exprs(visitor, stmts, exprs, body);
        }
        Stmt::While { condition, body } | Stmt::DoWhile { condition, body } => {
            walk_expr(visitor, exprs, condition);
            walk_stmt_exprs(visitor, stmts, exprs, body);
        }
        Stmt::FunctionDecl { body, .. } => {
            walk_stmt_exprs(visitor, stmts, exprs, body);
        }
        Stmt::SpecConstantDecl { value, .. } => walk_expr(visitor, exprs, value),
        Stmt::PreprocDefine { expr, .. } => walk_expr(visitor, exprs, expr),
        Stmt::PreprocIf { condition } | Stmt::PreprocElif { condition } => {
            walk_expr(visitor, exprs, condition)
        }
        _ => {}
    }
}
