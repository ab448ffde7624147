/*! Construction of the IR tree.

[`ShaderBuilder`] is the single entry point the DSL surface talks to: it owns
the scope stack, allocates variables with fresh ids, inserts statements into
the currently active container and frames flow-control constructs
(`begin_if`/`end_if`, `begin_switch`/`end_switch`).

Scope frames inherit every variable visible in the enclosing chain, so name
lookup is a single-frame search. Flow framing follows a strict state machine;
calls out of order surface as [`Error`] values.
*/

use crate::arena::Handle;
use crate::ir::{
    Expr, ExprKind, IoInfo, Literal, ResourceInfo, Shader, SpecConstantInfo, Stmt, Variable,
    VarFlags,
};
use crate::ty::{ImageDim, ScalarKind, StructDef, Type, TypeInner};
use crate::{BuiltIn, EntryPoint, FastIndexMap, ShaderStage};

/// Invariant violations of the builder registry or flow framing.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    #[error("no registered variable with the name [{0}]")]
    UnknownVariable(String),
    #[error("no registered function with the name [{0}]")]
    UnknownFunction(String),
    #[error("no registered member variable with the name [{0}]")]
    UnknownMember(String),
    #[error("a function with the name [{0}] is already registered, with a different type")]
    DuplicateFunction(String),
    #[error("a static constant with the name [{0}] is already registered, with a different type")]
    DuplicateConstant(String),
    #[error("{0} called without a matching begin")]
    UnbalancedFlow(&'static str),
    #[error("case label outside of an open switch")]
    CaseOutsideSwitch,
    #[error("else branch after an else branch")]
    ElseAfterElse,
}

#[derive(Debug)]
struct Frame {
    registered: FastIndexMap<String, Handle<Variable>>,
    container: Handle<Stmt>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IfState {
    ThenOpen,
    ElseIfOpen,
    ElseOpen,
}

#[derive(Debug)]
struct IfFrame {
    stmt: Handle<Stmt>,
    state: IfState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SwitchState {
    SwitchOpen,
    CaseOpen,
    DefaultOpen,
}

#[derive(Debug)]
struct SwitchFrame {
    stmt: Handle<Stmt>,
    state: SwitchState,
}

/// Scoped symbol table and statement insertion point of a [`Shader`].
pub struct ShaderBuilder<'a> {
    shader: &'a mut Shader,
    frames: Vec<Frame>,
    /// Containers opened by `push_scope` and not yet appended.
    staged: Vec<Handle<Stmt>>,
    if_stack: Vec<IfFrame>,
    switch_stack: Vec<SwitchFrame>,
    ignore_next: bool,
    saved_stmt: Option<Handle<Stmt>>,
}

impl<'a> ShaderBuilder<'a> {
    pub fn new(shader: &'a mut Shader) -> Self {
        let root = shader.root();
        let mut builder = ShaderBuilder {
            shader,
            frames: Vec::new(),
            staged: Vec::new(),
            if_stack: Vec::new(),
            switch_stack: Vec::new(),
            ignore_next: false,
            saved_stmt: None,
        };
        builder.push(root, Vec::new());
        builder
    }

    pub fn shader(&self) -> &Shader {
        self.shader
    }

    pub fn shader_mut(&mut self) -> &mut Shader {
        self.shader
    }

    pub fn stage(&self) -> ShaderStage {
        self.shader.stage()
    }

    /// Current scope depth; used by tests to check frame balance.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Open a scope writing into `container`.
    ///
    /// `vars_to_move` belong to the new inner scope and are removed from the
    /// enclosing frame. The new frame inherits every variable visible in the
    /// enclosing chain, so lookup never has to walk outward.
    pub fn push(&mut self, container: Handle<Stmt>, vars_to_move: Vec<Handle<Variable>>) {
        let mut registered = match self.frames.last() {
            Some(frame) => frame.registered.clone(),
            None => FastIndexMap::default(),
        };
        if let Some(enclosing) = self.frames.last_mut() {
            for var in vars_to_move {
                let name = self.shader.variables[var].name.clone();
                enclosing.registered.shift_remove(&name);
                registered.insert(name, var);
            }
        }
        self.frames.push(Frame {
            registered,
            container,
        });
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Allocate a fresh container, open it, and stage it so the matching
    /// [`pop_scope`](Self::pop_scope) appends it to the enclosing container.
    pub fn push_scope(&mut self) {
        let container = self.shader.add_stmt(Stmt::Container(Vec::new()));
        self.staged.push(container);
        self.push(container, Vec::new());
    }

    /// Close the innermost staged scope and emit its container.
    pub fn pop_scope(&mut self) -> Result<(), Error> {
        self.pop();
        let container = self
            .staged
            .pop()
            .ok_or(Error::UnbalancedFlow("pop_scope"))?;
        self.append_stmt(container);
        Ok(())
    }

    /// Arm the one-shot capture: the next simple statement passed to
    /// [`add_stmt`](Self::add_stmt) is saved instead of emitted.
    pub fn save_next_expr(&mut self) {
        debug_assert!(self.saved_stmt.is_none());
        self.ignore_next = true;
    }

    /// Retrieve the captured expression, or `placeholder` if nothing was
    /// captured. Disarms the capture either way.
    pub fn load_expr(&mut self, placeholder: Handle<Expr>) -> Handle<Expr> {
        if let Some(stmt) = self.saved_stmt.take() {
            let Stmt::Simple(expr) = self.shader.stmts[stmt] else {
                unreachable!("only simple statements are captured");
            };
            return self.clone_expr(expr);
        }
        self.ignore_next = false;
        placeholder
    }

    /// Deep copy of an expression into fresh nodes.
    pub fn clone_expr(&mut self, expr: Handle<Expr>) -> Handle<Expr> {
        let Expr { ty, ref kind } = self.shader.exprs[expr];
        let kind = kind.clone();
        let kind = match kind {
            ExprKind::Literal(_) | ExprKind::Ident(_) | ExprKind::Dummy => kind,
            ExprKind::MemberSelect { base, index } => {
                let base = self.clone_expr(base);
                ExprKind::MemberSelect { base, index }
            }
            ExprKind::Swizzle { base, components } => {
                let base = self.clone_expr(base);
                ExprKind::Swizzle { base, components }
            }
            ExprKind::Index { base, index } => {
                let base = self.clone_expr(base);
                let index = self.clone_expr(index);
                ExprKind::Index { base, index }
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.clone_expr(left);
                let right = self.clone_expr(right);
                ExprKind::Binary { op, left, right }
            }
            ExprKind::Unary { op, expr } => {
                let expr = self.clone_expr(expr);
                ExprKind::Unary { op, expr }
            }
            ExprKind::Assign { op, target, value } => {
                let target = self.clone_expr(target);
                let value = self.clone_expr(value);
                ExprKind::Assign { op, target, value }
            }
            ExprKind::Cast { expr } => {
                let expr = self.clone_expr(expr);
                ExprKind::Cast { expr }
            }
            ExprKind::Question {
                condition,
                accept,
                reject,
            } => {
                let condition = self.clone_expr(condition);
                let accept = self.clone_expr(accept);
                let reject = self.clone_expr(reject);
                ExprKind::Question {
                    condition,
                    accept,
                    reject,
                }
            }
            ExprKind::AggrInit {
                target,
                initializers,
            } => {
                let target = target.map(|t| self.clone_expr(t));
                let initializers = initializers
                    .into_iter()
                    .map(|init| self.clone_expr(init))
                    .collect();
                ExprKind::AggrInit {
                    target,
                    initializers,
                }
            }
            ExprKind::CompositeConstruct { components } => {
                let components = components
                    .into_iter()
                    .map(|component| self.clone_expr(component))
                    .collect();
                ExprKind::CompositeConstruct { components }
            }
            ExprKind::Init { target, value } => {
                let target = self.clone_expr(target);
                let value = self.clone_expr(value);
                ExprKind::Init { target, value }
            }
            ExprKind::Call {
                function,
                arguments,
            } => {
                let arguments = arguments.into_iter().map(|a| self.clone_expr(a)).collect();
                ExprKind::Call {
                    function,
                    arguments,
                }
            }
            ExprKind::IntrinsicCall {
                intrinsic,
                arguments,
            } => {
                let arguments = arguments.into_iter().map(|a| self.clone_expr(a)).collect();
                ExprKind::IntrinsicCall {
                    intrinsic,
                    arguments,
                }
            }
            ExprKind::ImageAccess {
                access,
                image,
                arguments,
            } => {
                let image = self.clone_expr(image);
                let arguments = arguments.into_iter().map(|a| self.clone_expr(a)).collect();
                ExprKind::ImageAccess {
                    access,
                    image,
                    arguments,
                }
            }
            ExprKind::CombinedImageAccess {
                access,
                image,
                arguments,
            } => {
                let image = self.clone_expr(image);
                let arguments = arguments.into_iter().map(|a| self.clone_expr(a)).collect();
                ExprKind::CombinedImageAccess {
                    access,
                    image,
                    arguments,
                }
            }
            ExprKind::SwitchTest { value } => {
                let value = self.clone_expr(value);
                ExprKind::SwitchTest { value }
            }
            ExprKind::SwitchCase { label } => {
                let label = self.clone_expr(label);
                ExprKind::SwitchCase { label }
            }
            ExprKind::Copy { operand } => {
                let operand = self.clone_expr(operand);
                ExprKind::Copy { operand }
            }
            ExprKind::StreamAppend { operand } => {
                let operand = self.clone_expr(operand);
                ExprKind::StreamAppend { operand }
            }
        };
        self.shader.add_expr(ty, kind)
    }

    fn append_stmt(&mut self, stmt: Handle<Stmt>) {
        let container = self.frames.last().expect("scope stack is empty").container;
        self.shader.stmts[container]
            .block_mut()
            .expect("scope container is not a container")
            .push(stmt);
    }

    /// Append `stmt` to the top container, or capture it if
    /// [`save_next_expr`](Self::save_next_expr) armed the one-shot slot.
    pub fn add_stmt(&mut self, stmt: Handle<Stmt>) {
        if self.ignore_next {
            if matches!(self.shader.stmts[stmt], Stmt::Simple(_)) {
                self.saved_stmt = Some(stmt);
            }
            self.ignore_next = false;
        } else {
            self.append_stmt(stmt);
        }
    }

    /// Append `stmt` to the bottom (global) container.
    pub fn add_global_stmt(&mut self, stmt: Handle<Stmt>) {
        if self.ignore_next {
            if matches!(self.shader.stmts[stmt], Stmt::Simple(_)) {
                self.saved_stmt = Some(stmt);
            }
            self.ignore_next = false;
        } else {
            let container = self.frames.first().expect("scope stack is empty").container;
            self.shader.stmts[container]
                .block_mut()
                .expect("root is not a container")
                .push(stmt);
        }
    }

    //
    // Flow-control framing.
    //

    /// Open an `if` and its then-body scope.
    pub fn begin_if(&mut self, condition: Handle<Expr>) {
        let then_body = self.shader.add_stmt(Stmt::Container(Vec::new()));
        let stmt = self.shader.add_stmt(Stmt::If {
            condition,
            then_body,
            else_ifs: Vec::new(),
            else_body: None,
        });
        self.if_stack.push(IfFrame {
            stmt,
            state: IfState::ThenOpen,
        });
        self.push(then_body, Vec::new());
    }

    /// Close the current branch and open an `else if` branch body.
    pub fn begin_else_if(&mut self, condition: Handle<Expr>) -> Result<(), Error> {
        let top = self
            .if_stack
            .last_mut()
            .ok_or(Error::UnbalancedFlow("begin_else_if"))?;
        if top.state == IfState::ElseOpen {
            return Err(Error::ElseAfterElse);
        }
        top.state = IfState::ElseIfOpen;
        let stmt = top.stmt;
        self.pop();
        let body = self.shader.add_stmt(Stmt::Container(Vec::new()));
        match self.shader.stmts[stmt] {
            Stmt::If {
                ref mut else_ifs, ..
            } => else_ifs.push(crate::ir::ElseIf { condition, body }),
            _ => unreachable!("if stack holds a non-if statement"),
        }
        self.push(body, Vec::new());
        Ok(())
    }

    /// Close the current branch and open the `else` branch body.
    pub fn begin_else(&mut self) -> Result<(), Error> {
        let top = self
            .if_stack
            .last_mut()
            .ok_or(Error::UnbalancedFlow("begin_else"))?;
        if top.state == IfState::ElseOpen {
            return Err(Error::ElseAfterElse);
        }
        top.state = IfState::ElseOpen;
        let stmt = top.stmt;
        self.pop();
        let body = self.shader.add_stmt(Stmt::Container(Vec::new()));
        match self.shader.stmts[stmt] {
            Stmt::If {
                ref mut else_body, ..
            } => *else_body = Some(body),
            _ => unreachable!("if stack holds a non-if statement"),
        }
        self.push(body, Vec::new());
        Ok(())
    }

    /// Close the whole `if` construct and emit it.
    pub fn end_if(&mut self) -> Result<(), Error> {
        let frame = self
            .if_stack
            .pop()
            .ok_or(Error::UnbalancedFlow("end_if"))?;
        self.pop();
        self.append_stmt(frame.stmt);
        Ok(())
    }

    /// Open a `switch` over `value`.
    pub fn begin_switch(&mut self, value: Handle<Expr>) {
        let ty = self.shader.exprs[value].ty;
        let test = self.shader.add_expr(ty, ExprKind::SwitchTest { value });
        let stmt = self.shader.add_stmt(Stmt::Switch {
            test,
            cases: Vec::new(),
        });
        self.switch_stack.push(SwitchFrame {
            stmt,
            state: SwitchState::SwitchOpen,
        });
    }

    /// Open a `case` arm labelled by `literal`.
    pub fn begin_case(&mut self, literal: Literal) -> Result<(), Error> {
        let (stmt, state) = match self.switch_stack.last() {
            Some(frame) => (frame.stmt, frame.state),
            None => return Err(Error::CaseOutsideSwitch),
        };
        if state != SwitchState::SwitchOpen {
            self.pop();
        }
        let scalar = literal.scalar();
        let label_ty = self.shader.types.get_scalar(scalar);
        let label = self
            .shader
            .add_expr(label_ty, ExprKind::Literal(literal));
        let label = self
            .shader
            .add_expr(label_ty, ExprKind::SwitchCase { label });
        let body = self.shader.add_stmt(Stmt::Container(Vec::new()));
        match self.shader.stmts[stmt] {
            Stmt::Switch { ref mut cases, .. } => cases.push(crate::ir::SwitchCase {
                label: Some(label),
                body,
            }),
            _ => unreachable!("switch stack holds a non-switch statement"),
        }
        self.switch_stack.last_mut().unwrap().state = SwitchState::CaseOpen;
        self.push(body, Vec::new());
        Ok(())
    }

    /// Open the `default` arm.
    pub fn begin_default(&mut self) -> Result<(), Error> {
        let (stmt, state) = match self.switch_stack.last() {
            Some(frame) => (frame.stmt, frame.state),
            None => return Err(Error::CaseOutsideSwitch),
        };
        if state != SwitchState::SwitchOpen {
            self.pop();
        }
        let body = self.shader.add_stmt(Stmt::Container(Vec::new()));
        match self.shader.stmts[stmt] {
            Stmt::Switch { ref mut cases, .. } => {
                cases.push(crate::ir::SwitchCase { label: None, body })
            }
            _ => unreachable!("switch stack holds a non-switch statement"),
        }
        self.switch_stack.last_mut().unwrap().state = SwitchState::DefaultOpen;
        self.push(body, Vec::new());
        Ok(())
    }

    /// Close the whole `switch` construct and emit it.
    pub fn end_switch(&mut self) -> Result<(), Error> {
        let frame = self
            .switch_stack
            .pop()
            .ok_or(Error::UnbalancedFlow("end_switch"))?;
        if frame.state != SwitchState::SwitchOpen {
            self.pop();
        }
        self.append_stmt(frame.stmt);
        Ok(())
    }

    //
    // Registration.
    //

    /// Allocate the next variable id.
    pub fn next_var_id(&mut self) -> u32 {
        self.shader.data.next_var_id += 1;
        self.shader.data.next_var_id
    }

    fn register_variable(&mut self, var: Handle<Variable>, global: bool) {
        let name = self.shader.variables[var].name.clone();
        let frame = if global {
            self.frames.first_mut()
        } else {
            self.frames.last_mut()
        };
        frame
            .expect("scope stack is empty")
            .registered
            .insert(name, var);
        if let TypeInner::TessControlInput { input_vertices, .. } =
            *self.shader.types.lookup(self.shader.variables[var].ty)
        {
            self.shader.data.tessellation_control_points = input_vertices;
        }
    }

    fn make_variable(
        &mut self,
        name: String,
        ty: Handle<Type>,
        flags: VarFlags,
        outer: Option<Handle<Variable>>,
        builtin: Option<BuiltIn>,
    ) -> Handle<Variable> {
        let id = self.next_var_id();
        self.shader.variables.append(Variable {
            id,
            name,
            ty,
            flags,
            outer,
            builtin,
        })
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.frames
            .first()
            .is_some_and(|frame| frame.registered.contains_key(name))
    }

    pub fn get_function(&self, name: &str) -> Result<Handle<Variable>, Error> {
        self.frames
            .first()
            .and_then(|frame| frame.registered.get(name).copied())
            .ok_or_else(|| Error::UnknownFunction(name.to_string()))
    }

    /// Register a function symbol with a function type.
    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        ty: Handle<Type>,
    ) -> Result<Handle<Variable>, Error> {
        let name = name.into();
        if let Some(existing) = self
            .frames
            .first()
            .and_then(|frame| frame.registered.get(&name).copied())
        {
            if self.shader.variables[existing].ty != ty {
                return Err(Error::DuplicateFunction(name));
            }
        }
        let var = self.make_variable(name, ty, VarFlags::empty(), None, None);
        self.register_variable(var, true);
        Ok(var)
    }

    /// Register a variable in the current scope.
    pub fn register_name(
        &mut self,
        name: impl Into<String>,
        ty: Handle<Type>,
        flags: VarFlags,
    ) -> Handle<Variable> {
        let var = self.make_variable(name.into(), ty, flags, None, None);
        self.register_variable(var, false);
        var
    }

    /// Register a member variable of `outer`.
    pub fn register_member(
        &mut self,
        outer: Handle<Variable>,
        name: impl Into<String>,
        ty: Handle<Type>,
        flags: VarFlags,
    ) -> Handle<Variable> {
        let mut flags = flags | VarFlags::MEMBER;
        if self.shader.variables[outer].is_uniform() {
            flags |= VarFlags::UNIFORM;
        }
        let var = self.make_variable(name.into(), ty, flags, Some(outer), None);
        self.register_variable(var, false);
        var
    }

    pub fn register_static_constant(
        &mut self,
        name: impl Into<String>,
        ty: Handle<Type>,
    ) -> Result<Handle<Variable>, Error> {
        let name = name.into();
        if let Some(existing) = self
            .frames
            .first()
            .and_then(|frame| frame.registered.get(&name).copied())
        {
            if self.shader.variables[existing].ty != ty {
                return Err(Error::DuplicateConstant(name));
            }
            return Ok(existing);
        }
        let var = self.make_variable(
            name.clone(),
            ty,
            VarFlags::STATIC | VarFlags::CONSTANT,
            None,
            None,
        );
        self.register_variable(var, true);
        self.shader.data.constants.insert(name, ty);
        Ok(var)
    }

    pub fn register_spec_constant(
        &mut self,
        name: impl Into<String>,
        location: u32,
        ty: Handle<Type>,
    ) -> Handle<Variable> {
        let name = name.into();
        let var = self.register_name(name.clone(), ty, VarFlags::SPEC_CONSTANT);
        self.shader
            .data
            .spec_constants
            .insert(name, SpecConstantInfo { ty, location });
        var
    }

    pub fn register_acceleration_structure(
        &mut self,
        name: impl Into<String>,
        ty: Handle<Type>,
        binding: u32,
        set: u32,
        enabled: bool,
    ) -> Handle<Variable> {
        let var = self.register_name(name, ty, VarFlags::UNIFORM | VarFlags::CONSTANT);
        if enabled {
            self.shader.data.acceleration_struct = Some(ResourceInfo { ty, binding, set });
        }
        var
    }

    pub fn register_sampler(
        &mut self,
        name: impl Into<String>,
        ty: Handle<Type>,
        binding: u32,
        set: u32,
        enabled: bool,
    ) -> Handle<Variable> {
        let name = name.into();
        let var = self.register_name(
            name.clone(),
            ty,
            VarFlags::UNIFORM | VarFlags::CONSTANT | VarFlags::SAMPLER,
        );
        if enabled {
            self.shader
                .data
                .samplers
                .insert(name, ResourceInfo { ty, binding, set });
        }
        var
    }

    fn image_dim(&self, ty: Handle<Type>) -> Option<ImageDim> {
        let inner = self.shader.types.lookup(self.shader.types.non_array(ty));
        match *inner {
            TypeInner::Image(config)
            | TypeInner::SampledImage { config, .. }
            | TypeInner::CombinedImage { config, .. } => Some(config.dim),
            _ => None,
        }
    }

    pub fn register_sampled_image(
        &mut self,
        name: impl Into<String>,
        ty: Handle<Type>,
        binding: u32,
        set: u32,
        enabled: bool,
    ) -> Handle<Variable> {
        let name = name.into();
        let var = self.register_name(name.clone(), ty, VarFlags::UNIFORM | VarFlags::CONSTANT);
        if enabled {
            let info = ResourceInfo { ty, binding, set };
            if self.image_dim(ty) == Some(ImageDim::Buffer) {
                self.shader.data.uniform_texels.insert(name, info);
            } else {
                self.shader.data.sampled.insert(name, info);
            }
        }
        var
    }

    /// Register a combined image sampler.
    pub fn register_texture(
        &mut self,
        name: impl Into<String>,
        ty: Handle<Type>,
        binding: u32,
        set: u32,
        enabled: bool,
    ) -> Handle<Variable> {
        let name = name.into();
        let var = self.register_name(name.clone(), ty, VarFlags::UNIFORM | VarFlags::CONSTANT);
        if enabled {
            let info = ResourceInfo { ty, binding, set };
            if self.image_dim(ty) == Some(ImageDim::Buffer) {
                self.shader.data.uniform_texels.insert(name, info);
            } else {
                self.shader.data.textures.insert(name, info);
            }
        }
        var
    }

    /// Register a storage image.
    pub fn register_image(
        &mut self,
        name: impl Into<String>,
        ty: Handle<Type>,
        binding: u32,
        set: u32,
        enabled: bool,
    ) -> Handle<Variable> {
        let name = name.into();
        let var = self.register_name(name.clone(), ty, VarFlags::UNIFORM | VarFlags::CONSTANT);
        if enabled {
            let info = ResourceInfo { ty, binding, set };
            if self.image_dim(ty) == Some(ImageDim::Buffer) {
                self.shader.data.storage_texels.insert(name, info);
            } else {
                self.shader.data.images.insert(name, info);
            }
        }
        var
    }

    fn is_integer_kind(&self, ty: Handle<Type>) -> bool {
        let base = self.shader.types.non_array(ty);
        match *self.shader.types.lookup(base) {
            TypeInner::Scalar(scalar) | TypeInner::Vector { scalar, .. } => {
                matches!(scalar.kind, ScalarKind::Sint | ScalarKind::Uint)
            }
            _ => false,
        }
    }

    /// Register a stage input at `location`.
    ///
    /// The first registration wins a contested location; later ones are
    /// reported and ignored. Integer inputs outside the vertex, compute,
    /// mesh and ray-tracing stages become flat-interpolated implicitly.
    pub fn register_input(
        &mut self,
        entry: EntryPoint,
        name: impl Into<String>,
        location: u32,
        attributes: VarFlags,
        ty: Handle<Type>,
    ) -> Handle<Variable> {
        let name = name.into();
        let inputs = self.shader.data.inputs.entry(entry).or_default();
        if inputs.values().any(|info| info.location == location) {
            log::warn!(
                "input [{name}] reuses location {location} for {entry:?}; keeping the first registration"
            );
        } else {
            inputs.insert(name.clone(), IoInfo { ty, location });
        }
        if let Some(var) = self.find_var(&name) {
            return var;
        }
        let stage = self.stage();
        let mut flags = attributes;
        if stage != ShaderStage::Vertex
            && stage != ShaderStage::Compute
            && !stage.is_mesh()
            && !stage.is_ray_trace()
            && self.is_integer_kind(ty)
        {
            flags |= VarFlags::FLAT;
        }
        self.register_name(name, ty, flags | VarFlags::SHADER_INPUT)
    }

    /// Register a stage output at `location`. See [`register_input`](Self::register_input).
    pub fn register_output(
        &mut self,
        entry: EntryPoint,
        name: impl Into<String>,
        location: u32,
        attributes: VarFlags,
        ty: Handle<Type>,
    ) -> Handle<Variable> {
        let name = name.into();
        let outputs = self.shader.data.outputs.entry(entry).or_default();
        if outputs.values().any(|info| info.location == location) {
            log::warn!(
                "output [{name}] reuses location {location} for {entry:?}; keeping the first registration"
            );
        } else {
            outputs.insert(name.clone(), IoInfo { ty, location });
        }
        if let Some(var) = self.find_var(&name) {
            return var;
        }
        let stage = self.stage();
        let mut flags = attributes;
        if stage != ShaderStage::Fragment
            && stage != ShaderStage::Compute
            && !stage.is_mesh()
            && !stage.is_ray_trace()
            && self.is_integer_kind(ty)
        {
            flags |= VarFlags::FLAT;
        }
        self.register_name(name, ty, flags | VarFlags::SHADER_OUTPUT)
    }

    pub fn register_inout(
        &mut self,
        name: impl Into<String>,
        attributes: VarFlags,
        ty: Handle<Type>,
    ) -> Handle<Variable> {
        let name = name.into();
        self.shader
            .data
            .inouts
            .entry(name.clone())
            .or_insert(ty);
        if let Some(var) = self.find_var(&name) {
            return var;
        }
        self.register_name(
            name,
            ty,
            attributes | VarFlags::SHADER_INPUT | VarFlags::SHADER_OUTPUT,
        )
    }

    pub fn register_builtin(
        &mut self,
        builtin: BuiltIn,
        ty: Handle<Type>,
        flags: VarFlags,
    ) -> Handle<Variable> {
        let name = builtin_name(builtin).to_string();
        let var = self.make_variable(name, ty, flags | VarFlags::BUILTIN, None, Some(builtin));
        self.register_variable(var, false);
        var
    }

    pub fn register_locale(
        &mut self,
        name: impl Into<String>,
        ty: Handle<Type>,
    ) -> Handle<Variable> {
        self.register_name(name, ty, VarFlags::LOCALE)
    }

    pub fn register_block_variable(
        &mut self,
        name: impl Into<String>,
        ty: Handle<Type>,
    ) -> Handle<Variable> {
        self.register_locale(name, ty)
    }

    pub fn register_loop_var(
        &mut self,
        name: impl Into<String>,
        ty: Handle<Type>,
    ) -> Handle<Variable> {
        self.register_name(name, ty, VarFlags::LOCALE | VarFlags::LOOP_VAR)
    }

    pub fn register_param(
        &mut self,
        name: impl Into<String>,
        ty: Handle<Type>,
    ) -> Handle<Variable> {
        self.register_name(name, ty, VarFlags::PARAM)
    }

    pub fn register_in_param(
        &mut self,
        name: impl Into<String>,
        ty: Handle<Type>,
    ) -> Handle<Variable> {
        self.register_name(name, ty, VarFlags::INPUT_PARAM)
    }

    pub fn register_out_param(
        &mut self,
        name: impl Into<String>,
        ty: Handle<Type>,
    ) -> Handle<Variable> {
        self.register_name(name, ty, VarFlags::OUTPUT_PARAM)
    }

    pub fn register_inout_param(
        &mut self,
        name: impl Into<String>,
        ty: Handle<Type>,
    ) -> Handle<Variable> {
        self.register_name(name, ty, VarFlags::INPUT_PARAM | VarFlags::OUTPUT_PARAM)
    }

    fn find_var(&self, name: &str) -> Option<Handle<Variable>> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.registered.get(name).copied())
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.find_var(name).is_some()
    }

    pub fn get_var(&self, name: &str) -> Result<Handle<Variable>, Error> {
        self.find_var(name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    pub fn get_member_var(
        &self,
        outer: Handle<Variable>,
        name: &str,
    ) -> Result<Handle<Variable>, Error> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| {
                frame.registered.values().copied().find(|&var| {
                    let var = &self.shader.variables[var];
                    var.is_member() && var.outer == Some(outer) && var.name == name
                })
            })
            .ok_or_else(|| Error::UnknownMember(name.to_string()))
    }

    //
    // Resource block registration.
    //

    pub fn register_ssbo(&mut self, name: impl Into<String>, info: ResourceInfo) {
        self.shader.data.ssbos.insert(name.into(), info);
    }

    pub fn register_ubo(&mut self, name: impl Into<String>, info: ResourceInfo) {
        self.shader.data.ubos.insert(name.into(), info);
    }

    pub fn register_pcb(&mut self, name: impl Into<String>, ty: Handle<Type>) {
        self.shader.data.pcbs.insert(name.into(), ty);
    }

    pub fn register_shader_record(&mut self, name: impl Into<String>, info: ResourceInfo) {
        self.shader.data.shader_records.insert(name.into(), info);
    }

    /// Look up or declare a struct through the shader's type cache.
    pub fn get_struct(
        &mut self,
        layout: crate::ty::MemoryLayout,
        name: impl Into<String>,
        flag: crate::ty::StructFlag,
    ) -> Handle<StructDef> {
        self.shader.types.get_struct(layout, name, flag)
    }

    /// A placeholder expression of the given type.
    pub fn dummy_expr(&mut self, ty: Handle<Type>) -> Handle<Expr> {
        self.shader.add_expr(ty, ExprKind::Dummy)
    }
}

/// The GLSL spelling of a builtin, used as the variable name.
pub const fn builtin_name(builtin: BuiltIn) -> &'static str {
    match builtin {
        BuiltIn::Position => "gl_Position",
        BuiltIn::PointSize => "gl_PointSize",
        BuiltIn::ClipDistance => "gl_ClipDistance",
        BuiltIn::CullDistance => "gl_CullDistance",
        BuiltIn::VertexIndex => "gl_VertexIndex",
        BuiltIn::InstanceIndex => "gl_InstanceIndex",
        BuiltIn::PrimitiveId => "gl_PrimitiveID",
        BuiltIn::InvocationId => "gl_InvocationID",
        BuiltIn::Layer => "gl_Layer",
        BuiltIn::ViewportIndex => "gl_ViewportIndex",
        BuiltIn::TessLevelOuter => "gl_TessLevelOuter",
        BuiltIn::TessLevelInner => "gl_TessLevelInner",
        BuiltIn::TessCoord => "gl_TessCoord",
        BuiltIn::PatchVertices => "gl_PatchVerticesIn",
        BuiltIn::FragCoord => "gl_FragCoord",
        BuiltIn::FrontFacing => "gl_FrontFacing",
        BuiltIn::SampleId => "gl_SampleID",
        BuiltIn::SamplePosition => "gl_SamplePosition",
        BuiltIn::SampleMask => "gl_SampleMask",
        BuiltIn::FragDepth => "gl_FragDepth",
        BuiltIn::HelperInvocation => "gl_HelperInvocation",
        BuiltIn::NumWorkGroups => "gl_NumWorkGroups",
        BuiltIn::WorkGroupSize => "gl_WorkGroupSize",
        BuiltIn::WorkGroupId => "gl_WorkGroupID",
        BuiltIn::LocalInvocationId => "gl_LocalInvocationID",
        BuiltIn::GlobalInvocationId => "gl_GlobalInvocationID",
        BuiltIn::LocalInvocationIndex => "gl_LocalInvocationIndex",
        BuiltIn::LaunchId => "gl_LaunchID",
        BuiltIn::LaunchSize => "gl_LaunchSize",
        BuiltIn::WorldRayOrigin => "gl_WorldRayOrigin",
        BuiltIn::WorldRayDirection => "gl_WorldRayDirection",
        BuiltIn::ObjectRayOrigin => "gl_ObjectRayOrigin",
        BuiltIn::ObjectRayDirection => "gl_ObjectRayDirection",
        BuiltIn::RayTmin => "gl_RayTmin",
        BuiltIn::RayTmax => "gl_RayTmax",
        BuiltIn::InstanceCustomIndex => "gl_InstanceCustomIndex",
        BuiltIn::ObjectToWorld => "gl_ObjectToWorld",
        BuiltIn::WorldToObject => "gl_WorldToObject",
        BuiltIn::HitKind => "gl_HitKind",
        BuiltIn::RayGeometryIndex => "gl_GeometryIndex",
    }
}
