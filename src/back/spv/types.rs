//! Type, constant and pointer registration with deduplication.
//!
//! Every lookup key is the **unqualified** type: stage-role wrappers are
//! stripped and image access kinds normalised before the table is consulted,
//! so a uniform `float` and a local `float` share one `OpTypeFloat`. Pointer
//! types key on a packed (pointee-id, storage-class, forward) word; image
//! types key on their configuration plus the comparison flag; function types
//! on their parameter-id list.

use super::instructions::Instruction;
use super::writer::Writer;
use crate::arena::Handle;
use crate::ir::Literal;
use crate::ty::{
    layout, ArraySize, ImageConfig, ImageDim, ImageFormat, MemoryLayout, Scalar, ScalarKind,
    StructDef, Trinary, Type, TypeInner, VectorSize,
};
use spirv::Word;

/// A constant already emitted to the declarations section.
#[derive(Eq, Hash, PartialEq)]
pub(super) enum CachedConstant {
    Literal(Literal),
    Composite {
        type_id: Word,
        constituent_ids: Vec<Word>,
    },
    Null(Word),
}

pub(super) const fn map_storage_class(class: crate::ty::StorageClass) -> spirv::StorageClass {
    use crate::ty::StorageClass as Sc;
    match class {
        Sc::Function => spirv::StorageClass::Function,
        Sc::Private => spirv::StorageClass::Private,
        Sc::Workgroup => spirv::StorageClass::Workgroup,
        Sc::Uniform => spirv::StorageClass::Uniform,
        Sc::StorageBuffer => spirv::StorageClass::StorageBuffer,
        Sc::UniformConstant => spirv::StorageClass::UniformConstant,
        Sc::Input => spirv::StorageClass::Input,
        Sc::Output => spirv::StorageClass::Output,
        Sc::PushConstant => spirv::StorageClass::PushConstant,
        Sc::RayPayload => spirv::StorageClass::RayPayloadNV,
        Sc::IncomingRayPayload => spirv::StorageClass::IncomingRayPayloadNV,
        Sc::CallableData => spirv::StorageClass::CallableDataNV,
        Sc::IncomingCallableData => spirv::StorageClass::IncomingCallableDataNV,
        Sc::HitAttribute => spirv::StorageClass::HitAttributeNV,
    }
}

pub(super) const fn map_dim(dim: ImageDim) -> spirv::Dim {
    match dim {
        ImageDim::D1 => spirv::Dim::Dim1D,
        ImageDim::D2 => spirv::Dim::Dim2D,
        ImageDim::D3 => spirv::Dim::Dim3D,
        ImageDim::Cube => spirv::Dim::DimCube,
        ImageDim::Rect => spirv::Dim::DimRect,
        ImageDim::Buffer => spirv::Dim::DimBuffer,
    }
}

pub(super) const fn map_format(format: ImageFormat) -> spirv::ImageFormat {
    use spirv::ImageFormat as If;
    match format {
        ImageFormat::Unknown => If::Unknown,
        ImageFormat::Rgba32f => If::Rgba32f,
        ImageFormat::Rgba16f => If::Rgba16f,
        ImageFormat::Rg32f => If::Rg32f,
        ImageFormat::Rg16f => If::Rg16f,
        ImageFormat::R32f => If::R32f,
        ImageFormat::R16f => If::R16f,
        ImageFormat::Rgba8 => If::Rgba8,
        ImageFormat::Rgba8Snorm => If::Rgba8Snorm,
        ImageFormat::Rgba32i => If::Rgba32i,
        ImageFormat::Rgba16i => If::Rgba16i,
        ImageFormat::Rgba8i => If::Rgba8i,
        ImageFormat::Rg32i => If::Rg32i,
        ImageFormat::Rg16i => If::Rg16i,
        ImageFormat::R32i => If::R32i,
        ImageFormat::R16i => If::R16i,
        ImageFormat::Rgba32u => If::Rgba32ui,
        ImageFormat::Rgba16u => If::Rgba16ui,
        ImageFormat::Rgba8u => If::Rgba8ui,
        ImageFormat::Rg32u => If::Rg32ui,
        ImageFormat::Rg16u => If::Rg16ui,
        ImageFormat::R32u => If::R32ui,
        ImageFormat::R16u => If::R16ui,
    }
}

impl Writer<'_> {
    /// The id of the `OpType*` instruction for `ty`, emitting it on first
    /// request. Dedup happens on the unqualified equivalent.
    pub(super) fn get_type_id(&mut self, ty: Handle<Type>) -> Word {
        let unqualified = self.types.unqualified(ty);
        if let Some(&id) = self.lookup_type.get(&unqualified) {
            return id;
        }
        self.register_type(unqualified)
    }

    fn register_type(&mut self, ty: Handle<Type>) -> Word {
        let inner = self.types.lookup(ty).clone();
        let id = match inner {
            TypeInner::Void => {
                let id = self.id_gen.next();
                self.declarations.push(Instruction::type_void(id));
                id
            }
            TypeInner::Scalar(scalar) => self.register_scalar(scalar),
            TypeInner::Vector { scalar, size } => {
                let component = {
                    let handle = self.types.get_scalar(scalar);
                    self.get_type_id(handle)
                };
                let id = self.id_gen.next();
                self.declarations
                    .push(Instruction::type_vector(id, component, size.count()));
                id
            }
            TypeInner::Matrix {
                scalar,
                columns,
                rows,
            } => {
                let column = {
                    let handle = self.types.get_vector(scalar, rows);
                    self.get_type_id(handle)
                };
                let id = self.id_gen.next();
                self.declarations
                    .push(Instruction::type_matrix(id, column, columns.count()));
                id
            }
            TypeInner::Array { base, size } => {
                let element_id = self.get_type_id(base);
                let id = self.id_gen.next();
                match size {
                    ArraySize::Constant(count) => {
                        let length_id = self.get_constant_scalar(Literal::U32(count.get()));
                        self.declarations
                            .push(Instruction::type_array(id, element_id, length_id));
                    }
                    ArraySize::Dynamic => {
                        self.declarations
                            .push(Instruction::type_runtime_array(id, element_id));
                    }
                }
                self.write_array_stride(base, id, 0);
                id
            }
            TypeInner::Pointer {
                base,
                class,
                forward,
            } => {
                let base_id = self.get_type_id(base);
                return self.get_pointer_type_id(base_id, map_storage_class(class), forward);
            }
            TypeInner::Sampler { .. } => {
                let id = self.id_gen.next();
                self.declarations.push(Instruction::type_sampler(id));
                id
            }
            TypeInner::Image(config) => {
                return self.register_image(config, Trinary::False);
            }
            TypeInner::SampledImage { config, depth } => {
                return self.register_image(config, depth);
            }
            TypeInner::CombinedImage { config, comparison } => {
                let image_id = self.register_image(
                    config,
                    if comparison {
                        Trinary::True
                    } else {
                        Trinary::False
                    },
                );
                let id = self.id_gen.next();
                self.declarations
                    .push(Instruction::type_sampled_image(id, image_id));
                id
            }
            TypeInner::AccelerationStructure => {
                let id = self.id_gen.next();
                self.declarations
                    .push(Instruction::type_acceleration_structure(id));
                id
            }
            TypeInner::Struct(def) => self.register_struct(ty, def),
            TypeInner::Function { result, arguments } => {
                let return_id = self.get_type_id(result);
                let parameter_ids: Vec<Word> = arguments
                    .iter()
                    .map(|&argument| self.get_type_id(argument))
                    .collect();
                return self.get_function_type_id(return_id, &parameter_ids);
            }
            ref wrapper => {
                // `unqualified` strips every stage wrapper, so reaching one
                // here is a bug in the cache.
                unreachable!("stage wrapper {wrapper:?} survived unqualification");
            }
        };
        self.lookup_type.insert(ty, id);
        id
    }

    fn register_scalar(&mut self, scalar: Scalar) -> Word {
        let id = self.id_gen.next();
        let width_bits = scalar.width as u32 * 8;
        let instruction = match scalar.kind {
            ScalarKind::Bool => Instruction::type_bool(id),
            ScalarKind::Sint => Instruction::type_int(id, width_bits, 1),
            ScalarKind::Uint => Instruction::type_int(id, width_bits, 0),
            ScalarKind::Float => Instruction::type_float(id, width_bits),
        };
        self.declarations.push(instruction);
        id
    }

    /// Image types dedup on their configuration and comparison flag, not on
    /// the cache handle, so sampled and combined views of the same image
    /// share one `OpTypeImage`.
    pub(super) fn register_image(&mut self, config: ImageConfig, comparison: Trinary) -> Word {
        let mut key = config;
        key.access = crate::ty::AccessKind::ReadWrite;
        if let Some(&id) = self.lookup_image.get(&(key, comparison)) {
            return id;
        }
        let sampled_type_id = {
            let handle = self.types.get_scalar(config.sampled_type);
            self.get_type_id(handle)
        };
        let id = self.id_gen.next();
        let depth = match comparison {
            Trinary::True => 1,
            Trinary::False => 0,
            Trinary::DontCare => 2,
        };
        let sampled = match config.sampled {
            Trinary::True => 1,
            Trinary::False => 2,
            Trinary::DontCare => 0,
        };
        self.declarations.push(Instruction::type_image(
            id,
            sampled_type_id,
            map_dim(config.dim),
            depth,
            config.arrayed,
            config.ms,
            sampled,
            map_format(config.format),
        ));
        self.lookup_image.insert((key, comparison), id);
        id
    }

    /// Pointer types key on `(pointee-id, storage, forward)` packed into one
    /// 64-bit word. A forward pointer emits `OpTypeForwardPointer` first and
    /// also registers under the forward-stripped key, so later plain lookups
    /// resolve to the same id.
    pub(super) fn get_pointer_type_id(
        &mut self,
        base_id: Word,
        class: spirv::StorageClass,
        forward: bool,
    ) -> Word {
        let key = ((base_id as u64) << 33) | ((class as u64) << 1) | (forward as u64);
        if let Some(&id) = self.lookup_pointer.get(&key) {
            return id;
        }
        let id = self.id_gen.next();
        if forward {
            self.declarations
                .push(Instruction::type_forward_pointer(id, class));
            self.declarations
                .push(Instruction::type_pointer(id, class, base_id));
            let plain_key = ((base_id as u64) << 33) | ((class as u64) << 1);
            self.lookup_pointer.insert(plain_key, id);
        } else {
            self.declarations
                .push(Instruction::type_pointer(id, class, base_id));
        }
        self.lookup_pointer.insert(key, id);
        id
    }

    /// A pointer to `ty` in `class`, the form every variable slot uses.
    pub(super) fn get_pointer_id(&mut self, ty: Handle<Type>, class: spirv::StorageClass) -> Word {
        let base_id = self.get_type_id(ty);
        self.get_pointer_type_id(base_id, class, false)
    }

    pub(super) fn get_function_type_id(
        &mut self,
        return_id: Word,
        parameter_ids: &[Word],
    ) -> Word {
        let key = (return_id, parameter_ids.to_vec());
        if let Some(&id) = self.lookup_function_type.get(&key) {
            return id;
        }
        let id = self.id_gen.next();
        self.declarations
            .push(Instruction::type_function(id, return_id, parameter_ids));
        self.lookup_function_type.insert(key, id);
        id
    }

    /// `ArrayStride` decoration for arrays of non-opaque elements; the
    /// default stride is the std140 element size.
    fn write_array_stride(&mut self, element: Handle<Type>, type_id: Word, stride: u32) {
        let base = self.types.non_array(element);
        if self.types.lookup(base).is_opaque() {
            return;
        }
        let stride = if stride != 0 {
            stride
        } else {
            layout::array_stride(self.types, element, MemoryLayout::Std140)
        };
        self.annotations.push(Instruction::decorate(
            type_id,
            spirv::Decoration::ArrayStride,
            &[stride],
        ));
    }

    fn register_struct(&mut self, ty: Handle<Type>, def: Handle<StructDef>) -> Word {
        let definition = self.types.struct_def(def).clone();
        let id = self.id_gen.next();
        // Pre-register so self-referencing members resolve through the
        // forward-pointer path instead of recursing forever.
        self.lookup_type.insert(ty, id);

        let member_ids: Vec<Word> = definition
            .members
            .iter()
            .map(|member| self.get_type_id(member.ty))
            .collect();
        self.declarations
            .push(Instruction::type_struct(id, &member_ids));
        self.debug_names
            .push(Instruction::name(id, &definition.name));

        let mut has_builtin = false;
        let mut has_dynarray = false;
        for (index, member) in definition.members.iter().enumerate() {
            let index = index as Word;
            self.debug_names
                .push(Instruction::member_name(id, index, &member.name));

            match member.builtin {
                None => {
                    self.annotations.push(Instruction::member_decorate(
                        id,
                        index,
                        spirv::Decoration::Offset,
                        &[member.offset],
                    ));
                }
                Some(builtin) => {
                    self.annotations.push(Instruction::member_decorate(
                        id,
                        index,
                        spirv::Decoration::BuiltIn,
                        &[super::writer::map_builtin(builtin) as Word],
                    ));
                    has_builtin = true;
                }
            }

            let member_inner = self.types.lookup(self.types.non_array(member.ty)).clone();
            if let TypeInner::Array {
                size: ArraySize::Dynamic,
                ..
            } = *self.types.lookup(member.ty)
            {
                has_dynarray = true;
            }

            if let TypeInner::Matrix { scalar, rows, .. } = member_inner {
                // Stride uses the column size in the struct's layout,
                // widening vec3 (and vec2 under std140) to vec4.
                let rows = match rows {
                    VectorSize::Tri => VectorSize::Quad,
                    VectorSize::Bi if definition.layout == MemoryLayout::Std140 => {
                        VectorSize::Quad
                    }
                    rows => rows,
                };
                let column = self.types.get_vector(scalar, rows);
                let stride = layout::size(self.types, column, definition.layout);
                self.annotations.push(Instruction::member_decorate(
                    id,
                    index,
                    spirv::Decoration::ColMajor,
                    &[],
                ));
                self.annotations.push(Instruction::member_decorate(
                    id,
                    index,
                    spirv::Decoration::MatrixStride,
                    &[stride],
                ));
            }
        }

        if has_builtin || has_dynarray {
            self.annotations
                .push(Instruction::decorate(id, spirv::Decoration::Block, &[]));
        }
        id
    }

    //
    // Constants.
    //

    /// The id of the constant for `value`, emitting it on first request.
    pub(super) fn get_constant_scalar(&mut self, value: Literal) -> Word {
        if let Some(&id) = self.cached_constants.get(&CachedConstant::Literal(value)) {
            return id;
        }
        let type_id = {
            let handle = self.types.get_scalar(value.scalar());
            self.get_type_id(handle)
        };
        let id = self.id_gen.next();
        let instruction = match value {
            Literal::Bool(true) => Instruction::constant_true(type_id, id),
            Literal::Bool(false) => Instruction::constant_false(type_id, id),
            Literal::F64(v) => {
                let bits = v.to_bits();
                Instruction::constant(type_id, id, &[bits as u32, (bits >> 32) as u32])
            }
            Literal::I64(v) => {
                let bits = v as u64;
                Instruction::constant(type_id, id, &[bits as u32, (bits >> 32) as u32])
            }
            Literal::U64(v) => Instruction::constant(type_id, id, &[v as u32, (v >> 32) as u32]),
            other => Instruction::constant(type_id, id, &[other.bits() as u32]),
        };
        self.declarations.push(instruction);
        self.cached_constants
            .insert(CachedConstant::Literal(value), id);
        id
    }

    pub(super) fn get_constant_composite(
        &mut self,
        type_id: Word,
        constituent_ids: &[Word],
    ) -> Word {
        let key = CachedConstant::Composite {
            type_id,
            constituent_ids: constituent_ids.to_vec(),
        };
        if let Some(&id) = self.cached_constants.get(&key) {
            return id;
        }
        let id = self.id_gen.next();
        self.declarations
            .push(Instruction::constant_composite(type_id, id, constituent_ids));
        self.cached_constants.insert(key, id);
        id
    }

    pub(super) fn get_constant_null(&mut self, type_id: Word) -> Word {
        if let Some(&id) = self.cached_constants.get(&CachedConstant::Null(type_id)) {
            return id;
        }
        let id = self.id_gen.next();
        self.declarations
            .push(Instruction::constant_null(type_id, id));
        self.cached_constants
            .insert(CachedConstant::Null(type_id), id);
        id
    }
}
