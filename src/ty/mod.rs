/*! The shader type system.

Types are interned: a [`TypeCache`] owns a [`UniqueArena`] of [`Type`] values,
so structurally equal types share a [`Handle`] and handle equality is type
equality. Struct bodies live in their own arena ([`StructDef`]) because they
are declared incrementally: `get_struct` returns an existing or fresh empty
definition keyed by (layout, name, flag), and member offsets are recomputed on
every append.
*/

pub mod layout;

use crate::arena::{Arena, Handle, UniqueArena};
use crate::{BuiltIn, Bytes, FastHashMap};

/// Primitive scalar classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum ScalarKind {
    Bool,
    Sint,
    Uint,
    Float,
}

/// Characteristics of a scalar type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Scalar {
    pub kind: ScalarKind,
    /// Size in bytes.
    pub width: Bytes,
}

impl Scalar {
    pub const BOOL: Scalar = Scalar {
        kind: ScalarKind::Bool,
        width: 1,
    };
    pub const I8: Scalar = Scalar {
        kind: ScalarKind::Sint,
        width: 1,
    };
    pub const I16: Scalar = Scalar {
        kind: ScalarKind::Sint,
        width: 2,
    };
    pub const I32: Scalar = Scalar {
        kind: ScalarKind::Sint,
        width: 4,
    };
    pub const I64: Scalar = Scalar {
        kind: ScalarKind::Sint,
        width: 8,
    };
    pub const U8: Scalar = Scalar {
        kind: ScalarKind::Uint,
        width: 1,
    };
    pub const U16: Scalar = Scalar {
        kind: ScalarKind::Uint,
        width: 2,
    };
    pub const U32: Scalar = Scalar {
        kind: ScalarKind::Uint,
        width: 4,
    };
    pub const U64: Scalar = Scalar {
        kind: ScalarKind::Uint,
        width: 8,
    };
    pub const F16: Scalar = Scalar {
        kind: ScalarKind::Float,
        width: 2,
    };
    pub const F32: Scalar = Scalar {
        kind: ScalarKind::Float,
        width: 4,
    };
    pub const F64: Scalar = Scalar {
        kind: ScalarKind::Float,
        width: 8,
    };

    pub const fn is_integer(self) -> bool {
        matches!(self.kind, ScalarKind::Sint | ScalarKind::Uint)
    }
}

/// Number of components in a vector.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum VectorSize {
    Bi = 2,
    Tri = 3,
    Quad = 4,
}

impl VectorSize {
    pub const fn count(self) -> u32 {
        self as u32
    }
}

/// Size of an array type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum ArraySize {
    Constant(std::num::NonZeroU32),
    /// The array size is determined at runtime.
    Dynamic,
}

impl ArraySize {
    pub fn constant(count: u32) -> Self {
        Self::Constant(std::num::NonZeroU32::new(count).expect("array size must be non-zero"))
    }
}

/// Buffer memory layout rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum MemoryLayout {
    Std140,
    Std430,
    /// Natural packing, identical to a host-language struct.
    C,
}

/// Interface role of a struct.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum StructFlag {
    #[default]
    None,
    ShaderInput,
    ShaderOutput,
}

/// Three-valued flag, used where SPIR-V distinguishes "unknown".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum Trinary {
    DontCare,
    False,
    True,
}

/// How a storage image may be accessed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum AccessKind {
    Read,
    Write,
    ReadWrite,
}

/// Dimensionality of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum ImageDim {
    D1,
    D2,
    D3,
    Cube,
    Rect,
    Buffer,
}

/// Texel format of a storage image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum ImageFormat {
    Unknown,
    Rgba32f,
    Rgba16f,
    Rg32f,
    Rg16f,
    R32f,
    R16f,
    Rgba8,
    Rgba8Snorm,
    Rgba32i,
    Rgba16i,
    Rgba8i,
    Rg32i,
    Rg16i,
    R32i,
    R16i,
    Rgba32u,
    Rgba16u,
    Rgba8u,
    Rg32u,
    Rg16u,
    R32u,
    R16u,
}

/// Full description of an image type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct ImageConfig {
    pub dim: ImageDim,
    pub format: ImageFormat,
    /// Scalar type produced by sampling or loading.
    pub sampled_type: Scalar,
    pub sampled: Trinary,
    pub arrayed: bool,
    pub ms: bool,
    pub access: AccessKind,
}

impl ImageConfig {
    /// Colour texture configuration sampled as `f32`.
    pub fn sampled_2d() -> Self {
        ImageConfig {
            dim: ImageDim::D2,
            format: ImageFormat::Unknown,
            sampled_type: Scalar::F32,
            sampled: Trinary::True,
            arrayed: false,
            ms: false,
            access: AccessKind::ReadWrite,
        }
    }
}

/// Geometry-stage input primitive topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum InputTopology {
    Points,
    Lines,
    LinesAdjacency,
    Triangles,
    TrianglesAdjacency,
}

/// Geometry/mesh-stage output primitive topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum OutputTopology {
    Points,
    LineStrip,
    TriangleStrip,
    Lines,
    Triangles,
}

/// Tessellation patch domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum PatchDomain {
    Isolines,
    Triangles,
    Quads,
}

/// Tessellation partitioning mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum Partitioning {
    Equal,
    FractionalEven,
    FractionalOdd,
}

/// Generated primitive winding order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum PrimitiveOrdering {
    Cw,
    Ccw,
}

/// Provenance of a pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum StorageClass {
    Function,
    Private,
    Workgroup,
    Uniform,
    StorageBuffer,
    UniformConstant,
    Input,
    Output,
    PushConstant,
    RayPayload,
    IncomingRayPayload,
    CallableData,
    IncomingCallableData,
    HitAttribute,
}

/// A struct member.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub struct StructMember {
    pub name: String,
    pub ty: Handle<Type>,
    pub builtin: Option<BuiltIn>,
    /// Byte offset under the struct's layout, recomputed on every append.
    pub offset: u32,
    pub size: u32,
    /// Stride for array members, zero otherwise.
    pub array_stride: u32,
    pub location: Option<u32>,
}

/// A named, incrementally declared structure.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub struct StructDef {
    pub layout: MemoryLayout,
    pub name: String,
    pub flag: StructFlag,
    pub members: Vec<StructMember>,
}

impl StructDef {
    pub fn find_member(&self, name: &str) -> Option<u32> {
        self.members
            .iter()
            .position(|m| m.name == name)
            .map(|i| i as u32)
    }
}

/// The classification of a value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub enum TypeInner {
    Void,
    Scalar(Scalar),
    Vector {
        scalar: Scalar,
        size: VectorSize,
    },
    /// Column-major matrix of `columns` vectors of `rows` scalars.
    Matrix {
        scalar: Scalar,
        columns: VectorSize,
        rows: VectorSize,
    },
    Array {
        base: Handle<Type>,
        size: ArraySize,
    },
    Pointer {
        base: Handle<Type>,
        class: StorageClass,
        /// Emitted through `OpTypeForwardPointer` first.
        forward: bool,
    },
    Sampler {
        comparison: bool,
    },
    Image(ImageConfig),
    SampledImage {
        config: ImageConfig,
        depth: Trinary,
    },
    CombinedImage {
        config: ImageConfig,
        comparison: bool,
    },
    AccelerationStructure,
    Struct(Handle<StructDef>),
    Function {
        result: Handle<Type>,
        arguments: Vec<Handle<Type>>,
    },
    RayPayload {
        data: Handle<Type>,
        incoming: bool,
    },
    CallableData {
        data: Handle<Type>,
        incoming: bool,
    },
    HitAttribute {
        data: Handle<Type>,
    },
    TaskPayload {
        data: Handle<Type>,
    },
    TaskPayloadIn {
        data: Handle<Type>,
    },
    GeometryInput {
        base: Handle<Type>,
        topology: InputTopology,
    },
    GeometryOutput {
        base: Handle<Type>,
        topology: OutputTopology,
        max_vertices: u32,
    },
    TessControlInput {
        base: Handle<Type>,
        input_vertices: u32,
    },
    TessControlOutput {
        base: Handle<Type>,
        domain: PatchDomain,
        partitioning: Partitioning,
        order: PrimitiveOrdering,
        output_vertices: u32,
    },
    TessEvaluationInput {
        base: Handle<Type>,
        domain: PatchDomain,
        partitioning: Partitioning,
        order: PrimitiveOrdering,
    },
    TessInputPatch {
        base: Handle<Type>,
        location: u32,
    },
    TessOutputPatch {
        base: Handle<Type>,
        location: u32,
    },
    MeshVertexOutput {
        base: Handle<Type>,
        max_vertices: u32,
    },
    MeshPrimitiveOutput {
        base: Handle<Type>,
        topology: OutputTopology,
        max_primitives: u32,
    },
    ComputeInput {
        base: Handle<Type>,
        local_size: [u32; 3],
    },
}

/// An interned shader type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub struct Type {
    pub inner: TypeInner,
}

impl TypeInner {
    /// The scalar underlying this numeric type, if any.
    pub const fn scalar(&self) -> Option<Scalar> {
        match *self {
            TypeInner::Scalar(scalar)
            | TypeInner::Vector { scalar, .. }
            | TypeInner::Matrix { scalar, .. } => Some(scalar),
            _ => None,
        }
    }

    pub const fn is_stage_wrapper(&self) -> bool {
        matches!(
            *self,
            TypeInner::RayPayload { .. }
                | TypeInner::CallableData { .. }
                | TypeInner::HitAttribute { .. }
                | TypeInner::TaskPayload { .. }
                | TypeInner::TaskPayloadIn { .. }
                | TypeInner::GeometryInput { .. }
                | TypeInner::GeometryOutput { .. }
                | TypeInner::TessControlInput { .. }
                | TypeInner::TessControlOutput { .. }
                | TypeInner::TessEvaluationInput { .. }
                | TypeInner::TessInputPatch { .. }
                | TypeInner::TessOutputPatch { .. }
                | TypeInner::MeshVertexOutput { .. }
                | TypeInner::MeshPrimitiveOutput { .. }
                | TypeInner::ComputeInput { .. }
        )
    }

    /// The type a stage-role wrapper binds, if this is one.
    pub const fn wrapped(&self) -> Option<Handle<Type>> {
        match *self {
            TypeInner::RayPayload { data, .. }
            | TypeInner::CallableData { data, .. }
            | TypeInner::HitAttribute { data }
            | TypeInner::TaskPayload { data }
            | TypeInner::TaskPayloadIn { data } => Some(data),
            TypeInner::GeometryInput { base, .. }
            | TypeInner::GeometryOutput { base, .. }
            | TypeInner::TessControlInput { base, .. }
            | TypeInner::TessControlOutput { base, .. }
            | TypeInner::TessEvaluationInput { base, .. }
            | TypeInner::TessInputPatch { base, .. }
            | TypeInner::TessOutputPatch { base, .. }
            | TypeInner::MeshVertexOutput { base, .. }
            | TypeInner::MeshPrimitiveOutput { base, .. }
            | TypeInner::ComputeInput { base, .. } => Some(base),
            _ => None,
        }
    }

    pub const fn is_opaque(&self) -> bool {
        matches!(
            *self,
            TypeInner::Sampler { .. }
                | TypeInner::Image(_)
                | TypeInner::SampledImage { .. }
                | TypeInner::CombinedImage { .. }
                | TypeInner::AccelerationStructure
        )
    }
}

/// Interning table for every [`Type`] of a shader.
#[derive(Clone, Debug, Default)]
pub struct TypeCache {
    types: UniqueArena<Type>,
    structs: Arena<StructDef>,
    struct_lookup: FastHashMap<(MemoryLayout, String, StructFlag), Handle<StructDef>>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `inner`, returning the canonical handle.
    pub fn get(&mut self, inner: TypeInner) -> Handle<Type> {
        self.types.insert(Type { inner })
    }

    pub fn lookup(&self, ty: Handle<Type>) -> &TypeInner {
        &self.types[ty].inner
    }

    pub fn types(&self) -> &UniqueArena<Type> {
        &self.types
    }

    pub fn structs(&self) -> &Arena<StructDef> {
        &self.structs
    }

    pub fn struct_def(&self, def: Handle<StructDef>) -> &StructDef {
        &self.structs[def]
    }

    pub fn get_void(&mut self) -> Handle<Type> {
        self.get(TypeInner::Void)
    }

    pub fn get_scalar(&mut self, scalar: Scalar) -> Handle<Type> {
        self.get(TypeInner::Scalar(scalar))
    }

    pub fn get_vector(&mut self, scalar: Scalar, size: VectorSize) -> Handle<Type> {
        self.get(TypeInner::Vector { scalar, size })
    }

    pub fn get_matrix(
        &mut self,
        scalar: Scalar,
        columns: VectorSize,
        rows: VectorSize,
    ) -> Handle<Type> {
        self.get(TypeInner::Matrix {
            scalar,
            columns,
            rows,
        })
    }

    pub fn get_array(&mut self, base: Handle<Type>, size: ArraySize) -> Handle<Type> {
        self.get(TypeInner::Array { base, size })
    }

    pub fn get_pointer(&mut self, base: Handle<Type>, class: StorageClass) -> Handle<Type> {
        self.get(TypeInner::Pointer {
            base,
            class,
            forward: false,
        })
    }

    pub fn get_forward_pointer(
        &mut self,
        base: Handle<Type>,
        class: StorageClass,
    ) -> Handle<Type> {
        self.get(TypeInner::Pointer {
            base,
            class,
            forward: true,
        })
    }

    pub fn get_sampler(&mut self, comparison: bool) -> Handle<Type> {
        self.get(TypeInner::Sampler { comparison })
    }

    pub fn get_image(&mut self, config: ImageConfig) -> Handle<Type> {
        self.get(TypeInner::Image(config))
    }

    pub fn get_sampled_image(&mut self, config: ImageConfig, depth: Trinary) -> Handle<Type> {
        self.get(TypeInner::SampledImage { config, depth })
    }

    pub fn get_combined_image(&mut self, config: ImageConfig, comparison: bool) -> Handle<Type> {
        self.get(TypeInner::CombinedImage { config, comparison })
    }

    pub fn get_acceleration_structure(&mut self) -> Handle<Type> {
        self.get(TypeInner::AccelerationStructure)
    }

    pub fn get_function(
        &mut self,
        result: Handle<Type>,
        arguments: Vec<Handle<Type>>,
    ) -> Handle<Type> {
        self.get(TypeInner::Function { result, arguments })
    }

    /// Return the existing struct with this key, or a fresh empty one.
    pub fn get_struct(
        &mut self,
        layout: MemoryLayout,
        name: impl Into<String>,
        flag: StructFlag,
    ) -> Handle<StructDef> {
        let name = name.into();
        let key = (layout, name.clone(), flag);
        if let Some(&existing) = self.struct_lookup.get(&key) {
            return existing;
        }
        let def = self.structs.append(StructDef {
            layout,
            name,
            flag,
            members: Vec::new(),
        });
        self.struct_lookup.insert(key, def);
        def
    }

    /// The interned type for a struct definition.
    pub fn struct_type(&mut self, def: Handle<StructDef>) -> Handle<Type> {
        self.get(TypeInner::Struct(def))
    }

    /// Append a member to `def`, recomputing all offsets under its layout.
    ///
    /// Returns the index of the new member.
    pub fn add_member(
        &mut self,
        def: Handle<StructDef>,
        name: impl Into<String>,
        ty: Handle<Type>,
        builtin: Option<BuiltIn>,
        location: Option<u32>,
    ) -> u32 {
        let mem_layout = self.structs[def].layout;
        let size = layout::size(self, ty, mem_layout);
        let array_stride = match *self.lookup(ty) {
            TypeInner::Array { .. } => layout::array_stride(self, ty, mem_layout),
            _ => 0,
        };
        let member = StructMember {
            name: name.into(),
            ty,
            builtin,
            offset: 0,
            size,
            array_stride,
            location,
        };
        let index = {
            let s = &mut self.structs[def];
            s.members.push(member);
            s.members.len() as u32 - 1
        };
        self.update_offsets(def);
        index
    }

    fn update_offsets(&mut self, def: Handle<StructDef>) {
        let mem_layout = self.structs[def].layout;
        let count = self.structs[def].members.len();
        let mut running = 0u32;
        for index in 0..count {
            let ty = self.structs[def].members[index].ty;
            let align = layout::alignment(self, ty, mem_layout);
            let size = layout::size(self, ty, mem_layout);
            running = layout::round_up(running, align);
            let member = &mut self.structs[def].members[index];
            member.offset = running;
            member.size = size;
            running += size;
        }
    }

    /// Strip the element type out of arrays, transparently.
    pub fn non_array(&self, ty: Handle<Type>) -> Handle<Type> {
        match *self.lookup(ty) {
            TypeInner::Array { base, .. } => self.non_array(base),
            _ => ty,
        }
    }

    /// The unqualified equivalent of `ty`: stage-role wrappers stripped and
    /// image access normalised to read-write.
    ///
    /// Non-kernel programs do not distinguish image access kinds, so leaving
    /// them in the key would generate duplicate types in SPIR-V programs.
    pub fn unqualified(&mut self, ty: Handle<Type>) -> Handle<Type> {
        let inner = self.lookup(ty).clone();
        if let Some(wrapped) = inner.wrapped() {
            return self.unqualified(wrapped);
        }
        match inner {
            TypeInner::Array { base, size } => {
                let base = self.unqualified(base);
                self.get_array(base, size)
            }
            TypeInner::Pointer {
                base,
                class,
                forward,
            } => {
                let base = self.unqualified(base);
                self.get(TypeInner::Pointer {
                    base,
                    class,
                    forward,
                })
            }
            TypeInner::Image(mut config) => {
                config.access = AccessKind::ReadWrite;
                self.get_image(config)
            }
            TypeInner::SampledImage { mut config, depth } => {
                config.access = AccessKind::ReadWrite;
                self.get_sampled_image(config, depth)
            }
            TypeInner::CombinedImage {
                mut config,
                comparison,
            } => {
                config.access = AccessKind::ReadWrite;
                self.get_combined_image(config, comparison)
            }
            _ => ty,
        }
    }
}
