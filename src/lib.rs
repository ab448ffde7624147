/*! Shader IR compiler core.

`shade` is the compiler half of an embedded shader DSL: the host-language
surface builds a typed IR through [`ShaderBuilder`], and the crate lowers that
IR to GLSL text, HLSL text, or a SPIR-V binary module.

The pipeline for every backend is the same: the builder produces a statement
tree rooted at a container, the transform passes ([`xform`]) rewrite it into a
normal form (SSA renaming, simplification, constant resolution, then a
backend-specific adaptation), and the emitter under [`back`] walks the adapted
tree.

All IR nodes live in per-shader arenas ([`arena::Arena`]); types are interned
in a [`ty::TypeCache`]; variables are shared by handle. Nothing in the crate
is global: every call site threads a shader (or its caches) explicitly.
*/

pub mod arena;
pub mod back;
pub mod builder;
pub mod ir;
pub mod ty;
pub mod visit;
pub mod xform;

pub use arena::{Arena, Handle, HandleSet, UniqueArena};
pub use builder::ShaderBuilder;
pub use ir::{Shader, ShaderData, Variable};

use std::hash::BuildHasherDefault;

/// Hash map that is faster but not resilient to DoS attacks.
pub type FastHashMap<K, T> = rustc_hash::FxHashMap<K, T>;
/// Hash set that is faster but not resilient to DoS attacks.
pub type FastHashSet<K> = rustc_hash::FxHashSet<K>;

/// Insertion-order-preserving hash map, faster but not resilient to DoS attacks.
pub type FastIndexMap<K, V> =
    indexmap::IndexMap<K, V, BuildHasherDefault<rustc_hash::FxHasher>>;
/// Insertion-order-preserving hash set, faster but not resilient to DoS attacks.
pub type FastIndexSet<K> = indexmap::IndexSet<K, BuildHasherDefault<rustc_hash::FxHasher>>;

/// Number of bytes per scalar.
pub type Bytes = u8;

/// Stage of a shader entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum ShaderStage {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Compute,
    Task,
    Mesh,
    RayGeneration,
    Intersection,
    AnyHit,
    ClosestHit,
    Miss,
    Callable,
}

impl ShaderStage {
    pub const fn is_ray_trace(self) -> bool {
        matches!(
            self,
            Self::RayGeneration
                | Self::Intersection
                | Self::AnyHit
                | Self::ClosestHit
                | Self::Miss
                | Self::Callable
        )
    }

    pub const fn is_mesh(self) -> bool {
        matches!(self, Self::Task | Self::Mesh)
    }
}

/// Identifies the entry point a stage input or output is registered against.
///
/// A shader object can hold several entry points; the builder keys its
/// location maps by this tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum EntryPoint {
    None,
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Compute,
    Task,
    Mesh,
    RayGeneration,
    Intersection,
    AnyHit,
    ClosestHit,
    Miss,
    Callable,
}

impl From<ShaderStage> for EntryPoint {
    fn from(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => Self::Vertex,
            ShaderStage::TessellationControl => Self::TessellationControl,
            ShaderStage::TessellationEvaluation => Self::TessellationEvaluation,
            ShaderStage::Geometry => Self::Geometry,
            ShaderStage::Fragment => Self::Fragment,
            ShaderStage::Compute => Self::Compute,
            ShaderStage::Task => Self::Task,
            ShaderStage::Mesh => Self::Mesh,
            ShaderStage::RayGeneration => Self::RayGeneration,
            ShaderStage::Intersection => Self::Intersection,
            ShaderStage::AnyHit => Self::AnyHit,
            ShaderStage::ClosestHit => Self::ClosestHit,
            ShaderStage::Miss => Self::Miss,
            ShaderStage::Callable => Self::Callable,
        }
    }
}

/// Built-in inputs and outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum BuiltIn {
    Position,
    PointSize,
    ClipDistance,
    CullDistance,
    VertexIndex,
    InstanceIndex,
    PrimitiveId,
    InvocationId,
    Layer,
    ViewportIndex,
    TessLevelOuter,
    TessLevelInner,
    TessCoord,
    PatchVertices,
    FragCoord,
    FrontFacing,
    SampleId,
    SamplePosition,
    SampleMask,
    FragDepth,
    HelperInvocation,
    NumWorkGroups,
    WorkGroupSize,
    WorkGroupId,
    LocalInvocationId,
    GlobalInvocationId,
    LocalInvocationIndex,
    LaunchId,
    LaunchSize,
    WorldRayOrigin,
    WorldRayDirection,
    ObjectRayOrigin,
    ObjectRayDirection,
    RayTmin,
    RayTmax,
    InstanceCustomIndex,
    ObjectToWorld,
    WorldToObject,
    HitKind,
    RayGeometryIndex,
}

/// Debug information level for the SPIR-V backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub enum DebugLevel {
    #[default]
    None,
    /// Emit names plus a non-semantic GLSL rendition of the module.
    DebugInfo,
}
