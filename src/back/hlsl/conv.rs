//! Mappings from IR vocabulary to HLSL spellings.

use super::Error;
use crate::ir::expr::Intrinsic;
use crate::ty::{ImageConfig, ImageDim, Scalar, ScalarKind};
use crate::{BuiltIn, ShaderStage};

impl Scalar {
    /// Helper function that returns scalar related strings.
    ///
    /// <https://docs.microsoft.com/en-us/windows/win32/direct3dhlsl/dx-graphics-hlsl-scalar>
    pub(super) const fn to_hlsl_str(self) -> Result<&'static str, Error> {
        match (self.kind, self.width) {
            (ScalarKind::Bool, _) => Ok("bool"),
            (ScalarKind::Sint, 4) => Ok("int"),
            (ScalarKind::Uint, 4) => Ok("uint"),
            (ScalarKind::Sint, 2) => Ok("int16_t"),
            (ScalarKind::Uint, 2) => Ok("uint16_t"),
            (ScalarKind::Sint, 8) => Ok("int64_t"),
            (ScalarKind::Uint, 8) => Ok("uint64_t"),
            (ScalarKind::Float, 2) => Ok("half"),
            (ScalarKind::Float, 4) => Ok("float"),
            (ScalarKind::Float, 8) => Ok("double"),
            (_, width) => Err(Error::UnsupportedScalar(width)),
        }
    }
}

/// Whether a builtin enters or leaves the stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Io {
    Input,
    Output,
}

impl BuiltIn {
    pub(super) fn to_hlsl_str(self) -> Result<&'static str, Error> {
        Ok(match self {
            Self::Position | Self::FragCoord => "SV_Position",
            Self::ClipDistance => "SV_ClipDistance",
            Self::CullDistance => "SV_CullDistance",
            Self::InstanceIndex => "SV_InstanceID",
            Self::VertexIndex => "SV_VertexID",
            Self::PrimitiveId => "SV_PrimitiveID",
            Self::InvocationId => "SV_GSInstanceID",
            Self::Layer => "SV_RenderTargetArrayIndex",
            Self::ViewportIndex => "SV_ViewportArrayIndex",
            Self::FragDepth => "SV_Depth",
            Self::FrontFacing => "SV_IsFrontFace",
            Self::SampleId => "SV_SampleIndex",
            Self::SampleMask => "SV_Coverage",
            Self::TessLevelOuter => "SV_TessFactor",
            Self::TessLevelInner => "SV_InsideTessFactor",
            Self::TessCoord => "SV_DomainLocation",
            Self::GlobalInvocationId => "SV_DispatchThreadID",
            Self::LocalInvocationId => "SV_GroupThreadID",
            Self::LocalInvocationIndex => "SV_GroupIndex",
            Self::WorkGroupId => "SV_GroupID",
            other => return Err(Error::UnsupportedBuiltIn(other)),
        })
    }

    /// Which side of the stage interface this builtin sits on.
    pub(super) const fn direction(self, stage: ShaderStage) -> Io {
        match self {
            Self::Position => match stage {
                ShaderStage::Fragment => Io::Input,
                _ => Io::Output,
            },
            Self::FragDepth | Self::SampleMask => Io::Output,
            Self::TessLevelOuter | Self::TessLevelInner => match stage {
                ShaderStage::TessellationControl => Io::Output,
                _ => Io::Input,
            },
            Self::Layer | Self::ViewportIndex => match stage {
                ShaderStage::Fragment => Io::Input,
                _ => Io::Output,
            },
            _ => Io::Input,
        }
    }
}

impl ImageConfig {
    /// The `Texture*`/`RWTexture*` object name for this configuration.
    pub(super) fn to_hlsl_object(&self, writable: bool) -> String {
        let prefix = if writable { "RW" } else { "" };
        let dim = match self.dim {
            ImageDim::D1 => "Texture1D",
            ImageDim::D2 if self.ms => "Texture2DMS",
            ImageDim::D2 => "Texture2D",
            ImageDim::D3 => "Texture3D",
            ImageDim::Cube => "TextureCube",
            ImageDim::Rect => "Texture2D",
            ImageDim::Buffer => "Buffer",
        };
        let array = if self.arrayed { "Array" } else { "" };
        format!("{prefix}{dim}{array}")
    }
}

impl Intrinsic {
    /// The HLSL spelling; a handful of GLSL names differ.
    pub(super) const fn to_hlsl_str(self) -> &'static str {
        use Intrinsic as In;
        match self {
            In::Radians => "radians",
            In::Degrees => "degrees",
            In::Sin => "sin",
            In::Cos => "cos",
            In::Tan => "tan",
            In::Asin => "asin",
            In::Acos => "acos",
            In::Atan => "atan",
            In::Atan2 => "atan2",
            In::Sinh => "sinh",
            In::Cosh => "cosh",
            In::Tanh => "tanh",
            In::Pow => "pow",
            In::Exp => "exp",
            In::Log => "log",
            In::Exp2 => "exp2",
            In::Log2 => "log2",
            In::Sqrt => "sqrt",
            In::InverseSqrt => "rsqrt",
            In::Abs => "abs",
            In::Sign => "sign",
            In::Floor => "floor",
            In::Ceil => "ceil",
            In::Round => "round",
            In::Trunc => "trunc",
            In::Fract => "frac",
            In::Min => "min",
            In::Max => "max",
            In::Clamp => "clamp",
            In::Mix => "lerp",
            In::Step => "step",
            In::SmoothStep => "smoothstep",
            In::Fma => "mad",
            In::Length => "length",
            In::Distance => "distance",
            In::Dot => "dot",
            In::Cross => "cross",
            In::Normalize => "normalize",
            In::Reflect => "reflect",
            In::Refract => "refract",
            In::FaceForward => "faceforward",
            In::Transpose => "transpose",
            In::Determinant => "determinant",
            // No direct equivalent before SM 6.x helper libraries.
            In::Inverse => "inverse",
            In::BitCount => "countbits",
            In::BitReverse => "reversebits",
            In::FindLsb => "firstbitlow",
            In::FindMsb => "firstbithigh",
            In::Dpdx => "ddx",
            In::Dpdy => "ddy",
            In::Fwidth => "fwidth",
            In::Barrier => "GroupMemoryBarrierWithGroupSync",
            In::MemoryBarrier => "DeviceMemoryBarrier",
            In::WorkgroupMemoryBarrier => "GroupMemoryBarrier",
            In::EmitVertex => "Append",
            In::EndPrimitive => "RestartStrip",
            In::SetMeshOutputCounts => "SetMeshOutputCounts",
            In::EmitMeshTasks => "DispatchMesh",
            In::TraceRay => "TraceRay",
            In::ReportIntersection => "ReportHit",
            In::ExecuteCallable => "CallShader",
            In::IgnoreIntersection => "IgnoreHit",
            In::TerminateRay => "AcceptHitAndEndSearch",
        }
    }
}
