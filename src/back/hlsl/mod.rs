/*!
Backend for [HLSL][hlsl] (High-Level Shading Language).

Mirrors the GLSL emitter with HLSL-specific differences: no version line,
builtins map to system-value semantics (`SV_Position` and friends), stage
inputs and outputs gather into generated structs, and combined image samplers
split back into separate `Texture*`/`SamplerState` objects before printing.

[hlsl]: https://docs.microsoft.com/en-us/windows/win32/direct3dhlsl/dx-graphics-hlsl
*/

mod adapt;
mod conv;
mod writer;

pub use adapt::adapt;
pub use writer::Writer;

use crate::xform::{self, TreeRef};
use crate::{ir::Shader, ShaderStage};
use std::fmt;
use thiserror::Error;

/// The HLSL shader model to target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub struct ShaderModel {
    pub major: u8,
    pub minor: u8,
}

impl ShaderModel {
    pub const V5_1: ShaderModel = ShaderModel { major: 5, minor: 1 };
    pub const V6_0: ShaderModel = ShaderModel { major: 6, minor: 0 };
    pub const V6_5: ShaderModel = ShaderModel { major: 6, minor: 5 };
}

impl Default for ShaderModel {
    fn default() -> Self {
        Self::V6_0
    }
}

/// Configuration for the HLSL emitter.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub struct Options {
    pub shader_model: ShaderModel,
    /// Use `space{n}` register allocations for descriptor sets.
    pub use_spaces: bool,
}

#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error(transparent)]
    FmtError(#[from] fmt::Error),
    #[error("{0:?} shaders require shader model {1:?} or later")]
    UnsupportedStage(ShaderStage, ShaderModel),
    #[error("unsupported scalar width {0}")]
    UnsupportedScalar(crate::Bytes),
    #[error("unsupported builtin {0:?}")]
    UnsupportedBuiltIn(crate::BuiltIn),
}

pub type BackendResult = Result<(), Error>;

/// Run the transform pipeline and print `shader` as HLSL text.
pub fn write_string(shader: &Shader, options: &Options) -> Result<String, Error> {
    if shader.stage().is_ray_trace() && options.shader_model < ShaderModel::V6_5 {
        return Err(Error::UnsupportedStage(shader.stage(), options.shader_model));
    }

    let mut variables = shader.variables.clone();
    let mut data = xform::SsaData {
        next_var_id: shader.data.next_var_id,
        alias_id: shader.data.alias_id,
    };
    let tree = xform::transform_ssa(
        TreeRef::of_shader(shader),
        &shader.types,
        &mut variables,
        &mut data,
    );
    let tree = xform::simplify(TreeRef::of_tree(&tree));
    let tree = xform::resolve_constants(TreeRef::of_tree(&tree), &variables);
    let (tree, samplers) = adapt(TreeRef::of_tree(&tree), &mut variables);
    let tree = xform::simplify(TreeRef::of_tree(&tree));

    let mut out = String::new();
    let mut writer = Writer::new(
        &mut out,
        shader,
        &variables,
        TreeRef::of_tree(&tree),
        options,
        &samplers,
    );
    writer.write()?;
    Ok(out)
}
