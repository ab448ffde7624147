/*!
Backend for [GLSL][glsl] (OpenGL Shading Language).

The emitter walks the adapted statement tree and prints it with indentation.
A pre-scan ([`features`]) computes which extensions and explicit arithmetic
widths the output requires; the header is the `#version` line followed by
`#extension` directives in lexicographic order.

[glsl]: https://registry.khronos.org/OpenGL/specs/gl/GLSLangSpec.4.60.html
*/

mod adapt;
mod features;
mod writer;

pub use adapt::adapt;
pub use features::{scan_features, Features, IntrinsicsConfig};
pub use writer::Writer;

use crate::xform::{self, TreeRef};
use crate::{ir::Shader, ShaderStage};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Extension names the backend may require.
pub const ARB_GPU_SHADER_INT64: &str = "GL_ARB_gpu_shader_int64";
pub const ARB_GPU_SHADER_FP64: &str = "GL_ARB_gpu_shader_fp64";
pub const EXT_SHADER_EXPLICIT_ARITHMETIC_TYPES_INT8: &str =
    "GL_EXT_shader_explicit_arithmetic_types_int8";
pub const EXT_SHADER_EXPLICIT_ARITHMETIC_TYPES_INT16: &str =
    "GL_EXT_shader_explicit_arithmetic_types_int16";
pub const EXT_SHADER_EXPLICIT_ARITHMETIC_TYPES_FLOAT16: &str =
    "GL_EXT_shader_explicit_arithmetic_types_float16";
pub const EXT_RAY_TRACING: &str = "GL_EXT_ray_tracing";
pub const EXT_MESH_SHADER: &str = "GL_EXT_mesh_shader";
pub const EXT_SCALAR_BLOCK_LAYOUT: &str = "GL_EXT_scalar_block_layout";

/// GLSL language version, printed as `#version {major}{minor}0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const V4_5: Version = Version { major: 4, minor: 5 };
    pub const V4_6: Version = Version { major: 4, minor: 6 };
}

impl Default for Version {
    fn default() -> Self {
        Self::V4_6
    }
}

impl fmt::Display for Version {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}{}0", self.major, self.minor)
    }
}

/// Configuration for the GLSL emitter.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub struct Options {
    pub version: Version,
    /// Extensions the caller requires on top of the scanned set.
    pub required_extensions: BTreeSet<String>,
    /// Print plain local variable declarations.
    pub write_variable_decls: bool,
    /// Keep shader IO grouped in structs instead of flattening.
    pub use_structs: bool,
    /// Refer to builtins by their `gl_*` names.
    pub use_named_builtins: bool,
    /// Emit statement-level debug comments.
    pub use_semantic_debug: bool,
    /// Print specialisation constants as `constant_id` declarations instead
    /// of macro fallbacks.
    pub use_spec_constants: bool,
    /// Print SSBO declarations as storage buffers.
    pub use_storage_buffers: bool,
    /// Guard generated declarations with `#ifdef` blocks.
    pub use_preproc_ifdef: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            version: Version::default(),
            required_extensions: BTreeSet::new(),
            write_variable_decls: true,
            use_structs: false,
            use_named_builtins: true,
            use_semantic_debug: false,
            use_spec_constants: true,
            use_storage_buffers: true,
            use_preproc_ifdef: false,
        }
    }
}

#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error(transparent)]
    FmtError(#[from] fmt::Error),
    #[error("the requested stage {0:?} cannot be expressed in GLSL version {1}")]
    UnsupportedStage(ShaderStage, Version),
    #[error("unsupported scalar width {0}")]
    UnsupportedScalar(crate::Bytes),
}

pub type BackendResult = Result<(), Error>;

/// Merge the caller's required extensions and the width-implied ones into the
/// scanned configuration.
pub fn check_config(options: &Options, config: &mut IntrinsicsConfig) {
    if config.requires_int8 {
        config
            .required_extensions
            .insert(EXT_SHADER_EXPLICIT_ARITHMETIC_TYPES_INT8.to_string());
    }
    if config.requires_int16 {
        config
            .required_extensions
            .insert(EXT_SHADER_EXPLICIT_ARITHMETIC_TYPES_INT16.to_string());
    }
    if config.requires_int64 {
        config
            .required_extensions
            .insert(ARB_GPU_SHADER_INT64.to_string());
    }
    if config.requires_float16 {
        config
            .required_extensions
            .insert(EXT_SHADER_EXPLICIT_ARITHMETIC_TYPES_FLOAT16.to_string());
    }
    if config.requires_float64 {
        config
            .required_extensions
            .insert(ARB_GPU_SHADER_FP64.to_string());
    }
    for extension in &options.required_extensions {
        config.required_extensions.insert(extension.clone());
    }
}

/// Run the transform pipeline and print `shader` as GLSL text.
pub fn write_string(shader: &Shader, options: &Options) -> Result<String, Error> {
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
    let tree = adapt(TreeRef::of_tree(&tree), &variables, options);
    let tree = xform::simplify(TreeRef::of_tree(&tree));

    let mut config = scan_features(
        shader.stage(),
        TreeRef::of_tree(&tree),
        &variables,
        &shader.types,
    );
    check_config(options, &mut config);

    let mut out = String::new();
    let mut writer = Writer::new(
        &mut out,
        shader,
        &variables,
        TreeRef::of_tree(&tree),
        options,
        &config,
    );
    writer.write()?;
    Ok(out)
}
