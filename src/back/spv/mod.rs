/*!
Backend for [SPIR-V][spv] (Standard Portable Intermediate Representation).

The writer produces a binary [`Module`] with the fixed section order the
format requires: capabilities, extensions, ext-inst imports, memory model,
entry points, execution modes, debug strings, debug names, annotations,
declarations, function definitions. Types, constants and pointers are
deduplicated on the **unqualified** type (stage-role wrappers stripped, image
access normalised), so equal types share a single `OpType*` id.

[spv]: https://www.khronos.org/registry/SPIR-V/
*/

mod adapt;
mod instructions;
mod module;
mod types;
mod writer;

pub use adapt::{adapt, Actions, ModuleConfig};
pub use instructions::Instruction;
pub use module::Module;
pub use writer::Writer;

use crate::back::PreprocContext;
use crate::ir::Shader;
use crate::xform::{self, TreeRef};
use crate::DebugLevel;
use spirv::Word;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error("target SPIRV-{0}.{1} is not supported")]
    UnsupportedVersion(u8, u8),
    #[error("unimplemented {0}")]
    FeatureNotImplemented(&'static str),
    #[error("module is not laid out properly: {0}")]
    Validation(&'static str),
    #[error("entry point function is missing")]
    EntryPointNotFound,
    #[error(transparent)]
    Builder(#[from] crate::builder::Error),
}

/// Errors produced while re-parsing a binary module.
#[derive(Clone, Debug, Error)]
pub enum DeserializeError {
    #[error("invalid header")]
    InvalidHeader,
    #[error("invalid word count")]
    InvalidWordCount,
    #[error("unknown instruction {0}")]
    UnknownInstruction(u16),
}

/// Configuration for the SPIR-V emitter.
#[derive(Clone, Debug)]
pub struct Options {
    pub debug_level: DebugLevel,
    /// (Major, Minor) target version of the SPIR-V.
    pub lang_version: (u8, u8),
    pub memory_model: spirv::MemoryModel,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            debug_level: DebugLevel::None,
            lang_version: (1, 3),
            memory_model: spirv::MemoryModel::GLSL450,
        }
    }
}

#[derive(Default)]
pub(super) struct IdGenerator(Word);

impl IdGenerator {
    pub(super) fn next(&mut self) -> Word {
        self.0 += 1;
        self.0
    }

    pub(super) const fn bound(&self) -> Word {
        self.0 + 1
    }
}

/// Compile `shader` into a sectioned binary [`Module`].
pub fn compile(
    shader: &Shader,
    context: PreprocContext,
    options: &Options,
) -> Result<Module, Error> {
    if options.lang_version.0 != 1 || options.lang_version.1 > 6 {
        return Err(Error::UnsupportedVersion(
            options.lang_version.0,
            options.lang_version.1,
        ));
    }

    let mut types = shader.types.clone();
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
    let (tree, config) = adapt(
        TreeRef::of_tree(&tree),
        shader.stage(),
        &variables,
        context,
    );
    // Simplify again, since adaptation can introduce complexity.
    let tree = xform::simplify(TreeRef::of_tree(&tree));

    let debug_source = match options.debug_level {
        DebugLevel::None => None,
        // The debug payload is the module re-emitted as GLSL text.
        #[cfg(feature = "glsl-out")]
        DebugLevel::DebugInfo => {
            let glsl_options = crate::back::glsl::Options {
                use_spec_constants: true,
                ..Default::default()
            };
            crate::back::glsl::write_string(shader, &glsl_options).ok()
        }
        #[cfg(not(feature = "glsl-out"))]
        DebugLevel::DebugInfo => None,
    };

    Writer::new(
        shader,
        &mut types,
        &variables,
        TreeRef::of_tree(&tree),
        config,
        options,
        debug_source,
    )
    .write()
}

/// Compile and serialise `shader`, logging failures and yielding an empty
/// word vector instead of an error.
pub fn write_vec(shader: &Shader, context: PreprocContext, options: &Options) -> Vec<Word> {
    match compile(shader, context, options) {
        Ok(module) => {
            let mut words = Vec::new();
            module.assemble(true, &mut words);
            words
        }
        Err(error) => {
            log::error!("SPIR-V emission failed: {error}");
            Vec::new()
        }
    }
}
