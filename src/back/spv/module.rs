//! The sectioned binary module, its serialiser and the symmetric decoder.

use super::instructions::Instruction;
use super::DeserializeError;
use spirv::{Op, Word};
use std::fmt::Write;

/// SPIR-V version word: `(major << 16) | (minor << 8)`.
const fn version_word(major: u8, minor: u8) -> Word {
    ((major as Word) << 16) | ((minor as Word) << 8)
}

/// Generator magic: anonymous toolchain, tool id 0.
const GENERATOR: Word = 0;

/// A SPIR-V module partitioned into the sections the specification mandates,
/// in emission order.
#[derive(Debug, Default, PartialEq)]
pub struct Module {
    pub version: (u8, u8),
    /// Id bound: every id in the module is strictly below this.
    pub bound: Word,
    pub capabilities: Vec<Instruction>,
    pub extensions: Vec<Instruction>,
    pub ext_inst_imports: Vec<Instruction>,
    pub memory_model: Vec<Instruction>,
    pub entry_points: Vec<Instruction>,
    pub execution_modes: Vec<Instruction>,
    /// `OpString`/`OpSource` debug payload.
    pub debug_strings: Vec<Instruction>,
    /// `OpName`/`OpMemberName`.
    pub debug_names: Vec<Instruction>,
    /// Decorations.
    pub annotations: Vec<Instruction>,
    /// Types, constants and module-scope variables.
    pub declarations: Vec<Instruction>,
    pub function_definitions: Vec<Instruction>,
}

impl Module {
    fn sections(&self) -> impl Iterator<Item = &Instruction> {
        self.capabilities
            .iter()
            .chain(&self.extensions)
            .chain(&self.ext_inst_imports)
            .chain(&self.memory_model)
            .chain(&self.entry_points)
            .chain(&self.execution_modes)
            .chain(&self.debug_strings)
            .chain(&self.debug_names)
            .chain(&self.annotations)
            .chain(&self.declarations)
            .chain(&self.function_definitions)
    }

    /// Serialise into a little-endian word stream.
    ///
    /// When `with_header` is false the five-word header is omitted, for
    /// embedding the body in an outer container.
    pub fn assemble(&self, with_header: bool, sink: &mut Vec<Word>) {
        if with_header {
            sink.push(spirv::MAGIC_NUMBER);
            sink.push(version_word(self.version.0, self.version.1));
            sink.push(GENERATOR);
            sink.push(self.bound);
            sink.push(0);
        }
        for instruction in self.sections() {
            instruction.to_words(sink);
        }
    }

    /// Produce a human-readable dump of the module.
    pub fn write(&self, with_header: bool) -> String {
        let mut out = String::new();
        if with_header {
            let _ = writeln!(
                out,
                "; SPIR-V {}.{}, bound {}",
                self.version.0, self.version.1, self.bound
            );
        }
        for instruction in self.sections() {
            match instruction.result_id {
                Some(id) => {
                    let _ = write!(out, "%{id} = {:?}", instruction.op);
                }
                None => {
                    let _ = write!(out, "{:?}", instruction.op);
                }
            }
            if let Some(type_id) = instruction.type_id {
                let _ = write!(out, " %{type_id}");
            }
            for &operand in &instruction.operands {
                let _ = write!(out, " {operand}");
            }
            let _ = writeln!(out);
        }
        out
    }

    /// Re-parse a word stream produced by [`assemble`](Self::assemble) with a
    /// header.
    pub fn deserialize(words: &[Word]) -> Result<Module, DeserializeError> {
        if words.len() < 5 || words[0] != spirv::MAGIC_NUMBER {
            return Err(DeserializeError::InvalidHeader);
        }
        let version = ((words[1] >> 16) as u8, (words[1] >> 8) as u8);
        let bound = words[3];
        let mut module = Module {
            version,
            bound,
            ..Module::default()
        };

        let mut in_function = false;
        let mut cursor = &words[5..];
        while let Some(&first) = cursor.first() {
            let wc = (first >> 16) as usize;
            let opcode = (first & 0xffff) as u16;
            if wc == 0 || wc > cursor.len() {
                return Err(DeserializeError::InvalidWordCount);
            }
            let op = op_from_u16(opcode).ok_or(DeserializeError::UnknownInstruction(opcode))?;
            let body = &cursor[1..wc];
            let (type_id, result_id, operands) = split_operands(op, body);
            let instruction = Instruction {
                op,
                wc: wc as u32,
                type_id,
                result_id,
                operands,
            };
            if op == Op::Function {
                in_function = true;
            }
            let section = if in_function {
                &mut module.function_definitions
            } else {
                match op {
                    Op::Capability => &mut module.capabilities,
                    Op::Extension => &mut module.extensions,
                    Op::ExtInstImport => &mut module.ext_inst_imports,
                    Op::MemoryModel => &mut module.memory_model,
                    Op::EntryPoint => &mut module.entry_points,
                    Op::ExecutionMode => &mut module.execution_modes,
                    Op::String | Op::Source | Op::SourceExtension | Op::SourceContinued => {
                        &mut module.debug_strings
                    }
                    Op::Name | Op::MemberName => &mut module.debug_names,
                    Op::Decorate | Op::MemberDecorate => &mut module.annotations,
                    _ => &mut module.declarations,
                }
            };
            section.push(instruction);
            cursor = &cursor[wc..];
        }
        Ok(module)
    }
}

/// Re-partition an instruction body into (type, result, operands) so decoded
/// instructions round-trip through [`Instruction::to_words`].
fn split_operands(op: Op, body: &[Word]) -> (Option<Word>, Option<Word>, Vec<Word>) {
    let (has_type, has_result) = op_layout(op);
    let mut index = 0;
    let type_id = if has_type && index < body.len() {
        index += 1;
        Some(body[index - 1])
    } else {
        None
    };
    let result_id = if has_result && index < body.len() {
        index += 1;
        Some(body[index - 1])
    } else {
        None
    };
    (type_id, result_id, body[index..].to_vec())
}

/// Whether an opcode carries a result-type word and a result-id word.
const fn op_layout(op: Op) -> (bool, bool) {
    match op {
        // (type, result)
        Op::Constant
        | Op::ConstantTrue
        | Op::ConstantFalse
        | Op::ConstantComposite
        | Op::ConstantNull
        | Op::SpecConstant
        | Op::Variable
        | Op::Load
        | Op::AccessChain
        | Op::Function
        | Op::FunctionParameter
        | Op::FunctionCall
        | Op::SampledImage
        | Op::ImageSampleImplicitLod
        | Op::ImageSampleExplicitLod
        | Op::ImageSampleDrefImplicitLod
        | Op::ImageFetch
        | Op::ImageGather
        | Op::ImageRead
        | Op::ImageQuerySize
        | Op::ImageQuerySizeLod
        | Op::ImageQuerySamples
        | Op::ImageQueryLod
        | Op::ExtInst
        | Op::CompositeConstruct
        | Op::CompositeExtract
        | Op::VectorShuffle
        | Op::Select
        | Op::IAdd
        | Op::FAdd
        | Op::ISub
        | Op::FSub
        | Op::IMul
        | Op::FMul
        | Op::SDiv
        | Op::UDiv
        | Op::FDiv
        | Op::SMod
        | Op::UMod
        | Op::FMod
        | Op::SRem
        | Op::VectorTimesScalar
        | Op::VectorTimesMatrix
        | Op::MatrixTimesVector
        | Op::MatrixTimesMatrix
        | Op::MatrixTimesScalar
        | Op::BitwiseAnd
        | Op::BitwiseOr
        | Op::BitwiseXor
        | Op::ShiftLeftLogical
        | Op::ShiftRightLogical
        | Op::ShiftRightArithmetic
        | Op::Not
        | Op::SNegate
        | Op::FNegate
        | Op::LogicalAnd
        | Op::LogicalOr
        | Op::LogicalNot
        | Op::IEqual
        | Op::INotEqual
        | Op::SLessThan
        | Op::ULessThan
        | Op::FOrdLessThan
        | Op::SLessThanEqual
        | Op::ULessThanEqual
        | Op::FOrdLessThanEqual
        | Op::SGreaterThan
        | Op::UGreaterThan
        | Op::FOrdGreaterThan
        | Op::SGreaterThanEqual
        | Op::UGreaterThanEqual
        | Op::FOrdGreaterThanEqual
        | Op::FOrdEqual
        | Op::FOrdNotEqual
        | Op::LogicalEqual
        | Op::LogicalNotEqual
        | Op::Bitcast
        | Op::ConvertFToS
        | Op::ConvertFToU
        | Op::ConvertSToF
        | Op::ConvertUToF
        | Op::FConvert
        | Op::SConvert
        | Op::UConvert
        | Op::Dot
        | Op::Transpose
        | Op::DPdx
        | Op::DPdy
        | Op::Fwidth
        | Op::BitCount
        | Op::BitReverse => (true, true),
        // (result only)
        Op::ExtInstImport
        | Op::String
        | Op::TypeVoid
        | Op::TypeBool
        | Op::TypeInt
        | Op::TypeFloat
        | Op::TypeVector
        | Op::TypeMatrix
        | Op::TypeImage
        | Op::TypeSampler
        | Op::TypeSampledImage
        | Op::TypeAccelerationStructureKHR
        | Op::TypeArray
        | Op::TypeRuntimeArray
        | Op::TypeStruct
        | Op::TypePointer
        | Op::TypeFunction
        | Op::Label => (false, true),
        // (neither)
        _ => (false, false),
    }
}

/// Decode an opcode number; only opcodes this backend can produce are known.
fn op_from_u16(value: u16) -> Option<Op> {
    const KNOWN: &[Op] = &[
        Op::Nop,
        Op::Name,
        Op::MemberName,
        Op::String,
        Op::Source,
        Op::SourceContinued,
        Op::SourceExtension,
        Op::Extension,
        Op::ExtInstImport,
        Op::ExtInst,
        Op::MemoryModel,
        Op::EntryPoint,
        Op::ExecutionMode,
        Op::Capability,
        Op::TypeVoid,
        Op::TypeBool,
        Op::TypeInt,
        Op::TypeFloat,
        Op::TypeVector,
        Op::TypeMatrix,
        Op::TypeImage,
        Op::TypeSampler,
        Op::TypeSampledImage,
        Op::TypeArray,
        Op::TypeRuntimeArray,
        Op::TypeStruct,
        Op::TypePointer,
        Op::TypeFunction,
        Op::TypeForwardPointer,
        Op::TypeAccelerationStructureKHR,
        Op::ConstantTrue,
        Op::ConstantFalse,
        Op::Constant,
        Op::ConstantComposite,
        Op::ConstantNull,
        Op::SpecConstant,
        Op::Function,
        Op::FunctionParameter,
        Op::FunctionEnd,
        Op::FunctionCall,
        Op::Variable,
        Op::Load,
        Op::Store,
        Op::AccessChain,
        Op::Decorate,
        Op::MemberDecorate,
        Op::VectorShuffle,
        Op::CompositeConstruct,
        Op::CompositeExtract,
        Op::SampledImage,
        Op::ImageSampleImplicitLod,
        Op::ImageSampleExplicitLod,
        Op::ImageSampleDrefImplicitLod,
        Op::ImageFetch,
        Op::ImageGather,
        Op::ImageRead,
        Op::ImageWrite,
        Op::ImageQuerySize,
        Op::ImageQuerySizeLod,
        Op::ImageQuerySamples,
        Op::ImageQueryLod,
        Op::ConvertFToU,
        Op::ConvertFToS,
        Op::ConvertSToF,
        Op::ConvertUToF,
        Op::UConvert,
        Op::SConvert,
        Op::FConvert,
        Op::Bitcast,
        Op::SNegate,
        Op::FNegate,
        Op::IAdd,
        Op::FAdd,
        Op::ISub,
        Op::FSub,
        Op::IMul,
        Op::FMul,
        Op::UDiv,
        Op::SDiv,
        Op::FDiv,
        Op::UMod,
        Op::SRem,
        Op::SMod,
        Op::FMod,
        Op::VectorTimesScalar,
        Op::MatrixTimesScalar,
        Op::VectorTimesMatrix,
        Op::MatrixTimesVector,
        Op::MatrixTimesMatrix,
        Op::LogicalEqual,
        Op::LogicalNotEqual,
        Op::LogicalOr,
        Op::LogicalAnd,
        Op::LogicalNot,
        Op::Select,
        Op::IEqual,
        Op::INotEqual,
        Op::UGreaterThan,
        Op::SGreaterThan,
        Op::UGreaterThanEqual,
        Op::SGreaterThanEqual,
        Op::ULessThan,
        Op::SLessThan,
        Op::ULessThanEqual,
        Op::SLessThanEqual,
        Op::FOrdEqual,
        Op::FOrdNotEqual,
        Op::FOrdLessThan,
        Op::FOrdGreaterThan,
        Op::FOrdLessThanEqual,
        Op::FOrdGreaterThanEqual,
        Op::ShiftRightLogical,
        Op::ShiftRightArithmetic,
        Op::ShiftLeftLogical,
        Op::BitwiseOr,
        Op::BitwiseXor,
        Op::BitwiseAnd,
        Op::Not,
        Op::ControlBarrier,
        Op::MemoryBarrier,
        Op::Dot,
        Op::Transpose,
        Op::DPdx,
        Op::DPdy,
        Op::Fwidth,
        Op::BitCount,
        Op::BitReverse,
        Op::LoopMerge,
        Op::SelectionMerge,
        Op::Label,
        Op::Branch,
        Op::BranchConditional,
        Op::Switch,
        Op::Kill,
        Op::Return,
        Op::ReturnValue,
        Op::Unreachable,
        Op::EmitVertex,
        Op::EndPrimitive,
    ];
    KNOWN.iter().copied().find(|&op| op as u16 == value)
}
