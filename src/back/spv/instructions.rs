//! Encoded SPIR-V instructions and their constructors.

use spirv::{Op, Word};

/// A single SPIR-V instruction: opcode, optional type/result ids, operands.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub op: Op,
    pub wc: u32,
    pub type_id: Option<Word>,
    pub result_id: Option<Word>,
    pub operands: Vec<Word>,
}

impl Instruction {
    pub(super) fn new(op: Op) -> Self {
        Instruction {
            op,
            wc: 1,
            type_id: None,
            result_id: None,
            operands: vec![],
        }
    }

    pub(super) fn set_type(&mut self, id: Word) {
        assert!(self.type_id.is_none(), "can't set type twice");
        self.type_id = Some(id);
        self.wc += 1;
    }

    pub(super) fn set_result(&mut self, id: Word) {
        assert!(self.result_id.is_none(), "can't set result twice");
        self.result_id = Some(id);
        self.wc += 1;
    }

    pub(super) fn add_operand(&mut self, operand: Word) {
        self.operands.push(operand);
        self.wc += 1;
    }

    pub(super) fn add_operands(&mut self, operands: impl IntoIterator<Item = Word>) {
        for operand in operands {
            self.add_operand(operand)
        }
    }

    /// Append a UTF-8 string operand, NUL-terminated and padded to words.
    pub(super) fn add_string(&mut self, string: &str) {
        self.add_operands(string_to_words(string));
    }

    pub(super) fn to_words(&self, sink: &mut Vec<Word>) {
        sink.push(self.wc << 16 | self.op as u32);
        sink.extend(self.type_id);
        sink.extend(self.result_id);
        sink.extend(self.operands.iter());
    }

    //
    // Mode-setting instructions.
    //

    pub(super) fn capability(capability: spirv::Capability) -> Self {
        let mut instruction = Instruction::new(Op::Capability);
        instruction.add_operand(capability as u32);
        instruction
    }

    pub(super) fn extension(name: &str) -> Self {
        let mut instruction = Instruction::new(Op::Extension);
        instruction.add_string(name);
        instruction
    }

    pub(super) fn ext_inst_import(id: Word, name: &str) -> Self {
        let mut instruction = Instruction::new(Op::ExtInstImport);
        instruction.set_result(id);
        instruction.add_string(name);
        instruction
    }

    pub(super) fn memory_model(
        addressing_model: spirv::AddressingModel,
        memory_model: spirv::MemoryModel,
    ) -> Self {
        let mut instruction = Instruction::new(Op::MemoryModel);
        instruction.add_operand(addressing_model as u32);
        instruction.add_operand(memory_model as u32);
        instruction
    }

    pub(super) fn entry_point(
        execution_model: spirv::ExecutionModel,
        entry_point_id: Word,
        name: &str,
        interface_ids: &[Word],
    ) -> Self {
        let mut instruction = Instruction::new(Op::EntryPoint);
        instruction.add_operand(execution_model as u32);
        instruction.add_operand(entry_point_id);
        instruction.add_string(name);
        instruction.add_operands(interface_ids.iter().copied());
        instruction
    }

    pub(super) fn execution_mode(
        entry_point_id: Word,
        execution_mode: spirv::ExecutionMode,
        args: &[Word],
    ) -> Self {
        let mut instruction = Instruction::new(Op::ExecutionMode);
        instruction.add_operand(entry_point_id);
        instruction.add_operand(execution_mode as u32);
        instruction.add_operands(args.iter().copied());
        instruction
    }

    //
    // Debug instructions.
    //

    pub(super) fn string(name: &str, id: Word) -> Self {
        let mut instruction = Instruction::new(Op::String);
        instruction.set_result(id);
        instruction.add_string(name);
        instruction
    }

    pub(super) fn source(
        source_language: spirv::SourceLanguage,
        version: u32,
        source: Option<(Word, &str)>,
    ) -> Self {
        let mut instruction = Instruction::new(Op::Source);
        instruction.add_operand(source_language as u32);
        instruction.add_operands([version]);
        if let Some((file_id, text)) = source {
            instruction.add_operand(file_id);
            instruction.add_string(text);
        }
        instruction
    }

    pub(super) fn name(target_id: Word, name: &str) -> Self {
        let mut instruction = Instruction::new(Op::Name);
        instruction.add_operand(target_id);
        instruction.add_string(name);
        instruction
    }

    pub(super) fn member_name(target_id: Word, member: Word, name: &str) -> Self {
        let mut instruction = Instruction::new(Op::MemberName);
        instruction.add_operand(target_id);
        instruction.add_operand(member);
        instruction.add_string(name);
        instruction
    }

    //
    // Annotation instructions.
    //

    pub(super) fn decorate(target_id: Word, decoration: spirv::Decoration, operands: &[Word]) -> Self {
        let mut instruction = Instruction::new(Op::Decorate);
        instruction.add_operand(target_id);
        instruction.add_operand(decoration as u32);
        instruction.add_operands(operands.iter().copied());
        instruction
    }

    pub(super) fn member_decorate(
        target_id: Word,
        member_index: Word,
        decoration: spirv::Decoration,
        operands: &[Word],
    ) -> Self {
        let mut instruction = Instruction::new(Op::MemberDecorate);
        instruction.add_operand(target_id);
        instruction.add_operand(member_index);
        instruction.add_operand(decoration as u32);
        instruction.add_operands(operands.iter().copied());
        instruction
    }

    //
    // Type instructions.
    //

    pub(super) fn type_void(id: Word) -> Self {
        let mut instruction = Instruction::new(Op::TypeVoid);
        instruction.set_result(id);
        instruction
    }

    pub(super) fn type_bool(id: Word) -> Self {
        let mut instruction = Instruction::new(Op::TypeBool);
        instruction.set_result(id);
        instruction
    }

    pub(super) fn type_int(id: Word, width: Word, signedness: Word) -> Self {
        let mut instruction = Instruction::new(Op::TypeInt);
        instruction.set_result(id);
        instruction.add_operand(width);
        instruction.add_operand(signedness);
        instruction
    }

    pub(super) fn type_float(id: Word, width: Word) -> Self {
        let mut instruction = Instruction::new(Op::TypeFloat);
        instruction.set_result(id);
        instruction.add_operand(width);
        instruction
    }

    pub(super) fn type_vector(id: Word, component_type_id: Word, component_count: Word) -> Self {
        let mut instruction = Instruction::new(Op::TypeVector);
        instruction.set_result(id);
        instruction.add_operand(component_type_id);
        instruction.add_operand(component_count);
        instruction
    }

    pub(super) fn type_matrix(id: Word, column_type_id: Word, column_count: Word) -> Self {
        let mut instruction = Instruction::new(Op::TypeMatrix);
        instruction.set_result(id);
        instruction.add_operand(column_type_id);
        instruction.add_operand(column_count);
        instruction
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn type_image(
        id: Word,
        sampled_type_id: Word,
        dim: spirv::Dim,
        depth: Word,
        arrayed: bool,
        ms: bool,
        sampled: Word,
        format: spirv::ImageFormat,
    ) -> Self {
        let mut instruction = Instruction::new(Op::TypeImage);
        instruction.set_result(id);
        instruction.add_operand(sampled_type_id);
        instruction.add_operand(dim as u32);
        instruction.add_operand(depth);
        instruction.add_operand(arrayed as u32);
        instruction.add_operand(ms as u32);
        instruction.add_operand(sampled);
        instruction.add_operand(format as u32);
        instruction
    }

    pub(super) fn type_sampler(id: Word) -> Self {
        let mut instruction = Instruction::new(Op::TypeSampler);
        instruction.set_result(id);
        instruction
    }

    pub(super) fn type_sampled_image(id: Word, image_type_id: Word) -> Self {
        let mut instruction = Instruction::new(Op::TypeSampledImage);
        instruction.set_result(id);
        instruction.add_operand(image_type_id);
        instruction
    }

    pub(super) fn type_acceleration_structure(id: Word) -> Self {
        let mut instruction = Instruction::new(Op::TypeAccelerationStructureKHR);
        instruction.set_result(id);
        instruction
    }

    pub(super) fn type_array(id: Word, element_type_id: Word, length_id: Word) -> Self {
        let mut instruction = Instruction::new(Op::TypeArray);
        instruction.set_result(id);
        instruction.add_operand(element_type_id);
        instruction.add_operand(length_id);
        instruction
    }

    pub(super) fn type_runtime_array(id: Word, element_type_id: Word) -> Self {
        let mut instruction = Instruction::new(Op::TypeRuntimeArray);
        instruction.set_result(id);
        instruction.add_operand(element_type_id);
        instruction
    }

    pub(super) fn type_struct(id: Word, member_ids: &[Word]) -> Self {
        let mut instruction = Instruction::new(Op::TypeStruct);
        instruction.set_result(id);
        instruction.add_operands(member_ids.iter().copied());
        instruction
    }

    pub(super) fn type_pointer(
        id: Word,
        storage_class: spirv::StorageClass,
        type_id: Word,
    ) -> Self {
        let mut instruction = Instruction::new(Op::TypePointer);
        instruction.set_result(id);
        instruction.add_operand(storage_class as u32);
        instruction.add_operand(type_id);
        instruction
    }

    pub(super) fn type_forward_pointer(id: Word, storage_class: spirv::StorageClass) -> Self {
        let mut instruction = Instruction::new(Op::TypeForwardPointer);
        instruction.add_operand(id);
        instruction.add_operand(storage_class as u32);
        instruction
    }

    pub(super) fn type_function(id: Word, return_type_id: Word, parameter_ids: &[Word]) -> Self {
        let mut instruction = Instruction::new(Op::TypeFunction);
        instruction.set_result(id);
        instruction.add_operand(return_type_id);
        instruction.add_operands(parameter_ids.iter().copied());
        instruction
    }

    //
    // Constant instructions.
    //

    pub(super) fn constant_true(result_type_id: Word, id: Word) -> Self {
        let mut instruction = Instruction::new(Op::ConstantTrue);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction
    }

    pub(super) fn constant_false(result_type_id: Word, id: Word) -> Self {
        let mut instruction = Instruction::new(Op::ConstantFalse);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction
    }

    pub(super) fn constant(result_type_id: Word, id: Word, values: &[Word]) -> Self {
        let mut instruction = Instruction::new(Op::Constant);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operands(values.iter().copied());
        instruction
    }

    pub(super) fn constant_composite(
        result_type_id: Word,
        id: Word,
        constituent_ids: &[Word],
    ) -> Self {
        let mut instruction = Instruction::new(Op::ConstantComposite);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operands(constituent_ids.iter().copied());
        instruction
    }

    pub(super) fn constant_null(result_type_id: Word, id: Word) -> Self {
        let mut instruction = Instruction::new(Op::ConstantNull);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction
    }

    pub(super) fn spec_constant(result_type_id: Word, id: Word, values: &[Word]) -> Self {
        let mut instruction = Instruction::new(Op::SpecConstant);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operands(values.iter().copied());
        instruction
    }

    //
    // Memory instructions.
    //

    pub(super) fn variable(
        result_type_id: Word,
        id: Word,
        storage_class: spirv::StorageClass,
        initializer_id: Option<Word>,
    ) -> Self {
        let mut instruction = Instruction::new(Op::Variable);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(storage_class as u32);
        if let Some(initializer_id) = initializer_id {
            instruction.add_operand(initializer_id);
        }
        instruction
    }

    pub(super) fn load(result_type_id: Word, id: Word, pointer_id: Word) -> Self {
        let mut instruction = Instruction::new(Op::Load);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(pointer_id);
        instruction
    }

    pub(super) fn store(pointer_id: Word, value_id: Word) -> Self {
        let mut instruction = Instruction::new(Op::Store);
        instruction.add_operand(pointer_id);
        instruction.add_operand(value_id);
        instruction
    }

    pub(super) fn access_chain(
        result_type_id: Word,
        id: Word,
        base_id: Word,
        index_ids: &[Word],
    ) -> Self {
        let mut instruction = Instruction::new(Op::AccessChain);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(base_id);
        instruction.add_operands(index_ids.iter().copied());
        instruction
    }

    //
    // Function instructions.
    //

    pub(super) fn function(
        return_type_id: Word,
        id: Word,
        function_control: spirv::FunctionControl,
        function_type_id: Word,
    ) -> Self {
        let mut instruction = Instruction::new(Op::Function);
        instruction.set_type(return_type_id);
        instruction.set_result(id);
        instruction.add_operand(function_control.bits());
        instruction.add_operand(function_type_id);
        instruction
    }

    pub(super) fn function_parameter(result_type_id: Word, id: Word) -> Self {
        let mut instruction = Instruction::new(Op::FunctionParameter);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction
    }

    pub(super) fn function_end() -> Self {
        Instruction::new(Op::FunctionEnd)
    }

    pub(super) fn function_call(
        result_type_id: Word,
        id: Word,
        function_id: Word,
        argument_ids: &[Word],
    ) -> Self {
        let mut instruction = Instruction::new(Op::FunctionCall);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(function_id);
        instruction.add_operands(argument_ids.iter().copied());
        instruction
    }

    //
    // Image instructions.
    //

    pub(super) fn sampled_image(
        result_type_id: Word,
        id: Word,
        image: Word,
        sampler: Word,
    ) -> Self {
        let mut instruction = Instruction::new(Op::SampledImage);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(image);
        instruction.add_operand(sampler);
        instruction
    }

    pub(super) fn image_sample(
        result_type_id: Word,
        id: Word,
        op: Op,
        sampled_image: Word,
        coordinates: Word,
        extra: &[Word],
    ) -> Self {
        let mut instruction = Instruction::new(op);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(sampled_image);
        instruction.add_operand(coordinates);
        instruction.add_operands(extra.iter().copied());
        instruction
    }

    pub(super) fn image_fetch_or_read(
        op: Op,
        result_type_id: Word,
        id: Word,
        image: Word,
        coordinates: Word,
    ) -> Self {
        let mut instruction = Instruction::new(op);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(image);
        instruction.add_operand(coordinates);
        instruction
    }

    pub(super) fn image_write(image: Word, coordinates: Word, texel: Word) -> Self {
        let mut instruction = Instruction::new(Op::ImageWrite);
        instruction.add_operand(image);
        instruction.add_operand(coordinates);
        instruction.add_operand(texel);
        instruction
    }

    pub(super) fn image_query(op: Op, result_type_id: Word, id: Word, image: Word) -> Self {
        let mut instruction = Instruction::new(op);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(image);
        instruction
    }

    //
    // Arithmetic and logic.
    //

    pub(super) fn unary(op: Op, result_type_id: Word, id: Word, value: Word) -> Self {
        let mut instruction = Instruction::new(op);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(value);
        instruction
    }

    pub(super) fn binary(
        op: Op,
        result_type_id: Word,
        id: Word,
        operand_1: Word,
        operand_2: Word,
    ) -> Self {
        let mut instruction = Instruction::new(op);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(operand_1);
        instruction.add_operand(operand_2);
        instruction
    }

    pub(super) fn ternary(
        op: Op,
        result_type_id: Word,
        id: Word,
        operand_1: Word,
        operand_2: Word,
        operand_3: Word,
    ) -> Self {
        let mut instruction = Instruction::new(op);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(operand_1);
        instruction.add_operand(operand_2);
        instruction.add_operand(operand_3);
        instruction
    }

    pub(super) fn ext_inst(
        set_id: Word,
        op: Word,
        result_type_id: Word,
        id: Word,
        operands: &[Word],
    ) -> Self {
        let mut instruction = Instruction::new(Op::ExtInst);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(set_id);
        instruction.add_operand(op);
        instruction.add_operands(operands.iter().copied());
        instruction
    }

    pub(super) fn composite_construct(
        result_type_id: Word,
        id: Word,
        constituent_ids: &[Word],
    ) -> Self {
        let mut instruction = Instruction::new(Op::CompositeConstruct);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operands(constituent_ids.iter().copied());
        instruction
    }

    pub(super) fn composite_extract(
        result_type_id: Word,
        id: Word,
        composite_id: Word,
        indices: &[Word],
    ) -> Self {
        let mut instruction = Instruction::new(Op::CompositeExtract);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(composite_id);
        instruction.add_operands(indices.iter().copied());
        instruction
    }

    pub(super) fn vector_shuffle(
        result_type_id: Word,
        id: Word,
        v1_id: Word,
        v2_id: Word,
        components: &[Word],
    ) -> Self {
        let mut instruction = Instruction::new(Op::VectorShuffle);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(v1_id);
        instruction.add_operand(v2_id);
        instruction.add_operands(components.iter().copied());
        instruction
    }

    pub(super) fn select(
        result_type_id: Word,
        id: Word,
        condition_id: Word,
        accept_id: Word,
        reject_id: Word,
    ) -> Self {
        Instruction::ternary(Op::Select, result_type_id, id, condition_id, accept_id, reject_id)
    }

    //
    // Control flow.
    //

    pub(super) fn label(id: Word) -> Self {
        let mut instruction = Instruction::new(Op::Label);
        instruction.set_result(id);
        instruction
    }

    pub(super) fn branch(target_id: Word) -> Self {
        let mut instruction = Instruction::new(Op::Branch);
        instruction.add_operand(target_id);
        instruction
    }

    pub(super) fn branch_conditional(
        condition_id: Word,
        true_label: Word,
        false_label: Word,
    ) -> Self {
        let mut instruction = Instruction::new(Op::BranchConditional);
        instruction.add_operand(condition_id);
        instruction.add_operand(true_label);
        instruction.add_operand(false_label);
        instruction
    }

    pub(super) fn switch(selector_id: Word, default_id: Word, cases: &[(Word, Word)]) -> Self {
        let mut instruction = Instruction::new(Op::Switch);
        instruction.add_operand(selector_id);
        instruction.add_operand(default_id);
        for &(value, label) in cases {
            instruction.add_operand(value);
            instruction.add_operand(label);
        }
        instruction
    }

    pub(super) fn selection_merge(
        merge_id: Word,
        selection_control: spirv::SelectionControl,
    ) -> Self {
        let mut instruction = Instruction::new(Op::SelectionMerge);
        instruction.add_operand(merge_id);
        instruction.add_operand(selection_control.bits());
        instruction
    }

    pub(super) fn loop_merge(
        merge_id: Word,
        continuing_id: Word,
        loop_control: spirv::LoopControl,
    ) -> Self {
        let mut instruction = Instruction::new(Op::LoopMerge);
        instruction.add_operand(merge_id);
        instruction.add_operand(continuing_id);
        instruction.add_operand(loop_control.bits());
        instruction
    }

    pub(super) fn return_void() -> Self {
        Instruction::new(Op::Return)
    }

    pub(super) fn return_value(value_id: Word) -> Self {
        let mut instruction = Instruction::new(Op::ReturnValue);
        instruction.add_operand(value_id);
        instruction
    }

    pub(super) fn kill() -> Self {
        Instruction::new(Op::Kill)
    }

    pub(super) fn unreachable() -> Self {
        Instruction::new(Op::Unreachable)
    }

    //
    // Primitive instructions.
    //

    pub(super) fn emit_vertex() -> Self {
        Instruction::new(Op::EmitVertex)
    }

    pub(super) fn end_primitive() -> Self {
        Instruction::new(Op::EndPrimitive)
    }

    pub(super) fn control_barrier(
        execution_scope: Word,
        memory_scope: Word,
        semantics: Word,
    ) -> Self {
        let mut instruction = Instruction::new(Op::ControlBarrier);
        instruction.add_operand(execution_scope);
        instruction.add_operand(memory_scope);
        instruction.add_operand(semantics);
        instruction
    }

    pub(super) fn memory_barrier(memory_scope: Word, semantics: Word) -> Self {
        let mut instruction = Instruction::new(Op::MemoryBarrier);
        instruction.add_operand(memory_scope);
        instruction.add_operand(semantics);
        instruction
    }
}

pub(super) fn bytes_to_words(bytes: &[u8]) -> Vec<Word> {
    bytes
        .chunks(4)
        .map(|chars| chars.iter().rev().fold(0u32, |u, c| (u << 8) | *c as u32))
        .collect()
}

/// Encode a string as NUL-terminated little-endian words.
pub(super) fn string_to_words(input: &str) -> Vec<Word> {
    let bytes = input.as_bytes();
    let mut words = bytes_to_words(bytes);
    if bytes.len() % 4 == 0 {
        // nul-termination
        words.push(0x0u32);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_count_tracks_operands() {
        let mut instruction = Instruction::new(Op::TypeInt);
        instruction.set_result(3);
        instruction.add_operand(32);
        instruction.add_operand(1);
        let mut words = Vec::new();
        instruction.to_words(&mut words);
        assert_eq!(words, vec![(4 << 16) | Op::TypeInt as u32, 3, 32, 1]);
    }

    #[test]
    fn strings_are_nul_terminated_and_padded() {
        assert_eq!(string_to_words("main"), vec![0x6e69616d, 0]);
        assert_eq!(string_to_words("ab"), vec![0x00006261]);
    }
}
