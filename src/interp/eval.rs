//! Compile-time expression evaluation.
//!
//! Evaluation happens on the interpreter's value stack: a byte arena
//! plus a parallel index stack forming a LIFO of values. Every
//! `evaluate_expr` call leaves exactly one value on top; the caller
//! pops it when it is consumed.
//!
//! Value representations are keyed by the expression's type: tagged
//! comp-integer bits, IEEE bits for floats, an interned id for comp
//! strings, a raw type id for type values, little-endian two's
//! complement for sized integers, and a `{global, offset}` pair for
//! expressions that denote storage locations (assignable types) and
//! for pointer values.

use crate::ast::{
    AstFlags, AstNodeId, AstTag, BlockData, ValCharData, ValFloatData, ValIntegerData,
    ValStringData,
};
use crate::comp_values::{CompFloatValue, CompIntegerValue};
use crate::diagnostics::fatal;
use crate::globals::GlobalValueId;
use crate::lexer::Builtin;
use crate::source::SourceId;
use crate::types::{FuncType, MemberInfo, TypeId, TypeStructure, TypeTag};

use super::Interpreter;

/// A value on the interpreter's value stack.
#[derive(Clone, Copy, Debug)]
pub struct StackVal {
    offset: u32,
    len: u32,
}

/// Qword-aligned byte arena plus the index stack of live values.
pub struct ValueStack {
    bytes: Vec<u8>,
    marks: Vec<u32>,
}

impl ValueStack {
    pub fn new() -> Self {
        Self {
            bytes: Vec::with_capacity(1 << 12),
            marks: Vec::with_capacity(64),
        }
    }

    pub fn alloc(&mut self, size: u64, align: u32) -> StackVal {
        debug_assert!(align.is_power_of_two());

        if size > u64::from(u32::MAX >> 1) {
            fatal(format_args!(
                "size {} of type exceeds the maximum interpreter-stack-allocatable size",
                size
            ));
        }

        self.marks.push(self.bytes.len() as u32);

        let misalignment = self.bytes.len() % align as usize;

        if misalignment != 0 {
            self.bytes
                .resize(self.bytes.len() + align as usize - misalignment, 0);
        }

        let offset = self.bytes.len() as u32;

        self.bytes.resize(self.bytes.len() + size as usize, 0);

        StackVal {
            offset,
            len: size as u32,
        }
    }

    pub fn pop(&mut self) {
        let mark = self.marks.pop().expect("pop of empty value stack");

        self.bytes.truncate(mark as usize);
    }

    pub fn bytes(&self, val: StackVal) -> &[u8] {
        &self.bytes[val.offset as usize..(val.offset + val.len) as usize]
    }

    pub fn bytes_mut(&mut self, val: StackVal) -> &mut [u8] {
        &mut self.bytes[val.offset as usize..(val.offset + val.len) as usize]
    }

    pub fn depth(&self) -> usize {
        self.marks.len()
    }
}

impl Default for ValueStack {
    fn default() -> Self {
        Self::new()
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(bytes[..4].try_into().expect("at least four bytes"))
}

fn read_u64(bytes: &[u8]) -> u64 {
    u64::from_le_bytes(bytes[..8].try_into().expect("at least eight bytes"))
}

/// Reads a sized little-endian integer, sign-extending when signed.
fn read_int(bytes: &[u8], is_signed: bool) -> i128 {
    let mut value = 0u128;

    for (i, &b) in bytes.iter().enumerate() {
        value |= u128::from(b) << (8 * i);
    }

    if is_signed && !bytes.is_empty() && bytes[bytes.len() - 1] & 0x80 != 0 {
        // Sign-extend.
        value |= u128::MAX << (8 * bytes.len() as u32).min(127);
    }

    value as i128
}

fn int_to_bytes(value: i128, size: usize) -> Vec<u8> {
    (0..size).map(|i| (value >> (8 * i)) as u8).collect()
}

fn int_fits(value: i128, bits: u16, is_signed: bool) -> bool {
    if is_signed {
        let min = -(1i128 << (bits - 1));
        let max = (1i128 << (bits - 1)) - 1;

        value >= min && value <= max
    } else {
        value >= 0 && (bits >= 128 || value < 1i128 << bits)
    }
}

impl Interpreter {
    /// Evaluates a typechecked expression, leaving its value on top of
    /// the value stack.
    pub(crate) fn evaluate_expr(&mut self, node: AstNodeId) -> StackVal {
        let node_type = self.asts.type_id(node);

        debug_assert!(node_type != TypeId::INVALID && node_type != TypeId::CHECKING);

        let source = self.asts.source_id(node);

        match self.asts.tag(node) {
            AstTag::ValInteger => {
                let data: ValIntegerData = self.asts.attachment(node);

                let value = CompIntegerValue::from_u64(data.value);

                self.push_bytes(&value.to_bits().to_le_bytes(), 8)
            }

            AstTag::ValFloat => {
                let data: ValFloatData = self.asts.attachment(node);

                let value = CompFloatValue::from_f64(data.value);

                self.push_bytes(&value.to_bits().to_le_bytes(), 8)
            }

            AstTag::ValChar => {
                let data: ValCharData = self.asts.attachment(node);

                let value = CompIntegerValue::from_u64(u64::from(data.codepoint));

                self.push_bytes(&value.to_bits().to_le_bytes(), 8)
            }

            AstTag::ValString => {
                let data: ValStringData = self.asts.attachment(node);

                self.push_bytes(&data.string_id.0.to_le_bytes(), 4)
            }

            AstTag::Builtin => {
                let builtin = Builtin::from_ordinal(self.asts.flags(node).0);

                match builtin {
                    Builtin::Type => self.push_type_value(TypeStructure::Type),
                    Builtin::Definition => self.push_type_value(TypeStructure::Definition),
                    Builtin::CompInteger => self.push_type_value(TypeStructure::CompInteger),
                    Builtin::CompFloat => self.push_type_value(TypeStructure::CompFloat),
                    Builtin::CompString => self.push_type_value(TypeStructure::CompString),
                    Builtin::TypeBuilder => self.push_type_value(TypeStructure::TypeBuilder),
                    Builtin::True => self.push_bytes(&[1], 1),
                    callable => {
                        // Callable builtins evaluate to a function
                        // value carrying their ordinal.
                        self.push_bytes(&(callable as u64 + 1).to_le_bytes(), 8)
                    }
                }
            }

            AstTag::ValIdentifier => {
                let (surrounding, rank) = *self
                    .identifier_resolutions
                    .get(&node)
                    .expect("identifier was typechecked before evaluation");

                let info = self
                    .types
                    .member_info_by_rank(surrounding, rank)
                    .expect("member rank is stable");

                let global = self.ensure_member_global(&info);

                if node_type.is_assignable() {
                    self.push_reference(global, 0)
                } else {
                    let bytes = self.globals.bytes(global).to_vec();

                    let align = self.types.metrics_from_id(node_type).align;

                    self.push_bytes(&bytes, align)
                }
            }

            AstTag::If => {
                let condition = self.asts.first_child_of(node);

                let condition_value = self.evaluate_value_of(condition);

                let taken = condition_value[0] != 0;

                let consequent = self.asts.next_sibling_of(condition);

                if taken {
                    let value = self.evaluate_expr(consequent);

                    self.adjust_to(consequent, value, node_type)
                } else if self.asts.has_flag(node, AstFlags::IF_HAS_ELSE) {
                    let alternative = self.asts.next_sibling_of(consequent);

                    let value = self.evaluate_expr(alternative);

                    self.adjust_to(alternative, value, node_type)
                } else {
                    self.value_stack.alloc(0, 1)
                }
            }

            AstTag::Block => {
                let data: BlockData = self.asts.attachment(node);

                let scope_type_id = data.scope_type_id;

                debug_assert!(scope_type_id != TypeId::INVALID);

                let mut result = None;

                let mut definition_rank = 0u16;

                let mut it = self.asts.direct_children_of(node);

                while let Some(child) = it.next(&self.asts) {
                    let is_last = !self.asts.has_next_sibling(child);

                    if self.asts.tag(child) == AstTag::Definition {
                        if is_last {
                            let info = self
                                .types
                                .member_info_by_rank(scope_type_id, definition_rank)
                                .expect("every block definition has a member");

                            let global = self.ensure_member_global(&info);

                            let bytes = self.globals.bytes(global).to_vec();

                            let align = self.types.metrics_from_id(node_type).align;

                            result = Some(self.push_bytes(&bytes, align));
                        }

                        definition_rank += 1;
                    } else {
                        let value = self.evaluate_expr(child);

                        if is_last {
                            result = Some(self.adjust_to(child, value, node_type));
                        } else {
                            self.value_stack.pop();
                        }
                    }
                }

                result.unwrap_or_else(|| self.value_stack.alloc(0, 1))
            }

            AstTag::OpMember => self.evaluate_member_access(node),

            AstTag::Call => self.evaluate_call(node),

            AstTag::UOpEval => {
                let operand = self.asts.first_child_of(node);

                self.evaluate_expr(operand)
            }

            AstTag::UOpAddr => {
                let operand = self.asts.first_child_of(node);

                // The operand denotes a storage location, so its value
                // bytes are already the `{global, offset}` pair the
                // pointer consists of.
                self.evaluate_expr(operand)
            }

            AstTag::UOpDeref => {
                let operand = self.asts.first_child_of(node);

                let pointer = self.evaluate_value_of(operand);

                let global = GlobalValueId(read_u32(&pointer));

                let target_offset = read_u32(&pointer[4..]);

                if !global.is_valid() {
                    self.error(
                        source,
                        format_args!("Dereference of an invalid compile-time pointer"),
                    );
                }

                if node_type.is_assignable() {
                    self.push_reference(global, target_offset)
                } else {
                    let metrics = self.types.metrics_from_id(node_type);

                    let bytes = self.globals.bytes(global)
                        [target_offset as usize..(u64::from(target_offset) + metrics.size) as usize]
                        .to_vec();

                    self.push_bytes(&bytes, metrics.align)
                }
            }

            AstTag::UOpTypeSlice | AstTag::UOpTypeTailArray => {
                let operand = self.asts.first_child_of(node);

                let element = self.evaluate_type_value(operand);

                let is_mut = self.asts.has_flag(node, AstFlags::TYPE_IS_MUT)
                    || self.asts.tag(node) == AstTag::UOpTypeTailArray;

                let slice = self
                    .types
                    .id_from_structure(TypeStructure::Slice(crate::types::ReferenceType {
                        referenced_type_id: element.set_assignability(is_mut),
                        is_multi: false,
                        is_opt: false,
                    }));

                self.push_bytes(&slice.to_raw().to_le_bytes(), 4)
            }

            AstTag::UOpTypePtr
            | AstTag::UOpTypeOptPtr
            | AstTag::UOpTypeMultiPtr
            | AstTag::UOpTypeOptMultiPtr => {
                let operand = self.asts.first_child_of(node);

                let pointee = self.evaluate_type_value(operand);

                let tag = self.asts.tag(node);

                let is_mut = self.asts.has_flag(node, AstFlags::TYPE_IS_MUT);

                let pointer = self
                    .types
                    .id_from_structure(TypeStructure::Ptr(crate::types::ReferenceType {
                        referenced_type_id: pointee.set_assignability(is_mut),
                        is_multi: matches!(
                            tag,
                            AstTag::UOpTypeMultiPtr | AstTag::UOpTypeOptMultiPtr
                        ),
                        is_opt: matches!(
                            tag,
                            AstTag::UOpTypeOptPtr | AstTag::UOpTypeOptMultiPtr
                        ),
                    }));

                self.push_bytes(&pointer.to_raw().to_le_bytes(), 4)
            }

            AstTag::UOpTypeVar => self.error(
                source,
                format_args!("Evaluation of variadic type constructors is not implemented yet"),
            ),

            AstTag::OpTypeArray => {
                let count_node = self.asts.first_child_of(node);

                let count_value = self.evaluate_value_of(count_node);

                let count_type = self.asts.type_id(count_node);

                let count = match self.types.tag_from_id(count_type) {
                    TypeTag::CompInteger => {
                        CompIntegerValue::from_bits(read_u64(&count_value)).as_u64(64)
                    }
                    _ => {
                        let (_, is_signed) = self.integer_shape(count_type);

                        u64::try_from(read_int(&count_value, is_signed)).ok()
                    }
                };

                let count = match count {
                    Some(count) => count,
                    None => self.error(
                        self.asts.source_id(count_node),
                        format_args!("Array count must be non-negative"),
                    ),
                };

                let element_node = self.asts.next_sibling_of(count_node);

                let element = self.evaluate_type_value(element_node);

                let array = self
                    .types
                    .id_from_structure(TypeStructure::Array(crate::types::ArrayType {
                        element_type: element.set_assignability(true),
                        element_count: count,
                    }));

                self.push_bytes(&array.to_raw().to_le_bytes(), 4)
            }

            AstTag::UOpDistinct => {
                let operand = self.asts.first_child_of(node);

                let aliased = self.evaluate_type_value(operand);

                let alias = self.types.alias_type(
                    aliased,
                    true,
                    source,
                    crate::identifiers::IdentifierId::INVALID,
                );

                self.push_bytes(&alias.to_raw().to_le_bytes(), 4)
            }

            AstTag::UOpLogNot => {
                let operand = self.asts.first_child_of(node);

                let value = self.evaluate_value_of(operand);

                let flipped = u8::from(value[0] == 0);

                self.push_bytes(&[flipped], 1)
            }

            AstTag::UOpBitNot => {
                let operand = self.asts.first_child_of(node);

                let value = self.evaluate_value_of(operand);

                match self.types.tag_from_id(node_type) {
                    TypeTag::CompInteger => {
                        let operand_value = self.comp_integer_operand(operand, &value);

                        let result = CompIntegerValue::from_s64(!operand_value.value());

                        self.push_bytes(&result.to_bits().to_le_bytes(), 8)
                    }
                    TypeTag::Integer => {
                        let (bits, is_signed) = self.integer_shape(node_type);

                        let operand_value = read_int(&value, is_signed);

                        let result = wrap_int(!operand_value, bits, is_signed);

                        self.push_bytes(&int_to_bytes(result, value.len()), value.len() as u32)
                    }
                    _ => unreachable!("typechecking admits only integral operands"),
                }
            }

            AstTag::UOpNegate => {
                let operand = self.asts.first_child_of(node);

                let value = self.evaluate_value_of(operand);

                match self.types.tag_from_id(node_type) {
                    TypeTag::CompInteger => {
                        let operand_value = self.comp_integer_operand(operand, &value);

                        let result = operand_value.neg();

                        self.push_bytes(&result.to_bits().to_le_bytes(), 8)
                    }
                    TypeTag::Integer => {
                        let (bits, is_signed) = self.integer_shape(node_type);

                        let operand_value = read_int(&value, is_signed);

                        let result = -operand_value;

                        if !int_fits(result, bits, is_signed) {
                            self.error(
                                source,
                                format_args!("Negation overflows the operand's type"),
                            );
                        }

                        self.push_bytes(&int_to_bytes(result, value.len()), value.len() as u32)
                    }
                    TypeTag::Float => {
                        let result = -self.float_operand(node_type, &value);

                        self.push_float(node_type, result)
                    }
                    TypeTag::CompFloat => self.error(
                        source,
                        format_args!("Compile-time float arithmetic is not implemented yet"),
                    ),
                    _ => unreachable!("typechecking admits only numeric operands"),
                }
            }

            AstTag::UOpPos => {
                let operand = self.asts.first_child_of(node);

                let value = self.evaluate_value_of(operand);

                let align = self.types.metrics_from_id(node_type).align;

                self.push_bytes(&value, align)
            }

            AstTag::OpAdd
            | AstTag::OpSub
            | AstTag::OpMul
            | AstTag::OpDiv
            | AstTag::OpMod
            | AstTag::OpAddTC
            | AstTag::OpSubTC
            | AstTag::OpMulTC
            | AstTag::OpBitAnd
            | AstTag::OpBitOr
            | AstTag::OpBitXor
            | AstTag::OpShiftL
            | AstTag::OpShiftR => self.evaluate_binary_numeric(node),

            AstTag::OpLogAnd => {
                let lhs = self.asts.first_child_of(node);

                let lhs_value = self.evaluate_value_of(lhs);

                if lhs_value[0] == 0 {
                    self.push_bytes(&[0], 1)
                } else {
                    let rhs = self.asts.next_sibling_of(lhs);

                    let rhs_value = self.evaluate_value_of(rhs);

                    self.push_bytes(&[rhs_value[0]], 1)
                }
            }

            AstTag::OpLogOr => {
                let lhs = self.asts.first_child_of(node);

                let lhs_value = self.evaluate_value_of(lhs);

                if lhs_value[0] != 0 {
                    self.push_bytes(&[1], 1)
                } else {
                    let rhs = self.asts.next_sibling_of(lhs);

                    let rhs_value = self.evaluate_value_of(rhs);

                    self.push_bytes(&[rhs_value[0]], 1)
                }
            }

            AstTag::OpCmpLT
            | AstTag::OpCmpGT
            | AstTag::OpCmpLE
            | AstTag::OpCmpGE
            | AstTag::OpCmpNE
            | AstTag::OpCmpEQ => self.evaluate_comparison(node),

            AstTag::OpSet
            | AstTag::OpSetAdd
            | AstTag::OpSetSub
            | AstTag::OpSetMul
            | AstTag::OpSetDiv
            | AstTag::OpSetAddTC
            | AstTag::OpSetSubTC
            | AstTag::OpSetMulTC
            | AstTag::OpSetMod
            | AstTag::OpSetBitAnd
            | AstTag::OpSetBitOr
            | AstTag::OpSetBitXor
            | AstTag::OpSetShiftL
            | AstTag::OpSetShiftR => self.evaluate_assignment(node),

            AstTag::OpArrayIndex => self.error(
                source,
                format_args!("Evaluation of array indexing is not implemented yet"),
            ),

            other => self.error(
                source,
                format_args!(
                    "Evaluation of '{}' expressions is not implemented yet",
                    other.name()
                ),
            ),
        }
    }

    // Stack helpers.

    fn push_bytes(&mut self, bytes: &[u8], align: u32) -> StackVal {
        let val = self.value_stack.alloc(bytes.len() as u64, align);

        self.value_stack.bytes_mut(val).copy_from_slice(bytes);

        val
    }

    fn push_reference(&mut self, global: GlobalValueId, offset: u32) -> StackVal {
        let mut bytes = [0u8; 8];

        bytes[..4].copy_from_slice(&global.0.to_le_bytes());
        bytes[4..].copy_from_slice(&offset.to_le_bytes());

        self.push_bytes(&bytes, 8)
    }

    fn push_type_value(&mut self, structure: TypeStructure) -> StackVal {
        let type_id = self.types.id_from_structure(structure);

        self.push_bytes(&type_id.to_raw().to_le_bytes(), 4)
    }

    fn push_float(&mut self, float_type: TypeId, value: f64) -> StackVal {
        let bits = match self.types.primitive_structure(float_type) {
            TypeStructure::Float(float) => float.bits,
            _ => unreachable!("expected float type"),
        };

        if bits == 32 {
            self.push_bytes(&(value as f32).to_le_bytes(), 4)
        } else {
            self.push_bytes(&value.to_le_bytes(), 8)
        }
    }

    /// Re-represents a child's result value as `node_type`: resolves
    /// the reference indirection of assignable children and applies
    /// the implicit conversion when the child's type differs (a
    /// comp-typed branch feeding a concrete-typed `if`, say).
    fn adjust_to(&mut self, child: AstNodeId, val: StackVal, node_type: TypeId) -> StackVal {
        let child_type = self.asts.type_id(child);

        let needs_resolve = child_type.is_assignable() && !node_type.is_assignable();

        let needs_convert = self.types.dealias(child_type) != self.types.dealias(node_type);

        if !needs_resolve && !needs_convert {
            return val;
        }

        let bytes = self.read_resolved(child_type, val);

        let converted = self.convert_value(
            child_type,
            &bytes,
            node_type,
            self.asts.source_id(child),
        );

        self.value_stack.pop();

        let align = self.types.metrics_from_id(node_type).align;

        self.push_bytes(&converted, align)
    }

    /// Evaluates `node` and returns its value *bytes*, following the
    /// reference when the expression denotes a storage location. The
    /// stack value is popped.
    pub(crate) fn evaluate_value_of(&mut self, node: AstNodeId) -> Vec<u8> {
        let val = self.evaluate_expr(node);

        let bytes = self.read_resolved(self.asts.type_id(node), val);

        self.value_stack.pop();

        bytes
    }

    /// Evaluates a type expression to the type it denotes.
    pub(crate) fn evaluate_type_value(&mut self, node: AstNodeId) -> TypeId {
        debug_assert!(self.types.tag_from_id(self.asts.type_id(node)) == TypeTag::Type);

        let bytes = self.evaluate_value_of(node);

        TypeId::from_raw(read_u32(&bytes)).strip()
    }

    /// The value bytes of a stack entry, resolving the reference
    /// indirection of assignable expressions.
    fn read_resolved(&self, type_id: TypeId, val: StackVal) -> Vec<u8> {
        let bytes = self.value_stack.bytes(val);

        if !type_id.is_assignable() {
            return bytes.to_vec();
        }

        let global = GlobalValueId(read_u32(bytes));

        let offset = read_u32(&bytes[4..]) as usize;

        let size = self.types.metrics_from_id(type_id).size as usize;

        self.globals.bytes(global)[offset..offset + size].to_vec()
    }

    fn ref_target(&self, val: StackVal) -> (GlobalValueId, u32) {
        let bytes = self.value_stack.bytes(val);

        (GlobalValueId(read_u32(bytes)), read_u32(&bytes[4..]))
    }

    // Members and globals.

    /// Materializes the value of a member into global storage,
    /// evaluating its value expression on first demand.
    pub(crate) fn ensure_member_global(&mut self, info: &MemberInfo) -> GlobalValueId {
        let current = self
            .types
            .member_info_by_rank(info.surrounding_type_id, info.rank)
            .expect("member rank is stable");

        if current.global_value.is_valid() {
            return current.global_value;
        }

        let member_type = if current.has_pending_type() {
            self.delayed_typecheck_member(&current)
        } else {
            current.type_id
        };

        if current.opt_value_node == AstNodeId::INVALID {
            self.error(
                current.source,
                format_args!("Definition has no value to evaluate at compile time"),
            );
        }

        let key = (current.surrounding_type_id.to_raw(), current.rank);

        if !self.evaluating_members.insert(key) {
            self.error(
                current.source,
                format_args!("Cyclic dependency between compile-time values detected"),
            );
        }

        let value_node = current.opt_value_node;

        let bytes = self.evaluate_value_of(value_node);

        let converted = self.convert_value(
            self.asts.type_id(value_node),
            &bytes,
            member_type,
            self.asts.source_id(value_node),
        );

        let metrics = self.types.metrics_from_id(member_type);

        debug_assert!(converted.len() as u64 == metrics.size);

        let global = self.globals.make_global_value(
            member_type.set_assignability(current.is_mut),
            metrics.size,
            Some(&converted),
        );

        self.types.set_member_global_value_by_rank(
            current.surrounding_type_id,
            current.rank,
            global,
        );

        self.evaluating_members.remove(&key);

        global
    }

    /// Converts resolved value bytes from one type to another,
    /// following the implicit-conversion rules.
    fn convert_value(
        &self,
        from_type: TypeId,
        bytes: &[u8],
        to_type: TypeId,
        source: SourceId,
    ) -> Vec<u8> {
        let from = self.types.dealias(from_type);

        let to = self.types.dealias(to_type);

        if from == to {
            return bytes.to_vec();
        }

        match (
            self.types.primitive_structure(from).clone(),
            self.types.primitive_structure(to).clone(),
        ) {
            (TypeStructure::CompInteger, TypeStructure::Integer(integer)) => {
                let value = CompIntegerValue::from_bits(read_u64(bytes));

                let narrowed = if integer.is_signed {
                    value.as_s64(integer.bits as u8).map(|v| v as i128)
                } else {
                    value.as_u64(integer.bits as u8).map(|v| v as i128)
                };

                match narrowed {
                    Some(narrowed) => {
                        int_to_bytes(narrowed, u64::from(integer.bits).div_ceil(8) as usize)
                    }
                    None => self.error(
                        source,
                        format_args!(
                            "Compile-time integer does not fit the target integer type"
                        ),
                    ),
                }
            }

            (TypeStructure::CompFloat, TypeStructure::Float(float)) => {
                let value = f64::from_bits(read_u64(bytes));

                if float.bits == 32 {
                    (value as f32).to_le_bytes().to_vec()
                } else {
                    value.to_le_bytes().to_vec()
                }
            }

            (TypeStructure::CompString, TypeStructure::Slice(_))
            | (TypeStructure::CompString, TypeStructure::Array(_))
            | (TypeStructure::CompString, TypeStructure::Ptr(_)) => self.error(
                source,
                format_args!(
                    "Materializing compile-time strings as byte sequences is not implemented yet"
                ),
            ),

            _ => self.error(
                source,
                format_args!("Value cannot be implicitly converted to the expected type"),
            ),
        }
    }

    fn integer_shape(&self, type_id: TypeId) -> (u16, bool) {
        match self.types.primitive_structure(type_id) {
            TypeStructure::Integer(integer) => (integer.bits, integer.is_signed),
            _ => unreachable!("expected integer type"),
        }
    }

    fn float_operand(&self, float_type: TypeId, bytes: &[u8]) -> f64 {
        match self.types.primitive_structure(float_type) {
            TypeStructure::Float(float) if float.bits == 32 => {
                f32::from_le_bytes(bytes[..4].try_into().expect("four bytes")) as f64
            }
            TypeStructure::Float(_) => f64::from_bits(read_u64(bytes)),
            _ => unreachable!("expected float type"),
        }
    }

    fn comp_integer_operand(&self, node: AstNodeId, bytes: &[u8]) -> CompIntegerValue {
        debug_assert!(
            self.types.tag_from_id(self.asts.type_id(node)) == TypeTag::CompInteger
        );

        CompIntegerValue::from_bits(read_u64(bytes))
    }

    // Compound expression forms.

    fn evaluate_member_access(&mut self, node: AstNodeId) -> StackVal {
        let node_type = self.asts.type_id(node);

        let lhs = self.asts.first_child_of(node);

        let rhs = self.asts.next_sibling_of(lhs);

        let identifier_id = {
            let data: crate::ast::ValIdentifierData = self.asts.attachment(rhs);

            data.identifier_id
        };

        let lhs_type = self.asts.type_id(lhs);

        if self.types.tag_from_id(lhs_type) == TypeTag::Type {
            // Constant in the scope of the denoted type.
            let scope_type_id = self.evaluate_type_value(lhs);

            let info = self
                .types
                .member_info_by_name(scope_type_id, identifier_id)
                .expect("membership was established during typechecking");

            let global = self.ensure_member_global(&info);

            let bytes = self.globals.bytes(global).to_vec();

            let align = self.types.metrics_from_id(node_type).align;

            self.push_bytes(&bytes, align)
        } else {
            let info = self
                .types
                .member_info_by_name(lhs_type, identifier_id)
                .expect("membership was established during typechecking");

            let val = self.evaluate_expr(lhs);

            if lhs_type.is_assignable() {
                let (global, base_offset) = self.ref_target(val);

                self.value_stack.pop();

                let member_offset = base_offset + info.offset as u32;

                if node_type.is_assignable() {
                    self.push_reference(global, member_offset)
                } else {
                    let metrics = self.types.metrics_from_id(node_type);

                    let bytes = self.globals.bytes(global)[member_offset as usize
                        ..(u64::from(member_offset) + metrics.size) as usize]
                        .to_vec();

                    self.push_bytes(&bytes, metrics.align)
                }
            } else {
                let metrics = self.types.metrics_from_id(node_type);

                let start = info.offset as usize;

                let bytes =
                    self.value_stack.bytes(val)[start..start + metrics.size as usize].to_vec();

                self.value_stack.pop();

                self.push_bytes(&bytes, metrics.align)
            }
        }
    }

    fn evaluate_binary_numeric(&mut self, node: AstNodeId) -> StackVal {
        let tag = self.asts.tag(node);

        let source = self.asts.source_id(node);

        let result_type = self.asts.type_id(node).strip();

        let lhs = self.asts.first_child_of(node);

        let rhs = self.asts.next_sibling_of(lhs);

        let lhs_bytes = self.evaluate_value_of(lhs);

        let rhs_bytes = self.evaluate_value_of(rhs);

        let lhs_converted =
            self.convert_value(self.asts.type_id(lhs), &lhs_bytes, result_type, source);

        // Shift counts keep their own type; everything else converges
        // on the common type.
        let rhs_converted = if matches!(tag, AstTag::OpShiftL | AstTag::OpShiftR) {
            rhs_bytes
        } else {
            self.convert_value(self.asts.type_id(rhs), &rhs_bytes, result_type, source)
        };

        match self.types.tag_from_id(result_type) {
            TypeTag::CompInteger => {
                let lhs_value = CompIntegerValue::from_bits(read_u64(&lhs_converted));

                let rhs_value = if matches!(tag, AstTag::OpShiftL | AstTag::OpShiftR) {
                    // Shift counts keep their own type.
                    let rhs_type = self.asts.type_id(rhs);

                    match self.types.tag_from_id(rhs_type) {
                        TypeTag::CompInteger => CompIntegerValue::from_bits(read_u64(&rhs_converted)),
                        _ => {
                            let (_, rhs_signed) = self.integer_shape(rhs_type);

                            CompIntegerValue::from_s64(
                                read_int(&rhs_converted, rhs_signed) as i64
                            )
                        }
                    }
                } else {
                    CompIntegerValue::from_bits(read_u64(&rhs_converted))
                };

                let result = self.comp_integer_binary(tag, lhs_value, rhs_value, source);

                self.push_bytes(&result.to_bits().to_le_bytes(), 8)
            }

            TypeTag::Integer => {
                let (bits, is_signed) = self.integer_shape(result_type);

                let lhs_value = read_int(&lhs_converted, is_signed);

                let rhs_value = if matches!(tag, AstTag::OpShiftL | AstTag::OpShiftR) {
                    let rhs_type = self.asts.type_id(rhs);

                    match self.types.tag_from_id(rhs_type) {
                        TypeTag::CompInteger => {
                            self.comp_integer_operand(rhs, &rhs_converted).value() as i128
                        }
                        _ => {
                            let (_, rhs_signed) = self.integer_shape(rhs_type);

                            read_int(&rhs_converted, rhs_signed)
                        }
                    }
                } else {
                    read_int(&rhs_converted, is_signed)
                };

                let result = self.integer_binary(tag, lhs_value, rhs_value, bits, is_signed, source);

                self.push_bytes(
                    &int_to_bytes(result, lhs_converted.len()),
                    lhs_converted.len() as u32,
                )
            }

            TypeTag::Float => {
                let lhs_value = self.float_operand(result_type, &lhs_converted);

                let rhs_value = self.float_operand(result_type, &rhs_converted);

                let result = match tag {
                    AstTag::OpAdd => lhs_value + rhs_value,
                    AstTag::OpSub => lhs_value - rhs_value,
                    AstTag::OpMul => lhs_value * rhs_value,
                    AstTag::OpDiv => lhs_value / rhs_value,
                    _ => self.error(
                        source,
                        format_args!("Operator is not defined for floating point operands"),
                    ),
                };

                self.push_float(result_type, result)
            }

            TypeTag::CompFloat => self.error(
                source,
                format_args!("Compile-time float arithmetic is not implemented yet"),
            ),

            _ => unreachable!("typechecking admits only numeric operands"),
        }
    }

    fn comp_integer_binary(
        &self,
        tag: AstTag,
        lhs: CompIntegerValue,
        rhs: CompIntegerValue,
        source: SourceId,
    ) -> CompIntegerValue {
        match tag {
            AstTag::OpAdd | AstTag::OpAddTC => lhs.add(rhs),
            AstTag::OpSub | AstTag::OpSubTC => lhs.sub(rhs),
            AstTag::OpMul | AstTag::OpMulTC => lhs.mul(rhs),
            AstTag::OpDiv => match lhs.div(rhs) {
                Some(result) => result,
                None => self.error(
                    source,
                    format_args!("Division by zero in compile-time expression"),
                ),
            },
            AstTag::OpMod => match lhs.rem(rhs) {
                Some(result) => result,
                None => self.error(
                    source,
                    format_args!("Modulus by zero in compile-time expression"),
                ),
            },
            AstTag::OpBitAnd => self.require_bitwise(lhs.bit_and(rhs), source),
            AstTag::OpBitOr => self.require_bitwise(lhs.bit_or(rhs), source),
            AstTag::OpBitXor => self.require_bitwise(lhs.bit_xor(rhs), source),
            AstTag::OpShiftL => match lhs.shl(rhs) {
                Some(result) => result,
                None => self.error(
                    source,
                    format_args!("Shift count must be non-negative"),
                ),
            },
            AstTag::OpShiftR => match lhs.shr(rhs) {
                Some(result) => result,
                None => self.error(
                    source,
                    format_args!("Shift count must be non-negative"),
                ),
            },
            _ => unreachable!("not a binary integer operator"),
        }
    }

    fn require_bitwise(
        &self,
        result: Option<CompIntegerValue>,
        source: SourceId,
    ) -> CompIntegerValue {
        match result {
            Some(result) => result,
            None => self.error(
                source,
                format_args!("Bitwise operands must be non-negative compile-time integers"),
            ),
        }
    }

    fn integer_binary(
        &self,
        tag: AstTag,
        lhs: i128,
        rhs: i128,
        bits: u16,
        is_signed: bool,
        source: SourceId,
    ) -> i128 {
        let wrapping = matches!(tag, AstTag::OpAddTC | AstTag::OpSubTC | AstTag::OpMulTC);

        let raw = match tag {
            AstTag::OpAdd | AstTag::OpAddTC => lhs + rhs,
            AstTag::OpSub | AstTag::OpSubTC => lhs - rhs,
            AstTag::OpMul | AstTag::OpMulTC => lhs * rhs,
            AstTag::OpDiv => {
                if rhs == 0 {
                    self.error(
                        source,
                        format_args!("Division by zero in compile-time expression"),
                    );
                }

                lhs / rhs
            }
            AstTag::OpMod => {
                if rhs == 0 {
                    self.error(
                        source,
                        format_args!("Modulus by zero in compile-time expression"),
                    );
                }

                lhs % rhs
            }
            AstTag::OpBitAnd => lhs & rhs,
            AstTag::OpBitOr => lhs | rhs,
            AstTag::OpBitXor => lhs ^ rhs,
            AstTag::OpShiftL | AstTag::OpShiftR => {
                if rhs < 0 || rhs >= i128::from(bits) {
                    self.error(
                        source,
                        format_args!("Shift count is out of range for the operand type"),
                    );
                }

                if tag == AstTag::OpShiftL {
                    wrap_int(lhs << rhs, bits, is_signed)
                } else {
                    lhs >> rhs
                }
            }
            _ => unreachable!("not a binary integer operator"),
        };

        if wrapping || matches!(tag, AstTag::OpShiftL) {
            wrap_int(raw, bits, is_signed)
        } else if !int_fits(raw, bits, is_signed) {
            self.error(
                source,
                format_args!("Arithmetic overflows the operand's type"),
            )
        } else {
            raw
        }
    }

    fn evaluate_comparison(&mut self, node: AstNodeId) -> StackVal {
        let tag = self.asts.tag(node);

        let source = self.asts.source_id(node);

        let lhs = self.asts.first_child_of(node);

        let rhs = self.asts.next_sibling_of(lhs);

        let common = self
            .types
            .common_type(self.asts.type_id(lhs), self.asts.type_id(rhs));

        debug_assert!(common != TypeId::INVALID);

        let lhs_bytes = self.evaluate_value_of(lhs);

        let rhs_bytes = self.evaluate_value_of(rhs);

        let lhs_converted = self.convert_value(self.asts.type_id(lhs), &lhs_bytes, common, source);

        let rhs_converted = self.convert_value(self.asts.type_id(rhs), &rhs_bytes, common, source);

        let ordering = match self.types.tag_from_id(common) {
            TypeTag::CompInteger => Some(
                CompIntegerValue::from_bits(read_u64(&lhs_converted))
                    .compare(CompIntegerValue::from_bits(read_u64(&rhs_converted))),
            ),
            TypeTag::Integer => {
                let (_, is_signed) = self.integer_shape(common);

                Some(read_int(&lhs_converted, is_signed).cmp(&read_int(&rhs_converted, is_signed)))
            }
            TypeTag::Float => self
                .float_operand(common, &lhs_converted)
                .partial_cmp(&self.float_operand(common, &rhs_converted)),
            TypeTag::CompFloat => self.error(
                source,
                format_args!("Compile-time float comparison is not implemented yet"),
            ),
            _ => {
                // Identity comparison only.
                if !matches!(tag, AstTag::OpCmpEQ | AstTag::OpCmpNE) {
                    self.error(
                        source,
                        format_args!("Ordering comparison is not defined for this type"),
                    );
                }

                if lhs_converted == rhs_converted {
                    Some(std::cmp::Ordering::Equal)
                } else {
                    None
                }
            }
        };

        let result = match tag {
            AstTag::OpCmpEQ => ordering == Some(std::cmp::Ordering::Equal),
            AstTag::OpCmpNE => ordering != Some(std::cmp::Ordering::Equal),
            AstTag::OpCmpLT => ordering == Some(std::cmp::Ordering::Less),
            AstTag::OpCmpGT => ordering == Some(std::cmp::Ordering::Greater),
            AstTag::OpCmpLE => matches!(
                ordering,
                Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
            ),
            AstTag::OpCmpGE => matches!(
                ordering,
                Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
            ),
            _ => unreachable!("not a comparison operator"),
        };

        self.push_bytes(&[u8::from(result)], 1)
    }

    fn evaluate_assignment(&mut self, node: AstNodeId) -> StackVal {
        let tag = self.asts.tag(node);

        let source = self.asts.source_id(node);

        let lhs = self.asts.first_child_of(node);

        let rhs = self.asts.next_sibling_of(lhs);

        let lhs_type = self.asts.type_id(lhs);

        debug_assert!(lhs_type.is_assignable());

        let target_type = lhs_type.strip();

        let lhs_val = self.evaluate_expr(lhs);

        let (global, target_offset) = self.ref_target(lhs_val);

        let rhs_bytes = self.evaluate_value_of(rhs);

        let mut new_bytes =
            self.convert_value(self.asts.type_id(rhs), &rhs_bytes, target_type, source);

        if tag != AstTag::OpSet {
            let metrics = self.types.metrics_from_id(target_type);

            let current = self.globals.bytes(global)
                [target_offset as usize..(u64::from(target_offset) + metrics.size) as usize]
                .to_vec();

            new_bytes = self.apply_compound(tag, target_type, &current, &new_bytes, source);
        }

        let target = &mut self.globals.bytes_mut(global)
            [target_offset as usize..target_offset as usize + new_bytes.len()];

        target.copy_from_slice(&new_bytes);

        self.value_stack.pop();

        self.value_stack.alloc(0, 1)
    }

    fn apply_compound(
        &self,
        tag: AstTag,
        target_type: TypeId,
        current: &[u8],
        operand: &[u8],
        source: SourceId,
    ) -> Vec<u8> {
        let base_tag = match tag {
            AstTag::OpSetAdd | AstTag::OpSetAddTC => AstTag::OpAdd,
            AstTag::OpSetSub | AstTag::OpSetSubTC => AstTag::OpSub,
            AstTag::OpSetMul | AstTag::OpSetMulTC => AstTag::OpMul,
            AstTag::OpSetDiv => AstTag::OpDiv,
            AstTag::OpSetMod => AstTag::OpMod,
            AstTag::OpSetBitAnd => AstTag::OpBitAnd,
            AstTag::OpSetBitOr => AstTag::OpBitOr,
            AstTag::OpSetBitXor => AstTag::OpBitXor,
            AstTag::OpSetShiftL => AstTag::OpShiftL,
            AstTag::OpSetShiftR => AstTag::OpShiftR,
            _ => unreachable!("not a compound assignment"),
        };

        let wrapping_tag = match tag {
            AstTag::OpSetAddTC => AstTag::OpAddTC,
            AstTag::OpSetSubTC => AstTag::OpSubTC,
            AstTag::OpSetMulTC => AstTag::OpMulTC,
            _ => base_tag,
        };

        match self.types.tag_from_id(target_type) {
            TypeTag::CompInteger => {
                let result = self.comp_integer_binary(
                    wrapping_tag,
                    CompIntegerValue::from_bits(read_u64(current)),
                    CompIntegerValue::from_bits(read_u64(operand)),
                    source,
                );

                result.to_bits().to_le_bytes().to_vec()
            }
            TypeTag::Integer => {
                let (bits, is_signed) = self.integer_shape(target_type);

                let result = self.integer_binary(
                    wrapping_tag,
                    read_int(current, is_signed),
                    read_int(operand, is_signed),
                    bits,
                    is_signed,
                    source,
                );

                int_to_bytes(result, current.len())
            }
            TypeTag::Float => {
                let lhs_value = self.float_operand(target_type, current);

                let rhs_value = self.float_operand(target_type, operand);

                let result = match base_tag {
                    AstTag::OpAdd => lhs_value + rhs_value,
                    AstTag::OpSub => lhs_value - rhs_value,
                    AstTag::OpMul => lhs_value * rhs_value,
                    AstTag::OpDiv => lhs_value / rhs_value,
                    _ => self.error(
                        source,
                        format_args!("Operator is not defined for floating point operands"),
                    ),
                };

                let bits = match self.types.primitive_structure(target_type) {
                    TypeStructure::Float(float) => float.bits,
                    _ => unreachable!("expected float type"),
                };

                if bits == 32 {
                    (result as f32).to_le_bytes().to_vec()
                } else {
                    result.to_le_bytes().to_vec()
                }
            }
            TypeTag::CompFloat => self.error(
                source,
                format_args!("Compile-time float arithmetic is not implemented yet"),
            ),
            _ => unreachable!("typechecking admits only numeric assignment targets"),
        }
    }

    fn evaluate_call(&mut self, node: AstNodeId) -> StackVal {
        let source = self.asts.source_id(node);

        let callee = self.asts.first_child_of(node);

        let func: FuncType = match self
            .types
            .primitive_structure(self.asts.type_id(callee))
        {
            TypeStructure::Func(func) => *func,
            _ => unreachable!("typechecking admits only function callees"),
        };

        let callee_value = self.evaluate_value_of(callee);

        let callee_ordinal = read_u64(&callee_value);

        if callee_ordinal == 0 {
            self.error(
                source,
                format_args!(
                    "Calling non-builtin functions at compile time is not implemented yet"
                ),
            );
        }

        let builtin = Builtin::from_ordinal((callee_ordinal - 1) as u8);

        let signature_metrics = self.types.metrics_from_id(func.signature_type_id);

        let frame = self
            .value_stack
            .alloc(signature_metrics.size, signature_metrics.align.max(1));

        // Fill the frame, argument by argument.

        let mut expect_named = false;

        let mut positional_rank = 0u16;

        let mut argument = callee;

        while self.asts.has_next_sibling(argument) {
            argument = self.asts.next_sibling_of(argument);

            let (member, value_node) = if self.asts.tag(argument) == AstTag::OpSet
                && self.asts.type_id(argument) == TypeId::NO_TYPE
            {
                expect_named = true;

                let lhs = self.asts.first_child_of(argument);

                let rhs = self.asts.next_sibling_of(lhs);

                let name_node = if self.asts.tag(lhs) == AstTag::UOpImpliedMember {
                    self.asts.first_child_of(lhs)
                } else {
                    lhs
                };

                let identifier_id = {
                    let data: crate::ast::ValIdentifierData = self.asts.attachment(name_node);

                    data.identifier_id
                };

                let member = self
                    .types
                    .member_info_by_name(func.signature_type_id, identifier_id)
                    .expect("named argument was validated during typechecking");

                (member, rhs)
            } else {
                debug_assert!(!expect_named);

                let member = self
                    .types
                    .member_info_by_rank(func.signature_type_id, positional_rank)
                    .expect("positional rank was validated during typechecking");

                positional_rank += 1;

                (member, argument)
            };

            let parameter_type = member.type_id;

            if self.types.tag_from_id(parameter_type) == TypeTag::TypeInfo {
                let denoted = self.denoted_type_of(value_node);

                let start = member.offset as usize;

                self.value_stack.bytes_mut(frame)[start..start + 4]
                    .copy_from_slice(&denoted.to_raw().to_le_bytes());
            } else {
                let bytes = self.evaluate_value_of(value_node);

                let converted = self.convert_value(
                    self.asts.type_id(value_node),
                    &bytes,
                    parameter_type,
                    self.asts.source_id(value_node),
                );

                let start = member.offset as usize;

                self.value_stack.bytes_mut(frame)[start..start + converted.len()]
                    .copy_from_slice(&converted);
            }
        }

        let return_bytes = self.invoke_builtin(builtin, frame, &func, node);

        self.value_stack.pop();

        let return_metrics = self.types.metrics_from_id(func.return_type_id);

        debug_assert!(return_bytes.len() as u64 == return_metrics.size);

        self.push_bytes(&return_bytes, return_metrics.align)
    }

    /// The type an argument denotes for reflection parameters: the
    /// evaluated type for type-level expressions, the static type for
    /// everything else.
    fn denoted_type_of(&mut self, node: AstNodeId) -> TypeId {
        let static_type = self.asts.type_id(node);

        if self.types.tag_from_id(static_type) == TypeTag::Type {
            self.evaluate_type_value(node)
        } else {
            static_type.strip()
        }
    }
}

/// Truncates `value` into a `bits`-wide integer, re-extending the sign
/// for signed types.
fn wrap_int(value: i128, bits: u16, is_signed: bool) -> i128 {
    let mask = if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    };

    let truncated = (value as u128) & mask;

    if is_signed && bits < 128 && truncated & (1u128 << (bits - 1)) != 0 {
        (truncated | !mask) as i128
    } else {
        truncated as i128
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_stack_is_lifo_with_alignment() {
        let mut stack = ValueStack::new();

        let a = stack.alloc(3, 1);

        stack.bytes_mut(a).copy_from_slice(&[1, 2, 3]);

        let b = stack.alloc(8, 8);

        stack.bytes_mut(b).copy_from_slice(&[9; 8]);

        assert_eq!(stack.bytes(a), &[1, 2, 3]);
        assert_eq!(stack.bytes(b), &[9; 8]);
        assert_eq!(stack.depth(), 2);

        stack.pop();

        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.bytes(a), &[1, 2, 3]);
    }

    #[test]
    fn sized_integer_round_trips() {
        for value in [-1i128, 0, 1, 127, -128, 1000, -1000] {
            let bytes = int_to_bytes(value, 4);

            assert_eq!(read_int(&bytes, true), value);
        }

        assert_eq!(read_int(&int_to_bytes(255, 1), false), 255);
        assert_eq!(read_int(&int_to_bytes(255, 1), true), -1);
    }

    #[test]
    fn wrapping_truncates_and_sign_extends() {
        assert_eq!(wrap_int(256, 8, false), 0);
        assert_eq!(wrap_int(257, 8, false), 1);
        assert_eq!(wrap_int(128, 8, true), -128);
        assert_eq!(wrap_int(-1, 8, false), 255);
        assert_eq!(wrap_int(5, 8, true), 5);
    }

    #[test]
    fn fit_checks_match_type_bounds() {
        assert!(int_fits(127, 8, true));
        assert!(!int_fits(128, 8, true));
        assert!(int_fits(-128, 8, true));
        assert!(!int_fits(-129, 8, true));
        assert!(int_fits(255, 8, false));
        assert!(!int_fits(256, 8, false));
        assert!(!int_fits(-1, 8, false));
    }
}
