//! Builtin functions and constants.
//!
//! Builtins fall into three classes, all wired at interpreter
//! construction with pre-registered types:
//!
//! - **type constants** (`_type`, `_definition`, `_comp_integer`,
//!   `_comp_float`, `_comp_string`, `_type_builder`): expressions of
//!   type `Type` whose value is the respective type id;
//! - **literals** (`_true`): a boolean constant;
//! - **functions** (`_integer`, the reflection group, `_import` and
//!   the type-builder triad): values of function type whose call is
//!   dispatched to an in-process implementation reading its arguments
//!   from the top call frame on the value stack.
//!
//! `_offsetof` and `_add_type_member` are registered but their
//! evaluation reports a deliberate not-implemented error.

use crate::ast::AstNodeId;
use crate::comp_values::CompIntegerValue;
use crate::identifiers::IdentifierId;
use crate::lexer::Builtin;
use crate::types::{
    next_multiple, AliasType, FuncType, MemberInit, ResumptionId, TypeId, TypeStructure, TypeTag,
};

use super::eval::StackVal;
use super::Interpreter;

impl Interpreter {
    pub(crate) fn init_builtin_types(&mut self) {
        let type_type = self.types.id_from_structure(TypeStructure::Type);

        let bool_type = self.types.id_from_structure(TypeStructure::Boolean);

        let comp_integer_type = self.types.id_from_structure(TypeStructure::CompInteger);

        let comp_string_type = self.types.id_from_structure(TypeStructure::CompString);

        let void_type = self.types.id_from_structure(TypeStructure::Void);

        let type_builder_type = self.types.id_from_structure(TypeStructure::TypeBuilder);

        let type_info_type = self.types.id_from_structure(TypeStructure::TypeInfo);

        // Type constants and the boolean literal.
        self.builtin_type_ids[Builtin::Type as usize] = type_type;
        self.builtin_type_ids[Builtin::Definition as usize] = type_type;
        self.builtin_type_ids[Builtin::CompInteger as usize] = type_type;
        self.builtin_type_ids[Builtin::CompFloat as usize] = type_type;
        self.builtin_type_ids[Builtin::CompString as usize] = type_type;
        self.builtin_type_ids[Builtin::TypeBuilder as usize] = type_type;
        self.builtin_type_ids[Builtin::True as usize] = bool_type;

        self.builtin_type_ids[Builtin::Integer as usize] = self.make_func_type(
            type_type,
            &[("bits", comp_integer_type), ("is_signed", bool_type)],
        );

        self.builtin_type_ids[Builtin::Typeof as usize] =
            self.make_func_type(type_type, &[("arg", type_info_type)]);

        self.builtin_type_ids[Builtin::Returntypeof as usize] =
            self.make_func_type(type_type, &[("arg", type_info_type)]);

        self.builtin_type_ids[Builtin::Sizeof as usize] =
            self.make_func_type(comp_integer_type, &[("arg", type_info_type)]);

        self.builtin_type_ids[Builtin::Alignof as usize] =
            self.make_func_type(comp_integer_type, &[("arg", type_info_type)]);

        self.builtin_type_ids[Builtin::Strideof as usize] =
            self.make_func_type(comp_integer_type, &[("arg", type_info_type)]);

        self.builtin_type_ids[Builtin::Offsetof as usize] =
            self.make_func_type(comp_integer_type, &[]);

        self.builtin_type_ids[Builtin::Nameof as usize] =
            self.make_func_type(comp_string_type, &[("arg", type_info_type)]);

        self.builtin_type_ids[Builtin::Import as usize] = self.make_func_type(
            type_type,
            &[("path", comp_string_type), ("is_std", bool_type)],
        );

        self.builtin_type_ids[Builtin::CreateTypeBuilder as usize] =
            self.make_func_type(type_builder_type, &[]);

        self.builtin_type_ids[Builtin::AddTypeMember as usize] =
            self.make_func_type(void_type, &[]);

        self.builtin_type_ids[Builtin::CompleteType as usize] =
            self.make_func_type(type_type, &[("arg", type_builder_type)]);
    }

    /// Builds a function type with a fresh signature composite.
    fn make_func_type(&mut self, return_type_id: TypeId, params: &[(&str, TypeId)]) -> TypeId {
        debug_assert!(params.len() <= 64);

        let signature_type_id = self.types.create_open_type(crate::source::SourceId::INVALID);

        let mut offset = 0u64;

        let mut max_align = 1u32;

        for &(name, param_type) in params {
            let metrics = self.types.metrics_from_id(param_type);

            offset = next_multiple(offset, u64::from(metrics.align));

            let name_id = self.identifiers.id_from(name.as_bytes());

            self.types.add_open_type_member(
                signature_type_id,
                MemberInit {
                    name: name_id,
                    source: crate::source::SourceId::INVALID,
                    is_pub: false,
                    is_mut: false,
                    is_global: false,
                    is_use: false,
                    offset,
                    type_id: param_type,
                    resumption: ResumptionId::INVALID,
                    opt_type_node: AstNodeId::INVALID,
                    opt_value_node: AstNodeId::INVALID,
                },
            );

            offset += metrics.size;

            max_align = max_align.max(metrics.align);
        }

        self.types.close_open_type(
            signature_type_id,
            offset,
            max_align,
            next_multiple(offset, u64::from(max_align)),
        );

        self.types.id_from_structure(TypeStructure::Func(FuncType {
            signature_type_id,
            return_type_id,
            param_count: params.len() as u16,
            is_proc: false,
        }))
    }

    fn frame_param(&self, frame: StackVal, func: &FuncType, rank: u16) -> Vec<u8> {
        let member = self
            .types
            .member_info_by_rank(func.signature_type_id, rank)
            .expect("builtin parameter rank is fixed");

        let metrics = self.types.metrics_from_id(member.type_id);

        let start = member.offset as usize;

        self.value_stack.bytes(frame)[start..start + metrics.size as usize].to_vec()
    }

    fn frame_type_param(&self, frame: StackVal, func: &FuncType, rank: u16) -> TypeId {
        let bytes = self.frame_param(frame, func, rank);

        TypeId::from_raw(u32::from_le_bytes(
            bytes[..4].try_into().expect("type values are four bytes"),
        ))
        .strip()
    }

    /// Dispatches an evaluated call to the builtin's implementation,
    /// returning the payload bytes of its result.
    pub(crate) fn invoke_builtin(
        &mut self,
        builtin: Builtin,
        frame: StackVal,
        func: &FuncType,
        call_node: AstNodeId,
    ) -> Vec<u8> {
        let source = self.asts.source_id(call_node);

        match builtin {
            Builtin::Integer => {
                let bits_value =
                    CompIntegerValue::from_bits(u64::from_le_bytes(
                        self.frame_param(frame, func, 0)[..8]
                            .try_into()
                            .expect("comp integers are eight bytes"),
                    ));

                let bits = match bits_value.as_u64(64) {
                    Some(bits @ 1..=64) => bits as u16,
                    _ => self.error(
                        source,
                        format_args!("Integer width must be between 1 and 64 bits"),
                    ),
                };

                let is_signed = self.frame_param(frame, func, 1)[0] != 0;

                let type_id = self
                    .types
                    .id_from_structure(TypeStructure::Integer(crate::types::IntegerType {
                        bits,
                        is_signed,
                    }));

                type_id.to_raw().to_le_bytes().to_vec()
            }

            Builtin::Typeof => {
                // The frame already holds the denoted type.
                self.frame_type_param(frame, func, 0)
                    .to_raw()
                    .to_le_bytes()
                    .to_vec()
            }

            Builtin::Returntypeof => {
                let arg = self.frame_type_param(frame, func, 0);

                match self.types.primitive_structure(arg) {
                    TypeStructure::Func(inner) => {
                        inner.return_type_id.to_raw().to_le_bytes().to_vec()
                    }
                    _ => self.error(
                        source,
                        format_args!("Argument of '_returntypeof' must be of function type"),
                    ),
                }
            }

            Builtin::Sizeof => {
                let metrics = self.types.metrics_from_id(self.frame_type_param(frame, func, 0));

                CompIntegerValue::from_u64(metrics.size)
                    .to_bits()
                    .to_le_bytes()
                    .to_vec()
            }

            Builtin::Alignof => {
                let metrics = self.types.metrics_from_id(self.frame_type_param(frame, func, 0));

                CompIntegerValue::from_u64(u64::from(metrics.align))
                    .to_bits()
                    .to_le_bytes()
                    .to_vec()
            }

            Builtin::Strideof => {
                let metrics = self.types.metrics_from_id(self.frame_type_param(frame, func, 0));

                CompIntegerValue::from_u64(metrics.stride())
                    .to_bits()
                    .to_le_bytes()
                    .to_vec()
            }

            Builtin::Offsetof => self.error(
                source,
                format_args!("'_offsetof' is not implemented yet"),
            ),

            Builtin::Nameof => {
                let arg = self.frame_type_param(frame, func, 0);

                match self.types.structure_from_id(arg) {
                    TypeStructure::Alias(AliasType { name, .. }) if name.is_valid() => {
                        name.0.to_le_bytes().to_vec()
                    }
                    _ => self.error(
                        source,
                        format_args!("Argument of '_nameof' has no name"),
                    ),
                }
            }

            Builtin::Import => {
                let path_id = IdentifierId(u32::from_le_bytes(
                    self.frame_param(frame, func, 0)[..4]
                        .try_into()
                        .expect("comp strings are four bytes"),
                ));

                let is_std = self.frame_param(frame, func, 1)[0] != 0;

                let path_text = self.identifiers.name_from(path_id).to_string();

                let path = self
                    .resolve_import_path(std::path::Path::new(&path_text), source);

                let imported = self.import_file(&path, is_std);

                imported.to_raw().to_le_bytes().to_vec()
            }

            Builtin::CreateTypeBuilder => {
                let builder_type_id = self.types.create_open_type(source);

                builder_type_id.to_raw().to_le_bytes().to_vec()
            }

            Builtin::AddTypeMember => self.error(
                source,
                format_args!("'_add_type_member' is not implemented yet"),
            ),

            Builtin::CompleteType => {
                let builder_type_id = self.frame_type_param(frame, func, 0);

                if self.types.tag_from_id(builder_type_id) != TypeTag::Composite
                    || !self.types.is_open(builder_type_id)
                {
                    self.error(
                        source,
                        format_args!("Argument of '_complete_type' must be an open type builder"),
                    );
                }

                let mut offset = 0u64;

                let mut max_align = 1u32;

                let member_count = self.types.member_count(builder_type_id);

                for rank in 0..member_count {
                    let member = self
                        .types
                        .member_info_by_rank(builder_type_id, rank)
                        .expect("rank is below the member count");

                    if member.has_pending_type() {
                        continue;
                    }

                    let metrics = self.types.metrics_from_id(member.type_id);

                    offset = next_multiple(offset, u64::from(metrics.align));

                    offset += metrics.size;

                    max_align = max_align.max(metrics.align);
                }

                self.types.close_open_type(
                    builder_type_id,
                    offset,
                    max_align,
                    next_multiple(offset, u64::from(max_align)),
                );

                builder_type_id.to_raw().to_le_bytes().to_vec()
            }

            Builtin::Type
            | Builtin::Definition
            | Builtin::CompInteger
            | Builtin::CompFloat
            | Builtin::CompString
            | Builtin::TypeBuilder
            | Builtin::True => {
                unreachable!("constants are not of function type and cannot be called")
            }
        }
    }
}
