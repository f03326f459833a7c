//! Unit tests for the interpreter's scope machinery and builtin
//! wiring. End-to-end semantics are exercised by the integration
//! tests, which drive whole files through the pipeline.

use super::*;
use crate::source::SourceId;

fn bare() -> Interpreter {
    Interpreter::new_bare(Config::default())
}

#[test]
fn builtin_constants_are_typed_as_types_and_booleans(
) {
    let mut interp = bare();

    let type_type = interp.types.id_from_structure(TypeStructure::Type);

    let bool_type = interp.types.id_from_structure(TypeStructure::Boolean);

    assert_eq!(interp.builtin_type_ids[Builtin::Type as usize], type_type);
    assert_eq!(
        interp.builtin_type_ids[Builtin::Definition as usize],
        type_type
    );
    assert_eq!(interp.builtin_type_ids[Builtin::True as usize], bool_type);
}

#[test]
fn callable_builtins_carry_function_types() {
    let mut interp = bare();

    let integer_func = interp.builtin_type_ids[Builtin::Integer as usize];

    assert_eq!(interp.types.tag_from_id(integer_func), TypeTag::Func);

    let func = match interp.types.primitive_structure(integer_func) {
        TypeStructure::Func(func) => *func,
        _ => panic!("expected function type"),
    };

    assert_eq!(func.param_count, 2);
    assert!(!func.is_proc);

    let bits_id = interp.identifiers.id_from(b"bits");
    let is_signed_id = interp.identifiers.id_from(b"is_signed");

    let bits = interp
        .types
        .member_info_by_name(func.signature_type_id, bits_id)
        .expect("signature carries the bits parameter");

    let is_signed = interp
        .types
        .member_info_by_name(func.signature_type_id, is_signed_id)
        .expect("signature carries the is_signed parameter");

    assert_eq!(bits.rank, 0);
    assert_eq!(is_signed.rank, 1);
    assert_eq!(
        interp.types.tag_from_id(bits.type_id),
        TypeTag::CompInteger
    );
    assert_eq!(interp.types.tag_from_id(is_signed.type_id), TypeTag::Boolean);

    // The boolean parameter follows the eight-byte comp integer.
    assert_eq!(bits.offset, 0);
    assert_eq!(is_signed.offset, 8);
}

#[test]
fn root_contexts_frame_the_stack_with_a_sentinel() {
    let mut interp = bare();

    let file = interp.types.create_open_type(SourceId::INVALID);

    interp.push_context(file, true);

    assert_eq!(interp.context_top, 2);
    assert_eq!(interp.contexts[0], TypeId::INVALID);
    assert_eq!(interp.contexts[1], interp.prelude_type_id);
    assert_eq!(interp.contexts[2], file);

    let block = interp.types.create_open_type(SourceId::INVALID);

    interp.push_context(block, false);

    assert_eq!(interp.context_top, 3);
    assert_eq!(interp.contexts[3], block);

    interp.pop_context(false);

    assert_eq!(interp.context_top, 2);

    interp.pop_context(true);

    assert_eq!(interp.context_top, -1);
}

#[test]
fn resumptions_restore_the_captured_context_range() {
    let mut interp = bare();

    let file = interp.types.create_open_type(SourceId::INVALID);

    let block = interp.types.create_open_type(SourceId::INVALID);

    interp.push_context(file, true);

    interp.push_context(block, false);

    let resumption = interp.resumption();

    assert_eq!(resumption, ResumptionId(3));

    // Re-applying the token copies `[sentinel, prelude, file, block]`
    // on top of the live stack.
    interp.apply_resumption(resumption);

    assert_eq!(interp.context_top, 7);
    assert_eq!(interp.contexts[4], TypeId::INVALID);
    assert_eq!(interp.contexts[6], file);
    assert_eq!(interp.contexts[7], block);

    interp.release_resumption();

    assert_eq!(interp.context_top, 3);
    assert_eq!(interp.contexts[3], block);
}

#[test]
fn resumptions_stack_on_top_of_live_contexts() {
    let mut interp = bare();

    let first_file = interp.types.create_open_type(SourceId::INVALID);

    interp.push_context(first_file, true);

    let resumption = interp.resumption();

    let second_file = interp.types.create_open_type(SourceId::INVALID);

    interp.push_context(second_file, true);

    let before = interp.context_top;

    interp.apply_resumption(resumption);

    assert_eq!(interp.context_top, before + 3);
    assert_eq!(interp.contexts[interp.context_top as usize], first_file);
    assert_eq!(
        interp.contexts[(interp.context_top - 2) as usize],
        TypeId::INVALID
    );

    interp.release_resumption();

    assert_eq!(interp.context_top, before);
    assert_eq!(interp.contexts[interp.context_top as usize], second_file);
}

#[test]
fn seen_argument_masks() {
    assert_eq!(mask_below(0), 0);
    assert_eq!(mask_below(1), 1);
    assert_eq!(mask_below(3), 0b111);
    assert_eq!(mask_below(64), u64::MAX);
}
