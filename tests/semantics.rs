//! End-to-end semantic analysis scenarios.
//!
//! Each test writes a small project (std, prelude, entry file) into a
//! temporary directory, runs the full pipeline and inspects the
//! resulting definitions through the interpreter's query surface.

use std::io::Write;
use std::path::PathBuf;

use evl::comp_values::CompIntegerValue;
use evl::config::Config;
use evl::types::{IntegerType, TypeId, TypeStructure, TypeTag};
use evl::Interpreter;

const STD_SOURCE: &str = "let prelude = _import(\"prelude.evl\", _true)\n";

const PRELUDE_SOURCE: &str = "\
let u8 = _integer(bits = 8, is_signed = 1 == 2)
let i32 = _integer(bits = 32, is_signed = _true)
";

struct Project {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Project {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("temporary directory");

        let root = dir.path().to_path_buf();

        for (name, content) in files {
            let mut file = std::fs::File::create(root.join(name)).expect("create source file");

            file.write_all(content.as_bytes()).expect("write source file");
        }

        Self { _dir: dir, root }
    }

    fn with_std(entry: &str) -> Self {
        Self::new(&[
            ("std.evl", STD_SOURCE),
            ("prelude.evl", PRELUDE_SOURCE),
            ("main.evl", entry),
        ])
    }

    fn interpreter(&self) -> Interpreter {
        Interpreter::new(Config {
            entrypoint_filepath: self.root.join("main.evl"),
            std_filepath: self.root.join("std.evl"),
            ..Config::default()
        })
    }

    /// Analyzes `main.evl`, returning the interpreter and the entry
    /// file's scope type.
    fn analyze(&self, as_std: bool) -> (Interpreter, TypeId) {
        let mut interp = self.interpreter();

        let path = self.root.join("main.evl");

        let file_type = interp.import_file(&path, as_std);

        (interp, file_type)
    }
}

fn comp_integer_of(bytes: &[u8]) -> i64 {
    CompIntegerValue::from_bits(u64::from_le_bytes(bytes[..8].try_into().unwrap())).value()
}

#[test]
fn annotated_definition_gets_the_constructed_integer_type() {
    let project =
        Project::with_std("let x : _integer(bits = 32, is_signed = _true) = 7\n");

    let (mut interp, file_type) = project.analyze(true);

    let (x_type, x_bytes) = interp.definition_value(file_type, "x");

    match interp.types().primitive_structure(x_type) {
        TypeStructure::Integer(IntegerType { bits: 32, is_signed: true }) => {}
        other => panic!("expected Integer{{32, signed}}, found {:?}", other),
    }

    assert_eq!(x_bytes, vec![7, 0, 0, 0]);
}

#[test]
fn comp_time_addition_of_definitions() {
    let project = Project::with_std("let a = 1\nlet b = a + 2\n");

    let (mut interp, file_type) = project.analyze(false);

    let (b_type, b_bytes) = interp.definition_value(file_type, "b");

    assert_eq!(interp.types().tag_from_id(b_type), TypeTag::CompInteger);
    assert_eq!(comp_integer_of(&b_bytes), 3);
}

#[test]
fn type_valued_definitions_chain_through_annotations() {
    let project = Project::with_std("let T = _type\nlet U : T = _type\n");

    let (mut interp, file_type) = project.analyze(true);

    let (t_type, t_bytes) = interp.definition_value(file_type, "T");

    let (u_type, u_bytes) = interp.definition_value(file_type, "U");

    assert_eq!(interp.types().tag_from_id(t_type), TypeTag::Type);
    assert_eq!(interp.types().tag_from_id(u_type), TypeTag::Type);

    // Evaluating either yields the id of the type `Type` itself.
    let type_value = TypeId::from_raw(u32::from_le_bytes(u_bytes[..4].try_into().unwrap()));

    assert_eq!(interp.types().tag_from_id(type_value), TypeTag::Type);
    assert_eq!(t_bytes, u_bytes);
}

#[test]
fn block_value_is_its_terminal_expression() {
    let project = Project::with_std("let x = { let a = 1\n a + 1 }\n");

    let (mut interp, file_type) = project.analyze(false);

    let (x_type, x_bytes) = interp.definition_value(file_type, "x");

    assert_eq!(interp.types().tag_from_id(x_type), TypeTag::CompInteger);
    assert_eq!(comp_integer_of(&x_bytes), 2);
}

#[test]
fn prelude_definitions_are_visible_in_every_file() {
    let project = Project::with_std("let x : i32 = 7\nlet y = u8\n");

    let (mut interp, file_type) = project.analyze(false);

    let (x_type, x_bytes) = interp.definition_value(file_type, "x");

    match interp.types().primitive_structure(x_type) {
        TypeStructure::Integer(IntegerType { bits: 32, is_signed: true }) => {}
        other => panic!("expected Integer{{32, signed}}, found {:?}", other),
    }

    assert_eq!(x_bytes, vec![7, 0, 0, 0]);

    let (y_type, y_bytes) = interp.definition_value(file_type, "y");

    assert_eq!(interp.types().tag_from_id(y_type), TypeTag::Type);

    let denoted = TypeId::from_raw(u32::from_le_bytes(y_bytes[..4].try_into().unwrap()));

    match interp.types().primitive_structure(denoted) {
        TypeStructure::Integer(IntegerType { bits: 8, is_signed: false }) => {}
        other => panic!("expected Integer{{8, unsigned}}, found {:?}", other),
    }
}

#[test]
fn distinct_aliases_evaluate_to_fresh_type_ids() {
    let project = Project::with_std("let D = distinct i32\nlet E = distinct i32\n");

    let (mut interp, file_type) = project.analyze(false);

    let (_, d_bytes) = interp.definition_value(file_type, "D");

    let (_, e_bytes) = interp.definition_value(file_type, "E");

    assert_ne!(d_bytes, e_bytes);

    let d_value = TypeId::from_raw(u32::from_le_bytes(d_bytes[..4].try_into().unwrap()));

    assert!(
        matches!(interp.types().structure_from_id(d_value), TypeStructure::Alias(alias) if alias.is_distinct)
    );

    match interp.types().primitive_structure(d_value) {
        TypeStructure::Integer(IntegerType { bits: 32, is_signed: true }) => {}
        other => panic!("expected the alias to strip to Integer{{32, signed}}, found {:?}", other),
    }
}

#[test]
fn reflection_builtins_measure_types() {
    let project = Project::with_std(
        "let s = _sizeof(i32)\nlet a = _alignof(u8)\nlet t = _typeof(5)\n",
    );

    let (mut interp, file_type) = project.analyze(true);

    let (_, s_bytes) = interp.definition_value(file_type, "s");

    assert_eq!(comp_integer_of(&s_bytes), 4);

    let (_, a_bytes) = interp.definition_value(file_type, "a");

    assert_eq!(comp_integer_of(&a_bytes), 1);

    let (t_type, t_bytes) = interp.definition_value(file_type, "t");

    assert_eq!(interp.types().tag_from_id(t_type), TypeTag::Type);

    let denoted = TypeId::from_raw(u32::from_le_bytes(t_bytes[..4].try_into().unwrap()));

    assert_eq!(interp.types().tag_from_id(denoted), TypeTag::CompInteger);
}

#[test]
fn if_expressions_select_their_branch_at_compile_time() {
    let project = Project::with_std("let c = if 1 == 1 then 5 else 7\n");

    let (mut interp, file_type) = project.analyze(false);

    let (_, c_bytes) = interp.definition_value(file_type, "c");

    assert_eq!(comp_integer_of(&c_bytes), 5);
}

#[test]
fn blocks_execute_assignments_in_order() {
    let project = Project::with_std("let m = { mut v = 1\n v = 2\n v + 10 }\n");

    let (mut interp, file_type) = project.analyze(false);

    let (_, m_bytes) = interp.definition_value(file_type, "m");

    assert_eq!(comp_integer_of(&m_bytes), 12);
}

#[test]
fn repeated_imports_share_one_file_type() {
    let project = Project::new(&[
        ("std.evl", STD_SOURCE),
        ("prelude.evl", PRELUDE_SOURCE),
        ("shared.evl", "let answer = 42\n"),
        (
            "main.evl",
            "let A = _import(\"shared.evl\", _true)\nlet B = _import(\"./shared.evl\", _true)\n",
        ),
    ]);

    let (mut interp, file_type) = project.analyze(true);

    let (_, a_bytes) = interp.definition_value(file_type, "A");

    let (_, b_bytes) = interp.definition_value(file_type, "B");

    assert_eq!(a_bytes, b_bytes);

    let shared_type = TypeId::from_raw(u32::from_le_bytes(a_bytes[..4].try_into().unwrap()));

    let (_, answer_bytes) = interp.definition_value(shared_type, "answer");

    assert_eq!(comp_integer_of(&answer_bytes), 42);
}

#[test]
fn member_access_reads_constants_of_an_imported_scope() {
    let project = Project::new(&[
        ("std.evl", STD_SOURCE),
        ("prelude.evl", PRELUDE_SOURCE),
        ("consts.evl", "let answer = 40\n"),
        (
            "main.evl",
            "let mod = _import(\"consts.evl\", _true)\nlet x = mod.answer + 2\n",
        ),
    ]);

    let (mut interp, file_type) = project.analyze(true);

    let (_, x_bytes) = interp.definition_value(file_type, "x");

    assert_eq!(comp_integer_of(&x_bytes), 42);
}

#[test]
fn forward_references_resolve_lazily() {
    let project = Project::with_std("let a = b + 1\nlet b = 10\n");

    let (mut interp, file_type) = project.analyze(false);

    let (_, a_bytes) = interp.definition_value(file_type, "a");

    assert_eq!(comp_integer_of(&a_bytes), 11);
}

#[test]
fn typed_arithmetic_narrows_and_computes() {
    let project = Project::with_std("let x : i32 = 7\nlet y = { mut v : i32 = 1\n v += 2\n v }\n");

    let (mut interp, file_type) = project.analyze(false);

    let (y_type, y_bytes) = interp.definition_value(file_type, "y");

    match interp.types().primitive_structure(y_type) {
        TypeStructure::Integer(IntegerType { bits: 32, is_signed: true }) => {}
        other => panic!("expected Integer{{32, signed}}, found {:?}", other),
    }

    assert_eq!(y_bytes, vec![3, 0, 0, 0]);
}

#[test]
fn pointer_types_construct_and_dereference() {
    let project = Project::with_std(
        "let P = *i32\nlet m = { mut v = 5\n let p = $v\n p.* + 1 }\n",
    );

    let (mut interp, file_type) = project.analyze(false);

    let (p_type, p_bytes) = interp.definition_value(file_type, "P");

    assert_eq!(interp.types().tag_from_id(p_type), TypeTag::Type);

    let denoted = TypeId::from_raw(u32::from_le_bytes(p_bytes[..4].try_into().unwrap()));

    assert_eq!(interp.types().tag_from_id(denoted), TypeTag::Ptr);

    let (_, m_bytes) = interp.definition_value(file_type, "m");

    assert_eq!(comp_integer_of(&m_bytes), 6);
}

#[test]
fn array_and_slice_type_constructors_evaluate() {
    let project = Project::with_std("let A = [4]u8\nlet S = []u8\n");

    let (mut interp, file_type) = project.analyze(false);

    let (_, a_bytes) = interp.definition_value(file_type, "A");

    let a_value = TypeId::from_raw(u32::from_le_bytes(a_bytes[..4].try_into().unwrap()));

    match interp.types().primitive_structure(a_value) {
        TypeStructure::Array(array) => assert_eq!(array.element_count, 4),
        other => panic!("expected an array type, found {:?}", other),
    }

    let (_, s_bytes) = interp.definition_value(file_type, "S");

    let s_value = TypeId::from_raw(u32::from_le_bytes(s_bytes[..4].try_into().unwrap()));

    assert_eq!(interp.types().tag_from_id(s_value), TypeTag::Slice);
}
