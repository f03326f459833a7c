//! Exit-status scenarios.
//!
//! Source errors are fatal: the pipeline prints a located message and
//! terminates with status 1. These tests drive the `evlc` binary over
//! malformed projects and assert on the exit status and the reported
//! message.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

const STD_SOURCE: &str = "let prelude = _type\n";

struct Project {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Project {
    fn new(main_source: &str) -> Self {
        let dir = tempfile::tempdir().expect("temporary directory");

        let root = dir.path().to_path_buf();

        write_file(&root.join("std.evl"), STD_SOURCE);

        write_file(&root.join("main.evl"), main_source);

        Self { _dir: dir, root }
    }

    fn run(&self, as_std: bool) -> (Option<i32>, String) {
        let mut command = Command::new(env!("CARGO_BIN_EXE_evlc"));

        command
            .arg(self.root.join("main.evl"))
            .arg("--std")
            .arg(self.root.join("std.evl"));

        if as_std {
            command.arg("--as-std");
        }

        let output = command.output().expect("run evlc");

        (
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        )
    }
}

fn write_file(path: &Path, content: &str) {
    let mut file = std::fs::File::create(path).expect("create source file");

    file.write_all(content.as_bytes()).expect("write source file");
}

fn assert_fails(project: &Project, as_std: bool, expected_message: &str) {
    let (status, stderr) = project.run(as_std);

    assert_eq!(status, Some(1), "stderr was: {}", stderr);

    assert!(
        stderr.contains(expected_message),
        "expected {:?} in: {}",
        expected_message,
        stderr
    );
}

#[test]
fn well_formed_input_succeeds() {
    let project = Project::new("let x = 1\nlet y = x + 2\n");

    let (status, stderr) = project.run(false);

    assert_eq!(status, Some(0), "stderr was: {}", stderr);
}

#[test]
fn cyclic_type_dependency_exits_with_status_one() {
    let project = Project::new("let a : b = 0\nlet b : a = 0\n");

    assert_fails(&project, false, "Cyclic type dependency");
}

#[test]
fn unknown_string_escape_is_a_lexer_error() {
    let project = Project::new("let s = \"hi\\z\"\n");

    assert_fails(&project, false, "Unknown character escape");
}

#[test]
fn error_messages_carry_the_source_position() {
    let project = Project::new("let a = 1\nlet s = \"hi\\z\"\n");

    let (status, stderr) = project.run(false);

    assert_eq!(status, Some(1));

    // The offending literal starts in line 2, column 9.
    assert!(stderr.contains("main.evl:2:9"), "stderr was: {}", stderr);
}

#[test]
fn non_terminal_block_expression_must_be_definition_or_void() {
    let project = Project::new("let x = { let a = 1\n a + 1\n a + 2 }\n");

    assert_fails(
        &project,
        false,
        "non-terminal position in block must be a definition or of void type",
    );
}

#[test]
fn builtin_names_are_rejected_outside_std_files() {
    let project = Project::new("let x = _integer(bits = 8, is_signed = _true)\n");

    assert_fails(&project, false, "Illegal identifier starting with '_'");
}

#[test]
fn undefined_identifiers_are_reported() {
    let project = Project::new("let x = frobnicate\n");

    assert_fails(
        &project,
        false,
        "Could not find definition for identifier 'frobnicate'",
    );
}

#[test]
fn calls_with_too_many_arguments_are_rejected() {
    let arguments = (1..=65)
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let project = Project::new(&format!("let x = _integer({})\n", arguments));

    assert_fails(&project, true, "more than the expected");
}

#[test]
fn duplicate_named_arguments_are_rejected() {
    let project = Project::new(
        "let x = _integer(bits = 8, bits = 9)\n",
    );

    assert_fails(&project, true, "set more than once");
}

#[test]
fn tree_depth_beyond_the_limit_is_fatal() {
    let depth = 129;

    let mut source = String::from("let x = ");

    source.push_str(&"{ ".repeat(depth));
    source.push('1');
    source.push_str(&" }".repeat(depth));
    source.push('\n');

    let project = Project::new(&source);

    assert_fails(&project, false, "maximum parse tree depth");
}

#[test]
fn missing_entry_file_is_fatal() {
    let project = Project::new("let x = 1\n");

    std::fs::remove_file(project.root.join("main.evl")).expect("remove entry file");

    let (status, _) = project.run(false);

    assert_eq!(status, Some(1));
}

#[test]
fn integer_literal_overflow_is_a_lexer_error() {
    let project = Project::new("let x = 18446744073709551616\n");

    assert_fails(&project, false, "exceeds maximum");
}

#[test]
fn division_by_zero_in_compile_time_expression() {
    // The division sits in a type annotation, which is evaluated while
    // the file's members are driven to completion.
    let project = Project::new("let x : _integer(bits = 8 / 0, is_signed = _true) = 0\n");

    assert_fails(&project, true, "Division by zero");
}

#[test]
fn assignment_to_non_assignable_target_is_rejected() {
    let project = Project::new("let x = { let a = 1\n a = 2\n a }\n");

    assert_fails(&project, false, "must be assignable");
}

#[test]
fn string_literals_may_not_span_newlines() {
    let project = Project::new("let s = \"line\nbreak\"\n");

    assert_fails(&project, false, "String constant spans across newline");
}
