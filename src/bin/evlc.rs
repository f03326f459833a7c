//! evl front-end driver.
//!
//! Runs the semantic-analysis pipeline over one entry file: read,
//! parse, typecheck. Any source error terminates with status 1; a
//! clean run reports the analyzed scope and optionally dumps the AST.
//!
//! Usage:
//!   evlc <input-file> [options]
//!
//! Options:
//!   --std <file>       Standard library file for the prelude bootstrap
//!   --as-std           Treat the input file itself as part of the
//!                      standard library (enables `_name` builtins)
//!   --dump-ast <fmt>   Dump the parsed AST: text (default) or json
//!   --verbose          Print pool statistics after analysis

use std::path::PathBuf;

use clap::{Arg, ArgAction, Command};

use evl::ast::dump::{dump_node, dump_text};
use evl::config::Config;
use evl::interp::Interpreter;

fn main() {
    let matches = Command::new("evlc")
        .version(env!("CARGO_PKG_VERSION"))
        .about("evl semantic-analysis front-end")
        .arg(
            Arg::new("input")
                .help("Input evl source file")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("std")
                .long("std")
                .value_name("FILE")
                .help("Standard library file imported by the prelude")
                .default_value("std.evl"),
        )
        .arg(
            Arg::new("as-std")
                .long("as-std")
                .help("Treat the input file as part of the standard library")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dump-ast")
                .long("dump-ast")
                .value_name("FORMAT")
                .num_args(0..=1)
                .default_missing_value("text")
                .help("Dump the parsed AST: text or json"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Print pool statistics after analysis")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let input = PathBuf::from(matches.get_one::<String>("input").expect("input is required"));

    let config = Config {
        entrypoint_filepath: input.clone(),
        std_filepath: PathBuf::from(matches.get_one::<String>("std").expect("has a default")),
        ..Config::default()
    };

    let mut interp = Interpreter::new(config);

    let file_type = interp.import_file(&input, matches.get_flag("as-std"));

    if let Some(format) = matches.get_one::<String>("dump-ast") {
        let root = interp
            .cached_ast_root(&input)
            .expect("the entry file was just imported");

        match format.as_str() {
            "json" => {
                let tree = dump_node(interp.asts(), interp.identifiers(), root);

                println!(
                    "{}",
                    serde_json::to_string_pretty(&tree).expect("dump nodes serialize")
                );
            }
            _ => print!("{}", dump_text(interp.asts(), interp.identifiers(), root)),
        }
    }

    if matches.get_flag("verbose") {
        eprintln!(
            "{}: analyzed ({} interned identifiers, {} types)",
            input.display(),
            interp.identifiers().len(),
            interp.types().len(),
        );
    }

    println!(
        "{}: {} top-level definition(s)",
        input.display(),
        interp.types().member_count(file_type),
    );
}
