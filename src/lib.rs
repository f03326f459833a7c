//! evl compiler front-end
//!
//! This crate implements the semantic-analysis pipeline of the evl
//! compiler: lexing, parsing into a compact preorder AST, structural
//! type interning, and mutually recursive compile-time typechecking
//! and evaluation.
//!
//! ## Architecture
//!
//! The pipeline is built from pools that are created once per run and
//! grow monotonically until shutdown:
//!
//! - [`identifiers::IdentifierPool`] interns identifier spellings and
//!   doubles as the keyword table consulted by the lexer.
//! - [`source::SourceReader`] loads files, deduplicating both by
//!   normalized path and by OS file identity, and hands out stable
//!   [`source::SourceId`] positions.
//! - [`parser::Parser`] drives the lexer and emits nodes into an
//!   [`ast::AstBuilder`]; [`ast::AstBuilder::complete`] reorders the
//!   scratch tree into the permanent preorder [`ast::AstPool`] layout.
//! - [`types::TypePool`] stores each structural type once and supports
//!   open composite types whose members are completed lazily.
//! - [`interp::Interpreter`] typechecks and evaluates expressions at
//!   compile time, coordinating scope contexts and resumption tokens.
//!
//! Source errors are fatal: they print a located message through
//! [`diagnostics::ErrorSink`] and terminate the process with status 1.
//!
//! ## Usage
//!
//! ```no_run
//! use evl::config::Config;
//! use evl::interp::Interpreter;
//!
//! let config = Config::default();
//! let mut interp = Interpreter::new(config);
//! let file_type = interp.import_entrypoint();
//! let _ = file_type;
//! ```

pub mod arena;
pub mod ast;
pub mod comp_values;
pub mod config;
pub mod diagnostics;
pub mod globals;
pub mod identifiers;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod source;
pub mod types;

pub use config::Config;
pub use interp::Interpreter;
