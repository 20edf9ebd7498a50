//! Crate root: wires together the compilation pipeline.
//!
//! The stages run strictly in sequence:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` builds the statement tree and assigns frame slots to locals.
//! - `codegen` lowers the program into x86-64 Intel-syntax assembly.
//! - `error` centralises reporting utilities shared by the other modules.

pub mod error;
pub mod locals;
pub mod parser;
pub mod queue;
pub mod tokenizer;

mod codegen;

pub use error::{CompileError, CompileResult};

/// Compile a source string into assembly.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  let tokens = tokenizer::tokenize(source)?;
  tracing::debug!(tokens = tokens.len(), "tokenized input");
  let program = parser::parse(tokens, source)?;
  codegen::generate(&program)
}
