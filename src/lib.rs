//! Crate root: wires together the compilation pipeline.
//!
//! The stages are small and run strictly in order:
//! - `tokenizer` turns the source into tokens on demand (kinds live in `token`).
//! - `parser` pulls those tokens and builds an `ast::AstNode` tree.
//! - `codegen` lowers the tree into x86-64 AT&T assembly.
//! - `diagnostic` renders every error the stages report; `error` carries the
//!   verdict back to the caller.

pub mod ast;
pub mod codegen;
pub mod diagnostic;
pub mod error;
pub mod parser;
pub mod token;
pub mod tokenizer;

use tracing::debug;

pub use codegen::CodegenOptions;
pub use diagnostic::DiagnosticEngine;
pub use error::{CompileError, CompileResult};

use parser::Parser;
use tokenizer::Lexer;

/// Knobs for one compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
  /// Name shown in diagnostic headers.
  pub file_name: String,
  pub warnings_as_errors: bool,
  /// Count diagnostics but print nothing.
  pub suppress_diagnostics: bool,
  pub emit_stack_note: bool,
  /// Write a token dump to stderr before parsing.
  pub dump_tokens: bool,
  /// Write the AST to stderr before code generation.
  pub dump_ast: bool,
}

impl Default for CompileOptions {
  fn default() -> Self {
    Self {
      file_name: "<input>".to_string(),
      warnings_as_errors: false,
      suppress_diagnostics: false,
      emit_stack_note: true,
      dump_tokens: false,
      dump_ast: false,
    }
  }
}

impl CompileOptions {
  pub fn codegen(&self) -> CodegenOptions {
    CodegenOptions {
      emit_stack_note: self.emit_stack_note,
    }
  }
}

/// Compile a source string into AT&T assembly, printing diagnostics to
/// stderr.
pub fn compile(source: &str, options: &CompileOptions) -> CompileResult<String> {
  let diags = DiagnosticEngine::from_options(source, options);
  generate_assembly(source, &diags, options)
}

/// Run the pipeline against a caller-provided diagnostic engine. No assembly
/// is produced if any stage reported an error.
pub fn generate_assembly<'a>(
  source: &'a str,
  diags: &'a DiagnosticEngine<'a>,
  options: &CompileOptions,
) -> CompileResult<String> {
  debug!(bytes = source.len(), "lexing and parsing");
  let mut lexer = Lexer::new(source, diags);
  if options.dump_tokens {
    eprint!("{}", lexer.dump_tokens());
  }

  let ast = Parser::new(lexer, diags).parse()?;
  if diags.has_error_occurred() {
    return Err(CompileError::Diagnosed {
      errors: diags.num_errors(),
    });
  }

  if options.dump_ast {
    eprint!("=== AST Dump ===\n{}=== End AST Dump ===\n", ast.dump());
  }

  codegen::generate(&ast, options.codegen())
}
