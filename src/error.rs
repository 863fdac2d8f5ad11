//! Shared error type for the compilation pipeline.
//!
//! Language-level mistakes are rendered by the
//! [`DiagnosticEngine`](crate::diagnostic::DiagnosticEngine) at the point of
//! detection. What travels back through `?` is only the verdict: the stage
//! failed and how many errors were printed, so callers never get their hands
//! on a partial AST or half-written assembly.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CompileError {
  /// One or more Error/Fatal diagnostics were emitted by a stage.
  #[snafu(display("compilation failed with {errors} error(s)"))]
  Diagnosed { errors: u32 },

  /// The code generator finished with pushes and pops out of balance.
  #[snafu(display("operand stack unbalanced after code generation (depth {depth})"))]
  StackImbalance { depth: i64 },

  #[snafu(display("failed to write assembly to {path}"))]
  Output {
    path: String,
    source: std::io::Error,
  },
}
