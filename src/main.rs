use std::fs::File;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use snafu::ResultExt;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use exprcc::diagnostic::{DiagId, DiagnosticEngine, SourceLocation};
use exprcc::error::{CompileError, CompileResult, OutputSnafu};
use exprcc::{CompileOptions, generate_assembly};

/// Compile an integer expression into x86-64 assembly whose `main` returns
/// its value.
#[derive(Debug, Parser)]
#[command(name = "exprcc", version)]
struct Cli {
  /// Expression to compile, e.g. "(1+2)*3"
  expression: String,

  /// Where to write the assembly; `-` means stdout
  #[arg(short, long, default_value = "output.s")]
  output: String,

  /// Dump all tokens to stderr
  #[arg(long)]
  dump_tokens: bool,

  /// Dump the AST to stderr
  #[arg(long)]
  dump_ast: bool,

  /// Treat warnings as errors
  #[arg(long)]
  warnings_as_errors: bool,

  /// Do not print diagnostics
  #[arg(short, long)]
  quiet: bool,

  /// Leave out the non-executable stack note
  #[arg(long)]
  no_stack_note: bool,
}

impl Cli {
  fn compile_options(&self) -> CompileOptions {
    CompileOptions {
      warnings_as_errors: self.warnings_as_errors,
      suppress_diagnostics: self.quiet,
      emit_stack_note: !self.no_stack_note,
      dump_tokens: self.dump_tokens,
      dump_ast: self.dump_ast,
      ..CompileOptions::default()
    }
  }
}

fn main() -> ExitCode {
  init_tracing();
  let cli = Cli::parse();
  let options = cli.compile_options();
  let diags = DiagnosticEngine::from_options(&cli.expression, &options);

  let asm = match generate_assembly(&cli.expression, &diags, &options) {
    Ok(asm) => asm,
    Err(err) => return fail(&cli, &err),
  };

  let mut out = match open_output(&cli.output) {
    Ok(out) => out,
    Err(err) => {
      // Fatal: the engine exits the process.
      diags.report(
        SourceLocation::invalid(),
        DiagId::CannotOpenOutput,
        &format!("cannot open output file '{}': {err}", cli.output),
      );
      return ExitCode::FAILURE;
    }
  };

  match write_output(out.as_mut(), &asm, &cli.output) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => fail(&cli, &err),
  }
}

fn fail(cli: &Cli, err: &CompileError) -> ExitCode {
  debug!(%err, "compilation failed");
  if !cli.quiet {
    eprintln!("exprcc: {err}");
  }
  ExitCode::FAILURE
}

fn init_tracing() {
  let filter = EnvFilter::try_from_env("EXPRCC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .init();
}

fn open_output(path: &str) -> io::Result<Box<dyn Write>> {
  if path == "-" {
    return Ok(Box::new(io::stdout().lock()));
  }
  Ok(Box::new(File::create(path)?))
}

fn write_output(out: &mut dyn Write, asm: &str, path: &str) -> CompileResult<()> {
  out
    .write_all(asm.as_bytes())
    .context(OutputSnafu { path })?;
  out.flush().context(OutputSnafu { path })
}
