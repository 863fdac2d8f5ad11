//! Location-aware diagnostics with caret rendering.
//!
//! A [`DiagnosticEngine`] lives for exactly one compilation. Every stage that
//! can fail borrows it and reports through it; the engine renders each
//! diagnostic immediately in the familiar compiler layout:
//!
//! ```text
//! <input>:1:3: error: expected an expression
//! 1+
//!   ^
//! ```
//!
//! Counters use interior mutability so the lexer and the parser can share a
//! plain `&DiagnosticEngine` while both report into it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::io::{self, Write};
use std::process;

use tracing::trace;

use crate::CompileOptions;

/// Byte offset into the source buffer, or the invalid sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SourceLocation(Option<usize>);

impl SourceLocation {
  pub fn new(offset: usize) -> Self {
    Self(Some(offset))
  }

  pub fn invalid() -> Self {
    Self(None)
  }

  pub fn is_valid(&self) -> bool {
    self.0.is_some()
  }

  pub fn offset(&self) -> Option<usize> {
    self.0
  }
}

/// Half-open highlight range. Only used for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceRange {
  begin: SourceLocation,
  end: SourceLocation,
}

impl SourceRange {
  pub fn new(begin: SourceLocation, end: SourceLocation) -> Self {
    Self { begin, end }
  }

  pub fn begin(&self) -> SourceLocation {
    self.begin
  }

  pub fn end(&self) -> SourceLocation {
    self.end
  }
}

impl From<SourceLocation> for SourceRange {
  fn from(loc: SourceLocation) -> Self {
    Self::new(loc, loc)
  }
}

/// Severity of a diagnostic, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
  Ignored,
  Note,
  Remark,
  Warning,
  Error,
  Fatal,
}

impl fmt::Display for Level {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      Level::Ignored => "ignored",
      Level::Note => "note",
      Level::Remark => "remark",
      Level::Warning => "warning",
      Level::Error => "error",
      Level::Fatal => "fatal error",
    };
    f.write_str(label)
  }
}

/// Every diagnostic the compiler knows how to produce.
///
/// The level of each one is fixed here; the engine may only promote
/// warnings (see [`DiagnosticEngine::set_warnings_as_errors`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagId {
  InvalidCharacter,
  UnterminatedLiteral,
  ExpectedExpression,
  ExpectedToken,
  ExtraToken,
  NestingTooDeep,
  MatchingParen,
  LiteralTooLarge,
  RedundantUnaryPlus,
  CannotOpenOutput,
}

impl DiagId {
  pub fn level(self) -> Level {
    match self {
      DiagId::InvalidCharacter
      | DiagId::UnterminatedLiteral
      | DiagId::ExpectedExpression
      | DiagId::ExpectedToken
      | DiagId::ExtraToken
      | DiagId::NestingTooDeep => Level::Error,
      DiagId::MatchingParen => Level::Note,
      DiagId::LiteralTooLarge => Level::Warning,
      DiagId::RedundantUnaryPlus => Level::Ignored,
      DiagId::CannotOpenOutput => Level::Fatal,
    }
  }

  pub fn description(self) -> &'static str {
    match self {
      DiagId::InvalidCharacter => "invalid character in source",
      DiagId::UnterminatedLiteral => "missing terminating quote character",
      DiagId::ExpectedExpression => "expected an expression",
      DiagId::ExpectedToken => "expected a different token",
      DiagId::ExtraToken => "extra token",
      DiagId::NestingTooDeep => "expression nested too deeply",
      DiagId::MatchingParen => "to match this '('",
      DiagId::LiteralTooLarge => "integer literal is too large to be represented in 64 bits",
      DiagId::RedundantUnaryPlus => "unary '+' has no effect",
      DiagId::CannotOpenOutput => "cannot open output file",
    }
  }
}

#[derive(Debug)]
enum Sink {
  Stderr,
  Buffer(String),
}

pub struct DiagnosticEngine<'a> {
  source: &'a str,
  file_name: String,
  num_warnings: Cell<u32>,
  num_errors: Cell<u32>,
  suppress_all: bool,
  warnings_as_errors: bool,
  sink: RefCell<Sink>,
}

impl<'a> DiagnosticEngine<'a> {
  /// Engine that renders to stderr.
  pub fn new(source: &'a str, file_name: impl Into<String>) -> Self {
    Self::with_sink(source, file_name.into(), Sink::Stderr)
  }

  /// Engine that keeps rendered text in memory; read it back with
  /// [`captured_output`](Self::captured_output).
  pub fn buffered(source: &'a str, file_name: impl Into<String>) -> Self {
    Self::with_sink(source, file_name.into(), Sink::Buffer(String::new()))
  }

  pub fn from_options(source: &'a str, options: &CompileOptions) -> Self {
    let mut engine = Self::new(source, options.file_name.clone());
    engine.set_warnings_as_errors(options.warnings_as_errors);
    engine.set_suppress_all_diagnostics(options.suppress_diagnostics);
    engine
  }

  fn with_sink(source: &'a str, file_name: String, sink: Sink) -> Self {
    Self {
      source,
      file_name,
      num_warnings: Cell::new(0),
      num_errors: Cell::new(0),
      suppress_all: false,
      warnings_as_errors: false,
      sink: RefCell::new(sink),
    }
  }

  pub fn set_suppress_all_diagnostics(&mut self, suppress: bool) {
    self.suppress_all = suppress;
  }

  pub fn set_warnings_as_errors(&mut self, enabled: bool) {
    self.warnings_as_errors = enabled;
  }

  pub fn num_warnings(&self) -> u32 {
    self.num_warnings.get()
  }

  pub fn num_errors(&self) -> u32 {
    self.num_errors.get()
  }

  pub fn has_error_occurred(&self) -> bool {
    self.num_errors() > 0
  }

  /// Everything rendered so far by a [`buffered`](Self::buffered) engine.
  pub fn captured_output(&self) -> String {
    match &*self.sink.borrow() {
      Sink::Buffer(text) => text.clone(),
      Sink::Stderr => String::new(),
    }
  }

  pub fn report(&self, loc: SourceLocation, id: DiagId, message: &str) {
    self.emit(SourceRange::from(loc), id.level(), message);
  }

  pub fn report_range(&self, range: SourceRange, id: DiagId, message: &str) {
    self.emit(range, id.level(), message);
  }

  /// Start a diagnostic whose message is assembled piecewise. It is emitted
  /// when the builder is finished or dropped, whichever comes first.
  pub fn diag(&self, loc: SourceLocation, id: DiagId) -> DiagnosticBuilder<'_> {
    DiagnosticBuilder {
      engine: self,
      range: SourceRange::from(loc),
      id,
      message: String::new(),
      active: true,
    }
  }

  /// 1-based line and column of `loc`; the column counts characters.
  pub fn line_and_column(&self, loc: SourceLocation) -> Option<(usize, usize)> {
    let offset = self.checked_offset(loc)?;
    let mut line = 1;
    let mut column = 1;
    for c in self.source[..offset].chars() {
      if c == '\n' {
        line += 1;
        column = 1;
      } else {
        column += 1;
      }
    }
    Some((line, column))
  }

  fn checked_offset(&self, loc: SourceLocation) -> Option<usize> {
    loc
      .offset()
      .filter(|&offset| self.source.is_char_boundary(offset))
  }

  fn emit(&self, range: SourceRange, mut level: Level, message: &str) {
    if level == Level::Ignored {
      return;
    }
    if level == Level::Warning && self.warnings_as_errors {
      level = Level::Error;
    }

    match level {
      Level::Warning => self.num_warnings.set(self.num_warnings.get() + 1),
      Level::Error | Level::Fatal => self.num_errors.set(self.num_errors.get() + 1),
      _ => {}
    }
    trace!(%level, text = message, "diagnostic");

    if !self.suppress_all {
      let rendered = self.render(range, level, message);
      match &mut *self.sink.borrow_mut() {
        Sink::Buffer(text) => text.push_str(&rendered),
        Sink::Stderr => {
          let _ = io::stderr().lock().write_all(rendered.as_bytes());
        }
      }
    }

    if level == Level::Fatal {
      let _ = io::stderr().flush();
      process::exit(1);
    }
  }

  fn render(&self, range: SourceRange, level: Level, message: &str) -> String {
    let loc = range.begin();
    let (line, column) = self.line_and_column(loc).unwrap_or((1, 1));
    let mut out = format!("{}:{line}:{column}: {level}: {message}\n", self.file_name);

    let Some(offset) = self.checked_offset(loc) else {
      return out;
    };
    let line_start = self.source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line_end = self.source[offset..]
      .find(['\n', '\r'])
      .map_or(self.source.len(), |i| offset + i);
    out.push_str(&self.source[line_start..line_end]);
    out.push('\n');

    // Echo tabs so the caret lines up with the source line above.
    for c in self.source[line_start..offset].chars() {
      out.push(if c == '\t' { '\t' } else { ' ' });
    }
    out.push('^');

    let end = self
      .checked_offset(range.end())
      .map_or(offset, |end| end.min(line_end));
    if end > offset {
      let width = self.source[offset..end].chars().count();
      out.push_str(&"~".repeat(width - 1));
    }
    out.push('\n');
    out
  }
}

impl fmt::Debug for DiagnosticEngine<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DiagnosticEngine")
      .field("file_name", &self.file_name)
      .field("num_warnings", &self.num_warnings.get())
      .field("num_errors", &self.num_errors.get())
      .finish_non_exhaustive()
  }
}

/// Accumulates a message and highlight range, then reports exactly once.
#[must_use = "a diagnostic is reported when the builder is dropped"]
pub struct DiagnosticBuilder<'e> {
  engine: &'e DiagnosticEngine<'e>,
  range: SourceRange,
  id: DiagId,
  message: String,
  active: bool,
}

impl DiagnosticBuilder<'_> {
  pub fn append(mut self, text: impl AsRef<str>) -> Self {
    self.message.push_str(text.as_ref());
    self
  }

  pub fn append_int(mut self, value: i64) -> Self {
    self.message.push_str(&value.to_string());
    self
  }

  /// Highlight `range` instead of the single starting location.
  pub fn range(mut self, range: SourceRange) -> Self {
    self.range = range;
    self
  }

  pub fn fix_it(mut self, _range: SourceRange, replacement: &str) -> Self {
    self
      .message
      .push_str(&format!(" (fix: replace with '{replacement}')"));
    self
  }

  pub fn emit(mut self) {
    self.flush();
  }

  fn flush(&mut self) {
    if !self.active {
      return;
    }
    self.active = false;
    let message = if self.message.is_empty() {
      self.id.description().to_string()
    } else {
      std::mem::take(&mut self.message)
    };
    self.engine.report_range(self.range, self.id, &message);
  }
}

impl Drop for DiagnosticBuilder<'_> {
  fn drop(&mut self) {
    self.flush();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn renders_header_source_line_and_caret() {
    let diags = DiagnosticEngine::buffered("1 +\n  @", "<input>");
    diags.report(
      SourceLocation::new(6),
      DiagId::InvalidCharacter,
      "invalid character '@'",
    );

    assert_eq!(
      diags.captured_output(),
      "<input>:2:3: error: invalid character '@'\n  @\n  ^\n"
    );
    assert_eq!(diags.num_errors(), 1);
  }

  #[test]
  fn caret_line_echoes_tabs() {
    let diags = DiagnosticEngine::buffered("\t1 $", "t.c");
    diags.report(SourceLocation::new(3), DiagId::InvalidCharacter, "bad");

    assert_eq!(diags.captured_output(), "t.c:1:4: error: bad\n\t1 $\n\t  ^\n");
  }

  #[test]
  fn range_is_underlined_with_tildes() {
    let diags = DiagnosticEngine::buffered("1 + abc", "<input>");
    let range = SourceRange::new(SourceLocation::new(4), SourceLocation::new(7));
    diags.report_range(range, DiagId::ExtraToken, "extra token");

    assert_eq!(
      diags.captured_output(),
      "<input>:1:5: error: extra token\n1 + abc\n    ^~~\n"
    );
  }

  #[test]
  fn source_line_stops_at_line_break() {
    let diags = DiagnosticEngine::buffered("12 #\r\n3", "<input>");
    let range = SourceRange::new(SourceLocation::new(3), SourceLocation::new(7));
    diags.report_range(range, DiagId::ExtraToken, "extra token");

    assert_eq!(
      diags.captured_output(),
      "<input>:1:4: error: extra token\n12 #\n   ^\n"
    );
  }

  #[test]
  fn invalid_location_prints_header_only() {
    let diags = DiagnosticEngine::buffered("1", "prog");
    diags.report(SourceLocation::invalid(), DiagId::ExpectedExpression, "oops");

    assert_eq!(diags.captured_output(), "prog:1:1: error: oops\n");
  }

  #[test]
  fn location_at_end_of_buffer_is_valid() {
    let diags = DiagnosticEngine::buffered("1+", "<input>");
    assert_eq!(diags.line_and_column(SourceLocation::new(2)), Some((1, 3)));
    assert_eq!(diags.line_and_column(SourceLocation::new(3)), None);
  }

  #[test]
  fn warnings_are_counted_and_can_be_promoted() {
    let mut diags = DiagnosticEngine::buffered("99", "<input>");
    diags.report(SourceLocation::new(0), DiagId::LiteralTooLarge, "too big");
    assert_eq!(diags.num_warnings(), 1);
    assert!(!diags.has_error_occurred());

    diags.set_warnings_as_errors(true);
    diags.report(SourceLocation::new(0), DiagId::LiteralTooLarge, "too big");
    assert_eq!(diags.num_warnings(), 1);
    assert_eq!(diags.num_errors(), 1);
    assert!(diags.captured_output().contains("<input>:1:1: error: too big"));
  }

  #[test]
  fn suppression_still_counts() {
    let mut diags = DiagnosticEngine::buffered("1", "<input>");
    diags.set_suppress_all_diagnostics(true);
    diags.report(SourceLocation::new(0), DiagId::ExtraToken, "extra token");

    assert_eq!(diags.num_errors(), 1);
    assert!(diags.captured_output().is_empty());
  }

  #[test]
  fn ignored_and_note_levels_do_not_count() {
    let diags = DiagnosticEngine::buffered("+1", "<input>");
    diags.report(SourceLocation::new(0), DiagId::RedundantUnaryPlus, "noop");
    assert!(diags.captured_output().is_empty());

    diags.report(SourceLocation::new(0), DiagId::MatchingParen, "to match this '('");
    assert_eq!(diags.num_errors(), 0);
    assert_eq!(diags.num_warnings(), 0);
    assert!(diags.captured_output().starts_with("<input>:1:1: note: "));
  }

  #[test]
  fn builder_reports_once_on_drop() {
    let diags = DiagnosticEngine::buffered("(1", "<input>");
    {
      let _pending = diags
        .diag(SourceLocation::new(2), DiagId::ExpectedToken)
        .append("expected '")
        .append(")")
        .append("'");
    }

    assert_eq!(diags.num_errors(), 1);
    assert_eq!(
      diags.captured_output(),
      "<input>:1:3: error: expected ')'\n(1\n  ^\n"
    );
  }

  #[test]
  fn builder_emit_is_not_repeated_by_drop() {
    let diags = DiagnosticEngine::buffered("7", "<input>");
    diags
      .diag(SourceLocation::new(0), DiagId::ExtraToken)
      .append("value ")
      .append_int(-7)
      .fix_it(SourceRange::from(SourceLocation::new(0)), "8")
      .emit();

    assert_eq!(diags.num_errors(), 1);
    assert!(
      diags
        .captured_output()
        .contains("error: value -7 (fix: replace with '8')")
    );
  }

  #[test]
  fn empty_builder_message_uses_description() {
    let diags = DiagnosticEngine::buffered("", "<input>");
    diags
      .diag(SourceLocation::new(0), DiagId::ExpectedExpression)
      .emit();

    assert!(
      diags
        .captured_output()
        .starts_with("<input>:1:1: error: expected an expression\n")
    );
  }
}
