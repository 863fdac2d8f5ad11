//! Lexical analysis: a pull-based lexer over a borrowed source buffer.
//!
//! Tokens are materialised one at a time when the parser asks for them. A
//! small lookahead cache backs `peek`, and the scan position can be saved and
//! restored for backtracking. Multi-character punctuators are matched before
//! their prefixes (maximal munch), and a character that starts no token is
//! diagnosed and skipped so lexing never aborts.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::ops::Range;

use tracing::trace;

use crate::diagnostic::{DiagId, DiagnosticEngine, SourceLocation, SourceRange};
use crate::token::{MAX_PUNCTUATOR_LEN, Token, TokenKind, describe_token};

/// Opaque scan position returned by [`Lexer::save_position`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerPosition(usize);

pub struct Lexer<'a> {
  source: &'a str,
  start: usize,
  end: usize,
  pos: usize,
  diags: &'a DiagnosticEngine<'a>,
  /// Tokens lexed ahead of the consumer, each with the scan position it
  /// started from.
  lookahead: VecDeque<(usize, Token)>,
  /// Everything before this offset has already been diagnosed.
  diagnosed_until: usize,
}

impl<'a> Lexer<'a> {
  pub fn new(source: &'a str, diags: &'a DiagnosticEngine<'a>) -> Self {
    Self::with_range(source, 0..source.len(), diags)
  }

  /// Lex only `range` of `source`. Token locations remain offsets into the
  /// whole buffer.
  pub fn with_range(
    source: &'a str,
    range: Range<usize>,
    diags: &'a DiagnosticEngine<'a>,
  ) -> Self {
    let end = range.end.min(source.len());
    let start = range.start.min(end);
    Self {
      source,
      start,
      end,
      pos: start,
      diags,
      lookahead: VecDeque::new(),
      diagnosed_until: start,
    }
  }

  /// Consume and return the next token. Past the end this keeps returning
  /// `Eof`.
  pub fn next_token(&mut self) -> Token {
    match self.lookahead.pop_front() {
      Some((_, token)) => token,
      None => self.lex(),
    }
  }

  pub fn peek(&mut self) -> &Token {
    self.peek_nth(1)
  }

  /// Look `n` tokens ahead without consuming; `peek_nth(1)` is `peek()`.
  pub fn peek_nth(&mut self, n: usize) -> &Token {
    let n = n.max(1);
    while self.lookahead.len() < n {
      let start = self.pos;
      let token = self.lex();
      self.lookahead.push_back((start, token));
    }
    &self.lookahead[n - 1].1
  }

  /// Position of the next unconsumed token, including any still sitting in
  /// the lookahead cache.
  pub fn save_position(&self) -> LexerPosition {
    LexerPosition(
      self
        .lookahead
        .front()
        .map_or(self.pos, |&(start, _)| start),
    )
  }

  pub fn reset_position(&mut self, position: LexerPosition) {
    self.pos = position.0.clamp(self.start, self.end);
    self.lookahead.clear();
  }

  /// Render every token in the range without disturbing the scan position.
  pub fn dump_tokens(&mut self) -> String {
    let saved = self.save_position();
    self.reset_position(LexerPosition(self.start));

    let mut out = String::from("=== Token Dump ===\n");
    loop {
      let token = self.next_token();
      let (line, column) = self
        .diags
        .line_and_column(token.location())
        .unwrap_or((0, 0));
      let _ = write!(
        out,
        "{:?} '{}' {line}:{column}",
        token.kind,
        describe_token(&token, self.source)
      );
      if let Some(value) = token.value {
        let _ = write!(out, " value={value}");
      }
      out.push('\n');
      if token.is(TokenKind::Eof) {
        break;
      }
    }
    out.push_str("=== End Token Dump ===\n");

    self.reset_position(saved);
    out
  }

  fn rest(&self) -> &'a str {
    &self.source[self.pos..self.end]
  }

  fn lex(&mut self) -> Token {
    self.skip_whitespace();
    let start = self.pos;

    let Some(c) = self.rest().chars().next() else {
      return Token::new(TokenKind::Eof, start, 0, None);
    };

    let token = if c.is_ascii_alphabetic() || c == '_' {
      self.lex_identifier(start)
    } else if c.is_ascii_digit() {
      self.lex_numeric_constant(start)
    } else if c == '"' || c == '\'' {
      self.lex_quoted(start, c)
    } else if let Some((kind, len)) = match_punctuator(self.rest()) {
      self.pos += len;
      Token::new(kind, start, len, None)
    } else {
      self.lex_unknown(start, c)
    };

    trace!(kind = ?token.kind, loc = token.loc, len = token.len, "lexed token");
    token
  }

  fn skip_whitespace(&mut self) {
    let skipped = self
      .rest()
      .bytes()
      .take_while(|&b| matches!(b, b' ' | b'\t' | b'\x0c' | b'\x0b' | b'\r' | b'\n'))
      .count();
    self.pos += skipped;
  }

  fn lex_identifier(&mut self, start: usize) -> Token {
    let len = self
      .rest()
      .bytes()
      .take_while(|&b| b.is_ascii_alphanumeric() || b == b'_')
      .count();
    self.pos += len;

    let spelling = &self.source[start..self.pos];
    let kind = TokenKind::keyword(spelling).unwrap_or(TokenKind::Identifier);
    Token::new(kind, start, len, None)
  }

  /// Decimal digits only. Values past `u64::MAX` wrap and draw a warning.
  fn lex_numeric_constant(&mut self, start: usize) -> Token {
    let len = self.rest().bytes().take_while(u8::is_ascii_digit).count();
    self.pos += len;

    let mut value = 0u64;
    let mut overflowed = false;
    for digit in self.source[start..self.pos].bytes() {
      let (scaled, mul_overflow) = value.overflowing_mul(10);
      let (sum, add_overflow) = scaled.overflowing_add(u64::from(digit - b'0'));
      overflowed |= mul_overflow || add_overflow;
      value = sum;
    }

    if overflowed && self.should_diagnose(start, self.pos) {
      self
        .diags
        .diag(SourceLocation::new(start), DiagId::LiteralTooLarge)
        .range(span(start, self.pos))
        .append("integer literal is too large to be represented in 64 bits; it wraps to ")
        .append(value.to_string())
        .emit();
    }

    Token::new(TokenKind::NumericConstant, start, len, Some(value))
  }

  /// String literal or character constant. An unterminated one runs to the
  /// end of its line.
  fn lex_quoted(&mut self, start: usize, quote: char) -> Token {
    let kind = if quote == '"' {
      TokenKind::StringLiteral
    } else {
      TokenKind::CharConstant
    };
    let body_start = start + quote.len_utf8();
    let body = &self.source[body_start..self.end];

    let mut escaped = false;
    let mut closed_at = None;
    let mut line_end = body.len();
    for (i, c) in body.char_indices() {
      if escaped {
        escaped = false;
        continue;
      }
      match c {
        '\\' => escaped = true,
        '\n' => {
          line_end = i;
          break;
        }
        _ if c == quote => {
          closed_at = Some(i + c.len_utf8());
          break;
        }
        _ => {}
      }
    }

    let end = body_start + closed_at.unwrap_or(line_end);
    self.pos = end;

    if closed_at.is_none() && self.should_diagnose(start, body_start) {
      self
        .diags
        .diag(SourceLocation::new(start), DiagId::UnterminatedLiteral)
        .append(format!("missing terminating {quote} character"))
        .emit();
    }

    Token::new(kind, start, end - start, None)
  }

  fn lex_unknown(&mut self, start: usize, c: char) -> Token {
    let len = c.len_utf8();
    self.pos += len;

    if self.should_diagnose(start, self.pos) {
      self
        .diags
        .diag(SourceLocation::new(start), DiagId::InvalidCharacter)
        .append(format!("invalid character '{c}'"))
        .emit();
    }

    Token::new(TokenKind::Unknown, start, len, None)
  }

  /// Guards against reporting the same span twice after a reset.
  fn should_diagnose(&mut self, start: usize, end: usize) -> bool {
    if start < self.diagnosed_until {
      return false;
    }
    self.diagnosed_until = end;
    true
  }
}

fn span(start: usize, end: usize) -> SourceRange {
  SourceRange::new(SourceLocation::new(start), SourceLocation::new(end))
}

/// Longest punctuator at the start of `rest`: three characters, then two,
/// then one.
fn match_punctuator(rest: &str) -> Option<(TokenKind, usize)> {
  (1..=MAX_PUNCTUATOR_LEN).rev().find_map(|len| {
    let candidate = rest.get(..len)?;
    TokenKind::punctuator(candidate).map(|kind| (kind, len))
  })
}

/// Lex the whole buffer into a vector terminated by an `Eof` token.
pub fn tokenize<'a>(source: &'a str, diags: &'a DiagnosticEngine<'a>) -> Vec<Token> {
  let mut lexer = Lexer::new(source, diags);
  let mut tokens = Vec::new();
  loop {
    let token = lexer.next_token();
    let done = token.is(TokenKind::Eof);
    tokens.push(token);
    if done {
      return tokens;
    }
  }
}
