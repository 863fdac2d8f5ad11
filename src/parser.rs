//! Recursive-descent parser producing an expression AST.
//!
//! One function per precedence level, lowest first:
//!
//! ```text
//! expr       = equality
//! equality   = relational ("==" relational | "!=" relational)*
//! relational = add ("<" add | "<=" add | ">" add | ">=" add)*
//! add        = mul ("+" mul | "-" mul)*
//! mul        = unary ("*" unary | "/" unary)*
//! unary      = ("+" | "-") unary | primary
//! primary    = "(" expr ")" | num
//! ```
//!
//! Tokens are pulled from the lexer one at a time. Syntax errors are
//! reported through the diagnostic engine and then surface as
//! [`CompileError::Diagnosed`], so a caller only ever sees a complete tree.

use tracing::debug;

use crate::ast::{AstNode, BinaryOp};
use crate::diagnostic::{DiagId, DiagnosticEngine};
use crate::error::{CompileError, CompileResult};
use crate::token::{Token, TokenKind};
use crate::tokenizer::{Lexer, LexerPosition};

/// Unary operators and parentheses each count one level.
const MAX_NESTING_DEPTH: usize = 256;

/// Snapshot for backtracking; see [`Parser::save_state`].
#[derive(Debug, Clone)]
pub struct ParserState {
  lexer_pos: LexerPosition,
  current: Token,
}

pub struct Parser<'a> {
  lexer: Lexer<'a>,
  diags: &'a DiagnosticEngine<'a>,
  tok: Token,
  depth: usize,
}

impl<'a> Parser<'a> {
  pub fn new(mut lexer: Lexer<'a>, diags: &'a DiagnosticEngine<'a>) -> Self {
    let tok = next_significant(&mut lexer);
    Self {
      lexer,
      diags,
      tok,
      depth: 0,
    }
  }

  /// Parse one complete expression. The parser is consumed: a second parse
  /// needs a fresh lexer.
  pub fn parse(mut self) -> CompileResult<AstNode> {
    let node = self.parse_expr()?;

    if !self.tok.is(TokenKind::Eof) {
      self
        .diags
        .diag(self.tok.location(), DiagId::ExtraToken)
        .range(self.tok.range())
        .append("extra token")
        .emit();
      return Err(self.failure());
    }

    debug!(nodes = node.node_count(), "parsed expression");
    Ok(node)
  }

  pub fn save_state(&self) -> ParserState {
    ParserState {
      lexer_pos: self.lexer.save_position(),
      current: self.tok.clone(),
    }
  }

  pub fn restore_state(&mut self, state: ParserState) {
    self.lexer.reset_position(state.lexer_pos);
    self.tok = state.current;
  }

  fn parse_expr(&mut self) -> CompileResult<AstNode> {
    self.parse_equality()
  }

  fn parse_equality(&mut self) -> CompileResult<AstNode> {
    let mut node = self.parse_relational()?;

    loop {
      let op = match self.tok.kind {
        TokenKind::EqualEqual => BinaryOp::Eq,
        TokenKind::ExclaimEqual => BinaryOp::Ne,
        _ => break,
      };

      self.advance();
      let rhs = self.parse_relational()?;
      node = AstNode::binary(op, node, rhs);
    }

    Ok(node)
  }

  /// `a > b` becomes `b < a` and `a >= b` becomes `b <= a`.
  fn parse_relational(&mut self) -> CompileResult<AstNode> {
    let mut node = self.parse_add()?;

    loop {
      let (op, swapped) = match self.tok.kind {
        TokenKind::Less => (BinaryOp::Lt, false),
        TokenKind::LessEqual => (BinaryOp::Le, false),
        TokenKind::Greater => (BinaryOp::Lt, true),
        TokenKind::GreaterEqual => (BinaryOp::Le, true),
        _ => break,
      };

      self.advance();
      let rhs = self.parse_add()?;
      node = if swapped {
        AstNode::binary(op, rhs, node)
      } else {
        AstNode::binary(op, node, rhs)
      };
    }

    Ok(node)
  }

  fn parse_add(&mut self) -> CompileResult<AstNode> {
    let mut node = self.parse_mul()?;

    loop {
      let op = match self.tok.kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        _ => break,
      };

      self.advance();
      let rhs = self.parse_mul()?;
      node = AstNode::binary(op, node, rhs);
    }

    Ok(node)
  }

  fn parse_mul(&mut self) -> CompileResult<AstNode> {
    let mut node = self.parse_unary()?;

    loop {
      let op = match self.tok.kind {
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        _ => break,
      };

      self.advance();
      let rhs = self.parse_unary()?;
      node = AstNode::binary(op, node, rhs);
    }

    Ok(node)
  }

  fn parse_unary(&mut self) -> CompileResult<AstNode> {
    if self.tok.is(TokenKind::Plus) {
      self.diags.report_range(
        self.tok.range(),
        DiagId::RedundantUnaryPlus,
        "unary '+' has no effect",
      );
      self.advance();
      return self.nested(Self::parse_unary);
    }

    if self.tok.is(TokenKind::Minus) {
      self.advance();
      let operand = self.nested(Self::parse_unary)?;
      return Ok(AstNode::unary_neg(operand));
    }

    self.parse_primary()
  }

  fn parse_primary(&mut self) -> CompileResult<AstNode> {
    if self.tok.is(TokenKind::LParen) {
      let open = self.tok.location();
      self.advance();
      let node = self.nested(Self::parse_expr)?;
      if let Err(err) = self.expect(TokenKind::RParen) {
        self.diags.report(open, DiagId::MatchingParen, "to match this '('");
        return Err(err);
      }
      return Ok(node);
    }

    if self.tok.is(TokenKind::NumericConstant)
      && let Some(value) = self.tok.value
    {
      self.advance();
      // Literals above i64::MAX keep their bit pattern.
      return Ok(AstNode::number(value as i64));
    }

    self
      .diags
      .diag(self.tok.location(), DiagId::ExpectedExpression)
      .range(self.tok.range())
      .append("expected an expression")
      .emit();
    Err(self.failure())
  }

  /// Consume the current token if it has the given kind, otherwise report
  /// what was expected.
  fn expect(&mut self, kind: TokenKind) -> CompileResult<()> {
    if self.tok.is(kind) {
      self.advance();
      return Ok(());
    }

    self
      .diags
      .diag(self.tok.location(), DiagId::ExpectedToken)
      .range(self.tok.range())
      .append(format!("expected {kind}"))
      .emit();
    Err(self.failure())
  }

  /// Run one level deeper in the grammar, refusing to go past
  /// [`MAX_NESTING_DEPTH`].
  fn nested(
    &mut self,
    parse: impl FnOnce(&mut Self) -> CompileResult<AstNode>,
  ) -> CompileResult<AstNode> {
    if self.depth >= MAX_NESTING_DEPTH {
      self
        .diags
        .diag(self.tok.location(), DiagId::NestingTooDeep)
        .range(self.tok.range())
        .append("expression nested too deeply")
        .emit();
      return Err(self.failure());
    }

    self.depth += 1;
    let result = parse(self);
    self.depth -= 1;
    result
  }

  fn advance(&mut self) {
    self.tok = next_significant(&mut self.lexer);
  }

  fn failure(&self) -> CompileError {
    CompileError::Diagnosed {
      errors: self.diags.num_errors(),
    }
  }
}

/// Next token the grammar should see. Unknown tokens were already
/// diagnosed by the lexer and are dropped here.
fn next_significant(lexer: &mut Lexer<'_>) -> Token {
  loop {
    let token = lexer.next_token();
    if !token.is(TokenKind::Unknown) {
      return token;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse_ok(source: &str) -> AstNode {
    let diags = DiagnosticEngine::buffered(source, "<input>");
    let parser = Parser::new(Lexer::new(source, &diags), &diags);
    let node = parser.parse().expect("expression should parse");
    assert!(diags.captured_output().is_empty(), "{}", diags.captured_output());
    node
  }

  /// Returns the error count and everything the engine rendered.
  fn parse_err(source: &str) -> (u32, String) {
    let diags = DiagnosticEngine::buffered(source, "<input>");
    let parser = Parser::new(Lexer::new(source, &diags), &diags);
    let result = parser.parse();
    assert!(matches!(result, Err(CompileError::Diagnosed { .. })));
    (diags.num_errors(), diags.captured_output())
  }

  #[test]
  fn multiplication_binds_tighter_than_addition() {
    assert_eq!(parse_ok("1+2*3").to_string(), "(add 1 (mul 2 3))");
    assert_eq!(parse_ok("(1+2)*3").to_string(), "(mul (add 1 2) 3)");
  }

  #[test]
  fn binary_operators_fold_left() {
    assert_eq!(parse_ok("1-2-3").to_string(), "(sub (sub 1 2) 3)");
    assert_eq!(parse_ok("8/4/2").to_string(), "(div (div 8 4) 2)");
    assert_eq!(parse_ok("1==2!=3").to_string(), "(ne (eq 1 2) 3)");
  }

  #[test]
  fn greater_than_is_normalised_to_less_than() {
    assert_eq!(parse_ok("5>3"), parse_ok("3<5"));
    assert_eq!(parse_ok("5>=3"), parse_ok("3<=5"));
    assert_eq!(parse_ok("1>2>3").to_string(), "(lt 3 (lt 2 1))");
  }

  #[test]
  fn equality_is_below_relational() {
    assert_eq!(parse_ok("1<2==1").to_string(), "(eq (lt 1 2) 1)");
    assert_eq!(parse_ok("1+1<=2*3").to_string(), "(le (add 1 1) (mul 2 3))");
  }

  #[test]
  fn unary_plus_is_dropped_and_minus_negates() {
    assert_eq!(parse_ok("-+-3").to_string(), "(neg (neg 3))");
    assert_eq!(parse_ok("+5"), AstNode::number(5));
    assert_eq!(parse_ok("-(1+2)").to_string(), "(neg (add 1 2))");
  }

  #[test]
  fn max_u64_literal_keeps_its_bits() {
    assert_eq!(parse_ok("18446744073709551615"), AstNode::number(-1));
  }

  #[test]
  fn truncated_expression_reports_once() {
    let (errors, output) = parse_err("1+");
    assert_eq!(errors, 1);
    assert_eq!(
      output,
      "<input>:1:3: error: expected an expression\n1+\n  ^\n"
    );
  }

  #[test]
  fn empty_input_expects_an_expression() {
    let (errors, output) = parse_err("");
    assert_eq!(errors, 1);
    assert!(output.starts_with("<input>:1:1: error: expected an expression\n"));
  }

  #[test]
  fn unclosed_paren_points_back_at_the_opener() {
    let (errors, output) = parse_err("(1+2");
    assert_eq!(errors, 1);
    assert_eq!(
      output,
      "<input>:1:5: error: expected ')'\n(1+2\n    ^\n\
       <input>:1:1: note: to match this '('\n(1+2\n^\n"
    );
  }

  #[test]
  fn trailing_token_is_rejected() {
    let (errors, output) = parse_err("1 2");
    assert_eq!(errors, 1);
    assert_eq!(output, "<input>:1:3: error: extra token\n1 2\n  ^\n");
  }

  #[test]
  fn non_expression_token_is_underlined() {
    let (errors, output) = parse_err("1 + abc");
    assert_eq!(errors, 1);
    assert_eq!(
      output,
      "<input>:1:5: error: expected an expression\n1 + abc\n    ^~~\n"
    );
  }

  #[test]
  fn invalid_character_is_skipped_by_the_grammar() {
    let source = "1+@+2";
    let diags = DiagnosticEngine::buffered(source, "<input>");
    let parser = Parser::new(Lexer::new(source, &diags), &diags);
    let node = parser.parse().expect("unknown tokens are skipped");

    assert_eq!(node.to_string(), "(add 1 2)");
    assert_eq!(diags.num_errors(), 1);
    assert_eq!(diags.captured_output().matches("error:").count(), 1);
    assert!(diags.captured_output().contains("invalid character '@'"));
  }

  #[test]
  fn nesting_up_to_the_limit_parses() {
    let depth = MAX_NESTING_DEPTH;
    let source = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
    assert_eq!(parse_ok(&source), AstNode::number(1));

    let source = format!("{}1", "-".repeat(depth));
    assert_eq!(parse_ok(&source).node_count(), depth + 1);
  }

  #[test]
  fn parentheses_nested_past_the_limit_are_rejected() {
    let depth = 10_000;
    let source = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
    let (errors, output) = parse_err(&source);
    assert_eq!(errors, 1);
    assert_eq!(output.matches("error:").count(), 1);
    // Reported at the first token inside the level that is one too deep.
    assert!(
      output.starts_with(&format!(
        "<input>:1:{}: error: expression nested too deeply\n",
        MAX_NESTING_DEPTH + 2
      )),
      "{output}"
    );
    assert!(!output.contains("note:"));
  }

  #[test]
  fn unary_minus_nested_past_the_limit_is_rejected() {
    let source = format!("{}1", "-".repeat(10_000));
    let (errors, output) = parse_err(&source);
    assert_eq!(errors, 1);
    assert!(output.contains("error: expression nested too deeply"));

    let source = format!("{}1", "-(".repeat(MAX_NESTING_DEPTH));
    let (errors, _) = parse_err(&source);
    assert_eq!(errors, 1);
  }

  #[test]
  fn restoring_state_replays_the_same_parse() {
    let source = "1 + 2";
    let diags = DiagnosticEngine::buffered(source, "<input>");
    let mut parser = Parser::new(Lexer::new(source, &diags), &diags);

    let state = parser.save_state();
    let first = parser.parse_expr().expect("first attempt parses");
    assert!(parser.tok.is(TokenKind::Eof));

    parser.restore_state(state);
    assert_eq!(parser.tok.value, Some(1));
    let second = parser.parse().expect("second attempt parses");
    assert_eq!(first, second);
  }
}
