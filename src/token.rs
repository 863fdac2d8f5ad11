//! Token kinds and the spelling tables the lexer matches against.
//!
//! The kind set is the C surface (punctuators and keywords) even though the
//! expression grammar only consumes a handful of them.

use std::fmt;

use crate::diagnostic::{SourceLocation, SourceRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
  Identifier,
  NumericConstant,
  CharConstant,
  StringLiteral,

  // Punctuators.
  LSquare,
  RSquare,
  LParen,
  RParen,
  LBrace,
  RBrace,
  Period,
  Ellipsis,
  Amp,
  AmpAmp,
  AmpEqual,
  Star,
  StarEqual,
  Plus,
  PlusPlus,
  PlusEqual,
  Minus,
  Arrow,
  MinusMinus,
  MinusEqual,
  Tilde,
  Exclaim,
  ExclaimEqual,
  Slash,
  SlashEqual,
  Percent,
  PercentEqual,
  Less,
  LessLess,
  LessLessEqual,
  LessEqual,
  Greater,
  GreaterGreater,
  GreaterGreaterEqual,
  GreaterEqual,
  Caret,
  CaretEqual,
  Pipe,
  PipePipe,
  PipeEqual,
  Question,
  Colon,
  Semi,
  Equal,
  EqualEqual,
  Comma,
  Hash,
  HashHash,
  HashAt,

  // Keywords.
  KwAuto,
  KwBreak,
  KwCase,
  KwChar,
  KwConst,
  KwContinue,
  KwDefault,
  KwDo,
  KwDouble,
  KwElse,
  KwEnum,
  KwExtern,
  KwFloat,
  KwFor,
  KwGoto,
  KwIf,
  KwInt,
  KwLong,
  KwRegister,
  KwReturn,
  KwShort,
  KwSigned,
  KwSizeof,
  KwStatic,
  KwStruct,
  KwSwitch,
  KwTypedef,
  KwUnion,
  KwUnsigned,
  KwVoid,
  KwVolatile,
  KwWhile,

  Eof,
  Unknown,
}

/// Longest punctuator the lexer will try to match.
pub const MAX_PUNCTUATOR_LEN: usize = 3;

pub const PUNCTUATORS: [(&str, TokenKind); 49] = [
  ("...", TokenKind::Ellipsis),
  ("<<=", TokenKind::LessLessEqual),
  (">>=", TokenKind::GreaterGreaterEqual),
  ("&&", TokenKind::AmpAmp),
  ("&=", TokenKind::AmpEqual),
  ("*=", TokenKind::StarEqual),
  ("++", TokenKind::PlusPlus),
  ("+=", TokenKind::PlusEqual),
  ("->", TokenKind::Arrow),
  ("--", TokenKind::MinusMinus),
  ("-=", TokenKind::MinusEqual),
  ("!=", TokenKind::ExclaimEqual),
  ("/=", TokenKind::SlashEqual),
  ("%=", TokenKind::PercentEqual),
  ("<<", TokenKind::LessLess),
  ("<=", TokenKind::LessEqual),
  (">>", TokenKind::GreaterGreater),
  (">=", TokenKind::GreaterEqual),
  ("^=", TokenKind::CaretEqual),
  ("||", TokenKind::PipePipe),
  ("|=", TokenKind::PipeEqual),
  ("==", TokenKind::EqualEqual),
  ("##", TokenKind::HashHash),
  ("#@", TokenKind::HashAt),
  ("[", TokenKind::LSquare),
  ("]", TokenKind::RSquare),
  ("(", TokenKind::LParen),
  (")", TokenKind::RParen),
  ("{", TokenKind::LBrace),
  ("}", TokenKind::RBrace),
  (".", TokenKind::Period),
  ("&", TokenKind::Amp),
  ("*", TokenKind::Star),
  ("+", TokenKind::Plus),
  ("-", TokenKind::Minus),
  ("~", TokenKind::Tilde),
  ("!", TokenKind::Exclaim),
  ("/", TokenKind::Slash),
  ("%", TokenKind::Percent),
  ("<", TokenKind::Less),
  (">", TokenKind::Greater),
  ("^", TokenKind::Caret),
  ("|", TokenKind::Pipe),
  ("?", TokenKind::Question),
  (":", TokenKind::Colon),
  (";", TokenKind::Semi),
  ("=", TokenKind::Equal),
  (",", TokenKind::Comma),
  ("#", TokenKind::Hash),
];

pub const KEYWORDS: [(&str, TokenKind); 32] = [
  ("auto", TokenKind::KwAuto),
  ("break", TokenKind::KwBreak),
  ("case", TokenKind::KwCase),
  ("char", TokenKind::KwChar),
  ("const", TokenKind::KwConst),
  ("continue", TokenKind::KwContinue),
  ("default", TokenKind::KwDefault),
  ("do", TokenKind::KwDo),
  ("double", TokenKind::KwDouble),
  ("else", TokenKind::KwElse),
  ("enum", TokenKind::KwEnum),
  ("extern", TokenKind::KwExtern),
  ("float", TokenKind::KwFloat),
  ("for", TokenKind::KwFor),
  ("goto", TokenKind::KwGoto),
  ("if", TokenKind::KwIf),
  ("int", TokenKind::KwInt),
  ("long", TokenKind::KwLong),
  ("register", TokenKind::KwRegister),
  ("return", TokenKind::KwReturn),
  ("short", TokenKind::KwShort),
  ("signed", TokenKind::KwSigned),
  ("sizeof", TokenKind::KwSizeof),
  ("static", TokenKind::KwStatic),
  ("struct", TokenKind::KwStruct),
  ("switch", TokenKind::KwSwitch),
  ("typedef", TokenKind::KwTypedef),
  ("union", TokenKind::KwUnion),
  ("unsigned", TokenKind::KwUnsigned),
  ("void", TokenKind::KwVoid),
  ("volatile", TokenKind::KwVolatile),
  ("while", TokenKind::KwWhile),
];

impl TokenKind {
  /// Keyword kind for an exact identifier spelling.
  pub fn keyword(spelling: &str) -> Option<TokenKind> {
    KEYWORDS
      .iter()
      .find(|(word, _)| *word == spelling)
      .map(|&(_, kind)| kind)
  }

  /// Punctuator kind for an exact spelling.
  pub fn punctuator(spelling: &str) -> Option<TokenKind> {
    PUNCTUATORS
      .iter()
      .find(|(text, _)| *text == spelling)
      .map(|&(_, kind)| kind)
  }

  pub fn punctuator_spelling(self) -> Option<&'static str> {
    PUNCTUATORS
      .iter()
      .find(|(_, kind)| *kind == self)
      .map(|&(text, _)| text)
  }

  pub fn keyword_spelling(self) -> Option<&'static str> {
    KEYWORDS
      .iter()
      .find(|(_, kind)| *kind == self)
      .map(|&(text, _)| text)
  }

}

/// A lexed token: kind plus the exact byte span it was spelled with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  /// Only numeric constants carry a value.
  pub value: Option<u64>,
  pub loc: usize,
  pub len: usize,
}

impl Token {
  pub fn new(kind: TokenKind, loc: usize, len: usize, value: Option<u64>) -> Self {
    Self {
      kind,
      value,
      loc,
      len,
    }
  }

  pub fn is(&self, kind: TokenKind) -> bool {
    self.kind == kind
  }

  pub fn location(&self) -> SourceLocation {
    SourceLocation::new(self.loc)
  }

  pub fn range(&self) -> SourceRange {
    SourceRange::new(
      SourceLocation::new(self.loc),
      SourceLocation::new(self.loc + self.len),
    )
  }

  /// Return the slice from the source that produced this token.
  pub fn text<'a>(&self, source: &'a str) -> &'a str {
    &source[self.loc..self.loc + self.len]
  }
}

/// Human-friendly description used in diagnostics and dumps.
pub fn describe_token(token: &Token, source: &str) -> String {
  match token.kind {
    TokenKind::Eof => "EOF".to_string(),
    _ => token.text(source).to_string(),
  }
}

impl fmt::Display for TokenKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.punctuator_spelling().or(self.keyword_spelling()) {
      Some(spelling) => write!(f, "'{spelling}'"),
      None => write!(f, "{self:?}"),
    }
  }
}
