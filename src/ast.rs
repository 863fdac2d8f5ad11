//! Expression tree produced by the parser.
//!
//! Children are boxed and owned by their parent, so the tree can neither
//! share nor cycle. `>` and `>=` never show up here: the parser rewrites them
//! into `<`/`<=` with swapped operands.

use std::fmt;

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Eq,
  Ne,
  Lt,
  Le,
}

/// Flat view of a node's kind, handy for assertions and dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
  Add,
  Sub,
  Mul,
  Div,
  Neg,
  Eq,
  Ne,
  Lt,
  Le,
  Num,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstNode {
  Num {
    value: i64,
  },
  Neg {
    operand: Box<AstNode>,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<AstNode>,
    rhs: Box<AstNode>,
  },
}

impl AstNode {
  pub fn number(value: i64) -> Self {
    Self::Num { value }
  }

  pub fn unary_neg(operand: AstNode) -> Self {
    Self::Neg {
      operand: Box::new(operand),
    }
  }

  pub fn binary(op: BinaryOp, lhs: AstNode, rhs: AstNode) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn kind(&self) -> NodeKind {
    match self {
      AstNode::Num { .. } => NodeKind::Num,
      AstNode::Neg { .. } => NodeKind::Neg,
      AstNode::Binary { op, .. } => match op {
        BinaryOp::Add => NodeKind::Add,
        BinaryOp::Sub => NodeKind::Sub,
        BinaryOp::Mul => NodeKind::Mul,
        BinaryOp::Div => NodeKind::Div,
        BinaryOp::Eq => NodeKind::Eq,
        BinaryOp::Ne => NodeKind::Ne,
        BinaryOp::Lt => NodeKind::Lt,
        BinaryOp::Le => NodeKind::Le,
      },
    }
  }

  /// Left child; the operand of a negation.
  pub fn lhs(&self) -> Option<&AstNode> {
    match self {
      AstNode::Num { .. } => None,
      AstNode::Neg { operand } => Some(operand),
      AstNode::Binary { lhs, .. } => Some(lhs),
    }
  }

  pub fn rhs(&self) -> Option<&AstNode> {
    match self {
      AstNode::Binary { rhs, .. } => Some(rhs),
      _ => None,
    }
  }

  pub fn node_count(&self) -> usize {
    1 + self.lhs().map_or(0, AstNode::node_count) + self.rhs().map_or(0, AstNode::node_count)
  }

  /// Indented kind tree, one node per line.
  pub fn dump(&self) -> String {
    let mut out = String::new();
    self.dump_into(&mut out, 0);
    out
  }

  fn dump_into(&self, out: &mut String, indent: usize) {
    out.push_str(&"  ".repeat(indent));
    out.push_str(&format!("{:?}", self.kind()));
    if let AstNode::Num { value } = self {
      out.push_str(&format!(" {value}"));
    }
    out.push('\n');

    for child in [self.lhs(), self.rhs()].into_iter().flatten() {
      child.dump_into(out, indent + 1);
    }
  }
}

impl fmt::Display for BinaryOp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      BinaryOp::Add => "add",
      BinaryOp::Sub => "sub",
      BinaryOp::Mul => "mul",
      BinaryOp::Div => "div",
      BinaryOp::Eq => "eq",
      BinaryOp::Ne => "ne",
      BinaryOp::Lt => "lt",
      BinaryOp::Le => "le",
    };
    f.write_str(name)
  }
}

/// S-expression form, e.g. `(add 1 (mul 2 3))`.
impl fmt::Display for AstNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AstNode::Num { value } => write!(f, "{value}"),
      AstNode::Neg { operand } => write!(f, "(neg {operand})"),
      AstNode::Binary { op, lhs, rhs } => write!(f, "({op} {lhs} {rhs})"),
    }
  }
}
