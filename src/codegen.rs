//! Code generation: lower the expression tree into AT&T x86-64 assembly.
//!
//! The emitter is a stack machine. Every expression leaves its value in
//! `%rax`; a binary node evaluates its right operand first, parks it on the
//! stack, evaluates the left operand into `%rax` and pops the right one into
//! `%rdi`. That needs exactly one push/pop pair per binary node no matter how
//! deep the tree is, and the depth counter must be back at zero at the end.

use tracing::debug;

use crate::ast::{AstNode, BinaryOp};
use crate::error::{CompileError, CompileResult};

const STACK_NOTE: &str = "  .section .note.GNU-stack,\"\",@progbits\n";

#[derive(Debug, Clone, Copy)]
pub struct CodegenOptions {
  /// Append the section that marks the stack non-executable.
  pub emit_stack_note: bool,
}

impl Default for CodegenOptions {
  fn default() -> Self {
    Self {
      emit_stack_note: true,
    }
  }
}

pub struct CodeGenerator {
  options: CodegenOptions,
  asm: String,
  depth: i64,
  max_depth: i64,
}

impl CodeGenerator {
  pub fn new(options: CodegenOptions) -> Self {
    Self {
      options,
      asm: String::new(),
      depth: 0,
      max_depth: 0,
    }
  }

  /// Emit `main` returning the value of `node`.
  pub fn generate(mut self, node: &AstNode) -> CompileResult<String> {
    self.asm.push_str("  .globl main\n");
    self.asm.push_str("main:\n");

    self.emit_expr(node);

    self.asm.push_str("  ret\n");

    if self.depth != 0 {
      return Err(CompileError::StackImbalance { depth: self.depth });
    }

    if self.options.emit_stack_note {
      self.asm.push_str(STACK_NOTE);
    }

    debug!(
      max_depth = self.max_depth,
      lines = self.asm.lines().count(),
      "generated assembly"
    );
    Ok(self.asm)
  }

  fn push(&mut self) {
    self.asm.push_str("  push %rax\n");
    self.depth += 1;
    self.max_depth = self.max_depth.max(self.depth);
  }

  fn pop(&mut self, reg: &str) {
    self.asm.push_str(&format!("  pop {reg}\n"));
    self.depth -= 1;
  }

  fn emit_expr(&mut self, node: &AstNode) {
    match node {
      AstNode::Num { value } => {
        self.asm.push_str(&format!("  mov ${value}, %rax\n"));
      }
      AstNode::Neg { operand } => {
        self.emit_expr(operand);
        self.asm.push_str("  neg %rax\n");
      }
      AstNode::Binary { op, lhs, rhs } => {
        self.emit_expr(rhs);
        self.push();
        self.emit_expr(lhs);
        self.pop("%rdi");
        self.emit_binary(*op);
      }
    }
  }

  fn emit_binary(&mut self, op: BinaryOp) {
    match op {
      BinaryOp::Add => self.asm.push_str("  add %rdi, %rax\n"),
      BinaryOp::Sub => self.asm.push_str("  sub %rdi, %rax\n"),
      BinaryOp::Mul => self.asm.push_str("  imul %rdi, %rax\n"),
      BinaryOp::Div => {
        self.asm.push_str("  cqo\n");
        self.asm.push_str("  idiv %rdi\n");
      }
      BinaryOp::Eq => self.emit_compare("sete"),
      BinaryOp::Ne => self.emit_compare("setne"),
      BinaryOp::Lt => self.emit_compare("setl"),
      BinaryOp::Le => self.emit_compare("setle"),
    }
  }

  fn emit_compare(&mut self, setcc: &str) {
    self.asm.push_str("  cmp %rdi, %rax\n");
    self.asm.push_str(&format!("  {setcc} %al\n"));
    self.asm.push_str("  movzb %al, %rax\n");
  }
}

/// Emit assembly for an expression tree.
pub fn generate(node: &AstNode, options: CodegenOptions) -> CompileResult<String> {
  CodeGenerator::new(options).generate(node)
}
