//! Code generation: lower the parsed AST into Intel-syntax x86-64 assembly.
//!
//! The emitter uses a simple stack machine: every expression leaves a single
//! value on the stack, and every statement leaves the stack as deep as it
//! found it. Locals live in a fixed frame below `rbp`.
//!
//! Each control-flow family draws label numbers from its own counter, so
//! `.Lbegin`, `.Lend` and `.Lelse` names never repeat within one program.

use crate::error::{CompileError, CompileResult};
use crate::parser::{AstNode, BinaryOp, Program, Stmt};

/// Emit assembly for a whole program.
pub fn generate(program: &Program) -> CompileResult<String> {
  let mut cg = CodeGen::default();

  cg.raw(".intel_syntax noprefix");
  cg.raw(".globl main");
  cg.raw("main:");
  cg.emit("push rbp");
  cg.emit("mov rbp, rsp");
  let stack_size = program.locals.stack_size();
  if stack_size > 0 {
    cg.emit(format!("sub rsp, {stack_size}"));
  }

  for stmt in &program.stmts {
    cg.stmt(stmt)?;
  }

  cg.epilogue();

  tracing::debug!(
    stack_size,
    lines = cg.asm.lines().count(),
    "generated assembly"
  );
  Ok(cg.asm)
}

/// Monotonic label numbers, one counter per construct family.
#[derive(Debug)]
struct Labels {
  begin: u32,
  end: u32,
  els: u32,
}

impl Default for Labels {
  fn default() -> Self {
    Self {
      begin: 1,
      end: 1,
      els: 1,
    }
  }
}

fn next(counter: &mut u32) -> u32 {
  let n = *counter;
  *counter += 1;
  n
}

#[derive(Debug, Default)]
struct CodeGen {
  asm: String,
  labels: Labels,
}

impl CodeGen {
  fn raw(&mut self, line: impl AsRef<str>) {
    self.asm.push_str(line.as_ref());
    self.asm.push('\n');
  }

  fn emit(&mut self, insn: impl AsRef<str>) {
    self.asm.push_str("  ");
    self.raw(insn);
  }

  fn label(&mut self, prefix: &str, n: u32) {
    self.raw(format!(".L{prefix}{n}:"));
  }

  fn begin_label(&mut self) -> u32 {
    let n = next(&mut self.labels.begin);
    tracing::trace!(label = n, "begin label");
    n
  }

  fn end_label(&mut self) -> u32 {
    let n = next(&mut self.labels.end);
    tracing::trace!(label = n, "end label");
    n
  }

  fn else_label(&mut self) -> u32 {
    let n = next(&mut self.labels.els);
    tracing::trace!(label = n, "else label");
    n
  }

  fn epilogue(&mut self) {
    self.emit("mov rsp, rbp");
    self.emit("pop rbp");
    self.emit("ret");
  }

  /// Evaluate `cond` and jump to `.L{prefix}{n}` when it is zero.
  fn branch_if_false(&mut self, cond: &AstNode, prefix: &str, n: u32) -> CompileResult<()> {
    self.expr(cond)?;
    self.emit("pop rax");
    self.emit("cmp rax, 0");
    self.emit(format!("je  .L{prefix}{n}"));
    Ok(())
  }

  /// Evaluate an expression for its side effects only.
  fn discard(&mut self, node: &AstNode) -> CompileResult<()> {
    self.expr(node)?;
    self.emit("pop rax");
    Ok(())
  }

  fn stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
    match stmt {
      Stmt::Expr(node) => self.discard(node)?,
      Stmt::Return(node) => {
        self.expr(node)?;
        self.emit("pop rax");
        self.epilogue();
      }
      Stmt::If {
        cond,
        then,
        els: None,
      } => {
        let end = self.end_label();
        self.branch_if_false(cond, "end", end)?;
        self.stmt(then)?;
        self.label("end", end);
      }
      Stmt::If {
        cond,
        then,
        els: Some(els),
      } => {
        let els_n = self.else_label();
        let end = self.end_label();
        self.branch_if_false(cond, "else", els_n)?;
        self.stmt(then)?;
        self.emit(format!("jmp .Lend{end}"));
        self.label("else", els_n);
        self.stmt(els)?;
        self.label("end", end);
      }
      Stmt::While { cond, body } => {
        let begin = self.begin_label();
        let end = self.end_label();
        self.label("begin", begin);
        self.branch_if_false(cond, "end", end)?;
        self.stmt(body)?;
        self.emit(format!("jmp .Lbegin{begin}"));
        self.label("end", end);
      }
      Stmt::For {
        init,
        cond,
        step,
        body,
      } => {
        let begin = self.begin_label();
        let end = self.end_label();
        self.discard(init)?;
        self.label("begin", begin);
        self.branch_if_false(cond, "end", end)?;
        self.stmt(body)?;
        self.discard(step)?;
        self.emit(format!("jmp .Lbegin{begin}"));
        self.label("end", end);
      }
      Stmt::Block(body) => {
        for stmt in body.iter() {
          self.stmt(stmt)?;
        }
      }
    }
    Ok(())
  }

  /// Push the address of an assignable node.
  fn addr(&mut self, node: &AstNode) -> CompileResult<()> {
    let AstNode::Var { offset } = node else {
      return Err(CompileError::internal("left value is not a variable"));
    };
    self.emit("mov rax, rbp");
    self.emit(format!("sub rax, {offset}"));
    self.emit("push rax");
    Ok(())
  }

  fn expr(&mut self, node: &AstNode) -> CompileResult<()> {
    match node {
      // `push` only sign-extends a 32-bit immediate.
      AstNode::Num { value } if i32::try_from(*value).is_ok() => {
        self.emit(format!("push {value}"));
      }
      AstNode::Num { value } => {
        self.emit(format!("mov rax, {value}"));
        self.emit("push rax");
      }
      AstNode::Var { .. } => {
        self.addr(node)?;
        self.emit("pop rax");
        self.emit("mov rax, [rax]");
        self.emit("push rax");
      }
      AstNode::Assign { lhs, rhs } => {
        self.addr(lhs)?;
        self.expr(rhs)?;
        self.emit("pop rdi");
        self.emit("pop rax");
        self.emit("mov [rax], rdi");
        self.emit("push rdi");
      }
      AstNode::Binary { op, lhs, rhs } => {
        self.expr(lhs)?;
        self.expr(rhs)?;
        self.emit("pop rdi");
        self.emit("pop rax");
        match op {
          BinaryOp::Add => self.emit("add rax, rdi"),
          BinaryOp::Sub => self.emit("sub rax, rdi"),
          BinaryOp::Mul => self.emit("imul rax, rdi"),
          BinaryOp::Div => {
            self.emit("cqo");
            self.emit("idiv rdi");
          }
          BinaryOp::Eq => self.compare("sete"),
          BinaryOp::Ne => self.compare("setne"),
          BinaryOp::Lt => self.compare("setl"),
          BinaryOp::Le => self.compare("setle"),
        }
        self.emit("push rax");
      }
    }
    Ok(())
  }

  fn compare(&mut self, set: &str) {
    self.emit("cmp rax, rdi");
    self.emit(format!("{set} al"));
    self.emit("movzb rax, al");
  }
}
