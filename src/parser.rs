//! Recursive-descent parser producing a statement list and expression AST.
//!
//! The parser mirrors the classic chibicc structure: one function per grammar
//! rule, each calling the next tighter-binding rule.
//!
//! ```text
//! program    = stmt*
//! stmt       = "return" expr ";"
//!            | "if" "(" expr ")" stmt ("else" stmt)?
//!            | "while" "(" expr ")" stmt
//!            | "for" "(" expr? ";" expr? ";" expr? ")" stmt
//!            | "{" stmt* "}"
//!            | expr ";"
//! expr       = assign
//! assign     = equality ("=" assign)?
//! equality   = relational ("==" relational | "!=" relational)*
//! relational = add ("<" add | "<=" add | ">" add | ">=" add)*
//! add        = mul ("+" mul | "-" mul)*
//! mul        = unary ("*" unary | "/" unary)*
//! unary      = ("+" | "-")? unary | primary
//! primary    = num | ident | "(" expr ")"
//! ```
//!
//! Two rewrites happen here so the code generator sees fewer shapes:
//! `a > b` becomes `b < a` (likewise `>=`), and unary minus becomes `0 - x`.
//! Identifiers are resolved to frame offsets as they are encountered.

use crate::error::{CompileError, CompileResult};
use crate::locals::LocalTable;
use crate::queue::Queue;
use crate::tokenizer::{Keyword, Token, TokenKind, describe_token, token_text};

/// Binary operators left after relational normalisation.
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

/// Expression tree produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstNode {
  Num {
    value: i64,
  },
  Var {
    offset: i64,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<AstNode>,
    rhs: Box<AstNode>,
  },
  Assign {
    lhs: Box<AstNode>,
    rhs: Box<AstNode>,
  },
}

impl AstNode {
  pub fn number(value: i64) -> Self {
    Self::Num { value }
  }

  pub fn var(offset: i64) -> Self {
    Self::Var { offset }
  }

  pub fn binary(op: BinaryOp, lhs: AstNode, rhs: AstNode) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn assign(lhs: AstNode, rhs: AstNode) -> Self {
    Self::Assign {
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }
}

/// Statement forms. Control bodies own their sub-statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
  Expr(AstNode),
  Return(AstNode),
  If {
    cond: AstNode,
    then: Box<Stmt>,
    els: Option<Box<Stmt>>,
  },
  While {
    cond: AstNode,
    body: Box<Stmt>,
  },
  /// Missing header clauses are filled with the constant `1`.
  For {
    init: AstNode,
    cond: AstNode,
    step: AstNode,
    body: Box<Stmt>,
  },
  Block(Queue<Stmt>),
}

/// Parsed top-level statements plus every local they reference.
#[derive(Debug, Clone)]
pub struct Program {
  pub stmts: Vec<Stmt>,
  pub locals: LocalTable,
}

/// Deepest statement or expression nesting accepted before bailing out.
const MAX_NESTING: usize = 256;

/// Parse a whole program from the token stream.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<Program> {
  let mut stream = TokenStream::new(tokens, source);

  let mut stmts = Vec::new();
  while !stream.is_eof() {
    stmts.push(parse_stmt(&mut stream)?);
  }

  tracing::debug!(
    statements = stmts.len(),
    locals = stream.locals.len(),
    "parsed program"
  );

  Ok(Program {
    stmts,
    locals: stream.locals,
  })
}

fn parse_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.nested(parse_stmt_inner)
}

fn parse_stmt_inner(stream: &mut TokenStream) -> CompileResult<Stmt> {
  if stream.equal_keyword(Keyword::Return) {
    let expr = parse_expr(stream)?;
    stream.skip(";")?;
    return Ok(Stmt::Return(expr));
  }

  if stream.equal_keyword(Keyword::If) {
    stream.skip("(")?;
    let cond = parse_expr(stream)?;
    stream.skip(")")?;
    let then = Box::new(parse_stmt(stream)?);
    // Checked right after the body, so `else` pairs with the nearest `if`.
    let els = if stream.equal_keyword(Keyword::Else) {
      Some(Box::new(parse_stmt(stream)?))
    } else {
      None
    };
    return Ok(Stmt::If { cond, then, els });
  }

  if stream.equal_keyword(Keyword::While) {
    stream.skip("(")?;
    let cond = parse_expr(stream)?;
    stream.skip(")")?;
    let body = Box::new(parse_stmt(stream)?);
    return Ok(Stmt::While { cond, body });
  }

  if stream.equal_keyword(Keyword::For) {
    stream.skip("(")?;
    let init = parse_optional_expr(stream, ";")?;
    let cond = parse_optional_expr(stream, ";")?;
    let step = parse_optional_expr(stream, ")")?;
    let body = Box::new(parse_stmt(stream)?);
    return Ok(Stmt::For {
      init,
      cond,
      step,
      body,
    });
  }

  if stream.equal("{") {
    let mut body = Queue::new();
    while !stream.equal("}") {
      if stream.is_eof() {
        stream.skip("}")?;
      }
      body.enqueue(parse_stmt(stream)?);
    }
    return Ok(Stmt::Block(body));
  }

  let expr = parse_expr(stream)?;
  stream.skip(";")?;
  Ok(Stmt::Expr(expr))
}

/// `expr? terminator`, substituting the constant `1` for an empty clause.
fn parse_optional_expr(stream: &mut TokenStream, terminator: &str) -> CompileResult<AstNode> {
  if stream.equal(terminator) {
    return Ok(AstNode::number(1));
  }
  let node = parse_expr(stream)?;
  stream.skip(terminator)?;
  Ok(node)
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<AstNode> {
  parse_assign(stream)
}

fn parse_assign(stream: &mut TokenStream) -> CompileResult<AstNode> {
  let node = parse_equality(stream)?;

  if stream.equal("=") {
    let rhs = parse_assign(stream)?;
    return Ok(AstNode::assign(node, rhs));
  }

  Ok(node)
}

fn parse_equality(stream: &mut TokenStream) -> CompileResult<AstNode> {
  let mut node = parse_relational(stream)?;

  loop {
    if stream.equal("==") {
      node = AstNode::binary(BinaryOp::Eq, node, parse_relational(stream)?);
    } else if stream.equal("!=") {
      node = AstNode::binary(BinaryOp::Ne, node, parse_relational(stream)?);
    } else {
      return Ok(node);
    }
  }
}

fn parse_relational(stream: &mut TokenStream) -> CompileResult<AstNode> {
  let mut node = parse_add(stream)?;

  loop {
    if stream.equal("<") {
      node = AstNode::binary(BinaryOp::Lt, node, parse_add(stream)?);
    } else if stream.equal("<=") {
      node = AstNode::binary(BinaryOp::Le, node, parse_add(stream)?);
    } else if stream.equal(">") {
      node = AstNode::binary(BinaryOp::Lt, parse_add(stream)?, node);
    } else if stream.equal(">=") {
      node = AstNode::binary(BinaryOp::Le, parse_add(stream)?, node);
    } else {
      return Ok(node);
    }
  }
}

fn parse_add(stream: &mut TokenStream) -> CompileResult<AstNode> {
  let mut node = parse_mul(stream)?;

  loop {
    if stream.equal("+") {
      node = AstNode::binary(BinaryOp::Add, node, parse_mul(stream)?);
    } else if stream.equal("-") {
      node = AstNode::binary(BinaryOp::Sub, node, parse_mul(stream)?);
    } else {
      return Ok(node);
    }
  }
}

fn parse_mul(stream: &mut TokenStream) -> CompileResult<AstNode> {
  let mut node = parse_unary(stream)?;

  loop {
    if stream.equal("*") {
      node = AstNode::binary(BinaryOp::Mul, node, parse_unary(stream)?);
    } else if stream.equal("/") {
      node = AstNode::binary(BinaryOp::Div, node, parse_unary(stream)?);
    } else {
      return Ok(node);
    }
  }
}

// Every recursive path through the expression grammar passes through here,
// so this is where nesting depth is counted.
fn parse_unary(stream: &mut TokenStream) -> CompileResult<AstNode> {
  stream.nested(|stream| {
    if stream.equal("+") {
      return parse_unary(stream);
    }

    if stream.equal("-") {
      let operand = parse_unary(stream)?;
      return Ok(AstNode::binary(BinaryOp::Sub, AstNode::number(0), operand));
    }

    parse_primary(stream)
  })
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<AstNode> {
  if stream.equal("(") {
    let node = parse_expr(stream)?;
    stream.skip(")")?;
    return Ok(node);
  }

  if let Some(name) = stream.get_ident() {
    let offset = stream.locals.resolve(name);
    return Ok(AstNode::var(offset));
  }

  let value = stream.get_number()?;
  Ok(AstNode::number(value))
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
  locals: LocalTable,
  depth: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
      locals: LocalTable::new(),
      depth: 0,
    }
  }

  /// Run `parse` one nesting level deeper, failing past `MAX_NESTING`.
  fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> CompileResult<T>) -> CompileResult<T> {
    if self.depth >= MAX_NESTING {
      let (loc, _) = self.found();
      return Err(CompileError::at(self.source, loc, "nesting is too deep"));
    }
    self.depth += 1;
    let result = parse(self);
    self.depth -= 1;
    result
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  /// Consume the current token if it matches the provided punctuator.
  fn equal(&mut self, op: &str) -> bool {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Punctuator
      && token_text(token, self.source) == op
    {
      self.pos += 1;
      return true;
    }
    false
  }

  fn equal_keyword(&mut self, keyword: Keyword) -> bool {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Keyword(keyword)
    {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      return Ok(());
    }
    let (loc, got) = self.found();
    Err(CompileError::at(
      self.source,
      loc,
      format!("expected \"{s}\", but got \"{got}\""),
    ))
  }

  /// Consume an identifier, returning its source text.
  fn get_ident(&mut self) -> Option<&'a str> {
    let source = self.source;
    let token = self.peek().filter(|token| token.kind == TokenKind::Ident)?;
    let name = token_text(token, source);
    self.pos += 1;
    Some(name)
  }

  fn get_number(&mut self) -> CompileResult<i64> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Num
    {
      let value = token.value.ok_or_else(|| {
        CompileError::at(
          self.source,
          token.loc,
          "internal error: numeric token missing value",
        )
      })?;
      self.pos += 1;
      return Ok(value);
    }

    let (loc, got) = self.found();
    Err(CompileError::at(
      self.source,
      loc,
      format!("expected a number, but got \"{got}\""),
    ))
  }

  /// Location and text of the current token, for diagnostics.
  fn found(&self) -> (usize, String) {
    match self.peek() {
      Some(token) => (token.loc, describe_token(Some(token), self.source)),
      None => (self.source.len(), "EOF".to_string()),
    }
  }

  fn is_eof(&self) -> bool {
    // Running off the vector counts as end of input.
    !matches!(self.peek().map(|token| token.kind), Some(kind) if kind != TokenKind::Eof)
  }
}
