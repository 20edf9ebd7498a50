//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer only classifies bytes; it knows nothing about grammar.
//! Multi-character punctuators are matched before single-character ones, and
//! keywords are recognised only when they are not the prefix of a longer
//! identifier.

use crate::error::{CompileError, CompileResult};

/// Reserved words of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
  Return,
  If,
  Else,
  While,
  For,
}

impl Keyword {
  const ALL: [(&'static str, Keyword); 5] = [
    ("return", Keyword::Return),
    ("if", Keyword::If),
    ("else", Keyword::Else),
    ("while", Keyword::While),
    ("for", Keyword::For),
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Keyword::Return => "return",
      Keyword::If => "if",
      Keyword::Else => "else",
      Keyword::While => "while",
      Keyword::For => "for",
    }
  }
}

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Punctuator,
  Keyword(Keyword),
  Ident,
  Num,
  Eof,
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<i64>,
  pub loc: usize,
  pub len: usize,
}

impl Token {
  /// Convenience constructor to keep the `tokenize` loop readable.
  pub fn new(kind: TokenKind, loc: usize, len: usize, value: Option<i64>) -> Self {
    Self {
      kind,
      value,
      loc,
      len,
    }
  }
}

const PUNCTUATORS: [&str; 4] = ["==", "!=", "<=", ">="];

fn is_ident_start(c: u8) -> bool {
  c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_continue(c: u8) -> bool {
  c.is_ascii_alphanumeric() || c == b'_'
}

/// Match a keyword at the head of `rest`, rejecting prefixes of longer words.
fn read_keyword(rest: &[u8]) -> Option<Keyword> {
  Keyword::ALL.into_iter().find_map(|(text, kw)| {
    let matches = rest.starts_with(text.as_bytes())
      && !rest
        .get(text.len())
        .is_some_and(|&next| is_ident_continue(next));
    matches.then_some(kw)
  })
}

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;

  while i < bytes.len() {
    let c = bytes[i];
    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    if let Some(op) = PUNCTUATORS
      .into_iter()
      .find(|op| bytes[i..].starts_with(op.as_bytes()))
    {
      tokens.push(Token::new(TokenKind::Punctuator, i, op.len(), None));
      i += op.len();
      continue;
    }

    if matches!(
      c,
      b'+' | b'-' | b'*' | b'/' | b'(' | b')' | b'<' | b'>' | b'=' | b';' | b'{' | b'}'
    ) {
      tokens.push(Token::new(TokenKind::Punctuator, i, 1, None));
      i += 1;
      continue;
    }

    if let Some(kw) = read_keyword(&bytes[i..]) {
      let len = kw.as_str().len();
      tokens.push(Token::new(TokenKind::Keyword(kw), i, len, None));
      i += len;
      continue;
    }

    if is_ident_start(c) {
      let start = i;
      i += 1;
      while i < bytes.len() && is_ident_continue(bytes[i]) {
        i += 1;
      }
      tokens.push(Token::new(TokenKind::Ident, start, i - start, None));
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      let text = &input[start..i];
      let value = text
        .parse::<i64>()
        .map_err(|err| CompileError::at(input, start, format!("invalid number: {err}")))?;
      tokens.push(Token::new(TokenKind::Num, start, i - start, Some(value)));
      continue;
    }

    return Err(CompileError::at(input, i, "invalid token"));
  }

  tokens.push(Token::new(TokenKind::Eof, input.len(), 0, None));
  Ok(tokens)
}

/// Return the slice from the source that produced this token.
pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
  let end = token.loc + token.len;
  &source[token.loc..end]
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>, source: &str) -> String {
  match token {
    Some(t) => match t.kind {
      TokenKind::Eof => "EOF".to_string(),
      _ => token_text(t, source).to_string(),
    },
    None => "EOF".to_string(),
  }
}
