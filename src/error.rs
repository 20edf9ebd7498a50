//! Shared error utilities used across the compilation pipeline.
//!
//! Every failure is fatal: the first error ends the run. Positioned errors
//! render the offending source line with a caret under the byte that
//! triggered them, in the style of chibicc's `error_at`.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  /// The binary was invoked with the wrong number of arguments.
  #[snafu(display("usage: {program} <program>"))]
  Usage { program: String },

  /// Lexical or syntactic error anchored at a byte in the source.
  #[snafu(display("{expr_line}\n{marker} {message}"))]
  WithLocation {
    expr_line: String,
    marker: String,
    message: String,
  },

  /// Invariant violated after parsing; carries no source position.
  #[snafu(display("{message}"))]
  Internal { message: String },
}

impl CompileError {
  /// Construct an error anchored at a specific byte offset in the source.
  pub fn at(expr: &str, loc: usize, message: impl Into<String>) -> Self {
    let safe_loc = loc.min(expr.len());
    let line_start = expr[..safe_loc].rfind('\n').map_or(0, |idx| idx + 1);
    let line_end = expr[safe_loc..]
      .find('\n')
      .map_or(expr.len(), |idx| safe_loc + idx);
    let expr_line = expr[line_start..line_end].to_string();
    let column = expr[line_start..safe_loc].chars().count();
    let marker = format!("{}^", " ".repeat(column));
    Self::WithLocation {
      expr_line,
      marker,
      message: message.into(),
    }
  }

  pub fn internal(message: impl Into<String>) -> Self {
    Self::Internal {
      message: message.into(),
    }
  }

  /// Process exit status for this error. Wrong invocation and failed
  /// compilation are kept distinguishable.
  pub fn exit_code(&self) -> u8 {
    match self {
      Self::Usage { .. } => 2,
      Self::WithLocation { .. } | Self::Internal { .. } => 1,
    }
  }
}
