use std::process::Command;

use anyhow::Result;

fn ninecc(args: &[&str]) -> Result<std::process::Output> {
  Ok(Command::new(env!("CARGO_BIN_EXE_ninecc")).args(args).output()?)
}

#[test]
fn prints_assembly_on_success() -> Result<()> {
  let output = ninecc(&["return 42;"])?;
  assert!(output.status.success());
  let stdout = String::from_utf8(output.stdout)?;
  assert!(stdout.starts_with(".intel_syntax noprefix\n.globl main\nmain:\n"));
  assert!(stdout.contains("  push 42\n"));
  assert!(output.stderr.is_empty());
  Ok(())
}

#[test]
fn wrong_argument_count_is_a_usage_error() -> Result<()> {
  for args in [&[][..], &["1;", "2;"][..]] {
    let output = ninecc(args)?;
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8(output.stderr)?.contains("usage:"));
  }
  Ok(())
}

#[test]
fn missing_semicolon_is_a_compile_error() -> Result<()> {
  let output = ninecc(&["a=1"])?;
  assert_eq!(output.status.code(), Some(1));
  let stderr = String::from_utf8(output.stderr)?;
  assert!(stderr.contains("a=1\n   ^ expected \";\", but got \"EOF\""));
  Ok(())
}

#[test]
fn unknown_character_points_at_it() -> Result<()> {
  let output = ninecc(&["1 + #"])?;
  assert_eq!(output.status.code(), Some(1));
  let stderr = String::from_utf8(output.stderr)?;
  assert!(stderr.contains("1 + #\n    ^ invalid token"));
  Ok(())
}
