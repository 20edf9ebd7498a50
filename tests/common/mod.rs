//! Test-only interpreter for the instruction subset the compiler emits.
//!
//! Lets integration tests check what a program evaluates to without an
//! assembler or an x86-64 host.

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow, bail, ensure};

const STACK_TOP: i64 = 1 << 20;
const RETURN_SENTINEL: i64 = -1;
const STEP_LIMIT: usize = 1_000_000;

#[derive(Default)]
struct Machine {
  rax: i64,
  rdi: i64,
  rbp: i64,
  rsp: i64,
  memory: HashMap<i64, i64>,
  flags: (i64, i64),
}

impl Machine {
  fn reg(&mut self, name: &str) -> Result<&mut i64> {
    Ok(match name {
      "rax" => &mut self.rax,
      "rdi" => &mut self.rdi,
      "rbp" => &mut self.rbp,
      "rsp" => &mut self.rsp,
      _ => bail!("unknown register {name}"),
    })
  }

  fn value(&mut self, operand: &str) -> Result<i64> {
    if operand == "[rax]" {
      return self.load(self.rax);
    }
    if let Ok(imm) = operand.parse::<i64>() {
      return Ok(imm);
    }
    Ok(*self.reg(operand)?)
  }

  fn load(&self, addr: i64) -> Result<i64> {
    self
      .memory
      .get(&addr)
      .copied()
      .with_context(|| format!("read of uninitialised address {addr}"))
  }

  fn push(&mut self, value: i64) {
    self.rsp -= 8;
    self.memory.insert(self.rsp, value);
  }

  fn pop(&mut self) -> Result<i64> {
    let value = self.load(self.rsp)?;
    self.rsp += 8;
    Ok(value)
  }

  fn set_al(&mut self, bit: bool) {
    self.rax = (self.rax & !0xff) | i64::from(bit);
  }
}

/// Run the generated assembly and return `rax` when `main` returns.
pub fn execute(asm: &str) -> Result<i64> {
  let lines: Vec<&str> = asm.lines().collect();
  let labels: HashMap<&str, usize> = lines
    .iter()
    .enumerate()
    .filter_map(|(idx, line)| line.strip_suffix(':').map(|name| (name, idx)))
    .collect();
  let entry = *labels.get("main").context("no main label")?;

  let mut m = Machine {
    rsp: STACK_TOP,
    ..Machine::default()
  };
  m.push(RETURN_SENTINEL);

  let mut pc = entry + 1;
  for _ in 0..STEP_LIMIT {
    let line = lines.get(pc).context("fell off the end of the program")?.trim();
    pc += 1;
    if line.is_empty() || line.ends_with(':') || line.starts_with('.') {
      continue;
    }

    let (op, args) = line.split_once(' ').unwrap_or((line, ""));
    let args: Vec<&str> = args
      .split(',')
      .map(str::trim)
      .filter(|arg| !arg.is_empty())
      .collect();
    let jump = |target: &str| {
      labels
        .get(target)
        .copied()
        .ok_or_else(|| anyhow!("unknown label {target}"))
    };

    match (op, args.as_slice()) {
      ("push", [src]) => {
        if let Ok(imm) = src.parse::<i64>() {
          ensure!(
            i32::try_from(imm).is_ok(),
            "push immediate {imm} does not fit in 32 bits"
          );
        }
        let value = m.value(src)?;
        m.push(value);
      }
      ("pop", [dst]) => {
        let value = m.pop()?;
        *m.reg(dst)? = value;
      }
      ("mov", ["[rax]", src]) => {
        let value = m.value(src)?;
        m.memory.insert(m.rax, value);
      }
      ("mov", [dst, src]) => {
        let value = m.value(src)?;
        *m.reg(dst)? = value;
      }
      ("add", [dst, src]) => {
        let value = m.value(src)?;
        let reg = m.reg(dst)?;
        *reg = reg.wrapping_add(value);
      }
      ("sub", [dst, src]) => {
        let value = m.value(src)?;
        let reg = m.reg(dst)?;
        *reg = reg.wrapping_sub(value);
      }
      ("imul", [dst, src]) => {
        let value = m.value(src)?;
        let reg = m.reg(dst)?;
        *reg = reg.wrapping_mul(value);
      }
      ("cqo", []) => {}
      ("idiv", [src]) => {
        let divisor = m.value(src)?;
        ensure!(divisor != 0, "division by zero");
        m.rax = m.rax.wrapping_div(divisor);
      }
      ("cmp", [lhs, rhs]) => {
        m.flags = (m.value(lhs)?, m.value(rhs)?);
      }
      ("sete", ["al"]) => m.set_al(m.flags.0 == m.flags.1),
      ("setne", ["al"]) => m.set_al(m.flags.0 != m.flags.1),
      ("setl", ["al"]) => m.set_al(m.flags.0 < m.flags.1),
      ("setle", ["al"]) => m.set_al(m.flags.0 <= m.flags.1),
      ("movzb", ["rax", "al"]) => m.rax &= 0xff,
      ("jmp", [target]) => pc = jump(*target)?,
      ("je", [target]) => {
        if m.flags.0 == m.flags.1 {
          pc = jump(*target)?;
        }
      }
      ("ret", []) => {
        let addr = m.pop()?;
        ensure!(addr == RETURN_SENTINEL, "ret to unexpected address {addr}");
        ensure!(m.rsp == STACK_TOP, "stack not balanced on return");
        return Ok(m.rax);
      }
      _ => bail!("unsupported instruction: {line}"),
    }
  }

  bail!("step limit exceeded")
}

/// Compile and execute, returning the program's result.
pub fn eval(source: &str) -> Result<i64> {
  let asm = ninecc::generate_assembly(source)?;
  execute(&asm)
}
