//! Flat, run-scoped table mapping variable names to frame offsets.
//!
//! Entries are never removed and there is no block scoping: the first
//! occurrence of a name allocates a slot and every later occurrence, at any
//! nesting depth, resolves to that same slot.

/// Bytes reserved per variable.
pub const SLOT_SIZE: i64 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVar {
  pub name: String,
  /// Distance below `rbp`; the variable lives at `rbp - offset`.
  pub offset: i64,
}

#[derive(Debug, Clone, Default)]
pub struct LocalTable {
  // Most recently declared first, matching lookup order.
  vars: Vec<LocalVar>,
}

impl LocalTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn find(&self, name: &str) -> Option<&LocalVar> {
    self.vars.iter().rev().find(|var| var.name == name)
  }

  /// Offset for `name`, allocating the next slot on first sight.
  pub fn resolve(&mut self, name: &str) -> i64 {
    if let Some(var) = self.find(name) {
      return var.offset;
    }

    let offset = (self.vars.len() as i64 + 1) * SLOT_SIZE;
    tracing::trace!(name, offset, "allocated local");
    self.vars.push(LocalVar {
      name: name.to_string(),
      offset,
    });
    offset
  }

  pub(crate) fn len(&self) -> usize {
    self.vars.len()
  }

  /// Bytes to reserve below `rbp`, kept 16-byte aligned.
  pub fn stack_size(&self) -> i64 {
    let raw = self.vars.len() as i64 * SLOT_SIZE;
    (raw + 15) / 16 * 16
  }
}
