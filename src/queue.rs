//! Insertion-ordered FIFO used to collect the statements of a block.

use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queue<T> {
  items: VecDeque<T>,
}

impl<T> Queue<T> {
  pub fn new() -> Self {
    Self {
      items: VecDeque::new(),
    }
  }

  /// Append to the tail.
  pub fn enqueue(&mut self, item: T) {
    self.items.push_back(item);
  }

  /// Front-to-back iteration without consuming the queue.
  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.items.iter()
  }
}

impl<T> Default for Queue<T> {
  fn default() -> Self {
    Self::new()
  }
}
