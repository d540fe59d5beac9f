//! Chunk buffers: mutable character storage with a newline table.
//!
//! A [`Chunk`] owns a run of characters and tracks the offsets at which the
//! newline character (`'\n'`) occurs. The table is maintained incrementally
//! by every mutation, so line-oriented queries never rescan chunk contents.
//! Offsets in the table are local to the chunk; translating them into
//! document offsets is the engine's job.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChunkError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
  #[error("position {pos} is out of bounds for chunk length {len}")]
  OutOfRange { pos: usize, len: usize },
}

/// A mutable character buffer that knows where its newlines are.
///
/// The `newlines` table holds, in ascending order, every local offset `i`
/// with `text[i] == '\n'`. Mutations keep it exact: inserts shift later
/// entries up and splice in new ones, deletes drop covered entries and shift
/// the rest down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
  text:     Vec<char>,
  newlines: Vec<usize>,
}

impl Chunk {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_text(text: &str) -> Self {
    let mut chunk = Self::new();
    chunk.append(&text.chars().collect::<Vec<_>>());
    chunk
  }

  pub fn len(&self) -> usize {
    self.text.len()
  }

  pub fn is_empty(&self) -> bool {
    self.text.is_empty()
  }

  /// Local offsets of every newline character, ascending.
  pub fn newlines(&self) -> &[usize] {
    &self.newlines
  }

  pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
    self.text.iter().copied()
  }

  /// Appends every character of `s`, recording newline offsets as they land.
  pub fn append(&mut self, s: &[char]) {
    for &ch in s {
      if ch == '\n' {
        self.newlines.push(self.text.len());
      }
      self.text.push(ch);
    }
  }

  /// Inserts `s` at local position `pos`.
  pub fn insert(&mut self, pos: usize, s: &[char]) -> Result<()> {
    if pos > self.text.len() {
      return Err(ChunkError::OutOfRange {
        pos,
        len: self.text.len(),
      });
    }
    if s.is_empty() {
      return Ok(());
    }

    let shift = s.len();
    let split = self.newlines.partition_point(|&nl| nl < pos);
    let mut rebuilt = Vec::with_capacity(self.newlines.len() + shift);
    rebuilt.extend_from_slice(&self.newlines[..split]);
    for (i, &ch) in s.iter().enumerate() {
      if ch == '\n' {
        rebuilt.push(pos + i);
      }
    }
    rebuilt.extend(self.newlines[split..].iter().map(|&nl| nl + shift));
    self.newlines = rebuilt;

    self.text.splice(pos..pos, s.iter().copied());
    Ok(())
  }

  /// Removes `n` characters starting at local position `pos`.
  pub fn delete(&mut self, pos: usize, n: usize) -> Result<()> {
    let end = pos + n;
    if end > self.text.len() {
      return Err(ChunkError::OutOfRange {
        pos: end,
        len: self.text.len(),
      });
    }
    if n == 0 {
      return Ok(());
    }

    self.text.drain(pos..end);
    let mut rebuilt = Vec::with_capacity(self.newlines.len());
    for &nl in &self.newlines {
      if nl < pos {
        rebuilt.push(nl);
      } else if nl >= end {
        rebuilt.push(nl - n);
      }
    }
    self.newlines = rebuilt;
    Ok(())
  }

  /// The characters in `[start, end)`, clamped to the chunk.
  pub fn sub(&self, start: usize, end: usize) -> String {
    let end = end.min(self.text.len());
    let start = start.min(end);
    self.text[start..end].iter().collect()
  }
}

impl fmt::Display for Chunk {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for &ch in &self.text {
      write!(f, "{ch}")?;
    }
    Ok(())
  }
}
