//! The edit engine: the public face of the text store.
//!
//! [`TextEngine`] owns the chunk pool, the piece index, and the journal, and
//! keeps the three consistent through every mutation. Offsets entering the
//! API are document offsets; the engine resolves them to
//! `(piece, remainder)` coordinates through the piece tree, touches the
//! affected chunk, and rewrites the buffer-local starts of any sibling
//! pieces sharing that chunk.
//!
//! # Error policy
//!
//! Fallible operations return [`EngineError`]. With `strict` enabled,
//! offending arguments surface as errors; in the default lenient mode,
//! offsets and ranges are clamped to the document bounds with a `tracing`
//! diagnostic and the operation proceeds. Invalid regex patterns follow the
//! same split: lenient searches demote to literal matching, strict searches
//! report [`EngineError::InvalidPattern`]. Internal inconsistencies always
//! surface.
//!
//! # Re-entrancy
//!
//! Listener callbacks run synchronously while the engine is mutably
//! borrowed; they cannot call back into the engine that invoked them.

use std::{
  cell::RefCell,
  fmt,
};

use smallvec::SmallVec;
use thiserror::Error;

use crate::{
  chunk::{
    Chunk,
    ChunkError,
  },
  history::{
    ActionKind,
    Journal,
    JournalListener,
  },
  piece::{
    Piece,
    PieceId,
    PieceTree,
  },
  pool::{
    ChunkId,
    ChunkPool,
    DEFAULT_CHUNK_CAPACITY,
    MAX_CHUNK_CAPACITY,
    MIN_CHUNK_CAPACITY,
  },
  range::Range,
  search::{
    self,
    Needle,
    SearchMatch,
  },
  Tendril,
};

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineError {
  #[error("offset {offset} is out of bounds for document length {len}")]
  OutOfRange { offset: usize, len: usize },
  #[error("invalid range: start {start} is after end {end}")]
  InvalidRange { start: usize, end: usize },
  #[error("operation requires a non-empty document")]
  EmptyDocument,
  #[error("invalid search pattern: {0}")]
  InvalidPattern(String),
  #[error("internal invariant violated: {0}")]
  Internal(&'static str),
}

impl From<ChunkError> for EngineError {
  fn from(_: ChunkError) -> Self {
    // Chunk positions are derived from the piece index; a chunk-level range
    // failure means the two went out of sync.
    EngineError::Internal("chunk offset out of sync with piece index")
  }
}

/// Observer for document mutations. Callbacks fire synchronously after the
/// mutation and before the engine method returns.
pub trait EngineListener {
  fn on_content_loaded(&mut self, _content: &str) {}
  fn on_text_inserted(&mut self, _start: usize, _text: &str) {}
  fn on_text_deleted(&mut self, _start: usize, _end: usize) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
  /// Per-chunk capacity in characters, clamped to
  /// [`MIN_CHUNK_CAPACITY`]..=[`MAX_CHUNK_CAPACITY`].
  pub chunk_capacity: usize,
  /// Forces the maximum chunk capacity so small and medium documents stay in
  /// one chunk.
  pub single_buffer:  bool,
  /// Surface argument errors instead of clamping.
  pub strict:         bool,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      chunk_capacity: DEFAULT_CHUNK_CAPACITY,
      single_buffer:  false,
      strict:         false,
    }
  }
}

pub struct TextEngine {
  pool:          ChunkPool,
  tree:          PieceTree,
  journal:       Journal,
  single_buffer: bool,
  strict:        bool,
  listener:      Option<Box<dyn EngineListener>>,
}

impl fmt::Debug for TextEngine {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TextEngine")
      .field("length", &self.length())
      .field("chunks", &self.pool.chunk_count())
      .field("pieces", &self.tree.piece_count())
      .field("single_buffer", &self.single_buffer)
      .field("strict", &self.strict)
      .finish_non_exhaustive()
  }
}

impl Default for TextEngine {
  fn default() -> Self {
    Self::new()
  }
}

impl TextEngine {
  pub fn new() -> Self {
    Self::with_config(EngineConfig::default())
  }

  pub fn with_config(config: EngineConfig) -> Self {
    let capacity = if config.single_buffer {
      MAX_CHUNK_CAPACITY
    } else {
      config.chunk_capacity.clamp(MIN_CHUNK_CAPACITY, MAX_CHUNK_CAPACITY)
    };
    Self {
      pool:          ChunkPool::new(capacity),
      tree:          PieceTree::new(),
      journal:       Journal::new(),
      single_buffer: config.single_buffer,
      strict:        config.strict,
      listener:      None,
    }
  }

  /// An engine pre-loaded with `content`.
  pub fn from_text(content: &str) -> Result<Self> {
    let mut engine = Self::new();
    engine.load(content)?;
    Ok(engine)
  }

  /// Bypasses capacity clamping. Tiny capacities make chunk-boundary
  /// behavior testable without megabytes of fixture text.
  #[cfg(test)]
  pub(crate) fn with_capacity_unclamped(capacity: usize) -> Self {
    Self {
      pool:          ChunkPool::new(capacity),
      tree:          PieceTree::new(),
      journal:       Journal::new(),
      single_buffer: false,
      strict:        false,
      listener:      None,
    }
  }

  // ---- configuration & accessors ------------------------------------------

  pub fn length(&self) -> usize {
    self.tree.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tree.is_empty()
  }

  pub fn chunk_count(&self) -> usize {
    self.pool.chunk_count()
  }

  pub fn chunk_capacity(&self) -> usize {
    self.pool.capacity()
  }

  pub fn single_buffer(&self) -> bool {
    self.single_buffer
  }

  pub fn strict(&self) -> bool {
    self.strict
  }

  pub fn set_strict(&mut self, strict: bool) {
    self.strict = strict;
  }

  pub fn set_listener(&mut self, listener: Box<dyn EngineListener>) {
    self.listener = Some(listener);
  }

  pub fn clear_listener(&mut self) {
    self.listener = None;
  }

  pub fn set_journal_listener(&mut self, listener: Box<dyn JournalListener>) {
    self.journal.set_listener(listener);
  }

  // ---- loading ------------------------------------------------------------

  /// Replaces the document with `content`, resetting the journal. The load
  /// itself is not an undoable edit: undoing everything afterwards returns
  /// to the loaded content, not to an empty document.
  pub fn load(&mut self, content: &str) -> Result<()> {
    self.clear();
    let chars: Vec<char> = content.chars().collect();
    self.raw_append(&chars)?;
    if let Some(listener) = self.listener.as_mut() {
      listener.on_content_loaded(content);
    }
    Ok(())
  }

  /// Drops all content and history.
  pub fn clear(&mut self) {
    self.pool.clear();
    self.tree.clear();
    self.journal.reset();
  }

  // ---- text assembly ------------------------------------------------------

  /// The whole document: chunk contents concatenated in pool order.
  pub fn text(&self) -> String {
    let mut out = String::with_capacity(self.length());
    for (_, chunk) in self.pool.iter() {
      out.extend(chunk.chars());
    }
    out
  }

  /// Characters in `[start, end)`, assembled by clipping each chunk in pool
  /// order.
  pub fn text_range(&self, start: usize, end: usize) -> Result<String> {
    let (start, end) = self.check_range(start, end)?;
    let mut out = String::with_capacity(end - start);
    let mut base = 0;
    for (_, chunk) in self.pool.iter() {
      let chunk_len = chunk.len();
      if end <= base {
        break;
      }
      if start < base + chunk_len {
        let from = start.saturating_sub(base);
        let to = (end - base).min(chunk_len);
        out.push_str(&chunk.sub(from, to));
      }
      base += chunk_len;
    }
    Ok(out)
  }

  // ---- editing ------------------------------------------------------------

  pub fn append(&mut self, text: &str) -> Result<()> {
    self.append_with(text, true)
  }

  pub fn append_with(&mut self, text: &str, capture: bool) -> Result<()> {
    if text.is_empty() {
      return Ok(());
    }
    let start = self.length();
    let chars: Vec<char> = text.chars().collect();
    self.raw_append(&chars)?;
    if capture {
      self
        .journal
        .capture_insert(start, start + chars.len(), Tendril::from(text));
    }
    if let Some(listener) = self.listener.as_mut() {
      listener.on_text_inserted(start, text);
    }
    Ok(())
  }

  pub fn insert(&mut self, offset: usize, text: &str) -> Result<()> {
    self.insert_with(offset, text, true)
  }

  pub fn insert_with(&mut self, offset: usize, text: &str, capture: bool) -> Result<()> {
    let offset = self.check_offset(offset)?;
    if offset == self.length() {
      return self.append_with(text, capture);
    }
    if text.is_empty() {
      return Ok(());
    }
    let chars: Vec<char> = text.chars().collect();
    self.raw_insert(offset, &chars)?;
    if capture {
      self
        .journal
        .capture_insert(offset, offset + chars.len(), Tendril::from(text));
    }
    if let Some(listener) = self.listener.as_mut() {
      listener.on_text_inserted(offset, text);
    }
    Ok(())
  }

  pub fn delete(&mut self, start: usize, end: usize) -> Result<()> {
    self.delete_with(start, end, true)
  }

  pub fn delete_with(&mut self, start: usize, end: usize, capture: bool) -> Result<()> {
    let (start, end) = self.check_range(start, end)?;
    if start == end {
      return Ok(());
    }
    if capture {
      // The removed text must be read before storage mutates.
      let removed = self.doc_range(start, end)?;
      self
        .journal
        .capture_delete(start, end, Tendril::from(removed.as_str()));
    }
    if start == 0 && end == self.length() {
      // Full-document delete drops storage wholesale; the journal survives
      // so the deletion stays undoable.
      self.pool.clear();
      self.tree.clear();
    } else {
      self.raw_delete(start, end)?;
    }
    if let Some(listener) = self.listener.as_mut() {
      listener.on_text_deleted(start, end);
    }
    Ok(())
  }

  pub fn replace(&mut self, start: usize, end: usize, text: &str) -> Result<()> {
    self.replace_with(start, end, text, true)
  }

  pub fn replace_with(
    &mut self,
    start: usize,
    end: usize,
    text: &str,
    capture: bool,
  ) -> Result<()> {
    self.delete_with(start, end, capture)?;
    self.insert_with(start, text, capture)
  }

  // ---- line queries -------------------------------------------------------

  /// Number of newline characters in the document.
  pub fn line_count(&self) -> usize {
    self.pool.iter().map(|(_, chunk)| chunk.newlines().len()).sum()
  }

  /// Index of the line containing `offset`. A newline belongs to the line it
  /// terminates; offsets past the last newline fall on the final line.
  pub fn line_of_offset(&self, offset: usize) -> Result<usize> {
    let offset = self.check_offset(offset)?;
    let mut line = 0;
    let mut base = 0;
    for (_, chunk) in self.pool.iter() {
      for &newline in chunk.newlines() {
        if base + newline >= offset {
          return Ok(line);
        }
        line += 1;
      }
      base += chunk.len();
    }
    Ok(line)
  }

  /// Span of line `index`, excluding its terminating newline. The final line
  /// ends at the document length.
  pub fn line_range(&self, index: usize) -> Result<Range> {
    if self.is_empty() {
      if self.strict {
        return Err(EngineError::EmptyDocument);
      }
      tracing::debug!(index, "line query on empty document");
      return Ok(Range::point(0));
    }
    let mut line = 0;
    let mut base = 0;
    let mut start = 0;
    for (_, chunk) in self.pool.iter() {
      for &newline in chunk.newlines() {
        let boundary = base + newline;
        if line == index {
          return Ok(Range::new(start, boundary));
        }
        start = boundary + 1;
        line += 1;
      }
      base += chunk.len();
    }
    if line == index {
      return Ok(Range::new(start, self.length()));
    }
    if self.strict {
      return Err(EngineError::OutOfRange {
        offset: index,
        len:    line + 1,
      });
    }
    tracing::debug!(index, lines = line + 1, "clamping out-of-range line index");
    Ok(Range::point(self.length()))
  }

  pub fn line_content(&self, index: usize) -> Result<String> {
    let range = self.line_range(index)?;
    self.text_range(range.start, range.end)
  }

  pub fn line_length(&self, index: usize) -> Result<usize> {
    Ok(self.line_range(index)?.len())
  }

  // ---- search -------------------------------------------------------------

  /// First match of `query` at or after `start_offset`.
  pub fn search_single(
    &self,
    query: &str,
    start_offset: usize,
    case_sensitive: bool,
    is_regex: bool,
  ) -> Result<Option<SearchMatch>> {
    let start = self.check_offset(start_offset)?;
    let needle = self.compile(query, case_sensitive, is_regex)?;
    Ok(search::find_first(&self.pool, &needle, start))
  }

  /// Every match of `query` at or after `start_offset`, in document order.
  pub fn search_multi(
    &self,
    query: &str,
    start_offset: usize,
    case_sensitive: bool,
    is_regex: bool,
  ) -> Result<Vec<SearchMatch>> {
    let start = self.check_offset(start_offset)?;
    let needle = self.compile(query, case_sensitive, is_regex)?;
    Ok(search::find_all(&self.pool, &needle, start))
  }

  /// Like [`search_multi`](Self::search_multi), but hands each match to
  /// `visit` along with its index instead of collecting.
  pub fn search_multi_with(
    &self,
    query: &str,
    start_offset: usize,
    case_sensitive: bool,
    is_regex: bool,
    mut visit: impl FnMut(&SearchMatch, usize),
  ) -> Result<()> {
    for (index, found) in self
      .search_multi(query, start_offset, case_sensitive, is_regex)?
      .iter()
      .enumerate()
    {
      visit(found, index);
    }
    Ok(())
  }

  fn compile(&self, query: &str, case_sensitive: bool, is_regex: bool) -> Result<Needle> {
    match Needle::new(query, case_sensitive, is_regex) {
      Ok(needle) => Ok(needle),
      Err(err) if self.strict => Err(EngineError::InvalidPattern(err.to_string())),
      Err(err) => {
        tracing::warn!(%err, "invalid search pattern, falling back to literal matching");
        Ok(Needle::literal(query, case_sensitive))
      },
    }
  }

  // ---- undo / redo --------------------------------------------------------

  /// Undoes one whole group. Returns the caret position, or `None` when
  /// there was nothing to undo.
  pub fn undo(&mut self) -> Result<Option<usize>> {
    let group = self.journal.take_undo_group();
    if group.is_empty() {
      return Ok(None);
    }
    let mut caret = 0;
    for action in &group {
      match action.kind {
        ActionKind::Insert => self.delete_with(action.start, action.end, false)?,
        ActionKind::Delete => self.insert_with(action.start, action.text.as_str(), false)?,
      }
      caret = action.undo_caret();
    }
    self.journal.notify_undo(caret);
    Ok(Some(caret))
  }

  /// Re-applies one whole group. Returns the caret position, or `None` when
  /// there was nothing to redo.
  pub fn redo(&mut self) -> Result<Option<usize>> {
    let group = self.journal.take_redo_group();
    if group.is_empty() {
      return Ok(None);
    }
    let mut caret = 0;
    for action in &group {
      match action.kind {
        ActionKind::Insert => self.insert_with(action.start, action.text.as_str(), false)?,
        ActionKind::Delete => self.delete_with(action.start, action.end, false)?,
      }
      caret = action.redo_caret();
    }
    self.journal.notify_redo(caret);
    Ok(Some(caret))
  }

  pub fn can_undo(&self) -> bool {
    self.journal.can_undo()
  }

  pub fn can_redo(&self) -> bool {
    self.journal.can_redo()
  }

  pub fn begin_batch_edit(&mut self) {
    self.journal.begin_batch_edit();
  }

  pub fn end_batch_edit(&mut self) {
    self.journal.end_batch_edit();
  }

  pub fn is_batch_edit(&self) -> bool {
    self.journal.is_batch_edit()
  }

  pub fn set_unlimited_history(&mut self, unlimited: bool) {
    self.journal.set_unlimited_history(unlimited);
  }

  pub fn unlimited_history(&self) -> bool {
    self.journal.unlimited_history()
  }

  // ---- argument checking --------------------------------------------------

  fn check_offset(&self, offset: usize) -> Result<usize> {
    let len = self.length();
    if offset <= len {
      return Ok(offset);
    }
    if self.strict {
      return Err(EngineError::OutOfRange { offset, len });
    }
    tracing::debug!(offset, len, "clamping out-of-range offset");
    Ok(len)
  }

  fn check_range(&self, start: usize, end: usize) -> Result<(usize, usize)> {
    let len = self.length();
    if self.strict {
      if start > end {
        return Err(EngineError::InvalidRange { start, end });
      }
      if end > len {
        return Err(EngineError::OutOfRange { offset: end, len });
      }
      return Ok((start, end));
    }
    let clamped_start = start.min(len);
    let clamped_end = end.clamp(clamped_start, len);
    if clamped_start != start || clamped_end != end {
      tracing::debug!(start, end, len, "clamping out-of-range range");
    }
    Ok((clamped_start, clamped_end))
  }

  // ---- storage plumbing ---------------------------------------------------

  /// Characters in `[start, end)` in *document* order (piece traversal).
  /// This is what a delete over the range will actually remove, so it is
  /// what the journal captures.
  fn doc_range(&self, start: usize, end: usize) -> Result<String> {
    let mut out = String::with_capacity(end - start);
    if start == end {
      return Ok(out);
    }
    let (mut pid, mut local) = self
      .tree
      .locate(start)
      .ok_or(EngineError::Internal("range start not covered by piece index"))?;
    let mut remaining = end - start;
    loop {
      let piece = *self.tree.piece(pid);
      let chunk = self
        .pool
        .get(piece.chunk)
        .ok_or(EngineError::Internal("released chunk still referenced"))?;
      let n = remaining.min(piece.len - local);
      out.push_str(&chunk.sub(piece.start + local, piece.start + local + n));
      remaining -= n;
      if remaining == 0 {
        return Ok(out);
      }
      pid = self
        .tree
        .next(pid)
        .ok_or(EngineError::Internal("piece chain ended inside range"))?;
      local = 0;
    }
  }

  /// Extends the document tail: tops up the tail chunk (when the tail piece
  /// ends exactly at the chunk's end), then spawns capacity-sized chunks for
  /// the remainder.
  fn raw_append(&mut self, text: &[char]) -> Result<()> {
    if text.is_empty() {
      return Ok(());
    }
    let mut consumed = 0;
    if let Some(tail) = self.tree.last() {
      let piece = *self.tree.piece(tail);
      let chunk_len = self
        .pool
        .get(piece.chunk)
        .ok_or(EngineError::Internal("released chunk still referenced"))?
        .len();
      if piece.start + piece.len == chunk_len {
        let take = self.pool.free_space(piece.chunk).min(text.len());
        if take > 0 {
          self
            .pool
            .get_mut(piece.chunk)
            .ok_or(EngineError::Internal("released chunk still referenced"))?
            .append(&text[..take]);
          self.tree.grow(tail, take);
          consumed = take;
        }
      }
    }
    if consumed < text.len() {
      let pool_anchor = self.pool.last();
      let tree_anchor = self.tree.last();
      self.spawn_chunks(&text[consumed..], pool_anchor, tree_anchor);
    }
    Ok(())
  }

  /// Inserts `text` at `offset`, `0 <= offset < length`.
  fn raw_insert(&mut self, offset: usize, text: &[char]) -> Result<()> {
    let (pid, remainder) = self
      .tree
      .locate(offset)
      .ok_or(EngineError::Internal("offset not covered by piece index"))?;
    let piece = *self.tree.piece(pid);
    let local = piece.start + remainder;
    let take = self.pool.free_space(piece.chunk).min(text.len());
    let rest = &text[take..];

    if remainder > 0 {
      // Mid-piece: split, let the left half absorb what fits in the chunk,
      // and hang overflow pieces between the halves.
      self.tree.split(pid, remainder);
      if take > 0 {
        self
          .pool
          .get_mut(piece.chunk)
          .ok_or(EngineError::Internal("released chunk still referenced"))?
          .insert(local, &text[..take])?;
        self.shift_chunk_starts(piece.chunk, local, take as isize, None);
        self.tree.grow(pid, take);
      }
      if !rest.is_empty() {
        self.spawn_chunks(rest, Some(piece.chunk), Some(pid));
      }
      return Ok(());
    }

    // Insertion at a piece head.
    let pred = self.tree.prev(pid);
    if rest.is_empty() {
      // Everything fits: the piece simply absorbs the new prefix.
      self
        .pool
        .get_mut(piece.chunk)
        .ok_or(EngineError::Internal("released chunk still referenced"))?
        .insert(local, text)?;
      self.shift_chunk_starts(piece.chunk, local, take as isize, Some(pid));
      self.tree.grow(pid, take);
      return Ok(());
    }

    // Overflow at a piece head: whatever fits becomes a distinct prefix
    // piece (it precedes the overflow chunks in document order, while the
    // located piece's own content follows them).
    let mut anchor = pred;
    let mut pool_anchor = pred.map(|id| self.tree.piece(id).chunk);
    if take > 0 {
      self
        .pool
        .get_mut(piece.chunk)
        .ok_or(EngineError::Internal("released chunk still referenced"))?
        .insert(local, &text[..take])?;
      self.shift_chunk_starts(piece.chunk, local, take as isize, None);
      anchor = Some(self.tree.insert_before(pid, Piece {
        chunk: piece.chunk,
        start: local,
        len:   take,
      }));
      pool_anchor = Some(piece.chunk);
    }
    self.spawn_chunks(rest, pool_anchor, anchor);
    Ok(())
  }

  /// Removes `[start, end)`. Each round deletes the longest run the piece
  /// under `start` can give up; the document contracts in place, so `start`
  /// stays put while `remaining` shrinks.
  fn raw_delete(&mut self, start: usize, end: usize) -> Result<()> {
    let mut remaining = end - start;
    while remaining > 0 {
      let (pid, remainder) = self
        .tree
        .locate(start)
        .ok_or(EngineError::Internal("offset not covered by piece index"))?;
      let piece = *self.tree.piece(pid);
      let local = piece.start + remainder;
      let n = remaining.min(piece.len - remainder);

      if remainder == 0 && n == piece.len {
        self.tree.remove(pid);
      } else {
        self.tree.set_len(pid, piece.len - n);
      }
      self
        .pool
        .get_mut(piece.chunk)
        .ok_or(EngineError::Internal("released chunk still referenced"))?
        .delete(local, n)?;
      self.shift_chunk_starts(piece.chunk, local + n, -(n as isize), None);
      if self.pool.get(piece.chunk).is_some_and(|chunk| chunk.is_empty()) {
        self.pool.release(piece.chunk);
      }
      remaining -= n;
    }
    Ok(())
  }

  /// Distributes `text` over freshly allocated chunks (each filled to
  /// capacity except possibly the last), splicing one piece per chunk after
  /// `anchor` in document order and after `pool_anchor` in pool order.
  fn spawn_chunks(
    &mut self,
    text: &[char],
    mut pool_anchor: Option<ChunkId>,
    mut anchor: Option<PieceId>,
  ) {
    let capacity = self.pool.capacity();
    let mut consumed = 0;
    while consumed < text.len() {
      let end = (consumed + capacity).min(text.len());
      let mut chunk = Chunk::new();
      chunk.append(&text[consumed..end]);
      let len = chunk.len();
      let chunk_id = self.pool.insert_after(pool_anchor, chunk);
      let piece_id = self.tree.insert_after(anchor, Piece {
        chunk: chunk_id,
        start: 0,
        len,
      });
      pool_anchor = Some(chunk_id);
      anchor = Some(piece_id);
      consumed = end;
    }
  }

  /// After physically inserting into (or deleting from) a chunk at local
  /// offset `from`, every other piece of that chunk whose start lies at or
  /// past `from` refers to shifted content and must move with it.
  fn shift_chunk_starts(
    &mut self,
    chunk: ChunkId,
    from: usize,
    delta: isize,
    exclude: Option<PieceId>,
  ) {
    let affected: SmallVec<[PieceId; 8]> = self
      .tree
      .iter()
      .filter(|&(id, piece)| piece.chunk == chunk && piece.start >= from && Some(id) != exclude)
      .map(|(id, _)| id)
      .collect();
    for id in affected {
      let start = self.tree.piece(id).start;
      self.tree.set_start(id, (start as isize + delta) as usize);
    }
  }
}

thread_local! {
  static SHARED: RefCell<TextEngine> = RefCell::new(TextEngine::new());
}

/// Runs `f` against this thread's cached engine. The closure must not call
/// [`with_shared`] again.
pub fn with_shared<R>(f: impl FnOnce(&mut TextEngine) -> R) -> R {
  SHARED.with(|engine| f(&mut engine.borrow_mut()))
}
