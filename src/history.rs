//! The undo/redo journal.
//!
//! Every captured edit becomes an [`Action`] holding the affected offsets and
//! the text needed to replay it: the inserted text for inserts (re-applied on
//! redo) and the removed text for deletes (re-applied on undo; the engine
//! captures it *before* mutating storage). Actions are stamped with a group
//! id; undo and redo always process a whole group. A batch-edit bracket
//! freezes the group counter so everything captured inside shares one group.
//!
//! Keystroke runs coalesce: a capture of the same kind, landing within one
//! second of the previous capture and continuing at the previous action's
//! boundary, extends that action in place instead of appending a new one.
//! One undo then reverts the whole run.
//!
//! The journal never touches the document itself. The engine drains a group
//! with [`Journal::take_undo_group`] / [`Journal::take_redo_group`], replays
//! it, and reports the resulting caret back through
//! [`Journal::notify_undo`] / [`Journal::notify_redo`].

use std::{
  collections::VecDeque,
  fmt,
  time::Instant,
};

use smallvec::SmallVec;

use crate::Tendril;

/// Actions retained before the oldest entries are dropped, unless unlimited
/// history is enabled.
pub const MAX_HISTORY: usize = 200;

/// Captures closer together than this (in nanoseconds) may merge.
pub const MERGE_WINDOW_NANOS: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
  Insert,
  Delete,
}

/// One undoable edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
  pub kind:  ActionKind,
  pub start: usize,
  pub end:   usize,
  pub text:  Tendril,
  pub group: u64,
}

impl Action {
  /// Caret position after undoing this action.
  pub fn undo_caret(&self) -> usize {
    match self.kind {
      ActionKind::Insert => self.start,
      ActionKind::Delete => self.end,
    }
  }

  /// Caret position after redoing this action.
  pub fn redo_caret(&self) -> usize {
    match self.kind {
      ActionKind::Insert => self.end,
      ActionKind::Delete => self.start,
    }
  }
}

/// Observer for journal activity.
pub trait JournalListener {
  fn on_undo(&mut self, _caret: usize) {}
  fn on_redo(&mut self, _caret: usize) {}
  fn on_change(&mut self, _start: usize, _end: usize, _timestamp: u64) {}
  fn on_stack_change(&mut self, _len: usize) {}
}

pub struct Journal {
  actions:      VecDeque<Action>,
  cursor:       usize,
  group:        u64,
  batch:        bool,
  unlimited:    bool,
  last_capture: Option<u64>,
  epoch:        Instant,
  listener:     Option<Box<dyn JournalListener>>,
}

impl fmt::Debug for Journal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Journal")
      .field("actions", &self.actions)
      .field("cursor", &self.cursor)
      .field("group", &self.group)
      .field("batch", &self.batch)
      .field("unlimited", &self.unlimited)
      .finish_non_exhaustive()
  }
}

impl Default for Journal {
  fn default() -> Self {
    Self::new()
  }
}

impl Journal {
  pub fn new() -> Self {
    Self {
      actions:      VecDeque::new(),
      cursor:       0,
      group:        0,
      batch:        false,
      unlimited:    false,
      last_capture: None,
      epoch:        Instant::now(),
      listener:     None,
    }
  }

  /// Nanoseconds elapsed since the journal was created.
  pub fn now(&self) -> u64 {
    self.epoch.elapsed().as_nanos() as u64
  }

  pub fn set_listener(&mut self, listener: Box<dyn JournalListener>) {
    self.listener = Some(listener);
  }

  pub fn len(&self) -> usize {
    self.actions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.actions.is_empty()
  }

  pub fn cursor(&self) -> usize {
    self.cursor
  }

  pub fn can_undo(&self) -> bool {
    self.cursor > 0
  }

  pub fn can_redo(&self) -> bool {
    self.cursor < self.actions.len()
  }

  pub fn is_batch_edit(&self) -> bool {
    self.batch
  }

  /// Freezes the group counter; captures now share one group.
  pub fn begin_batch_edit(&mut self) {
    self.batch = true;
  }

  /// Closes the current group and resumes per-capture grouping.
  pub fn end_batch_edit(&mut self) {
    self.group += 1;
    self.batch = false;
  }

  pub fn set_unlimited_history(&mut self, unlimited: bool) {
    self.unlimited = unlimited;
  }

  pub fn unlimited_history(&self) -> bool {
    self.unlimited
  }

  /// Drops everything, keeping the listener and group counter epoch.
  pub fn reset(&mut self) {
    self.actions.clear();
    self.cursor = 0;
    self.group = 0;
    self.batch = false;
    self.last_capture = None;
  }

  pub fn capture_insert(&mut self, start: usize, end: usize, text: Tendril) {
    let timestamp = self.now();
    self.capture_insert_at(start, end, text, timestamp);
  }

  pub fn capture_insert_at(&mut self, start: usize, end: usize, text: Tendril, timestamp: u64) {
    debug_assert_eq!(end - start, text.chars().count());
    self.truncate_tail();

    if self.mergeable(timestamp) {
      if let Some(last) = self.actions.back_mut() {
        if last.kind == ActionKind::Insert && start == last.end {
          last.end = end;
          last.text.push_str(&text);
          self.finish_capture(start, end, timestamp);
          return;
        }
      }
    }

    let group = self.group;
    self.push(Action {
      kind: ActionKind::Insert,
      start,
      end,
      text,
      group,
    });
    self.finish_capture(start, end, timestamp);
  }

  pub fn capture_delete(&mut self, start: usize, end: usize, text: Tendril) {
    let timestamp = self.now();
    self.capture_delete_at(start, end, text, timestamp);
  }

  pub fn capture_delete_at(&mut self, start: usize, end: usize, text: Tendril, timestamp: u64) {
    debug_assert_eq!(end - start, text.chars().count());
    self.truncate_tail();

    if self.mergeable(timestamp) {
      if let Some(last) = self.actions.back_mut() {
        if last.kind == ActionKind::Delete && end == last.start {
          // Backspace run: the new span sits directly before the old one.
          last.start = start;
          let mut merged = text;
          merged.push_str(&last.text);
          last.text = merged;
          self.finish_capture(start, end, timestamp);
          return;
        }
        if last.kind == ActionKind::Delete && start == last.start {
          // Delete-key run: repeated removal at the same offset.
          last.end += end - start;
          last.text.push_str(&text);
          self.finish_capture(start, end, timestamp);
          return;
        }
      }
    }

    let group = self.group;
    self.push(Action {
      kind: ActionKind::Delete,
      start,
      end,
      text,
      group,
    });
    self.finish_capture(start, end, timestamp);
  }

  /// Moves the cursor left across one whole group and returns its actions,
  /// newest first. Empty when there is nothing to undo.
  pub fn take_undo_group(&mut self) -> SmallVec<[Action; 4]> {
    let mut group = SmallVec::new();
    if !self.can_undo() {
      return group;
    }
    let id = self.actions[self.cursor - 1].group;
    while self.cursor > 0 && self.actions[self.cursor - 1].group == id {
      self.cursor -= 1;
      group.push(self.actions[self.cursor].clone());
    }
    group
  }

  /// Moves the cursor right across one whole group and returns its actions,
  /// oldest first. Empty when there is nothing to redo.
  pub fn take_redo_group(&mut self) -> SmallVec<[Action; 4]> {
    let mut group = SmallVec::new();
    if !self.can_redo() {
      return group;
    }
    let id = self.actions[self.cursor].group;
    while self.cursor < self.actions.len() && self.actions[self.cursor].group == id {
      group.push(self.actions[self.cursor].clone());
      self.cursor += 1;
    }
    group
  }

  pub fn notify_undo(&mut self, caret: usize) {
    if let Some(listener) = self.listener.as_mut() {
      listener.on_undo(caret);
    }
  }

  pub fn notify_redo(&mut self, caret: usize) {
    if let Some(listener) = self.listener.as_mut() {
      listener.on_redo(caret);
    }
  }

  fn mergeable(&self, timestamp: u64) -> bool {
    self
      .last_capture
      .is_some_and(|previous| timestamp.saturating_sub(previous) < MERGE_WINDOW_NANOS)
  }

  /// Discards rolled-back actions; any new capture invalidates the redo tail.
  fn truncate_tail(&mut self) {
    self.actions.truncate(self.cursor);
  }

  fn push(&mut self, action: Action) {
    if !self.unlimited && self.actions.len() >= MAX_HISTORY {
      self.actions.pop_front();
      self.cursor = self.cursor.saturating_sub(1);
    }
    self.actions.push_back(action);
    self.cursor += 1;
    if !self.batch {
      self.group += 1;
    }
    let len = self.actions.len();
    if let Some(listener) = self.listener.as_mut() {
      listener.on_stack_change(len);
    }
  }

  fn finish_capture(&mut self, start: usize, end: usize, timestamp: u64) {
    self.last_capture = Some(timestamp);
    if let Some(listener) = self.listener.as_mut() {
      listener.on_change(start, end, timestamp);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{
    cell::RefCell,
    rc::Rc,
  };

  use super::*;

  fn insert(journal: &mut Journal, start: usize, text: &str, at: u64) {
    journal.capture_insert_at(start, start + text.chars().count(), Tendril::from(text), at);
  }

  fn delete(journal: &mut Journal, start: usize, text: &str, at: u64) {
    journal.capture_delete_at(start, start + text.chars().count(), Tendril::from(text), at);
  }

  #[test]
  fn typing_run_coalesces() {
    let mut journal = Journal::new();
    insert(&mut journal, 0, "h", 0);
    insert(&mut journal, 1, "e", 100);
    insert(&mut journal, 2, "y", 200);
    assert_eq!(journal.len(), 1);
    let group = journal.take_undo_group();
    assert_eq!(group.len(), 1);
    assert_eq!(group[0].start, 0);
    assert_eq!(group[0].end, 3);
    assert_eq!(group[0].text.as_str(), "hey");
  }

  #[test]
  fn merge_window_expires() {
    let mut journal = Journal::new();
    insert(&mut journal, 0, "h", 0);
    insert(&mut journal, 1, "i", MERGE_WINDOW_NANOS + 1);
    assert_eq!(journal.len(), 2);
  }

  #[test]
  fn non_adjacent_inserts_do_not_merge() {
    let mut journal = Journal::new();
    insert(&mut journal, 0, "a", 0);
    insert(&mut journal, 5, "b", 100);
    assert_eq!(journal.len(), 2);
  }

  #[test]
  fn backspace_run_coalesces() {
    // Deleting "cba" one character at a time, right to left.
    let mut journal = Journal::new();
    delete(&mut journal, 5, "c", 0);
    delete(&mut journal, 4, "b", 100);
    delete(&mut journal, 3, "a", 200);
    assert_eq!(journal.len(), 1);
    let group = journal.take_undo_group();
    assert_eq!(group[0].start, 3);
    assert_eq!(group[0].end, 6);
    assert_eq!(group[0].text.as_str(), "abc");
  }

  #[test]
  fn delete_key_run_coalesces() {
    let mut journal = Journal::new();
    delete(&mut journal, 3, "a", 0);
    delete(&mut journal, 3, "b", 100);
    delete(&mut journal, 3, "c", 200);
    assert_eq!(journal.len(), 1);
    let group = journal.take_undo_group();
    assert_eq!(group[0].start, 3);
    assert_eq!(group[0].end, 6);
    assert_eq!(group[0].text.as_str(), "abc");
  }

  #[test]
  fn kinds_do_not_merge() {
    let mut journal = Journal::new();
    insert(&mut journal, 0, "a", 0);
    delete(&mut journal, 0, "a", 100);
    assert_eq!(journal.len(), 2);
  }

  #[test]
  fn batch_edit_shares_one_group() {
    let mut journal = Journal::new();
    journal.begin_batch_edit();
    insert(&mut journal, 0, "a", 0);
    delete(&mut journal, 9, "x", MERGE_WINDOW_NANOS * 2);
    insert(&mut journal, 4, "b", MERGE_WINDOW_NANOS * 4);
    journal.end_batch_edit();
    assert!(!journal.is_batch_edit());
    assert_eq!(journal.len(), 3);

    let group = journal.take_undo_group();
    assert_eq!(group.len(), 3, "batched actions undo together");
    assert_eq!(group[0].start, 4, "undo replays newest first");
    assert!(!journal.can_undo());
  }

  #[test]
  fn separate_captures_get_separate_groups() {
    let mut journal = Journal::new();
    insert(&mut journal, 0, "a", 0);
    insert(&mut journal, 9, "b", MERGE_WINDOW_NANOS * 2);
    assert_eq!(journal.take_undo_group().len(), 1);
    assert_eq!(journal.take_undo_group().len(), 1);
    assert!(journal.take_undo_group().is_empty());
  }

  #[test]
  fn redo_group_mirrors_undo() {
    let mut journal = Journal::new();
    insert(&mut journal, 0, "a", 0);
    insert(&mut journal, 9, "b", MERGE_WINDOW_NANOS * 2);
    assert_eq!(journal.take_undo_group().len(), 1);
    assert!(journal.can_redo());
    let redo = journal.take_redo_group();
    assert_eq!(redo.len(), 1);
    assert_eq!(redo[0].start, 9);
    assert!(!journal.can_redo());
  }

  #[test]
  fn capture_truncates_redo_tail() {
    let mut journal = Journal::new();
    insert(&mut journal, 0, "a", 0);
    insert(&mut journal, 9, "b", MERGE_WINDOW_NANOS * 2);
    journal.take_undo_group();
    assert_eq!(journal.len(), 2);
    insert(&mut journal, 1, "c", MERGE_WINDOW_NANOS * 4);
    assert_eq!(journal.len(), 2, "redo tail dropped before the new capture");
    assert!(!journal.can_redo());
  }

  #[test]
  fn history_bound_drops_oldest() {
    let mut journal = Journal::new();
    for i in 0..(MAX_HISTORY + 10) {
      // Far apart in time and space so nothing merges.
      insert(&mut journal, i * 10, "x", i as u64 * MERGE_WINDOW_NANOS * 2);
    }
    assert_eq!(journal.len(), MAX_HISTORY);
    assert_eq!(journal.cursor(), MAX_HISTORY);

    let mut unlimited = Journal::new();
    unlimited.set_unlimited_history(true);
    for i in 0..(MAX_HISTORY + 10) {
      insert(&mut unlimited, i * 10, "x", i as u64 * MERGE_WINDOW_NANOS * 2);
    }
    assert_eq!(unlimited.len(), MAX_HISTORY + 10);
  }

  #[test]
  fn caret_positions() {
    let insert_action = Action {
      kind:  ActionKind::Insert,
      start: 3,
      end:   8,
      text:  Tendril::from("hello"),
      group: 0,
    };
    assert_eq!(insert_action.undo_caret(), 3);
    assert_eq!(insert_action.redo_caret(), 8);

    let delete_action = Action {
      kind: ActionKind::Delete,
      ..insert_action
    };
    assert_eq!(delete_action.undo_caret(), 8);
    assert_eq!(delete_action.redo_caret(), 3);
  }

  #[derive(Default)]
  struct Recorder {
    changes: usize,
    stack:   Vec<usize>,
  }

  struct SharedRecorder(Rc<RefCell<Recorder>>);

  impl JournalListener for SharedRecorder {
    fn on_change(&mut self, _start: usize, _end: usize, _timestamp: u64) {
      self.0.borrow_mut().changes += 1;
    }

    fn on_stack_change(&mut self, len: usize) {
      self.0.borrow_mut().stack.push(len);
    }
  }

  #[test]
  fn listener_sees_changes_and_stack_growth() {
    let recorder = Rc::new(RefCell::new(Recorder::default()));
    let mut journal = Journal::new();
    journal.set_listener(Box::new(SharedRecorder(recorder.clone())));

    insert(&mut journal, 0, "a", 0);
    insert(&mut journal, 1, "b", 100); // merges: change fires, stack does not
    insert(&mut journal, 9, "c", MERGE_WINDOW_NANOS * 2);

    let recorder = recorder.borrow();
    assert_eq!(recorder.changes, 3);
    assert_eq!(recorder.stack, vec![1, 2]);
  }
}
