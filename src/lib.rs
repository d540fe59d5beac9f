//! An in-memory piece-table text engine for interactive editors.
//!
//! Storage is a pool of fixed-capacity character chunks; a red-black tree of
//! pieces maps document offsets onto chunk slices in O(log n). On top of the
//! two sit line queries driven by per-chunk newline tables, literal and
//! regex search, and a coalescing undo/redo journal.

use smartstring::{
  LazyCompact,
  SmartString,
};

pub mod chunk;
pub mod engine;
pub mod history;
pub mod piece;
pub mod pool;
pub mod range;
pub mod search;

pub type Tendril = SmartString<LazyCompact>;

pub use engine::{
  with_shared,
  EngineConfig,
  EngineError,
  EngineListener,
  TextEngine,
};
pub use history::{
  Journal,
  JournalListener,
};
pub use range::Range;
pub use search::{
  is_regex,
  SearchMatch,
};
