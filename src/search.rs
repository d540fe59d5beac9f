//! Substring and regular-expression search across the chunk pool.
//!
//! Scanning is chunk-by-chunk in pool order: each chunk is searched
//! independently and match offsets are lifted into document space by adding
//! the chunk's base offset. A match therefore never spans a chunk boundary.
//! All offsets are character offsets; regex byte positions are translated
//! before they leave this module.

use regex::{
  Regex,
  RegexBuilder,
};

use crate::{
  pool::ChunkPool,
  range::Range,
  Tendril,
};

/// A single search hit: where it was found and what was matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
  pub range: Range,
  pub value: Tendril,
}

/// Whether `query` compiles as a regular expression.
pub fn is_regex(query: &str) -> bool {
  match Regex::new(query) {
    Ok(_) => true,
    Err(err) => {
      tracing::debug!(%err, "query is not a valid regex");
      false
    },
  }
}

/// A compiled query.
pub(crate) enum Needle {
  Literal {
    chars:          Vec<char>,
    case_sensitive: bool,
  },
  Regex(Regex),
}

impl Needle {
  /// Compiles the query. A literal needle never fails; a regex needle
  /// surfaces its compile error so the caller can pick a fallback policy.
  pub(crate) fn new(
    query: &str,
    case_sensitive: bool,
    is_regex: bool,
  ) -> Result<Self, regex::Error> {
    if is_regex {
      let regex = RegexBuilder::new(query)
        .case_insensitive(!case_sensitive)
        .build()?;
      Ok(Needle::Regex(regex))
    } else {
      Ok(Self::literal(query, case_sensitive))
    }
  }

  pub(crate) fn literal(query: &str, case_sensitive: bool) -> Self {
    Needle::Literal {
      chars: query.chars().collect(),
      case_sensitive,
    }
  }
}

/// First match at or after `start`, in document order.
pub(crate) fn find_first(pool: &ChunkPool, needle: &Needle, start: usize) -> Option<SearchMatch> {
  let mut base = 0;
  for (_, chunk) in pool.iter() {
    let chunk_len = chunk.len();
    if start > base + chunk_len {
      base += chunk_len;
      continue;
    }
    let from = start.saturating_sub(base);
    if let Some(hit) = first_in_chunk(chunk.chars().collect::<Vec<_>>().as_slice(), needle, from) {
      return Some(lift(hit, base));
    }
    base += chunk_len;
  }
  None
}

/// Every match at or after `start`, in document order.
pub(crate) fn find_all(pool: &ChunkPool, needle: &Needle, start: usize) -> Vec<SearchMatch> {
  let mut results = Vec::new();
  let mut base = 0;
  for (_, chunk) in pool.iter() {
    let chunk_len = chunk.len();
    if start > base + chunk_len {
      base += chunk_len;
      continue;
    }
    let from = start.saturating_sub(base);
    let hay: Vec<char> = chunk.chars().collect();
    match needle {
      Needle::Literal {
        chars,
        case_sensitive,
      } => {
        let mut at = from;
        while let Some((s, e)) = find_literal(&hay, chars, at, *case_sensitive) {
          results.push(lift(make_match(&hay, s, e), base));
          at = e;
        }
      },
      Needle::Regex(regex) => {
        let text: String = hay.iter().collect();
        let byte_from = byte_of_char(&text, from);
        let mut char_base = from;
        let mut last_byte = byte_from;
        for found in regex.find_iter(&text[byte_from..]) {
          let match_start_byte = byte_from + found.start();
          char_base += text[last_byte..match_start_byte].chars().count();
          let len = found.as_str().chars().count();
          results.push(SearchMatch {
            range: Range::new(base + char_base, base + char_base + len),
            value: Tendril::from(found.as_str()),
          });
          char_base += len;
          last_byte = byte_from + found.end();
        }
      },
    }
    base += chunk_len;
  }
  results
}

fn first_in_chunk(hay: &[char], needle: &Needle, from: usize) -> Option<SearchMatch> {
  match needle {
    Needle::Literal {
      chars,
      case_sensitive,
    } => {
      let (s, e) = find_literal(hay, chars, from, *case_sensitive)?;
      Some(make_match(hay, s, e))
    },
    Needle::Regex(regex) => {
      let text: String = hay.iter().collect();
      let byte_from = byte_of_char(&text, from);
      let found = regex.find(&text[byte_from..])?;
      let start = from + text[byte_from..byte_from + found.start()].chars().count();
      let len = found.as_str().chars().count();
      Some(SearchMatch {
        range: Range::new(start, start + len),
        value: Tendril::from(found.as_str()),
      })
    },
  }
}

/// Naive scan in character space. Non-overlapping, empty needles never match.
fn find_literal(
  hay: &[char],
  needle: &[char],
  mut from: usize,
  case_sensitive: bool,
) -> Option<(usize, usize)> {
  if needle.is_empty() {
    return None;
  }
  while from + needle.len() <= hay.len() {
    let window = &hay[from..from + needle.len()];
    if window
      .iter()
      .zip(needle)
      .all(|(&a, &b)| char_eq(a, b, case_sensitive))
    {
      return Some((from, from + needle.len()));
    }
    from += 1;
  }
  None
}

fn char_eq(a: char, b: char, case_sensitive: bool) -> bool {
  if case_sensitive {
    a == b
  } else {
    a == b || a.to_lowercase().eq(b.to_lowercase())
  }
}

fn make_match(hay: &[char], start: usize, end: usize) -> SearchMatch {
  SearchMatch {
    range: Range::new(start, end),
    value: hay[start..end].iter().collect::<String>().into(),
  }
}

fn lift(hit: SearchMatch, base: usize) -> SearchMatch {
  SearchMatch {
    range: Range::new(hit.range.start + base, hit.range.end + base),
    value: hit.value,
  }
}

/// Byte offset of the `at`-th character, clamped to the end.
fn byte_of_char(text: &str, at: usize) -> usize {
  text
    .char_indices()
    .nth(at)
    .map(|(byte, _)| byte)
    .unwrap_or(text.len())
}
