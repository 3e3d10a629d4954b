//! Edit-distance suggestions for undefined-name diagnostics:
//! `"did you mean 'main'?"`.

use arrayvec::ArrayVec;
use itertools::Itertools;

use crate::symbol::Symbol;

/// Suggestions are capped at this many entries.
const MAX_SUGGESTIONS: usize = 3;

fn levenshtein(a: &str, b: &str) -> usize {
  let a: Vec<char> = a.chars().collect();
  let b: Vec<char> = b.chars().collect();
  let mut prev: Vec<usize> = (0..=b.len()).collect();
  let mut cur = vec![0usize; b.len() + 1];
  for (i, &ca) in a.iter().enumerate() {
    cur[0] = i + 1;
    for (j, &cb) in b.iter().enumerate() {
      let cost = usize::from(ca != cb);
      cur[j + 1] = (prev[j + 1] + 1).min(cur[j] + 1).min(prev[j] + cost);
    }
    std::mem::swap(&mut prev, &mut cur);
  }
  prev[b.len()]
}

/// Given an undefined `name` and the set of `candidates` reachable from the
/// lookup scope, return up to 3 names with distance ≤ `max(1, len/3)`,
/// sorted ascending by distance.
#[must_use] pub fn suggest_names(name: &str, candidates: impl IntoIterator<Item = Symbol>) -> Vec<String> {
  let threshold = ((name.len() + 2) / 3).max(1);
  let ranked = candidates
    .into_iter()
    .map(Symbol::as_str)
    .filter(|c| *c != name)
    .unique()
    .map(|c| (levenshtein(name, c), c))
    .filter(|(d, _)| *d <= threshold)
    .sorted_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

  let mut out: ArrayVec<String, MAX_SUGGESTIONS> = ArrayVec::new();
  for (_, s) in ranked {
    if out.is_full() { break; }
    out.push(s.to_owned());
  }
  out.into_iter().collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::symbol::intern;

  #[test]
  fn suggests_close_match() {
    let candidates = [intern("main"), intern("foo")];
    let suggestions = suggest_names("mian", candidates);
    assert_eq!(suggestions, vec!["main".to_owned()]);
  }

  #[test]
  fn no_suggestion_when_too_far() {
    let candidates = [intern("completely_different")];
    let suggestions = suggest_names("x", candidates);
    assert!(suggestions.is_empty());
  }

  #[test]
  fn caps_at_three_suggestions() {
    let candidates = [intern("aaaa"), intern("aaab"), intern("aaac"), intern("aaad")];
    let suggestions = suggest_names("aaaa", candidates);
    assert!(suggestions.len() <= 3);
  }
}
