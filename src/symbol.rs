//! String interning. Every identifier the analyzer ever compares by name
//! (declaration names, field names, annotation names, predeclared function
//! names) is interned once to a small `Copy` handle.

use std::sync::{LazyLock, RwLock};
use hashbrown::HashMap;

/// An interned identifier. Cheap to copy, compare, and hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
  #[must_use] pub fn as_str(self) -> &'static str { GLOBAL.resolve(self) }
  #[must_use] pub fn into_usize(self) -> usize { self.0 as usize }
}

impl std::fmt::Debug for Symbol {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "Symbol({:?})", self.as_str())
  }
}

impl std::fmt::Display for Symbol {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

struct InternerInner {
  map: HashMap<&'static str, Symbol>,
  strings: Vec<&'static str>,
}

/// Thread-safe string interner. A small number of well-known symbols (see
/// [`Symbol::UNDER`] and friends) are reserved at fixed indices so they can
/// be compared without a lookup.
pub struct Interner(RwLock<InternerInner>);

impl Interner {
  fn new() -> Self {
    Self(RwLock::new(InternerInner { map: HashMap::new(), strings: Vec::new() }))
  }

  pub fn intern(&self, s: &str) -> Symbol {
    if let Some(&sym) = self.0.read().expect("interner lock poisoned").map.get(s) {
      return sym;
    }
    let mut inner = self.0.write().expect("interner lock poisoned");
    if let Some(&sym) = inner.map.get(s) { return sym; }
    let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
    let sym = Symbol(u32::try_from(inner.strings.len()).expect("interner overflow"));
    inner.strings.push(leaked);
    inner.map.insert(leaked, sym);
    sym
  }

  fn resolve(&self, sym: Symbol) -> &'static str {
    let inner = self.0.read().expect("interner lock poisoned");
    inner.strings[sym.0 as usize]
  }
}

static GLOBAL: LazyLock<Interner> = LazyLock::new(Interner::new);

/// Intern a string against the process-wide interner.
pub fn intern(s: &str) -> Symbol { GLOBAL.intern(s) }

impl Symbol {
  /// The `_` wildcard pattern binder.
  pub fn under() -> Symbol { intern("_") }
  pub fn self_() -> Symbol { intern("self") }
}

/// Build a dense lookup table from symbol to `T`, sized to the largest
/// symbol id referenced. Used to build static `Symbol -> enum` maps such as
/// the primitive-name table in `types::builtin`.
#[must_use] pub fn init_dense_symbol_map<T: Copy>(pairs: &[(Symbol, T)]) -> Box<[Option<T>]> {
  let max = pairs.iter().map(|(s, _)| s.into_usize()).max().unwrap_or(0);
  let mut table = vec![None; max + 1].into_boxed_slice();
  for &(s, v) in pairs { table[s.into_usize()] = Some(v); }
  table
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn interning_is_idempotent() {
    let a = intern("foo");
    let b = intern("foo");
    assert_eq!(a, b);
    assert_eq!(a.as_str(), "foo");
  }

  #[test]
  fn distinct_strings_get_distinct_symbols() {
    let a = intern("alpha_sym_test");
    let b = intern("beta_sym_test");
    assert_ne!(a, b);
  }
}
