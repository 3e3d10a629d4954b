//! Source locations carried by every AST node and every diagnostic.

use std::fmt;
use std::sync::Arc;

/// A source file identity, shared cheaply across every location that
/// references it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceFile(Arc<str>);

impl SourceFile {
  #[must_use] pub fn new(path: impl Into<Arc<str>>) -> Self { Self(path.into()) }
  #[must_use] pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for SourceFile {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for SourceFile {
  fn from(s: &str) -> Self { Self::new(s) }
}

/// `{file, line, column, byte_offset}`. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceLocation {
  pub file: SourceFile,
  pub line: u32,
  pub column: u32,
  pub byte_offset: u32,
}

impl SourceLocation {
  #[must_use] pub fn new(file: SourceFile, line: u32, column: u32, byte_offset: u32) -> Self {
    Self { file, line, column, byte_offset }
  }

  /// A placeholder location for builtin/predeclared symbols, which have no
  /// user-visible source position.
  #[must_use] pub fn builtin() -> Self {
    Self { file: SourceFile::new("<builtin>"), line: 0, column: 0, byte_offset: 0 }
  }

  #[must_use] pub fn is_builtin(&self) -> bool { self.line == 0 && self.column == 0 && self.file.as_str() == "<builtin>" }

  /// Total order used by the invariant "declaration location <= reference
  /// location".
  #[must_use] pub fn precedes_or_eq(&self, other: &SourceLocation) -> bool {
    if self.is_builtin() { return true; }
    self.file == other.file && self.byte_offset <= other.byte_offset
  }
}

impl fmt::Display for SourceLocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.file, self.line, self.column)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builtin_precedes_everything() {
    let b = SourceLocation::builtin();
    let u = SourceLocation::new(SourceFile::new("a.lang"), 4, 1, 30);
    assert!(b.precedes_or_eq(&u));
  }

  #[test]
  fn ordering_within_file() {
    let f = SourceFile::new("a.lang");
    let a = SourceLocation::new(f.clone(), 1, 1, 0);
    let b = SourceLocation::new(f, 2, 1, 10);
    assert!(a.precedes_or_eq(&b));
    assert!(!b.precedes_or_eq(&a));
  }
}
