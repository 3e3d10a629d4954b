//! The error and diagnostic engine: error codes, a thread-safe append-only
//! sink, and rendering.

mod suggest;
pub mod render;

pub use suggest::suggest_names;

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

use crate::source::SourceLocation;

/// One code per diagnostic kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SemanticErrorCode {
  #[error("undefined symbol")] UndefinedSymbol,
  #[error("duplicate symbol")] DuplicateSymbol,
  #[error("undefined type")] UndefinedType,
  #[error("type mismatch")] TypeMismatch,
  #[error("mismatched types")] MismatchedTypes,
  #[error("not callable")] NotCallable,
  #[error("immutable modification")] ImmutableModification,
  #[error("uninitialized variable")] UninitializedVariable,
  #[error("invalid declaration")] InvalidDeclaration,
  #[error("non-exhaustive match")] NonExhaustiveMatch,
  #[error("invalid lifetime")] InvalidLifetime,
  #[error("unknown annotation")] UnknownAnnotation,
  #[error("invalid annotation")] InvalidAnnotation,
  #[error("invalid annotation context")] InvalidAnnotationContext,
  #[error("conflicting annotations")] ConflictingAnnotations,
  #[error("missing annotation")] MissingAnnotation,
  #[error("duplicate annotation")] DuplicateAnnotation,
  #[error("mutually exclusive annotations")] MutuallyExclusiveAnnotations,
  #[error("security violation")] SecurityViolation,
  #[error("division by zero")] DivisionByZero,
  #[error("invalid literal")] InvalidLiteral,
  #[error("type annotation required")] TypeAnnotationRequired,
  #[error("circular dependency")] CircularDependency,
  #[error("invalid type")] InvalidType,
  #[error("invalid operation")] InvalidOperation,
  #[error("missing return")] MissingReturn,
  #[error("internal error")] Internal,
}

impl SemanticErrorCode {
  #[must_use] pub fn is_warning_eligible(self) -> bool {
    matches!(self, SemanticErrorCode::ImmutableModification | SemanticErrorCode::UninitializedVariable)
  }
}

/// One reported diagnostic: its code, source location, rendered message,
/// and any name suggestions.
#[derive(Clone, Debug, Error)]
#[error("{code}: {message}")]
pub struct SemanticError {
  pub code: SemanticErrorCode,
  pub location: SourceLocation,
  pub message: String,
  pub suggestions: Vec<String>,
  pub is_warning: bool,
}

/// Thread-safe append-only diagnostic sink shared by every analyzer
/// component. Propagation continues past non-fatal errors up to
/// `max_errors`.
pub struct ErrorList {
  errors: Mutex<Vec<SemanticError>>,
  warnings_enabled: bool,
  max_errors: usize,
  error_count: AtomicU32,
  warning_count: AtomicU32,
}

impl ErrorList {
  #[must_use] pub fn new(max_errors: usize) -> Self {
    Self { errors: Mutex::new(Vec::new()), warnings_enabled: true, max_errors, error_count: AtomicU32::new(0), warning_count: AtomicU32::new(0) }
  }

  #[must_use] pub fn with_warnings(max_errors: usize, warnings_enabled: bool) -> Self {
    Self { warnings_enabled, ..Self::new(max_errors) }
  }

  #[must_use] pub fn is_full(&self) -> bool {
    self.max_errors != 0 && self.errors.lock().expect("error list lock poisoned").len() >= self.max_errors
  }

  /// `report_error(code, location, fmt, ...)`.
  pub fn report(&self, code: SemanticErrorCode, location: SourceLocation, message: String) {
    self.report_with_suggestions(code, location, message, Vec::new());
  }

  pub fn report_with_suggestions(&self, code: SemanticErrorCode, location: SourceLocation, message: String, suggestions: Vec<String>) {
    if self.is_full() { return; }
    self.error_count.fetch_add(1, Ordering::Relaxed);
    self.errors.lock().expect("error list lock poisoned").push(SemanticError { code, location, message, suggestions, is_warning: false });
  }

  /// `report_warning` analogous to `report_error`; suppressed entirely when
  /// `enable_warnings` is off.
  pub fn report_warning(&self, code: SemanticErrorCode, location: SourceLocation, message: String) {
    if !self.warnings_enabled || self.is_full() { return; }
    self.warning_count.fetch_add(1, Ordering::Relaxed);
    self.errors.lock().expect("error list lock poisoned").push(SemanticError { code, location, message, suggestions: Vec::new(), is_warning: true });
  }

  #[must_use] pub fn len(&self) -> usize { self.errors.lock().expect("error list lock poisoned").len() }
  #[must_use] pub fn is_empty(&self) -> bool { self.len() == 0 }
  #[must_use] pub fn error_count(&self) -> u32 { self.error_count.load(Ordering::Relaxed) }
  #[must_use] pub fn warning_count(&self) -> u32 { self.warning_count.load(Ordering::Relaxed) }

  #[must_use] pub fn snapshot(&self) -> Vec<SemanticError> { self.errors.lock().expect("error list lock poisoned").clone() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reporting_stops_past_max_errors() {
    let list = ErrorList::new(2);
    for _ in 0..5 {
      list.report(SemanticErrorCode::Internal, SourceLocation::builtin(), "x".to_owned());
    }
    assert_eq!(list.len(), 2);
  }

  #[test]
  fn warnings_suppressed_when_disabled() {
    let list = ErrorList::with_warnings(100, false);
    list.report_warning(SemanticErrorCode::UninitializedVariable, SourceLocation::builtin(), "x".to_owned());
    assert!(list.is_empty());
  }
}
