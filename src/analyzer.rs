//! The top-level analyzer, wiring every component into the public semantic
//! API.

pub mod queries;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tracing::instrument;

use crate::analyze::decl::analyze_program_decl;
use crate::analyze::AnalyzerContext;
use crate::ast::Decl;
use crate::config::AnalyzerConfig;
use crate::diagnostics::{ErrorList, SemanticError};
use crate::symbol::Symbol;
use crate::symtab::{SymbolEntry, SymbolTable};
use crate::types::builtin::{self, BuiltinTypes};
use crate::types::{PrimitiveKind, TypeDescriptor, TypeInterner};

/// Pointer width this analyzer assumes for `sizeof`/layout purposes. ABI
/// selection belongs to the parser/codegen boundary; this is only used by
/// the layout pass's unresolved-dependency fallback and by pointer/slice
/// sizing in the constant evaluator.
const POINTER_SIZE_BYTES: u32 = 8;

/// A snapshot of the analyzer's atomic counters, scoped per-analyzer
/// rather than process-wide.
#[derive(Clone, Copy, Debug, Default)]
pub struct Statistics {
  pub declarations_analyzed: u32,
  pub expressions_analyzed: u32,
  pub errors_reported: u32,
  pub warnings_reported: u32,
  pub max_scope_depth: u32,
}

#[derive(Default)]
pub(crate) struct StatisticsInner {
  pub declarations_analyzed: AtomicU32,
  pub expressions_analyzed: AtomicU32,
  pub max_scope_depth: AtomicU32,
}

impl StatisticsInner {
  pub fn record_scope_depth(&self, depth: u32) { self.max_scope_depth.fetch_max(depth, Ordering::Relaxed); }
}

/// The semantic analyzer for a single translation unit. Not `Send`/`Sync`
/// across analyses: one analyzer per file, with no shared mutable state
/// between analyzers.
pub struct Analyzer {
  pub(crate) interner: TypeInterner,
  pub(crate) global: Arc<SymbolTable>,
  pub(crate) builtins: BuiltinTypes,
  pub(crate) errors: ErrorList,
  pub(crate) config: AnalyzerConfig,
  pub(crate) statistics: StatisticsInner,
  pub(crate) imports: std::sync::Mutex<Vec<ImportRecord>>,
}

pub struct ImportRecord {
  pub path: Vec<Symbol>,
  pub alias: Option<Symbol>,
}

impl Analyzer {
  #[must_use] pub fn new(config: AnalyzerConfig) -> Self {
    let interner = TypeInterner::new();
    let global = SymbolTable::new_root();
    let builtins = builtin::seed(&interner, &global);
    Self {
      interner,
      global,
      builtins,
      errors: ErrorList::with_warnings(config.max_errors, config.enable_warnings),
      config,
      statistics: StatisticsInner::default(),
      imports: std::sync::Mutex::new(Vec::new()),
    }
  }

  #[must_use] pub fn pointer_size(&self) -> u32 { POINTER_SIZE_BYTES }
  #[must_use] pub fn interner(&self) -> &TypeInterner { &self.interner }
  #[must_use] pub fn errors(&self) -> &ErrorList { &self.errors }
  #[must_use] pub fn config(&self) -> &AnalyzerConfig { &self.config }
  #[must_use] pub fn global_scope(&self) -> &Arc<SymbolTable> { &self.global }
  #[must_use] pub fn builtins(&self) -> &BuiltinTypes { &self.builtins }

  pub(crate) fn record_import(&self, path: Vec<Symbol>, alias: Option<Symbol>) {
    self.imports.lock().expect("import list lock poisoned").push(ImportRecord { path, alias });
  }

  /// `analyze_program(root) -> bool`. Returns whether analysis completed
  /// with zero errors.
  #[instrument(skip_all)]
  pub fn analyze_program(&self, root: &Decl) -> bool {
    let ctx = AnalyzerContext::new();
    analyze_program_decl(self, root, &self.global, &ctx);
    self.errors.error_count() == 0
  }

  /// `get_errors() -> sequence of SemanticError`.
  #[must_use] pub fn get_errors(&self) -> Vec<SemanticError> { self.errors.snapshot() }

  /// `resolve_identifier(scope, name) -> SymbolEntry?`.
  #[must_use] pub fn resolve_identifier(&self, scope: &SymbolTable, name: Symbol) -> Option<SymbolEntry> {
    scope.lookup_safe(name)
  }

  /// `get_expression_type(node) -> TypeDescriptor?`.
  #[must_use] pub fn get_expression_type(&self, node: &crate::ast::Expr) -> Option<TypeDescriptor> { node.resolved_type() }

  /// `check_type_compatibility(expected, actual) -> bool`.
  #[must_use] pub fn check_type_compatibility(&self, expected: &TypeDescriptor, actual: &TypeDescriptor) -> bool {
    if expected.is_unknown() || actual.is_unknown() || actual.is_error() || expected.is_error() { return true; }
    if actual.is_never() { return true; }
    expected.equals(actual)
  }

  /// `can_cast(from, to) -> bool`. Numeric kinds cast to numeric kinds;
  /// any pointer casts to any pointer (raw reinterpretation is the caller's
  /// problem, matching the source's permissive `as` semantics); identity
  /// cast always allowed.
  #[must_use] pub fn can_cast(&self, from: &TypeDescriptor, to: &TypeDescriptor) -> bool {
    use crate::types::TypeKind::*;
    if from.equals(to) { return true; }
    match (from.kind(), to.kind()) {
      (Primitive(a), Primitive(b)) => numeric_or_char(*a) && numeric_or_char(*b),
      (Pointer { .. }, Pointer { .. }) => true,
      _ => false,
    }
  }

  pub(crate) fn statistics_snapshot(&self) -> Statistics {
    Statistics {
      declarations_analyzed: self.statistics.declarations_analyzed.load(Ordering::Relaxed),
      expressions_analyzed: self.statistics.expressions_analyzed.load(Ordering::Relaxed),
      errors_reported: self.errors.error_count(),
      warnings_reported: self.errors.warning_count(),
      max_scope_depth: self.statistics.max_scope_depth.load(Ordering::Relaxed),
    }
  }

  #[must_use] pub fn statistics(&self) -> Statistics { self.statistics_snapshot() }
}

fn numeric_or_char(k: PrimitiveKind) -> bool { k.is_integer() || k.is_float() || k == PrimitiveKind::Char }
