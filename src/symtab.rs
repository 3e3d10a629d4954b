//! Hierarchical, thread-safe symbol table: a chain of lexical scopes, each
//! a lock-guarded name-to-entry map, linked to its enclosing parent.

use std::sync::{Arc, RwLock};
use std::sync::atomic::{AtomicU32, Ordering};
use hashbrown::HashMap;

use crate::source::SourceLocation;
use crate::symbol::Symbol;
use crate::types::TypeDescriptor;
use crate::const_eval::ConstValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
  Variable, Parameter, Field, Function, Method, Type, TypeParameter, EnumVariant, Const,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility { Public, Private }

impl From<crate::ast::Visibility> for Visibility {
  fn from(v: crate::ast::Visibility) -> Self {
    match v { crate::ast::Visibility::Public => Visibility::Public, crate::ast::Visibility::Private => Visibility::Private }
  }
}

bitflags::bitflags! {
  #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
  pub struct SymbolFlags: u8 {
    const USED        = 1 << 0;
    const EXPORTED    = 1 << 1;
    const MUTABLE     = 1 << 2;
    const INITIALIZED = 1 << 3;
    const PREDECLARED = 1 << 4;
  }
}

/// A resolved binding for a name.
#[derive(Clone, Debug)]
pub struct SymbolEntry {
  pub name: Symbol,
  pub kind: SymbolKind,
  pub ty: TypeDescriptor,
  pub declared_at: SourceLocation,
  pub scope_id: u32,
  pub visibility: Visibility,
  pub is_generic: bool,
  pub type_param_count: u32,
  pub const_value: Option<ConstValue>,
  flags: SymbolFlags,
}

impl SymbolEntry {
  #[must_use] pub fn new(name: Symbol, kind: SymbolKind, ty: TypeDescriptor, declared_at: SourceLocation, scope_id: u32, visibility: Visibility) -> Self {
    Self {
      name, kind, ty, declared_at, scope_id, visibility,
      is_generic: false, type_param_count: 0, const_value: None,
      flags: SymbolFlags::empty(),
    }
  }

  #[must_use] pub fn predeclared(mut self) -> Self { self.flags |= SymbolFlags::PREDECLARED | SymbolFlags::INITIALIZED; self }
  #[must_use] pub fn mutable(mut self) -> Self { self.flags |= SymbolFlags::MUTABLE; self }
  #[must_use] pub fn initialized(mut self) -> Self { self.flags |= SymbolFlags::INITIALIZED; self }
  #[must_use] pub fn generic(mut self, type_param_count: u32) -> Self { self.is_generic = true; self.type_param_count = type_param_count; self }
  #[must_use] pub fn with_const_value(mut self, value: ConstValue) -> Self { self.const_value = Some(value); self }

  #[must_use] pub fn flags(&self) -> SymbolFlags { self.flags }
  pub fn mark_used(&mut self) { self.flags |= SymbolFlags::USED; }
  #[must_use] pub fn is_used(&self) -> bool { self.flags.contains(SymbolFlags::USED) }
  #[must_use] pub fn is_mutable(&self) -> bool { self.flags.contains(SymbolFlags::MUTABLE) }
  #[must_use] pub fn is_initialized(&self) -> bool { self.flags.contains(SymbolFlags::INITIALIZED) }
  pub fn set_initialized(&mut self) { self.flags |= SymbolFlags::INITIALIZED; }
  #[must_use] pub fn is_predeclared(&self) -> bool { self.flags.contains(SymbolFlags::PREDECLARED) }
}

/// Error returned by `insert_safe` when the name is already bound in the
/// *current* scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateSymbol;

struct ScopeData {
  id: u32,
  parent: Option<Arc<SymbolTable>>,
  entries: RwLock<HashMap<Symbol, SymbolEntry>>,
  aliases: RwLock<HashMap<Symbol, Arc<SymbolTable>>>,
}

/// A single lexical scope, linked to its enclosing parent. Readers take the
/// table's read lock; writers take the write lock.
pub struct SymbolTable(ScopeData);

static NEXT_SCOPE_ID: AtomicU32 = AtomicU32::new(0);

impl SymbolTable {
  #[must_use] pub fn new_root() -> Arc<Self> {
    Arc::new(Self(ScopeData {
      id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
      parent: None,
      entries: RwLock::new(HashMap::new()),
      aliases: RwLock::new(HashMap::new()),
    }))
  }

  /// `enter_scope`: push a new child scope.
  #[must_use] pub fn enter_scope(self: &Arc<Self>) -> Arc<Self> {
    Arc::new(Self(ScopeData {
      id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
      parent: Some(self.clone()),
      entries: RwLock::new(HashMap::new()),
      aliases: RwLock::new(HashMap::new()),
    }))
  }

  #[must_use] pub fn scope_id(&self) -> u32 { self.0.id }
  #[must_use] pub fn parent(&self) -> Option<&Arc<SymbolTable>> { self.0.parent.as_ref() }
  #[must_use] pub fn depth(&self) -> u32 {
    let mut d = 0;
    let mut cur = self.0.parent.as_ref();
    while let Some(p) = cur { d += 1; cur = p.0.parent.as_ref(); }
    d
  }

  /// `insert_safe`: fails with `DuplicateSymbol` if the name already exists
  /// in *this* scope. Parent shadowing is allowed.
  pub fn insert_safe(&self, entry: SymbolEntry) -> Result<(), DuplicateSymbol> {
    let mut entries = self.0.entries.write().expect("symbol table lock poisoned");
    if entries.contains_key(&entry.name) { return Err(DuplicateSymbol); }
    entries.insert(entry.name, entry);
    Ok(())
  }

  /// Unconditional insert used only by the builtin registry at analyzer
  /// construction time, where duplicates are a programming-error bug, not
  /// a user diagnostic.
  pub fn insert_builtin(&self, entry: SymbolEntry) {
    self.0.entries.write().expect("symbol table lock poisoned").insert(entry.name, entry);
  }

  #[must_use] pub fn defined_in_current_scope(&self, name: Symbol) -> bool {
    self.0.entries.read().expect("symbol table lock poisoned").contains_key(&name)
  }

  /// `lookup_local`: does not walk parents.
  #[must_use] pub fn lookup_local(&self, name: Symbol) -> Option<SymbolEntry> {
    self.0.entries.read().expect("symbol table lock poisoned").get(&name).cloned()
  }

  /// `lookup_safe`: walks parents until found or root.
  #[must_use] pub fn lookup_safe(&self, name: Symbol) -> Option<SymbolEntry> {
    if let Some(e) = self.lookup_local(name) { return Some(e); }
    let mut cur = self.0.parent.as_ref();
    while let Some(p) = cur {
      if let Some(e) = p.lookup_local(name) { return Some(e); }
      cur = p.0.parent.as_ref();
    }
    None
  }

  /// Mark a name used, starting the search from this scope outward. A
  /// no-op if the name is not bound anywhere reachable.
  pub fn mark_used(&self, name: Symbol) {
    if self.update_local(name, SymbolEntry::mark_used) { return; }
    let mut cur = self.0.parent.as_ref();
    while let Some(p) = cur {
      if p.update_local(name, SymbolEntry::mark_used) { return; }
      cur = p.0.parent.as_ref();
    }
  }

  /// Mark a name initialized after its first assignment, starting the
  /// search from this scope outward.
  pub fn set_initialized(&self, name: Symbol) {
    if self.update_local(name, SymbolEntry::set_initialized) { return; }
    let mut cur = self.0.parent.as_ref();
    while let Some(p) = cur {
      if p.update_local(name, SymbolEntry::set_initialized) { return; }
      cur = p.0.parent.as_ref();
    }
  }

  fn update_local(&self, name: Symbol, f: impl FnOnce(&mut SymbolEntry)) -> bool {
    let mut entries = self.0.entries.write().expect("symbol table lock poisoned");
    if let Some(e) = entries.get_mut(&name) { f(e); true } else { false }
  }

  /// `add_alias`: maps `import mod as alias` to the module's own table, so
  /// `alias.symbol` resolves through it.
  pub fn add_alias(&self, alias: Symbol, table: Arc<SymbolTable>) {
    self.0.aliases.write().expect("alias table lock poisoned").insert(alias, table);
  }

  #[must_use] pub fn resolve_alias(&self, alias: Symbol) -> Option<Arc<SymbolTable>> {
    self.0.aliases.read().expect("alias table lock poisoned").get(&alias).cloned()
  }

  /// `iterate`: visits entries in this scope only, under the read lock.
  /// `callback` returning `false` stops iteration early. The callback must
  /// not call back into `insert_safe` on this table.
  pub fn iterate(&self, mut callback: impl FnMut(&SymbolEntry) -> bool) {
    let entries = self.0.entries.read().expect("symbol table lock poisoned");
    for entry in entries.values() {
      if !callback(entry) { break; }
    }
  }

  /// All names visible from this scope, walking to the root. Used by the
  /// diagnostics engine's suggestion search.
  #[must_use] pub fn reachable_names(&self) -> Vec<Symbol> {
    let mut names = Vec::new();
    let mut seen = hashbrown::HashSet::new();
    let mut cur = Some(self);
    while let Some(scope) = cur {
      scope.iterate(|e| { if seen.insert(e.name) { names.push(e.name); } true });
      cur = scope.0.parent.as_deref();
    }
    names
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::symbol::intern;
  use crate::types::TypeInterner;

  fn entry(name: &str, ty: TypeDescriptor, scope: u32) -> SymbolEntry {
    SymbolEntry::new(intern(name), SymbolKind::Variable, ty, SourceLocation::builtin(), scope, Visibility::Private)
  }

  #[test]
  fn lookup_walks_parents() {
    let interner = TypeInterner::new();
    let i32t = interner.create_primitive(crate::types::PrimitiveKind::I32);
    let root = SymbolTable::new_root();
    root.insert_safe(entry("x", i32t.clone(), root.scope_id())).unwrap();
    let child = root.enter_scope();
    assert!(child.lookup_local(intern("x")).is_none());
    assert!(child.lookup_safe(intern("x")).is_some());
  }

  #[test]
  fn duplicate_in_same_scope_is_rejected() {
    let interner = TypeInterner::new();
    let i32t = interner.create_primitive(crate::types::PrimitiveKind::I32);
    let root = SymbolTable::new_root();
    root.insert_safe(entry("x", i32t.clone(), root.scope_id())).unwrap();
    assert_eq!(root.insert_safe(entry("x", i32t, root.scope_id())), Err(DuplicateSymbol));
  }

  #[test]
  fn shadowing_in_child_scope_is_allowed() {
    let interner = TypeInterner::new();
    let i32t = interner.create_primitive(crate::types::PrimitiveKind::I32);
    let root = SymbolTable::new_root();
    root.insert_safe(entry("x", i32t.clone(), root.scope_id())).unwrap();
    let child = root.enter_scope();
    assert!(child.insert_safe(entry("x", i32t, child.scope_id())).is_ok());
  }

  #[test]
  fn alias_resolves_to_module_table() {
    let root = SymbolTable::new_root();
    let module = SymbolTable::new_root();
    root.add_alias(intern("m"), module.clone());
    assert_eq!(root.resolve_alias(intern("m")).map(|t| t.scope_id()), Some(module.scope_id()));
  }
}
