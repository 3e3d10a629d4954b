//! The type resolver.
//!
//! Maps a type-level AST node to a retained [`TypeDescriptor`], instantiating
//! generics and reporting `UndefinedType`/`InvalidType` along the way.

use smallvec::SmallVec;

use crate::ast::{TypeNode, TypeNodeKind};
use crate::const_eval::{ConstEvaluator, ConstValue};
use crate::diagnostics::{ErrorList, SemanticErrorCode};
use crate::symtab::{SymbolKind, SymbolTable};
use crate::types::{PrimitiveKind, TypeDescriptor, TypeInterner};

pub struct TypeResolver<'a> {
  interner: &'a TypeInterner,
  errors: &'a ErrorList,
  pointer_size: u32,
}

impl<'a> TypeResolver<'a> {
  #[must_use] pub fn new(interner: &'a TypeInterner, errors: &'a ErrorList, pointer_size: u32) -> Self {
    Self { interner, errors, pointer_size }
  }

  /// Resolve a type-level AST node against `scope`. Returns the `error`
  /// descriptor (not `None`) on failure, so callers can keep descending
  /// without matching on an `Option` at every step.
  pub fn resolve(&self, node: &TypeNode, scope: &SymbolTable) -> TypeDescriptor {
    let resolved = self.resolve_inner(node, scope);
    node.set_resolved_type(resolved.clone());
    resolved
  }

  fn resolve_inner(&self, node: &TypeNode, scope: &SymbolTable) -> TypeDescriptor {
    match &node.kind {
      TypeNodeKind::Base { name, args } => self.resolve_named(*name, args, scope, node),
      TypeNodeKind::Struct { name, args } | TypeNodeKind::Enum { name, args } => self.resolve_named(*name, args, scope, node),
      TypeNodeKind::Slice { element } => self.interner.create_slice(self.resolve(element, scope)),
      TypeNodeKind::Array { element, size } => self.resolve_array(element, size, scope),
      TypeNodeKind::Pointer { pointee, mutable } => self.interner.create_pointer(self.resolve(pointee, scope), *mutable),
      TypeNodeKind::Result { ok, err } => self.interner.create_result(self.resolve(ok, scope), self.resolve(err, scope)),
      TypeNodeKind::Tuple { elements } => {
        if elements.len() < 2 {
          self.errors.report(SemanticErrorCode::InvalidType, node.location.clone(), "tuple types require at least 2 elements".to_owned());
          return self.interner.error();
        }
        let resolved: SmallVec<[TypeDescriptor; 4]> = elements.iter().map(|e| self.resolve(e, scope)).collect();
        self.interner.create_tuple(resolved)
      }
    }
  }

  fn resolve_named(&self, name: crate::symbol::Symbol, args: &[TypeNode], scope: &SymbolTable, node: &TypeNode) -> TypeDescriptor {
    if let Some(kind) = PrimitiveKind::from_name(name.as_str()) {
      if !args.is_empty() {
        self.errors.report(SemanticErrorCode::InvalidType, node.location.clone(), format!("`{}` is not generic", kind.name()));
        return self.interner.error();
      }
      return self.interner.create_primitive(kind);
    }

    let Some(entry) = scope.lookup_safe(name) else {
      let suggestions = crate::diagnostics::suggest_names(name.as_str(), scope.reachable_names());
      self.errors.report_with_suggestions(SemanticErrorCode::UndefinedType, node.location.clone(), format!("undefined type `{name}`"), suggestions);
      return self.interner.error();
    };

    if entry.kind == SymbolKind::TypeParameter {
      return entry.ty;
    }

    if entry.kind != SymbolKind::Type {
      self.errors.report(SemanticErrorCode::UndefinedType, node.location.clone(), format!("`{name}` is not a type"));
      return self.interner.error();
    }

    match (entry.is_generic, args.is_empty()) {
      (false, false) => {
        self.errors.report(SemanticErrorCode::InvalidType, node.location.clone(), format!("`{name}` is not generic"));
        self.interner.error()
      }
      (true, true) => {
        self.errors.report(SemanticErrorCode::InvalidType, node.location.clone(), format!("`{name}` requires type arguments"));
        self.interner.error()
      }
      (false, true) => entry.ty,
      (true, false) => {
        if args.len() as u32 != entry.type_param_count {
          self.errors.report(
            SemanticErrorCode::InvalidType,
            node.location.clone(),
            format!("`{name}` expects {} type argument(s), found {}", entry.type_param_count, args.len()),
          );
          return self.interner.error();
        }
        let resolved_args: SmallVec<[TypeDescriptor; 2]> = args.iter().map(|a| self.resolve(a, scope)).collect();
        self.interner.create_generic_instance(entry.ty, resolved_args).unwrap_or_else(|_| self.interner.error())
      }
    }
  }

  fn resolve_array(&self, element: &crate::ast::TypeNode, size: &crate::ast::Expr, scope: &SymbolTable) -> TypeDescriptor {
    let element_ty = self.resolve(element, scope);
    let mut evaluator = ConstEvaluator::new(scope, self.errors, self.pointer_size);
    let Some(value) = evaluator.evaluate(size) else { return self.interner.error() };
    let ConstValue::Int(len) = value else {
      self.errors.report(SemanticErrorCode::InvalidType, size.location.clone(), "array size must be an integer constant".to_owned());
      return self.interner.error();
    };
    if len < 1 {
      self.errors.report(SemanticErrorCode::InvalidType, size.location.clone(), format!("array size must be at least 1, found {len}"));
      return self.interner.error();
    }
    self.interner.create_array(element_ty, len as u64)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ast::AstNode;
  use crate::source::SourceLocation;
  use crate::symbol::intern;
  use crate::symtab::{SymbolEntry, Visibility};

  fn base(name: &str, args: Vec<TypeNode>) -> TypeNode {
    AstNode::new(SourceLocation::builtin(), TypeNodeKind::Base { name: intern(name), args })
  }

  #[test]
  fn resolves_primitive() {
    let interner = TypeInterner::new();
    let errors = ErrorList::new(100);
    let scope = SymbolTable::new_root();
    let resolver = TypeResolver::new(&interner, &errors, 8);
    let node = base("i32", vec![]);
    let ty = resolver.resolve(&node, &scope);
    assert!(matches!(ty.kind(), crate::types::TypeKind::Primitive(PrimitiveKind::I32)));
    assert!(errors.is_empty());
  }

  #[test]
  fn undefined_type_reports_with_suggestion() {
    let interner = TypeInterner::new();
    let errors = ErrorList::new(100);
    let scope = SymbolTable::new_root();
    let struct_ty = interner.create_struct(intern("Widget"), vec![], SourceLocation::builtin());
    scope.insert_safe(SymbolEntry::new(intern("Widget"), SymbolKind::Type, struct_ty, SourceLocation::builtin(), scope.scope_id(), Visibility::Public)).unwrap();
    let resolver = TypeResolver::new(&interner, &errors, 8);
    let node = base("Widgt", vec![]);
    let ty = resolver.resolve(&node, &scope);
    assert!(ty.is_error());
    assert_eq!(errors.len(), 1);
  }

  #[test]
  fn generic_without_arguments_is_invalid() {
    let interner = TypeInterner::new();
    let errors = ErrorList::new(100);
    let scope = SymbolTable::new_root();
    let vec_ty = interner.create_struct(intern("Vec"), vec![intern("T")], SourceLocation::builtin());
    scope.insert_safe(
      SymbolEntry::new(intern("Vec"), SymbolKind::Type, vec_ty, SourceLocation::builtin(), scope.scope_id(), Visibility::Public).generic(1),
    ).unwrap();
    let resolver = TypeResolver::new(&interner, &errors, 8);
    let node = base("Vec", vec![]);
    let ty = resolver.resolve(&node, &scope);
    assert!(ty.is_error());
    assert_eq!(errors.len(), 1);
  }
}
