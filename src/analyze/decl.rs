//! Declaration analysis.
//!
//! Runs in two passes so forward references resolve regardless of
//! declaration order: pass 1 builds every type shell, then field/variant
//! tables, then function/method signatures; pass 2 walks function and
//! method bodies (which may reference anything pass 1 built) and finally
//! evaluates top-level constants.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use hashbrown::HashSet;
use smallvec::SmallVec;

use crate::analyzer::Analyzer;
use crate::annotations::{validate_site, AnnotationContext, ConcurrencySensitive};
use crate::ast::{Annotation, Decl, DeclKind, Stmt, TypeNode, TypeParam};
use crate::const_eval::{validate_const_type_compatibility, ConstEvaluator, ConstValue};
use crate::diagnostics::SemanticErrorCode;
use crate::resolver::TypeResolver;
use crate::security;
use crate::source::SourceLocation;
use crate::symbol::Symbol;
use crate::symtab::{SymbolEntry, SymbolKind, SymbolTable, Visibility};
use crate::types::{ExternMeta, FieldInfo, MethodInfo, PrimitiveKind, TypeDescriptor, TypeId, TypeKind, VariantInfo};

use super::stmt::{analyze_stmt, contains_spawn};
use super::AnalyzerContext;

/// A function or method body deferred to pass 2, paired with the signature
/// already resolved in pass 1 and the type parameters in scope for it.
type DeferredBody<'a> = (&'a Decl, TypeDescriptor, &'a [TypeParam], &'a Stmt);

pub fn analyze_program_decl(analyzer: &Analyzer, root: &Decl, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext) {
  let DeclKind::Program(decls) = &root.kind else {
    analyzer.errors().report(SemanticErrorCode::Internal, root.location.clone(), "expected a program root".to_owned());
    return;
  };

  let mut struct_shells: Vec<(&Decl, TypeDescriptor)> = Vec::new();
  let mut enum_shells: Vec<(&Decl, TypeDescriptor)> = Vec::new();

  for decl in decls {
    analyzer.statistics.declarations_analyzed.fetch_add(1, Ordering::Relaxed);
    match &decl.kind {
      DeclKind::Import { path, alias } => analyzer.record_import(path.clone(), *alias),
      DeclKind::Struct { name, type_params, visibility, .. } => {
        validate_site(&decl.annotations, AnnotationContext::STRUCT, analyzer.errors(), None);
        let shell = analyzer.interner().create_struct(*name, type_params.iter().map(|p| p.name).collect(), decl.location.clone());
        register_type_shell(analyzer, *name, shell, type_params.len() as u32, *visibility, decl, scope, &mut struct_shells);
      }
      DeclKind::Enum { name, type_params, visibility, .. } => {
        validate_site(&decl.annotations, AnnotationContext::STRUCT, analyzer.errors(), None);
        let shell = analyzer.interner().create_enum(*name, type_params.iter().map(|p| p.name).collect(), decl.location.clone());
        register_type_shell(analyzer, *name, shell, type_params.len() as u32, *visibility, decl, scope, &mut enum_shells);
      }
      _ => {}
    }
  }

  resolve_struct_fields(analyzer, &struct_shells, scope);
  resolve_enum_variants(analyzer, &enum_shells, scope);
  compute_layouts(analyzer, &struct_shells, &enum_shells);

  let mut bodies: Vec<DeferredBody> = Vec::new();

  for decl in decls {
    match &decl.kind {
      DeclKind::Function { name, type_params, params, return_type, body, visibility } => {
        let requires_tier2 = body.as_deref().filter(|b| contains_spawn(b)).map(|_| ConcurrencySensitive::SpawningFunction);
        validate_site(&decl.annotations, AnnotationContext::FUNCTION, analyzer.errors(), requires_tier2);
        let func_ty = build_function_descriptor(analyzer, type_params, params, return_type.as_deref(), None, scope);
        register_callable_symbol(analyzer, *name, SymbolKind::Function, func_ty.clone(), type_params.len() as u32, *visibility, decl.location.clone(), scope);
        if let Some(b) = body {
          bodies.push((decl, func_ty, type_params.as_slice(), b.as_ref()));
        }
      }
      DeclKind::Extern { name, params, return_type, external_name } => {
        validate_site(&decl.annotations, AnnotationContext::FUNCTION, analyzer.errors(), None);
        let ffi_annotations: Vec<Symbol> = decl.annotations.iter().map(|a| a.name)
          .filter(|n| matches!(n.as_str(), "c_abi" | "dll_export" | "dll_import")).collect();
        let extern_meta = ExternMeta { external_name: external_name.clone(), ffi_annotations };
        let func_ty = build_function_descriptor(analyzer, &[], params, return_type.as_deref(), Some(extern_meta), scope);
        register_callable_symbol(analyzer, *name, SymbolKind::Function, func_ty, 0, crate::ast::Visibility::Public, decl.location.clone(), scope);
      }
      DeclKind::Impl { target, methods } => register_impl_block(analyzer, target, methods, decl, scope, &mut bodies),
      _ => {}
    }
  }

  for (decl, func_ty, type_params, body) in bodies {
    analyze_function_body(analyzer, decl, &func_ty, type_params, body, scope, ctx);
  }

  for decl in decls {
    if let DeclKind::Const { name, declared_type, value, visibility } = &decl.kind {
      analyze_const_decl(analyzer, *name, declared_type, value, *visibility, decl, scope);
    }
  }
}

fn register_type_shell(
  analyzer: &Analyzer, name: Symbol, shell: TypeDescriptor, type_param_count: u32, visibility: crate::ast::Visibility,
  decl: &Decl, scope: &Arc<SymbolTable>, shells: &mut Vec<(&Decl, TypeDescriptor)>,
) {
  let mut entry = SymbolEntry::new(name, SymbolKind::Type, shell.clone(), decl.location.clone(), scope.scope_id(), visibility.into());
  if type_param_count > 0 { entry = entry.generic(type_param_count); }
  match scope.insert_safe(entry) {
    Ok(()) => { shells.push((decl, shell)); }
    Err(_) => { analyzer.errors().report(SemanticErrorCode::DuplicateSymbol, decl.location.clone(), format!("`{name}` is already declared")); }
  }
}

fn resolve_struct_fields(analyzer: &Analyzer, shells: &[(&Decl, TypeDescriptor)], scope: &Arc<SymbolTable>) {
  for (decl, shell) in shells {
    let DeclKind::Struct { type_params, fields, .. } = &decl.kind else { continue };
    let sig_scope = make_type_param_scope(analyzer, type_params, scope);
    let resolver = TypeResolver::new(analyzer.interner(), analyzer.errors(), analyzer.pointer_size());
    for field in fields {
      let ty = resolver.resolve(&field.ty, &sig_scope);
      let info = FieldInfo { ty, visibility: field.visibility, declared_at: field.location.clone(), optional: field.optional };
      if !analyzer.interner().add_struct_field(shell, field.name, info) {
        analyzer.errors().report(SemanticErrorCode::DuplicateSymbol, field.location.clone(), format!("field `{}` is already declared", field.name));
      }
    }
  }
}

fn resolve_enum_variants(analyzer: &Analyzer, shells: &[(&Decl, TypeDescriptor)], scope: &Arc<SymbolTable>) {
  for (decl, shell) in shells {
    let DeclKind::Enum { type_params, variants, .. } = &decl.kind else { continue };
    let sig_scope = make_type_param_scope(analyzer, type_params, scope);
    let resolver = TypeResolver::new(analyzer.interner(), analyzer.errors(), analyzer.pointer_size());
    let ed = shell.as_enum().expect("enum shell always carries an EnumDescriptor");
    let mut next_discriminant: i64 = 0;

    for variant in variants {
      let payload = variant.payload.as_ref().map(|p| resolver.resolve(p, &sig_scope));
      let discriminant = match &variant.discriminant {
        Some(expr) => {
          let mut evaluator = ConstEvaluator::new(&sig_scope, analyzer.errors(), analyzer.pointer_size());
          match evaluator.evaluate(expr) {
            Some(ConstValue::Int(v)) => { next_discriminant = v + 1; v }
            Some(_) => {
              analyzer.errors().report(SemanticErrorCode::TypeMismatch, expr.location.clone(), "enum discriminant must be an integer constant".to_owned());
              let v = next_discriminant; next_discriminant += 1; v
            }
            None => { let v = next_discriminant; next_discriminant += 1; v }
          }
        }
        None => { let v = next_discriminant; next_discriminant += 1; v }
      };
      let info = VariantInfo { payload, discriminant, declared_at: variant.location.clone() };
      if !ed.variants.write().expect("variant table lock poisoned").insert(variant.name, info) {
        analyzer.errors().report(SemanticErrorCode::DuplicateSymbol, variant.location.clone(), format!("variant `{}` is already declared", variant.name));
      }
    }
  }
}

/// Compute and store `size`/`align` on every struct and enum shell, once
/// their field/variant tables are fully populated. Struct size is the sum
/// of its field sizes; enum size is the largest variant payload plus a
/// fixed discriminant tag. A field declared `optional` is laid out as a
/// pointer-sized slot regardless of its pointee's layout, which is what
/// keeps mutually-referencing structs (`Node.next: List`, `List.head: Node`,
/// both optional) from requiring each other's size to compute their own.
fn compute_layouts(analyzer: &Analyzer, struct_shells: &[(&Decl, TypeDescriptor)], enum_shells: &[(&Decl, TypeDescriptor)]) {
  let mut in_progress = HashSet::new();
  for (_, shell) in struct_shells.iter().chain(enum_shells.iter()) {
    layout_of(shell, analyzer.pointer_size(), &mut in_progress);
  }
}

/// Discriminant tag width in bytes for every enum; small enough that a
/// real ABI would usually pick something narrower per enum, but fixed here
/// since the analyzer does not track the number of variants against a
/// target's native integer widths.
const ENUM_TAG_SIZE: u32 = 4;

/// Size and alignment of `ty`, laying out and caching any struct/enum shell
/// encountered along the way. `in_progress` breaks cycles formed by a
/// non-optional field whose type transitively contains the struct/enum
/// currently being laid out; such a field falls back to pointer size
/// rather than recursing forever.
fn layout_of(ty: &TypeDescriptor, pointer_size: u32, in_progress: &mut HashSet<TypeId>) -> (u32, u32) {
  match ty.kind() {
    TypeKind::Primitive(k) => { let size = k.size(); (size, size.max(1)) }
    TypeKind::Pointer { .. } => (pointer_size, pointer_size),
    // Bare slices are unsized; a slice only has a concrete layout behind a
    // pointer, where it is represented as a data pointer plus a length.
    TypeKind::Slice { .. } => (pointer_size.saturating_mul(2), pointer_size),
    TypeKind::Array { element, length } => {
      let (elem_size, elem_align) = layout_of(element, pointer_size, in_progress);
      let len = u32::try_from(*length).unwrap_or(u32::MAX);
      (elem_size.saturating_mul(len), elem_align.max(1))
    }
    TypeKind::Struct(s) => {
      if !in_progress.insert(s.type_id) { return (pointer_size, pointer_size); }
      let mut size = 0u32;
      let mut align = 1u32;
      {
        let fields = s.fields.read().expect("field table lock poisoned");
        for (_, field) in fields.iter() {
          let (field_size, field_align) = if field.optional {
            (pointer_size, pointer_size)
          } else {
            layout_of(&field.ty, pointer_size, in_progress)
          };
          size = size.saturating_add(field_size);
          align = align.max(field_align);
        }
      }
      in_progress.remove(&s.type_id);
      ty.set_layout(size, align);
      (size, align)
    }
    TypeKind::Enum(e) => {
      if !in_progress.insert(e.type_id) { return (pointer_size, pointer_size); }
      let mut payload_size = 0u32;
      let mut align = ENUM_TAG_SIZE;
      {
        let variants = e.variants.read().expect("variant table lock poisoned");
        for (_, variant) in variants.iter() {
          if let Some(payload) = &variant.payload {
            let (p_size, p_align) = layout_of(payload, pointer_size, in_progress);
            payload_size = payload_size.max(p_size);
            align = align.max(p_align);
          }
        }
      }
      in_progress.remove(&e.type_id);
      let size = ENUM_TAG_SIZE.saturating_add(payload_size);
      ty.set_layout(size, align);
      (size, align)
    }
    // Not laid out independently of their base; an instantiated generic's
    // layout depends on substituted type arguments this pass does not
    // track (see the generic-instantiation note in DESIGN.md).
    TypeKind::GenericInstance(g) => layout_of(&g.base, pointer_size, in_progress),
    _ => (pointer_size, pointer_size),
  }
}

fn make_type_param_scope(analyzer: &Analyzer, type_params: &[TypeParam], parent: &Arc<SymbolTable>) -> Arc<SymbolTable> {
  let child = parent.enter_scope();
  for tp in type_params {
    let param_ty = analyzer.interner().create_param(tp.name);
    let entry = SymbolEntry::new(tp.name, SymbolKind::TypeParameter, param_ty, tp.location.clone(), child.scope_id(), Visibility::Private);
    if child.insert_safe(entry).is_err() {
      analyzer.errors().report(SemanticErrorCode::DuplicateSymbol, tp.location.clone(), format!("type parameter `{}` is already declared", tp.name));
    }
  }
  child
}

/// Resolve a function/method/extern signature into a [`TypeDescriptor`],
/// validating parameter and return-type annotations along the way.
/// `PARAMETER`/`RETURN_TYPE` sites live on the type node itself, since the
/// AST attaches no separate annotation slot to a bare parameter or return
/// arrow.
fn build_function_descriptor(
  analyzer: &Analyzer, type_params: &[TypeParam], params: &[crate::ast::ParamDecl], return_type: Option<&TypeNode>,
  extern_meta: Option<ExternMeta>, scope: &Arc<SymbolTable>,
) -> TypeDescriptor {
  let sig_scope = make_type_param_scope(analyzer, type_params, scope);
  let resolver = TypeResolver::new(analyzer.interner(), analyzer.errors(), analyzer.pointer_size());

  for p in params {
    validate_site(&p.ty.annotations, AnnotationContext::PARAMETER, analyzer.errors(), None);
  }
  if let Some(rt) = return_type {
    validate_site(&rt.annotations, AnnotationContext::RETURN_TYPE, analyzer.errors(), None);
  }

  let param_tys: SmallVec<[TypeDescriptor; 4]> = params.iter().map(|p| resolver.resolve(&p.ty, &sig_scope)).collect();
  for (p, ty) in params.iter().zip(&param_tys) {
    check_ffi_transfer_dependency(analyzer, &p.ty.annotations, ty, &p.ty.location);
  }

  let ret_ty = return_type.map_or_else(|| analyzer.interner().create_primitive(PrimitiveKind::Void), |t| resolver.resolve(t, &sig_scope));
  if let Some(rt) = return_type {
    check_ffi_transfer_dependency(analyzer, &rt.annotations, &ret_ty, &rt.location);
  }

  let requires_marshaling = extern_meta.is_some() && (param_tys.iter().any(is_marshal_sensitive) || is_marshal_sensitive(&ret_ty));
  analyzer.interner().create_function(param_tys, ret_ty, extern_meta, requires_marshaling)
}

/// `string` is a fat pointer at the source level; crossing an `extern`
/// boundary with one needs marshaling, unlike the fixed-width primitives
/// and raw pointers that map directly onto a C ABI.
fn is_marshal_sensitive(ty: &TypeDescriptor) -> bool {
  matches!(ty.kind(), TypeKind::Primitive(PrimitiveKind::String))
}

/// Dependency step of the annotation pipeline:
/// `transfer_full`/`transfer_none`/`borrowed` only make sense on a
/// pointer-typed parameter or return value.
fn check_ffi_transfer_dependency(analyzer: &Analyzer, annotations: &[Annotation], ty: &TypeDescriptor, at: &SourceLocation) {
  for ann in annotations {
    if matches!(ann.name.as_str(), "transfer_full" | "transfer_none" | "borrowed") && !ty.is_error() && !matches!(ty.kind(), TypeKind::Pointer { .. }) {
      analyzer.errors().report(SemanticErrorCode::InvalidAnnotationContext, at.clone(), format!("`{}` requires a pointer-typed parameter or return type", ann.name));
    }
  }
}

fn register_callable_symbol(
  analyzer: &Analyzer, name: Symbol, kind: SymbolKind, ty: TypeDescriptor, type_param_count: u32,
  visibility: crate::ast::Visibility, at: SourceLocation, scope: &Arc<SymbolTable>,
) {
  let mut entry = SymbolEntry::new(name, kind, ty, at.clone(), scope.scope_id(), visibility.into());
  if type_param_count > 0 { entry = entry.generic(type_param_count); }
  if scope.insert_safe(entry).is_err() {
    analyzer.errors().report(SemanticErrorCode::DuplicateSymbol, at, format!("`{name}` is already declared"));
  }
}

fn register_impl_block<'a>(
  analyzer: &Analyzer, target: &TypeNode, methods: &'a [Decl], decl: &Decl, scope: &Arc<SymbolTable>, bodies: &mut Vec<DeferredBody<'a>>,
) {
  let resolver = TypeResolver::new(analyzer.interner(), analyzer.errors(), analyzer.pointer_size());
  let target_ty = resolver.resolve(target, scope);
  let Some(_) = target_ty.as_struct() else {
    if !target_ty.is_error() {
      analyzer.errors().report(SemanticErrorCode::InvalidDeclaration, decl.location.clone(), format!("`impl` target `{}` is not a struct", target_ty.display_name()));
    }
    return;
  };

  for method in methods {
    let DeclKind::Method { name, type_params, params, return_type, body, .. } = &method.kind else { continue };
    let requires_tier2 = body.as_deref().filter(|b| contains_spawn(b)).map(|_| ConcurrencySensitive::SpawningFunction);
    validate_site(&method.annotations, AnnotationContext::FUNCTION, analyzer.errors(), requires_tier2);
    let method_ty = build_function_descriptor(analyzer, type_params, params, return_type.as_deref(), None, scope);

    let info = MethodInfo { ty: method_ty.clone(), declared_at: method.location.clone() };
    if !analyzer.interner().add_struct_method(&target_ty, *name, info) {
      analyzer.errors().report(SemanticErrorCode::DuplicateSymbol, method.location.clone(), format!("method `{name}` is already declared on `{}`", target_ty.display_name()));
    }
    if let Some(b) = body {
      bodies.push((method, method_ty, type_params.as_slice(), b.as_ref()));
    }
  }
}

fn analyze_function_body(
  analyzer: &Analyzer, decl: &Decl, func_ty: &TypeDescriptor, type_params: &[TypeParam], body: &Stmt, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext,
) {
  let Some(func) = func_ty.as_function() else { return };
  let (DeclKind::Function { name, params, .. } | DeclKind::Method { name, params, .. }) = &decl.kind else { return };

  let sig_scope = make_type_param_scope(analyzer, type_params, scope);
  let fn_scope = sig_scope.enter_scope();

  for (p, ty) in params.iter().zip(&func.params) {
    let mut entry = SymbolEntry::new(p.name, SymbolKind::Parameter, ty.clone(), p.location.clone(), fn_scope.scope_id(), Visibility::Private).initialized();
    if p.mutable { entry = entry.mutable(); }
    if fn_scope.insert_safe(entry).is_err() {
      analyzer.errors().report(SemanticErrorCode::DuplicateSymbol, p.location.clone(), format!("parameter `{}` is already declared", p.name));
    }
  }

  ctx.loop_depth.set(0);
  ctx.in_unsafe.set(false);
  ctx.in_unreachable.set(false);
  ctx.current_function_return.set(Some(func.ret.clone()));
  let is_constant_time = decl.has_annotation(crate::symbol::intern("constant_time"));
  ctx.in_constant_time.set(is_constant_time);

  let diverges = analyze_stmt(analyzer, body, &fn_scope, ctx);
  let ret_needs_value = !matches!(func.ret.kind(), TypeKind::Primitive(PrimitiveKind::Void | PrimitiveKind::Never));
  if ret_needs_value && !diverges {
    analyzer.errors().report(
      SemanticErrorCode::MissingReturn,
      decl.location.clone(),
      format!("function `{name}` does not return a value of type `{}` on every path", func.ret.display_name()),
    );
  }

  if is_constant_time {
    security::check_constant_time_stmt(body, analyzer.errors());
  }
  ctx.current_function_return.set(None);
}

fn analyze_const_decl(
  analyzer: &Analyzer, name: Symbol, declared_type: &TypeNode, value: &crate::ast::Expr, visibility: crate::ast::Visibility, decl: &Decl, scope: &Arc<SymbolTable>,
) {
  validate_site(&decl.annotations, AnnotationContext::STRUCT, analyzer.errors(), None);

  let resolver = TypeResolver::new(analyzer.interner(), analyzer.errors(), analyzer.pointer_size());
  let ty = resolver.resolve(declared_type, scope);

  let mut evaluator = ConstEvaluator::new(scope, analyzer.errors(), analyzer.pointer_size());
  let const_value = evaluator.evaluate_named(name, value);

  if let (Some(v), TypeKind::Primitive(k)) = (&const_value, ty.kind()) {
    if let Err(msg) = validate_const_type_compatibility(*k, v) {
      analyzer.errors().report(SemanticErrorCode::TypeMismatch, value.location.clone(), msg);
    }
  }

  let mut entry = SymbolEntry::new(name, SymbolKind::Const, ty, decl.location.clone(), scope.scope_id(), visibility.into());
  if let Some(v) = const_value { entry = entry.with_const_value(v); }
  if scope.insert_safe(entry).is_err() {
    analyzer.errors().report(SemanticErrorCode::DuplicateSymbol, decl.location.clone(), format!("`{name}` is already declared"));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::analyzer::Analyzer;
  use crate::ast::{AstNode, Expr, ExprKind, FieldDecl, ParamDecl, Pattern, StmtKind};
  use crate::config::AnalyzerConfig;
  use crate::source::SourceFile;
  use crate::symbol::intern;

  fn loc() -> SourceLocation { SourceLocation::new(SourceFile::new("t.lang"), 1, 1, 0) }

  fn base_type(name: &str) -> TypeNode { AstNode::new(loc(), crate::ast::TypeNodeKind::Base { name: intern(name), args: vec![] }) }

  #[test]
  fn struct_fields_reference_each_other_regardless_of_order() {
    let analyzer = Analyzer::new(AnalyzerConfig::default());
    let ctx = AnalyzerContext::new();

    let node_struct = Decl::new(loc(), DeclKind::Struct {
      name: intern("Node"),
      type_params: vec![],
      fields: vec![FieldDecl { name: intern("next"), ty: base_type("List"), visibility: crate::ast::Visibility::Public, optional: true, location: loc() }],
      visibility: crate::ast::Visibility::Public,
    });
    let list_struct = Decl::new(loc(), DeclKind::Struct {
      name: intern("List"),
      type_params: vec![],
      fields: vec![FieldDecl { name: intern("head"), ty: base_type("Node"), visibility: crate::ast::Visibility::Public, optional: true, location: loc() }],
      visibility: crate::ast::Visibility::Public,
    });
    let program = Decl::new(loc(), DeclKind::Program(vec![node_struct, list_struct]));

    analyze_program_decl(&analyzer, &program, analyzer.global_scope(), &ctx);
    assert!(analyzer.get_errors().is_empty());
  }

  #[test]
  fn duplicate_function_is_rejected() {
    let analyzer = Analyzer::new(AnalyzerConfig::default());
    let ctx = AnalyzerContext::new();
    let make_fn = || Decl::new(loc(), DeclKind::Function {
      name: intern("go"), type_params: vec![], params: vec![], return_type: None, body: None, visibility: crate::ast::Visibility::Public,
    });
    let program = Decl::new(loc(), DeclKind::Program(vec![make_fn(), make_fn()]));
    analyze_program_decl(&analyzer, &program, analyzer.global_scope(), &ctx);
    assert_eq!(analyzer.get_errors().len(), 1);
  }

  #[test]
  fn function_body_sees_its_own_parameter() {
    let analyzer = Analyzer::new(AnalyzerConfig::default());
    let ctx = AnalyzerContext::new();
    let param = ParamDecl { name: intern("x"), ty: base_type("i32"), mutable: false, location: loc() };
    let body = Stmt::new(loc(), StmtKind::Return { value: Some(Box::new(Expr::new(loc(), ExprKind::Identifier(intern("x"))))) });
    let func = Decl::new(loc(), DeclKind::Function {
      name: intern("id"), type_params: vec![], params: vec![param], return_type: Some(Box::new(base_type("i32"))),
      body: Some(Box::new(body)), visibility: crate::ast::Visibility::Public,
    });
    let program = Decl::new(loc(), DeclKind::Program(vec![func]));
    analyze_program_decl(&analyzer, &program, analyzer.global_scope(), &ctx);
    assert!(analyzer.get_errors().is_empty(), "{:?}", analyzer.get_errors());
  }

  #[test]
  fn impl_method_registers_on_struct() {
    let analyzer = Analyzer::new(AnalyzerConfig::default());
    let ctx = AnalyzerContext::new();
    let point = Decl::new(loc(), DeclKind::Struct { name: intern("Point"), type_params: vec![], fields: vec![], visibility: crate::ast::Visibility::Public });
    let method = Decl::new(loc(), DeclKind::Method {
      name: intern("zero"), type_params: vec![], params: vec![], return_type: None,
      body: Some(Box::new(Stmt::new(loc(), StmtKind::Block(vec![])))), visibility: crate::ast::Visibility::Public,
    });
    let impl_block = Decl::new(loc(), DeclKind::Impl { target: base_type("Point"), methods: vec![method] });
    let program = Decl::new(loc(), DeclKind::Program(vec![point, impl_block]));
    analyze_program_decl(&analyzer, &program, analyzer.global_scope(), &ctx);
    assert!(analyzer.get_errors().is_empty(), "{:?}", analyzer.get_errors());

    let entry = analyzer.global_scope().lookup_local(intern("Point")).unwrap();
    assert!(analyzer.interner().lookup_struct_method(&entry.ty, intern("zero")).is_some());
  }

  #[test]
  fn const_self_reference_is_rejected() {
    let analyzer = Analyzer::new(AnalyzerConfig::default());
    let ctx = AnalyzerContext::new();
    let value = Expr::new(loc(), ExprKind::Identifier(intern("X")));
    let decl = Decl::new(loc(), DeclKind::Const { name: intern("X"), declared_type: Box::new(base_type("i32")), value: Box::new(value), visibility: crate::ast::Visibility::Public });
    let program = Decl::new(loc(), DeclKind::Program(vec![decl]));
    analyze_program_decl(&analyzer, &program, analyzer.global_scope(), &ctx);
    assert_eq!(analyzer.get_errors().len(), 1);
    assert_eq!(analyzer.get_errors()[0].code, SemanticErrorCode::CircularDependency);
  }

  #[test]
  fn missing_tier2_annotation_on_spawning_function_is_reported() {
    let analyzer = Analyzer::new(AnalyzerConfig::default());
    let ctx = AnalyzerContext::new();
    let body = Stmt::new(loc(), StmtKind::Block(vec![
      Stmt::new(loc(), StmtKind::Spawn { body: Box::new(Expr::new(loc(), ExprKind::UnitLiteral)) }),
    ]));
    let func = Decl::new(loc(), DeclKind::Function {
      name: intern("launch"), type_params: vec![], params: vec![], return_type: None, body: Some(Box::new(body)), visibility: crate::ast::Visibility::Public,
    });
    let program = Decl::new(loc(), DeclKind::Program(vec![func]));
    analyze_program_decl(&analyzer, &program, analyzer.global_scope(), &ctx);
    assert!(analyzer.get_errors().iter().any(|e| e.code == SemanticErrorCode::MissingAnnotation));
    let _ = Pattern::Wildcard;
  }
}
