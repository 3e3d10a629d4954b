//! Expression analysis.
//!
//! Every function here both returns the resolved [`TypeDescriptor`] and
//! attaches it to the node via [`crate::ast::AstNode::set_resolved_type`],
//! so a caller that only cares about side effects (e.g. a statement that
//! discards an expression's value) can call [`analyze_expr`] and ignore the
//! return value without losing the annotation.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use if_chain::if_chain;

use crate::analyzer::Analyzer;
use crate::ast::{BinOp, Expr, ExprKind, UnOp};
use crate::diagnostics::SemanticErrorCode;
use crate::resolver::TypeResolver;
use crate::security;
use crate::symbol::Symbol;
use crate::symtab::{SymbolKind, SymbolTable};
use crate::types::{PrimitiveKind, TypeDescriptor, TypeKind};

use super::AnalyzerContext;

pub fn analyze_expr(analyzer: &Analyzer, expr: &Expr, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext) -> TypeDescriptor {
  analyzer.statistics.expressions_analyzed.fetch_add(1, Ordering::Relaxed);
  let ty = analyze_expr_inner(analyzer, expr, scope, ctx);
  expr.set_resolved_type(ty.clone());
  ty
}

fn analyze_expr_inner(analyzer: &Analyzer, expr: &Expr, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext) -> TypeDescriptor {
  match &expr.kind {
    ExprKind::IntLiteral(_) => integer_literal_type(analyzer, ctx),
    ExprKind::FloatLiteral(_) => float_literal_type(analyzer, ctx),
    ExprKind::StringLiteral(_) => analyzer.interner().create_primitive(PrimitiveKind::String),
    ExprKind::BoolLiteral(_) => analyzer.interner().create_primitive(PrimitiveKind::Bool),
    ExprKind::CharLiteral(_) => analyzer.interner().create_primitive(PrimitiveKind::Char),
    // `char` in the AST is already a valid Unicode scalar value, so rejecting
    // invalid code points is enforced for free by the host type the parser
    // hands us.
    ExprKind::UnitLiteral => analyzer.interner().create_primitive(PrimitiveKind::Void),
    ExprKind::Identifier(name) => analyze_identifier(analyzer, *name, expr, scope),
    ExprKind::Binary { op, left, right } => analyze_binary(analyzer, *op, left, right, expr, scope, ctx),
    ExprKind::Unary { op, operand } => analyze_unary(analyzer, *op, operand, expr, scope, ctx),
    ExprKind::Cast { expr: inner, ty } => analyze_cast(analyzer, inner, ty, expr, scope, ctx),
    ExprKind::Call { callee, type_args, args } => analyze_call(analyzer, callee, type_args, args, expr, scope, ctx),
    ExprKind::AssociatedFuncCall { base, method, type_args, args } =>
      analyze_associated_call(analyzer, base, *method, type_args, args, expr, scope, ctx),
    ExprKind::FieldAccess { base, field } => analyze_field_access(analyzer, base, *field, expr, scope, ctx),
    ExprKind::IndexAccess { base, index } => analyze_index_access(analyzer, base, index, expr, scope, ctx),
    ExprKind::StructLiteral { ty, fields } => analyze_struct_literal(analyzer, ty, fields, expr, scope, ctx),
    ExprKind::EnumVariant { ty, variant, payload } => analyze_enum_variant(analyzer, ty.as_deref(), *variant, payload.as_deref(), expr, scope, ctx),
    ExprKind::TupleLiteral(elems) => analyze_tuple_literal(analyzer, elems, scope, ctx),
    ExprKind::ArrayLiteral(elems) => analyze_array_literal(analyzer, elems, expr, scope, ctx),
  }
}

/// Integer literals take their type from the expected context when it is an
/// integer primitive; otherwise they default to `i32`.
fn integer_literal_type(analyzer: &Analyzer, ctx: &AnalyzerContext) -> TypeDescriptor {
  if let Some(expected) = ctx.expected_type() {
    if let TypeKind::Primitive(k) = expected.kind() {
      if k.is_integer() { return expected; }
    }
  }
  analyzer.interner().create_primitive(PrimitiveKind::I32)
}

fn float_literal_type(analyzer: &Analyzer, ctx: &AnalyzerContext) -> TypeDescriptor {
  if let Some(expected) = ctx.expected_type() {
    if let TypeKind::Primitive(k) = expected.kind() {
      if k.is_float() { return expected; }
    }
  }
  analyzer.interner().create_primitive(PrimitiveKind::F64)
}

fn analyze_identifier(analyzer: &Analyzer, name: Symbol, expr: &Expr, scope: &Arc<SymbolTable>) -> TypeDescriptor {
  let Some(entry) = scope.lookup_safe(name) else {
    let suggestions = crate::diagnostics::suggest_names(name.as_str(), scope.reachable_names());
    analyzer.errors().report_with_suggestions(SemanticErrorCode::UndefinedSymbol, expr.location.clone(), format!("undefined symbol `{name}`"), suggestions);
    return analyzer.interner().error();
  };
  scope.mark_used(name);
  if entry.kind == SymbolKind::Variable && !entry.is_initialized() {
    analyzer.errors().report(SemanticErrorCode::UninitializedVariable, expr.location.clone(), format!("`{name}` is used before being initialized"));
  }
  entry.ty
}

fn analyze_binary(
  analyzer: &Analyzer, op: BinOp, left: &Expr, right: &Expr, expr: &Expr, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext,
) -> TypeDescriptor {
  let lt = analyze_expr(analyzer, left, scope, ctx);
  let rt = analyze_expr(analyzer, right, scope, ctx);
  if lt.is_error() || rt.is_error() { return analyzer.interner().error(); }

  if op.is_div_or_mod() {
    if let ExprKind::IntLiteral(0) = right.kind {
      analyzer.errors().report(SemanticErrorCode::DivisionByZero, expr.location.clone(), "division by zero".to_owned());
      return analyzer.interner().error();
    }
  }

  if op.is_logical() {
    let bool_ty = analyzer.interner().create_primitive(PrimitiveKind::Bool);
    if !lt.equals(&bool_ty) || !rt.equals(&bool_ty) {
      analyzer.errors().report(SemanticErrorCode::TypeMismatch, expr.location.clone(), "logical operators require bool operands".to_owned());
      return analyzer.interner().error();
    }
    return bool_ty;
  }

  if !analyzer.check_type_compatibility(&lt, &rt) && !analyzer.check_type_compatibility(&rt, &lt) {
    analyzer.errors().report(
      SemanticErrorCode::TypeMismatch,
      expr.location.clone(),
      format!("cannot apply `{op:?}` to `{}` and `{}`", lt.display_name(), rt.display_name()),
    );
    return analyzer.interner().error();
  }

  if op.is_comparison() { return analyzer.interner().create_primitive(PrimitiveKind::Bool); }

  if op.is_bitwise() {
    if !matches!(lt.kind(), TypeKind::Primitive(k) if k.is_integer()) {
      analyzer.errors().report(SemanticErrorCode::TypeMismatch, expr.location.clone(), "bitwise/shift operators require integer operands".to_owned());
      return analyzer.interner().error();
    }
  }

  lt
}

fn analyze_unary(analyzer: &Analyzer, op: UnOp, operand: &Expr, expr: &Expr, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext) -> TypeDescriptor {
  let ty = analyze_expr(analyzer, operand, scope, ctx);
  if ty.is_error() { return ty; }
  let ok = match (op, ty.kind()) {
    (UnOp::Neg, TypeKind::Primitive(k)) => k.is_integer() || k.is_float(),
    (UnOp::Not, TypeKind::Primitive(PrimitiveKind::Bool)) => true,
    (UnOp::BitNot, TypeKind::Primitive(k)) => k.is_integer(),
    _ => false,
  };
  if !ok {
    analyzer.errors().report(SemanticErrorCode::TypeMismatch, expr.location.clone(), format!("unary operator not defined for `{}`", ty.display_name()));
    return analyzer.interner().error();
  }
  if op == UnOp::Not { analyzer.interner().create_primitive(PrimitiveKind::Bool) } else { ty }
}

fn analyze_cast(
  analyzer: &Analyzer, inner: &Expr, ty_node: &crate::ast::TypeNode, expr: &Expr, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext,
) -> TypeDescriptor {
  let from = analyze_expr(analyzer, inner, scope, ctx);
  let resolver = TypeResolver::new(analyzer.interner(), analyzer.errors(), analyzer.pointer_size());
  let to = resolver.resolve(ty_node, scope);
  if from.is_error() || to.is_error() { return analyzer.interner().error(); }
  if !analyzer.can_cast(&from, &to) {
    analyzer.errors().report(
      SemanticErrorCode::MismatchedTypes,
      expr.location.clone(),
      format!("cannot cast `{}` as `{}`", from.display_name(), to.display_name()),
    );
    return analyzer.interner().error();
  }
  to
}

fn analyze_call(
  analyzer: &Analyzer, callee: &Expr, type_args: &[crate::ast::TypeNode], args: &[Expr], expr: &Expr, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext,
) -> TypeDescriptor {
  if let ExprKind::Identifier(name) = &callee.kind {
    if name.as_str() == "sizeof" {
      callee.set_resolved_type(analyzer.interner().unknown());
      for a in args { analyze_expr(analyzer, a, scope, ctx); }
      return analyzer.interner().create_primitive(PrimitiveKind::Usize);
    }
  }

  let callee_ty = analyze_expr(analyzer, callee, scope, ctx);
  if callee_ty.is_error() { for a in args { analyze_expr(analyzer, a, scope, ctx); } return callee_ty; }

  let Some(func) = callee_ty.as_function() else {
    analyzer.errors().report(SemanticErrorCode::NotCallable, expr.location.clone(), format!("`{}` is not callable", callee_ty.display_name()));
    for a in args { analyze_expr(analyzer, a, scope, ctx); }
    return analyzer.interner().error();
  };

  let resolver = TypeResolver::new(analyzer.interner(), analyzer.errors(), analyzer.pointer_size());
  for t in type_args { resolver.resolve(t, scope); }

  if args.len() != func.params.len() {
    analyzer.errors().report(
      SemanticErrorCode::MismatchedTypes,
      expr.location.clone(),
      format!("expected {} argument(s), found {}", func.params.len(), args.len()),
    );
    for a in args { analyze_expr(analyzer, a, scope, ctx); }
    return func.ret.clone();
  }

  for (arg, param_ty) in args.iter().zip(&func.params) {
    let arg_ty = ctx.with_expected(Some(param_ty.clone()), || analyze_expr(analyzer, arg, scope, ctx));
    // A `Param(_)` leaf in an unsubstituted generic function signature is
    // treated as matching any argument; this crate does not perform full
    // call-site monomorphization of generic functions (see DESIGN.md).
    if matches!(param_ty.kind(), TypeKind::Param(_)) { continue; }
    if !arg_ty.is_error() && !analyzer.check_type_compatibility(param_ty, &arg_ty) {
      analyzer.errors().report(
        SemanticErrorCode::TypeMismatch,
        arg.location.clone(),
        format!("expected `{}`, found `{}`", param_ty.display_name(), arg_ty.display_name()),
      );
    }
  }

  if matches!(func.ret.kind(), TypeKind::Param(_)) { return analyzer.interner().unknown(); }
  func.ret.clone()
}

/// `Type.method(args)` — calls a method registered on a struct's method
/// table without an implicit receiver; the caller passes any receiver
/// value as an explicit first argument.
fn analyze_associated_call(
  analyzer: &Analyzer, base: &crate::ast::TypeNode, method: Symbol, type_args: &[crate::ast::TypeNode], args: &[Expr],
  expr: &Expr, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext,
) -> TypeDescriptor {
  let resolver = TypeResolver::new(analyzer.interner(), analyzer.errors(), analyzer.pointer_size());
  let base_ty = resolver.resolve(base, scope);
  for t in type_args { resolver.resolve(t, scope); }
  if base_ty.is_error() { for a in args { analyze_expr(analyzer, a, scope, ctx); } return base_ty; }

  let Some(info) = analyzer.interner().lookup_struct_method(&base_ty, method) else {
    analyzer.errors().report(SemanticErrorCode::UndefinedSymbol, expr.location.clone(), format!("`{}` has no method `{method}`", base_ty.display_name()));
    for a in args { analyze_expr(analyzer, a, scope, ctx); }
    return analyzer.interner().error();
  };
  let Some(func) = info.ty.as_function() else { return analyzer.interner().error(); };

  if args.len() != func.params.len() {
    analyzer.errors().report(SemanticErrorCode::MismatchedTypes, expr.location.clone(), format!("expected {} argument(s), found {}", func.params.len(), args.len()));
  }
  for (arg, param_ty) in args.iter().zip(&func.params) {
    let arg_ty = ctx.with_expected(Some(param_ty.clone()), || analyze_expr(analyzer, arg, scope, ctx));
    if !arg_ty.is_error() && !matches!(param_ty.kind(), TypeKind::Param(_)) && !analyzer.check_type_compatibility(param_ty, &arg_ty) {
      analyzer.errors().report(SemanticErrorCode::TypeMismatch, arg.location.clone(), format!("expected `{}`, found `{}`", param_ty.display_name(), arg_ty.display_name()));
    }
  }
  func.ret.clone()
}

fn analyze_field_access(analyzer: &Analyzer, base: &Expr, field: Symbol, expr: &Expr, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext) -> TypeDescriptor {
  // Bare `EnumName.Variant` parses as a field access on a type name; detect
  // that shape before treating `base` as a value-producing expression.
  if_chain! {
    if let ExprKind::Identifier(name) = &base.kind;
    if let Some(entry) = scope.lookup_safe(*name);
    if entry.kind == SymbolKind::Type;
    if let Some(enum_descr) = entry.ty.as_enum();
    then {
      let variants = enum_descr.variants.read().expect("variant table lock poisoned");
      if let Some(info) = variants.get(field) {
        base.set_resolved_type(entry.ty.clone());
        if info.payload.is_some() {
          analyzer.errors().report(SemanticErrorCode::InvalidDeclaration, expr.location.clone(), format!("variant `{field}` requires a payload"));
        }
        return entry.ty.clone();
      }
      let suggestions = crate::diagnostics::suggest_names(field.as_str(), variants.names());
      analyzer.errors().report_with_suggestions(SemanticErrorCode::UndefinedSymbol, expr.location.clone(), format!("`{}` has no variant `{field}`", entry.ty.display_name()), suggestions);
      return analyzer.interner().error();
    }
  }

  let base_ty = analyze_expr(analyzer, base, scope, ctx);
  if base_ty.is_error() { return base_ty; }
  security::propagate_volatile_taint(expr);

  if let TypeKind::Tuple(elems) = base_ty.kind() {
    if let Ok(index) = field.as_str().parse::<usize>() {
      if let Some(element) = elems.get(index) { return element.clone(); }
    }
    analyzer.errors().report(SemanticErrorCode::TypeMismatch, expr.location.clone(), format!("tuple has no element `.{field}`"));
    return analyzer.interner().error();
  }

  if let Some(field_info) = field_of(analyzer, &base_ty, field) {
    return field_info;
  }
  if let Some(method_info) = analyzer.interner().lookup_struct_method(&base_ty, field) {
    return method_info.ty;
  }
  if base_ty.as_struct().is_some() {
    analyzer.errors().report(SemanticErrorCode::UndefinedSymbol, expr.location.clone(), format!("`{}` has no field or method `{field}`", base_ty.display_name()));
  } else {
    analyzer.errors().report(SemanticErrorCode::TypeMismatch, expr.location.clone(), format!("`{}` is not a struct or tuple", base_ty.display_name()));
  }
  analyzer.interner().error()
}

fn field_of(analyzer: &Analyzer, base_ty: &TypeDescriptor, field: Symbol) -> Option<TypeDescriptor> {
  let raw = analyzer.interner().lookup_struct_field(base_ty, field)?;
  if let TypeKind::GenericInstance(g) = base_ty.kind() {
    let sd = g.base.as_struct()?;
    return Some(analyzer.interner().substitute(&raw.ty, &sd.type_params, &g.args));
  }
  Some(raw.ty)
}

fn analyze_index_access(analyzer: &Analyzer, base: &Expr, index: &Expr, expr: &Expr, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext) -> TypeDescriptor {
  let base_ty = analyze_expr(analyzer, base, scope, ctx);
  let index_ty = analyze_expr(analyzer, index, scope, ctx);
  if base_ty.is_error() { return base_ty; }
  if !index_ty.is_error() && !matches!(index_ty.kind(), TypeKind::Primitive(k) if k.is_integer()) {
    analyzer.errors().report(SemanticErrorCode::TypeMismatch, index.location.clone(), "index must be an integer".to_owned());
  }
  security::propagate_volatile_taint(expr);
  match base_ty.kind() {
    TypeKind::Array { element, .. } | TypeKind::Slice { element } | TypeKind::Pointer { pointee: element, .. } => element.clone(),
    _ => {
      analyzer.errors().report(SemanticErrorCode::TypeMismatch, expr.location.clone(), format!("cannot index into `{}`", base_ty.display_name()));
      analyzer.interner().error()
    }
  }
}

fn analyze_struct_literal(
  analyzer: &Analyzer, ty_node: &crate::ast::TypeNode, fields: &[(Symbol, Expr)], expr: &Expr, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext,
) -> TypeDescriptor {
  let resolver = TypeResolver::new(analyzer.interner(), analyzer.errors(), analyzer.pointer_size());
  let ty = resolver.resolve(ty_node, scope);
  if ty.is_error() { for (_, e) in fields { analyze_expr(analyzer, e, scope, ctx); } return ty; }

  let Some(sd) = ty.as_struct() else {
    analyzer.errors().report(SemanticErrorCode::TypeMismatch, expr.location.clone(), format!("`{}` is not a struct", ty.display_name()));
    for (_, e) in fields { analyze_expr(analyzer, e, scope, ctx); }
    return analyzer.interner().error();
  };
  let (type_params, generic_args): (&[Symbol], &[TypeDescriptor]) = match ty.kind() {
    TypeKind::GenericInstance(g) => (&sd.type_params, &g.args),
    _ => (&[], &[]),
  };

  let mut seen = Vec::with_capacity(fields.len());
  for (name, init) in fields {
    seen.push(*name);
    let Some(info) = analyzer.interner().lookup_struct_field(&ty, *name) else {
      analyzer.errors().report(SemanticErrorCode::UndefinedSymbol, init.location.clone(), format!("`{}` has no field `{name}`", ty.display_name()));
      analyze_expr(analyzer, init, scope, ctx);
      continue;
    };
    let expected = if type_params.is_empty() { info.ty } else { analyzer.interner().substitute(&info.ty, type_params, generic_args) };
    let init_ty = ctx.with_expected(Some(expected.clone()), || analyze_expr(analyzer, init, scope, ctx));
    if !init_ty.is_error() && !analyzer.check_type_compatibility(&expected, &init_ty) {
      analyzer.errors().report(SemanticErrorCode::TypeMismatch, init.location.clone(), format!("field `{name}` expects `{}`, found `{}`", expected.display_name(), init_ty.display_name()));
    }
  }

  {
    let table = sd.fields.read().expect("field table lock poisoned");
    for (name, info) in table.iter() {
      if !info.optional && !seen.contains(&name) {
        analyzer.errors().report(SemanticErrorCode::InvalidDeclaration, expr.location.clone(), format!("missing field `{name}` in struct literal"));
      }
    }
  }

  ty
}

fn analyze_enum_variant(
  analyzer: &Analyzer, ty_node: Option<&crate::ast::TypeNode>, variant: Symbol, payload: Option<&Expr>,
  expr: &Expr, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext,
) -> TypeDescriptor {
  let enum_ty = match ty_node {
    Some(node) => TypeResolver::new(analyzer.interner(), analyzer.errors(), analyzer.pointer_size()).resolve(node, scope),
    None => match ctx.expected_type() {
      Some(t) if t.as_enum().is_some() => t,
      _ => {
        analyzer.errors().report(SemanticErrorCode::TypeAnnotationRequired, expr.location.clone(), format!("cannot infer enum type for variant `{variant}`"));
        return analyzer.interner().error();
      }
    },
  };
  if enum_ty.is_error() { if let Some(p) = payload { analyze_expr(analyzer, p, scope, ctx); } return enum_ty; }
  let Some(ed) = enum_ty.as_enum() else {
    analyzer.errors().report(SemanticErrorCode::TypeMismatch, expr.location.clone(), format!("`{}` is not an enum", enum_ty.display_name()));
    return analyzer.interner().error();
  };
  let variant_info = {
    let table = ed.variants.read().expect("variant table lock poisoned");
    table.get(variant).cloned()
  };
  let Some(info) = variant_info else {
    analyzer.errors().report(SemanticErrorCode::UndefinedSymbol, expr.location.clone(), format!("`{}` has no variant `{variant}`", enum_ty.display_name()));
    return analyzer.interner().error();
  };
  match (info.payload, payload) {
    (Some(expected), Some(p)) => {
      let expected = if let TypeKind::GenericInstance(g) = enum_ty.kind() { analyzer.interner().substitute(&expected, &ed.type_params, &g.args) } else { expected };
      let actual = ctx.with_expected(Some(expected.clone()), || analyze_expr(analyzer, p, scope, ctx));
      if !actual.is_error() && !analyzer.check_type_compatibility(&expected, &actual) {
        analyzer.errors().report(SemanticErrorCode::TypeMismatch, p.location.clone(), format!("variant `{variant}` expects `{}`, found `{}`", expected.display_name(), actual.display_name()));
      }
    }
    (Some(_), None) => { analyzer.errors().report(SemanticErrorCode::InvalidDeclaration, expr.location.clone(), format!("variant `{variant}` requires a payload")); }
    (None, Some(p)) => { analyze_expr(analyzer, p, scope, ctx); analyzer.errors().report(SemanticErrorCode::InvalidDeclaration, expr.location.clone(), format!("variant `{variant}` does not take a payload")); }
    (None, None) => {}
  }
  enum_ty
}

fn analyze_tuple_literal(analyzer: &Analyzer, elems: &[Expr], scope: &Arc<SymbolTable>, ctx: &AnalyzerContext) -> TypeDescriptor {
  let types: smallvec::SmallVec<[TypeDescriptor; 4]> = elems.iter().map(|e| analyze_expr(analyzer, e, scope, ctx)).collect();
  if elems.len() < 2 {
    analyzer.errors().report(SemanticErrorCode::InvalidType, elems.first().map_or_else(crate::source::SourceLocation::builtin, |e| e.location.clone()), "tuple literals require at least 2 elements".to_owned());
    return analyzer.interner().error();
  }
  if types.iter().any(TypeDescriptor::is_error) { return analyzer.interner().error(); }
  analyzer.interner().create_tuple(types)
}

fn analyze_array_literal(analyzer: &Analyzer, elems: &[Expr], expr: &Expr, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext) -> TypeDescriptor {
  let element_hint = ctx.expected_type().and_then(|t| if let TypeKind::Array { element, .. } | TypeKind::Slice { element } = t.kind() { Some(element.clone()) } else { None });
  let types: Vec<TypeDescriptor> = elems.iter().map(|e| ctx.with_expected(element_hint.clone(), || analyze_expr(analyzer, e, scope, ctx))).collect();
  if types.iter().any(TypeDescriptor::is_error) { return analyzer.interner().error(); }
  let element = match element_hint.or_else(|| types.first().cloned()) {
    Some(t) => t,
    None => return analyzer.interner().unknown(),
  };
  for (e, t) in elems.iter().zip(&types) {
    if !analyzer.check_type_compatibility(&element, t) {
      analyzer.errors().report(SemanticErrorCode::TypeMismatch, e.location.clone(), format!("expected `{}`, found `{}`", element.display_name(), t.display_name()));
    }
  }
  let _ = expr;
  analyzer.interner().create_array(element, elems.len() as u64)
}
