//! Read-only navigation queries over an already-analyzed program:
//! declaration lookup, usage search, and type introspection for IDE-style
//! tooling built on top of [`super::Analyzer`].

use crate::analyzer::Analyzer;
use crate::ast::{Decl, DeclKind, Expr, ExprKind, Stmt, StmtKind};
use crate::source::SourceLocation;
use crate::symbol::Symbol;
use crate::symtab::SymbolKind;
use crate::types::{PrimitiveKind, TypeDescriptor};

/// Where `name` was declared, if it is bound anywhere in the global scope.
#[must_use] pub fn find_declaration(analyzer: &Analyzer, name: Symbol) -> Option<SourceLocation> {
  analyzer.global_scope().lookup_safe(name).map(|e| e.declared_at)
}

/// Every identifier expression referencing `name`, anywhere in `root`.
/// Matches by name only, not by resolved binding: two distinct variables
/// that happen to share a name across non-overlapping scopes are not
/// distinguished (the AST carries no per-node symbol-identity slot to key on).
#[must_use] pub fn find_symbol_usages(root: &Decl, name: Symbol) -> Vec<SourceLocation> {
  let mut locations = Vec::new();
  walk_decl(root, &mut |expr| {
    if let ExprKind::Identifier(n) = &expr.kind {
      if *n == name { locations.push(expr.location.clone()); }
    }
  });
  locations
}

/// The declaration site plus every usage site of `name`.
#[must_use] pub fn get_symbol_locations(analyzer: &Analyzer, root: &Decl, name: Symbol) -> Vec<SourceLocation> {
  let mut locations: Vec<SourceLocation> = find_declaration(analyzer, name).into_iter().collect();
  locations.extend(find_symbol_usages(root, name));
  locations
}

/// The type the analyzer resolved for `expr`, if it has been visited.
#[must_use] pub fn infer_expression_type(expr: &Expr) -> Option<TypeDescriptor> { expr.resolved_type() }

/// The descriptor a named type resolves to at global scope (a struct, enum,
/// or generic alias target), or `None` if `name` is not a type.
#[must_use] pub fn get_type_info(analyzer: &Analyzer, name: Symbol) -> Option<TypeDescriptor> {
  let entry = analyzer.global_scope().lookup_safe(name)?;
  (entry.kind == SymbolKind::Type).then_some(entry.ty)
}

#[must_use] pub fn is_primitive_type(name: &str) -> bool { PrimitiveKind::from_name(name).is_some() }

/// Every user-declared type name visible at global scope, for completion
/// lists and similar tooling.
#[must_use] pub fn get_available_types(analyzer: &Analyzer) -> Vec<Symbol> {
  let mut names = Vec::new();
  analyzer.global_scope().iterate(|entry| {
    if entry.kind == SymbolKind::Type { names.push(entry.name); }
    true
  });
  names
}

fn walk_decl(decl: &Decl, f: &mut impl FnMut(&Expr)) {
  match &decl.kind {
    DeclKind::Program(decls) => for d in decls { walk_decl(d, f); }
    DeclKind::Function { body, .. } | DeclKind::Method { body, .. } => {
      if let Some(b) = body { walk_stmt(b, f); }
    }
    DeclKind::Impl { methods, .. } => for m in methods { walk_decl(m, f); }
    DeclKind::Const { value, .. } => walk_expr(value, f),
    DeclKind::Import { .. } | DeclKind::Struct { .. } | DeclKind::Enum { .. } | DeclKind::Extern { .. } => {}
  }
}

fn walk_stmt(stmt: &Stmt, f: &mut impl FnMut(&Expr)) {
  match &stmt.kind {
    StmtKind::Let { init, .. } => { if let Some(e) = init { walk_expr(e, f); } }
    StmtKind::Assignment { target, value } => { walk_expr(target, f); walk_expr(value, f); }
    StmtKind::Return { value } => { if let Some(v) = value { walk_expr(v, f); } }
    StmtKind::If { condition, then_branch, else_branch } => {
      walk_expr(condition, f);
      walk_stmt(then_branch, f);
      if let Some(e) = else_branch { walk_stmt(e, f); }
    }
    StmtKind::IfLet { scrutinee, then_branch, else_branch, .. } => {
      walk_expr(scrutinee, f);
      walk_stmt(then_branch, f);
      if let Some(e) = else_branch { walk_stmt(e, f); }
    }
    StmtKind::Match { scrutinee, arms } => {
      walk_expr(scrutinee, f);
      for arm in arms {
        if let Some(guard) = &arm.guard { walk_expr(guard, f); }
        walk_stmt(&arm.body, f);
      }
    }
    StmtKind::For { iterable, body, .. } => { walk_expr(iterable, f); walk_stmt(body, f); }
    StmtKind::Block(stmts) => for s in stmts { walk_stmt(s, f); }
    StmtKind::Spawn { body } | StmtKind::SpawnWithHandle { body } => walk_expr(body, f),
    StmtKind::Await { expr } => walk_expr(expr, f),
    StmtKind::Unsafe(inner) => walk_stmt(inner, f),
    StmtKind::Expression(e) => walk_expr(e, f),
  }
}

fn walk_expr(expr: &Expr, f: &mut impl FnMut(&Expr)) {
  f(expr);
  match &expr.kind {
    ExprKind::Binary { left, right, .. } => { walk_expr(left, f); walk_expr(right, f); }
    ExprKind::Unary { operand, .. } => walk_expr(operand, f),
    ExprKind::Cast { expr: inner, .. } => walk_expr(inner, f),
    ExprKind::Call { callee, args, .. } => { walk_expr(callee, f); for a in args { walk_expr(a, f); } }
    ExprKind::AssociatedFuncCall { args, .. } => for a in args { walk_expr(a, f); }
    ExprKind::FieldAccess { base, .. } | ExprKind::IndexAccess { base, .. } => walk_expr(base, f),
    ExprKind::StructLiteral { fields, .. } => for (_, v) in fields { walk_expr(v, f); }
    ExprKind::EnumVariant { payload, .. } => { if let Some(p) = payload { walk_expr(p, f); } }
    ExprKind::TupleLiteral(elems) | ExprKind::ArrayLiteral(elems) => for e in elems { walk_expr(e, f); }
    ExprKind::IntLiteral(_) | ExprKind::FloatLiteral(_) | ExprKind::StringLiteral(_)
      | ExprKind::BoolLiteral(_) | ExprKind::CharLiteral(_) | ExprKind::UnitLiteral | ExprKind::Identifier(_) => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::analyze::decl::analyze_program_decl;
  use crate::analyze::AnalyzerContext;
  use crate::ast::{AstNode, TypeNodeKind, Visibility};
  use crate::config::AnalyzerConfig;
  use crate::source::SourceFile;
  use crate::symbol::intern;

  fn loc() -> SourceLocation { SourceLocation::new(SourceFile::new("q.lang"), 1, 1, 0) }

  #[test]
  fn finds_declaration_and_usage_of_a_const() {
    let analyzer = Analyzer::new(AnalyzerConfig::default());
    let ctx = AnalyzerContext::new();

    let ty = AstNode::new(loc(), TypeNodeKind::Base { name: intern("i32"), args: vec![] });
    let const_decl = Decl::new(loc(), DeclKind::Const {
      name: intern("LIMIT"), declared_type: Box::new(ty), value: Box::new(Expr::new(loc(), ExprKind::IntLiteral(10))), visibility: Visibility::Public,
    });
    let usage = Expr::new(loc(), ExprKind::Identifier(intern("LIMIT")));
    let body = Stmt::new(loc(), StmtKind::Expression(Box::new(usage)));
    let func = Decl::new(loc(), DeclKind::Function {
      name: intern("go"), type_params: vec![], params: vec![], return_type: None, body: Some(Box::new(body)), visibility: Visibility::Public,
    });
    let program = Decl::new(loc(), DeclKind::Program(vec![const_decl, func]));

    analyze_program_decl(&analyzer, &program, analyzer.global_scope(), &ctx);

    let name = intern("LIMIT");
    assert!(find_declaration(&analyzer, name).is_some());
    assert_eq!(find_symbol_usages(&program, name).len(), 1);
  }

  #[test]
  fn primitive_names_are_recognized() {
    assert!(is_primitive_type("i32"));
    assert!(!is_primitive_type("Widget"));
  }
}
