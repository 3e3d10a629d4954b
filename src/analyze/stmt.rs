//! Statement analysis.
//!
//! Every `analyze_*` function returns whether control flow through the
//! statement provably diverges (a `return`, or an expression of `never`
//! type), which the block analyzer uses to flag subsequent statements
//! `UNREACHABLE`.

use std::sync::Arc;

use bit_set::BitSet;

use crate::analyzer::Analyzer;
use crate::ast::{Expr, ExprKind, MatchArm, NodeFlags, Pattern, Stmt, StmtKind};
use crate::diagnostics::SemanticErrorCode;
use crate::resolver::TypeResolver;
use crate::security;
use crate::source::SourceLocation;
use crate::symbol::Symbol;
use crate::symtab::{SymbolEntry, SymbolKind, SymbolTable, Visibility};
use crate::types::{TypeDescriptor, TypeKind};

use super::expr::analyze_expr;
use super::AnalyzerContext;

/// Analyze `stmt` in `scope`. Returns `true` if control flow past this
/// statement is unreachable.
pub fn analyze_stmt(analyzer: &Analyzer, stmt: &Stmt, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext) -> bool {
  match &stmt.kind {
    StmtKind::Block(stmts) => analyze_block(analyzer, stmts, scope, ctx),
    StmtKind::Let { pattern, declared_type, init } => { analyze_let(analyzer, pattern, declared_type.as_deref(), init.as_deref(), stmt, scope, ctx); false }
    StmtKind::Assignment { target, value } => { analyze_assignment(analyzer, target, value, scope, ctx); false }
    StmtKind::Return { value } => analyze_return(analyzer, value.as_deref(), stmt, scope, ctx),
    StmtKind::If { condition, then_branch, else_branch } => analyze_if(analyzer, condition, then_branch, else_branch.as_deref(), scope, ctx),
    StmtKind::IfLet { pattern, scrutinee, then_branch, else_branch } =>
      analyze_if_let(analyzer, pattern, scrutinee, then_branch, else_branch.as_deref(), scope, ctx),
    StmtKind::Match { scrutinee, arms } => analyze_match(analyzer, scrutinee, arms, stmt, scope, ctx),
    StmtKind::For { binding, iterable, body } => { analyze_for(analyzer, binding, iterable, body, scope, ctx); false }
    StmtKind::Spawn { body } | StmtKind::SpawnWithHandle { body } => { analyze_expr(analyzer, body, scope, ctx); false }
    StmtKind::Await { expr } => { analyze_await(analyzer, expr, scope, ctx); false }
    StmtKind::Unsafe(inner) => {
      let prev = ctx.in_unsafe.replace(true);
      let diverges = analyze_stmt(analyzer, inner, scope, ctx);
      ctx.in_unsafe.set(prev);
      diverges
    }
    StmtKind::Expression(e) => {
      let ty = analyze_expr(analyzer, e, scope, ctx);
      ty.is_never()
    }
  }
}

fn analyze_block(analyzer: &Analyzer, stmts: &[Stmt], scope: &Arc<SymbolTable>, ctx: &AnalyzerContext) -> bool {
  let child = scope.enter_scope();
  analyzer.statistics.record_scope_depth(child.depth());
  let mut diverged = false;
  let mut result = false;
  for s in stmts {
    if diverged {
      s.set_flag(NodeFlags::UNREACHABLE);
      let prev = ctx.in_unreachable.replace(true);
      analyze_stmt(analyzer, s, &child, ctx);
      ctx.in_unreachable.set(prev);
      continue;
    }
    result = analyze_stmt(analyzer, s, &child, ctx);
    if result { diverged = true; }
  }
  result
}

fn analyze_let(
  analyzer: &Analyzer, pattern: &Pattern, declared_type: Option<&crate::ast::TypeNode>, init: Option<&Expr>,
  stmt: &Stmt, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext,
) {
  let declared = declared_type.map(|node| TypeResolver::new(analyzer.interner(), analyzer.errors(), analyzer.pointer_size()).resolve(node, scope));
  let init_ty = init.map(|e| ctx.with_expected(declared.clone(), || analyze_expr(analyzer, e, scope, ctx)));

  let ty = match (declared, init_ty) {
    (Some(d), Some(i)) => {
      if !i.is_error() && !analyzer.check_type_compatibility(&d, &i) {
        analyzer.errors().report(SemanticErrorCode::TypeMismatch, stmt.location.clone(), format!("expected `{}`, found `{}`", d.display_name(), i.display_name()));
      }
      d
    }
    (Some(d), None) => d,
    (None, Some(i)) => i,
    (None, None) => {
      analyzer.errors().report(SemanticErrorCode::TypeAnnotationRequired, stmt.location.clone(), "let binding with no initializer requires a type annotation".to_owned());
      analyzer.interner().error()
    }
  };

  bind_pattern(analyzer, pattern, &ty, scope, init.is_some(), stmt.location.clone());
}

/// Binds the names introduced by `pattern` into `scope`, matching `ty`
/// structurally (`let`, `for`, `match` arm patterns all share this).
fn bind_pattern(analyzer: &Analyzer, pattern: &Pattern, ty: &TypeDescriptor, scope: &Arc<SymbolTable>, initialized: bool, at: SourceLocation) {
  match pattern {
    Pattern::Wildcard => {}
    Pattern::Binding { name, mutable } => {
      let mut entry = SymbolEntry::new(*name, SymbolKind::Variable, ty.clone(), at.clone(), scope.scope_id(), Visibility::Private);
      if *mutable { entry = entry.mutable(); }
      if initialized { entry = entry.initialized(); }
      if scope.insert_safe(entry).is_err() {
        analyzer.errors().report(SemanticErrorCode::DuplicateSymbol, at, format!("`{name}` is already bound in this scope"));
      }
    }
    Pattern::Tuple(sub) => {
      if let TypeKind::Tuple(elems) = ty.kind() {
        if elems.len() != sub.len() {
          analyzer.errors().report(SemanticErrorCode::TypeMismatch, at, format!("pattern has {} element(s), type has {}", sub.len(), elems.len()));
          return;
        }
        for (p, t) in sub.iter().zip(elems.iter()) {
          bind_pattern(analyzer, p, t, scope, initialized, at.clone());
        }
      } else if !ty.is_error() {
        analyzer.errors().report(SemanticErrorCode::TypeMismatch, at, format!("cannot destructure `{}` as a tuple", ty.display_name()));
      }
    }
    Pattern::EnumVariant { enum_name: _, variant, payload } => {
      let Some(ed) = ty.as_enum() else {
        if !ty.is_error() {
          analyzer.errors().report(SemanticErrorCode::TypeMismatch, at.clone(), format!("cannot match `{}` against an enum pattern", ty.display_name()));
        }
        return;
      };
      let info = { ed.variants.read().expect("variant table lock poisoned").get(*variant).cloned() };
      let Some(info) = info else {
        analyzer.errors().report(SemanticErrorCode::UndefinedSymbol, at, format!("`{}` has no variant `{variant}`", ty.display_name()));
        return;
      };
      match (info.payload, payload) {
        (Some(payload_ty), Some(sub)) => {
          let payload_ty = if let TypeKind::GenericInstance(g) = ty.kind() { analyzer.interner().substitute(&payload_ty, &ed.type_params, &g.args) } else { payload_ty };
          bind_pattern(analyzer, sub, &payload_ty, scope, initialized, at);
        }
        (None, None) => {}
        (Some(_), None) => { analyzer.errors().report(SemanticErrorCode::InvalidDeclaration, at, format!("variant `{variant}` pattern is missing its payload")); }
        (None, Some(_)) => { analyzer.errors().report(SemanticErrorCode::InvalidDeclaration, at, format!("variant `{variant}` does not carry a payload")); }
      }
    }
    Pattern::Literal(_) => {
      // Nothing to bind; the scrutinee is compared against the literal's
      // own value at runtime. Type compatibility between the literal and
      // `ty` is checked by the match-arm caller, which has the expression
      // context needed to call into the expression analyzer.
    }
  }
}

fn analyze_assignment(analyzer: &Analyzer, target: &Expr, value: &Expr, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext) {
  let target_ty = analyze_expr(analyzer, target, scope, ctx);
  let value_ty = ctx.with_expected(Some(target_ty.clone()), || analyze_expr(analyzer, value, scope, ctx));
  if !target_ty.is_error() && !value_ty.is_error() && !analyzer.check_type_compatibility(&target_ty, &value_ty) {
    analyzer.errors().report(
      SemanticErrorCode::TypeMismatch,
      value.location.clone(),
      format!("cannot assign `{}` to `{}`", value_ty.display_name(), target_ty.display_name()),
    );
  }
  if let Some(root) = root_identifier(target) {
    if let Some(entry) = scope.lookup_safe(root) {
      if entry.kind == SymbolKind::Variable && !entry.is_mutable() {
        analyzer.errors().report(SemanticErrorCode::ImmutableModification, target.location.clone(), format!("cannot assign to immutable variable `{root}`"));
      } else if entry.kind == SymbolKind::Variable {
        scope.set_initialized(root);
      }
    }
  }
}

fn root_identifier(expr: &Expr) -> Option<Symbol> {
  match &expr.kind {
    ExprKind::Identifier(name) => Some(*name),
    ExprKind::FieldAccess { base, .. } | ExprKind::IndexAccess { base, .. } => root_identifier(base),
    _ => None,
  }
}

fn analyze_return(analyzer: &Analyzer, value: Option<&Expr>, stmt: &Stmt, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext) -> bool {
  let expected = ctx.current_function_return();
  match (value, &expected) {
    (Some(v), Some(ret)) => {
      let actual = ctx.with_expected(Some(ret.clone()), || analyze_expr(analyzer, v, scope, ctx));
      if !actual.is_error() && !analyzer.check_type_compatibility(ret, &actual) {
        analyzer.errors().report(SemanticErrorCode::TypeMismatch, v.location.clone(), format!("expected return type `{}`, found `{}`", ret.display_name(), actual.display_name()));
      }
    }
    (Some(v), None) => { analyze_expr(analyzer, v, scope, ctx); }
    (None, Some(ret)) if !ret.is_unknown() && !matches!(ret.kind(), TypeKind::Primitive(crate::types::PrimitiveKind::Void)) => {
      analyzer.errors().report(SemanticErrorCode::TypeMismatch, stmt.location.clone(), format!("expected return type `{}`, found nothing", ret.display_name()));
    }
    (None, _) => {}
  }
  true
}

fn analyze_if(analyzer: &Analyzer, condition: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext) -> bool {
  check_bool_condition(analyzer, condition, scope, ctx);
  let then_diverges = analyze_stmt(analyzer, then_branch, scope, ctx);
  match else_branch {
    Some(e) => then_diverges && analyze_stmt(analyzer, e, scope, ctx),
    None => false,
  }
}

fn check_bool_condition(analyzer: &Analyzer, condition: &Expr, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext) {
  let cond_ty = ctx.with_expected(Some(analyzer.interner().create_primitive(crate::types::PrimitiveKind::Bool)), || analyze_expr(analyzer, condition, scope, ctx));
  if !cond_ty.is_error() && !matches!(cond_ty.kind(), TypeKind::Primitive(crate::types::PrimitiveKind::Bool)) {
    analyzer.errors().report(SemanticErrorCode::TypeMismatch, condition.location.clone(), format!("condition must be `bool`, found `{}`", cond_ty.display_name()));
  }
}

fn analyze_if_let(
  analyzer: &Analyzer, pattern: &Pattern, scrutinee: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext,
) -> bool {
  let scrutinee_ty = analyze_expr(analyzer, scrutinee, scope, ctx);
  let child = scope.enter_scope();
  bind_pattern(analyzer, pattern, &scrutinee_ty, &child, true, scrutinee.location.clone());
  let then_diverges = analyze_stmt(analyzer, then_branch, &child, ctx);
  match else_branch {
    Some(e) => then_diverges && analyze_stmt(analyzer, e, scope, ctx),
    None => false,
  }
}

fn analyze_match(analyzer: &Analyzer, scrutinee: &Expr, arms: &[MatchArm], stmt: &Stmt, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext) -> bool {
  let scrutinee_ty = analyze_expr(analyzer, scrutinee, scope, ctx);
  let mut covers_all = false;
  let mut covered = scrutinee_ty.as_enum().map(|ed| BitSet::with_capacity(ed.variants.read().expect("variant table lock poisoned").len()));

  let mut all_diverge = !arms.is_empty();
  for arm in arms {
    let child = scope.enter_scope();
    bind_pattern(analyzer, &arm.pattern, &scrutinee_ty, &child, true, arm.location.clone());

    let is_catch_all = matches!(arm.pattern, Pattern::Wildcard | Pattern::Binding { .. });
    if arm.guard.is_none() {
      if is_catch_all {
        covers_all = true;
      } else if let (Pattern::EnumVariant { variant, .. }, Some(ed)) = (&arm.pattern, scrutinee_ty.as_enum()) {
        let table = ed.variants.read().expect("variant table lock poisoned");
        if let Some(idx) = table.names().position(|n| n == *variant) {
          if let Some(set) = covered.as_mut() { set.insert(idx); }
        }
      }
    }

    if let Some(guard) = &arm.guard {
      check_bool_condition(analyzer, guard, &child, ctx);
    }
    if !analyze_stmt(analyzer, &arm.body, &child, ctx) { all_diverge = false; }
  }

  if !scrutinee_ty.is_error() {
    let exhaustive = covers_all || covered.as_ref().is_some_and(|set| set.len() == scrutinee_ty.as_enum().map_or(0, |ed| ed.variants.read().expect("variant table lock poisoned").len()));
    if !exhaustive {
      analyzer.errors().report(SemanticErrorCode::NonExhaustiveMatch, stmt.location.clone(), "match is not exhaustive".to_owned());
    }
  }

  all_diverge
}

fn analyze_for(analyzer: &Analyzer, binding: &Pattern, iterable: &Expr, body: &Stmt, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext) {
  let iter_ty = analyze_expr(analyzer, iterable, scope, ctx);
  let element = match iter_ty.kind() {
    TypeKind::Array { element, .. } | TypeKind::Slice { element } => element.clone(),
    _ => {
      if !iter_ty.is_error() {
        analyzer.errors().report(SemanticErrorCode::TypeMismatch, iterable.location.clone(), format!("`{}` is not iterable", iter_ty.display_name()));
      }
      analyzer.interner().error()
    }
  };
  let child = scope.enter_scope();
  bind_pattern(analyzer, binding, &element, &child, true, iterable.location.clone());
  let prev_depth = ctx.loop_depth.get();
  ctx.loop_depth.set(prev_depth + 1);
  analyze_stmt(analyzer, body, &child, ctx);
  ctx.loop_depth.set(prev_depth);
}

fn analyze_await(analyzer: &Analyzer, expr: &Expr, scope: &Arc<SymbolTable>, ctx: &AnalyzerContext) -> TypeDescriptor {
  let ty = analyze_expr(analyzer, expr, scope, ctx);
  security::propagate_volatile_taint(expr);
  match ty.kind() {
    TypeKind::TaskHandle { result } => result.clone(),
    _ if ty.is_error() => ty,
    _ => {
      analyzer.errors().report(SemanticErrorCode::TypeMismatch, expr.location.clone(), format!("`await` requires a task handle, found `{}`", ty.display_name()));
      analyzer.interner().error()
    }
  }
}

/// Does this statement subtree contain a `spawn`/`spawn_with_handle`, which
/// requires the enclosing function to carry `non_deterministic`?
#[must_use] pub fn contains_spawn(stmt: &Stmt) -> bool {
  match &stmt.kind {
    StmtKind::Spawn { .. } | StmtKind::SpawnWithHandle { .. } => true,
    StmtKind::Block(stmts) => stmts.iter().any(contains_spawn),
    StmtKind::If { then_branch, else_branch, .. } =>
      contains_spawn(then_branch) || else_branch.as_deref().is_some_and(contains_spawn),
    StmtKind::IfLet { then_branch, else_branch, .. } =>
      contains_spawn(then_branch) || else_branch.as_deref().is_some_and(contains_spawn),
    StmtKind::Match { arms, .. } => arms.iter().any(|a| contains_spawn(&a.body)),
    StmtKind::For { body, .. } | StmtKind::Unsafe(body) => contains_spawn(body),
    _ => false,
  }
}
