//! Compile-time constant evaluation: integer/float/string/bool folding,
//! named-constant lookup with cycle detection, and `sizeof`.

use std::collections::HashSet;

use num::traits::Bounded;

use crate::ast::{BinOp, Expr, ExprKind, UnOp};
use crate::diagnostics::{ErrorList, SemanticErrorCode};
use crate::source::SourceLocation;
use crate::symbol::Symbol;
use crate::symtab::{SymbolKind, SymbolTable};
use crate::types::PrimitiveKind;

/// Tagged union of the values a constant expression can fold to.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
  Int(i64),
  Float(f64),
  Str(String),
  Bool(bool),
}

impl ConstValue {
  #[must_use] pub fn type_name(&self) -> &'static str {
    match self {
      ConstValue::Int(_) => "integer",
      ConstValue::Float(_) => "float",
      ConstValue::Str(_) => "string",
      ConstValue::Bool(_) => "bool",
    }
  }
}

const FLOAT_EPSILON: f64 = 1e-10;

/// Tracks the set of const names currently mid-evaluation, to detect direct
/// and mutual self-reference cycles.
pub struct ConstEvaluator<'a> {
  scope: &'a SymbolTable,
  errors: &'a ErrorList,
  in_progress: HashSet<Symbol>,
  pointer_size: u32,
}

impl<'a> ConstEvaluator<'a> {
  #[must_use] pub fn new(scope: &'a SymbolTable, errors: &'a ErrorList, pointer_size: u32) -> Self {
    Self { scope, errors, in_progress: HashSet::new(), pointer_size }
  }

  /// Evaluate `expr` as a constant, recording the name being defined (if
  /// any) so a self-reference inside it is caught before it is stored.
  pub fn evaluate_named(&mut self, name: Symbol, expr: &Expr) -> Option<ConstValue> {
    if self.references(expr, name) {
      self.errors.report(SemanticErrorCode::CircularDependency, expr.location.clone(), format!("const `{name}` references itself"));
      return None;
    }
    self.in_progress.insert(name);
    let result = self.evaluate(expr);
    self.in_progress.remove(&name);
    result
  }

  pub fn evaluate(&mut self, expr: &Expr) -> Option<ConstValue> {
    let value = self.evaluate_inner(expr)?;
    expr.set_flag(crate::ast::NodeFlags::IS_CONSTANT_EXPR);
    Some(value)
  }

  fn evaluate_inner(&mut self, expr: &Expr) -> Option<ConstValue> {
    match &expr.kind {
      ExprKind::IntLiteral(v) => Some(ConstValue::Int(*v)),
      ExprKind::FloatLiteral(_) => Some(ConstValue::Float(expr.float_value().expect("FloatLiteral always decodes"))),
      ExprKind::StringLiteral(s) => Some(ConstValue::Str(s.to_string())),
      ExprKind::BoolLiteral(b) => Some(ConstValue::Bool(*b)),
      ExprKind::CharLiteral(c) => Some(ConstValue::Int(*c as i64)),
      ExprKind::UnitLiteral => None,
      ExprKind::Identifier(name) => self.evaluate_identifier(*name, expr.location.clone()),
      ExprKind::Unary { op, operand } => self.evaluate_unary(*op, operand, expr.location.clone()),
      ExprKind::Binary { op, left, right } => self.evaluate_binary(*op, left, right, expr.location.clone()),
      ExprKind::Call { callee, args, .. } => self.evaluate_sizeof(callee, args, expr.location.clone()),
      _ => {
        self.errors.report(SemanticErrorCode::InvalidOperation, expr.location.clone(), "expression is not a compile-time constant".to_owned());
        None
      }
    }
  }

  fn evaluate_identifier(&mut self, name: Symbol, location: SourceLocation) -> Option<ConstValue> {
    if self.in_progress.contains(&name) {
      self.errors.report(SemanticErrorCode::CircularDependency, location, format!("const `{name}` is defined in terms of itself"));
      return None;
    }
    let Some(entry) = self.scope.lookup_safe(name) else {
      self.errors.report(SemanticErrorCode::UndefinedSymbol, location, format!("undefined symbol `{name}`"));
      return None;
    };
    if entry.kind != SymbolKind::Const {
      self.errors.report(SemanticErrorCode::InvalidOperation, location, format!("`{name}` is not a compile-time constant"));
      return None;
    }
    entry.const_value.clone()
  }

  fn evaluate_unary(&mut self, op: UnOp, operand: &Expr, location: SourceLocation) -> Option<ConstValue> {
    let value = self.evaluate(operand)?;
    match (op, value) {
      (UnOp::Neg, ConstValue::Int(i)) => Some(ConstValue::Int(-i)),
      (UnOp::Neg, ConstValue::Float(f)) => Some(ConstValue::Float(-f)),
      (UnOp::Not, ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
      (UnOp::BitNot, ConstValue::Int(i)) => Some(ConstValue::Int(!i)),
      (_, v) => {
        self.errors.report(SemanticErrorCode::TypeMismatch, location, format!("unary operator not defined for {}", v.type_name()));
        None
      }
    }
  }

  fn evaluate_binary(&mut self, op: BinOp, left: &Expr, right: &Expr, location: SourceLocation) -> Option<ConstValue> {
    let l = self.evaluate(left)?;
    let r = self.evaluate(right)?;

    if op.is_div_or_mod() {
      if let ConstValue::Int(0) = r {
        self.errors.report(SemanticErrorCode::DivisionByZero, location, "division by zero in constant expression".to_owned());
        return None;
      }
    }

    match (l, r) {
      (ConstValue::Int(a), ConstValue::Int(b)) => self.evaluate_int_binary(op, a, b, location),
      (ConstValue::Float(a), ConstValue::Float(b)) => self.evaluate_float_binary(op, a, b, location),
      (ConstValue::Bool(a), ConstValue::Bool(b)) => self.evaluate_bool_binary(op, a, b, location),
      (ConstValue::Str(a), ConstValue::Str(b)) => self.evaluate_str_binary(op, &a, &b, location),
      (a, b) => {
        self.errors.report(SemanticErrorCode::TypeMismatch, location, format!("cannot apply {op:?} to {} and {}", a.type_name(), b.type_name()));
        None
      }
    }
  }

  fn evaluate_int_binary(&self, op: BinOp, a: i64, b: i64, location: SourceLocation) -> Option<ConstValue> {
    Some(match op {
      BinOp::Add => ConstValue::Int(a.wrapping_add(b)),
      BinOp::Sub => ConstValue::Int(a.wrapping_sub(b)),
      BinOp::Mul => ConstValue::Int(a.wrapping_mul(b)),
      BinOp::Div => ConstValue::Int(a.wrapping_div(b)),
      BinOp::Mod => ConstValue::Int(a.wrapping_rem(b)),
      BinOp::Eq => ConstValue::Bool(a == b),
      BinOp::Ne => ConstValue::Bool(a != b),
      BinOp::Lt => ConstValue::Bool(a < b),
      BinOp::Le => ConstValue::Bool(a <= b),
      BinOp::Gt => ConstValue::Bool(a > b),
      BinOp::Ge => ConstValue::Bool(a >= b),
      BinOp::BitAnd => ConstValue::Int(a & b),
      BinOp::BitOr => ConstValue::Int(a | b),
      BinOp::BitXor => ConstValue::Int(a ^ b),
      BinOp::Shl => ConstValue::Int(a.wrapping_shl(b as u32)),
      BinOp::Shr => ConstValue::Int(a.wrapping_shr(b as u32)),
      BinOp::And | BinOp::Or => {
        self.errors.report(SemanticErrorCode::TypeMismatch, location, "logical operator requires bool operands".to_owned());
        return None;
      }
    })
  }

  fn evaluate_float_binary(&self, op: BinOp, a: f64, b: f64, location: SourceLocation) -> Option<ConstValue> {
    Some(match op {
      BinOp::Add => ConstValue::Float(a + b),
      BinOp::Sub => ConstValue::Float(a - b),
      BinOp::Mul => ConstValue::Float(a * b),
      BinOp::Div => ConstValue::Float(a / b),
      BinOp::Mod => ConstValue::Float(a % b),
      BinOp::Eq => ConstValue::Bool((a - b).abs() < FLOAT_EPSILON),
      BinOp::Ne => ConstValue::Bool((a - b).abs() >= FLOAT_EPSILON),
      BinOp::Lt => ConstValue::Bool(a < b),
      BinOp::Le => ConstValue::Bool(a <= b),
      BinOp::Gt => ConstValue::Bool(a > b),
      BinOp::Ge => ConstValue::Bool(a >= b),
      _ => {
        self.errors.report(SemanticErrorCode::TypeMismatch, location, "operator not defined for float operands".to_owned());
        return None;
      }
    })
  }

  fn evaluate_bool_binary(&self, op: BinOp, a: bool, b: bool, location: SourceLocation) -> Option<ConstValue> {
    Some(match op {
      BinOp::And => ConstValue::Bool(a && b),
      BinOp::Or => ConstValue::Bool(a || b),
      BinOp::Eq => ConstValue::Bool(a == b),
      BinOp::Ne => ConstValue::Bool(a != b),
      _ => {
        self.errors.report(SemanticErrorCode::TypeMismatch, location, "operator not defined for bool operands".to_owned());
        return None;
      }
    })
  }

  fn evaluate_str_binary(&self, op: BinOp, a: &str, b: &str, location: SourceLocation) -> Option<ConstValue> {
    Some(match op {
      BinOp::Eq => ConstValue::Bool(a == b),
      BinOp::Ne => ConstValue::Bool(a != b),
      _ => {
        self.errors.report(SemanticErrorCode::TypeMismatch, location, "only `==`/`!=` are defined for string constants".to_owned());
        return None;
      }
    })
  }

  /// `sizeof(T)` is the only builtin const-eval call form. Primitives use
  /// their fixed width; user structs and enums read the size the
  /// declaration analyzer's layout pass already computed and stored on
  /// their descriptor. Only a type still unresolved at this point (the
  /// name doesn't resolve to a `Type` symbol at all) falls back to pointer
  /// size.
  fn evaluate_sizeof(&mut self, callee: &Expr, args: &[Expr], location: SourceLocation) -> Option<ConstValue> {
    let ExprKind::Identifier(name) = &callee.kind else {
      self.errors.report(SemanticErrorCode::InvalidOperation, location, "call is not a compile-time constant".to_owned());
      return None;
    };
    if name.as_str() != "sizeof" || args.len() != 1 {
      self.errors.report(SemanticErrorCode::InvalidOperation, location, "call is not a compile-time constant".to_owned());
      return None;
    }
    let ExprKind::Identifier(type_name) = &args[0].kind else {
      self.errors.report(SemanticErrorCode::InvalidOperation, args[0].location.clone(), "sizeof argument must be a type name".to_owned());
      return None;
    };
    if let Some(prim) = PrimitiveKind::from_name(type_name.as_str()) {
      return Some(ConstValue::Int(i64::from(prim.size())));
    }
    // Bare slice types are unsized; only a reference to one has a concrete
    // layout, as a data pointer plus a length.
    if type_name.as_str().starts_with('[') {
      return Some(ConstValue::Int(i64::from(self.pointer_size) * 2));
    }
    match self.scope.lookup_safe(*type_name) {
      Some(entry) if entry.kind == SymbolKind::Type => Some(ConstValue::Int(i64::from(entry.ty.size()))),
      _ => Some(ConstValue::Int(i64::from(self.pointer_size))),
    }
  }
}

/// Checks a const's declared primitive type against its folded value,
/// including integer range enforcement.
#[must_use] pub fn validate_const_type_compatibility(declared: PrimitiveKind, value: &ConstValue) -> Result<(), String> {
  use PrimitiveKind::*;
  match (declared, value) {
    (Bool, ConstValue::Bool(_)) | (String, ConstValue::Str(_)) => Ok(()),
    (F32 | F64, ConstValue::Float(_)) => Ok(()),
    (Char, ConstValue::Int(v)) if u32::try_from(*v).ok().and_then(char::from_u32).is_some() => Ok(()),
    (k, ConstValue::Int(v)) if k.is_integer() => {
      let (lo, hi) = integer_range(k);
      if *v < lo || *v > hi {
        Err(format!("value {v} out of range for {} ({lo}..={hi})", k.name()))
      } else {
        Ok(())
      }
    }
    (k, v) => Err(format!("expected {}, found {}", k.name(), v.type_name())),
  }
}

/// Min/max for `kind` as `i64`, via `num`'s `Bounded` trait so each width's
/// range comes from the concrete Rust integer type rather than a hand-copied
/// literal pair.
fn integer_range(kind: PrimitiveKind) -> (i64, i64) {
  use PrimitiveKind::*;
  fn bounds<T: Bounded + Into<i64>>() -> (i64, i64) { (T::min_value().into(), T::max_value().into()) }
  match kind {
    I8 => bounds::<i8>(),
    I16 => bounds::<i16>(),
    I32 => bounds::<i32>(),
    I64 | Isize => (i64::MIN, i64::MAX),
    I128 => (i64::MIN, i64::MAX), // conservatively clamp to i64's own range
    U8 => bounds::<u8>(),
    U16 => bounds::<u16>(),
    U32 => bounds::<u32>(),
    U64 | U128 | Usize => (0, i64::MAX),
    _ => (i64::MIN, i64::MAX),
  }
}

/// Walk `expr` for any reference to `name`, used before a const's value is
/// stored to catch direct self-reference.
#[must_use] pub fn references(expr: &Expr, name: Symbol) -> bool {
  match &expr.kind {
    ExprKind::Identifier(n) => *n == name,
    ExprKind::Unary { operand, .. } => references(operand, name),
    ExprKind::Binary { left, right, .. } => references(left, name) || references(right, name),
    ExprKind::Cast { expr, .. } => references(expr, name),
    ExprKind::Call { callee, args, .. } => references(callee, name) || args.iter().any(|a| references(a, name)),
    ExprKind::FieldAccess { base, .. } | ExprKind::IndexAccess { base, .. } => references(base, name),
    ExprKind::TupleLiteral(elems) | ExprKind::ArrayLiteral(elems) => elems.iter().any(|e| references(e, name)),
    ExprKind::StructLiteral { fields, .. } => fields.iter().any(|(_, v)| references(v, name)),
    ExprKind::EnumVariant { payload, .. } => payload.as_deref().is_some_and(|p| references(p, name)),
    ExprKind::AssociatedFuncCall { args, .. } => args.iter().any(|a| references(a, name)),
    ExprKind::IntLiteral(_) | ExprKind::FloatLiteral(_) | ExprKind::StringLiteral(_)
      | ExprKind::BoolLiteral(_) | ExprKind::CharLiteral(_) | ExprKind::UnitLiteral => false,
  }
}

impl<'a> ConstEvaluator<'a> {
  fn references(&self, expr: &Expr, name: Symbol) -> bool { references(expr, name) }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diagnostics::ErrorList;
  use crate::symbol::intern;
  use crate::symtab::{SymbolEntry, Visibility};
  use crate::types::TypeInterner;

  fn int_expr(v: i64) -> Expr { Expr::new(SourceLocation::builtin(), ExprKind::IntLiteral(v)) }

  #[test]
  fn folds_integer_arithmetic() {
    let scope = SymbolTable::new_root();
    let errors = ErrorList::new(100);
    let mut eval = ConstEvaluator::new(&scope, &errors, 8);
    let expr = Expr::new(SourceLocation::builtin(), ExprKind::Binary { op: BinOp::Add, left: Box::new(int_expr(2)), right: Box::new(int_expr(3)) });
    assert_eq!(eval.evaluate(&expr), Some(ConstValue::Int(5)));
  }

  #[test]
  fn division_by_zero_reports_and_returns_none() {
    let scope = SymbolTable::new_root();
    let errors = ErrorList::new(100);
    let mut eval = ConstEvaluator::new(&scope, &errors, 8);
    let expr = Expr::new(SourceLocation::builtin(), ExprKind::Binary { op: BinOp::Div, left: Box::new(int_expr(1)), right: Box::new(int_expr(0)) });
    assert_eq!(eval.evaluate(&expr), None);
    assert_eq!(errors.len(), 1);
  }

  #[test]
  fn self_reference_is_rejected() {
    let scope = SymbolTable::new_root();
    let errors = ErrorList::new(100);
    let mut eval = ConstEvaluator::new(&scope, &errors, 8);
    let name = intern("X");
    let expr = Expr::new(SourceLocation::builtin(), ExprKind::Identifier(name));
    assert_eq!(eval.evaluate_named(name, &expr), None);
  }

  #[test]
  fn identifier_reads_stored_const_value() {
    let interner = TypeInterner::new();
    let scope = SymbolTable::new_root();
    let errors = ErrorList::new(100);
    let i32t = interner.create_primitive(crate::types::PrimitiveKind::I32);
    let name = intern("X");
    scope.insert_safe(
      SymbolEntry::new(name, SymbolKind::Const, i32t, SourceLocation::builtin(), scope.scope_id(), Visibility::Private)
        .with_const_value(ConstValue::Int(7)),
    ).unwrap();
    let mut eval = ConstEvaluator::new(&scope, &errors, 8);
    let expr = Expr::new(SourceLocation::builtin(), ExprKind::Identifier(name));
    assert_eq!(eval.evaluate(&expr), Some(ConstValue::Int(7)));
  }

  #[test]
  fn range_check_rejects_out_of_range_i8() {
    let result = validate_const_type_compatibility(PrimitiveKind::I8, &ConstValue::Int(200));
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("out of range for i8"));
  }
}
