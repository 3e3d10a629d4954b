//! The predeclared registry.
//!
//! Seeds the global scope with every primitive, the generic `Option`/`Result`
//! enums, and a handful of predeclared functions, all before the analyzer
//! looks at a single user declaration.

use smallvec::smallvec;

use crate::source::SourceLocation;
use crate::symbol::{intern, Symbol};
use crate::symtab::{SymbolEntry, SymbolKind, SymbolTable, Visibility};
use super::{PrimitiveKind, TypeDescriptor, TypeInterner};

/// Handles kept around after seeding so the resolver and builtin-enum
/// exhaustiveness checks (non-exhaustive match on `Option`) don't have to
/// re-resolve them by name every time.
pub struct BuiltinTypes {
  pub void: TypeDescriptor,
  pub bool_: TypeDescriptor,
  pub never: TypeDescriptor,
  pub option_base: TypeDescriptor,
  pub result_base: TypeDescriptor,
}

const PREDECLARED_FUNCTIONS: &[(&str, &[PrimitiveKind], Option<PrimitiveKind>)] = &[
  ("log", &[PrimitiveKind::String], None),
  ("panic", &[PrimitiveKind::String], Some(PrimitiveKind::Never)),
  ("len", &[], Some(PrimitiveKind::Usize)),
  ("range", &[PrimitiveKind::I64, PrimitiveKind::I64], None),
  ("args", &[], None),
  ("assert", &[PrimitiveKind::Bool], Some(PrimitiveKind::Void)),
];

/// Seed `global` with all primitives, `Option`/`Result`, and the
/// predeclared function list. Called exactly once, at analyzer
/// construction.
pub fn seed(interner: &TypeInterner, global: &SymbolTable) -> BuiltinTypes {
  let loc = SourceLocation::builtin();

  for &kind in ALL_PRIMITIVE_NAMES {
    let ty = interner.create_primitive(kind);
    global.insert_builtin(
      SymbolEntry::new(intern(kind.name()), SymbolKind::Type, ty, loc.clone(), global.scope_id(), Visibility::Public)
        .predeclared(),
    );
  }

  let void = interner.create_primitive(PrimitiveKind::Void);
  let bool_ = interner.create_primitive(PrimitiveKind::Bool);
  let never = interner.create_primitive(PrimitiveKind::Never);

  let option_base = seed_generic_enum(interner, global, "Option", &["T"], &[("Some", true), ("None", false)], &loc);
  let result_base = seed_generic_enum(interner, global, "Result", &["T", "E"], &[("Ok", true), ("Err", true)], &loc);

  for &(name, params, ret) in PREDECLARED_FUNCTIONS {
    let param_descrs = params.iter().map(|&p| interner.create_primitive(p)).collect();
    let ret_descr = ret.map_or_else(|| interner.unknown(), |k| interner.create_primitive(k));
    let func = interner.create_function(param_descrs, ret_descr, None, false);
    global.insert_builtin(
      SymbolEntry::new(intern(name), SymbolKind::Function, func, loc.clone(), global.scope_id(), Visibility::Public)
        .predeclared(),
    );
  }

  BuiltinTypes { void, bool_, never, option_base, result_base }
}

/// Declare a builtin generic enum, register its variants in both its own
/// variant table and the global scope under qualified names
/// (`Option.Some`, `Result.Ok`, ...).
fn seed_generic_enum(
  interner: &TypeInterner,
  global: &SymbolTable,
  name: &str,
  type_params: &[&str],
  variants: &[(&str, bool)],
  loc: &SourceLocation,
) -> TypeDescriptor {
  let params: Vec<Symbol> = type_params.iter().map(|p| intern(p)).collect();
  let enum_ty = interner.create_enum(intern(name), params.clone(), loc.clone());
  let enum_descr = enum_ty.as_enum().expect("create_enum always yields an enum descriptor");

  for (i, &(variant_name, has_payload)) in variants.iter().enumerate() {
    let payload = has_payload.then(|| interner.create_param(params[i.min(params.len() - 1)]));
    enum_descr.variants.write().expect("variant table lock poisoned").insert(
      intern(variant_name),
      crate::types::VariantInfo { payload, discriminant: i as i64, declared_at: loc.clone() },
    );
  }

  global.insert_builtin(
    SymbolEntry::new(intern(name), SymbolKind::Type, enum_ty.clone(), loc.clone(), global.scope_id(), Visibility::Public)
      .predeclared()
      .generic(params.len() as u32),
  );

  for &(variant_name, _) in variants {
    let qualified = intern(&format!("{name}.{variant_name}"));
    global.insert_builtin(
      SymbolEntry::new(qualified, SymbolKind::EnumVariant, enum_ty.clone(), loc.clone(), global.scope_id(), Visibility::Public)
        .predeclared(),
    );
  }

  enum_ty
}

const ALL_PRIMITIVE_NAMES: &[PrimitiveKind] = &[
  PrimitiveKind::Void, PrimitiveKind::Bool,
  PrimitiveKind::I8, PrimitiveKind::I16, PrimitiveKind::I32, PrimitiveKind::I64, PrimitiveKind::I128,
  PrimitiveKind::U8, PrimitiveKind::U16, PrimitiveKind::U32, PrimitiveKind::U64, PrimitiveKind::U128,
  PrimitiveKind::Isize, PrimitiveKind::Usize,
  PrimitiveKind::F32, PrimitiveKind::F64,
  PrimitiveKind::Char, PrimitiveKind::String,
  PrimitiveKind::Never,
];

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn option_variants_are_qualified_and_in_variant_table() {
    let interner = TypeInterner::new();
    let global = SymbolTable::new_root();
    let builtins = seed(&interner, &global);

    assert!(global.lookup_local(intern("Option.Some")).is_some());
    assert!(global.lookup_local(intern("Option.None")).is_some());
    let enum_descr = builtins.option_base.as_enum().unwrap();
    assert_eq!(enum_descr.variants.read().unwrap().len(), 2);
  }

  #[test]
  fn predeclared_function_is_visible() {
    let interner = TypeInterner::new();
    let global = SymbolTable::new_root();
    let _ = seed(&interner, &global);
    let entry = global.lookup_local(intern("panic")).expect("panic should be predeclared");
    assert_eq!(entry.kind, SymbolKind::Function);
    assert!(entry.is_predeclared());
  }

  #[test]
  fn primitives_are_registered_by_name() {
    let interner = TypeInterner::new();
    let global = SymbolTable::new_root();
    let _ = seed(&interner, &global);
    let entry = global.lookup_local(intern("i32")).expect("i32 should be predeclared");
    assert!(matches!(entry.ty.kind(), crate::types::TypeKind::Primitive(PrimitiveKind::I32)));
  }
}
