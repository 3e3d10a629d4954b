//! Canonicalizing constructor surface for [`TypeDescriptor`].
//!
//! Every compound type is built through a `TypeInterner`, which guarantees
//! the descriptor-sharing invariant: two requests describing the same type
//! get back the identical `Arc` handle. Struct/enum descriptors are *not*
//! deduplicated here — each `create_struct`/`create_enum` call mints a new
//! nominal identity, so two structs with the same shape stay distinct.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::source::SourceLocation;
use crate::symbol::Symbol;
use super::descriptor::*;

#[derive(Clone, PartialEq, Eq, Hash)]
enum TypeKey {
  Pointer { pointee: TypeId, mutable: bool },
  Slice { element: TypeId },
  Array { element: TypeId, length: u64 },
  Result { ok: TypeId, err: TypeId },
  Option { value: TypeId },
  Tuple(SmallVec<[TypeId; 4]>),
  GenericInstance { base: TypeId, args: SmallVec<[TypeId; 2]> },
  TaskHandle { result: TypeId },
  Param(Symbol),
}

struct Inner {
  cache: HashMap<TypeKey, TypeDescriptor>,
}

/// Error produced by `create_generic_instance` when the base is not a
/// struct or enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotGenericBase;

pub struct TypeInterner {
  next_id: AtomicU32,
  inner: RwLock<Inner>,
  primitives: HashMap<PrimitiveKind, TypeDescriptor>,
  unknown: TypeDescriptor,
  error: TypeDescriptor,
}

impl TypeInterner {
  #[must_use] pub fn new() -> Self {
    let next_id = AtomicU32::new(0);
    let mk = |kind: TypeKind, flags: DescriptorFlags, next_id: &AtomicU32| {
      let id = TypeId(next_id.fetch_add(1, Ordering::Relaxed));
      TypeDescriptor::new(id, kind, flags)
    };
    let mut primitives = HashMap::new();
    for &kind in ALL_PRIMITIVES {
      let d = mk(TypeKind::Primitive(kind), DescriptorFlags::empty(), &next_id);
      d.set_layout(kind.size(), kind.size().max(1).min(8));
      primitives.insert(kind, d);
    }
    let unknown = mk(TypeKind::Unknown, DescriptorFlags::empty(), &next_id);
    let error = mk(TypeKind::Error, DescriptorFlags::empty(), &next_id);
    Self { next_id, inner: RwLock::new(Inner { cache: HashMap::new() }), primitives, unknown, error }
  }

  fn fresh_id(&self) -> TypeId { TypeId(self.next_id.fetch_add(1, Ordering::Relaxed)) }

  #[must_use] pub fn create_primitive(&self, kind: PrimitiveKind) -> TypeDescriptor {
    self.primitives[&kind].clone()
  }

  #[must_use] pub fn unknown(&self) -> TypeDescriptor { self.unknown.clone() }
  #[must_use] pub fn error(&self) -> TypeDescriptor { self.error.clone() }

  #[must_use] pub fn create_param(&self, name: Symbol) -> TypeDescriptor {
    self.get_or_insert(TypeKey::Param(name), || TypeKind::Param(name), DescriptorFlags::empty())
  }

  pub fn create_struct(&self, name: Symbol, type_params: Vec<Symbol>, declared_at: SourceLocation) -> TypeDescriptor {
    let id = self.fresh_id();
    let descr = StructDescriptor {
      type_id: id, name, type_params, fields: RwLock::new(FieldTable::new()),
      methods: RwLock::new(MethodTable::new()), declared_at,
    };
    TypeDescriptor::new(id, TypeKind::Struct(descr), DescriptorFlags::empty())
  }

  /// Register a method in the target struct's method table, from an
  /// impl-block. Returns `false` on a duplicate method name.
  pub fn add_struct_method(&self, s: &TypeDescriptor, name: Symbol, info: MethodInfo) -> bool {
    let Some(sd) = s.as_struct() else { return false };
    sd.methods.write().expect("method table lock poisoned").insert(name, info)
  }

  #[must_use] pub fn lookup_struct_method(&self, s: &TypeDescriptor, name: Symbol) -> Option<MethodInfo> {
    s.as_struct().and_then(|sd| sd.methods.read().expect("method table lock poisoned").get(name).cloned())
  }

  pub fn create_enum(&self, name: Symbol, type_params: Vec<Symbol>, declared_at: SourceLocation) -> TypeDescriptor {
    let id = self.fresh_id();
    let descr = EnumDescriptor {
      type_id: id, name, type_params, variants: RwLock::new(VariantTable::new()), declared_at,
    };
    TypeDescriptor::new(id, TypeKind::Enum(descr), DescriptorFlags::empty())
  }

  pub fn add_struct_field(&self, s: &TypeDescriptor, name: Symbol, info: FieldInfo) -> bool {
    let Some(sd) = s.as_struct() else { return false };
    sd.fields.write().expect("field table lock poisoned").insert(name, info)
  }

  #[must_use] pub fn lookup_struct_field(&self, s: &TypeDescriptor, name: Symbol) -> Option<FieldInfo> {
    s.as_struct().and_then(|sd| sd.fields.read().expect("field table lock poisoned").get(name).cloned())
  }

  pub fn create_pointer(&self, pointee: TypeDescriptor, mutable: bool) -> TypeDescriptor {
    let key = TypeKey::Pointer { pointee: pointee.id(), mutable };
    let flags = if mutable { DescriptorFlags::MUTABLE | DescriptorFlags::BORROWED } else { DescriptorFlags::BORROWED };
    self.get_or_insert(key, || TypeKind::Pointer { pointee, mutable }, flags)
  }

  pub fn create_slice(&self, element: TypeDescriptor) -> TypeDescriptor {
    let key = TypeKey::Slice { element: element.id() };
    self.get_or_insert(key, || TypeKind::Slice { element }, DescriptorFlags::empty())
  }

  pub fn create_array(&self, element: TypeDescriptor, length: u64) -> TypeDescriptor {
    let key = TypeKey::Array { element: element.id(), length };
    self.get_or_insert(key, || TypeKind::Array { element, length }, DescriptorFlags::empty())
  }

  pub fn create_result(&self, ok: TypeDescriptor, err: TypeDescriptor) -> TypeDescriptor {
    let key = TypeKey::Result { ok: ok.id(), err: err.id() };
    self.get_or_insert(key, || TypeKind::Result { ok, err }, DescriptorFlags::empty())
  }

  pub fn create_option(&self, value: TypeDescriptor) -> TypeDescriptor {
    let key = TypeKey::Option { value: value.id() };
    self.get_or_insert(key, || TypeKind::Option { value }, DescriptorFlags::empty())
  }

  /// Tuples have `≥2` elements; callers validate arity before reaching the
  /// interner (the resolver reports `InvalidType` otherwise).
  pub fn create_tuple(&self, elements: SmallVec<[TypeDescriptor; 4]>) -> TypeDescriptor {
    let key = TypeKey::Tuple(elements.iter().map(TypeDescriptor::id).collect());
    self.get_or_insert(key, || TypeKind::Tuple(elements), DescriptorFlags::empty())
  }

  /// Function descriptors are not interned: their `ExternMeta` makes
  /// structural keys awkward, and equality/hash already implement the
  /// canonical-equality rules directly on the descriptor. Two syntactic
  /// references to "the same" function type are compared via `equals`, not
  /// identity.
  pub fn create_function(&self, params: SmallVec<[TypeDescriptor; 4]>, ret: TypeDescriptor, extern_meta: Option<ExternMeta>, requires_marshaling: bool) -> TypeDescriptor {
    let id = self.fresh_id();
    TypeDescriptor::new(id, TypeKind::Function(FunctionDescriptor { params, ret, extern_meta, requires_marshaling }), DescriptorFlags::empty())
  }

  pub fn create_task_handle(&self, result: TypeDescriptor) -> TypeDescriptor {
    let key = TypeKey::TaskHandle { result: result.id() };
    self.get_or_insert(key, || TypeKind::TaskHandle { result }, DescriptorFlags::empty())
  }

  /// Instantiate a generic struct/enum base with concrete type arguments,
  /// canonicalizing by `(base identity, argument identities)`.
  pub fn create_generic_instance(&self, base: TypeDescriptor, args: SmallVec<[TypeDescriptor; 2]>) -> Result<TypeDescriptor, NotGenericBase> {
    let name = match base.kind() {
      TypeKind::Struct(s) => s.name,
      TypeKind::Enum(e) => e.name,
      _ => return Err(NotGenericBase),
    };
    let key = TypeKey::GenericInstance { base: base.id(), args: args.iter().map(TypeDescriptor::id).collect() };
    let canonical_name = format!("{}<{}>", name, args.iter().map(TypeDescriptor::display_name).collect::<Vec<_>>().join(", "));
    Ok(self.get_or_insert(key, || TypeKind::GenericInstance(GenericInstanceDescriptor { base, args, canonical_name }), DescriptorFlags::empty()))
  }

  fn get_or_insert(&self, key: TypeKey, make: impl FnOnce() -> TypeKind, flags: DescriptorFlags) -> TypeDescriptor {
    if let Some(d) = self.inner.read().expect("type interner lock poisoned").cache.get(&key) {
      return d.clone();
    }
    let mut inner = self.inner.write().expect("type interner lock poisoned");
    if let Some(d) = inner.cache.get(&key) { return d.clone(); }
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let d = TypeDescriptor::new(TypeId(id), make(), flags);
    inner.cache.insert(key, d.clone());
    d
  }

  /// Substitute type-parameter leaves in `ty` using `params[i] -> args[i]`.
  /// A `Param` name absent from `params` is a dangling reference and
  /// yields the `error` descriptor.
  #[must_use] pub fn substitute(&self, ty: &TypeDescriptor, params: &[Symbol], args: &[TypeDescriptor]) -> TypeDescriptor {
    match ty.kind() {
      TypeKind::Param(name) => {
        match params.iter().position(|p| p == name) {
          Some(i) => args[i].clone(),
          None => self.error(),
        }
      }
      TypeKind::Pointer { pointee, mutable } =>
        self.create_pointer(self.substitute(pointee, params, args), *mutable),
      TypeKind::Slice { element } => self.create_slice(self.substitute(element, params, args)),
      TypeKind::Array { element, length } => self.create_array(self.substitute(element, params, args), *length),
      TypeKind::Result { ok, err } =>
        self.create_result(self.substitute(ok, params, args), self.substitute(err, params, args)),
      TypeKind::Option { value } => self.create_option(self.substitute(value, params, args)),
      TypeKind::Tuple(elems) =>
        self.create_tuple(elems.iter().map(|e| self.substitute(e, params, args)).collect()),
      TypeKind::Function(f) => {
        let new_params = f.params.iter().map(|p| self.substitute(p, params, args)).collect();
        let ret = self.substitute(&f.ret, params, args);
        self.create_function(new_params, ret, f.extern_meta.clone(), f.requires_marshaling)
      }
      TypeKind::GenericInstance(g) => {
        let new_args: SmallVec<[TypeDescriptor; 2]> = g.args.iter().map(|a| self.substitute(a, params, args)).collect();
        self.create_generic_instance(g.base.clone(), new_args).unwrap_or_else(|_| self.error())
      }
      TypeKind::TaskHandle { result } => self.create_task_handle(self.substitute(result, params, args)),
      // Structs, enums, primitives, unknown, and error have no leaves to
      // substitute; they pass through unchanged (a generic argument never
      // rewrites a sibling struct's own identity).
      _ => ty.clone(),
    }
  }
}

impl Default for TypeInterner {
  fn default() -> Self { Self::new() }
}

const ALL_PRIMITIVES: &[PrimitiveKind] = &[
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
  use crate::symbol::intern;

  #[test]
  fn primitives_are_shared() {
    let i = TypeInterner::new();
    let a = i.create_primitive(PrimitiveKind::I32);
    let b = i.create_primitive(PrimitiveKind::I32);
    assert!(a.equals(&b));
    assert_eq!(a.id(), b.id());
  }

  #[test]
  fn pointer_canonicalization() {
    let i = TypeInterner::new();
    let i32t = i.create_primitive(PrimitiveKind::I32);
    let p1 = i.create_pointer(i32t.clone(), false);
    let p2 = i.create_pointer(i32t, false);
    assert_eq!(p1.id(), p2.id());
  }

  #[test]
  fn distinct_structs_same_shape_are_not_equal() {
    let i = TypeInterner::new();
    let loc = SourceLocation::builtin();
    let a = i.create_struct(intern("Point"), vec![], loc.clone());
    let b = i.create_struct(intern("Point"), vec![], loc);
    assert!(!a.equals(&b), "nominal identity distinguishes separate declarations");
  }

  #[test]
  fn generic_instance_requires_struct_or_enum_base() {
    let i = TypeInterner::new();
    let i32t = i.create_primitive(PrimitiveKind::I32);
    let args = smallvec::smallvec![i32t.clone()];
    assert!(i.create_generic_instance(i32t, args).is_err());
  }

  #[test]
  fn generic_instance_canonicalized_by_base_and_args() {
    let i = TypeInterner::new();
    let loc = SourceLocation::builtin();
    let base = i.create_struct(intern("Vec"), vec![intern("T")], loc);
    let i32t = i.create_primitive(PrimitiveKind::I32);
    let a = i.create_generic_instance(base.clone(), smallvec::smallvec![i32t.clone()]).unwrap();
    let b = i.create_generic_instance(base, smallvec::smallvec![i32t]).unwrap();
    assert!(a.equals(&b));
    assert_eq!(a.id(), b.id());
  }

  #[test]
  fn substitution_replaces_leaf_param() {
    let i = TypeInterner::new();
    let loc = SourceLocation::builtin();
    let t = intern("T");
    let param = i.create_param(t);
    let i32t = i.create_primitive(PrimitiveKind::I32);
    let substituted = i.substitute(&param, &[t], std::slice::from_ref(&i32t));
    assert!(substituted.equals(&i32t));
    let _ = loc;
  }

  #[test]
  fn substitution_of_unknown_param_yields_error() {
    let i = TypeInterner::new();
    let t = intern("T");
    let other = intern("U");
    let param = i.create_param(t);
    let i32t = i.create_primitive(PrimitiveKind::I32);
    let substituted = i.substitute(&param, &[other], std::slice::from_ref(&i32t));
    assert!(substituted.is_error());
  }
}

