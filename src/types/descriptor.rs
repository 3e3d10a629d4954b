//! Canonical type identity: the descriptor kinds, their interned/nominal
//! identity, and the reference-counted handle callers hold onto.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use smallvec::SmallVec;

use crate::source::SourceLocation;
use crate::symbol::Symbol;

/// Stable identity assigned to every descriptor at creation time. Struct
/// and enum descriptors are nominally identified by their `TypeId`: two
/// separately-declared structs with identical fields are still distinct
/// types, since equality here is nominal, not structural.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveKind {
  Void, Bool,
  I8, I16, I32, I64, I128,
  U8, U16, U32, U64, U128,
  Isize, Usize,
  F32, F64,
  Char, String,
  Never,
}

impl PrimitiveKind {
  #[must_use] pub fn name(self) -> &'static str {
    match self {
      PrimitiveKind::Void => "void", PrimitiveKind::Bool => "bool",
      PrimitiveKind::I8 => "i8", PrimitiveKind::I16 => "i16", PrimitiveKind::I32 => "i32",
      PrimitiveKind::I64 => "i64", PrimitiveKind::I128 => "i128",
      PrimitiveKind::U8 => "u8", PrimitiveKind::U16 => "u16", PrimitiveKind::U32 => "u32",
      PrimitiveKind::U64 => "u64", PrimitiveKind::U128 => "u128",
      PrimitiveKind::Isize => "isize", PrimitiveKind::Usize => "usize",
      PrimitiveKind::F32 => "f32", PrimitiveKind::F64 => "f64",
      PrimitiveKind::Char => "char", PrimitiveKind::String => "string",
      PrimitiveKind::Never => "never",
    }
  }

  #[must_use] pub fn from_name(s: &str) -> Option<Self> {
    Some(match s {
      "void" => PrimitiveKind::Void, "bool" => PrimitiveKind::Bool,
      "i8" => PrimitiveKind::I8, "i16" => PrimitiveKind::I16, "i32" => PrimitiveKind::I32,
      "i64" => PrimitiveKind::I64, "i128" => PrimitiveKind::I128,
      "u8" => PrimitiveKind::U8, "u16" => PrimitiveKind::U16, "u32" => PrimitiveKind::U32,
      "u64" => PrimitiveKind::U64, "u128" => PrimitiveKind::U128,
      "isize" => PrimitiveKind::Isize, "usize" => PrimitiveKind::Usize,
      "f32" => PrimitiveKind::F32, "f64" => PrimitiveKind::F64,
      "char" => PrimitiveKind::Char, "string" => PrimitiveKind::String,
      "never" => PrimitiveKind::Never,
      _ => return None,
    })
  }

  #[must_use] pub fn is_integer(self) -> bool {
    use PrimitiveKind::*;
    matches!(self, I8|I16|I32|I64|I128|U8|U16|U32|U64|U128|Isize|Usize)
  }

  #[must_use] pub fn is_signed(self) -> bool {
    use PrimitiveKind::*;
    matches!(self, I8|I16|I32|I64|I128|Isize)
  }

  #[must_use] pub fn is_float(self) -> bool { matches!(self, PrimitiveKind::F32 | PrimitiveKind::F64) }

  /// Size in bytes, or `None` for zero-sized / unbounded kinds.
  #[must_use] pub fn size(self) -> u32 {
    use PrimitiveKind::*;
    match self {
      Void | Never => 0,
      Bool | I8 | U8 => 1,
      I16 | U16 => 2,
      I32 | U32 | F32 | Char => 4,
      I64 | U64 | F64 | Isize | Usize => 8,
      I128 | U128 => 16,
      String => 2 * Usize.size(), // fat pointer: data ptr + length
    }
  }
}

bitflags::bitflags! {
  /// Per-descriptor flags.
  #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
  pub struct DescriptorFlags: u16 {
    const MUTABLE       = 1 << 0;
    const OWNED         = 1 << 1;
    const BORROWED      = 1 << 2;
    const CONSTANT      = 1 << 3;
    const VOLATILE      = 1 << 4;
    const ATOMIC        = 1 << 5;
    const FFI_COMPATIBLE = 1 << 6;
  }
}

#[derive(Clone, Debug)]
pub struct FieldInfo {
  pub ty: TypeDescriptor,
  pub visibility: crate::ast::Visibility,
  pub declared_at: SourceLocation,
  pub optional: bool,
}

/// Ordered name -> field-info table, preserving declaration order while
/// keeping O(1) lookup by name.
#[derive(Clone, Debug, Default)]
pub struct FieldTable {
  order: Vec<Symbol>,
  by_name: hashbrown::HashMap<Symbol, FieldInfo>,
}

impl FieldTable {
  #[must_use] pub fn new() -> Self { Self::default() }

  /// Returns `false` if a field with this name already exists (the caller
  /// reports `DuplicateSymbol`).
  pub fn insert(&mut self, name: Symbol, info: FieldInfo) -> bool {
    if self.by_name.contains_key(&name) { return false; }
    self.order.push(name);
    self.by_name.insert(name, info);
    true
  }

  #[must_use] pub fn get(&self, name: Symbol) -> Option<&FieldInfo> { self.by_name.get(&name) }
  #[must_use] pub fn len(&self) -> usize { self.order.len() }
  #[must_use] pub fn is_empty(&self) -> bool { self.order.is_empty() }
  pub fn iter(&self) -> impl Iterator<Item = (Symbol, &FieldInfo)> {
    self.order.iter().map(move |&n| (n, &self.by_name[&n]))
  }
}

/// A method registered on a struct by an `impl` block.
#[derive(Clone, Debug)]
pub struct MethodInfo {
  pub ty: TypeDescriptor,
  pub declared_at: SourceLocation,
}

#[derive(Debug, Default)]
pub struct MethodTable(hashbrown::HashMap<Symbol, MethodInfo>);

impl MethodTable {
  #[must_use] pub fn new() -> Self { Self::default() }
  /// Returns `false` if a method with this name is already registered.
  pub fn insert(&mut self, name: Symbol, info: MethodInfo) -> bool {
    if self.0.contains_key(&name) { return false; }
    self.0.insert(name, info);
    true
  }
  #[must_use] pub fn get(&self, name: Symbol) -> Option<&MethodInfo> { self.0.get(&name) }
}

#[derive(Debug)]
pub struct StructDescriptor {
  pub type_id: TypeId,
  pub name: Symbol,
  pub type_params: Vec<Symbol>,
  pub fields: std::sync::RwLock<FieldTable>,
  pub methods: std::sync::RwLock<MethodTable>,
  pub declared_at: SourceLocation,
}

#[derive(Clone, Debug)]
pub struct VariantInfo {
  pub payload: Option<TypeDescriptor>,
  pub discriminant: i64,
  pub declared_at: SourceLocation,
}

#[derive(Debug, Default)]
pub struct VariantTable {
  order: Vec<Symbol>,
  by_name: hashbrown::HashMap<Symbol, VariantInfo>,
}

impl VariantTable {
  #[must_use] pub fn new() -> Self { Self::default() }
  pub fn insert(&mut self, name: Symbol, info: VariantInfo) -> bool {
    if self.by_name.contains_key(&name) { return false; }
    self.order.push(name);
    self.by_name.insert(name, info);
    true
  }
  #[must_use] pub fn get(&self, name: Symbol) -> Option<&VariantInfo> { self.by_name.get(&name) }
  #[must_use] pub fn len(&self) -> usize { self.order.len() }
  pub fn names(&self) -> impl Iterator<Item = Symbol> + '_ { self.order.iter().copied() }
  pub fn iter(&self) -> impl Iterator<Item = (Symbol, &VariantInfo)> {
    self.order.iter().map(move |&n| (n, &self.by_name[&n]))
  }
}

#[derive(Debug)]
pub struct EnumDescriptor {
  pub type_id: TypeId,
  pub name: Symbol,
  pub type_params: Vec<Symbol>,
  pub variants: std::sync::RwLock<VariantTable>,
  pub declared_at: SourceLocation,
}

#[derive(Clone, Debug)]
pub struct ExternMeta {
  pub external_name: Option<String>,
  pub ffi_annotations: Vec<Symbol>,
}

#[derive(Clone, Debug)]
pub struct FunctionDescriptor {
  pub params: SmallVec<[TypeDescriptor; 4]>,
  pub ret: TypeDescriptor,
  pub extern_meta: Option<ExternMeta>,
  pub requires_marshaling: bool,
}

#[derive(Clone, Debug)]
pub struct GenericInstanceDescriptor {
  pub base: TypeDescriptor,
  pub args: SmallVec<[TypeDescriptor; 2]>,
  pub canonical_name: String,
}

#[derive(Debug)]
pub enum TypeKind {
  Primitive(PrimitiveKind),
  Struct(StructDescriptor),
  Enum(EnumDescriptor),
  Pointer { pointee: TypeDescriptor, mutable: bool },
  Slice { element: TypeDescriptor },
  Array { element: TypeDescriptor, length: u64 },
  Result { ok: TypeDescriptor, err: TypeDescriptor },
  Option { value: TypeDescriptor },
  Tuple(SmallVec<[TypeDescriptor; 4]>),
  Function(FunctionDescriptor),
  GenericInstance(GenericInstanceDescriptor),
  TaskHandle { result: TypeDescriptor },
  /// An unsubstituted reference to a type parameter declared on an
  /// enclosing generic struct/enum/function. Never appears in a fully
  /// resolved, top-level expression type.
  Param(Symbol),
  /// Placeholder meaning "not yet known"; never leaks past a single
  /// resolution step.
  Unknown,
  /// Sentinel meaning "a previous error already occurred here"; used so
  /// the analyzer can keep descending without a `null` type. Never leaks
  /// past top-level.
  Error,
}

struct TypeDescriptorData {
  id: TypeId,
  kind: TypeKind,
  flags: DescriptorFlags,
  size: AtomicU32,
  align: AtomicU32,
}

/// A reference-counted handle to canonical type identity. Clone to retain
/// (bumps the atomic strong count inside `Arc`); drop the last handle to
/// release. `retain`/`release` below are explicit aliases for `Clone`/`Drop`.
#[derive(Clone, Debug)]
pub struct TypeDescriptor(Arc<TypeDescriptorData>);

impl TypeDescriptor {
  pub(crate) fn new(id: TypeId, kind: TypeKind, flags: DescriptorFlags) -> Self {
    Self(Arc::new(TypeDescriptorData { id, kind, flags, size: AtomicU32::new(0), align: AtomicU32::new(0) }))
  }

  #[must_use] pub fn id(&self) -> TypeId { self.0.id }
  #[must_use] pub fn kind(&self) -> &TypeKind { &self.0.kind }
  #[must_use] pub fn flags(&self) -> DescriptorFlags { self.0.flags }

  /// `retain`: an explicit alias for `Clone::clone`.
  #[must_use] pub fn retain(&self) -> Self { self.clone() }
  /// `release`: dropping the handle. Exposed for symmetry; equivalent to
  /// `drop(self)`.
  pub fn release(self) { drop(self); }

  /// Live reference count. Always at least 1 while any handle is held.
  #[must_use] pub fn ref_count(&self) -> usize { Arc::strong_count(&self.0) }

  #[must_use] pub fn size(&self) -> u32 { self.0.size.load(Ordering::Relaxed) }
  #[must_use] pub fn align(&self) -> u32 { self.0.align.load(Ordering::Relaxed) }
  pub fn set_layout(&self, size: u32, align: u32) {
    self.0.size.store(size, Ordering::Relaxed);
    self.0.align.store(align, Ordering::Relaxed);
  }

  #[must_use] pub fn is_unknown(&self) -> bool { matches!(self.kind(), TypeKind::Unknown) }
  #[must_use] pub fn is_error(&self) -> bool { matches!(self.kind(), TypeKind::Error) }
  #[must_use] pub fn is_never(&self) -> bool { matches!(self.kind(), TypeKind::Primitive(PrimitiveKind::Never)) }

  #[must_use] pub fn as_struct(&self) -> Option<&StructDescriptor> {
    match self.kind() {
      TypeKind::Struct(s) => Some(s),
      TypeKind::GenericInstance(g) => g.base.as_struct(),
      _ => None,
    }
  }

  #[must_use] pub fn as_enum(&self) -> Option<&EnumDescriptor> {
    match self.kind() {
      TypeKind::Enum(e) => Some(e),
      TypeKind::GenericInstance(g) => g.base.as_enum(),
      _ => None,
    }
  }

  #[must_use] pub fn as_function(&self) -> Option<&FunctionDescriptor> {
    match self.kind() { TypeKind::Function(f) => Some(f), _ => None }
  }

  #[must_use] pub fn as_generic_instance(&self) -> Option<&GenericInstanceDescriptor> {
    match self.kind() { TypeKind::GenericInstance(g) => Some(g), _ => None }
  }

  /// Nominal display name, used in diagnostics (e.g. `Vec<i32>`, `i32`, `MyStruct`).
  #[must_use] pub fn display_name(&self) -> String {
    match self.kind() {
      TypeKind::Primitive(p) => p.name().to_owned(),
      TypeKind::Struct(s) => s.name.to_string(),
      TypeKind::Enum(e) => e.name.to_string(),
      TypeKind::Pointer { pointee, mutable } =>
        format!("&{}{}", if *mutable { "mut " } else { "" }, pointee.display_name()),
      TypeKind::Slice { element } => format!("[{}]", element.display_name()),
      TypeKind::Array { element, length } => format!("[{}; {}]", element.display_name(), length),
      TypeKind::Result { ok, err } => format!("Result<{}, {}>", ok.display_name(), err.display_name()),
      TypeKind::Option { value } => format!("Option<{}>", value.display_name()),
      TypeKind::Tuple(elems) =>
        format!("({})", elems.iter().map(TypeDescriptor::display_name).collect::<Vec<_>>().join(", ")),
      TypeKind::Function(f) =>
        format!("fn({}) -> {}", f.params.iter().map(TypeDescriptor::display_name).collect::<Vec<_>>().join(", "), f.ret.display_name()),
      TypeKind::GenericInstance(g) => g.canonical_name.clone(),
      TypeKind::TaskHandle { result } => format!("TaskHandle<{}>", result.display_name()),
      TypeKind::Param(name) => name.to_string(),
      TypeKind::Unknown => "<unknown>".to_owned(),
      TypeKind::Error => "<error>".to_owned(),
    }
  }

  /// Canonical equality. Symmetric, reflexive, and consistent with
  /// `type_descriptor_hash`.
  #[must_use] pub fn equals(&self, other: &TypeDescriptor) -> bool {
    use TypeKind::*;
    match (self.kind(), other.kind()) {
      (Primitive(a), Primitive(b)) => a == b,
      (Struct(a), Struct(b)) => a.type_id == b.type_id,
      (Enum(a), Enum(b)) => a.type_id == b.type_id,
      (Pointer { pointee: p1, mutable: m1 }, Pointer { pointee: p2, mutable: m2 }) =>
        m1 == m2 && p1.equals(p2),
      (Slice { element: a }, Slice { element: b }) => a.equals(b),
      (Array { element: e1, length: l1 }, Array { element: e2, length: l2 }) => l1 == l2 && e1.equals(e2),
      (Result { ok: o1, err: e1 }, Result { ok: o2, err: e2 }) => o1.equals(o2) && e1.equals(e2),
      (Option { value: a }, Option { value: b }) => a.equals(b),
      (Tuple(a), Tuple(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y)),
      (Function(a), Function(b)) =>
        a.params.len() == b.params.len()
          && a.params.iter().zip(&b.params).all(|(x, y)| x.equals(y))
          && a.ret.equals(&b.ret),
      (GenericInstance(a), GenericInstance(b)) =>
        a.base.equals(&b.base) && a.args.len() == b.args.len()
          && a.args.iter().zip(&b.args).all(|(x, y)| x.equals(y)),
      (TaskHandle { result: a }, TaskHandle { result: b }) => a.equals(b),
      (Param(a), Param(b)) => a == b,
      (Unknown, Unknown) | (Error, Error) => true,
      _ => false,
    }
  }
}

impl std::hash::Hash for TypeDescriptor {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    use TypeKind::*;
    std::mem::discriminant(self.kind()).hash(state);
    match self.kind() {
      Primitive(p) => p.hash(state),
      Struct(s) => s.type_id.hash(state),
      Enum(e) => e.type_id.hash(state),
      Pointer { pointee, mutable } => { pointee.hash(state); mutable.hash(state); }
      Slice { element } => element.hash(state),
      Array { element, length } => { element.hash(state); length.hash(state); }
      Result { ok, err } => { ok.hash(state); err.hash(state); }
      Option { value } => value.hash(state),
      Tuple(elems) => for e in elems { e.hash(state); },
      Function(f) => { for p in &f.params { p.hash(state); } f.ret.hash(state); }
      GenericInstance(g) => { g.base.hash(state); for a in &g.args { a.hash(state); } }
      TaskHandle { result } => result.hash(state),
      Param(s) => s.hash(state),
      Unknown | Error => {}
    }
  }
}

impl PartialEq for TypeDescriptor {
  fn eq(&self, other: &Self) -> bool { self.equals(other) }
}
impl Eq for TypeDescriptor {}

impl std::hash::Hash for PrimitiveKind {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) { (*self as u8).hash(state); }
}

/// Free-function form of [`TypeDescriptor::equals`].
#[must_use] pub fn type_descriptor_equals(a: &TypeDescriptor, b: &TypeDescriptor) -> bool { a.equals(b) }

/// Free-function form of the canonical hash, consistent with
/// `type_descriptor_equals`.
#[must_use] pub fn type_descriptor_hash(a: &TypeDescriptor) -> u64 {
  use std::hash::{Hash, Hasher};
  let mut hasher = std::collections::hash_map::DefaultHasher::new();
  a.hash(&mut hasher);
  hasher.finish()
}
