//! Static annotation registries: tag definitions, parameter schemas,
//! conflict pairs. All table-driven constant data; lookup is a small hash
//! or linear scan.

bitflags::bitflags! {
  /// The contexts a tag may legally annotate.
  #[derive(Clone, Copy, PartialEq, Eq, Debug)]
  pub struct AnnotationContext: u8 {
    const FUNCTION    = 1 << 0;
    const STRUCT      = 1 << 1;
    const STATEMENT   = 1 << 2;
    const EXPRESSION  = 1 << 3;
    const PARAMETER   = 1 << 4;
    const RETURN_TYPE = 1 << 5;
    const ANY = Self::FUNCTION.bits() | Self::STRUCT.bits() | Self::STATEMENT.bits()
      | Self::EXPRESSION.bits() | Self::PARAMETER.bits() | Self::RETURN_TYPE.bits();
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TagCategory { Concurrency, Optimization, Lifecycle, Security, Memory, Ffi }

#[derive(Clone, Copy, Debug)]
pub struct TagDefinition {
  pub name: &'static str,
  pub category: TagCategory,
  pub requires_params: bool,
  pub valid_contexts: AnnotationContext,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParamType { Int, Str, Ident, Bool }

#[derive(Clone, Copy, Debug)]
pub struct ParamSchemaEntry {
  pub name: &'static str,
  pub ty: ParamType,
  pub required: bool,
  /// Inclusive integer range, when `ty == Int`.
  pub int_range: Option<(i64, i64)>,
  /// Allowed identifier values, when `ty == Ident` and the set is closed.
  pub enum_set: Option<&'static [&'static str]>,
  /// Inclusive string-length range, when `ty == Str`.
  pub str_len_range: Option<(usize, usize)>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConflictKind { MutuallyExclusive, Redundant, DeprecatedCombination }

#[derive(Clone, Copy, Debug)]
pub struct ConflictPair {
  pub a: &'static str,
  pub b: &'static str,
  pub kind: ConflictKind,
  pub hint: &'static str,
}

use AnnotationContext as Ctx;
use TagCategory::*;

pub static TAG_DEFINITIONS: &[TagDefinition] = &[
  TagDefinition { name: "non_deterministic", category: Concurrency, requires_params: false, valid_contexts: Ctx::FUNCTION },
  TagDefinition { name: "atomic", category: Concurrency, requires_params: false, valid_contexts: Ctx::FUNCTION.union(Ctx::STATEMENT) },
  TagDefinition { name: "thread_safe", category: Concurrency, requires_params: false, valid_contexts: Ctx::FUNCTION.union(Ctx::STRUCT) },
  TagDefinition { name: "inline", category: Optimization, requires_params: false, valid_contexts: Ctx::FUNCTION },
  TagDefinition { name: "no_inline", category: Optimization, requires_params: false, valid_contexts: Ctx::FUNCTION },
  TagDefinition { name: "hot", category: Optimization, requires_params: false, valid_contexts: Ctx::FUNCTION },
  TagDefinition { name: "cold", category: Optimization, requires_params: false, valid_contexts: Ctx::FUNCTION },
  TagDefinition { name: "cache_friendly", category: Optimization, requires_params: false, valid_contexts: Ctx::STRUCT.union(Ctx::FUNCTION) },
  TagDefinition { name: "performance_critical", category: Optimization, requires_params: false, valid_contexts: Ctx::FUNCTION },
  TagDefinition { name: "deprecated", category: Lifecycle, requires_params: true, valid_contexts: Ctx::ANY },
  TagDefinition { name: "experimental", category: Lifecycle, requires_params: false, valid_contexts: Ctx::ANY },
  TagDefinition { name: "stable", category: Lifecycle, requires_params: false, valid_contexts: Ctx::ANY },
  TagDefinition { name: "security_critical", category: Security, requires_params: false, valid_contexts: Ctx::FUNCTION.union(Ctx::STRUCT) },
  TagDefinition { name: "audit_required", category: Security, requires_params: false, valid_contexts: Ctx::FUNCTION.union(Ctx::STRUCT) },
  TagDefinition { name: "constant_time", category: Security, requires_params: false, valid_contexts: Ctx::FUNCTION },
  TagDefinition { name: "volatile_memory", category: Security, requires_params: false, valid_contexts: Ctx::FUNCTION.union(Ctx::STRUCT).union(Ctx::PARAMETER) },
  TagDefinition { name: "no_gc", category: Memory, requires_params: false, valid_contexts: Ctx::STRUCT.union(Ctx::FUNCTION) },
  TagDefinition { name: "stack_only", category: Memory, requires_params: false, valid_contexts: Ctx::STRUCT },
  TagDefinition { name: "c_abi", category: Ffi, requires_params: false, valid_contexts: Ctx::FUNCTION },
  TagDefinition { name: "dll_export", category: Ffi, requires_params: false, valid_contexts: Ctx::FUNCTION },
  TagDefinition { name: "dll_import", category: Ffi, requires_params: false, valid_contexts: Ctx::FUNCTION },
  TagDefinition { name: "transfer_full", category: Ffi, requires_params: false, valid_contexts: Ctx::RETURN_TYPE.union(Ctx::PARAMETER) },
  TagDefinition { name: "transfer_none", category: Ffi, requires_params: false, valid_contexts: Ctx::RETURN_TYPE.union(Ctx::PARAMETER) },
  TagDefinition { name: "borrowed", category: Ffi, requires_params: false, valid_contexts: Ctx::PARAMETER },
];

#[must_use] pub fn lookup_tag(name: &str) -> Option<&'static TagDefinition> {
  TAG_DEFINITIONS.iter().find(|t| t.name == name)
}

/// `name`'s position in [`TAG_DEFINITIONS`], used to key a dense bitset of
/// tags seen at one annotation site instead of a linear name scan.
#[must_use] pub fn tag_ordinal(name: &str) -> Option<usize> {
  TAG_DEFINITIONS.iter().position(|t| t.name == name)
}

pub static PARAM_SCHEMAS: &[(&str, &[ParamSchemaEntry])] = &[
  ("deprecated", &[
    ParamSchemaEntry { name: "message", ty: ParamType::Str, required: true, int_range: None, enum_set: None, str_len_range: Some((1, 256)) },
    ParamSchemaEntry { name: "since", ty: ParamType::Str, required: false, int_range: None, enum_set: None, str_len_range: None },
    ParamSchemaEntry { name: "replacement", ty: ParamType::Str, required: false, int_range: None, enum_set: None, str_len_range: None },
  ]),
  ("cache_friendly", &[
    ParamSchemaEntry { name: "level", ty: ParamType::Int, required: false, int_range: Some((1, 3)), enum_set: None, str_len_range: None },
    ParamSchemaEntry { name: "strategy", ty: ParamType::Ident, required: false, int_range: None, enum_set: Some(&["temporal", "spatial", "both"]), str_len_range: None },
  ]),
];

#[must_use] pub fn lookup_schema(name: &str) -> Option<&'static [ParamSchemaEntry]> {
  PARAM_SCHEMAS.iter().find(|(n, _)| *n == name).map(|(_, s)| *s)
}

pub static CONFLICTS: &[ConflictPair] = &[
  ConflictPair { a: "inline", b: "no_inline", kind: ConflictKind::MutuallyExclusive, hint: "a function cannot be both inlined and never inlined" },
  ConflictPair { a: "hot", b: "cold", kind: ConflictKind::MutuallyExclusive, hint: "a function cannot be both hot and cold" },
  ConflictPair { a: "deprecated", b: "experimental", kind: ConflictKind::Redundant, hint: "deprecated already implies the API should not be adopted" },
  ConflictPair { a: "stable", b: "experimental", kind: ConflictKind::MutuallyExclusive, hint: "an API cannot be both stable and experimental" },
  ConflictPair { a: "transfer_full", b: "borrowed", kind: ConflictKind::MutuallyExclusive, hint: "ownership cannot be both transferred and borrowed" },
];

#[must_use] pub fn lookup_conflict(a: &str, b: &str) -> Option<&'static ConflictPair> {
  CONFLICTS.iter().find(|c| (c.a == a && c.b == b) || (c.a == b && c.b == a))
}
