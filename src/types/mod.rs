//! The canonical type descriptor graph: interned structural types and
//! nominally-identified structs/enums/functions.

mod descriptor;
mod interner;
pub mod builtin;

pub use descriptor::{
  TypeId, PrimitiveKind, DescriptorFlags, FieldInfo, FieldTable, StructDescriptor,
  MethodInfo, MethodTable, VariantInfo, VariantTable, EnumDescriptor, ExternMeta, FunctionDescriptor,
  GenericInstanceDescriptor, TypeKind, TypeDescriptor, type_descriptor_equals, type_descriptor_hash,
};
pub use interner::{TypeInterner, NotGenericBase};
