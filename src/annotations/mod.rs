//! The registry-driven annotation engine: tag lookup, parameter schemas,
//! and the per-site validation pipeline.

pub mod registry;
pub mod validate;

pub use registry::AnnotationContext;
pub use validate::{validate_site, ConcurrencySensitive};
