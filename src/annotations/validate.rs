//! The seven-step annotation validation pipeline run at every annotation
//! site: name, context, parameters, duplicates, conflicts, FFI-dependency
//! deferral, tier-2 concurrency.

use bit_vec::BitVec;

use crate::ast::{Annotation, AnnotationValue};
use crate::diagnostics::{ErrorList, SemanticErrorCode};
use crate::source::SourceLocation;

use super::registry::{self, AnnotationContext, ParamType};

/// Which AST-node categories require `non_deterministic`: a function body
/// containing a `spawn`/`spawn_with_handle` statement is inherently
/// non-deterministic and must say so.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencySensitive { SpawningFunction }

/// Validate every annotation at one AST site. `context` is the site's
/// category (derived from the node's AST kind by the caller); `requires_tier2`
/// is `Some` when step 7 applies to this node.
pub fn validate_site(
  annotations: &[Annotation],
  context: AnnotationContext,
  errors: &ErrorList,
  requires_tier2: Option<ConcurrencySensitive>,
) {
  let mut seen_names: Vec<&str> = Vec::new();
  let mut seen_ordinals = BitVec::from_elem(registry::TAG_DEFINITIONS.len(), false);

  for annotation in annotations {
    let name = annotation.name.as_str();

    // 1. Name.
    let Some(def) = registry::lookup_tag(name) else {
      errors.report(SemanticErrorCode::UnknownAnnotation, annotation.location.clone(), format!("unknown annotation `{name}`"));
      continue;
    };

    // 2. Context.
    if !def.valid_contexts.contains(context) {
      errors.report(SemanticErrorCode::InvalidAnnotationContext, annotation.location.clone(), format!("`{name}` is not valid in this position"));
    }

    // 3. Parameters.
    validate_parameters(annotation, def.requires_params, errors);

    // 4. Duplicates: dense bitset keyed by the tag's registry ordinal,
    // `lookup_tag` above guarantees one exists.
    let ord = registry::tag_ordinal(name).expect("name resolved via lookup_tag above");
    if seen_ordinals.get(ord).unwrap_or(false) {
      errors.report(SemanticErrorCode::DuplicateAnnotation, annotation.location.clone(), format!("duplicate annotation `{name}`"));
    } else {
      seen_ordinals.set(ord, true);
      seen_names.push(name);
    }
  }

  // 5. Conflicts: pairwise check across the site's annotation list.
  for i in 0..seen_names.len() {
    for j in (i + 1)..seen_names.len() {
      if let Some(conflict) = registry::lookup_conflict(seen_names[i], seen_names[j]) {
        let code = match conflict.kind {
          registry::ConflictKind::MutuallyExclusive => SemanticErrorCode::MutuallyExclusiveAnnotations,
          registry::ConflictKind::Redundant | registry::ConflictKind::DeprecatedCombination => SemanticErrorCode::ConflictingAnnotations,
        };
        let location = annotations[i].location.clone();
        errors.report(code, location, format!("`{}` conflicts with `{}`: {}", conflict.a, conflict.b, conflict.hint));
      }
    }
  }

  // 6. Dependencies: FFI transfer on a parameter implies a pointer-like type.
  // Enforced by the caller (the declaration analyzer), which has the
  // resolved parameter type available; this module only flags the
  // annotation-level half (presence without a pointer context is checked
  // alongside type resolution in `analyze::decl`).

  // 7. Tier-2 concurrency.
  let has_non_deterministic = registry::tag_ordinal("non_deterministic").is_some_and(|ord| seen_ordinals.get(ord).unwrap_or(false));
  if requires_tier2.is_some() && !has_non_deterministic {
    let location = annotations.first().map_or_else(SourceLocation::builtin, |a| a.location.clone());
    errors.report(SemanticErrorCode::MissingAnnotation, location, "function spawns a task and must be annotated `non_deterministic`".to_owned());
  }
}

fn validate_parameters(annotation: &Annotation, requires_params: bool, errors: &ErrorList) {
  let Some(schema) = registry::lookup_schema(annotation.name.as_str()) else {
    if requires_params && annotation.params.is_empty() {
      errors.report(SemanticErrorCode::InvalidAnnotation, annotation.location.clone(), format!("`{}` requires parameters", annotation.name));
    }
    return;
  };

  for entry in schema {
    let provided = annotation.params.iter().find(|p| p.name.is_some_and(|n| n.as_str() == entry.name));
    match (provided, entry.required) {
      (None, true) => {
        errors.report(SemanticErrorCode::InvalidAnnotation, annotation.location.clone(), format!("`{}` requires parameter `{}`", annotation.name, entry.name));
      }
      (None, false) => {}
      (Some(p), _) => validate_parameter_value(annotation.name.as_str(), entry, p, errors),
    }
  }
}

fn validate_parameter_value(tag: &str, entry: &registry::ParamSchemaEntry, param: &crate::ast::AnnotationParam, errors: &ErrorList) {
  match (entry.ty, &param.value) {
    (ParamType::Int, AnnotationValue::Int(v)) => {
      if let Some((lo, hi)) = entry.int_range {
        if *v < lo || *v > hi {
          errors.report(SemanticErrorCode::InvalidAnnotation, param.location.clone(), format!("`{tag}.{}` must be in {lo}..={hi}, found {v}", entry.name));
        }
      }
    }
    (ParamType::Str, AnnotationValue::Str(s)) => {
      if let Some((lo, hi)) = entry.str_len_range {
        if s.len() < lo || s.len() > hi {
          errors.report(SemanticErrorCode::InvalidAnnotation, param.location.clone(), format!("`{tag}.{}` length must be in {lo}..={hi}, found {}", entry.name, s.len()));
        }
      }
    }
    (ParamType::Ident, AnnotationValue::Ident(s)) => {
      if let Some(allowed) = entry.enum_set {
        if !allowed.contains(&s.as_str()) {
          errors.report(SemanticErrorCode::InvalidAnnotation, param.location.clone(), format!("`{tag}.{}` must be one of {allowed:?}, found `{s}`", entry.name));
        }
      }
    }
    (ParamType::Bool, AnnotationValue::Bool(_)) => {}
    _ => {
      errors.report(SemanticErrorCode::InvalidAnnotation, param.location.clone(), format!("`{tag}.{}` has the wrong parameter type", entry.name));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::symbol::intern;

  fn ann(name: &str) -> Annotation {
    Annotation { name: intern(name), params: Vec::new(), location: SourceLocation::builtin() }
  }

  #[test]
  fn unknown_annotation_is_reported() {
    let errors = ErrorList::new(100);
    validate_site(&[ann("not_a_real_tag")], AnnotationContext::FUNCTION, &errors, None);
    assert_eq!(errors.len(), 1);
  }

  #[test]
  fn wrong_context_is_reported() {
    let errors = ErrorList::new(100);
    validate_site(&[ann("stack_only")], AnnotationContext::FUNCTION, &errors, None);
    assert_eq!(errors.len(), 1);
  }

  #[test]
  fn conflicting_pair_is_reported() {
    let errors = ErrorList::new(100);
    validate_site(&[ann("inline"), ann("no_inline")], AnnotationContext::FUNCTION, &errors, None);
    assert_eq!(errors.len(), 1);
  }

  #[test]
  fn duplicate_annotation_is_reported() {
    let errors = ErrorList::new(100);
    validate_site(&[ann("inline"), ann("inline")], AnnotationContext::FUNCTION, &errors, None);
    assert_eq!(errors.len(), 1);
  }

  #[test]
  fn missing_tier2_annotation_is_reported() {
    let errors = ErrorList::new(100);
    validate_site(&[], AnnotationContext::FUNCTION, &errors, Some(ConcurrencySensitive::SpawningFunction));
    assert_eq!(errors.len(), 1);
  }
}
