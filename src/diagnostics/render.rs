//! The diagnostic presentation façade: plain-text rendering and an optional
//! source-snippet variant, kept separate so different backends (CLI, IDE)
//! can format diagnostics their own way.
//!
//! The analyzer itself never formats a diagnostic for a terminal; it only
//! appends to the [`super::ErrorList`]. Rendering is a separate, optional
//! step a caller opts into.

use super::SemanticError;

/// Lines of source surrounding a diagnostic's location, used by `render`
/// when `context_lines > 0`.
fn context_lines(source: &str, line: u32, context: u32) -> Vec<(u32, &str)> {
  let lo = line.saturating_sub(context).max(1);
  let hi = line + context;
  source
    .lines()
    .enumerate()
    .map(|(i, l)| (i as u32 + 1, l))
    .filter(|(n, _)| *n >= lo && *n <= hi)
    .collect()
}

impl SemanticError {
  /// Render in the shape:
  /// `<level>: <message>\n → <file>:<line>:<column>\n  help: <suggestion>?\n  note: <note>?`.
  #[must_use] pub fn render(&self) -> String {
    let level = if self.is_warning { "warning" } else { "error" };
    let mut out = format!("{level}: {}\n", self.message);
    out.push_str(&format!(" \u{2192} {}\n", self.location));
    if let Some(first) = self.suggestions.first() {
      out.push_str(&format!("  help: did you mean '{first}'?\n"));
    }
    out
  }

  /// Same as [`render`](Self::render) but with a source snippet spliced in
  /// above the pointer line.
  #[must_use] pub fn render_with_source(&self, source: &str, context: u32) -> String {
    let mut out = String::new();
    for (n, text) in context_lines(source, self.location.line, context) {
      out.push_str(&format!("{n:>5} | {text}\n"));
    }
    out.push_str(&self.render());
    out
  }
}

/// Render a full diagnostic batch in declaration order.
#[must_use] pub fn render_all(errors: &[SemanticError]) -> String {
  errors.iter().map(SemanticError::render).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diagnostics::SemanticErrorCode;
  use crate::source::{SourceFile, SourceLocation};

  #[test]
  fn renders_undefined_symbol_with_help() {
    let err = SemanticError {
      code: SemanticErrorCode::UndefinedSymbol,
      location: SourceLocation::new(SourceFile::new("main.lang"), 3, 7, 40),
      message: "undefined symbol `mian`".to_owned(),
      suggestions: vec!["main".to_owned()],
      is_warning: false,
    };
    let rendered = err.render();
    assert!(rendered.starts_with("error: undefined symbol `mian`\n"));
    assert!(rendered.contains("main.lang:3:7"));
    assert!(rendered.contains("help: did you mean 'main'?"));
  }
}
