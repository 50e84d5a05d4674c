//! Template execution.
//!
//! Rendering a placeholder string against a [`TemplateContext`] sits behind the
//! [`TemplateExecutor`] trait so the attachment pipeline does not care which
//! syntax is in use. [`PlaceholderEngine`] is the bundled implementation for
//! Go-style `{{.Field}}` templates, rendered through minijinja.

mod action;
mod engine;

pub use engine::PlaceholderEngine;

use thiserror::Error;

use crate::model::context::TemplateContext;

/// Errors raised while rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A `{{` was opened but never closed.
    #[error("unclosed action starting at byte {offset}")]
    Unterminated { offset: usize },

    /// The action referenced a field the context does not provide.
    #[error("can't evaluate field {field} at byte {offset}")]
    UnknownField { field: String, offset: usize },

    /// The action does not parse, or `else`/`end` has no block to close.
    #[error("malformed action '{action}' at byte {offset}")]
    Malformed { action: String, offset: usize },

    /// An `if` or `with` block was never closed with `{{end}}`.
    #[error("unexpected EOF: '{action}' at byte {offset} has no matching end")]
    UnclosedBlock { action: String, offset: usize },

    /// Valid template syntax the engine does not implement (loops, `printf`).
    #[error("unsupported action '{action}' at byte {offset}")]
    Unsupported { action: String, offset: usize },

    /// The compiled template failed while rendering.
    #[error("template execution failed: {message}")]
    Engine { message: String },
}

/// Renders a template string against a recipient context.
///
/// Implementations must be pure: the same input always yields the same output
/// and no state is retained between calls.
pub trait TemplateExecutor: Send + Sync {
    fn render(&self, template: &str, ctx: &TemplateContext)
        -> Result<String, TemplateError>;
}
