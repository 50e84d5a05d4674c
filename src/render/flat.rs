//! Flat text documents (`.txt`, `.html`): the whole file is one template.

use crate::error::Result;
use crate::model::context::TemplateContext;
use crate::template::TemplateExecutor;

use super::{text, Rewritten};

/// Render the full decoded content of `name` against `ctx`.
///
/// Bytes outside placeholders are kept as they are, whatever the encoding.
pub fn render_text<E>(
    bytes: &[u8],
    name: &str,
    ctx: &TemplateContext,
    executor: &E,
) -> Result<Rewritten>
where
    E: TemplateExecutor + ?Sized,
{
    text::render_document(bytes, name, ctx, executor)
}
