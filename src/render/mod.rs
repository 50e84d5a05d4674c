//! Rendering pipelines: whole-file text and member-by-member archive rewrite.

pub mod archive;
pub mod flat;
mod text;

/// Output of a rendering pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    /// The new document bytes.
    pub bytes: Vec<u8>,
    /// `false` when templating left every eligible byte untouched, i.e. the
    /// document carries no placeholders.
    pub changed: bool,
}
