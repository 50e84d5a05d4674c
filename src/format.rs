//! Extension-based format classification.
//!
//! Dispatch is keyed on the file extension, never on the declared MIME type:
//! office producers disagree on content types for the same format, while the
//! extension is what the recipient's mail client and office suite act on.

use std::collections::{HashMap, HashSet};

use crate::config::FormatsConfig;

/// Compound-document extensions (zip containers of XML parts).
pub const ARCHIVE_EXTENSIONS: &[&str] = &["docx", "docm", "pptx", "xlsx", "xlsm"];

/// Plain documents rendered as a whole.
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "html"];

/// Archive members that may carry placeholders.
pub const MEMBER_EXTENSIONS: &[&str] = &["xml", "rels"];

/// How an attachment is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handling {
    /// Zip container; XML-family members are templated, the rest copied.
    CompoundArchive,
    /// The whole decoded content is one template.
    FlatText,
    /// Never templated.
    Opaque,
}

impl Handling {
    pub fn label(self) -> &'static str {
        match self {
            Self::CompoundArchive => "compound-archive",
            Self::FlatText => "flat-text",
            Self::Opaque => "opaque",
        }
    }
}

impl std::fmt::Display for Handling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Extension → [`Handling`] table plus the set of template-eligible member
/// extensions used inside archives.
#[derive(Debug, Clone)]
pub struct FormatTable {
    handlers: HashMap<String, Handling>,
    members: HashSet<String>,
    case_insensitive: bool,
}

impl Default for FormatTable {
    fn default() -> Self {
        let mut table = Self::empty(true);
        for ext in ARCHIVE_EXTENSIONS {
            table = table.with_extension(ext, Handling::CompoundArchive);
        }
        for ext in TEXT_EXTENSIONS {
            table = table.with_extension(ext, Handling::FlatText);
        }
        for ext in MEMBER_EXTENSIONS {
            table = table.with_member_extension(ext);
        }
        table
    }
}

impl FormatTable {
    /// A table that classifies everything as [`Handling::Opaque`].
    pub fn empty(case_insensitive: bool) -> Self {
        Self {
            handlers: HashMap::new(),
            members: HashSet::new(),
            case_insensitive,
        }
    }

    /// Build the table from the `[formats]` config section.
    pub fn from_config(config: &FormatsConfig) -> Self {
        let mut table = Self::empty(config.case_insensitive);
        for ext in &config.archive_extensions {
            table = table.with_extension(ext, Handling::CompoundArchive);
        }
        for ext in &config.text_extensions {
            table = table.with_extension(ext, Handling::FlatText);
        }
        for ext in &config.member_extensions {
            table = table.with_member_extension(ext);
        }
        table
    }

    /// Register (or override) the handling for an extension. A leading dot is ignored.
    pub fn with_extension(mut self, ext: &str, handling: Handling) -> Self {
        let key = self.key(ext.trim_start_matches('.'));
        self.handlers.insert(key, handling);
        self
    }

    /// Mark an archive member extension as template-eligible.
    pub fn with_member_extension(mut self, ext: &str) -> Self {
        let key = self.key(ext.trim_start_matches('.'));
        self.members.insert(key);
        self
    }

    /// Classify a file name. Unknown or missing extensions are opaque.
    pub fn classify(&self, name: &str) -> Handling {
        extension(name)
            .and_then(|ext| self.handlers.get(&self.key(ext)).copied())
            .unwrap_or(Handling::Opaque)
    }

    /// Whether an archive member with this name should be run through the template executor.
    pub fn is_template_member(&self, name: &str) -> bool {
        extension(name).is_some_and(|ext| self.members.contains(&self.key(ext)))
    }

    fn key(&self, ext: &str) -> String {
        if self.case_insensitive {
            ext.to_ascii_lowercase()
        } else {
            ext.to_string()
        }
    }
}

/// Extension of the final path component, without the dot.
///
/// Handles both `/` (zip member names) and `\` separators. Dotfiles such as
/// `.rels` count as having the extension `rels`, matching how office
/// containers name `_rels/.rels`.
pub fn extension(name: &str) -> Option<&str> {
    let file = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let (_, ext) = file.rsplit_once('.')?;
    (!ext.is_empty()).then_some(ext)
}

/// Informational MIME type for a file name. Only used to fill in the declared
/// type of records built from local files.
pub fn mime_hint(name: &str) -> &'static str {
    match extension(name).map(str::to_ascii_lowercase).as_deref() {
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("docm") => "application/vnd.ms-word.document.macroEnabled.12",
        Some("pptx") => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("xlsm") => "application/vnd.ms-excel.sheet.macroEnabled.12",
        Some("txt") => "text/plain",
        Some("html" | "htm") => "text/html",
        Some("pdf") => "application/pdf",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classification() {
        let table = FormatTable::default();
        for name in ["a.docx", "a.docm", "a.pptx", "a.xlsx", "a.xlsm"] {
            assert_eq!(table.classify(name), Handling::CompoundArchive, "{name}");
        }
        assert_eq!(table.classify("notes.txt"), Handling::FlatText);
        assert_eq!(table.classify("page.html"), Handling::FlatText);
        assert_eq!(table.classify("photo.jpg"), Handling::Opaque);
        assert_eq!(table.classify("README"), Handling::Opaque);
        assert_eq!(table.classify("trailing."), Handling::Opaque);
        assert_eq!(table.classify(""), Handling::Opaque);
    }

    #[test]
    fn test_only_last_extension_counts() {
        let table = FormatTable::default();
        assert_eq!(table.classify("invoice.docx.pdf"), Handling::Opaque);
        assert_eq!(table.classify("archive.tar.html"), Handling::FlatText);
        assert_eq!(table.classify("dir.docx/file"), Handling::Opaque);
    }

    #[test]
    fn test_case_policy() {
        let table = FormatTable::default();
        assert_eq!(table.classify("REPORT.DOCX"), Handling::CompoundArchive);

        let strict = FormatTable::from_config(&FormatsConfig {
            case_insensitive: false,
            ..FormatsConfig::default()
        });
        assert_eq!(strict.classify("REPORT.DOCX"), Handling::Opaque);
        assert_eq!(strict.classify("report.docx"), Handling::CompoundArchive);
    }

    #[test]
    fn test_member_eligibility() {
        let table = FormatTable::default();
        assert!(table.is_template_member("word/document.xml"));
        assert!(table.is_template_member("_rels/.rels"));
        assert!(table.is_template_member("word/_rels/document.xml.rels"));
        assert!(table.is_template_member("[Content_Types].xml"));
        assert!(!table.is_template_member("word/media/image1.png"));
        assert!(!table.is_template_member("word/vbaProject.bin"));
        assert!(!table.is_template_member("word/"));
    }

    #[test]
    fn test_extend_table() {
        let table = FormatTable::default()
            .with_extension(".odt", Handling::CompoundArchive)
            .with_extension("html", Handling::Opaque)
            .with_member_extension("vml");
        assert_eq!(table.classify("a.odt"), Handling::CompoundArchive);
        assert_eq!(table.classify("a.html"), Handling::Opaque);
        assert!(table.is_template_member("word/drawing.vml"));
    }

    #[test]
    fn test_extension_helper() {
        assert_eq!(extension("a/b/c.xml"), Some("xml"));
        assert_eq!(extension("C:\\x\\y.TXT"), Some("TXT"));
        assert_eq!(extension(".rels"), Some("rels"));
        assert_eq!(extension("noext"), None);
    }

    #[test]
    fn test_mime_hint() {
        assert_eq!(mime_hint("a.TXT"), "text/plain");
        assert_eq!(mime_hint("a.bin"), "application/octet-stream");
    }
}
