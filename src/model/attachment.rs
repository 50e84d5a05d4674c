//! Campaign attachment records.
//!
//! The stored content stays base64-encoded and is never modified. Every
//! templating call decodes it afresh and returns a new buffer, so one record
//! serves every recipient of a campaign.

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LureError, Result};
use crate::format::{self, FormatTable, Handling};
use crate::model::context::TemplateContext;
use crate::render::{archive, flat};
use crate::template::{PlaceholderEngine, TemplateExecutor};

/// Set-once marker recording that a full templating pass changed nothing.
///
/// Shared across worker threads rendering the same attachment. Readers that
/// miss a concurrent `mark` just take the slow path once more.
#[derive(Debug, Default)]
pub struct VanillaFlag(AtomicBool);

impl VanillaFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Idempotent; there is no way back to unset.
    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }
}

impl Clone for VanillaFlag {
    fn clone(&self) -> Self {
        Self(AtomicBool::new(self.is_set()))
    }
}

/// An email attachment belonging to a campaign template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Base64 (standard alphabet) encoded payload.
    pub content: String,

    /// Declared MIME type. Informational only; dispatch uses the file extension.
    #[serde(rename = "type")]
    pub content_type: String,

    /// File name shown to the recipient.
    pub name: String,

    /// Set once a pass proves the attachment has no placeholders.
    #[serde(skip)]
    vanilla: VanillaFlag,
}

impl Attachment {
    /// Wrap already-encoded content.
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            content_type: content_type.into(),
            name: name.into(),
            vanilla: VanillaFlag::default(),
        }
    }

    /// Encode raw bytes into a new record.
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: &[u8],
    ) -> Self {
        Self::new(name, content_type, STANDARD.encode(data))
    }

    /// Read a local file into a record. The declared type is guessed from the
    /// extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| LureError::io(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = format::mime_hint(&name);
        Ok(Self::from_bytes(name, content_type, &data))
    }

    /// Decode the stored content.
    ///
    /// Line breaks are skipped, so MIME-style wrapped base64 decodes as well.
    pub fn decoded(&self) -> Result<Vec<u8>> {
        if !self.content.contains(['\r', '\n']) {
            return Ok(STANDARD.decode(self.content.as_bytes())?);
        }
        let unwrapped: Vec<u8> = self
            .content
            .bytes()
            .filter(|b| !matches!(b, b'\r' | b'\n'))
            .collect();
        Ok(STANDARD.decode(unwrapped)?)
    }

    /// `true` once a templating pass has shown the attachment has no placeholders.
    pub fn is_vanilla(&self) -> bool {
        self.vanilla.is_set()
    }

    /// How this attachment would be processed under `formats`.
    pub fn handling(&self, formats: &FormatTable) -> Handling {
        formats.classify(&self.name)
    }

    /// Produce this recipient's copy of the attachment.
    ///
    /// Opaque formats pass through untouched. Text and office documents are
    /// rendered; if rendering changes nothing the record is marked vanilla and
    /// later calls return the decoded bytes without touching the executor.
    pub fn apply_template<E>(
        &self,
        ctx: &TemplateContext,
        executor: &E,
        formats: &FormatTable,
    ) -> Result<Cursor<Vec<u8>>>
    where
        E: TemplateExecutor + ?Sized,
    {
        let decoded = self.decoded()?;

        if self.vanilla.is_set() {
            return Ok(Cursor::new(decoded));
        }

        let handling = self.handling(formats);
        debug!(name = %self.name, %handling, size = decoded.len(), "Applying template");

        let rewritten = match handling {
            Handling::Opaque => return Ok(Cursor::new(decoded)),
            Handling::FlatText => flat::render_text(&decoded, &self.name, ctx, executor)?,
            Handling::CompoundArchive => {
                archive::rewrite_archive(&decoded, ctx, executor, formats)?
            }
        };

        if !rewritten.changed {
            debug!(name = %self.name, "No placeholders found, marking vanilla");
            self.vanilla.mark();
        }
        Ok(Cursor::new(rewritten.bytes))
    }

    /// [`apply_template`](Self::apply_template) with the bundled
    /// [`PlaceholderEngine`] and default format table.
    pub fn apply_template_default(&self, ctx: &TemplateContext) -> Result<Cursor<Vec<u8>>> {
        self.apply_template(ctx, &PlaceholderEngine, &FormatTable::default())
    }

    /// Pre-flight the attachment against [`TemplateContext::sample`], reporting
    /// only whether templating would succeed.
    pub fn validate<E>(&self, executor: &E, formats: &FormatTable) -> Result<()>
    where
        E: TemplateExecutor + ?Sized,
    {
        self.apply_template(&TemplateContext::sample(), executor, formats)
            .map(|_| ())
    }

    pub fn validate_default(&self) -> Result<()> {
        self.validate(&PlaceholderEngine, &FormatTable::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::atomic::AtomicUsize;

    use crate::template::TemplateError;

    /// Counts calls so tests can see when the fast path skips rendering.
    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl TemplateExecutor for Counting {
        fn render(
            &self,
            template: &str,
            ctx: &TemplateContext,
        ) -> std::result::Result<String, TemplateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            PlaceholderEngine.render(template, ctx)
        }
    }

    fn read_all(mut cursor: Cursor<Vec<u8>>) -> Vec<u8> {
        let mut out = Vec::new();
        cursor.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_txt_without_placeholders_becomes_vanilla() {
        let att = Attachment::from_bytes("hello.txt", "text/plain", b"Hello World");
        let exec = Counting::default();
        let formats = FormatTable::default();

        let first = att.apply_template(&TemplateContext::sample(), &exec, &formats).unwrap();
        assert_eq!(read_all(first), b"Hello World");
        assert!(att.is_vanilla());
        assert_eq!(exec.calls.load(Ordering::SeqCst), 1);

        let second = att.apply_template(&TemplateContext::sample(), &exec, &formats).unwrap();
        assert_eq!(read_all(second), b"Hello World");
        assert_eq!(exec.calls.load(Ordering::SeqCst), 1, "second call must skip rendering");
    }

    #[test]
    fn test_html_with_placeholder_stays_templated() {
        let att = Attachment::from_bytes("hi.html", "text/html", b"Hi {{.FirstName}}");
        let ctx = TemplateContext {
            recipient: crate::model::context::BaseRecipient {
                first_name: "Foo".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let out = att.apply_template_default(&ctx).unwrap();
        assert_eq!(read_all(out), b"Hi Foo");
        assert!(!att.is_vanilla());
    }

    #[test]
    fn test_opaque_never_renders_or_marks() {
        let data = [0xffu8, 0xd8, 0xff, b'{', b'{', 0x00];
        let att = Attachment::from_bytes("photo.jpg", "image/jpeg", &data);
        let exec = Counting::default();
        let out = att
            .apply_template(&TemplateContext::sample(), &exec, &FormatTable::default())
            .unwrap();
        assert_eq!(read_all(out), data);
        assert_eq!(exec.calls.load(Ordering::SeqCst), 0);
        assert!(!att.is_vanilla());
    }

    #[test]
    fn test_decode_failure() {
        let att = Attachment::new("a.txt", "text/plain", "not base64 !!!");
        let err = att.apply_template_default(&TemplateContext::sample()).unwrap_err();
        assert!(matches!(err, LureError::Decode(_)));
    }

    #[test]
    fn test_wrapped_base64_decodes() {
        let att = Attachment::new("a.txt", "text/plain", "SGVsbG8g\r\nV29ybGQ=");
        assert_eq!(att.decoded().unwrap(), b"Hello World");

        let att = Attachment::new("a.txt", "text/plain", "SGVs\nbG8g\nV29y\nbGQ=\n");
        assert_eq!(att.decoded().unwrap(), b"Hello World");
    }

    #[test]
    fn test_content_never_mutated() {
        let att = Attachment::from_bytes("a.txt", "text/plain", b"Dear {{.FirstName}}");
        let before = att.content.clone();
        for _ in 0..3 {
            att.apply_template_default(&TemplateContext::sample()).unwrap();
        }
        assert_eq!(att.content, before);
        assert_eq!(att.decoded().unwrap(), b"Dear {{.FirstName}}");
    }

    #[test]
    fn test_render_error_does_not_mark_vanilla() {
        let att = Attachment::from_bytes("a.txt", "text/plain", b"{{.Nope}}");
        assert!(att.validate_default().is_err());
        assert!(!att.is_vanilla());
    }

    #[test]
    fn test_validate_ok() {
        let att = Attachment::from_bytes("a.html", "text/html", b"<a href=\"{{.URL}}\">x</a>");
        att.validate_default().unwrap();
    }

    #[test]
    fn test_clone_copies_flag_state() {
        let att = Attachment::from_bytes("a.txt", "text/plain", b"plain");
        att.apply_template_default(&TemplateContext::sample()).unwrap();
        let copy = att.clone();
        assert!(copy.is_vanilla());
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{"content":"SGVsbG8=","type":"text/plain","name":"a.txt"}"#;
        let att: Attachment = serde_json::from_str(json).unwrap();
        assert_eq!(att.content_type, "text/plain");
        assert_eq!(att.decoded().unwrap(), b"Hello");
        assert!(!att.is_vanilla());

        let back = serde_json::to_value(&att).unwrap();
        assert_eq!(back["type"], "text/plain");
        assert!(back.get("vanilla").is_none());
    }
}
