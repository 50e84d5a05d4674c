//! Byte-transparent text view of document content.
//!
//! Office XML and text lures are usually UTF-8, but legacy files saved as
//! Latin-1 or Windows-1252 are common. Executors work on `&str`, so bytes that
//! are not part of a valid UTF-8 sequence are mapped one-to-one onto the last
//! 256 code points of plane 16 (U+10FF00..=U+10FFFF) and mapped back after
//! rendering. Everything outside the placeholders comes back byte for byte.

use std::borrow::Cow;

use crate::error::{LureError, Result};
use crate::model::context::TemplateContext;
use crate::template::TemplateExecutor;

use super::Rewritten;

const ESCAPE_BASE: u32 = 0x10_FF00;

/// Render `bytes` as one template. `name` labels errors.
pub(crate) fn render_document<E>(
    bytes: &[u8],
    name: &str,
    ctx: &TemplateContext,
    executor: &E,
) -> Result<Rewritten>
where
    E: TemplateExecutor + ?Sized,
{
    let text = decode(bytes).ok_or_else(|| LureError::NotText {
        name: name.to_string(),
    })?;
    let rendered = executor
        .render(&text, ctx)
        .map_err(|e| LureError::render(name, e))?;
    let changed = rendered != *text;

    let bytes = match text {
        Cow::Borrowed(_) => rendered.into_bytes(),
        Cow::Owned(_) => encode(&rendered),
    };
    Ok(Rewritten { bytes, changed })
}

/// Text view of `bytes`. Borrowed when the input is valid UTF-8.
///
/// Returns `None` when the input is not valid UTF-8 and its valid parts
/// already use the escape range, since the mapping would not be reversible.
fn decode(bytes: &[u8]) -> Option<Cow<'_, str>> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(Cow::Borrowed(text));
    }

    let mut text = String::with_capacity(bytes.len() + bytes.len() / 2);
    for chunk in bytes.utf8_chunks() {
        let valid = chunk.valid();
        if valid.chars().any(is_escape) {
            return None;
        }
        text.push_str(valid);
        text.extend(chunk.invalid().iter().map(|&b| escape(b)));
    }
    Some(Cow::Owned(text))
}

/// Inverse of [`decode`] for escaped text.
fn encode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut buf = [0u8; 4];
    for c in text.chars() {
        if is_escape(c) {
            out.push((u32::from(c) - ESCAPE_BASE) as u8);
        } else {
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
    }
    out
}

fn escape(byte: u8) -> char {
    // ESCAPE_BASE + 0xFF is U+10FFFF, the last valid scalar value.
    char::from_u32(ESCAPE_BASE + u32::from(byte)).unwrap_or(char::REPLACEMENT_CHARACTER)
}

fn is_escape(c: char) -> bool {
    u32::from(c) >= ESCAPE_BASE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::PlaceholderEngine;

    fn render(bytes: &[u8]) -> Result<Rewritten> {
        render_document(bytes, "menu.txt", &TemplateContext::sample(), &PlaceholderEngine)
    }

    #[test]
    fn test_utf8_is_borrowed() {
        assert!(matches!(decode("ñ".as_bytes()), Some(Cow::Borrowed("ñ"))));
    }

    #[test]
    fn test_latin1_without_placeholders_is_untouched() {
        let input = b"Caf\xe9 menu, no placeholders";
        let out = render(input).unwrap();
        assert_eq!(out.bytes, input);
        assert!(!out.changed);
    }

    #[test]
    fn test_latin1_with_placeholder_keeps_surrounding_bytes() {
        let out = render(b"Caf\xe9 {{.FirstName}} \xa3\xff").unwrap();
        assert_eq!(out.bytes, b"Caf\xe9 Foo \xa3\xff");
        assert!(out.changed);
    }

    #[test]
    fn test_truncated_utf8_sequence_round_trips() {
        // A lone lead byte followed by ASCII.
        let input = b"\xe2\x82 {{.RId}}";
        let out = render(input).unwrap();
        assert_eq!(out.bytes, b"\xe2\x82 1234567");
    }

    #[test]
    fn test_every_byte_value_round_trips() {
        let input: Vec<u8> = (0..=255u8).filter(|&b| b != b'{').collect();
        let out = render(&input).unwrap();
        assert_eq!(out.bytes, input);
        assert!(!out.changed);
    }

    #[test]
    fn test_escape_range_collision_is_not_text() {
        let mut input = "\u{10FF41}".as_bytes().to_vec();
        input.push(0xff);
        assert!(matches!(render(&input), Err(LureError::NotText { .. })));
    }
}
