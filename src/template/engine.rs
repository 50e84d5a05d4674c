//! Go-style template renderer backed by minijinja.

use std::sync::OnceLock;

use minijinja::{Environment, UndefinedBehavior, Value};

use crate::model::context::TemplateContext;

use super::action::{self, OPEN};
use super::{TemplateError, TemplateExecutor};

/// Renders Go `text/template` style attachments: `{{.Field}}` references,
/// `if`/`else`/`with` blocks, comments, trim markers and pipelines through
/// `eq`, `ne`, `not`, `and`, `or`, `len`, `print`, `html`, `urlquery` and `js`.
///
/// Unknown fields and unsupported actions are rejected at compile time so
/// typos surface at validation instead of reaching recipients.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderEngine;

impl TemplateExecutor for PlaceholderEngine {
    fn render(&self, template: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
        if !template.contains(OPEN) {
            return Ok(template.to_string());
        }
        let source = action::compile(template)?;
        environment()
            .render_str(&source, ctx.fields())
            .map_err(|e| TemplateError::Engine {
                message: e.to_string(),
            })
    }
}

fn environment() -> &'static Environment<'static> {
    static ENV: OnceLock<Environment<'static>> = OnceLock::new();
    ENV.get_or_init(|| {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env.add_filter("html", html_escape);
        env.add_filter("urlquery", query_escape);
        env.add_filter("js", js_escape);
        env
    })
}

fn html_escape(value: Value) -> String {
    let text = value.to_string();
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\0' => out.push('\u{FFFD}'),
            _ => out.push(c),
        }
    }
    out
}

/// Query-string escaping: unreserved characters stay, space becomes `+`.
fn query_escape(value: Value) -> String {
    let text = value.to_string();
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn js_escape(value: Value) -> String {
    let text = value.to_string();
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '<' | '>' | '&' | '=' => out.push_str(&format!("\\u{:04X}", c as u32)),
            c if c < ' ' => out.push_str(&format!("\\u{:04X}", c as u32)),
            _ => out.push(c),
        }
    }
    out
}
