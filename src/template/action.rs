//! Compiles Go-style `{{ ... }}` actions into minijinja source.
//!
//! Campaign templates are written with Go `text/template` actions: field
//! references (`{{.FirstName}}`), conditionals (`{{if .X}}..{{else}}..{{end}}`),
//! `with` blocks, comments, `{{-`/`-}}` whitespace trimming and pipelines over
//! the comparison and escaping builtins. Each action is translated to the
//! equivalent Jinja expression or block tag; the text between actions is
//! emitted so that Jinja reproduces it verbatim. Loops, template definitions
//! and `printf` are rejected.

use crate::model::context::TemplateContext;

use super::TemplateError;

pub(super) const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const TRIM: [char; 4] = [' ', '\t', '\r', '\n'];

/// Translate `template` into minijinja source.
pub(super) fn compile(template: &str) -> Result<String, TemplateError> {
    let mut compiler = Compiler {
        out: String::with_capacity(template.len() + 32),
        blocks: Vec::new(),
    };
    let mut rest = template;
    let mut consumed = 0usize;
    let mut trim_next = false;

    while let Some(start) = rest.find(OPEN) {
        let offset = consumed + start;
        let after_open = &rest[start + OPEN.len()..];
        let end = after_open
            .find(CLOSE)
            .ok_or(TemplateError::Unterminated { offset })?;

        let mut text = &rest[..start];
        if trim_next {
            text = text.trim_start_matches(TRIM);
        }
        let mut inner = &after_open[..end];
        if let Some(stripped) = inner.strip_prefix('-').filter(|s| s.starts_with(TRIM)) {
            text = text.trim_end_matches(TRIM);
            inner = stripped;
        }
        trim_next = false;
        if let Some(stripped) = inner.strip_suffix('-').filter(|s| s.ends_with(TRIM)) {
            trim_next = true;
            inner = stripped;
        }

        compiler.text(text);
        compiler.action(inner.trim(), offset)?;

        let advance = start + OPEN.len() + end + CLOSE.len();
        rest = &rest[advance..];
        consumed += advance;
    }

    if trim_next {
        rest = rest.trim_start_matches(TRIM);
    }
    compiler.text(rest);

    match compiler.blocks.pop() {
        Some(block) => Err(TemplateError::UnclosedBlock {
            action: block.action,
            offset: block.offset,
        }),
        None => Ok(compiler.out),
    }
}

/// An open `if` or `with` awaiting its `end`.
struct Block {
    action: String,
    offset: usize,
    /// What `.` refers to inside the block; `None` at top level.
    dot: Option<String>,
    /// `.` outside the block, restored by `else` in a `with`.
    outer: Option<String>,
}

struct Compiler {
    out: String,
    blocks: Vec<Block>,
}

impl Compiler {
    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        // Text Jinja would treat as markup goes out as a string expression.
        if text.contains("{%") || text.contains("{#") || text.ends_with('{') {
            self.out.push_str("{{ ");
            push_string_literal(&mut self.out, text);
            self.out.push_str(" }}");
        } else {
            self.out.push_str(text);
        }
    }

    fn action(&mut self, action: &str, offset: usize) -> Result<(), TemplateError> {
        if action.starts_with("/*") {
            return if action.ends_with("*/") && action.len() >= 4 {
                Ok(())
            } else {
                Err(malformed(action, offset))
            };
        }

        let (keyword, args) = match action.split_once(TRIM) {
            Some((keyword, args)) => (keyword, args.trim()),
            None => (action, ""),
        };
        match keyword {
            "if" => {
                let cond = self.pipeline(args, action, offset)?;
                self.out.push_str(&format!("{{% if {cond} %}}"));
                let dot = self.dot();
                self.blocks.push(Block {
                    action: action.to_string(),
                    offset,
                    outer: dot.clone(),
                    dot,
                });
            }
            "with" => {
                let value = self.pipeline(args, action, offset)?;
                self.out.push_str(&format!("{{% if {value} %}}"));
                self.blocks.push(Block {
                    action: action.to_string(),
                    offset,
                    outer: self.dot(),
                    dot: Some(value),
                });
            }
            "else" => self.else_branch(args, action, offset)?,
            "end" if args.is_empty() => {
                if self.blocks.pop().is_none() {
                    return Err(malformed(action, offset));
                }
                self.out.push_str("{% endif %}");
            }
            "range" | "define" | "template" | "block" | "break" | "continue" => {
                return Err(TemplateError::Unsupported {
                    action: action.to_string(),
                    offset,
                });
            }
            _ => {
                let value = self.pipeline(action, action, offset)?;
                self.out.push_str(&format!("{{{{ {value} }}}}"));
            }
        }
        Ok(())
    }

    fn else_branch(&mut self, args: &str, action: &str, offset: usize) -> Result<(), TemplateError> {
        let Some(block) = self.blocks.last_mut() else {
            return Err(malformed(action, offset));
        };
        block.dot = block.outer.clone();

        if args.is_empty() {
            self.out.push_str("{% else %}");
            return Ok(());
        }
        let cond = match args.split_once(TRIM) {
            Some(("if", cond)) => cond.trim(),
            _ => return Err(malformed(action, offset)),
        };
        let cond = self.pipeline(cond, action, offset)?;
        self.out.push_str(&format!("{{% elif {cond} %}}"));
        Ok(())
    }

    fn dot(&self) -> Option<String> {
        self.blocks.last().and_then(|b| b.dot.clone())
    }

    /// `stage | stage | ...`: each stage's result becomes the last argument
    /// of the next one.
    fn pipeline(&self, src: &str, action: &str, offset: usize) -> Result<String, TemplateError> {
        let stages = split_top_level(src, |c| c == '|').ok_or_else(|| malformed(action, offset))?;
        let mut piped: Option<String> = None;
        for stage in stages {
            let words = split_top_level(stage, |c| TRIM.contains(&c))
                .ok_or_else(|| malformed(action, offset))?;
            if words.is_empty() {
                return Err(malformed(action, offset));
            }
            piped = Some(self.command(&words, piped, action, offset)?);
        }
        piped.ok_or_else(|| malformed(action, offset))
    }

    fn command(
        &self,
        words: &[&str],
        piped: Option<String>,
        action: &str,
        offset: usize,
    ) -> Result<String, TemplateError> {
        let head = words[0];
        if !is_function_name(head) {
            if words.len() > 1 || piped.is_some() {
                return Err(malformed(action, offset));
            }
            return self.operand(head, action, offset);
        }

        let mut args = words[1..]
            .iter()
            .map(|w| self.operand(w, action, offset))
            .collect::<Result<Vec<_>, _>>()?;
        args.extend(piped);

        let arity_error = || malformed(action, offset);
        let expr = match head {
            "eq" if args.len() >= 2 => {
                let first = &args[0];
                let alternatives: Vec<String> =
                    args[1..].iter().map(|a| format!("{first} == {a}")).collect();
                format!("({})", alternatives.join(" or "))
            }
            "ne" | "lt" | "le" | "gt" | "ge" if args.len() == 2 => {
                let op = match head {
                    "ne" => "!=",
                    "lt" => "<",
                    "le" => "<=",
                    "gt" => ">",
                    _ => ">=",
                };
                format!("({} {op} {})", args[0], args[1])
            }
            "not" if args.len() == 1 => format!("(not {})", args[0]),
            "and" | "or" if !args.is_empty() => format!("({})", args.join(&format!(" {head} "))),
            "html" | "urlquery" | "js" if !args.is_empty() => {
                format!("({}|{head})", args.join(" ~ "))
            }
            "len" if args.len() == 1 => format!("({}|length)", args[0]),
            "print" if !args.is_empty() => format!("({})", args.join(" ~ ")),
            "println" if !args.is_empty() => format!("({} ~ \"\\n\")", args.join(" ~ ")),
            "eq" | "ne" | "lt" | "le" | "gt" | "ge" | "not" | "and" | "or" | "html"
            | "urlquery" | "js" | "len" | "print" | "println" => return Err(arity_error()),
            "printf" | "call" | "index" | "slice" => {
                return Err(TemplateError::Unsupported {
                    action: action.to_string(),
                    offset,
                })
            }
            _ => return Err(malformed(action, offset)),
        };
        Ok(expr)
    }

    fn operand(&self, word: &str, action: &str, offset: usize) -> Result<String, TemplateError> {
        if let Some(inner) = word.strip_prefix('(').and_then(|w| w.strip_suffix(')')) {
            return Ok(format!("({})", self.pipeline(inner, action, offset)?));
        }
        if word == "." {
            return self.dot().ok_or_else(|| malformed(action, offset));
        }
        if let Some(field) = word.strip_prefix('.') {
            if !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(malformed(action, offset));
            }
            if !TemplateContext::FIELDS.contains(&field) {
                return Err(TemplateError::UnknownField {
                    field: field.to_string(),
                    offset,
                });
            }
            return Ok(field.to_string());
        }
        if word.len() >= 2 && word.starts_with('"') && word.ends_with('"') {
            return Ok(word.to_string());
        }
        if let Some(raw) = word.strip_prefix('`').and_then(|w| w.strip_suffix('`')) {
            let mut literal = String::with_capacity(raw.len() + 2);
            push_string_literal(&mut literal, raw);
            return Ok(literal);
        }
        match word {
            "true" | "false" => return Ok(word.to_string()),
            "nil" => return Ok("none".to_string()),
            _ => {}
        }
        if word.parse::<f64>().is_ok() {
            return Ok(word.to_string());
        }
        Err(malformed(action, offset))
    }
}

fn malformed(action: &str, offset: usize) -> TemplateError {
    TemplateError::Malformed {
        action: action.to_string(),
        offset,
    }
}

fn is_function_name(word: &str) -> bool {
    word.starts_with(|c: char| c.is_ascii_alphabetic())
        && word.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !matches!(word, "true" | "false" | "nil")
}

/// Split `src` at separators that sit outside quotes and parentheses, dropping
/// empty pieces when the separator is whitespace. `None` when quotes or
/// parentheses are unbalanced.
fn split_top_level(src: &str, is_sep: impl Fn(char) -> bool) -> Option<Vec<&str>> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0usize;

    for (i, c) in src.char_indices() {
        if let Some(q) = quote {
            match c {
                '\\' if q == '"' && !escaped => escaped = true,
                _ if c == q && !escaped => quote = None,
                _ => escaped = false,
            }
            continue;
        }
        match c {
            '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1)?,
            _ if depth == 0 && is_sep(c) => {
                pieces.push(&src[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if quote.is_some() || depth != 0 {
        return None;
    }
    pieces.push(&src[start..]);

    if is_sep(' ') {
        pieces.retain(|p| !p.is_empty());
    } else {
        pieces = pieces.into_iter().map(str::trim).collect();
    }
    Some(pieces)
}

/// Append `text` as a double-quoted Jinja string literal.
fn push_string_literal(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
}
