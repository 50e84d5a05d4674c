//! Compound office documents: rewrite the zip container member by member.
//!
//! Office formats are zip archives of XML parts (body, styles, relationships)
//! plus binary parts (media, VBA project for `.docm`/`.xlsm`). Only members the
//! [`FormatTable`] marks as template-eligible are decoded and rendered; every
//! other member is read through once to check its CRC and then copied raw,
//! compressed bytes included. Member names and order are kept exactly: some
//! readers insist on `[Content_Types].xml` being the first entry.

use std::io::{self, Cursor, Read, Write};

use tracing::debug;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::{LureError, Result};
use crate::format::FormatTable;
use crate::model::context::TemplateContext;
use crate::template::TemplateExecutor;

use super::{text, Rewritten};

/// Upper bound on the buffer reserved up front from a member's declared size.
const MAX_PREALLOC: usize = 1 << 20;

/// Rewrite the zip container in `bytes`, rendering eligible members against `ctx`.
///
/// Any failure aborts the whole rewrite; the partially built output is dropped.
pub fn rewrite_archive<E>(
    bytes: &[u8],
    ctx: &TemplateContext,
    executor: &E,
    formats: &FormatTable,
) -> Result<Rewritten>
where
    E: TemplateExecutor + ?Sized,
{
    let mut source = ZipArchive::new(Cursor::new(bytes)).map_err(LureError::Container)?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(bytes.len())));
    let mut changed = false;

    for index in 0..source.len() {
        let name = source
            .name_for_index(index)
            .unwrap_or_default()
            .to_string();

        if !formats.is_template_member(&name) {
            let mut member = source
                .by_index(index)
                .map_err(|e| member_error(&name, e))?;
            io::copy(&mut member, &mut io::sink())
                .map_err(|e| member_error(&name, ZipError::Io(e)))?;
            drop(member);

            let member = source
                .by_index_raw(index)
                .map_err(|e| member_error(&name, e))?;
            writer.raw_copy_file(member).map_err(LureError::Write)?;
            debug!(member = %name, "Copied archive member");
            continue;
        }

        let mut member = source
            .by_index(index)
            .map_err(|e| member_error(&name, e))?;
        let options = member_options(
            member.compression(),
            member.last_modified(),
            member.unix_mode(),
        );
        let declared = usize::try_from(member.size()).unwrap_or(usize::MAX);
        let mut contents = Vec::with_capacity(declared.min(MAX_PREALLOC));
        member
            .read_to_end(&mut contents)
            .map_err(|e| member_error(&name, ZipError::Io(e)))?;
        drop(member);

        let rendered = text::render_document(&contents, &name, ctx, executor)?;
        changed |= rendered.changed;
        debug!(member = %name, changed = rendered.changed, "Rendered archive member");

        writer
            .start_file(name.as_str(), options)
            .map_err(LureError::Write)?;
        writer
            .write_all(&rendered.bytes)
            .map_err(|e| LureError::Write(ZipError::Io(e)))?;
    }

    let bytes = writer.finish().map_err(LureError::Write)?.into_inner();
    Ok(Rewritten { bytes, changed })
}

fn member_error(name: &str, source: ZipError) -> LureError {
    LureError::Member {
        name: name.to_string(),
        source,
    }
}

/// Write options that mirror the source member: stored members stay stored,
/// everything else is deflated. Timestamps and unix modes carry over.
fn member_options(
    method: CompressionMethod,
    modified: Option<DateTime>,
    mode: Option<u32>,
) -> SimpleFileOptions {
    let method = match method {
        CompressionMethod::Stored => CompressionMethod::Stored,
        _ => CompressionMethod::Deflated,
    };
    let mut options = SimpleFileOptions::default().compression_method(method);
    if let Some(modified) = modified {
        options = options.last_modified_time(modified);
    }
    if let Some(mode) = mode {
        options = options.unix_permissions(mode);
    }
    options
}
