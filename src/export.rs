//! Writing rendered per-recipient copies to disk.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{LureError, Result};

/// Output file name for one recipient's copy: `{rid}_{file name}`.
///
/// Only the final component of `name` is used. Recipient ids must not contain
/// path separators or `..`, so every copy stays inside the output directory.
pub fn recipient_file_name(rid: &str, name: &str) -> Result<String> {
    if rid.is_empty() || rid.contains(['/', '\\', '\0']) || rid.contains("..") {
        return Err(LureError::InvalidPath(format!("recipient id '{rid}'")));
    }

    let file_name = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .filter(|n| !n.is_empty() && *n != "." && *n != ".." && !n.contains('\0'))
        .ok_or_else(|| LureError::InvalidPath(format!("attachment name '{name}'")))?;
    Ok(format!("{rid}_{file_name}"))
}

/// Write `bytes` as `rid`'s copy of `name` inside `output_dir`.
///
/// Fails rather than overwrite, so duplicate recipient ids in one batch are
/// reported instead of silently clobbering each other.
pub fn write_recipient_copy(
    output_dir: &Path,
    rid: &str,
    name: &str,
    bytes: &[u8],
) -> Result<PathBuf> {
    let path = output_dir.join(recipient_file_name(rid, name)?);
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| LureError::io(&path, e))?;
    file.write_all(bytes).map_err(|e| LureError::io(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name() {
        assert_eq!(
            recipient_file_name("0000001", "invoice.docx").unwrap(),
            "0000001_invoice.docx"
        );
    }

    #[test]
    fn test_directories_in_name_are_dropped() {
        assert_eq!(
            recipient_file_name("r1", "../../etc/cron.d/job.txt").unwrap(),
            "r1_job.txt"
        );
        assert_eq!(
            recipient_file_name("r1", "C:\\Users\\x\\lure.html").unwrap(),
            "r1_lure.html"
        );
    }

    #[test]
    fn test_unusable_names_rejected() {
        for name in ["", "dir/", "..", "a/.."] {
            assert!(
                matches!(recipient_file_name("r1", name), Err(LureError::InvalidPath(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_unsafe_rids_rejected() {
        for rid in ["", "../x", "a/b", "a\\b", "..", "a..b"] {
            assert!(
                matches!(recipient_file_name(rid, "a.txt"), Err(LureError::InvalidPath(_))),
                "{rid:?} should be rejected"
            );
        }
    }
}
