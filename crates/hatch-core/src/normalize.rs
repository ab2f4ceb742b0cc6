//! Idempotent cleanup of generated newline-delimited word lists.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{HatchError, Result};
use crate::io::atomic_write;

/// Deduplicate, sort and strip empty entries; end with exactly one `\n`.
///
/// Entries are split on `\n` only and compared byte-wise, so the output of
/// this function is always a fixed point of it.
pub fn normalize_text(input: &str) -> String {
    let entries: BTreeSet<&str> = input.split('\n').filter(|l| !l.is_empty()).collect();
    let mut out = entries.into_iter().collect::<Vec<_>>().join("\n");
    out.push('\n');
    out
}

/// Rewrite `path` in place. Returns true if the content changed.
pub fn normalize_file(path: &Path) -> Result<bool> {
    if !path.is_file() {
        return Err(HatchError::NormalizeTargetMissing(path.to_path_buf()));
    }
    let original = std::fs::read_to_string(path)?;
    let normalized = normalize_text(&original);
    if normalized == original {
        return Ok(false);
    }
    atomic_write(path, normalized.as_bytes())?;
    Ok(true)
}
