//! Dependency injection into the generated manifest

use std::fs;
use std::path::Path;

use crate::errors::CheckError;

/// Insert `declaration` on the line after the exact `header` line.
///
/// The header must already exist. A missing header means the scaffold
/// template changed shape, which is reported rather than repaired.
pub fn inject_dependency_line(
    manifest: &Path,
    header: &str,
    declaration: &str,
) -> Result<(), CheckError> {
    let content = fs::read_to_string(manifest)
        .map_err(|e| CheckError::manifest(manifest, format!("cannot read: {e}")))?;

    let updated = insert_after_header(&content, header, declaration)
        .ok_or_else(|| CheckError::manifest(manifest, format!("{header} table not found")))?;

    fs::write(manifest, updated)
        .map_err(|e| CheckError::manifest(manifest, format!("cannot write: {e}")))
}

/// Returns `None` when no line equals `header` exactly (ignoring the line ending).
fn insert_after_header(content: &str, header: &str, declaration: &str) -> Option<String> {
    let mut lines: Vec<&str> = content.lines().collect();
    let index = lines.iter().position(|line| *line == header)?;
    lines.insert(index + 1, declaration);

    let mut out = lines.join("\n");
    out.push('\n');
    Some(out)
}
