//! Import injection into the generated entry source
//!
//! The insertion point depends on the scaffold template's layout. With
//! [`ImportAnchor::AfterLineContaining`] it is found by content; with
//! [`ImportAnchor::Line`] it is a fixed offset that only holds for the
//! template revision it was measured against. Either way, an anchor that
//! cannot be honoured is an error, never a silent append.

use std::fs;
use std::path::Path;

use crate::config::ImportAnchor;
use crate::errors::CheckError;

pub fn inject_import_line(
    entry: &Path,
    anchor: &ImportAnchor,
    import: &str,
) -> Result<(), CheckError> {
    let content = fs::read_to_string(entry)
        .map_err(|e| CheckError::source_edit(entry, format!("cannot read: {e}")))?;

    let updated =
        insert_at_anchor(&content, anchor, import).map_err(|d| CheckError::source_edit(entry, d))?;

    fs::write(entry, updated)
        .map_err(|e| CheckError::source_edit(entry, format!("cannot write: {e}")))
}

fn insert_at_anchor(content: &str, anchor: &ImportAnchor, import: &str) -> Result<String, String> {
    let mut lines: Vec<&str> = content.lines().collect();

    let index = match anchor {
        ImportAnchor::AfterLineContaining(marker) => {
            let found = lines
                .iter()
                .position(|line| line.contains(marker.as_str()))
                .ok_or_else(|| format!("no line containing {marker:?}"))?;
            found + 1
        }
        ImportAnchor::Line(offset) => {
            if *offset > lines.len() {
                return Err(format!(
                    "line offset {offset} is past the end of the file ({} lines)",
                    lines.len()
                ));
            }
            *offset
        }
    };

    lines.insert(index, import);
    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}
