//! Path confinement for the file tools.

use std::path::{Path, PathBuf};

/// Resolve `path` and check it stays under `root`. The final component
/// may not exist yet (file_write), so the parent is what gets
/// canonicalized.
pub(crate) fn confine(path: &str, root: &Path) -> Result<PathBuf, String> {
    let requested = Path::new(path);
    let joined = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        root.join(requested)
    };

    let parent = joined.parent().unwrap_or(&joined);
    let file_name = joined.file_name();

    let canonical_parent = parent
        .canonicalize()
        .map_err(|e| format!("invalid path '{path}': {e}"))?;
    let canonical_root = root
        .canonicalize()
        .map_err(|e| format!("invalid root: {e}"))?;

    if !canonical_parent.starts_with(&canonical_root) {
        return Err(format!("path '{path}' escapes the workspace"));
    }

    Ok(match file_name {
        Some(name) => canonical_parent.join(name),
        None => canonical_parent,
    })
}
