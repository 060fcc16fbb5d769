//! Output path checks run before the CLI writes a snapshot or document.
//!
//! Snapshot packing deletes an existing output file first, so a mistyped
//! output path must never land on the data it was packed from.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

/// Absolute, symlink-resolved form of `path`, resolving through the nearest
/// existing ancestor when the path itself does not exist yet.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) if parent != absolute => resolve(parent).join(name),
        _ => absolute,
    }
}

/// Validates that an output path is safe to overwrite.
///
/// Checks:
/// - Output must carry `extension` (case-insensitive, e.g. "sqlite3", "pdf")
/// - Output cannot be any of `source_files`
/// - Output cannot lie inside any of `source_dirs`
pub fn validate_output_path(
    output: &Path,
    extension: &str,
    source_files: &[&Path],
    source_dirs: &[&Path],
) -> Result<()> {
    let actual = output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    if !actual.eq_ignore_ascii_case(extension) {
        bail!(
            "Safety check failed: output file '{}' must have a .{} extension",
            output.display(),
            extension
        );
    }

    let resolved = resolve(output);
    for source in source_files {
        if resolved == resolve(source) {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    for dir in source_dirs {
        if resolved.starts_with(resolve(dir)) {
            bail!(
                "Safety check failed: output '{}' is inside source data directory '{}'",
                output.display(),
                dir.display()
            );
        }
    }

    Ok(())
}
