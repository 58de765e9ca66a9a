//! Writes generated tests to disk.

use std::path::Path;

use tracing::{info, instrument};

use testsmith_shared::{Result, TestsmithError};

/// Replace the contents of `path` with `text`.
///
/// Writes a sibling temp file and renames it over the target. Parent
/// directories are created.
#[instrument(skip(text), fields(path = %path.display(), chars = text.len()))]
pub fn write_output(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| TestsmithError::io(parent, e))?;
    }

    let mut temp_name = path
        .file_name()
        .ok_or_else(|| TestsmithError::config(format!("{} is not a file path", path.display())))?
        .to_os_string();
    temp_name.push(".tmp");
    let temp = path.with_file_name(temp_name);

    if let Err(e) = std::fs::write(&temp, text) {
        std::fs::remove_file(&temp).ok();
        return Err(TestsmithError::io(&temp, e));
    }
    if let Err(e) = std::fs::rename(&temp, path) {
        std::fs::remove_file(&temp).ok();
        return Err(TestsmithError::io(path, e));
    }

    info!("output written");
    Ok(())
}
