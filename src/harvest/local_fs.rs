use std::fs;
use std::path::Path;

use crate::error::HarvestError;

/// Make sure the directory holding `target` exists. The target itself is
/// never created or touched.
pub fn ensure_parent_dir(target: &Path) -> Result<(), HarvestError> {
    let Some(parent) = target.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent.is_dir() {
        tracing::debug!(dir = %parent.display(), "directory exists");
        return Ok(());
    }
    fs::create_dir_all(parent).map_err(|err| HarvestError::filesystem(parent, err))?;
    tracing::info!(dir = %parent.display(), "created directory");
    Ok(())
}
