use std::fs;
use std::path::Path;

use crate::error::HarvestError;
use crate::harvest::store::{PDF_MIME, RemoteStore, UploadReceipt};

/// Upload `local_path` into `folder_id` under its own base name, then delete
/// the local copy. The file is removed only once the store has reported a
/// success status; on any upload failure it stays where it is.
pub fn upload_and_clean<S>(
    store: &mut S,
    local_path: &Path,
    folder_id: &str,
) -> Result<UploadReceipt, HarvestError>
where
    S: RemoteStore + ?Sized,
{
    let upload_error = |reason: String| HarvestError::Upload {
        path: local_path.to_path_buf(),
        reason,
    };

    let name = local_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| upload_error("local path has no usable file name".to_string()))?;
    let bytes = fs::read(local_path).map_err(|err| upload_error(format!("read failed: {err}")))?;

    let receipt = store
        .upload(name, PDF_MIME, bytes, folder_id)
        .map_err(|err| upload_error(err.to_string()))?;
    if !receipt.is_success() {
        tracing::error!(
            path = %local_path.display(),
            status = receipt.status,
            "upload rejected; keeping local file"
        );
        return Err(upload_error(format!("store answered status {}", receipt.status)));
    }
    tracing::info!(
        path = %local_path.display(),
        folder = folder_id,
        file_id = receipt.file_id.as_deref().unwrap_or("-"),
        "uploaded document"
    );

    fs::remove_file(local_path).map_err(|err| HarvestError::filesystem(local_path, err))?;
    tracing::info!(path = %local_path.display(), "deleted local copy after upload");
    Ok(receipt)
}
