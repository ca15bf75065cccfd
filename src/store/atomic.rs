use crate::error::AppError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Reads a JSON document; `Ok(None)` when the file does not exist.
///
/// An empty, unreadable-as-UTF-8 or unparsable file is a
/// [`AppError::StateCorruption`].
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, AppError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| AppError::StateCorruption {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Replaces `path` with the pretty-printed JSON of `value`.
///
/// The document is written to a temp file in the same directory, synced,
/// and renamed over the target, so readers see the old or the new file
/// and never a torn one. Temp files are created owner-only on unix.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut file, value).map_err(|e| AppError::InternalError {
        message: format!("could not serialize state for {}", path.display()),
        source: Some(Box::new(e)),
    })?;
    file.write_all(b"\n")?;
    file.as_file().sync_all()?;
    file.persist(path)?;

    log::debug!("Wrote {}", path.display());
    Ok(())
}

/// Restricts `path` to its owner (0600). No-op off unix.
pub(crate) fn restrict_to_owner(path: &Path) -> Result<(), AppError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
