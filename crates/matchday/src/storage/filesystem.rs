use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::error::StorageError;

/// Move a file from `src` to `dst`. Uses `rename` first (atomic on the same
/// filesystem). Falls back to copy + delete when rename fails, which handles
/// cross-device moves.
fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

pub fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Returns the dot-prefixed sibling used to stage writes for `path`.
///
/// Readers skip dot-prefixed entries, so a crash between staging and the
/// final rename never exposes a half-written artifact.
pub fn staging_path(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or("artifact");
    path.with_file_name(format!(".{}.{}", name, suffix))
}

pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(OsStr::to_str)
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Writes `content` to `path` through a temporary sibling and a rename.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let tmp = staging_path(path, "tmp");
    {
        let mut file = std::fs::File::create(&tmp).map_err(|e| StorageError::WriteFile {
            path: tmp.clone(),
            source: e,
        })?;
        file.write_all(content)
            .and_then(|_| file.sync_all())
            .map_err(|e| StorageError::WriteFile {
                path: tmp.clone(),
                source: e,
            })?;
    }

    move_file(&tmp, path)
}

/// Replaces the directory at `target` with the fully written `staged` directory.
///
/// An existing target is first renamed aside and only removed once the staged
/// directory is in place, so readers see either the old or the new contents.
pub fn replace_dir(staged: &Path, target: &Path) -> Result<(), StorageError> {
    if let Some(parent) = target.parent() {
        ensure_directory(parent)?;
    }

    let previous = staging_path(target, "old");
    if previous.exists() {
        remove_dir(&previous)?;
    }

    let had_previous = target.exists();
    if had_previous {
        std::fs::rename(target, &previous).map_err(|e| StorageError::MoveFile {
            from: target.to_path_buf(),
            to: previous.clone(),
            source: e,
        })?;
    }

    std::fs::rename(staged, target).map_err(|e| StorageError::MoveFile {
        from: staged.to_path_buf(),
        to: target.to_path_buf(),
        source: e,
    })?;

    if had_previous {
        remove_dir(&previous)?;
    }
    Ok(())
}

pub fn remove_dir(path: &Path) -> Result<(), StorageError> {
    std::fs::remove_dir_all(path).map_err(|e| StorageError::RemovePath {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Newest modification time of a file, or of any visible file below a directory.
///
/// Returns `None` when the path does not exist or the directory holds no files.
pub fn newest_mtime(path: &Path) -> Result<Option<SystemTime>, StorageError> {
    if !path.exists() {
        return Ok(None);
    }
    if path.is_file() {
        return Ok(modified_time(path));
    }

    let mut newest: Option<SystemTime> = None;
    let walker = WalkDir::new(path)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()));
    for entry in walker {
        let entry = entry.map_err(|e| StorageError::ScanFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(mtime) = modified_time(entry.path()) {
            newest = Some(newest.map_or(mtime, |n| n.max(mtime)));
        }
    }
    Ok(newest)
}
