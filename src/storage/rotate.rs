//! Hard-link based atomic file replacement.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use tracing::error;

use super::StatePathManager;
use crate::errors::StorageError;
use crate::Result;

fn create_parent_dir_if_missing(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("failed to create state directory {:?}: {}", parent, e);
                return Err(StorageError::Io(e).into());
            }
        }
    }
    Ok(())
}

fn path_err(
    path: &Path,
    source: std::io::Error,
) -> crate::Error {
    StorageError::Path {
        path: PathBuf::from(path),
        source,
    }
    .into()
}

/// Write `bytes` into `<name>.new`, then rotate: drop the previous `.old`,
/// hard-link the current file as `.old`, hard-link `.new` into place and
/// unlink it. A write failure discards the `.new` file and leaves the
/// previously persisted file untouched. Callers hold the file lock.
pub(crate) fn write_and_rotate(
    base_dir: &Path,
    name: &str,
    bytes: &[u8],
) -> Result<()> {
    let paths = StatePathManager::new(base_dir.to_path_buf());
    let new = paths.new_file(name);
    let current = paths.current(name);
    let old = paths.old(name);

    create_parent_dir_if_missing(&new)?;

    let write_result = fs::File::create(&new)
        .and_then(|mut f| {
            f.write_all(bytes)?;
            f.sync_all()
        })
        .map_err(|e| path_err(&new, e));
    if let Err(e) = write_result {
        let _ = fs::remove_file(&new);
        return Err(e);
    }

    if old.exists() {
        fs::remove_file(&old).map_err(|e| path_err(&old, e))?;
    }
    if current.exists() {
        fs::hard_link(&current, &old).map_err(|e| path_err(&old, e))?;
        fs::remove_file(&current).map_err(|e| path_err(&current, e))?;
    }
    fs::hard_link(&new, &current).map_err(|e| path_err(&current, e))?;
    fs::remove_file(&new).map_err(|e| path_err(&new, e))?;
    Ok(())
}
