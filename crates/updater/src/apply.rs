use crate::error::{Result, UpdaterError};
use crate::plan::UpdateTarget;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Permission bits given to installed binaries.
#[cfg(unix)]
const BINARY_MODE: u32 = 0o775;

type Rename<'a> = &'a dyn Fn(&Path, &Path) -> io::Result<()>;

/// Replace the binary at `target_path` with `bytes`.
///
/// The new binary is staged next to the target and renamed into place, so the
/// path always holds either the old or the new file. The old binary is moved
/// to a backup first and moved back if the final rename fails.
pub fn install_binary(target: &UpdateTarget, bytes: &[u8], target_path: &Path) -> Result<()> {
    install_binary_with(target, bytes, target_path, &|from: &Path, to: &Path| {
        fs::rename(from, to)
    })
}

fn install_binary_with(
    target: &UpdateTarget,
    bytes: &[u8],
    target_path: &Path,
    rename: Rename<'_>,
) -> Result<()> {
    let write_error = |source: io::Error| UpdaterError::Write {
        target: target.to_string(),
        path: target_path.to_path_buf(),
        source,
    };

    let parent = target_path
        .parent()
        .ok_or_else(|| UpdaterError::validation("target path must have a parent directory"))?;

    // Dropping the staged path removes the temporary file on every early return.
    let staged = stage(bytes, parent).map_err(write_error)?;

    let backup = backup_path(target_path);
    let had_previous = target_path.exists();
    if had_previous {
        if backup.exists() {
            fs::remove_file(&backup).map_err(write_error)?;
        }
        rename(target_path, &backup).map_err(write_error)?;
    }

    if let Err(source) = rename(&staged, target_path) {
        if had_previous {
            if let Err(rollback) = rename(&backup, target_path) {
                tracing::error!(
                    binary = %target,
                    path = %target_path.display(),
                    backup = %backup.display(),
                    error = %source,
                    rollback_error = %rollback,
                    "failed to restore previous binary after a failed update; installation may be unusable"
                );
                return Err(UpdaterError::CriticalRollback {
                    target: target.to_string(),
                    backup,
                    source,
                    rollback,
                });
            }
            tracing::warn!(binary = %target, error = %source, "update rename failed, previous binary restored");
        }
        return Err(write_error(source));
    }

    if had_previous {
        // A running image cannot be deleted on some platforms; leave it behind.
        if let Err(err) = fs::remove_file(&backup) {
            tracing::warn!("failed to remove old binary {:?}: {}", backup, err);
        }
    }
    Ok(())
}

fn stage(bytes: &[u8], dir: &Path) -> io::Result<tempfile::TempPath> {
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = temp.as_file().metadata()?.permissions();
        perms.set_mode(BINARY_MODE);
        temp.as_file().set_permissions(perms)?;
    }

    Ok(temp.into_temp_path())
}

/// Location the previous binary is parked at while the new one is moved in.
pub fn backup_path(target_path: &Path) -> PathBuf {
    let name = target_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    target_path.with_file_name(format!(".{name}.old"))
}
