//! Key file I/O.
//!
//! The key file holds the base64 master key and nothing else. New files are
//! created exclusively with owner-only permissions so two processes racing
//! to generate a key cannot overwrite each other.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Permission bits for key files on Unix.
#[cfg(unix)]
pub(crate) const KEY_FILE_MODE: u32 = 0o600;

#[cfg(unix)]
const KEY_DIR_MODE: u32 = 0o700;

const WIPE_CHUNK: usize = 8 * 1024;

/// Reads a key file. `Ok(None)` when the file does not exist.
pub(crate) fn read_key_file(path: &Path) -> io::Result<Option<Zeroizing<String>>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(Zeroizing::new(contents))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Creates the parent directory of `path`, owner-only where supported.
pub(crate) fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if parent.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(KEY_DIR_MODE);
    }
    builder.create(parent)
}

/// Writes `contents` to a new file at `path`.
///
/// Fails with `AlreadyExists` if the file is already there. A partially
/// written file is removed before the error is returned.
pub(crate) fn create_key_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    // Keep AlreadyExists meaning "the key file exists", not "a file is in
    // the way of the directory".
    ensure_parent_dir(path)
        .map_err(|e| io::Error::other(format!("cannot create key directory: {e}")))?;

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(KEY_FILE_MODE);
    }
    let mut file = options.open(path)?;

    let written = file.write_all(contents).and_then(|()| file.sync_all());
    if let Err(e) = written {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(e);
    }
    Ok(())
}

/// Overwrites the whole file with zeros, flushes, then deletes it.
///
/// On copy-on-write or journaling filesystems the old blocks may survive;
/// this only guarantees the file's current extent is overwritten.
pub(crate) fn wipe_file(path: &Path) -> io::Result<()> {
    let len = fs::metadata(path)?.len();
    {
        let mut file = OpenOptions::new().write(true).open(path)?;
        let zeros = [0u8; WIPE_CHUNK];
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(WIPE_CHUNK as u64) as usize;
            file.write_all(&zeros[..n])?;
            remaining -= n as u64;
        }
        file.sync_all()?;
    }
    fs::remove_file(path)
}

/// Whether group or other users have any access to the file.
#[cfg(unix)]
pub(crate) fn is_too_permissive(path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    let mode = fs::metadata(path)?.permissions().mode();
    Ok(mode & 0o077 != 0)
}

#[cfg(not(unix))]
pub(crate) fn is_too_permissive(_path: &Path) -> io::Result<bool> {
    Ok(false)
}

/// Restricts the file to owner read/write.
#[cfg(unix)]
pub(crate) fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(KEY_FILE_MODE))
}

#[cfg(not(unix))]
pub(crate) fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Whether `path` lies under `root`, comparing canonical forms where the
/// paths exist.
pub(crate) fn is_within(path: &Path, root: &Path) -> bool {
    if path.starts_with(root) {
        return true;
    }
    let root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    canonical_or_joined(path).starts_with(&root)
}

fn canonical_or_joined(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    // The file may not exist yet; canonicalize its directory instead.
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}
