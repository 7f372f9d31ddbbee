//! Filesystem collaborators: permission fixup, directory listing, and entry
//! metadata from local files.

use std::io;
use std::path::{Path, PathBuf};

use crate::entry::{Entry, HeaderDialect};

/// Default mode for files (0o644 = rw-r--r--)
pub const DEFAULT_FILE_MODE: u32 = 0o100644;
/// Default mode for directories (0o755 = rwxr-xr-x)
pub const DEFAULT_DIR_MODE: u32 = 0o40755;

/// Platform services the [`Archive`](crate::Archive) facade delegates to.
pub trait Host {
    /// Applies `mode` to `path`. Called after each file or directory is
    /// extracted; failures are logged and extraction continues.
    fn apply_permissions(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Lists the direct children of `dir`, used by recursive `add`.
    fn list_children(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;
}

/// [`Host`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeHost;

impl Host for NativeHost {
    #[cfg(unix)]
    fn apply_permissions(&self, path: &Path, mode: u32) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777))
    }

    #[cfg(not(unix))]
    fn apply_permissions(&self, _path: &Path, _mode: u32) -> io::Result<()> {
        Ok(())
    }

    /// Children sorted by name, so archives come out in a stable order.
    fn list_children(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut children = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        children.sort();
        Ok(children)
    }
}

/// Builds the entry for `path` as it should be stored under `name`.
///
/// Follows symlinks. Anything that is not a directory is archived as a
/// regular file. Directory names get a trailing `/`.
pub fn entry_from_path(path: &Path, name: String, dialect: HeaderDialect) -> io::Result<Entry> {
    let meta = std::fs::metadata(path)?;

    let mut entry = if meta.is_dir() {
        let mut name = name;
        if !name.is_empty() && !name.ends_with('/') {
            name.push('/');
        }
        Entry::directory(name)
    } else {
        Entry::file(name, meta.len())
    };
    apply_metadata(&mut entry, &meta);
    entry.dialect = dialect;
    entry.source = Some(path.to_path_buf());
    Ok(entry)
}

#[cfg(unix)]
fn apply_metadata(entry: &mut Entry, meta: &std::fs::Metadata) {
    use std::os::unix::fs::MetadataExt;

    entry.mode = meta.mode();
    entry.uid = meta.uid();
    entry.gid = meta.gid();
    entry.mod_time = u64::try_from(meta.mtime()).unwrap_or(0);
}

#[cfg(not(unix))]
fn apply_metadata(entry: &mut Entry, meta: &std::fs::Metadata) {
    if let Ok(modified) = meta.modified() {
        if let Ok(duration) = modified.duration_since(std::time::SystemTime::UNIX_EPOCH) {
            entry.mod_time = duration.as_secs();
        }
    }
}
