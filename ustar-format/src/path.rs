//! Conversion between entry names and local paths.

use std::path::{Component, Path, PathBuf};

/// Separator used inside entry names on every platform.
pub const ENTRY_SEP: char = '/';

/// Turns an entry name into a relative path that stays inside the extraction
/// directory.
///
/// Root, prefix and `.` components are dropped and `..` pops the previous
/// component. Returns `None` if nothing is left.
pub fn sanitize(name: &str) -> Option<PathBuf> {
    let mut out: Vec<&str> = vec![];

    for component in Path::new(name).components() {
        match component {
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(os_str) => out.push(os_str.to_str()?),
        }
    }

    if out.is_empty() {
        return None;
    }

    Some(out.iter().collect())
}

/// Entry name for a local path: `/`-separated, no root, and a trailing `/`
/// for directories.
pub fn entry_name(path: &Path, is_dir: bool) -> String {
    let mut name = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(os_str) => Some(os_str.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    if is_dir && !name.is_empty() {
        name.push(ENTRY_SEP);
    }
    name
}
