use std::fs::File;
use std::path::{Path, PathBuf};

use ustar_format::{AddOptions, Archive, Host, NativeHost, WriterOptions};

use crate::cli::CreateArgs;
use crate::error::{Error, Result};
use crate::util::format_size;

/// Absolute, symlink-free form of `path`. A path that does not exist yet is
/// resolved through its parent directory.
fn resolve(path: &Path) -> Option<PathBuf> {
    if let Ok(resolved) = std::fs::canonicalize(path) {
        return Some(resolved);
    }

    let file_name = path.file_name()?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::canonicalize(parent)
        .ok()
        .map(|parent| parent.join(file_name))
}

/// [`NativeHost`] that leaves the archive being written out of directory
/// listings.
struct SkipArchive {
    archive: Option<PathBuf>,
}

impl SkipArchive {
    fn new(archive: &Path) -> Self {
        SkipArchive {
            archive: resolve(archive),
        }
    }

    fn is_archive(&self, path: &Path) -> bool {
        match &self.archive {
            Some(archive) => resolve(path).map(|p| &p == archive).unwrap_or(false),
            None => false,
        }
    }
}

impl Host for SkipArchive {
    fn apply_permissions(&self, path: &Path, mode: u32) -> std::io::Result<()> {
        NativeHost.apply_permissions(path, mode)
    }

    fn list_children(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut children = NativeHost.list_children(dir)?;
        children.retain(|child| {
            let skip = self.is_archive(child);
            if skip {
                tracing::debug!(path = %child.display(), "skipping the archive itself");
            }
            !skip
        });
        Ok(children)
    }
}

pub fn run(args: CreateArgs) -> Result<()> {
    // Both refusals happen before the archive is created or truncated.
    let host = SkipArchive::new(&args.archive);
    for path in &args.paths {
        if host.is_archive(path) {
            return Err(Error::SelfReference { path: path.clone() });
        }
    }

    if args.archive.exists() && !args.force {
        return Err(Error::ArchiveExists { path: args.archive });
    }

    let file = File::create(&args.archive).map_err(|source| Error::CreateArchive {
        path: args.archive.clone(),
        source,
    })?;

    let options = AddOptions {
        dialect: args.dialect.into(),
        recurse: !args.no_recursive,
        ..Default::default()
    };
    let mut archive = Archive::writer_with(
        file,
        WriterOptions {
            records_per_block: args.records_per_block,
        },
        host,
    );

    for path in &args.paths {
        if !args.quiet {
            println!("{}", path.display());
        }
        archive
            .add(path, &options)
            .map_err(|source| Error::AddPath {
                path: path.clone(),
                source,
            })?;
    }

    let total = archive.finish().map_err(|source| Error::FinishArchive {
        path: args.archive.clone(),
        source,
    })?;

    if !args.quiet {
        println!("Wrote {} to {}", format_size(total), args.archive.display());
    }

    Ok(())
}
