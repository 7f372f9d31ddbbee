use std::path::{Path, PathBuf};

use miette::Diagnostic;
use ustar_format::ArchiveError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("Cannot open archive `{}`", .path.display())]
    OpenArchive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot create archive `{}`", .path.display())]
    CreateArchive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive `{}` already exists", .path.display())]
    #[diagnostic(help("Use --force to overwrite it"))]
    ArchiveExists { path: PathBuf },

    #[error("Refusing to add the archive `{}` to itself", .path.display())]
    SelfReference { path: PathBuf },

    #[error("Cannot read archive `{}`{location}", .path.display())]
    #[diagnostic(help("Is this a tar file? Try --block-size if it was written with unusual blocking"))]
    ReadArchive {
        path: PathBuf,
        location: String,
        #[source]
        source: ArchiveError,
    },

    #[error("Cannot extract archive `{}`{location}", .path.display())]
    Extract {
        path: PathBuf,
        location: String,
        #[source]
        source: ArchiveError,
    },

    #[error("Cannot add `{}` to the archive", .path.display())]
    AddPath {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },

    #[error("Cannot finish archive `{}`", .path.display())]
    FinishArchive {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },

    #[error("Cannot write JSON output")]
    Json(#[from] serde_json::Error),
}

/// ` at block B, record R` when the library knows where the problem was.
fn location(source: &ArchiveError) -> String {
    source
        .position()
        .map(|(block, record)| format!(" at block {}, record {}", block, record))
        .unwrap_or_default()
}

impl Error {
    pub fn read(path: &Path, source: ArchiveError) -> Self {
        Error::ReadArchive {
            path: path.to_path_buf(),
            location: location(&source),
            source,
        }
    }

    pub fn extract(path: &Path, source: ArchiveError) -> Self {
        Error::Extract {
            path: path.to_path_buf(),
            location: location(&source),
            source,
        }
    }
}
