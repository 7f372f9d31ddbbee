//! Reading and writing of tar archives in the legacy Unix (v7), POSIX ustar
//! and GNU header dialects.
//!
//! Use [ArchiveReader][ArchiveReader] to stream entries out of an archive and
//! [ArchiveWriter][ArchiveWriter] to emit them. [Archive][Archive] ties either
//! one to the local filesystem for whole-tree `extract` and `add`.

/// Size of a tar record in bytes.
pub const RECORD_SIZE: usize = 512;

/// Records per transport block unless configured otherwise (10240-byte blocks).
pub const DEFAULT_RECORDS_PER_BLOCK: usize = 20;

#[cfg(any(feature = "reader", feature = "writer"))]
pub mod archive;
pub mod buffer;
pub mod entry;
pub mod error;
pub mod fs;
pub mod header;
pub mod path;

#[cfg(any(feature = "reader", feature = "writer"))]
pub use archive::Archive;
#[cfg(feature = "reader")]
pub use archive::{ArchiveReader, ExtractOptions, ReaderOptions};
#[cfg(feature = "writer")]
pub use archive::{AddOptions, ArchiveWriter, WriterOptions};
pub use buffer::{is_eof_record, Record, RecordReader, RecordWriter};
pub use entry::{Entry, EntryKind, HeaderDialect};
pub use error::{ArchiveError, HeaderError};
pub use fs::{Host, NativeHost};
pub use header::HeaderChecksum;
