use std::path::PathBuf;

/// Problems with the contents of a single 512-byte header.
///
/// These are caller-correctable: a rename (or a different dialect) makes an
/// encode succeed, and a decode failure never involves the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("Header magic is neither 'ustar' nor unix-style zeros: {magic:?}")]
    BadMagic { magic: [u8; 8] },

    #[error("Entry name is too long for the header (max {max} bytes). Name: '{name}'")]
    NameTooLong { name: String, max: usize },

    #[error("Entry name prefix is longer than 155 bytes. Prefix: '{prefix}'")]
    PrefixTooLong { prefix: String },

    #[error("Value {value} does not fit in the {field} field")]
    ValueTooLarge { field: &'static str, value: u64 },

    #[error("Header checksum mismatch (stored {stored:o}, computed {computed:o})")]
    ChecksumMismatch { stored: u64, computed: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("I/O failure on the archive stream")]
    Io(#[from] std::io::Error),

    #[error("Bad header in block {block}, record {record}")]
    Header {
        block: i64,
        record: usize,
        #[source]
        source: HeaderError,
    },

    #[error("Entry cannot be written")]
    InvalidEntry(#[from] HeaderError),

    #[error("Request to write {attempted} bytes exceeds the {declared} bytes declared in the header")]
    SizeExceeded { declared: u64, attempted: u64 },

    #[error("Entry closed at {written} bytes before the {declared} bytes declared in the header were written")]
    ShortWrite { declared: u64, written: u64 },

    #[error("Unexpected end of archive with {remaining} entry bytes unread")]
    UnexpectedEof { remaining: u64 },

    #[error("An entry is still open; close it first")]
    EntryOpen,

    #[error("No entry is open")]
    NoEntryOpen,

    #[error("Archive has already been finished")]
    Finished,

    #[error("Entry name resolves outside the target directory. Name: '{name}'")]
    UnsafePath { name: String },

    #[error("Creating directory failed. Path: '{}'", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Creating file failed. Path: '{}'", .path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Reading local file failed. Path: '{}'", .path.display())]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    /// The archive position (block, record) the error was detected at, if known.
    pub fn position(&self) -> Option<(i64, usize)> {
        match self {
            ArchiveError::Header { block, record, .. } => Some((*block, *record)),
            _ => None,
        }
    }

    /// The header problem behind this error, whether raised on encode or decode.
    pub fn header_error(&self) -> Option<&HeaderError> {
        match self {
            ArchiveError::Header { source, .. } => Some(source),
            ArchiveError::InvalidEntry(source) => Some(source),
            _ => None,
        }
    }
}
