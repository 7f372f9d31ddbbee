use std::fmt;
use std::path::PathBuf;

/// Link flag byte for a regular file.
pub const LF_NORMAL: u8 = b'0';
/// Link flag byte for a directory.
pub const LF_DIR: u8 = b'5';

/// The header layout an entry is encoded with (or was decoded from).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HeaderDialect {
    /// Pre-POSIX (v7) headers: no magic, no user/group names, 100-byte names.
    LegacyUnix,
    /// POSIX.1-1988 ustar, with the 155-byte name prefix.
    #[default]
    UsTar,
    /// GNU tar's ustar variant.
    Gnu,
}

impl HeaderDialect {
    /// Longest name that can be stored, assuming a suitable `/` to split at.
    pub const fn max_name_len(self) -> usize {
        match self {
            HeaderDialect::LegacyUnix => crate::header::NAME_LEN,
            HeaderDialect::UsTar | HeaderDialect::Gnu => {
                crate::header::NAME_LEN + crate::header::PREFIX_LEN
            }
        }
    }

    pub const fn has_ustar_fields(self) -> bool {
        !matches!(self, HeaderDialect::LegacyUnix)
    }
}

impl fmt::Display for HeaderDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HeaderDialect::LegacyUnix => "v7",
            HeaderDialect::UsTar => "ustar",
            HeaderDialect::Gnu => "gnu",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Normal,
    Directory,
}

/// One archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Full path, `/`-separated, no leading separator. Directory names built
    /// from the filesystem carry a trailing `/`.
    pub name: String,

    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub uname: String,
    pub gname: String,

    /// Content length in bytes. Ignored for directories, see [`Entry::content_size`].
    pub size: u64,

    /// Seconds since the Unix epoch.
    pub mod_time: u64,

    pub kind: EntryKind,

    /// The raw link flag byte as stored in the header. Flags other than
    /// normal and directory decode as [`EntryKind::Normal`] but keep their byte here.
    pub link_flag: u8,

    pub link_name: String,
    pub dialect: HeaderDialect,
    pub dev_major: u32,
    pub dev_minor: u32,

    /// Backing file or directory on the local filesystem, for entries being written.
    pub source: Option<PathBuf>,
}

impl Entry {
    /// A regular file entry with `size` bytes of content to follow.
    pub fn file<S: Into<String>>(name: S, size: u64) -> Entry {
        Entry {
            name: name.into(),
            mode: crate::fs::DEFAULT_FILE_MODE,
            size,
            kind: EntryKind::Normal,
            link_flag: LF_NORMAL,
            ..Entry::empty()
        }
    }

    pub fn directory<S: Into<String>>(name: S) -> Entry {
        Entry {
            name: name.into(),
            mode: crate::fs::DEFAULT_DIR_MODE,
            kind: EntryKind::Directory,
            link_flag: LF_DIR,
            ..Entry::empty()
        }
    }

    fn empty() -> Entry {
        Entry {
            name: String::new(),
            mode: 0,
            uid: 0,
            gid: 0,
            uname: String::new(),
            gname: String::new(),
            size: 0,
            mod_time: 0,
            kind: EntryKind::Normal,
            link_flag: LF_NORMAL,
            link_name: String::new(),
            dialect: HeaderDialect::default(),
            dev_major: 0,
            dev_minor: 0,
            source: None,
        }
    }

    pub fn with_dialect(mut self, dialect: HeaderDialect) -> Entry {
        self.dialect = dialect;
        self
    }

    pub fn with_mode(mut self, mode: u32) -> Entry {
        self.mode = mode;
        self
    }

    pub fn with_mod_time(mut self, mod_time: u64) -> Entry {
        self.mod_time = mod_time;
        self
    }

    #[inline(always)]
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Number of content bytes that follow the header: always 0 for directories.
    #[inline(always)]
    pub fn content_size(&self) -> u64 {
        match self.kind {
            EntryKind::Directory => 0,
            EntryKind::Normal => self.size,
        }
    }
}
