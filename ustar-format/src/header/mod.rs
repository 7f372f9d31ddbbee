//! The 512-byte tar header, in legacy Unix, ustar and GNU dialects.
//!
//! | Field    | Offset | Len |
//! |----------|--------|-----|
//! | name     | 0      | 100 |
//! | mode     | 100    | 8   |
//! | uid      | 108    | 8   |
//! | gid      | 116    | 8   |
//! | size     | 124    | 12  |
//! | mtime    | 136    | 12  |
//! | checksum | 148    | 8   |
//! | linkflag | 156    | 1   |
//! | linkname | 157    | 100 |
//! | magic    | 257    | 8   |
//! | uname    | 265    | 32  |
//! | gname    | 297    | 32  |
//! | devmajor | 329    | 8   |
//! | devminor | 337    | 8   |
//! | prefix   | 345    | 155 |

pub(crate) mod field;

use std::ops::Range;

use crate::buffer::Record;
use crate::entry::{Entry, EntryKind, HeaderDialect, LF_DIR, LF_NORMAL};
use crate::error::HeaderError;
use crate::RECORD_SIZE;

use self::field::{
    parse_octal, parse_str, write_checksum, write_long_octal, write_octal, write_str,
};

pub const NAME_LEN: usize = 100;
pub const PREFIX_LEN: usize = 155;

const NAME: Range<usize> = 0..100;
const MODE: Range<usize> = 100..108;
const UID: Range<usize> = 108..116;
const GID: Range<usize> = 116..124;
const SIZE: Range<usize> = 124..136;
const MTIME: Range<usize> = 136..148;
const CHECKSUM: Range<usize> = 148..156;
const LINKFLAG: usize = 156;
const LINKNAME: Range<usize> = 157..257;
const MAGIC: Range<usize> = 257..265;
const UNAME: Range<usize> = 265..297;
const GNAME: Range<usize> = 297..329;
const DEVMAJOR: Range<usize> = 329..337;
const DEVMINOR: Range<usize> = 337..345;
const PREFIX: Range<usize> = 345..500;

/// POSIX magic followed by the "00" version.
pub const USTAR_MAGIC: &[u8; 8] = b"ustar\x0000";
/// GNU magic: bytes 262 and 263 are spaces rather than NUL and version.
pub const GNU_MAGIC: &[u8; 8] = b"ustar  \x00";

/// The checksum stored in a header next to the one computed from its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderChecksum {
    pub stored: u64,
    pub computed: u64,
}

impl HeaderChecksum {
    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.stored == self.computed
    }

    pub fn verify(&self) -> Result<(), HeaderError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(HeaderError::ChecksumMismatch {
                stored: self.stored,
                computed: self.computed,
            })
        }
    }
}

/// Unsigned byte sum of `record` with the checksum field counted as eight spaces.
pub fn checksum(record: &Record) -> u64 {
    record[..CHECKSUM.start]
        .iter()
        .chain([b' '; 8].iter())
        .chain(record[CHECKSUM.end..].iter())
        .map(|b| u64::from(*b))
        .sum()
}

/// Identifies the dialect from the magic bytes at offset 257.
pub fn detect_dialect(record: &Record) -> Result<HeaderDialect, HeaderError> {
    let magic = &record[MAGIC];

    if magic[..5].iter().all(|b| *b == 0) {
        return Ok(HeaderDialect::LegacyUnix);
    }

    if &magic[..5] == b"ustar" {
        if magic[5] == 0 {
            return Ok(HeaderDialect::UsTar);
        }
        if magic[5] != 0 && magic[6] != 0 {
            return Ok(HeaderDialect::Gnu);
        }
    }

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(magic);
    Err(HeaderError::BadMagic { magic: bytes })
}

/// Splits `name` into the `(name, prefix)` header fields.
///
/// Names of up to 100 bytes are stored whole. Longer names are split at the
/// last `/` within their final 100 bytes. A trailing `/` is only used when no
/// other slash is in range, leaving the name field empty and the whole
/// directory path in the prefix.
pub fn split_name(name: &str, dialect: HeaderDialect) -> Result<(&str, &str), HeaderError> {
    let len = name.len();
    if len <= NAME_LEN {
        return Ok((name, ""));
    }

    let too_long = || HeaderError::NameTooLong {
        name: name.to_string(),
        max: dialect.max_name_len(),
    };

    if dialect == HeaderDialect::LegacyUnix {
        return Err(too_long());
    }

    let window_start = len - NAME_LEN;
    let window = &name.as_bytes()[window_start..len - 1];
    let slash = match window.iter().rposition(|b| *b == b'/') {
        Some(i) => window_start + i,
        None if name.ends_with('/') => len - 1,
        None => return Err(too_long()),
    };

    let prefix = &name[..slash];
    if prefix.len() > PREFIX_LEN {
        return Err(HeaderError::PrefixTooLong {
            prefix: prefix.to_string(),
        });
    }

    Ok((&name[slash + 1..], prefix))
}

/// Encodes `entry` into a fresh header record.
pub fn encode(entry: &Entry) -> Result<Record, HeaderError> {
    let dialect = entry.dialect;
    let (name, prefix) = split_name(&entry.name, dialect)?;

    if entry.link_name.len() > NAME_LEN {
        return Err(HeaderError::NameTooLong {
            name: entry.link_name.clone(),
            max: NAME_LEN,
        });
    }

    let mut record = [0u8; RECORD_SIZE];

    write_str(name, &mut record[NAME]);
    write_octal("mode", u64::from(entry.mode), &mut record[MODE])?;
    write_octal("uid", u64::from(entry.uid), &mut record[UID])?;
    write_octal("gid", u64::from(entry.gid), &mut record[GID])?;
    write_long_octal("size", entry.content_size(), &mut record[SIZE])?;
    write_long_octal("mtime", entry.mod_time, &mut record[MTIME])?;
    record[CHECKSUM].fill(b' ');

    record[LINKFLAG] = match entry.kind {
        EntryKind::Directory => LF_DIR,
        EntryKind::Normal if entry.link_flag == LF_DIR => LF_NORMAL,
        EntryKind::Normal => entry.link_flag,
    };
    write_str(&entry.link_name, &mut record[LINKNAME]);

    match dialect {
        HeaderDialect::LegacyUnix => {}
        HeaderDialect::UsTar => record[MAGIC].copy_from_slice(USTAR_MAGIC),
        HeaderDialect::Gnu => record[MAGIC].copy_from_slice(GNU_MAGIC),
    }

    if dialect.has_ustar_fields() {
        write_str(&entry.uname, &mut record[UNAME]);
        write_str(&entry.gname, &mut record[GNAME]);
        write_octal("devmajor", u64::from(entry.dev_major), &mut record[DEVMAJOR])?;
        write_octal("devminor", u64::from(entry.dev_minor), &mut record[DEVMINOR])?;
        write_str(prefix, &mut record[PREFIX]);
    }

    let sum = checksum(&record);
    write_checksum(sum, &mut record[CHECKSUM])?;

    tracing::debug!(name = %entry.name, size = entry.content_size(), %dialect, "encoded header");
    Ok(record)
}

/// Decodes a header record. The checksum is reported, not enforced.
pub fn decode(record: &Record) -> Result<(Entry, HeaderChecksum), HeaderError> {
    let dialect = detect_dialect(record)?;

    let mut name = parse_str(&record[NAME]);
    if record[PREFIX.start] != 0 {
        let mut joined = parse_str(&record[PREFIX]);
        joined.push('/');
        joined.push_str(&name);
        name = joined;
    }

    let link_flag = record[LINKFLAG];
    let kind = if link_flag == LF_DIR || name.ends_with('/') {
        EntryKind::Directory
    } else {
        EntryKind::Normal
    };

    let (uname, gname, dev_major, dev_minor) = if dialect.has_ustar_fields() {
        (
            parse_str(&record[UNAME]),
            parse_str(&record[GNAME]),
            parse_octal(&record[DEVMAJOR]) as u32,
            parse_octal(&record[DEVMINOR]) as u32,
        )
    } else {
        (String::new(), String::new(), 0, 0)
    };

    let entry = Entry {
        name,
        mode: parse_octal(&record[MODE]) as u32,
        uid: parse_octal(&record[UID]) as u32,
        gid: parse_octal(&record[GID]) as u32,
        uname,
        gname,
        size: parse_octal(&record[SIZE]),
        mod_time: parse_octal(&record[MTIME]),
        kind,
        link_flag,
        link_name: parse_str(&record[LINKNAME]),
        dialect,
        dev_major,
        dev_minor,
        source: None,
    };

    let sums = HeaderChecksum {
        stored: parse_octal(&record[CHECKSUM]),
        computed: checksum(record),
    };

    tracing::debug!(
        name = %entry.name,
        size = entry.size,
        %dialect,
        checksum_ok = sums.is_valid(),
        "decoded header"
    );
    Ok((entry, sums))
}
