use std::io::Read;

use crate::buffer::{is_eof_record, RecordReader};
use crate::entry::Entry;
use crate::error::ArchiveError;
use crate::header::{self, HeaderChecksum};
use crate::{DEFAULT_RECORDS_PER_BLOCK, RECORD_SIZE};

/// Options for reading an archive.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Records per transport block.
    pub records_per_block: usize,
    /// Fail `next_entry` when a header's stored checksum does not match its bytes.
    pub verify_checksums: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            records_per_block: DEFAULT_RECORDS_PER_BLOCK,
            verify_checksums: false,
        }
    }
}

/// Sequential reader over the entries of a tar stream.
///
/// Call [`ArchiveReader::next_entry`] to advance, then [`ArchiveReader::read`]
/// (or the [`Read`] impl) for the entry's content. Unread content is skipped
/// on the next advance.
pub struct ArchiveReader<R> {
    records: RecordReader<R>,
    options: ReaderOptions,
    current: Option<Entry>,
    checksum: Option<HeaderChecksum>,
    entry_remaining: u64,
    entry_consumed: u64,
    pending: Vec<u8>,
    hit_eof: bool,
}

impl<R> std::fmt::Debug for ArchiveReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("records", &self.records)
            .field("current", &self.current.as_ref().map(|e| &e.name))
            .field("entry_remaining", &self.entry_remaining)
            .field("entry_consumed", &self.entry_consumed)
            .field("hit_eof", &self.hit_eof)
            .finish_non_exhaustive()
    }
}

impl<R: Read> ArchiveReader<R> {
    pub fn new(source: R) -> Self {
        Self::with_options(source, ReaderOptions::default())
    }

    pub fn with_options(source: R, options: ReaderOptions) -> Self {
        ArchiveReader {
            records: RecordReader::with_blocking(source, options.records_per_block),
            options,
            current: None,
            checksum: None,
            entry_remaining: 0,
            entry_consumed: 0,
            pending: Vec::new(),
            hit_eof: false,
        }
    }

    /// Advances to the next entry, skipping whatever is left of the current one.
    ///
    /// Returns `Ok(None)` at the end-of-archive record or when the stream ends.
    /// After a header error the reader stops and yields `Ok(None)` from then on.
    pub fn next_entry(&mut self) -> Result<Option<Entry>, ArchiveError> {
        if self.hit_eof {
            return Ok(None);
        }

        if self.current.is_some() {
            self.skip_remaining()?;
        }
        self.current = None;
        self.checksum = None;
        self.pending.clear();

        let record = match self.records.read_record()? {
            Some(record) if !is_eof_record(&record) => record,
            _ => {
                tracing::debug!(block = self.records.block_index(), "end of archive");
                self.hit_eof = true;
                return Ok(None);
            }
        };

        let decoded = header::decode(&record).and_then(|(entry, sums)| {
            if self.options.verify_checksums {
                sums.verify()?;
            }
            Ok((entry, sums))
        });

        let (entry, sums) = match decoded {
            Ok(decoded) => decoded,
            Err(source) => {
                self.hit_eof = true;
                self.entry_remaining = 0;
                self.entry_consumed = 0;
                return Err(ArchiveError::Header {
                    block: self.records.block_index(),
                    record: self.records.record_index(),
                    source,
                });
            }
        };

        self.entry_remaining = entry.content_size();
        self.entry_consumed = 0;
        self.checksum = Some(sums);
        self.current = Some(entry.clone());
        Ok(Some(entry))
    }

    /// Reads content of the current entry into `buf`, returning 0 once the
    /// entry is exhausted.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, ArchiveError> {
        if self.entry_remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let wanted = usize::try_from(self.entry_remaining)
            .map(|remaining| remaining.min(buf.len()))
            .unwrap_or(buf.len());
        let mut filled = 0;

        if !self.pending.is_empty() {
            let n = self.pending.len().min(wanted);
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            filled = n;
        }

        while filled < wanted {
            let record = match self.records.read_record()? {
                Some(record) => record,
                None => {
                    return Err(ArchiveError::UnexpectedEof {
                        remaining: self.entry_remaining - filled as u64,
                    })
                }
            };

            let n = (wanted - filled).min(RECORD_SIZE);
            buf[filled..filled + n].copy_from_slice(&record[..n]);
            if n < RECORD_SIZE {
                self.pending.extend_from_slice(&record[n..]);
            }
            filled += n;
        }

        self.entry_remaining -= filled as u64;
        self.entry_consumed += filled as u64;
        Ok(filled)
    }

    /// Discards the rest of the current entry's content.
    fn skip_remaining(&mut self) -> Result<(), ArchiveError> {
        let mut scratch = [0u8; 8 * 1024];
        while self.entry_remaining > 0 {
            self.read(&mut scratch)?;
        }
        Ok(())
    }

    /// The entry most recently returned by [`ArchiveReader::next_entry`].
    #[inline(always)]
    pub fn current_entry(&self) -> Option<&Entry> {
        self.current.as_ref()
    }

    /// Stored and computed checksums of the current entry's header.
    #[inline(always)]
    pub fn header_checksum(&self) -> Option<HeaderChecksum> {
        self.checksum
    }

    /// Content bytes of the current entry not read yet.
    #[inline(always)]
    pub fn remaining(&self) -> u64 {
        self.entry_remaining
    }

    #[inline(always)]
    pub fn consumed(&self) -> u64 {
        self.entry_consumed
    }

    /// Current `(block, record)` position, for diagnostics.
    pub fn position(&self) -> (i64, usize) {
        (self.records.block_index(), self.records.record_index())
    }

    /// Iterator over the remaining entries' headers. Content is skipped.
    pub fn entries(&mut self) -> Entries<'_, R> {
        Entries { reader: self }
    }

    pub fn into_inner(self) -> R {
        self.records.into_inner()
    }
}

impl<R: Read> Read for ArchiveReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        ArchiveReader::read(self, buf).map_err(|e| match e {
            ArchiveError::Io(e) => e,
            e @ ArchiveError::UnexpectedEof { .. } => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, e)
            }
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        })
    }
}

/// Iterator returned by [`ArchiveReader::entries`].
pub struct Entries<'a, R> {
    reader: &'a mut ArchiveReader<R>,
}

impl<R: Read> Iterator for Entries<'_, R> {
    type Item = Result<Entry, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_entry().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Record;
    use crate::error::HeaderError;

    fn archive(entries: &[(Entry, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        for (entry, data) in entries {
            out.extend_from_slice(&header::encode(entry).unwrap());
            out.extend_from_slice(data);
            let pad = (RECORD_SIZE - data.len() % RECORD_SIZE) % RECORD_SIZE;
            out.extend(std::iter::repeat(0).take(pad));
        }
        out.extend_from_slice(&[0u8; RECORD_SIZE]);
        out
    }

    #[test]
    fn reads_entry_content() {
        let data = archive(&[(Entry::file("a/b/c.txt", 5), &b"hello"[..])]);
        let mut reader = ArchiveReader::new(&data[..]);

        let entry = reader.next_entry().unwrap().unwrap();
        assert_eq!(entry.name, "a/b/c.txt");
        assert_eq!(entry.size, 5);

        let mut buf = [0u8; 64];
        assert_eq!(reader.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert!(reader.next_entry().unwrap().is_none());
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn small_reads_use_pending_bytes() {
        let content: Vec<u8> = (0..1300u32).map(|i| (i % 251) as u8).collect();
        let data = archive(&[(Entry::file("f", content.len() as u64), &content[..])]);
        let mut reader = ArchiveReader::new(&data[..]);
        reader.next_entry().unwrap().unwrap();

        let mut out = Vec::new();
        let mut buf = [0u8; 7];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, content);
        assert_eq!(reader.consumed(), 1300);
    }

    #[test]
    fn unread_content_is_skipped() {
        let big = vec![0xabu8; 2000];
        let data = archive(&[
            (Entry::file("big", big.len() as u64), &big[..]),
            (Entry::directory("dir/"), &b""[..]),
            (Entry::file("small", 3), &b"xyz"[..]),
        ]);
        let mut reader = ArchiveReader::new(&data[..]);

        let names: Vec<String> = reader
            .entries()
            .map(|entry| entry.unwrap().name)
            .collect();
        assert_eq!(names, ["big", "dir/", "small"]);
    }

    #[test]
    fn partially_read_entry_is_skipped() {
        let big = vec![0x11u8; 1500];
        let data = archive(&[
            (Entry::file("big", big.len() as u64), &big[..]),
            (Entry::file("next", 2), &b"ok"[..]),
        ]);
        let mut reader = ArchiveReader::new(&data[..]);
        reader.next_entry().unwrap();
        let mut buf = [0u8; 100];
        reader.read(&mut buf).unwrap();

        let next = reader.next_entry().unwrap().unwrap();
        assert_eq!(next.name, "next");
        let mut out = Vec::new();
        std::io::Read::read_to_end(&mut reader, &mut out).unwrap();
        assert_eq!(out, b"ok");
    }

    #[test]
    fn truncated_content_is_unexpected_eof() {
        let mut data = header::encode(&Entry::file("f", 4096)).unwrap().to_vec();
        data.extend_from_slice(&[1u8; RECORD_SIZE]);

        // One block per record so the missing data is a missing block.
        let options = ReaderOptions {
            records_per_block: 1,
            ..Default::default()
        };
        let mut reader = ArchiveReader::with_options(&data[..], options);
        reader.next_entry().unwrap().unwrap();

        let mut buf = vec![0u8; 4096];
        match reader.read(&mut buf) {
            Err(ArchiveError::UnexpectedEof { remaining }) => assert_eq!(remaining, 4096 - 512),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn bad_magic_stops_the_reader() {
        let mut record: Record = header::encode(&Entry::file("f", 0)).unwrap();
        record[257..265].copy_from_slice(b"nottar!!");
        let mut data = record.to_vec();
        data.extend_from_slice(&header::encode(&Entry::file("g", 0)).unwrap());

        let mut reader = ArchiveReader::new(&data[..]);
        match reader.next_entry() {
            Err(ArchiveError::Header {
                block: 0,
                record: 0,
                source: HeaderError::BadMagic { .. },
            }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn checksum_is_exposed_and_optionally_enforced() {
        let mut data = archive(&[(Entry::file("f", 0), &b""[..])]);
        data[0] = b'g';

        let mut lenient = ArchiveReader::new(&data[..]);
        let entry = lenient.next_entry().unwrap().unwrap();
        assert_eq!(entry.name, "g");
        assert!(!lenient.header_checksum().unwrap().is_valid());

        let options = ReaderOptions {
            verify_checksums: true,
            ..Default::default()
        };
        let mut strict = ArchiveReader::with_options(&data[..], options);
        assert!(matches!(
            strict.next_entry(),
            Err(ArchiveError::Header {
                source: HeaderError::ChecksumMismatch { .. },
                ..
            })
        ));
    }

    #[test]
    fn empty_stream_has_no_entries() {
        let mut reader = ArchiveReader::new(std::io::empty());
        assert!(reader.next_entry().unwrap().is_none());
    }
}
