use std::io::Write;

use crate::buffer::{Record, RecordWriter};
use crate::entry::Entry;
use crate::error::ArchiveError;
use crate::header;
use crate::{DEFAULT_RECORDS_PER_BLOCK, RECORD_SIZE};

#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Records per transport block.
    pub records_per_block: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            records_per_block: DEFAULT_RECORDS_PER_BLOCK,
        }
    }
}

#[derive(Debug)]
struct OpenEntry {
    name: String,
    declared: u64,
    written: u64,
}

/// Sequential entry emitter.
///
/// Each entry is `begin_entry`, any number of `write` calls totalling exactly
/// the declared size, then `close_entry`. [`ArchiveWriter::finish`] ends the
/// archive.
pub struct ArchiveWriter<W: Write> {
    records: RecordWriter<W>,
    open: Option<OpenEntry>,
    assembly: Vec<u8>,
    finished: bool,
}

impl<W: Write> std::fmt::Debug for ArchiveWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveWriter")
            .field("records", &self.records)
            .field("open", &self.open)
            .field("assembly", &self.assembly.len())
            .field("finished", &self.finished)
            .finish()
    }
}

impl<W: Write> Drop for ArchiveWriter<W> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        match &self.open {
            Some(open) => tracing::warn!(
                entry = %open.name,
                "ArchiveWriter dropped with an entry still open, archive is truncated"
            ),
            None => {
                tracing::warn!("ArchiveWriter dropped without calling finish(), finishing now");
                if let Err(error) = self.finish() {
                    tracing::warn!(%error, "finishing archive on drop failed");
                }
            }
        }
    }
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(sink: W) -> Self {
        Self::with_options(sink, WriterOptions::default())
    }

    pub fn with_options(sink: W, options: WriterOptions) -> Self {
        ArchiveWriter {
            records: RecordWriter::with_blocking(sink, options.records_per_block),
            open: None,
            assembly: Vec::with_capacity(RECORD_SIZE),
            finished: false,
        }
    }

    fn ensure_writable(&self) -> Result<(), ArchiveError> {
        if self.finished {
            Err(ArchiveError::Finished)
        } else {
            Ok(())
        }
    }

    /// Encodes and writes the header for `entry`, opening it for content.
    ///
    /// Name and field problems fail here, before anything is written.
    pub fn begin_entry(&mut self, entry: &Entry) -> Result<(), ArchiveError> {
        self.ensure_writable()?;
        if self.open.is_some() {
            return Err(ArchiveError::EntryOpen);
        }

        let record = header::encode(entry)?;
        self.records.write_record(&record)?;

        self.open = Some(OpenEntry {
            name: entry.name.clone(),
            declared: entry.content_size(),
            written: 0,
        });
        Ok(())
    }

    /// Appends content to the open entry.
    pub fn write(&mut self, data: &[u8]) -> Result<(), ArchiveError> {
        self.ensure_writable()?;
        let (declared, written) = match &self.open {
            Some(open) => (open.declared, open.written),
            None => return Err(ArchiveError::NoEntryOpen),
        };

        let attempted = written + data.len() as u64;
        if attempted > declared {
            return Err(ArchiveError::SizeExceeded {
                declared,
                attempted,
            });
        }

        let mut rest = data;
        while !rest.is_empty() {
            let take = (RECORD_SIZE - self.assembly.len()).min(rest.len());
            self.assembly.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.assembly.len() == RECORD_SIZE {
                self.flush_assembly()?;
            }
        }

        if let Some(open) = self.open.as_mut() {
            open.written = attempted;
        }
        Ok(())
    }

    /// Writes the assembly buffer as one zero-padded record.
    fn flush_assembly(&mut self) -> Result<(), ArchiveError> {
        let mut record: Record = [0u8; RECORD_SIZE];
        record[..self.assembly.len()].copy_from_slice(&self.assembly);
        self.records.write_record(&record)?;
        self.assembly.clear();
        Ok(())
    }

    /// Closes the open entry, padding its last record.
    ///
    /// If fewer bytes than declared were written this fails with
    /// [`ArchiveError::ShortWrite`] and the entry stays open, so the
    /// missing content can still be supplied.
    pub fn close_entry(&mut self) -> Result<(), ArchiveError> {
        self.ensure_writable()?;
        let open = self.open.as_ref().ok_or(ArchiveError::NoEntryOpen)?;
        if open.written < open.declared {
            return Err(ArchiveError::ShortWrite {
                declared: open.declared,
                written: open.written,
            });
        }

        if !self.assembly.is_empty() {
            self.flush_assembly()?;
        }

        if let Some(open) = self.open.take() {
            tracing::debug!(name = %open.name, size = open.written, "entry written");
        }
        Ok(())
    }

    /// Writes the end-of-archive record and flushes the final block.
    ///
    /// Returns the total number of bytes handed to the sink.
    pub fn finish(&mut self) -> Result<u64, ArchiveError> {
        self.ensure_writable()?;
        if self.open.is_some() {
            return Err(ArchiveError::EntryOpen);
        }

        self.records.write_record(&[0u8; RECORD_SIZE])?;
        self.records.close()?;
        self.finished = true;

        let total = self.records.bytes_written();
        tracing::debug!(bytes = total, blocks = self.records.block_index(), "archive finished");
        Ok(total)
    }

    /// Content bytes the open entry still expects.
    pub fn remaining(&self) -> u64 {
        self.open
            .as_ref()
            .map(|open| open.declared - open.written)
            .unwrap_or(0)
    }

    #[inline(always)]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn get_ref(&self) -> &W {
        self.records.get_ref()
    }
}

impl<W: Write> Write for ArchiveWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        ArchiveWriter::write(self, buf)
            .map(|_| buf.len())
            .map_err(|e| match e {
                ArchiveError::Io(e) => e,
                other => std::io::Error::new(std::io::ErrorKind::InvalidInput, other),
            })
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HeaderError;

    #[test]
    fn single_entry_layout() {
        let mut out = Vec::new();
        let mut writer = ArchiveWriter::new(&mut out);
        writer.begin_entry(&Entry::file("a/b/c.txt", 5)).unwrap();
        writer.write(b"hel").unwrap();
        writer.write(b"lo").unwrap();
        writer.close_entry().unwrap();
        let total = writer.finish().unwrap();
        drop(writer);

        assert_eq!(total, 10240);
        assert_eq!(out.len(), 10240);
        assert_eq!(&out[RECORD_SIZE..RECORD_SIZE + 5], b"hello");
        assert!(out[RECORD_SIZE + 5..].iter().all(|b| *b == 0));
    }

    #[test]
    fn size_is_enforced() {
        let mut writer = ArchiveWriter::new(Vec::new());
        writer.begin_entry(&Entry::file("ten", 10)).unwrap();

        assert!(matches!(
            writer.write(&[1u8; 11]),
            Err(ArchiveError::SizeExceeded {
                declared: 10,
                attempted: 11
            })
        ));

        writer.write(&[1u8; 9]).unwrap();
        assert!(matches!(
            writer.close_entry(),
            Err(ArchiveError::ShortWrite {
                declared: 10,
                written: 9
            })
        ));
        assert_eq!(writer.remaining(), 1);

        writer.write(&[1u8]).unwrap();
        writer.close_entry().unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn content_spanning_records() {
        let content: Vec<u8> = (0..1500u32).map(|i| (i % 7) as u8 + 1).collect();
        let mut out = Vec::new();
        let mut writer = ArchiveWriter::with_options(
            &mut out,
            WriterOptions {
                records_per_block: 1,
            },
        );
        writer.begin_entry(&Entry::file("f", 1500)).unwrap();
        for chunk in content.chunks(333) {
            writer.write(chunk).unwrap();
        }
        writer.close_entry().unwrap();
        assert_eq!(writer.finish().unwrap(), 5 * RECORD_SIZE as u64);
        drop(writer);

        assert_eq!(&out[RECORD_SIZE..RECORD_SIZE + 1500], &content[..]);
        assert!(out[RECORD_SIZE + 1500..].iter().all(|b| *b == 0));
    }

    #[test]
    fn misuse_is_reported() {
        let mut writer = ArchiveWriter::new(Vec::new());
        assert!(matches!(writer.write(b"x"), Err(ArchiveError::NoEntryOpen)));
        assert!(matches!(writer.close_entry(), Err(ArchiveError::NoEntryOpen)));

        writer.begin_entry(&Entry::file("one", 1)).unwrap();
        assert!(matches!(
            writer.begin_entry(&Entry::file("two", 1)),
            Err(ArchiveError::EntryOpen)
        ));
        assert!(matches!(writer.finish(), Err(ArchiveError::EntryOpen)));

        writer.write(b"1").unwrap();
        writer.close_entry().unwrap();
        writer.finish().unwrap();
        assert!(matches!(
            writer.begin_entry(&Entry::file("three", 0)),
            Err(ArchiveError::Finished)
        ));
        assert!(matches!(writer.finish(), Err(ArchiveError::Finished)));
    }

    #[test]
    fn bad_name_writes_nothing() {
        let mut out = Vec::new();
        let mut writer = ArchiveWriter::with_options(
            &mut out,
            WriterOptions {
                records_per_block: 1,
            },
        );
        let err = writer
            .begin_entry(&Entry::file("x".repeat(300), 0))
            .unwrap_err();
        assert!(matches!(
            err.header_error(),
            Some(HeaderError::NameTooLong { .. })
        ));

        writer.begin_entry(&Entry::directory("ok/")).unwrap();
        writer.close_entry().unwrap();
        writer.finish().unwrap();
        drop(writer);
        assert_eq!(out.len(), 2 * RECORD_SIZE);
    }

    #[test]
    fn directory_takes_no_content() {
        let mut dir = Entry::directory("d/");
        dir.size = 4096;
        let mut writer = ArchiveWriter::new(Vec::new());
        writer.begin_entry(&dir).unwrap();
        assert!(matches!(
            writer.write(b"x"),
            Err(ArchiveError::SizeExceeded { declared: 0, .. })
        ));
        writer.close_entry().unwrap();
    }

    #[test]
    fn drop_finishes_archive() {
        let mut out = Vec::new();
        {
            let mut writer = ArchiveWriter::new(&mut out);
            writer.begin_entry(&Entry::directory("d/")).unwrap();
            writer.close_entry().unwrap();
        }
        assert_eq!(out.len(), 10240);
        assert!(out[RECORD_SIZE..].iter().all(|b| *b == 0));
    }
}
