//! Record/block translation over a raw byte transport.
//!
//! Header and content logic works one 512-byte record at a time, while the
//! transport is driven one block (`records_per_block` records) at a time.
//! [`RecordReader`] and [`RecordWriter`] each exclusively own their transport.

use std::io::{ErrorKind, Read, Write};

use crate::{DEFAULT_RECORDS_PER_BLOCK, RECORD_SIZE};

/// A single tar record.
pub type Record = [u8; RECORD_SIZE];

/// True iff every byte of `record` is zero.
#[inline]
pub fn is_eof_record(record: &Record) -> bool {
    record.iter().all(|b| *b == 0)
}

fn block_len(records_per_block: usize) -> usize {
    records_per_block.max(1) * RECORD_SIZE
}

/// Block-buffered record source.
pub struct RecordReader<R> {
    source: R,
    block: Box<[u8]>,
    records_per_block: usize,
    record_index: usize,
    block_index: i64,
    exhausted: bool,
}

impl<R> std::fmt::Debug for RecordReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordReader")
            .field("records_per_block", &self.records_per_block)
            .field("record_index", &self.record_index)
            .field("block_index", &self.block_index)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl<R: Read> RecordReader<R> {
    pub fn new(source: R) -> Self {
        Self::with_blocking(source, DEFAULT_RECORDS_PER_BLOCK)
    }

    pub fn with_blocking(source: R, records_per_block: usize) -> Self {
        let records_per_block = records_per_block.max(1);
        RecordReader {
            source,
            block: vec![0u8; block_len(records_per_block)].into_boxed_slice(),
            records_per_block,
            // Force a block read on the first record.
            record_index: records_per_block,
            block_index: -1,
            exhausted: false,
        }
    }

    /// Returns the next record, pulling a fresh block from the source when the
    /// current one is used up. `None` means the source had no bytes at all for
    /// a fresh block.
    pub fn read_record(&mut self) -> std::io::Result<Option<Record>> {
        if self.record_index >= self.records_per_block && !self.read_block()? {
            return Ok(None);
        }

        let start = self.record_index * RECORD_SIZE;
        let mut record = [0u8; RECORD_SIZE];
        record.copy_from_slice(&self.block[start..start + RECORD_SIZE]);
        self.record_index += 1;
        Ok(Some(record))
    }

    /// Fills the block from the source. A short fill followed by end of data is
    /// accepted: the remainder is zeroed and the block is used as is.
    fn read_block(&mut self) -> std::io::Result<bool> {
        if self.exhausted {
            return Ok(false);
        }

        let mut filled = 0;
        while filled < self.block.len() {
            match self.source.read(&mut self.block[filled..]) {
                Ok(0) => {
                    self.exhausted = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if filled == 0 {
            return Ok(false);
        }

        if filled < self.block.len() {
            tracing::warn!(
                block = self.block_index + 1,
                bytes = filled,
                expected = self.block.len(),
                "short block at end of archive, continuing"
            );
            self.block[filled..].fill(0);
        }

        self.record_index = 0;
        self.block_index += 1;
        tracing::debug!(block = self.block_index, bytes = filled, "read block");
        Ok(true)
    }

    /// Index of the current block, -1 before the first block is read.
    #[inline(always)]
    pub fn block_index(&self) -> i64 {
        self.block_index
    }

    /// Index within the current block of the record most recently returned.
    #[inline(always)]
    pub fn record_index(&self) -> usize {
        self.record_index.saturating_sub(1)
    }

    #[inline(always)]
    pub fn records_per_block(&self) -> usize {
        self.records_per_block
    }

    /// Releases the source.
    pub fn into_inner(self) -> R {
        self.source
    }
}

/// Block-buffered record sink.
///
/// The final partial block is zero-padded and flushed by [`RecordWriter::close`].
/// Dropping an unclosed writer closes it best-effort and logs a warning.
pub struct RecordWriter<W: Write> {
    sink: W,
    block: Box<[u8]>,
    records_per_block: usize,
    record_index: usize,
    block_index: i64,
    bytes_written: u64,
    closed: bool,
}

impl<W: Write> std::fmt::Debug for RecordWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordWriter")
            .field("records_per_block", &self.records_per_block)
            .field("record_index", &self.record_index)
            .field("block_index", &self.block_index)
            .field("bytes_written", &self.bytes_written)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<W: Write> Drop for RecordWriter<W> {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(
                block = self.block_index,
                "RecordWriter dropped without calling close(), flushing final block"
            );
            if let Err(error) = self.close() {
                tracing::warn!(%error, "flushing final block on drop failed");
            }
        }
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(sink: W) -> Self {
        Self::with_blocking(sink, DEFAULT_RECORDS_PER_BLOCK)
    }

    pub fn with_blocking(sink: W, records_per_block: usize) -> Self {
        let records_per_block = records_per_block.max(1);
        RecordWriter {
            sink,
            block: vec![0u8; block_len(records_per_block)].into_boxed_slice(),
            records_per_block,
            record_index: 0,
            block_index: 0,
            bytes_written: 0,
            closed: false,
        }
    }

    /// Appends one record, writing the block out first if it is already full.
    pub fn write_record(&mut self, record: &Record) -> std::io::Result<()> {
        if self.closed {
            return Err(std::io::Error::new(
                ErrorKind::BrokenPipe,
                "record writer is closed",
            ));
        }

        if self.record_index >= self.records_per_block {
            self.write_block()?;
        }

        let start = self.record_index * RECORD_SIZE;
        self.block[start..start + RECORD_SIZE].copy_from_slice(record);
        self.record_index += 1;
        Ok(())
    }

    fn write_block(&mut self) -> std::io::Result<()> {
        self.sink.write_all(&self.block)?;
        self.sink.flush()?;
        self.bytes_written += self.block.len() as u64;
        tracing::debug!(block = self.block_index, bytes = self.block.len(), "wrote block");
        self.record_index = 0;
        self.block_index += 1;
        Ok(())
    }

    /// Zero-pads and writes out any partially filled block, then flushes the
    /// sink. Later calls do nothing.
    pub fn close(&mut self) -> std::io::Result<()> {
        if self.closed {
            return Ok(());
        }

        if self.record_index > 0 {
            let used = self.record_index * RECORD_SIZE;
            self.block[used..].fill(0);
            self.write_block()?;
        }
        self.sink.flush()?;
        self.closed = true;
        Ok(())
    }

    #[inline(always)]
    pub fn block_index(&self) -> i64 {
        self.block_index
    }

    #[inline(always)]
    pub fn record_index(&self) -> usize {
        self.record_index
    }

    /// Bytes handed to the sink so far (whole blocks only).
    #[inline(always)]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    #[inline(always)]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out at most `chunk` bytes per read, then reports end of data.
    struct Trickle<'a> {
        data: &'a [u8],
        chunk: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn eof_record_detection() {
        let mut record = [0u8; RECORD_SIZE];
        assert!(is_eof_record(&record));
        record[511] = 1;
        assert!(!is_eof_record(&record));
    }

    #[test]
    fn empty_source_has_no_records() {
        let mut reader = RecordReader::new(std::io::empty());
        assert!(reader.read_record().unwrap().is_none());
        assert_eq!(reader.block_index(), -1);
    }

    #[test]
    fn short_block_is_tolerated() {
        let data = [0x41u8; 400];
        let mut reader = RecordReader::new(Trickle {
            data: &data,
            chunk: 64,
        });

        let record = reader.read_record().unwrap().expect("record");
        assert_eq!(&record[..400], &data[..]);
        assert!(record[400..].iter().all(|b| *b == 0));
        assert!(!is_eof_record(&record));

        // The rest of the short block reads as zero records.
        let next = reader.read_record().unwrap().expect("record");
        assert!(is_eof_record(&next));
        assert_eq!(reader.block_index(), 0);
        assert_eq!(reader.record_index(), 1);
    }

    #[test]
    fn reader_crosses_block_boundaries() {
        let mut data = vec![0u8; RECORD_SIZE * 4];
        for (i, chunk) in data.chunks_mut(RECORD_SIZE).enumerate() {
            chunk.fill(i as u8 + 1);
        }

        let mut reader = RecordReader::with_blocking(&data[..], 2);
        for i in 0..4u8 {
            let record = reader.read_record().unwrap().unwrap();
            assert!(record.iter().all(|b| *b == i + 1));
        }
        assert_eq!(reader.block_index(), 1);
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn writer_pads_final_block() {
        let mut out = Vec::new();
        {
            let mut writer = RecordWriter::with_blocking(&mut out, 4);
            writer.write_record(&[1u8; RECORD_SIZE]).unwrap();
            writer.close().unwrap();
            assert_eq!(writer.bytes_written(), 4 * RECORD_SIZE as u64);
        }

        assert_eq!(out.len(), 4 * RECORD_SIZE);
        assert!(out[..RECORD_SIZE].iter().all(|b| *b == 1));
        assert!(out[RECORD_SIZE..].iter().all(|b| *b == 0));
    }

    #[test]
    fn writer_flushes_full_blocks_lazily() {
        let mut out = Vec::new();
        {
            let mut writer = RecordWriter::with_blocking(&mut out, 2);
            writer.write_record(&[1u8; RECORD_SIZE]).unwrap();
            writer.write_record(&[2u8; RECORD_SIZE]).unwrap();
            assert_eq!(writer.bytes_written(), 0);
            writer.write_record(&[3u8; RECORD_SIZE]).unwrap();
            assert_eq!(writer.bytes_written(), 2 * RECORD_SIZE as u64);
            writer.close().unwrap();
        }
        assert_eq!(out.len(), 4 * RECORD_SIZE);
    }

    #[test]
    fn writer_closes_on_drop() {
        let mut out = Vec::new();
        {
            let mut writer = RecordWriter::new(&mut out);
            writer.write_record(&[7u8; RECORD_SIZE]).unwrap();
        }
        assert_eq!(out.len(), DEFAULT_RECORDS_PER_BLOCK * RECORD_SIZE);
    }

    #[test]
    fn write_after_close_fails() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.close().unwrap();
        assert!(writer.write_record(&[0u8; RECORD_SIZE]).is_err());
    }
}
