//! External sorting: bounded in-memory runs that can be spilled to compressed temporary
//! files and merged back by the record ordering.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;
use log::debug;
use strum::{Display, EnumString};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
pub use crate::reader::LineRecord;
use crate::reader::RecordReader;

/// Codec applied to spill files.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CompressionMode {
    #[default]
    None,
    Gzip,
    Bzip2,
}

/// Encoder for a spill file. Unlike dropping an encoder, [`finish`](SpillWriter::finish)
/// reports a failure to write the codec trailer.
enum SpillWriter<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
    Bzip2(BzEncoder<W>),
}

impl<W: Write> SpillWriter<W> {
    fn new(inner: W, compression: CompressionMode) -> Self {
        match compression {
            CompressionMode::None => SpillWriter::Plain(inner),
            CompressionMode::Gzip => SpillWriter::Gzip(GzEncoder::new(inner, flate2::Compression::fast())),
            CompressionMode::Bzip2 => SpillWriter::Bzip2(BzEncoder::new(inner, bzip2::Compression::fast())),
        }
    }

    fn finish(self) -> io::Result<W> {
        match self {
            SpillWriter::Plain(inner) => Ok(inner),
            SpillWriter::Gzip(encoder) => encoder.finish(),
            SpillWriter::Bzip2(encoder) => encoder.finish(),
        }
    }
}

impl<W: Write> Write for SpillWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            SpillWriter::Plain(inner) => inner.write(buf),
            SpillWriter::Gzip(encoder) => encoder.write(buf),
            SpillWriter::Bzip2(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            SpillWriter::Plain(inner) => inner.flush(),
            SpillWriter::Gzip(encoder) => encoder.flush(),
            SpillWriter::Bzip2(encoder) => encoder.flush(),
        }
    }
}

/// Anything records can be pulled from one at a time, in order.
pub trait RecordSource<T> {
    fn peek(&mut self) -> Result<Option<&T>>;

    fn next_record(&mut self) -> Result<Option<T>>;

    fn is_exhausted(&mut self) -> bool;
}

impl<T> RecordSource<T> for VecDeque<T> {
    fn peek(&mut self) -> Result<Option<&T>> {
        Ok(self.front())
    }

    fn next_record(&mut self) -> Result<Option<T>> {
        Ok(self.pop_front())
    }

    fn is_exhausted(&mut self) -> bool {
        self.is_empty()
    }
}

/// A spilled run being read back. The temporary file is deleted when this is dropped.
struct SpillStream<T: LineRecord> {
    // declared first so the read handle is closed before the file is removed
    records: RecordReader<T, Box<dyn BufRead>>,
    file: NamedTempFile,
}

impl<T: LineRecord> RecordSource<T> for SpillStream<T> {
    fn peek(&mut self) -> Result<Option<&T>> {
        self.records.peek()
    }

    fn next_record(&mut self) -> Result<Option<T>> {
        self.records.next_record()
    }

    fn is_exhausted(&mut self) -> bool {
        self.records.is_exhausted()
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BufferState {
    Accumulating,
    Sorted,
    /// The records live in a temporary file. Terminal.
    Spilled,
}

/// One run of an external sort.
///
/// Records are pushed, sorted, optionally spilled to disk and then streamed back with
/// [`peek`](SortBuffer::peek) and [`next_record`](SortBuffer::next_record). The stream looks
/// the same whether the run stayed in memory or was spilled.
pub struct SortBuffer<T: LineRecord> {
    header: T::Header,
    tmp_dir: Option<PathBuf>,
    state: BufferState,
    draining: bool,
    records: VecDeque<T>,
    spill: Option<SpillStream<T>>,
}

impl<T: LineRecord> SortBuffer<T> {
    /// `header` is written at the top of a spill file so the run can be parsed back.
    pub fn new(header: T::Header) -> Self {
        SortBuffer {
            header,
            tmp_dir: None,
            state: BufferState::Accumulating,
            draining: false,
            records: VecDeque::new(),
            spill: None,
        }
    }

    /// Directory for spill files instead of the system default.
    #[must_use]
    pub fn tmp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.tmp_dir = Some(dir.into());
        self
    }

    pub fn header(&self) -> &T::Header {
        &self.header
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    /// Number of records held in memory.
    pub fn buffered(&self) -> usize {
        self.records.len()
    }

    pub fn spill_path(&self) -> Option<&Path> {
        self.spill.as_ref().map(|s| s.file.path())
    }

    pub fn push(&mut self, record: T) {
        debug_assert!(
            !self.draining && self.state != BufferState::Spilled,
            "push after the buffer started streaming"
        );
        self.records.push_back(record);
        self.state = BufferState::Accumulating;
    }

    /// Sorts buffered records by [`LineRecord::sort_cmp`]. A stable sort keeps arrival order
    /// among equal records.
    pub fn sort(&mut self, stable: bool) {
        let records = self.records.make_contiguous();
        if stable {
            records.sort_by(T::sort_cmp);
        } else {
            records.sort_unstable_by(T::sort_cmp);
        }
        if self.state == BufferState::Accumulating {
            self.state = BufferState::Sorted;
        }
    }

    /// Writes the header and every buffered record to a temporary file, then reopens it for
    /// reading. Records are written in their current order, so sort first.
    pub fn spill_to_disk(&mut self, compression: CompressionMode) -> Result<()> {
        if self.state == BufferState::Spilled {
            return Err(Error::AlreadySpilled);
        }
        let file = match &self.tmp_dir {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };

        // on any error below `file` is dropped, which removes it
        let mut out = SpillWriter::new(BufWriter::new(file.reopen()?), compression);
        T::write_header(&self.header, &mut out)?;
        for record in &self.records {
            record.write_line(&mut out)?;
            out.write_all(b"\n")?;
        }
        out.finish()?.flush()?;
        debug!(
            "spilled {} records to {} ({})",
            self.records.len(),
            file.path().display(),
            compression
        );

        let input: Box<dyn BufRead> = match compression {
            // niffler needs a few bytes to sniff a format, uncompressed spills may be shorter
            CompressionMode::None => Box::new(BufReader::new(file.reopen()?)),
            _ => {
                let (reader, _format) = niffler::get_reader(Box::new(file.reopen()?))?;
                Box::new(BufReader::new(reader))
            }
        };
        let records = RecordReader::new(input)?;
        self.spill = Some(SpillStream { records, file });
        self.records = VecDeque::new();
        self.state = BufferState::Spilled;
        Ok(())
    }

    fn source(&mut self) -> &mut dyn RecordSource<T> {
        match &mut self.spill {
            Some(spill) => spill as &mut dyn RecordSource<T>,
            None => &mut self.records as &mut dyn RecordSource<T>,
        }
    }

    pub fn peek(&mut self) -> Result<Option<&T>> {
        self.source().peek()
    }

    pub fn next_record(&mut self) -> Result<Option<T>> {
        self.draining = true;
        self.source().next_record()
    }

    /// True once neither memory nor a spill file has records left.
    pub fn is_empty(&mut self) -> bool {
        self.source().is_exhausted()
    }
}

impl<T: LineRecord> Iterator for SortBuffer<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

struct HeapEntry<T> {
    record: T,
    run: usize,
}

impl<T: LineRecord> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: LineRecord> Eq for HeapEntry<T> {}

impl<T: LineRecord> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: LineRecord> Ord for HeapEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.record
            .sort_cmp(&other.record)
            .then_with(|| self.run.cmp(&other.run))
    }
}

/// K-way merges sorted runs, handing records to `emit` in order. Equal records come out in
/// run order. Returns the number of records emitted.
///
/// With `unique`, a record is dropped when it compares equal to the one emitted before it
/// and serializes to the same line.
pub fn merge_runs<T, F>(runs: &mut [SortBuffer<T>], unique: bool, mut emit: F) -> Result<usize>
where
    T: LineRecord,
    F: FnMut(T) -> Result<()>,
{
    let mut heap = BinaryHeap::with_capacity(runs.len());
    for (run, buffer) in runs.iter_mut().enumerate() {
        if let Some(record) = buffer.next_record()? {
            heap.push(Reverse(HeapEntry { record, run }));
        }
    }

    let mut merged = 0;
    let mut skipped = 0;
    // held back until the next record shows whether it repeats
    let mut pending: Option<(T, Vec<u8>)> = None;
    while let Some(Reverse(HeapEntry { record, run })) = heap.pop() {
        if let Some(next) = runs[run].next_record()? {
            heap.push(Reverse(HeapEntry { record: next, run }));
        }
        if !unique {
            emit(record)?;
            merged += 1;
            continue;
        }
        let mut line = Vec::new();
        record.write_line(&mut line)?;
        if let Some((previous, previous_line)) = &pending {
            if previous.sort_cmp(&record) == Ordering::Equal && *previous_line == line {
                skipped += 1;
                continue;
            }
        }
        if let Some((previous, _)) = pending.replace((record, line)) {
            emit(previous)?;
            merged += 1;
        }
    }
    if let Some((last, _)) = pending {
        emit(last)?;
        merged += 1;
    }
    debug!(
        "merged {} records from {} runs, {} duplicates dropped",
        merged,
        runs.len(),
        skipped
    );
    Ok(merged)
}
