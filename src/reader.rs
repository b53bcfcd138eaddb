use std::cmp::Ordering;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::header::read_header_lines;
use crate::record::Record;

/// A record type that lives one per line behind a `#` header block.
///
/// This is the whole contract a [`SortBuffer`](crate::sort::SortBuffer) needs: it writes the
/// header and records out with the `write_*` methods and reads them back through a
/// [`RecordReader`].
pub trait LineRecord: Sized {
    type Header: Clone;

    fn parse_header(lines: &[String]) -> Result<Self::Header>;

    fn write_header<W: Write>(header: &Self::Header, out: &mut W) -> io::Result<()>;

    fn parse_line(header: &Self::Header, line: &str) -> Result<Self>;

    /// Writes the record without a line terminator.
    fn write_line<W: Write>(&self, out: &mut W) -> io::Result<()>;

    fn sort_cmp(&self, other: &Self) -> Ordering;
}

/// Pull-based stream of records from a line-oriented source.
///
/// Parse errors carry the 1-based line number they occurred on.
pub struct RecordReader<T: LineRecord, R> {
    header: T::Header,
    inner: R,
    line: String,
    line_number: usize,
    peeked: Option<T>,
    failed: Option<Error>,
}

pub type VcfRecords = RecordReader<Record, Box<dyn BufRead>>;

impl RecordReader<Record, Box<dyn BufRead>> {
    /// Opens a plain, gzip or bzip2 compressed VCF file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let (reader, _format) = niffler::from_path(path)?;
        Ok(Self::new(Box::new(BufReader::new(reader)))?)
    }
}

impl<T: LineRecord, R> RecordReader<T, R> {
    pub fn header(&self) -> &T::Header {
        &self.header
    }
}

impl<T: LineRecord, R: BufRead> RecordReader<T, R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let lines = read_header_lines(&mut inner)?;
        let header = T::parse_header(&lines)?;
        Ok(Self {
            header,
            inner,
            line: String::new(),
            line_number: lines.len(),
            peeked: None,
            failed: None,
        })
    }

    fn read_record(&mut self) -> Result<Option<T>> {
        loop {
            self.line.clear();
            if self.inner.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            let text = self.line.trim_end_matches(&['\n', '\r'][..]);
            if text.is_empty() {
                continue;
            }
            return T::parse_line(&self.header, text)
                .map(Some)
                .map_err(|e| e.at_line(self.line_number));
        }
    }

    pub fn peek(&mut self) -> Result<Option<&T>> {
        if let Some(e) = self.failed.take() {
            return Err(e);
        }
        if self.peeked.is_none() {
            self.peeked = self.read_record()?;
        }
        Ok(self.peeked.as_ref())
    }

    pub fn next_record(&mut self) -> Result<Option<T>> {
        if let Some(e) = self.failed.take() {
            return Err(e);
        }
        match self.peeked.take() {
            Some(record) => Ok(Some(record)),
            None => self.read_record(),
        }
    }

    /// True once no further record can be read. A line that fails to parse counts as data;
    /// its error is handed out by the next call to `peek` or `next_record`.
    pub fn is_exhausted(&mut self) -> bool {
        if self.failed.is_some() {
            return false;
        }
        match self.peek().map(|r| r.is_none()) {
            Ok(done) => done,
            Err(e) => {
                self.failed = Some(e);
                false
            }
        }
    }
}

impl<T: LineRecord, R: BufRead> Iterator for RecordReader<T, R> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
