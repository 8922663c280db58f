//! Delimited-text record codec.
//!
//! This module provides:
//! - **Lazy typed reading**: [`RecordReader`] streams [`Record`]s out of a
//!   comma- or tab-separated file, skipping (and counting) malformed rows
//! - **Scoped writing**: [`RecordWriter`] and [`write_records`] emit a header
//!   plus one line per record, flushing on every exit path
//!
//! # Design notes
//! - Parsing is schema-driven: every row must have exactly `schema.len()`
//!   fields and every field must parse as its column type.
//! - A malformed row is a row-level failure. It is logged, counted and
//!   skipped. Only I/O failures end the stream early.
//! - The delimiter is chosen per file, see [`detect_delimiter`].

use crate::config::HeaderMode;
use crate::record::Record;
use crate::schema::Schema;
use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use log::warn;
use std::fs::{File, create_dir_all};
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Pick the field delimiter for `path`.
///
/// `.tsv` / `.tab` files are tab separated. Otherwise the first line is
/// sniffed: whichever of tab and comma splits it into exactly `schema.len()`
/// fields wins, comma on a tie. If neither fits, a tab with no comma means
/// tab separated and anything else is comma separated.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn detect_delimiter(path: impl AsRef<Path>, schema: &Schema) -> Result<u8> {
    let path = path.as_ref();
    if let Some(ext) = path.extension().and_then(|e| e.to_str())
        && (ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("tab"))
    {
        return Ok(b'\t');
    }
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut first = Vec::new();
    BufReader::new(f)
        .read_until(b'\n', &mut first)
        .with_context(|| format!("read first line of {}", path.display()))?;
    Ok(sniff_line(&first, schema.len()))
}

fn sniff_line(line: &[u8], width: usize) -> u8 {
    match (field_count(line, b','), field_count(line, b'\t')) {
        (commas, _) if commas == width => b',',
        (_, tabs) if tabs == width => b'\t',
        _ if line.contains(&b'\t') && !line.contains(&b',') => b'\t',
        _ => b',',
    }
}

/// Fields in `line` when split on `delimiter`, honouring quotes.
fn field_count(line: &[u8], delimiter: u8) -> usize {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(line)
        .byte_records()
        .next()
        .and_then(Result::ok)
        .map_or(0, |r| r.len())
}

/// `true` if `row` spells out the schema's column names.
fn is_header(row: &StringRecord, schema: &Schema) -> bool {
    row.len() == schema.len()
        && row
            .iter()
            .zip(schema.names())
            .all(|(field, name)| field.trim().eq_ignore_ascii_case(name))
}

/// Lazy, forward-only reader of typed records.
///
/// Iterates `Result<Record>`: `Ok` for each well-formed row, a single `Err`
/// if the underlying file fails mid-read (after which the iterator is done).
/// Malformed rows never surface; see [`RecordReader::malformed`].
pub struct RecordReader<'s> {
    path: PathBuf,
    schema: &'s Schema,
    rows: csv::StringRecordsIntoIter<File>,
    pending: Option<StringRecord>,
    row_no: u64,
    malformed: u64,
    done: bool,
}

impl<'s> RecordReader<'s> {
    /// Open `path` for reading under `schema`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, or if the header row
    /// cannot be read.
    pub fn open(path: impl AsRef<Path>, schema: &'s Schema, header: HeaderMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let delimiter = detect_delimiter(&path, schema)?;
        let f = File::open(&path).with_context(|| format!("open {}", path.display()))?;
        let mut rows = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(f)
            .into_records();

        let mut pending = None;
        let mut row_no = 0;
        let mut malformed = 0;
        if header != HeaderMode::Absent {
            match rows.next() {
                Some(Ok(first)) => {
                    if header == HeaderMode::Present || is_header(&first, schema) {
                        row_no = 1;
                    } else {
                        pending = Some(first);
                    }
                }
                Some(Err(e)) if header == HeaderMode::Present || e.is_io_error() => {
                    return Err(e).with_context(|| format!("read header of {}", path.display()));
                }
                // An undecodable first row in auto mode is just a bad data row.
                Some(Err(e)) => {
                    warn!("{}: row 1 is malformed: {e}", path.display());
                    row_no = 1;
                    malformed = 1;
                }
                None => {}
            }
        }

        Ok(Self {
            path,
            schema,
            rows,
            pending,
            row_no,
            malformed,
            done: false,
        })
    }

    /// Number of rows skipped as malformed so far.
    #[must_use]
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Number of rows consumed so far, header and malformed rows included.
    #[must_use]
    pub fn rows_read(&self) -> u64 {
        self.row_no
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for RecordReader<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let row = match self.pending.take() {
                Some(row) => row,
                None => match self.rows.next()? {
                    Ok(row) => row,
                    Err(e) if e.is_io_error() => {
                        self.done = true;
                        let err = anyhow::Error::new(e).context(format!("read {}", self.path.display()));
                        return Some(Err(err));
                    }
                    Err(e) => {
                        self.row_no += 1;
                        self.malformed += 1;
                        warn!("{}: row {} is malformed: {e}", self.path.display(), self.row_no);
                        continue;
                    }
                },
            };
            self.row_no += 1;
            let fields: Vec<&str> = row.iter().collect();
            match Record::from_fields(self.schema, &fields) {
                Ok(rec) => return Some(Ok(rec)),
                Err(e) => {
                    self.malformed += 1;
                    warn!("{}: row {} is malformed: {e}", self.path.display(), self.row_no);
                }
            }
        }
    }
}

/// Writes a header followed by one line per record.
///
/// The underlying buffered file is flushed by [`RecordWriter::finish`]; if
/// the writer is dropped early (e.g. on an error path) the `csv` writer still
/// flushes and the file handle is released.
pub struct RecordWriter<'s> {
    path: PathBuf,
    schema: &'s Schema,
    inner: csv::Writer<BufWriter<File>>,
    rows: usize,
}

impl<'s> RecordWriter<'s> {
    /// Create (or truncate) `path`, creating parent directories as needed,
    /// and write the header row.
    ///
    /// # Errors
    /// Returns an error if the directories or file cannot be created, or the
    /// header cannot be written.
    pub fn create(path: impl AsRef<Path>, schema: &'s Schema, delimiter: u8) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        let f = File::create(&path).with_context(|| format!("create {}", path.display()))?;
        let mut inner = WriterBuilder::new()
            .has_headers(false)
            .delimiter(delimiter)
            .from_writer(BufWriter::new(f));
        inner
            .write_record(schema.names())
            .with_context(|| format!("write header to {}", path.display()))?;
        Ok(Self {
            path,
            schema,
            inner,
            rows: 0,
        })
    }

    /// Append one record in schema column order.
    ///
    /// # Errors
    /// Returns an error if the record does not match the schema's arity or
    /// the write fails.
    pub fn write(&mut self, record: &Record) -> Result<()> {
        if record.values().len() != self.schema.len() {
            bail!(
                "record has {} values but schema has {} columns ({})",
                record.values().len(),
                self.schema.len(),
                self.path.display()
            );
        }
        self.inner
            .write_record(record.values().iter().map(ToString::to_string))
            .with_context(|| format!("write row #{} to {}", self.rows + 1, self.path.display()))?;
        self.rows += 1;
        Ok(())
    }

    /// Flush everything to disk and close the file.
    ///
    /// # Returns
    /// The number of records written (header excluded).
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn finish(mut self) -> Result<usize> {
        self.inner
            .flush()
            .with_context(|| format!("flush {}", self.path.display()))?;
        Ok(self.rows)
    }
}

/// Write `records` to `path` under `schema`, comma separated.
///
/// # Returns
/// The number of records written.
///
/// # Errors
/// See [`RecordWriter::create`] and [`RecordWriter::write`].
pub fn write_records<'r>(
    path: impl AsRef<Path>,
    schema: &Schema,
    records: impl IntoIterator<Item = &'r Record>,
) -> Result<usize> {
    let mut w = RecordWriter::create(path, schema, b',')?;
    for rec in records {
        w.write(rec)?;
    }
    w.finish()
}

/// Read every well-formed record of `path` into memory.
///
/// # Errors
/// Returns an error if the file cannot be opened or fails mid-read.
pub fn read_records(path: impl AsRef<Path>, schema: &Schema, header: HeaderMode) -> Result<Vec<Record>> {
    RecordReader::open(path, schema, header)?.collect()
}
