//! Delimited table passes, header resolution and output.
//!
//! A [`TablePass`] is one full sequential read of a [`TableSource`]. Opening a
//! pass consumes the header row, so callers only ever see data records. Column
//! names are resolved once through a [`Header`] and the resulting [`Column`]
//! indices are reused by every later pass.
//!
//! Records are read with a reused [`StringRecord`] buffer, so a pass allocates
//! per distinct label rather than per row.
//!
//! # Row-level leniency
//!
//! Records may have any number of fields. Rows that are too short for a column
//! or hold an unparsable number are skipped by the pipelines via
//! [`parse_field`] and [`label_field`] returning `None`. Data rows that are not
//! valid UTF-8 are skipped by the pass itself; only a malformed header is fatal.

use std::io::{Read, Write};

use csv::StringRecord;

use crate::{error::TableError, source::TableSource};

/// Field delimiter used by default for input and output tables.
pub const TAB: u8 = b'\t';

/// A named column resolved to its position in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub index: usize,
}

/// Column names of a table, used to resolve names to positional indices.
#[derive(Debug, Clone)]
pub struct Header {
    source_name: String,
    names: Vec<String>,
}

impl Header {
    /// Reads only the header row of `source`.
    pub fn read<S>(source: &S) -> Result<Self, TableError>
    where
        S: TableSource + ?Sized,
    {
        Ok(TablePass::open(source)?.into_header())
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Resolves a single column name. The first matching column wins.
    pub fn column(&self, name: &str) -> Result<Column, TableError> {
        let index = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| TableError::MissingColumn {
                name: name.to_owned(),
                source_name: self.source_name.clone(),
            })?;
        Ok(Column {
            name: name.to_owned(),
            index,
        })
    }

    /// Resolves the zero-based position `index`, naming the column after its
    /// header field.
    pub fn column_at(&self, index: usize) -> Result<Column, TableError> {
        let name = self
            .names
            .get(index)
            .ok_or_else(|| TableError::MissingPosition {
                index,
                source_name: self.source_name.clone(),
            })?;
        Ok(Column {
            name: name.clone(),
            index,
        })
    }

    /// Resolves every name in `names`, failing on the first missing one.
    pub fn columns<N>(&self, names: &[N]) -> Result<Vec<Column>, TableError>
    where
        N: AsRef<str>,
    {
        names.iter().map(|name| self.column(name.as_ref())).collect()
    }
}

/// One full read of a table, positioned after the header row.
pub struct TablePass<'a> {
    source_name: String,
    reader: csv::Reader<Box<dyn Read + 'a>>,
    header: StringRecord,
    rows: u64,
    skipped: u64,
}

impl<'a> TablePass<'a> {
    /// Opens a tab-delimited pass over `source` and reads its header.
    pub fn open<S>(source: &'a S) -> Result<Self, TableError>
    where
        S: TableSource + ?Sized,
    {
        Self::open_with(source, TAB)
    }

    /// Opens a pass with a custom field delimiter.
    pub fn open_with<S>(source: &'a S, delimiter: u8) -> Result<Self, TableError>
    where
        S: TableSource + ?Sized,
    {
        let mut pass = Self::open_headerless(source, delimiter)?;
        let mut header = StringRecord::new();
        if !pass.read_raw(&mut header)? {
            return Err(TableError::MissingHeader {
                source_name: pass.source_name,
            });
        }
        pass.header = header;
        tracing::trace!(source = %pass.source_name, columns = pass.header.len(), "opened table pass");
        Ok(pass)
    }

    /// Opens a pass over a table without a header row. Every record is data and
    /// [`header`](Self::header) is empty.
    pub fn open_headerless<S>(source: &'a S, delimiter: u8) -> Result<Self, TableError>
    where
        S: TableSource + ?Sized,
    {
        Ok(Self {
            source_name: source.name(),
            reader: reader_builder(delimiter).from_reader(source.open()?),
            header: StringRecord::new(),
            rows: 0,
            skipped: 0,
        })
    }

    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Header row of the table.
    #[must_use]
    pub fn header(&self) -> &StringRecord {
        &self.header
    }

    #[must_use]
    pub fn into_header(self) -> Header {
        Header {
            source_name: self.source_name,
            names: self.header.iter().map(str::to_owned).collect(),
        }
    }

    /// Number of data records read so far, including skipped ones.
    #[must_use]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Number of data records skipped because they are not valid UTF-8.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Reads the next data record into `record`. Returns `false` at end of input.
    ///
    /// Records that are not valid UTF-8 are counted and passed over.
    pub fn read_record(&mut self, record: &mut StringRecord) -> Result<bool, TableError> {
        loop {
            match self.reader.read_record(record) {
                Ok(more) => {
                    if more {
                        self.rows += 1;
                    }
                    return Ok(more);
                }
                Err(e) if matches!(e.kind(), csv::ErrorKind::Utf8 { .. }) => {
                    self.rows += 1;
                    self.skipped += 1;
                    tracing::trace!(source = %self.source_name, row = self.rows, "skipped non-UTF-8 row");
                }
                Err(source) => {
                    return Err(TableError::Read {
                        source_name: self.source_name.clone(),
                        source,
                    });
                }
            }
        }
    }

    /// Calls `f` for every remaining record and returns the number of records read.
    pub fn try_for_each<F>(mut self, mut f: F) -> Result<u64, TableError>
    where
        F: FnMut(&StringRecord) -> Result<(), TableError>,
    {
        let mut record = StringRecord::new();
        while self.read_record(&mut record)? {
            f(&record)?;
        }
        if self.skipped > 0 {
            tracing::debug!(source = %self.source_name, skipped = self.skipped, "skipped non-UTF-8 rows");
        }
        Ok(self.rows)
    }

    /// Infallible-callback variant of [`try_for_each`](Self::try_for_each).
    pub fn for_each<F>(self, mut f: F) -> Result<u64, TableError>
    where
        F: FnMut(&StringRecord),
    {
        self.try_for_each(|record| {
            f(record);
            Ok(())
        })
    }

    fn read_raw(&mut self, record: &mut StringRecord) -> Result<bool, TableError> {
        self.reader
            .read_record(record)
            .map_err(|source| TableError::Read {
                source_name: self.source_name.clone(),
                source,
            })
    }
}

/// Reader configuration shared by every delimited input: no implicit header,
/// ragged rows allowed, lenient quoting.
fn reader_builder(delimiter: u8) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .double_quote(true);
    builder
}

/// Delimited output writer.
#[derive(Debug)]
pub struct TableWriter<W>
where
    W: Write,
{
    writer: csv::Writer<W>,
}

impl<W> TableWriter<W>
where
    W: Write,
{
    /// Tab-delimited writer.
    pub fn new(inner: W) -> Self {
        Self::with_delimiter(inner, TAB)
    }

    pub fn with_delimiter(inner: W, delimiter: u8) -> Self {
        let writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_writer(inner);
        Self { writer }
    }

    pub fn write_fields<I, T>(&mut self, fields: I) -> Result<(), TableError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer.write_record(fields).map_err(TableError::Write)
    }

    /// Writes `record` followed by the `extra` fields.
    pub fn write_appended(&mut self, record: &StringRecord, extra: &[&str]) -> Result<(), TableError> {
        self.write_fields(record.iter().chain(extra.iter().copied()))
    }

    pub fn flush(&mut self) -> Result<(), TableError> {
        self.writer.flush().map_err(TableError::Flush)
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(self) -> Result<W, TableError> {
        self.writer
            .into_inner()
            .map_err(|e| TableError::Flush(e.into_error()))
    }
}

/// Parses field `index` of `record` as a float.
///
/// Returns `None` when the record is too short or the field is not a number.
/// `NaN` and infinity spellings parse successfully.
#[must_use]
pub fn parse_field(record: &StringRecord, index: usize) -> Option<f64> {
    record.get(index)?.parse().ok()
}

/// Field `index` of `record`, or `None` when the record is too short.
#[must_use]
pub fn label_field(record: &StringRecord, index: usize) -> Option<&str> {
    record.get(index)
}

/// Fixed six-decimal rendering used for normalized output columns.
#[must_use]
pub fn format_fixed(value: f64) -> String {
    format!("{value:.6}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[test]
    fn test_header_resolution() {
        let source = MemorySource::from("id\tvalue\ttissue\n1\t2.5\tblood\n");
        let header = Header::read(&source).unwrap();

        assert_eq!(header.names(), ["id", "value", "tissue"]);
        assert_eq!(header.column("tissue").unwrap().index, 2);
        let cols = header.columns(&["value", "id"]).unwrap();
        assert_eq!(cols[0].index, 1);
        assert_eq!(cols[1].index, 0);
    }

    #[test]
    fn test_column_at_position() {
        let source = MemorySource::from("id\tvalue\ttissue\n");
        let header = Header::read(&source).unwrap();
        assert_eq!(
            header.column_at(1).unwrap(),
            Column {
                name: "value".to_owned(),
                index: 1,
            }
        );
        assert!(matches!(
            header.column_at(3),
            Err(TableError::MissingPosition { index: 3, .. })
        ));
    }

    #[test]
    fn test_missing_column_is_error() {
        let source = MemorySource::from("id\tvalue\n");
        let header = Header::read(&source).unwrap();
        let err = header.columns(&["value", "nope"]).unwrap_err();
        assert!(matches!(
            err,
            TableError::MissingColumn { ref name, .. } if name == "nope"
        ));
    }

    #[test]
    fn test_empty_source_has_no_header() {
        let source = MemorySource::from("");
        let err = Header::read(&source).unwrap_err();
        assert!(matches!(err, TableError::MissingHeader { .. }));
    }

    #[test]
    fn test_pass_skips_header_and_allows_ragged_rows() {
        let source = MemorySource::from("a\tb\tc\n1\t2\t3\n4\n5\t6\t7\t8\n");
        let mut lengths = vec![];
        let rows = TablePass::open(&source)
            .unwrap()
            .for_each(|record| lengths.push(record.len()))
            .unwrap();
        assert_eq!(rows, 3);
        assert_eq!(lengths, [3, 1, 4]);
    }

    #[test]
    fn test_lenient_quotes() {
        let source = MemorySource::from("name\tnote\nx\tsay \"hi\" there\n");
        let mut notes = vec![];
        TablePass::open(&source)
            .unwrap()
            .for_each(|record| notes.push(record[1].to_owned()))
            .unwrap();
        assert_eq!(notes, ["say \"hi\" there"]);
    }

    #[test]
    fn test_parse_field() {
        let record = StringRecord::from(vec!["1.5", "abc", "NaN", "-inf"]);
        assert_eq!(parse_field(&record, 0), Some(1.5));
        assert_eq!(parse_field(&record, 1), None);
        assert!(parse_field(&record, 2).unwrap().is_nan());
        assert_eq!(parse_field(&record, 3), Some(f64::NEG_INFINITY));
        assert_eq!(parse_field(&record, 9), None);
        assert_eq!(label_field(&record, 1), Some("abc"));
        assert_eq!(label_field(&record, 4), None);
    }

    #[test]
    fn test_writer_appends_fields() {
        let mut writer = TableWriter::new(vec![]);
        let record = StringRecord::from(vec!["a", "b"]);
        writer.write_appended(&record, &["c"]).unwrap();
        writer.write_fields(["x"]).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(out, "a\tb\tc\nx\n");
    }

    #[test]
    fn test_comma_delimited_pass() {
        let source = MemorySource::from("p,q\n1,2\n");
        let header = TablePass::open_with(&source, b',').unwrap().into_header();
        assert_eq!(header.column("q").unwrap().index, 1);
    }

    #[test]
    fn test_headerless_pass_reads_every_line() {
        let source = MemorySource::from("a\t1\nb\t2\n");
        let mut pass = TablePass::open_headerless(&source, TAB).unwrap();
        assert!(pass.header().is_empty());
        let mut record = StringRecord::new();
        assert!(pass.read_record(&mut record).unwrap());
        assert_eq!(&record[0], "a");
        assert!(pass.read_record(&mut record).unwrap());
        assert!(!pass.read_record(&mut record).unwrap());
        assert_eq!(pass.rows(), 2);
    }

    #[test]
    fn test_non_utf8_row_is_skipped() {
        let source = MemorySource::new("latin1", b"g\tvalue\nA\t1\ncaf\xe9\t5\nA\t3\n".to_vec());
        let mut labels = vec![];
        let mut pass = TablePass::open(&source).unwrap();
        let mut record = StringRecord::new();
        while pass.read_record(&mut record).unwrap() {
            labels.push(record[1].to_owned());
        }
        assert_eq!(labels, ["1", "3"]);
        assert_eq!(pass.rows(), 3);
        assert_eq!(pass.skipped(), 1);
    }

    #[test]
    fn test_non_utf8_header_is_fatal() {
        let source = MemorySource::new("latin1", b"caf\xe9\tvalue\nA\t1\n".to_vec());
        assert!(matches!(
            Header::read(&source),
            Err(TableError::Read { .. })
        ));
    }

    #[test]
    fn test_format_fixed() {
        assert_eq!(format_fixed(-1.0), "-1.000000");
        assert_eq!(format_fixed(0.123_456_789), "0.123457");
        assert_eq!(format_fixed(f64::NAN), "NaN");
    }
}
