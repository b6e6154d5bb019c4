//! Row-wise derived columns.
//!
//! Each operation copies every usable row of a table and appends one computed
//! field, after resolving its input columns against the header:
//!
//! - [`subtract_columns`]: `value - subtrahend` as [`SUB_COLUMN`]
//! - [`allele_fraction`]: `hits / count` as [`AFRAC_COLUMN`]
//! - [`window_positions`]: the start of the tiled window holding a position, as
//!   [`POSWIN_COLUMN`]
//! - [`combine_columns`]: several fields joined into one label
//!
//! Rows too short for an input column or with an unparsable number are dropped.

use std::{io::Write, num::NonZeroU64};

use csv::StringRecord;

use crate::{
    error::{AnalysisError, InStage as _, Stage, TableError},
    scaling::window_start,
    source::TableSource,
    table::{Header, TablePass, TableWriter, format_fixed, label_field, parse_field},
};

pub const SUB_COLUMN: &str = "sub";
pub const AFRAC_COLUMN: &str = "afrac";
pub const POSWIN_COLUMN: &str = "poswin";

/// Separator placed between combined fields.
pub const COMBINE_SEPARATOR: &str = "_";

/// Writes every row of `source` with `value - subtrahend` appended as `sub`.
///
/// Rows where either field does not parse are dropped. Single pass.
pub fn subtract_columns<S, W>(
    source: &S,
    writer: &mut TableWriter<W>,
    value: &str,
    subtrahend: &str,
) -> Result<u64, AnalysisError>
where
    S: TableSource + ?Sized,
    W: Write,
{
    let [value, subtrahend] = resolve(source, [value, subtrahend])?;
    append_column(source, writer, SUB_COLUMN, |record| {
        let v = parse_field(record, value)?;
        let s = parse_field(record, subtrahend)?;
        Some(format_fixed(v - s))
    })
}

/// Writes every row of `source` with `hits / count` appended as `afrac`.
///
/// A zero count gives an infinite or NaN fraction, which is written as is.
pub fn allele_fraction<S, W>(
    source: &S,
    writer: &mut TableWriter<W>,
    hits: &str,
    count: &str,
) -> Result<u64, AnalysisError>
where
    S: TableSource + ?Sized,
    W: Write,
{
    let [hits, count] = resolve(source, [hits, count])?;
    append_column(source, writer, AFRAC_COLUMN, |record| {
        let hits = parse_field(record, hits)?;
        let count = parse_field(record, count)?;
        Some((hits / count).to_string())
    })
}

/// Writes every row of `source` with the start of the `window`-sized window
/// containing `position` appended as `poswin`.
///
/// Positions must be non-negative integers.
pub fn window_positions<S, W>(
    source: &S,
    writer: &mut TableWriter<W>,
    position: &str,
    window: NonZeroU64,
) -> Result<u64, AnalysisError>
where
    S: TableSource + ?Sized,
    W: Write,
{
    let [position] = resolve(source, [position])?;
    append_column(source, writer, POSWIN_COLUMN, |record| {
        let pos = label_field(record, position)?.parse().ok()?;
        Some(window_start(pos, window).to_string())
    })
}

/// Writes every row of `source` with the `columns` fields joined by
/// `separator` appended.
///
/// The header row is combined like any other row, so the new column is named
/// after its parts. Occurrences of `separator` inside a field are replaced by
/// `.` first, keeping the parts recoverable.
pub fn combine_columns<S, W, N>(
    source: &S,
    writer: &mut TableWriter<W>,
    columns: &[N],
    separator: &str,
) -> Result<u64, AnalysisError>
where
    S: TableSource + ?Sized,
    W: Write,
    N: AsRef<str>,
{
    let header = Header::read(source).in_stage(Stage::ResolveColumns)?;
    let indices = header
        .columns(columns)
        .in_stage(Stage::ResolveColumns)?
        .into_iter()
        .map(|column| column.index)
        .collect::<Vec<_>>();
    let combine = |record: &StringRecord| {
        indices
            .iter()
            .map(|&index| label_field(record, index).map(|field| field.replace(separator, ".")))
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.join(separator))
    };

    let name = columns
        .iter()
        .map(|name| name.as_ref().replace(separator, "."))
        .collect::<Vec<_>>()
        .join(separator);
    append_column(source, writer, &name, combine)
}

fn resolve<S, const N: usize>(source: &S, names: [&str; N]) -> Result<[usize; N], AnalysisError>
where
    S: TableSource + ?Sized,
{
    let header = Header::read(source).in_stage(Stage::ResolveColumns)?;
    let mut indices = [0; N];
    for (index, name) in indices.iter_mut().zip(names) {
        *index = header.column(name).in_stage(Stage::ResolveColumns)?.index;
    }
    Ok(indices)
}

/// Copies the table with `derive(record)` appended to each row, dropping rows
/// where it returns `None`. Returns the number of data rows written.
fn append_column<S, W, F>(
    source: &S,
    writer: &mut TableWriter<W>,
    name: &str,
    derive: F,
) -> Result<u64, AnalysisError>
where
    S: TableSource + ?Sized,
    W: Write,
    F: FnMut(&StringRecord) -> Option<String>,
{
    let (rows, written) = write_derived(source, writer, name, derive).in_stage(Stage::DerivedColumn {
        column: name.to_owned(),
    })?;
    tracing::debug!(source = %source.name(), column = name, rows, written, "wrote derived column");
    Ok(written)
}

fn write_derived<S, W, F>(
    source: &S,
    writer: &mut TableWriter<W>,
    name: &str,
    mut derive: F,
) -> Result<(u64, u64), TableError>
where
    S: TableSource + ?Sized,
    W: Write,
    F: FnMut(&StringRecord) -> Option<String>,
{
    let pass = TablePass::open(source)?;
    writer.write_appended(pass.header(), &[name])?;
    let mut written = 0;
    let rows = pass.try_for_each(|record| {
        let Some(field) = derive(record) else {
            return Ok(());
        };
        written += 1;
        writer.write_appended(record, &[field.as_str()])
    })?;
    writer.flush()?;
    Ok((rows, written))
}
