//! Variance normalization within one grouping factor.
//!
//! Pass 1 accumulates the moments of the value column for each label of the
//! factor. Pass 2 writes every row with `(value - mean) / sd` for its label
//! appended as `normvar`.

use std::io::Write;

use strata_stats::moments::MomentAccumulator;

use crate::{
    error::{AnalysisError, InStage as _, Stage, TableError},
    grouped::FactorMoments,
    source::TableSource,
    table::{Column, Header, TablePass, TableWriter, format_fixed, label_field, parse_field},
};

pub const NORMVAR_COLUMN: &str = "normvar";

/// Standardizes `value` within each label of `factor` and writes the table with
/// the standardized value appended. Returns the number of rows written.
pub fn normalize_variance<S, W>(
    source: &S,
    writer: &mut TableWriter<W>,
    value: &str,
    factor: &str,
) -> Result<u64, AnalysisError>
where
    S: TableSource + ?Sized,
    W: Write,
{
    let header = Header::read(source).in_stage(Stage::ResolveColumns)?;
    let value = header.column(value).in_stage(Stage::ResolveColumns)?;
    let factor = header.column(factor).in_stage(Stage::ResolveColumns)?;

    let FactorMoments { factor, moments } = FactorMoments::accumulate(source, &value, factor)?;

    let written = write_standardized(source, writer, &value, &factor, &moments)
        .in_stage(Stage::VarianceOutput)?;
    tracing::debug!(source = %source.name(), written, "wrote variance-normalized table");
    Ok(written)
}

fn write_standardized<S, W>(
    source: &S,
    writer: &mut TableWriter<W>,
    value: &Column,
    factor: &Column,
    moments: &MomentAccumulator,
) -> Result<u64, TableError>
where
    S: TableSource + ?Sized,
    W: Write,
{
    let pass = TablePass::open(source)?;
    writer.write_appended(pass.header(), &[NORMVAR_COLUMN])?;
    let mut written = 0;
    pass.try_for_each(|record| {
        let (Some(v), Some(label)) = (
            parse_field(record, value.index),
            label_field(record, factor.index),
        ) else {
            return Ok(());
        };
        let standardized = (v - moments.mean(label)) / moments.std_dev(label);
        written += 1;
        let field = format_fixed(standardized);
        writer.write_appended(record, &[field.as_str()])
    })?;
    writer.flush()?;
    Ok(written)
}
