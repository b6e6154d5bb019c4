//! Serial mean normalization.
//!
//! Removes the additive effect of an ordered chain of categorical factors from
//! a numeric column. Stage `i` is a [`GroupAccumulator`] of the residuals left
//! after subtracting the group means of stages `0..i`, keyed by the row's label
//! for factor `i`:
//!
//! ```text
//! resid_i(row) = value(row) - Σ_{j<i} mean_j(label_j(row))
//! ```
//!
//! Every stage needs one full pass over the source, and stage `i` can only be
//! built once all earlier stages are complete. Writing the normalized table is
//! one more pass, so `n` factors cost `n + 1` passes. The decomposition is
//! order-dependent: each factor only absorbs what earlier factors left behind.
//!
//! # Unseen labels
//!
//! A label that never received a value in an earlier stage has a NaN mean. While
//! building, such a residual is NaN and therefore dropped by the accumulator.
//! While writing, the NaN residual is written as-is.

use std::io::Write;

use csv::StringRecord;
use strata_stats::group::GroupAccumulator;

use crate::{
    error::{AnalysisError, InStage as _, Stage, TableError},
    source::TableSource,
    table::{Column, Header, TablePass, TableWriter, format_fixed, label_field, parse_field},
};

/// Name of the column appended to normalized output.
pub const NORM_COLUMN: &str = "norm";

/// One finished stage of a serial normalization.
#[derive(Debug, Clone)]
pub struct SerialStage {
    pub factor: Column,
    pub means: GroupAccumulator,
}

/// A fully built chain of serial normalization stages for one value column.
#[derive(Debug, Clone)]
pub struct SerialNormalizer {
    value: Column,
    stages: Vec<SerialStage>,
}

impl SerialNormalizer {
    /// Resolves column names on `source` and builds every stage.
    pub fn build<S, N>(source: &S, value: &str, factors: &[N]) -> Result<Self, AnalysisError>
    where
        S: TableSource + ?Sized,
        N: AsRef<str>,
    {
        let header = Header::read(source).in_stage(Stage::ResolveColumns)?;
        let value = header.column(value).in_stage(Stage::ResolveColumns)?;
        let factors = header.columns(factors).in_stage(Stage::ResolveColumns)?;
        Self::fit(source, value, factors)
    }

    /// Builds the stages for already-resolved columns, one pass per factor in
    /// the given order.
    pub fn fit<S>(source: &S, value: Column, factors: Vec<Column>) -> Result<Self, AnalysisError>
    where
        S: TableSource + ?Sized,
    {
        let mut normalizer = Self {
            value,
            stages: Vec::with_capacity(factors.len()),
        };
        for factor in factors {
            let stage = normalizer.fit_stage(source, factor)?;
            normalizer.stages.push(stage);
        }
        Ok(normalizer)
    }

    fn fit_stage<S>(&self, source: &S, factor: Column) -> Result<SerialStage, AnalysisError>
    where
        S: TableSource + ?Sized,
    {
        let mut means: GroupAccumulator = GroupAccumulator::new();
        let rows = TablePass::open(source)
            .and_then(|pass| {
                pass.for_each(|record| {
                    let Some(label) = label_field(record, factor.index) else {
                        return;
                    };
                    if let Some(resid) = self.residual(record) {
                        means.add(resid, label);
                    }
                })
            })
            .in_stage(Stage::SerialMean {
                factor: factor.name.clone(),
            })?;

        tracing::debug!(
            source = %source.name(),
            stage = self.stages.len(),
            factor = %factor.name,
            rows,
            groups = means.len(),
            "built serial stage"
        );
        Ok(SerialStage { factor, means })
    }

    #[must_use]
    pub fn value(&self) -> &Column {
        &self.value
    }

    /// Finished stages in build order.
    #[must_use]
    pub fn stages(&self) -> &[SerialStage] {
        &self.stages
    }

    /// Value of `record` minus the means of all finished stages.
    ///
    /// Returns `None` when the value does not parse or the record is too short
    /// for any stage's factor column.
    #[must_use]
    pub fn residual(&self, record: &StringRecord) -> Option<f64> {
        let mut resid = parse_field(record, self.value.index)?;
        for stage in &self.stages {
            resid -= stage.means.mean(label_field(record, stage.factor.index)?);
        }
        Some(resid)
    }

    /// Streams `source` once more and writes every row with its residual
    /// appended as [`NORM_COLUMN`]. Rows without a residual are dropped.
    ///
    /// Returns the number of data rows written.
    pub fn write_normalized<S, W>(
        &self,
        source: &S,
        writer: &mut TableWriter<W>,
    ) -> Result<u64, AnalysisError>
    where
        S: TableSource + ?Sized,
        W: Write,
    {
        let mut written = 0;
        let rows = self
            .try_write_normalized(source, writer, &mut written)
            .in_stage(Stage::NormalizeOutput)?;
        tracing::debug!(source = %source.name(), rows, written, "wrote normalized table");
        Ok(written)
    }

    fn try_write_normalized<S, W>(
        &self,
        source: &S,
        writer: &mut TableWriter<W>,
        written: &mut u64,
    ) -> Result<u64, TableError>
    where
        S: TableSource + ?Sized,
        W: Write,
    {
        let pass = TablePass::open(source)?;
        writer.write_appended(pass.header(), &[NORM_COLUMN])?;
        let rows = pass.try_for_each(|record| {
            let Some(resid) = self.residual(record) else {
                return Ok(());
            };
            *written += 1;
            let norm = format_fixed(resid);
            writer.write_appended(record, &[norm.as_str()])
        })?;
        writer.flush()?;
        Ok(rows)
    }
}

/// Builds a serial normalizer for `value` over `factors` (in order) and writes
/// the normalized table. Total passes: one per factor plus one.
pub fn normalize<S, W, N>(
    source: &S,
    writer: &mut TableWriter<W>,
    value: &str,
    factors: &[N],
) -> Result<SerialNormalizer, AnalysisError>
where
    S: TableSource + ?Sized,
    W: Write,
    N: AsRef<str>,
{
    let normalizer = SerialNormalizer::build(source, value, factors)?;
    normalizer.write_normalized(source, writer)?;
    Ok(normalizer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn normalized(table: &str, factors: &[&str]) -> Vec<String> {
        let source = MemorySource::from(table);
        let mut writer = TableWriter::new(vec![]);
        normalize(&source, &mut writer, "value", factors).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        out.lines()
            .map(|line| line.rsplit('\t').next().unwrap().to_owned())
            .collect()
    }

    #[test]
    fn test_single_factor_is_mean_centering() {
        let table = "g\tvalue\nA\t1\nB\t2\nA\t3\nB\t4\n";
        assert_eq!(
            normalized(table, &["g"]),
            ["norm", "-1.000000", "-1.000000", "1.000000", "1.000000"]
        );
    }

    #[test]
    fn test_second_stage_sees_first_stage_residuals() {
        let table = "\
a\tb\tvalue
x\tp\t1
x\tq\t3
y\tp\t10
y\tq\t14
";
        let source = MemorySource::from(table);
        let normalizer = SerialNormalizer::build(&source, "value", &["a", "b"]).unwrap();
        let stages = normalizer.stages();
        assert_eq!(stages.len(), 2);

        assert_eq!(stages[0].means.mean("x"), 2.0);
        assert_eq!(stages[0].means.mean("y"), 12.0);
        // residuals after stage 0: -1, 1, -2, 2
        assert_eq!(stages[1].means.mean("p"), -1.5);
        assert_eq!(stages[1].means.mean("q"), 1.5);

        let record = StringRecord::from(vec!["y", "q", "14"]);
        assert_eq!(normalizer.residual(&record), Some(0.5));
    }

    #[test]
    fn test_unparsable_and_short_rows_are_dropped() {
        let table = "g\tvalue\nA\t1\nA\tn/a\nA\t3\nB\n";
        assert_eq!(
            normalized(table, &["g"]),
            ["norm", "-1.000000", "1.000000"]
        );
    }

    #[test]
    fn test_header_is_preserved() {
        let source = MemorySource::from("id\tg\tvalue\nr1\tA\t5\n");
        let mut writer = TableWriter::new(vec![]);
        normalize(&source, &mut writer, "value", &["g"]).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(out, "id\tg\tvalue\tnorm\nr1\tA\t5\t0.000000\n");
    }

    #[test]
    fn test_missing_factor_column_is_fatal() {
        let source = MemorySource::from("g\tvalue\nA\t1\n");
        let mut writer = TableWriter::new(vec![]);
        let err = normalize(&source, &mut writer, "value", &["g", "h"]).unwrap_err();
        assert_eq!(err.stage, Stage::ResolveColumns);
    }

    #[test]
    fn test_no_factors_passes_values_through() {
        assert_eq!(
            normalized("value\n2.5\n", &[]),
            ["norm", "2.500000"]
        );
    }
}
