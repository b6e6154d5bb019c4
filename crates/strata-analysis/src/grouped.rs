//! Grouped descriptive statistics over one numeric column.
//!
//! [`GroupSummaries`] builds one [`MomentAccumulator`] per grouping factor in a
//! single pass. For each row the value column is parsed once and added to every
//! factor's accumulator under that row's label for the factor.
//!
//! The same pass can also fold one factor into a [`ControlSplit`]: every label
//! of that factor is counted either as the control tissue ([`CONTROL_LABEL`],
//! matched as `blood` or `Blood`) or as [`REST_LABEL`].
//!
//! Rows whose value does not parse are skipped entirely. Rows too short for a
//! particular factor column are skipped for that factor only.

use std::io::Write;

use strata_stats::moments::{GroupMoments, MomentAccumulator};

use crate::{
    error::{AnalysisError, ErrorKind, InStage as _, Stage, TableError},
    hypothesis::GroupSelector,
    source::TableSource,
    table::{Column, Header, TablePass, TableWriter, label_field, parse_field},
};

/// Label of the control tissue.
pub const CONTROL_LABEL: &str = "blood";

/// Label every non-control tissue is folded into by a [`ControlSplit`].
pub const REST_LABEL: &str = "notblood";

const SUMMARY_COLUMNS: [&str; 6] = ["factor", "label", "count", "mean", "variance", "sd"];

/// [`CONTROL_LABEL`] for `blood` and `Blood`, [`REST_LABEL`] for anything else.
#[must_use]
pub fn control_split_label(label: &str) -> &'static str {
    match label {
        "blood" | "Blood" => CONTROL_LABEL,
        _ => REST_LABEL,
    }
}

/// Moments of the value column grouped by one factor column.
#[derive(Debug, Clone)]
pub struct FactorMoments {
    pub factor: Column,
    pub moments: MomentAccumulator,
}

impl FactorMoments {
    fn empty(factor: Column) -> Self {
        Self {
            factor,
            moments: MomentAccumulator::new(),
        }
    }

    /// Accumulates `value` grouped by a single resolved `factor` in one pass.
    pub fn accumulate<S>(source: &S, value: &Column, factor: Column) -> Result<Self, AnalysisError>
    where
        S: TableSource + ?Sized,
    {
        let mut moments = Self::empty(factor);
        accumulate_pass(source, value, std::slice::from_mut(&mut moments), None)?;
        Ok(moments)
    }
}

/// Moments of the value column with one factor folded into control and rest.
#[derive(Debug, Clone)]
pub struct ControlSplit {
    pub factor: Column,
    pub moments: MomentAccumulator,
}

impl ControlSplit {
    fn empty(factor: Column) -> Self {
        Self {
            factor,
            moments: MomentAccumulator::new(),
        }
    }

    fn get(&self, label: &str) -> Result<GroupMoments, ErrorKind> {
        self.moments
            .summary(label)
            .ok_or_else(|| ErrorKind::MissingGroup {
                factor: self.factor.name.clone(),
                label: label.to_owned(),
            })
    }

    /// Summary of the control rows.
    pub fn control(&self) -> Result<GroupMoments, ErrorKind> {
        self.get(CONTROL_LABEL)
    }

    /// Summary of every other row.
    pub fn rest(&self) -> Result<GroupMoments, ErrorKind> {
        self.get(REST_LABEL)
    }

    /// Writes the control and rest rows in the [`GroupSummaries::write_table`]
    /// layout, without a header.
    pub fn write_rows<W>(&self, writer: &mut TableWriter<W>) -> Result<(), AnalysisError>
    where
        W: Write,
    {
        write_moment_rows(writer, &self.factor.name, &self.moments)
            .and_then(|()| writer.flush())
            .in_stage(Stage::SummaryOutput)
    }
}

/// Per-factor grouped moments of a single value column.
#[derive(Debug, Clone)]
pub struct GroupSummaries {
    pub value: Column,
    pub factors: Vec<FactorMoments>,
}

impl GroupSummaries {
    /// Resolves `value` and `factors` against the header of `source`, then
    /// accumulates every factor in one pass.
    pub fn build<S, N>(source: &S, value: &str, factors: &[N]) -> Result<Self, AnalysisError>
    where
        S: TableSource + ?Sized,
        N: AsRef<str>,
    {
        let header = Header::read(source).in_stage(Stage::ResolveColumns)?;
        let value = header.column(value).in_stage(Stage::ResolveColumns)?;
        let factors = header.columns(factors).in_stage(Stage::ResolveColumns)?;
        Self::accumulate(source, value, factors)
    }

    /// Like [`build`](Self::build), and in the same pass folds `control_factor`
    /// into a [`ControlSplit`].
    pub fn build_with_control_split<S, N>(
        source: &S,
        value: &str,
        factors: &[N],
        control_factor: &str,
    ) -> Result<(Self, ControlSplit), AnalysisError>
    where
        S: TableSource + ?Sized,
        N: AsRef<str>,
    {
        let header = Header::read(source).in_stage(Stage::ResolveColumns)?;
        let value = header.column(value).in_stage(Stage::ResolveColumns)?;
        let factors = header.columns(factors).in_stage(Stage::ResolveColumns)?;
        let mut split = ControlSplit::empty(
            header
                .column(control_factor)
                .in_stage(Stage::ResolveColumns)?,
        );

        let mut factors = factors.into_iter().map(FactorMoments::empty).collect::<Vec<_>>();
        accumulate_pass(source, &value, &mut factors, Some(&mut split))?;
        tracing::info!(
            factor = %split.factor.name,
            control = split.moments.count(CONTROL_LABEL),
            rest = split.moments.count(REST_LABEL),
            "split control factor"
        );
        Ok((Self { value, factors }, split))
    }

    /// Accumulates already-resolved columns in one pass.
    pub fn accumulate<S>(
        source: &S,
        value: Column,
        factors: Vec<Column>,
    ) -> Result<Self, AnalysisError>
    where
        S: TableSource + ?Sized,
    {
        let mut factors = factors.into_iter().map(FactorMoments::empty).collect::<Vec<_>>();
        accumulate_pass(source, &value, &mut factors, None)?;
        Ok(Self { value, factors })
    }

    /// Moments grouped by the factor named `name`.
    #[must_use]
    pub fn factor(&self, name: &str) -> Option<&FactorMoments> {
        self.factors.iter().find(|f| f.factor.name == name)
    }

    /// Summary of the group picked by `selector`.
    ///
    /// Unknown factors and labels without observations are errors.
    pub fn select(&self, selector: &GroupSelector) -> Result<GroupMoments, ErrorKind> {
        let factor = self
            .factor(&selector.factor)
            .ok_or_else(|| ErrorKind::MissingFactor {
                factor: selector.factor.clone(),
            })?;
        factor
            .moments
            .summary(selector.label.as_str())
            .ok_or_else(|| ErrorKind::MissingGroup {
                factor: selector.factor.clone(),
                label: selector.label.clone(),
            })
    }

    /// Writes one row per (factor, label):
    /// `factor, label, count, mean, variance, sd`.
    pub fn write_table<W>(&self, writer: &mut TableWriter<W>) -> Result<(), AnalysisError>
    where
        W: Write,
    {
        self.try_write_table(writer).in_stage(Stage::SummaryOutput)
    }

    fn try_write_table<W>(&self, writer: &mut TableWriter<W>) -> Result<(), TableError>
    where
        W: Write,
    {
        writer.write_fields(SUMMARY_COLUMNS)?;
        for factor in &self.factors {
            write_moment_rows(writer, &factor.factor.name, &factor.moments)?;
        }
        writer.flush()
    }
}

fn write_moment_rows<W>(
    writer: &mut TableWriter<W>,
    factor: &str,
    moments: &MomentAccumulator,
) -> Result<(), TableError>
where
    W: Write,
{
    for (label, m) in moments.summaries() {
        writer.write_fields([
            factor.to_owned(),
            label.clone(),
            m.count.to_string(),
            m.mean.to_string(),
            m.variance.to_string(),
            m.std_dev.to_string(),
        ])?;
    }
    Ok(())
}

/// One pass adding every parsed value to each factor and, if given, to the
/// control split.
fn accumulate_pass<S>(
    source: &S,
    value: &Column,
    factors: &mut [FactorMoments],
    mut split: Option<&mut ControlSplit>,
) -> Result<(), AnalysisError>
where
    S: TableSource + ?Sized,
{
    let mut accepted = 0_u64;
    let rows = TablePass::open(source)
        .and_then(|pass| {
            pass.for_each(|record| {
                let Some(v) = parse_field(record, value.index) else {
                    return;
                };
                accepted += 1;
                for summary in factors.iter_mut() {
                    if let Some(label) = label_field(record, summary.factor.index) {
                        summary.moments.add(v, label);
                    }
                }
                if let Some(split) = split.as_deref_mut() {
                    if let Some(label) = label_field(record, split.factor.index) {
                        split.moments.add(v, control_split_label(label));
                    }
                }
            })
        })
        .in_stage(Stage::GroupSummary)?;

    tracing::debug!(
        source = %source.name(),
        value = %value.name,
        rows,
        accepted,
        "accumulated group summaries"
    );
    for summary in factors.iter() {
        tracing::info!(
            factor = %summary.factor.name,
            groups = summary.moments.len(),
            "summarized factor"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    const TABLE: &str = "\
sample\ttissue\tchrom\tvalue
s1\tblood\t1\t1.0
s1\tblood\tX\t3.0
s2\tliver\t1\t2.0
s2\tliver\tX\tnot-a-number
s3\tliver\t1\t4.0
s4\tbrain
";

    #[test]
    fn test_build_accumulates_every_factor() {
        let source = MemorySource::from(TABLE);
        let summaries = GroupSummaries::build(&source, "value", &["tissue", "chrom"]).unwrap();

        let tissue = &summaries.factor("tissue").unwrap().moments;
        assert_eq!(tissue.count("blood"), 2.0);
        assert_eq!(tissue.mean("blood"), 2.0);
        assert_eq!(tissue.count("liver"), 2.0);
        assert_eq!(tissue.mean("liver"), 3.0);
        assert!(!tissue.contains("brain"));

        let chrom = &summaries.factor("chrom").unwrap().moments;
        assert_eq!(chrom.count("1"), 3.0);
        assert_eq!(chrom.count("X"), 1.0);
    }

    #[test]
    fn test_missing_value_column_is_fatal() {
        let source = MemorySource::from(TABLE);
        let err = GroupSummaries::build(&source, "absent", &["tissue"]).unwrap_err();
        assert_eq!(err.stage, Stage::ResolveColumns);
    }

    #[test]
    fn test_select() {
        let source = MemorySource::from(TABLE);
        let summaries = GroupSummaries::build(&source, "value", &["tissue"]).unwrap();

        let liver = summaries
            .select(&GroupSelector::new("tissue", "liver"))
            .unwrap();
        assert_eq!(liver.count, 2.0);
        assert_eq!(liver.variance, 1.0);

        assert!(matches!(
            summaries.select(&GroupSelector::new("tissue", "kidney")),
            Err(ErrorKind::MissingGroup { .. })
        ));
        assert!(matches!(
            summaries.select(&GroupSelector::new("chrom", "1")),
            Err(ErrorKind::MissingFactor { .. })
        ));
    }

    #[test]
    fn test_short_rows_skip_only_missing_factor() {
        let source = MemorySource::from("value\tf1\tf2\n1\ta\tx\n2\ta\n");
        let summaries = GroupSummaries::build(&source, "value", &["f1", "f2"]).unwrap();
        assert_eq!(summaries.factors[0].moments.count("a"), 2.0);
        assert_eq!(summaries.factors[1].moments.count("x"), 1.0);
    }

    #[test]
    fn test_non_utf8_row_does_not_abort_summary() {
        let source = MemorySource::new("latin1", b"g\tvalue\nA\t1\nA\t3\ncaf\xe9\t5\n".to_vec());
        let summaries = GroupSummaries::build(&source, "value", &["g"]).unwrap();
        let g = &summaries.factors[0].moments;
        assert_eq!(g.len(), 1);
        assert_eq!(g.count("A"), 2.0);
        assert_eq!(g.mean("A"), 2.0);
    }

    #[test]
    fn test_control_split_label() {
        assert_eq!(control_split_label("blood"), CONTROL_LABEL);
        assert_eq!(control_split_label("Blood"), CONTROL_LABEL);
        assert_eq!(control_split_label("BLOOD"), REST_LABEL);
        assert_eq!(control_split_label("bloody"), REST_LABEL);
        assert_eq!(control_split_label("liver"), REST_LABEL);
    }

    #[test]
    fn test_control_split_pools_other_tissues() {
        let source = MemorySource::from("tissue\tvalue\nblood\t1\nBlood\t3\nliver\t10\nbrain\t20\nkidney\tx\n");
        let (summaries, split) =
            GroupSummaries::build_with_control_split(&source, "value", &["tissue"], "tissue")
                .unwrap();
        assert_eq!(summaries.factors[0].moments.len(), 4);

        let control = split.control().unwrap();
        assert_eq!(control.count, 2.0);
        assert_eq!(control.mean, 2.0);
        let rest = split.rest().unwrap();
        assert_eq!(rest.count, 2.0);
        assert_eq!(rest.mean, 15.0);

        let mut writer = TableWriter::new(vec![]);
        split.write_rows(&mut writer).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(out, "tissue\tblood\t2\t2\t1\t1\ntissue\tnotblood\t2\t15\t25\t5\n");
    }

    #[test]
    fn test_control_split_without_control_rows() {
        let source = MemorySource::from("tissue\tvalue\nliver\t1\n");
        let (_, split) =
            GroupSummaries::build_with_control_split(&source, "value", &["tissue"], "tissue")
                .unwrap();
        assert!(matches!(
            split.control(),
            Err(ErrorKind::MissingGroup { ref label, .. }) if label == CONTROL_LABEL
        ));
        assert!(split.rest().is_ok());
    }

    #[test]
    fn test_write_table() {
        let source = MemorySource::from("value\tg\n1\ta\n3\ta\n5\tb\n");
        let summaries = GroupSummaries::build(&source, "value", &["g"]).unwrap();
        let mut writer = TableWriter::new(vec![]);
        summaries.write_table(&mut writer).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(
            out,
            "factor\tlabel\tcount\tmean\tvariance\tsd\n\
             g\ta\t2\t2\t1\t1\n\
             g\tb\t1\t5\t0\t0\n"
        );
    }
}
