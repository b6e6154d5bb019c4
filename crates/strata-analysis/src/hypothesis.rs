//! Batches of two-group t-tests and F-tests over grouped summaries.
//!
//! A [`TestSet`] names two groups, each by a `(factor, label)` [`GroupSelector`],
//! possibly from different factors. Evaluating a batch against
//! [`GroupSummaries`] yields one [`TestResult`] per set in input order. A
//! selector that names an unknown factor or a label without observations fails
//! the whole batch before any row is written.
//!
//! Result rows have twelve tab-separated fields:
//!
//! ```text
//! name1  name2  count1  count2  mean1  mean2  sd1  sd2  stat  df1  df2  p
//! ```
//!
//! For a t-test both df columns hold the combined degrees of freedom.
//!
//! [`test_control_vs_rest`] instead contrasts the control tissue with all other
//! tissues pooled, producing a single `blood`/`notblood` row.

use std::io::Write;

use csv::StringRecord;
use strata_stats::{hypothesis::TestKind, moments::GroupMoments};

use crate::{
    error::{AnalysisError, ErrorKind, InStage as _, Stage, TableError},
    grouped::{self, GroupSummaries},
    source::TableSource,
    table::{TAB, TablePass, TableWriter, parse_field},
};

/// Label used for the control group when none is given.
pub const DEFAULT_CONTROL_LABEL: &str = grouped::CONTROL_LABEL;

/// Number of fields in a result row.
pub const RESULT_FIELDS: usize = 12;

/// Identifies one group: the rows whose `factor` column equals `label`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSelector {
    pub factor: String,
    pub label: String,
}

impl GroupSelector {
    pub fn new(factor: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            factor: factor.into(),
            label: label.into(),
        }
    }
}

/// A pair of groups to contrast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSet {
    pub control: GroupSelector,
    pub experiment: GroupSelector,
}

impl TestSet {
    /// One set per label of `test_factor`, in ascending label order, each
    /// contrasted with `control`.
    pub fn against_control(
        summaries: &GroupSummaries,
        control: &GroupSelector,
        test_factor: &str,
    ) -> Result<Vec<Self>, ErrorKind> {
        let factor = summaries
            .factor(test_factor)
            .ok_or_else(|| ErrorKind::MissingFactor {
                factor: test_factor.to_owned(),
            })?;
        Ok(factor
            .moments
            .keys()
            .map(|label| Self {
                control: control.clone(),
                experiment: GroupSelector::new(test_factor, label.as_str()),
            })
            .collect())
    }
}

/// Everything reported for one contrast.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub name1: String,
    pub name2: String,
    pub count1: f64,
    pub count2: f64,
    pub mean1: f64,
    pub mean2: f64,
    pub sd1: f64,
    pub sd2: f64,
    pub statistic: f64,
    pub df1: f64,
    pub df2: f64,
    pub p: f64,
}

impl TestResult {
    /// Runs `kind` on the two groups of `set`.
    pub fn evaluate(
        kind: TestKind,
        summaries: &GroupSummaries,
        set: &TestSet,
    ) -> Result<Self, ErrorKind> {
        let control = summaries.select(&set.control)?;
        let experiment = summaries.select(&set.experiment)?;
        Ok(Self::contrast(
            kind,
            (set.control.label.as_str(), &control),
            (set.experiment.label.as_str(), &experiment),
        ))
    }

    /// Runs `kind` on two named group summaries.
    #[must_use]
    pub fn contrast(
        kind: TestKind,
        (name1, control): (&str, &GroupMoments),
        (name2, experiment): (&str, &GroupMoments),
    ) -> Self {
        let outcome = kind.evaluate(control, experiment);
        Self {
            name1: name1.to_owned(),
            name2: name2.to_owned(),
            count1: control.count,
            count2: experiment.count,
            mean1: control.mean,
            mean2: experiment.mean,
            sd1: control.std_dev,
            sd2: experiment.std_dev,
            statistic: outcome.statistic,
            df1: outcome.df1,
            df2: outcome.df2,
            p: outcome.p,
        }
    }

    /// The twelve output fields in row order.
    #[must_use]
    pub fn fields(&self) -> [String; RESULT_FIELDS] {
        [
            self.name1.clone(),
            self.name2.clone(),
            self.count1.to_string(),
            self.count2.to_string(),
            self.mean1.to_string(),
            self.mean2.to_string(),
            self.sd1.to_string(),
            self.sd2.to_string(),
            self.statistic.to_string(),
            self.df1.to_string(),
            self.df2.to_string(),
            self.p.to_string(),
        ]
    }

    pub fn write_row<W>(&self, writer: &mut TableWriter<W>) -> Result<(), TableError>
    where
        W: Write,
    {
        writer.write_fields(self.fields())
    }

    /// Reads a row written by [`write_row`](Self::write_row). Fields past the
    /// twelfth are ignored; `line` is only used for the error.
    pub fn parse_row(record: &StringRecord, line: u64) -> Result<Self, ErrorKind> {
        let malformed = || ErrorKind::MalformedResult { line };
        let number = |index| parse_field(record, index).ok_or_else(malformed);
        if record.len() < RESULT_FIELDS {
            return Err(malformed());
        }
        Ok(Self {
            name1: record[0].to_owned(),
            name2: record[1].to_owned(),
            count1: number(2)?,
            count2: number(3)?,
            mean1: number(4)?,
            mean2: number(5)?,
            sd1: number(6)?,
            sd2: number(7)?,
            statistic: number(8)?,
            df1: number(9)?,
            df2: number(10)?,
            p: number(11)?,
        })
    }
}

/// Reads every row of a headerless result table.
pub fn read_results<S>(source: &S) -> Result<Vec<TestResult>, ErrorKind>
where
    S: TableSource + ?Sized,
{
    let mut pass = TablePass::open_headerless(source, TAB)?;
    let mut record = StringRecord::new();
    let mut results = vec![];
    while pass.read_record(&mut record)? {
        results.push(TestResult::parse_row(&record, pass.rows())?);
    }
    Ok(results)
}

/// Evaluates every set, then writes the results in input order.
pub fn run_tests<W>(
    kind: TestKind,
    summaries: &GroupSummaries,
    sets: &[TestSet],
    writer: &mut TableWriter<W>,
) -> Result<Vec<TestResult>, AnalysisError>
where
    W: Write,
{
    let results = sets
        .iter()
        .map(|set| TestResult::evaluate(kind, summaries, set))
        .collect::<Result<Vec<_>, _>>()
        .in_stage(Stage::TestBatch)?;

    results
        .iter()
        .try_for_each(|result| result.write_row(writer))
        .and_then(|()| writer.flush())
        .in_stage(Stage::TestBatch)?;

    tracing::info!(%kind, tests = results.len(), "ran hypothesis tests");
    Ok(results)
}

/// Summarizes `value` by `control_factor` and `test_factor` in one pass and
/// contrasts the control group with every label of `test_factor`.
pub fn test_against_control<S, W>(
    source: &S,
    writer: &mut TableWriter<W>,
    kind: TestKind,
    value: &str,
    control: &GroupSelector,
    test_factor: &str,
) -> Result<Vec<TestResult>, AnalysisError>
where
    S: TableSource + ?Sized,
    W: Write,
{
    let summaries =
        GroupSummaries::build(source, value, &[control.factor.as_str(), test_factor])?;
    let sets =
        TestSet::against_control(&summaries, control, test_factor).in_stage(Stage::TestBatch)?;
    run_tests(kind, &summaries, &sets, writer)
}

/// Folds `control_factor` into control and rest in one pass and contrasts the
/// two. Both groups must have observations.
pub fn test_control_vs_rest<S, W>(
    source: &S,
    writer: &mut TableWriter<W>,
    kind: TestKind,
    value: &str,
    control_factor: &str,
) -> Result<TestResult, AnalysisError>
where
    S: TableSource + ?Sized,
    W: Write,
{
    let no_factors: [&str; 0] = [];
    let (_, split) =
        GroupSummaries::build_with_control_split(source, value, &no_factors, control_factor)?;
    let control = split.control().in_stage(Stage::TestBatch)?;
    let rest = split.rest().in_stage(Stage::TestBatch)?;
    let result = TestResult::contrast(
        kind,
        (grouped::CONTROL_LABEL, &control),
        (grouped::REST_LABEL, &rest),
    );
    result
        .write_row(writer)
        .and_then(|()| writer.flush())
        .in_stage(Stage::TestBatch)?;
    tracing::info!(%kind, p = result.p, "ran control versus rest test");
    Ok(result)
}
