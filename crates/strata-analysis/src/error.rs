//! Error types shared by all pipelines.
//!
//! Row-level data problems (short rows, unparsable numbers) are never errors;
//! they are skipped where they occur. Everything in this module is fatal for the
//! operation that produced it.
//!
//! Pipeline entry points return [`AnalysisError`], which records the [`Stage`]
//! (the pass or step) that failed together with the underlying [`ErrorKind`].

use std::io;

use crate::model::ModelError;

/// Failure while opening, reading or writing a delimited table.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum TableError {
    #[display("failed to open {source_name}")]
    Open {
        source_name: String,
        source: io::Error,
    },
    #[display("failed to read {source_name}")]
    Read {
        source_name: String,
        source: csv::Error,
    },
    #[display("{source_name} has no header row")]
    MissingHeader { source_name: String },
    #[display("column '{name}' not found in header of {source_name}")]
    MissingColumn { name: String, source_name: String },
    #[display("{source_name} has no column at position {index}")]
    MissingPosition { index: usize, source_name: String },
    #[display("failed to write table row")]
    Write(csv::Error),
    #[display("failed to flush table output")]
    Flush(io::Error),
}

/// The pass or step of a pipeline in which an error occurred.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum Stage {
    #[display("column resolution")]
    ResolveColumns,
    #[display("group summary pass")]
    GroupSummary,
    #[display("group summary output")]
    SummaryOutput,
    #[display("serial mean pass for factor '{factor}'")]
    SerialMean { factor: String },
    #[display("normalization output pass")]
    NormalizeOutput,
    #[display("variance normalization output pass")]
    VarianceOutput,
    #[display("regression mean pass")]
    MeanPass,
    #[display("regression fit pass")]
    FitPass,
    #[display("residual output pass")]
    ResidualOutput,
    #[display("prediction output pass")]
    PredictionOutput,
    #[display("model output")]
    ModelOutput,
    #[display("hypothesis test batch")]
    TestBatch,
    #[display("result scaling")]
    ResultScaling,
    #[display("'{column}' column pass")]
    DerivedColumn { column: String },
    #[display("group correlation pass")]
    CorrelationPass,
}

/// What went wrong, independent of where.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum ErrorKind {
    #[display("table access failed")]
    Table(TableError),
    #[display("model access failed")]
    Model(ModelError),
    #[display("factor '{factor}' was not summarized")]
    #[from(ignore)]
    MissingFactor { factor: String },
    #[display("no observations for {factor}={label}")]
    #[from(ignore)]
    MissingGroup { factor: String, label: String },
    #[display("no probes found for '{key}'")]
    #[from(ignore)]
    MissingProbes { key: String },
    #[display("result name '{name}' has fewer than {expected} '_'-separated fields")]
    #[from(ignore)]
    MalformedResultName { name: String, expected: usize },
    #[display("result row {line} is malformed")]
    #[from(ignore)]
    MalformedResult { line: u64 },
    #[display("probe info row {line} is malformed")]
    #[from(ignore)]
    MalformedProbe { line: u64 },
    #[display("expected exactly one model with a slope, found {count}")]
    #[from(ignore)]
    ModelCount { count: usize },
}

/// A fatal pipeline error qualified by the stage that produced it.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("{stage} failed")]
pub struct AnalysisError {
    pub stage: Stage,
    pub source: ErrorKind,
}

impl AnalysisError {
    #[must_use]
    pub fn new(stage: Stage, source: impl Into<ErrorKind>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// Attaches a [`Stage`] to a fallible result.
pub(crate) trait InStage<T> {
    fn in_stage(self, stage: Stage) -> Result<T, AnalysisError>;
}

impl<T, E> InStage<T> for Result<T, E>
where
    E: Into<ErrorKind>,
{
    fn in_stage(self, stage: Stage) -> Result<T, AnalysisError> {
        self.map_err(|e| AnalysisError::new(stage, e))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_display_is_stage_qualified() {
        let err = AnalysisError::new(
            Stage::SerialMean {
                factor: "tissue".to_owned(),
            },
            TableError::MissingHeader {
                source_name: "data.tsv".to_owned(),
            },
        );
        assert_eq!(err.to_string(), "serial mean pass for factor 'tissue' failed");

        let kind = err.source().unwrap();
        assert_eq!(kind.to_string(), "table access failed");
        let table = kind.source().unwrap();
        assert_eq!(table.to_string(), "data.tsv has no header row");
    }

    #[test]
    fn test_missing_group_message() {
        let kind = ErrorKind::MissingGroup {
            factor: "chrom".to_owned(),
            label: "X".to_owned(),
        };
        assert_eq!(kind.to_string(), "no observations for chrom=X");
        assert!(kind.source().is_none());
    }

    #[test]
    fn test_in_stage_wraps_error() {
        let result: Result<(), TableError> = Err(TableError::MissingColumn {
            name: "value".to_owned(),
            source_name: "t.tsv".to_owned(),
        });
        let err = result.in_stage(Stage::ResolveColumns).unwrap_err();
        assert_eq!(err.stage, Stage::ResolveColumns);
        assert!(matches!(
            err.source,
            ErrorKind::Table(TableError::MissingColumn { .. })
        ));
    }
}
