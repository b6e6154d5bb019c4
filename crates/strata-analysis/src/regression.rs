//! Simple linear regression pipelines.
//!
//! Fitting `y ~ x` takes two passes over the source:
//!
//! 1. the means of `x` and `y` over every row where both columns are usable
//! 2. a [`LinearFit`] centered on those means, fed the same rows
//!
//! The dependent column is turned into a number by a caller-supplied transform
//! (plain parsing by default, see [`parse_value`]). The same transform is used
//! in both passes, so the set of accepted rows never differs between them.
//!
//! Follow-up passes write residuals or predictions, and a fitted model can be
//! persisted as a [`LinearModelRecord`] for a later prediction run.

use std::{io::Write, path::Path};

use csv::StringRecord;
use strata_stats::{
    group::GroupAccumulator,
    linear::{LinearFit, LinearModel},
};

use crate::{
    error::{AnalysisError, InStage as _, Stage, TableError},
    model::{LinearModelRecord, ModelRow},
    source::TableSource,
    table::{Column, Header, TablePass, TableWriter, label_field, parse_field},
};

pub const RESIDUAL_COLUMN: &str = "residual";
pub const PREDICTED_COLUMN: &str = "predicted";

/// Model name written by [`coverage_model`].
pub const COVERAGE_MODEL_NAME: &str = "allchromtotals";

/// Zero-based dependent column of a result table fitted by
/// [`RegressionColumns::result_file`].
pub const RESULT_FILE_DEPENDENT: usize = 19;

/// Zero-based independent column of a result table.
pub const RESULT_FILE_INDEPENDENT: usize = 12;

const X_KEY: &str = "x";
const Y_KEY: &str = "y";

/// Parses a field as a float.
#[must_use]
pub fn parse_value(field: &str) -> Option<f64> {
    field.parse().ok()
}

/// Expected relative coverage of a chromosome: 0.5 for the sex chromosomes
/// (`X`, `Y`, either case), 1.0 for everything else.
#[must_use]
pub fn chromosome_expectation(chrom: &str) -> f64 {
    match chrom {
        "X" | "x" | "Y" | "y" => 0.5,
        _ => 1.0,
    }
}

/// Dependent and independent columns of a `y ~ x` regression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegressionColumns {
    pub dependent: Column,
    pub independent: Column,
}

impl RegressionColumns {
    pub fn resolve<S>(source: &S, dependent: &str, independent: &str) -> Result<Self, AnalysisError>
    where
        S: TableSource + ?Sized,
    {
        let header = Header::read(source).in_stage(Stage::ResolveColumns)?;
        Ok(Self {
            dependent: header.column(dependent).in_stage(Stage::ResolveColumns)?,
            independent: header.column(independent).in_stage(Stage::ResolveColumns)?,
        })
    }

    /// Resolves zero-based column positions, taking the names from the header.
    pub fn at<S>(source: &S, dependent: usize, independent: usize) -> Result<Self, AnalysisError>
    where
        S: TableSource + ?Sized,
    {
        let header = Header::read(source).in_stage(Stage::ResolveColumns)?;
        Ok(Self {
            dependent: header.column_at(dependent).in_stage(Stage::ResolveColumns)?,
            independent: header.column_at(independent).in_stage(Stage::ResolveColumns)?,
        })
    }

    /// The fixed [`RESULT_FILE_DEPENDENT`] ~ [`RESULT_FILE_INDEPENDENT`] pair
    /// of a result table with a header.
    pub fn result_file<S>(source: &S) -> Result<Self, AnalysisError>
    where
        S: TableSource + ?Sized,
    {
        Self::at(source, RESULT_FILE_DEPENDENT, RESULT_FILE_INDEPENDENT)
    }

    /// The `(x, y)` pair of `record`, or `None` if either side is unusable.
    fn observation<F>(&self, record: &StringRecord, dependent: &F) -> Option<(f64, f64)>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let x = parse_field(record, self.independent.index)?;
        let y = dependent(label_field(record, self.dependent.index)?)?;
        (!x.is_nan() && !y.is_nan()).then_some((x, y))
    }
}

/// Fits `y ~ x` with both columns parsed as floats.
pub fn fit_linear_model<S>(source: &S, columns: &RegressionColumns) -> Result<LinearFit, AnalysisError>
where
    S: TableSource + ?Sized,
{
    fit_linear_model_with(source, columns, parse_value)
}

/// Fits `y ~ x` where `y` is `dependent` applied to the dependent field.
///
/// A row contributes to both passes only if the independent field parses and
/// `dependent` returns a non-NaN value.
pub fn fit_linear_model_with<S, F>(
    source: &S,
    columns: &RegressionColumns,
    dependent: F,
) -> Result<LinearFit, AnalysisError>
where
    S: TableSource + ?Sized,
    F: Fn(&str) -> Option<f64>,
{
    let mut means: GroupAccumulator = GroupAccumulator::new();
    let rows = TablePass::open(source)
        .and_then(|pass| {
            pass.for_each(|record| {
                if let Some((x, y)) = columns.observation(record, &dependent) {
                    means.add(x, X_KEY);
                    means.add(y, Y_KEY);
                }
            })
        })
        .in_stage(Stage::MeanPass)?;
    let (x_mean, y_mean) = (means.mean(X_KEY), means.mean(Y_KEY));
    tracing::debug!(
        source = %source.name(),
        rows,
        accepted = means.count(X_KEY),
        x_mean,
        y_mean,
        "computed regression means"
    );

    let mut fit = LinearFit::centered_on(x_mean, y_mean);
    TablePass::open(source)
        .and_then(|pass| {
            pass.for_each(|record| {
                if let Some((x, y)) = columns.observation(record, &dependent) {
                    fit.add(x, y);
                }
            })
        })
        .in_stage(Stage::FitPass)?;

    tracing::info!(
        dependent = %columns.dependent.name,
        independent = %columns.independent.name,
        slope = fit.slope(),
        intercept = fit.intercept(),
        count = fit.count(),
        "fitted linear model"
    );
    Ok(fit)
}

/// Writes every row whose columns both parse with `y - predict(x)` appended
/// as [`RESIDUAL_COLUMN`]. Returns the number of rows written.
pub fn write_residuals<S, W>(
    source: &S,
    writer: &mut TableWriter<W>,
    columns: &RegressionColumns,
    model: &LinearModel,
) -> Result<u64, AnalysisError>
where
    S: TableSource + ?Sized,
    W: Write,
{
    append_per_row(source, writer, RESIDUAL_COLUMN, |record| {
        let (x, y) = columns.observation(record, &parse_value)?;
        Some(model.residual(y, x))
    })
    .in_stage(Stage::ResidualOutput)
}

/// Writes every row whose independent column parses with `predict(x)`
/// appended as [`PREDICTED_COLUMN`]. Returns the number of rows written.
pub fn write_predictions<S, W>(
    source: &S,
    writer: &mut TableWriter<W>,
    independent: &Column,
    model: &LinearModel,
) -> Result<u64, AnalysisError>
where
    S: TableSource + ?Sized,
    W: Write,
{
    append_per_row(source, writer, PREDICTED_COLUMN, |record| {
        Some(model.predict(parse_field(record, independent.index)?))
    })
    .in_stage(Stage::PredictionOutput)
}

fn append_per_row<S, W, F>(
    source: &S,
    writer: &mut TableWriter<W>,
    column: &str,
    mut derive: F,
) -> Result<u64, TableError>
where
    S: TableSource + ?Sized,
    W: Write,
    F: FnMut(&StringRecord) -> Option<f64>,
{
    let pass = TablePass::open(source)?;
    writer.write_appended(pass.header(), &[column])?;
    let mut written = 0;
    let rows = pass.try_for_each(|record| {
        let Some(value) = derive(record) else {
            return Ok(());
        };
        written += 1;
        let field = value.to_string();
        writer.write_appended(record, &[field.as_str()])
    })?;
    writer.flush()?;
    tracing::debug!(source = %source.name(), column, rows, written, "wrote derived column");
    Ok(written)
}

/// Fits `dependent ~ independent` and writes the residual table.
pub fn linear_model_residuals<S, W>(
    source: &S,
    writer: &mut TableWriter<W>,
    dependent: &str,
    independent: &str,
) -> Result<LinearModel, AnalysisError>
where
    S: TableSource + ?Sized,
    W: Write,
{
    let columns = RegressionColumns::resolve(source, dependent, independent)?;
    let model = fit_linear_model(source, &columns)?.model();
    write_residuals(source, writer, &columns, &model)?;
    Ok(model)
}

/// Fits `dependent ~ independent`, writes the prediction table, and saves the
/// fitted model to `model_output` when given.
pub fn rescale<S, W>(
    source: &S,
    writer: &mut TableWriter<W>,
    dependent: &str,
    independent: &str,
    model_output: Option<&Path>,
) -> Result<LinearModelRecord, AnalysisError>
where
    S: TableSource + ?Sized,
    W: Write,
{
    let columns = RegressionColumns::resolve(source, dependent, independent)?;
    rescale_columns(source, writer, &columns, model_output)
}

/// [`rescale`] with already-resolved columns.
pub fn rescale_columns<S, W>(
    source: &S,
    writer: &mut TableWriter<W>,
    columns: &RegressionColumns,
    model_output: Option<&Path>,
) -> Result<LinearModelRecord, AnalysisError>
where
    S: TableSource + ?Sized,
    W: Write,
{
    let fit = fit_linear_model(source, columns)?;
    let record =
        LinearModelRecord::from_fit(&fit, &columns.dependent.name, &columns.independent.name);
    write_predictions(source, writer, &columns.independent, &record.model())?;
    if let Some(path) = model_output {
        record.save(path).in_stage(Stage::ModelOutput)?;
        tracing::info!(path = %path.display(), "saved linear model");
    }
    Ok(record)
}

/// Writes predictions from a previously saved model.
///
/// The independent column is `independent` if given, otherwise the one the
/// model was fitted on.
pub fn predict<S, W>(
    source: &S,
    writer: &mut TableWriter<W>,
    record: &LinearModelRecord,
    independent: Option<&str>,
) -> Result<u64, AnalysisError>
where
    S: TableSource + ?Sized,
    W: Write,
{
    let name = independent.unwrap_or(&record.independent);
    let column = Header::read(source)
        .and_then(|header| header.column(name))
        .in_stage(Stage::ResolveColumns)?;
    write_predictions(source, writer, &column, &record.model())
}

/// Fits the expected chromosome coverage (see [`chromosome_expectation`]) of
/// the `chrom` column against `independent`, and returns the model as a
/// model-table row named [`COVERAGE_MODEL_NAME`].
pub fn coverage_model<S>(source: &S, chrom: &str, independent: &str) -> Result<ModelRow, AnalysisError>
where
    S: TableSource + ?Sized,
{
    let columns = RegressionColumns::resolve(source, chrom, independent)?;
    let fit = fit_linear_model_with(source, &columns, |field| {
        Some(chromosome_expectation(field))
    })?;
    Ok(ModelRow::from_model(COVERAGE_MODEL_NAME, &fit.model()))
}
