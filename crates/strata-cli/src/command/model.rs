use std::path::PathBuf;

use anyhow::Context;
use strata_analysis::{
    model::LinearModelRecord,
    regression::{self, RegressionColumns},
};

use crate::util::{self, InputArg, OutputArg};

/// Columns of a `dependent ~ independent` fit
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct FitColumnsArg {
    /// Dependent (response) column
    #[arg(short, long)]
    dependent: String,
    /// Independent (predictor) column
    #[arg(short = 'x', long)]
    independent: String,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct LinearModelArg {
    #[clap(flatten)]
    input: InputArg,
    #[clap(flatten)]
    output: OutputArg,
    #[clap(flatten)]
    columns: FitColumnsArg,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct CoverageModelArg {
    #[clap(flatten)]
    input: InputArg,
    #[clap(flatten)]
    output: OutputArg,
    /// Chromosome column; X and Y are expected at half coverage
    #[arg(long)]
    chrom: String,
    /// Independent (predictor) column
    #[arg(short = 'x', long)]
    independent: String,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct RescaleArg {
    #[clap(flatten)]
    input: InputArg,
    #[clap(flatten)]
    output: OutputArg,
    /// Dependent (response) column
    #[arg(short, long, required_unless_present = "result_file")]
    dependent: Option<String>,
    /// Independent (predictor) column
    #[arg(short = 'x', long, required_unless_present = "result_file")]
    independent: Option<String>,
    /// Input is a result table: fit column 19 against column 12 (zero-based)
    #[arg(short, long, conflicts_with_all = ["dependent", "independent"])]
    result_file: bool,
    /// Where to save the fitted model as JSON
    #[arg(long)]
    model_output: Option<PathBuf>,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PredictArg {
    #[clap(flatten)]
    input: InputArg,
    #[clap(flatten)]
    output: OutputArg,
    /// Model saved by `rescale --model-output`
    #[arg(short, long)]
    model: PathBuf,
    /// Predictor column, if it differs from the one the model was fitted on
    #[arg(short = 'x', long)]
    independent: Option<String>,
}

pub(crate) fn run_linear_model(arg: &LinearModelArg) -> anyhow::Result<()> {
    let source = arg.input.source();
    let mut writer = arg.output.table_writer()?;
    let model = regression::linear_model_residuals(
        &source,
        &mut writer,
        &arg.columns.dependent,
        &arg.columns.independent,
    )
    .with_context(|| format!("Failed to fit {}", arg.input.input.display()))?;
    tracing::info!(
        slope = model.slope,
        intercept = model.intercept,
        "linear model fitted"
    );
    util::finish_table(writer)
}

pub(crate) fn run_coverage_model(arg: &CoverageModelArg) -> anyhow::Result<()> {
    let source = arg.input.source();
    let row = regression::coverage_model(&source, &arg.chrom, &arg.independent)
        .with_context(|| format!("Failed to fit coverage of {}", arg.input.input.display()))?;

    let mut writer = arg.output.table_writer()?;
    row.write(&mut writer)
        .and_then(|()| writer.flush())
        .context("Failed to write coverage model")?;
    util::finish_table(writer)
}

pub(crate) fn run_rescale(arg: &RescaleArg) -> anyhow::Result<()> {
    let source = arg.input.source();
    let context = || format!("Failed to rescale {}", arg.input.input.display());
    let columns = match (&arg.dependent, &arg.independent) {
        (Some(dependent), Some(independent)) if !arg.result_file => {
            RegressionColumns::resolve(&source, dependent, independent)
        }
        _ => RegressionColumns::result_file(&source),
    }
    .with_context(context)?;

    let mut writer = arg.output.table_writer()?;
    let record =
        regression::rescale_columns(&source, &mut writer, &columns, arg.model_output.as_deref())
            .with_context(context)?;
    if let Some(path) = &arg.model_output {
        tracing::info!(path = %path.display(), count = record.count, "model saved");
    }
    util::finish_table(writer)
}

pub(crate) fn run_predict(arg: &PredictArg) -> anyhow::Result<()> {
    let record = LinearModelRecord::load(&arg.model)
        .with_context(|| format!("Failed to load model: {}", arg.model.display()))?;
    let source = arg.input.source();
    let mut writer = arg.output.table_writer()?;
    let written = regression::predict(&source, &mut writer, &record, arg.independent.as_deref())
        .with_context(|| format!("Failed to predict {}", arg.input.input.display()))?;
    tracing::info!(written, "predictions written");
    util::finish_table(writer)
}
