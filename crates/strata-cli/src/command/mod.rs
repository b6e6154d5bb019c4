use clap::{ArgAction, Parser, Subcommand};
use strata_stats::hypothesis::TestKind;

use crate::util;

use self::{
    column::{AfracArg, ColSubArg, CombineArg, PosWinArg},
    corr::GroupCorrArg,
    group_stats::GroupStatsArg,
    model::{CoverageModelArg, LinearModelArg, PredictArg, RescaleArg},
    norm::{NormArg, NormVarArg},
    scale_results::ScaleResultsArg,
    test::TestArg,
};

mod column;
mod corr;
mod group_stats;
mod model;
mod norm;
mod scale_results;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// What to compute
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Serially mean-normalize a value column over one or more factors
    Norm(#[clap(flatten)] NormArg),
    /// Standardize a value column within the groups of one factor
    NormVar(#[clap(flatten)] NormVarArg),
    /// Count, mean, variance and sd of a value column per factor label
    GroupStats(#[clap(flatten)] GroupStatsArg),
    /// Welch-style t-tests of every test label (or all other tissues) against a
    /// control group
    Ttest(#[clap(flatten)] TestArg),
    /// Variance-ratio F-tests of every test label (or all other tissues)
    /// against a control group
    Ftest(#[clap(flatten)] TestArg),
    /// Fit `dependent ~ independent` and write residuals
    LinearModel(#[clap(flatten)] LinearModelArg),
    /// Fit expected chromosome coverage against a column and write the model row
    CoverageModel(#[clap(flatten)] CoverageModelArg),
    /// Fit, write predictions and optionally persist the model
    Rescale(#[clap(flatten)] RescaleArg),
    /// Write predictions of a persisted model
    Predict(#[clap(flatten)] PredictArg),
    /// Subtract one column from another
    ColSub(#[clap(flatten)] ColSubArg),
    /// Append `hits / count` as an allele fraction column
    Afrac(#[clap(flatten)] AfracArg),
    /// Append the start of the window holding each position
    Poswin(#[clap(flatten)] PosWinArg),
    /// Append several columns joined into one label
    Combine(#[clap(flatten)] CombineArg),
    /// Correlate an intensity column with GC content within each sample
    GroupCorr(#[clap(flatten)] GroupCorrArg),
    /// Convert test results into model units
    ScaleResults(#[clap(flatten)] ScaleResultsArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    util::init_tracing(args.verbose);
    match args.mode {
        Mode::Norm(arg) => norm::run(&arg)?,
        Mode::NormVar(arg) => norm::run_var(&arg)?,
        Mode::GroupStats(arg) => group_stats::run(&arg)?,
        Mode::Ttest(arg) => test::run(&arg, TestKind::T)?,
        Mode::Ftest(arg) => test::run(&arg, TestKind::F)?,
        Mode::LinearModel(arg) => model::run_linear_model(&arg)?,
        Mode::CoverageModel(arg) => model::run_coverage_model(&arg)?,
        Mode::Rescale(arg) => model::run_rescale(&arg)?,
        Mode::Predict(arg) => model::run_predict(&arg)?,
        Mode::ColSub(arg) => column::run_sub(&arg)?,
        Mode::Afrac(arg) => column::run_afrac(&arg)?,
        Mode::Poswin(arg) => column::run_poswin(&arg)?,
        Mode::Combine(arg) => column::run_combine(&arg)?,
        Mode::GroupCorr(arg) => corr::run(&arg)?,
        Mode::ScaleResults(arg) => scale_results::run(&arg)?,
    }
    Ok(())
}
