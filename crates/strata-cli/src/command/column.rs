use std::num::NonZeroU64;

use anyhow::Context;
use strata_analysis::column_ops;

use crate::util::{self, InputArg, OutputArg};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ColSubArg {
    #[clap(flatten)]
    input: InputArg,
    #[clap(flatten)]
    output: OutputArg,
    /// Column to subtract from
    #[arg(long)]
    value: String,
    /// Column to subtract
    #[arg(long)]
    subtract: String,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct AfracArg {
    #[clap(flatten)]
    input: InputArg,
    #[clap(flatten)]
    output: OutputArg,
    /// Column holding the hit counts
    #[arg(long)]
    hits: String,
    /// Column holding the total counts
    #[arg(long)]
    count: String,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PosWinArg {
    #[clap(flatten)]
    input: InputArg,
    #[clap(flatten)]
    output: OutputArg,
    /// Column holding base positions
    #[arg(short, long)]
    position: String,
    /// Window size in bases
    #[arg(short, long)]
    window: NonZeroU64,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct CombineArg {
    #[clap(flatten)]
    input: InputArg,
    #[clap(flatten)]
    output: OutputArg,
    /// Columns to join, in order
    #[arg(short, long = "column", required = true, num_args = 1..)]
    columns: Vec<String>,
    /// Separator placed between the joined fields
    #[arg(short, long, default_value = column_ops::COMBINE_SEPARATOR)]
    separator: String,
}

pub(crate) fn run_sub(arg: &ColSubArg) -> anyhow::Result<()> {
    let source = arg.input.source();
    let mut writer = arg.output.table_writer()?;
    let written = column_ops::subtract_columns(&source, &mut writer, &arg.value, &arg.subtract)
        .with_context(|| format!("Failed to subtract columns of {}", arg.input.input.display()))?;
    tracing::info!(written, "column subtraction done");
    util::finish_table(writer)
}

pub(crate) fn run_afrac(arg: &AfracArg) -> anyhow::Result<()> {
    let source = arg.input.source();
    let mut writer = arg.output.table_writer()?;
    let written = column_ops::allele_fraction(&source, &mut writer, &arg.hits, &arg.count)
        .with_context(|| format!("Failed to add fractions to {}", arg.input.input.display()))?;
    tracing::info!(written, "allele fractions written");
    util::finish_table(writer)
}

pub(crate) fn run_poswin(arg: &PosWinArg) -> anyhow::Result<()> {
    let source = arg.input.source();
    let mut writer = arg.output.table_writer()?;
    let written = column_ops::window_positions(&source, &mut writer, &arg.position, arg.window)
        .with_context(|| format!("Failed to add windows to {}", arg.input.input.display()))?;
    tracing::info!(written, window = arg.window.get(), "window starts written");
    util::finish_table(writer)
}

pub(crate) fn run_combine(arg: &CombineArg) -> anyhow::Result<()> {
    let source = arg.input.source();
    let mut writer = arg.output.table_writer()?;
    let written = column_ops::combine_columns(&source, &mut writer, &arg.columns, &arg.separator)
        .with_context(|| format!("Failed to combine columns of {}", arg.input.input.display()))?;
    tracing::info!(written, "combined columns written");
    util::finish_table(writer)
}
