use anyhow::Context;
use strata_analysis::{serial, var_norm};

use crate::util::{self, InputArg, OutputArg};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct NormArg {
    #[clap(flatten)]
    input: InputArg,
    #[clap(flatten)]
    output: OutputArg,
    /// Column holding the values to normalize
    #[arg(long)]
    value: String,
    /// Factor columns, applied in the order given
    #[arg(short, long = "factor", required = true, num_args = 1..)]
    factors: Vec<String>,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct NormVarArg {
    #[clap(flatten)]
    input: InputArg,
    #[clap(flatten)]
    output: OutputArg,
    /// Column holding the values to standardize
    #[arg(long)]
    value: String,
    /// Factor column defining the groups
    #[arg(short, long)]
    factor: String,
}

pub(crate) fn run(arg: &NormArg) -> anyhow::Result<()> {
    let source = arg.input.source();
    let mut writer = arg.output.table_writer()?;
    let normalizer = serial::normalize(&source, &mut writer, &arg.value, &arg.factors)
        .with_context(|| format!("Failed to normalize {}", arg.input.input.display()))?;
    tracing::info!(stages = normalizer.stages().len(), "serial normalization done");
    util::finish_table(writer)
}

pub(crate) fn run_var(arg: &NormVarArg) -> anyhow::Result<()> {
    let source = arg.input.source();
    let mut writer = arg.output.table_writer()?;
    let written = var_norm::normalize_variance(&source, &mut writer, &arg.value, &arg.factor)
        .with_context(|| {
            format!(
                "Failed to variance-normalize {}",
                arg.input.input.display()
            )
        })?;
    tracing::info!(written, "variance normalization done");
    util::finish_table(writer)
}
