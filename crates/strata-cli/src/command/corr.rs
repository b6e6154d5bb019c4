use anyhow::Context;
use strata_analysis::{column_ops::AFRAC_COLUMN, correlation};

use crate::util::{self, InputArg, OutputArg};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct GroupCorrArg {
    #[clap(flatten)]
    input: InputArg,
    #[clap(flatten)]
    output: OutputArg,
    /// Column naming the group (sample) of each row
    #[arg(short, long, default_value = "sample")]
    group: String,
    /// Column holding the intensities to correlate
    #[arg(long, default_value = AFRAC_COLUMN)]
    intensity: String,
    /// Column holding the GC proportion
    #[arg(long, default_value = "gc")]
    gc: String,
}

pub(crate) fn run(arg: &GroupCorrArg) -> anyhow::Result<()> {
    let source = arg.input.source();
    let mut writer = arg.output.table_writer()?;
    correlation::group_correlation(&source, &mut writer, &arg.group, &arg.intensity, &arg.gc)
        .with_context(|| format!("Failed to correlate groups of {}", arg.input.input.display()))?;
    util::finish_table(writer)
}
