use anyhow::Context;
use strata_analysis::grouped::GroupSummaries;

use crate::util::{self, InputArg, OutputArg};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct GroupStatsArg {
    #[clap(flatten)]
    input: InputArg,
    #[clap(flatten)]
    output: OutputArg,
    /// Column holding the values to summarize
    #[arg(long)]
    value: String,
    /// Factor columns to group by
    #[arg(short, long = "factor", required = true, num_args = 1..)]
    factors: Vec<String>,
    /// Also summarize this factor split into blood and notblood rows
    #[arg(long, value_name = "FACTOR")]
    control_split: Option<String>,
}

pub(crate) fn run(arg: &GroupStatsArg) -> anyhow::Result<()> {
    let source = arg.input.source();
    let context = || format!("Failed to summarize {}", arg.input.input.display());
    let (summaries, split) = match &arg.control_split {
        Some(factor) => {
            let (summaries, split) =
                GroupSummaries::build_with_control_split(&source, &arg.value, &arg.factors, factor)
                    .with_context(context)?;
            (summaries, Some(split))
        }
        None => (
            GroupSummaries::build(&source, &arg.value, &arg.factors).with_context(context)?,
            None,
        ),
    };

    let mut writer = arg.output.table_writer()?;
    summaries
        .write_table(&mut writer)
        .context("Failed to write group summaries")?;
    if let Some(split) = split {
        split
            .write_rows(&mut writer)
            .context("Failed to write control split")?;
    }
    util::finish_table(writer)
}
