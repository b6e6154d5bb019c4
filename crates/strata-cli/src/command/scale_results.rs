use std::{num::NonZeroU64, path::PathBuf};

use anyhow::Context;
use strata_analysis::{
    model::ModelTable,
    scaling::{self, ProbeTable, ResultScaler, ScaledFormat},
    source::FileSource,
};
use strata_stats::hypothesis::TestKind;

use crate::util::{self, OutputArg};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum FormatArg {
    /// `name1, name2, scaled`
    #[default]
    #[value(name = "1")]
    Short,
    /// Every result column followed by `scaled`
    #[value(name = "2")]
    Full,
}

impl From<FormatArg> for ScaledFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Short => ScaledFormat::Short,
            FormatArg::Full => ScaledFormat::Full,
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ScaleResultsArg {
    /// Headerless result table written by `ttest` or `ftest`
    #[arg(short, long, required_unless_present = "header_only")]
    input: Option<PathBuf>,
    #[clap(flatten)]
    output: OutputArg,
    /// Model table (`name<TAB>intercept<TAB>slope` per line)
    #[arg(short, long, required_unless_present = "header_only")]
    models: Option<PathBuf>,
    /// Comma-separated probe info table (required for F-test results)
    #[arg(short, long)]
    probes: Option<PathBuf>,
    /// Group probes into windows of this many bases
    #[arg(short, long)]
    window: Option<NonZeroU64>,
    /// Results come from `ttest` rather than `ftest`
    #[arg(short, long)]
    t_test: bool,
    /// Output columns
    #[arg(short, long, value_enum, default_value_t)]
    format: FormatArg,
    /// Only write the header line for the chosen options
    #[arg(long)]
    header_only: bool,
}

impl ScaleResultsArg {
    fn kind(&self) -> TestKind {
        if self.t_test { TestKind::T } else { TestKind::F }
    }

    fn scaler(&self, models: &ModelTable) -> anyhow::Result<ResultScaler> {
        if self.t_test {
            return ResultScaler::mean_difference(models)
                .context("Failed to pick the model for t-test scaling");
        }
        let path = self
            .probes
            .as_ref()
            .context("--probes is required to scale F-test results")?;
        let probes = ProbeTable::read(&FileSource::new(path))
            .with_context(|| format!("Failed to read probe table: {}", path.display()))?;
        Ok(match self.window {
            Some(window) => ResultScaler::windowed(&probes, models, window),
            None => ResultScaler::per_chromosome(&probes, models),
        })
    }
}

pub(crate) fn run(arg: &ScaleResultsArg) -> anyhow::Result<()> {
    let format = ScaledFormat::from(arg.format);
    let mut writer = arg.output.table_writer()?;

    if arg.header_only {
        scaling::write_scaled_header(&mut writer, arg.kind(), format, arg.window.is_some())
            .context("Failed to write header")?;
        return util::finish_table(writer);
    }

    let (Some(input), Some(models_path)) = (&arg.input, &arg.models) else {
        anyhow::bail!("--input and --models are required unless --header-only is given");
    };
    let models = ModelTable::read(&FileSource::new(models_path))
        .with_context(|| format!("Failed to read model table: {}", models_path.display()))?;
    let scaler = arg.scaler(&models)?;

    let written = scaling::scale_results(&FileSource::new(input), &scaler, format, &mut writer)
        .with_context(|| format!("Failed to scale results: {}", input.display()))?;
    tracing::debug!(written, "results scaled");
    util::finish_table(writer)
}
