use std::{
    io::{self, BufWriter, StdoutLock},
    path::{Path, PathBuf},
};

use anyhow::Context;
use strata_analysis::{source::FileSource, table::TableWriter};
use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;

/// Input table shared by every table subcommand
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct InputArg {
    /// Tab-delimited input table with a header row (`.gz` is decompressed)
    #[arg(short, long)]
    pub input: PathBuf,
}

impl InputArg {
    pub fn source(&self) -> FileSource {
        FileSource::new(&self.input)
    }
}

/// Output destination shared by every table subcommand
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct OutputArg {
    /// Output file path (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl OutputArg {
    pub fn table_writer(&self) -> anyhow::Result<TableWriter<Output>> {
        Ok(TableWriter::new(Output::from_output_path(
            self.output.clone(),
        )?))
    }
}

/// Table output. A file output is written to a temporary file next to `path`
/// and only replaces `path` once [`finish_table`] succeeds, so a failed run
/// leaves no partial file and an output path equal to the input is safe.
#[derive(Debug)]
pub enum Output {
    Stdout {
        writer: StdoutLock<'static>,
    },
    File {
        writer: BufWriter<NamedTempFile>,
        path: PathBuf,
    },
}

impl Output {
    pub fn from_output_path(output_path: Option<PathBuf>) -> anyhow::Result<Self> {
        match output_path {
            Some(path) => Output::open(path),
            None => Ok(Output::stdout()),
        }
    }

    pub fn stdout() -> Self {
        Output::Stdout {
            writer: io::stdout().lock(),
        }
    }

    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file = tempfile::Builder::new()
            .prefix(".strata-")
            .tempfile_in(dir)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Output::File {
            writer: BufWriter::new(file),
            path,
        })
    }

    /// Moves a finished file output into place.
    pub fn persist(self) -> anyhow::Result<()> {
        match self {
            Output::Stdout { .. } => Ok(()),
            Output::File { writer, path } => {
                let file = writer
                    .into_inner()
                    .map_err(io::IntoInnerError::into_error)
                    .with_context(|| format!("Failed to write output file: {}", path.display()))?;
                file.persist(&path)
                    .with_context(|| format!("Failed to create output file: {}", path.display()))?;
                Ok(())
            }
        }
    }

    pub fn display_path(&self) -> String {
        match self {
            Output::Stdout { .. } => "stdout".to_string(),
            Output::File { path, .. } => path.display().to_string(),
        }
    }
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout { writer } => writer.write(buf),
            Output::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout { writer } => writer.flush(),
            Output::File { writer, .. } => writer.flush(),
        }
    }
}

/// Flushes a finished table, moves it into place and reports where it went.
pub fn finish_table(writer: TableWriter<Output>) -> anyhow::Result<()> {
    let output = writer
        .into_inner()
        .context("Failed to flush table output")?;
    let display_path = output.display_path();
    output.persist()?;
    tracing::debug!(output = %display_path, "table written");
    Ok(())
}

/// Installs the stderr subscriber. `RUST_LOG` takes precedence over
/// `verbosity`, which counts `-v` flags on top of the default `warn` level.
pub fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}
