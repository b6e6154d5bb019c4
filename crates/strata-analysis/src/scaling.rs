//! Rescaling of hypothesis-test results into model units.
//!
//! A t-test result is scaled by a single model slope:
//! `scaled_mean_diff = (mean2 - mean1) * slope`.
//!
//! An F-test result is scaled by the mean slope of the per-probe models that
//! cover the region the result was computed for:
//! `scaled_sd_diff = (sd2 - sd1) * (-slope / 2)`. The region is read from the
//! `_`-separated experiment name (`name2`): its second token is the
//! chromosome, and in windowed mode its third token is the window start.
//!
//! Probe positions come from a comma-separated probe info table with a header,
//! where column 0 is the probe name, column 4 the chromosome and column 5 the
//! position.

use std::{collections::BTreeMap, io::Write, num::NonZeroU64};

use csv::StringRecord;
use strata_stats::hypothesis::TestKind;

use crate::{
    error::{AnalysisError, ErrorKind, InStage as _, Stage, TableError},
    hypothesis::{RESULT_FIELDS, TestResult, read_results},
    model::ModelTable,
    source::TableSource,
    table::{TablePass, TableWriter, label_field},
};

const PROBE_INFO_DELIMITER: u8 = b',';
const PROBE_NAME_INDEX: usize = 0;
const PROBE_CHROM_INDEX: usize = 4;
const PROBE_POS_INDEX: usize = 5;

/// Genomic location of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeLocation {
    pub probe: String,
    pub chrom: String,
    pub pos: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ProbeTable {
    probes: Vec<ProbeLocation>,
}

impl ProbeTable {
    /// Reads a probe info table. Rows that are too short or have a non-integer
    /// position are fatal.
    pub fn read<S>(source: &S) -> Result<Self, ErrorKind>
    where
        S: TableSource + ?Sized,
    {
        let mut pass = TablePass::open_with(source, PROBE_INFO_DELIMITER)?;
        let mut record = StringRecord::new();
        let mut probes = vec![];
        while pass.read_record(&mut record)? {
            // header is line 1
            let malformed = || ErrorKind::MalformedProbe {
                line: pass.rows() + 1,
            };
            let (Some(probe), Some(chrom), Some(pos)) = (
                label_field(&record, PROBE_NAME_INDEX),
                label_field(&record, PROBE_CHROM_INDEX),
                label_field(&record, PROBE_POS_INDEX),
            ) else {
                return Err(malformed());
            };
            probes.push(ProbeLocation {
                probe: probe.to_owned(),
                chrom: chrom.to_owned(),
                pos: pos.parse().map_err(|_| malformed())?,
            });
        }
        tracing::debug!(source = %source.name(), probes = probes.len(), "read probe table");
        Ok(Self { probes })
    }

    #[must_use]
    pub fn probes(&self) -> &[ProbeLocation] {
        &self.probes
    }

    /// Probe names grouped by chromosome.
    #[must_use]
    pub fn by_chromosome(&self) -> BTreeMap<String, Vec<String>> {
        let mut groups = BTreeMap::<_, Vec<_>>::new();
        for p in &self.probes {
            groups.entry(p.chrom.clone()).or_default().push(p.probe.clone());
        }
        groups
    }

    /// Probe names grouped by `(chromosome, window start)` for windows of
    /// `window` bases.
    #[must_use]
    pub fn by_window(&self, window: NonZeroU64) -> BTreeMap<(String, u64), Vec<String>> {
        let mut groups = BTreeMap::<_, Vec<_>>::new();
        for p in &self.probes {
            groups
                .entry((p.chrom.clone(), window_start(p.pos, window)))
                .or_default()
                .push(p.probe.clone());
        }
        groups
    }
}

/// Start of the window of size `window` containing `pos`.
#[must_use]
pub fn window_start(pos: u64, window: NonZeroU64) -> u64 {
    (pos / window) * window.get()
}

/// `(mean2 - mean1) * slope`
#[must_use]
pub fn scaled_mean_diff(result: &TestResult, slope: f64) -> f64 {
    (result.mean2 - result.mean1) * slope
}

/// `(sd2 - sd1) * (-slope / 2)`
#[must_use]
pub fn scaled_sd_diff(result: &TestResult, slope: f64) -> f64 {
    (result.sd2 - result.sd1) * (-slope / 2.0)
}

/// Mean slope of the models named by `probes`. Probes without a model are
/// skipped; if none has one the result is NaN.
fn mean_slope(key: &str, probes: &[String], slopes: &BTreeMap<String, f64>) -> Result<f64, ErrorKind> {
    if probes.is_empty() {
        return Err(ErrorKind::MissingProbes {
            key: key.to_owned(),
        });
    }
    let (sum, count) = probes
        .iter()
        .filter_map(|probe| slopes.get(probe))
        .fold((0.0, 0.0), |(sum, count), slope| (sum + slope, count + 1.0));
    Ok(sum / count)
}

/// How each result gets its slope.
#[derive(Debug, Clone)]
enum SlopeSource {
    Single(f64),
    Chromosome {
        probes: BTreeMap<String, Vec<String>>,
        slopes: BTreeMap<String, f64>,
    },
    Window {
        probes: BTreeMap<(String, u64), Vec<String>>,
        slopes: BTreeMap<String, f64>,
    },
}

/// Converts test results into scaled differences.
#[derive(Debug, Clone)]
pub struct ResultScaler {
    slopes: SlopeSource,
}

impl ResultScaler {
    /// Scales t-test mean differences by the slope of the only model in
    /// `models`.
    pub fn mean_difference(models: &ModelTable) -> Result<Self, ErrorKind> {
        let slopes = models
            .rows()
            .iter()
            .filter_map(|row| row.slope())
            .collect::<Vec<_>>();
        match slopes[..] {
            [slope] => Ok(Self {
                slopes: SlopeSource::Single(slope),
            }),
            _ => Err(ErrorKind::ModelCount {
                count: slopes.len(),
            }),
        }
    }

    /// Scales F-test sd differences by the mean slope of every probe on the
    /// result's chromosome.
    #[must_use]
    pub fn per_chromosome(probes: &ProbeTable, models: &ModelTable) -> Self {
        Self {
            slopes: SlopeSource::Chromosome {
                probes: probes.by_chromosome(),
                slopes: models.slopes(),
            },
        }
    }

    /// Scales F-test sd differences by the mean slope of every probe in the
    /// result's window of `window` bases.
    #[must_use]
    pub fn windowed(probes: &ProbeTable, models: &ModelTable, window: NonZeroU64) -> Self {
        Self {
            slopes: SlopeSource::Window {
                probes: probes.by_window(window),
                slopes: models.slopes(),
            },
        }
    }

    /// The test whose results this scaler expects.
    #[must_use]
    pub fn kind(&self) -> TestKind {
        match self.slopes {
            SlopeSource::Single(_) => TestKind::T,
            SlopeSource::Chromosome { .. } | SlopeSource::Window { .. } => TestKind::F,
        }
    }

    #[must_use]
    pub fn is_windowed(&self) -> bool {
        matches!(self.slopes, SlopeSource::Window { .. })
    }

    pub fn scale(&self, result: &TestResult) -> Result<f64, ErrorKind> {
        match &self.slopes {
            SlopeSource::Single(slope) => Ok(scaled_mean_diff(result, *slope)),
            SlopeSource::Chromosome { probes, slopes } => {
                let chrom = name_token(&result.name2, 1)?;
                let probes = probes.get(chrom).ok_or_else(|| ErrorKind::MissingProbes {
                    key: chrom.to_owned(),
                })?;
                Ok(scaled_sd_diff(result, mean_slope(chrom, probes, slopes)?))
            }
            SlopeSource::Window { probes, slopes } => {
                let chrom = name_token(&result.name2, 1)?;
                let start = name_token(&result.name2, 2)?;
                let key = format!("{chrom}:{start}");
                let probes = start
                    .parse::<u64>()
                    .ok()
                    .and_then(|start| probes.get(&(chrom.to_owned(), start)))
                    .ok_or_else(|| ErrorKind::MissingProbes { key: key.clone() })?;
                Ok(scaled_sd_diff(result, mean_slope(&key, probes, slopes)?))
            }
        }
    }
}

fn name_token(name: &str, index: usize) -> Result<&str, ErrorKind> {
    name.split('_')
        .nth(index)
        .ok_or_else(|| ErrorKind::MalformedResultName {
            name: name.to_owned(),
            expected: index + 1,
        })
}

/// Output layout of scaled results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaledFormat {
    /// `name1, name2, scaled`
    #[default]
    Short,
    /// All result fields followed by `scaled`.
    Full,
}

/// Writes the header line matching `format` for results of `kind`.
pub fn write_scaled_header<W>(
    writer: &mut TableWriter<W>,
    kind: TestKind,
    format: ScaledFormat,
    windowed: bool,
) -> Result<(), TableError>
where
    W: Write,
{
    let name2 = if windowed {
        "indiv_chrom_tissue_poswin"
    } else {
        "indiv_chrom_tissue"
    };
    let diff = match kind {
        TestKind::T => "scaled_mean_diff",
        TestKind::F => "scaled_sd_diff",
    };
    let stat = kind.to_string();
    match format {
        ScaledFormat::Short => writer.write_fields(["control_tissue", name2, diff])?,
        ScaledFormat::Full => writer.write_fields([
            "control_tissue",
            name2,
            "count1",
            "count2",
            "mean1",
            "mean2",
            "sd1",
            "sd2",
            stat.as_str(),
            "df1",
            "df2",
            "p",
            diff,
        ])?,
    }
    writer.flush()
}

/// Reads every result in `results`, scales it, and writes the scaled rows.
/// All results are scaled before anything is written.
pub fn scale_results<S, W>(
    results: &S,
    scaler: &ResultScaler,
    format: ScaledFormat,
    writer: &mut TableWriter<W>,
) -> Result<u64, AnalysisError>
where
    S: TableSource + ?Sized,
    W: Write,
{
    let results = read_results(results).in_stage(Stage::ResultScaling)?;
    let scaled = results
        .iter()
        .map(|result| scaler.scale(result))
        .collect::<Result<Vec<_>, _>>()
        .in_stage(Stage::ResultScaling)?;

    results
        .iter()
        .zip(&scaled)
        .try_for_each(|(result, scaled)| {
            let scaled = scaled.to_string();
            match format {
                ScaledFormat::Short => {
                    writer.write_fields([result.name1.as_str(), result.name2.as_str(), scaled.as_str()])
                }
                ScaledFormat::Full => {
                    let mut fields = Vec::with_capacity(RESULT_FIELDS + 1);
                    fields.extend(result.fields());
                    fields.push(scaled);
                    writer.write_fields(fields)
                }
            }
        })
        .and_then(|()| writer.flush())
        .in_stage(Stage::ResultScaling)?;

    tracing::info!(kind = %scaler.kind(), results = results.len(), "scaled test results");
    Ok(results.len() as u64)
}
