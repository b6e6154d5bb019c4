//! Per-group correlation of two numeric columns.
//!
//! Used to weight samples by how strongly an intensity column tracks GC
//! content: one pass accumulates every group's `(intensity, gc)` pairs, then
//! one row per group is written in ascending label order.

use std::io::Write;

use strata_stats::correlation::CorrelationAccumulator;

use crate::{
    error::{AnalysisError, InStage as _, Stage, TableError},
    source::TableSource,
    table::{Header, TablePass, TableWriter, label_field, parse_field},
};

/// Output column holding each group's correlation.
pub const CORRELATION_COLUMN: &str = "gc_bias_weight";

/// Correlates `intensity` with `gc` within each label of `group` and writes
/// `group, gc_bias_weight` rows. Returns the number of groups written.
///
/// Rows where either number does not parse are skipped. A group whose values
/// have no spread gets a correlation of zero.
pub fn group_correlation<S, W>(
    source: &S,
    writer: &mut TableWriter<W>,
    group: &str,
    intensity: &str,
    gc: &str,
) -> Result<usize, AnalysisError>
where
    S: TableSource + ?Sized,
    W: Write,
{
    let header = Header::read(source).in_stage(Stage::ResolveColumns)?;
    let group = header.column(group).in_stage(Stage::ResolveColumns)?;
    let intensity = header.column(intensity).in_stage(Stage::ResolveColumns)?.index;
    let gc = header.column(gc).in_stage(Stage::ResolveColumns)?.index;

    let mut acc: CorrelationAccumulator = CorrelationAccumulator::new();
    let rows = TablePass::open(source)
        .and_then(|pass| {
            pass.for_each(|record| {
                let (Some(label), Some(x), Some(y)) = (
                    label_field(record, group.index),
                    parse_field(record, intensity),
                    parse_field(record, gc),
                ) else {
                    return;
                };
                acc.add(x, y, label);
            })
        })
        .in_stage(Stage::CorrelationPass)?;
    tracing::info!(source = %source.name(), rows, groups = acc.len(), "correlated groups");

    write_correlations(writer, &group.name, &acc).in_stage(Stage::SummaryOutput)?;
    Ok(acc.len())
}

fn write_correlations<W>(
    writer: &mut TableWriter<W>,
    group: &str,
    acc: &CorrelationAccumulator,
) -> Result<(), TableError>
where
    W: Write,
{
    writer.write_fields([group, CORRELATION_COLUMN])?;
    for (label, sums) in acc.iter() {
        let correlation = sums.correlation().to_string();
        writer.write_fields([label.as_str(), correlation.as_str()])?;
    }
    writer.flush()
}
