//! Persisted linear models.
//!
//! Two on-disk forms exist:
//!
//! - [`LinearModelRecord`]: one fitted `y ~ x` model saved as JSON, written by a
//!   rescaling run and read back by a later prediction run
//! - [`ModelTable`]: tab-separated lines `name, coeff0, coeff1, ...` holding
//!   many named models, where `coeff0` is the intercept and `coeff1` the slope

use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufReader, BufWriter, Write as _},
    path::Path,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strata_stats::linear::{LinearFit, LinearModel};

use crate::{
    error::TableError,
    source::TableSource,
    table::{TAB, TablePass, TableWriter},
};

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum ModelError {
    #[display("model file I/O failed")]
    Io(io::Error),
    #[display("invalid model record")]
    Json(serde_json::Error),
    #[display("model table access failed")]
    Table(TableError),
    #[display("model table line {line} is malformed")]
    #[from(ignore)]
    MalformedLine { line: u64 },
}

/// A fitted simple linear model together with what it was fitted on.
///
/// A degenerate fit has a NaN or infinite slope and intercept; those are saved
/// as the strings `"NaN"`, `"inf"` and `"-inf"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModelRecord {
    #[serde(with = "coefficient")]
    pub slope: f64,
    #[serde(with = "coefficient")]
    pub intercept: f64,
    /// Dependent column name.
    pub dependent: String,
    /// Independent column name.
    pub independent: String,
    /// Number of observation pairs used by the fit.
    pub count: f64,
    pub fitted_at: DateTime<Utc>,
}

impl LinearModelRecord {
    #[must_use]
    pub fn from_fit(fit: &LinearFit, dependent: &str, independent: &str) -> Self {
        let model = fit.model();
        Self {
            slope: model.slope,
            intercept: model.intercept,
            dependent: dependent.to_owned(),
            independent: independent.to_owned(),
            count: fit.count(),
            fitted_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn model(&self) -> LinearModel {
        LinearModel::new(self.slope, self.intercept)
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// JSON form of a coefficient: a number when finite, otherwise its string
/// spelling.
mod coefficient {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub(super) fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_str(&value.to_string())
        }
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => text
                .parse()
                .map_err(|e| serde::de::Error::custom(format!("invalid coefficient: {text} ({e})"))),
        }
    }
}

/// One named line of a model table.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRow {
    pub name: String,
    pub coefficients: Vec<f64>,
}

impl ModelRow {
    /// A two-coefficient row for `model`.
    #[must_use]
    pub fn from_model(name: impl Into<String>, model: &LinearModel) -> Self {
        Self {
            name: name.into(),
            coefficients: vec![model.intercept, model.slope],
        }
    }

    #[must_use]
    pub fn intercept(&self) -> Option<f64> {
        self.coefficients.first().copied()
    }

    #[must_use]
    pub fn slope(&self) -> Option<f64> {
        self.coefficients.get(1).copied()
    }

    pub fn write<W>(&self, writer: &mut TableWriter<W>) -> Result<(), TableError>
    where
        W: io::Write,
    {
        writer.write_fields(
            std::iter::once(self.name.clone())
                .chain(self.coefficients.iter().map(ToString::to_string)),
        )
    }
}

/// Named models read from a headerless tab-separated table.
#[derive(Debug, Clone, Default)]
pub struct ModelTable {
    rows: Vec<ModelRow>,
}

impl ModelTable {
    /// Reads every line of `source`. Any coefficient that fails to parse is fatal.
    pub fn read<S>(source: &S) -> Result<Self, ModelError>
    where
        S: TableSource + ?Sized,
    {
        let mut pass = TablePass::open_headerless(source, TAB)?;
        let mut record = csv::StringRecord::new();
        let mut rows = vec![];
        while pass.read_record(&mut record)? {
            let line = pass.rows();
            let mut fields = record.iter();
            let Some(name) = fields.next() else {
                return Err(ModelError::MalformedLine { line });
            };
            let coefficients = fields
                .map(str::parse)
                .collect::<Result<Vec<f64>, _>>()
                .map_err(|_| ModelError::MalformedLine { line })?;
            rows.push(ModelRow {
                name: name.to_owned(),
                coefficients,
            });
        }
        tracing::debug!(source = %pass.source_name(), models = rows.len(), "read model table");
        Ok(Self { rows })
    }

    #[must_use]
    pub fn rows(&self) -> &[ModelRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Slope of every model by name. Later lines replace earlier ones with the
    /// same name; models with fewer than two coefficients are left out.
    #[must_use]
    pub fn slopes(&self) -> BTreeMap<String, f64> {
        self.rows
            .iter()
            .filter_map(|row| Some((row.name.clone(), row.slope()?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[test]
    fn test_record_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let mut fit = LinearFit::centered_on(2.0, 5.0);
        for x in 0..5 {
            let x = f64::from(x);
            fit.add(x, 2.0 * x + 1.0);
        }
        let record = LinearModelRecord::from_fit(&fit, "depth", "gc");
        record.save(&path).unwrap();

        let loaded = LinearModelRecord::load(&path).unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.model().predict(10.0), record.model().predict(10.0));
        assert_eq!(loaded.count, 5.0);
    }

    #[test]
    fn test_non_finite_coefficients_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        // constant x: no variance to fit against
        let mut fit = LinearFit::centered_on(1.0, 3.0);
        fit.add(1.0, 2.0);
        fit.add(1.0, 4.0);
        let record = LinearModelRecord::from_fit(&fit, "y", "x");
        assert!(record.slope.is_nan());
        record.save(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("\"NaN\""));

        let loaded = LinearModelRecord::load(&path).unwrap();
        assert!(loaded.slope.is_nan());
        assert!(loaded.intercept.is_nan());
        assert_eq!(loaded.count, 2.0);

        let infinite = LinearModelRecord {
            slope: f64::INFINITY,
            intercept: f64::NEG_INFINITY,
            ..record
        };
        infinite.save(&path).unwrap();
        let loaded = LinearModelRecord::load(&path).unwrap();
        assert_eq!(loaded.slope, f64::INFINITY);
        assert_eq!(loaded.intercept, f64::NEG_INFINITY);
    }

    #[test]
    fn test_bad_coefficient_text_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(
            &path,
            r#"{"slope": "steep", "intercept": 1, "dependent": "y", "independent": "x",
                "count": 2, "fitted_at": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(matches!(
            LinearModelRecord::load(&path),
            Err(ModelError::Json(_))
        ));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "slope=2").unwrap();
        assert!(matches!(
            LinearModelRecord::load(&path),
            Err(ModelError::Json(_))
        ));
        assert!(matches!(
            LinearModelRecord::load(&dir.path().join("absent.json")),
            Err(ModelError::Io(_))
        ));
    }

    #[test]
    fn test_model_table() {
        let source = MemorySource::from("p1\t0.5\t2\np2\t1\t-4\nshort\t3\n");
        let table = ModelTable::read(&source).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[0].intercept(), Some(0.5));
        assert_eq!(table.rows()[1].slope(), Some(-4.0));

        let slopes = table.slopes();
        assert_eq!(slopes.len(), 2);
        assert_eq!(slopes["p1"], 2.0);
        assert!(!slopes.contains_key("short"));
    }

    #[test]
    fn test_model_table_bad_coefficient() {
        let source = MemorySource::from("p1\t0.5\t2\np2\tone\t2\n");
        assert!(matches!(
            ModelTable::read(&source),
            Err(ModelError::MalformedLine { line: 2 })
        ));
    }

    #[test]
    fn test_model_row_write() {
        let row = ModelRow::from_model("allchromtotals", &LinearModel::new(2.0, 0.25));
        let mut writer = TableWriter::new(vec![]);
        row.write(&mut writer).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(out, "allchromtotals\t0.25\t2\n");
    }
}
