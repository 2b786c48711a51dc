//! Tabular input and its normalised, phase-indexed form.
//!
//! A [`RawTable`] is whatever the loading collaborator hands over: named,
//! typed columns. [`GaitTable::from_raw`] checks the `subject`/`task`/`phase`
//! schema, interns subject and task labels in first-seen order and keeps the
//! numeric feature columns sorted by name.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const SUBJECT_COLUMN: &str = "subject";
pub const TASK_COLUMN: &str = "task";
pub const PHASE_COLUMN: &str = "phase";

/// Columns every gait table must carry
pub const REQUIRED_COLUMNS: [&str; 3] = [SUBJECT_COLUMN, TASK_COLUMN, PHASE_COLUMN];

/// Column payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Text(Vec<String>),
    Float(Vec<f64>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Text(v) => v.len(),
            ColumnData::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Named column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn text(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Text(values),
        }
    }

    pub fn float(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Float(values),
        }
    }
}

/// Table as delivered by a loader, before any schema checks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub columns: Vec<Column>,
}

impl RawTable {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Row-wise builder with the standard required columns
    pub fn builder<I, S>(feature_names: I) -> RawTableBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RawTableBuilder::new(feature_names)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|c| c.data.len()).unwrap_or(0)
    }
}

/// Appends rows of (subject, task, phase, features...)
#[derive(Debug, Clone)]
pub struct RawTableBuilder {
    subject: Vec<String>,
    task: Vec<String>,
    phase: Vec<f64>,
    feature_names: Vec<String>,
    features: Vec<Vec<f64>>,
}

impl RawTableBuilder {
    pub fn new<I, S>(feature_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let feature_names: Vec<String> = feature_names.into_iter().map(Into::into).collect();
        let features = vec![Vec::new(); feature_names.len()];
        Self {
            subject: Vec::new(),
            task: Vec::new(),
            phase: Vec::new(),
            feature_names,
            features,
        }
    }

    /// Append one row; `values` follows the builder's feature order.
    pub fn push_row(&mut self, subject: &str, task: &str, phase: f64, values: &[f64]) -> Result<()> {
        if values.len() != self.feature_names.len() {
            return Err(Error::invalid_input(format!(
                "row has {} feature values, table has {} feature columns",
                values.len(),
                self.feature_names.len()
            )));
        }
        self.subject.push(subject.to_string());
        self.task.push(task.to_string());
        self.phase.push(phase);
        for (column, &v) in self.features.iter_mut().zip(values) {
            column.push(v);
        }
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.phase.len()
    }

    pub fn build(self) -> RawTable {
        let mut columns = vec![
            Column::text(SUBJECT_COLUMN, self.subject),
            Column::text(TASK_COLUMN, self.task),
            Column::float(PHASE_COLUMN, self.phase),
        ];
        columns.extend(
            self.feature_names
                .into_iter()
                .zip(self.features)
                .map(|(name, values)| Column::float(name, values)),
        );
        RawTable { columns }
    }
}

/// Loader collaborator seam: anything that can produce a [`RawTable`].
pub trait TableSource {
    fn load(&self) -> Result<RawTable>;

    /// Human-readable name for logging
    fn describe(&self) -> String {
        "in-memory table".to_string()
    }
}

impl TableSource for RawTable {
    fn load(&self) -> Result<RawTable> {
        Ok(self.clone())
    }
}

/// Hands a path to an external loader function (parquet, CSV, ...)
pub struct PathSource<F> {
    path: PathBuf,
    loader: F,
}

impl<F> PathSource<F>
where
    F: Fn(&Path) -> Result<RawTable>,
{
    pub fn new(path: impl Into<PathBuf>, loader: F) -> Self {
        Self {
            path: path.into(),
            loader,
        }
    }
}

impl<F> TableSource for PathSource<F>
where
    F: Fn(&Path) -> Result<RawTable>,
{
    fn load(&self) -> Result<RawTable> {
        (self.loader)(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Interned label column: per-row codes into a first-seen-ordered label list
#[derive(Debug, Clone, PartialEq)]
struct Labels {
    names: Vec<String>,
    codes: Vec<u32>,
}

impl Labels {
    fn intern<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut lookup: HashMap<&'a str, u32> = HashMap::new();
        let mut names = Vec::new();
        let codes = values
            .into_iter()
            .map(|v| {
                *lookup.entry(v).or_insert_with(|| {
                    names.push(v.to_string());
                    (names.len() - 1) as u32
                })
            })
            .collect();
        Self { names, codes }
    }

    fn label(&self, row: usize) -> &str {
        &self.names[self.codes[row] as usize]
    }
}

/// Normalised gait table. Immutable once built; filtering builds a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct GaitTable {
    subjects: Labels,
    tasks: Labels,
    phase: Vec<f64>,
    feature_names: Vec<String>,
    features: Vec<Vec<f64>>,
}

impl GaitTable {
    /// Check the schema and normalise a loaded table.
    pub fn from_raw(raw: RawTable) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &raw.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(Error::invalid_input(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
        }

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|name| !seen.contains(name))
            .collect();
        if !missing.is_empty() {
            return Err(Error::schema(missing));
        }

        let n_rows = raw.n_rows();
        if let Some(ragged) = raw.columns.iter().find(|c| c.data.len() != n_rows) {
            return Err(Error::ColumnLength {
                column: ragged.name.clone(),
                expected: n_rows,
                actual: ragged.data.len(),
            });
        }

        let mut subject = None;
        let mut task = None;
        let mut phase = None;
        let mut features: Vec<(String, Vec<f64>)> = Vec::new();

        for Column { name, data } in raw.columns {
            match data {
                ColumnData::Text(v) if name == SUBJECT_COLUMN => subject = Some(v),
                ColumnData::Text(v) if name == TASK_COLUMN => task = Some(v),
                ColumnData::Float(v) if name == PHASE_COLUMN => phase = Some(v),
                _ if name == SUBJECT_COLUMN || name == TASK_COLUMN => {
                    return Err(Error::ColumnType {
                        column: name,
                        expected: "text",
                    })
                }
                _ if name == PHASE_COLUMN => {
                    return Err(Error::ColumnType {
                        column: name,
                        expected: "float",
                    })
                }
                ColumnData::Float(v) => features.push((name, v)),
                ColumnData::Text(_) => {
                    tracing::warn!(column = %name, "Skipping non-numeric column");
                }
            }
        }

        let (Some(subject), Some(task), Some(phase)) = (subject, task, phase) else {
            return Err(Error::schema(REQUIRED_COLUMNS));
        };

        features.sort_by(|a, b| a.0.cmp(&b.0));
        let (feature_names, features) = features.into_iter().unzip();

        Ok(Self {
            subjects: Labels::intern(subject.iter().map(String::as_str)),
            tasks: Labels::intern(task.iter().map(String::as_str)),
            phase,
            feature_names,
            features,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.phase.len()
    }

    /// Distinct subjects in first-seen order
    pub fn subjects(&self) -> &[String] {
        &self.subjects.names
    }

    /// Distinct tasks in first-seen order
    pub fn tasks(&self) -> &[String] {
        &self.tasks.names
    }

    /// Feature column names, sorted
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.binary_search_by(|n| n.as_str().cmp(name)).ok()
    }

    pub fn feature_values(&self, index: usize) -> &[f64] {
        &self.features[index]
    }

    pub fn phase(&self) -> &[f64] {
        &self.phase
    }

    pub fn subject_at(&self, row: usize) -> &str {
        self.subjects.label(row)
    }

    pub fn task_at(&self, row: usize) -> &str {
        self.tasks.label(row)
    }

    /// Interned (subject, task) codes of a row, indexes into
    /// [`subjects`](Self::subjects) and [`tasks`](Self::tasks).
    pub fn pair_codes(&self, row: usize) -> (u32, u32) {
        (self.subjects.codes[row], self.tasks.codes[row])
    }

    /// New table holding only `rows`, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            subjects: Labels::intern(rows.iter().map(|&r| self.subject_at(r))),
            tasks: Labels::intern(rows.iter().map(|&r| self.task_at(r))),
            phase: rows.iter().map(|&r| self.phase[r]).collect(),
            feature_names: self.feature_names.clone(),
            features: self
                .features
                .iter()
                .map(|col| rows.iter().map(|&r| col[r]).collect())
                .collect(),
        }
    }

    /// New table restricted to the named feature columns that exist.
    pub fn select_features(&self, names: &[String]) -> Self {
        let keep: Vec<usize> = self
            .feature_names
            .iter()
            .enumerate()
            .filter(|(_, n)| names.contains(n))
            .map(|(i, _)| i)
            .collect();
        Self {
            subjects: self.subjects.clone(),
            tasks: self.tasks.clone(),
            phase: self.phase.clone(),
            feature_names: keep.iter().map(|&i| self.feature_names[i].clone()).collect(),
            features: keep.iter().map(|&i| self.features[i].clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raw() -> RawTable {
        let mut builder = RawTable::builder(["knee_flexion_angle_ipsi_rad", "hip_flexion_angle_ipsi_rad"]);
        for (subject, task) in [("SUB02", "walk"), ("SUB01", "walk"), ("SUB02", "run")] {
            for p in 0..3 {
                builder
                    .push_row(subject, task, p as f64 * 50.0, &[p as f64, -(p as f64)])
                    .unwrap();
            }
        }
        builder.build()
    }

    #[test]
    fn test_from_raw_discovers_labels_in_order() {
        let table = GaitTable::from_raw(sample_raw()).unwrap();
        assert_eq!(table.n_rows(), 9);
        assert_eq!(table.subjects(), ["SUB02", "SUB01"]);
        assert_eq!(table.tasks(), ["walk", "run"]);
        assert_eq!(
            table.feature_names(),
            ["hip_flexion_angle_ipsi_rad", "knee_flexion_angle_ipsi_rad"]
        );
        let knee = table.feature_index("knee_flexion_angle_ipsi_rad").unwrap();
        assert_eq!(table.feature_values(knee)[2], 2.0);
    }

    #[test]
    fn test_missing_columns_is_schema_error() {
        let raw = RawTable::new(vec![
            Column::text("subject", vec!["A".into()]),
            Column::float("value", vec![1.0]),
        ]);
        let err = GaitTable::from_raw(raw).unwrap_err();
        assert_eq!(err, Error::schema(["task", "phase"]));
    }

    #[test]
    fn test_wrong_column_type() {
        let raw = RawTable::new(vec![
            Column::text("subject", vec!["A".into()]),
            Column::text("task", vec!["walk".into()]),
            Column::text("phase", vec!["0".into()]),
        ]);
        let err = GaitTable::from_raw(raw).unwrap_err();
        assert!(matches!(err, Error::ColumnType { ref column, .. } if column == "phase"));
    }

    #[test]
    fn test_ragged_columns() {
        let raw = RawTable::new(vec![
            Column::text("subject", vec!["A".into(), "A".into()]),
            Column::text("task", vec!["walk".into(), "walk".into()]),
            Column::float("phase", vec![0.0]),
        ]);
        assert!(matches!(
            GaitTable::from_raw(raw),
            Err(Error::ColumnLength { .. })
        ));
    }

    #[test]
    fn test_text_feature_columns_are_skipped() {
        let mut raw = sample_raw();
        raw.columns
            .push(Column::text("condition", vec!["baseline".to_string(); 9]));
        let table = GaitTable::from_raw(raw).unwrap();
        assert_eq!(table.feature_names().len(), 2);
    }

    #[test]
    fn test_builder_rejects_wrong_width() {
        let mut builder = RawTable::builder(["a_angle"]);
        assert!(builder.push_row("S", "T", 0.0, &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_select_rows_reinterns_labels() {
        let table = GaitTable::from_raw(sample_raw()).unwrap();
        let rows: Vec<usize> = (0..table.n_rows()).filter(|&r| table.task_at(r) == "run").collect();
        let run = table.select_rows(&rows);
        assert_eq!(run.subjects(), ["SUB02"]);
        assert_eq!(run.tasks(), ["run"]);
        assert_eq!(run.n_rows(), 3);
        assert_eq!(run.pair_codes(0), (0, 0));
    }

    #[test]
    fn test_path_source_delegates_to_loader() {
        let source = PathSource::new("/data/gait.parquet", |path: &Path| {
            assert_eq!(path, Path::new("/data/gait.parquet"));
            Ok(sample_raw())
        });
        assert_eq!(source.load().unwrap().n_rows(), 9);
        assert_eq!(source.describe(), "/data/gait.parquet");
    }
}
