//! Phase-wise statistics over cycle arrays.
//!
//! Everything here is a pure function of a [`CycleArray`]; the engine feeds
//! these from the same cached arrays `get_cycles` returns, so raw-cycle and
//! summary views always agree. Standard deviations divide by N.

use std::collections::BTreeMap;

use gait_core::Result;
use ndarray::{Array1, Array2, Array3, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::cycles::CycleArray;

/// Per-feature vector over the phase axis
pub type PatternMap = BTreeMap<String, Array1<f64>>;

/// Mean across cycles at each phase point, per feature
pub fn mean_patterns(cycles: &CycleArray) -> PatternMap {
    match cycles.data().mean_axis(Axis(0)) {
        Some(mean) => columns_by_feature(cycles, &mean),
        None => PatternMap::new(),
    }
}

/// Population standard deviation across cycles at each phase point
pub fn std_patterns(cycles: &CycleArray) -> PatternMap {
    if cycles.n_cycles() == 0 {
        return PatternMap::new();
    }
    let std = cycles.data().std_axis(Axis(0), 0.0);
    columns_by_feature(cycles, &std)
}

fn columns_by_feature(cycles: &CycleArray, phase_by_feature: &Array2<f64>) -> PatternMap {
    cycles
        .feature_names()
        .iter()
        .enumerate()
        .map(|(f, name)| (name.clone(), phase_by_feature.column(f).to_owned()))
        .collect()
}

/// Range of motion for one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rom {
    /// `max - min` within each cycle
    PerCycle(Array1<f64>),
    /// `max - min` over all pooled cycles
    Overall(f64),
}

impl Rom {
    /// Largest ROM value this result holds
    pub fn max(&self) -> f64 {
        match self {
            Rom::PerCycle(values) => values.iter().copied().fold(f64::NAN, f64::max),
            Rom::Overall(value) => *value,
        }
    }

    pub fn per_cycle(&self) -> Option<&Array1<f64>> {
        match self {
            Rom::PerCycle(values) => Some(values),
            Rom::Overall(_) => None,
        }
    }

    pub fn overall(&self) -> Option<f64> {
        match self {
            Rom::Overall(value) => Some(*value),
            Rom::PerCycle(_) => None,
        }
    }
}

/// `max - min` ignoring NaN; NaN when nothing is left
fn span<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    let (lo, hi) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        f64::NAN
    } else {
        hi - lo
    }
}

/// Range of motion per feature, per cycle or pooled
pub fn range_of_motion(cycles: &CycleArray, by_cycle: bool) -> BTreeMap<String, Rom> {
    let mut result = BTreeMap::new();
    for (f, name) in cycles.feature_names().iter().enumerate() {
        let feature = cycles.data().index_axis(Axis(2), f);
        let rom = if by_cycle {
            Rom::PerCycle(feature.outer_iter().map(|cycle| span(cycle.iter())).collect())
        } else {
            Rom::Overall(span(feature.iter()))
        };
        result.insert(name.clone(), rom);
    }
    result
}

/// Descriptive statistics of one feature over every cycle and phase sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub feature: String,
    /// Finite samples that contributed
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl FeatureSummary {
    pub fn from_values(feature: &str, values: ArrayView1<'_, f64>) -> Self {
        let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        finite.sort_by(|a, b| a.total_cmp(b));

        let count = finite.len();
        if count == 0 {
            return Self {
                feature: feature.to_string(),
                count,
                mean: f64::NAN,
                std: f64::NAN,
                min: f64::NAN,
                q25: f64::NAN,
                median: f64::NAN,
                q75: f64::NAN,
                max: f64::NAN,
            };
        }

        let mean = finite.iter().sum::<f64>() / count as f64;
        let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;

        Self {
            feature: feature.to_string(),
            count,
            mean,
            std: var.sqrt(),
            min: finite[0],
            q25: quantile_sorted(&finite, 0.25),
            median: quantile_sorted(&finite, 0.5),
            q75: quantile_sorted(&finite, 0.75),
            max: finite[count - 1],
        }
    }
}

/// Linear-interpolation quantile of already sorted, non-empty data
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// One summary row per feature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryTable {
    pub rows: Vec<FeatureSummary>,
}

impl SummaryTable {
    pub fn from_cycles(cycles: &CycleArray) -> Self {
        let rows = cycles
            .feature_names()
            .iter()
            .enumerate()
            .map(|(f, name)| {
                let flat: Array1<f64> = cycles.data().index_axis(Axis(2), f).iter().copied().collect();
                FeatureSummary::from_values(name, flat.view())
            })
            .collect();
        Self { rows }
    }

    pub fn row(&self, feature: &str) -> Option<&FeatureSummary> {
        self.rows.iter().find(|r| r.feature == feature)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Feature-by-feature Pearson correlation across cycles at every phase point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseCorrelations {
    /// Shape `(points_per_cycle, k, k)`
    pub correlations: Array3<f64>,
    pub feature_names: Vec<String>,
}

impl PhaseCorrelations {
    /// `None` with fewer than two cycles.
    pub fn from_cycles(cycles: &CycleArray) -> Option<Self> {
        let (n, n_phases, k) = cycles.shape();
        if n < 2 {
            return None;
        }

        let mut correlations = Array3::from_elem((n_phases, k, k), f64::NAN);
        for p in 0..n_phases {
            let samples = cycles.data().index_axis(Axis(1), p);
            let means = samples.mean_axis(Axis(0))?;
            let centered = &samples - &means;
            let cov = centered.t().dot(&centered) / n as f64;

            for i in 0..k {
                for j in 0..k {
                    let denom = (cov[[i, i]] * cov[[j, j]]).sqrt();
                    if denom > 0.0 && denom.is_finite() {
                        correlations[[p, i, j]] = (cov[[i, j]] / denom).clamp(-1.0, 1.0);
                    }
                }
            }
        }

        Some(Self {
            correlations,
            feature_names: cycles.feature_names().to_vec(),
        })
    }

    /// `(k, k)` matrix at one phase point
    pub fn at(&self, phase: usize) -> Option<Array2<f64>> {
        (phase < self.correlations.len_of(Axis(0)))
            .then(|| self.correlations.index_axis(Axis(0), phase).to_owned())
    }

    /// Correlation of two features along the phase axis
    pub fn between(&self, a: &str, b: &str) -> Option<Array1<f64>> {
        let i = self.feature_names.iter().position(|n| n == a)?;
        let j = self.feature_names.iter().position(|n| n == b)?;
        Some(self.correlations.slice(ndarray::s![.., i, j]).to_owned())
    }
}

/// Statistics of cycles pooled across several subjects and/or tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PooledStatistics {
    /// Subjects that contributed at least one cycle
    pub subjects: Vec<String>,
    /// Tasks that contributed at least one cycle
    pub tasks: Vec<String>,
    pub n_cycles: usize,
    pub mean_patterns: PatternMap,
    pub std_patterns: PatternMap,
    pub summary: SummaryTable,
}

impl PooledStatistics {
    /// Pool `(subject, task, cycles)` parts; `None` when there are no parts.
    pub fn from_parts(parts: &[(String, String, CycleArray)]) -> Result<Option<Self>> {
        let arrays: Vec<CycleArray> = parts.iter().map(|(_, _, c)| c.clone()).collect();
        let Some(pooled) = CycleArray::stack(&arrays)? else {
            return Ok(None);
        };

        Ok(Some(Self {
            subjects: distinct(parts.iter().map(|(s, _, _)| s)),
            tasks: distinct(parts.iter().map(|(_, t, _)| t)),
            n_cycles: pooled.n_cycles(),
            mean_patterns: mean_patterns(&pooled),
            std_patterns: std_patterns(&pooled),
            summary: SummaryTable::from_cycles(&pooled),
        }))
    }

    pub fn n_subjects(&self) -> usize {
        self.subjects.len()
    }

    pub fn n_tasks(&self) -> usize {
        self.tasks.len()
    }
}

/// Across-subject mean pattern where every subject counts once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMeanPatterns {
    pub task: String,
    pub subjects: Vec<String>,
    /// Cycles behind the per-subject means
    pub n_cycles: usize,
    /// Mean of the per-subject mean patterns
    pub mean: PatternMap,
    /// Population std of the per-subject mean patterns
    pub std: PatternMap,
}

impl GroupMeanPatterns {
    pub fn from_subject_means(
        task: &str,
        subject_means: &[(String, usize, PatternMap)],
    ) -> Option<Self> {
        let (_, _, first) = subject_means.first()?;
        let n = subject_means.len() as f64;

        let mut mean = PatternMap::new();
        let mut std = PatternMap::new();
        for feature in first.keys() {
            let rows: Vec<ArrayView1<'_, f64>> = subject_means
                .iter()
                .filter_map(|(_, _, m)| m.get(feature).map(|a| a.view()))
                .collect();
            let stacked = ndarray::stack(Axis(0), &rows).ok()?;
            mean.insert(feature.clone(), stacked.sum_axis(Axis(0)) / n);
            std.insert(feature.clone(), stacked.std_axis(Axis(0), 0.0));
        }

        Some(Self {
            task: task.to_string(),
            subjects: subject_means.iter().map(|(s, _, _)| s.clone()).collect(),
            n_cycles: subject_means.iter().map(|(_, c, _)| c).sum(),
            mean,
            std,
        })
    }

    pub fn n_subjects(&self) -> usize {
        self.subjects.len()
    }
}

fn distinct<'a, I>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut out: Vec<String> = Vec::new();
    for label in labels {
        if !out.contains(label) {
            out.push(label.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn cycles(values: Vec<f64>, shape: (usize, usize, usize), names: &[&str]) -> CycleArray {
        CycleArray::new(
            Array3::from_shape_vec(shape, values).unwrap(),
            names.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap()
    }

    fn two_feature_cycles() -> CycleArray {
        // 3 cycles x 2 phases x 2 features; b = 2a + 1 exactly, c varies
        let mut v = Vec::new();
        for c in 0..3 {
            for p in 0..2 {
                let a = (c + p) as f64;
                v.push(a);
                v.push(2.0 * a + 1.0);
            }
        }
        cycles(v, (3, 2, 2), &["a", "b"])
    }

    #[test]
    fn test_mean_and_std_patterns() {
        let arr = two_feature_cycles();
        let mean = mean_patterns(&arr);
        let std = std_patterns(&arr);
        assert_abs_diff_eq!(mean["a"][0], 1.0);
        assert_abs_diff_eq!(mean["a"][1], 2.0);
        assert_abs_diff_eq!(mean["b"][0], 3.0);
        assert_abs_diff_eq!(std["a"][0], (2.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_rom_per_cycle_and_overall() {
        let arr = cycles(vec![0.0, 2.0, 1.0, 5.0, 3.0, 4.0], (2, 3, 1), &["x"]);
        let per = range_of_motion(&arr, true);
        let all = range_of_motion(&arr, false);
        assert_eq!(per["x"].per_cycle().unwrap().to_vec(), vec![2.0, 2.0]);
        assert_eq!(all["x"].overall(), Some(5.0));
        assert!(all["x"].max() >= per["x"].max());
    }

    #[test]
    fn test_rom_ignores_nan() {
        let arr = cycles(vec![f64::NAN, 1.0, 3.0], (1, 3, 1), &["x"]);
        assert_eq!(range_of_motion(&arr, false)["x"].overall(), Some(2.0));
        let empty = cycles(vec![f64::NAN; 2], (1, 2, 1), &["x"]);
        assert!(range_of_motion(&empty, false)["x"].max().is_nan());
    }

    #[test]
    fn test_summary_statistics() {
        let arr = cycles(vec![1.0, 2.0, 3.0, 4.0, f64::NAN, 5.0], (2, 3, 1), &["x"]);
        let table = SummaryTable::from_cycles(&arr);
        let row = table.row("x").unwrap();
        assert_eq!(row.count, 5);
        assert_abs_diff_eq!(row.mean, 3.0);
        assert_abs_diff_eq!(row.std, 2.0f64.sqrt(), epsilon = 1e-12);
        assert_eq!(row.min, 1.0);
        assert_eq!(row.max, 5.0);
        assert_eq!(row.median, 3.0);
        assert_eq!(row.q25, 2.0);
        assert_eq!(row.q75, 4.0);
        assert!(table.to_json().unwrap().contains("\"median\""));
    }

    #[test]
    fn test_quantile_interpolates() {
        assert_abs_diff_eq!(quantile_sorted(&[0.0, 10.0], 0.25), 2.5);
        assert_eq!(quantile_sorted(&[7.0], 0.9), 7.0);
        assert!(quantile_sorted(&[], 0.5).is_nan());
    }

    #[test]
    fn test_phase_correlations() {
        let arr = two_feature_cycles();
        let corr = PhaseCorrelations::from_cycles(&arr).unwrap();
        assert_eq!(corr.correlations.dim(), (2, 2, 2));
        let ab = corr.between("a", "b").unwrap();
        for r in ab.iter() {
            assert_abs_diff_eq!(*r, 1.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(corr.at(0).unwrap()[[0, 0]], 1.0, epsilon = 1e-12);
        assert!(corr.at(5).is_none());
    }

    #[test]
    fn test_phase_correlations_need_two_cycles() {
        let arr = cycles(vec![1.0, 2.0], (1, 1, 2), &["a", "b"]);
        assert!(PhaseCorrelations::from_cycles(&arr).is_none());
    }

    #[test]
    fn test_constant_feature_correlation_is_nan() {
        let arr = cycles(vec![1.0, 5.0, 2.0, 5.0], (2, 1, 2), &["a", "b"]);
        let corr = PhaseCorrelations::from_cycles(&arr).unwrap();
        assert!(corr.correlations[[0, 0, 1]].is_nan());
        assert_abs_diff_eq!(corr.correlations[[0, 0, 0]], 1.0);
    }

    #[test]
    fn test_pooled_statistics_track_contributors() {
        let a = cycles(vec![0.0, 1.0], (1, 2, 1), &["x"]);
        let b = cycles(vec![2.0, 3.0, 4.0, 5.0], (2, 2, 1), &["x"]);
        let parts = vec![
            ("S1".to_string(), "walk".to_string(), a),
            ("S2".to_string(), "walk".to_string(), b),
        ];
        let pooled = PooledStatistics::from_parts(&parts).unwrap().unwrap();
        assert_eq!(pooled.n_subjects(), 2);
        assert_eq!(pooled.n_tasks(), 1);
        assert_eq!(pooled.n_cycles, 3);
        assert_abs_diff_eq!(pooled.mean_patterns["x"][0], 2.0);
        assert!(PooledStatistics::from_parts(&[]).unwrap().is_none());
    }

    #[test]
    fn test_group_means_weight_subjects_equally() {
        let s1: PatternMap = [("x".to_string(), Array1::from(vec![0.0, 0.0]))].into();
        let s2: PatternMap = [("x".to_string(), Array1::from(vec![2.0, 4.0]))].into();
        let group = GroupMeanPatterns::from_subject_means(
            "walk",
            &[("S1".into(), 10, s1), ("S2".into(), 1, s2)],
        )
        .unwrap();
        assert_eq!(group.n_subjects(), 2);
        assert_eq!(group.n_cycles, 11);
        assert_eq!(group.mean["x"].to_vec(), vec![1.0, 2.0]);
        assert_eq!(group.std["x"].to_vec(), vec![1.0, 2.0]);
    }
}
