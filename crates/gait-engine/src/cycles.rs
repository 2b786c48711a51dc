//! Reshaping flat pair rows into `(cycle, phase, feature)` arrays.
//!
//! Rows are stacked cycle after cycle, so flat row `c * points_per_cycle + p`
//! of a pair becomes element `[c, p, ..]`. The phase and cycle axes are never
//! transposed.

use gait_core::{Error, GaitTable, Result};
use ndarray::{Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::config::ReshapeMode;

/// Dense cycle array with labelled feature axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleArray {
    data: Array3<f64>,
    feature_names: Vec<String>,
}

impl CycleArray {
    pub fn new(data: Array3<f64>, feature_names: Vec<String>) -> Result<Self> {
        if data.len_of(Axis(2)) != feature_names.len() {
            return Err(Error::invalid_input(format!(
                "feature axis has {} entries but {} names were given",
                data.len_of(Axis(2)),
                feature_names.len()
            )));
        }
        Ok(Self {
            data,
            feature_names,
        })
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn into_data(self) -> Array3<f64> {
        self.data
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_cycles(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn n_phases(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn n_features(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// `(n_cycles, points_per_cycle, n_features)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.n_cycles(), self.n_phases(), self.n_features())
    }

    pub fn feature_position(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// One feature as a `(cycle, phase)` view
    pub fn feature(&self, name: &str) -> Option<ArrayView2<'_, f64>> {
        let f = self.feature_position(name)?;
        Some(self.data.index_axis(Axis(2), f))
    }

    /// One cycle as a `(phase, feature)` view
    pub fn cycle(&self, index: usize) -> Option<ArrayView2<'_, f64>> {
        (index < self.n_cycles()).then(|| self.data.index_axis(Axis(0), index))
    }

    /// Pool cycles from several arrays with identical feature labels.
    pub fn stack(parts: &[CycleArray]) -> Result<Option<CycleArray>> {
        let Some(first) = parts.first() else {
            return Ok(None);
        };
        if let Some(odd) = parts.iter().find(|p| p.feature_names != first.feature_names) {
            return Err(Error::invalid_input(format!(
                "cannot pool cycles with features {:?} and {:?}",
                first.feature_names, odd.feature_names
            )));
        }
        let views: Vec<_> = parts.iter().map(|p| p.data.view()).collect();
        let data = ndarray::concatenate(Axis(0), &views)
            .map_err(|e| Error::invalid_input(format!("cannot pool cycles: {e}")))?;
        Ok(Some(Self {
            data,
            feature_names: first.feature_names.clone(),
        }))
    }
}

/// Cuts pair rows into whole cycles
#[derive(Debug, Clone, Copy)]
pub struct CycleReshaper {
    pub points_per_cycle: usize,
    pub mode: ReshapeMode,
}

impl CycleReshaper {
    pub fn new(points_per_cycle: usize, mode: ReshapeMode) -> Self {
        Self {
            points_per_cycle,
            mode,
        }
    }

    /// Number of whole cycles in `n_rows`, or a dimension error in strict mode.
    pub fn cycle_count(&self, subject: &str, task: &str, n_rows: usize) -> Result<usize> {
        let remainder = n_rows % self.points_per_cycle;
        if remainder != 0 && self.mode == ReshapeMode::Strict {
            return Err(Error::Dimension {
                subject: subject.to_string(),
                task: task.to_string(),
                rows: n_rows,
                points_per_cycle: self.points_per_cycle,
            });
        }
        Ok(n_rows / self.points_per_cycle)
    }

    /// Extract `features` (by table column index) for the given pair rows.
    pub fn reshape(
        &self,
        table: &GaitTable,
        subject: &str,
        task: &str,
        rows: &[usize],
        features: &[usize],
    ) -> Result<Option<CycleArray>> {
        if rows.is_empty() || features.is_empty() {
            return Ok(None);
        }

        let n_cycles = self.cycle_count(subject, task, rows.len())?;
        let dropped = rows.len() - n_cycles * self.points_per_cycle;
        if dropped > 0 {
            tracing::warn!(
                subject,
                task,
                rows = rows.len(),
                dropped,
                "Truncating partial gait cycle"
            );
        }
        if n_cycles == 0 {
            return Ok(None);
        }

        let ppc = self.points_per_cycle;
        let columns: Vec<&[f64]> = features.iter().map(|&f| table.feature_values(f)).collect();
        let data = Array3::from_shape_fn((n_cycles, ppc, features.len()), |(c, p, f)| {
            columns[f][rows[c * ppc + p]]
        });
        let names = features
            .iter()
            .map(|&f| table.feature_names()[f].clone())
            .collect();

        CycleArray::new(data, names).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gait_core::RawTable;

    fn table(rows_a: usize) -> GaitTable {
        let mut builder = RawTable::builder(["a_angle_rad", "b_angle_rad"]);
        for r in 0..rows_a {
            builder
                .push_row("S", "walk", (r % 4) as f64, &[r as f64, 100.0 + r as f64])
                .unwrap();
        }
        GaitTable::from_raw(builder.build()).unwrap()
    }

    #[test]
    fn test_reshape_is_cycle_major() {
        let t = table(12);
        let rows: Vec<usize> = (0..12).collect();
        let arr = CycleReshaper::new(4, ReshapeMode::Strict)
            .reshape(&t, "S", "walk", &rows, &[0, 1])
            .unwrap()
            .unwrap();
        assert_eq!(arr.shape(), (3, 4, 2));
        for c in 0..3 {
            for p in 0..4 {
                assert_eq!(arr.data()[[c, p, 0]], (c * 4 + p) as f64);
                assert_eq!(arr.data()[[c, p, 1]], 100.0 + (c * 4 + p) as f64);
            }
        }
        assert_eq!(arr.feature_names(), ["a_angle_rad", "b_angle_rad"]);
    }

    #[test]
    fn test_strict_mode_rejects_partial_cycle() {
        let t = table(9);
        let rows: Vec<usize> = (0..9).collect();
        let err = CycleReshaper::new(4, ReshapeMode::Strict)
            .reshape(&t, "S", "walk", &rows, &[0])
            .unwrap_err();
        assert!(err.is_dimension());
    }

    #[test]
    fn test_truncate_mode_drops_tail() {
        let t = table(9);
        let rows: Vec<usize> = (0..9).collect();
        let arr = CycleReshaper::new(4, ReshapeMode::Truncate)
            .reshape(&t, "S", "walk", &rows, &[0])
            .unwrap()
            .unwrap();
        assert_eq!(arr.shape(), (2, 4, 1));

        let short: Vec<usize> = (0..3).collect();
        let none = CycleReshaper::new(4, ReshapeMode::Truncate)
            .reshape(&t, "S", "walk", &short, &[0])
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_feature_and_cycle_views() {
        let t = table(8);
        let rows: Vec<usize> = (0..8).collect();
        let arr = CycleReshaper::new(4, ReshapeMode::Strict)
            .reshape(&t, "S", "walk", &rows, &[0, 1])
            .unwrap()
            .unwrap();
        let b = arr.feature("b_angle_rad").unwrap();
        assert_eq!(b.dim(), (2, 4));
        assert_eq!(b[[1, 0]], 104.0);
        assert_eq!(arr.cycle(1).unwrap()[[3, 0]], 7.0);
        assert!(arr.cycle(2).is_none());
    }

    #[test]
    fn test_stack_pools_cycles() {
        let t = table(8);
        let reshaper = CycleReshaper::new(4, ReshapeMode::Strict);
        let first = reshaper.reshape(&t, "S", "walk", &[0, 1, 2, 3], &[0]).unwrap().unwrap();
        let second = reshaper.reshape(&t, "S", "walk", &[4, 5, 6, 7], &[0]).unwrap().unwrap();
        let pooled = CycleArray::stack(&[first, second]).unwrap().unwrap();
        assert_eq!(pooled.shape(), (2, 4, 1));
        assert_eq!(pooled.data()[[1, 0, 0]], 4.0);

        let other = reshaper.reshape(&t, "S", "walk", &[0, 1, 2, 3], &[1]).unwrap().unwrap();
        let mismatched = reshaper.reshape(&t, "S", "walk", &[0, 1, 2, 3], &[0]).unwrap().unwrap();
        assert!(CycleArray::stack(&[mismatched, other]).is_err());
        assert!(CycleArray::stack(&[]).unwrap().is_none());
    }
}
