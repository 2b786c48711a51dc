//! Cycle quality checks and outlier detection.
//!
//! ## Validity
//!
//! A cycle is valid unless one of its features has
//!
//! - a non-finite sample (NaN / ±Inf), checked for every feature kind
//! - a magnitude above the kind's physiological bound × tolerance
//! - a jump between consecutive phase samples above
//!   bound × tolerance × `max_step_fraction`
//!
//! Range and continuity checks only apply to kinds with a bound; GRF, COP
//! and unknown features are exempt.
//!
//! ## Outliers
//!
//! Each cycle's RMS deviation from the mean pattern is z-scored against the
//! deviations of all cycles, per feature. A cycle is an outlier when any
//! feature's z-score exceeds the threshold. Cycles with non-finite samples
//! are reported by validation and excluded from that feature's scoring.

use std::collections::BTreeMap;

use gait_core::FeatureMapping;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;
use crate::cycles::CycleArray;

/// A single reason a cycle failed validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CycleIssue {
    NonFinite {
        feature: String,
        phase: usize,
    },
    OutOfRange {
        feature: String,
        phase: usize,
        value: f64,
        bound: f64,
    },
    Discontinuity {
        feature: String,
        phase: usize,
        jump: f64,
        limit: f64,
    },
}

impl CycleIssue {
    pub fn feature(&self) -> &str {
        match self {
            CycleIssue::NonFinite { feature, .. }
            | CycleIssue::OutOfRange { feature, .. }
            | CycleIssue::Discontinuity { feature, .. } => feature,
        }
    }
}

/// Validation outcome for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: usize,
    pub issues: Vec<CycleIssue>,
}

impl CycleReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Issue tallies for one feature
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCounts {
    pub non_finite: usize,
    pub out_of_range: usize,
    pub discontinuity: usize,
}

/// Aggregate validation result for one (subject, task) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub subject: String,
    pub task: String,
    pub n_cycles: usize,
    pub n_valid: usize,
    pub issues_by_feature: BTreeMap<String, IssueCounts>,
}

impl ValidationSummary {
    pub fn from_reports(subject: &str, task: &str, reports: &[CycleReport]) -> Self {
        let mut issues_by_feature: BTreeMap<String, IssueCounts> = BTreeMap::new();
        for issue in reports.iter().flat_map(|r| &r.issues) {
            let counts = issues_by_feature
                .entry(issue.feature().to_string())
                .or_default();
            match issue {
                CycleIssue::NonFinite { .. } => counts.non_finite += 1,
                CycleIssue::OutOfRange { .. } => counts.out_of_range += 1,
                CycleIssue::Discontinuity { .. } => counts.discontinuity += 1,
            }
        }

        Self {
            subject: subject.to_string(),
            task: task.to_string(),
            n_cycles: reports.len(),
            n_valid: reports.iter().filter(|r| r.is_valid()).count(),
            issues_by_feature,
        }
    }

    pub fn n_invalid(&self) -> usize {
        self.n_cycles - self.n_valid
    }

    /// Fraction of valid cycles, 1.0 for an empty pair
    pub fn valid_fraction(&self) -> f64 {
        if self.n_cycles == 0 {
            1.0
        } else {
            self.n_valid as f64 / self.n_cycles as f64
        }
    }
}

/// Range and continuity checker
#[derive(Debug, Clone)]
pub struct CycleValidator {
    /// Multiplier on physiological bounds
    pub tolerance: f64,

    /// Continuity limit as a fraction of the scaled bound
    pub max_step_fraction: f64,
}

impl Default for CycleValidator {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default())
    }
}

impl CycleValidator {
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            tolerance: config.tolerance,
            max_step_fraction: config.max_step_fraction,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Per-cycle reports. At most one issue of each type is recorded per
    /// feature and cycle: the first phase where it occurs.
    pub fn validate(&self, cycles: &CycleArray) -> Vec<CycleReport> {
        self.validate_with(cycles, &BTreeMap::new())
    }

    /// [`validate`](Self::validate) with kinds and units taken from
    /// `mappings`; features missing from it are classified by name.
    pub fn validate_with(
        &self,
        cycles: &CycleArray,
        mappings: &BTreeMap<String, FeatureMapping>,
    ) -> Vec<CycleReport> {
        let mut reports: Vec<CycleReport> = (0..cycles.n_cycles())
            .map(|cycle| CycleReport {
                cycle,
                issues: Vec::new(),
            })
            .collect();

        for (f, name) in cycles.feature_names().iter().enumerate() {
            let mapping = mappings
                .get(name)
                .copied()
                .unwrap_or_else(|| FeatureMapping::of(name));
            let bound = mapping.bound(self.tolerance);
            let step_limit = bound
                .filter(|_| self.max_step_fraction > 0.0)
                .map(|b| b * self.max_step_fraction);
            let feature = cycles.data().index_axis(Axis(2), f);

            for (c, samples) in feature.outer_iter().enumerate() {
                let issues = &mut reports[c].issues;

                if let Some(phase) = samples.iter().position(|v| !v.is_finite()) {
                    issues.push(CycleIssue::NonFinite {
                        feature: name.clone(),
                        phase,
                    });
                }

                if let Some(bound) = bound {
                    if let Some((phase, &value)) = samples
                        .iter()
                        .enumerate()
                        .find(|(_, v)| v.is_finite() && v.abs() > bound)
                    {
                        issues.push(CycleIssue::OutOfRange {
                            feature: name.clone(),
                            phase,
                            value,
                            bound,
                        });
                    }
                }

                if let Some(limit) = step_limit {
                    let first_jump = samples
                        .iter()
                        .zip(samples.iter().skip(1))
                        .enumerate()
                        .filter(|(_, (a, b))| a.is_finite() && b.is_finite())
                        .map(|(p, (a, b))| (p + 1, (b - a).abs()))
                        .find(|(_, jump)| *jump > limit);
                    if let Some((phase, jump)) = first_jump {
                        issues.push(CycleIssue::Discontinuity {
                            feature: name.clone(),
                            phase,
                            jump,
                            limit,
                        });
                    }
                }
            }
        }

        reports
    }

    /// `true` where the cycle passes every check
    pub fn validity_mask(&self, cycles: &CycleArray) -> Vec<bool> {
        self.validate(cycles).iter().map(CycleReport::is_valid).collect()
    }
}

const RELATIVE_SPREAD_FLOOR: f64 = 1e-9;

/// Per-cycle deviation scores behind outlier detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierScores {
    /// RMS deviation from the mean pattern, `(n_cycles, k)`. NaN for cycles
    /// with a non-finite sample in that feature; those cycles are left out
    /// of the mean pattern and the spread.
    pub deviations: Array2<f64>,
    /// Deviations z-scored per feature, `(n_cycles, k)`; zero where the
    /// deviation spread is zero or the deviation is NaN
    pub z_scores: Array2<f64>,
    pub feature_names: Vec<String>,
}

impl OutlierScores {
    pub fn from_cycles(cycles: &CycleArray) -> Self {
        let (n, n_phases, k) = cycles.shape();
        let mut deviations = Array2::from_elem((n, k), f64::NAN);
        let mut z_scores = Array2::zeros((n, k));

        for f in 0..k {
            let feature = cycles.data().index_axis(Axis(2), f);
            let clean: Vec<usize> = (0..n)
                .filter(|&c| feature.row(c).iter().all(|v| v.is_finite()))
                .collect();
            if clean.is_empty() {
                continue;
            }

            let m = clean.len() as f64;
            let mean = clean
                .iter()
                .fold(Array1::<f64>::zeros(n_phases), |acc, &c| acc + &feature.row(c))
                / m;
            for &c in &clean {
                let sq: f64 = feature
                    .row(c)
                    .iter()
                    .zip(mean.iter())
                    .map(|(v, mu)| (v - mu).powi(2))
                    .sum();
                deviations[[c, f]] = (sq / n_phases as f64).sqrt();
            }

            let mu = clean.iter().map(|&c| deviations[[c, f]]).sum::<f64>() / m;
            let sd = (clean
                .iter()
                .map(|&c| (deviations[[c, f]] - mu).powi(2))
                .sum::<f64>()
                / m)
                .sqrt();
            // Spread that is only rounding noise on identical cycles counts as none.
            if sd.is_finite() && sd > RELATIVE_SPREAD_FLOOR * mu.abs() && sd > 0.0 {
                for &c in &clean {
                    z_scores[[c, f]] = (deviations[[c, f]] - mu) / sd;
                }
            }
        }

        Self {
            deviations,
            z_scores,
            feature_names: cycles.feature_names().to_vec(),
        }
    }

    /// Indices of cycles whose z-score exceeds `threshold` for any feature
    pub fn outliers(&self, threshold: f64) -> Vec<usize> {
        self.z_scores
            .outer_iter()
            .enumerate()
            .filter(|(_, row)| row.iter().any(|z| *z > threshold))
            .map(|(c, _)| c)
            .collect()
    }
}
