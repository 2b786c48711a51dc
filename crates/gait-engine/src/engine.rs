//! The gait engine: an immutable indexed table plus a query cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use gait_core::{
    Error, FeatureKind, FeatureMapping, GaitTable, NameCheck, NamingValidator, RawTable, Result,
    TableSource,
};

use crate::cache::{CacheKey, CacheStats, QueryCache, QueryKind};
use crate::config::EngineConfig;
use crate::cycles::{CycleArray, CycleReshaper};
use crate::index::CycleIndex;
use crate::stats::{
    self, GroupMeanPatterns, PatternMap, PhaseCorrelations, PooledStatistics, Rom, SummaryTable,
};
use crate::validation::{CycleReport, CycleValidator, OutlierScores, ValidationSummary};

/// Phase-indexed gait data engine.
///
/// Construction and filtering build new instances; every query is a read
/// against the frozen table, so an engine can be shared across threads.
/// Queries for a (subject, task) pair without rows return empty results
/// instead of errors.
#[derive(Debug)]
pub struct GaitEngine {
    pub(crate) table: GaitTable,
    index: CycleIndex,
    mappings: BTreeMap<String, FeatureMapping>,
    naming: Vec<NameCheck>,
    pub(crate) config: EngineConfig,
    reshaper: CycleReshaper,
    validator: CycleValidator,
    cache: QueryCache,
}

impl GaitEngine {
    /// Engine over `raw` with the default configuration
    pub fn new(raw: RawTable) -> Result<Self> {
        Self::with_config(raw, EngineConfig::default())
    }

    pub fn with_config(raw: RawTable, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let table = GaitTable::from_raw(raw)?;
        Ok(Self::from_table(table, config))
    }

    /// Load through a [`TableSource`] and build the engine.
    pub fn from_source(source: &dyn TableSource, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        tracing::info!(source = %source.describe(), "Loading gait table");
        let raw = source.load()?;
        let table = GaitTable::from_raw(raw)?;
        Ok(Self::from_table(table, config))
    }

    pub(crate) fn from_table(table: GaitTable, config: EngineConfig) -> Self {
        let index = CycleIndex::build(&table);
        let mappings = table
            .feature_names()
            .iter()
            .map(|name| (name.clone(), FeatureMapping::of(name)))
            .collect();

        let validator = NamingValidator::new();
        let naming = validator.check_all(table.feature_names().iter().map(String::as_str));
        for check in &naming {
            tracing::warn!(
                feature = %check.name,
                issues = check.issues.len(),
                suggestion = ?validator.suggest(&check.name),
                "Feature name does not follow the naming convention"
            );
        }

        tracing::info!(
            rows = table.n_rows(),
            subjects = table.subjects().len(),
            tasks = table.tasks().len(),
            features = table.feature_names().len(),
            pairs = index.pair_count(),
            "Gait engine ready"
        );

        Self {
            reshaper: CycleReshaper::new(config.points_per_cycle, config.reshape),
            validator: CycleValidator::from_config(&config.validation),
            cache: QueryCache::new(config.cache.clone()),
            table,
            index,
            mappings,
            naming,
            config,
        }
    }

    /// Subjects in first-appearance order
    pub fn subjects(&self) -> &[String] {
        self.table.subjects()
    }

    /// Tasks in first-appearance order
    pub fn tasks(&self) -> &[String] {
        self.table.tasks()
    }

    /// Feature columns, sorted
    pub fn features(&self) -> &[String] {
        self.table.feature_names()
    }

    pub fn points_per_cycle(&self) -> usize {
        self.config.points_per_cycle
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn row_count(&self) -> usize {
        self.table.n_rows()
    }

    pub fn has_data(&self, subject: &str, task: &str) -> bool {
        self.index.lookup(subject, task).is_some()
    }

    /// Whole cycles held by a pair; zero when the pair has no rows.
    pub fn cycle_count(&self, subject: &str, task: &str) -> Result<usize> {
        match self.index.lookup(subject, task) {
            Some(rows) => self.reshaper.cycle_count(subject, task, rows.len()),
            None => Ok(0),
        }
    }

    pub fn feature_kind(&self, feature: &str) -> Option<FeatureKind> {
        self.mappings.get(feature).map(|m| m.kind)
    }

    pub fn feature_kinds(&self) -> &BTreeMap<String, FeatureMapping> {
        &self.mappings
    }

    /// Feature names that failed the naming check at construction
    pub fn naming_report(&self) -> &[NameCheck] {
        &self.naming
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Sorted, de-duplicated known features; all features for `None`.
    pub(crate) fn resolve_features(&self, features: Option<&[&str]>) -> Vec<String> {
        let Some(requested) = features else {
            return self.table.feature_names().to_vec();
        };

        let mut resolved: Vec<String> = Vec::with_capacity(requested.len());
        for &name in requested {
            if self.table.feature_index(name).is_some() {
                resolved.push(name.to_string());
            } else {
                tracing::warn!(feature = name, "Ignoring unknown feature");
            }
        }
        resolved.sort();
        resolved.dedup();
        resolved
    }

    /// Reshaped cycles of a pair, shared with the cache. Holds `None`
    /// when there is nothing to reshape.
    fn cached_cycles(
        &self,
        subject: &str,
        task: &str,
        features: &[String],
    ) -> Result<Arc<Option<CycleArray>>> {
        let Some(rows) = self.index.lookup(subject, task) else {
            return Ok(Arc::new(None));
        };
        self.reshaper.cycle_count(subject, task, rows.len())?;
        if features.is_empty() {
            return Ok(Arc::new(None));
        }

        let key = CacheKey::new(subject, task, features, QueryKind::Cycles);
        self.cache.get_or_compute(key, || {
            let columns: Vec<usize> = features
                .iter()
                .filter_map(|f| self.table.feature_index(f))
                .collect();
            self.reshaper
                .reshape(&self.table, subject, task, rows.rows(), &columns)
        })
    }

    /// Derived value over a pair's cycles, cached under `kind`.
    fn derived<T, F>(
        &self,
        subject: &str,
        task: &str,
        features: &[String],
        kind: QueryKind,
        compute: F,
    ) -> Result<Option<Arc<T>>>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&CycleArray) -> T,
    {
        let cycles = self.cached_cycles(subject, task, features)?;
        let Some(cycles) = &*cycles else {
            return Ok(None);
        };
        let key = CacheKey::new(subject, task, features, kind);
        self.cache
            .get_or_compute(key, || Ok(compute(cycles)))
            .map(Some)
    }

    /// Cycles of one pair as a `(n_cycles, points_per_cycle, k)` array.
    ///
    /// `None` when the pair has no rows, none of the requested features
    /// exist, or (in truncate mode) fewer rows than one cycle remain.
    /// A row count that is not a multiple of `points_per_cycle` is a
    /// [`Error::Dimension`] in strict mode.
    pub fn get_cycles(
        &self,
        subject: &str,
        task: &str,
        features: Option<&[&str]>,
    ) -> Result<Option<CycleArray>> {
        let features = self.resolve_features(features);
        let cycles = self.cached_cycles(subject, task, &features)?;
        Ok((*cycles).clone())
    }

    /// Mean over cycles at each phase point, per feature
    pub fn get_mean_patterns(
        &self,
        subject: &str,
        task: &str,
        features: Option<&[&str]>,
    ) -> Result<PatternMap> {
        let features = self.resolve_features(features);
        let patterns = self.derived(
            subject,
            task,
            &features,
            QueryKind::MeanPatterns,
            stats::mean_patterns,
        )?;
        Ok(patterns.map(|p| (*p).clone()).unwrap_or_default())
    }

    /// Population std over cycles at each phase point, per feature
    pub fn get_std_patterns(
        &self,
        subject: &str,
        task: &str,
        features: Option<&[&str]>,
    ) -> Result<PatternMap> {
        let features = self.resolve_features(features);
        let patterns = self.derived(
            subject,
            task,
            &features,
            QueryKind::StdPatterns,
            stats::std_patterns,
        )?;
        Ok(patterns.map(|p| (*p).clone()).unwrap_or_default())
    }

    /// One summary row per feature over all finite samples
    pub fn get_summary_statistics(
        &self,
        subject: &str,
        task: &str,
        features: Option<&[&str]>,
    ) -> Result<SummaryTable> {
        let features = self.resolve_features(features);
        let summary = self.derived(
            subject,
            task,
            &features,
            QueryKind::Summary,
            SummaryTable::from_cycles,
        )?;
        Ok(summary.map(|s| (*s).clone()).unwrap_or_default())
    }

    /// Range of motion per feature, per cycle or over all cycles
    pub fn calculate_rom(
        &self,
        subject: &str,
        task: &str,
        features: Option<&[&str]>,
        by_cycle: bool,
    ) -> Result<BTreeMap<String, Rom>> {
        let features = self.resolve_features(features);
        let rom = self.derived(
            subject,
            task,
            &features,
            QueryKind::Rom { by_cycle },
            |cycles| stats::range_of_motion(cycles, by_cycle),
        )?;
        Ok(rom.map(|r| (*r).clone()).unwrap_or_default())
    }

    /// Feature-by-feature correlation across cycles at every phase point;
    /// `None` with fewer than two cycles.
    pub fn get_phase_correlations(
        &self,
        subject: &str,
        task: &str,
        features: Option<&[&str]>,
    ) -> Result<Option<PhaseCorrelations>> {
        let features = self.resolve_features(features);
        let correlations = self.derived(
            subject,
            task,
            &features,
            QueryKind::Correlations,
            PhaseCorrelations::from_cycles,
        )?;
        Ok(correlations.and_then(|c| (*c).clone()))
    }

    /// Statistics over cycles pooled from several subjects performing
    /// `task`. `subjects` defaults to every subject; pairs without rows are
    /// skipped.
    pub fn get_multi_subject_statistics(
        &self,
        subjects: Option<&[&str]>,
        task: &str,
        features: Option<&[&str]>,
    ) -> Result<Option<PooledStatistics>> {
        let features = self.resolve_features(features);
        let subjects = labels_or_all(subjects, self.subjects());

        let mut parts = Vec::new();
        for subject in &subjects {
            if let Some(cycles) = &*self.cached_cycles(subject, task, &features)? {
                parts.push((subject.clone(), task.to_string(), cycles.clone()));
            }
        }
        tracing::debug!(task, contributing = parts.len(), "Pooling subjects");
        PooledStatistics::from_parts(&parts)
    }

    /// Mean of per-subject mean patterns for `task`, each subject weighted
    /// equally.
    pub fn get_group_mean_patterns(
        &self,
        subjects: Option<&[&str]>,
        task: &str,
        features: Option<&[&str]>,
    ) -> Result<Option<GroupMeanPatterns>> {
        let features = self.resolve_features(features);
        let subjects = labels_or_all(subjects, self.subjects());

        let mut subject_means = Vec::new();
        for subject in &subjects {
            let n_cycles = match &*self.cached_cycles(subject, task, &features)? {
                Some(cycles) => cycles.n_cycles(),
                None => continue,
            };
            let means = self.derived(
                subject,
                task,
                &features,
                QueryKind::MeanPatterns,
                stats::mean_patterns,
            )?;
            if let Some(means) = means {
                subject_means.push((subject.clone(), n_cycles, (*means).clone()));
            }
        }
        Ok(GroupMeanPatterns::from_subject_means(task, &subject_means))
    }

    /// Statistics over one subject's cycles pooled across tasks. `tasks`
    /// defaults to every task.
    pub fn get_multi_task_statistics(
        &self,
        subject: &str,
        tasks: Option<&[&str]>,
        features: Option<&[&str]>,
    ) -> Result<Option<PooledStatistics>> {
        let features = self.resolve_features(features);
        let tasks = labels_or_all(tasks, self.tasks());

        let mut parts = Vec::new();
        for task in &tasks {
            if let Some(cycles) = &*self.cached_cycles(subject, task, &features)? {
                parts.push((subject.to_string(), task.clone(), cycles.clone()));
            }
        }
        tracing::debug!(subject, contributing = parts.len(), "Pooling tasks");
        PooledStatistics::from_parts(&parts)
    }

    /// Every cycle's issues across all features, in cycle order.
    pub fn validate_cycles_detailed(&self, subject: &str, task: &str) -> Result<Vec<CycleReport>> {
        let features = self.resolve_features(None);
        if features.is_empty() {
            // Nothing to check, so every whole cycle passes.
            return Ok((0..self.cycle_count(subject, task)?)
                .map(|cycle| CycleReport {
                    cycle,
                    issues: Vec::new(),
                })
                .collect());
        }
        let reports = self.derived(subject, task, &features, QueryKind::Validity, |cycles| {
            self.validator.validate_with(cycles, &self.mappings)
        })?;
        Ok(reports.map(|r| (*r).clone()).unwrap_or_default())
    }

    /// `true` for each cycle with no issue; empty for a pair without rows.
    pub fn validate_cycles(&self, subject: &str, task: &str) -> Result<Vec<bool>> {
        Ok(self
            .validate_cycles_detailed(subject, task)?
            .iter()
            .map(CycleReport::is_valid)
            .collect())
    }

    pub fn validation_summary(&self, subject: &str, task: &str) -> Result<ValidationSummary> {
        let reports = self.validate_cycles_detailed(subject, task)?;
        Ok(ValidationSummary::from_reports(subject, task, &reports))
    }

    /// Deviation scores behind [`find_outlier_cycles`](Self::find_outlier_cycles)
    pub fn outlier_scores(
        &self,
        subject: &str,
        task: &str,
        features: Option<&[&str]>,
    ) -> Result<Option<OutlierScores>> {
        let features = self.resolve_features(features);
        let scores = self.derived(
            subject,
            task,
            &features,
            QueryKind::OutlierScores,
            OutlierScores::from_cycles,
        )?;
        Ok(scores.map(|s| (*s).clone()))
    }

    /// Indices of cycles whose deviation z-score exceeds `threshold` for
    /// any feature.
    pub fn find_outlier_cycles(&self, subject: &str, task: &str, threshold: f64) -> Result<Vec<usize>> {
        if !threshold.is_finite() {
            return Err(Error::invalid_input(format!(
                "outlier threshold must be finite, got {threshold}"
            )));
        }
        let features = self.resolve_features(None);
        let scores = self.derived(
            subject,
            task,
            &features,
            QueryKind::OutlierScores,
            OutlierScores::from_cycles,
        )?;
        Ok(scores.map(|s| s.outliers(threshold)).unwrap_or_default())
    }

    /// [`find_outlier_cycles`](Self::find_outlier_cycles) at the configured
    /// threshold
    pub fn find_outlier_cycles_default(&self, subject: &str, task: &str) -> Result<Vec<usize>> {
        self.find_outlier_cycles(subject, task, self.config.outliers.threshold)
    }
}

fn labels_or_all(requested: Option<&[&str]>, all: &[String]) -> Vec<String> {
    match requested {
        Some(labels) => labels.iter().map(|l| l.to_string()).collect(),
        None => all.to_vec(),
    }
}
