//! Filtered views. Each filter builds a fresh engine over the matching rows
//! with re-derived labels and an empty cache; the parent is untouched.

use crate::engine::GaitEngine;

impl GaitEngine {
    /// Engine restricted to rows whose subject is in `subset`
    pub fn filter_subjects(&self, subset: &[&str]) -> GaitEngine {
        tracing::debug!(?subset, "Filtering subjects");
        self.filter_rows(|row| subset.contains(&self.table.subject_at(row)))
    }

    /// Engine restricted to rows whose task is in `subset`
    pub fn filter_tasks(&self, subset: &[&str]) -> GaitEngine {
        tracing::debug!(?subset, "Filtering tasks");
        self.filter_rows(|row| subset.contains(&self.table.task_at(row)))
    }

    /// Engine keeping only the known features in `subset`
    pub fn filter_features(&self, subset: &[&str]) -> GaitEngine {
        let keep = self.resolve_features(Some(subset));
        GaitEngine::from_table(self.table.select_features(&keep), self.config.clone())
    }

    fn filter_rows<P>(&self, keep: P) -> GaitEngine
    where
        P: Fn(usize) -> bool,
    {
        let rows: Vec<usize> = (0..self.table.n_rows()).filter(|&r| keep(r)).collect();
        GaitEngine::from_table(self.table.select_rows(&rows), self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::GaitEngine;
    use gait_core::RawTable;

    fn engine() -> GaitEngine {
        let mut builder = RawTable::builder(["hip_flexion_angle_ipsi_rad", "knee_flexion_angle_ipsi_rad"]);
        for (s, t) in [("SUB02", "run"), ("SUB01", "walk"), ("SUB02", "walk"), ("SUB03", "run")] {
            for p in 0..150 {
                let v = p as f64 / 150.0;
                builder.push_row(s, t, p as f64, &[v, -v]).unwrap();
            }
        }
        GaitEngine::new(builder.build()).unwrap()
    }

    #[test]
    fn test_filter_subjects_rederives_labels() {
        let filtered = engine().filter_subjects(&["SUB02"]);
        assert_eq!(filtered.subjects(), ["SUB02"]);
        assert_eq!(filtered.tasks(), ["run", "walk"]);
        assert_eq!(filtered.row_count(), 300);
        assert_eq!(filtered.cache_stats().entries, 0);
    }

    #[test]
    fn test_filter_leaves_parent_untouched() {
        let parent = engine();
        parent.get_cycles("SUB01", "walk", None).unwrap();
        let entries = parent.cache_stats().entries;

        let child = parent.filter_tasks(&["run"]);
        assert!(!child.has_data("SUB01", "walk"));
        assert_eq!(child.cache_stats().entries, 0);
        assert_eq!(parent.cache_stats().entries, entries);
        assert_eq!(parent.subjects().len(), 3);
    }

    #[test]
    fn test_filters_compose() {
        let engine = engine();
        let a = engine.filter_subjects(&["SUB02", "SUB03"]).filter_tasks(&["run"]);
        let b = engine.filter_tasks(&["run"]).filter_subjects(&["SUB02", "SUB03"]);
        assert_eq!(a.subjects(), b.subjects());
        assert_eq!(a.tasks(), b.tasks());
        assert_eq!(a.features(), b.features());
        for s in a.subjects() {
            assert_eq!(
                a.get_cycles(s, "run", None).unwrap(),
                b.get_cycles(s, "run", None).unwrap()
            );
        }
    }

    #[test]
    fn test_filter_features() {
        let engine = engine();
        let knee = engine.filter_features(&["knee_flexion_angle_ipsi_rad", "ankle"]);
        assert_eq!(knee.features(), ["knee_flexion_angle_ipsi_rad"]);
        assert_eq!(knee.subjects(), engine.subjects());
        let cycles = knee.get_cycles("SUB01", "walk", None).unwrap().unwrap();
        assert_eq!(cycles.shape(), (1, 150, 1));
    }

    #[test]
    fn test_empty_filter_yields_empty_engine() {
        let empty = engine().filter_subjects(&["NOBODY"]);
        assert_eq!(empty.row_count(), 0);
        assert!(empty.subjects().is_empty());
        assert!(empty.get_cycles("SUB01", "walk", None).unwrap().is_none());
    }
}
