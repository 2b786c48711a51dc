//! Row lookup per (subject, task) pair.

use std::collections::HashMap;

use gait_core::GaitTable;

/// Rows belonging to one (subject, task) pair, in table order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairRows {
    rows: Vec<usize>,
}

impl PairRows {
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Contiguous `start..end` if the rows form one unbroken block
    pub fn as_range(&self) -> Option<std::ops::Range<usize>> {
        let first = *self.rows.first()?;
        let last = *self.rows.last()?;
        (last - first + 1 == self.rows.len()).then_some(first..last + 1)
    }
}

/// Lookup from labels to pair rows, built in one pass over the table
#[derive(Debug, Clone, Default)]
pub struct CycleIndex {
    subject_codes: HashMap<String, u32>,
    task_codes: HashMap<String, u32>,
    pairs: HashMap<(u32, u32), PairRows>,
}

impl CycleIndex {
    pub fn build(table: &GaitTable) -> Self {
        let subject_codes = table
            .subjects()
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as u32))
            .collect();
        let task_codes = table
            .tasks()
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as u32))
            .collect();

        let mut pairs: HashMap<(u32, u32), PairRows> = HashMap::new();
        for row in 0..table.n_rows() {
            pairs.entry(table.pair_codes(row)).or_default().rows.push(row);
        }

        Self {
            subject_codes,
            task_codes,
            pairs,
        }
    }

    /// Rows for a pair; `None` when either label is unknown or the pair has
    /// no rows.
    pub fn lookup(&self, subject: &str, task: &str) -> Option<&PairRows> {
        let s = self.subject_codes.get(subject)?;
        let t = self.task_codes.get(task)?;
        self.pairs.get(&(*s, *t))
    }

    pub fn contains_subject(&self, subject: &str) -> bool {
        self.subject_codes.contains_key(subject)
    }

    pub fn contains_task(&self, task: &str) -> bool {
        self.task_codes.contains_key(task)
    }

    /// Number of populated (subject, task) pairs
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }
}
