//! Aggregated outcome of a fleet-wide operation.

use serde::Serialize;

/// Outcome of one instance inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "lowercase")]
pub enum BatchOutcome {
    Success,
    Failed(String),
    /// Not attempted; the reason says why (e.g. already running).
    Skipped(String),
}

/// Per-instance entry of a [`BatchResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntry {
    pub instance_name: String,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

impl BatchEntry {
    #[must_use]
    pub fn success(&self) -> bool {
        self.outcome == BatchOutcome::Success
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            BatchOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Immutable result of `launch_all` / `stop_all`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    entries: Vec<BatchEntry>,
    success_count: usize,
    fail_count: usize,
    skipped_count: usize,
}

impl BatchResult {
    /// Build a result, deriving the aggregate counts from the entries.
    #[must_use]
    pub fn from_entries(entries: Vec<BatchEntry>) -> Self {
        let mut result = Self {
            entries,
            ..Self::default()
        };
        for entry in &result.entries {
            match entry.outcome {
                BatchOutcome::Success => result.success_count += 1,
                BatchOutcome::Failed(_) => result.fail_count += 1,
                BatchOutcome::Skipped(_) => result.skipped_count += 1,
            }
        }
        result
    }

    #[must_use]
    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.success_count
    }

    #[must_use]
    pub fn fail_count(&self) -> usize {
        self.fail_count
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped_count
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.fail_count == 0
    }
}

/// Split `items` into consecutive groups of at most `size` (minimum 1).
#[must_use]
pub fn partition<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}
