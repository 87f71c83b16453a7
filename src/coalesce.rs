use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::record::{SettingId, SettingPatch, SettingRecord};

/// Debounce window shared by added-event batching and write coalescing.
pub(crate) const DEBOUNCE_WINDOW: Duration = Duration::from_millis(70);

/// Trailing-debounce queue that collapses a burst of added records into a
/// single batch. Every push resets the deadline, so the batch is released
/// one window after the burst goes quiet.
#[derive(Debug, Default)]
pub(crate) struct AddBatcher {
    queue: Vec<SettingRecord>,
    deadline: Option<Instant>,
}

impl AddBatcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: SettingRecord, now: Instant) {
        self.queue.push(record);
        self.deadline = Some(now + DEBOUNCE_WINDOW);
    }

    /// Release the batch if its deadline has passed.
    pub(crate) fn flush_due(&mut self, now: Instant) -> Option<Vec<SettingRecord>> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.take(),
            _ => None,
        }
    }

    /// Release the batch regardless of its deadline.
    pub(crate) fn flush(&mut self) -> Option<Vec<SettingRecord>> {
        self.take()
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn clear(&mut self) {
        self.queue.clear();
        self.deadline = None;
    }

    fn take(&mut self) -> Option<Vec<SettingRecord>> {
        self.deadline = None;
        if self.queue.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.queue))
    }
}

#[derive(Debug)]
struct PendingWrite {
    patch: SettingPatch,
    deadline: Instant,
}

/// Per-identifier write coalescer: a re-write for the same identifier
/// supersedes the pending one and resets its deadline, so a rapid edit
/// burst produces one write.
#[derive(Debug, Default)]
pub(crate) struct WriteCoalescer {
    pending: BTreeMap<SettingId, PendingWrite>,
}

impl WriteCoalescer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, patch: SettingPatch, now: Instant) {
        let deadline = now + DEBOUNCE_WINDOW;
        self.pending
            .insert(patch.id.clone(), PendingWrite { patch, deadline });
    }

    /// Drain the writes whose deadline has passed, in identifier order.
    pub(crate) fn flush_due(&mut self, now: Instant) -> Vec<SettingPatch> {
        let due: Vec<SettingId> = self
            .pending
            .iter()
            .filter(|(_, write)| now >= write.deadline)
            .map(|(id, _)| id.clone())
            .collect();

        due.iter()
            .filter_map(|id| self.pending.remove(id))
            .map(|write| write.patch)
            .collect()
    }

    /// Drain every pending write regardless of deadlines.
    pub(crate) fn flush(&mut self) -> Vec<SettingPatch> {
        let pending = std::mem::take(&mut self.pending);
        pending.into_values().map(|write| write.patch).collect()
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|write| write.deadline).min()
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn record(id: &str) -> SettingRecord {
        SettingRecord {
            id: id.into(),
            value: Value::Null,
            package_value: Value::Null,
            editor: None,
            group: String::new(),
            section: String::new(),
            sorter: String::new(),
            i18n_label: String::new(),
            changed: false,
            enable_query: None,
            blocked: false,
        }
    }

    fn patch(id: &str, value: Value) -> SettingPatch {
        SettingPatch {
            id: id.into(),
            value,
            editor: None,
            changed: true,
        }
    }

    #[test]
    fn given_burst_of_pushes_when_window_elapses_then_one_batch_released() {
        let mut batcher = AddBatcher::new();
        let start = Instant::now();
        batcher.push(record("a"), start);
        batcher.push(record("b"), start + Duration::from_millis(30));

        assert!(batcher.flush_due(start + Duration::from_millis(80)).is_none());

        let batch = batcher.flush_due(start + Duration::from_millis(100));
        assert_eq!(
            batch.map(|b| b.len()),
            Some(2),
            "deadline counts from the last push"
        );
    }

    #[test]
    fn given_released_batch_when_flushed_again_then_nothing_remains() {
        let mut batcher = AddBatcher::new();
        let start = Instant::now();
        batcher.push(record("a"), start);

        assert!(batcher.flush().is_some());
        assert!(batcher.flush().is_none());
        assert!(batcher.next_deadline().is_none());
    }

    #[test]
    fn given_rewrite_for_same_id_when_drained_then_last_write_wins() {
        let mut coalescer = WriteCoalescer::new();
        let start = Instant::now();
        coalescer.push(patch("a", json!(1)), start);
        coalescer.push(patch("a", json!(2)), start + Duration::from_millis(30));

        let early = coalescer.flush_due(start + Duration::from_millis(80));
        assert!(early.is_empty(), "rewrite resets the deadline");

        let due = coalescer.flush_due(start + Duration::from_millis(100));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].value, json!(2));
    }

    #[test]
    fn given_writes_for_distinct_ids_then_deadlines_are_independent() {
        let mut coalescer = WriteCoalescer::new();
        let start = Instant::now();
        coalescer.push(patch("a", json!(1)), start);
        coalescer.push(patch("b", json!(2)), start + Duration::from_millis(50));

        let first = coalescer.flush_due(start + Duration::from_millis(80));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, "a");

        let second = coalescer.flush_due(start + Duration::from_millis(130));
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, "b");
    }

    #[test]
    fn given_pending_writes_when_next_deadline_then_earliest_wins() {
        let mut coalescer = WriteCoalescer::new();
        let start = Instant::now();
        coalescer.push(patch("b", json!(2)), start + Duration::from_millis(20));
        coalescer.push(patch("a", json!(1)), start);

        assert_eq!(
            coalescer.next_deadline(),
            Some(start + DEBOUNCE_WINDOW)
        );
    }
}
