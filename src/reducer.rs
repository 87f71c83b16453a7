use std::collections::HashMap;

use crate::record::{SettingId, SettingPatch, SettingRecord, compare_settings};

/// State transitions applied to an ordered settings collection.
#[derive(Debug, Clone)]
pub(crate) enum StateAction {
    /// Merge a batch of new records and re-sort.
    Add(Vec<SettingRecord>),
    /// Replace the record with the matching identifier.
    Change(SettingRecord),
    /// Delete the record with the matching identifier.
    Remove(SettingId),
    /// Patch existing records by identifier.
    Hydrate(Vec<SettingPatch>),
}

/// Reduce an action into the collection.
///
/// `Change` and `Hydrate` entries whose identifier is absent are no-ops;
/// a removed record is never resurrected.
pub(crate) fn reduce(state: &mut Vec<SettingRecord>, action: &StateAction) {
    match action {
        StateAction::Add(batch) => {
            state.extend(batch.iter().cloned());
            state.sort_by(compare_settings);
        },
        StateAction::Change(record) => {
            if let Some(slot) = state.iter_mut().find(|s| s.id == record.id) {
                *slot = record.clone();
            }
        },
        StateAction::Remove(id) => {
            state.retain(|setting| &setting.id != id);
        },
        StateAction::Hydrate(patches) => {
            let by_id: HashMap<&SettingId, &SettingPatch> =
                patches.iter().map(|patch| (&patch.id, patch)).collect();
            for record in state.iter_mut() {
                if let Some(patch) = by_id.get(&record.id) {
                    record.apply_patch(patch);
                }
            }
        },
    }
}
