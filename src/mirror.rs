use std::collections::BTreeMap;

use serde_json::Value;

use crate::record::{SettingId, SettingPatch, SettingRecord};

/// Local read-accessible mirror of the source collection.
///
/// Holds one record per identifier and answers synchronous lookups, most
/// notably the flat-field [`find_one`](MirrorStore::find_one) match used
/// for enable-condition evaluation. One instance per store; views never
/// write to it directly.
#[derive(Debug, Default)]
pub struct MirrorStore {
    records: BTreeMap<SettingId, SettingRecord>,
}

impl MirrorStore {
    /// Create an empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn insert(&mut self, record: SettingRecord) {
        self.records.insert(record.id.clone(), record);
    }

    /// Replace the record with the same identifier; no-op if absent.
    pub fn update(&mut self, record: SettingRecord) {
        if self.records.contains_key(&record.id) {
            self.records.insert(record.id.clone(), record);
        }
    }

    /// Apply a partial write to the record with the patch's identifier;
    /// no-op if absent.
    pub fn update_fields(&mut self, patch: &SettingPatch) {
        if let Some(record) = self.records.get_mut(&patch.id) {
            record.apply_patch(patch);
        }
    }

    /// Remove the record with the given identifier.
    pub fn remove(&mut self, id: &str) {
        self.records.remove(id);
    }

    /// Look up a record by identifier.
    pub fn get(&self, id: &str) -> Option<&SettingRecord> {
        self.records.get(id)
    }

    /// Return the first record (in identifier order) whose top-level
    /// fields equal every pair in the query object. A non-object query
    /// matches nothing.
    pub fn find_one(&self, query: &Value) -> Option<&SettingRecord> {
        let Value::Object(fields) = query else {
            return None;
        };

        self.records.values().find(|record| {
            fields
                .iter()
                .all(|(name, expected)| record.field(name).as_ref() == Some(expected))
        })
    }

    /// Number of mirrored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the mirror holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
