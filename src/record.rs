use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Unique key of a setting within the collection.
pub type SettingId = String;

/// A single configurable key/value with its grouping and dirty metadata.
///
/// Field names follow the wire shape delivered by the settings source
/// (`_id`, `packageValue`, `enableQuery`, `i18nLabel`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingRecord {
    /// Unique identifier.
    #[serde(rename = "_id")]
    pub id: SettingId,
    /// Current value, possibly user-edited.
    #[serde(default)]
    pub value: Value,
    /// Shipped default value.
    #[serde(default)]
    pub package_value: Value,
    /// Editor/type descriptor for the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,
    /// Top-level namespace the setting belongs to.
    #[serde(default)]
    pub group: String,
    /// Named subset within the group; empty means the unnamed default
    /// subset.
    #[serde(default)]
    pub section: String,
    /// Ordering key within the section.
    #[serde(default)]
    pub sorter: String,
    /// Display label.
    #[serde(default)]
    pub i18n_label: String,
    /// Whether the current value differs from the persisted baseline.
    #[serde(default)]
    pub changed: bool,
    /// Condition that must hold for the setting to be editable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_query: Option<EnableQuery>,
    /// Hard-disabled regardless of any enable condition.
    #[serde(default)]
    pub blocked: bool,
}

impl SettingRecord {
    /// Apply a hydrate patch in place.
    pub fn apply_patch(&mut self, patch: &SettingPatch) {
        self.value = patch.value.clone();
        if let Some(editor) = &patch.editor {
            self.editor = Some(editor.clone());
        }
        self.changed = patch.changed;
    }

    /// Project a top-level field into its JSON form, for query matching.
    pub(crate) fn field(&self, name: &str) -> Option<Value> {
        match name {
            "_id" => Some(Value::String(self.id.clone())),
            "value" => Some(self.value.clone()),
            "packageValue" => Some(self.package_value.clone()),
            "editor" => self.editor.clone().map(Value::String),
            "group" => Some(Value::String(self.group.clone())),
            "section" => Some(Value::String(self.section.clone())),
            "sorter" => Some(Value::String(self.sorter.clone())),
            "i18nLabel" => Some(Value::String(self.i18n_label.clone())),
            "changed" => Some(Value::Bool(self.changed)),
            "blocked" => Some(Value::Bool(self.blocked)),
            _ => None,
        }
    }
}

/// Enable-condition descriptor: a single query, a list of queries, or a
/// JSON-encoded string of either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnableQuery {
    /// JSON-encoded query or query list.
    Raw(String),
    /// List of queries; every one must match.
    Many(Vec<Value>),
    /// Single query object.
    One(Value),
}

impl EnableQuery {
    /// Normalize into a flat list of query objects.
    ///
    /// A raw string is parsed first; parse failures propagate to the
    /// caller.
    pub fn queries(&self) -> Result<Vec<Value>> {
        let parsed = match self {
            EnableQuery::Raw(raw) => serde_json::from_str::<Value>(raw)?,
            EnableQuery::Many(queries) => return Ok(queries.clone()),
            EnableQuery::One(query) => return Ok(vec![query.clone()]),
        };

        match parsed {
            Value::Array(queries) => Ok(queries),
            query => Ok(vec![query]),
        }
    }
}

/// Hydrate change: the fields written back onto a live record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingPatch {
    /// Identifier of the record being patched.
    #[serde(rename = "_id")]
    pub id: SettingId,
    /// New current value.
    pub value: Value,
    /// Editor descriptor carried along with the write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,
    /// Dirty flag recomputed by the caller for the new value.
    #[serde(default)]
    pub changed: bool,
}

/// Collection ordering: (section, sorter, label), each compared
/// lexicographically with the empty string sorting first.
pub(crate) fn compare_settings(a: &SettingRecord, b: &SettingRecord) -> Ordering {
    a.section
        .cmp(&b.section)
        .then_with(|| a.sorter.cmp(&b.sorter))
        .then_with(|| a.i18n_label.cmp(&b.i18n_label))
}
