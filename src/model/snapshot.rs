use std::collections::{HashMap, HashSet};

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::types::{Entity, FeedRecord, Filter, StatusRecord};

/// Full, ordered materialization of the notification collection as pushed by
/// the source. Records are most recent first; the order is taken as given.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    records: Vec<FeedRecord>,
}

#[derive(Debug)]
pub enum SnapshotError {
    NotAnArray,
    Decode { index: usize, source: serde_json::Error },
    EmptyId { index: usize },
    DuplicateId { id: String },
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::NotAnArray => write!(f, "snapshot payload is not an array"),
            SnapshotError::Decode { index, source } => write!(f, "record #{index}: {source}"),
            SnapshotError::EmptyId { index } => write!(f, "record #{index} has an empty id"),
            SnapshotError::DuplicateId { id } => write!(f, "duplicate record id {id}"),
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotError::Decode { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Snapshot {
    pub fn from_value(value: Value) -> Result<Self, SnapshotError> {
        let records = decode_array::<FeedRecord>(value)?;
        Self::from_records(records)
    }

    pub fn from_records(records: Vec<FeedRecord>) -> Result<Self, SnapshotError> {
        let mut seen = HashSet::with_capacity(records.len());
        for (index, rec) in records.iter().enumerate() {
            if rec.id.as_str().trim().is_empty() {
                return Err(SnapshotError::EmptyId { index });
            }
            if !seen.insert(rec.id.as_str()) {
                return Err(SnapshotError::DuplicateId { id: rec.id.to_string() });
            }
        }
        Ok(Snapshot { records })
    }

    pub fn record_count(&self) -> usize { self.records.len() }

    pub fn count(&self, filter: Filter) -> u64 {
        self.records.iter().filter(|r| filter.matches(r)).count() as u64
    }

    pub fn unread(&self) -> u64 {
        self.records.iter().filter(|r| !r.read).count() as u64
    }
}

pub fn decode_statuses(value: Value) -> Result<Vec<StatusRecord>, SnapshotError> {
    let statuses = decode_array::<StatusRecord>(value)?;
    let mut seen = HashMap::with_capacity(statuses.len());
    for (index, st) in statuses.iter().enumerate() {
        if st.entity_id.0.trim().is_empty() {
            return Err(SnapshotError::EmptyId { index });
        }
        if seen.insert(st.entity_id.0.as_str(), index).is_some() {
            return Err(SnapshotError::DuplicateId { id: st.entity_id.to_string() });
        }
    }
    Ok(statuses)
}

pub fn decode_entities(value: Value) -> Result<Vec<Entity>, SnapshotError> {
    let entities = decode_array::<Entity>(value)?;
    for (index, e) in entities.iter().enumerate() {
        if e.id.0.trim().is_empty() {
            return Err(SnapshotError::EmptyId { index });
        }
    }
    Ok(entities)
}

fn decode_array<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, SnapshotError> {
    let Value::Array(items) = value else { return Err(SnapshotError::NotAnArray) };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| serde_json::from_value(item).map_err(|source| SnapshotError::Decode { index, source }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::Category;
    use serde_json::json;

    fn record(id: &str, category: &str) -> Value {
        json!({
            "id": id,
            "category": category,
            "title": format!("title {id}"),
            "read": false,
            "created_at": "2026-01-02T03:04:05Z",
        })
    }

    #[test]
    fn accepts_well_formed_snapshot() {
        let snap = Snapshot::from_value(json!([record("a", "live"), record("b", "video")])).unwrap();
        assert_eq!(snap.record_count(), 2);
        assert_eq!(snap.count(Filter::Only(Category::Video)), 1);
        assert_eq!(snap.count(Filter::All), 2);
        assert_eq!(snap.unread(), 2);
    }

    #[test]
    fn rejects_unknown_category() {
        let err = Snapshot::from_value(json!([record("a", "live"), record("b", "clip")])).unwrap_err();
        assert!(matches!(err, SnapshotError::Decode { index: 1, .. }));
    }

    #[test]
    fn rejects_duplicate_ids_and_non_arrays() {
        let err = Snapshot::from_value(json!([record("a", "live"), record("a", "post")])).unwrap_err();
        assert!(matches!(err, SnapshotError::DuplicateId { .. }));
        let err = Snapshot::from_value(json!({"records": []})).unwrap_err();
        assert!(matches!(err, SnapshotError::NotAnArray));
    }

    #[test]
    fn blank_title_is_not_malformed() {
        let mut blank = record("b", "post");
        blank["title"] = json!("");
        let snap = Snapshot::from_value(json!([record("a", "live"), blank])).unwrap();
        assert_eq!(snap.record_count(), 2);
        assert_eq!(snap.count(Filter::Only(Category::Post)), 1);
    }

    #[test]
    fn rejects_blank_id() {
        let err = Snapshot::from_value(json!([record("a", "live"), record(" ", "post")])).unwrap_err();
        assert!(matches!(err, SnapshotError::EmptyId { index: 1 }));
    }

    #[test]
    fn statuses_allow_one_per_entity() {
        let ok = decode_statuses(json!([{ "entity_id": "x", "is_live": true }])).unwrap();
        assert_eq!(ok.len(), 1);
        let dup = decode_statuses(json!([
            { "entity_id": "x", "is_live": true },
            { "entity_id": "x", "is_live": false }
        ]));
        assert!(matches!(dup, Err(SnapshotError::DuplicateId { .. })));
    }
}
