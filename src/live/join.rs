use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::model::{Entity, EntityId, StatusRecord};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JoinedRow {
    pub entity: Entity,
    pub status: Option<StatusRecord>,
}

impl JoinedRow {
    pub fn is_live(&self) -> bool { self.status.as_ref().is_some_and(|s| s.is_live) }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct JoinedView {
    pub rows: Vec<JoinedRow>,
    pub live_count: usize,
}

/// Streamer registry joined against the live-status feed.
#[derive(Debug, Default)]
pub struct EntityJoinIndex {
    entities: Vec<Entity>,
    statuses: HashMap<EntityId, StatusRecord>,
    view: JoinedView,
    duplicate_statuses: usize,
}

impl EntityJoinIndex {
    pub fn new() -> Self { Self::default() }

    pub fn view(&self) -> &JoinedView { &self.view }

    /// Status rows dropped by the last status update because another row
    /// already claimed the same entity.
    pub fn duplicate_statuses(&self) -> usize { self.duplicate_statuses }

    pub fn set_entities(&mut self, entities: Vec<Entity>) -> &JoinedView {
        self.entities = entities;
        self.recompute();
        &self.view
    }

    pub fn set_statuses(&mut self, statuses: Vec<StatusRecord>) -> &JoinedView {
        let mut by_entity = HashMap::with_capacity(statuses.len());
        let mut duplicates = 0;
        for st in statuses {
            if by_entity.insert(st.entity_id.clone(), st).is_some() {
                duplicates += 1;
            }
        }
        self.statuses = by_entity;
        self.duplicate_statuses = duplicates;
        self.recompute();
        &self.view
    }

    fn recompute(&mut self) {
        let mut live = Vec::new();
        let mut idle = Vec::new();
        for entity in &self.entities {
            let row = JoinedRow { entity: entity.clone(), status: self.statuses.get(&entity.id).cloned() };
            if row.is_live() { live.push(row) } else { idle.push(row) }
        }
        live.sort_by(|a, b| compare_rows(a, b));
        idle.sort_by(|a, b| compare_rows(a, b));

        let live_count = live.len();
        live.extend(idle);
        self.view = JoinedView { rows: live, live_count };
    }
}

fn compare_rows(a: &JoinedRow, b: &JoinedRow) -> Ordering {
    compare_names(&a.entity.display_name, &b.entity.display_name).then_with(|| a.entity.id.cmp(&b.entity.id))
}

/// Display-name order that ignores case and accents: "Émile" sorts with
/// "emile". Ties fall back to the lowercase spelling with accents, then to
/// the exact spelling.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| lowercase(a).cmp(&lowercase(b)))
        .then_with(|| a.cmp(b))
}

fn collation_key(s: &str) -> String {
    s.trim().nfd().filter(|c| !is_combining_mark(*c)).flat_map(char::to_lowercase).collect()
}

fn lowercase(s: &str) -> String {
    s.trim().nfc().flat_map(char::to_lowercase).collect()
}
