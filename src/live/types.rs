use serde::Serialize;

use super::join::JoinedRow;

#[derive(Serialize)]
pub struct LiveRow {
    pub id: String,
    pub display_name: String,
    pub active: bool,
    pub is_live: bool,
    pub title: Option<String>,
    pub link: Option<String>,
}

impl LiveRow {
    pub fn from_row(row: &JoinedRow) -> Self {
        Self {
            id: row.entity.id.to_string(),
            display_name: row.entity.display_name.clone(),
            active: row.entity.active,
            is_live: row.is_live(),
            title: row.status.as_ref().and_then(|s| s.title.clone()),
            link: row.status.as_ref().and_then(|s| s.link.clone()),
        }
    }
}

#[derive(Serialize)]
pub struct LiveResult {
    pub live_count: usize,
    pub rows: Vec<LiveRow>,
}
