use chrono::{Duration, TimeZone, Utc};

use crate::model::{Category, Entity, EntityId, FeedId, FeedRecord, StatusRecord};

pub fn rec(id: &str, category: Category) -> FeedRecord {
    FeedRecord {
        id: FeedId::new(id),
        category,
        title: format!("title {id}"),
        body: None,
        link: None,
        avatar: None,
        read: false,
        created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    }
}

/// `n` records, most recent first, cycling through the categories.
pub fn records(prefix: &str, n: usize) -> Vec<FeedRecord> {
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let mut r = rec(&format!("{prefix}{i}"), Category::ALL[i % Category::ALL.len()]);
            r.created_at = base - Duration::minutes(i as i64);
            r
        })
        .collect()
}

pub fn entity(id: &str, name: &str, active: bool) -> Entity {
    Entity { id: EntityId::new(id), display_name: name.to_string(), active, platform_ids: Default::default() }
}

pub fn status(id: &str, is_live: bool) -> StatusRecord {
    StatusRecord { entity_id: EntityId::new(id), is_live, title: None, link: None }
}
