use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{FeedRecord, Filter};
use crate::view::{Freshness, ViewState};

#[derive(Serialize)]
pub struct PageItem {
    pub id: String,
    pub category: &'static str,
    pub title: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl PageItem {
    pub fn from_record(r: &FeedRecord) -> Self {
        Self {
            id: r.id.to_string(),
            category: r.category.as_str(),
            title: r.title.clone(),
            read: r.read,
            created_at: r.created_at,
            link: r.link.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct PageResult {
    pub filter: Filter,
    pub page: u32,
    pub total_pages: u32,
    pub total_count: u64,
    pub freshness: Freshness,
    pub counts: BTreeMap<Filter, u64>,
    pub items: Vec<PageItem>,
}

impl PageResult {
    pub fn from_state(st: &ViewState) -> Self {
        let (total_count, items) = st
            .window
            .as_ref()
            .map(|w| (w.total_count, w.items.iter().map(PageItem::from_record).collect()))
            .unwrap_or_default();
        Self {
            filter: st.filter,
            page: st.page,
            total_pages: st.total_pages.unwrap_or(0),
            total_count,
            freshness: st.freshness,
            counts: st.counts.iter().map(|(f, c)| (*f, c.value)).collect(),
            items,
        }
    }
}
