use serde::Serialize;

use crate::source::pg::FeedFingerprint;

#[derive(Serialize)]
pub struct DeletePlan {
    pub action: &'static str,
    pub records: i64,
    pub unread: i64,
}

#[derive(Serialize)]
pub struct MutateResult {
    pub action: &'static str,
    pub records_before: i64,
    pub records_after: i64,
    pub read_before: i64,
    pub read_after: i64,
}

impl MutateResult {
    pub fn new(action: &'static str, before: FeedFingerprint, after: FeedFingerprint) -> Self {
        Self {
            action,
            records_before: before.total,
            records_after: after.total,
            read_before: before.read,
            read_after: after.read,
        }
    }
}
