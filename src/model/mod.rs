pub mod snapshot;
pub mod types;

pub use snapshot::{decode_entities, decode_statuses, Snapshot, SnapshotError};
pub use types::{Category, Entity, EntityId, FeedId, FeedRecord, Filter, StatusRecord};
