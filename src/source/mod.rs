use async_trait::async_trait;

use crate::model::{Category, Entity, FeedId, FeedRecord, StatusRecord};

pub mod bus;
#[cfg(test)]
pub mod memory;
pub mod pg;
pub mod poller;

pub use bus::{PushBus, PushEvent, Subscription, Topic};
#[cfg(test)]
pub use memory::MemorySource;
pub use pg::PgSource;

/// Pull side of the external collection owner.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_page(&self, category: Option<Category>, limit: u32, offset: u64) -> Result<Vec<FeedRecord>, SourceError>;
    async fn fetch_count(&self, category: Option<Category>) -> Result<u64, SourceError>;
    async fn mark_read(&self, id: &FeedId) -> Result<(), SourceError>;
    async fn mark_all_read(&self) -> Result<(), SourceError>;
    async fn delete_all(&self) -> Result<(), SourceError>;
    async fn fetch_entities(&self) -> Result<Vec<Entity>, SourceError>;
    async fn fetch_statuses(&self) -> Result<Vec<StatusRecord>, SourceError>;
}

#[derive(Debug)]
pub enum SourceError {
    Database(sqlx::Error),
    Decode(String),
    /// Connection-level failure: pool exhausted or closed, socket error.
    Unavailable(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Database(err) => write!(f, "database error: {err}"),
            SourceError::Decode(msg) => write!(f, "decode error: {msg}"),
            SourceError::Unavailable(msg) => write!(f, "source unavailable: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Database(err) => Some(err),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for SourceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                SourceError::Unavailable(err.to_string())
            }
            other => SourceError::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_and_io_failures_map_to_unavailable() {
        assert!(matches!(SourceError::from(sqlx::Error::PoolTimedOut), SourceError::Unavailable(_)));
        assert!(matches!(SourceError::from(sqlx::Error::PoolClosed), SourceError::Unavailable(_)));
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(SourceError::from(sqlx::Error::Io(io)), SourceError::Unavailable(_)));
        assert!(matches!(SourceError::from(sqlx::Error::RowNotFound), SourceError::Database(_)));
    }
}
