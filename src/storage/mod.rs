mod sqlite;

pub use sqlite::*;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{EntryFields, EntryId, ExpenseEntry};

/// SQL migration for the document table
pub const MIGRATION_001_DOCUMENTS: &str = include_str!("migrations/001_documents.sql");

/// Default collection that holds expense entries.
pub const DEFAULT_COLLECTION: &str = "kakeibo";

/// Field a live query is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Date,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

/// A live query: one collection, one ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotQuery {
    pub collection: String,
    pub order_by: OrderField,
    pub direction: Direction,
}

impl SnapshotQuery {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            order_by: OrderField::Date,
            direction: Direction::Descending,
        }
    }

    pub fn order_by(mut self, field: OrderField, direction: Direction) -> Self {
        self.order_by = field;
        self.direction = direction;
        self
    }
}

/// A full point-in-time view of a live query's result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub entries: Vec<ExpenseEntry>,
    pub read_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(entries: Vec<ExpenseEntry>) -> Self {
        Self {
            entries,
            read_at: Utc::now(),
        }
    }
}

/// A stream of snapshots for one live query.
///
/// The subscription owns the task feeding it; dropping the subscription stops
/// the feed.
pub struct Subscription {
    snapshots: mpsc::Receiver<Result<Snapshot>>,
    feed: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a channel fed by a background task.
    pub fn new(snapshots: mpsc::Receiver<Result<Snapshot>>, feed: JoinHandle<()>) -> Self {
        Self {
            snapshots,
            feed: Some(feed),
        }
    }

    /// Wrap a channel whose sender is owned elsewhere.
    pub fn from_receiver(snapshots: mpsc::Receiver<Result<Snapshot>>) -> Self {
        Self {
            snapshots,
            feed: None,
        }
    }

    /// Wait for the next snapshot. `None` means the store closed the stream.
    pub async fn next(&mut self) -> Option<Result<Snapshot>> {
        self.snapshots.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
    }
}

/// The document store the ledger reads from and writes to.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Open a live query. The subscription yields an initial snapshot and then a
    /// fresh full snapshot after every committed change.
    async fn subscribe(&self, query: SnapshotQuery) -> Result<Subscription>;

    /// Insert a new document. The store assigns the id and the creation timestamp.
    async fn insert(&self, collection: &str, fields: EntryFields) -> Result<EntryId>;

    /// Delete a document by id. Deleting an unknown id is not an error.
    async fn delete_by_id(&self, collection: &str, id: EntryId) -> Result<()>;
}
