use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::domain::{EntryFields, EntryId, ExpenseEntry};

use super::{
    DocumentStore, MIGRATION_001_DOCUMENTS, OrderField, Snapshot, SnapshotQuery, Subscription,
};

/// How often subscriptions check for changes committed by other processes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Snapshots buffered per subscription before the feed waits for the reader.
const SNAPSHOT_BUFFER: usize = 16;

/// Document store backed by a SQLite file.
///
/// Several processes may share one database file. Each subscription holds its own
/// connection and re-reads the collection whenever SQLite reports that another
/// connection committed a change.
pub struct SqliteStore {
    pool: SqlitePool,
    revision: watch::Sender<u64>,
    poll_interval: Duration,
}

impl SqliteStore {
    /// Create a new store with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            pool,
            revision,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_DOCUMENTS)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Connect + migrate.
    pub async fn init(database_url: &str) -> Result<Self> {
        let store = Self::connect(database_url).await?;
        store.migrate().await?;
        Ok(store)
    }

    /// Create the database file if needed and initialize it.
    pub async fn create(path: &Path) -> Result<Self> {
        Self::init(&format!("sqlite:{}?mode=rwc", path.display())).await
    }

    /// Open an existing database file.
    pub async fn open(path: &Path) -> Result<Self> {
        anyhow::ensure!(
            path.exists(),
            "Database {} does not exist, run `kakeibo init` first",
            path.display()
        );
        Self::init(&format!("sqlite:{}", path.display())).await
    }

    fn notify_change(&self) {
        self.revision.send_modify(|r| *r = r.wrapping_add(1));
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn subscribe(&self, query: SnapshotQuery) -> Result<Subscription> {
        let conn = self
            .pool
            .acquire()
            .await
            .context("Failed to open a connection for the subscription")?
            .detach();
        let changes = self.revision.subscribe();
        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);

        debug!(collection = %query.collection, "opening subscription");
        let feed = tokio::spawn(feed_snapshots(
            conn,
            query,
            tx,
            changes,
            self.poll_interval,
        ));
        Ok(Subscription::new(rx, feed))
    }

    async fn insert(&self, collection: &str, fields: EntryFields) -> Result<EntryId> {
        let id = Uuid::new_v4();
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let fields_json = serde_json::to_string(&fields).context("Failed to encode entry")?;

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, fields, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(collection)
        .bind(id.to_string())
        .bind(&fields_json)
        .bind(&created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert entry")?;

        debug!(%id, collection, "inserted entry");
        self.notify_change();
        Ok(id)
    }

    async fn delete_by_id(&self, collection: &str, id: EntryId) -> Result<()> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete entry")?;

        debug!(%id, collection, deleted = result.rows_affected(), "deleted entry");
        if result.rows_affected() > 0 {
            self.notify_change();
        }
        Ok(())
    }
}

/// Push a snapshot whenever the database's data version moves, until the
/// subscriber goes away or the store is dropped.
async fn feed_snapshots(
    mut conn: SqliteConnection,
    query: SnapshotQuery,
    tx: mpsc::Sender<Result<Snapshot>>,
    mut changes: watch::Receiver<u64>,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seen_version: Option<i64> = None;

    loop {
        let update = match data_version(&mut conn).await {
            Ok(version) if seen_version == Some(version) => None,
            Ok(version) => {
                seen_version = Some(version);
                Some(fetch_snapshot(&mut conn, &query).await)
            }
            Err(e) => Some(Err(e)),
        };

        if let Some(update) = update {
            if let Err(e) = &update {
                warn!(collection = %query.collection, "failed to read snapshot: {e:#}");
            }
            if tx.send(update).await.is_err() {
                trace!(collection = %query.collection, "subscriber went away");
                return;
            }
        }

        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    trace!(collection = %query.collection, "store dropped, ending subscription");
                    return;
                }
            }
            _ = ticker.tick() => {}
            _ = tx.closed() => {
                trace!(collection = %query.collection, "subscriber went away");
                return;
            }
        }
    }
}

/// SQLite bumps this counter whenever another connection commits.
async fn data_version(conn: &mut SqliteConnection) -> Result<i64> {
    let row = sqlx::query("PRAGMA data_version")
        .fetch_one(&mut *conn)
        .await
        .context("Failed to read data version")?;
    row.try_get::<i64, _>(0).context("Invalid data version")
}

async fn fetch_snapshot(conn: &mut SqliteConnection, query: &SnapshotQuery) -> Result<Snapshot> {
    let order = match query.order_by {
        // Undated documents go last regardless of direction
        OrderField::Date => format!(
            "json_extract(fields, '$.date') IS NULL, json_extract(fields, '$.date') {}, created_at DESC",
            query.direction.as_sql()
        ),
        OrderField::CreatedAt => format!("created_at {}", query.direction.as_sql()),
    };
    let sql = format!(
        "SELECT id, fields, created_at FROM documents WHERE collection = ? ORDER BY {}",
        order
    );

    let rows = sqlx::query(&sql)
        .bind(&query.collection)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list entries")?;

    let entries: Vec<ExpenseEntry> = rows
        .iter()
        .filter_map(|row| {
            row_to_entry(row)
                .inspect_err(|e| {
                    warn!(
                        collection = %query.collection,
                        "skipping undecodable document: {e:#}"
                    )
                })
                .ok()
        })
        .collect();
    trace!(collection = %query.collection, count = entries.len(), "read snapshot");
    Ok(Snapshot::new(entries))
}

fn row_to_entry(row: &SqliteRow) -> Result<ExpenseEntry> {
    let id_str: String = row.get("id");
    let fields_json: String = row.get("fields");
    let created_at_str: String = row.get("created_at");

    Ok(ExpenseEntry {
        id: Uuid::parse_str(&id_str).context("Invalid entry ID")?,
        fields: serde_json::from_str(&fields_json)
            .with_context(|| format!("Invalid fields in entry {}", id_str))?,
        created_at: Some(
            DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        ),
    })
}
