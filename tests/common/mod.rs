// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use kakeibo::application::{AddOutcome, LedgerSettings, LedgerViewModel};
use kakeibo::domain::{Category, EntryId};
use kakeibo::storage::SqliteStore;
use tempfile::TempDir;

/// Long enough that only local change notifications drive snapshots.
pub const QUIET_POLL: Duration = Duration::from_secs(60);

/// Upper bound for waiting on a snapshot before failing the test.
pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

/// Helper to create a test store with a temporary database
pub async fn test_store() -> Result<(Arc<SqliteStore>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let store = SqliteStore::create(&temp_dir.path().join("test.db"))
        .await?
        .with_poll_interval(QUIET_POLL);
    Ok((Arc::new(store), temp_dir))
}

/// Helper to build an active ledger that has received its first snapshot
pub async fn test_ledger(store: Arc<SqliteStore>) -> Result<LedgerViewModel> {
    let mut ledger = LedgerViewModel::new(store, LedgerSettings::default());
    ledger.activate().await?;
    next_snapshot(&mut ledger).await?;
    Ok(ledger)
}

/// Wait for the next snapshot, failing instead of hanging when none arrives
pub async fn next_snapshot(ledger: &mut LedgerViewModel) -> Result<()> {
    let delivered = tokio::time::timeout(SNAPSHOT_TIMEOUT, ledger.next_snapshot())
        .await
        .context("Timed out waiting for a snapshot")??;
    anyhow::ensure!(delivered, "Subscription closed unexpectedly");
    Ok(())
}

/// Fill the form, add, and wait for the store to echo the change back
pub async fn add_entry(
    ledger: &mut LedgerViewModel,
    amount: &str,
    category: Category,
    date: &str,
    memo: &str,
) -> Result<EntryId> {
    let form = ledger.form_mut();
    form.amount = amount.to_string();
    form.category = category;
    form.date = date.to_string();
    form.memo = memo.to_string();

    match ledger.add().await? {
        AddOutcome::Added(id) => {
            next_snapshot(ledger).await?;
            Ok(id)
        }
        AddOutcome::Skipped => anyhow::bail!("add was skipped"),
    }
}
