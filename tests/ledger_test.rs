mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use common::*;
use kakeibo::application::{AddOutcome, AppError, DeleteOutcome, LedgerSettings, LedgerViewModel};
use kakeibo::domain::{Amount, Category, EntryFields, MAX_AMOUNT, NO_DATE};
use kakeibo::storage::{DEFAULT_COLLECTION, DocumentStore, SqliteStore};

#[tokio::test]
async fn test_add_entries_arrive_newest_first() -> Result<()> {
    let (store, _temp_dir) = test_store().await?;
    let mut ledger = test_ledger(store).await?;
    assert!(ledger.entries().is_empty());

    add_entry(&mut ledger, "1200", Category::Food, "2024-05-01", "veg").await?;
    add_entry(&mut ledger, "800", Category::DailyGoods, "2024-05-03", "").await?;
    add_entry(&mut ledger, "3,000", Category::DiningOut, "2024-05-02", "lunch").await?;

    let dates: Vec<&str> = ledger.entries().iter().map(|e| e.date_key()).collect();
    assert_eq!(dates, vec!["2024-05-03", "2024-05-02", "2024-05-01"]);

    let summary = ledger.summary();
    assert_eq!(summary.total, 5_000);
    assert_eq!(summary.remaining, 85_000);
    assert!(!summary.is_over_budget());

    Ok(())
}

#[tokio::test]
async fn test_add_clears_amount_and_memo_only() -> Result<()> {
    let (store, _temp_dir) = test_store().await?;
    let mut ledger = test_ledger(store).await?;

    add_entry(&mut ledger, "450", Category::Utilities, "2024-06-10", "water").await?;

    let form = ledger.form();
    assert!(form.amount.is_empty());
    assert!(form.memo.is_empty());
    assert_eq!(form.category, Category::Utilities);
    assert_eq!(form.date, "2024-06-10");

    let entry = &ledger.entries()[0];
    assert_eq!(entry.amount(), 450);
    assert_eq!(entry.memo(), Some("water"));

    Ok(())
}

#[tokio::test]
async fn test_add_with_empty_amount_stores_nothing() -> Result<()> {
    let (store, _temp_dir) = test_store().await?;
    let mut ledger = test_ledger(store.clone()).await?;

    ledger.form_mut().amount = "   ".to_string();
    ledger.form_mut().memo = "kept".to_string();
    assert_eq!(ledger.add().await?, AddOutcome::Skipped);
    assert_eq!(ledger.form().memo, "kept");

    // A fresh session reads the store directly.
    let other = test_ledger(store).await?;
    assert!(other.entries().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_add_invalid_amount_keeps_inputs() -> Result<()> {
    let (store, _temp_dir) = test_store().await?;
    let mut ledger = test_ledger(store.clone()).await?;

    ledger.form_mut().amount = "12a".to_string();
    ledger.form_mut().memo = "typo".to_string();
    let result = ledger.add().await;
    assert!(matches!(result, Err(AppError::InvalidAmount { .. })));
    assert_eq!(ledger.form().amount, "12a");
    assert_eq!(ledger.form().memo, "typo");

    let other = test_ledger(store).await?;
    assert!(other.entries().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_delete_requires_confirmation() -> Result<()> {
    let (store, _temp_dir) = test_store().await?;
    let mut ledger = test_ledger(store).await?;

    let id = add_entry(&mut ledger, "2000", Category::Other, "2024-07-01", "").await?;

    let outcome = ledger.delete(id, &|_: &str| false).await?;
    assert_eq!(outcome, DeleteOutcome::Declined);
    assert!(ledger.entry(id).is_some());

    let outcome = ledger.delete(id, &|_: &str| true).await?;
    assert_eq!(outcome, DeleteOutcome::Deleted);
    // Still shown until the store reports the removal.
    assert!(ledger.entry(id).is_some());

    next_snapshot(&mut ledger).await?;
    assert!(ledger.entry(id).is_none());
    assert_eq!(ledger.summary().total, 0);

    Ok(())
}

#[tokio::test]
async fn test_delete_prompt_describes_entry() -> Result<()> {
    let (store, _temp_dir) = test_store().await?;
    let mut ledger = test_ledger(store).await?;

    let id = add_entry(&mut ledger, "12345", Category::Food, "2024-07-02", "").await?;

    let seen = std::sync::Mutex::new(String::new());
    let confirm = |prompt: &str| {
        *seen.lock().unwrap() = prompt.to_string();
        false
    };
    ledger.delete(id, &confirm).await?;

    let prompt = seen.lock().unwrap().clone();
    assert!(prompt.starts_with("Delete this entry?"));
    assert!(prompt.contains("2024-07-02"));
    assert!(prompt.contains("12,345"));

    Ok(())
}

#[tokio::test]
async fn test_sessions_sharing_a_store_see_each_other() -> Result<()> {
    let (store, _temp_dir) = test_store().await?;
    let mut first = test_ledger(store.clone()).await?;
    let mut second = test_ledger(store).await?;

    let id = add_entry(&mut first, "700", Category::Food, "2024-08-01", "").await?;
    next_snapshot(&mut second).await?;
    assert_eq!(second.entries().len(), 1);
    assert_eq!(second.entries()[0].id, id);

    second.delete(id, &|_: &str| true).await?;
    next_snapshot(&mut first).await?;
    assert!(first.entries().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_separate_connections_sync_by_polling() -> Result<()> {
    let (store, temp_dir) = test_store().await?;
    let mut writer = test_ledger(store).await?;

    // Opened independently, so only the data version check can notice writes.
    let reader_store = SqliteStore::open(&temp_dir.path().join("test.db"))
        .await?
        .with_poll_interval(Duration::from_millis(50));
    let mut reader = test_ledger(Arc::new(reader_store)).await?;

    add_entry(&mut writer, "1500", Category::DiningOut, "2024-09-01", "").await?;
    next_snapshot(&mut reader).await?;

    assert_eq!(reader.entries().len(), 1);
    assert_eq!(reader.summary().total, 1_500);

    Ok(())
}

#[tokio::test]
async fn test_grouping_over_live_entries() -> Result<()> {
    let (store, _temp_dir) = test_store().await?;
    let mut ledger = test_ledger(store).await?;

    add_entry(&mut ledger, "100", Category::Food, "2024-05-01", "").await?;
    add_entry(&mut ledger, "200", Category::Food, "", "undated").await?;
    add_entry(&mut ledger, "300", Category::DailyGoods, "2024-05-02", "").await?;
    add_entry(&mut ledger, "400", Category::Food, "2024-05-01", "").await?;

    let groups = ledger.date_groups();
    let keys: Vec<&str> = groups.iter().map(|g| g.key).collect();
    assert_eq!(keys, vec!["2024-05-02", "2024-05-01", NO_DATE]);
    assert_eq!(groups[1].entries.len(), 2);
    assert_eq!(groups[1].total(), 500);
    assert_eq!(groups[2].entries[0].memo(), Some("undated"));

    let categories = ledger.category_totals();
    let names: Vec<Category> = categories.iter().map(|c| c.category).collect();
    assert_eq!(names, vec![Category::DailyGoods, Category::Food]);
    assert_eq!(categories[1].total, 700);

    Ok(())
}

#[tokio::test]
async fn test_over_budget_goes_negative() -> Result<()> {
    let (store, _temp_dir) = test_store().await?;
    let mut ledger = test_ledger(store).await?;

    add_entry(&mut ledger, "95000", Category::Utilities, "2024-10-01", "").await?;

    let summary = ledger.summary();
    assert_eq!(summary.remaining, -5_000);
    assert!(summary.is_over_budget());

    Ok(())
}

#[tokio::test]
async fn test_collections_are_isolated() -> Result<()> {
    let (store, _temp_dir) = test_store().await?;
    let mut home = test_ledger(store.clone()).await?;

    let settings = LedgerSettings {
        collection: "office".to_string(),
        ..LedgerSettings::default()
    };
    let mut office = LedgerViewModel::new(store, settings);
    office.activate().await?;
    next_snapshot(&mut office).await?;

    add_entry(&mut home, "999", Category::Food, "2024-11-01", "").await?;
    assert_eq!(home.entries().len(), 1);

    // The write wakes every subscriber, but the office view stays empty.
    next_snapshot(&mut office).await?;
    assert!(office.entries().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_deactivate_stops_updates() -> Result<()> {
    let (store, _temp_dir) = test_store().await?;
    let mut ledger = test_ledger(store).await?;

    ledger.deactivate();
    assert!(!ledger.is_active());
    assert!(matches!(
        ledger.next_snapshot().await,
        Err(AppError::NotSubscribed)
    ));

    ledger.activate().await?;
    next_snapshot(&mut ledger).await?;
    assert!(ledger.is_active());

    Ok(())
}

#[tokio::test]
async fn test_loosely_typed_document_still_counts() -> Result<()> {
    let (store, _temp_dir) = test_store().await?;
    let odd = EntryFields {
        amount: Amount::Other(serde_json::json!({ "v": 1 })),
        category: Category::Other,
        memo: None,
        date: Some("2024-12-01".to_string()),
    };
    let flag = EntryFields {
        amount: Amount::Bool(true),
        category: Category::Food,
        memo: None,
        date: None,
    };
    store.insert(DEFAULT_COLLECTION, odd).await?;
    store.insert(DEFAULT_COLLECTION, flag).await?;

    let mut ledger = test_ledger(store).await?;
    assert_eq!(ledger.entries().len(), 2);
    assert_eq!(ledger.summary().total, 1);

    add_entry(&mut ledger, "2500", Category::Food, "2024-12-02", "").await?;
    assert_eq!(ledger.entries().len(), 3);
    assert_eq!(ledger.summary().total, 2_501);

    Ok(())
}

#[tokio::test]
async fn test_maximal_amounts_do_not_overflow() -> Result<()> {
    let (store, _temp_dir) = test_store().await?;
    let mut ledger = test_ledger(store.clone()).await?;

    add_entry(&mut ledger, &MAX_AMOUNT.to_string(), Category::Food, "2024-12-01", "").await?;
    add_entry(&mut ledger, &MAX_AMOUNT.to_string(), Category::Food, "2024-12-01", "").await?;
    // Stored directly, past what a form accepts
    let huge = EntryFields {
        amount: Amount::Number(1e300),
        category: Category::Food,
        memo: None,
        date: Some("2024-11-30".to_string()),
    };
    store.insert(DEFAULT_COLLECTION, huge).await?;
    next_snapshot(&mut ledger).await?;

    let summary = ledger.summary();
    assert_eq!(summary.total, 3 * MAX_AMOUNT);
    assert!(summary.is_over_budget());
    assert_eq!(ledger.date_groups()[0].total(), 2 * MAX_AMOUNT);
    assert_eq!(ledger.category_totals()[0].total, 3 * MAX_AMOUNT);

    Ok(())
}
