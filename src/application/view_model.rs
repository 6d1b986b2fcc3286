use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use tracing::{debug, error, info, warn};

use crate::domain::{
    Category, CategoryTotal, DATE_FORMAT, DateGroup, EntryFields, EntryId, ExpenseEntry,
    MONTHLY_BUDGET, Summary, Yen, category_totals, format_yen, group_by_date, parse_yen,
};
use crate::storage::{DEFAULT_COLLECTION, DocumentStore, Snapshot, SnapshotQuery, Subscription};

use super::AppError;

/// Question asked before an entry is deleted.
pub const DELETE_PROMPT: &str = "Delete this entry?";

/// Today's date in the local calendar.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Asks the user to confirm a destructive command.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// The add-entry inputs, kept as the user typed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryForm {
    pub amount: String,
    pub memo: String,
    pub category: Category,
    /// `YYYY-MM-DD`; blank means the entry has no date.
    pub date: String,
}

impl EntryForm {
    pub fn new(category: Category) -> Self {
        Self {
            amount: String::new(),
            memo: String::new(),
            category,
            date: today().format(DATE_FORMAT).to_string(),
        }
    }

    pub fn set_date(&mut self, date: NaiveDate) {
        self.date = date.format(DATE_FORMAT).to_string();
    }

    fn is_empty(&self) -> bool {
        self.amount.trim().is_empty()
    }

    fn to_fields(&self) -> Result<EntryFields, AppError> {
        let amount = parse_yen(&self.amount).map_err(|reason| AppError::InvalidAmount {
            input: self.amount.clone(),
            reason,
        })?;

        let date = self.date.trim();
        let fields = if date.is_empty() {
            EntryFields::new(amount, self.category, today()).without_date()
        } else {
            let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
                .map_err(|_| AppError::InvalidDate(self.date.clone()))?;
            EntryFields::new(amount, self.category, date)
        };
        Ok(fields.with_memo(self.memo.trim()))
    }

    /// Category and date stay put so several entries for one day go in quickly.
    fn clear_after_add(&mut self) {
        self.amount.clear();
        self.memo.clear();
    }
}

impl Default for EntryForm {
    fn default() -> Self {
        Self::new(Category::default())
    }
}

/// Per-ledger settings the view-model is built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSettings {
    pub collection: String,
    pub monthly_budget: Yen,
    pub default_category: Category,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            monthly_budget: MONTHLY_BUDGET,
            default_category: Category::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The amount was empty; nothing was sent to the store.
    Skipped,
    Added(EntryId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Declined,
    Deleted,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone)]
pub struct LedgerView<'a> {
    pub summary: Summary,
    /// Date buckets, newest first.
    pub groups: Vec<DateGroup<'a>>,
    /// Category sums in order of first appearance.
    pub categories: Vec<CategoryTotal>,
}

/// Live projection of the expense collection plus the add/delete commands.
///
/// The entry list is only ever replaced wholesale by an incoming snapshot; the
/// commands never touch it, so the list always mirrors what the store last sent.
pub struct LedgerViewModel {
    store: Arc<dyn DocumentStore>,
    settings: LedgerSettings,
    entries: Vec<ExpenseEntry>,
    form: EntryForm,
    subscription: Option<Subscription>,
    last_snapshot_at: Option<DateTime<Utc>>,
}

impl LedgerViewModel {
    pub fn new(store: Arc<dyn DocumentStore>, settings: LedgerSettings) -> Self {
        let form = EntryForm::new(settings.default_category);
        Self {
            store,
            settings,
            entries: Vec::new(),
            form,
            subscription: None,
            last_snapshot_at: None,
        }
    }

    // ========================
    // Subscription
    // ========================

    /// Open the live query (date, newest first). Does nothing when already active.
    pub async fn activate(&mut self) -> Result<(), AppError> {
        if self.subscription.is_some() {
            return Ok(());
        }
        let query = SnapshotQuery::new(self.settings.collection.clone());
        self.subscription = Some(self.store.subscribe(query).await?);
        debug!(collection = %self.settings.collection, "ledger activated");
        Ok(())
    }

    /// Tear down the live query. The last snapshot stays visible.
    pub fn deactivate(&mut self) {
        if self.subscription.take().is_some() {
            debug!(collection = %self.settings.collection, "ledger deactivated");
        }
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    /// Wait for the next snapshot and apply it.
    ///
    /// Returns `Ok(false)` once the store has closed the stream; the view-model is
    /// then inactive. A snapshot that fails to load leaves the current entries as
    /// they are.
    pub async fn next_snapshot(&mut self) -> Result<bool, AppError> {
        let subscription = self.subscription.as_mut().ok_or(AppError::NotSubscribed)?;
        match subscription.next().await {
            Some(Ok(snapshot)) => {
                self.apply_snapshot(snapshot);
                Ok(true)
            }
            Some(Err(e)) => {
                warn!("keeping previous entries, snapshot failed: {e:#}");
                Err(AppError::Store(e))
            }
            None => {
                debug!("store closed the subscription");
                self.subscription = None;
                Ok(false)
            }
        }
    }

    /// Replace the local entries with a snapshot's contents.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        debug!(count = snapshot.entries.len(), "applying snapshot");
        self.entries = snapshot.entries;
        self.last_snapshot_at = Some(snapshot.read_at);
    }

    // ========================
    // Commands
    // ========================

    pub fn form(&self) -> &EntryForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut EntryForm {
        &mut self.form
    }

    /// Insert the form's entry.
    ///
    /// An empty amount is a no-op. On success the amount and memo are cleared; on
    /// any failure the error is logged and every input is left as it was.
    pub async fn add(&mut self) -> Result<AddOutcome, AppError> {
        if self.form.is_empty() {
            debug!("add skipped, amount is empty");
            return Ok(AddOutcome::Skipped);
        }

        let fields = self.form.to_fields().inspect_err(|e| {
            error!("failed to add entry: {e}");
        })?;

        match self.store.insert(&self.settings.collection, fields).await {
            Ok(id) => {
                info!(%id, "added entry");
                self.form.clear_after_add();
                Ok(AddOutcome::Added(id))
            }
            Err(e) => {
                error!("failed to add entry: {e:#}");
                Err(AppError::Store(e))
            }
        }
    }

    /// Delete an entry once the user confirms.
    ///
    /// The local list is not touched; the entry disappears with the next snapshot.
    pub async fn delete(
        &self,
        id: EntryId,
        confirm: &impl Confirm,
    ) -> Result<DeleteOutcome, AppError> {
        if !confirm.confirm(&self.delete_prompt(id)) {
            debug!(%id, "delete declined");
            return Ok(DeleteOutcome::Declined);
        }

        match self.store.delete_by_id(&self.settings.collection, id).await {
            Ok(()) => {
                info!(%id, "deleted entry");
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) => {
                error!(%id, "failed to delete entry: {e:#}");
                Err(AppError::Store(e))
            }
        }
    }

    fn delete_prompt(&self, id: EntryId) -> String {
        match self.entry(id) {
            Some(entry) => format!(
                "{} ({} {} {} yen)",
                DELETE_PROMPT,
                entry.date_key(),
                entry.category().display_name(),
                format_yen(entry.amount())
            ),
            None => DELETE_PROMPT.to_string(),
        }
    }

    // ========================
    // Derived views
    // ========================

    pub fn entries(&self) -> &[ExpenseEntry] {
        &self.entries
    }

    pub fn entry(&self, id: EntryId) -> Option<&ExpenseEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    pub fn last_snapshot_at(&self) -> Option<DateTime<Utc>> {
        self.last_snapshot_at
    }

    pub fn summary(&self) -> Summary {
        Summary::compute(&self.entries, self.settings.monthly_budget)
    }

    pub fn date_groups(&self) -> Vec<DateGroup<'_>> {
        group_by_date(&self.entries)
    }

    pub fn category_totals(&self) -> Vec<CategoryTotal> {
        category_totals(&self.entries)
    }

    /// Recompute every derived figure from the current entries.
    pub fn view(&self) -> LedgerView<'_> {
        LedgerView {
            summary: self.summary(),
            groups: self.date_groups(),
            categories: self.category_totals(),
        }
    }
}
