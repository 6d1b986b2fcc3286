use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::debug;
use uuid::Uuid;

use crate::application::{
    AddOutcome, AppError, Confirm, DeleteOutcome, LedgerView, LedgerViewModel,
};
use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::domain::{Category, ExpenseEntry, Summary, format_yen};
use crate::storage::{DocumentStore, SqliteStore};

/// Kakeibo - Household Expense Ledger
#[derive(Parser)]
#[command(name = "kakeibo")]
#[command(about = "A household expense ledger with a live view of your monthly budget")]
#[command(version)]
pub struct Cli {
    /// Config file path
    #[arg(long, env = "KAKEIBO_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Database file path (overrides the config file)
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Record an expense
    Add {
        /// Amount in yen (e.g., "1200" or "1,200")
        amount: String,

        /// Free-text memo, such as the shop name
        #[arg(short, long)]
        memo: Option<String>,

        /// Category: food, daily-goods, dining-out, utilities, custom-tag, other
        #[arg(short, long)]
        category: Option<String>,

        /// Date of the expense (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Delete an expense
    Delete {
        /// Entry ID
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List expenses grouped by date, newest first
    List,

    /// Show total spending against the monthly budget
    Summary,

    /// Show spending per category
    Categories,

    /// Keep the list on screen and refresh it whenever the ledger changes
    Watch,

    /// Export the ledger to CSV or JSON
    Export {
        /// Format: csv, json
        format: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut config = Config::load_or_default(&self.config).await?;
        if let Some(database) = self.database {
            config.database = database;
        }
        let palette = Palette::detect();

        match self.command {
            Commands::Init => {
                SqliteStore::create(&config.database).await?;
                println!("Database initialized: {}", config.database.display());
            }

            Commands::Add {
                amount,
                memo,
                category,
                date,
            } => {
                let mut ledger = open_ledger(&config).await?;
                run_add_command(&mut ledger, amount, memo, category, date, palette).await?;
            }

            Commands::Delete { id, yes } => {
                let mut ledger = open_ledger(&config).await?;
                run_delete_command(&mut ledger, &id, yes).await?;
            }

            Commands::List => {
                let mut ledger = open_ledger(&config).await?;
                load(&mut ledger).await?;
                print!("{}", render_list(&ledger.view(), palette));
            }

            Commands::Summary => {
                let mut ledger = open_ledger(&config).await?;
                load(&mut ledger).await?;
                print!("{}", render_summary(&ledger.summary(), palette));
            }

            Commands::Categories => {
                let mut ledger = open_ledger(&config).await?;
                load(&mut ledger).await?;
                print!("{}", render_categories(&ledger.view()));
            }

            Commands::Watch => {
                let mut ledger = open_ledger(&config).await?;
                run_watch_command(&mut ledger, palette).await?;
            }

            Commands::Export { format, output } => {
                let mut ledger = open_ledger(&config).await?;
                load(&mut ledger).await?;
                run_export_command(&ledger, &format, output)?;
            }
        }

        Ok(())
    }
}

/// Open the configured database and build a ledger over it.
async fn open_ledger(config: &Config) -> Result<LedgerViewModel> {
    let store = SqliteStore::open(&config.database)
        .await?
        .with_poll_interval(config.poll_interval());
    let store: Arc<dyn DocumentStore> = Arc::new(store);
    Ok(LedgerViewModel::new(store, config.ledger_settings()))
}

/// Subscribe and wait for the first snapshot.
async fn load(ledger: &mut LedgerViewModel) -> Result<()> {
    ledger.activate().await?;
    ledger.next_snapshot().await?;
    Ok(())
}

async fn run_add_command(
    ledger: &mut LedgerViewModel,
    amount: String,
    memo: Option<String>,
    category: Option<String>,
    date: Option<NaiveDate>,
    palette: Palette,
) -> Result<()> {
    // Consume the initial snapshot so the next one reflects the insert. Adding
    // does not depend on the current entries, so a failed read is not fatal.
    ledger.activate().await?;
    if let Err(e) = ledger.next_snapshot().await {
        debug!("adding without a current snapshot: {e}");
    }

    let form = ledger.form_mut();
    form.amount = amount;
    if let Some(memo) = memo {
        form.memo = memo;
    }
    if let Some(category) = category {
        form.category = Category::from_str(&category).with_context(|| {
            format!(
                "Unknown category '{}'. Use one of: {}",
                category,
                Category::ALL.map(|c| c.as_str()).join(", ")
            )
        })?;
    }
    if let Some(date) = date {
        form.set_date(date);
    }

    let id = match ledger.add().await? {
        AddOutcome::Skipped => {
            println!("Nothing to add: amount is empty.");
            return Ok(());
        }
        AddOutcome::Added(id) => id,
    };

    // Wait for the store to echo the new entry back before summarizing
    let echoed = matches!(ledger.next_snapshot().await, Ok(true));
    match ledger.entry(id) {
        Some(entry) => print!("{}", render_added(entry)),
        None => println!("Added entry {}", id),
    }
    if echoed {
        print!("{}", render_summary(&ledger.summary(), palette));
    }
    Ok(())
}

async fn run_delete_command(ledger: &mut LedgerViewModel, id: &str, yes: bool) -> Result<()> {
    let id = Uuid::parse_str(id.trim()).with_context(|| format!("Invalid entry ID '{}'", id))?;
    load(ledger).await?;
    if ledger.entry(id).is_none() {
        return Err(AppError::EntryNotFound(id).into());
    }

    let outcome = if yes {
        ledger.delete(id, &|_: &str| true).await?
    } else {
        ledger.delete(id, &PromptConfirm).await?
    };

    match outcome {
        DeleteOutcome::Declined => println!("Kept entry {}", id),
        DeleteOutcome::Deleted => println!("Deleted entry {}", id),
    }
    Ok(())
}

async fn run_watch_command(ledger: &mut LedgerViewModel, palette: Palette) -> Result<()> {
    ledger.activate().await?;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            update = ledger.next_snapshot() => match update {
                Ok(true) => {
                    let at = ledger
                        .last_snapshot_at()
                        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
                        .unwrap_or_default();
                    println!("\n--- updated {} {}", at, "-".repeat(30));
                    print!("{}", render_list(&ledger.view(), palette));
                }
                Ok(false) => break,
                // Already logged; keep showing the last good snapshot
                Err(_) => continue,
            },
            _ = &mut shutdown => break,
        }
    }
    Ok(())
}

fn run_export_command(
    ledger: &LedgerViewModel,
    format: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::stdout;

    let exporter = Exporter::new(ledger);
    let writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(stdout()),
    };

    let count = match format.to_lowercase().as_str() {
        "csv" => exporter.export_entries_csv(writer)?,
        "json" => exporter.export_json(writer)?,
        other => anyhow::bail!("Unknown export format '{}'. Use csv or json", other),
    };

    if let Some(path) = output {
        eprintln!("Exported {} entries to {}", count, path.display());
    }
    Ok(())
}

/// Asks on the terminal; anything but "y"/"yes" keeps the entry.
struct PromptConfirm;

impl Confirm for PromptConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{} [y/N] ", prompt);
        if std::io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

/// Terminal styling. Color is only used when stdout is a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub color: bool,
}

impl Palette {
    pub fn detect() -> Self {
        Self {
            color: std::io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    fn alert(&self, text: &str) -> String {
        if self.color {
            format!("\x1b[31m{}\x1b[0m", text)
        } else {
            text.to_string()
        }
    }
}

const BAR_WIDTH: usize = 20;

pub fn render_summary(summary: &Summary, palette: Palette) -> String {
    let remaining = format!("{} yen", format_yen(summary.remaining));
    let remaining = if summary.is_over_budget() {
        palette.alert(&format!("{}  (over budget)", remaining))
    } else {
        remaining
    };

    format!(
        "Total:     {} yen\nBudget:    {} yen\nRemaining: {}\n",
        format_yen(summary.total),
        format_yen(summary.budget),
        remaining
    )
}

pub fn render_added(entry: &ExpenseEntry) -> String {
    format!(
        "Added {} yen ({}) on {}: {}\n",
        format_yen(entry.amount()),
        entry.category().display_name(),
        entry.date_key(),
        entry.id
    )
}

pub fn render_list(view: &LedgerView<'_>, palette: Palette) -> String {
    let mut out = render_summary(&view.summary, palette);

    if view.groups.is_empty() {
        out.push_str("\nNo entries yet.\n");
        return out;
    }

    for group in &view.groups {
        out.push_str(&format!("\n{}\n", group.heading()));
        for entry in &group.entries {
            let memo = entry
                .memo()
                .map(|m| format!(" ({})", m))
                .unwrap_or_default();
            out.push_str(&format!(
                "  {} / {} yen{}  {}\n",
                entry.category().display_name(),
                format_yen(entry.amount()),
                memo,
                entry.id
            ));
        }
    }
    out
}

pub fn render_categories(view: &LedgerView<'_>) -> String {
    if view.categories.is_empty() {
        return "No entries yet.\n".to_string();
    }

    let total = view.summary.total;
    let mut out = format!(
        "{:<12} {:>12}  {:<w$} {:>6}\n",
        "CATEGORY",
        "AMOUNT",
        "",
        "SHARE",
        w = BAR_WIDTH
    );
    out.push_str(&format!("{}\n", "-".repeat(36 + BAR_WIDTH)));

    for category in &view.categories {
        let share = category.share(total);
        let filled = ((share * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
        out.push_str(&format!(
            "{:<12} {:>12}  {}{} {:>5.1}%\n",
            category.category.display_name(),
            format!("{} yen", format_yen(category.total)),
            "#".repeat(filled),
            ".".repeat(BAR_WIDTH - filled),
            share * 100.0
        ));
    }
    out
}
