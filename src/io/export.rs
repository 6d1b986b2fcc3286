use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::io::Write;

use crate::application::LedgerViewModel;
use crate::domain::{CategoryTotal, ExpenseEntry, Summary};

/// Everything the ledger currently shows, for JSON export.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerExport<'a> {
    pub version: &'static str,
    pub exported_at: DateTime<Utc>,
    pub collection: &'a str,
    pub summary: Summary,
    pub categories: Vec<CategoryTotal>,
    pub entries: &'a [ExpenseEntry],
}

/// Exporter for writing the ledger's current snapshot in various formats
pub struct Exporter<'a> {
    ledger: &'a LedgerViewModel,
}

impl<'a> Exporter<'a> {
    pub fn new(ledger: &'a LedgerViewModel) -> Self {
        Self { ledger }
    }

    /// Export entries to CSV format, in snapshot order
    pub fn export_entries_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "date", "category", "amount", "memo", "created_at"])?;

        let mut count = 0;
        for entry in self.ledger.entries() {
            csv_writer.write_record([
                entry.id.to_string(),
                entry.date_key().to_string(),
                entry.category().as_str().to_string(),
                entry.amount().to_string(),
                entry.memo().unwrap_or_default().to_string(),
                entry
                    .created_at
                    .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
                    .unwrap_or_default(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export entries plus summary figures as pretty JSON
    pub fn export_json<W: Write>(&self, mut writer: W) -> Result<usize> {
        let export = LedgerExport {
            version: env!("CARGO_PKG_VERSION"),
            exported_at: Utc::now(),
            collection: &self.ledger.settings().collection,
            summary: self.ledger.summary(),
            categories: self.ledger.category_totals(),
            entries: self.ledger.entries(),
        };

        let json = serde_json::to_string_pretty(&export)?;
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        Ok(export.entries.len())
    }
}
