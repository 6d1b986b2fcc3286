use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{Category, MAX_AMOUNT, Yen};

pub type EntryId = Uuid;

/// Bucket key for entries that carry no date.
pub const NO_DATE: &str = "no date";

/// Calendar format used for entry dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// An amount as it is stored in a document. Documents are loosely typed, so the
/// field may hold a number, text, a boolean, nothing, or any other JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Number(f64),
    Text(String),
    Bool(bool),
    #[default]
    Missing,
    Other(Value),
}

impl Amount {
    /// Coerce to whole yen, clamped to `±MAX_AMOUNT`. Anything that is not a
    /// finite number counts as zero; `true` counts as one.
    pub fn to_yen(&self) -> Yen {
        let value = match self {
            Amount::Number(n) => *n,
            Amount::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    0.0
                } else {
                    s.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Amount::Bool(b) => f64::from(u8::from(*b)),
            Amount::Missing | Amount::Other(_) => 0.0,
        };

        if value.is_finite() {
            (value.round() as Yen).clamp(-MAX_AMOUNT, MAX_AMOUNT)
        } else {
            0
        }
    }
}

impl From<Yen> for Amount {
    fn from(yen: Yen) -> Self {
        Amount::Number(yen as f64)
    }
}

/// The client-supplied fields of an entry document.
///
/// Decoding never fails on a field's type: a bad amount counts as zero, an
/// unknown category reads as [`Category::Other`], and a memo or date that is not
/// text is read as its JSON text, or as absent for arrays and objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFields {
    #[serde(default)]
    pub amount: Amount,
    #[serde(default, deserialize_with = "lenient_category")]
    pub category: Category,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub memo: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<String>,
}

fn lenient_category<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Category, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => Category::default(),
        Value::String(s) => Category::from_str(&s).unwrap_or(Category::Other),
        _ => Category::Other,
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    })
}

impl EntryFields {
    pub fn new(amount: Yen, category: Category, date: NaiveDate) -> Self {
        Self {
            amount: Amount::from(amount),
            category,
            memo: None,
            date: Some(date.format(DATE_FORMAT).to_string()),
        }
    }

    /// Set the memo; blank text is stored as no memo.
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        let memo = memo.into();
        self.memo = if memo.trim().is_empty() {
            None
        } else {
            Some(memo)
        };
        self
    }

    pub fn without_date(mut self) -> Self {
        self.date = None;
        self
    }
}

/// A single expense as delivered by the store.
/// Entries are never updated in place; corrections are a delete plus a new entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseEntry {
    pub id: EntryId,
    #[serde(flatten)]
    pub fields: EntryFields,
    /// Assigned by the store on insert. Audit only, never used for grouping.
    pub created_at: Option<DateTime<Utc>>,
}

impl ExpenseEntry {
    pub fn amount(&self) -> Yen {
        self.fields.amount.to_yen()
    }

    pub fn category(&self) -> Category {
        self.fields.category
    }

    pub fn memo(&self) -> Option<&str> {
        self.fields.memo.as_deref().filter(|m| !m.is_empty())
    }

    /// The grouping key: the stored date, or [`NO_DATE`] when it is absent or blank.
    pub fn date_key(&self) -> &str {
        match self.fields.date.as_deref() {
            Some(date) if !date.is_empty() => date,
            _ => NO_DATE,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        parse_entry_date(self.date_key())
    }
}

/// Parse an entry date key, returning `None` for the sentinel or malformed text.
pub fn parse_entry_date(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, DATE_FORMAT).ok()
}
