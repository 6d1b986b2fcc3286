use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Category, ExpenseEntry, NO_DATE, Yen, parse_entry_date};

/// The fixed monthly budget, in yen.
pub const MONTHLY_BUDGET: Yen = 90_000;

/// Headline figures for a set of entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: Yen,
    pub budget: Yen,
    pub remaining: Yen,
}

impl Summary {
    pub fn compute(entries: &[ExpenseEntry], budget: Yen) -> Self {
        let total = total(entries);
        Self {
            total,
            budget,
            remaining: remaining(budget, total),
        }
    }

    pub fn is_over_budget(&self) -> bool {
        self.remaining < 0
    }
}

/// Sum of all entry amounts. Amounts that do not coerce to a number count as zero.
/// Saturates instead of overflowing.
pub fn total(entries: &[ExpenseEntry]) -> Yen {
    sum_amounts(entries.iter())
}

/// Budget minus total. Overspending yields a negative value.
pub fn remaining(budget: Yen, total: Yen) -> Yen {
    budget.saturating_sub(total)
}

fn sum_amounts<'a>(entries: impl Iterator<Item = &'a ExpenseEntry>) -> Yen {
    entries.fold(0, |sum, entry| sum.saturating_add(entry.amount()))
}

/// Entries sharing one date key, in the order the snapshot delivered them.
#[derive(Debug, Clone, PartialEq)]
pub struct DateGroup<'a> {
    pub key: &'a str,
    pub entries: Vec<&'a ExpenseEntry>,
}

impl DateGroup<'_> {
    /// Heading shown above the group: "2024-03-01" -> "2024/03/01".
    pub fn heading(&self) -> String {
        self.key.replace('-', "/")
    }

    pub fn total(&self) -> Yen {
        sum_amounts(self.entries.iter().copied())
    }
}

/// Partition entries into date buckets, returned newest date first.
/// Each bucket keeps its members in snapshot order.
pub fn group_by_date(entries: &[ExpenseEntry]) -> Vec<DateGroup<'_>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<DateGroup<'_>> = Vec::new();

    for entry in entries {
        let key = entry.date_key();
        match index.get(key).copied() {
            Some(i) => groups[i].entries.push(entry),
            None => {
                index.insert(key, groups.len());
                groups.push(DateGroup {
                    key,
                    entries: vec![entry],
                });
            }
        }
    }

    groups.sort_by(|a, b| compare_date_keys(a.key, b.key));
    groups
}

/// Sort date keys newest first.
pub fn sort_date_keys<S: AsRef<str>>(keys: &mut [S]) {
    keys.sort_by(|a, b| compare_date_keys(a.as_ref(), b.as_ref()));
}

/// Descending calendar order. Keys that are not dates follow every real date
/// (in descending text order), and the [`NO_DATE`] sentinel is always last.
pub fn compare_date_keys(a: &str, b: &str) -> Ordering {
    match (a == NO_DATE, b == NO_DATE) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    match (parse_entry_date(a), parse_entry_date(b)) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.cmp(a),
    }
}

/// Spending in one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: Category,
    pub total: Yen,
}

impl CategoryTotal {
    /// Fraction of `grand_total` this category accounts for, in `0.0..=1.0` for
    /// ordinary data. Zero when there is nothing to divide by.
    pub fn share(&self, grand_total: Yen) -> f64 {
        if grand_total <= 0 {
            0.0
        } else {
            self.total as f64 / grand_total as f64
        }
    }
}

/// Per-category sums in order of first appearance.
pub fn category_totals(entries: &[ExpenseEntry]) -> Vec<CategoryTotal> {
    let mut totals: Vec<CategoryTotal> = Vec::new();

    for entry in entries {
        let category = entry.category();
        match totals.iter_mut().find(|t| t.category == category) {
            Some(t) => t.total = t.total.saturating_add(entry.amount()),
            None => totals.push(CategoryTotal {
                category,
                total: entry.amount(),
            }),
        }
    }

    totals
}
