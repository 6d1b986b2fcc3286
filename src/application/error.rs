use thiserror::Error;

use crate::domain::{EntryId, ParseYenError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid amount '{input}': {reason}")]
    InvalidAmount {
        input: String,
        reason: ParseYenError,
    },

    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(EntryId),

    #[error("The ledger is not subscribed to the store")]
    NotSubscribed,

    #[error("Store error: {0:#}")]
    Store(#[from] anyhow::Error),
}
