// Application layer: the ledger view-model and its command results.
// Any client (CLI, TUI, a future GUI) drives the ledger through `LedgerViewModel`.

pub mod error;
pub mod view_model;

pub use error::*;
pub use view_model::*;
