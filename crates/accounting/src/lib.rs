//! Accounting boundary (double-entry journal).
//!
//! Pure domain logic plus an in-memory journal. The depreciation ledger only
//! ever holds a [`JournalRef`](assetbook_core::JournalRef) to entries posted here.

pub mod ledger;

pub use ledger::{
    Account, AccountKind, DepreciationAccounts, InMemoryJournal, Journal, JournalEntry,
    JournalEntryLine, JournalError,
};
