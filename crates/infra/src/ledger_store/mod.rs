//! Ledger store boundary.
//!
//! Assets and their depreciation records, read and written per asset inside
//! an exclusive, atomic unit of work. Two backends: an in-memory store for
//! tests and local runs, and Postgres.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use r#trait::{AssetFilter, LedgerStore, LedgerTransaction, StoreError};
