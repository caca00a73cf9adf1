//! Infrastructure layer: ledger persistence, batch runner, GL posting, config.

pub mod config;
pub mod ledger_store;
pub mod posting;
pub mod runner;

mod integration_tests;

pub use config::{ConfigError, PostingConfig, RunnerConfig};
pub use ledger_store::{
    AssetFilter, InMemoryLedgerStore, LedgerStore, LedgerTransaction, PostgresLedgerStore,
    StoreError,
};
pub use posting::{JournalPostingService, PostingError, PostingReport};
pub use runner::{
    AssetOutcome, AssetReport, BatchRequest, BatchResult, DepreciationRunner, Preview,
    RebuildSummary, RunError,
};
