//! Service wiring for the HTTP layer.
//!
//! The ledger store is Postgres when `DATABASE_URL` is set and in-memory
//! otherwise. The journal is always the in-process one: the general ledger is
//! an external collaborator and this service only needs somewhere to post.

use std::net::SocketAddr;
use std::sync::Arc;

use assetbook_accounting::InMemoryJournal;
use assetbook_infra::config::{parse_or, ConfigSource, EnvSource};
use assetbook_infra::{
    ConfigError, DepreciationRunner, InMemoryLedgerStore, JournalPostingService, LedgerStore,
    PostgresLedgerStore, PostingConfig, RunnerConfig,
};

pub const ENV_BIND_ADDR: &str = "ASSETBOOK_BIND_ADDR";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_DB_MAX_CONNECTIONS: &str = "ASSETBOOK_DB_MAX_CONNECTIONS";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub runner: RunnerConfig,
    pub posting: PostingConfig,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&EnvSource)
    }

    pub fn from_source<S: ConfigSource + ?Sized>(source: &S) -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: parse_or(source, ENV_BIND_ADDR, SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            database_url: source.get(ENV_DATABASE_URL),
            db_max_connections: parse_or(source, ENV_DB_MAX_CONNECTIONS, 10)?,
            runner: RunnerConfig::from_source(source)?,
            posting: PostingConfig::from_source(source)?,
        })
    }
}

#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn LedgerStore>,
    pub runner: DepreciationRunner,
    pub posting: JournalPostingService,
    pub journal: Arc<InMemoryJournal>,
}

impl AppServices {
    pub fn new(store: Arc<dyn LedgerStore>, runner: RunnerConfig, posting: &PostingConfig) -> Self {
        let journal = Arc::new(InMemoryJournal::new());
        Self {
            runner: DepreciationRunner::new(store.clone(), runner),
            posting: JournalPostingService::new(store.clone(), journal.clone(), posting.accounts()),
            store,
            journal,
        }
    }

    /// In-memory store with default configuration (dev/test).
    pub fn in_memory(store: InMemoryLedgerStore) -> Self {
        Self::new(
            Arc::new(store),
            RunnerConfig::default(),
            &PostingConfig::default(),
        )
    }

    pub async fn from_config(config: &ApiConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn LedgerStore> = match &config.database_url {
            Some(url) => {
                let store = PostgresLedgerStore::connect(url, config.db_max_connections).await?;
                store.migrate().await?;
                tracing::info!("using postgres ledger store");
                Arc::new(store)
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory ledger store");
                Arc::new(InMemoryLedgerStore::new())
            }
        };
        Ok(Self::new(store, config.runner.clone(), &config.posting))
    }
}
