use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use assetbook_core::{AssetId, JournalRef, Money};
use assetbook_depreciation::{Asset, DepreciationRecord, PeriodKey};

use super::r#trait::{is_eligible_status, AssetFilter, LedgerStore, LedgerTransaction, StoreError};

#[derive(Debug, Default)]
struct Tables {
    assets: HashMap<AssetId, Asset>,
    records: HashMap<AssetId, Vec<DepreciationRecord>>,
}

#[derive(Debug, Default)]
struct Shared {
    tables: RwLock<Tables>,
    /// One exclusive lock per asset, created on first use.
    locks: Mutex<HashMap<AssetId, Arc<AsyncMutex<()>>>>,
    /// Assets whose writes fail (test hook).
    failing_writes: RwLock<HashSet<AssetId>>,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Writes are staged inside the transaction and
/// applied to the shared tables in one step on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    shared: Arc<Shared>,
}

fn poisoned() -> StoreError {
    StoreError::Storage("lock poisoned".to_string())
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace an asset (the asset registry lives outside the engine).
    pub fn insert_asset(&self, asset: Asset) -> Result<(), StoreError> {
        let mut tables = self.shared.tables.write().map_err(|_| poisoned())?;
        tables.assets.insert(asset.id, asset);
        Ok(())
    }

    /// Seed records directly, bypassing any unit of work.
    pub fn seed_records(
        &self,
        asset_id: AssetId,
        mut records: Vec<DepreciationRecord>,
    ) -> Result<(), StoreError> {
        records.sort_by_key(|r| r.period_date);
        let mut tables = self.shared.tables.write().map_err(|_| poisoned())?;
        tables.records.insert(asset_id, records);
        Ok(())
    }

    /// Make every write for `asset_id` fail until [`clear_faults`](Self::clear_faults).
    pub fn fail_writes_for(&self, asset_id: AssetId) {
        if let Ok(mut set) = self.shared.failing_writes.write() {
            set.insert(asset_id);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut set) = self.shared.failing_writes.write() {
            set.clear();
        }
    }

    fn asset_lock(&self, asset_id: AssetId) -> Result<Arc<AsyncMutex<()>>, StoreError> {
        let mut locks = self.shared.locks.lock().map_err(|_| poisoned())?;
        Ok(locks.entry(asset_id).or_default().clone())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn load_eligible_assets(&self, filter: &AssetFilter) -> Result<Vec<Asset>, StoreError> {
        let tables = self.shared.tables.read().map_err(|_| poisoned())?;
        let mut assets: Vec<Asset> = tables
            .assets
            .values()
            .filter(|a| is_eligible_status(a) && filter.matches(a))
            .cloned()
            .collect();
        assets.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(assets)
    }

    async fn get_asset(&self, asset_id: AssetId) -> Result<Asset, StoreError> {
        let tables = self.shared.tables.read().map_err(|_| poisoned())?;
        tables
            .assets
            .get(&asset_id)
            .cloned()
            .ok_or_else(|| StoreError::asset_not_found(asset_id))
    }

    async fn list_records(&self, asset_id: AssetId) -> Result<Vec<DepreciationRecord>, StoreError> {
        let tables = self.shared.tables.read().map_err(|_| poisoned())?;
        Ok(tables.records.get(&asset_id).cloned().unwrap_or_default())
    }

    async fn begin(&self, asset_id: AssetId) -> Result<Box<dyn LedgerTransaction>, StoreError> {
        let guard = self.asset_lock(asset_id)?.lock_owned().await;

        // Snapshot under the lock: no other unit of work can change this asset now.
        let (asset, records) = {
            let tables = self.shared.tables.read().map_err(|_| poisoned())?;
            let asset = tables
                .assets
                .get(&asset_id)
                .cloned()
                .ok_or_else(|| StoreError::asset_not_found(asset_id))?;
            let records = tables.records.get(&asset_id).cloned().unwrap_or_default();
            (asset, records)
        };

        Ok(Box::new(InMemoryTransaction {
            shared: self.shared.clone(),
            _guard: guard,
            asset,
            records,
        }))
    }
}

/// Staged copy of one asset and its records.
struct InMemoryTransaction {
    shared: Arc<Shared>,
    _guard: OwnedMutexGuard<()>,
    asset: Asset,
    records: Vec<DepreciationRecord>,
}

impl InMemoryTransaction {
    fn check_writable(&self) -> Result<(), StoreError> {
        let failing = self.shared.failing_writes.read().map_err(|_| poisoned())?;
        if failing.contains(&self.asset.id) {
            return Err(StoreError::Storage(format!(
                "injected write failure for asset {}",
                self.asset.id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn load_asset(&mut self) -> Result<Asset, StoreError> {
        Ok(self.asset.clone())
    }

    async fn list_records(&mut self) -> Result<Vec<DepreciationRecord>, StoreError> {
        Ok(self.records.clone())
    }

    async fn delete_records(&mut self) -> Result<(), StoreError> {
        self.check_writable()?;
        self.records.clear();
        Ok(())
    }

    async fn insert_records(&mut self, records: &[DepreciationRecord]) -> Result<(), StoreError> {
        self.check_writable()?;
        for record in records {
            if record.asset_id != self.asset.id {
                return Err(StoreError::Conflict(format!(
                    "record for asset {} inserted under asset {}",
                    record.asset_id, self.asset.id
                )));
            }
            let key = record.period_key();
            if self.records.iter().any(|r| r.period_key() == key) {
                return Err(StoreError::Conflict(format!(
                    "record for period {key} already exists"
                )));
            }
            self.records.push(record.clone());
        }
        self.records.sort_by_key(|r| r.period_date);
        Ok(())
    }

    async fn update_asset_totals(
        &mut self,
        accumulated: Money,
        book_value: Money,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        self.asset.accumulated_depreciation = accumulated;
        self.asset.current_book_value = book_value;
        Ok(())
    }

    async fn attach_journal_ref(
        &mut self,
        period: PeriodKey,
        journal_ref: JournalRef,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let record = self
            .records
            .iter_mut()
            .find(|r| r.period_key() == period)
            .ok_or_else(|| {
                StoreError::NotFound(format!("record {period} of asset {}", self.asset.id))
            })?;
        record.journal_ref = Some(journal_ref);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        let mut tables = this.shared.tables.write().map_err(|_| poisoned())?;
        let asset_id = this.asset.id;
        tables.assets.insert(asset_id, this.asset);
        tables.records.insert(asset_id, this.records);
        Ok(())
    }
}
