use async_trait::async_trait;
use thiserror::Error;

use assetbook_core::{AssetId, JournalRef, Money};
use assetbook_depreciation::{Asset, AssetStatus, DepreciationRecord, PeriodKey};

/// Ledger store operation error.
///
/// These are **infrastructure errors** (storage, locking, missing rows) as
/// opposed to engine errors (usage, parameters, ledger invariants).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflicting write: {0}")]
    Conflict(String),

    /// A read or write failed; the enclosing unit of work is rolled back.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn asset_not_found(asset_id: AssetId) -> Self {
        Self::NotFound(format!("asset {asset_id}"))
    }
}

/// Which assets a batch covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetFilter {
    /// Restrict to these assets; empty means every asset.
    pub asset_ids: Vec<AssetId>,
}

impl AssetFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(asset_ids: impl IntoIterator<Item = AssetId>) -> Self {
        Self {
            asset_ids: asset_ids.into_iter().collect(),
        }
    }

    pub fn matches(&self, asset: &Asset) -> bool {
        self.asset_ids.is_empty() || self.asset_ids.contains(&asset.id)
    }
}

/// Durable store of assets and their depreciation records.
///
/// ## Units of work
///
/// Every write goes through a [`LedgerTransaction`] obtained from [`begin`].
/// The transaction holds the asset's exclusive lock until it is committed or
/// dropped, so two runs never recompute the same asset at once. Nothing a
/// transaction writes is visible to other readers before `commit`; dropping it
/// without committing discards every staged write.
///
/// [`begin`]: LedgerStore::begin
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Active assets matching `filter`, ordered by code.
    async fn load_eligible_assets(&self, filter: &AssetFilter) -> Result<Vec<Asset>, StoreError>;

    /// Read-only view of one asset, outside any unit of work.
    async fn get_asset(&self, asset_id: AssetId) -> Result<Asset, StoreError>;

    /// Committed records for one asset, ascending by period.
    async fn list_records(&self, asset_id: AssetId) -> Result<Vec<DepreciationRecord>, StoreError>;

    /// Open a unit of work on one asset, waiting for its exclusive lock.
    async fn begin(&self, asset_id: AssetId) -> Result<Box<dyn LedgerTransaction>, StoreError>;
}

/// One asset's atomic unit of work.
#[async_trait]
pub trait LedgerTransaction: Send {
    async fn load_asset(&mut self) -> Result<Asset, StoreError>;

    async fn list_records(&mut self) -> Result<Vec<DepreciationRecord>, StoreError>;

    /// Remove every record of the asset.
    async fn delete_records(&mut self) -> Result<(), StoreError>;

    async fn insert_records(&mut self, records: &[DepreciationRecord]) -> Result<(), StoreError>;

    async fn update_asset_totals(
        &mut self,
        accumulated: Money,
        book_value: Money,
    ) -> Result<(), StoreError>;

    /// Link the record of `period` to a posted journal entry.
    async fn attach_journal_ref(
        &mut self,
        period: PeriodKey,
        journal_ref: JournalRef,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

pub(crate) fn is_eligible_status(asset: &Asset) -> bool {
    asset.status == AssetStatus::Active
}
