//! General-ledger posting of depreciation records.
//!
//! For every record of an asset that has no journal reference yet, posts one
//! balanced entry (debit depreciation expense, credit accumulated
//! depreciation) and links the returned reference to the record, all inside
//! the asset's unit of work. The engine itself never posts; it only carries
//! references forward across rebuilds.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, instrument};

use assetbook_accounting::{DepreciationAccounts, Journal, JournalEntry, JournalError};
use assetbook_core::{AssetId, JournalRef, Money};
use assetbook_depreciation::PeriodKey;

use crate::ledger_store::{LedgerStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostingError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Journal(#[from] JournalError),
}

/// Entries posted for one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingReport {
    pub asset_id: AssetId,
    pub posted: Vec<(PeriodKey, JournalRef)>,
    pub posted_amount: Money,
    /// Records that already carried a reference and were left alone.
    pub already_linked: usize,
}

#[derive(Clone)]
pub struct JournalPostingService {
    store: Arc<dyn LedgerStore>,
    journal: Arc<dyn Journal>,
    accounts: DepreciationAccounts,
}

impl JournalPostingService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        journal: Arc<dyn Journal>,
        accounts: DepreciationAccounts,
    ) -> Self {
        Self {
            store,
            journal,
            accounts,
        }
    }

    pub fn accounts(&self) -> &DepreciationAccounts {
        &self.accounts
    }

    /// Post every unlinked record of `asset_id`.
    ///
    /// Entries are posted before the links commit. If the commit fails, the
    /// posted entries stay in the journal unlinked and are logged.
    #[instrument(skip(self), fields(asset_id = %asset_id), err)]
    pub async fn post_unlinked(&self, asset_id: AssetId) -> Result<PostingReport, PostingError> {
        let mut tx = self.store.begin(asset_id).await?;
        let asset = tx.load_asset().await?;
        let records = tx.list_records().await?;

        let mut posted = Vec::new();
        let mut posted_amount = Money::ZERO;
        let mut already_linked = 0;

        for record in &records {
            if record.journal_ref.is_some() {
                already_linked += 1;
                continue;
            }

            let period = record.period_key();
            let entry = JournalEntry::balanced(
                format!("Depreciation {} {}", asset.code, period),
                self.accounts.lines_for(record.amount),
                Utc::now(),
            )?;
            let journal_ref = self.journal.post(entry)?;
            tx.attach_journal_ref(period, journal_ref).await?;

            posted.push((period, journal_ref));
            posted_amount += record.amount;
        }

        if let Err(e) = tx.commit().await {
            error!(
                error = %e,
                unlinked_entries = posted.len(),
                "journal links not committed; posted entries are unlinked"
            );
            return Err(e.into());
        }

        info!(
            posted = posted.len(),
            amount = %posted_amount,
            already_linked,
            "depreciation posted to journal"
        );
        Ok(PostingReport {
            asset_id,
            posted,
            posted_amount,
            already_linked,
        })
    }
}
