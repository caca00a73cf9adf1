use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use assetbook_core::{AssetId, JournalRef, Money, UserId};

use crate::asset::DepreciationMethod;
use crate::period::PeriodKey;

/// One posted depreciation period for one asset.
///
/// Keyed by `(asset_id, period_key())`. For a given asset the records ordered
/// by `period_number` have non-decreasing `accumulated_after`, and the last one
/// matches the asset's running totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepreciationRecord {
    pub asset_id: AssetId,
    /// Last day of the period's month.
    pub period_date: NaiveDate,
    /// 1-based position in the asset's series.
    pub period_number: u32,
    pub amount: Money,
    pub accumulated_after: Money,
    pub book_value_after: Money,
    pub method: DepreciationMethod,
    /// Weak link to a general-ledger entry; never owned by the engine.
    pub journal_ref: Option<JournalRef>,
    pub note: Option<String>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl DepreciationRecord {
    pub fn period_key(&self) -> PeriodKey {
        PeriodKey::of(self.period_date)
    }
}

/// Fields a record keeps across a rebuild when its period is regenerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub journal_ref: Option<JournalRef>,
    pub note: Option<String>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl From<&DepreciationRecord> for Provenance {
    fn from(record: &DepreciationRecord) -> Self {
        Self {
            journal_ref: record.journal_ref,
            note: record.note.clone(),
            created_by: record.created_by,
            created_at: record.created_at,
        }
    }
}
