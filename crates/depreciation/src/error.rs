//! Error and skip taxonomy for a single asset's run.

use thiserror::Error;

use assetbook_core::AssetId;

use crate::asset::AssetStatus;
use crate::period::PeriodKey;

/// Why an asset produced no records without anything being wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("asset is {}", .0.as_str())]
    Inactive(AssetStatus),

    #[error("asset is fully depreciated")]
    FullyDepreciated,

    #[error("a record already exists for period {0}")]
    DuplicatePeriod(PeriodKey),

    /// The period's amount rounds or clamps to zero.
    #[error("nothing to depreciate for period {0}")]
    NothingDue(PeriodKey),
}

/// Failure of one asset's run. Never aborts sibling assets in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DepreciationError {
    /// Time-based asset without a start date or an acquisition date.
    #[error("asset {0} has neither a depreciation start date nor an acquisition date")]
    MissingStartDate(AssetId),

    /// Usage-based asset with missing, zero or negative usage for the period.
    #[error("invalid usage for asset {asset_id}: {reason}")]
    InvalidUsage { asset_id: AssetId, reason: String },

    /// Method parameters that make the formula undefined (e.g. zero useful life).
    #[error("invalid depreciation parameters for asset {asset_id}: {reason}")]
    InvalidParameters { asset_id: AssetId, reason: String },

    /// The ledger invariant cannot hold (book value below salvage, negative cost, ...).
    #[error("inconsistent ledger state for asset {asset_id}: {reason}")]
    InconsistentState { asset_id: AssetId, reason: String },
}

impl DepreciationError {
    pub fn invalid_usage(asset_id: AssetId, reason: impl Into<String>) -> Self {
        Self::InvalidUsage {
            asset_id,
            reason: reason.into(),
        }
    }

    pub fn invalid_parameters(asset_id: AssetId, reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            asset_id,
            reason: reason.into(),
        }
    }

    pub fn inconsistent(asset_id: AssetId, reason: impl Into<String>) -> Self {
        Self::InconsistentState {
            asset_id,
            reason: reason.into(),
        }
    }

    /// Skip-and-report errors, as opposed to aborted runs.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            DepreciationError::MissingStartDate(_) | DepreciationError::InvalidUsage { .. }
        )
    }
}
