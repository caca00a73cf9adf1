//! Running amortization state for one asset during a recompute.

use rust_decimal::Decimal;

use assetbook_core::Money;

use crate::asset::Asset;
use crate::error::DepreciationError;
use crate::method::PeriodInput;
use crate::record::DepreciationRecord;

/// Book value, accumulated depreciation and period counter, threaded through
/// the period loop by value. Only the final state is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetLedgerState {
    pub book_value: Money,
    pub accumulated: Money,
    pub period_counter: u32,
}

impl AssetLedgerState {
    /// Continue from the asset's persisted totals (usage-based append).
    pub fn from_live(asset: &Asset, last_period_number: u32) -> Result<Self, DepreciationError> {
        let expected_book = asset.acquisition_cost - asset.accumulated_depreciation;
        if asset.current_book_value != expected_book {
            return Err(DepreciationError::inconsistent(
                asset.id,
                format!(
                    "book value {} does not equal cost minus accumulated depreciation ({})",
                    asset.current_book_value, expected_book
                ),
            ));
        }
        Ok(Self {
            book_value: asset.current_book_value,
            accumulated: asset.accumulated_depreciation,
            period_counter: last_period_number,
        })
    }

    /// Start of a full rebuild.
    ///
    /// The baseline is whatever accumulated depreciation the ledger does not
    /// explain (pre-ledger history, manual corrections): persisted accumulated
    /// minus the sum of existing record amounts, floored at zero.
    pub fn from_baseline(
        asset: &Asset,
        existing: &[DepreciationRecord],
    ) -> Result<Self, DepreciationError> {
        let recorded: Money = existing.iter().map(|r| r.amount).sum();
        let baseline = (asset.accumulated_depreciation - recorded).non_negative();
        let book_value = asset.acquisition_cost - baseline;

        if book_value < asset.salvage_value {
            return Err(DepreciationError::inconsistent(
                asset.id,
                format!(
                    "pre-ledger depreciation {} leaves book value {} below salvage {}",
                    baseline, book_value, asset.salvage_value
                ),
            ));
        }

        Ok(Self {
            book_value,
            accumulated: baseline,
            period_counter: 0,
        })
    }

    pub fn period_input(&self, usage: Option<Decimal>) -> PeriodInput {
        PeriodInput {
            book_value_at_start: self.book_value,
            periods_elapsed: self.period_counter,
            usage,
        }
    }

    /// State after one more period of `amount`.
    #[must_use]
    pub fn apply(self, amount: Money) -> Self {
        Self {
            book_value: self.book_value - amount,
            accumulated: self.accumulated + amount,
            period_counter: self.period_counter + 1,
        }
    }
}
