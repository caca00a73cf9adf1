//! Single-period append for usage-based methods.
//!
//! Usage for past periods is not known at run time, so usage-based assets are
//! never rebuilt: one run appends at most one record, continuing from the
//! asset's persisted totals.

use rust_decimal::Decimal;

use assetbook_core::{AssetId, Money};

use crate::error::{DepreciationError, SkipReason};
use crate::method::{self, DepreciationParams};
use crate::period::PeriodKey;
use crate::plan::{verify_series, LedgerPlan, LedgerSnapshot, RunContext};
use crate::record::DepreciationRecord;
use crate::schedule;
use crate::state::AssetLedgerState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsagePlan {
    pub asset_id: AssetId,
    /// The one record to append.
    pub record: DepreciationRecord,
    pub final_state: AssetLedgerState,
    pub previous_accumulated: Money,
}

impl UsagePlan {
    pub fn accumulated_delta(&self) -> Money {
        self.final_state.accumulated - self.previous_accumulated
    }
}

/// Plan the record for `target` given this period's `usage`.
///
/// A period that already has a record is skipped without touching anything,
/// which makes re-running a usage batch harmless.
pub fn plan_usage_period(
    snapshot: &LedgerSnapshot,
    target: PeriodKey,
    usage: Option<Decimal>,
    ctx: &RunContext,
) -> Result<LedgerPlan, DepreciationError> {
    let asset = &snapshot.asset;

    let period = match schedule::usage_period(target, &snapshot.existing_keys()) {
        Ok(period) => period,
        Err(reason) => return Ok(LedgerPlan::Skipped(reason)),
    };

    let last = snapshot.records.last();
    if let Some(latest) = last.map(DepreciationRecord::period_key) {
        if period < latest {
            return Err(DepreciationError::invalid_usage(
                asset.id,
                format!("period {period} precedes latest recorded period {latest}"),
            ));
        }
    }

    let params = DepreciationParams::from_asset(asset)?;
    let start = AssetLedgerState::from_live(asset, last.map_or(0, |r| r.period_number))?;

    let Some(amount) = method::compute_period(&params, &start.period_input(usage))? else {
        return Ok(LedgerPlan::Skipped(SkipReason::NothingDue(period)));
    };
    let after = start.apply(amount);
    let provenance = ctx.fresh_provenance();

    let record = DepreciationRecord {
        asset_id: asset.id,
        period_date: period.end_date(),
        period_number: after.period_counter,
        amount,
        accumulated_after: after.accumulated,
        book_value_after: after.book_value,
        method: asset.method,
        journal_ref: None,
        note: provenance.note,
        created_by: provenance.created_by,
        created_at: provenance.created_at,
    };
    verify_series(asset, start, std::slice::from_ref(&record), after)?;

    Ok(LedgerPlan::Usage(UsagePlan {
        asset_id: asset.id,
        record,
        final_state: after,
        previous_accumulated: asset.accumulated_depreciation,
    }))
}
