//! Eligibility check and dispatch to the right recompute strategy.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use assetbook_core::UserId;

use crate::asset::Asset;
use crate::error::{DepreciationError, SkipReason};
use crate::period::PeriodKey;
use crate::rebuild::{plan_rebuild, RebuildPlan};
use crate::record::{DepreciationRecord, Provenance};
use crate::state::AssetLedgerState;
use crate::usage::{plan_usage_period, UsagePlan};

/// Immutable view of one asset and its existing records, read under the
/// asset's lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub asset: Asset,
    /// Existing records, ascending by period.
    pub records: Vec<DepreciationRecord>,
}

impl LedgerSnapshot {
    pub fn new(asset: Asset, mut records: Vec<DepreciationRecord>) -> Self {
        records.sort_by_key(|r| (r.period_date, r.period_number));
        Self { asset, records }
    }

    pub fn existing_keys(&self) -> BTreeSet<PeriodKey> {
        self.records.iter().map(DepreciationRecord::period_key).collect()
    }
}

/// Who runs the batch, with what note, at what time. Keeps planning free of clocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub operator: Option<UserId>,
    pub note: Option<String>,
    pub now: DateTime<Utc>,
}

impl RunContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            operator: None,
            note: None,
            now,
        }
    }

    pub fn with_operator(mut self, operator: UserId) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Provenance stamped on periods that did not exist before this run.
    pub(crate) fn fresh_provenance(&self) -> Provenance {
        Provenance {
            journal_ref: None,
            note: self.note.clone(),
            created_by: self.operator,
            created_at: self.now,
        }
    }
}

/// Outcome of planning one asset. Nothing has been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerPlan {
    /// Inactive or fully depreciated; no records produced.
    NotEligible(SkipReason),
    /// Eligible, but this run has nothing to write (e.g. duplicate usage period).
    Skipped(SkipReason),
    /// Usage-based: exactly one appended record.
    Usage(UsagePlan),
    /// Time-based: full replacement record set.
    Rebuild(RebuildPlan),
}

/// Plan the run for one asset against `target`.
///
/// `usage` is only consulted for usage-based methods.
pub fn plan(
    snapshot: &LedgerSnapshot,
    target: PeriodKey,
    usage: Option<Decimal>,
    ctx: &RunContext,
) -> Result<LedgerPlan, DepreciationError> {
    if let Err(reason) = snapshot.asset.eligibility() {
        return Ok(LedgerPlan::NotEligible(reason));
    }

    if snapshot.asset.method.is_usage_based() {
        plan_usage_period(snapshot, target, usage, ctx)
    } else {
        let rebuild = plan_rebuild(snapshot, target, ctx)?;
        if life_exhausted(snapshot, &rebuild) {
            return Ok(LedgerPlan::NotEligible(SkipReason::FullyDepreciated));
        }
        Ok(LedgerPlan::Rebuild(rebuild))
    }
}

/// The whole useful life is already on the ledger and regenerating it would
/// change nothing. A rounding residual above salvage can remain on such assets.
fn life_exhausted(snapshot: &LedgerSnapshot, rebuild: &RebuildPlan) -> bool {
    rebuild.final_state.period_counter >= snapshot.asset.useful_life_months
        && rebuild.new_periods.is_empty()
        && rebuild.orphaned_journal_refs.is_empty()
        && rebuild.final_state.accumulated == snapshot.asset.accumulated_depreciation
        && rebuild.records == snapshot.records
}

/// Check a freshly computed series before anything is written.
///
/// `start` is the state before the first record in `records`.
pub(crate) fn verify_series(
    asset: &Asset,
    start: AssetLedgerState,
    records: &[DepreciationRecord],
    final_state: AssetLedgerState,
) -> Result<(), DepreciationError> {
    let fail = |reason: String| Err(DepreciationError::inconsistent(asset.id, reason));

    let mut accumulated = start.accumulated;
    let mut number = start.period_counter;
    let mut last_key: Option<PeriodKey> = None;

    for r in records {
        let key = r.period_key();
        if !r.amount.is_positive() {
            return fail(format!("period {key} has non-positive amount {}", r.amount));
        }
        if last_key.is_some_and(|prev| key <= prev) {
            return fail(format!("period {key} is out of order"));
        }
        if r.period_number != number + 1 {
            return fail(format!(
                "period {key} has number {} after {number}",
                r.period_number
            ));
        }
        if r.accumulated_after != accumulated + r.amount {
            return fail(format!("period {key} accumulated total does not add up"));
        }
        if r.book_value_after != asset.acquisition_cost - r.accumulated_after {
            return fail(format!("period {key} book value does not match cost minus accumulated"));
        }
        if r.book_value_after < asset.salvage_value {
            return fail(format!(
                "period {key} book value {} is below salvage {}",
                r.book_value_after, asset.salvage_value
            ));
        }
        accumulated = r.accumulated_after;
        number = r.period_number;
        last_key = Some(key);
    }

    if accumulated != final_state.accumulated || number != final_state.period_counter {
        return fail("final totals do not match the last record".to_string());
    }
    Ok(())
}
