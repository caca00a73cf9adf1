//! Full historical rebuild for time-based methods.
//!
//! A changed start date or a historical correction can alter the starting book
//! value of every period, so time-based assets are always recomputed from the
//! first period. The result is a complete replacement record set; prior
//! records contribute only two things:
//!
//! 1. the pre-ledger baseline (see [`AssetLedgerState::from_baseline`]), and
//! 2. the provenance (journal reference, note, author, timestamp) of any period
//!    that still exists in the new series, carried over by the merge step.

use std::collections::{BTreeMap, BTreeSet};

use assetbook_core::{AssetId, JournalRef, Money};

use crate::asset::Asset;
use crate::error::DepreciationError;
use crate::method::{self, DepreciationParams};
use crate::period::PeriodKey;
use crate::plan::{verify_series, LedgerSnapshot, RunContext};
use crate::record::{DepreciationRecord, Provenance};
use crate::schedule;
use crate::state::AssetLedgerState;

/// Replacement record set for one time-based asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildPlan {
    pub asset_id: AssetId,
    pub records: Vec<DepreciationRecord>,
    pub initial_state: AssetLedgerState,
    pub final_state: AssetLedgerState,
    /// Regenerated periods that had no record before this run.
    pub new_periods: Vec<PeriodKey>,
    /// Regenerated periods that already had a record.
    pub reproduced_periods: Vec<PeriodKey>,
    /// Journal links on prior periods the new series no longer contains.
    pub orphaned_journal_refs: Vec<(PeriodKey, JournalRef)>,
    pub previous_accumulated: Money,
}

impl RebuildPlan {
    /// Sum of amounts over the newly caught-up periods.
    pub fn new_periods_amount(&self) -> Money {
        let new: BTreeSet<PeriodKey> = self.new_periods.iter().copied().collect();
        self.records
            .iter()
            .filter(|r| new.contains(&r.period_key()))
            .map(|r| r.amount)
            .sum()
    }

    pub fn accumulated_delta(&self) -> Money {
        self.final_state.accumulated - self.previous_accumulated
    }
}

/// One computed period before provenance is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PeriodDraft {
    key: PeriodKey,
    amount: Money,
    after: AssetLedgerState,
}

/// Recompute the whole series for a time-based asset through `target`.
///
/// The horizon is extended to the latest existing period so an early target
/// never drops periods that were already posted.
pub fn plan_rebuild(
    snapshot: &LedgerSnapshot,
    target: PeriodKey,
    ctx: &RunContext,
) -> Result<RebuildPlan, DepreciationError> {
    let asset = &snapshot.asset;
    let params = DepreciationParams::from_asset(asset)?;
    let start = asset
        .depreciation_start()
        .ok_or(DepreciationError::MissingStartDate(asset.id))?;

    let existing: BTreeMap<PeriodKey, &DepreciationRecord> = snapshot
        .records
        .iter()
        .map(|r| (r.period_key(), r))
        .collect();
    let horizon = existing
        .keys()
        .next_back()
        .map_or(target, |latest| (*latest).max(target));

    let initial = AssetLedgerState::from_baseline(asset, &snapshot.records)?;
    let drafts = project_series(&params, start, horizon, initial)?;
    let final_state = drafts.last().map_or(initial, |d| d.after);

    let merged = merge_with_existing(asset, &drafts, &existing, ctx);
    verify_series(asset, initial, &merged.records, final_state)?;

    Ok(RebuildPlan {
        asset_id: asset.id,
        records: merged.records,
        initial_state: initial,
        final_state,
        new_periods: merged.new_periods,
        reproduced_periods: merged.reproduced_periods,
        orphaned_journal_refs: merged.orphaned_journal_refs,
        previous_accumulated: asset.accumulated_depreciation,
    })
}

/// Apply the method period by period, strictly in order.
fn project_series(
    params: &DepreciationParams,
    start: chrono::NaiveDate,
    horizon: PeriodKey,
    initial: AssetLedgerState,
) -> Result<Vec<PeriodDraft>, DepreciationError> {
    let mut state = initial;
    let mut drafts = Vec::new();

    for key in schedule::enumerate_periods(start, horizon, params.useful_life_months) {
        let Some(amount) = method::compute_period(params, &state.period_input(None))? else {
            break;
        };
        state = state.apply(amount);
        drafts.push(PeriodDraft {
            key,
            amount,
            after: state,
        });
    }

    Ok(drafts)
}

struct Merged {
    records: Vec<DepreciationRecord>,
    new_periods: Vec<PeriodKey>,
    reproduced_periods: Vec<PeriodKey>,
    orphaned_journal_refs: Vec<(PeriodKey, JournalRef)>,
}

/// Join the new series with the old one on calendar period.
///
/// A regenerated period inherits the old record's provenance; a period that is
/// new gets the run's note and operator. Old periods that vanish surface their
/// journal references as orphans.
fn merge_with_existing(
    asset: &Asset,
    drafts: &[PeriodDraft],
    existing: &BTreeMap<PeriodKey, &DepreciationRecord>,
    ctx: &RunContext,
) -> Merged {
    let mut records = Vec::with_capacity(drafts.len());
    let mut new_periods = Vec::new();
    let mut reproduced_periods = Vec::new();

    for draft in drafts {
        let provenance = match existing.get(&draft.key) {
            Some(prior) => {
                reproduced_periods.push(draft.key);
                Provenance::from(*prior)
            }
            None => {
                new_periods.push(draft.key);
                ctx.fresh_provenance()
            }
        };

        records.push(DepreciationRecord {
            asset_id: asset.id,
            period_date: draft.key.end_date(),
            period_number: draft.after.period_counter,
            amount: draft.amount,
            accumulated_after: draft.after.accumulated,
            book_value_after: draft.after.book_value,
            method: asset.method,
            journal_ref: provenance.journal_ref,
            note: provenance.note,
            created_by: provenance.created_by,
            created_at: provenance.created_at,
        });
    }

    let regenerated: BTreeSet<PeriodKey> = drafts.iter().map(|d| d.key).collect();
    let orphaned_journal_refs = existing
        .iter()
        .filter(|(key, _)| !regenerated.contains(key))
        .filter_map(|(key, r)| r.journal_ref.map(|j| (*key, j)))
        .collect();

    Merged {
        records,
        new_periods,
        reproduced_periods,
        orphaned_journal_refs,
    }
}
