//! Batch depreciation runner.
//!
//! A batch names a target period and a set of assets. Each asset is processed
//! in its own unit of work:
//!
//! 1. `begin` (takes the asset's exclusive lock)
//! 2. load the asset and its records into an immutable snapshot
//! 3. plan the new record set with the pure engine
//! 4. write the plan (delete + insert + totals, or a single append) and commit
//!
//! Any error before commit drops the transaction, which rolls back every staged
//! write. Errors are collected per asset; they never abort sibling assets.
//!
//! ## Scheduling
//!
//! Assets run in parallel up to `max_concurrency`. Once `batch_timeout` has
//! elapsed no further asset is started; assets already in flight finish (or
//! fail) atomically, and the rest are reported as [`RunError::NotScheduled`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn, Span};

use assetbook_core::{AssetId, JournalRef, Money, UserId};
use assetbook_depreciation::{
    plan, schedule, Asset, DepreciationError, LedgerPlan, LedgerSnapshot, PeriodKey, RebuildPlan,
    RunContext, SkipReason,
};

use crate::config::RunnerConfig;
use crate::ledger_store::{AssetFilter, LedgerStore, StoreError};

/// Failure of one asset within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error(transparent)]
    Depreciation(#[from] DepreciationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The batch timeout elapsed before this asset was started.
    #[error("batch timeout elapsed before the asset was scheduled")]
    NotScheduled,

    #[error("asset task aborted: {0}")]
    Aborted(String),
}

impl RunError {
    /// Reported-and-skipped, as opposed to a rolled-back failure.
    pub fn is_skip(&self) -> bool {
        match self {
            RunError::Depreciation(e) => e.is_skip(),
            RunError::NotScheduled => true,
            _ => false,
        }
    }
}

/// Batch invocation: target period, assets, per-asset usage and a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    /// Any date inside the target period.
    pub target_date: NaiveDate,
    /// Assets to process; empty means every active asset.
    pub asset_ids: Vec<AssetId>,
    /// Hours used / units produced this period, for usage-based assets.
    pub usage: HashMap<AssetId, Decimal>,
    pub note: Option<String>,
    pub operator: Option<UserId>,
}

impl BatchRequest {
    pub fn new(target_date: NaiveDate) -> Self {
        Self {
            target_date,
            asset_ids: Vec::new(),
            usage: HashMap::new(),
            note: None,
            operator: None,
        }
    }

    pub fn with_assets(mut self, asset_ids: impl IntoIterator<Item = AssetId>) -> Self {
        self.asset_ids.extend(asset_ids);
        self
    }

    pub fn with_usage(mut self, asset_id: AssetId, usage: Decimal) -> Self {
        self.usage.insert(asset_id, usage);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_operator(mut self, operator: UserId) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn target_period(&self) -> PeriodKey {
        PeriodKey::of(self.target_date)
    }
}

/// What a rebuild changed, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildSummary {
    /// Periods caught up by this run.
    pub new_periods: Vec<PeriodKey>,
    /// Periods that existed before and were regenerated.
    pub reproduced_periods: usize,
    /// Sum of amounts over `new_periods`.
    pub new_amount: Money,
    /// Change of the asset's accumulated depreciation.
    pub accumulated_delta: Money,
    pub orphaned_journal_refs: Vec<(PeriodKey, JournalRef)>,
}

impl From<&RebuildPlan> for RebuildSummary {
    fn from(plan: &RebuildPlan) -> Self {
        Self {
            new_periods: plan.new_periods.clone(),
            reproduced_periods: plan.reproduced_periods.len(),
            new_amount: plan.new_periods_amount(),
            accumulated_delta: plan.accumulated_delta(),
            orphaned_journal_refs: plan.orphaned_journal_refs.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOutcome {
    NotEligible(SkipReason),
    Skipped(SkipReason),
    UsageProcessed { period: PeriodKey, amount: Money },
    Rebuilt(RebuildSummary),
    Failed(RunError),
}

impl AssetOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AssetOutcome::NotEligible(_) => "not_eligible",
            AssetOutcome::Skipped(_) => "skipped",
            AssetOutcome::UsageProcessed { .. } => "usage_processed",
            AssetOutcome::Rebuilt(_) => "rebuilt",
            AssetOutcome::Failed(_) => "failed",
        }
    }
}

/// Result for one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReport {
    pub asset_id: AssetId,
    /// Unknown when the asset could not be loaded.
    pub asset_code: Option<String>,
    pub outcome: AssetOutcome,
}

impl AssetReport {
    fn failed(asset_id: AssetId, asset_code: Option<String>, error: RunError) -> Self {
        Self {
            asset_id,
            asset_code,
            outcome: AssetOutcome::Failed(error),
        }
    }

    /// Amount over the periods this run added.
    pub fn amount_total(&self) -> Money {
        match &self.outcome {
            AssetOutcome::UsageProcessed { amount, .. } => *amount,
            AssetOutcome::Rebuilt(summary) => summary.new_amount,
            _ => Money::ZERO,
        }
    }

    /// Periods this run added (reproduced periods excluded).
    pub fn periods_processed(&self) -> usize {
        match &self.outcome {
            AssetOutcome::UsageProcessed { .. } => 1,
            AssetOutcome::Rebuilt(summary) => summary.new_periods.len(),
            _ => 0,
        }
    }

    pub fn periods_reproduced(&self) -> usize {
        match &self.outcome {
            AssetOutcome::Rebuilt(summary) => summary.reproduced_periods,
            _ => 0,
        }
    }

    pub fn error(&self) -> Option<&RunError> {
        match &self.outcome {
            AssetOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub target_period: PeriodKey,
    /// One report per requested asset, in request order.
    pub reports: Vec<AssetReport>,
}

impl BatchResult {
    pub fn total_amount(&self) -> Money {
        self.reports.iter().map(AssetReport::amount_total).sum()
    }

    pub fn total_periods(&self) -> usize {
        self.reports.iter().map(AssetReport::periods_processed).sum()
    }

    pub fn total_reproduced(&self) -> usize {
        self.reports.iter().map(AssetReport::periods_reproduced).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &AssetReport> {
        self.reports.iter().filter(|r| r.error().is_some())
    }

    pub fn report(&self, asset_id: AssetId) -> Option<&AssetReport> {
        self.reports.iter().find(|r| r.asset_id == asset_id)
    }
}

/// Dry-run of one asset against a target period. Nothing is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub asset: Asset,
    pub target_period: PeriodKey,
    /// Periods due through the target that have no record yet.
    pub missing_periods: Vec<PeriodKey>,
    pub plan: LedgerPlan,
}

/// Upper bound on how far out a batch deadline is placed.
const MAX_BATCH_TIMEOUT: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// `now + timeout`, saturating at [`MAX_BATCH_TIMEOUT`].
fn batch_deadline(now: Instant, timeout: Duration) -> Instant {
    now + timeout.min(MAX_BATCH_TIMEOUT)
}

/// Orchestrates batch runs over a [`LedgerStore`].
#[derive(Clone)]
pub struct DepreciationRunner {
    store: Arc<dyn LedgerStore>,
    config: RunnerConfig,
}

impl DepreciationRunner {
    pub fn new(store: Arc<dyn LedgerStore>, config: RunnerConfig) -> Self {
        Self { store, config }
    }

    fn run_context(&self, note: Option<String>, operator: Option<UserId>) -> RunContext {
        let ctx = RunContext::new(Utc::now())
            .with_note(note.unwrap_or_else(|| self.config.default_note.clone()));
        match operator {
            Some(op) => ctx.with_operator(op),
            None => ctx,
        }
    }

    /// Run one batch. Only the initial asset lookup can fail the whole batch.
    #[instrument(
        skip(self, request),
        fields(target_period = %request.target_period(), assets = tracing::field::Empty)
    )]
    pub async fn run_batch(&self, request: BatchRequest) -> Result<BatchResult, StoreError> {
        let target = request.target_period();
        let deadline = batch_deadline(Instant::now(), self.config.batch_timeout);

        let asset_ids = if request.asset_ids.is_empty() {
            self.store
                .load_eligible_assets(&AssetFilter::all())
                .await?
                .into_iter()
                .map(|a| a.id)
                .collect()
        } else {
            let mut seen = HashSet::new();
            request
                .asset_ids
                .iter()
                .copied()
                .filter(|id| seen.insert(*id))
                .collect::<Vec<_>>()
        };
        Span::current().record("assets", asset_ids.len());

        let ctx = Arc::new(self.run_context(request.note.clone(), request.operator));
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut reports: Vec<Option<AssetReport>> = vec![None; asset_ids.len()];

        for (idx, &asset_id) in asset_ids.iter().enumerate() {
            let permit = if Instant::now() >= deadline {
                None
            } else {
                tokio::time::timeout_at(deadline, semaphore.clone().acquire_owned())
                    .await
                    .ok()
                    .and_then(Result::ok)
            };
            let Some(permit) = permit else {
                warn!(asset_id = %asset_id, "batch timeout elapsed; asset not scheduled");
                reports[idx] = Some(AssetReport::failed(asset_id, None, RunError::NotScheduled));
                continue;
            };

            let runner = self.clone();
            let ctx = ctx.clone();
            let usage = request.usage.get(&asset_id).copied();
            tasks.spawn(async move {
                let report = runner.process_asset(asset_id, target, usage, &ctx).await;
                drop(permit);
                (idx, report)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, report)) => reports[idx] = Some(report),
                Err(e) => error!(error = %e, "asset task did not complete"),
            }
        }

        let reports: Vec<AssetReport> = reports
            .into_iter()
            .zip(&asset_ids)
            .map(|(report, &asset_id)| {
                report.unwrap_or_else(|| {
                    AssetReport::failed(
                        asset_id,
                        None,
                        RunError::Aborted("task panicked or was cancelled".to_string()),
                    )
                })
            })
            .collect();

        let result = BatchResult {
            target_period: target,
            reports,
        };
        info!(
            total_amount = %result.total_amount(),
            total_periods = result.total_periods(),
            reproduced_periods = result.total_reproduced(),
            failures = result.failures().count(),
            "depreciation batch finished"
        );
        Ok(result)
    }

    #[instrument(skip(self, ctx), fields(asset_id = %asset_id, asset_code = tracing::field::Empty))]
    async fn process_asset(
        &self,
        asset_id: AssetId,
        target: PeriodKey,
        usage: Option<Decimal>,
        ctx: &RunContext,
    ) -> AssetReport {
        let mut asset_code = None;
        let outcome = match self
            .apply_asset(asset_id, target, usage, ctx, &mut asset_code)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) if e.is_skip() => {
                warn!(error = %e, "asset skipped");
                AssetOutcome::Failed(e)
            }
            Err(e) => {
                error!(error = %e, "asset unit of work rolled back");
                AssetOutcome::Failed(e)
            }
        };

        AssetReport {
            asset_id,
            asset_code,
            outcome,
        }
    }

    /// One asset's unit of work. Returning early drops the transaction (rollback).
    async fn apply_asset(
        &self,
        asset_id: AssetId,
        target: PeriodKey,
        usage: Option<Decimal>,
        ctx: &RunContext,
        asset_code: &mut Option<String>,
    ) -> Result<AssetOutcome, RunError> {
        let mut tx = self.store.begin(asset_id).await?;
        let asset = tx.load_asset().await?;
        Span::current().record("asset_code", asset.code.as_str());
        *asset_code = Some(asset.code.clone());

        let records = tx.list_records().await?;
        let snapshot = LedgerSnapshot::new(asset, records);

        match plan(&snapshot, target, usage, ctx)? {
            LedgerPlan::NotEligible(reason) => {
                debug!(%reason, "asset not eligible");
                Ok(AssetOutcome::NotEligible(reason))
            }
            LedgerPlan::Skipped(reason) => {
                debug!(%reason, "nothing to write");
                Ok(AssetOutcome::Skipped(reason))
            }
            LedgerPlan::Usage(p) => {
                tx.insert_records(std::slice::from_ref(&p.record)).await?;
                tx.update_asset_totals(p.final_state.accumulated, p.final_state.book_value)
                    .await?;
                tx.commit().await?;

                info!(
                    period = %p.record.period_key(),
                    amount = %p.record.amount,
                    book_value = %p.final_state.book_value,
                    "usage period recorded"
                );
                Ok(AssetOutcome::UsageProcessed {
                    period: p.record.period_key(),
                    amount: p.record.amount,
                })
            }
            LedgerPlan::Rebuild(p) => {
                tx.delete_records().await?;
                tx.insert_records(&p.records).await?;
                tx.update_asset_totals(p.final_state.accumulated, p.final_state.book_value)
                    .await?;
                tx.commit().await?;

                for (period, journal_ref) in &p.orphaned_journal_refs {
                    warn!(%period, %journal_ref, "journal entry no longer matches any period");
                }
                let summary = RebuildSummary::from(&p);
                info!(
                    new_periods = summary.new_periods.len(),
                    reproduced_periods = summary.reproduced_periods,
                    amount = %summary.new_amount,
                    accumulated_delta = %summary.accumulated_delta,
                    book_value = %p.final_state.book_value,
                    "ledger rebuilt"
                );
                Ok(AssetOutcome::Rebuilt(summary))
            }
        }
    }

    /// Plan one asset against `target_date` from committed state, without writing.
    #[instrument(skip(self), fields(asset_id = %asset_id), err)]
    pub async fn preview(
        &self,
        asset_id: AssetId,
        target_date: NaiveDate,
        usage: Option<Decimal>,
    ) -> Result<Preview, RunError> {
        let asset = self.store.get_asset(asset_id).await?;
        let records = self.store.list_records(asset_id).await?;
        let snapshot = LedgerSnapshot::new(asset, records);
        let target = PeriodKey::of(target_date);

        let missing_periods = match snapshot.asset.depreciation_start() {
            Some(start) if !snapshot.asset.method.is_usage_based() => {
                schedule::enumerate_missing_periods(
                    start,
                    target,
                    &snapshot.existing_keys(),
                    snapshot.asset.useful_life_months,
                )
            }
            _ => Vec::new(),
        };

        let ctx = self.run_context(None, None);
        let plan = plan(&snapshot, target, usage, &ctx)?;

        Ok(Preview {
            asset: snapshot.asset,
            target_period: target,
            missing_periods,
            plan,
        })
    }
}
