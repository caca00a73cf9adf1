//! Integration tests for the full depreciation pipeline.
//!
//! Tests: BatchRequest → DepreciationRunner → engine → LedgerStore → posting
//!
//! Verifies:
//! - Catch-up, idempotent re-runs and the sum / floor invariants after a run
//! - Usage duplicate guard, also under concurrent batches
//! - Per-asset rollback and partial-failure semantics
//! - Journal references survive a start-date correction

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use assetbook_accounting::{InMemoryJournal, Journal};
    use assetbook_core::{AssetId, Money};
    use assetbook_depreciation::{
        Asset, AssetStatus, DepreciationError, DepreciationMethod, LedgerPlan, PeriodKey,
        SkipReason,
    };

    use crate::config::{PostingConfig, RunnerConfig, ENV_BATCH_TIMEOUT_SECS};
    use crate::ledger_store::{InMemoryLedgerStore, LedgerStore, StoreError};
    use crate::posting::JournalPostingService;
    use crate::runner::{AssetOutcome, BatchRequest, DepreciationRunner, RunError};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn key(y: i32, m: u32) -> PeriodKey {
        PeriodKey::new(y, m).unwrap()
    }

    fn setup(config: RunnerConfig) -> (InMemoryLedgerStore, DepreciationRunner) {
        let store = InMemoryLedgerStore::new();
        let runner = DepreciationRunner::new(Arc::new(store.clone()), config);
        (store, runner)
    }

    fn straight_line(code: &str, cost: i64, life: u32, start: NaiveDate) -> Asset {
        Asset::new(code, DepreciationMethod::StraightLine, Money::from_major(cost), Money::ZERO)
            .with_useful_life(life)
            .with_start_date(start)
    }

    fn service_hours_machine() -> Asset {
        Asset::new(
            "FA-HRS",
            DepreciationMethod::ServiceHours,
            Money::from_major(10_000_000),
            Money::from_major(1_000_000),
        )
        .with_service_hours(9_000)
        .with_start_date(date(2026, 1, 1))
    }

    /// Sum and floor invariants over committed state.
    async fn assert_ledger_consistent(store: &InMemoryLedgerStore, asset_id: AssetId) {
        let asset = store.get_asset(asset_id).await.unwrap();
        let records = store.list_records(asset_id).await.unwrap();

        let total: Money = records.iter().map(|r| r.amount).sum();
        assert_eq!(total, asset.accumulated_depreciation);
        assert_eq!(
            asset.current_book_value,
            asset.acquisition_cost - asset.accumulated_depreciation
        );
        for pair in records.windows(2) {
            assert!(pair[0].accumulated_after <= pair[1].accumulated_after);
            assert_eq!(pair[0].period_number + 1, pair[1].period_number);
        }
        for r in &records {
            assert!(r.book_value_after >= asset.salvage_value);
        }
        if let Some(last) = records.last() {
            assert_eq!(last.book_value_after, asset.current_book_value);
        }
    }

    #[tokio::test]
    async fn missed_months_are_caught_up_and_reported() {
        let (store, runner) = setup(RunnerConfig::default());
        let asset = straight_line("FA-B", 12_000_000, 60, date(2026, 4, 18));
        store.insert_asset(asset.clone()).unwrap();

        let result = runner
            .run_batch(BatchRequest::new(date(2026, 10, 18)).with_assets([asset.id]))
            .await
            .unwrap();

        let report = result.report(asset.id).unwrap();
        assert_eq!(report.asset_code.as_deref(), Some("FA-B"));
        assert_eq!(report.periods_processed(), 6);
        assert_eq!(report.amount_total(), Money::from_major(1_200_000));
        assert_eq!(result.total_periods(), 6);
        assert_eq!(result.total_amount(), Money::from_major(1_200_000));

        let records = store.list_records(asset.id).await.unwrap();
        assert_eq!(records.len(), 6);
        assert_eq!(records[0].note.as_deref(), Some("Monthly depreciation"));
        assert_ledger_consistent(&store, asset.id).await;
    }

    #[tokio::test]
    async fn rerun_reproduces_the_same_ledger() {
        let (store, runner) = setup(RunnerConfig::default());
        let asset = straight_line("FA-1", 36_000, 36, date(2025, 1, 10));
        store.insert_asset(asset.clone()).unwrap();

        let request = BatchRequest::new(date(2026, 6, 30));
        runner.run_batch(request.clone()).await.unwrap();
        let before = store.list_records(asset.id).await.unwrap();

        let again = runner
            .run_batch(request.with_note("second pass"))
            .await
            .unwrap();
        let report = again.report(asset.id).unwrap();
        assert_eq!(report.periods_processed(), 0);
        assert_eq!(report.periods_reproduced(), before.len());
        assert_eq!(report.amount_total(), Money::ZERO);

        assert_eq!(store.list_records(asset.id).await.unwrap(), before);
        assert_ledger_consistent(&store, asset.id).await;
    }

    #[tokio::test]
    async fn straight_line_asset_stops_at_end_of_life() {
        let (store, runner) = setup(RunnerConfig::default());
        let asset = straight_line("FA-A", 12_000_000, 12, date(2025, 9, 15));
        store.insert_asset(asset.clone()).unwrap();

        runner
            .run_batch(BatchRequest::new(date(2026, 12, 1)))
            .await
            .unwrap();
        let records = store.list_records(asset.id).await.unwrap();
        assert_eq!(records.len(), 12);
        assert!(records.iter().all(|r| r.amount == Money::from_major(1_000_000)));

        let stored = store.get_asset(asset.id).await.unwrap();
        assert_eq!(stored.current_book_value, Money::ZERO);

        let later = runner
            .run_batch(BatchRequest::new(date(2027, 1, 1)).with_assets([asset.id]))
            .await
            .unwrap();
        assert_eq!(
            later.report(asset.id).unwrap().outcome,
            AssetOutcome::NotEligible(SkipReason::FullyDepreciated)
        );
    }

    #[tokio::test]
    async fn rounding_residual_does_not_keep_asset_in_rotation() {
        let (store, runner) = setup(RunnerConfig::default());
        let asset = straight_line("FA-R", 1_000, 3, date(2026, 1, 10));
        store.insert_asset(asset.clone()).unwrap();

        runner
            .run_batch(BatchRequest::new(date(2026, 6, 30)))
            .await
            .unwrap();
        let stored = store.get_asset(asset.id).await.unwrap();
        assert_eq!(store.list_records(asset.id).await.unwrap().len(), 3);
        assert!(stored.current_book_value > Money::ZERO);

        let later = runner
            .run_batch(BatchRequest::new(date(2026, 7, 31)).with_assets([asset.id]))
            .await
            .unwrap();
        assert_eq!(
            later.report(asset.id).unwrap().outcome,
            AssetOutcome::NotEligible(SkipReason::FullyDepreciated)
        );
        assert_eq!(store.get_asset(asset.id).await.unwrap(), stored);
        assert_ledger_consistent(&store, asset.id).await;
    }

    #[tokio::test]
    async fn usage_period_is_recorded_once() {
        let (store, runner) = setup(RunnerConfig::default());
        let machine = service_hours_machine();
        store.insert_asset(machine.clone()).unwrap();

        let request = BatchRequest::new(date(2026, 10, 31))
            .with_assets([machine.id])
            .with_usage(machine.id, dec!(100));
        let first = runner.run_batch(request.clone()).await.unwrap();
        assert_eq!(
            first.report(machine.id).unwrap().outcome,
            AssetOutcome::UsageProcessed {
                period: key(2026, 10),
                amount: Money::from_major(100_000),
            }
        );

        let second = runner
            .run_batch(request.with_usage(machine.id, dec!(250)))
            .await
            .unwrap();
        assert_eq!(
            second.report(machine.id).unwrap().outcome,
            AssetOutcome::Skipped(SkipReason::DuplicatePeriod(key(2026, 10)))
        );

        let stored = store.get_asset(machine.id).await.unwrap();
        assert_eq!(stored.accumulated_depreciation, Money::from_major(100_000));
        assert_eq!(store.list_records(machine.id).await.unwrap().len(), 1);
        assert_ledger_consistent(&store, machine.id).await;
    }

    #[tokio::test]
    async fn concurrent_batches_do_not_double_count_usage() {
        let (store, runner) = setup(RunnerConfig::default());
        let machine = service_hours_machine();
        store.insert_asset(machine.clone()).unwrap();

        let request = BatchRequest::new(date(2026, 10, 31)).with_usage(machine.id, dec!(100));
        let (a, b) = tokio::join!(
            runner.run_batch(request.clone()),
            runner.run_batch(request.clone())
        );

        let labels = [a.unwrap(), b.unwrap()]
            .map(|r| r.report(machine.id).unwrap().outcome.label());
        assert!(labels.contains(&"usage_processed"));
        assert!(labels.contains(&"skipped"));
        assert_eq!(store.list_records(machine.id).await.unwrap().len(), 1);
        assert_ledger_consistent(&store, machine.id).await;
    }

    #[tokio::test]
    async fn missing_usage_is_reported_and_skipped() {
        let (store, runner) = setup(RunnerConfig::default());
        let machine = service_hours_machine();
        store.insert_asset(machine.clone()).unwrap();

        let result = runner
            .run_batch(BatchRequest::new(date(2026, 10, 31)).with_assets([machine.id]))
            .await
            .unwrap();
        let error = result.report(machine.id).unwrap().error().cloned().unwrap();
        assert!(matches!(
            error,
            RunError::Depreciation(DepreciationError::InvalidUsage { .. })
        ));
        assert!(error.is_skip());
        assert!(store.list_records(machine.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_unit_of_work_leaves_prior_ledger_intact() {
        let (store, runner) = setup(RunnerConfig::default());
        let healthy = straight_line("FA-1", 24_000, 24, date(2025, 9, 1));
        let failing = straight_line("FA-2", 24_000, 24, date(2025, 9, 1));
        let inactive = straight_line("FA-3", 24_000, 24, date(2025, 9, 1))
            .with_status(AssetStatus::Inactive);
        for a in [&healthy, &failing, &inactive] {
            store.insert_asset(a.clone()).unwrap();
        }
        runner
            .run_batch(BatchRequest::new(date(2026, 3, 1)))
            .await
            .unwrap();
        let before = store.list_records(failing.id).await.unwrap();
        assert_eq!(before.len(), 6);

        // Start date corrected, but every write for FA-2 fails.
        let mut corrected = store.get_asset(failing.id).await.unwrap();
        corrected.depreciation_start_date = Some(date(2025, 6, 1));
        store.insert_asset(corrected).unwrap();
        store.fail_writes_for(failing.id);

        let result = runner
            .run_batch(
                BatchRequest::new(date(2026, 4, 1))
                    .with_assets([healthy.id, failing.id, inactive.id, AssetId::new()]),
            )
            .await
            .unwrap();

        assert_eq!(result.reports.len(), 4);
        assert_eq!(result.report(healthy.id).unwrap().periods_processed(), 1);
        assert!(matches!(
            result.report(failing.id).unwrap().error(),
            Some(RunError::Store(StoreError::Storage(_)))
        ));
        assert_eq!(
            result.report(inactive.id).unwrap().outcome,
            AssetOutcome::NotEligible(SkipReason::Inactive(AssetStatus::Inactive))
        );
        assert!(matches!(
            result.reports[3].error(),
            Some(RunError::Store(StoreError::NotFound(_)))
        ));
        assert_eq!(result.failures().count(), 2);

        assert_eq!(store.list_records(failing.id).await.unwrap(), before);
        assert_ledger_consistent(&store, failing.id).await;

        store.clear_faults();
        let retry = runner
            .run_batch(BatchRequest::new(date(2026, 4, 1)).with_assets([failing.id]))
            .await
            .unwrap();
        // Three earlier months appear, plus the new target month.
        assert_eq!(retry.report(failing.id).unwrap().periods_processed(), 4);
        assert_ledger_consistent(&store, failing.id).await;
    }

    #[tokio::test]
    async fn elapsed_timeout_schedules_nothing() {
        let (store, runner) = setup(RunnerConfig::default().with_batch_timeout(Duration::ZERO));
        let a = straight_line("FA-1", 1_200, 12, date(2026, 1, 1));
        store.insert_asset(a.clone()).unwrap();

        let result = runner
            .run_batch(BatchRequest::new(date(2026, 10, 1)))
            .await
            .unwrap();
        assert_eq!(
            result.report(a.id).unwrap().outcome,
            AssetOutcome::Failed(RunError::NotScheduled)
        );
        assert!(store.list_records(a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_timeout_still_runs_the_batch() {
        let config = RunnerConfig::from_source(&HashMap::from([(
            ENV_BATCH_TIMEOUT_SECS.to_string(),
            u64::MAX.to_string(),
        )]))
        .unwrap();
        let (store, runner) = setup(config.with_batch_timeout(Duration::MAX));
        let a = straight_line("FA-1", 1_200, 12, date(2026, 1, 1));
        store.insert_asset(a.clone()).unwrap();

        let result = runner
            .run_batch(BatchRequest::new(date(2026, 3, 1)))
            .await
            .unwrap();
        assert_eq!(result.report(a.id).unwrap().periods_processed(), 2);
    }

    #[tokio::test]
    async fn many_assets_with_bounded_concurrency() {
        let (store, runner) = setup(RunnerConfig::default().with_max_concurrency(2));
        let mut ids = Vec::new();
        for i in 0..10 {
            let a = straight_line(&format!("FA-{i:02}"), 12_000, 12, date(2026, 1, 1));
            ids.push(a.id);
            store.insert_asset(a).unwrap();
        }

        let result = runner
            .run_batch(BatchRequest::new(date(2026, 6, 1)))
            .await
            .unwrap();
        assert_eq!(result.reports.len(), 10);
        assert_eq!(result.total_periods(), 50);
        assert_eq!(result.total_amount(), Money::from_major(50_000));
        for id in ids {
            assert_ledger_consistent(&store, id).await;
        }
    }

    #[tokio::test]
    async fn journal_links_survive_start_date_correction() {
        let (store, runner) = setup(RunnerConfig::default());
        let journal = Arc::new(InMemoryJournal::new());
        let posting = JournalPostingService::new(
            Arc::new(store.clone()),
            journal.clone(),
            PostingConfig::default().accounts(),
        );

        let asset = straight_line("FA-GL", 12_000_000, 24, date(2025, 9, 15));
        store.insert_asset(asset.clone()).unwrap();
        runner
            .run_batch(BatchRequest::new(date(2026, 3, 31)))
            .await
            .unwrap();

        let report = posting.post_unlinked(asset.id).await.unwrap();
        assert_eq!(report.posted.len(), 6);
        assert_eq!(report.posted_amount, Money::from_major(3_000_000));
        assert_eq!(journal.len(), 6);
        let again = posting.post_unlinked(asset.id).await.unwrap();
        assert!(again.posted.is_empty());
        assert_eq!(again.already_linked, 6);

        let entry = journal.get(report.posted[0].1).unwrap().unwrap();
        assert_eq!(entry.lines.len(), 2);
        assert_eq!(entry.lines[0].account.code, "6100");
        assert!(entry.lines[0].is_debit);
        assert_eq!(entry.lines[1].account.code, "1590");

        let mut corrected = store.get_asset(asset.id).await.unwrap();
        corrected.depreciation_start_date = Some(date(2025, 8, 15));
        store.insert_asset(corrected).unwrap();

        let result = runner
            .run_batch(BatchRequest::new(date(2026, 3, 31)).with_assets([asset.id]))
            .await
            .unwrap();
        match &result.report(asset.id).unwrap().outcome {
            AssetOutcome::Rebuilt(summary) => {
                assert_eq!(summary.new_periods, vec![key(2025, 9)]);
                assert_eq!(summary.reproduced_periods, 6);
                assert!(summary.orphaned_journal_refs.is_empty());
                assert_eq!(summary.accumulated_delta, Money::from_major(500_000));
            }
            other => panic!("expected rebuild, got {other:?}"),
        }

        let records = store.list_records(asset.id).await.unwrap();
        for (period, journal_ref) in &report.posted {
            let record = records.iter().find(|r| r.period_key() == *period).unwrap();
            assert_eq!(record.journal_ref, Some(*journal_ref));
        }
        assert_eq!(records.iter().filter(|r| r.journal_ref.is_none()).count(), 1);
        assert_ledger_consistent(&store, asset.id).await;
    }

    #[tokio::test]
    async fn preview_plans_without_writing() {
        let (store, runner) = setup(RunnerConfig::default());
        let asset = straight_line("FA-P", 12_000_000, 60, date(2026, 4, 18));
        store.insert_asset(asset.clone()).unwrap();

        let preview = runner.preview(asset.id, date(2026, 10, 18), None).await.unwrap();
        assert_eq!(preview.missing_periods.len(), 6);
        assert_eq!(preview.missing_periods[0], key(2026, 5));
        match preview.plan {
            LedgerPlan::Rebuild(plan) => assert_eq!(plan.records.len(), 6),
            other => panic!("expected rebuild plan, got {other:?}"),
        }

        assert!(store.list_records(asset.id).await.unwrap().is_empty());
        assert_eq!(
            store.get_asset(asset.id).await.unwrap().accumulated_depreciation,
            Money::ZERO
        );
    }
}
