//! Postgres-backed ledger store.
//!
//! Schema lives in `crates/infra/migrations/` and is applied with
//! [`PostgresLedgerStore::migrate`].
//!
//! ## Per-asset units of work
//!
//! [`LedgerStore::begin`] opens a database transaction and takes a row lock on
//! the asset (`SELECT ... FOR UPDATE`). Every later read and write of that
//! unit of work runs inside the same transaction, so:
//!
//! - a concurrent run on the same asset blocks on the row lock until commit or
//!   rollback,
//! - a failure between `delete_records` and `insert_records` is rolled back and
//!   the deleted-but-not-rebuilt state is never visible,
//! - dropping the transaction without `commit` rolls it back (sqlx semantics).
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (check violation) | `23514` | `Conflict` |
//! | Database (other) | Any other | `Storage` |
//! | RowNotFound | N/A | `NotFound` |
//! | Other | N/A | `Storage` |

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use assetbook_core::{AssetId, JournalRef, Money, UserId};
use assetbook_depreciation::{Asset, DepreciationRecord, PeriodKey};

use super::r#trait::{AssetFilter, LedgerStore, LedgerTransaction, StoreError};

const ASSET_COLUMNS: &str = r#"
    id, code, name, acquisition_cost, salvage_value, useful_life_months,
    estimated_service_hours, estimated_total_production, method,
    acquisition_date, depreciation_start_date, current_book_value,
    accumulated_depreciation, status
"#;

const RECORD_COLUMNS: &str = r#"
    asset_id, period_date, period_number, amount, accumulated_after,
    book_value_after, method, journal_ref, note, created_by, created_at
"#;

/// Postgres-backed ledger store.
///
/// Uses the SQLx connection pool, which is `Send + Sync` and cheap to clone.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect to `database_url` with a pool of at most `max_connections`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("migration failed: {e}")))
    }

    /// Insert or replace an asset row (registration happens outside the engine).
    #[instrument(skip(self, asset), fields(asset_id = %asset.id, code = %asset.code), err)]
    pub async fn upsert_asset(&self, asset: &Asset) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO fixed_assets (
                id, code, name, acquisition_cost, salvage_value, useful_life_months,
                estimated_service_hours, estimated_total_production, method,
                acquisition_date, depreciation_start_date, current_book_value,
                accumulated_depreciation, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO UPDATE SET
                code = EXCLUDED.code,
                name = EXCLUDED.name,
                acquisition_cost = EXCLUDED.acquisition_cost,
                salvage_value = EXCLUDED.salvage_value,
                useful_life_months = EXCLUDED.useful_life_months,
                estimated_service_hours = EXCLUDED.estimated_service_hours,
                estimated_total_production = EXCLUDED.estimated_total_production,
                method = EXCLUDED.method,
                acquisition_date = EXCLUDED.acquisition_date,
                depreciation_start_date = EXCLUDED.depreciation_start_date,
                current_book_value = EXCLUDED.current_book_value,
                accumulated_depreciation = EXCLUDED.accumulated_depreciation,
                status = EXCLUDED.status,
                updated_at = NOW()
            "#,
        )
        .bind(asset.id.as_uuid())
        .bind(&asset.code)
        .bind(&asset.name)
        .bind(asset.acquisition_cost.amount())
        .bind(asset.salvage_value.amount())
        .bind(to_i32(asset.useful_life_months, "useful_life_months")?)
        .bind(asset.estimated_service_hours.map(|v| to_i64(v, "estimated_service_hours")).transpose()?)
        .bind(
            asset
                .estimated_total_production
                .map(|v| to_i64(v, "estimated_total_production"))
                .transpose()?,
        )
        .bind(asset.method.as_str())
        .bind(asset.acquisition_date)
        .bind(asset.depreciation_start_date)
        .bind(asset.current_book_value.amount())
        .bind(asset.accumulated_depreciation.amount())
        .bind(asset.status.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_asset", e))?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self), fields(requested = filter.asset_ids.len()), err)]
    async fn load_eligible_assets(&self, filter: &AssetFilter) -> Result<Vec<Asset>, StoreError> {
        let ids: Vec<uuid::Uuid> = filter.asset_ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ASSET_COLUMNS}
            FROM fixed_assets
            WHERE status = 'active'
              AND (cardinality($1::uuid[]) = 0 OR id = ANY($1))
            ORDER BY code ASC
            "#
        ))
        .bind(ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_eligible_assets", e))?;

        rows.iter().map(asset_from_row).collect()
    }

    #[instrument(skip(self), fields(asset_id = %asset_id), err)]
    async fn get_asset(&self, asset_id: AssetId) -> Result<Asset, StoreError> {
        let row = sqlx::query(&format!("SELECT {ASSET_COLUMNS} FROM fixed_assets WHERE id = $1"))
            .bind(asset_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_asset", e))?
            .ok_or_else(|| StoreError::asset_not_found(asset_id))?;
        asset_from_row(&row)
    }

    #[instrument(skip(self), fields(asset_id = %asset_id), err)]
    async fn list_records(&self, asset_id: AssetId) -> Result<Vec<DepreciationRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM depreciation_records WHERE asset_id = $1 ORDER BY period_date ASC"
        ))
        .bind(asset_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_records", e))?;

        rows.iter().map(record_from_row).collect()
    }

    #[instrument(skip(self), fields(asset_id = %asset_id), err)]
    async fn begin(&self, asset_id: AssetId) -> Result<Box<dyn LedgerTransaction>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Row lock held until commit/rollback.
        let locked = sqlx::query("SELECT id FROM fixed_assets WHERE id = $1 FOR UPDATE")
            .bind(asset_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_asset", e))?;
        if locked.is_none() {
            return Err(StoreError::asset_not_found(asset_id));
        }

        Ok(Box::new(PostgresLedgerTransaction { asset_id, tx }))
    }
}

struct PostgresLedgerTransaction {
    asset_id: AssetId,
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PostgresLedgerTransaction {
    async fn load_asset(&mut self) -> Result<Asset, StoreError> {
        let row = sqlx::query(&format!("SELECT {ASSET_COLUMNS} FROM fixed_assets WHERE id = $1"))
            .bind(self.asset_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_asset", e))?
            .ok_or_else(|| StoreError::asset_not_found(self.asset_id))?;
        asset_from_row(&row)
    }

    async fn list_records(&mut self) -> Result<Vec<DepreciationRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM depreciation_records WHERE asset_id = $1 ORDER BY period_date ASC"
        ))
        .bind(self.asset_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_records", e))?;

        rows.iter().map(record_from_row).collect()
    }

    async fn delete_records(&mut self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM depreciation_records WHERE asset_id = $1")
            .bind(self.asset_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_records", e))?;
        Ok(())
    }

    async fn insert_records(&mut self, records: &[DepreciationRecord]) -> Result<(), StoreError> {
        for record in records {
            if record.asset_id != self.asset_id {
                return Err(StoreError::Conflict(format!(
                    "record for asset {} inserted under asset {}",
                    record.asset_id, self.asset_id
                )));
            }

            sqlx::query(
                r#"
                INSERT INTO depreciation_records (
                    asset_id, period_date, period_number, amount, accumulated_after,
                    book_value_after, method, journal_ref, note, created_by, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(record.asset_id.as_uuid())
            .bind(record.period_date)
            .bind(to_i32(record.period_number, "period_number")?)
            .bind(record.amount.amount())
            .bind(record.accumulated_after.amount())
            .bind(record.book_value_after.amount())
            .bind(record.method.as_str())
            .bind(record.journal_ref.map(|j| *j.as_uuid()))
            .bind(record.note.as_deref())
            .bind(record.created_by.map(|u| *u.as_uuid()))
            .bind(record.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_record", e))?;
        }
        Ok(())
    }

    async fn update_asset_totals(
        &mut self,
        accumulated: Money,
        book_value: Money,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE fixed_assets
            SET accumulated_depreciation = $2, current_book_value = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(self.asset_id.as_uuid())
        .bind(accumulated.amount())
        .bind(book_value.amount())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_asset_totals", e))?;
        Ok(())
    }

    async fn attach_journal_ref(
        &mut self,
        period: PeriodKey,
        journal_ref: JournalRef,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE depreciation_records SET journal_ref = $3 WHERE asset_id = $1 AND period_date = $2",
        )
        .bind(self.asset_id.as_uuid())
        .bind(period.end_date())
        .bind(journal_ref.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("attach_journal_ref", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "record {period} of asset {}",
                self.asset_id
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

fn asset_from_row(row: &PgRow) -> Result<Asset, StoreError> {
    let get_err = |e: sqlx::Error| StoreError::Storage(format!("failed to decode asset row: {e}"));

    let method: String = row.try_get("method").map_err(get_err)?;
    let status: String = row.try_get("status").map_err(get_err)?;
    let life: i32 = row.try_get("useful_life_months").map_err(get_err)?;
    let hours: Option<i64> = row.try_get("estimated_service_hours").map_err(get_err)?;
    let production: Option<i64> = row.try_get("estimated_total_production").map_err(get_err)?;

    Ok(Asset {
        id: AssetId::from_uuid(row.try_get("id").map_err(get_err)?),
        code: row.try_get("code").map_err(get_err)?,
        name: row.try_get("name").map_err(get_err)?,
        acquisition_cost: money(row, "acquisition_cost")?,
        salvage_value: money(row, "salvage_value")?,
        useful_life_months: u32::try_from(life)
            .map_err(|_| StoreError::Storage(format!("negative useful life {life}")))?,
        estimated_service_hours: hours.map(u64::try_from).transpose().map_err(|_| {
            StoreError::Storage("negative estimated service hours".to_string())
        })?,
        estimated_total_production: production.map(u64::try_from).transpose().map_err(|_| {
            StoreError::Storage("negative estimated total production".to_string())
        })?,
        method: method
            .parse()
            .map_err(|e| StoreError::Storage(format!("bad method column: {e}")))?,
        acquisition_date: row.try_get("acquisition_date").map_err(get_err)?,
        depreciation_start_date: row.try_get("depreciation_start_date").map_err(get_err)?,
        current_book_value: money(row, "current_book_value")?,
        accumulated_depreciation: money(row, "accumulated_depreciation")?,
        status: status
            .parse()
            .map_err(|e| StoreError::Storage(format!("bad status column: {e}")))?,
    })
}

fn record_from_row(row: &PgRow) -> Result<DepreciationRecord, StoreError> {
    let get_err = |e: sqlx::Error| StoreError::Storage(format!("failed to decode record row: {e}"));

    let method: String = row.try_get("method").map_err(get_err)?;
    let number: i32 = row.try_get("period_number").map_err(get_err)?;
    let journal_ref: Option<uuid::Uuid> = row.try_get("journal_ref").map_err(get_err)?;
    let created_by: Option<uuid::Uuid> = row.try_get("created_by").map_err(get_err)?;

    Ok(DepreciationRecord {
        asset_id: AssetId::from_uuid(row.try_get("asset_id").map_err(get_err)?),
        period_date: row.try_get("period_date").map_err(get_err)?,
        period_number: u32::try_from(number)
            .map_err(|_| StoreError::Storage(format!("bad period number {number}")))?,
        amount: money(row, "amount")?,
        accumulated_after: money(row, "accumulated_after")?,
        book_value_after: money(row, "book_value_after")?,
        method: method
            .parse()
            .map_err(|e| StoreError::Storage(format!("bad method column: {e}")))?,
        journal_ref: journal_ref.map(JournalRef::from_uuid),
        note: row.try_get("note").map_err(get_err)?,
        created_by: created_by.map(UserId::from_uuid),
        created_at: row.try_get("created_at").map_err(get_err)?,
    })
}

fn money(row: &PgRow, column: &str) -> Result<Money, StoreError> {
    let value: Decimal = row
        .try_get(column)
        .map_err(|e| StoreError::Storage(format!("failed to decode {column}: {e}")))?;
    Ok(Money::new(value))
}

fn to_i32(value: u32, what: &str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Conflict(format!("{what} {value} out of range")))
}

fn to_i64(value: u64, what: &str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Conflict(format!("{what} {value} out of range")))
}

/// Map SQLx errors to StoreError with operation context.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23514") => StoreError::Conflict(msg),
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("row not found in {operation}")),
        sqlx::Error::PoolClosed => {
            StoreError::Storage(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Storage(format!("sqlx error in {operation}: {other}")),
    }
}
