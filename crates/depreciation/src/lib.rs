//! Fixed-asset depreciation engine.
//!
//! Pure domain logic only: no IO, no persistence, no clock. Callers hand in an
//! immutable [`LedgerSnapshot`] (the asset plus its existing records) and get
//! back a [`LedgerPlan`] describing the new record set and final totals. Writing
//! that plan atomically is the infrastructure layer's job.
//!
//! Components, leaves first:
//! - [`method`]: one period's amount for each depreciation method (clamped, rounded)
//! - [`schedule`]: calendar-month enumeration and missing-period detection
//! - [`state`]: running book value / accumulated / period counter for one asset
//! - [`rebuild`] and [`usage`]: the two recompute strategies
//! - [`plan`]: eligibility check + dispatch to the right strategy

pub mod asset;
pub mod error;
pub mod method;
pub mod period;
pub mod plan;
pub mod rebuild;
pub mod record;
pub mod schedule;
pub mod state;
pub mod usage;

pub use asset::{Asset, AssetStatus, DepreciationMethod};
pub use error::{DepreciationError, SkipReason};
pub use method::{DepreciationParams, PeriodInput};
pub use period::PeriodKey;
pub use plan::{plan, LedgerPlan, LedgerSnapshot, RunContext};
pub use rebuild::{plan_rebuild, RebuildPlan};
pub use record::DepreciationRecord;
pub use state::AssetLedgerState;
pub use usage::{plan_usage_period, UsagePlan};
