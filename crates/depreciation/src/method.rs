//! Per-period amount for each depreciation method.
//!
//! Every function here is pure. Amounts are computed from the asset's state as
//! it stood at the *start* of the period (declining-balance methods depend on
//! it), rounded to money scale, then clamped so book value never crosses
//! salvage.
//!
//! Declining-balance rate convention: `monthly_rate = factor / useful_life_months`
//! (`factor` 1 or 2), which is `annual_rate / 12` for
//! `annual_rate = factor / useful_life_years`. The rate itself is not rounded.

use rust_decimal::Decimal;

use assetbook_core::{AssetId, Money};

use crate::asset::{Asset, DepreciationMethod};
use crate::error::DepreciationError;

/// Validated inputs of the depreciation formula for one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepreciationParams {
    pub asset_id: AssetId,
    pub method: DepreciationMethod,
    pub acquisition_cost: Money,
    pub salvage_value: Money,
    pub useful_life_months: u32,
    /// Estimated service hours or total production, for usage-based methods.
    pub usage_capacity: Option<u64>,
}

impl DepreciationParams {
    pub fn from_asset(asset: &Asset) -> Result<Self, DepreciationError> {
        asset.check_amounts()?;

        let usage_capacity = match asset.method {
            DepreciationMethod::ServiceHours => Some(positive_capacity(
                asset.id,
                asset.estimated_service_hours,
                "estimated service hours",
            )?),
            DepreciationMethod::ProductiveOutput => Some(positive_capacity(
                asset.id,
                asset.estimated_total_production,
                "estimated total production",
            )?),
            _ => {
                if asset.useful_life_months == 0 {
                    return Err(DepreciationError::invalid_parameters(
                        asset.id,
                        "useful life must be at least one month",
                    ));
                }
                None
            }
        };

        Ok(Self {
            asset_id: asset.id,
            method: asset.method,
            acquisition_cost: asset.acquisition_cost,
            salvage_value: asset.salvage_value,
            useful_life_months: asset.useful_life_months,
            usage_capacity,
        })
    }

    pub fn depreciable_base(&self) -> Money {
        self.acquisition_cost - self.salvage_value
    }
}

fn positive_capacity(
    asset_id: AssetId,
    value: Option<u64>,
    what: &str,
) -> Result<u64, DepreciationError> {
    match value {
        Some(v) if v > 0 => Ok(v),
        _ => Err(DepreciationError::invalid_parameters(
            asset_id,
            format!("{what} must be a positive integer"),
        )),
    }
}

/// Asset state at the start of the period being computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodInput {
    pub book_value_at_start: Money,
    /// Periods already applied in this series before the current one.
    pub periods_elapsed: u32,
    /// Hours used / units produced this period (usage-based methods only).
    pub usage: Option<Decimal>,
}

/// Unclamped amount for one period, rounded to money scale.
pub fn nominal_amount(
    params: &DepreciationParams,
    input: &PeriodInput,
) -> Result<Money, DepreciationError> {
    let life = params.useful_life_months;
    let base = params.depreciable_base();

    if !params.method.is_usage_based() && input.periods_elapsed >= life {
        return Ok(Money::ZERO);
    }

    let amount = match params.method {
        DepreciationMethod::StraightLine => Money::new(base.amount() / Decimal::from(life)),
        DepreciationMethod::DecliningBalance => input
            .book_value_at_start
            .times(declining_monthly_rate(Decimal::ONE, life)),
        DepreciationMethod::DoubleDeclining => input
            .book_value_at_start
            .times(declining_monthly_rate(Decimal::TWO, life)),
        DepreciationMethod::SumOfYearsDigits => {
            let remaining = Decimal::from(life - input.periods_elapsed);
            let digits = Decimal::from(u64::from(life) * (u64::from(life) + 1) / 2);
            base.times(remaining / digits)
        }
        DepreciationMethod::ServiceHours | DepreciationMethod::ProductiveOutput => {
            let usage = input.usage.ok_or_else(|| {
                DepreciationError::invalid_usage(params.asset_id, "no usage supplied")
            })?;
            if usage <= Decimal::ZERO {
                return Err(DepreciationError::invalid_usage(
                    params.asset_id,
                    format!("usage must be positive, got {usage}"),
                ));
            }
            let capacity = params.usage_capacity.ok_or_else(|| {
                DepreciationError::invalid_parameters(params.asset_id, "missing usage capacity")
            })?;
            // Usage past the remaining capacity is clamped away anyway.
            let fraction = (usage / Decimal::from(capacity)).min(Decimal::ONE);
            base.times(fraction)
        }
    };

    Ok(amount)
}

fn declining_monthly_rate(factor: Decimal, life_months: u32) -> Decimal {
    factor / Decimal::from(life_months)
}

/// Clamp `amount` so that `book_value - amount >= salvage`.
///
/// Returns `None` when nothing is left to depreciate for this period.
pub fn clamp_to_salvage(amount: Money, book_value: Money, salvage: Money) -> Option<Money> {
    let headroom = book_value - salvage;
    let clamped = if book_value - amount < salvage { headroom } else { amount };
    clamped.is_positive().then_some(clamped)
}

/// Clamped, rounded amount for one period; `None` means no record for it.
pub fn compute_period(
    params: &DepreciationParams,
    input: &PeriodInput,
) -> Result<Option<Money>, DepreciationError> {
    let nominal = nominal_amount(params, input)?;
    Ok(clamp_to_salvage(
        nominal,
        input.book_value_at_start,
        params.salvage_value,
    ))
}
