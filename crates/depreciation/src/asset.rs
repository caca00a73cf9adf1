use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use assetbook_core::{AssetId, DomainError, Entity, Money};

use crate::error::{DepreciationError, SkipReason};

/// Amortization formula applied to an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepreciationMethod {
    StraightLine,
    DecliningBalance,
    DoubleDeclining,
    SumOfYearsDigits,
    ServiceHours,
    ProductiveOutput,
}

impl DepreciationMethod {
    /// Usage-based methods process exactly one period per run from supplied usage.
    pub fn is_usage_based(self) -> bool {
        matches!(
            self,
            DepreciationMethod::ServiceHours | DepreciationMethod::ProductiveOutput
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DepreciationMethod::StraightLine => "straight_line",
            DepreciationMethod::DecliningBalance => "declining_balance",
            DepreciationMethod::DoubleDeclining => "double_declining",
            DepreciationMethod::SumOfYearsDigits => "sum_of_years_digits",
            DepreciationMethod::ServiceHours => "service_hours",
            DepreciationMethod::ProductiveOutput => "productive_output",
        }
    }
}

impl core::fmt::Display for DepreciationMethod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for DepreciationMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "straight_line" => Ok(DepreciationMethod::StraightLine),
            "declining_balance" => Ok(DepreciationMethod::DecliningBalance),
            "double_declining" => Ok(DepreciationMethod::DoubleDeclining),
            "sum_of_years_digits" => Ok(DepreciationMethod::SumOfYearsDigits),
            "service_hours" => Ok(DepreciationMethod::ServiceHours),
            "productive_output" => Ok(DepreciationMethod::ProductiveOutput),
            other => Err(DomainError::validation(format!(
                "unknown depreciation method '{other}'"
            ))),
        }
    }
}

/// Lifecycle status of an asset. Only `Active` assets depreciate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Active,
    Inactive,
    Disposed,
}

impl AssetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetStatus::Active => "active",
            AssetStatus::Inactive => "inactive",
            AssetStatus::Disposed => "disposed",
        }
    }
}

impl core::str::FromStr for AssetStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(AssetStatus::Active),
            "inactive" => Ok(AssetStatus::Inactive),
            "disposed" => Ok(AssetStatus::Disposed),
            other => Err(DomainError::validation(format!("unknown asset status '{other}'"))),
        }
    }
}

/// Depreciation-relevant projection of a fixed asset.
///
/// Registration and the rest of the asset record live in the wider system; the
/// engine reads these fields and writes back `current_book_value` and
/// `accumulated_depreciation` after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub code: String,
    pub name: String,
    pub acquisition_cost: Money,
    pub salvage_value: Money,
    pub useful_life_months: u32,
    pub estimated_service_hours: Option<u64>,
    pub estimated_total_production: Option<u64>,
    pub method: DepreciationMethod,
    pub acquisition_date: Option<NaiveDate>,
    pub depreciation_start_date: Option<NaiveDate>,
    pub current_book_value: Money,
    pub accumulated_depreciation: Money,
    pub status: AssetStatus,
}

impl Entity for Asset {
    type Id = AssetId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Asset {
    /// A freshly registered, active asset with nothing depreciated yet.
    pub fn new(
        code: impl Into<String>,
        method: DepreciationMethod,
        acquisition_cost: Money,
        salvage_value: Money,
    ) -> Self {
        let code = code.into();
        Self {
            id: AssetId::new(),
            name: code.clone(),
            code,
            acquisition_cost,
            salvage_value,
            useful_life_months: 0,
            estimated_service_hours: None,
            estimated_total_production: None,
            method,
            acquisition_date: None,
            depreciation_start_date: None,
            current_book_value: acquisition_cost,
            accumulated_depreciation: Money::ZERO,
            status: AssetStatus::Active,
        }
    }

    pub fn with_id(mut self, id: AssetId) -> Self {
        self.id = id;
        self
    }

    pub fn with_useful_life(mut self, months: u32) -> Self {
        self.useful_life_months = months;
        self
    }

    pub fn with_start_date(mut self, date: NaiveDate) -> Self {
        self.depreciation_start_date = Some(date);
        self
    }

    pub fn with_acquisition_date(mut self, date: NaiveDate) -> Self {
        self.acquisition_date = Some(date);
        self
    }

    pub fn with_service_hours(mut self, hours: u64) -> Self {
        self.estimated_service_hours = Some(hours);
        self
    }

    pub fn with_total_production(mut self, units: u64) -> Self {
        self.estimated_total_production = Some(units);
        self
    }

    pub fn with_status(mut self, status: AssetStatus) -> Self {
        self.status = status;
        self
    }

    /// Overwrite the running totals (e.g. a manual correction). Book value follows.
    pub fn with_accumulated(mut self, accumulated: Money) -> Self {
        self.accumulated_depreciation = accumulated;
        self.current_book_value = self.acquisition_cost - accumulated;
        self
    }

    /// Date the schedule starts from: the explicit start date, else acquisition.
    pub fn depreciation_start(&self) -> Option<NaiveDate> {
        self.depreciation_start_date.or(self.acquisition_date)
    }

    pub fn depreciable_base(&self) -> Money {
        self.acquisition_cost - self.salvage_value
    }

    /// Active and not yet written down to salvage.
    pub fn eligibility(&self) -> Result<(), SkipReason> {
        if self.status != AssetStatus::Active {
            return Err(SkipReason::Inactive(self.status));
        }
        if self.current_book_value <= self.salvage_value {
            return Err(SkipReason::FullyDepreciated);
        }
        Ok(())
    }

    /// Amount invariants the clamp cannot repair.
    pub fn check_amounts(&self) -> Result<(), DepreciationError> {
        if self.salvage_value.is_negative() {
            return Err(DepreciationError::inconsistent(self.id, "salvage value is negative"));
        }
        if self.acquisition_cost < self.salvage_value {
            return Err(DepreciationError::inconsistent(
                self.id,
                format!(
                    "acquisition cost {} is below salvage value {}",
                    self.acquisition_cost, self.salvage_value
                ),
            ));
        }
        if self.accumulated_depreciation.is_negative() {
            return Err(DepreciationError::inconsistent(
                self.id,
                "accumulated depreciation is negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> Asset {
        Asset::new(
            "FA-001",
            DepreciationMethod::StraightLine,
            Money::from_major(12_000_000),
            Money::ZERO,
        )
        .with_useful_life(12)
    }

    #[test]
    fn method_names_round_trip() {
        for m in [
            DepreciationMethod::StraightLine,
            DepreciationMethod::DecliningBalance,
            DepreciationMethod::DoubleDeclining,
            DepreciationMethod::SumOfYearsDigits,
            DepreciationMethod::ServiceHours,
            DepreciationMethod::ProductiveOutput,
        ] {
            assert_eq!(m.as_str().parse::<DepreciationMethod>().unwrap(), m);
            let json = serde_json::to_string(&m).unwrap();
            assert_eq!(json, format!("\"{}\"", m.as_str()));
        }
    }

    #[test]
    fn start_date_falls_back_to_acquisition() {
        let acquired = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let a = asset().with_acquisition_date(acquired);
        assert_eq!(a.depreciation_start(), Some(acquired));

        let corrected = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let a = a.with_start_date(corrected);
        assert_eq!(a.depreciation_start(), Some(corrected));
    }

    #[test]
    fn inactive_and_fully_depreciated_are_not_eligible() {
        assert!(asset().eligibility().is_ok());
        assert_eq!(
            asset().with_status(AssetStatus::Disposed).eligibility(),
            Err(SkipReason::Inactive(AssetStatus::Disposed))
        );
        assert_eq!(
            asset().with_accumulated(Money::from_major(12_000_000)).eligibility(),
            Err(SkipReason::FullyDepreciated)
        );
    }

    #[test]
    fn salvage_above_cost_is_inconsistent() {
        let mut a = asset();
        a.salvage_value = Money::from_major(13_000_000);
        assert!(matches!(
            a.check_amounts(),
            Err(DepreciationError::InconsistentState { .. })
        ));
    }
}
