use std::collections::HashMap;
use std::str::FromStr;

use axum::http::StatusCode;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use assetbook_core::{AssetId, UserId};
use assetbook_depreciation::{DepreciationRecord, LedgerPlan};
use assetbook_infra::{
    AssetOutcome, AssetReport, BatchRequest, BatchResult, PostingReport, Preview, RebuildSummary,
};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Usage may arrive as a JSON number (`120.5`) or a decimal string (`"120.5"`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UsageValue {
    Number(serde_json::Number),
    Text(String),
}

impl UsageValue {
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            UsageValue::Number(n) => parse_decimal(&n.to_string()),
            UsageValue::Text(s) => parse_decimal(s),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RunBatchRequest {
    /// Any date inside the target period.
    pub target_period: NaiveDate,
    #[serde(default)]
    pub asset_ids: Vec<String>,
    #[serde(default)]
    pub usage: HashMap<String, UsageValue>,
    pub note: Option<String>,
    pub operator: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub target: String,
    pub usage: Option<String>,
}

// -------------------------
// Parsing helpers
// -------------------------

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

pub fn parse_asset_id(raw: &str) -> Result<AssetId, axum::response::Response> {
    AssetId::from_str(raw)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, axum::response::Response> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_date",
            format!("expected YYYY-MM-DD, got '{raw}'"),
        )
    })
}

pub fn parse_usage(raw: &str) -> Result<Decimal, axum::response::Response> {
    parse_decimal(raw).ok_or_else(|| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_usage",
            format!("usage must be a number, got '{raw}'"),
        )
    })
}

impl RunBatchRequest {
    pub fn into_batch_request(self) -> Result<BatchRequest, axum::response::Response> {
        let mut request = BatchRequest::new(self.target_period);

        let ids = self
            .asset_ids
            .iter()
            .map(|id| parse_asset_id(id))
            .collect::<Result<Vec<_>, _>>()?;
        request = request.with_assets(ids);

        for (id, value) in &self.usage {
            let asset_id = parse_asset_id(id)?;
            let usage = value.to_decimal().ok_or_else(|| {
                errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_usage",
                    format!("usage for asset {id} is not a number"),
                )
            })?;
            request = request.with_usage(asset_id, usage);
        }

        if let Some(note) = self.note.filter(|n| !n.trim().is_empty()) {
            request = request.with_note(note);
        }
        if let Some(operator) = self.operator {
            let operator = UserId::from_str(&operator).map_err(|e| {
                errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string())
            })?;
            request = request.with_operator(operator);
        }
        Ok(request)
    }
}

// -------------------------
// Response mapping
// -------------------------

pub fn batch_result_to_json(result: &BatchResult) -> Value {
    json!({
        "target_period": result.target_period.to_string(),
        "total_amount": result.total_amount().to_string(),
        "total_periods": result.total_periods(),
        "total_reproduced": result.total_reproduced(),
        "failures": result.failures().count(),
        "assets": result.reports.iter().map(asset_report_to_json).collect::<Vec<_>>(),
    })
}

pub fn asset_report_to_json(report: &AssetReport) -> Value {
    let mut body = json!({
        "asset_id": report.asset_id.to_string(),
        "asset_code": report.asset_code,
        "outcome": report.outcome.label(),
        "amount_total": report.amount_total().to_string(),
        "periods_processed": report.periods_processed(),
        "periods_reproduced": report.periods_reproduced(),
    });

    match &report.outcome {
        AssetOutcome::NotEligible(reason) | AssetOutcome::Skipped(reason) => {
            body["reason"] = json!(reason.to_string());
        }
        AssetOutcome::UsageProcessed { period, .. } => {
            body["period"] = json!(period.to_string());
        }
        AssetOutcome::Rebuilt(summary) => {
            body["rebuild"] = rebuild_summary_to_json(summary);
        }
        AssetOutcome::Failed(e) => {
            body["error"] = json!({
                "code": errors::run_error_code(e),
                "message": e.to_string(),
                "skipped": e.is_skip(),
            });
        }
    }
    body
}

fn rebuild_summary_to_json(summary: &RebuildSummary) -> Value {
    json!({
        "new_periods": summary.new_periods.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "accumulated_delta": summary.accumulated_delta.to_string(),
        "orphaned_journal_refs": summary
            .orphaned_journal_refs
            .iter()
            .map(|(period, journal_ref)| json!({
                "period": period.to_string(),
                "journal_ref": journal_ref.to_string(),
            }))
            .collect::<Vec<_>>(),
    })
}

pub fn record_to_json(r: &DepreciationRecord) -> Value {
    json!({
        "period": r.period_key().to_string(),
        "period_date": r.period_date.to_string(),
        "period_number": r.period_number,
        "amount": r.amount.to_string(),
        "accumulated_after": r.accumulated_after.to_string(),
        "book_value_after": r.book_value_after.to_string(),
        "method": r.method.as_str(),
        "journal_ref": r.journal_ref.map(|j| j.to_string()),
        "note": r.note,
        "created_by": r.created_by.map(|u| u.to_string()),
        "created_at": r.created_at.to_rfc3339(),
    })
}

pub fn preview_to_json(preview: &Preview) -> Value {
    let plan = match &preview.plan {
        LedgerPlan::NotEligible(reason) => json!({ "kind": "not_eligible", "reason": reason.to_string() }),
        LedgerPlan::Skipped(reason) => json!({ "kind": "skipped", "reason": reason.to_string() }),
        LedgerPlan::Usage(p) => json!({
            "kind": "usage",
            "records": [record_to_json(&p.record)],
            "accumulated": p.final_state.accumulated.to_string(),
            "book_value": p.final_state.book_value.to_string(),
        }),
        LedgerPlan::Rebuild(p) => json!({
            "kind": "rebuild",
            "records": p.records.iter().map(record_to_json).collect::<Vec<_>>(),
            "new_periods": p.new_periods.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "accumulated": p.final_state.accumulated.to_string(),
            "book_value": p.final_state.book_value.to_string(),
        }),
    };

    json!({
        "asset_id": preview.asset.id.to_string(),
        "asset_code": preview.asset.code,
        "target_period": preview.target_period.to_string(),
        "missing_periods": preview.missing_periods.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "plan": plan,
    })
}

pub fn posting_report_to_json(report: &PostingReport) -> Value {
    json!({
        "asset_id": report.asset_id.to_string(),
        "posted": report
            .posted
            .iter()
            .map(|(period, journal_ref)| json!({
                "period": period.to_string(),
                "journal_ref": journal_ref.to_string(),
            }))
            .collect::<Vec<_>>(),
        "posted_amount": report.posted_amount.to_string(),
        "already_linked": report.already_linked,
    })
}
