use super::{device_id, period, Params, MAX_LIMIT};
use crate::api::models::{
    round_to, ApplianceBreakdownResponse, ApplianceDetailResponse, ApplianceShareResponse,
    CostedStatsResponse, ReadingResponse,
};
use crate::api::AppState;
use crate::error::Result;
use crate::models::{GroupBy, SampleFilter, SortOrder};
use crate::services::cost::cost_of;
use crate::services::UsageQuery;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;

/// Share of energy per appliance category, largest first.
pub async fn get_breakdown(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<ApplianceBreakdownResponse>> {
    let rate = state.rate();
    let period = period(&params);
    let breakdown = state
        .usage
        .breakdown(
            &UsageQuery::new(period, device_id(&params)),
            GroupBy::Appliance,
            Utc::now(),
        )
        .await?;

    Ok(Json(ApplianceBreakdownResponse {
        success: true,
        period,
        total_energy: round_to(breakdown.total_energy, 3),
        total_cost: round_to(cost_of(breakdown.total_energy, rate), 2),
        appliances: breakdown
            .rows
            .iter()
            .map(|row| ApplianceShareResponse::new(row, rate))
            .collect(),
    }))
}

pub async fn get_appliance(
    State(state): State<AppState>,
    Path(appliance): Path<String>,
    Query(params): Query<Params>,
) -> Result<Json<ApplianceDetailResponse>> {
    let rate = state.rate();
    let period = period(&params);
    let filter = SampleFilter {
        device_id: device_id(&params),
        appliance: Some(appliance.clone()),
        range: Some(period.to_date(Utc::now(), state.usage.offset())),
        ..Default::default()
    };

    let samples = state
        .store
        .find(&filter, SortOrder::Descending, Some(MAX_LIMIT))
        .await?;
    let stats = state.usage.summary_for(&filter).await?;

    Ok(Json(ApplianceDetailResponse {
        success: true,
        appliance,
        period,
        stats: CostedStatsResponse::new(&stats, rate),
        count: samples.len(),
        readings: ReadingResponse::from_samples(&samples, rate),
    }))
}
