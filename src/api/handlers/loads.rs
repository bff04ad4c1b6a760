use super::{device_id, limit_or, period, Params};
use crate::api::models::{
    round_to, LoadReadingsResponse, LoadSummaryResponse, LoadSummaryRow, ReadingResponse,
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

const LOAD_READINGS_LIMIT: i64 = 100;

pub async fn get_summary(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<LoadSummaryResponse>> {
    let rate = state.rate();
    let period = period(&params);
    let breakdown = state
        .usage
        .breakdown(
            &UsageQuery::new(period, device_id(&params)),
            GroupBy::Load,
            Utc::now(),
        )
        .await?;

    let mut loads: Vec<LoadSummaryRow> = breakdown
        .rows
        .iter()
        .map(|row| LoadSummaryRow::new(row, rate))
        .collect();
    loads.sort_by(|a, b| a.load_id.cmp(&b.load_id));

    Ok(Json(LoadSummaryResponse {
        success: true,
        period,
        total_energy: round_to(breakdown.total_energy, 3),
        total_cost: round_to(cost_of(breakdown.total_energy, rate), 2),
        loads,
    }))
}

pub async fn get_load_readings(
    State(state): State<AppState>,
    Path(load_id): Path<String>,
    Query(params): Query<Params>,
) -> Result<Json<LoadReadingsResponse>> {
    let period = period(&params);
    let filter = SampleFilter {
        device_id: device_id(&params),
        load_id: Some(load_id.clone()),
        range: Some(period.to_date(Utc::now(), state.usage.offset())),
        ..Default::default()
    };
    let limit = limit_or(&params, LOAD_READINGS_LIMIT)?;
    let samples = state
        .store
        .find(&filter, SortOrder::Descending, Some(limit))
        .await?;

    Ok(Json(LoadReadingsResponse {
        success: true,
        load_id,
        period,
        count: samples.len(),
        readings: ReadingResponse::from_samples(&samples, state.rate()),
    }))
}
