use super::{device_id, Params};
use crate::api::models::{
    CostedStatsResponse, DashboardSummaryResponse, DeviceCounts, RealtimeResponse, RealtimeStats,
    ReadingResponse,
};
use crate::api::AppState;
use crate::error::Result;
use crate::models::{Period, SampleFilter, SortOrder, TimeRange};
use crate::services::UsageQuery;
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Duration, Utc};

const REALTIME_MAX_READINGS: i64 = 50;

pub async fn get_summary(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<DashboardSummaryResponse>> {
    let now = Utc::now();
    let rate = state.rate();
    let device = device_id(&params);

    let today = state
        .usage
        .summary(&UsageQuery::new(Period::Today, device.clone()), now)
        .await?;
    let month = state
        .usage
        .summary(&UsageQuery::new(Period::Month, device.clone()), now)
        .await?;
    let latest = state
        .store
        .find(&SampleFilter::for_device(device), SortOrder::Descending, Some(1))
        .await?
        .into_iter()
        .next();

    let total = state
        .store
        .distinct_devices(&SampleFilter::default())
        .await?
        .len();
    let active = state
        .store
        .distinct_devices(&SampleFilter::default().within(realtime_range(&state, now)))
        .await?
        .len();

    Ok(Json(DashboardSummaryResponse {
        success: true,
        today: CostedStatsResponse::new(&today, rate),
        month: CostedStatsResponse::new(&month, rate),
        latest_reading: latest.map(|s| ReadingResponse::from_sample(&s, rate)),
        devices: DeviceCounts { total, active },
        rate,
        currency: state.cost.currency().to_string(),
    }))
}

/// Most recent readings of the realtime window, oldest first.
pub async fn get_realtime(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<RealtimeResponse>> {
    let now = Utc::now();
    let filter = SampleFilter::for_device(device_id(&params)).within(realtime_range(&state, now));

    let mut samples = state
        .store
        .find(&filter, SortOrder::Descending, Some(REALTIME_MAX_READINGS))
        .await?;
    samples.reverse();
    let stats = state.usage.summary_for(&filter).await?;

    Ok(Json(RealtimeResponse {
        success: true,
        window_secs: state.reporting.realtime_window_secs,
        readings: ReadingResponse::from_samples(&samples, state.rate()),
        stats: RealtimeStats::from(&stats),
    }))
}

fn realtime_range(state: &AppState, now: chrono::DateTime<Utc>) -> TimeRange {
    TimeRange::new(
        now - Duration::seconds(state.reporting.realtime_window_secs),
        now,
    )
}
