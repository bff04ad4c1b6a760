use super::{device_id, limit, number, param, timestamp, Params};
use crate::api::models::{
    BucketResponse, CostedStatsResponse, DeleteResponse, IngestResponse, LatestReadingResponse,
    MonthResponse, ReadingResponse, ReadingsResponse, TodayResponse, YearResponse,
};
use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::{window::local_date, GroupBy, Period, SampleFilter, SortOrder, TimeRange};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Datelike, Utc};
use serde_json::Value;
use tracing::info;

pub async fn create_reading(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>)> {
    let Json(body) = payload
        .map_err(|e| AppError::validation(format!("invalid JSON body: {}", e.body_text())))?;

    let samples = state.ingest.ingest(&body, Utc::now()).await?;
    let readings = ReadingResponse::from_samples(&samples, state.rate());

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            success: true,
            count: readings.len(),
            readings,
        }),
    ))
}

pub async fn list_readings(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<ReadingsResponse>> {
    let filter = SampleFilter {
        device_id: device_id(&params),
        load_id: param(&params, "loadId").map(str::to_string),
        appliance: param(&params, "appliance").map(str::to_string),
        range: None,
    };
    let samples = state
        .store
        .find(&filter, SortOrder::Descending, Some(limit(&params)?))
        .await?;

    Ok(Json(ReadingsResponse::new(ReadingResponse::from_samples(
        &samples,
        state.rate(),
    ))))
}

pub async fn get_latest(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<LatestReadingResponse>> {
    let filter = SampleFilter::for_device(device_id(&params));
    let latest = state
        .store
        .find(&filter, SortOrder::Descending, Some(1))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("No readings found".into()))?;

    Ok(Json(LatestReadingResponse {
        success: true,
        reading: ReadingResponse::from_sample(&latest, state.rate()),
    }))
}

pub async fn get_range(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<ReadingsResponse>> {
    let (start, end) = match (timestamp(&params, "start")?, timestamp(&params, "end")?) {
        (Some(start), Some(end)) => (start, end),
        _ => return Err(AppError::validation("start and end are required")),
    };
    if start > end {
        return Err(AppError::validation("start must not be after end"));
    }

    let filter = SampleFilter::for_device(device_id(&params)).within(TimeRange::new(start, end));
    let samples = state.store.find(&filter, SortOrder::Ascending, None).await?;

    Ok(Json(ReadingsResponse::new(ReadingResponse::from_samples(
        &samples,
        state.rate(),
    ))))
}

pub async fn get_today(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<TodayResponse>> {
    let rate = state.rate();
    let range = Period::Today.to_date(Utc::now(), state.usage.offset());
    let filter = SampleFilter::for_device(device_id(&params)).within(range);

    let samples = state.store.find(&filter, SortOrder::Ascending, None).await?;
    let hourly = state.usage.grouped_for(&filter, GroupBy::HourOfDay).await?;
    let summary = state.usage.summary_for(&filter).await?;

    Ok(Json(TodayResponse {
        success: true,
        period: Period::Today,
        range,
        summary: CostedStatsResponse::new(&summary, rate),
        hourly: BucketResponse::from_rows(&hourly, rate),
        readings: ReadingResponse::from_samples(&samples, rate),
    }))
}

pub async fn get_month(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<MonthResponse>> {
    let rate = state.rate();
    let offset = state.usage.offset();
    let today = local_date(Utc::now(), offset);
    let year = number::<i32>(&params, "year")?.unwrap_or(today.year());
    let month = number::<u32>(&params, "month")?.unwrap_or(today.month());

    let range = TimeRange::calendar_month(year, month, offset)
        .ok_or_else(|| AppError::validation(format!("invalid month {}-{}", year, month)))?;
    let filter = SampleFilter::for_device(device_id(&params)).within(range);

    let daily = state.usage.grouped_for(&filter, GroupBy::DayOfMonth).await?;
    let summary = state.usage.summary_for(&filter).await?;

    Ok(Json(MonthResponse {
        success: true,
        year,
        month,
        range,
        summary: CostedStatsResponse::new(&summary, rate),
        daily: BucketResponse::from_rows(&daily, rate),
    }))
}

pub async fn get_year(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<YearResponse>> {
    let rate = state.rate();
    let offset = state.usage.offset();
    let year = number::<i32>(&params, "year")?.unwrap_or(local_date(Utc::now(), offset).year());

    let range = TimeRange::calendar_year(year, offset)
        .ok_or_else(|| AppError::validation(format!("invalid year {}", year)))?;
    let filter = SampleFilter::for_device(device_id(&params)).within(range);

    let monthly = state.usage.grouped_for(&filter, GroupBy::MonthOfYear).await?;
    let summary = state.usage.summary_for(&filter).await?;

    Ok(Json(YearResponse {
        success: true,
        year,
        range,
        summary: CostedStatsResponse::new(&summary, rate),
        monthly: BucketResponse::from_rows(&monthly, rate),
    }))
}

pub async fn delete_all(State(state): State<AppState>) -> Result<Json<DeleteResponse>> {
    let deleted = state.store.delete_all().await?;
    info!(deleted, "all readings deleted");

    Ok(Json(DeleteResponse {
        success: true,
        deleted,
    }))
}
