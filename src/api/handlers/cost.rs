use super::{device_id, number, period, Params};
use crate::api::models::{ComparisonResponse, CostResponse, PredictionResponse};
use crate::api::AppState;
use crate::error::Result;
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;

pub async fn get_cost(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<CostResponse>> {
    let report = state
        .cost
        .report(
            period(&params),
            device_id(&params),
            number::<f64>(&params, "rate")?,
            Utc::now(),
        )
        .await?;

    Ok(Json(CostResponse::new(&report, state.cost.currency())))
}

pub async fn get_prediction(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<PredictionResponse>> {
    let prediction = state
        .cost
        .predict(
            period(&params),
            device_id(&params),
            number::<f64>(&params, "rate")?,
            Utc::now(),
        )
        .await?;

    Ok(Json(PredictionResponse::new(
        &prediction,
        state.cost.currency(),
    )))
}

pub async fn get_comparison(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<ComparisonResponse>> {
    let comparison = state
        .cost
        .compare(
            period(&params),
            device_id(&params),
            number::<f64>(&params, "rate")?,
            Utc::now(),
        )
        .await?;

    Ok(Json(ComparisonResponse::new(
        &comparison,
        state.cost.currency(),
    )))
}
