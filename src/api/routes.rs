use super::handlers::{appliances, cost, dashboard, health, loads, readings};
use super::AppState;
use axum::{
    extract::Request,
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::Level;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/readings",
            get(readings::list_readings)
                .post(readings::create_reading)
                .delete(readings::delete_all),
        )
        .route("/readings/latest", get(readings::get_latest))
        .route("/readings/range", get(readings::get_range))
        .route("/readings/today", get(readings::get_today))
        .route("/readings/month", get(readings::get_month))
        .route("/readings/year", get(readings::get_year))
        .route("/appliances", get(appliances::get_breakdown))
        .route("/appliances/{appliance}", get(appliances::get_appliance))
        .route("/loads/summary", get(loads::get_summary))
        .route("/loads/{load_id}", get(loads::get_load_readings))
        .route("/cost", get(cost::get_cost))
        .route("/cost/prediction", get(cost::get_prediction))
        .route("/cost/comparison", get(cost::get_comparison))
        .route("/dashboard/summary", get(dashboard::get_summary))
        .route("/dashboard/realtime", get(dashboard::get_realtime));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", api_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    tracing::span!(
                        Level::INFO,
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(|_request: &Request, _span: &tracing::Span| {
                    tracing::event!(Level::DEBUG, "received request");
                })
                .on_response(
                    |response: &axum::response::Response,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::event!(
                            Level::INFO,
                            status = response.status().as_u16(),
                            latency = ?latency,
                            "request completed"
                        );
                    },
                )
                .on_failure(
                    |error: tower_http::classify::ServerErrorsFailureClass,
                     _latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::event!(Level::ERROR, error = %error, "request failed");
                    },
                ),
        )
}
