pub mod availability;
pub mod booking;
pub mod health;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/health", get(health::health))
        .route("/available-barbers", get(availability::available_barbers))
        .route("/available-dates", get(availability::available_dates))
        .route("/available-dates/:barber", get(availability::available_dates))
        .route("/available-times/:date", get(availability::available_times))
        .route(
            "/available-times/:date/:barber",
            get(availability::available_times_for_barber),
        )
        .route("/submit-booking", post(booking::submit_booking))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// An empty origin list allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}
