use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::models::SlotDate;
use crate::services::availability::TimesResult;
use crate::state::AppState;

/// A missing, blank or `any` barber segment means no filter.
fn barber_filter(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim)
        .filter(|b| !b.is_empty() && !b.eq_ignore_ascii_case("any"))
}

pub async fn available_barbers(State(state): State<Arc<AppState>>) -> Json<Value> {
    let barbers = state.availability.list_barbers().await;
    Json(json!({ "barbers": barbers }))
}

pub async fn available_dates(
    State(state): State<Arc<AppState>>,
    barber: Option<Path<String>>,
) -> Json<Value> {
    let barber = barber.as_ref().map(|Path(b)| b.as_str());
    let dates = state.availability.list_dates(barber_filter(barber)).await;
    Json(json!({ "dates": dates }))
}

pub async fn available_times(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Json<Value>, AppError> {
    times_response(&state, &date, None).await
}

pub async fn available_times_for_barber(
    State(state): State<Arc<AppState>>,
    Path((date, barber)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    times_response(&state, &date, Some(&barber)).await
}

async fn times_response(
    state: &AppState,
    raw_date: &str,
    barber: Option<&str>,
) -> Result<Json<Value>, AppError> {
    let date = SlotDate::parse(raw_date)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid date: {raw_date}")))?;
    let barber = barber_filter(barber);
    let echoed = barber.unwrap_or("Any");

    let body = match state.availability.list_times(date, barber).await {
        TimesResult::Open(times) => json!({
            "availableTimes": times,
            "date": date,
            "barber": echoed,
        }),
        TimesResult::Closed { message } => json!({
            "availableTimes": [],
            "date": date,
            "barber": echoed,
            "message": message,
        }),
    };
    Ok(Json(body))
}
