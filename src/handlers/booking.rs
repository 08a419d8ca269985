use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::models::BookingRequest;
use crate::state::AppState;

pub async fn submit_booking(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload.map_err(|e| {
        tracing::info!(error = %e, "malformed booking body");
        AppError::BadRequest(format!("Invalid booking request: {}", e.body_text()))
    })?;

    let confirmation = state.bookings.submit(request).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Booking confirmed successfully!",
        "emailSent": confirmation.email_sent,
        "sheetUpdated": confirmation.sheet_updated,
        "calendarUpdated": confirmation.calendar_updated,
    })))
}
