use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::booking::BookingError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Booking(BookingError::Validation { .. }) => StatusCode::BAD_REQUEST,
            AppError::Booking(BookingError::SlotUnavailable { .. }) => StatusCode::CONFLICT,
            AppError::Booking(BookingError::StoreUnreachable(e)) => {
                tracing::error!(error = %e, "booking failed: store unreachable");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = serde_json::json!({ "success": false, "message": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
