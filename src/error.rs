use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::{SeatPosition, ShowtimeId};

/// Every failure the booking core can report.
///
/// Absence of data is never an error on its own: lookups return `Option` or an
/// empty list, and only a failed round trip to the store becomes
/// [`BookingError::StoreUnavailable`].
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("showtime {showtime_id} is already booked")]
    DuplicateBooking {
        showtime_id: ShowtimeId,
        /// Seats that collided. Empty when the whole showtime is taken.
        seats: Vec<SeatPosition>,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid credentials")]
    Unauthorized,

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),
}

impl BookingError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        BookingError::NotFound { entity, key: key.to_string() }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        BookingError::InvalidRequest(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::NotFound { .. } => "not_found",
            BookingError::DuplicateBooking { .. } => "duplicate_booking",
            BookingError::InvalidRequest(_) => "invalid_request",
            BookingError::Unauthorized => "unauthorized",
            BookingError::StoreUnavailable(_) => "store_unavailable",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::NotFound { .. } => StatusCode::NOT_FOUND,
            BookingError::DuplicateBooking { .. } => StatusCode::CONFLICT,
            BookingError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            BookingError::Unauthorized => StatusCode::UNAUTHORIZED,
            BookingError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {:?}", self);
        } else {
            tracing::debug!("request rejected: {}", self);
        }

        let mut body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        if let BookingError::DuplicateBooking { seats, .. } = &self {
            if !seats.is_empty() {
                body["seats"] = json!(seats);
            }
        }

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for BookingError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|field| field.to_string())
            .collect();
        fields.sort();
        BookingError::InvalidRequest(format!("invalid fields: {}", fields.join(", ")))
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
