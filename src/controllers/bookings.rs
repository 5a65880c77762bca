use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::BookingResult;
use crate::models::{NewTicket, SeatPosition, ShowtimeId, Ticket};
use crate::services::booking::PurchaseRequest;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tickets", post(create_ticket))
        .route("/purchases", post(create_purchase))
}

// POST /api/tickets
#[derive(Debug, Deserialize, Validate)]
struct CreateTicketRequest {
    #[validate(range(min = 1))]
    showtime_id: ShowtimeId,
    #[validate(range(min = 0.0))]
    price: f64,
    #[serde(default)]
    seats: Vec<SeatPosition>,
}

async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTicketRequest>,
) -> BookingResult<(StatusCode, Json<Ticket>)> {
    req.validate()?;

    let ticket = NewTicket::new(req.showtime_id, req.price).with_seats(req.seats);
    let created = state.booking.insert_ticket(ticket).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// POST /api/purchases
#[derive(Debug, Deserialize, Validate)]
struct CreatePurchaseRequest {
    #[validate(range(min = 1))]
    showtime_id: ShowtimeId,
    #[validate(length(min = 1, max = 100))]
    seats: Vec<SeatPosition>,
    #[validate(range(min = 0.0))]
    price_per_seat: f64,
    coupon_code: Option<String>,
}

async fn create_purchase(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePurchaseRequest>,
) -> BookingResult<(StatusCode, Json<Ticket>)> {
    req.validate()?;

    let ticket = state
        .booking
        .purchase(PurchaseRequest {
            showtime_id: req.showtime_id,
            seats: req.seats,
            price_per_seat: req.price_per_seat,
            coupon_code: req.coupon_code,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}
