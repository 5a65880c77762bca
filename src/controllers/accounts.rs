use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::BookingResult;
use crate::models::{user::UserProfile, Coupon, PaymentView};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/payments/{id}", get(get_payment))
        .route("/coupons/{code}", get(get_coupon))
}

#[derive(Debug, Deserialize, Validate)]
struct LoginRequest {
    #[validate(email)]
    email: String,
    #[validate(length(min = 1))]
    password: String,
}

// POST /api/login
async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> BookingResult<Json<UserProfile>> {
    req.validate()?;

    let user = state.booking.authenticate(&req.email, &req.password).await?;
    Ok(Json(user.profile(chrono::Local::now().date_naive())))
}

async fn get_payment(
    State(state): State<Arc<AppState>>,
    Path(payment_id): Path<i32>,
) -> BookingResult<Json<PaymentView>> {
    let payment = state.booking.payment(payment_id).await?;
    Ok(Json(PaymentView::from(&payment)))
}

async fn get_coupon(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> BookingResult<Json<Coupon>> {
    Ok(Json(state.booking.coupon(&code).await?))
}
