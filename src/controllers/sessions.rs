use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{BookingError, BookingResult};
use crate::services::selection::{RenderCommand, SelectionEvent, SelectionState};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", post(open_session))
        .route("/sessions/{id}/events", post(handle_event))
        .route("/sessions/{id}", delete(close_session))
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    id: Uuid,
    state: SelectionState,
    commands: Vec<RenderCommand>,
}

// POST /api/sessions
async fn open_session(
    State(state): State<Arc<AppState>>,
) -> BookingResult<(StatusCode, Json<SessionResponse>)> {
    let (id, session) = state.sessions.open(state.booking.clone()).await;

    let mut controller = session.controller.lock().await;
    let commands = match controller.open().await {
        Ok(commands) => commands,
        Err(e) => {
            drop(controller);
            state.sessions.close(&id).await;
            return Err(e);
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse { id, state: controller.state().clone(), commands }),
    ))
}

// POST /api/sessions/{id}/events
async fn handle_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(event): Json<SelectionEvent>,
) -> BookingResult<Json<SessionResponse>> {
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| BookingError::not_found("session", id))?;
    session.touch().await;

    let mut controller = session.controller.lock().await;
    let commands = controller.handle(event).await?;
    Ok(Json(SessionResponse { id, state: controller.state().clone(), commands }))
}

// DELETE /api/sessions/{id}
async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> BookingResult<StatusCode> {
    if state.sessions.close(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(BookingError::not_found("session", id))
    }
}
