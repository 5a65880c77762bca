use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{BookingError, BookingResult};
use crate::models::{Movie, MovieId, ShowtimeId, ShowtimeView, Theatre, TheatreId};
use crate::services::seat_grid::SeatGrid;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies", get(list_movies))
        .route("/movies/{id}/theatres", get(theatres_for_movie))
        .route("/theatres", get(list_theatres))
        .route("/theatres/{id}/movies", get(movies_at_theatre))
        .route("/showtimes", get(list_showtimes))
        .route("/showtimes/{id}", get(get_showtime))
        .route("/showtimes/{id}/seats", get(get_seats))
}

async fn list_movies(State(state): State<Arc<AppState>>) -> BookingResult<Json<Vec<Movie>>> {
    Ok(Json(state.booking.movies().await?))
}

async fn list_theatres(State(state): State<Arc<AppState>>) -> BookingResult<Json<Vec<Theatre>>> {
    Ok(Json(state.booking.theatres().await?))
}

// GET /api/movies/{id}/theatres
async fn theatres_for_movie(
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<MovieId>,
) -> BookingResult<Json<Vec<Theatre>>> {
    Ok(Json(state.booking.theatres_showing(movie_id).await?))
}

#[derive(Debug, Serialize)]
struct TheatreMovies {
    theatre_id: TheatreId,
    movie_ids: Vec<MovieId>,
}

// GET /api/theatres/{id}/movies
async fn movies_at_theatre(
    State(state): State<Arc<AppState>>,
    Path(theatre_id): Path<TheatreId>,
) -> BookingResult<Json<TheatreMovies>> {
    let movie_ids = state.booking.store().find_movies_at_theatre(theatre_id).await?;
    Ok(Json(TheatreMovies { theatre_id, movie_ids }))
}

#[derive(Debug, Deserialize)]
struct ShowtimesQuery {
    movie_id: MovieId,
    theatre_id: TheatreId,
}

// GET /api/showtimes?movie_id=..&theatre_id=..
async fn list_showtimes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ShowtimesQuery>,
) -> BookingResult<Json<Vec<ShowtimeView>>> {
    if params.movie_id <= 0 || params.theatre_id <= 0 {
        return Err(BookingError::invalid("movie_id and theatre_id must be > 0"));
    }

    let showtimes = state.booking.showtimes(params.movie_id, params.theatre_id).await?;
    Ok(Json(showtimes.into_iter().map(ShowtimeView::from).collect()))
}

#[derive(Debug, Serialize)]
struct ShowtimeDetail {
    #[serde(flatten)]
    showtime: ShowtimeView,
    ticket_ids: Vec<i32>,
}

async fn get_showtime(
    State(state): State<Arc<AppState>>,
    Path(showtime_id): Path<ShowtimeId>,
) -> BookingResult<Json<ShowtimeDetail>> {
    let showtime = state.booking.require_showtime(showtime_id).await?;
    let ticket_ids = state.booking.store().find_tickets_at_showtime(showtime_id).await?;
    Ok(Json(ShowtimeDetail { showtime: showtime.into(), ticket_ids }))
}

#[derive(Debug, Serialize)]
struct SeatsResponse {
    available: usize,
    occupied: usize,
    #[serde(flatten)]
    grid: SeatGrid,
}

// GET /api/showtimes/{id}/seats
async fn get_seats(
    State(state): State<Arc<AppState>>,
    Path(showtime_id): Path<ShowtimeId>,
) -> BookingResult<Json<SeatsResponse>> {
    let grid = state.booking.seat_grid(showtime_id).await?;
    Ok(Json(SeatsResponse {
        available: grid.available_count(),
        occupied: grid.occupied_count(),
        grid,
    }))
}
