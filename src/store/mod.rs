//! The persistent store behind the booking core.
//!
//! Lookups separate "nothing there" (`None` / empty) from "could not ask"
//! ([`BookingError::StoreUnavailable`](crate::error::BookingError)).

pub mod memory;
pub mod postgres;

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::BookingResult;
use crate::models::{
    Coupon, Movie, MovieId, NewTicket, Payment, RegisteredUser, SeatPosition, Showtime,
    ShowtimeId, Theatre, TheatreId, Ticket, TicketId,
};
use crate::services::booking::BookingGranularity;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_movies(&self) -> BookingResult<Vec<Movie>>;

    async fn find_theatres(&self) -> BookingResult<Vec<Theatre>>;

    /// Distinct theatres with at least one showtime of the movie.
    async fn find_theatres_showing_movie(&self, movie_id: MovieId) -> BookingResult<Vec<TheatreId>>;

    /// Distinct movies with at least one showtime at the theatre.
    async fn find_movies_at_theatre(&self, theatre_id: TheatreId) -> BookingResult<Vec<MovieId>>;

    async fn find_movie_id_by_title(&self, title: &str) -> BookingResult<Option<MovieId>>;

    async fn find_theatre_id_by_name(&self, name: &str) -> BookingResult<Option<TheatreId>>;

    /// Showtimes of a movie at a theatre, earliest first.
    async fn find_showtimes(&self, movie_id: MovieId, theatre_id: TheatreId) -> BookingResult<Vec<Showtime>>;

    async fn find_showtime(&self, showtime_id: ShowtimeId) -> BookingResult<Option<Showtime>>;

    async fn find_showtime_id(
        &self,
        movie_id: MovieId,
        theatre_id: TheatreId,
        starts_at: NaiveDateTime,
    ) -> BookingResult<Option<ShowtimeId>>;

    async fn find_tickets_at_showtime(&self, showtime_id: ShowtimeId) -> BookingResult<Vec<TicketId>>;

    async fn find_occupied_seats(&self, showtime_id: ShowtimeId) -> BookingResult<BTreeSet<SeatPosition>>;

    /// Checks and inserts in one atomic step.
    ///
    /// Fails with `NotFound` for an unknown showtime and `DuplicateBooking`
    /// when [`check_availability`](crate::services::booking::check_availability)
    /// rejects the ticket.
    async fn insert_ticket(&self, ticket: &NewTicket, granularity: BookingGranularity) -> BookingResult<Ticket>;

    async fn find_user_by_email(&self, email: &str) -> BookingResult<Option<RegisteredUser>>;

    async fn find_payment(&self, payment_id: i32) -> BookingResult<Option<Payment>>;

    async fn find_coupon(&self, code: &str) -> BookingResult<Option<Coupon>>;
}
