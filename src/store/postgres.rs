use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use super::Store;
use crate::database::Database;
use crate::error::{BookingError, BookingResult};
use crate::models::{
    Coupon, Movie, MovieId, NewTicket, Payment, RegisteredUser, SeatPosition, Showtime,
    ShowtimeId, Theatre, TheatreId, Ticket, TicketId,
};
use crate::services::booking::{check_availability, BookingGranularity};

// registered_user row before the card is resolved
#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    password_hash: String,
    address: String,
    last_fee_paid: NaiveDate,
    card_id: Option<i32>,
}

#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_movies(&self) -> BookingResult<Vec<Movie>> {
        let movies = sqlx::query_as::<_, Movie>("SELECT id, title, rating FROM movie ORDER BY title")
            .fetch_all(&self.db.pool)
            .await?;
        Ok(movies)
    }

    async fn find_theatres(&self) -> BookingResult<Vec<Theatre>> {
        let theatres = sqlx::query_as::<_, Theatre>("SELECT id, name FROM theatre ORDER BY name")
            .fetch_all(&self.db.pool)
            .await?;
        Ok(theatres)
    }

    async fn find_theatres_showing_movie(&self, movie_id: MovieId) -> BookingResult<Vec<TheatreId>> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT DISTINCT theatre_id FROM showtime WHERE movie_id = $1 ORDER BY theatre_id"
        )
        .bind(movie_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(ids)
    }

    async fn find_movies_at_theatre(&self, theatre_id: TheatreId) -> BookingResult<Vec<MovieId>> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT DISTINCT movie_id FROM showtime WHERE theatre_id = $1 ORDER BY movie_id"
        )
        .bind(theatre_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(ids)
    }

    async fn find_movie_id_by_title(&self, title: &str) -> BookingResult<Option<MovieId>> {
        let id = sqlx::query_scalar::<_, i32>("SELECT id FROM movie WHERE title = $1")
            .bind(title)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(id)
    }

    async fn find_theatre_id_by_name(&self, name: &str) -> BookingResult<Option<TheatreId>> {
        let id = sqlx::query_scalar::<_, i32>("SELECT id FROM theatre WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(id)
    }

    async fn find_showtimes(&self, movie_id: MovieId, theatre_id: TheatreId) -> BookingResult<Vec<Showtime>> {
        let showtimes = sqlx::query_as::<_, Showtime>(
            "SELECT id, movie_id, theatre_id, starts_at
             FROM showtime
             WHERE movie_id = $1 AND theatre_id = $2
             ORDER BY starts_at"
        )
        .bind(movie_id)
        .bind(theatre_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(showtimes)
    }

    async fn find_showtime(&self, showtime_id: ShowtimeId) -> BookingResult<Option<Showtime>> {
        let showtime = sqlx::query_as::<_, Showtime>(
            "SELECT id, movie_id, theatre_id, starts_at FROM showtime WHERE id = $1"
        )
        .bind(showtime_id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(showtime)
    }

    async fn find_showtime_id(
        &self,
        movie_id: MovieId,
        theatre_id: TheatreId,
        starts_at: NaiveDateTime,
    ) -> BookingResult<Option<ShowtimeId>> {
        let id = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM showtime WHERE movie_id = $1 AND theatre_id = $2 AND starts_at = $3"
        )
        .bind(movie_id)
        .bind(theatre_id)
        .bind(starts_at)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(id)
    }

    async fn find_tickets_at_showtime(&self, showtime_id: ShowtimeId) -> BookingResult<Vec<TicketId>> {
        let ids = sqlx::query_scalar::<_, i32>("SELECT id FROM ticket WHERE showtime_id = $1 ORDER BY id")
            .bind(showtime_id)
            .fetch_all(&self.db.pool)
            .await?;
        Ok(ids)
    }

    async fn find_occupied_seats(&self, showtime_id: ShowtimeId) -> BookingResult<BTreeSet<SeatPosition>> {
        let rows = sqlx::query_as::<_, (i32, i32)>(
            "SELECT seat_row, seat_num FROM seat WHERE showtime_id = $1"
        )
        .bind(showtime_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows.into_iter().map(|(row, col)| SeatPosition::new(row, col)).collect())
    }

    async fn insert_ticket(&self, ticket: &NewTicket, granularity: BookingGranularity) -> BookingResult<Ticket> {
        let mut tx = self.db.pool.begin().await?;

        // Locking the showtime row serialises concurrent bookings of it
        let locked = sqlx::query_scalar::<_, i32>("SELECT id FROM showtime WHERE id = $1 FOR UPDATE")
            .bind(ticket.showtime_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(BookingError::not_found("showtime", ticket.showtime_id));
        }

        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ticket WHERE showtime_id = $1")
            .bind(ticket.showtime_id)
            .fetch_one(&mut *tx)
            .await?;
        let occupied: BTreeSet<SeatPosition> = sqlx::query_as::<_, (i32, i32)>(
            "SELECT seat_row, seat_num FROM seat WHERE showtime_id = $1"
        )
        .bind(ticket.showtime_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(row, col)| SeatPosition::new(row, col))
        .collect();

        check_availability(granularity, ticket, existing as usize, &occupied)?;

        let id = sqlx::query_scalar::<_, i32>(
            "INSERT INTO ticket (showtime_id, price) VALUES ($1, $2) RETURNING id"
        )
        .bind(ticket.showtime_id)
        .bind(ticket.price)
        .fetch_one(&mut *tx)
        .await?;

        for seat in &ticket.seats {
            let inserted = sqlx::query(
                "INSERT INTO seat (ticket_id, showtime_id, seat_row, seat_num) VALUES ($1, $2, $3, $4)"
            )
            .bind(id)
            .bind(ticket.showtime_id)
            .bind(seat.row)
            .bind(seat.col)
            .execute(&mut *tx)
            .await;

            if let Err(e) = inserted {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        warn!("seat {} for showtime {} taken concurrently", seat, ticket.showtime_id);
                        return Err(BookingError::DuplicateBooking {
                            showtime_id: ticket.showtime_id,
                            seats: vec![*seat],
                        });
                    }
                }
                return Err(e.into());
            }
        }

        tx.commit().await?;
        debug!("inserted ticket {} with {} seats", id, ticket.seats.len());

        Ok(Ticket {
            id,
            showtime_id: ticket.showtime_id,
            price: ticket.price,
            seats: ticket.seats.clone(),
        })
    }

    async fn find_user_by_email(&self, email: &str) -> BookingResult<Option<RegisteredUser>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password_hash, address, last_fee_paid, card_id
             FROM registered_user
             WHERE email = $1"
        )
        .bind(email)
        .fetch_optional(&self.db.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let card = match row.card_id {
            Some(card_id) => self.find_payment(card_id).await?,
            None => None,
        };

        Ok(Some(RegisteredUser {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            address: row.address,
            last_fee_paid: row.last_fee_paid,
            card,
        }))
    }

    async fn find_payment(&self, payment_id: i32) -> BookingResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT id, holder_name, card_number, expiry FROM payment WHERE id = $1"
        )
        .bind(payment_id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(payment)
    }

    async fn find_coupon(&self, code: &str) -> BookingResult<Option<Coupon>> {
        let coupon = sqlx::query_as::<_, Coupon>(
            "SELECT id, code, amount, expiry FROM coupon WHERE code = $1"
        )
        .bind(code)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(coupon)
    }
}
