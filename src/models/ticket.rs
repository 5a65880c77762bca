use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{SeatPosition, ShowtimeId};

pub type TicketId = i32;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub showtime_id: ShowtimeId,
    pub price: f64,
    #[sqlx(skip)]
    pub seats: Vec<SeatPosition>,
}

/// A ticket that has not been written to the store yet.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewTicket {
    pub showtime_id: ShowtimeId,
    pub price: f64,
    #[serde(default)]
    pub seats: Vec<SeatPosition>,
}

impl NewTicket {
    pub fn new(showtime_id: ShowtimeId, price: f64) -> Self {
        NewTicket { showtime_id, price, seats: Vec::new() }
    }

    pub fn with_seats(mut self, seats: impl IntoIterator<Item = SeatPosition>) -> Self {
        self.seats.extend(seats);
        self
    }
}
