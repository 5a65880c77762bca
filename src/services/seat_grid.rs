//! Seat availability for a single showtime.
//!
//! The grid is a pure projection of the occupied seats: it has no identity of
//! its own and is rebuilt (or read back from the seat cache) whenever it is
//! needed.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{SeatPosition, ShowtimeId, SEAT_COLUMNS, SEAT_ROWS};

const ROWS: usize = SEAT_ROWS as usize;
const COLUMNS: usize = SEAT_COLUMNS as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Occupied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatGrid {
    pub showtime_id: ShowtimeId,
    cells: [[SeatStatus; COLUMNS]; ROWS],
}

impl SeatGrid {
    /// Builds the grid from the seats already sold for `showtime_id`.
    ///
    /// Cell `(r, c)` is occupied iff seat `(r + 1, c + 1)` is in `occupied`.
    /// Seats outside the auditorium are skipped with a warning.
    pub fn build<'a, I>(showtime_id: ShowtimeId, occupied: I) -> Self
    where
        I: IntoIterator<Item = &'a SeatPosition>,
    {
        let mut cells = [[SeatStatus::Available; COLUMNS]; ROWS];

        for seat in occupied {
            match seat.cell() {
                Some((r, c)) => cells[r][c] = SeatStatus::Occupied,
                None => warn!("showtime {}: ignoring out-of-range seat {}", showtime_id, seat),
            }
        }

        SeatGrid { showtime_id, cells }
    }

    /// Status of the 0-indexed cell, `None` outside the grid.
    pub fn status(&self, row: usize, col: usize) -> Option<SeatStatus> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    pub fn is_available(&self, seat: &SeatPosition) -> bool {
        seat.cell()
            .and_then(|(r, c)| self.status(r, c))
            .is_some_and(|s| s == SeatStatus::Available)
    }

    pub fn occupied_count(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|s| **s == SeatStatus::Occupied)
            .count()
    }

    pub fn available_count(&self) -> usize {
        ROWS * COLUMNS - self.occupied_count()
    }

    /// Occupied seats in row-major order, 1-indexed.
    pub fn occupied_seats(&self) -> impl Iterator<Item = SeatPosition> + '_ {
        self.cells.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, s)| **s == SeatStatus::Occupied)
                .map(move |(c, _)| SeatPosition::new(r as i32 + 1, c as i32 + 1))
        })
    }
}
