use serde::{Deserialize, Serialize};

pub const SEAT_ROWS: i32 = 10;
pub const SEAT_COLUMNS: i32 = 10;

/// A seat in the auditorium, 1-indexed on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeatPosition {
    pub row: i32,
    pub col: i32,
}

impl SeatPosition {
    pub fn new(row: i32, col: i32) -> Self {
        SeatPosition { row, col }
    }

    pub fn in_bounds(&self) -> bool {
        (1..=SEAT_ROWS).contains(&self.row) && (1..=SEAT_COLUMNS).contains(&self.col)
    }

    /// 0-indexed grid cell for this seat, if it lies inside the grid.
    pub fn cell(&self) -> Option<(usize, usize)> {
        if !self.in_bounds() {
            return None;
        }
        Some(((self.row - 1) as usize, (self.col - 1) as usize))
    }
}

impl std::fmt::Display for SeatPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {} seat {}", self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_is_zero_indexed() {
        assert_eq!(SeatPosition::new(1, 1).cell(), Some((0, 0)));
        assert_eq!(SeatPosition::new(10, 10).cell(), Some((9, 9)));
        assert_eq!(SeatPosition::new(3, 5).cell(), Some((2, 4)));
    }

    #[test]
    fn rejects_seats_outside_the_auditorium() {
        for seat in [
            SeatPosition::new(0, 1),
            SeatPosition::new(1, 0),
            SeatPosition::new(11, 3),
            SeatPosition::new(4, 11),
            SeatPosition::new(-2, -2),
        ] {
            assert!(!seat.in_bounds(), "{seat} should be out of bounds");
            assert_eq!(seat.cell(), None);
        }
    }
}
